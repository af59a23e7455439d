//! Tournament leaf sources.

/// Leaf source interface. Supplies the next value for a tournament leaf.
///
/// Sources are pulled sequentially and only once. An exhausted source returns [`None`]
/// and must keep returning [`None`] on subsequent calls.
pub trait Source<T> {
    /// Returns the next value for leaf `leaf` or [`None`] if the source is exhausted.
    fn next(&mut self, leaf: usize) -> Option<T>;
}

impl<T, F> Source<T> for F
where
    F: FnMut(usize) -> Option<T>,
{
    fn next(&mut self, leaf: usize) -> Option<T> {
        self(leaf)
    }
}

/// Fused stream. Once the inner iterator returned [`None`] it is never polled again.
struct Input<I> {
    inner: I,
    exhausted: bool,
}

impl<I: Iterator> Input<I> {
    fn new(inner: I) -> Self {
        Input {
            inner,
            exhausted: false,
        }
    }

    fn pull(&mut self) -> Option<I::Item> {
        if self.exhausted {
            return None;
        }

        let item = self.inner.next();
        self.exhausted = item.is_none();
        item
    }
}

/// Single stream shared by all the leaves. Used for replacement selection over one input.
pub struct StreamSource<I> {
    input: Input<I>,
}

impl<I: Iterator> StreamSource<I> {
    pub fn new<S>(stream: S) -> Self
    where
        S: IntoIterator<IntoIter = I>,
    {
        StreamSource {
            input: Input::new(stream.into_iter()),
        }
    }

    /// Checks if the stream has been exhausted.
    pub fn is_exhausted(&self) -> bool {
        self.input.exhausted
    }

    pub fn get_mut(&mut self) -> &mut I {
        &mut self.input.inner
    }

    pub fn into_inner(self) -> I {
        self.input.inner
    }
}

impl<T, I> Source<T> for StreamSource<I>
where
    I: Iterator<Item = T>,
{
    fn next(&mut self, _leaf: usize) -> Option<T> {
        self.input.pull()
    }
}

impl<T, E, I> StreamSource<Trap<I, E>>
where
    I: Iterator<Item = Result<T, E>>,
{
    /// Takes the error the stream stopped on.
    pub fn take_error(&mut self) -> Option<E> {
        self.input.inner.take_error()
    }
}

/// Independent stream per leaf. Used for merging previously built runs.
pub struct Sources<I> {
    inputs: Vec<Input<I>>,
}

impl<I: Iterator> Sources<I> {
    /// Creates sources from a list of streams, stream `i` feeds leaf `i`.
    pub fn new<S>(streams: impl IntoIterator<Item = S>) -> Self
    where
        S: IntoIterator<IntoIter = I>,
    {
        Sources {
            inputs: Vec::from_iter(streams.into_iter().map(|s| Input::new(s.into_iter()))),
        }
    }

    /// Returns streams number.
    pub fn len(&self) -> usize {
        self.inputs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty()
    }
}

impl<T, I> Source<T> for Sources<I>
where
    I: Iterator<Item = T>,
{
    fn next(&mut self, leaf: usize) -> Option<T> {
        self.inputs.get_mut(leaf)?.pull()
    }
}

impl<T, E, I> Sources<Trap<I, E>>
where
    I: Iterator<Item = Result<T, E>>,
{
    /// Takes the first pending error of any stream.
    pub fn take_error(&mut self) -> Option<E> {
        self.inputs.iter_mut().find_map(|input| input.inner.take_error())
    }
}

/// Fallible stream adaptor.
///
/// Converts a stream of results into a stream of values. The first error ends the stream,
/// the error itself is kept aside until it is taken by [`Trap::take_error`].
pub struct Trap<I, E> {
    inner: I,
    error: Option<E>,
    failed: bool,
}

impl<T, E, I> Trap<I, E>
where
    I: Iterator<Item = Result<T, E>>,
{
    pub fn new<S>(stream: S) -> Self
    where
        S: IntoIterator<IntoIter = I>,
    {
        Trap {
            inner: stream.into_iter(),
            error: None,
            failed: false,
        }
    }
}

impl<I, E> Trap<I, E> {
    /// Takes the error the stream stopped on.
    pub fn take_error(&mut self) -> Option<E> {
        self.error.take()
    }

    /// Checks if the stream stopped on an error.
    pub fn failed(&self) -> bool {
        self.failed
    }
}

impl<T, E, I> Iterator for Trap<I, E>
where
    I: Iterator<Item = Result<T, E>>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.failed {
            return None;
        }

        match self.inner.next()? {
            Ok(item) => Some(item),
            Err(err) => {
                self.failed = true;
                self.error = Some(err);
                None
            }
        }
    }
}
