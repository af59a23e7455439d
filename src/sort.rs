//! External sorter.

use log;
use std::error::Error;
use std::fmt;
use std::fmt::Display;
use std::io;
use std::marker::PhantomData;
use std::path::Path;

use rayon::prelude::*;

use crate::chunk::{ExternalChunk, ExternalChunkError, RmpExternalChunk};
use crate::merger::RunMerger;
use crate::runs::RunBuilder;
use crate::source::{Sources, StreamSource, Trap};
use crate::tree::{check_leaves, TreeError};

/// Default number of tournament leaves used for run generation.
pub const DEFAULT_LEAVES: usize = 1024;

/// Sorting error.
#[derive(Debug)]
pub enum SortError<S: Error, D: Error, I: Error> {
    /// Temporary directory or file creation error.
    TempDir(io::Error),
    /// Workers thread pool initialization error.
    ThreadPoolBuildError(rayon::ThreadPoolBuildError),
    /// Common I/O error.
    IO(io::Error),
    /// Data serialization error.
    SerializationError(S),
    /// Data deserialization error.
    DeserializationError(D),
    /// Input data stream error
    InputError(I),
    /// Sorter parameter is out of range.
    InvalidArgument(TreeError),
}

impl<S, D, I> Error for SortError<S, D, I>
where
    S: Error + 'static,
    D: Error + 'static,
    I: Error + 'static,
{
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(match &self {
            SortError::TempDir(err) => err,
            SortError::ThreadPoolBuildError(err) => err,
            SortError::IO(err) => err,
            SortError::SerializationError(err) => err,
            SortError::DeserializationError(err) => err,
            SortError::InputError(err) => err,
            SortError::InvalidArgument(err) => err,
        })
    }
}

impl<S: Error, D: Error, I: Error> Display for SortError<S, D, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self {
            SortError::TempDir(err) => write!(f, "temporary directory or file not created: {}", err),
            SortError::ThreadPoolBuildError(err) => write!(f, "thread pool initialization failed: {}", err),
            SortError::IO(err) => write!(f, "I/O operation failed: {}", err),
            SortError::SerializationError(err) => write!(f, "data serialization error: {}", err),
            SortError::DeserializationError(err) => write!(f, "data deserialization error: {}", err),
            SortError::InputError(err) => write!(f, "input data stream error: {}", err),
            SortError::InvalidArgument(err) => write!(f, "sorter configuration error: {}", err),
        }
    }
}

impl<S: Error, D: Error, I: Error> From<ExternalChunkError<S>> for SortError<S, D, I> {
    fn from(err: ExternalChunkError<S>) -> Self {
        match err {
            ExternalChunkError::IO(err) => SortError::IO(err),
            ExternalChunkError::SerializationError(err) => SortError::SerializationError(err),
        }
    }
}

impl<S: Error, D: Error, I: Error> From<TreeError> for SortError<S, D, I> {
    fn from(err: TreeError) -> Self {
        SortError::InvalidArgument(err)
    }
}

type ChunkSortError<C, T, E> = SortError<
    <C as ExternalChunk<T>>::SerializationError,
    <C as ExternalChunk<T>>::DeserializationError,
    E,
>;

/// External sorter builder. Provides methods for [`ExternalSorter`] initialization.
#[derive(Clone)]
pub struct ExternalSorterBuilder<T, E, C = RmpExternalChunk<T>>
where
    T: Ord,
    E: Error,
    C: ExternalChunk<T>,
{
    /// Number of tournament leaves used for run generation.
    leaves: usize,
    /// Number of threads to be used to build runs of partitioned input in parallel.
    threads_number: Option<usize>,
    /// Directory to be used to store temporary data.
    tmp_dir: Option<Box<Path>>,
    /// Chunk file read/write buffer size.
    rw_buf_size: Option<usize>,

    /// External chunk type.
    external_chunk_type: PhantomData<C>,
    /// Input item type.
    item_type: PhantomData<T>,
    /// Input error type.
    input_error_type: PhantomData<E>,
}

impl<T, E, C> ExternalSorterBuilder<T, E, C>
where
    T: Ord,
    E: Error,
    C: ExternalChunk<T>,
{
    /// Creates an instance of a builder with default parameters.
    pub fn new() -> Self {
        ExternalSorterBuilder::default()
    }

    /// Builds an [`ExternalSorter`] instance using provided configuration.
    pub fn build(self) -> Result<ExternalSorter<T, E, C>, ChunkSortError<C, T, E>> {
        ExternalSorter::new(
            self.leaves,
            self.threads_number,
            self.tmp_dir.as_deref(),
            self.rw_buf_size,
        )
    }

    /// Sets number of tournament leaves, that is number of items kept in memory during run generation.
    pub fn with_leaves(mut self, leaves: usize) -> ExternalSorterBuilder<T, E, C> {
        self.leaves = leaves;
        return self;
    }

    /// Sets number of threads to be used to build runs of partitioned input in parallel.
    pub fn with_threads_number(mut self, threads_number: usize) -> ExternalSorterBuilder<T, E, C> {
        self.threads_number = Some(threads_number);
        return self;
    }

    /// Sets directory to be used to store temporary data.
    pub fn with_tmp_dir(mut self, path: &Path) -> ExternalSorterBuilder<T, E, C> {
        self.tmp_dir = Some(path.into());
        return self;
    }

    /// Sets chunk read/write buffer size.
    pub fn with_rw_buf_size(mut self, buf_size: usize) -> ExternalSorterBuilder<T, E, C> {
        self.rw_buf_size = Some(buf_size);
        return self;
    }
}

impl<T, E, C> Default for ExternalSorterBuilder<T, E, C>
where
    T: Ord,
    E: Error,
    C: ExternalChunk<T>,
{
    fn default() -> Self {
        ExternalSorterBuilder {
            leaves: DEFAULT_LEAVES,
            threads_number: None,
            tmp_dir: None,
            rw_buf_size: None,
            external_chunk_type: PhantomData,
            item_type: PhantomData,
            input_error_type: PhantomData,
        }
    }
}

/// External sorter.
///
/// Input is split into runs by replacement selection, every run is stored in a separate chunk
/// and all the chunks are merged in a single pass.
pub struct ExternalSorter<T, E, C = RmpExternalChunk<T>>
where
    T: Ord,
    E: Error,
    C: ExternalChunk<T>,
{
    /// Number of tournament leaves used for run generation.
    leaves: usize,
    /// Run generation thread pool.
    thread_pool: rayon::ThreadPool,
    /// Directory to be used to store temporary data.
    tmp_dir: tempfile::TempDir,
    /// Chunk file read/write buffer size.
    rw_buf_size: Option<usize>,

    /// External chunk type.
    external_chunk_type: PhantomData<C>,
    /// Input item type.
    item_type: PhantomData<T>,
    /// Input error type.
    input_error_type: PhantomData<E>,
}

impl<T, E, C> ExternalSorter<T, E, C>
where
    T: Ord,
    E: Error,
    C: ExternalChunk<T>,
{
    /// Creates a new external sorter instance.
    ///
    /// # Arguments
    /// * `leaves` - Number of tournament leaves used for run generation, must be positive.
    /// * `threads_number` - Number of threads to be used to build runs of partitioned input in parallel.
    ///   If the parameter is [`None`] threads number will be selected based on available CPU core number.
    /// * `tmp_path` - Directory to be used to store temporary data. If paramater is [`None`] default OS temporary
    ///   directory will be used.
    /// * `rw_buf_size` - Chunks file read/write buffer size.
    pub fn new(
        leaves: usize,
        threads_number: Option<usize>,
        tmp_path: Option<&Path>,
        rw_buf_size: Option<usize>,
    ) -> Result<Self, ChunkSortError<C, T, E>> {
        check_leaves(leaves)?;

        return Ok(ExternalSorter {
            leaves,
            rw_buf_size,
            thread_pool: Self::init_thread_pool(threads_number)?,
            tmp_dir: Self::init_tmp_directory(tmp_path)?,
            external_chunk_type: PhantomData,
            item_type: PhantomData,
            input_error_type: PhantomData,
        });
    }

    fn init_thread_pool(threads_number: Option<usize>) -> Result<rayon::ThreadPool, ChunkSortError<C, T, E>> {
        let mut thread_pool_builder = rayon::ThreadPoolBuilder::new();

        if let Some(threads_number) = threads_number {
            log::info!("initializing thread-pool (threads: {})", threads_number);
            thread_pool_builder = thread_pool_builder.num_threads(threads_number);
        } else {
            log::info!("initializing thread-pool (threads: default)");
        }
        let thread_pool = thread_pool_builder
            .build()
            .map_err(|err| SortError::ThreadPoolBuildError(err))?;

        return Ok(thread_pool);
    }

    fn init_tmp_directory(tmp_path: Option<&Path>) -> Result<tempfile::TempDir, ChunkSortError<C, T, E>> {
        let tmp_dir = if let Some(tmp_path) = tmp_path {
            tempfile::tempdir_in(tmp_path)
        } else {
            tempfile::tempdir()
        }
        .map_err(|err| SortError::TempDir(err))?;

        log::info!("using {} as a temporary directory", tmp_dir.path().display());

        return Ok(tmp_dir);
    }

    /// Sorts data from the input.
    /// Returns an iterator that can be used to get sorted data stream.
    ///
    /// # Arguments
    /// * `input` - Input stream data to be fetched from
    pub fn sort<I>(&self, input: I) -> Result<MergedStream<T, C>, ChunkSortError<C, T, E>>
    where
        I: IntoIterator<Item = Result<T, E>>,
    {
        let chunks = build_chunks::<T, E, C, I>(&self.tmp_dir, self.leaves, self.rw_buf_size, input)?;

        log::debug!("external sort preparation done (runs: {})", chunks.len());

        return Ok(MergedStream::new(chunks)?);
    }

    /// Sorts data from several input partitions.
    /// Runs of every partition are built in parallel using the sorter thread pool, then all the runs
    /// are merged into a single sorted stream.
    ///
    /// # Arguments
    /// * `partitions` - Input streams to be fetched from
    pub fn sort_partitioned<I>(
        &self,
        partitions: Vec<I>,
    ) -> Result<MergedStream<T, C>, ChunkSortError<C, T, E>>
    where
        T: Send,
        E: Send,
        C: Send,
        C::SerializationError: Send,
        C::DeserializationError: Send,
        I: IntoIterator<Item = Result<T, E>> + Send,
    {
        let tmp_dir = &self.tmp_dir;
        let leaves = self.leaves;
        let rw_buf_size = self.rw_buf_size;

        log::debug!("building runs of {} partitions ...", partitions.len());
        let partition_chunks: Vec<Vec<C>> = self.thread_pool.install(|| {
            partitions
                .into_par_iter()
                .map(|partition| build_chunks::<T, E, C, I>(tmp_dir, leaves, rw_buf_size, partition))
                .collect::<Result<Vec<Vec<C>>, _>>()
        })?;

        let chunks = Vec::from_iter(partition_chunks.into_iter().flatten());
        log::debug!("external sort preparation done (runs: {})", chunks.len());

        return Ok(MergedStream::new(chunks)?);
    }
}

/// Splits the input into runs and stores every run in a separate chunk.
fn build_chunks<T, E, C, I>(
    tmp_dir: &tempfile::TempDir,
    leaves: usize,
    rw_buf_size: Option<usize>,
    input: I,
) -> Result<Vec<C>, ChunkSortError<C, T, E>>
where
    T: Ord,
    E: Error,
    C: ExternalChunk<T>,
    I: IntoIterator<Item = Result<T, E>>,
{
    let mut builder = RunBuilder::new(leaves, StreamSource::new(Trap::new(input)))?;
    let mut chunks = Vec::new();

    while let Some(run) = builder.next_run() {
        log::debug!("saving run data ...");
        let chunk = C::build(tmp_dir, run, rw_buf_size)?;

        if let Some(err) = builder.source_mut().take_error() {
            return Err(SortError::InputError(err));
        }
        chunks.push(chunk);
    }

    if let Some(err) = builder.source_mut().take_error() {
        return Err(SortError::InputError(err));
    }

    return Ok(chunks);
}

/// Sorted data stream. Merges external chunks in a single pass.
pub struct MergedStream<T, C>
where
    T: Ord,
    C: ExternalChunk<T>,
{
    merger: Option<RunMerger<T, Sources<Trap<C, C::DeserializationError>>>>,
}

impl<T, C> MergedStream<T, C>
where
    T: Ord,
    C: ExternalChunk<T>,
{
    /// Creates a stream merging the chunks. Chunk items should be sorted in ascending order.
    pub fn new(chunks: Vec<C>) -> Result<Self, TreeError> {
        if chunks.is_empty() {
            return Ok(MergedStream { merger: None });
        }

        log::debug!("merging {} chunks", chunks.len());
        let sources = Sources::new(chunks.into_iter().map(Trap::new));
        let merger = RunMerger::new(sources.len(), sources)?;

        return Ok(MergedStream { merger: Some(merger) });
    }

    fn take_error(&mut self) -> Option<C::DeserializationError> {
        self.merger.as_mut()?.source_mut().take_error()
    }
}

impl<T, C> Iterator for MergedStream<T, C>
where
    T: Ord,
    C: ExternalChunk<T>,
{
    type Item = Result<T, C::DeserializationError>;

    /// Returns the next item in ascending order.
    /// A chunk read error is returned right after the item whose replacement failed to be read.
    fn next(&mut self) -> Option<Self::Item> {
        if let Some(err) = self.take_error() {
            return Some(Err(err));
        }

        match self.merger.as_mut()?.next() {
            Some(item) => Some(Ok(item)),
            None => self.take_error().map(Err),
        }
    }
}

#[cfg(test)]
mod test {
    use std::fs;
    use std::io::{self, ErrorKind};
    use std::path::Path;

    use rand::seq::SliceRandom;
    use rstest::*;

    use super::{ExternalSorter, ExternalSorterBuilder, MergedStream, SortError};
    use crate::chunk::ExternalChunk;
    use crate::tree::check_leaves;

    /// In-memory chunk replaying prepared read results.
    struct ReplayChunk {
        items: std::vec::IntoIter<Result<i32, io::Error>>,
    }

    impl ReplayChunk {
        fn replay(items: Vec<Result<i32, &str>>) -> Self {
            let items = Vec::from_iter(
                items
                    .into_iter()
                    .map(|item| item.map_err(|msg| io::Error::new(ErrorKind::Other, msg))),
            );

            ReplayChunk {
                items: items.into_iter(),
            }
        }
    }

    impl ExternalChunk<i32> for ReplayChunk {
        type SerializationError = io::Error;
        type DeserializationError = io::Error;

        fn new(_reader: io::Take<io::BufReader<fs::File>>) -> Self {
            ReplayChunk::replay(Vec::new())
        }

        fn dump(
            _chunk_writer: &mut io::BufWriter<fs::File>,
            _items: impl IntoIterator<Item = i32>,
        ) -> Result<(), Self::SerializationError> {
            Ok(())
        }
    }

    impl Iterator for ReplayChunk {
        type Item = Result<i32, io::Error>;

        fn next(&mut self) -> Option<Self::Item> {
            self.items.next()
        }
    }

    #[rstest]
    #[case(1)]
    #[case(8)]
    #[case(200)]
    fn test_external_sorter(#[case] leaves: usize) {
        let input_sorted = 0..100;

        let mut input_shuffled = Vec::from_iter(input_sorted.clone());
        input_shuffled.shuffle(&mut rand::thread_rng());

        let input: Vec<Result<i32, io::Error>> = Vec::from_iter(input_shuffled.into_iter().map(|item| Ok(item)));

        let sorter: ExternalSorter<i32, _> = ExternalSorterBuilder::new()
            .with_leaves(leaves)
            .with_tmp_dir(Path::new("./"))
            .build()
            .unwrap();

        let result = sorter.sort(input).unwrap();

        let actual_result: Result<Vec<i32>, _> = result.collect();
        let actual_result = actual_result.unwrap();
        let expected_result = Vec::from_iter(input_sorted.clone());

        assert_eq!(actual_result, expected_result)
    }

    #[test]
    fn test_external_sorter_empty_input() {
        let sorter: ExternalSorter<i32, io::Error> = ExternalSorterBuilder::new()
            .with_leaves(4)
            .with_tmp_dir(Path::new("./"))
            .build()
            .unwrap();

        let result = sorter.sort(Vec::<Result<i32, io::Error>>::new()).unwrap();

        assert_eq!(result.count(), 0);
    }

    #[test]
    fn test_external_sorter_input_error() {
        let input: Vec<Result<String, io::Error>> = vec![
            Ok("b".to_string()),
            Ok("a".to_string()),
            Err(io::Error::new(ErrorKind::Other, "test error")),
        ];

        let sorter: ExternalSorter<String, _> = ExternalSorterBuilder::new()
            .with_leaves(1)
            .with_tmp_dir(Path::new("./"))
            .build()
            .unwrap();

        match sorter.sort(input) {
            Err(SortError::InputError(err)) => assert_eq!(err.to_string(), "test error"),
            _ => panic!("input error expected"),
        }
    }

    #[test]
    fn test_external_sorter_zero_leaves() {
        let result: Result<ExternalSorter<i32, io::Error>, _> = ExternalSorterBuilder::new().with_leaves(0).build();

        match result {
            Err(SortError::InvalidArgument(err)) => assert_eq!(err, check_leaves(0).unwrap_err()),
            _ => panic!("invalid argument error expected"),
        }
    }

    #[rstest]
    #[case(
        vec![
            vec![Ok(1), Err("bad"), Ok(9)],
            vec![Ok(2), Ok(3)],
        ],
        vec!["1", "error: bad", "2", "3"],
    )]
    #[case(
        vec![
            vec![Ok(1), Ok(2)],
            vec![Ok(0), Err("bad")],
        ],
        vec!["0", "error: bad", "1", "2"],
    )]
    #[case(
        vec![
            vec![Err("bad")],
            vec![Ok(4), Ok(5)],
        ],
        vec!["error: bad", "4", "5"],
    )]
    #[case(
        vec![
            vec![Ok(7)],
            vec![],
        ],
        vec!["7"],
    )]
    fn test_merged_stream_read_error(#[case] chunks: Vec<Vec<Result<i32, &str>>>, #[case] expected: Vec<&str>) {
        let chunks = Vec::from_iter(chunks.into_iter().map(ReplayChunk::replay));
        let mut stream = MergedStream::new(chunks).unwrap();

        let actual = Vec::from_iter(stream.by_ref().map(|item| match item {
            Ok(value) => value.to_string(),
            Err(err) => format!("error: {}", err),
        }));

        assert_eq!(actual, expected);
        assert!(stream.next().is_none());
    }

    #[test]
    fn test_merged_stream_no_chunks() {
        let mut stream: MergedStream<i32, ReplayChunk> = MergedStream::new(Vec::new()).unwrap();

        assert!(stream.next().is_none());
    }

    #[rstest]
    #[case(1)]
    #[case(3)]
    fn test_external_sorter_partitioned(#[case] threads: usize) {
        let input_sorted = Vec::from_iter((0..20).flat_map(|x| (0..5).map(move |y| (x, y))));

        let mut input_shuffled = input_sorted.clone();
        input_shuffled.shuffle(&mut rand::thread_rng());

        let partitions = Vec::from_iter(input_shuffled.chunks(30).map(|chunk| {
            Vec::from_iter(chunk.iter().map(|item| Result::<(i32, i32), io::Error>::Ok(*item)))
        }));

        let sorter: ExternalSorter<(i32, i32), _> = ExternalSorterBuilder::new()
            .with_leaves(4)
            .with_threads_number(threads)
            .with_tmp_dir(Path::new("./"))
            .with_rw_buf_size(128)
            .build()
            .unwrap();

        let result = sorter.sort_partitioned(partitions).unwrap();

        let actual_result: Result<Vec<(i32, i32)>, _> = result.collect();
        assert_eq!(actual_result.unwrap(), input_sorted);
    }
}
