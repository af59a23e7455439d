//! Replacement selection run builder.

use std::cmp;
use std::mem;

use log;

use crate::sink::{Event, Sink};
use crate::source::Source;
use crate::tree::{Key, RunId, TournamentTree, TreeError};

/// Replacement selection run builder.
///
/// Splits a stream into ascending runs using a tournament tree of `k` leaves. A leaf that wins
/// is refilled from the source at once, the fresh item joins the current run if it does not break
/// the ascending order and is deferred to the next run otherwise. For random input runs are about
/// `2k` items long, sorted input produces a single run.
pub struct RunBuilder<T, S> {
    tree: TournamentTree<T>,
    source: S,
    /// Run the items are currently emitted for.
    current: RunId,
    /// Highest run assigned so far.
    max: RunId,
    /// Items emitted for the current run.
    run_len: usize,
    /// Completed runs.
    runs: usize,
    finished: bool,
}

impl<T, S> RunBuilder<T, S>
where
    T: Ord,
    S: Source<T>,
{
    /// Creates a run builder.
    ///
    /// # Arguments
    /// * `k` - Number of tournament leaves (in-memory items), must be positive
    /// * `source` - Input source, leaves are refilled from it
    pub fn new(k: usize, mut source: S) -> Result<Self, TreeError> {
        let tree = TournamentTree::new(k, &mut source)?;

        return Ok(RunBuilder {
            tree,
            source,
            current: 1,
            max: 1,
            run_len: 0,
            runs: 0,
            finished: false,
        });
    }

    /// Writes all the runs to the sink. Returns the number of runs written.
    pub fn write_runs<K>(&mut self, sink: &mut K) -> Result<usize, K::Error>
    where
        K: Sink<T>,
    {
        let before = self.runs;
        while let Some(event) = self.next() {
            sink.accept(event)?;
        }

        return Ok(self.runs - before);
    }

    /// Returns an iterator over the items of the next run, or [`None`] if the input is exhausted.
    pub fn next_run(&mut self) -> Option<Run<'_, T, S>> {
        if self.finished {
            return None;
        }

        self.settle();
        if self.tree.leaf(self.tree.winner()).key.is_eof() {
            self.finished = true;
            return None;
        }

        return Some(Run {
            builder: self,
            ended: false,
        });
    }

    /// Re-parks exhausted leaves that surface within a live run behind the highest run.
    ///
    /// An exhausted leaf is assigned to the run after the highest one known at that moment,
    /// but later items may be deferred to that very run by other leaves.
    fn settle(&mut self) {
        loop {
            let winner = self.tree.winner();
            let leaf = self.tree.leaf_mut(winner);
            if !leaf.key.is_eof() || leaf.run > self.max {
                break;
            }

            leaf.run = self.max + 1;
            self.tree.contest(winner);
        }
    }

    /// Emits the winner and refills its leaf from the source.
    fn replace_winner(&mut self) -> Option<T> {
        let winner = self.tree.winner();
        let next = self.source.next(winner);

        let leaf = self.tree.leaf_mut(winner);
        let (key, run) = match next {
            None => (Key::Eof, self.max + 1),
            Some(item) => {
                let breaks_order = match leaf.key.as_value() {
                    Some(last) => item < *last,
                    None => false,
                };

                if breaks_order {
                    self.max = cmp::max(self.max, self.current + 1);
                    (Key::Value(item), self.current + 1)
                } else {
                    (Key::Value(item), self.current)
                }
            }
        };

        let emitted = mem::replace(&mut leaf.key, key);
        leaf.run = run;
        self.tree.contest(winner);
        self.run_len += 1;

        return emitted.into_value();
    }

    fn end_run(&mut self) {
        self.runs += 1;
        log::debug!("run {} done (items: {})", self.current, self.run_len);
        self.run_len = 0;
    }
}

impl<T, S> RunBuilder<T, S> {
    /// Returns the number of completed runs.
    pub fn runs(&self) -> usize {
        self.runs
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut S {
        &mut self.source
    }

    pub fn into_source(self) -> S {
        self.source
    }
}

impl<T, S> Iterator for RunBuilder<T, S>
where
    T: Ord,
    S: Source<T>,
{
    type Item = Event<T>;

    /// Returns the next item of the current run or the boundary closing it.
    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }

        self.settle();
        let leaf = self.tree.leaf(self.tree.winner());
        let (exhausted, run) = (leaf.key.is_eof(), leaf.run);

        if exhausted {
            // every leaf is exhausted and parked past the last run
            self.finished = true;
            if self.run_len == 0 {
                return None;
            }
            self.end_run();
            return Some(Event::RunEnd);
        }

        if run != self.current {
            self.end_run();
            self.current = run;
            return Some(Event::RunEnd);
        }

        return self.replace_winner().map(Event::Item);
    }
}

/// Items of a single run. Created by [`RunBuilder::next_run`].
pub struct Run<'a, T, S> {
    builder: &'a mut RunBuilder<T, S>,
    ended: bool,
}

impl<'a, T, S> Iterator for Run<'a, T, S>
where
    T: Ord,
    S: Source<T>,
{
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if self.ended {
            return None;
        }

        match self.builder.next() {
            Some(Event::Item(item)) => Some(item),
            Some(Event::RunEnd) | None => {
                self.ended = true;
                None
            }
        }
    }
}
