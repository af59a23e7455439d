//! Run output sinks.

use std::convert::Infallible;
use std::fmt::Display;
use std::io::{self, prelude::*};

/// Replacement selection output event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event<T> {
    /// Next item of the current run.
    Item(T),
    /// Current run is complete.
    RunEnd,
}

/// Output sink interface. An append-only writer of items and run boundaries.
pub trait Sink<T> {
    type Error;

    /// Appends an item to the current run.
    fn push(&mut self, item: T) -> Result<(), Self::Error>;

    /// Closes the current run.
    fn end_run(&mut self) -> Result<(), Self::Error>;

    /// Dispatches an event to [`Sink::push`] or [`Sink::end_run`].
    fn accept(&mut self, event: Event<T>) -> Result<(), Self::Error> {
        match event {
            Event::Item(item) => self.push(item),
            Event::RunEnd => self.end_run(),
        }
    }
}

/// Flat sink, run boundaries are dropped.
impl<T> Sink<T> for Vec<T> {
    type Error = Infallible;

    fn push(&mut self, item: T) -> Result<(), Self::Error> {
        Vec::push(self, item);
        return Ok(());
    }

    fn end_run(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Collects every run in a separate vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCollector<T> {
    runs: Vec<Vec<T>>,
    current: Vec<T>,
}

impl<T> RunCollector<T> {
    pub fn new() -> Self {
        RunCollector::default()
    }

    /// Returns completed runs.
    pub fn runs(&self) -> &[Vec<T>] {
        &self.runs
    }

    /// Returns completed runs. Items of an unterminated run are returned as the last run.
    pub fn into_runs(mut self) -> Vec<Vec<T>> {
        if !self.current.is_empty() {
            self.runs.push(self.current);
        }
        self.runs
    }
}

impl<T> Default for RunCollector<T> {
    fn default() -> Self {
        RunCollector {
            runs: Vec::new(),
            current: Vec::new(),
        }
    }
}

impl<T> Sink<T> for RunCollector<T> {
    type Error = Infallible;

    fn push(&mut self, item: T) -> Result<(), Self::Error> {
        self.current.push(item);
        return Ok(());
    }

    fn end_run(&mut self) -> Result<(), Self::Error> {
        self.runs.push(std::mem::take(&mut self.current));
        return Ok(());
    }
}

/// Text sink. Writes an item per line and an empty line after each run.
pub struct TextSink<W: Write> {
    writer: W,
}

impl<W: Write> TextSink<W> {
    pub fn new(writer: W) -> Self {
        TextSink { writer }
    }

    /// Flushes the sink and returns the underlying writer.
    pub fn into_inner(mut self) -> io::Result<W> {
        self.writer.flush()?;
        return Ok(self.writer);
    }
}

impl<T: Display, W: Write> Sink<T> for TextSink<W> {
    type Error = io::Error;

    fn push(&mut self, item: T) -> Result<(), Self::Error> {
        writeln!(self.writer, "{}", item)
    }

    fn end_run(&mut self) -> Result<(), Self::Error> {
        writeln!(self.writer)
    }
}
