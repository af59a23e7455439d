//! `loser-sort` is a loser tree based external sort implementation.
//!
//! External sorting is a class of sorting algorithms that can handle massive amounts of data. External sorting
//! is required when the data being sorted do not fit into the main memory (RAM) of a computer and instead must be
//! resided in slower external memory, usually a hard disk drive. Sorting is achieved in two passes. During the
//! first pass the input is split into sorted runs, during the second pass the runs are merged together.
//! For more information see [External Sorting](https://en.wikipedia.org/wiki/External_sorting).
//!
//! # Overview
//!
//! Both passes are driven by the same tournament (loser) tree of `k` leaves:
//!
//! * **Run generation:**
//!   [`RunBuilder`] implements replacement selection. It keeps only `k` items in memory and produces runs
//!   that are about `2k` items long on random input. Already sorted input produces a single run.
//! * **Merging:**
//!   [`RunMerger`] merges `k` sorted sources with at most one comparison per tree level for every item.
//! * **Data agnostic:**
//!   [`ExternalSorter`] stores runs in temporary files using `MessagePack` serialization by default,
//!   any type implementing `serde` serialization/deserialization can be sorted. The chunk format can be
//!   substituted by implementing [`ExternalChunk`].
//! * **Multithreading support:**
//!   partitioned input is split into runs in parallel, every partition owns its tournament tree.
//!
//! # Example
//!
//! ```no_run
//! use std::fs;
//! use std::io::{self, prelude::*};
//! use std::path;
//!
//! use loser_sort::{ExternalSorter, ExternalSorterBuilder};
//!
//! fn main() {
//!     let input_reader = io::BufReader::new(fs::File::open("input.txt").unwrap());
//!     let mut output_writer = io::BufWriter::new(fs::File::create("output.txt").unwrap());
//!
//!     let sorter: ExternalSorter<String, io::Error> = ExternalSorterBuilder::new()
//!         .with_tmp_dir(path::Path::new("./"))
//!         .with_leaves(100_000)
//!         .build()
//!         .unwrap();
//!
//!     let sorted = sorter.sort(input_reader.lines()).unwrap();
//!
//!     for item in sorted.map(Result::unwrap) {
//!         output_writer.write_all(format!("{}\n", item).as_bytes()).unwrap();
//!     }
//!     output_writer.flush().unwrap();
//! }
//! ```
//!
//! The tournament drivers can be used directly as well:
//!
//! ```
//! use loser_sort::{RunBuilder, RunCollector, RunMerger, Sources, StreamSource};
//!
//! let mut builder = RunBuilder::new(4, StreamSource::new(vec![3, 1, 4, 1, 5, 9, 2, 6])).unwrap();
//! let mut runs = RunCollector::new();
//! builder.write_runs(&mut runs).unwrap();
//! let runs = runs.into_runs();
//! assert_eq!(runs, vec![vec![1, 1, 3, 4, 5, 6, 9], vec![2]]);
//!
//! let merger = RunMerger::new(runs.len(), Sources::new(runs)).unwrap();
//! assert_eq!(merger.collect::<Vec<_>>(), vec![1, 1, 2, 3, 4, 5, 6, 9]);
//! ```

pub mod chunk;
pub mod merger;
pub mod runs;
pub mod sink;
pub mod sort;
pub mod source;
pub mod tree;

pub use chunk::{ExternalChunk, ExternalChunkError, RmpExternalChunk};
pub use merger::RunMerger;
pub use runs::{Run, RunBuilder};
pub use sink::{Event, RunCollector, Sink, TextSink};
pub use sort::{ExternalSorter, ExternalSorterBuilder, MergedStream, SortError};
pub use source::{Source, Sources, StreamSource, Trap};
pub use tree::{Key, Leaf, RunId, TournamentTree, TreeError};
