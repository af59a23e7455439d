use std::fs::File;
use std::io::{self, prelude::*, BufReader, BufWriter, Take};
use std::path;

use env_logger;
use log;

use loser_sort::{ExternalChunk, ExternalSorter, ExternalSorterBuilder};

/// Stores a run as plain text, one item per line. Items must not contain line breaks.
struct LineChunk {
    reader: Take<BufReader<File>>,
}

impl ExternalChunk<String> for LineChunk {
    type SerializationError = io::Error;
    type DeserializationError = io::Error;

    fn new(reader: Take<BufReader<File>>) -> Self {
        LineChunk { reader }
    }

    fn dump(
        chunk_writer: &mut BufWriter<File>,
        items: impl IntoIterator<Item = String>,
    ) -> Result<(), Self::SerializationError> {
        for item in items {
            writeln!(chunk_writer, "{}", item)?;
        }

        return Ok(());
    }
}

impl Iterator for LineChunk {
    type Item = Result<String, io::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut line = String::new();
        match self.reader.read_line(&mut line) {
            Ok(0) => None,
            Ok(_) => {
                line.pop();
                Some(Ok(line))
            }
            Err(err) => Some(Err(err)),
        }
    }
}

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let input_reader = BufReader::new(File::open("input.txt").unwrap());
    let mut output_writer = BufWriter::new(File::create("output.txt").unwrap());

    let sorter: ExternalSorter<String, io::Error, LineChunk> = ExternalSorterBuilder::new()
        .with_tmp_dir(path::Path::new("./"))
        .with_leaves(50_000)
        .with_rw_buf_size(1 << 16)
        .build()
        .unwrap();

    let sorted = sorter.sort(input_reader.lines()).unwrap();

    let mut lines = 0;
    for line in sorted.map(Result::unwrap) {
        writeln!(output_writer, "{}", line).unwrap();
        lines += 1;
    }
    output_writer.flush().unwrap();

    log::info!("{} lines sorted", lines);
}
