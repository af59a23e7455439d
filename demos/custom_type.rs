use std::cmp::Ordering;
use std::env;
use std::error::Error;
use std::fmt::{self, Display};
use std::fs;
use std::io::{self, prelude::*};
use std::path;

use env_logger;
use log;
use serde;

use loser_sort::{ExternalSorter, ExternalSorterBuilder};

#[derive(Debug)]
enum ReadingError {
    IO(io::Error),
    Format(String),
}

impl Display for ReadingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReadingError::IO(err) => write!(f, "input reading error: {}", err),
            ReadingError::Format(err) => write!(f, "reading format error: {}", err),
        }
    }
}

impl Error for ReadingError {}

/// Sensor reading, `time;sensor;value` in text form.
#[derive(PartialEq, Eq, serde::Serialize, serde::Deserialize)]
struct Reading {
    time: u64,
    sensor: String,
    value: i64,
}

impl Reading {
    fn parse(line: &str) -> Result<Self, ReadingError> {
        let mut fields = line.splitn(3, ';');
        let (time, sensor, value) = match (fields.next(), fields.next(), fields.next()) {
            (Some(time), Some(sensor), Some(value)) => (time, sensor, value),
            _ => return Err(ReadingError::Format(format!("three fields expected: {:?}", line))),
        };

        Ok(Reading {
            time: time
                .parse()
                .map_err(|err| ReadingError::Format(format!("time field: {}", err)))?,
            sensor: sensor.to_string(),
            value: value
                .trim()
                .parse()
                .map_err(|err| ReadingError::Format(format!("value field: {}", err)))?,
        })
    }
}

impl PartialOrd for Reading {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Reading {
    fn cmp(&self, other: &Self) -> Ordering {
        self.time
            .cmp(&other.time)
            .then_with(|| self.sensor.cmp(&other.sensor))
            .then_with(|| self.value.cmp(&other.value))
    }
}

/// Merges the readings of several sensor logs into a single timeline.
/// Every log named on the command line is a partition, runs of the partitions are built in parallel.
fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let partitions = Vec::from_iter(env::args().skip(1).map(|log_path| {
        let reader = io::BufReader::new(fs::File::open(log_path).unwrap());
        reader
            .lines()
            .map(|line| Reading::parse(&line.map_err(ReadingError::IO)?))
    }));
    log::info!("merging {} sensor logs", partitions.len());

    let sorter: ExternalSorter<Reading, ReadingError> = ExternalSorterBuilder::new()
        .with_tmp_dir(path::Path::new("./"))
        .with_leaves(10_000)
        .with_threads_number(4)
        .build()
        .unwrap();

    let sorted = sorter.sort_partitioned(partitions).unwrap();

    let mut output_writer = io::BufWriter::new(fs::File::create("timeline.txt").unwrap());
    for reading in sorted.map(Result::unwrap) {
        writeln!(output_writer, "{};{};{}", reading.time, reading.sensor, reading.value).unwrap();
    }
    output_writer.flush().unwrap();
}
