use std::cmp::Ordering;
use std::fs;
use std::io::{self, prelude::*};
use std::path;
use std::process;

use bytesize::ByteSize;
use clap::ArgEnum;
use env_logger;
use log;
use serde;

use loser_sort::{ExternalSorter, ExternalSorterBuilder, RunBuilder, RunMerger, Sources, StreamSource, TextSink, Trap};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    match arg_parser.subcommand() {
        Some(("sort", args)) => sort(args),
        Some(("runs", args)) => split_runs(args),
        Some(("merge", args)) => merge(args),
        _ => unreachable!("subcommand is required"),
    }
}

fn sort(args: &clap::ArgMatches) {
    let order: Order = args.value_of_t_or_exit("sort");
    let leaves: usize = args.value_of_t_or_exit("leaves");
    let tmp_dir: Option<&str> = args.value_of("tmp_dir");
    let threads: Option<usize> = args.is_present("threads").then(|| args.value_of_t_or_exit("threads"));
    let rw_buf_size: Option<u64> = args.value_of("rw_buf_size").map(|v| {
        v.parse::<ByteSize>().expect("value is pre-validated").as_u64()
    });

    let input_stream = open_input(args.value_of("input").expect("value is required"));
    let mut output_stream = create_output(args.value_of("output").expect("value is required"));

    let lines = input_stream.lines();
    match order {
        Order::Asc => sort_lines(lines, &mut output_stream, leaves, threads, tmp_dir, rw_buf_size),
        Order::Desc => sort_lines(
            lines.map(|line| line.map(Descending)),
            &mut output_stream,
            leaves,
            threads,
            tmp_dir,
            rw_buf_size,
        ),
    }

    if let Err(err) = output_stream.flush() {
        log::error!("data flushing error: {}", err);
        process::exit(1);
    }
}

fn sort_lines<T, I, W>(
    input: I,
    output_stream: &mut W,
    leaves: usize,
    threads: Option<usize>,
    tmp_dir: Option<&str>,
    rw_buf_size: Option<u64>,
) where
    T: Ord + serde::Serialize + serde::de::DeserializeOwned + AsRef<str>,
    I: IntoIterator<Item = Result<T, io::Error>>,
    W: Write,
{
    let mut sorter_builder = ExternalSorterBuilder::new().with_leaves(leaves);
    if let Some(threads) = threads {
        sorter_builder = sorter_builder.with_threads_number(threads);
    }

    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    if let Some(rw_buf_size) = rw_buf_size {
        sorter_builder = sorter_builder.with_rw_buf_size(rw_buf_size as usize);
    }

    let sorter: ExternalSorter<T, io::Error> = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    let sorted_stream = match sorter.sort(input) {
        Ok(sorted_stream) => sorted_stream,
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    };

    for line in sorted_stream {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::error!("sorting stream error: {}", err);
                process::exit(1);
            }
        };
        if let Err(err) = writeln!(output_stream, "{}", line.as_ref()) {
            log::error!("data saving error: {}", err);
            process::exit(1);
        };
    }
}

fn split_runs(args: &clap::ArgMatches) {
    let leaves: usize = args.value_of_t_or_exit("leaves");
    let input_stream = open_input(args.value_of("input").expect("value is required"));
    let output_stream = create_output(args.value_of("output").expect("value is required"));

    let source = StreamSource::new(Trap::new(input_stream.lines()));
    let mut builder = match RunBuilder::new(leaves, source) {
        Ok(builder) => builder,
        Err(err) => {
            log::error!("run builder initialization error: {}", err);
            process::exit(1);
        }
    };

    let mut sink = TextSink::new(output_stream);
    match builder.write_runs(&mut sink) {
        Ok(runs) => log::info!("{} runs written", runs),
        Err(err) => {
            log::error!("data saving error: {}", err);
            process::exit(1);
        }
    }

    if let Some(err) = builder.source_mut().take_error() {
        log::error!("input data stream error: {}", err);
        process::exit(1);
    }

    if let Err(err) = sink.into_inner() {
        log::error!("data flushing error: {}", err);
        process::exit(1);
    }
}

fn merge(args: &clap::ArgMatches) {
    let inputs = Vec::from_iter(
        args.values_of("inputs")
            .expect("value is required")
            .map(|input| Trap::new(open_input(input).lines())),
    );
    let output_stream = create_output(args.value_of("output").expect("value is required"));

    let mut merger = match RunMerger::new(inputs.len(), Sources::new(inputs)) {
        Ok(merger) => merger,
        Err(err) => {
            log::error!("merger initialization error: {}", err);
            process::exit(1);
        }
    };

    let mut sink = TextSink::new(output_stream);
    match merger.merge_into(&mut sink) {
        Ok(items) => log::info!("{} lines merged", items),
        Err(err) => {
            log::error!("data saving error: {}", err);
            process::exit(1);
        }
    }

    if let Some(err) = merger.source_mut().take_error() {
        log::error!("input data stream error: {}", err);
        process::exit(1);
    }

    if let Err(err) = sink.into_inner() {
        log::error!("data flushing error: {}", err);
        process::exit(1);
    }
}

fn open_input(path: &str) -> io::BufReader<fs::File> {
    match fs::File::open(path) {
        Ok(file) => io::BufReader::new(file),
        Err(err) => {
            log::error!("input file opening error: {}", err);
            process::exit(1);
        }
    }
}

fn create_output(path: &str) -> io::BufWriter<fs::File> {
    match fs::File::create(path) {
        Ok(file) => io::BufWriter::new(file),
        Err(err) => {
            log::error!("output file creation error: {}", err);
            process::exit(1);
        }
    }
}

/// Line sorted in descending order.
#[derive(PartialEq, Eq, serde::Serialize, serde::Deserialize)]
struct Descending(String);

impl PartialOrd for Descending {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Descending {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0).reverse()
    }
}

impl AsRef<str> for Descending {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Self::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <LogLevel as clap::ArgEnum>::from_str(s, false)
    }
}

#[derive(Copy, Clone, clap::ArgEnum)]
enum Order {
    Asc,
    Desc,
}

impl Order {
    pub fn possible_values() -> impl Iterator<Item = clap::PossibleValue<'static>> {
        Order::value_variants().iter().filter_map(|v| v.to_possible_value())
    }
}

impl std::str::FromStr for Order {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        <Order as clap::ArgEnum>::from_str(s, false)
    }
}

fn input_arg() -> clap::Arg<'static> {
    clap::Arg::new("input")
        .short('i')
        .long("input")
        .help("file to be processed")
        .required(true)
        .takes_value(true)
}

fn output_arg() -> clap::Arg<'static> {
    clap::Arg::new("output")
        .short('o')
        .long("output")
        .help("result file")
        .required(true)
        .takes_value(true)
}

fn leaves_arg() -> clap::Arg<'static> {
    clap::Arg::new("leaves")
        .short('k')
        .long("leaves")
        .help("number of lines kept in memory during run generation")
        .takes_value(true)
        .default_value("1024")
        .validator(|v| match v.parse::<usize>() {
            Ok(0) => Err("leaves number must be positive".to_string()),
            Ok(_) => Ok(()),
            Err(err) => Err(format!("leaves number format incorrect: {}", err)),
        })
}

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("loser-sort")
        .about("loser tree external sorter")
        .setting(clap::AppSettings::SubcommandRequiredElseHelp)
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .global(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .subcommand(
            clap::App::new("sort")
                .about("sorts lines of a file")
                .arg(input_arg())
                .arg(output_arg())
                .arg(leaves_arg())
                .arg(
                    clap::Arg::new("sort")
                        .short('s')
                        .long("sort")
                        .help("sorting order")
                        .takes_value(true)
                        .default_value("asc")
                        .possible_values(Order::possible_values()),
                )
                .arg(
                    clap::Arg::new("threads")
                        .short('t')
                        .long("threads")
                        .help("number of threads to use for parallel run generation")
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("tmp_dir")
                        .short('d')
                        .long("tmp-dir")
                        .help("directory to be used to store temporary data")
                        .takes_value(true),
                )
                .arg(
                    clap::Arg::new("rw_buf_size")
                        .short('b')
                        .long("rw-buf-size")
                        .help("run file read/write buffer size")
                        .takes_value(true)
                        .validator(|v| match v.parse::<ByteSize>() {
                            Ok(_) => Ok(()),
                            Err(err) => Err(format!("buffer size format incorrect: {}", err)),
                        }),
                ),
        )
        .subcommand(
            clap::App::new("runs")
                .about("splits lines of a file into sorted runs separated by an empty line")
                .arg(input_arg())
                .arg(output_arg())
                .arg(leaves_arg()),
        )
        .subcommand(
            clap::App::new("merge")
                .about("merges sorted files")
                .arg(output_arg())
                .arg(
                    clap::Arg::new("inputs")
                        .help("sorted files to be merged")
                        .required(true)
                        .multiple_values(true)
                        .takes_value(true),
                ),
        )
        .get_matches()
}

fn init_logger(log_level: LogLevel) {
    env_logger::Builder::new()
        .filter_level(match log_level {
            LogLevel::Off => log::LevelFilter::Off,
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        })
        .format_timestamp_millis()
        .init();
}
