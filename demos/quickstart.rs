use std::fs;
use std::io::{self, prelude::*};

use env_logger;
use log;

use loser_sort::{RunBuilder, RunMerger, Sink, Sources, StreamSource, TextSink, Trap};

fn main() {
    env_logger::Builder::new().filter_level(log::LevelFilter::Debug).init();

    let input_reader = io::BufReader::new(fs::File::open("input.txt").unwrap());
    let tmp_dir = tempfile::tempdir_in("./").unwrap();

    // first pass: every run is written to a separate text file
    let mut builder = RunBuilder::new(1024, StreamSource::new(Trap::new(input_reader.lines()))).unwrap();
    let mut run_paths = Vec::new();

    while let Some(run) = builder.next_run() {
        let run_path = tmp_dir.path().join(format!("run-{}.txt", run_paths.len()));
        let mut run_sink = TextSink::new(io::BufWriter::new(fs::File::create(&run_path).unwrap()));

        let mut lines = 0;
        for line in run {
            run_sink.push(line).unwrap();
            lines += 1;
        }
        run_sink.into_inner().unwrap();

        log::info!("{} saved (lines: {})", run_path.display(), lines);
        run_paths.push(run_path);
    }

    if let Some(err) = builder.source_mut().take_error() {
        panic!("input reading error: {}", err);
    }

    let mut output_sink = TextSink::new(io::BufWriter::new(fs::File::create("output.txt").unwrap()));
    if run_paths.is_empty() {
        output_sink.into_inner().unwrap();
        return;
    }

    // second pass: all the run files are merged at once
    let runs = Vec::from_iter(
        run_paths
            .iter()
            .map(|path| Trap::new(io::BufReader::new(fs::File::open(path).unwrap()).lines())),
    );
    let mut merger = RunMerger::new(runs.len(), Sources::new(runs)).unwrap();
    let merged = merger.merge_into(&mut output_sink).unwrap();

    if let Some(err) = merger.source_mut().take_error() {
        panic!("run reading error: {}", err);
    }
    output_sink.into_inner().unwrap();

    log::info!("{} runs merged (lines: {})", run_paths.len(), merged);
}
