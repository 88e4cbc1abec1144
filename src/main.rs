use std::io;
use std::path;
use std::process;

use clap::ArgEnum;
use env_logger;
use log;

use runsort::metrics::TrackedFile;
use runsort::rebuild::rebuild_archive;
use runsort::{ExternalSorterBuilder, Phase, PhaseTimer, DEFAULT_MAX_OPEN_RUNS};

fn main() {
    let arg_parser = build_arg_parser();

    let log_level: LogLevel = arg_parser.value_of_t_or_exit("log_level");
    init_logger(log_level);

    let batch_size: usize = arg_parser.value_of_t_or_exit("batch_size");
    let max_open_runs: usize = arg_parser.value_of_t_or_exit("max_open_runs");
    let tmp_dir: Option<&str> = arg_parser.value_of("tmp_dir");

    let input = path::Path::new(arg_parser.value_of("input").expect("value is required"));
    let sorted = path::Path::new(arg_parser.value_of("sorted").expect("value has a default"));
    let output = path::Path::new(arg_parser.value_of("output").expect("value is required"));

    let mut sorter_builder = ExternalSorterBuilder::new(batch_size).with_max_open_runs(max_open_runs);
    if let Some(tmp_dir) = tmp_dir {
        sorter_builder = sorter_builder.with_tmp_dir(path::Path::new(tmp_dir));
    }

    let sorter = match sorter_builder.build() {
        Ok(sorter) => sorter,
        Err(err) => {
            log::error!("sorter initialization error: {}", err);
            process::exit(1);
        }
    };

    // the input descriptor counts against the same registry as the runs
    let input_stream = match TrackedFile::open(input, sorter.metrics()) {
        Ok(file) => io::BufReader::new(file),
        Err(err) => {
            log::error!("input file opening error: {}", err);
            process::exit(1);
        }
    };

    let summary = match sorter.sort(input_stream, sorted) {
        Ok(summary) => summary,
        Err(err) => {
            log::error!("data sorting error: {}", err);
            process::exit(1);
        }
    };
    log::info!(
        "sorted {} records ({} initial runs, {} reducing passes)",
        summary.records,
        summary.initial_runs,
        summary.merge_passes
    );

    let timer = PhaseTimer::start(Phase::Rebuild);
    if let Err(err) = rebuild_archive(sorted, output, sorter.metrics()) {
        log::error!("archive reconstruction error: {}", err);
        process::exit(1);
    }
    timer.stop();

    sorter.metrics().report();
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

fn build_arg_parser() -> clap::ArgMatches {
    clap::App::new("runsort")
        .about("external merge sort for fixed-size binary records")
        .arg(
            clap::Arg::new("input")
                .short('i')
                .long("input")
                .help("record file to be sorted")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("output")
                .short('o')
                .long("output")
                .help("reconstructed archive file")
                .required(true)
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("sorted")
                .short('s')
                .long("sorted")
                .help("sorted record file")
                .takes_value(true)
                .default_value("sorted.bin"),
        )
        .arg(
            clap::Arg::new("batch_size")
                .short('b')
                .long("batch-size")
                .help("records held in memory per batch")
                .required(true)
                .takes_value(true)
                .validator(|v| match v.parse::<usize>() {
                    Ok(n) if n > 0 => Ok(()),
                    Ok(_) => Err("batch size must be positive".to_string()),
                    Err(err) => Err(format!("batch size format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("max_open_runs")
                .short('m')
                .long("max-open-runs")
                .help("run files a single merge may hold open")
                .takes_value(true)
                .default_value(DEFAULT_MAX_OPEN_RUNS_STR)
                .validator(|v| match v.parse::<usize>() {
                    Ok(n) if n >= 2 => Ok(()),
                    Ok(_) => Err("descriptor budget must be at least 2".to_string()),
                    Err(err) => Err(format!("descriptor budget format incorrect: {}", err)),
                }),
        )
        .arg(
            clap::Arg::new("tmp_dir")
                .short('d')
                .long("tmp-dir")
                .help("directory to be used to store temporary run files")
                .takes_value(true),
        )
        .arg(
            clap::Arg::new("log_level")
                .short('l')
                .long("loglevel")
                .help("logging level")
                .takes_value(true)
                .default_value("info")
                .possible_values(LogLevel::possible_values()),
        )
        .get_matches()
}

// clap 3 wants a &'static str default value
const DEFAULT_MAX_OPEN_RUNS_STR: &str = "500";
const _: [(); DEFAULT_MAX_OPEN_RUNS] = [(); 500];

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
