mod buffer;
mod completions;
mod config;
mod consumer;
mod error;
mod logging;
mod pipeline;
mod producer;
mod rejections;
mod render;
mod report;
mod sim;
mod termination;
mod timing;
mod types;

use clap::{Args, Parser, Subcommand};

use crate::config::PipelineConfig;
use crate::timing::DelayRange;

#[derive(Parser)]
#[command(name = "loadshed_sim")]
#[command(about = "Bounded producer/consumer pipeline that sheds load when full")]
#[command(version)]
struct Cli {
    /// Raise log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Lower log verbosity (repeatable)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    quiet: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one simulation and print final statistics (default)
    Run {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Print the buffer/ledger board after every event
        #[arg(long)]
        board: bool,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,

        /// Use the shortest delay every time and cycle labels in order
        #[arg(long)]
        deterministic: bool,
    },

    /// Run one fast configuration and print a CSV row
    Bench {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Check pipeline invariants after the run
        #[arg(long)]
        validate: bool,

        /// Use the shortest delay every time and cycle labels in order
        #[arg(long)]
        deterministic: bool,
    },

    /// Sweep capacity/producer/consumer sets and print CSV rows
    Stress {
        #[command(flatten)]
        pipeline: PipelineArgs,

        /// Buffer capacities to try (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "1,2,5")]
        capacities: Vec<usize>,

        /// Producer counts to try (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "1,3,6")]
        producer_sets: Vec<usize>,

        /// Consumer counts to try (comma-separated)
        #[arg(long, value_delimiter = ',', default_value = "1,4")]
        consumer_sets: Vec<usize>,

        /// Check pipeline invariants after every run
        #[arg(long)]
        validate: bool,
    },
}

/// Overrides on top of a base configuration; unset flags keep the base.
#[derive(Args)]
struct PipelineArgs {
    /// Buffer capacity
    #[arg(long)]
    capacity: Option<usize>,

    /// Total identifiers issued before shutdown
    #[arg(long)]
    ceiling: Option<u64>,

    #[arg(long)]
    producers: Option<usize>,

    #[arg(long)]
    consumers: Option<usize>,

    /// Minimum pause between items per producer (ms)
    #[arg(long)]
    arrival_min_ms: Option<u64>,

    /// Maximum pause between items per producer (ms)
    #[arg(long)]
    arrival_max_ms: Option<u64>,

    /// Minimum processing time per item (ms)
    #[arg(long)]
    processing_min_ms: Option<u64>,

    /// Maximum processing time per item (ms)
    #[arg(long)]
    processing_max_ms: Option<u64>,

    /// Label menu (comma-separated)
    #[arg(long, value_delimiter = ',')]
    labels: Option<Vec<String>>,
}

impl PipelineArgs {
    fn apply(self, mut config: PipelineConfig) -> PipelineConfig {
        if let Some(capacity) = self.capacity {
            config = config.with_capacity(capacity);
        }
        if let Some(ceiling) = self.ceiling {
            config = config.with_ceiling(ceiling);
        }
        if let Some(producers) = self.producers {
            config = config.with_producers(producers);
        }
        if let Some(consumers) = self.consumers {
            config = config.with_consumers(consumers);
        }
        let arrival = DelayRange::millis(
            self.arrival_min_ms.unwrap_or(config.arrival.min_ms),
            self.arrival_max_ms.unwrap_or(config.arrival.max_ms),
        );
        let processing = DelayRange::millis(
            self.processing_min_ms.unwrap_or(config.processing.min_ms),
            self.processing_max_ms.unwrap_or(config.processing.max_ms),
        );
        config = config.with_arrival(arrival).with_processing(processing);
        if let Some(labels) = self.labels {
            config = config.with_labels(labels);
        }
        config
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let verbosity = i16::from(cli.verbose) - i16::from(cli.quiet);
    logging::init(logging::level_for(verbosity));

    match cli.command {
        Some(Commands::Run {
            pipeline,
            board,
            json,
            deterministic,
        }) => {
            let config = pipeline.apply(PipelineConfig::default());
            sim::run_simulation(
                config,
                sim::RunOptions {
                    board,
                    json,
                    deterministic,
                },
            )
        }
        None => sim::run_simulation(PipelineConfig::default(), sim::RunOptions::default()),
        Some(Commands::Bench {
            pipeline,
            validate,
            deterministic,
        }) => {
            let config = pipeline.apply(sim::bench_config());
            sim::run_benchmark(config, deterministic, validate)
        }
        Some(Commands::Stress {
            pipeline,
            capacities,
            producer_sets,
            consumer_sets,
            validate,
        }) => {
            let base = pipeline.apply(sim::bench_config());
            sim::run_stress(base, &capacities, &producer_sets, &consumer_sets, validate)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_args(argv: &[&str]) -> PipelineArgs {
        match Cli::try_parse_from(argv).expect("arguments should parse").command {
            Some(Commands::Run { pipeline, .. }) => pipeline,
            _ => panic!("expected the run subcommand"),
        }
    }

    #[test]
    fn partial_delay_flags_keep_the_other_bound() {
        let config = run_args(&["loadshed_sim", "run", "--arrival-min-ms", "7"])
            .apply(PipelineConfig::default());
        let base = PipelineConfig::default();
        assert_eq!(config.arrival, DelayRange::millis(7, base.arrival.max_ms));
        assert_eq!(config.processing, base.processing);
    }

    #[test]
    fn every_override_lands_in_the_config() {
        let config = run_args(&[
            "loadshed_sim",
            "run",
            "--capacity",
            "2",
            "--ceiling",
            "9",
            "--producers",
            "1",
            "--consumers",
            "3",
            "--processing-min-ms",
            "4",
            "--processing-max-ms",
            "6",
            "--labels",
            "tea,toast",
        ])
        .apply(PipelineConfig::default());
        assert_eq!(config.capacity, 2);
        assert_eq!(config.ceiling, 9);
        assert_eq!(config.producers, 1);
        assert_eq!(config.consumers, 3);
        assert_eq!(config.processing, DelayRange::millis(4, 6));
        assert_eq!(config.labels, vec!["tea".to_string(), "toast".to_string()]);
    }

    #[test]
    fn many_verbosity_flags_do_not_overflow() {
        let quiet = format!("-{}", "q".repeat(200));
        let cli =
            Cli::try_parse_from(["loadshed_sim", quiet.as_str()]).expect("flags should parse");
        let verbosity = i16::from(cli.verbose) - i16::from(cli.quiet);
        assert_eq!(logging::level_for(verbosity), log::LevelFilter::Off);
    }
}
