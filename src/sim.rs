//! Run, benchmark, and stress-sweep drivers behind the CLI.

use std::sync::Arc;

use anyhow::Context;

use crate::config::PipelineConfig;
use crate::pipeline::{self, Observer, Outcome, PipelineContext};
use crate::render::BoardObserver;
use crate::report::{self, Report, cpu_times_seconds};
use crate::timing::{DelayRange, DelaySource, FixedDelays, RandomDelays};

const CSV_HEADER: &str = "capacity,ceiling,producers,consumers,admitted,rejected,completed,saturation_min_ms,saturation_max_ms,high_water,elapsed_ms,cpu_user_s,cpu_sys_s,violations";

/// Millisecond-scale timings so a benchmark finishes in well under a second.
pub fn bench_config() -> PipelineConfig {
    PipelineConfig::default()
        .with_ceiling(200)
        .with_arrival(DelayRange::millis(1, 5))
        .with_processing(DelayRange::millis(5, 10))
}

/// How a single run should be presented.
#[derive(Clone, Copy, Debug, Default)]
pub struct RunOptions {
    pub board: bool,
    pub json: bool,
    /// Always take the shortest delay and cycle labels in order.
    pub deterministic: bool,
}

fn delay_source(deterministic: bool) -> Arc<dyn DelaySource> {
    if deterministic {
        Arc::new(FixedDelays::new())
    } else {
        Arc::new(RandomDelays)
    }
}

fn execute(
    config: PipelineConfig,
    delays: Arc<dyn DelaySource>,
    observer: Option<Arc<dyn Observer>>,
) -> anyhow::Result<(Outcome, Report)> {
    config.validate().context("invalid pipeline configuration")?;
    let mut ctx = PipelineContext::new(config, delays);
    if let Some(observer) = observer {
        ctx = ctx.with_observer(observer);
    }

    let cpu_start = cpu_times_seconds();
    let outcome = pipeline::run(Arc::new(ctx))?;
    let cpu = match (cpu_start, cpu_times_seconds()) {
        (Some((user_start, sys_start)), Some((user_end, sys_end))) => {
            Some((user_end - user_start, sys_end - sys_start))
        }
        _ => None,
    };
    let report = Report::new(&outcome, cpu);
    Ok((outcome, report))
}

/// Run one simulation and print the final statistics.
pub fn run_simulation(config: PipelineConfig, options: RunOptions) -> anyhow::Result<()> {
    let observer = options
        .board
        .then(|| Arc::new(BoardObserver::new(config.consumers)) as Arc<dyn Observer>);
    let (outcome, report) = execute(config, delay_source(options.deterministic), observer)?;

    for violation in report::validate(&outcome) {
        log::warn!("[PIPELINE] invariant violated: {violation}");
    }
    if options.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}

fn csv_row(report: &Report, violations: usize) -> String {
    let cpu_user = report
        .cpu_user_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    let cpu_sys = report
        .cpu_sys_s
        .map(|v| format!("{v:.4}"))
        .unwrap_or_else(|| "NA".to_string());
    format!(
        "{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
        report.config.capacity,
        report.config.ceiling,
        report.config.producers,
        report.config.consumers,
        report.admitted,
        report.rejected,
        report.completed,
        report.saturation_min_ms,
        report.saturation_max_ms,
        report.high_water,
        report.elapsed_ms,
        cpu_user,
        cpu_sys,
        violations
    )
}

fn measure(config: PipelineConfig, deterministic: bool, validate: bool) -> anyhow::Result<String> {
    let (outcome, report) = execute(config, delay_source(deterministic), None)?;
    let violations = if validate {
        let found = report::validate(&outcome);
        for violation in &found {
            eprintln!("# violation,{violation}");
        }
        found.len()
    } else {
        0
    };
    if outcome.leftover > 0 {
        eprintln!("# warning,leftover_items,{}", outcome.leftover);
    }
    Ok(csv_row(&report, violations))
}

/// Run a single configuration and print one CSV row.
pub fn run_benchmark(
    config: PipelineConfig,
    deterministic: bool,
    validate: bool,
) -> anyhow::Result<()> {
    let row = measure(config, deterministic, validate)?;
    println!("{CSV_HEADER}");
    println!("{row}");
    Ok(())
}

/// Sweep capacity / producer / consumer combinations and print CSV output.
pub fn run_stress(
    base: PipelineConfig,
    capacities: &[usize],
    producer_sets: &[usize],
    consumer_sets: &[usize],
    validate: bool,
) -> anyhow::Result<()> {
    if capacities.is_empty() || producer_sets.is_empty() || consumer_sets.is_empty() {
        anyhow::bail!("stress sets must not be empty");
    }

    println!("{CSV_HEADER}");
    for &capacity in capacities {
        for &producers in producer_sets {
            for &consumers in consumer_sets {
                let config = base
                    .clone()
                    .with_capacity(capacity)
                    .with_producers(producers)
                    .with_consumers(consumers);
                println!("{}", measure(config, false, validate)?);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csv_row_matches_header_width() {
        let config = bench_config().with_ceiling(12);
        let (_, report) = execute(config, delay_source(true), None).expect("bench run failed");
        let row = csv_row(&report, 0);
        assert_eq!(
            row.split(',').count(),
            CSV_HEADER.split(',').count(),
            "row: {row}"
        );
        assert!(row.starts_with("5,12,3,4,"));
    }

    #[test]
    fn invalid_config_is_reported_not_run() {
        let err =
            execute(bench_config().with_consumers(0), delay_source(false), None).unwrap_err();
        assert!(format!("{err:#}").contains("consumer count must be > 0"));
    }

    #[test]
    fn stress_rejects_empty_sets() {
        assert!(run_stress(bench_config(), &[], &[1], &[1], false).is_err());
    }
}
