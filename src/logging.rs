use std::io::Write;
use std::thread;
use std::time::{SystemTime, UNIX_EPOCH};

use log::LevelFilter;

/// Level used when neither flags nor `RUST_LOG` say otherwise.
fn default_level() -> LevelFilter {
    if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Warn
    }
}

/// Shift the default level by `-v` (positive) or `-q` (negative) counts.
pub fn level_for(verbosity: i16) -> LevelFilter {
    const LEVELS: [LevelFilter; 6] = [
        LevelFilter::Off,
        LevelFilter::Error,
        LevelFilter::Warn,
        LevelFilter::Info,
        LevelFilter::Debug,
        LevelFilter::Trace,
    ];
    let base = default_level() as i16;
    let index = base.saturating_add(verbosity).clamp(0, LEVELS.len() as i16 - 1);
    LEVELS[index as usize]
}

fn millis_since_epoch() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

/// Install the global logger; `RUST_LOG` still overrides `level`.
pub fn init(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level)
        .parse_default_env()
        .format(|buf, record| {
            let current = thread::current();
            let thread_name = current.name().unwrap_or("unnamed");
            writeln!(
                buf,
                "[{}ms][{thread_name}] {}",
                millis_since_epoch(),
                record.args()
            )
        });
    // A second init (e.g. from tests) keeps the first logger.
    let _ = builder.try_init();
}
