//! Process-wide logging setup for the `lens-undistort` tools.
//!
//! Library code only talks to the `log` facade. Binaries call
//! [`init_logging`] once: by default it installs a stderr logger printing
//! `[elapsed LEVEL module] message`, where `module` drops the
//! `lens_undistort_` crate prefix. Targets from other crates (image codecs,
//! ...) are capped at `warn` so `--verbose` only opens up our own output.
//! With the `tracing` feature and `json = true`, a JSON `tracing` subscriber
//! is installed instead.

use std::io::Write;
use std::sync::OnceLock;
use std::time::Instant;

use log::{LevelFilter, Log, Metadata, Record};

#[cfg(feature = "tracing")]
use tracing_subscriber::fmt::format::FmtSpan;
#[cfg(feature = "tracing")]
use tracing_subscriber::{fmt, EnvFilter};

const OWN_TARGET: &str = "lens_undistort";
const FOREIGN_LEVEL: LevelFilter = LevelFilter::Warn;

/// What the command line asked for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LogOptions {
    /// Debug output for the `lens_undistort*` crates.
    pub verbose: bool,
    /// JSON lines through `tracing` (needs the `tracing` feature).
    pub json: bool,
}

impl LogOptions {
    pub fn level(&self) -> LevelFilter {
        if self.verbose {
            LevelFilter::Debug
        } else {
            LevelFilter::Info
        }
    }
}

struct StderrLogger {
    level: LevelFilter,
    started: Instant,
}

impl StderrLogger {
    fn level_for(&self, target: &str) -> LevelFilter {
        if target.starts_with(OWN_TARGET) {
            self.level
        } else {
            self.level.min(FOREIGN_LEVEL)
        }
    }
}

fn short_target(target: &str) -> &str {
    target
        .strip_prefix("lens_undistort_")
        .or_else(|| target.strip_prefix(OWN_TARGET).map(|t| t.trim_start_matches("::")))
        .filter(|t| !t.is_empty())
        .unwrap_or(target)
}

impl Log for StderrLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        metadata.level() <= self.level_for(metadata.target())
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let mut stderr = std::io::stderr().lock();
        let _ = writeln!(
            stderr,
            "[{:7.3}s {:>5} {}] {}",
            self.started.elapsed().as_secs_f64(),
            record.level(),
            short_target(record.target()),
            record.args()
        );
    }

    fn flush(&self) {}
}

static LOGGER: OnceLock<StderrLogger> = OnceLock::new();

/// Install the stderr logger for `lens_undistort*` targets at `level`.
///
/// Only the first call installs anything; later calls return `Ok(())`.
pub fn init_with_level(level: LevelFilter) -> Result<(), log::SetLoggerError> {
    if LOGGER.get().is_none() {
        let logger = LOGGER.get_or_init(|| StderrLogger {
            level,
            started: Instant::now(),
        });
        log::set_logger(logger)?;
        log::set_max_level(level);
    }
    Ok(())
}

/// Install the logger matching `options`. Errors from a second
/// installation are ignored.
pub fn init_logging(options: LogOptions) {
    #[cfg(feature = "tracing")]
    {
        init_tracing(options.json, options.verbose);
    }
    #[cfg(not(feature = "tracing"))]
    {
        let _ = init_with_level(options.level());
        if options.json {
            log::warn!("JSON logs need the `tracing` feature, using plain stderr logs");
        }
    }
}

/// Default `tracing` filter: `info` everywhere, or `debug` for our crates
/// when `verbose`. `RUST_LOG` overrides both.
#[cfg(feature = "tracing")]
fn default_filter(verbose: bool) -> EnvFilter {
    let directives = if verbose {
        "info,lens_undistort=debug,lens_undistort_core=debug,lens_undistort_recmath=debug"
    } else {
        "info"
    };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives))
}

/// Install a global `tracing` subscriber with span close events.
///
/// Does not bridge `log` records: callers that need them install
/// `tracing_log::LogTracer` themselves.
#[cfg(feature = "tracing")]
pub fn init_tracing(json: bool, verbose: bool) {
    let builder = fmt()
        .with_env_filter(default_filter(verbose))
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr);
    let installed = if json {
        tracing::subscriber::set_global_default(builder.json().flatten_event(true).finish())
    } else {
        tracing::subscriber::set_global_default(
            builder.with_timer(fmt::time::Uptime::default()).finish(),
        )
    };
    if installed.is_err() {
        log::debug!("a tracing subscriber is already installed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repeated_init_keeps_first_level() {
        init_with_level(LevelFilter::Warn).expect("first init");
        init_with_level(LevelFilter::Debug).expect("second init");
        assert_eq!(log::max_level(), LevelFilter::Warn);
    }

    #[test]
    fn foreign_targets_are_capped() {
        let logger = StderrLogger {
            level: LevelFilter::Debug,
            started: Instant::now(),
        };
        assert_eq!(logger.level_for("lens_undistort_recmath::operator"), LevelFilter::Debug);
        assert_eq!(logger.level_for("lens_undistort"), LevelFilter::Debug);
        assert_eq!(logger.level_for("png::decoder"), LevelFilter::Warn);

        let quiet = StderrLogger {
            level: LevelFilter::Error,
            started: Instant::now(),
        };
        assert_eq!(quiet.level_for("png::decoder"), LevelFilter::Error);
    }

    #[test]
    fn targets_lose_crate_prefix() {
        assert_eq!(short_target("lens_undistort_core::undistort"), "core::undistort");
        assert_eq!(short_target("lens_undistort::imageio"), "imageio");
        assert_eq!(short_target("lens_undistort"), "lens_undistort");
        assert_eq!(short_target("png::decoder"), "png::decoder");
    }

    #[test]
    fn verbose_selects_debug() {
        assert_eq!(LogOptions::default().level(), LevelFilter::Info);
        let opts = LogOptions {
            verbose: true,
            json: false,
        };
        assert_eq!(opts.level(), LevelFilter::Debug);
    }
}
