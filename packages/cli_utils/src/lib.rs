#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Shared CLI utilities for the covid map toolchain.
//!
//! [`init_logger`] installs `pretty_env_logger` behind
//! `indicatif-log-bridge`, so log lines are printed above any active
//! spinner instead of tearing it. [`StepSpinner`] shows one pipeline step
//! at a time.

use std::fmt::Display;
use std::time::{Duration, Instant};

use indicatif::{ProgressBar, ProgressStyle};

pub use indicatif::MultiProgress;

/// Log level used when `RUST_LOG` is not set.
const DEFAULT_LEVEL: log::LevelFilter = log::LevelFilter::Info;

/// A spinner for a single pipeline step.
///
/// Finishing consumes the spinner and leaves a one-line result with the
/// elapsed time in place of the animation.
pub struct StepSpinner {
    bar: ProgressBar,
    started: Instant,
}

impl StepSpinner {
    /// Adds a spinner showing `message` to `multi`.
    #[must_use]
    pub fn start(multi: &MultiProgress, message: impl Into<String>) -> Self {
        let bar = multi.add(ProgressBar::new_spinner());
        bar.enable_steady_tick(Duration::from_millis(100));
        bar.set_style(
            ProgressStyle::with_template("{spinner:.cyan} {msg} [{elapsed}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        bar.set_message(message.into());

        Self {
            bar,
            started: Instant::now(),
        }
    }

    /// Stops the spinner and marks the step done.
    pub fn succeed(self, message: impl Display) {
        let elapsed = self.started.elapsed().as_secs_f64();
        self.finish(format!("done  {message} ({elapsed:.1}s)"));
    }

    /// Stops the spinner and marks the step failed.
    pub fn fail(self, message: impl Display) {
        self.finish(format!("FAIL  {message}"));
    }

    fn finish(self, line: String) {
        self.bar.set_style(
            ProgressStyle::with_template("{msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        self.bar.finish_with_message(line);
    }
}

/// Runs `step` under a spinner and reports its outcome.
///
/// `describe` turns the successful result into the summary line.
///
/// # Errors
///
/// Returns whatever error `step` returns, after marking the spinner failed.
pub fn with_spinner<T, E: Display>(
    multi: &MultiProgress,
    message: &str,
    step: impl FnOnce() -> Result<T, E>,
    describe: impl FnOnce(&T) -> String,
) -> Result<T, E> {
    let spinner = StepSpinner::start(multi, message);
    match step() {
        Ok(value) => {
            spinner.succeed(describe(&value));
            Ok(value)
        }
        Err(e) => {
            spinner.fail(format!("{message}: {e}"));
            Err(e)
        }
    }
}

/// Initializes the global logger behind `indicatif-log-bridge`.
///
/// Defaults to `info` and honours `RUST_LOG` when set. Returns the
/// [`MultiProgress`] every spinner must be added to.
#[must_use]
pub fn init_logger() -> MultiProgress {
    let multi = MultiProgress::new();

    let logger = pretty_env_logger::formatted_builder()
        .filter_level(DEFAULT_LEVEL)
        .parse_env("RUST_LOG")
        .build();
    let level = logger.filter();

    // A second call (e.g. from tests) keeps the first logger.
    if indicatif_log_bridge::LogWrapper::new(multi.clone(), logger)
        .try_init()
        .is_ok()
    {
        log::set_max_level(level);
    }

    multi
}
