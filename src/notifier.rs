//! Progress output and logging.
//!
//! [`Notifier`] wraps `env_logger` (text logs on stderr) and `indicatif` (a spinner)
//! under a single verbosity switch:
//! - [`VerbosityLevel::Quiet`] → warnings only; long-running steps show a live spinner.
//! - [`VerbosityLevel::Info`]/[`VerbosityLevel::Debug`]/[`VerbosityLevel::Trace`] → standard
//!   logs, including every external command at debug level.
//!
//! Step lines (`==> ...`) and detail lines are user-facing progress and always go
//! to stdout, printed above the spinner when one is active.

use env_logger::{Builder, DEFAULT_FILTER_ENV, DEFAULT_WRITE_STYLE_ENV};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::RefCell;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum VerbosityLevel {
    Quiet = 0, // Spinner, warnings only
    Info = 1,  // Text logs at info level
    Debug = 2, // Text logs at debug level
    Trace = 3, // Text logs at trace level
}

impl From<u8> for VerbosityLevel {
    fn from(level: u8) -> Self {
        match level {
            0 => VerbosityLevel::Quiet,
            1 => VerbosityLevel::Info,
            2 => VerbosityLevel::Debug,
            _ => VerbosityLevel::Trace,
        }
    }
}

impl VerbosityLevel {
    pub fn to_log_level(self) -> LevelFilter {
        match self {
            VerbosityLevel::Quiet => LevelFilter::Warn,
            VerbosityLevel::Info => LevelFilter::Info,
            VerbosityLevel::Debug => LevelFilter::Debug,
            VerbosityLevel::Trace => LevelFilter::Trace,
        }
    }
}

/// `RUST_LOG` directives, when set and non-empty.
pub fn env_filters() -> Option<String> {
    std::env::var(DEFAULT_FILTER_ENV)
        .ok()
        .filter(|filters| !filters.trim().is_empty())
}

/// Logger builder: explicit `filters` win over the verbosity flag.
pub fn log_builder(verbosity: VerbosityLevel, filters: Option<&str>) -> Builder {
    let mut builder = Builder::new();
    if let Ok(style) = std::env::var(DEFAULT_WRITE_STYLE_ENV) {
        builder.parse_write_style(&style);
    }
    match filters {
        Some(filters) => builder.parse_filters(filters),
        None => builder.filter_level(verbosity.to_log_level()),
    };
    builder
}

pub struct Notifier {
    verbosity: VerbosityLevel,
    logger: env_logger::Logger,
    multi_progress: Option<MultiProgress>,
    active_spinner: RefCell<Option<ProgressBar>>,
    silent: bool,
}

impl Notifier {
    pub fn new(verbosity_level: u8) -> Self {
        Self::build(VerbosityLevel::from(verbosity_level), false)
    }

    /// A notifier that prints nothing to stdout, for library callers and tests.
    pub fn silent() -> Self {
        Self::build(VerbosityLevel::Quiet, true)
    }

    fn build(verbosity: VerbosityLevel, silent: bool) -> Self {
        let logger = log_builder(verbosity, env_filters().as_deref()).build();

        let multi_progress = if verbosity == VerbosityLevel::Quiet && !silent {
            Some(MultiProgress::new())
        } else {
            None
        };

        Self {
            verbosity,
            logger,
            multi_progress,
            active_spinner: RefCell::new(None),
            silent,
        }
    }

    pub fn is_verbose(&self) -> bool {
        self.verbosity != VerbosityLevel::Quiet
    }

    /// Headline progress line: `==> message`.
    pub fn step(&self, message: &str) {
        self.println(&format!("==> {}", message));
    }

    /// Indented progress line under the current step.
    pub fn detail(&self, message: &str) {
        self.println(&format!("  {}", message));
    }

    /// Raw stdout line, kept above the spinner.
    pub fn println(&self, line: &str) {
        if self.silent {
            return;
        }
        match &self.multi_progress {
            Some(multi_progress) => multi_progress.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }
    }

    /// Raw stderr line, kept above the spinner.
    pub fn eprintln(&self, line: &str) {
        if self.silent {
            return;
        }
        match &self.multi_progress {
            Some(multi_progress) => multi_progress.suspend(|| eprintln!("{}", line)),
            None => eprintln!("{}", line),
        }
    }

    /// Show `message` next to a spinner until [`Notifier::finish_activity`] (Quiet mode only).
    pub fn activity(&self, message: &str) {
        let Some(multi_progress) = &self.multi_progress else {
            self.info(message);
            return;
        };

        if self.active_spinner.borrow().is_none() {
            let spinner = multi_progress.add(ProgressBar::new_spinner());
            if let Ok(style) = ProgressStyle::default_spinner().template("{spinner:.green} {msg}") {
                spinner.set_style(style);
            }
            spinner.enable_steady_tick(Duration::from_millis(100));
            *self.active_spinner.borrow_mut() = Some(spinner);
        }

        if let Some(spinner) = self.active_spinner.borrow().as_ref() {
            spinner.set_message(message.to_string());
        }
    }

    pub fn finish_activity(&self) {
        if let Some(spinner) = self.active_spinner.borrow_mut().take() {
            spinner.finish_and_clear();
        }
    }

    pub fn info(&self, message: &str) {
        self.log(Level::Info, message);
    }

    pub fn debug(&self, message: &str) {
        self.log(Level::Debug, message);
    }

    pub fn warn(&self, message: &str) {
        self.log(Level::Warn, message);
    }

    fn log(&self, level: Level, message: &str) {
        let metadata = Metadata::builder()
            .level(level)
            .target(module_path!())
            .build();
        if !self.logger.enabled(&metadata) {
            return;
        }

        let emit = || {
            self.logger.log(
                &Record::builder()
                    .args(format_args!("{}", message))
                    .metadata(metadata.clone())
                    .build(),
            )
        };
        match &self.multi_progress {
            Some(multi_progress) => multi_progress.suspend(emit),
            None => emit(),
        }
    }
}

impl Drop for Notifier {
    fn drop(&mut self) {
        self.finish_activity();
    }
}
