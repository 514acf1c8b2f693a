//! Utilities for configuring logging
//!
//! Diagnostics are grouped by log target, one per category of events:
//!
//! | target       | events                                                 |
//! |--------------|--------------------------------------------------------|
//! | `rpk`        | RPK manifest parsing and resource loading              |
//! | `change`     | cartridge insertion and removal                        |
//! | `illwrite`   | writes to read-only memory (enabled by default)        |
//! | `config`     | connector and switch configuration changes             |
//! | `read`       | ROM/RAM reads of the cartridge boards                  |
//! | `write`      | ROM/RAM writes of the cartridge boards                 |
//! | `grom`       | GROM address and data accesses                         |
//! | `gkracker`   | GRAM Kracker specific accesses                         |
//! | `cru`        | CRU accesses                                           |
//! | `bankswitch` | bank switching                                         |
//!
//! Categories are enabled at run time with the `GROMPORT_LOG` environment variable, using the
//! env_logger filter syntax, e.g. `GROMPORT_LOG="warn,bankswitch=trace,cru=debug"`.
use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::Once;

use colored::*;
use env_logger::Logger;
use log::LevelFilter;
use log::Log;
use log::Record;

static ONCE_INIT: Once = Once::new();

static TRACE_CONTEXT_LINES: usize = 20;

const LOG_ENV_VAR: &str = "GROMPORT_LOG";

/// A logger implementation that uses env_logger for configuring filters and implements a
/// custom logging format.
///
/// Trace records are kept in a ring buffer. When a higher log level record is logged, the
/// previous trace logs are printed to provide context.
struct GromPortLogger {
    /// Contains the last `TRACE_CONTEXT_LINES` of trace-level logs.
    trace_logs: Mutex<VecDeque<String>>,
    logger: Logger,
}

impl GromPortLogger {
    pub fn new(logger: Logger) -> Self {
        log::set_max_level(logger.filter());
        Self {
            trace_logs: Mutex::new(VecDeque::new()),
            logger,
        }
    }

    fn format_record(&self, record: &Record) -> String {
        let target = format!("[{}]", record.target());
        match record.level() {
            log::Level::Error => format!(
                "{} {} {}",
                "E".red().bold(),
                target.dimmed(),
                record.args().to_string().red()
            ),
            log::Level::Warn => format!(
                "{} {} {}",
                "W".yellow().bold(),
                target.dimmed(),
                record.args().to_string().yellow()
            ),
            log::Level::Info => format!(
                "{} {} {}",
                "I".blue().bold(),
                target.dimmed(),
                record.args().to_string().normal()
            ),
            log::Level::Debug => format!(
                "{} {} {}",
                "D".blue(),
                target.dimmed(),
                record.args().to_string().normal()
            ),
            log::Level::Trace => format!("{} {}", target, record.args()).dimmed().to_string(),
        }
    }
}

impl Log for GromPortLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.logger.enabled(metadata)
    }

    fn log(&self, record: &Record) {
        if !self.logger.matches(record) {
            return;
        }
        let record_str = self.format_record(record);
        let mut trace_logs = self
            .trace_logs
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if record.level() == LevelFilter::Trace {
            trace_logs.push_front(record_str);
            trace_logs.truncate(TRACE_CONTEXT_LINES);
        } else {
            if !trace_logs.is_empty() {
                if trace_logs.len() == TRACE_CONTEXT_LINES {
                    println!("{}", "...".dimmed());
                }
                for log in trace_logs.drain(0..).rev() {
                    println!("{}", log);
                }
            }
            println!("{}", record_str);
        }
    }

    fn flush(&self) {}
}

fn install(filter_config: &str) {
    let filter = env_logger::builder().parse_filters(filter_config).build();
    if let Err(err) = log::set_boxed_logger(Box::new(GromPortLogger::new(filter))) {
        eprintln!("Cannot install logger: {err}");
    }
}

/// Installs the logger. Without `GROMPORT_LOG` only warnings (illegal writes) and errors are
/// shown.
pub fn init() {
    ONCE_INIT.call_once(|| {
        let filter_config = std::env::var(LOG_ENV_VAR).unwrap_or("warn".to_string());
        install(&filter_config);
    });
}

pub fn test_init(verbose: bool) {
    ONCE_INIT.call_once(|| {
        let filter_config = std::env::var(LOG_ENV_VAR).unwrap_or(
            if verbose {
                "debug,bankswitch=trace,grom=trace"
            } else {
                "warn"
            }
            .to_string(),
        );
        install(&filter_config);
    });
}
