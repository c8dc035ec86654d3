// ModKit - Systemd-Style Logger
// Copyright (C) 2025 Akaere Networks
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Systemd-style logging for the runtime and for plugins
//!
//! The runtime logs through the `log_*!` macros, which write to a single
//! process-wide sink initialised once by the binary (or not at all, in which
//! case every message is dropped). Plugins never touch the sink directly:
//! each one receives a [`PluginLogger`] that prefixes messages with the
//! plugin's display name.

use std::sync::Mutex;
use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Log levels following syslog priority conventions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Emergency = 0,
    Alert = 1,
    Critical = 2,
    Error = 3,
    Warning = 4,
    Notice = 5,
    Info = 6,
    Debug = 7,
}

impl LogLevel {
    /// Convert numeric priority to LogLevel
    pub fn from_priority(priority: u8) -> Self {
        match priority {
            0 => LogLevel::Emergency,
            1 => LogLevel::Alert,
            2 => LogLevel::Critical,
            3 => LogLevel::Error,
            4 => LogLevel::Warning,
            5 => LogLevel::Notice,
            6 => LogLevel::Info,
            7 => LogLevel::Debug,
            _ => LogLevel::Info,
        }
    }

    pub fn priority(self) -> u8 {
        self as u8
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LogLevel::Emergency => "EMERG",
            LogLevel::Alert => "ALERT",
            LogLevel::Critical => "CRIT",
            LogLevel::Error => "ERR",
            LogLevel::Warning => "WARNING",
            LogLevel::Notice => "NOTICE",
            LogLevel::Info => "INFO",
            LogLevel::Debug => "DEBUG",
        }
    }

    /// ANSI color code for terminal output
    pub fn color_code(self) -> &'static str {
        match self {
            LogLevel::Emergency => "\x1b[1;41m",
            LogLevel::Alert => "\x1b[1;91m",
            LogLevel::Critical => "\x1b[1;31m",
            LogLevel::Error => "\x1b[31m",
            LogLevel::Warning => "\x1b[33m",
            LogLevel::Notice => "\x1b[36m",
            LogLevel::Info => "\x1b[32m",
            LogLevel::Debug => "\x1b[37m",
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    /// Minimum log level to output
    pub min_level: LogLevel,
    pub use_colors: bool,
    pub include_timestamp: bool,
    /// Include the emitting module path (journald `CODE_FILE`, terminal suffix)
    pub include_target: bool,
    /// Emit journald structured fields instead of terminal lines
    pub journald_format: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            use_colors: atty::is(atty::Stream::Stderr),
            include_timestamp: true,
            include_target: false,
            journald_format: false,
        }
    }
}

/// Global logger instance
static LOGGER: Mutex<Option<Logger>> = Mutex::new(None);

/// Identifier reported to journald
const SYSLOG_IDENTIFIER: &str = "modkit";

#[derive(Debug)]
pub struct Logger {
    config: LoggerConfig,
    min_level: AtomicU8,
}

impl Logger {
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            min_level: AtomicU8::new(config.min_level.priority()),
            config,
        }
    }

    /// Initialize the global logger
    pub fn init(config: LoggerConfig) -> Result<(), LoggerError> {
        let mut global_logger = LOGGER.lock().map_err(|_| LoggerError::InitError)?;
        if global_logger.is_some() {
            return Err(LoggerError::AlreadyInitialized);
        }
        *global_logger = Some(Self::new(config));
        Ok(())
    }

    pub fn set_min_level(&self, level: LogLevel) {
        self.min_level.store(level.priority(), Ordering::Relaxed);
    }

    pub fn should_log(&self, level: LogLevel) -> bool {
        level.priority() <= self.min_level.load(Ordering::Relaxed)
    }

    pub fn log(&self, level: LogLevel, target: &str, message: &str) {
        if !self.should_log(level) {
            return;
        }

        let timestamp = if self.config.include_timestamp {
            Some(
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_secs(),
            )
        } else {
            None
        };

        let formatted = if self.config.journald_format {
            self.format_journald(level, target, message, timestamp)
        } else {
            self.format_terminal(level, target, message, timestamp)
        };

        eprintln!("{}", formatted);
    }

    fn format_journald(
        &self,
        level: LogLevel,
        target: &str,
        message: &str,
        timestamp: Option<u64>,
    ) -> String {
        let mut output = String::new();

        output.push_str(&format!("PRIORITY={}\n", level.priority()));
        output.push_str(&format!("MESSAGE={}\n", message));

        if self.config.include_target && !target.is_empty() {
            output.push_str(&format!("CODE_FILE={}\n", target));
        }

        if let Some(ts) = timestamp {
            // journald expects microseconds
            output.push_str(&format!("_SOURCE_REALTIME_TIMESTAMP={}\n", ts * 1_000_000));
        }

        output.push_str(&format!("SYSLOG_IDENTIFIER={}\n", SYSLOG_IDENTIFIER));

        output
    }

    fn format_terminal(
        &self,
        level: LogLevel,
        target: &str,
        message: &str,
        timestamp: Option<u64>,
    ) -> String {
        let mut output = String::new();

        if let Some(ts) = timestamp {
            let datetime = chrono::DateTime::from_timestamp(ts as i64, 0)
                .unwrap_or_default()
                .format("%Y-%m-%d %H:%M:%S");
            output.push_str(&format!("{} ", datetime));
        }

        match status_level(message) {
            // Service status lines carry their own tag; only color them
            Some(status) if self.config.use_colors => {
                output.push_str(&format!("{}{}\x1b[0m", status.color_code(), message));
            }
            Some(_) => output.push_str(message),
            None if self.config.use_colors => {
                output.push_str(&format!(
                    "{}[{}]\x1b[0m {}",
                    level.color_code(),
                    level.as_str(),
                    message
                ));
            }
            None => output.push_str(&format!("[{}] {}", level.as_str(), message)),
        }

        if self.config.include_target && !target.is_empty() {
            output.push_str(&format!(" ({})", target));
        }

        output
    }
}

/// Color to use for a systemd-style status line, if `message` is one
fn status_level(message: &str) -> Option<LogLevel> {
    if !message.starts_with('[') {
        return None;
    }
    if message.starts_with("[  FAILED ]") {
        Some(LogLevel::Error)
    } else if message.starts_with("[   WARN ]") {
        Some(LogLevel::Warning)
    } else if message.starts_with("[   OK   ]") {
        Some(LogLevel::Info)
    } else if message.starts_with("[*]") {
        Some(LogLevel::Notice)
    } else {
        None
    }
}

#[macro_export]
macro_rules! log_error {
    ($($arg:tt)*) => {
        $crate::core::logger::log_with_level($crate::core::logger::LogLevel::Error, module_path!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_warn {
    ($($arg:tt)*) => {
        $crate::core::logger::log_with_level($crate::core::logger::LogLevel::Warning, module_path!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_notice {
    ($($arg:tt)*) => {
        $crate::core::logger::log_with_level($crate::core::logger::LogLevel::Notice, module_path!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_info {
    ($($arg:tt)*) => {
        $crate::core::logger::log_with_level($crate::core::logger::LogLevel::Info, module_path!(), &format!($($arg)*))
    };
}

#[macro_export]
macro_rules! log_debug {
    ($($arg:tt)*) => {
        $crate::core::logger::log_with_level($crate::core::logger::LogLevel::Debug, module_path!(), &format!($($arg)*))
    };
}

/// Write to the global sink; a no-op until [`Logger::init`] has run
pub fn log_with_level(level: LogLevel, target: &str, message: &str) {
    if let Ok(logger_guard) = LOGGER.lock() {
        if let Some(ref logger) = *logger_guard {
            logger.log(level, target, message);
        }
    }
}

pub fn log_init_start(service_name: &str) {
    let message = format!("[*] Starting {}...", service_name);
    log_with_level(LogLevel::Notice, module_path!(), &message);
}

pub fn log_init_ok_with_details(service_name: &str, details: &str) {
    let message = format!("[   OK   ] Starting {} ({})", service_name, details);
    log_with_level(LogLevel::Info, module_path!(), &message);
}

pub fn log_init_failed(service_name: &str, error: &str) {
    let message = format!("[  FAILED ] Starting {} - {}", service_name, error);
    log_with_level(LogLevel::Error, module_path!(), &message);
}

pub fn log_init_warn(service_name: &str, warning: &str) {
    let message = format!("[   WARN ] Starting {} - {}", service_name, warning);
    log_with_level(LogLevel::Warning, module_path!(), &message);
}

/// Logger handed to a single plugin, scoped by its display name
#[derive(Debug, Clone)]
pub struct PluginLogger {
    scope: String,
}

impl PluginLogger {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
        }
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Prefix `message` with the plugin scope
    pub fn format(&self, message: &str) -> String {
        format!("[{}] {}", self.scope, message)
    }

    pub fn log(&self, message: &str) {
        self.emit(LogLevel::Notice, message);
    }

    pub fn info(&self, message: &str) {
        self.emit(LogLevel::Info, message);
    }

    pub fn warn(&self, message: &str) {
        self.emit(LogLevel::Warning, message);
    }

    pub fn debug(&self, message: &str) {
        self.emit(LogLevel::Debug, message);
    }

    /// Log an error, optionally with the underlying cause
    pub fn error(&self, message: &str, cause: Option<&str>) {
        match cause {
            Some(cause) => self.emit(LogLevel::Error, &format!("{}: {}", message, cause)),
            None => self.emit(LogLevel::Error, message),
        }
    }

    fn emit(&self, level: LogLevel, message: &str) {
        log_with_level(level, "plugin", &self.format(message));
    }
}

/// Logger initialization errors
#[derive(Debug, thiserror::Error)]
pub enum LoggerError {
    #[error("Logger already initialized")]
    AlreadyInitialized,
    #[error("Failed to initialize logger")]
    InitError,
}

/// Initialize logger from CLI arguments
pub fn init_from_args(debug: bool, journald: bool) -> Result<(), LoggerError> {
    let min_level = if debug { LogLevel::Debug } else { LogLevel::Info };

    let config = LoggerConfig {
        min_level,
        use_colors: atty::is(atty::Stream::Stderr) && !journald,
        include_timestamp: !journald,
        include_target: debug,
        journald_format: journald,
    };

    Logger::init(config)
}
