use chrono::{DateTime, Utc};
use colored::*;
use log::{Level, Metadata, Record};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::config::VertexConfig;

static PLUGIN_LOGGER: Lazy<PluginLogger> = Lazy::new(PluginLogger::new);

// Provider URLs carry the API key as a query parameter.
static KEY_PARAM: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([?&]key=)[^&\s]+").expect("key pattern is valid"));

pub fn init() -> Result<(), String> {
    init_with_config(LoggerConfig::default())
}

pub fn init_with_config(config: LoggerConfig) -> Result<(), String> {
    let max_level = config.min_level.to_level_filter();
    PLUGIN_LOGGER.update_config(config);

    log::set_logger(&*PLUGIN_LOGGER).map_err(|e| format!("Failed to set logger: {:?}", e))?;
    log::set_max_level(max_level);
    Ok(())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn color(&self) -> Color {
        match self {
            LogLevel::Trace => Color::Cyan,
            LogLevel::Debug => Color::Blue,
            LogLevel::Info => Color::Green,
            LogLevel::Warn => Color::Yellow,
            LogLevel::Error => Color::Red,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "TRACE",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warn => "WARN",
            LogLevel::Error => "ERROR",
        }
    }

    pub fn to_level_filter(&self) -> log::LevelFilter {
        match self {
            LogLevel::Trace => log::LevelFilter::Trace,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Error => log::LevelFilter::Error,
        }
    }

    fn enables(&self, level: Level) -> bool {
        level <= self.to_level_filter()
    }
}

impl From<Level> for LogLevel {
    fn from(level: Level) -> Self {
        match level {
            Level::Trace => LogLevel::Trace,
            Level::Debug => LogLevel::Debug,
            Level::Info => LogLevel::Info,
            Level::Warn => LogLevel::Warn,
            Level::Error => LogLevel::Error,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub level: LogLevel,
    pub target: String,
    pub message: String,
    pub location: Option<String>,
}

#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub min_level: LogLevel,
    pub show_colors: bool,
    pub show_location: bool,
    pub timestamp_format: String,
    pub output_json: bool,
    pub log_file_path: Option<String>,
    pub prefix: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: true,
            show_location: false,
            timestamp_format: "%Y-%m-%d %H:%M:%S%.3f".to_string(),
            output_json: false,
            log_file_path: None,
            prefix: Some("vertexgen".to_string()),
        }
    }
}

impl LoggerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_level(mut self, level: LogLevel) -> Self {
        self.min_level = level;
        self
    }

    pub fn with_colors(mut self, enabled: bool) -> Self {
        self.show_colors = enabled;
        self
    }

    pub fn with_file_output(mut self, path: &str) -> Self {
        self.log_file_path = Some(path.to_string());
        self
    }

    pub fn with_json_output(mut self, enabled: bool) -> Self {
        self.output_json = enabled;
        self
    }

    pub fn production() -> Self {
        Self {
            min_level: LogLevel::Info,
            show_colors: false,
            output_json: true,
            log_file_path: Some("vertexgen.log".to_string()),
            ..Default::default()
        }
    }

    pub fn development() -> Self {
        Self {
            min_level: LogLevel::Debug,
            show_colors: true,
            show_location: true,
            ..Default::default()
        }
    }
}

pub struct PluginLogger {
    config: Mutex<LoggerConfig>,
    log_file: Mutex<Option<File>>,
}

impl PluginLogger {
    fn new() -> Self {
        Self {
            config: Mutex::new(LoggerConfig::default()),
            log_file: Mutex::new(None),
        }
    }

    fn update_config(&self, new_config: LoggerConfig) {
        let file = new_config.log_file_path.as_ref().and_then(|path| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .ok()
        });
        if let Ok(mut log_file) = self.log_file.lock() {
            *log_file = file;
        }
        if let Ok(mut config) = self.config.lock() {
            *config = new_config;
        }
    }

    fn entry(record: &Record) -> LogEntry {
        LogEntry {
            timestamp: Utc::now(),
            level: record.level().into(),
            target: record.target().to_string(),
            message: redact_secrets(&record.args().to_string()),
            location: record
                .file()
                .map(|file| format!("{}:{}", file, record.line().unwrap_or(0))),
        }
    }
}

/// Mask API keys embedded in URLs.
pub fn redact_secrets(message: &str) -> String {
    KEY_PARAM.replace_all(message, "${1}***").into_owned()
}

pub fn format_entry(entry: &LogEntry, config: &LoggerConfig) -> String {
    if config.output_json {
        return serde_json::to_string(entry).unwrap_or_default();
    }

    let mut output = String::new();
    let timestamp = entry.timestamp.format(&config.timestamp_format).to_string();
    let level = format!("[{}]", entry.level.as_str());

    if config.show_colors {
        if let Some(prefix) = &config.prefix {
            output.push_str(&format!("[{}] ", prefix.bright_white().bold()));
        }
        output.push_str(&format!(
            "{} {} {} {}",
            timestamp.bright_black(),
            level.color(entry.level.color()).bold(),
            entry.target.bright_blue(),
            entry.message
        ));
        if let Some(location) = entry.location.as_ref().filter(|_| config.show_location) {
            output.push_str(&format!(" ({})", location.bright_black()));
        }
    } else {
        if let Some(prefix) = &config.prefix {
            output.push_str(&format!("[{}] ", prefix));
        }
        output.push_str(&format!(
            "{} {} {} {}",
            timestamp, level, entry.target, entry.message
        ));
        if let Some(location) = entry.location.as_ref().filter(|_| config.show_location) {
            output.push_str(&format!(" ({})", location));
        }
    }

    output
}

impl log::Log for PluginLogger {
    fn enabled(&self, metadata: &Metadata) -> bool {
        self.config
            .lock()
            .map(|config| config.min_level.enables(metadata.level()))
            .unwrap_or(true)
    }

    fn log(&self, record: &Record) {
        if !self.enabled(record.metadata()) {
            return;
        }

        let Ok(config) = self.config.lock() else {
            return;
        };
        let line = format_entry(&Self::entry(record), &config);
        println!("{}", line);

        if let Ok(mut log_file) = self.log_file.lock() {
            if let Some(file) = log_file.as_mut() {
                let _ = writeln!(file, "{}", line.strip_ansi());
            }
        }
    }

    fn flush(&self) {
        let _ = io::stdout().flush();
        if let Ok(mut log_file) = self.log_file.lock() {
            if let Some(file) = log_file.as_mut() {
                let _ = file.flush();
            }
        }
    }
}

/// Logs how long an operation took when dropped.
pub struct Timer {
    start: Instant,
    name: String,
}

impl Timer {
    pub fn new(name: &str) -> Self {
        log::debug!("⏱️  Starting timer: {}", name);
        Self {
            start: Instant::now(),
            name: name.to_string(),
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for Timer {
    fn drop(&mut self) {
        log::info!(
            "⏱️  {} finished in {}ms",
            self.name,
            self.elapsed().as_millis()
        );
    }
}

pub fn timer(name: &str) -> Timer {
    Timer::new(name)
}

/// Log the effective configuration without revealing any key.
pub fn log_config_info(config: &VertexConfig) {
    log::info!("⚙️  Configuration loaded:");
    log::info!("   Model: {}", config.model_name);
    log::info!("   API keys: {}", config.api_keys.len());
    log::info!("   Max attempts: {}", config.max_retry_attempts);
    log::info!("   Endpoint: {}", config.base_url);
    log::info!("   Image directory: {}", config.image_dir().display());
    log::info!("   Request timeout: {}s", config.request_timeout.as_secs());
}

trait StripAnsi {
    fn strip_ansi(&self) -> String;
}

impl StripAnsi for String {
    // Files get plain text even when the console is colored.
    fn strip_ansi(&self) -> String {
        static ANSI: Lazy<Regex> =
            Lazy::new(|| Regex::new(r"\x1b\[[0-9;]*m").expect("ansi pattern is valid"));
        ANSI.replace_all(self, "").into_owned()
    }
}
