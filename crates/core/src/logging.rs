//! Logging for the DMG core.
//!
//! A process-wide [`LogConfig`] holds one level per [`LogCategory`] plus a
//! global fallback level, all in atomics so the hot path costs one relaxed
//! load when logging is off. Messages are built lazily through a closure and
//! pass through a per-category rate limiter before being written to stderr or,
//! when configured, handed to a background thread that appends them to a file.
//!
//! # Usage
//!
//! ```rust
//! use dmg_core::logging::{log, LogCategory, LogLevel};
//!
//! log(LogCategory::Cpu, LogLevel::Debug, || {
//!     format!("EI at PC={:04X}", 0x0150)
//! });
//! ```

use std::collections::VecDeque;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Mutex, OnceLock};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Log level for controlling verbosity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(u8)]
pub enum LogLevel {
    Off = 0,
    Error = 1,
    Warn = 2,
    Info = 3,
    Debug = 4,
    Trace = 5,
}

impl LogLevel {
    /// Parse log level from string (case-insensitive)
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" | "0" => Some(LogLevel::Off),
            "error" | "err" | "1" => Some(LogLevel::Error),
            "warn" | "warning" | "2" => Some(LogLevel::Warn),
            "info" | "3" => Some(LogLevel::Info),
            "debug" | "4" => Some(LogLevel::Debug),
            "trace" | "5" => Some(LogLevel::Trace),
            _ => None,
        }
    }

    fn from_u8(val: u8) -> Self {
        match val {
            1 => LogLevel::Error,
            2 => LogLevel::Warn,
            3 => LogLevel::Info,
            4 => LogLevel::Debug,
            5 => LogLevel::Trace,
            _ => LogLevel::Off,
        }
    }
}

/// Log category for the parts of the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LogCategory {
    /// Instruction fetch/execute, faults
    Cpu,
    /// Address space and bus interception
    Memory,
    /// IME changes, HALT/STOP and wake-up
    Interrupts,
    /// Cartridge and bootrom mounting
    Loader,
}

const CATEGORY_COUNT: usize = 4;

impl LogCategory {
    pub const ALL: [LogCategory; CATEGORY_COUNT] = [
        LogCategory::Cpu,
        LogCategory::Memory,
        LogCategory::Interrupts,
        LogCategory::Loader,
    ];

    fn index(self) -> usize {
        match self {
            LogCategory::Cpu => 0,
            LogCategory::Memory => 1,
            LogCategory::Interrupts => 2,
            LogCategory::Loader => 3,
        }
    }
}

/// Sliding-window limiter, one window per category
struct RateLimiter {
    max_per_second: AtomicUsize,
    windows: Mutex<[VecDeque<Instant>; CATEGORY_COUNT]>,
    dropped: Mutex<[usize; CATEGORY_COUNT]>,
}

impl RateLimiter {
    fn new(max_per_second: usize) -> Self {
        Self {
            max_per_second: AtomicUsize::new(max_per_second),
            windows: Mutex::new(std::array::from_fn(|_| VecDeque::new())),
            dropped: Mutex::new([0; CATEGORY_COUNT]),
        }
    }

    /// Returns whether the message may be written, and how many earlier
    /// messages were dropped since the last one that got through.
    ///
    /// A limit of 0 admits everything.
    fn admit(&self, category: LogCategory) -> (bool, usize) {
        let now = Instant::now();
        let idx = category.index();
        let max = self.max_per_second.load(Ordering::Relaxed);

        let mut windows = match self.windows.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut dropped = match self.dropped.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        if max == 0 {
            windows[idx].clear();
            return (true, std::mem::take(&mut dropped[idx]));
        }

        let window = &mut windows[idx];
        while let Some(&front) = window.front() {
            if now.duration_since(front) > Duration::from_secs(1) {
                window.pop_front();
            } else {
                break;
            }
        }

        if window.len() < max {
            window.push_back(now);
            let count = std::mem::take(&mut dropped[idx]);
            (true, count)
        } else {
            dropped[idx] += 1;
            (false, 0)
        }
    }
}

/// Global logging configuration
pub struct LogConfig {
    global_level: AtomicU8,
    levels: [AtomicU8; CATEGORY_COUNT],
    log_sender: Mutex<Option<Sender<String>>>,
    log_writer: Mutex<Option<JoinHandle<()>>>,
    file_logging_enabled: AtomicBool,
    rate_limiter: RateLimiter,
}

/// Messages per second per category before output is dropped
pub const DEFAULT_RATE_LIMIT: usize = 60;

/// Rate limit value that turns limiting off
pub const UNLIMITED: usize = 0;

impl LogConfig {
    fn new() -> Self {
        Self {
            global_level: AtomicU8::new(LogLevel::Off as u8),
            levels: std::array::from_fn(|_| AtomicU8::new(LogLevel::Off as u8)),
            log_sender: Mutex::new(None),
            log_writer: Mutex::new(None),
            file_logging_enabled: AtomicBool::new(false),
            rate_limiter: RateLimiter::new(DEFAULT_RATE_LIMIT),
        }
    }

    /// Get the global singleton instance
    pub fn global() -> &'static Self {
        static INSTANCE: OnceLock<LogConfig> = OnceLock::new();
        INSTANCE.get_or_init(LogConfig::new)
    }

    /// Set the level used by categories without their own level
    pub fn set_global_level(&self, level: LogLevel) {
        self.global_level.store(level as u8, Ordering::Relaxed);
    }

    pub fn get_global_level(&self) -> LogLevel {
        LogLevel::from_u8(self.global_level.load(Ordering::Relaxed))
    }

    /// Set log level for a specific category
    pub fn set_level(&self, category: LogCategory, level: LogLevel) {
        self.levels[category.index()].store(level as u8, Ordering::Relaxed);
    }

    pub fn get_level(&self, category: LogCategory) -> LogLevel {
        LogLevel::from_u8(self.levels[category.index()].load(Ordering::Relaxed))
    }

    /// A category level other than Off wins; otherwise the global level applies
    pub fn should_log(&self, category: LogCategory, level: LogLevel) -> bool {
        if level == LogLevel::Off {
            return false;
        }
        let category_level = self.get_level(category);
        if category_level != LogLevel::Off {
            level <= category_level
        } else {
            level <= self.get_global_level()
        }
    }

    /// Reset all logging to Off
    pub fn reset(&self) {
        self.set_global_level(LogLevel::Off);
        for category in LogCategory::ALL {
            self.set_level(category, LogLevel::Off);
        }
    }

    /// Set the maximum messages per second per category ([`UNLIMITED`] for no limit)
    pub fn set_rate_limit(&self, max_per_second: usize) {
        self.rate_limiter
            .max_per_second
            .store(max_per_second, Ordering::Relaxed);
    }

    pub fn get_rate_limit(&self) -> usize {
        self.rate_limiter.max_per_second.load(Ordering::Relaxed)
    }

    /// Append log output to `path` from a background writer thread
    pub fn set_log_file(&self, path: PathBuf) -> std::io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        self.clear_log_file();
        let (sender, receiver) = channel::<String>();

        let writer = thread::Builder::new()
            .name("log-writer".to_string())
            .spawn(move || {
                let mut file = file;
                while let Ok(message) = receiver.recv() {
                    let _ = writeln!(file, "{}", message);
                    let _ = file.flush();
                }
            })?;

        if let Ok(mut log_sender) = self.log_sender.lock() {
            *log_sender = Some(sender);
        }
        if let Ok(mut log_writer) = self.log_writer.lock() {
            *log_writer = Some(writer);
        }
        self.file_logging_enabled.store(true, Ordering::Relaxed);
        Ok(())
    }

    /// Stop writing to the log file.
    ///
    /// Blocks until the writer thread has flushed everything already sent.
    pub fn clear_log_file(&self) {
        self.file_logging_enabled.store(false, Ordering::Relaxed);
        if let Ok(mut log_sender) = self.log_sender.lock() {
            *log_sender = None;
        }
        let writer = match self.log_writer.lock() {
            Ok(mut log_writer) => log_writer.take(),
            Err(_) => None,
        };
        if let Some(writer) = writer {
            let _ = writer.join();
        }
    }

    /// Log a lazily built message for `category` at `level` through this config
    pub fn emit<F>(&self, category: LogCategory, level: LogLevel, message_fn: F)
    where
        F: FnOnce() -> String,
    {
        if !self.should_log(category, level) {
            return;
        }

        let (allowed, dropped) = self.rate_limiter.admit(category);
        if dropped > 0 {
            self.write_message(format!(
                "[{:?}] rate limit exceeded, {} message(s) dropped",
                category, dropped
            ));
        }
        if allowed {
            self.write_message(format!("[{:?}] {}", category, message_fn()));
        }
    }

    fn write_message(&self, message: String) {
        if self.file_logging_enabled.load(Ordering::Relaxed) {
            if let Ok(log_sender) = self.log_sender.lock() {
                if let Some(sender) = log_sender.as_ref() {
                    if let Err(err) = sender.send(message) {
                        eprintln!("{}", err.0);
                    }
                    return;
                }
            }
        }
        eprintln!("{}", message);
    }
}

/// Log a lazily built message for `category` at `level`
pub fn log<F>(category: LogCategory, level: LogLevel, message_fn: F)
where
    F: FnOnce() -> String,
{
    LogConfig::global().emit(category, level, message_fn);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("off"), Some(LogLevel::Off));
        assert_eq!(LogLevel::from_str("ERR"), Some(LogLevel::Error));
        assert_eq!(LogLevel::from_str("Warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("3"), Some(LogLevel::Info));
        assert_eq!(LogLevel::from_str("DEBUG"), Some(LogLevel::Debug));
        assert_eq!(LogLevel::from_str("trace"), Some(LogLevel::Trace));
        assert_eq!(LogLevel::from_str("loud"), None);
    }

    #[test]
    fn test_level_ordering() {
        assert!(LogLevel::Off < LogLevel::Error);
        assert!(LogLevel::Error < LogLevel::Warn);
        assert!(LogLevel::Debug < LogLevel::Trace);
    }

    // A private config keeps these tests independent of the global one
    #[test]
    fn test_category_overrides_global() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Warn);
        assert!(config.should_log(LogCategory::Cpu, LogLevel::Error));
        assert!(!config.should_log(LogCategory::Cpu, LogLevel::Info));

        config.set_level(LogCategory::Cpu, LogLevel::Trace);
        assert!(config.should_log(LogCategory::Cpu, LogLevel::Trace));
        assert!(!config.should_log(LogCategory::Memory, LogLevel::Info));

        config.reset();
        for category in LogCategory::ALL {
            assert!(!config.should_log(category, LogLevel::Error));
        }
    }

    #[test]
    fn test_off_is_never_logged() {
        let config = LogConfig::new();
        config.set_global_level(LogLevel::Trace);
        assert!(!config.should_log(LogCategory::Loader, LogLevel::Off));
    }

    #[test]
    fn test_rate_limiter_drops_and_reports() {
        let limiter = RateLimiter::new(2);
        assert_eq!(limiter.admit(LogCategory::Cpu), (true, 0));
        assert_eq!(limiter.admit(LogCategory::Cpu), (true, 0));
        assert_eq!(limiter.admit(LogCategory::Cpu), (false, 0));
        assert_eq!(limiter.admit(LogCategory::Cpu), (false, 0));
        // Other categories have their own window
        assert_eq!(limiter.admit(LogCategory::Memory), (true, 0));
    }

    #[test]
    fn test_zero_rate_limit_admits_everything() {
        let limiter = RateLimiter::new(UNLIMITED);
        for _ in 0..1000 {
            assert_eq!(limiter.admit(LogCategory::Cpu), (true, 0));
        }
    }

    #[test]
    fn test_lifting_limit_reports_earlier_drops() {
        let limiter = RateLimiter::new(1);
        assert_eq!(limiter.admit(LogCategory::Cpu), (true, 0));
        assert_eq!(limiter.admit(LogCategory::Cpu), (false, 0));
        assert_eq!(limiter.admit(LogCategory::Cpu), (false, 0));
        limiter.max_per_second.store(UNLIMITED, Ordering::Relaxed);
        assert_eq!(limiter.admit(LogCategory::Cpu), (true, 2));
    }

    #[test]
    fn test_log_file_receives_every_message_when_unlimited() {
        let path = std::env::temp_dir().join(format!(
            "dmg-core-log-{}-unlimited.log",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let config = LogConfig::new();
        config.set_level(LogCategory::Cpu, LogLevel::Trace);
        config.set_rate_limit(UNLIMITED);
        config.set_log_file(path.clone()).unwrap();
        for i in 0..1000 {
            config.emit(LogCategory::Cpu, LogLevel::Trace, || format!("step {}", i));
        }
        config.clear_log_file();

        let text = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 1000);
        assert_eq!(lines[0], "[Cpu] step 0");
        assert_eq!(lines[999], "[Cpu] step 999");
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_default_limit_truncates_a_burst() {
        let path = std::env::temp_dir().join(format!(
            "dmg-core-log-{}-limited.log",
            std::process::id()
        ));
        let _ = std::fs::remove_file(&path);

        let config = LogConfig::new();
        config.set_level(LogCategory::Cpu, LogLevel::Trace);
        config.set_log_file(path.clone()).unwrap();
        for i in 0..1000 {
            config.emit(LogCategory::Cpu, LogLevel::Trace, || format!("step {}", i));
        }
        config.clear_log_file();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text.lines().count(), DEFAULT_RATE_LIMIT);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_rate_limit_setting() {
        let config = LogConfig::new();
        assert_eq!(config.get_rate_limit(), DEFAULT_RATE_LIMIT);
        config.set_rate_limit(5);
        assert_eq!(config.get_rate_limit(), 5);
    }
}
