//! Hook Logging and Tracing
//!
//! Structured events for the registration lifecycle, useful for:
//! - Debugging leaks (a value whose callback never fires)
//! - Diagnosing callbacks that fire too early or fail
//! - Production monitoring
//!
//! Every event is forwarded to the `log` facade. A bounded history is kept
//! so tests and tools can inspect what happened without installing a
//! logger backend.
//!
//! Log Levels:
//! - ERROR: callback panicked
//! - INFO: debug registration released
//! - DEBUG: registration cancelled or collected
//! - TRACE: registration created

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

/// Log level for hook events
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Error = 0,
    Warn = 1,
    Info = 2,
    Debug = 3,
    Trace = 4,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
            LogLevel::Trace => log::Level::Trace,
        }
    }
}

/// Registration lifecycle events
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HookEvent {
    /// A target was registered for observation
    Registered {
        id: u64,
        proxied: bool,
        cancellable: bool,
    },

    /// A pending registration was removed through its token
    Cancelled { id: u64 },

    /// The target was found unreachable and its callback scheduled
    Collected { id: u64 },

    /// Debug diagnostic emitted right before the callback of a debug
    /// registration runs
    Released { id: u64, label: String },

    /// The callback panicked; the panic was contained
    CallbackPanicked { id: u64, message: String },
}

impl HookEvent {
    /// Level this event is reported at
    pub fn level(&self) -> LogLevel {
        match self {
            HookEvent::CallbackPanicked { .. } => LogLevel::Error,
            HookEvent::Released { .. } => LogLevel::Info,
            HookEvent::Cancelled { .. } | HookEvent::Collected { .. } => LogLevel::Debug,
            HookEvent::Registered { .. } => LogLevel::Trace,
        }
    }

    /// Registration id the event refers to
    pub fn id(&self) -> u64 {
        match self {
            HookEvent::Registered { id, .. }
            | HookEvent::Cancelled { id }
            | HookEvent::Collected { id }
            | HookEvent::Released { id, .. }
            | HookEvent::CallbackPanicked { id, .. } => *id,
        }
    }

    /// Render as a single-line JSON object
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| format!("{{\"id\":{}}}", self.id()))
    }
}

impl fmt::Display for HookEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookEvent::Registered {
                id,
                proxied,
                cancellable,
            } => write!(
                f,
                "[gc-hook] #{} registered ({}, {})",
                id,
                if *proxied { "proxy" } else { "substitute" },
                if *cancellable { "cancellable" } else { "uncancellable" }
            ),
            HookEvent::Cancelled { id } => write!(f, "[gc-hook] #{} cancelled", id),
            HookEvent::Collected { id } => write!(f, "[gc-hook] #{} target collected", id),
            HookEvent::Released { label, .. } => {
                write!(f, "Held value {} not relevant anymore", label)
            },
            HookEvent::CallbackPanicked { id, message } => {
                write!(f, "[gc-hook] #{} callback panicked: {}", id, message)
            },
        }
    }
}

/// Logger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggerConfig {
    /// Minimum log level
    pub level: LogLevel,

    /// Enable console output
    pub console: bool,

    /// Enable JSON format for console output
    pub json: bool,

    /// Enable timestamps for console output
    pub timestamps: bool,

    /// Number of events kept in memory
    pub history: usize,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            console: false,
            json: false,
            timestamps: true,
            history: 1024,
        }
    }
}

/// Hook Logger - centralized logging for registration events
pub struct HookLogger {
    config: LoggerConfig,
    events: Mutex<VecDeque<(Instant, HookEvent)>>,
    enabled: AtomicBool,
}

impl HookLogger {
    /// Create new logger
    pub fn new(config: LoggerConfig) -> Self {
        Self {
            config,
            events: Mutex::new(VecDeque::new()),
            enabled: AtomicBool::new(true),
        }
    }

    /// Enable logging
    pub fn enable(&self) {
        self.enabled.store(true, Ordering::Relaxed);
    }

    /// Disable logging
    pub fn disable(&self) {
        self.enabled.store(false, Ordering::Relaxed);
    }

    /// Check if logging is enabled
    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Configuration this logger was built with
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// Log an event
    pub fn log(&self, event: HookEvent) {
        if !self.is_enabled() {
            return;
        }

        let level = event.level();
        if level > self.config.level {
            return;
        }

        log::log!(log::Level::from(level), "{}", event);

        if self.config.console {
            self.output_console(&event);
        }

        let mut events = self.events.lock();
        while events.len() >= self.config.history.max(1) {
            events.pop_front();
        }
        events.push_back((Instant::now(), event));
    }

    fn output_console(&self, event: &HookEvent) {
        let body = if self.config.json {
            event.to_json()
        } else {
            event.to_string()
        };

        if self.config.timestamps {
            let now = chrono::Local::now();
            println!("[{}] {}", now.format("%Y-%m-%d %H:%M:%S%.3f"), body);
        } else {
            println!("{}", body);
        }
    }

    /// Snapshot of the recorded events, oldest first
    pub fn events(&self) -> Vec<HookEvent> {
        self.events.lock().iter().map(|(_, e)| e.clone()).collect()
    }

    /// Recorded events together with the instant they were logged
    pub fn timed_events(&self) -> Vec<(Instant, HookEvent)> {
        self.events.lock().iter().cloned().collect()
    }

    /// Clear all events
    pub fn clear_events(&self) {
        self.events.lock().clear();
    }

    /// Get event count
    pub fn event_count(&self) -> usize {
        self.events.lock().len()
    }
}

impl Default for HookLogger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}
