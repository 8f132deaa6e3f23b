//! User-facing diagnostics
//!
//! Export problems are recovered locally and reported here instead of
//! aborting the render. The log is capped and deduplicating: reporting the
//! same message again bumps a counter on the existing entry.

use std::collections::VecDeque;
use std::fmt;

/// Default number of distinct entries kept
pub const DEFAULT_CAPACITY: usize = 100;

/// Severity of a diagnostics entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Recovered problem (fallback substituted)
    Warning,
    /// Problem that aborted rendering
    Error,
}

/// One deduplicated diagnostics entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    /// Severity
    pub severity: Severity,
    /// Message shown to the user
    pub message: String,
    /// Name of the scene entity involved, if any
    pub source: Option<String>,
    /// How many times this exact message was reported
    pub count: u32,
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self.severity {
            Severity::Warning => "WARNING",
            Severity::Error => "ERROR",
        };
        write!(f, "{label}: ")?;
        if let Some(source) = &self.source {
            write!(f, "[{source}] ")?;
        }
        f.write_str(&self.message)?;
        if self.count > 1 {
            write!(f, " ({}x)", self.count)?;
        }
        Ok(())
    }
}

/// Capped, deduplicating warning/error log
#[derive(Debug, Clone)]
pub struct ErrorLog {
    entries: VecDeque<LogEntry>,
    capacity: usize,
}

impl Default for ErrorLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }
}

impl ErrorLog {
    /// Create a log keeping at most `capacity` distinct entries
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity: capacity.max(1),
        }
    }

    /// Report a recovered problem
    pub fn add_warning(&mut self, message: impl Into<String>, source: Option<&str>) {
        let message = message.into();
        log::warn!("{}{}", source.map(|s| format!("[{s}] ")).unwrap_or_default(), message);
        self.push(Severity::Warning, message, source);
    }

    /// Report a problem that aborted rendering
    pub fn add_error(&mut self, message: impl Into<String>, source: Option<&str>) {
        let message = message.into();
        log::error!("{}{}", source.map(|s| format!("[{s}] ")).unwrap_or_default(), message);
        self.push(Severity::Error, message, source);
    }

    fn push(&mut self, severity: Severity, message: String, source: Option<&str>) {
        let existing = self.entries.iter_mut().find(|entry| {
            entry.severity == severity && entry.message == message && entry.source.as_deref() == source
        });
        if let Some(entry) = existing {
            entry.count = entry.count.saturating_add(1);
            return;
        }

        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(LogEntry {
            severity,
            message,
            source: source.map(str::to_string),
            count: 1,
        });
    }

    /// All entries, oldest first
    pub fn entries(&self) -> impl Iterator<Item = &LogEntry> {
        self.entries.iter()
    }

    /// Number of distinct entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing was reported
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Number of distinct warnings
    pub fn warning_count(&self) -> usize {
        self.entries.iter().filter(|e| e.severity == Severity::Warning).count()
    }

    /// Whether any error was reported
    pub fn has_errors(&self) -> bool {
        self.entries.iter().any(|e| e.severity == Severity::Error)
    }

    /// Drop all entries
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Progress/status line shown by the host while a job runs
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobStatus {
    /// Short status message
    pub message: String,
    /// Set when the job ended in an error the user must acknowledge
    pub error: Option<String>,
}

impl JobStatus {
    /// Replace the status message
    pub fn set_message(&mut self, message: impl Into<String>) {
        self.message = message.into();
    }

    /// Record a blocking error
    pub fn set_error(&mut self, error: impl Into<String>) {
        let error = error.into();
        self.message = format!("Error: {error}");
        self.error = Some(error);
    }

    /// Forget the previous job
    pub fn reset(&mut self) {
        self.message.clear();
        self.error = None;
    }
}
