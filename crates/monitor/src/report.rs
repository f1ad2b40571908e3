//! Report channel: the messages a deforestation check shows the user.

use std::fmt;
use std::time::SystemTime;

use crossbeam_channel::{Receiver, Sender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportLevel {
    Info,
    Warning,
    Error,
}

/// One line on the report channel
#[derive(Debug, Clone)]
pub struct ReportEntry {
    pub level: ReportLevel,
    pub message: String,
    pub timestamp: SystemTime,
}

impl ReportEntry {
    fn new(level: ReportLevel, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            timestamp: SystemTime::now(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self::new(ReportLevel::Info, message)
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(ReportLevel::Warning, message)
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(ReportLevel::Error, message)
    }
}

impl fmt::Display for ReportEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

pub type ReportSender = Sender<ReportEntry>;
pub type ReportReceiver = Receiver<ReportEntry>;

/// Unbounded report channel
pub fn report_channel() -> (ReportSender, ReportReceiver) {
    crossbeam_channel::unbounded()
}
