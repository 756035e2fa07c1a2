// src/engine/outcome.rs

use serde_json::Value;

use crate::types::{LogLevel, LogRecord};

/// One item produced while running a configuration: either a log record
/// destined for the final summary or a JSON document for stdout.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineItem {
    Log(LogRecord),
    Json(Value),
}

impl PipelineItem {
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        PipelineItem::Log(LogRecord::new(level, message))
    }

    pub fn as_log(&self) -> Option<&LogRecord> {
        match self {
            PipelineItem::Log(record) => Some(record),
            PipelineItem::Json(_) => None,
        }
    }
}
