//! Study events and the sinks that receive them.
//!
//! The study service publishes one event per successful mutation. Sinks run
//! after the database lock is released and must never fail the caller, so
//! `publish` has no return value; sinks log their own errors.

use std::fs::{create_dir_all, File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Something that happened to the notebook.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StudyEvent {
    ItemCreated {
        item_id: i64,
    },
    ItemUpdated {
        item_id: i64,
    },
    ItemDeleted {
        item_id: i64,
    },
    /// A grade was applied and persisted
    GradeSubmitted {
        item_id: i64,
        user_difficulty: i64,
        quality: u8,
        interval_days: i64,
    },
}

impl StudyEvent {
    pub fn item_id(&self) -> i64 {
        match self {
            Self::ItemCreated { item_id }
            | Self::ItemUpdated { item_id }
            | Self::ItemDeleted { item_id }
            | Self::GradeSubmitted { item_id, .. } => *item_id,
        }
    }
}

/// One line of the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventRecord {
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub event: StudyEvent,
}

pub trait EventSink: Send + Sync {
    fn publish(&self, event: &StudyEvent, at: DateTime<Utc>);
}

/// Appends events to a JSONL file, one object per line.
pub struct JsonlEventLog {
    path: PathBuf,
    writer: Mutex<BufWriter<File>>,
}

impl JsonlEventLog {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_dir_all(parent)?;
        }

        let file = OpenOptions::new().create(true).append(true).open(path)?;
        tracing::info!("Event log enabled: writing to {}", path.display());

        Ok(Self {
            path: path.to_path_buf(),
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_record(&self, record: &EventRecord) -> std::io::Result<()> {
        let json = serde_json::to_string(record)?;
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| std::io::Error::other("event log lock poisoned"))?;
        writeln!(writer, "{}", json)?;
        // Flush per event
        writer.flush()
    }
}

impl EventSink for JsonlEventLog {
    fn publish(&self, event: &StudyEvent, at: DateTime<Utc>) {
        let record = EventRecord {
            timestamp: at,
            event: event.clone(),
        };
        if let Err(e) = self.write_record(&record) {
            tracing::warn!("Failed to write event to {}: {}", self.path.display(), e);
        }
    }
}
