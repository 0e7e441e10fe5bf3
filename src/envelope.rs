//! This module describes the envelope that wraps every file StudyScribe
//! writes. The files are plain JSON documents with the following structure:
//!
//! - First, a `start` string saying who produced the file and when.
//! - Then the `entries` array, holding the records in the order they were
//!   appended.
//! - Finally an `end` marker, either `END` for a file that was closed
//!   normally, or `BACKUP` for a snapshot of a log that was still running.
//!
//! In the file, it appears as follows:
//!
//! ```text
//! {
//!  "start": "User: 12, Fri 16 Oct 2026 14:03:11",
//!  "entries": [
//! { ... },
//! { ... }
//! ],
//!  "end": "BACKUP"
//! }
//! ```
//!
//! A log that is still growing is kept as an [OpenEnvelope]: the header and
//! every entry are serialized as soon as they arrive, and closing the
//! envelope only trims the trailing separator and appends the end marker.
//! That keeps each backup cheap and every rendered document complete.

use chrono::Local;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fmt;

const SEPARATOR: &str = ",\n";

/// How a file on disk was closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndMarker {
    /// The file was finalized at the end of a phase and is complete.
    #[serde(rename = "END")]
    End,
    /// The file is a periodic snapshot of a log that was still running.
    #[serde(rename = "BACKUP")]
    Backup,
}

impl fmt::Display for EndMarker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndMarker::End => write!(f, "END"),
            EndMarker::Backup => write!(f, "BACKUP"),
        }
    }
}

/// Who a file belongs to. Written into the `start` field together with the
/// local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Provenance {
    /// A file that belongs to one participant.
    User(String),
    /// The application index, which belongs to nobody in particular.
    Index,
}

impl Provenance {
    /// Provenance of a participant's file.
    pub fn user(id: impl Into<String>) -> Self {
        Provenance::User(id.into())
    }

    /// The human readable `start` string, stamped with the current time.
    pub fn describe(&self) -> String {
        let now = Local::now().format("%a %d %b %Y %H:%M:%S");
        match self {
            Provenance::User(id) => format!("User: {}, {}", id, now),
            Provenance::Index => now.to_string(),
        }
    }
}

/// A whole file as it is read back from disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    /// Who wrote the file, and when.
    pub start: String,
    /// The records, oldest first.
    pub entries: Vec<T>,
    /// Whether the file is final or a backup.
    pub end: EndMarker,
}

impl<T> Envelope<T> {
    /// Wrap a single record in a finalized envelope.
    pub fn single(entry: T, provenance: &Provenance) -> Self {
        Self {
            start: provenance.describe(),
            entries: vec![entry],
            end: EndMarker::End,
        }
    }
}

impl<T: Serialize> Envelope<T> {
    /// The envelope as pretty JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

impl<T: DeserializeOwned> Envelope<T> {
    /// Parse a whole file.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        serde_json::from_str(text)
    }
}

/// An envelope whose entries list is still open for appending.
#[derive(Debug, Clone)]
pub struct OpenEnvelope {
    header: String,
    body: String,
    len: usize,
}

impl OpenEnvelope {
    /// Write the header and open the entries list.
    pub fn open(provenance: &Provenance) -> Self {
        // Serializing a plain string cannot fail.
        let start = serde_json::Value::String(provenance.describe()).to_string();
        Self {
            header: format!("{{\n \"start\": {},\n \"entries\": [\n", start),
            body: String::new(),
            len: 0,
        }
    }

    /// Serialize one entry and append it, followed by a separator.
    pub fn push<T: Serialize>(&mut self, entry: &T) -> serde_json::Result<()> {
        let line = serde_json::to_string_pretty(entry)?;
        self.body.push_str(&line);
        self.body.push_str(SEPARATOR);
        self.len += 1;
        Ok(())
    }

    /// Number of entries appended so far.
    pub fn len(&self) -> usize {
        self.len
    }

    /// No entry appended yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Close a copy of the envelope with the given marker. The open
    /// envelope itself is left untouched so appending can continue.
    pub fn render(&self, marker: EndMarker) -> String {
        let mut out = String::with_capacity(self.header.len() + self.body.len() + 32);
        out.push_str(&self.header);
        out.push_str(self.entries_trimmed());
        Self::close(&mut out, marker);
        out
    }

    /// Like [OpenEnvelope::render], with one provisional entry appended to
    /// the rendered copy only.
    pub fn render_with<T: Serialize>(
        &self,
        provisional: &T,
        marker: EndMarker,
    ) -> serde_json::Result<String> {
        let line = serde_json::to_string_pretty(provisional)?;
        let mut out = String::with_capacity(self.header.len() + self.body.len() + line.len() + 32);
        out.push_str(&self.header);
        out.push_str(&self.body);
        out.push_str(&line);
        Self::close(&mut out, marker);
        Ok(out)
    }

    fn entries_trimmed(&self) -> &str {
        self.body.trim_end_matches(|c| c == ',' || c == '\n' || c == '\r')
    }

    fn close(out: &mut String, marker: EndMarker) {
        out.push_str(&format!("\n],\n \"end\": \"{}\"\n}}\n", marker));
    }
}

/// What [inspect](crate::store::inspect_file) found in a file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileStatus {
    /// The provenance line.
    pub start: String,
    /// Number of entries.
    pub entries: usize,
    /// How the file was closed.
    pub end: EndMarker,
}

impl FileStatus {
    /// Parse any envelope, without caring about the entry type.
    pub fn from_json(text: &str) -> serde_json::Result<Self> {
        let envelope = Envelope::<serde_json::Value>::from_json(text)?;
        Ok(Self {
            start: envelope.start,
            entries: envelope.entries.len(),
            end: envelope.end,
        })
    }

    /// The file was closed with `END`.
    pub fn is_finalized(&self) -> bool {
        self.end == EndMarker::End
    }
}

impl fmt::Display for FileStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} entries) [{}]",
            self.end, self.entries, self.start
        )
    }
}
