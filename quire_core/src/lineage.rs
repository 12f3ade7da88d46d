//! Lineage log of publish and pull operations.
//!
//! One line per operation, fields separated by `|`:
//!
//! ```text
//! <unix seconds>|<put|pull>|<manifest multihash>|<owner/name>|<detail>
//! ```
//!
//! The detail field is last and may itself contain `|`.

use crate::error::{Error, Result};
use crate::hash::Multihash;
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// What a lineage line records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// A manifest was stored and tagged in a namespace.
    Put,
    /// A manifest from another domain was published here.
    Pull,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Put => "put",
            Operation::Pull => "pull",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "put" => Ok(Operation::Put),
            "pull" => Ok(Operation::Pull),
            other => Err(Error::corrupted(
                "lineage",
                format!("unknown operation {:?}", other),
            )),
        }
    }
}

/// One recorded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineageEntry {
    pub timestamp: i64,
    pub operation: Operation,
    /// Manifest the operation stored.
    pub hash: Multihash,
    pub namespace: String,
    /// Free-form `key=value` pairs, e.g. `tag=1700000000,entries=2`.
    pub detail: String,
}

impl LineageEntry {
    pub fn new(
        timestamp: i64,
        operation: Operation,
        hash: Multihash,
        namespace: impl Into<String>,
        detail: impl Into<String>,
    ) -> Self {
        Self {
            timestamp,
            operation,
            hash,
            namespace: namespace.into(),
            detail: detail.into(),
        }
    }
}

impl fmt::Display for LineageEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}|{}|{}|{}|{}",
            self.timestamp, self.operation, self.hash, self.namespace, self.detail
        )
    }
}

impl FromStr for LineageEntry {
    type Err = Error;

    fn from_str(line: &str) -> Result<Self> {
        let mut fields = line.splitn(5, '|');
        let mut next = |what: &str| {
            fields
                .next()
                .ok_or_else(|| Error::corrupted("lineage", format!("line has no {} field", what)))
        };
        let (timestamp, operation, hash, namespace, detail) = (
            next("timestamp")?,
            next("operation")?,
            next("hash")?,
            next("namespace")?,
            next("detail")?,
        );

        Ok(Self {
            timestamp: timestamp
                .parse()
                .map_err(|_| Error::corrupted("lineage", format!("bad timestamp {:?}", timestamp)))?,
            operation: operation.parse()?,
            hash: Multihash::parse(hash)
                .map_err(|e| Error::corrupted("lineage", e.to_string()))?,
            namespace: namespace.to_string(),
            detail: detail.to_string(),
        })
    }
}

/// The append-only `<root>/lineage` file.
#[derive(Debug)]
pub struct Lineage {
    path: PathBuf,
}

impl Lineage {
    /// Bind to `path`, creating an empty log if none exists yet.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let lineage = Self { path: path.into() };
        lineage.writer()?;
        Ok(lineage)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer(&self) -> Result<fs::File> {
        Ok(OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?)
    }

    pub fn append(&self, entry: &LineageEntry) -> Result<()> {
        // Whole line in a single write.
        let line = format!("{}\n", entry);
        let mut file = self.writer()?;
        file.write_all(line.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Stamp an operation with the current time and append it.
    pub fn record(
        &self,
        operation: Operation,
        hash: &Multihash,
        namespace: &str,
        detail: impl Into<String>,
    ) -> Result<()> {
        let now = chrono::Utc::now().timestamp();
        let entry = LineageEntry::new(now, operation, *hash, namespace, detail);
        tracing::debug!(%operation, %hash, namespace, "lineage");
        self.append(&entry)
    }

    /// The last `count` entries, oldest first.
    pub fn read_recent(&self, count: usize) -> Result<Vec<LineageEntry>> {
        let mut entries = self.entries()?;
        let start = entries.len().saturating_sub(count);
        Ok(entries.split_off(start))
    }

    /// Entries recorded for one namespace, oldest first.
    pub fn for_namespace(&self, namespace: &str) -> Result<Vec<LineageEntry>> {
        let mut entries = self.entries()?;
        entries.retain(|entry| entry.namespace == namespace);
        Ok(entries)
    }

    /// Every parseable line; torn trailing writes are dropped.
    fn entries(&self) -> Result<Vec<LineageEntry>> {
        let text = match fs::read_to_string(&self.path) {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        Ok(text
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .filter_map(|line| line.parse().ok())
            .collect())
    }
}
