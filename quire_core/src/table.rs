//! Tabular row storage for manifests.
//!
//! Row zero of every table is the header; the remaining rows are keyed by a
//! name column and kept in insertion order. Two serializations are supported,
//! selected by file extension:
//!
//! ```text
//! .jsonl  one JSON object per line, header first
//! .colz   zstd-compressed JSON document: {"header": {...}, "batches": [...]}
//!         where each batch stores its rows column-major
//! ```

use crate::error::{Error, Result};
use crate::record::{Row, validate_entry_name};
use crate::resolver::PathResolver;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::Path;
use std::rc::Rc;

/// Rows per column batch when writing the columnar format.
pub const DEFAULT_BATCH_SIZE: usize = 1024;

/// zstd level for the columnar format (level 3 = fast compression).
const ZSTD_LEVEL: i32 = 3;

/// Table serializations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TableFormat {
    /// Line-delimited JSON records.
    #[default]
    JsonLines,
    /// zstd-compressed column batches.
    Columnar,
}

impl TableFormat {
    pub const ALL: [TableFormat; 2] = [TableFormat::JsonLines, TableFormat::Columnar];

    pub fn extension(&self) -> &'static str {
        match self {
            TableFormat::JsonLines => "jsonl",
            TableFormat::Columnar => "colz",
        }
    }

    /// Parse a format from its extension (as written in config files).
    pub fn parse(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|format| format.extension() == s)
            .ok_or_else(|| Error::configuration(format!("unsupported table format: {}", s)))
    }

    /// Select the serialization implied by a location's extension.
    pub fn from_location(location: &str) -> Result<Self> {
        let ext = Path::new(location)
            .extension()
            .and_then(|e| e.to_str())
            .ok_or_else(|| {
                Error::configuration(format!("no table extension on {}", location))
            })?;
        Self::parse(ext)
    }
}

/// One column-major batch of rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ColumnBatch {
    len: usize,
    columns: BTreeMap<String, Vec<Value>>,
}

impl ColumnBatch {
    /// Transpose rows into columns; absent cells become `null`.
    pub fn from_rows(rows: &[Row]) -> Self {
        let mut columns: BTreeMap<String, Vec<Value>> = BTreeMap::new();
        for row in rows {
            for key in row.keys() {
                columns.entry(key.clone()).or_default();
            }
        }
        for (key, column) in columns.iter_mut() {
            column.extend(rows.iter().map(|row| row.get(key).cloned().unwrap_or(Value::Null)));
        }
        Self {
            len: rows.len(),
            columns,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Rows of every batch, in batch then row order.
    pub fn flatten(batches: &[ColumnBatch]) -> Vec<Row> {
        batches.iter().flat_map(ColumnBatch::rows).collect()
    }

    /// Transpose back into rows, dropping `null` cells.
    pub fn rows(&self) -> Vec<Row> {
        (0..self.len)
            .map(|i| {
                self.columns
                    .iter()
                    .filter_map(|(key, column)| match column.get(i) {
                        Some(Value::Null) | None => None,
                        Some(value) => Some((key.clone(), value.clone())),
                    })
                    .collect()
            })
            .collect()
    }
}

#[derive(Serialize, Deserialize)]
struct ColumnarDocument {
    header: Row,
    batches: Vec<ColumnBatch>,
}

/// A loaded table: header plus ordered, name-keyed rows.
pub trait Table {
    fn header(&self) -> &Row;

    /// Number of rows, excluding the header.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row names in row order.
    fn names(&self) -> Vec<String>;

    fn row(&self, name: &str) -> Option<&Row>;

    /// All rows in row order.
    fn rows(&self) -> &[Row];
}

/// A table held entirely in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryTable {
    key: String,
    header: Row,
    rows: Vec<Row>,
    index: HashMap<String, usize>,
}

impl MemoryTable {
    /// Build a table; every row needs a unique, valid entry name in `key`.
    pub fn new(key: impl Into<String>, header: Row, rows: Vec<Row>) -> Result<Self> {
        let key = key.into();
        let mut index = HashMap::with_capacity(rows.len());
        for (i, row) in rows.iter().enumerate() {
            let name = row
                .get(&key)
                .and_then(Value::as_str)
                .ok_or_else(|| Error::schema(&key, format!("row {} has no string name", i + 1)))?;
            validate_entry_name(name)?;
            if index.insert(name.to_string(), i).is_some() {
                return Err(Error::schema(&key, format!("duplicate row name {}", name)));
            }
        }
        Ok(Self {
            key,
            header,
            rows,
            index,
        })
    }

    /// Build a table from a header-first row sequence.
    pub fn from_sequence(key: impl Into<String>, mut rows: Vec<Row>) -> Result<Self> {
        if rows.is_empty() {
            return Err(Error::schema("header", "table has no header row"));
        }
        let header = rows.remove(0);
        Self::new(key, header, rows)
    }

}

impl Table for MemoryTable {
    fn header(&self) -> &Row {
        &self.header
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn names(&self) -> Vec<String> {
        self.rows
            .iter()
            .filter_map(|row| row.get(&self.key).and_then(Value::as_str))
            .map(str::to_string)
            .collect()
    }

    fn row(&self, name: &str) -> Option<&Row> {
        self.index.get(name).map(|&i| &self.rows[i])
    }

    fn rows(&self) -> &[Row] {
        &self.rows
    }
}

/// Persists and loads tables.
pub trait TabularStore {
    fn load(&self, location: &str) -> Result<Box<dyn Table>>;

    /// Persist a header-first row sequence.
    fn write(&self, location: &str, rows: &[Row]) -> Result<()>;
}

/// Tables serialized into files through a [`PathResolver`].
pub struct FileTables {
    resolver: Rc<dyn PathResolver>,
    key: String,
    batch_size: usize,
}

impl FileTables {
    pub fn new(resolver: Rc<dyn PathResolver>, key: impl Into<String>) -> Self {
        Self {
            resolver,
            key: key.into(),
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn encode(&self, format: TableFormat, rows: &[Row]) -> Result<Vec<u8>> {
        match format {
            TableFormat::JsonLines => {
                let mut buf = Vec::new();
                for row in rows {
                    serde_json::to_writer(&mut buf, row)?;
                    buf.push(b'\n');
                }
                Ok(buf)
            }
            TableFormat::Columnar => {
                let (header, body) = rows
                    .split_first()
                    .ok_or_else(|| Error::schema("header", "table has no header row"))?;
                let document = ColumnarDocument {
                    header: header.clone(),
                    batches: body.chunks(self.batch_size).map(ColumnBatch::from_rows).collect(),
                };
                let json = serde_json::to_vec(&document)?;
                Ok(zstd::encode_all(&json[..], ZSTD_LEVEL)?)
            }
        }
    }

    fn decode(&self, location: &str, format: TableFormat, data: &[u8]) -> Result<Vec<Row>> {
        match format {
            TableFormat::JsonLines => {
                let text = std::str::from_utf8(data)
                    .map_err(|e| Error::corrupted(location, e.to_string()))?;
                text.lines()
                    .map(str::trim)
                    .filter(|line| !line.is_empty())
                    .map(|line| {
                        serde_json::from_str::<Row>(line)
                            .map_err(|e| Error::corrupted(location, e.to_string()))
                    })
                    .collect()
            }
            TableFormat::Columnar => {
                let json = zstd::decode_all(data)
                    .map_err(|e| Error::corrupted(location, format!("zstd: {}", e)))?;
                let document: ColumnarDocument = serde_json::from_slice(&json)
                    .map_err(|e| Error::corrupted(location, e.to_string()))?;
                let mut rows = vec![document.header];
                rows.extend(ColumnBatch::flatten(&document.batches));
                Ok(rows)
            }
        }
    }
}

impl TabularStore for FileTables {
    fn load(&self, location: &str) -> Result<Box<dyn Table>> {
        let format = TableFormat::from_location(location)?;
        let data = self.resolver.read_bytes(location)?;
        let rows = self.decode(location, format, &data)?;
        let table = MemoryTable::from_sequence(self.key.clone(), rows)
            .map_err(|e| Error::corrupted(location, e.to_string()))?;
        Ok(Box::new(table))
    }

    fn write(&self, location: &str, rows: &[Row]) -> Result<()> {
        let format = TableFormat::from_location(location)?;
        let data = self.encode(format, rows)?;
        tracing::debug!(location, rows = rows.len(), format = format.extension(), "writing table");
        self.resolver.write_bytes(location, &data)
    }
}
