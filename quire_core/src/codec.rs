//! Declarative schema translation between internal and legacy rows.
//!
//! Each [`FieldSpec`] maps one internal field to one external field and carries
//! a set of [`FieldOptions`]. Encoding applies, in order:
//!
//! 1. `is_hash`: multihash string to `{type, value}` struct
//! 2. date formatting, when the internal value is a [`Datum::Date`]
//! 3. `is_quoted`: percent-encoding
//! 4. `is_list`: wrap in a singleton list
//!
//! Decoding applies the inverse steps in reverse order. A [`MetaLift`] moves
//! user metadata between a top-level internal field and a key nested inside
//! another field's value.

use crate::error::{Error, Result};
use crate::hash::{Algorithm, Multihash, PREFIX_LEN};
use crate::record::{EntryRecord, Hash3, LegacyRecord, Row};
use crate::table::ColumnBatch;
use chrono::{DateTime, SecondsFormat, Utc};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use serde_json::{Map, Value};
use std::collections::{BTreeMap, HashSet};

/// Characters left untouched by quoting. `%` is always encoded, so quoting is reversible.
const QUOTE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'.')
    .remove(b'_')
    .remove(b'~')
    .remove(b'/')
    .remove(b':')
    .remove(b'?')
    .remove(b'=')
    .remove(b'&');

/// Per-field translation options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FieldOptions {
    pub is_hash: bool,
    pub is_list: bool,
    pub is_quoted: bool,
    pub is_optional: bool,
}

impl FieldOptions {
    pub fn hash(mut self) -> Self {
        self.is_hash = true;
        self
    }

    pub fn list(mut self) -> Self {
        self.is_list = true;
        self
    }

    pub fn quoted(mut self) -> Self {
        self.is_quoted = true;
        self
    }

    pub fn optional(mut self) -> Self {
        self.is_optional = true;
        self
    }
}

/// One internal ↔ external field mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldSpec {
    pub internal: String,
    pub external: String,
    pub options: FieldOptions,
}

impl FieldSpec {
    pub fn new(internal: impl Into<String>, external: impl Into<String>, options: FieldOptions) -> Self {
        Self {
            internal: internal.into(),
            external: external.into(),
            options,
        }
    }
}

/// Moves `target` into `container[key]` on encode, and back out on decode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetaLift {
    /// Internal field holding the nested object.
    pub container: String,
    /// Key inside the container.
    pub key: String,
    /// Top-level internal field.
    pub target: String,
}

/// A value on the internal side of the codec.
#[derive(Debug, Clone, PartialEq)]
pub enum Datum {
    Value(Value),
    Date(DateTime<Utc>),
}

impl From<Value> for Datum {
    fn from(value: Value) -> Self {
        Datum::Value(value)
    }
}

impl From<DateTime<Utc>> for Datum {
    fn from(date: DateTime<Utc>) -> Self {
        Datum::Date(date)
    }
}

/// Format a date the way legacy rows store it.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Percent-encode a location string.
pub fn quote(s: &str) -> String {
    utf8_percent_encode(s, QUOTE_SET).to_string()
}

/// Reverse [`quote`].
pub fn unquote(s: &str) -> Result<String> {
    percent_decode_str(s)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .map_err(|e| Error::schema("quoted", format!("invalid UTF-8 after percent-decoding: {}", e)))
}

/// Bidirectional row translator.
#[derive(Debug, Clone)]
pub struct Codec {
    fields: Vec<FieldSpec>,
    lift: Option<MetaLift>,
}

impl Codec {
    /// Build a codec, rejecting duplicate field names on either side.
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self> {
        let mut internal = HashSet::new();
        let mut external = HashSet::new();
        for field in &fields {
            if !internal.insert(field.internal.as_str()) {
                return Err(Error::configuration(format!(
                    "duplicate internal field {}",
                    field.internal
                )));
            }
            if !external.insert(field.external.as_str()) {
                return Err(Error::configuration(format!(
                    "duplicate external field {}",
                    field.external
                )));
            }
        }
        Ok(Self { fields, lift: None })
    }

    /// The schema between [`EntryRecord`] and [`LegacyRecord`] rows.
    pub fn legacy() -> Self {
        let plain = FieldOptions::default();
        Self {
            fields: vec![
                FieldSpec::new("name", "logical_key", plain),
                FieldSpec::new("place", "physical_keys", plain.list().quoted()),
                FieldSpec::new("size", "size", plain),
                FieldSpec::new("multihash", "hash", plain.hash()),
                FieldSpec::new("info", "meta", plain.optional()),
                FieldSpec::new("workflow", "workflow", plain.optional()),
            ],
            lift: Some(MetaLift {
                container: "info".to_string(),
                key: "user_meta".to_string(),
                target: "meta".to_string(),
            }),
        }
    }

    /// Encode an internal JSON row.
    pub fn encode(&self, record: &Row) -> Result<Row> {
        let record: BTreeMap<String, Datum> = record
            .iter()
            .map(|(k, v)| (k.clone(), Datum::Value(v.clone())))
            .collect();
        self.encode_record(record)
    }

    /// Encode an internal row whose values may carry dates.
    pub fn encode_record(&self, mut record: BTreeMap<String, Datum>) -> Result<Row> {
        if let Some(lift) = &self.lift {
            nest_meta(&mut record, lift)?;
        }

        let mut out = Map::new();
        for field in &self.fields {
            let datum = match record.remove(&field.internal) {
                Some(Datum::Value(Value::Null)) | None if field.options.is_optional => continue,
                Some(datum) => datum,
                None => {
                    return Err(Error::schema(&field.internal, "missing required field"));
                }
            };
            let value = self.encode_field(field, datum)?;
            out.insert(field.external.clone(), value);
        }
        Ok(out)
    }

    fn encode_field(&self, field: &FieldSpec, datum: Datum) -> Result<Value> {
        let opts = field.options;
        let mut datum = datum;

        if opts.is_hash {
            datum = match datum {
                Datum::Value(Value::String(s)) => Datum::Value(encode_hash_field(&field.internal, &s)?),
                other => {
                    return Err(Error::schema(
                        &field.internal,
                        format!("hash field requires a multihash string, got {}", describe(&other)),
                    ));
                }
            };
        }

        let mut value = match datum {
            Datum::Date(date) => Value::String(format_date(&date)),
            Datum::Value(value) => value,
        };

        if opts.is_quoted {
            value = match value {
                Value::String(s) => Value::String(quote(&s)),
                other => {
                    return Err(Error::schema(
                        &field.internal,
                        format!("quoted field requires a string, got {}", other),
                    ));
                }
            };
        }

        if opts.is_list {
            value = Value::Array(vec![value]);
        }

        Ok(value)
    }

    /// Decode a legacy row into an internal JSON row.
    pub fn decode(&self, record: &Row) -> Result<Row> {
        let mut out = Map::new();
        for field in &self.fields {
            let value = match record.get(&field.external) {
                Some(Value::Null) | None if field.options.is_optional => continue,
                Some(value) => value.clone(),
                None => {
                    return Err(Error::schema(&field.external, "missing required field"));
                }
            };
            let value = self.decode_field(field, value)?;
            out.insert(field.internal.clone(), value);
        }

        if let Some(lift) = &self.lift {
            lift_meta(&mut out, lift)?;
        }
        Ok(out)
    }

    fn decode_field(&self, field: &FieldSpec, value: Value) -> Result<Value> {
        let opts = field.options;
        let mut value = value;

        if opts.is_list {
            value = match value {
                Value::Array(mut items) if items.len() == 1 => items.remove(0),
                other => {
                    return Err(Error::schema(
                        &field.external,
                        format!("expected a singleton list, got {}", other),
                    ));
                }
            };
        }

        if opts.is_quoted {
            value = match value {
                Value::String(s) => Value::String(
                    unquote(&s).map_err(|_| Error::schema(&field.external, "invalid percent-encoding"))?,
                ),
                other => {
                    return Err(Error::schema(
                        &field.external,
                        format!("quoted field requires a string, got {}", other),
                    ));
                }
            };
        }

        if opts.is_hash {
            value = Value::String(decode_hash_field(&field.external, &value)?);
        }

        Ok(value)
    }

    /// Split a multihash string into a legacy `{type, value}` struct.
    pub fn encode_hash(&self, multihash: &str) -> Result<Value> {
        encode_hash_field("hash", multihash)
    }

    /// Join a legacy `{type, value}` struct into a multihash string.
    pub fn decode_hash(&self, value: &Value) -> Result<String> {
        decode_hash_field("hash", value)
    }

    /// Decode column batches into internal rows, in batch then row order.
    pub fn decode_batches(&self, batches: &[ColumnBatch]) -> Result<Vec<Row>> {
        ColumnBatch::flatten(batches)
            .iter()
            .map(|row| self.decode(row))
            .collect()
    }

    pub fn encode_entry(&self, record: &EntryRecord) -> Result<LegacyRecord> {
        LegacyRecord::from_row(self.encode(&record.to_row()?)?)
    }

    pub fn decode_entry(&self, record: &LegacyRecord) -> Result<EntryRecord> {
        EntryRecord::from_row(self.decode(&record.to_row()?)?)
    }
}

fn encode_hash_field(field: &str, multihash: &str) -> Result<Value> {
    if multihash.len() < PREFIX_LEN || !multihash.is_char_boundary(PREFIX_LEN) {
        return Err(Error::schema(field, format!("not a multihash: {}", multihash)));
    }
    let (prefix, digest) = multihash.split_at(PREFIX_LEN);
    let algorithm = Algorithm::from_prefix(&prefix.to_ascii_lowercase())
        .map_err(|_| Error::schema(field, format!("unregistered hash prefix {}", prefix)))?;
    let hash = Multihash::from_hex_digest(algorithm, digest)
        .map_err(|e| Error::schema(field, e.to_string()))?;
    Ok(serde_json::to_value(Hash3::from_multihash(&hash))?)
}

fn decode_hash_field(field: &str, value: &Value) -> Result<String> {
    let hash3: Hash3 = serde_json::from_value(value.clone())
        .map_err(|_| Error::schema(field, format!("expected a {{type, value}} struct, got {}", value)))?;
    let hash = hash3
        .to_multihash()
        .map_err(|e| Error::schema(field, e.to_string()))?;
    Ok(hash.to_hex())
}

fn nest_meta(record: &mut BTreeMap<String, Datum>, lift: &MetaLift) -> Result<()> {
    if let Some(Datum::Value(Value::Object(container))) = record.get(&lift.container) {
        if container.contains_key(&lift.key) {
            return Err(Error::schema(
                &lift.container,
                format!("{} is reserved for {}", lift.key, lift.target),
            ));
        }
    }

    let meta = match record.remove(&lift.target) {
        Some(Datum::Value(Value::Object(meta))) => meta,
        Some(Datum::Value(Value::Null)) | None => return Ok(()),
        Some(other) => {
            return Err(Error::schema(
                &lift.target,
                format!("expected an object, got {}", describe(&other)),
            ));
        }
    };
    if meta.is_empty() {
        return Ok(());
    }

    let container = record
        .entry(lift.container.clone())
        .or_insert_with(|| Datum::Value(Value::Object(Map::new())));
    match container {
        Datum::Value(Value::Object(map)) => {
            map.insert(lift.key.clone(), Value::Object(meta));
            Ok(())
        }
        Datum::Value(Value::Null) => {
            let mut map = Map::new();
            map.insert(lift.key.clone(), Value::Object(meta));
            *container = Datum::Value(Value::Object(map));
            Ok(())
        }
        other => Err(Error::schema(
            &lift.container,
            format!("expected an object, got {}", describe(other)),
        )),
    }
}

fn lift_meta(row: &mut Row, lift: &MetaLift) -> Result<()> {
    let nested = match row.get_mut(&lift.container) {
        Some(Value::Object(container)) => container.remove(&lift.key),
        Some(Value::Null) | None => None,
        Some(other) => {
            return Err(Error::schema(
                &lift.container,
                format!("expected an object, got {}", other),
            ));
        }
    };
    let meta = match nested {
        Some(Value::Object(meta)) => meta,
        Some(Value::Null) | None => Map::new(),
        Some(other) => {
            return Err(Error::schema(
                &lift.key,
                format!("expected an object, got {}", other),
            ));
        }
    };
    row.insert(lift.target.clone(), Value::Object(meta));
    Ok(())
}

fn describe(datum: &Datum) -> String {
    match datum {
        Datum::Value(value) => value.to_string(),
        Datum::Date(date) => format!("date {}", format_date(date)),
    }
}
