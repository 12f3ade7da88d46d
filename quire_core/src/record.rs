//! Row shapes: internal entry records, legacy external records, manifest headers.

use crate::error::{Error, Result};
use crate::hash::{Algorithm, Multihash};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Current manifest header version.
pub const MANIFEST_VERSION: &str = "v0";

/// Column naming a row within a manifest table.
pub const NAME_FIELD: &str = "logical_key";

/// Validate a logical entry name.
///
/// Names are relative `/`-separated paths. A single trailing `/` marks a
/// directory sentinel. Empty, `.` and `..` segments, absolute names and
/// backslashes are rejected, so a name joined under a directory stays
/// inside it.
pub fn validate_entry_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name("entry name cannot be empty"));
    }
    if name.starts_with('/') || name.contains('\\') {
        return Err(Error::invalid_name(format!(
            "entry name must be a relative path: {}",
            name
        )));
    }
    let body = name.strip_suffix('/').unwrap_or(name);
    if body
        .split('/')
        .any(|segment| segment.is_empty() || segment == "." || segment == "..")
    {
        return Err(Error::invalid_name(format!(
            "entry name contains an empty, . or .. segment: {}",
            name
        )));
    }
    Ok(())
}

/// A flat key/value row as stored in a table.
pub type Row = Map<String, Value>;

/// Internal entry record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryRecord {
    /// Logical name within the manifest.
    pub name: String,
    /// Physical location (path or URI).
    pub place: String,
    pub size: u64,
    /// Multihash string of the entry's bytes.
    pub multihash: String,
    /// System metadata.
    #[serde(default)]
    pub info: Map<String, Value>,
    /// User metadata.
    #[serde(default)]
    pub meta: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Value>,
}

impl EntryRecord {
    pub fn new(
        name: impl Into<String>,
        place: impl Into<String>,
        size: u64,
        multihash: &Multihash,
    ) -> Self {
        Self {
            name: name.into(),
            place: place.into(),
            size,
            multihash: multihash.to_hex(),
            info: Map::new(),
            meta: Map::new(),
            workflow: None,
        }
    }

    pub fn with_meta(mut self, meta: Map<String, Value>) -> Self {
        self.meta = meta;
        self
    }

    /// Parse the stored multihash string.
    pub fn content_hash(&self) -> Result<Multihash> {
        Multihash::parse(&self.multihash)
    }

    pub fn to_row(&self) -> Result<Row> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            _ => Err(Error::schema(&self.name, "entry record did not serialize to an object")),
        }
    }

    pub fn from_row(row: Row) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }
}

/// Legacy `{type, value}` hash struct.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Hash3 {
    /// Algorithm name, e.g. `SHA256`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Hex digest without the multihash prefix.
    pub value: String,
}

impl Hash3 {
    pub fn from_multihash(hash: &Multihash) -> Self {
        Self {
            kind: hash.algorithm().legacy_name().to_string(),
            value: hash.hex_digest(),
        }
    }

    pub fn to_multihash(&self) -> Result<Multihash> {
        let algorithm = Algorithm::from_legacy_name(&self.kind)?;
        Multihash::from_hex_digest(algorithm, &self.value)
    }
}

/// Legacy external entry record, the on-disk row shape of a manifest.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyRecord {
    pub logical_key: String,
    /// Singleton list holding the percent-quoted location.
    pub physical_keys: Vec<String>,
    pub size: u64,
    pub hash: Hash3,
    /// System metadata, with user metadata nested under `user_meta`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub workflow: Option<Value>,
}

impl LegacyRecord {
    pub fn to_row(&self) -> Result<Row> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            _ => Err(Error::schema(
                &self.logical_key,
                "legacy record did not serialize to an object",
            )),
        }
    }

    pub fn from_row(row: Row) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }
}

/// Row zero of a manifest table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_meta: Option<Value>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Header {
    pub fn new(message: Option<String>, user_meta: Option<Value>) -> Self {
        Self {
            version: MANIFEST_VERSION.to_string(),
            message,
            user_meta,
            extra: Map::new(),
        }
    }

    pub fn to_row(&self) -> Result<Row> {
        match serde_json::to_value(self)? {
            Value::Object(row) => Ok(row),
            _ => Err(Error::schema("header", "header did not serialize to an object")),
        }
    }

    pub fn from_row(row: Row) -> Result<Self> {
        Ok(serde_json::from_value(Value::Object(row))?)
    }
}

impl Default for Header {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// The dict an entry contributes to its manifest's content hash:
/// `{logical_key, hash, size, meta}` taken from a legacy row, `meta` defaulting to `{}`.
pub fn hashed_entry_dict(row: &Row) -> Result<Value> {
    let field = |name: &str| {
        row.get(name)
            .cloned()
            .ok_or_else(|| Error::schema(name, "missing from manifest row"))
    };

    let mut dict = Map::new();
    dict.insert(NAME_FIELD.to_string(), field(NAME_FIELD)?);
    dict.insert("hash".to_string(), field("hash")?);
    dict.insert("size".to_string(), field("size")?);
    dict.insert(
        "meta".to_string(),
        match row.get("meta") {
            Some(Value::Null) | None => Value::Object(Map::new()),
            Some(meta) => meta.clone(),
        },
    );
    Ok(Value::Object(dict))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest;
    use serde_json::json;

    #[test]
    fn test_entry_record_row_roundtrip() {
        let mut record = EntryRecord::new("a/b.csv", "/data/a/b.csv", 12, &digest(b"x"));
        record.meta.insert("owner".into(), json!("ops"));
        let row = record.to_row().unwrap();
        assert!(!row.contains_key("workflow"));
        assert_eq!(EntryRecord::from_row(row).unwrap(), record);
    }

    #[test]
    fn test_entry_names_stay_relative() {
        for name in ["a.txt", "sub/b.txt", "dir/", "a/b/c", "..hidden", "x..y"] {
            validate_entry_name(name).unwrap();
        }
        for name in [
            "", "/", "../x", "a/../../x", "/etc/passwd", "a//b", "./a", "a/.", "dir//",
            "a\\..\\b",
        ] {
            assert!(
                matches!(validate_entry_name(name), Err(Error::InvalidName { .. })),
                "accepted {:?}",
                name
            );
        }
    }

    #[test]
    fn test_hash3_conversion() {
        let hash = digest(b"payload");
        let hash3 = Hash3::from_multihash(&hash);
        assert_eq!(hash3.kind, "SHA256");
        assert_eq!(hash3.value.len(), 64);
        assert_eq!(hash3.to_multihash().unwrap(), hash);
        let json = serde_json::to_value(&hash3).unwrap();
        assert_eq!(json["type"], "SHA256");
    }

    #[test]
    fn test_header_omits_absent_fields() {
        let row = Header::default().to_row().unwrap();
        assert_eq!(Value::Object(row), json!({"version": "v0"}));

        let header = Header::new(Some("first".into()), Some(json!({"k": 1})));
        let back = Header::from_row(header.to_row().unwrap()).unwrap();
        assert_eq!(back, header);
    }

    #[test]
    fn test_hashed_entry_dict_defaults_meta() {
        let row = json!({
            "logical_key": "a.txt",
            "physical_keys": ["/tmp/a.txt"],
            "size": 3,
            "hash": {"type": "SHA256", "value": "00"},
        });
        let Value::Object(row) = row else { unreachable!() };
        let dict = hashed_entry_dict(&row).unwrap();
        assert_eq!(dict["meta"], json!({}));
        assert!(dict.get("physical_keys").is_none());
    }

    #[test]
    fn test_hashed_entry_dict_requires_hash() {
        let Value::Object(row) = json!({"logical_key": "a.txt", "size": 3}) else {
            unreachable!()
        };
        assert!(matches!(
            hashed_entry_dict(&row),
            Err(Error::Schema { .. })
        ));
    }
}
