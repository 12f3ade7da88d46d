//! Content addressing: hash sources, memoized hashes and verification.
//!
//! Every addressable resource declares one [`HashSource`] when it is built:
//!
//! - `Bytes`: the raw bytes of a single physical blob
//! - `ChildHashes`: the concatenated multihash strings of its children, in order
//! - `CanonicalDict`: the canonical JSON encoding of one or more metadata records,
//!   concatenated in order
//!
//! The computed hash is memoized in a [`ContentAddress`]. Marking an address
//! dirty clears its memo and the memo of every ancestor address it was
//! derived from, so the next `hash()` anywhere up the chain recomputes.

use crate::error::{Error, Result};
use crate::hash::{Algorithm, Multihash};
use serde_json::{Map, Value};
use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

/// Which bytes a resource's content hash is computed over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HashSource {
    Bytes,
    ChildHashes,
    CanonicalDict,
}

impl HashSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashSource::Bytes => "bytes",
            HashSource::ChildHashes => "child_hashes",
            HashSource::CanonicalDict => "canonical_dict",
        }
    }
}

/// The material handed to a [`ContentAddress`] when a hash is computed.
#[derive(Debug, Clone, PartialEq)]
pub enum HashInput {
    Bytes(Vec<u8>),
    ChildHashes(Vec<Multihash>),
    CanonicalDict(Vec<Value>),
}

impl HashInput {
    pub fn source(&self) -> HashSource {
        match self {
            HashInput::Bytes(_) => HashSource::Bytes,
            HashInput::ChildHashes(_) => HashSource::ChildHashes,
            HashInput::CanonicalDict(_) => HashSource::CanonicalDict,
        }
    }

    /// The exact byte sequence that gets digested.
    pub fn encode(&self) -> Result<Vec<u8>> {
        match self {
            HashInput::Bytes(bytes) => Ok(bytes.clone()),
            HashInput::ChildHashes(hashes) => Ok(hashes
                .iter()
                .flat_map(|hash| hash.to_hex().into_bytes())
                .collect()),
            HashInput::CanonicalDict(records) => {
                let mut buf = Vec::new();
                for record in records {
                    buf.extend_from_slice(&canonical_bytes(record)?);
                }
                Ok(buf)
            }
        }
    }

    /// Digest the encoded input.
    pub fn digest(&self, algorithm: Algorithm) -> Result<Multihash> {
        Ok(algorithm.digest(&self.encode()?))
    }
}

/// Canonical encoding of a JSON value: object keys sorted at every level,
/// no whitespace between tokens, UTF-8 output.
pub fn canonical_bytes(value: &Value) -> Result<Vec<u8>> {
    Ok(serde_json::to_vec(&canonicalize(value))?)
}

fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            let mut sorted = Map::new();
            for key in keys {
                sorted.insert(key.clone(), canonicalize(&map[key]));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Recompute the digest of `bytes` and compare it to `expected`.
///
/// A mismatch is reported as `false`, never as an error.
pub fn verify(expected: &Multihash, bytes: &[u8]) -> bool {
    expected.algorithm().digest(bytes) == *expected
}

struct Memo {
    hash: RefCell<Option<Multihash>>,
    parent: Option<Weak<Memo>>,
}

/// Memoized content hash of one resource.
#[derive(Clone)]
pub struct ContentAddress {
    label: String,
    source: Option<HashSource>,
    algorithm: Algorithm,
    memo: Rc<Memo>,
}

impl ContentAddress {
    /// Create a root address with a declared hash source.
    pub fn new(label: impl Into<String>, source: HashSource, algorithm: Algorithm) -> Self {
        Self::build(label.into(), Some(source), algorithm, None)
    }

    /// Create an address for a resource that cannot be hashed.
    pub fn unhashable(label: impl Into<String>, algorithm: Algorithm) -> Self {
        Self::build(label.into(), None, algorithm, None)
    }

    /// Create an address whose dirty marks propagate into `self`.
    pub fn beneath(&self, label: impl Into<String>, source: HashSource) -> Self {
        Self::build(
            label.into(),
            Some(source),
            self.algorithm,
            Some(Rc::downgrade(&self.memo)),
        )
    }

    /// Create an address that shares this address's parent.
    pub fn sibling(&self, label: impl Into<String>, source: HashSource) -> Self {
        Self::build(
            label.into(),
            Some(source),
            self.algorithm,
            self.memo.parent.clone(),
        )
    }

    /// Digest with `algorithm` instead of the inherited one.
    pub fn with_algorithm(mut self, algorithm: Algorithm) -> Self {
        self.algorithm = algorithm;
        self.memo.hash.replace(None);
        self
    }

    fn build(
        label: String,
        source: Option<HashSource>,
        algorithm: Algorithm,
        parent: Option<Weak<Memo>>,
    ) -> Self {
        Self {
            label,
            source,
            algorithm,
            memo: Rc::new(Memo {
                hash: RefCell::new(None),
                parent,
            }),
        }
    }

    pub fn source(&self) -> Option<HashSource> {
        self.source
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    /// The memoized hash, if one is current.
    pub fn cached(&self) -> Option<Multihash> {
        *self.memo.hash.borrow()
    }

    /// Clear the memo here and on every ancestor.
    pub fn mark_dirty(&self) {
        self.memo.hash.replace(None);
        let mut parent = self.memo.parent.as_ref().and_then(Weak::upgrade);
        while let Some(memo) = parent {
            memo.hash.replace(None);
            parent = memo.parent.as_ref().and_then(Weak::upgrade);
        }
    }

    /// Return the memoized hash, computing it from `input` if dirty.
    pub fn hash_with<F>(&self, input: F) -> Result<Multihash>
    where
        F: FnOnce() -> Result<HashInput>,
    {
        let source = self
            .source
            .ok_or_else(|| Error::no_hash_source(&self.label))?;

        if let Some(hash) = self.cached() {
            return Ok(hash);
        }

        let input = input()?;
        if input.source() != source {
            return Err(Error::configuration(format!(
                "{} declares a {} hash source but produced {}",
                self.label,
                source.as_str(),
                input.source().as_str()
            )));
        }

        let hash = input.digest(self.algorithm)?;
        self.memo.hash.replace(Some(hash));
        Ok(hash)
    }
}

impl fmt::Debug for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ContentAddress")
            .field("label", &self.label)
            .field("source", &self.source)
            .field("cached", &self.cached())
            .finish()
    }
}

/// A resource with a memoized content hash.
pub trait Addressable {
    fn address(&self) -> &ContentAddress;

    /// Produce the material for the declared hash source.
    fn hash_input(&self) -> Result<HashInput>;

    fn hash(&self) -> Result<Multihash> {
        self.address().hash_with(|| self.hash_input())
    }

    fn mark_dirty(&self) {
        self.address().mark_dirty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hash::digest;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_canonical_bytes_sorted_and_compact() {
        let value = json!({"b": 1, "a": {"z": [1, 2], "y": null}});
        let bytes = canonical_bytes(&value).unwrap();
        assert_eq!(
            String::from_utf8(bytes).unwrap(),
            r#"{"a":{"y":null,"z":[1,2]},"b":1}"#
        );
    }

    #[test]
    fn test_canonical_bytes_keeps_utf8() {
        let bytes = canonical_bytes(&json!({"k": "é"})).unwrap();
        assert_eq!(bytes, "{\"k\":\"é\"}".as_bytes());
    }

    #[test]
    fn test_child_hashes_concatenate_strings() {
        let a = digest(b"a");
        let b = digest(b"b");
        let input = HashInput::ChildHashes(vec![a, b]);
        let expected = format!("{}{}", a, b).into_bytes();
        assert_eq!(input.encode().unwrap(), expected);
    }

    #[test]
    fn test_canonical_dicts_concatenate() {
        let input = HashInput::CanonicalDict(vec![json!({"version": "v0"}), json!({"b": 2, "a": 1})]);
        assert_eq!(
            input.encode().unwrap(),
            br#"{"version":"v0"}{"a":1,"b":2}"#.to_vec()
        );
    }

    #[test]
    fn test_hash_is_memoized() {
        let address = ContentAddress::new("blob", HashSource::Bytes, Algorithm::Sha2_256);
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(HashInput::Bytes(b"payload".to_vec()))
        };

        let first = address.hash_with(compute).unwrap();
        let second = address.hash_with(compute).unwrap();
        assert_eq!(first, second);
        assert_eq!(first, digest(b"payload"));
        assert_eq!(calls.get(), 1);

        address.mark_dirty();
        address.hash_with(compute).unwrap();
        assert_eq!(calls.get(), 2);
    }

    #[test]
    fn test_dirty_propagates_to_ancestors() {
        let root = ContentAddress::new("ns", HashSource::ChildHashes, Algorithm::Sha2_256);
        let mid = root.beneath("ns/manifest", HashSource::CanonicalDict);
        let leaf = mid.beneath("ns/manifest/a.txt", HashSource::Bytes);

        root.hash_with(|| Ok(HashInput::ChildHashes(vec![digest(b"x")])))
            .unwrap();
        mid.hash_with(|| Ok(HashInput::CanonicalDict(vec![json!({})])))
            .unwrap();
        leaf.hash_with(|| Ok(HashInput::Bytes(vec![1, 2, 3]))).unwrap();
        assert!(root.cached().is_some());
        assert!(mid.cached().is_some());

        leaf.mark_dirty();
        assert!(leaf.cached().is_none());
        assert!(mid.cached().is_none());
        assert!(root.cached().is_none());
    }

    #[test]
    fn test_unhashable_is_fatal() {
        let address = ContentAddress::unhashable("domain", Algorithm::Sha2_256);
        let err = address
            .hash_with(|| Ok(HashInput::Bytes(Vec::new())))
            .unwrap_err();
        assert!(matches!(err, Error::NoHashSource { .. }));
    }

    #[test]
    fn test_source_mismatch_is_configuration_error() {
        let address = ContentAddress::new("blob", HashSource::Bytes, Algorithm::Sha2_256);
        let err = address
            .hash_with(|| Ok(HashInput::ChildHashes(Vec::new())))
            .unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
    }

    #[test]
    fn test_verify_never_errors() {
        let hash = digest(b"original");
        assert!(verify(&hash, b"original"));
        assert!(!verify(&hash, b"tampered"));
        assert!(!verify(&hash, b""));
    }

    #[test]
    fn test_verify_uses_hash_algorithm() {
        let hash = Algorithm::Blake3.digest(b"data");
        assert!(verify(&hash, b"data"));
    }

    use proptest::prelude::*;

    proptest! {
        /// A hash verifies against the bytes it was computed from
        #[test]
        fn prop_hash_then_verify(data: Vec<u8>) {
            let address = ContentAddress::new("blob", HashSource::Bytes, Algorithm::Sha2_256);
            let hash = address.hash_with(|| Ok(HashInput::Bytes(data.clone())))?;
            prop_assert!(verify(&hash, &data));
        }

        /// Appending any byte breaks verification
        #[test]
        fn prop_modified_bytes_fail(data: Vec<u8>, extra: u8) {
            let hash = digest(&data);
            let mut modified = data.clone();
            modified.push(extra);
            prop_assert!(!verify(&hash, &modified));
        }
    }
}
