//! Entries: the leaves of a manifest, one physical blob each.

use crate::address::{self, Addressable, ContentAddress, HashInput, HashSource};
use crate::error::{Error, Result};
use crate::graph::{Identity, Node, NodeKind, Scope};
use crate::hash::Multihash;
use crate::record::EntryRecord;
use serde_json::{Map, Value};
use std::cell::OnceCell;

/// One logical file inside a manifest.
///
/// The stored record is immutable. `place` is resolved against the domain
/// root on first access and then cached.
#[derive(Debug)]
pub struct Entry {
    identity: Identity,
    scope: Scope,
    record: EntryRecord,
    stored: Multihash,
    address: ContentAddress,
    place: OnceCell<String>,
}

impl Entry {
    pub(crate) fn new(
        identity: Identity,
        scope: Scope,
        record: EntryRecord,
        manifest: &ContentAddress,
    ) -> Result<Self> {
        let stored = record.content_hash()?;
        let address = manifest
            .beneath(identity.path(), HashSource::Bytes)
            .with_algorithm(stored.algorithm());
        Ok(Self {
            identity,
            scope,
            record,
            stored,
            address,
            place: OnceCell::new(),
        })
    }

    pub fn record(&self) -> &EntryRecord {
        &self.record
    }

    pub fn size(&self) -> u64 {
        self.record.size
    }

    /// User metadata.
    pub fn meta(&self) -> &Map<String, Value> {
        &self.record.meta
    }

    /// System metadata.
    pub fn info(&self) -> &Map<String, Value> {
        &self.record.info
    }

    /// The multihash recorded in the manifest.
    pub fn stored_hash(&self) -> &Multihash {
        &self.stored
    }

    /// Directory markers carry no bytes of their own.
    pub fn is_sentinel(&self) -> bool {
        self.record.name.ends_with('/')
    }

    /// The readable location of this entry's bytes.
    pub fn place(&self) -> Result<&str> {
        if let Some(place) = self.place.get() {
            return Ok(place.as_str());
        }

        let context = self.scope.context();
        let namespace = self.scope.require(NodeKind::Namespace)?;
        let resolved = context.resolve_place(namespace, &self.record.place);
        if !context.resolver().exists(&resolved)? {
            return Err(Error::not_found("entry place", resolved));
        }
        Ok(self.place.get_or_init(|| resolved).as_str())
    }

    pub fn read_bytes(&self) -> Result<Vec<u8>> {
        let place = self.place()?;
        self.scope.context().resolver().read_bytes(place)
    }

    /// Rehash the bytes at `place` and compare with the stored multihash.
    pub fn verify(&self) -> Result<bool> {
        let data = self.read_bytes()?;
        let ok = address::verify(&self.stored, &data);
        if !ok {
            tracing::warn!(entry = self.identity.path(), "content does not match stored hash");
        }
        Ok(ok)
    }
}

impl Node for Entry {
    const KIND: NodeKind = NodeKind::Entry;

    fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl Addressable for Entry {
    fn address(&self) -> &ContentAddress {
        &self.address
    }

    fn hash_input(&self) -> Result<HashInput> {
        Ok(HashInput::Bytes(self.read_bytes()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, DomainConfig};
    use crate::graph::Container;
    use crate::hash::digest;
    use std::fs;
    use tempfile::TempDir;

    fn publish(domain: &Domain, records: Vec<EntryRecord>) -> Multihash {
        let namespace = domain.namespace("alice/pkg").unwrap();
        let mut builder = namespace.builder();
        for record in records {
            builder = builder.entry(record);
        }
        let manifest = builder.build().unwrap();
        namespace.put(&manifest).unwrap();
        manifest.hash().unwrap()
    }

    #[test]
    fn test_relative_place_resolves_under_namespace() {
        let temp_dir = TempDir::new().unwrap();
        let domain = Domain::init(temp_dir.path(), DomainConfig::default()).unwrap();
        let data_dir = temp_dir.path().join("alice/pkg");
        fs::create_dir_all(&data_dir).unwrap();
        fs::write(data_dir.join("a.txt"), b"hello").unwrap();

        let record = EntryRecord::new("a.txt", "a.txt", 5, &digest(b"hello"));
        let hash = publish(&domain, vec![record]);

        let manifest = domain
            .namespace("alice/pkg")
            .unwrap()
            .get(&hash.to_hex())
            .unwrap();
        let entry = manifest.get("a.txt").unwrap();
        assert_eq!(
            entry.place().unwrap(),
            data_dir.join("a.txt").display().to_string()
        );
        assert_eq!(entry.read_bytes().unwrap(), b"hello");
        assert!(entry.verify().unwrap());
        assert_eq!(entry.hash().unwrap(), digest(b"hello"));
    }

    #[test]
    fn test_absolute_place_used_directly() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let file = outside.path().join("b.bin");
        fs::write(&file, b"bytes").unwrap();

        let domain = Domain::init(temp_dir.path(), DomainConfig::default()).unwrap();
        let place = file.display().to_string();
        let record = EntryRecord::new("b.bin", place.clone(), 5, &digest(b"bytes"));
        let hash = publish(&domain, vec![record]);

        let manifest = domain
            .namespace("alice/pkg")
            .unwrap()
            .get(&hash.to_hex())
            .unwrap();
        let entry = manifest.get("b.bin").unwrap();
        assert_eq!(entry.place().unwrap(), place);
    }

    #[test]
    fn test_missing_place_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let domain = Domain::init(temp_dir.path(), DomainConfig::default()).unwrap();
        let record = EntryRecord::new("gone.txt", "gone.txt", 1, &digest(b"x"));
        let hash = publish(&domain, vec![record]);

        let manifest = domain
            .namespace("alice/pkg")
            .unwrap()
            .get(&hash.to_hex())
            .unwrap();
        let entry = manifest.get("gone.txt").unwrap();
        assert!(entry.place().unwrap_err().is_not_found());
    }

    #[test]
    fn test_verify_reports_tampering_as_false() {
        let temp_dir = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let file = outside.path().join("c.txt");
        fs::write(&file, b"original").unwrap();

        let domain = Domain::init(temp_dir.path(), DomainConfig::default()).unwrap();
        let record = EntryRecord::new(
            "c.txt",
            file.display().to_string(),
            8,
            &digest(b"original"),
        );
        let hash = publish(&domain, vec![record]);
        fs::write(&file, b"tampered").unwrap();

        let manifest = domain
            .namespace("alice/pkg")
            .unwrap()
            .get(&hash.to_hex())
            .unwrap();
        let entry = manifest.get("c.txt").unwrap();
        assert!(!entry.verify().unwrap());
        assert_eq!(entry.stored_hash(), &digest(b"original"));
    }
}
