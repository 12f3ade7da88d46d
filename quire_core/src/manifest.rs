//! Manifests: immutable, content-addressed tables of entries.
//!
//! A manifest's name is its own content hash, computed over the canonical
//! encoding of the header row followed by one `{logical_key, hash, size, meta}`
//! dict per entry row, in row order. Physical locations do not take part in
//! the hash, but system metadata does, so relaxing a manifest changes its
//! hash while every entry keeps its own content multihash.

use crate::address::{Addressable, ContentAddress, HashInput, HashSource};
use crate::entry::Entry;
use crate::error::{Error, Result};
use crate::graph::{Children, Container, Identity, Node, NodeKind, Scope};
use crate::hash::Multihash;
use crate::record::{hashed_entry_dict, validate_entry_name, EntryRecord, Header, Row, NAME_FIELD};
use crate::table::{MemoryTable, Table};
use serde_json::Value;
use std::fs;
use std::path::Path;

/// A content-addressed table of entries plus header metadata.
pub struct Manifest {
    identity: Identity,
    scope: Scope,
    table: Box<dyn Table>,
    header: Header,
    address: ContentAddress,
    children: Children<Entry>,
}

impl Manifest {
    /// Hash `table` and bind it under the name the hash produces.
    pub(crate) fn assemble<F>(
        identity_for: F,
        scope: &Scope,
        address: ContentAddress,
        table: Box<dyn Table>,
    ) -> Result<Self>
    where
        F: FnOnce(&str) -> Identity,
    {
        let header = Header::from_row(table.header().clone())
            .map_err(|e| Error::schema("header", e.to_string()))?;
        let hash = address.hash_with(|| hash_input(table.as_ref()))?;
        let name = hash.to_hex();

        Ok(Self {
            identity: identity_for(&name),
            scope: scope.with(NodeKind::Manifest, name.as_str()),
            table,
            header,
            address,
            children: Children::new(),
        })
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn message(&self) -> Option<&str> {
        self.header.message.as_deref()
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Entry names in row order.
    pub fn names(&self) -> Vec<String> {
        self.table.names()
    }

    /// Header row followed by the legacy entry rows, as persisted.
    pub fn sequence(&self) -> Vec<Row> {
        std::iter::once(self.table.header().clone())
            .chain(self.table.rows().iter().cloned())
            .collect()
    }

    /// Decode every row into an internal record.
    pub fn records(&self) -> Result<Vec<EntryRecord>> {
        let codec = self.scope.context().codec();
        self.table
            .rows()
            .iter()
            .map(|row| EntryRecord::from_row(codec.decode(row)?))
            .collect()
    }

    /// Recompute the content hash from the rows and compare it to the name.
    pub fn verify(&self) -> Result<bool> {
        let named = Multihash::parse(self.name())?;
        let actual = hash_input(self.table.as_ref())?.digest(named.algorithm())?;
        Ok(actual == named)
    }

    /// Names of entries whose bytes no longer match their stored hash.
    pub fn verify_entries(&self) -> Result<Vec<String>> {
        let mut mismatched = Vec::new();
        for name in self.names() {
            let entry = self.get(&name)?;
            if !entry.is_sentinel() && !entry.verify()? {
                mismatched.push(name);
            }
        }
        Ok(mismatched)
    }

    /// Copy every entry's bytes into `dest_dir` and return a new manifest
    /// pointing at the copies. `self` is left untouched.
    pub fn relax(&self, dest_dir: &str) -> Result<Manifest> {
        let context = self.scope.context();
        let resolver = context.resolver();
        let codec = context.codec();
        let prior = self.hash()?;

        let mut rows = Vec::with_capacity(self.len());
        for name in self.names() {
            let entry = self.get(&name)?;
            if entry.is_sentinel() {
                if let Some(row) = self.table.row(&name) {
                    rows.push(row.clone());
                }
                continue;
            }

            validate_entry_name(&name)?;
            let target = resolver.join(dest_dir, &name);
            let stat = resolver.copy(entry.place()?, &target)?;
            if stat.size != entry.size() {
                tracing::warn!(entry = %name, expected = entry.size(), actual = stat.size, "relaxed size differs from record");
            }
            tracing::debug!(entry = %name, target = %target, size = stat.size, "relaxed");

            let mut record = entry.record().clone();
            record.place = target;
            if let Some(mode) = stat.mode {
                record.info.insert("mode".to_string(), Value::from(mode));
            }
            if let Some(mtime) = stat.mtime {
                record.info.insert("mtime".to_string(), Value::from(mtime));
            }
            if let Some(ctime) = stat.ctime {
                record.info.insert("ctime".to_string(), Value::from(ctime));
            }
            record.info.insert("tombstone".to_string(), Value::Bool(false));
            record
                .info
                .insert("prior".to_string(), Value::String(prior.to_hex()));
            rows.push(codec.encode(&record.to_row()?)?);
        }

        let table = MemoryTable::new(NAME_FIELD, self.table.header().clone(), rows)?;
        let address = self
            .address
            .sibling(format!("{} (relaxed)", self.path()), HashSource::CanonicalDict);
        let relaxed = Manifest::assemble(
            |name| self.identity.sibling(name),
            &self.scope,
            address,
            Box::new(table),
        )?;
        tracing::info!(prior = %prior, hash = relaxed.name(), dest_dir, "relaxed manifest");
        Ok(relaxed)
    }
}

fn hash_input(table: &dyn Table) -> Result<HashInput> {
    let mut dicts = Vec::with_capacity(table.len() + 1);
    dicts.push(Value::Object(table.header().clone()));
    for row in table.rows() {
        dicts.push(hashed_entry_dict(row)?);
    }
    Ok(HashInput::CanonicalDict(dicts))
}

impl Node for Manifest {
    const KIND: NodeKind = NodeKind::Manifest;

    fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl Container for Manifest {
    type Child = Entry;

    fn children(&self) -> &Children<Entry> {
        &self.children
    }

    fn construct(&self, key: &str) -> Result<Entry> {
        let context = self.scope.context();
        context.kinds().expect_child(Self::KIND, Entry::KIND)?;

        let row = self
            .table
            .row(key)
            .ok_or_else(|| Error::not_found("entry", key))?;
        let record = EntryRecord::from_row(context.codec().decode(row)?)?;
        Entry::new(
            self.identity.child(key),
            self.scope.with(NodeKind::Entry, key),
            record,
            &self.address,
        )
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.names())
    }
}

impl Addressable for Manifest {
    fn address(&self) -> &ContentAddress {
        &self.address
    }

    fn hash_input(&self) -> Result<HashInput> {
        hash_input(self.table.as_ref())
    }
}

impl std::fmt::Debug for Manifest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Manifest")
            .field("path", &self.identity.path())
            .field("entries", &self.table.len())
            .finish()
    }
}

/// Assembles a new manifest for a namespace.
pub struct ManifestBuilder {
    identity: Identity,
    scope: Scope,
    address: ContentAddress,
    header: Header,
    records: Vec<EntryRecord>,
}

impl ManifestBuilder {
    pub(crate) fn new(identity: Identity, scope: Scope, address: ContentAddress) -> Self {
        Self {
            identity,
            scope,
            address,
            header: Header::default(),
            records: Vec::new(),
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.header.message = Some(message.into());
        self
    }

    pub fn user_meta(mut self, meta: Value) -> Self {
        self.header.user_meta = Some(meta);
        self
    }

    pub fn entry(mut self, record: EntryRecord) -> Self {
        self.records.push(record);
        self
    }

    /// Hash a local file and add it under `name`.
    pub fn add_file(self, name: impl Into<String>, path: &Path) -> Result<Self> {
        let path = fs::canonicalize(path)?;
        let size = fs::metadata(&path)?.len();
        let algorithm = self.scope.context().config().algorithm;
        let hash = algorithm.digest_file(&path)?;
        let record = EntryRecord::new(name, path.display().to_string(), size, &hash);
        Ok(self.entry(record))
    }

    /// Add every file below `dir`, named by its `/`-separated relative path.
    ///
    /// `.gitignore` rules are respected inside git checkouts.
    pub fn add_dir(mut self, dir: &Path) -> Result<Self> {
        let walker = ignore::WalkBuilder::new(dir)
            .hidden(false)
            .git_ignore(true)
            .filter_entry(|entry| entry.file_name() != ".git")
            .build();

        let mut files = Vec::new();
        for entry in walker {
            let entry = entry?;
            if !entry.file_type().is_some_and(|t| t.is_file()) {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(dir) else {
                continue;
            };
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            files.push((name, entry.into_path()));
        }
        files.sort();

        for (name, path) in files {
            self = self.add_file(name, &path)?;
        }
        Ok(self)
    }

    pub fn build(self) -> Result<Manifest> {
        let codec = self.scope.context().codec();
        let rows = self
            .records
            .iter()
            .map(|record| codec.encode(&record.to_row()?))
            .collect::<Result<Vec<_>>>()?;
        let table = MemoryTable::new(NAME_FIELD, self.header.to_row()?, rows)?;

        let address = self.address.beneath(
            format!("{}/<new>", self.identity.path()),
            HashSource::CanonicalDict,
        );
        let identity = &self.identity;
        Manifest::assemble(|name| identity.child(name), &self.scope, address, Box::new(table))
    }
}
