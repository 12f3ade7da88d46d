//! # Quire Core
//!
//! A content-addressed data-package engine.
//!
//! Datasets are described by manifests: immutable tables of entries, each
//! entry naming one blob by location, size and multihash. A manifest is named
//! by its own content hash and published into a namespace, where mutable tags
//! (timestamps and "latest") point at manifest hashes. Pulling copies a
//! manifest's bytes into local storage and republishes it under a fresh hash.
//!
//! ## Features
//!
//! - Multihash digests (SHA2-256 by default, BLAKE3)
//! - Manifest hashes over canonical JSON, stable across storage formats
//! - Tag, hash and unique-prefix resolution
//! - Legacy row codec with percent-quoted physical keys
//! - JSON-lines and zstd columnar manifest tables
//! - Lineage log of every put and pull
//!
//! ## Example
//!
//! ```no_run
//! use quire_core::{Addressable, Container, Domain, DomainConfig};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let domain = Domain::init("./registry", DomainConfig::default())?;
//! let namespace = domain.namespace("alice/weather")?;
//!
//! // Describe a directory and publish it
//! let manifest = namespace
//!     .builder()
//!     .message("daily export")
//!     .add_dir(Path::new("./export"))?
//!     .build()?;
//! let tag = namespace.put(&manifest)?;
//! println!("published {} as {}", manifest.hash()?, tag);
//!
//! // Read it back through the moving tag
//! let latest = namespace.get("latest")?;
//! for name in latest.list()? {
//!     let entry = latest.get(&name)?;
//!     println!("{} {} bytes, intact={}", name, entry.size(), entry.verify()?);
//! }
//! # Ok(())
//! # }
//! ```

mod address;
mod codec;
mod domain;
mod entry;
mod error;
mod graph;
mod hash;
mod lineage;
mod manifest;
mod namespace;
mod record;
mod resolver;
mod table;

pub use address::{Addressable, ContentAddress, HashInput, HashSource, canonical_bytes, verify};
pub use codec::{Codec, Datum, FieldOptions, FieldSpec, MetaLift, format_date, quote, unquote};
pub use domain::{Context, Domain, DomainBuilder, DomainConfig, META_DIR};
pub use entry::Entry;
pub use error::{Error, Result};
pub use graph::{ChildDecl, Children, Container, Identity, KindTable, Node, NodeKind, Scope};
pub use hash::{Algorithm, Hasher, Multihash, digest};
pub use lineage::{Lineage, LineageEntry, Operation};
pub use manifest::{Manifest, ManifestBuilder};
pub use namespace::{
    ApproveAll, LATEST, Namespace, TagOptions, TagPolicy, validate_namespace, validate_tag,
};
pub use record::{EntryRecord, Hash3, Header, LegacyRecord, MANIFEST_VERSION, NAME_FIELD, Row};
pub use resolver::{LocalResolver, Locator, PathResolver, Stat};
pub use table::{ColumnBatch, FileTables, MemoryTable, Table, TableFormat, TabularStore};
