//! Namespaces: mutable tags over immutable manifests.
//!
//! A tag is a small text file holding a manifest's content hash. Manifests
//! are stored under their own hash, so publishing identical content twice
//! writes the blob once and only adds a tag.

use crate::address::{Addressable, ContentAddress, HashInput, HashSource};
use crate::error::{Error, Result};
use crate::graph::{Children, Container, Identity, Node, NodeKind, Scope};
use crate::hash::Multihash;
use crate::lineage::Operation;
use crate::manifest::{Manifest, ManifestBuilder};
use crate::table::TableFormat;
use std::collections::BTreeSet;
use std::rc::Rc;

/// Tag that follows the newest publish.
pub const LATEST: &str = "latest";

/// Decides whether a publish may move the "latest" tag.
pub trait TagPolicy {
    fn approve(&self, namespace: &str, hash: &Multihash, tag: &str) -> bool;
}

/// Policy that approves every publish.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApproveAll;

impl TagPolicy for ApproveAll {
    fn approve(&self, _namespace: &str, _hash: &Multihash, _tag: &str) -> bool {
        true
    }
}

/// Options for [`Namespace::tag`] and [`Namespace::put_with`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagOptions {
    /// Explicit tag name; a fresh timestamp tag is allocated when `None`.
    pub name: Option<String>,
    pub update_latest: bool,
}

impl Default for TagOptions {
    fn default() -> Self {
        Self {
            name: None,
            update_latest: true,
        }
    }
}

impl TagOptions {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    /// Leave "latest" where it is.
    pub fn keep_latest(mut self) -> Self {
        self.update_latest = false;
        self
    }
}

/// Validate a tag name.
///
/// Tag names must not contain path separators or `..` and must not start
/// with a dot.
pub fn validate_tag(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_name("tag name cannot be empty"));
    }
    if name.contains("..") || name.contains('/') || name.contains('\\') {
        return Err(Error::invalid_name(format!(
            "tag name contains invalid characters: {}",
            name
        )));
    }
    if name.starts_with('.') {
        return Err(Error::invalid_name(format!(
            "tag name cannot start with a dot: {}",
            name
        )));
    }
    Ok(())
}

/// Validate an `owner/name` namespace name.
pub fn validate_namespace(name: &str) -> Result<()> {
    let segments: Vec<&str> = name.split('/').collect();
    if segments.len() != 2 {
        return Err(Error::invalid_name(format!(
            "namespace must look like owner/name: {}",
            name
        )));
    }
    for segment in segments {
        let valid_chars = segment
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
        if segment.is_empty() || segment.starts_with('.') || !valid_chars {
            return Err(Error::invalid_name(format!(
                "invalid namespace segment {:?} in {}",
                segment, name
            )));
        }
    }
    Ok(())
}

/// A named collection of tags resolving to manifest hashes.
#[derive(Debug)]
pub struct Namespace {
    identity: Identity,
    scope: Scope,
    address: ContentAddress,
    children: Children<Manifest>,
}

impl Namespace {
    pub(crate) fn new(identity: Identity, scope: Scope, domain: &ContentAddress) -> Self {
        let address = domain.beneath(identity.path(), HashSource::ChildHashes);
        Self {
            identity,
            scope,
            address,
            children: Children::new(),
        }
    }

    /// Directory holding this namespace's tag files.
    pub fn tag_dir(&self) -> String {
        self.scope.context().tag_dir(self.name())
    }

    /// Directory holding this namespace's manifest blobs.
    pub fn manifest_dir(&self) -> String {
        self.scope.context().manifest_dir(self.name())
    }

    /// Start a new manifest for this namespace.
    pub fn builder(&self) -> ManifestBuilder {
        ManifestBuilder::new(self.identity.clone(), self.scope.clone(), self.address.clone())
    }

    /// Resolve a tag, full hash, or unique hash prefix.
    pub fn resolve(&self, tag_or_hash: &str) -> Result<Multihash> {
        let context = self.scope.context();
        let resolver = context.resolver();

        if validate_tag(tag_or_hash).is_ok() {
            let tag_path = resolver.join(&self.tag_dir(), tag_or_hash);
            if resolver.exists(&tag_path)? {
                let content = resolver.read_bytes(&tag_path)?;
                let text = String::from_utf8_lossy(&content);
                return Multihash::parse(text.trim())
                    .map_err(|e| Error::corrupted(tag_path.as_str(), e.to_string()));
            }
        }

        let candidate = tag_or_hash.to_ascii_lowercase();
        if candidate.len() == context.config().algorithm.multihash_len() {
            return Multihash::parse(&candidate)
                .map_err(|_| Error::not_found("manifest", tag_or_hash));
        }

        if candidate.is_empty() || !candidate.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(Error::not_found("manifest", tag_or_hash));
        }

        let matches: BTreeSet<String> = resolver
            .glob(&self.manifest_dir(), &format!("{}*", candidate))?
            .into_iter()
            .filter_map(|name| name.split('.').next().map(str::to_string))
            .collect();
        tracing::debug!(prefix = %candidate, matches = matches.len(), "resolving hash prefix");

        let mut matches: Vec<String> = matches.into_iter().collect();
        match matches.len() {
            0 => Err(Error::not_found("manifest", tag_or_hash)),
            1 => Multihash::parse(&matches.remove(0)),
            _ => Err(Error::ambiguous_prefix(tag_or_hash, matches)),
        }
    }

    /// Location of the stored blob for `hash`, in whichever format it was written.
    fn locate(&self, hash: &Multihash) -> Result<Option<String>> {
        let context = self.scope.context();
        for format in TableFormat::ALL {
            let location = context.manifest_location(self.name(), hash, format);
            if context.resolver().exists(&location)? {
                return Ok(Some(location));
            }
        }
        Ok(None)
    }

    /// Load the stored manifest with content hash `hash`.
    pub fn load(&self, hash: &Multihash) -> Result<Manifest> {
        let context = self.scope.context();
        let location = self
            .locate(hash)?
            .ok_or_else(|| Error::not_found("manifest", hash.to_hex()))?;
        let table = context.tables().load(&location)?;

        let address = self
            .address
            .beneath(format!("{}/{}", self.path(), hash), HashSource::CanonicalDict)
            .with_algorithm(hash.algorithm());
        let identity = &self.identity;
        let manifest =
            Manifest::assemble(|name| identity.child(name), &self.scope, address, table)?;

        if manifest.name() != hash.to_hex() {
            return Err(Error::corrupted(
                location.as_str(),
                format!("content hashes to {}", manifest.name()),
            ));
        }
        Ok(manifest)
    }

    fn fresh_tag(&self) -> Result<String> {
        let resolver = self.scope.context().resolver();
        let dir = self.tag_dir();
        let mut timestamp = chrono::Utc::now().timestamp();
        while resolver.exists(&resolver.join(&dir, &timestamp.to_string()))? {
            timestamp += 1;
        }
        Ok(timestamp.to_string())
    }

    /// Point a tag at `hash` and, unless suppressed or declined by the tag
    /// policy, move "latest" too.
    ///
    /// Naming "latest" explicitly also goes through the policy, and a
    /// declined request is a configuration error.
    pub fn tag(&self, hash: &Multihash, options: &TagOptions) -> Result<String> {
        let context = self.scope.context();
        let resolver = context.resolver();
        let dir = self.tag_dir();

        let tag = match &options.name {
            Some(name) => {
                validate_tag(name)?;
                name.clone()
            }
            None => self.fresh_tag()?,
        };

        if tag == LATEST && !context.policy().approve(self.name(), hash, &tag) {
            return Err(Error::configuration(format!(
                "tag policy declined moving {} in {}",
                LATEST,
                self.name()
            )));
        }

        let content = hash.to_hex();
        resolver.write_bytes(&resolver.join(&dir, &tag), content.as_bytes())?;
        tracing::info!(namespace = self.name(), tag = %tag, hash = %hash, "tagged");

        if options.update_latest && tag != LATEST {
            if context.policy().approve(self.name(), hash, &tag) {
                resolver.write_bytes(&resolver.join(&dir, LATEST), content.as_bytes())?;
            } else {
                tracing::warn!(namespace = self.name(), tag = %tag, "tag policy kept latest unchanged");
            }
        }
        Ok(tag)
    }

    /// Publish `manifest` under a fresh tag and move "latest".
    pub fn put(&self, manifest: &Manifest) -> Result<String> {
        self.put_with(manifest, &TagOptions::default())
    }

    pub fn put_with(&self, manifest: &Manifest, options: &TagOptions) -> Result<String> {
        let context = self.scope.context();
        let hash = manifest.hash()?;

        if self.locate(&hash)?.is_none() {
            let location = context.manifest_location(self.name(), &hash, context.config().format);
            context.tables().write(&location, &manifest.sequence())?;
            self.address.mark_dirty();
            tracing::info!(namespace = self.name(), hash = %hash, entries = manifest.len(), "stored manifest");
        } else {
            tracing::debug!(namespace = self.name(), hash = %hash, "manifest already stored");
        }

        let tag = self.tag(&hash, options)?;
        context.lineage().record(
            Operation::Put,
            &hash,
            self.name(),
            format!("tag={},entries={}", tag, manifest.len()),
        )?;
        Ok(tag)
    }

    /// Publish a manifest from elsewhere, copying its bytes into
    /// `install_dir` unless `no_copy` is set.
    pub fn pull(&self, remote: &Manifest, install_dir: &str, no_copy: bool) -> Result<String> {
        let source = remote.hash()?;
        let (hash, tag) = if no_copy {
            (source, self.put(remote)?)
        } else {
            let relaxed = remote.relax(install_dir)?;
            (relaxed.hash()?, self.put(&relaxed)?)
        };

        tracing::info!(namespace = self.name(), source = %source, hash = %hash, no_copy, "pulled");
        self.scope.context().lineage().record(
            Operation::Pull,
            &hash,
            self.name(),
            format!("source={},tag={},copied={}", source, tag, !no_copy),
        )?;
        Ok(tag)
    }

    /// Every tag with the hash it points at, sorted by tag name.
    pub fn tags(&self) -> Result<Vec<(String, Multihash)>> {
        self.list()?
            .into_iter()
            .map(|tag| {
                let hash = self.resolve(&tag)?;
                Ok((tag, hash))
            })
            .collect()
    }

    /// Hashes of every stored manifest, sorted.
    pub fn manifests(&self) -> Result<Vec<Multihash>> {
        let names: BTreeSet<String> = self
            .scope
            .context()
            .resolver()
            .glob(&self.manifest_dir(), "*")?
            .into_iter()
            .filter_map(|name| name.split('.').next().map(str::to_string))
            .collect();
        names.iter().map(|name| Multihash::parse(name)).collect()
    }
}

impl Node for Namespace {
    const KIND: NodeKind = NodeKind::Namespace;

    fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl Container for Namespace {
    type Child = Manifest;

    fn children(&self) -> &Children<Manifest> {
        &self.children
    }

    fn construct(&self, key: &str) -> Result<Manifest> {
        self.scope
            .context()
            .kinds()
            .expect_child(Self::KIND, Manifest::KIND)?;
        let hash = self.resolve(key)?;
        self.load(&hash)
    }

    /// Tag names.
    fn list(&self) -> Result<Vec<String>> {
        self.scope.context().resolver().glob(&self.tag_dir(), "*")
    }

    /// Cached by resolved hash, so a moved tag never serves a stale manifest.
    fn get(&self, key: &str) -> Result<Rc<Manifest>> {
        self.scope
            .context()
            .kinds()
            .expect_child(Self::KIND, Manifest::KIND)?;
        let hash = self.resolve(key)?;
        self.children
            .get_or_try_insert(&hash.to_hex(), || self.load(&hash))
    }
}

impl Addressable for Namespace {
    fn address(&self) -> &ContentAddress {
        &self.address
    }

    fn hash_input(&self) -> Result<HashInput> {
        Ok(HashInput::ChildHashes(self.manifests()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Domain, DomainConfig};
    use crate::hash::digest;
    use crate::record::EntryRecord;
    use std::cell::Cell;
    use std::fs;
    use tempfile::TempDir;

    fn domain(dir: &TempDir) -> Domain {
        Domain::init(dir.path(), DomainConfig::default()).unwrap()
    }

    fn two_entry_manifest(namespace: &Namespace, source: &TempDir) -> Manifest {
        fs::write(source.path().join("one.csv"), b"a,b\n1,2\n").unwrap();
        fs::write(source.path().join("two.csv"), b"c,d\n3,4\n").unwrap();
        namespace
            .builder()
            .message("two files")
            .add_dir(source.path())
            .unwrap()
            .build()
            .unwrap()
    }

    fn single(namespace: &Namespace, content: &[u8]) -> Manifest {
        namespace
            .builder()
            .entry(EntryRecord::new(
                "x",
                "/nowhere/x",
                content.len() as u64,
                &digest(content),
            ))
            .build()
            .unwrap()
    }

    #[test]
    fn test_publish_writes_blob_and_tags() {
        let root = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        let domain = domain(&root);
        let namespace = domain.namespace("alice/pkg").unwrap();

        let manifest = two_entry_manifest(&namespace, &source);
        let hash = manifest.hash().unwrap();
        let tag = namespace.put(&manifest).unwrap();

        assert!(tag.parse::<i64>().is_ok());
        assert_eq!(namespace.manifests().unwrap(), vec![hash]);
        let tags = namespace.tags().unwrap();
        assert_eq!(tags.len(), 2);
        assert!(tags.contains(&(tag.clone(), hash)));
        assert!(tags.contains(&(LATEST.to_string(), hash)));

        let tag_file = std::path::Path::new(&namespace.tag_dir()).join(&tag);
        assert_eq!(fs::read_to_string(tag_file).unwrap(), hash.to_hex());

        let latest = namespace.get(LATEST).unwrap();
        assert_eq!(latest.hash().unwrap(), hash);
        assert_eq!(latest.names(), vec!["one.csv", "two.csv"]);
    }

    #[test]
    fn test_republish_only_retags() {
        let root = TempDir::new().unwrap();
        let domain = domain(&root);
        let namespace = domain.namespace("alice/pkg").unwrap();
        let manifest = single(&namespace, b"same");

        let first = namespace.put(&manifest).unwrap();
        let second = namespace.put(&manifest).unwrap();
        assert_ne!(first, second);
        assert_eq!(namespace.manifests().unwrap().len(), 1);
        assert_eq!(namespace.list().unwrap().len(), 3);
    }

    #[test]
    fn test_latest_follows_newest_publish() {
        let root = TempDir::new().unwrap();
        let domain = domain(&root);
        let namespace = domain.namespace("alice/pkg").unwrap();

        let v1 = single(&namespace, b"v1");
        let v2 = single(&namespace, b"v2");
        namespace.put(&v1).unwrap();
        assert_eq!(namespace.resolve(LATEST).unwrap(), v1.hash().unwrap());
        namespace.put(&v2).unwrap();
        assert_eq!(namespace.resolve(LATEST).unwrap(), v2.hash().unwrap());
        assert_eq!(namespace.get(LATEST).unwrap().hash().unwrap(), v2.hash().unwrap());
    }

    #[test]
    fn test_suppressed_latest_stays() {
        let root = TempDir::new().unwrap();
        let domain = domain(&root);
        let namespace = domain.namespace("alice/pkg").unwrap();

        let v1 = single(&namespace, b"v1");
        let v2 = single(&namespace, b"v2");
        namespace.put(&v1).unwrap();
        let tag = namespace
            .put_with(&v2, &TagOptions::named("candidate").keep_latest())
            .unwrap();
        assert_eq!(tag, "candidate");
        assert_eq!(namespace.resolve(LATEST).unwrap(), v1.hash().unwrap());
        assert_eq!(namespace.resolve("candidate").unwrap(), v2.hash().unwrap());
    }

    #[test]
    fn test_rejecting_policy_keeps_latest() {
        struct Reject(Cell<usize>);
        impl TagPolicy for Reject {
            fn approve(&self, _: &str, _: &Multihash, _: &str) -> bool {
                self.0.set(self.0.get() + 1);
                false
            }
        }

        let root = TempDir::new().unwrap();
        let domain = Domain::builder()
            .policy(Rc::new(Reject(Cell::new(0))))
            .init(root.path(), DomainConfig::default())
            .unwrap();
        let namespace = domain.namespace("alice/pkg").unwrap();
        namespace.put(&single(&namespace, b"v1")).unwrap();
        assert!(namespace.resolve(LATEST).unwrap_err().is_not_found());
    }

    #[test]
    fn test_explicit_latest_asks_policy() {
        struct Reject;
        impl TagPolicy for Reject {
            fn approve(&self, _: &str, _: &Multihash, _: &str) -> bool {
                false
            }
        }

        let root = TempDir::new().unwrap();
        let strict = Domain::builder()
            .policy(Rc::new(Reject))
            .init(root.path(), DomainConfig::default())
            .unwrap();
        let namespace = strict.namespace("alice/pkg").unwrap();
        let hash = digest(b"m");
        let err = namespace.tag(&hash, &TagOptions::named(LATEST)).unwrap_err();
        assert!(matches!(err, Error::Configuration { .. }));
        assert!(namespace.resolve(LATEST).unwrap_err().is_not_found());

        let other = TempDir::new().unwrap();
        let open = domain(&other);
        let namespace = open.namespace("alice/pkg").unwrap();
        assert_eq!(namespace.tag(&hash, &TagOptions::named(LATEST)).unwrap(), LATEST);
        assert_eq!(namespace.resolve(LATEST).unwrap(), hash);
    }

    #[test]
    fn test_fresh_tags_are_distinct() {
        let root = TempDir::new().unwrap();
        let domain = domain(&root);
        let namespace = domain.namespace("alice/pkg").unwrap();
        let hash = digest(b"m");

        let options = TagOptions::default();
        let a = namespace.tag(&hash, &options).unwrap();
        let b = namespace.tag(&hash, &options).unwrap();
        let c = namespace.tag(&hash, &options).unwrap();
        assert!(a != b && b != c && a != c);
    }

    #[test]
    fn test_resolve_literal_full_hash() {
        let root = TempDir::new().unwrap();
        let domain = domain(&root);
        let namespace = domain.namespace("alice/pkg").unwrap();

        let unknown = digest(b"never stored");
        assert_eq!(namespace.resolve(&unknown.to_hex()).unwrap(), unknown);
        assert!(namespace.get(&unknown.to_hex()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_resolve_prefix() {
        let root = TempDir::new().unwrap();
        let domain = domain(&root);
        let namespace = domain.namespace("alice/pkg").unwrap();

        let manifest = single(&namespace, b"only");
        let hash = manifest.hash().unwrap();
        namespace.put(&manifest).unwrap();

        let prefix = &hash.to_hex()[..12];
        assert_eq!(namespace.resolve(prefix).unwrap(), hash);
        assert_eq!(namespace.get(prefix).unwrap().name(), hash.to_hex());
    }

    #[test]
    fn test_resolve_ambiguous_prefix() {
        let root = TempDir::new().unwrap();
        let domain = domain(&root);
        let namespace = domain.namespace("alice/pkg").unwrap();
        namespace.put(&single(&namespace, b"one")).unwrap();
        namespace.put(&single(&namespace, b"two")).unwrap();

        // Every SHA2-256 multihash shares the "1220" prefix
        let err = namespace.resolve("1220").unwrap_err();
        assert!(matches!(err, Error::AmbiguousPrefix { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn test_resolve_unknown_tag_is_not_found() {
        let root = TempDir::new().unwrap();
        let domain = domain(&root);
        let namespace = domain.namespace("alice/pkg").unwrap();
        namespace.put(&single(&namespace, b"one")).unwrap();

        assert!(matches!(
            namespace.resolve("nope").unwrap_err(),
            Error::NotFound { .. }
        ));
        assert!(matches!(
            namespace.resolve("abcdef").unwrap_err(),
            Error::NotFound { .. }
        ));
    }

    #[test]
    fn test_get_caches_by_hash() {
        let root = TempDir::new().unwrap();
        let domain = domain(&root);
        let namespace = domain.namespace("alice/pkg").unwrap();
        let manifest = single(&namespace, b"one");
        let hash = manifest.hash().unwrap();
        namespace.put(&manifest).unwrap();

        let by_tag = namespace.get(LATEST).unwrap();
        let by_hash = namespace.get(&hash.to_hex()).unwrap();
        assert!(Rc::ptr_eq(&by_tag, &by_hash));
    }

    #[test]
    fn test_namespace_hash_tracks_stored_manifests() {
        let root = TempDir::new().unwrap();
        let domain = domain(&root);
        let namespace = domain.namespace("alice/pkg").unwrap();

        let empty = namespace.hash().unwrap();
        let v1 = single(&namespace, b"v1");
        namespace.put(&v1).unwrap();
        let after = namespace.hash().unwrap();
        assert_ne!(empty, after);
        assert_eq!(
            after,
            HashInput::ChildHashes(vec![v1.hash().unwrap()])
                .digest(crate::hash::Algorithm::Sha2_256)
                .unwrap()
        );
    }

    #[test]
    fn test_pull_relaxes_into_install_dir() {
        let remote_root = TempDir::new().unwrap();
        let local_root = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();
        let install = TempDir::new().unwrap();

        let remote = domain(&remote_root);
        let remote_ns = remote.namespace("bob/data").unwrap();
        let published = two_entry_manifest(&remote_ns, &source);
        remote_ns.put(&published).unwrap();
        let remote_manifest = remote_ns.get(LATEST).unwrap();

        let local = domain(&local_root);
        let local_ns = local.namespace("bob/data").unwrap();
        let install_dir = install.path().display().to_string();
        local_ns.pull(&remote_manifest, &install_dir, false).unwrap();

        let pulled = local_ns.get(LATEST).unwrap();
        assert_ne!(pulled.hash().unwrap(), remote_manifest.hash().unwrap());
        for name in pulled.names() {
            let entry = pulled.get(&name).unwrap();
            assert!(entry.place().unwrap().starts_with(&install_dir));
            assert!(entry.verify().unwrap());
        }

        let history = local.lineage().read_recent(10).unwrap();
        let operations: Vec<Operation> = history.iter().map(|e| e.operation).collect();
        assert_eq!(operations, vec![Operation::Put, Operation::Pull]);
    }

    #[test]
    fn test_pull_without_copy_keeps_hash() {
        let remote_root = TempDir::new().unwrap();
        let local_root = TempDir::new().unwrap();
        let source = TempDir::new().unwrap();

        let remote = domain(&remote_root);
        let remote_ns = remote.namespace("bob/data").unwrap();
        let published = two_entry_manifest(&remote_ns, &source);
        let hash = published.hash().unwrap();

        let local = domain(&local_root);
        let local_ns = local.namespace("bob/data").unwrap();
        local_ns.pull(&published, "unused", true).unwrap();
        assert_eq!(local_ns.resolve(LATEST).unwrap(), hash);
    }

    #[test]
    fn test_validate_tag() {
        assert!(validate_tag("latest").is_ok());
        assert!(validate_tag("1700000000").is_ok());
        assert!(validate_tag("v1.2").is_ok());
        assert!(validate_tag("").is_err());
        assert!(validate_tag("..").is_err());
        assert!(validate_tag("a/b").is_err());
        assert!(validate_tag("a\\b").is_err());
        assert!(validate_tag(".hidden").is_err());
    }

    #[test]
    fn test_validate_namespace() {
        assert!(validate_namespace("alice/pkg").is_ok());
        assert!(validate_namespace("alice/my-pkg_2.0").is_ok());
        assert!(validate_namespace("alice").is_err());
        assert!(validate_namespace("a/b/c").is_err());
        assert!(validate_namespace("alice/").is_err());
        assert!(validate_namespace("../pkg").is_err());
        assert!(validate_namespace("alice/p kg").is_err());
    }

    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig { cases: 32, ..ProptestConfig::default() })]

        /// Any full-length multihash resolves to itself when no tag shadows it
        #[test]
        fn prop_full_hash_resolves_unchanged(data: Vec<u8>) {
            let root = TempDir::new().unwrap();
            let domain = domain(&root);
            let namespace = domain.namespace("alice/pkg").unwrap();
            let hash = digest(&data);
            prop_assert_eq!(namespace.resolve(&hash.to_hex()).unwrap(), hash);
        }

        /// A prefix of the only stored manifest resolves to it
        #[test]
        fn prop_unique_prefix_resolves(data in any::<Vec<u8>>(), len in 5usize..68) {
            let root = TempDir::new().unwrap();
            let domain = domain(&root);
            let namespace = domain.namespace("alice/pkg").unwrap();
            let manifest = single(&namespace, &data);
            let hash = manifest.hash().unwrap();
            namespace.put(&manifest).unwrap();
            prop_assert_eq!(namespace.resolve(&hash.to_hex()[..len]).unwrap(), hash);
        }
    }
}
