//! Domains: the root of the graph, bound to one storage directory.
//!
//! ```text
//! <root>/
//!   config                                  version, algorithm, table format
//!   lineage                                 put/pull history
//!   .quire/named/<owner>/<name>/<tag>       tag files
//!   .quire/manifests/<owner>/<name>/<hash>.<jsonl|colz>
//!   <owner>/<name>/...                      installed entry bytes
//! ```

use crate::address::{Addressable, ContentAddress, HashInput};
use crate::codec::Codec;
use crate::error::{Error, Result};
use crate::graph::{Children, Container, Identity, KindTable, Node, NodeKind, Scope};
use crate::hash::{Algorithm, Multihash};
use crate::lineage::Lineage;
use crate::manifest::Manifest;
use crate::namespace::{validate_namespace, ApproveAll, Namespace, TagPolicy};
use crate::record::NAME_FIELD;
use crate::resolver::{Locator, LocalResolver, PathResolver};
use crate::table::{FileTables, TableFormat, TabularStore};
use std::fs;
use std::path::{Path, PathBuf};
use std::rc::Rc;

/// Directory under the root holding tags and manifests.
pub const META_DIR: &str = ".quire";

const CONFIG_FILE: &str = "config";
const LINEAGE_FILE: &str = "lineage";

/// Settings persisted in `<root>/config`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DomainConfig {
    /// Algorithm for newly computed hashes.
    pub algorithm: Algorithm,
    /// Serialization for newly stored manifests.
    pub format: TableFormat,
}

impl DomainConfig {
    pub fn to_file_contents(&self) -> String {
        format!(
            "version=1\nalgo={}\nformat={}\n",
            self.algorithm.as_str(),
            self.format.extension()
        )
    }

    /// Parse `key=value` lines; `#` comments and blank lines are skipped.
    pub fn parse(content: &str) -> Result<Self> {
        let mut version = None;
        let mut algo = None;
        let mut format = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }

            if let Some((key, value)) = line.split_once('=') {
                match key.trim() {
                    "version" => version = Some(value.trim()),
                    "algo" => algo = Some(value.trim()),
                    "format" => format = Some(value.trim()),
                    _ => {}
                }
            }
        }

        if version != Some("1") {
            return Err(Error::configuration(format!(
                "unsupported config version: {:?}",
                version
            )));
        }

        let algo = algo.ok_or_else(|| Error::configuration("missing algo in config"))?;
        Ok(Self {
            algorithm: Algorithm::parse(algo)?,
            format: format.map(TableFormat::parse).transpose()?.unwrap_or_default(),
        })
    }
}

/// Collaborators and settings shared by every node under one domain.
pub struct Context {
    root: String,
    config: DomainConfig,
    kinds: KindTable,
    resolver: Rc<dyn PathResolver>,
    tables: Rc<dyn TabularStore>,
    codec: Codec,
    policy: Rc<dyn TagPolicy>,
    lineage: Lineage,
}

impl Context {
    /// Locator of the domain root.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn config(&self) -> &DomainConfig {
        &self.config
    }

    pub fn kinds(&self) -> &KindTable {
        &self.kinds
    }

    pub fn resolver(&self) -> &dyn PathResolver {
        self.resolver.as_ref()
    }

    pub fn tables(&self) -> &dyn TabularStore {
        self.tables.as_ref()
    }

    pub fn codec(&self) -> &Codec {
        &self.codec
    }

    pub fn policy(&self) -> &dyn TagPolicy {
        self.policy.as_ref()
    }

    pub fn lineage(&self) -> &Lineage {
        &self.lineage
    }

    fn meta_dir(&self, section: &str, namespace: &str) -> String {
        let resolver = self.resolver();
        let base = resolver.join(&resolver.join(&self.root, META_DIR), section);
        resolver.join(&base, namespace)
    }

    pub fn tag_dir(&self, namespace: &str) -> String {
        self.meta_dir("named", namespace)
    }

    pub fn manifest_dir(&self, namespace: &str) -> String {
        self.meta_dir("manifests", namespace)
    }

    pub fn manifest_location(&self, namespace: &str, hash: &Multihash, format: TableFormat) -> String {
        self.resolver().join(
            &self.manifest_dir(namespace),
            &format!("{}.{}", hash.to_hex(), format.extension()),
        )
    }

    /// Where a namespace's installed bytes live, and what relative places
    /// resolve against. A root that already ends in the namespace is used as is.
    pub fn data_dir(&self, namespace: &str) -> String {
        let root = self.root.trim_end_matches('/');
        if root == namespace || root.ends_with(&format!("/{}", namespace)) {
            self.root.clone()
        } else {
            self.resolver().join(&self.root, namespace)
        }
    }

    /// Resolve an entry's recorded place to a locator.
    pub fn resolve_place(&self, namespace: &str, place: &str) -> String {
        if Locator::is_absolute(place) {
            place.to_string()
        } else {
            self.resolver().join(&self.data_dir(namespace), place)
        }
    }
}

/// Collaborators for [`Domain::init`] and [`Domain::open`].
pub struct DomainBuilder {
    kinds: KindTable,
    resolver: Rc<dyn PathResolver>,
    policy: Rc<dyn TagPolicy>,
    codec: Codec,
}

impl Default for DomainBuilder {
    fn default() -> Self {
        Self {
            kinds: KindTable::standard(),
            resolver: Rc::new(LocalResolver::new()),
            policy: Rc::new(ApproveAll),
            codec: Codec::legacy(),
        }
    }
}

impl DomainBuilder {
    pub fn kinds(mut self, kinds: KindTable) -> Self {
        self.kinds = kinds;
        self
    }

    pub fn resolver(mut self, resolver: Rc<dyn PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    pub fn policy(mut self, policy: Rc<dyn TagPolicy>) -> Self {
        self.policy = policy;
        self
    }

    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Create the domain directory and write its config.
    pub fn init<P: AsRef<Path>>(self, root: P, config: DomainConfig) -> Result<Domain> {
        self.kinds.validate()?;
        let root = root.as_ref();

        fs::create_dir_all(root.join(META_DIR).join("named"))?;
        fs::create_dir_all(root.join(META_DIR).join("manifests"))?;
        fs::write(root.join(CONFIG_FILE), config.to_file_contents())?;
        tracing::info!(root = %root.display(), algorithm = %config.algorithm, "initialized domain");

        self.build(root, config)
    }

    /// Open an existing domain directory.
    pub fn open<P: AsRef<Path>>(self, root: P) -> Result<Domain> {
        self.kinds.validate()?;
        let root = root.as_ref();

        if !root.is_dir() {
            return Err(Error::configuration(format!(
                "domain root does not exist: {}",
                root.display()
            )));
        }
        let config_path = root.join(CONFIG_FILE);
        if !config_path.exists() {
            return Err(Error::configuration(format!(
                "config file not found in {}",
                root.display()
            )));
        }
        let config = DomainConfig::parse(&fs::read_to_string(&config_path)?)?;

        self.build(root, config)
    }

    fn build(self, root: &Path, config: DomainConfig) -> Result<Domain> {
        let root: PathBuf = fs::canonicalize(root)?;
        let lineage = Lineage::open(root.join(LINEAGE_FILE))?;
        let tables: Rc<dyn TabularStore> =
            Rc::new(FileTables::new(Rc::clone(&self.resolver), NAME_FIELD));

        let context = Rc::new(Context {
            root: root.display().to_string(),
            config,
            kinds: self.kinds,
            resolver: self.resolver,
            tables,
            codec: self.codec,
            policy: self.policy,
            lineage,
        });

        let identity = Identity::root("domain", Some(context.root.clone()));
        let address = ContentAddress::unhashable(identity.path(), config.algorithm);
        Ok(Domain {
            identity,
            scope: Scope::root(context),
            address,
            children: Children::new(),
        })
    }
}

/// Root scope binding a storage directory to its namespaces.
#[derive(Debug)]
pub struct Domain {
    identity: Identity,
    scope: Scope,
    address: ContentAddress,
    children: Children<Namespace>,
}

impl Domain {
    pub fn builder() -> DomainBuilder {
        DomainBuilder::default()
    }

    /// Initialize a domain with the default collaborators.
    pub fn init<P: AsRef<Path>>(root: P, config: DomainConfig) -> Result<Self> {
        Self::builder().init(root, config)
    }

    pub fn open<P: AsRef<Path>>(root: P) -> Result<Self> {
        Self::builder().open(root)
    }

    pub fn context(&self) -> &Rc<Context> {
        self.scope.context()
    }

    pub fn config(&self) -> &DomainConfig {
        self.context().config()
    }

    pub fn root(&self) -> &str {
        self.context().root()
    }

    pub fn lineage(&self) -> &Lineage {
        self.context().lineage()
    }

    pub fn namespace(&self, name: &str) -> Result<Rc<Namespace>> {
        self.get(name)
    }

    /// Default install directory for pulls into `namespace`.
    pub fn install_dir(&self, namespace: &str) -> String {
        self.context().data_dir(namespace)
    }

    /// Install a manifest from another domain into `namespace`.
    pub fn pull(&self, remote: &Manifest, namespace: &str, no_copy: bool) -> Result<String> {
        let install_dir = self.install_dir(namespace);
        tracing::info!(namespace, remote = remote.path(), install_dir = %install_dir, "pulling manifest");
        self.namespace(namespace)?
            .pull(remote, &install_dir, no_copy)
    }
}

impl Node for Domain {
    const KIND: NodeKind = NodeKind::Domain;

    fn identity(&self) -> &Identity {
        &self.identity
    }
}

impl Container for Domain {
    type Child = Namespace;

    fn children(&self) -> &Children<Namespace> {
        &self.children
    }

    fn construct(&self, key: &str) -> Result<Namespace> {
        self.context()
            .kinds()
            .expect_child(Self::KIND, Namespace::KIND)?;
        validate_namespace(key)?;
        Ok(Namespace::new(
            self.identity.child(key),
            self.scope.with(NodeKind::Namespace, key),
            &self.address,
        ))
    }

    /// Namespaces that have at least one tag.
    fn list(&self) -> Result<Vec<String>> {
        let context = self.context();
        let resolver = context.resolver();
        let named = resolver.join(&resolver.join(context.root(), META_DIR), "named");
        let mut names = resolver
            .glob(&named, "*/*/*")?
            .into_iter()
            .filter_map(|path| {
                let mut parts = path.splitn(3, '/');
                match (parts.next(), parts.next()) {
                    (Some(owner), Some(name)) => Some(format!("{}/{}", owner, name)),
                    _ => None,
                }
            })
            .collect::<Vec<_>>();
        names.dedup();
        Ok(names)
    }
}

impl Addressable for Domain {
    fn address(&self) -> &ContentAddress {
        &self.address
    }

    fn hash_input(&self) -> Result<HashInput> {
        Err(Error::no_hash_source(self.identity.path()))
    }
}
