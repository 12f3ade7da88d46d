//! Locators and the path resolver capability.
//!
//! A locator is either a bare filesystem path or a `scheme://host/path` URI,
//! optionally carrying a `versionId` query parameter. [`LocalResolver`]
//! handles bare paths and `file://` URIs; other schemes are rejected.

use crate::error::{Error, Result};
use ignore::WalkBuilder;
use ignore::overrides::OverrideBuilder;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;
use url::Url;

/// A parsed locator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locator {
    raw: String,
    target: Target,
    version_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Target {
    Local(PathBuf),
    Remote { scheme: String },
}

impl Locator {
    pub fn parse(raw: &str) -> Result<Self> {
        if raw.is_empty() {
            return Err(Error::invalid_locator(raw, "empty locator"));
        }

        if !raw.contains("://") {
            return Ok(Self {
                raw: raw.to_string(),
                target: Target::Local(PathBuf::from(raw)),
                version_id: None,
            });
        }

        let url = Url::parse(raw).map_err(|e| Error::invalid_locator(raw, e.to_string()))?;
        let version_id = url
            .query_pairs()
            .find(|(key, _)| key == "versionId")
            .map(|(_, value)| value.into_owned());

        let target = if url.scheme() == "file" {
            let path = url
                .to_file_path()
                .map_err(|_| Error::invalid_locator(raw, "file URI has no local path"))?;
            Target::Local(path)
        } else {
            Target::Remote {
                scheme: url.scheme().to_string(),
            }
        };

        Ok(Self {
            raw: raw.to_string(),
            target,
            version_id,
        })
    }

    /// True for URIs and absolute filesystem paths.
    pub fn is_absolute(raw: &str) -> bool {
        raw.contains("://") || Path::new(raw).is_absolute()
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    pub fn local_path(&self) -> Option<&Path> {
        match &self.target {
            Target::Local(path) => Some(path),
            Target::Remote { .. } => None,
        }
    }

    pub fn scheme(&self) -> &str {
        match &self.target {
            Target::Local(_) => "file",
            Target::Remote { scheme } => scheme,
        }
    }

    pub fn version_id(&self) -> Option<&str> {
        self.version_id.as_deref()
    }
}

/// Size and system metadata of a stored object.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Stat {
    pub size: u64,
    pub version_id: Option<String>,
    pub mode: Option<u32>,
    /// Seconds since the Unix epoch.
    pub mtime: Option<f64>,
    /// Seconds since the Unix epoch.
    pub ctime: Option<f64>,
}

/// Resolves locators to bytes and metadata.
pub trait PathResolver {
    fn exists(&self, locator: &str) -> Result<bool>;

    fn read_bytes(&self, locator: &str) -> Result<Vec<u8>>;

    /// Create or overwrite the object at `locator`.
    fn write_bytes(&self, locator: &str, data: &[u8]) -> Result<()>;

    fn stat(&self, locator: &str) -> Result<Stat>;

    /// Names under `dir` matching a glob `pattern`, relative to `dir`, sorted.
    fn glob(&self, dir: &str, pattern: &str) -> Result<Vec<String>>;

    /// Join a relative name onto a directory locator.
    fn join(&self, dir: &str, name: &str) -> String {
        format!("{}/{}", dir.trim_end_matches('/'), name)
    }

    /// Copy bytes between locators and stat the copy.
    fn copy(&self, from: &str, to: &str) -> Result<Stat> {
        let data = self.read_bytes(from)?;
        self.write_bytes(to, &data)?;
        self.stat(to)
    }
}

/// Resolver for bare paths and `file://` URIs.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalResolver;

impl LocalResolver {
    pub fn new() -> Self {
        Self
    }

    fn local(&self, raw: &str) -> Result<(PathBuf, Locator)> {
        let locator = Locator::parse(raw)?;
        match locator.local_path() {
            Some(path) => Ok((path.to_path_buf(), locator)),
            None => Err(Error::unsupported_scheme(locator.scheme(), raw)),
        }
    }
}

impl PathResolver for LocalResolver {
    fn exists(&self, locator: &str) -> Result<bool> {
        let (path, _) = self.local(locator)?;
        Ok(path.exists())
    }

    fn read_bytes(&self, locator: &str) -> Result<Vec<u8>> {
        let (path, _) = self.local(locator)?;
        Ok(fs::read(path)?)
    }

    fn write_bytes(&self, locator: &str, data: &[u8]) -> Result<()> {
        let (path, _) = self.local(locator)?;
        let parent = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        fs::create_dir_all(&parent)?;

        // Write atomically using tempfile
        let mut temp_file = tempfile::NamedTempFile::new_in(&parent)?;
        temp_file.write_all(data)?;
        temp_file.flush()?;
        temp_file.persist(&path)?;

        Ok(())
    }

    fn stat(&self, locator: &str) -> Result<Stat> {
        let (path, locator) = self.local(locator)?;
        let metadata = fs::metadata(&path)?;
        let mtime = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_secs_f64());

        Ok(Stat {
            size: metadata.len(),
            version_id: locator.version_id().map(str::to_string),
            mode: file_mode(&metadata),
            mtime,
            ctime: change_time(&metadata),
        })
    }

    fn glob(&self, dir: &str, pattern: &str) -> Result<Vec<String>> {
        let (root, _) = self.local(dir)?;
        if !root.is_dir() {
            return Ok(Vec::new());
        }

        let mut builder = OverrideBuilder::new(&root);
        builder.add(pattern)?;
        let overrides = builder.build()?;
        let depth = pattern.split('/').filter(|s| !s.is_empty()).count();

        let walker = WalkBuilder::new(&root)
            .max_depth(Some(depth))
            .hidden(false)
            .ignore(false)
            .git_ignore(false)
            .git_global(false)
            .git_exclude(false)
            .parents(false)
            .build();

        let mut names = Vec::new();
        for entry in walker {
            let entry = entry?;
            if entry.depth() != depth {
                continue;
            }
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            if !overrides.matched(entry.path(), is_dir).is_whitelist() {
                continue;
            }
            let Ok(rel) = entry.path().strip_prefix(&root) else {
                continue;
            };
            let name = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            // In-flight atomic writes
            if name.split('/').any(|part| part.starts_with('.')) {
                continue;
            }
            names.push(name);
        }

        names.sort();
        Ok(names)
    }

    fn join(&self, dir: &str, name: &str) -> String {
        match Locator::parse(dir) {
            Ok(locator) if !dir.contains("://") => match locator.local_path() {
                Some(path) => path.join(name).display().to_string(),
                None => format!("{}/{}", dir.trim_end_matches('/'), name),
            },
            _ => format!("{}/{}", dir.trim_end_matches('/'), name),
        }
    }
}

/// Get the file mode (permissions) from metadata.
#[cfg(unix)]
fn file_mode(metadata: &fs::Metadata) -> Option<u32> {
    use std::os::unix::fs::PermissionsExt;
    Some(metadata.permissions().mode())
}

/// Get the file mode (Windows fallback).
#[cfg(not(unix))]
fn file_mode(_metadata: &fs::Metadata) -> Option<u32> {
    None
}

#[cfg(unix)]
fn change_time(metadata: &fs::Metadata) -> Option<f64> {
    use std::os::unix::fs::MetadataExt;
    Some(metadata.ctime() as f64 + metadata.ctime_nsec() as f64 / 1e9)
}

#[cfg(not(unix))]
fn change_time(metadata: &fs::Metadata) -> Option<f64> {
    metadata
        .created()
        .ok()
        .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
        .map(|d| d.as_secs_f64())
}
