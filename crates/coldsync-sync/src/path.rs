//! Mapping between local paths and remote keys
//!
//! Both sides meet in [`LogicalPath`]: a local path minus the root, or a key
//! minus the prefix and the layout's suffixes.

use crate::suffix::ObjectLayout;
use coldsync_types::{Error, LogicalPath, Result};
use std::path::{Component, Path, PathBuf};

/// Translates between one local root and one remote prefix
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathMapper {
    root: PathBuf,
    prefix: String,
    layout: ObjectLayout,
}

impl PathMapper {
    /// Create a mapper. The prefix is normalised: leading, trailing and
    /// duplicate separators are dropped.
    pub fn new<P: Into<PathBuf>>(root: P, prefix: &str, layout: ObjectLayout) -> Self {
        Self {
            root: root.into(),
            prefix: normalize_prefix(prefix),
            layout,
        }
    }

    /// Local root
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Normalised remote prefix, without trailing separator
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// Object layout
    pub fn layout(&self) -> ObjectLayout {
        self.layout
    }

    /// Prefix to list: `prefix/`, so that sibling prefixes never match
    pub fn list_prefix(&self) -> String {
        if self.prefix.is_empty() {
            String::new()
        } else {
            format!("{}/", self.prefix)
        }
    }

    /// Logical path of a local file or directory under the root.
    ///
    /// Fails with [`Error::Path`] if `local` is not under the root, climbs out
    /// of it with `..`, or is the root itself.
    pub fn logical_from_local(&self, local: &Path) -> Result<LogicalPath> {
        let relative = local.strip_prefix(&self.root).map_err(|_| {
            Error::path(
                local.display().to_string(),
                format!("not under root '{}'", self.root.display()),
            )
        })?;

        let mut segments = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(segment) => {
                    let segment = segment.to_str().ok_or_else(|| {
                        Error::path(local.display().to_string(), "path is not valid UTF-8")
                    })?;
                    segments.push(segment);
                }
                Component::CurDir => {}
                Component::ParentDir => segments.push(".."),
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::path(
                        local.display().to_string(),
                        "unexpected absolute component",
                    ));
                }
            }
        }

        LogicalPath::new(&segments.join("/"))
    }

    /// Local path of a logical path
    pub fn local_path(&self, logical: &LogicalPath) -> PathBuf {
        let mut path = self.root.clone();
        path.extend(logical.segments());
        path
    }

    /// Remote key of a logical path, with the layout's suffixes
    pub fn remote_key(&self, logical: &LogicalPath) -> String {
        let name = self.layout.append_suffixes(logical.as_str());
        if self.prefix.is_empty() {
            name
        } else {
            format!("{}/{}", self.prefix, name)
        }
    }

    /// Remote key of a local path
    pub fn to_remote_key(&self, local: &Path) -> Result<String> {
        Ok(self.remote_key(&self.logical_from_local(local)?))
    }

    /// Logical path of a remote key.
    ///
    /// Fails with [`Error::Path`] if the key is outside the prefix or does not
    /// carry exactly the layout's suffixes.
    pub fn logical_from_key(&self, key: &str) -> Result<LogicalPath> {
        let name = if self.prefix.is_empty() {
            key
        } else {
            key.strip_prefix(&self.prefix)
                .and_then(|rest| rest.strip_prefix('/'))
                .ok_or_else(|| Error::path(key, format!("not under prefix '{}'", self.prefix)))?
        };

        let name = self.layout.strip_known_suffixes(name).ok_or_else(|| {
            Error::path(
                key,
                format!("does not end in the {} suffixes", self.layout),
            )
        })?;

        LogicalPath::new(name)
    }

    /// Local path of a remote key
    pub fn to_local_path(&self, key: &str) -> Result<PathBuf> {
        Ok(self.local_path(&self.logical_from_key(key)?))
    }
}

fn normalize_prefix(prefix: &str) -> String {
    prefix
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}
