//! # Resource identity.
//!
//! [`ResourceKey`] names one watchable resource by `{group, version, resource, namespace, name}`.
//! It is the map key for observers, subscriber sets and event logs.
//!
//! The canonical text form is the path `group/version/resource/namespace/name`,
//! which is what a remote transport would put in its URL.
//!
//! ```rust
//! use watchvisor::ResourceKey;
//!
//! let key = ResourceKey::new("core", "v1", "file", "default", "downloads");
//! assert_eq!(key.to_string(), "core/v1/file/default/downloads");
//! assert_eq!("core/v1/file/default/downloads".parse::<ResourceKey>().unwrap(), key);
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

/// Composite, immutable identity of a watchable resource.
///
/// Segments are cheap to clone (`Arc<str>`); equality and hashing cover all five.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceKey {
    group: Arc<str>,
    version: Arc<str>,
    resource: Arc<str>,
    namespace: Arc<str>,
    name: Arc<str>,
}

impl ResourceKey {
    /// Creates a key from its five segments.
    pub fn new(
        group: impl Into<Arc<str>>,
        version: impl Into<Arc<str>>,
        resource: impl Into<Arc<str>>,
        namespace: impl Into<Arc<str>>,
        name: impl Into<Arc<str>>,
    ) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            resource: resource.into(),
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    pub fn group(&self) -> &str {
        &self.group
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl fmt::Display for ResourceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}/{}/{}/{}",
            self.group, self.version, self.resource, self.namespace, self.name
        )
    }
}

/// A key path did not have exactly five `/`-separated segments.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed resource key {0:?}: expected group/version/resource/namespace/name")]
pub struct ParseKeyError(String);

impl FromStr for ResourceKey {
    type Err = ParseKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Vec<&str> = s.split('/').collect();
        match parts.as_slice() {
            [group, version, resource, namespace, name] => {
                Ok(Self::new(*group, *version, *resource, *namespace, *name))
            }
            _ => Err(ParseKeyError(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_segments_are_preserved() {
        let key: ResourceKey = "core/v1/file//root".parse().unwrap();
        assert_eq!(key.namespace(), "");
        assert_eq!(key.name(), "root");
        assert_eq!(key.to_string(), "core/v1/file//root");
    }

    #[test]
    fn wrong_segment_count_is_rejected() {
        assert!("core/v1/file".parse::<ResourceKey>().is_err());
        assert!("a/b/c/d/e/f".parse::<ResourceKey>().is_err());
    }
}
