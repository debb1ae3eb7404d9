//! Device catalog
//!
//! The catalog is a directory of per-class documents plus two derived index
//! files:
//!
//! ```text
//! catalog/
//!   _index.json            class -> {file, profileCount, plugins}
//!   by-class/<class>.json  profiles for one base class
//!   by-plugin/_index.json  plugin -> [{baseClass, deviceTypeId}]
//! ```
//!
//! `document` models a class file, `merge` appends profiles to one,
//! `index` regenerates both indexes, and `store` / `remote` read an existing
//! catalog from disk or from GitHub.

pub mod document;
pub mod index;
pub mod merge;
pub mod remote;
pub mod store;

use std::collections::BTreeSet;

use crate::error::Result;
use crate::profile::ProfileKey;

pub use document::{
    cross_document_duplicates, ensure_unique_across, ClassDocument, PROFILE_SCHEMA_REF,
};
pub use index::{
    reindex, CatalogIndexes, ClassIndex, ClassIndexEntry, ClassIndexPlugin, PluginDeviceType,
    PluginIndex, PluginIndexEntry, BY_CLASS_DIR,
};
pub use merge::{merge_into_file, merge_profiles, sort_profiles};
pub use remote::{RemoteCatalog, RemoteCatalogConfig};
pub use store::{ApplyResult, LocalCatalog};

/// Identity pairs already present in a catalog
#[derive(Debug, Clone, Default)]
pub struct KnownSet {
    pub keys: BTreeSet<ProfileKey>,
    /// Set when the reader fell back to an empty set
    pub warning: Option<String>,
}

impl KnownSet {
    pub fn new(keys: BTreeSet<ProfileKey>) -> Self {
        Self {
            keys,
            warning: None,
        }
    }

    pub fn degraded(warning: impl Into<String>) -> Self {
        Self {
            keys: BTreeSet::new(),
            warning: Some(warning.into()),
        }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Source of already-cataloged identity pairs
pub trait KnownProfiles {
    fn known_profiles(&self) -> Result<KnownSet>;
}
