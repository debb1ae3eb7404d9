//! Local catalog checkout

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::catalog::document::{ensure_unique_across, ClassDocument};
use crate::catalog::index::{reindex, CatalogIndexes, BY_CLASS_DIR};
use crate::catalog::merge::merge_into_file;
use crate::catalog::{KnownProfiles, KnownSet};
use crate::discovery::Discovery;
use crate::error::{CatalogError, Result};
use crate::profile::ProfileKey;

const CLASS_INDEX_FILE: &str = "_index.json";
const BY_PLUGIN_DIR: &str = "by-plugin";

/// Outcome of merging a discovery into a local catalog
#[derive(Debug)]
pub struct ApplyResult {
    /// `(file name, profiles in file after merge)`
    pub files: Vec<(String, usize)>,
    pub added: usize,
    /// Profiles already present in some class file
    pub skipped: usize,
    pub indexes: CatalogIndexes,
}

/// A catalog directory on disk (`catalog/` in the repository)
pub struct LocalCatalog {
    root: PathBuf,
}

impl LocalCatalog {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn by_class_dir(&self) -> PathBuf {
        self.root.join(BY_CLASS_DIR)
    }

    pub fn class_index_path(&self) -> PathBuf {
        self.root.join(CLASS_INDEX_FILE)
    }

    pub fn plugin_index_path(&self) -> PathBuf {
        self.root.join(BY_PLUGIN_DIR).join(CLASS_INDEX_FILE)
    }

    /// `by-class/*.json`, sorted by file name
    pub fn class_files(&self) -> Result<Vec<PathBuf>> {
        let dir = self.by_class_dir();
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let pattern = format!(
            "{}/*.json",
            glob::Pattern::escape(&dir.to_string_lossy())
        );
        let entries = glob::glob(&pattern).map_err(|e| CatalogError::ConfigParse {
            path: dir.clone(),
            message: e.to_string(),
        })?;

        let mut files = Vec::new();
        for entry in entries {
            let path = entry.map_err(|e| CatalogError::Io(e.into_error()))?;
            if path.is_file() {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    pub fn load_document(&self, file_name: &str) -> Result<Option<ClassDocument>> {
        let path = self.by_class_dir().join(file_name);
        if !path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&path)?;
        let doc = ClassDocument::from_json(&content).map_err(|e| CatalogError::ConfigParse {
            path: path.clone(),
            message: e.to_string(),
        })?;
        Ok(Some(doc))
    }

    /// Every class document, keyed by file name, sorted
    pub fn load_documents(&self) -> Result<Vec<(String, ClassDocument)>> {
        let mut docs = Vec::new();
        for path in self.class_files()? {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            if let Some(doc) = self.load_document(&name)? {
                docs.push((name, doc));
            }
        }
        Ok(docs)
    }

    pub fn write_document(&self, file_name: &str, doc: &ClassDocument) -> Result<()> {
        let dir = self.by_class_dir();
        fs::create_dir_all(&dir)?;
        fs::write(dir.join(file_name), doc.to_json()?)?;
        Ok(())
    }

    /// Rebuild `_index.json` and `by-plugin/_index.json` from the class files
    pub fn regenerate_indexes(&self, generated: NaiveDate) -> Result<CatalogIndexes> {
        let docs = self.load_documents()?;
        let indexes = reindex(docs.iter().map(|(f, d)| (f.as_str(), d)), generated);

        fs::create_dir_all(&self.root)?;
        fs::write(self.class_index_path(), indexes.class_index_json()?)?;

        let plugin_path = self.plugin_index_path();
        if let Some(parent) = plugin_path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&plugin_path, indexes.plugin_index_json()?)?;

        info!(
            classes = indexes.classes.classes.len(),
            plugins = indexes.plugins.plugins.len(),
            "regenerated catalog indexes"
        );
        Ok(indexes)
    }

    /// Merge a discovery into the class files, then regenerate both indexes.
    ///
    /// Profiles already present in any class file are skipped. Nothing is
    /// written if an identity pair would appear twice in one file or in two
    /// different files.
    pub fn apply(&self, discovery: &Discovery, generated: NaiveDate) -> Result<ApplyResult> {
        let mut documents: BTreeMap<String, ClassDocument> =
            self.load_documents()?.into_iter().collect();
        let known: BTreeSet<ProfileKey> =
            documents.values().flat_map(ClassDocument::keys).collect();

        let mut pending = discovery.clone();
        let skipped = pending.retain_unknown(&known);
        if skipped > 0 {
            debug!(skipped, "profiles already in catalog");
        }

        let mut changed = Vec::new();
        for (file, groups) in pending.by_file() {
            let Some(doc) = merge_into_file(documents.remove(file), groups) else {
                continue;
            };
            doc.ensure_unique(file)?;
            documents.insert(file.to_string(), doc);
            changed.push(file.to_string());
        }
        ensure_unique_across(documents.iter().map(|(f, d)| (f.as_str(), d)))?;

        let mut files = Vec::new();
        for file in changed {
            let Some(doc) = documents.get(&file) else {
                continue;
            };
            self.write_document(&file, doc)?;
            debug!(file = %file, profiles = doc.profiles.len(), "updated class file");
            files.push((file, doc.profiles.len()));
        }

        let indexes = self.regenerate_indexes(generated)?;
        Ok(ApplyResult {
            files,
            added: pending.total(),
            skipped,
            indexes,
        })
    }
}

impl KnownProfiles for LocalCatalog {
    fn known_profiles(&self) -> Result<KnownSet> {
        let keys: BTreeSet<_> = self
            .load_documents()?
            .iter()
            .flat_map(|(_, doc)| doc.keys())
            .collect();
        Ok(KnownSet::new(keys))
    }
}
