//! Catalog validation: schema conformance and identity uniqueness

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use jsonschema::JSONSchema;
use serde_json::Value;
use tracing::debug;

use crate::catalog::document::ClassDocument;
use crate::catalog::index::BY_CLASS_DIR;
use crate::catalog::LocalCatalog;
use crate::error::{CatalogError, Result};
use crate::profile::ProfileKey;

/// Outcome for one `by-class` file
#[derive(Debug, Clone, PartialEq)]
pub struct FileReport {
    /// Relative to the catalog root, e.g. `by-class/relay.json`
    pub file: String,
    pub profiles: usize,
    pub errors: Vec<String>,
}

impl FileReport {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// A repeated identity pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Duplicate {
    pub key: ProfileKey,
    pub first: String,
    pub also_in: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexCheck {
    Valid,
    Missing,
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    pub files: Vec<FileReport>,
    pub duplicates: Vec<Duplicate>,
    pub index: IndexCheck,
    /// Distinct identity pairs across all valid files
    pub total_profiles: usize,
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn error_count(&self) -> usize {
        let file_errors: usize = self.files.iter().map(|f| f.errors.len()).sum();
        let index_errors = usize::from(matches!(self.index, IndexCheck::Invalid(_)));
        file_errors + self.duplicates.len() + index_errors
    }

    pub fn passed(&self) -> bool {
        self.error_count() == 0
    }
}

fn compile_schema(schema_path: &Path) -> Result<JSONSchema> {
    let schema_error = |message: String| CatalogError::Schema {
        path: schema_path.to_path_buf(),
        message,
    };

    let content = fs::read_to_string(schema_path)
        .map_err(|e| schema_error(format!("cannot read schema: {}", e)))?;
    let schema: Value = serde_json::from_str(&content)
        .map_err(|e| schema_error(format!("invalid JSON: {}", e)))?;
    JSONSchema::compile(&schema).map_err(|e| schema_error(e.to_string()))
}

/// Schema violations as `"<message> (at <instance path>)"`
fn schema_errors(compiled: &JSONSchema, instance: &Value) -> Vec<String> {
    match compiled.validate(instance) {
        Ok(()) => Vec::new(),
        Err(errors) => errors
            .map(|e| {
                let path = e.instance_path.to_string();
                if path.is_empty() {
                    format!("schema validation failed: {}", e)
                } else {
                    format!("schema validation failed: {} (at {})", e, path)
                }
            })
            .collect(),
    }
}

/// Validate every `by-class/*.json` file under `catalog_dir` against the
/// profile schema, detect repeated identity pairs, and check that
/// `_index.json` parses.
///
/// An unreadable or uncompilable schema is an error; problems in the
/// catalog itself are collected into the report.
pub fn validate_catalog(catalog_dir: &Path, schema_path: &Path) -> Result<ValidationReport> {
    let compiled = compile_schema(schema_path)?;
    let catalog = LocalCatalog::new(catalog_dir);

    let mut files = Vec::new();
    let mut duplicates = Vec::new();
    let mut warnings = Vec::new();
    let mut owners: BTreeMap<ProfileKey, String> = BTreeMap::new();

    let class_files = catalog.class_files()?;
    if class_files.is_empty() {
        warnings.push(format!("no catalog files found in {}/", BY_CLASS_DIR));
    }

    for path in class_files {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let label = format!("{}/{}", BY_CLASS_DIR, name);
        debug!(file = %label, "validating");

        let mut report = FileReport {
            file: label.clone(),
            profiles: 0,
            errors: Vec::new(),
        };

        let content = fs::read_to_string(&path)?;
        let value: Value = match serde_json::from_str(&content) {
            Ok(value) => value,
            Err(e) => {
                report.errors.push(format!("invalid JSON: {}", e));
                files.push(report);
                continue;
            }
        };

        report.errors = schema_errors(&compiled, &value);
        if !report.is_ok() {
            files.push(report);
            continue;
        }

        let doc: ClassDocument = match serde_json::from_value(value) {
            Ok(doc) => doc,
            Err(e) => {
                report.errors.push(format!("not a class document: {}", e));
                files.push(report);
                continue;
            }
        };

        report.profiles = doc.profiles.len();
        for profile in &doc.profiles {
            let key = profile.key();
            match owners.get(&key) {
                Some(first) => duplicates.push(Duplicate {
                    key,
                    first: first.clone(),
                    also_in: label.clone(),
                }),
                None => {
                    owners.insert(key, label.clone());
                }
            }
        }
        files.push(report);
    }

    let index_path = catalog.class_index_path();
    let index = if !index_path.exists() {
        warnings.push("_index.json not found".to_string());
        IndexCheck::Missing
    } else {
        match serde_json::from_str::<Value>(&fs::read_to_string(&index_path)?) {
            Ok(_) => IndexCheck::Valid,
            Err(e) => IndexCheck::Invalid(e.to_string()),
        }
    };

    Ok(ValidationReport {
        files,
        duplicates,
        index,
        total_profiles: owners.len(),
        warnings,
    })
}
