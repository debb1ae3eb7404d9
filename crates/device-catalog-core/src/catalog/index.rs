//! Derived index documents
//!
//! `_index.json` (per class) and `by-plugin/_index.json` (per plugin) are
//! rebuilt from scratch out of the class documents every time. They are never
//! patched in place.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::catalog::document::ClassDocument;
use crate::profile::ProfileKey;

/// Directory (relative to the catalog root) holding class documents
pub const BY_CLASS_DIR: &str = "by-class";

/// `catalog/_index.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassIndex {
    #[serde(default)]
    pub generated: String,
    #[serde(default)]
    pub classes: BTreeMap<String, ClassIndexEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassIndexEntry {
    #[serde(default)]
    pub file: String,
    #[serde(default)]
    pub profile_count: usize,
    #[serde(default)]
    pub plugins: BTreeMap<String, ClassIndexPlugin>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassIndexPlugin {
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub device_type_ids: Vec<String>,
}

/// `catalog/by-plugin/_index.json`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginIndex {
    #[serde(default)]
    pub generated: String,
    #[serde(default)]
    pub plugins: BTreeMap<String, PluginIndexEntry>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginIndexEntry {
    #[serde(default)]
    pub plugin_name: String,
    #[serde(default)]
    pub device_types: Vec<PluginDeviceType>,
}

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginDeviceType {
    pub base_class: String,
    pub device_type_id: String,
}

impl ClassIndex {
    /// Every identity pair the index knows about
    pub fn profile_keys(&self) -> BTreeSet<ProfileKey> {
        self.classes
            .values()
            .flat_map(|entry| entry.plugins.iter())
            .flat_map(|(plugin_id, plugin)| {
                plugin
                    .device_type_ids
                    .iter()
                    .map(move |dt| ProfileKey::new(plugin_id, dt))
            })
            .collect()
    }

    pub fn total_profiles(&self) -> usize {
        self.classes.values().map(|c| c.profile_count).sum()
    }
}

impl PluginIndex {
    pub fn total_device_types(&self) -> usize {
        self.plugins.values().map(|p| p.device_types.len()).sum()
    }
}

/// Both regenerated indexes
#[derive(Debug, Clone, PartialEq)]
pub struct CatalogIndexes {
    pub classes: ClassIndex,
    pub plugins: PluginIndex,
}

impl CatalogIndexes {
    pub fn class_index_json(&self) -> serde_json::Result<String> {
        to_pretty_json(&self.classes)
    }

    pub fn plugin_index_json(&self) -> serde_json::Result<String> {
        to_pretty_json(&self.plugins)
    }
}

fn to_pretty_json<T: Serialize>(value: &T) -> serde_json::Result<String> {
    let mut out = serde_json::to_string_pretty(value)?;
    out.push('\n');
    Ok(out)
}

/// Rebuild both indexes from `(file name, document)` pairs.
///
/// Documents are visited in file-name order regardless of the order given,
/// so the output depends only on the documents' content and `generated`.
pub fn reindex<'a, I>(documents: I, generated: NaiveDate) -> CatalogIndexes
where
    I: IntoIterator<Item = (&'a str, &'a ClassDocument)>,
{
    let stamp = generated.format("%Y-%m-%d").to_string();
    let mut ordered: Vec<(&str, &ClassDocument)> = documents.into_iter().collect();
    ordered.sort_by(|a, b| a.0.cmp(b.0));

    let mut classes = BTreeMap::new();
    let mut plugins: BTreeMap<String, PluginIndexEntry> = BTreeMap::new();

    for (file, doc) in ordered {
        let mut entry = ClassIndexEntry {
            file: format!("{}/{}", BY_CLASS_DIR, file),
            profile_count: doc.profiles.len(),
            plugins: BTreeMap::new(),
        };

        for profile in &doc.profiles {
            entry
                .plugins
                .entry(profile.plugin_id.clone())
                .or_insert_with(|| ClassIndexPlugin {
                    plugin_name: profile.plugin_name.clone(),
                    device_type_ids: Vec::new(),
                })
                .device_type_ids
                .push(profile.device_type_id.clone());

            plugins
                .entry(profile.plugin_id.clone())
                .or_insert_with(|| PluginIndexEntry {
                    plugin_name: profile.plugin_name.clone(),
                    device_types: Vec::new(),
                })
                .device_types
                .push(PluginDeviceType {
                    base_class: doc.base_class.clone(),
                    device_type_id: profile.device_type_id.clone(),
                });
        }

        classes.insert(doc.base_class.clone(), entry);
    }

    for entry in plugins.values_mut() {
        entry.device_types.sort();
    }

    CatalogIndexes {
        classes: ClassIndex {
            generated: stamp.clone(),
            classes,
        },
        plugins: PluginIndex {
            generated: stamp,
            plugins,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::document::tests::profile;
    use crate::catalog::merge::merge_profiles;
    use crate::device_class::DeviceClass;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    fn catalog() -> Vec<(String, ClassDocument)> {
        let relay = merge_profiles(
            None,
            DeviceClass::RelayDevice,
            vec![profile("b", "switch"), profile("a", "outlet"), profile("a", "plug")],
        );
        let dimmer = merge_profiles(
            None,
            DeviceClass::DimmerDevice,
            vec![profile("a", "bulb"), profile("c", "strip")],
        );
        vec![
            ("relay.json".to_string(), relay),
            ("dimmer.json".to_string(), dimmer),
        ]
    }

    fn run(docs: &[(String, ClassDocument)], generated: NaiveDate) -> CatalogIndexes {
        reindex(docs.iter().map(|(f, d)| (f.as_str(), d)), generated)
    }

    #[test]
    fn single_relay_scenario() {
        let relay = merge_profiles(None, DeviceClass::RelayDevice, vec![profile("x", "y")]);
        let docs = vec![("relay.json".to_string(), relay)];
        let idx = run(&docs, day(1));

        let entry = &idx.classes.classes["indigo.RelayDevice"];
        assert_eq!(entry.file, "by-class/relay.json");
        assert_eq!(entry.profile_count, 1);
        assert_eq!(entry.plugins["x"].device_type_ids, vec!["y"]);
        assert_eq!(idx.plugins.plugins["x"].device_types.len(), 1);
        assert_eq!(idx.classes.generated, "2024-06-01");
    }

    #[test]
    fn class_entries_follow_document_order() {
        let idx = run(&catalog(), day(1));
        let relay = &idx.classes.classes["indigo.RelayDevice"];
        assert_eq!(relay.profile_count, 3);
        assert_eq!(relay.plugins["a"].device_type_ids, vec!["outlet", "plug"]);
        assert_eq!(relay.plugins["a"].plugin_name, "a plugin");
    }

    #[test]
    fn plugin_index_is_sorted() {
        let idx = run(&catalog(), day(1));
        let ids: Vec<&String> = idx.plugins.plugins.keys().collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let a = &idx.plugins.plugins["a"].device_types;
        let pairs: Vec<(&str, &str)> = a
            .iter()
            .map(|d| (d.base_class.as_str(), d.device_type_id.as_str()))
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("indigo.DimmerDevice", "bulb"),
                ("indigo.RelayDevice", "outlet"),
                ("indigo.RelayDevice", "plug"),
            ]
        );
    }

    #[test]
    fn counts_agree() {
        let idx = run(&catalog(), day(1));
        assert_eq!(idx.plugins.total_device_types(), idx.classes.total_profiles());
        assert_eq!(idx.classes.total_profiles(), 5);
    }

    #[test]
    fn reindex_is_deterministic() {
        let docs = catalog();
        let first = run(&docs, day(1));
        let second = run(&docs, day(1));
        assert_eq!(first.class_index_json().unwrap(), second.class_index_json().unwrap());
        assert_eq!(first.plugin_index_json().unwrap(), second.plugin_index_json().unwrap());

        let mut reversed = docs.clone();
        reversed.reverse();
        assert_eq!(run(&reversed, day(1)), first);

        let later = run(&docs, day(2));
        assert_ne!(later.classes.generated, first.classes.generated);
        assert_eq!(later.classes.classes, first.classes.classes);
        assert_eq!(later.plugins.plugins, first.plugins.plugins);
    }

    #[test]
    fn profile_keys_roundtrip() {
        let idx = run(&catalog(), day(1));
        let keys = idx.classes.profile_keys();
        assert_eq!(keys.len(), 5);
        assert!(keys.contains(&ProfileKey::new("c", "strip")));
    }

    #[test]
    fn parses_index_json() {
        let raw = r#"{
            "generated": "2024-01-01",
            "classes": {
                "indigo.RelayDevice": {
                    "file": "by-class/relay.json",
                    "profileCount": 2,
                    "plugins": {
                        "x": {"pluginName": "X", "deviceTypeIds": ["y", "z"]}
                    }
                }
            }
        }"#;
        let idx: ClassIndex = serde_json::from_str(raw).unwrap();
        assert_eq!(idx.total_profiles(), 2);
        assert!(idx.profile_keys().contains(&ProfileKey::new("x", "z")));
    }
}
