//! Class catalog documents (`catalog/by-class/*.json`)

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::device_class::{CommandSpec, DeviceClass};
use crate::error::{CatalogError, Result};
use crate::profile::{DeviceProfile, ProfileKey};

/// `$schema` reference written into new class documents
pub const PROFILE_SCHEMA_REF: &str = "../../schema/device-profile.schema.json";

/// All profiles for one device base class
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassDocument {
    #[serde(rename = "$schema", default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub base_class: String,
    #[serde(default)]
    pub class_capabilities: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class_commands: Option<BTreeMap<String, CommandSpec>>,
    #[serde(default)]
    pub profiles: Vec<DeviceProfile>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl ClassDocument {
    /// Empty document built from the fixed class tables
    pub fn for_class(class: DeviceClass) -> Self {
        Self {
            schema: Some(PROFILE_SCHEMA_REF.to_string()),
            base_class: class.catalog_name().to_string(),
            class_capabilities: class
                .capabilities()
                .iter()
                .map(|c| c.to_string())
                .collect(),
            class_commands: class.command_specs(),
            profiles: Vec::new(),
            extra: BTreeMap::new(),
        }
    }

    pub fn from_json(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }

    /// Pretty JSON with a trailing newline
    pub fn to_json(&self) -> Result<String> {
        let mut out = serde_json::to_string_pretty(self)?;
        out.push('\n');
        Ok(out)
    }

    pub fn keys(&self) -> BTreeSet<ProfileKey> {
        self.profiles.iter().map(DeviceProfile::key).collect()
    }

    pub fn contains(&self, key: &ProfileKey) -> bool {
        self.profiles
            .iter()
            .any(|p| p.plugin_id == key.plugin_id && p.device_type_id == key.device_type_id)
    }

    /// Identity pairs that occur more than once, in profile order
    pub fn duplicate_keys(&self) -> Vec<ProfileKey> {
        let mut seen = BTreeSet::new();
        let mut dups = Vec::new();
        for profile in &self.profiles {
            let key = profile.key();
            if !seen.insert(key.clone()) && !dups.contains(&key) {
                dups.push(key);
            }
        }
        dups
    }

    /// Fail with `DuplicateIdentity` on the first repeated identity pair
    pub fn ensure_unique(&self, file: &str) -> Result<()> {
        match self.duplicate_keys().into_iter().next() {
            Some(key) => Err(CatalogError::DuplicateIdentity {
                plugin_id: key.plugin_id,
                device_type_id: key.device_type_id,
                file: file.to_string(),
            }),
            None => Ok(()),
        }
    }

    pub fn is_sorted(&self) -> bool {
        self.profiles
            .windows(2)
            .all(|w| w[0].sort_key() <= w[1].sort_key())
    }
}

/// Identity pairs present in more than one document.
///
/// Returns `(key, first file, other file)` for each repeat, visiting documents
/// in the order given.
pub fn cross_document_duplicates<'a, I>(documents: I) -> Vec<(ProfileKey, String, String)>
where
    I: IntoIterator<Item = (&'a str, &'a ClassDocument)>,
{
    let mut owners: BTreeMap<ProfileKey, String> = BTreeMap::new();
    let mut dups = Vec::new();

    for (file, doc) in documents {
        for key in doc.keys() {
            match owners.get(&key) {
                Some(first) if first != file => {
                    dups.push((key, first.clone(), file.to_string()));
                }
                Some(_) => {}
                None => {
                    owners.insert(key, file.to_string());
                }
            }
        }
    }

    dups
}

/// Fail with `DuplicateIdentity` on the first identity pair that appears in
/// more than one document
pub fn ensure_unique_across<'a, I>(documents: I) -> Result<()>
where
    I: IntoIterator<Item = (&'a str, &'a ClassDocument)>,
{
    match cross_document_duplicates(documents).into_iter().next() {
        Some((key, first, other)) => Err(CatalogError::DuplicateIdentity {
            plugin_id: key.plugin_id,
            device_type_id: key.device_type_id,
            file: format!("{} and {}", first, other),
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::profile::ProfileMetadata;

    pub(crate) fn profile(plugin_id: &str, device_type_id: &str) -> DeviceProfile {
        DeviceProfile {
            plugin_id: plugin_id.to_string(),
            plugin_name: format!("{} plugin", plugin_id),
            device_type_id: device_type_id.to_string(),
            capabilities: BTreeMap::new(),
            states: BTreeMap::new(),
            model: None,
            sub_model: None,
            protocol: None,
            plugin_config_keys: Vec::new(),
            display_state_id: None,
            display_state_image_sel: None,
            metadata: Some(ProfileMetadata {
                contributed_by: "tester".to_string(),
                discovered_at: "2024-01-01".to_string(),
            }),
            extra: BTreeMap::new(),
        }
    }

    #[test]
    fn for_class_uses_tables() {
        let doc = ClassDocument::for_class(DeviceClass::RelayDevice);
        assert_eq!(doc.base_class, "indigo.RelayDevice");
        assert_eq!(doc.schema.as_deref(), Some(PROFILE_SCHEMA_REF));
        assert!(doc.class_capabilities.contains(&"supportsAllOff".to_string()));
        assert_eq!(doc.class_commands.as_ref().unwrap().len(), 4);

        let custom = ClassDocument::for_class(DeviceClass::Device);
        assert!(custom.class_commands.is_none());
    }

    #[test]
    fn serializes_catalog_field_names() {
        let mut doc = ClassDocument::for_class(DeviceClass::SensorDevice);
        doc.profiles.push(profile("p", "t"));
        let json: Value = serde_json::from_str(&doc.to_json().unwrap()).unwrap();

        assert_eq!(json["$schema"], PROFILE_SCHEMA_REF);
        assert_eq!(json["baseClass"], "indigo.SensorDevice");
        assert!(json["classCapabilities"].is_array());
        assert!(json["classCommands"].is_object());
        assert_eq!(json["profiles"][0]["deviceTypeId"], "t");
    }

    #[test]
    fn detects_duplicates() {
        let mut doc = ClassDocument::for_class(DeviceClass::RelayDevice);
        doc.profiles = vec![profile("a", "1"), profile("a", "2"), profile("a", "1")];
        assert_eq!(doc.duplicate_keys(), vec![ProfileKey::new("a", "1")]);
        assert!(matches!(
            doc.ensure_unique("relay.json"),
            Err(CatalogError::DuplicateIdentity { .. })
        ));

        doc.profiles.pop();
        assert!(doc.ensure_unique("relay.json").is_ok());
    }

    #[test]
    fn detects_cross_document_duplicates() {
        let mut relay = ClassDocument::for_class(DeviceClass::RelayDevice);
        relay.profiles = vec![profile("a", "1"), profile("b", "1")];
        let mut dimmer = ClassDocument::for_class(DeviceClass::DimmerDevice);
        dimmer.profiles = vec![profile("b", "1"), profile("c", "1")];

        let dups =
            cross_document_duplicates([("dimmer.json", &dimmer), ("relay.json", &relay)]);
        assert_eq!(dups.len(), 1);
        assert_eq!(dups[0].0, ProfileKey::new("b", "1"));
        assert_eq!(dups[0].1, "dimmer.json");
        assert_eq!(dups[0].2, "relay.json");

        let err = ensure_unique_across([("dimmer.json", &dimmer), ("relay.json", &relay)])
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Duplicate profile (b, 1) in dimmer.json and relay.json"
        );

        dimmer.profiles.remove(0);
        assert!(ensure_unique_across([("dimmer.json", &dimmer), ("relay.json", &relay)]).is_ok());
    }
}
