//! Profile extraction
//!
//! Turns one device record, as reported by the Indigo API, into a
//! [`DeviceProfile`]. Only structural metadata survives: capability flags,
//! state key types and configuration key names.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::device_class::{DeviceClass, CAPABILITY_PREFIX};
use crate::error::{CatalogError, Result};
use crate::profile::{DeviceProfile, ProfileKey, ProfileMetadata, StateDescriptor, StateType};

/// Protocol values that carry no information
const PROTOCOL_PLACEHOLDERS: &[&str] = &["unknown", "Plugin", "indigo.kProtocol.Plugin"];

/// Protocols recognizable from a plugin identifier, checked in order
const PROTOCOL_HINTS: &[&str] = &["zwave", "zigbee", "mqtt", "insteon"];

/// Attribute bag for one device, as returned by the Indigo HTTP API
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceRecord {
    attrs: Map<String, Value>,
}

impl DeviceRecord {
    pub fn new(attrs: Map<String, Value>) -> Self {
        Self { attrs }
    }

    /// Wrap a JSON value; non-objects become an empty record
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(attrs) => Self { attrs },
            _ => Self::default(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    pub fn attrs(&self) -> &Map<String, Value> {
        &self.attrs
    }

    fn str_attr(&self, key: &str) -> Option<&str> {
        self.attrs
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn id(&self) -> Option<i64> {
        self.attrs.get("id").and_then(Value::as_i64)
    }

    pub fn plugin_id(&self) -> Option<&str> {
        self.str_attr("pluginId")
    }

    pub fn device_type_id(&self) -> Option<&str> {
        self.str_attr("deviceTypeId")
            .or_else(|| self.str_attr("device_type_id"))
    }

    /// Identity pair, `None` when either half is missing
    pub fn key(&self) -> Option<ProfileKey> {
        Some(ProfileKey::new(self.plugin_id()?, self.device_type_id()?))
    }

    pub fn device_class(&self) -> DeviceClass {
        self.str_attr("class")
            .or_else(|| self.str_attr("deviceClass"))
            .map(DeviceClass::resolve)
            .unwrap_or(DeviceClass::Device)
    }
}

/// Inputs shared by every extraction in one discovery run
#[derive(Debug, Clone)]
pub struct ProfileContext {
    pub contributor: String,
    pub discovered_at: NaiveDate,
    /// pluginId -> display name; missing entries fall back to the id
    pub plugin_names: BTreeMap<String, String>,
}

impl ProfileContext {
    pub fn new(contributor: impl Into<String>, discovered_at: NaiveDate) -> Self {
        Self {
            contributor: contributor.into(),
            discovered_at,
            plugin_names: BTreeMap::new(),
        }
    }

    pub fn with_plugin_names(mut self, plugin_names: BTreeMap<String, String>) -> Self {
        self.plugin_names = plugin_names;
        self
    }

    pub fn plugin_name<'a>(&'a self, plugin_id: &'a str) -> &'a str {
        self.plugin_names
            .get(plugin_id)
            .map(String::as_str)
            .unwrap_or(plugin_id)
    }
}

/// Build a scrubbed profile from one device record
pub fn build_profile(device: &DeviceRecord, ctx: &ProfileContext) -> Result<DeviceProfile> {
    let plugin_id = device.plugin_id().unwrap_or_default();
    let device_type_id = device.device_type_id().unwrap_or_default();
    let fail = |message: &str| CatalogError::ExtractionFailed {
        plugin_id: plugin_id.to_string(),
        device_type_id: device_type_id.to_string(),
        message: message.to_string(),
    };

    if plugin_id.is_empty() || device_type_id.is_empty() {
        return Err(fail("device has no pluginId/deviceTypeId"));
    }

    let class = device.device_class();
    let capabilities = collect_capabilities(device, class);
    let states = collect_states(device).ok_or_else(|| fail("`states` is not an object"))?;
    let plugin_config_keys =
        collect_config_keys(device, plugin_id).ok_or_else(|| fail("`pluginProps` is not an object"))?;

    Ok(DeviceProfile {
        plugin_id: plugin_id.to_string(),
        plugin_name: ctx.plugin_name(plugin_id).to_string(),
        device_type_id: device_type_id.to_string(),
        capabilities,
        states,
        model: descriptive(device, "model"),
        sub_model: descriptive(device, "subModel"),
        protocol: extract_protocol(device),
        plugin_config_keys,
        display_state_id: descriptive(device, "displayStateId"),
        display_state_image_sel: descriptive(device, "displayStateImageSel"),
        metadata: Some(ProfileMetadata {
            contributed_by: ctx.contributor.clone(),
            discovered_at: ctx.discovered_at.format("%Y-%m-%d").to_string(),
        }),
        extra: BTreeMap::new(),
    })
}

/// Fixed per-class flags, unioned with any other boolean `supports*` attribute
fn collect_capabilities(device: &DeviceRecord, class: DeviceClass) -> BTreeMap<String, bool> {
    let mut capabilities = BTreeMap::new();

    for &name in class.capabilities() {
        match device.get(name) {
            None | Some(Value::Null) => {}
            Some(value) => {
                capabilities.insert(name.to_string(), truthy(value));
            }
        }
    }

    for (name, value) in device.attrs() {
        if !name.starts_with(CAPABILITY_PREFIX) || capabilities.contains_key(name) {
            continue;
        }
        if let Value::Bool(flag) = value {
            capabilities.insert(name.clone(), *flag);
        }
    }

    capabilities
}

fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn collect_states(device: &DeviceRecord) -> Option<BTreeMap<String, StateDescriptor>> {
    match device.get("states") {
        None | Some(Value::Null) => Some(BTreeMap::new()),
        Some(Value::Object(states)) => Some(
            states
                .iter()
                .map(|(key, value)| (key.clone(), StateType::infer(value).into()))
                .collect(),
        ),
        Some(_) => None,
    }
}

/// Sorted config key names: `pluginProps`, else `globalProps[pluginId]`
fn collect_config_keys(device: &DeviceRecord, plugin_id: &str) -> Option<Vec<String>> {
    let mut keys: Vec<String> = match device.get("pluginProps") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Object(props)) => props.keys().cloned().collect(),
        Some(_) => return None,
    };

    if keys.is_empty() {
        if let Some(Value::Object(scoped)) = device
            .get("globalProps")
            .and_then(|global| global.get(plugin_id))
        {
            keys = scoped.keys().cloned().collect();
        }
    }

    keys.sort();
    Some(keys)
}

/// Explicit protocol unless it is a placeholder, else a hint from the plugin id
pub fn extract_protocol(device: &DeviceRecord) -> Option<String> {
    if let Some(protocol) = device.get("protocol").and_then(scalar_string) {
        if !PROTOCOL_PLACEHOLDERS.contains(&protocol.as_str()) {
            return Some(protocol.to_lowercase());
        }
    }

    let plugin_id = device.plugin_id()?.to_lowercase();
    PROTOCOL_HINTS
        .iter()
        .find(|hint| plugin_id.contains(*hint))
        .map(|hint| hint.to_string())
}

fn descriptive(device: &DeviceRecord, key: &str) -> Option<String> {
    device.get(key).and_then(scalar_string)
}

fn scalar_string(value: &Value) -> Option<String> {
    let s = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => return None,
    };
    (!s.is_empty()).then_some(s)
}
