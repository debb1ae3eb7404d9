//! Device profile model
//!
//! A profile describes the *shape* of one Indigo device type: which
//! capability flags it reports, which states it exposes and what primitive
//! type each state holds. It never carries instance values.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Identity of a device type across the whole catalog: `(pluginId, deviceTypeId)`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProfileKey {
    pub plugin_id: String,
    pub device_type_id: String,
}

impl ProfileKey {
    pub fn new(plugin_id: impl Into<String>, device_type_id: impl Into<String>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            device_type_id: device_type_id.into(),
        }
    }
}

impl fmt::Display for ProfileKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.plugin_id, self.device_type_id)
    }
}

/// Primitive type inferred from a state's current value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StateType {
    Boolean,
    Integer,
    Number,
    String,
}

impl StateType {
    /// Infer the type of a JSON value. Booleans are checked before numbers,
    /// integers before floats; everything else is a string.
    pub fn infer(value: &Value) -> Self {
        match value {
            Value::Bool(_) => StateType::Boolean,
            Value::Number(n) if n.is_i64() || n.is_u64() => StateType::Integer,
            Value::Number(_) => StateType::Number,
            _ => StateType::String,
        }
    }
}

/// `{"type": "..."}` descriptor stored for each state key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDescriptor {
    #[serde(rename = "type")]
    pub state_type: StateType,
}

impl From<StateType> for StateDescriptor {
    fn from(state_type: StateType) -> Self {
        Self { state_type }
    }
}

/// Who contributed a profile and when
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    pub contributed_by: String,
    /// `YYYY-MM-DD`
    pub discovered_at: String,
}

/// Privacy-scrubbed description of one device type
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub plugin_id: String,
    pub plugin_name: String,
    pub device_type_id: String,
    #[serde(default)]
    pub capabilities: BTreeMap<String, bool>,
    #[serde(default)]
    pub states: BTreeMap<String, StateDescriptor>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugin_config_keys: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_state_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_state_image_sel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ProfileMetadata>,
    /// Fields written by other tools; kept as-is on rewrite
    #[serde(flatten)]
    pub extra: BTreeMap<String, Value>,
}

impl DeviceProfile {
    pub fn key(&self) -> ProfileKey {
        ProfileKey::new(&self.plugin_id, &self.device_type_id)
    }

    /// Sort key for the canonical on-disk order
    pub fn sort_key(&self) -> (&str, &str) {
        (&self.plugin_id, &self.device_type_id)
    }
}
