//! Indigo server access
//!
//! [`DeviceHost`] is the seam between discovery and wherever device records
//! come from. [`IndigoClient`] implements it over Indigo's v2 HTTP API.

use std::collections::BTreeMap;

use reqwest::blocking::Client;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::{CatalogError, Result};
use crate::extractor::DeviceRecord;
use crate::http::{build_client, send_json};

pub const DEFAULT_PORT: u16 = 8176;

const DEVICES_PATH: &str = "/v2/api/indigo.devices.json";
const PLUGINS_PATH: &str = "/v2/api/indigo.plugins.json";

/// A source of device records
pub trait DeviceHost {
    /// Every device the host knows about (possibly abbreviated records)
    fn devices(&self) -> Result<Vec<DeviceRecord>>;

    /// Full attributes for one device. Hosts that already return full
    /// records from [`devices`](Self::devices) can keep the default.
    fn device_detail(&self, device: &DeviceRecord) -> Result<DeviceRecord> {
        Ok(device.clone())
    }

    /// Plugin id to display name. Empty when unavailable.
    fn plugin_names(&self) -> BTreeMap<String, String>;
}

/// Connection settings for an Indigo web server
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndigoEndpoint {
    pub host: String,
    pub port: u16,
    pub tls: bool,
    pub api_key: Option<String>,
}

impl Default for IndigoEndpoint {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: DEFAULT_PORT,
            tls: true,
            api_key: None,
        }
    }
}

impl IndigoEndpoint {
    pub fn base_url(&self) -> String {
        let scheme = if self.tls { "https" } else { "http" };
        format!("{}://{}:{}", scheme, self.host, self.port)
    }
}

pub struct IndigoClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl IndigoClient {
    /// Local Indigo servers use self-signed certificates, so certificate
    /// validation is off.
    pub fn new(endpoint: &IndigoEndpoint) -> Result<Self> {
        Ok(Self {
            client: build_client(true)?,
            base_url: endpoint.base_url(),
            api_key: endpoint.api_key.clone().filter(|k| !k.is_empty()),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, path: &str) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        debug!(url = %url, "indigo request");
        let mut request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        send_json(request, &url)
    }

    pub fn device(&self, id: i64) -> Result<DeviceRecord> {
        let path = format!("/v2/api/indigo.devices/{}.json", id);
        let value = self.get(&path)?;
        if !value.is_object() {
            return Err(CatalogError::MalformedResponse {
                url: format!("{}{}", self.base_url, path),
                message: "device is not a JSON object".to_string(),
            });
        }
        Ok(DeviceRecord::from_value(value))
    }
}

/// The device list is either a bare array or wrapped in `devices` / `data`
fn device_list(value: Value) -> Option<Vec<Value>> {
    match value {
        Value::Array(items) => Some(items),
        Value::Object(mut map) => match map.remove("devices").or_else(|| map.remove("data")) {
            Some(Value::Array(items)) => Some(items),
            Some(_) => None,
            None => Some(Vec::new()),
        },
        _ => None,
    }
}

/// `id`/`pluginId` to `name`/`pluginName`; the name defaults to the id
fn plugin_name_map(value: &Value) -> BTreeMap<String, String> {
    let Some(entries) = value.as_array() else {
        return BTreeMap::new();
    };

    entries
        .iter()
        .filter_map(|entry| {
            let id = entry
                .get("id")
                .or_else(|| entry.get("pluginId"))
                .and_then(Value::as_str)
                .filter(|id| !id.is_empty())?;
            let name = entry
                .get("name")
                .or_else(|| entry.get("pluginName"))
                .and_then(Value::as_str)
                .unwrap_or(id);
            Some((id.to_string(), name.to_string()))
        })
        .collect()
}

impl DeviceHost for IndigoClient {
    fn devices(&self) -> Result<Vec<DeviceRecord>> {
        let value = self.get(DEVICES_PATH)?;
        let items = device_list(value).ok_or_else(|| CatalogError::MalformedResponse {
            url: format!("{}{}", self.base_url, DEVICES_PATH),
            message: "expected a device list".to_string(),
        })?;
        Ok(items
            .into_iter()
            .filter(Value::is_object)
            .map(DeviceRecord::from_value)
            .collect())
    }

    /// Devices with an id are re-fetched for their full attributes
    fn device_detail(&self, device: &DeviceRecord) -> Result<DeviceRecord> {
        match device.id() {
            Some(id) => self.device(id),
            None => Ok(device.clone()),
        }
    }

    fn plugin_names(&self) -> BTreeMap<String, String> {
        match self.get(PLUGINS_PATH) {
            Ok(value) => plugin_name_map(&value),
            Err(e) => {
                warn!(error = %e, "plugin list unavailable, using plugin ids as names");
                BTreeMap::new()
            }
        }
    }
}
