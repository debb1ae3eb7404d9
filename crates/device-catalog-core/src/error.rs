use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Network error talking to {url}: {message}")]
    Network { url: String, message: String },

    #[error("HTTP {status} from {url}: {message}")]
    Http {
        status: u16,
        url: String,
        message: String,
    },

    #[error("Malformed response from {url}: {message}")]
    MalformedResponse { url: String, message: String },

    #[error("Could not extract profile for {plugin_id}/{device_type_id}: {message}")]
    ExtractionFailed {
        plugin_id: String,
        device_type_id: String,
        message: String,
    },

    #[error("Duplicate profile ({plugin_id}, {device_type_id}) in {file}")]
    DuplicateIdentity {
        plugin_id: String,
        device_type_id: String,
        file: String,
    },

    #[error("Missing credential: {what}")]
    MissingCredential { what: String },

    #[error("No profiles to {action}. Run discovery first.")]
    NoPendingProfiles { action: String },

    #[error("Schema error in {path}: {message}")]
    Schema { path: PathBuf, message: String },

    #[error("Failed to parse {path}: {message}")]
    ConfigParse { path: PathBuf, message: String },

    #[error("Unknown config key: {key}")]
    ConfigKeyNotFound { key: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidConfigValue { key: String, value: String },

    #[error("Home directory not found")]
    HomeNotFound,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML serialization error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("TOML deserialization error: {0}")]
    TomlDe(#[from] toml::de::Error),
}

pub type Result<T> = std::result::Result<T, CatalogError>;

impl CatalogError {
    /// True for failures talking to a remote service: network, HTTP status or
    /// an unparseable payload. Read paths recover from these.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::Network { .. } | Self::Http { .. } | Self::MalformedResponse { .. }
        )
    }

    pub fn http_status(&self) -> Option<u16> {
        match self {
            Self::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn exit_code(&self) -> i32 {
        match self {
            Self::DuplicateIdentity { .. } => 2,
            Self::MissingCredential { .. } => 3,
            Self::NoPendingProfiles { .. } => 4,
            Self::Schema { .. } => 5,
            _ => 1,
        }
    }
}
