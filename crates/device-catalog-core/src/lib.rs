pub mod catalog;
pub mod config;
pub mod contributor;
pub mod device_class;
pub mod discovery;
pub mod error;
pub mod extractor;
pub mod github;
pub mod http;
pub mod indigo;
pub mod profile;
pub mod publish;
pub mod validate;

pub use catalog::{
    cross_document_duplicates, ensure_unique_across, merge_into_file, merge_profiles, reindex,
    ApplyResult, CatalogIndexes, ClassDocument, ClassIndex, KnownProfiles, KnownSet,
    LocalCatalog, PluginIndex, RemoteCatalog, RemoteCatalogConfig,
};
pub use config::Config;
pub use contributor::{Contributor, DiscoveryReport};
pub use device_class::DeviceClass;
pub use discovery::{Discovery, DiscoveryEngine, ExtractionFailure};
pub use error::{CatalogError, Result};
pub use extractor::{build_profile, DeviceRecord, ProfileContext};
pub use github::{GitHubClient, RemoteFile, RepoRef, RepositoryApi};
pub use indigo::{DeviceHost, IndigoClient, IndigoEndpoint};
pub use profile::{DeviceProfile, ProfileKey, StateType};
pub use publish::{PublishOutcome, RemotePublisher};
pub use validate::{validate_catalog, IndexCheck, ValidationReport};
