//! Publishing discovered profiles
//!
//! - [`export`]: a single JSON file for manual submission
//! - [`remote`]: fork, branch, commit and pull request on GitHub
//!
//! Writing into a local catalog checkout lives on
//! [`LocalCatalog::apply`](crate::catalog::LocalCatalog::apply).

pub mod export;
pub mod remote;

pub use export::{build_export, default_export_path, export_json, write_export, EXPORT_FILE_NAME};
pub use remote::{branch_name, pr_body, pr_title, FileUpdate, PublishOutcome, RemotePublisher};
