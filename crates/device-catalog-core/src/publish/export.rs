//! Local export file

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::catalog::document::ClassDocument;
use crate::catalog::merge::merge_into_file;
use crate::discovery::Discovery;
use crate::error::{CatalogError, Result};

pub const EXPORT_FILE_NAME: &str = "indigo-device-catalog-contribution.json";

/// `~/Desktop/indigo-device-catalog-contribution.json`, or the home
/// directory when there is no desktop
pub fn default_export_path() -> Result<PathBuf> {
    let dir = dirs::desktop_dir()
        .or_else(dirs::home_dir)
        .ok_or(CatalogError::HomeNotFound)?;
    Ok(dir.join(EXPORT_FILE_NAME))
}

/// Class file name to a complete class document holding only the new
/// profiles
pub fn build_export(discovery: &Discovery) -> BTreeMap<String, ClassDocument> {
    discovery
        .by_file()
        .into_iter()
        .filter_map(|(file, groups)| {
            merge_into_file(None, groups).map(|doc| (file.to_string(), doc))
        })
        .collect()
}

pub fn export_json(discovery: &Discovery) -> Result<String> {
    let mut out = serde_json::to_string_pretty(&build_export(discovery))?;
    out.push('\n');
    Ok(out)
}

/// Write the export file, creating parent directories. Returns the number
/// of profiles written.
pub fn write_export(discovery: &Discovery, path: &Path) -> Result<usize> {
    if discovery.is_empty() {
        return Err(CatalogError::NoPendingProfiles {
            action: "export".to_string(),
        });
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, export_json(discovery)?)?;

    let total = discovery.total();
    info!(path = %path.display(), profiles = total, "exported profiles");
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::document::tests::profile;
    use crate::device_class::DeviceClass;
    use tempfile::TempDir;

    fn discovery() -> Discovery {
        let mut d = Discovery::default();
        d.by_class
            .entry(DeviceClass::RelayDevice)
            .or_default()
            .extend([profile("z", "1"), profile("a", "1")]);
        d.by_class
            .entry(DeviceClass::MultiIODevice)
            .or_default()
            .push(profile("io", "board"));
        d.by_class
            .entry(DeviceClass::Device)
            .or_default()
            .push(profile("gen", "thing"));
        d
    }

    #[test]
    fn export_is_keyed_by_file_and_sorted() {
        let export = build_export(&discovery());
        assert_eq!(
            export.keys().collect::<Vec<_>>(),
            vec!["custom.json", "relay.json"]
        );

        let relay = &export["relay.json"];
        assert_eq!(relay.base_class, "indigo.RelayDevice");
        assert!(relay.is_sorted());
        assert_eq!(relay.profiles[0].plugin_id, "a");
        assert!(relay.class_commands.is_some());

        // Device sorts first, so it names the shared document
        let custom = &export["custom.json"];
        assert_eq!(custom.base_class, "indigo.Device");
        assert_eq!(custom.profiles.len(), 2);
    }

    #[test]
    fn write_creates_parent_dirs() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("out").join(EXPORT_FILE_NAME);

        let written = write_export(&discovery(), &path).unwrap();
        assert_eq!(written, 4);

        let parsed: BTreeMap<String, ClassDocument> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed["relay.json"].profiles.len(), 2);
    }

    #[test]
    fn nothing_to_export() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(EXPORT_FILE_NAME);
        let err = write_export(&Discovery::default(), &path).unwrap_err();
        assert!(matches!(err, CatalogError::NoPendingProfiles { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn default_path_uses_export_file_name() {
        if let Ok(path) = default_export_path() {
            assert!(path.ends_with(EXPORT_FILE_NAME));
        }
    }
}
