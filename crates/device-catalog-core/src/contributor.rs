//! Discover, then export or submit
//!
//! Holds the pending discovery between steps, so a caller can discover
//! once and then choose how to publish.

use std::path::Path;

use chrono::NaiveDate;
use tracing::{info, warn};

use crate::catalog::KnownProfiles;
use crate::discovery::{Discovery, DiscoveryEngine};
use crate::error::{CatalogError, Result};
use crate::extractor::ProfileContext;
use crate::github::RepositoryApi;
use crate::indigo::DeviceHost;
use crate::publish::{write_export, PublishOutcome, RemotePublisher};

/// What a discovery pass saw
#[derive(Debug, Clone, Default)]
pub struct DiscoveryReport {
    pub devices: usize,
    pub known: usize,
    /// Set when the existing catalog could not be read
    pub warning: Option<String>,
}

pub struct Contributor {
    name: String,
    pending: Option<Discovery>,
}

impl Contributor {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pending: None,
        }
    }

    pub fn pending(&self) -> Option<&Discovery> {
        self.pending.as_ref()
    }

    /// Replace the pending discovery with a new pass over `host`.
    ///
    /// Failing to list devices is an error; everything after that only
    /// drops individual devices.
    pub fn discover(
        &mut self,
        host: &dyn DeviceHost,
        known: &dyn KnownProfiles,
        today: NaiveDate,
    ) -> Result<DiscoveryReport> {
        let known = known.known_profiles()?;
        if let Some(warning) = &known.warning {
            warn!("{}", warning);
        }

        let devices = host.devices()?;
        info!(devices = devices.len(), known = known.len(), "scanning devices");

        let ctx = ProfileContext::new(self.name.clone(), today).with_plugin_names(host.plugin_names());
        let engine = DiscoveryEngine::new(&known.keys, &ctx);
        let discovery = engine.discover_with(&devices, |device| host.device_detail(device));

        info!(
            profiles = discovery.total(),
            classes = discovery.class_count(),
            errors = discovery.failures.len(),
            "discovery finished"
        );

        self.pending = Some(discovery);
        Ok(DiscoveryReport {
            devices: devices.len(),
            known: known.len(),
            warning: known.warning,
        })
    }

    fn require_pending(&self, action: &str) -> Result<&Discovery> {
        self.pending
            .as_ref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| CatalogError::NoPendingProfiles {
                action: action.to_string(),
            })
    }

    /// Write the pending profiles to `path`
    pub fn export(&self, path: &Path) -> Result<usize> {
        write_export(self.require_pending("export")?, path)
    }

    /// Open a pull request with the pending profiles
    pub fn submit(&self, api: &dyn RepositoryApi, today: NaiveDate) -> Result<PublishOutcome> {
        let pending = self.require_pending("submit")?;
        RemotePublisher::new(api).publish(pending, &self.name, today)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::KnownSet;
    use crate::extractor::DeviceRecord;
    use crate::github::{RemoteFile, RepoRef};
    use crate::profile::ProfileKey;
    use serde_json::json;
    use std::collections::{BTreeMap, BTreeSet};
    use tempfile::TempDir;

    struct FakeHost {
        devices: Vec<DeviceRecord>,
        fail: bool,
    }

    impl DeviceHost for FakeHost {
        fn devices(&self) -> Result<Vec<DeviceRecord>> {
            if self.fail {
                return Err(CatalogError::Network {
                    url: "https://localhost:8176".into(),
                    message: "connection refused".into(),
                });
            }
            Ok(self.devices.clone())
        }

        fn plugin_names(&self) -> BTreeMap<String, String> {
            [("com.x.relay".to_string(), "Relay Maker".to_string())]
                .into_iter()
                .collect()
        }
    }

    struct Known(KnownSet);

    impl KnownProfiles for Known {
        fn known_profiles(&self) -> Result<KnownSet> {
            Ok(self.0.clone())
        }
    }

    /// Rejects every call; submit must fail before reaching it
    struct Unreachable(RepoRef);

    impl RepositoryApi for Unreachable {
        fn upstream(&self) -> &RepoRef {
            &self.0
        }
        fn authenticated_user(&self) -> Result<String> {
            unreachable!()
        }
        fn fork(&self) -> Result<String> {
            unreachable!()
        }
        fn branch_head(&self, _: &str) -> Result<String> {
            unreachable!()
        }
        fn create_branch(&self, _: &str, _: &str, _: &str) -> Result<()> {
            unreachable!()
        }
        fn file(&self, _: &str, _: &str, _: &str) -> Result<Option<RemoteFile>> {
            unreachable!()
        }
        fn list_dir(&self, _: &str, _: &str, _: &str) -> Result<Vec<String>> {
            unreachable!()
        }
        fn put_file(
            &self,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
            _: &str,
            _: Option<&str>,
        ) -> Result<()> {
            unreachable!()
        }
        fn open_pull_request(&self, _: &str, _: &str, _: &str, _: &str) -> Result<String> {
            unreachable!()
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 8, 9).unwrap()
    }

    fn host() -> FakeHost {
        FakeHost {
            devices: vec![
                DeviceRecord::from_value(json!({
                    "id": 1,
                    "class": "indigo.RelayDevice",
                    "pluginId": "com.x.relay",
                    "deviceTypeId": "switch",
                    "name": "Porch light",
                    "states": {"onOffState": true}
                })),
                DeviceRecord::from_value(json!({
                    "id": 2,
                    "class": "indigo.SensorDevice",
                    "pluginId": "com.y.sensor",
                    "deviceTypeId": "temp",
                    "states": {"temperature": 21.5}
                })),
            ],
            fail: false,
        }
    }

    #[test]
    fn discover_then_export() {
        let temp = TempDir::new().unwrap();
        let mut contributor = Contributor::new("alice");
        let known = Known(KnownSet::new(
            [ProfileKey::new("com.y.sensor", "temp")].into_iter().collect(),
        ));

        let report = contributor.discover(&host(), &known, day()).unwrap();
        assert_eq!(report.devices, 2);
        assert_eq!(report.known, 1);
        assert!(report.warning.is_none());

        let pending = contributor.pending().unwrap();
        assert_eq!(pending.total(), 1);
        let (_, profile) = pending.profiles().next().unwrap();
        assert_eq!(profile.plugin_name, "Relay Maker");
        assert_eq!(profile.metadata.as_ref().unwrap().contributed_by, "alice");
        assert_eq!(profile.metadata.as_ref().unwrap().discovered_at, "2024-08-09");

        let path = temp.path().join("export.json");
        assert_eq!(contributor.export(&path).unwrap(), 1);
        let written = std::fs::read_to_string(&path).unwrap();
        assert!(written.contains("relay.json"));
        assert!(!written.contains("Porch light"));
    }

    #[test]
    fn degraded_catalog_still_discovers() {
        let mut contributor = Contributor::new("bob");
        let known = Known(KnownSet::degraded("index unavailable"));
        let report = contributor.discover(&host(), &known, day()).unwrap();
        assert_eq!(report.warning.as_deref(), Some("index unavailable"));
        assert_eq!(contributor.pending().unwrap().total(), 2);
    }

    #[test]
    fn host_failure_is_an_error() {
        let mut contributor = Contributor::new("bob");
        let known = Known(KnownSet::new(BTreeSet::new()));
        let host = FakeHost {
            devices: Vec::new(),
            fail: true,
        };
        let err = contributor.discover(&host, &known, day()).unwrap_err();
        assert!(err.is_transient());
        assert!(contributor.pending().is_none());
    }

    #[test]
    fn nothing_pending() {
        let temp = TempDir::new().unwrap();
        let contributor = Contributor::new("carol");
        let err = contributor.export(&temp.path().join("x.json")).unwrap_err();
        assert!(matches!(err, CatalogError::NoPendingProfiles { .. }));

        let api = Unreachable(RepoRef::new("o", "r", "main"));
        let err = contributor.submit(&api, day()).unwrap_err();
        assert_eq!(err.exit_code(), 4);
    }

    #[test]
    fn empty_discovery_is_not_pending() {
        let mut contributor = Contributor::new("dave");
        let everything = Known(KnownSet::new(
            [
                ProfileKey::new("com.x.relay", "switch"),
                ProfileKey::new("com.y.sensor", "temp"),
            ]
            .into_iter()
            .collect(),
        ));
        contributor.discover(&host(), &everything, day()).unwrap();
        let api = Unreachable(RepoRef::new("o", "r", "main"));
        assert!(matches!(
            contributor.submit(&api, day()),
            Err(CatalogError::NoPendingProfiles { .. })
        ));
    }
}
