//! Discovery of device types missing from the catalog

use std::collections::{BTreeMap, BTreeSet};

use tracing::{debug, error};

use crate::device_class::DeviceClass;
use crate::error::Result;
use crate::extractor::{build_profile, DeviceRecord, ProfileContext};
use crate::profile::{DeviceProfile, ProfileKey};

/// A device whose profile could not be built
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionFailure {
    pub key: ProfileKey,
    pub message: String,
}

/// Result of one discovery pass
#[derive(Debug, Clone, Default)]
pub struct Discovery {
    /// New profiles per base class, in discovery order
    pub by_class: BTreeMap<DeviceClass, Vec<DeviceProfile>>,
    pub failures: Vec<ExtractionFailure>,
}

impl Discovery {
    pub fn total(&self) -> usize {
        self.by_class.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    pub fn class_count(&self) -> usize {
        self.by_class.values().filter(|p| !p.is_empty()).count()
    }

    pub fn profiles(&self) -> impl Iterator<Item = (DeviceClass, &DeviceProfile)> {
        self.by_class
            .iter()
            .flat_map(|(class, profiles)| profiles.iter().map(move |p| (*class, p)))
    }

    /// Classes grouped by the catalog file they land in. Classes sharing a
    /// file (e.g. `custom.json`) end up in the same group, in class order.
    pub fn by_file(&self) -> BTreeMap<&'static str, Vec<(DeviceClass, &[DeviceProfile])>> {
        let mut files: BTreeMap<&'static str, Vec<(DeviceClass, &[DeviceProfile])>> =
            BTreeMap::new();
        for (class, profiles) in &self.by_class {
            if profiles.is_empty() {
                continue;
            }
            files
                .entry(class.file_name())
                .or_default()
                .push((*class, profiles.as_slice()));
        }
        files
    }

    /// `class -> ["pluginId:deviceTypeId", ...]` for dry-run output
    pub fn summary(&self) -> BTreeMap<String, Vec<String>> {
        self.by_class
            .iter()
            .map(|(class, profiles)| {
                (
                    class.catalog_name().to_string(),
                    profiles.iter().map(|p| p.key().to_string()).collect(),
                )
            })
            .collect()
    }

    /// Drop profiles whose identity pair is in `keys`; returns how many went
    pub fn retain_unknown(&mut self, keys: &BTreeSet<ProfileKey>) -> usize {
        let before = self.total();
        for profiles in self.by_class.values_mut() {
            profiles.retain(|p| !keys.contains(&p.key()));
        }
        self.by_class.retain(|_, profiles| !profiles.is_empty());
        before - self.total()
    }
}

/// Finds device types not yet cataloged and builds one profile for each
pub struct DiscoveryEngine<'a> {
    known: &'a BTreeSet<ProfileKey>,
    ctx: &'a ProfileContext,
}

impl<'a> DiscoveryEngine<'a> {
    pub fn new(known: &'a BTreeSet<ProfileKey>, ctx: &'a ProfileContext) -> Self {
        Self { known, ctx }
    }

    /// One representative per new identity pair, first seen wins.
    /// Devices without a plugin id or device type id are skipped.
    pub fn select<'d>(&self, devices: &'d [DeviceRecord]) -> Vec<(ProfileKey, &'d DeviceRecord)> {
        let mut seen = BTreeSet::new();
        let mut selected = Vec::new();

        for device in devices {
            let Some(key) = device.key() else {
                continue;
            };
            if self.known.contains(&key) || seen.contains(&key) {
                continue;
            }
            seen.insert(key.clone());
            selected.push((key, device));
        }

        selected
    }

    pub fn discover(&self, devices: &[DeviceRecord]) -> Discovery {
        self.discover_with(devices, |device| Ok(device.clone()))
    }

    /// Like [`discover`](Self::discover), but each representative is passed
    /// through `resolve` first (e.g. to fetch full details). A failing
    /// `resolve` or extraction only drops that device.
    pub fn discover_with<F>(&self, devices: &[DeviceRecord], mut resolve: F) -> Discovery
    where
        F: FnMut(&DeviceRecord) -> Result<DeviceRecord>,
    {
        let mut discovery = Discovery::default();

        for (key, device) in self.select(devices) {
            let built = resolve(device).and_then(|full| {
                let profile = build_profile(&full, self.ctx)?;
                Ok((full.device_class(), profile))
            });

            match built {
                Ok((class, profile)) => {
                    debug!(%key, class = %class, "new device type");
                    discovery.by_class.entry(class).or_default().push(profile);
                }
                Err(e) => {
                    error!(%key, error = %e, "failed to build profile");
                    discovery.failures.push(ExtractionFailure {
                        key,
                        message: e.to_string(),
                    });
                }
            }
        }

        discovery
    }
}
