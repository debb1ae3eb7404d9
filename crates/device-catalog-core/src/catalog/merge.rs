//! Merging new profiles into class documents

use crate::catalog::document::ClassDocument;
use crate::device_class::DeviceClass;
use crate::profile::DeviceProfile;

/// Append `new` to `existing` (or to a fresh document for `class`) and
/// re-sort by `(pluginId, deviceTypeId)`.
///
/// No deduplication happens here; callers check
/// [`ClassDocument::ensure_unique`] before persisting.
pub fn merge_profiles(
    existing: Option<ClassDocument>,
    class: DeviceClass,
    new: impl IntoIterator<Item = DeviceProfile>,
) -> ClassDocument {
    let mut doc = existing.unwrap_or_else(|| ClassDocument::for_class(class));
    doc.profiles.extend(new);
    sort_profiles(&mut doc.profiles);
    doc
}

/// Fold several classes that map to the same catalog file into one document.
///
/// The first class (in the order given) supplies the document header when the
/// file does not exist yet.
pub fn merge_into_file<'a, I>(existing: Option<ClassDocument>, groups: I) -> Option<ClassDocument>
where
    I: IntoIterator<Item = (DeviceClass, &'a [DeviceProfile])>,
{
    groups.into_iter().fold(existing, |doc, (class, profiles)| {
        Some(merge_profiles(doc, class, profiles.iter().cloned()))
    })
}

/// Canonical on-disk order. Stable, so equal keys keep their relative order.
pub fn sort_profiles(profiles: &mut [DeviceProfile]) {
    profiles.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
}
