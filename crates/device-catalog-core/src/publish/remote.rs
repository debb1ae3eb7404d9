//! Pull-request contribution to the upstream catalog

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDate;
use tracing::{debug, info};

use crate::catalog::document::{ensure_unique_across, ClassDocument};
use crate::catalog::index::{reindex, BY_CLASS_DIR};
use crate::catalog::merge::merge_into_file;
use crate::device_class::DeviceClass;
use crate::discovery::Discovery;
use crate::error::{CatalogError, Result};
use crate::github::RepositoryApi;
use crate::profile::{DeviceProfile, ProfileKey};

const CATALOG_DIR: &str = "catalog";

/// One class file committed to the contribution branch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpdate {
    pub path: String,
    /// Profiles added by this run
    pub added: usize,
    /// Profiles in the file after the commit
    pub total: usize,
}

#[derive(Debug, Clone)]
pub struct PublishOutcome {
    /// `None` when a pull request for the branch was already open
    pub pr_url: Option<String>,
    pub fork_owner: String,
    pub branch: String,
    pub files: Vec<FileUpdate>,
    /// Profiles already present in some class file on the branch
    pub skipped: usize,
}

/// A class document as currently seen on the contribution branch
struct BranchDocument {
    doc: ClassDocument,
    /// Blob sha when the file exists on the branch
    sha: Option<String>,
    on_branch: bool,
}

/// `contribute/<slug>/<YYYY-MM-DD>`; characters not allowed in a ref
/// segment become `-`
pub fn branch_name(contributor: &str, date: NaiveDate) -> String {
    let slug: String = contributor
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_') {
                c
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-');
    let slug = if slug.is_empty() { "community" } else { slug };
    format!("contribute/{}/{}", slug, date.format("%Y-%m-%d"))
}

pub fn pr_title(total: usize, contributor: &str) -> String {
    format!("Add {} device profile(s) from {}", total, contributor)
}

pub fn pr_body<'a, I>(contributor: &str, profiles: I) -> String
where
    I: IntoIterator<Item = (DeviceClass, &'a DeviceProfile)>,
{
    let mut lines = vec![format!(
        "## New Device Profiles\n\nContributed by **{}**\n",
        contributor
    )];
    for (class, profile) in profiles {
        lines.push(format!(
            "- **{}**: `{}` ({})",
            profile.plugin_name, profile.device_type_id, class
        ));
    }
    lines.push("\n---\n*Auto-generated by device-catalog*".to_string());
    lines.join("\n")
}

fn class_file_path(file: &str) -> String {
    format!("{}/{}/{}", CATALOG_DIR, BY_CLASS_DIR, file)
}

fn parse_document(path: &str, content: &str) -> Result<ClassDocument> {
    ClassDocument::from_json(content).map_err(|e| CatalogError::MalformedResponse {
        url: path.to_string(),
        message: e.to_string(),
    })
}

/// Opens a pull request against the upstream catalog through a fork
pub struct RemotePublisher<'a, A: RepositoryApi + ?Sized> {
    api: &'a A,
}

impl<'a, A: RepositoryApi + ?Sized> RemotePublisher<'a, A> {
    pub fn new(api: &'a A) -> Self {
        Self { api }
    }

    /// Fork, branch, commit each affected class file and both indexes,
    /// then open the pull request.
    ///
    /// Profiles whose identity pair already appears in any class file on the
    /// branch are skipped, and nothing is committed if the result would hold
    /// a pair in two files. Safe to re-run on the same day: the branch is
    /// reused, unchanged files are not recommitted and an already open pull
    /// request is left as is.
    pub fn publish(
        &self,
        discovery: &Discovery,
        contributor: &str,
        today: NaiveDate,
    ) -> Result<PublishOutcome> {
        if discovery.is_empty() {
            return Err(CatalogError::NoPendingProfiles {
                action: "submit".to_string(),
            });
        }

        let upstream = self.api.upstream().clone();

        info!("forking catalog repository");
        let fork_owner = self.api.fork()?;
        debug!(fork_owner = %fork_owner, "fork ready");

        let head = self.api.branch_head(&upstream.default_branch)?;
        let branch = branch_name(contributor, today);
        info!(branch = %branch, "creating branch");
        match self.api.create_branch(&fork_owner, &branch, &head) {
            Ok(()) => {}
            Err(e) if e.http_status() == Some(422) => {
                info!(branch = %branch, "branch already exists, reusing it");
            }
            Err(e) => return Err(e),
        }

        let mut documents = self.branch_documents(&fork_owner, &branch)?;
        for file in discovery.by_file().into_keys() {
            if documents.contains_key(file) {
                continue;
            }
            let path = class_file_path(file);
            if let Some(remote) = self
                .api
                .file(&upstream.owner, &path, &upstream.default_branch)?
            {
                documents.insert(
                    file.to_string(),
                    BranchDocument {
                        doc: parse_document(&path, &remote.content)?,
                        sha: None,
                        on_branch: false,
                    },
                );
            }
        }

        let known: BTreeSet<ProfileKey> =
            documents.values().flat_map(|d| d.doc.keys()).collect();
        let mut pending = discovery.clone();
        let skipped = pending.retain_unknown(&known);
        if skipped > 0 {
            debug!(skipped, "profiles already in the catalog");
        }

        let mut updates = Vec::new();
        for (file, groups) in pending.by_file() {
            let path = class_file_path(file);
            let added: usize = groups.iter().map(|(_, p)| p.len()).sum();
            let classes: Vec<&str> = groups.iter().map(|(c, _)| c.catalog_name()).collect();
            let message = format!(
                "Add {} {} profile(s) from {}",
                added,
                classes.join(", "),
                contributor
            );

            let (existing, sha) = match documents.remove(file) {
                Some(current) => (Some(current.doc), current.sha),
                None => (None, None),
            };
            let Some(doc) = merge_into_file(existing, groups) else {
                continue;
            };
            doc.ensure_unique(&path)?;
            documents.insert(
                file.to_string(),
                BranchDocument {
                    doc,
                    sha,
                    on_branch: true,
                },
            );
            updates.push((file, path, added, message));
        }
        ensure_unique_across(documents.iter().map(|(f, d)| (f.as_str(), &d.doc)))?;

        let mut files = Vec::new();
        for (file, path, added, message) in updates {
            let Some(current) = documents.get(file) else {
                continue;
            };
            self.api.put_file(
                &fork_owner,
                &branch,
                &path,
                &current.doc.to_json()?,
                &message,
                current.sha.as_deref(),
            )?;
            info!(path = %path, added, "committed class file");

            files.push(FileUpdate {
                path,
                added,
                total: current.doc.profiles.len(),
            });
        }

        let on_branch = documents
            .iter()
            .filter(|(_, d)| d.on_branch)
            .map(|(f, d)| (f.as_str(), &d.doc));
        self.commit_indexes(&fork_owner, &branch, contributor, on_branch, today)?;

        let listed = if pending.is_empty() { discovery } else { &pending };
        let title = pr_title(listed.total(), contributor);
        let body = pr_body(contributor, listed.profiles());
        let pr_url = match self
            .api
            .open_pull_request(&fork_owner, &branch, &title, &body)
        {
            Ok(url) => {
                info!(url = %url, "pull request opened");
                Some(url)
            }
            Err(e) if e.http_status() == Some(422) => {
                info!(branch = %branch, "pull request already open for branch");
                None
            }
            Err(e) => return Err(e),
        };

        Ok(PublishOutcome {
            pr_url,
            fork_owner,
            branch,
            files,
            skipped,
        })
    }

    /// Every class document on the branch, keyed by file name
    fn branch_documents(
        &self,
        owner: &str,
        branch: &str,
    ) -> Result<BTreeMap<String, BranchDocument>> {
        let dir = format!("{}/{}", CATALOG_DIR, BY_CLASS_DIR);
        let mut documents = BTreeMap::new();
        for name in self.api.list_dir(owner, &dir, branch)? {
            if !name.ends_with(".json") {
                continue;
            }
            let path = class_file_path(&name);
            if let Some(file) = self.api.file(owner, &path, branch)? {
                let doc = parse_document(&path, &file.content)?;
                documents.insert(
                    name,
                    BranchDocument {
                        doc,
                        sha: Some(file.sha),
                        on_branch: true,
                    },
                );
            }
        }
        debug!(documents = documents.len(), "read class files from branch");
        Ok(documents)
    }

    /// Rebuild both indexes from the branch's class documents. Index files
    /// whose content would not change are left alone.
    fn commit_indexes<'d, I>(
        &self,
        owner: &str,
        branch: &str,
        contributor: &str,
        documents: I,
        today: NaiveDate,
    ) -> Result<()>
    where
        I: IntoIterator<Item = (&'d str, &'d ClassDocument)>,
    {
        let indexes = reindex(documents, today);

        let targets = [
            (
                format!("{}/_index.json", CATALOG_DIR),
                indexes.class_index_json()?,
                format!("Regenerate catalog index ({})", contributor),
            ),
            (
                format!("{}/by-plugin/_index.json", CATALOG_DIR),
                indexes.plugin_index_json()?,
                format!("Regenerate plugin index ({})", contributor),
            ),
        ];
        for (path, content, message) in targets {
            let current = self.api.file(owner, &path, branch)?;
            if current.as_ref().is_some_and(|f| f.content == content) {
                debug!(path = %path, "index unchanged");
                continue;
            }
            let sha = current.map(|f| f.sha);
            self.api
                .put_file(owner, branch, &path, &content, &message, sha.as_deref())?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::document::tests::profile;
    use crate::catalog::index::{ClassIndex, PluginIndex};
    use crate::github::{RemoteFile, RepoRef};
    use crate::profile::ProfileKey;
    use std::cell::RefCell;
    use std::collections::BTreeMap;

    const UPSTREAM: &str = "simons-plugins";
    const FORK: &str = "alice";

    type FileKey = (String, String, String);

    /// In-memory GitHub: files keyed by (owner, ref, path)
    struct FakeRepo {
        upstream: RepoRef,
        files: RefCell<BTreeMap<FileKey, RemoteFile>>,
        branches: RefCell<Vec<String>>,
        puts: RefCell<Vec<(String, String)>>,
        prs: RefCell<Vec<(String, String, String)>>,
        next_sha: RefCell<u32>,
        branch_error: Option<u16>,
    }

    impl FakeRepo {
        fn new() -> Self {
            Self {
                upstream: RepoRef::new(UPSTREAM, "indigo-device-catalog", "main"),
                files: RefCell::new(BTreeMap::new()),
                branches: RefCell::new(Vec::new()),
                puts: RefCell::new(Vec::new()),
                prs: RefCell::new(Vec::new()),
                next_sha: RefCell::new(0),
                branch_error: None,
            }
        }

        fn sha(&self) -> String {
            let mut n = self.next_sha.borrow_mut();
            *n += 1;
            format!("sha{}", n)
        }

        fn seed_upstream(&self, path: &str, content: String) {
            let sha = self.sha();
            self.files.borrow_mut().insert(
                (UPSTREAM.into(), "main".into(), path.into()),
                RemoteFile { content, sha },
            );
        }

        fn content(&self, owner: &str, git_ref: &str, path: &str) -> Option<String> {
            self.files
                .borrow()
                .get(&(owner.into(), git_ref.into(), path.into()))
                .map(|f| f.content.clone())
        }

        fn puts_to(&self, path: &str) -> usize {
            self.puts.borrow().iter().filter(|(p, _)| p == path).count()
        }

        fn http(status: u16) -> CatalogError {
            CatalogError::Http {
                status,
                url: "fake".into(),
                message: String::new(),
            }
        }
    }

    impl RepositoryApi for FakeRepo {
        fn upstream(&self) -> &RepoRef {
            &self.upstream
        }

        fn authenticated_user(&self) -> Result<String> {
            Ok(FORK.into())
        }

        fn fork(&self) -> Result<String> {
            Ok(FORK.into())
        }

        fn branch_head(&self, _branch: &str) -> Result<String> {
            Ok("head".into())
        }

        fn create_branch(&self, owner: &str, branch: &str, _sha: &str) -> Result<()> {
            if let Some(status) = self.branch_error {
                return Err(Self::http(status));
            }
            if self.branches.borrow().iter().any(|b| b == branch) {
                return Err(Self::http(422));
            }
            self.branches.borrow_mut().push(branch.into());

            let upstream: Vec<_> = self
                .files
                .borrow()
                .iter()
                .filter(|((o, r, _), _)| o == UPSTREAM && r == "main")
                .map(|((_, _, p), f)| (p.clone(), f.clone()))
                .collect();
            let mut files = self.files.borrow_mut();
            for (path, file) in upstream {
                files.insert((owner.into(), branch.into(), path), file);
            }
            Ok(())
        }

        fn file(&self, owner: &str, path: &str, git_ref: &str) -> Result<Option<RemoteFile>> {
            Ok(self
                .files
                .borrow()
                .get(&(owner.into(), git_ref.into(), path.into()))
                .cloned())
        }

        fn list_dir(&self, owner: &str, dir: &str, git_ref: &str) -> Result<Vec<String>> {
            let prefix = format!("{}/", dir);
            Ok(self
                .files
                .borrow()
                .keys()
                .filter(|(o, r, _)| o == owner && r == git_ref)
                .filter_map(|(_, _, p)| p.strip_prefix(&prefix))
                .filter(|rest| !rest.contains('/'))
                .map(str::to_string)
                .collect())
        }

        fn put_file(
            &self,
            owner: &str,
            branch: &str,
            path: &str,
            content: &str,
            message: &str,
            sha: Option<&str>,
        ) -> Result<()> {
            let key = (owner.to_string(), branch.to_string(), path.to_string());
            let current = self.files.borrow().get(&key).map(|f| f.sha.clone());
            if current.as_deref() != sha {
                return Err(Self::http(409));
            }
            let sha = self.sha();
            self.files.borrow_mut().insert(
                key,
                RemoteFile {
                    content: content.into(),
                    sha,
                },
            );
            self.puts.borrow_mut().push((path.into(), message.into()));
            Ok(())
        }

        fn open_pull_request(
            &self,
            owner: &str,
            branch: &str,
            title: &str,
            body: &str,
        ) -> Result<String> {
            let head = format!("{}:{}", owner, branch);
            let mut prs = self.prs.borrow_mut();
            if prs.iter().any(|(h, _, _)| *h == head) {
                return Err(Self::http(422));
            }
            prs.push((head, title.into(), body.into()));
            Ok(format!("https://github.com/{}/pull/{}", UPSTREAM, prs.len()))
        }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 5, 1).unwrap()
    }

    fn discovery() -> Discovery {
        let mut d = Discovery::default();
        d.by_class
            .entry(DeviceClass::RelayDevice)
            .or_default()
            .push(profile("a", "1"));
        d.by_class
            .entry(DeviceClass::Device)
            .or_default()
            .push(profile("g", "1"));
        d.by_class
            .entry(DeviceClass::MultiIODevice)
            .or_default()
            .push(profile("c", "io"));
        d
    }

    fn seeded() -> FakeRepo {
        let repo = FakeRepo::new();
        let relay = crate::catalog::merge::merge_profiles(
            None,
            DeviceClass::RelayDevice,
            vec![profile("m", "1")],
        );
        repo.seed_upstream("catalog/by-class/relay.json", relay.to_json().unwrap());
        repo.seed_upstream("catalog/_index.json", "{}".into());
        repo
    }

    #[test]
    fn branch_names_are_ref_safe() {
        assert_eq!(branch_name("alice", day()), "contribute/alice/2024-05-01");
        assert_eq!(branch_name("Jo Smith!", day()), "contribute/Jo-Smith/2024-05-01");
        assert_eq!(branch_name("  ", day()), "contribute/community/2024-05-01");
    }

    #[test]
    fn pr_body_lists_profiles() {
        let d = discovery();
        let body = pr_body("alice", d.profiles());
        assert!(body.starts_with("## New Device Profiles\n\nContributed by **alice**\n\n- "));
        assert!(body.contains("- **a plugin**: `1` (indigo.RelayDevice)"));
        assert!(body.ends_with("\n\n---\n*Auto-generated by device-catalog*"));
        assert_eq!(pr_title(3, "alice"), "Add 3 device profile(s) from alice");
    }

    #[test]
    fn publishes_class_files_indexes_and_pr() {
        let repo = seeded();
        let outcome = RemotePublisher::new(&repo)
            .publish(&discovery(), "alice", day())
            .unwrap();

        assert_eq!(outcome.branch, "contribute/alice/2024-05-01");
        assert_eq!(outcome.fork_owner, FORK);
        assert_eq!(outcome.skipped, 0);

        // Existing upstream file is extended and re-sorted
        let relay = repo
            .content(FORK, &outcome.branch, "catalog/by-class/relay.json")
            .unwrap();
        let relay = ClassDocument::from_json(&relay).unwrap();
        let keys: Vec<_> = relay.profiles.iter().map(|p| p.key()).collect();
        assert_eq!(keys, vec![ProfileKey::new("a", "1"), ProfileKey::new("m", "1")]);

        // Device and MultiIODevice share custom.json: one commit, both profiles
        assert_eq!(repo.puts_to("catalog/by-class/custom.json"), 1);
        let custom = repo
            .content(FORK, &outcome.branch, "catalog/by-class/custom.json")
            .unwrap();
        assert_eq!(ClassDocument::from_json(&custom).unwrap().profiles.len(), 2);

        let index: ClassIndex = serde_json::from_str(
            &repo
                .content(FORK, &outcome.branch, "catalog/_index.json")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(index.classes["indigo.RelayDevice"].profile_count, 2);
        assert_eq!(index.classes["indigo.Device"].profile_count, 2);
        assert_eq!(index.generated, "2024-05-01");

        let plugins: PluginIndex = serde_json::from_str(
            &repo
                .content(FORK, &outcome.branch, "catalog/by-plugin/_index.json")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(plugins.total_device_types(), index.total_profiles());

        let prs = repo.prs.borrow();
        assert_eq!(prs.len(), 1);
        assert_eq!(prs[0].0, "alice:contribute/alice/2024-05-01");
        assert_eq!(prs[0].1, "Add 3 device profile(s) from alice");
        assert_eq!(
            outcome.pr_url.as_deref(),
            Some("https://github.com/simons-plugins/pull/1")
        );

        let messages: Vec<String> = repo.puts.borrow().iter().map(|(_, m)| m.clone()).collect();
        assert!(messages.contains(&"Add 1 indigo.RelayDevice profile(s) from alice".to_string()));
        assert!(messages
            .contains(&"Add 2 indigo.Device, indigo.MultiIODevice profile(s) from alice".to_string()));
        assert!(messages.contains(&"Regenerate catalog index (alice)".to_string()));
    }

    #[test]
    fn rerun_reuses_branch_without_duplicates() {
        let repo = seeded();
        let publisher = RemotePublisher::new(&repo);
        publisher.publish(&discovery(), "alice", day()).unwrap();
        let commits = repo.puts.borrow().len();
        let second = publisher.publish(&discovery(), "alice", day()).unwrap();

        assert_eq!(second.skipped, 3);
        assert!(second.files.is_empty());
        assert!(second.pr_url.is_none());
        assert_eq!(repo.puts.borrow().len(), commits);
        assert_eq!(repo.prs.borrow().len(), 1);

        let relay = repo
            .content(FORK, &second.branch, "catalog/by-class/relay.json")
            .unwrap();
        let relay = ClassDocument::from_json(&relay).unwrap();
        assert_eq!(relay.profiles.len(), 2);
        assert!(relay.duplicate_keys().is_empty());
    }

    #[test]
    fn pairs_cataloged_under_another_class_are_skipped() {
        let repo = seeded();
        let sensor = crate::catalog::merge::merge_profiles(
            None,
            DeviceClass::SensorDevice,
            vec![profile("x", "y")],
        );
        repo.seed_upstream("catalog/by-class/sensor.json", sensor.to_json().unwrap());

        let mut d = Discovery::default();
        d.by_class
            .entry(DeviceClass::RelayDevice)
            .or_default()
            .extend([profile("x", "y"), profile("a", "1")]);

        let outcome = RemotePublisher::new(&repo)
            .publish(&d, "alice", day())
            .unwrap();
        assert_eq!(outcome.skipped, 1);
        assert_eq!(
            outcome.files,
            vec![FileUpdate {
                path: "catalog/by-class/relay.json".into(),
                added: 1,
                total: 2,
            }]
        );
        assert_eq!(repo.puts_to("catalog/by-class/sensor.json"), 0);

        let on_branch: Vec<(String, ClassDocument)> = ["relay.json", "sensor.json"]
            .iter()
            .map(|f| {
                let path = format!("catalog/by-class/{}", f);
                let content = repo.content(FORK, &outcome.branch, &path).unwrap();
                (f.to_string(), ClassDocument::from_json(&content).unwrap())
            })
            .collect();
        assert!(crate::catalog::document::cross_document_duplicates(
            on_branch.iter().map(|(f, doc)| (f.as_str(), doc))
        )
        .is_empty());

        let index: ClassIndex = serde_json::from_str(
            &repo
                .content(FORK, &outcome.branch, "catalog/_index.json")
                .unwrap(),
        )
        .unwrap();
        assert_eq!(index.total_profiles(), 3);

        let prs = repo.prs.borrow();
        assert_eq!(prs[0].1, "Add 1 device profile(s) from alice");
        assert!(!prs[0].2.contains("`y`"));
    }

    #[test]
    fn existing_cross_file_duplicate_blocks_commits() {
        let repo = seeded();
        let sensor = crate::catalog::merge::merge_profiles(
            None,
            DeviceClass::SensorDevice,
            vec![profile("m", "1")],
        );
        repo.seed_upstream("catalog/by-class/sensor.json", sensor.to_json().unwrap());

        let mut d = Discovery::default();
        d.by_class
            .entry(DeviceClass::DimmerDevice)
            .or_default()
            .push(profile("d", "1"));

        let err = RemotePublisher::new(&repo)
            .publish(&d, "alice", day())
            .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateIdentity { .. }));
        assert!(repo.puts.borrow().is_empty());
        assert!(repo.prs.borrow().is_empty());
    }

    #[test]
    fn other_branch_errors_abort() {
        let mut repo = seeded();
        repo.branch_error = Some(403);
        let err = RemotePublisher::new(&repo)
            .publish(&discovery(), "alice", day())
            .unwrap_err();
        assert_eq!(err.http_status(), Some(403));
        assert!(repo.puts.borrow().is_empty());
        assert!(repo.prs.borrow().is_empty());
    }

    #[test]
    fn empty_discovery_is_rejected() {
        let repo = seeded();
        let err = RemotePublisher::new(&repo)
            .publish(&Discovery::default(), "alice", day())
            .unwrap_err();
        assert!(matches!(err, CatalogError::NoPendingProfiles { .. }));
    }
}
