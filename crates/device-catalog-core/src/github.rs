//! GitHub REST client
//!
//! Only the handful of endpoints needed to fork the catalog repository,
//! commit files to a branch on the fork and open a pull request upstream.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::Method;
use serde_json::{json, Value};
use tracing::{debug, info};

use crate::error::{CatalogError, Result};
use crate::http::{build_client, send_json};

pub const DEFAULT_API_BASE: &str = "https://api.github.com";
const API_VERSION: &str = "2022-11-28";
const ACCEPT: &str = "application/vnd.github+json";

/// The upstream catalog repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepoRef {
    pub owner: String,
    pub name: String,
    pub default_branch: String,
}

impl RepoRef {
    pub fn new(
        owner: impl Into<String>,
        name: impl Into<String>,
        default_branch: impl Into<String>,
    ) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            default_branch: default_branch.into(),
        }
    }
}

/// Decoded file from the contents API
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub content: String,
    /// Blob sha, required to update the file
    pub sha: String,
}

/// Repository operations used by the remote publisher.
///
/// `owner` selects upstream or fork; the repository name is always the
/// upstream one.
pub trait RepositoryApi {
    fn upstream(&self) -> &RepoRef;

    fn authenticated_user(&self) -> Result<String>;

    /// Fork upstream and return the fork owner. An existing fork is reused.
    fn fork(&self) -> Result<String>;

    /// Head commit sha of `branch` on upstream
    fn branch_head(&self, branch: &str) -> Result<String>;

    fn create_branch(&self, owner: &str, branch: &str, sha: &str) -> Result<()>;

    /// `None` when the file does not exist at `git_ref`
    fn file(&self, owner: &str, path: &str, git_ref: &str) -> Result<Option<RemoteFile>>;

    /// File names directly under `dir`. A missing directory is empty.
    fn list_dir(&self, owner: &str, dir: &str, git_ref: &str) -> Result<Vec<String>>;

    fn put_file(
        &self,
        owner: &str,
        branch: &str,
        path: &str,
        content: &str,
        message: &str,
        sha: Option<&str>,
    ) -> Result<()>;

    /// Open a PR from `<owner>:<branch>` into the upstream default branch;
    /// returns its html url
    fn open_pull_request(&self, owner: &str, branch: &str, title: &str, body: &str)
        -> Result<String>;
}

pub struct GitHubClient {
    client: Client,
    api_base: String,
    token: String,
    upstream: RepoRef,
}

impl GitHubClient {
    /// An empty token is rejected up front.
    pub fn new(token: impl Into<String>, upstream: RepoRef) -> Result<Self> {
        let token = token.into();
        if token.trim().is_empty() {
            return Err(CatalogError::MissingCredential {
                what: "GitHub personal access token".to_string(),
            });
        }
        Ok(Self {
            client: build_client(false)?,
            api_base: DEFAULT_API_BASE.to_string(),
            token,
            upstream,
        })
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.client
            .request(method, url)
            .bearer_auth(&self.token)
            .header(reqwest::header::ACCEPT, ACCEPT)
            .header("X-GitHub-Api-Version", API_VERSION)
    }

    fn call(&self, method: Method, path: &str, body: Option<Value>) -> Result<Value> {
        let url = self.url(path);
        debug!(%method, url = %url, "github request");
        let mut request = self.request(method, &url);
        if let Some(body) = body {
            request = request.json(&body);
        }
        send_json(request, &url)
    }

    fn contents_path(&self, owner: &str, path: &str) -> String {
        format!("/repos/{}/{}/contents/{}", owner, self.upstream.name, path)
    }

    fn get_ref(&self, owner: &str, path: &str, git_ref: &str) -> Result<Option<Value>> {
        let url = self.url(&self.contents_path(owner, path));
        let request = self
            .request(Method::GET, &url)
            .query(&[("ref", git_ref)]);
        match send_json(request, &url) {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.http_status() == Some(404) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

fn str_field<'a>(value: &'a Value, pointer: &str, url: &str) -> Result<&'a str> {
    value
        .pointer(pointer)
        .and_then(Value::as_str)
        .ok_or_else(|| CatalogError::MalformedResponse {
            url: url.to_string(),
            message: format!("missing field {}", pointer),
        })
}

/// Decode contents-API base64, which arrives wrapped at 60 columns
pub fn decode_content(encoded: &str) -> std::result::Result<String, String> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = STANDARD.decode(compact).map_err(|e| e.to_string())?;
    String::from_utf8(bytes).map_err(|e| e.to_string())
}

pub fn encode_content(content: &str) -> String {
    STANDARD.encode(content.as_bytes())
}

impl RepositoryApi for GitHubClient {
    fn upstream(&self) -> &RepoRef {
        &self.upstream
    }

    fn authenticated_user(&self) -> Result<String> {
        let user = self.call(Method::GET, "/user", None)?;
        Ok(str_field(&user, "/login", &self.url("/user"))?.to_string())
    }

    fn fork(&self) -> Result<String> {
        let path = format!("/repos/{}/{}/forks", self.upstream.owner, self.upstream.name);
        match self.call(Method::POST, &path, Some(json!({}))) {
            Ok(fork) => Ok(str_field(&fork, "/owner/login", &self.url(&path))?.to_string()),
            Err(e) if e.http_status() == Some(422) => {
                info!("fork already exists, using authenticated user");
                self.authenticated_user()
            }
            Err(e) => Err(e),
        }
    }

    fn branch_head(&self, branch: &str) -> Result<String> {
        let path = format!(
            "/repos/{}/{}/git/ref/heads/{}",
            self.upstream.owner, self.upstream.name, branch
        );
        let head = self.call(Method::GET, &path, None)?;
        Ok(str_field(&head, "/object/sha", &self.url(&path))?.to_string())
    }

    fn create_branch(&self, owner: &str, branch: &str, sha: &str) -> Result<()> {
        let path = format!("/repos/{}/{}/git/refs", owner, self.upstream.name);
        self.call(
            Method::POST,
            &path,
            Some(json!({ "ref": format!("refs/heads/{}", branch), "sha": sha })),
        )?;
        Ok(())
    }

    fn file(&self, owner: &str, path: &str, git_ref: &str) -> Result<Option<RemoteFile>> {
        let Some(data) = self.get_ref(owner, path, git_ref)? else {
            return Ok(None);
        };
        let url = self.url(&self.contents_path(owner, path));
        let encoded = str_field(&data, "/content", &url)?;
        let sha = str_field(&data, "/sha", &url)?.to_string();
        let content = decode_content(encoded)
            .map_err(|message| CatalogError::MalformedResponse { url, message })?;
        Ok(Some(RemoteFile { content, sha }))
    }

    fn list_dir(&self, owner: &str, dir: &str, git_ref: &str) -> Result<Vec<String>> {
        let Some(data) = self.get_ref(owner, dir, git_ref)? else {
            return Ok(Vec::new());
        };
        let mut names: Vec<String> = data
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter(|e| e.get("type").and_then(Value::as_str) == Some("file"))
                    .filter_map(|e| e.get("name").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        names.sort();
        Ok(names)
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
        let mut payload = json!({
            "message": message,
            "content": encode_content(content),
            "branch": branch,
        });
        if let Some(sha) = sha {
            payload["sha"] = Value::String(sha.to_string());
        }
        self.call(Method::PUT, &self.contents_path(owner, path), Some(payload))?;
        Ok(())
    }

    fn open_pull_request(
        &self,
        owner: &str,
        branch: &str,
        title: &str,
        body: &str,
    ) -> Result<String> {
        let path = format!("/repos/{}/{}/pulls", self.upstream.owner, self.upstream.name);
        let pr = self.call(
            Method::POST,
            &path,
            Some(json!({
                "title": title,
                "body": body,
                "head": format!("{}:{}", owner, branch),
                "base": self.upstream.default_branch,
            })),
        )?;
        Ok(str_field(&pr, "/html_url", &self.url(&path))?.to_string())
    }
}
