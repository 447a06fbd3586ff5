//! Dump files from a GitHub repository.
//!
//! Files are fetched raw through the contents API. Dumps stored with Git LFS
//! come back as small pointer files; those are resolved through the media
//! download host and checked against the pointer's oid and size.

use crate::config::SourceConfig;
use crate::remote::{blocking_client, status_error, transport_error, EndpointError, DEFAULT_TIMEOUT};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::{StatusCode, Url};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};

pub const LFS_VERSION_LINE: &str = "version https://git-lfs.github.com/spec/v1";

/// Pointer files are tiny; anything bigger is real content.
const LFS_POINTER_MAX_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum SourceError {
    #[error(transparent)]
    Http(#[from] EndpointError),

    #[error("branch '{branch}' not found in {repo}")]
    BranchNotFound { repo: String, branch: String },

    #[error("invalid URL {url}")]
    InvalidUrl { url: String },

    #[error("LFS object for {path} does not match its pointer: {message}")]
    LfsMismatch { path: String, message: String },

    #[error("{path} is not valid UTF-8")]
    NotUtf8 { path: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Dir,
    Symlink,
    Submodule,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct FolderEntry {
    pub name: String,
    pub path: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[serde(default)]
    pub size: u64,
}

#[derive(Debug, Clone, Deserialize)]
struct Branch {
    name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    pub path: String,
    pub content: String,
    /// Content was resolved from an LFS pointer.
    pub lfs: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchedFile {
    Found(SourceFile),
    NotFound,
}

/// Parsed Git LFS pointer file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LfsPointer {
    /// Hex SHA-256 of the object
    pub oid: String,
    pub size: u64,
}

impl LfsPointer {
    pub fn parse(text: &str) -> Option<Self> {
        if text.len() > LFS_POINTER_MAX_LEN || !text.starts_with(LFS_VERSION_LINE) {
            return None;
        }
        let mut oid = None;
        let mut size = None;
        for line in text.lines() {
            if let Some(rest) = line.strip_prefix("oid sha256:") {
                oid = Some(rest.trim().to_lowercase());
            } else if let Some(rest) = line.strip_prefix("size ") {
                size = rest.trim().parse().ok();
            }
        }
        Some(Self { oid: oid?, size: size? })
    }

    /// Check downloaded bytes against the pointer.
    pub fn verify(&self, bytes: &[u8]) -> Result<(), String> {
        if bytes.len() as u64 != self.size {
            return Err(format!("expected {} bytes, got {}", self.size, bytes.len()));
        }
        let digest = hex::encode(Sha256::digest(bytes));
        if digest != self.oid {
            return Err(format!("expected sha256 {}, got {}", self.oid, digest));
        }
        Ok(())
    }
}

pub struct GitHubSource {
    client: Client,
    api_url: String,
    media_url: String,
    token: Option<String>,
    owner: String,
    repo: String,
    timeout: Duration,
}

impl GitHubSource {
    pub fn new(config: &SourceConfig, owner: impl Into<String>, repo: impl Into<String>) -> Result<Self, SourceError> {
        Ok(Self {
            client: blocking_client(DEFAULT_TIMEOUT)?,
            api_url: config.api_url.clone(),
            media_url: config.media_url.clone(),
            token: config.token.clone(),
            owner: owner.into(),
            repo: repo.into(),
            timeout: DEFAULT_TIMEOUT,
        })
    }

    fn repo_name(&self) -> String {
        format!("{}/{}", self.owner, self.repo)
    }

    pub fn list_branches(&self) -> Result<Vec<String>, SourceError> {
        let url = self.api_endpoint(&["branches"], &[("per_page", "100")])?;
        let response = self
            .get(url, "application/vnd.github+json")?
            .ok_or_else(|| EndpointError::Remote(format!("repository {} not found or not accessible", self.repo_name())))?;
        let branches: Vec<Branch> = self.json(response)?;
        Ok(branches.into_iter().map(|b| b.name).collect())
    }

    /// Entries of a directory, directories first then by name.
    pub fn list_folder(&self, branch: &str, path: &str) -> Result<Vec<FolderEntry>, SourceError> {
        let url = self.contents_url(branch, path)?;
        let Some(response) = self.get(url, "application/vnd.github+json")? else {
            self.ensure_branch(branch)?;
            return Ok(Vec::new());
        };
        let mut entries: Vec<FolderEntry> = self.json(response)?;
        entries.sort_by(|a, b| (a.kind != EntryKind::Dir, &a.name).cmp(&(b.kind != EntryKind::Dir, &b.name)));
        Ok(entries)
    }

    pub fn fetch_file(&self, branch: &str, path: &str) -> Result<FetchedFile, SourceError> {
        let url = self.contents_url(branch, path)?;
        let Some(response) = self.get(url, "application/vnd.github.raw")? else {
            self.ensure_branch(branch)?;
            return Ok(FetchedFile::NotFound);
        };
        let bytes = self.bytes(response)?;

        let text = String::from_utf8(bytes).map_err(|_| SourceError::NotUtf8 { path: path.to_string() })?;
        let Some(pointer) = LfsPointer::parse(&text) else {
            return Ok(FetchedFile::Found(SourceFile {
                path: path.to_string(),
                content: text,
                lfs: false,
            }));
        };

        info!(path, size = pointer.size, "resolving LFS pointer");
        let content = self.fetch_lfs(branch, path, &pointer)?;
        Ok(FetchedFile::Found(SourceFile {
            path: path.to_string(),
            content,
            lfs: true,
        }))
    }

    fn fetch_lfs(&self, branch: &str, path: &str, pointer: &LfsPointer) -> Result<String, SourceError> {
        let url = media_endpoint(&self.media_url, &self.owner, &self.repo, branch, path)?;
        let Some(response) = self.get(url, "application/octet-stream")? else {
            return Err(SourceError::LfsMismatch {
                path: path.to_string(),
                message: "object not found on the media host".to_string(),
            });
        };
        let bytes = self.bytes(response)?;
        pointer.verify(&bytes).map_err(|message| SourceError::LfsMismatch {
            path: path.to_string(),
            message,
        })?;
        String::from_utf8(bytes).map_err(|_| SourceError::NotUtf8 { path: path.to_string() })
    }

    fn ensure_branch(&self, branch: &str) -> Result<(), SourceError> {
        let url = self.api_endpoint(&["branches", branch], &[])?;
        match self.get(url, "application/vnd.github+json")? {
            Some(_) => Ok(()),
            None => Err(SourceError::BranchNotFound {
                repo: self.repo_name(),
                branch: branch.to_string(),
            }),
        }
    }

    fn contents_url(&self, branch: &str, path: &str) -> Result<Url, SourceError> {
        let mut segments = vec!["contents"];
        segments.extend(path.split('/').filter(|s| !s.is_empty()));
        self.api_endpoint(&segments, &[("ref", branch)])
    }

    fn api_endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, SourceError> {
        let mut all = vec!["repos", self.owner.as_str(), self.repo.as_str()];
        all.extend_from_slice(segments);
        build_url(&self.api_url, &all, query)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// GET; `Ok(None)` on 404.
    fn get(&self, url: Url, accept: &str) -> Result<Option<Response>, SourceError> {
        let url_str = url.to_string();
        debug!(url = %url_str, "GET");
        let request = self.authorize(self.client.get(url).header("Accept", accept));
        let response = request
            .send()
            .map_err(|e| transport_error(e, &url_str, self.timeout))?;
        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(status_error(response, &url_str).into());
        }
        Ok(Some(response))
    }

    fn bytes(&self, response: Response) -> Result<Vec<u8>, SourceError> {
        let url = response.url().to_string();
        let bytes = response
            .bytes()
            .map_err(|e| transport_error(e, &url, self.timeout))?;
        Ok(bytes.to_vec())
    }

    fn json<T: serde::de::DeserializeOwned>(&self, response: Response) -> Result<T, SourceError> {
        let url = response.url().to_string();
        let bytes = self.bytes(response)?;
        serde_json::from_slice(&bytes).map_err(|e| {
            EndpointError::Decode {
                url,
                message: e.to_string(),
            }
            .into()
        })
    }
}

fn build_url(base: &str, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, SourceError> {
    let invalid = || SourceError::InvalidUrl { url: base.to_string() };
    let mut url = Url::parse(base).map_err(|_| invalid())?;
    url.path_segments_mut()
        .map_err(|_| invalid())?
        .pop_if_empty()
        .extend(segments);
    if !query.is_empty() {
        url.query_pairs_mut().extend_pairs(query);
    }
    Ok(url)
}

fn media_endpoint(media_url: &str, owner: &str, repo: &str, branch: &str, path: &str) -> Result<Url, SourceError> {
    let mut segments = vec![owner, repo, branch];
    segments.extend(path.split('/').filter(|s| !s.is_empty()));
    build_url(media_url, &segments, &[])
}
