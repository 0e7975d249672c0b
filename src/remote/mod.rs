//! Remote tree client for a hosted Git "contents" and "git data" API.
//!
//! Talks to the GitHub REST API (or anything that speaks the same dialect)
//! with a bearer token, against one branch of one repository. Reads go
//! through the contents endpoint; writes are assembled from the low-level
//! git data endpoints so several files can land in a single commit (see
//! [`crate::commit`]).
//!
//! # Endpoints
//!
//! | Operation | Request |
//! |-----------|---------|
//! | [`read_file`](GitDataApi::read_file) | `GET /repos/{o}/{r}/contents/{path}?ref={branch}` |
//! | [`get_branch_head`](GitDataApi::get_branch_head) | `GET /repos/{o}/{r}/git/ref/heads/{branch}` |
//! | [`get_commit_tree`](GitDataApi::get_commit_tree) | `GET /repos/{o}/{r}/git/commits/{sha}` |
//! | [`create_blob`](GitDataApi::create_blob) | `POST /repos/{o}/{r}/git/blobs` |
//! | [`create_tree`](GitDataApi::create_tree) | `POST /repos/{o}/{r}/git/trees` |
//! | [`create_commit`](GitDataApi::create_commit) | `POST /repos/{o}/{r}/git/commits` |
//! | [`update_branch_head`](GitDataApi::update_branch_head) | `PATCH /repos/{o}/{r}/git/refs/heads/{branch}` |


use async_trait::async_trait;
use base64::Engine;
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RemoteConfig;
use crate::error::StoreError;
use crate::models::{parse_file_text, RemoteFile, Revision};

/// Git file mode for a regular, non-executable file.
pub const FILE_MODE: &str = "100644";

/// One path→blob override layered onto a base tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub path: String,
    pub revision: Revision,
}

/// The git data operations the document store needs from its remote.
///
/// [`RemoteTreeClient`] is the production implementation. The trait is the
/// seam that lets the commit pipeline be exercised against an in-memory
/// repository.
#[async_trait]
pub trait GitDataApi: Send + Sync {
    /// Fetch and decode the file at `path` on the configured branch.
    async fn read_file(&self, path: &str) -> Result<RemoteFile, StoreError>;

    /// Current commit of the configured branch.
    async fn get_branch_head(&self) -> Result<Revision, StoreError>;

    /// Root tree of a commit.
    async fn get_commit_tree(&self, commit: &Revision) -> Result<Revision, StoreError>;

    /// Upload UTF-8 text as a new blob.
    async fn create_blob(&self, text: &str) -> Result<Revision, StoreError>;

    /// Create a tree that layers `entries` onto `base`.
    async fn create_tree(
        &self,
        base: &Revision,
        entries: &[TreeEntry],
    ) -> Result<Revision, StoreError>;

    /// Create a commit with exactly one parent.
    async fn create_commit(
        &self,
        message: &str,
        tree: &Revision,
        parent: &Revision,
    ) -> Result<Revision, StoreError>;

    /// Move the branch to `commit`. Only fast-forwards are accepted.
    async fn update_branch_head(&self, commit: &Revision) -> Result<(), StoreError>;
}

// ============ Wire types ============

#[derive(Deserialize)]
struct ContentsResponse {
    content: String,
    sha: String,
}

#[derive(Deserialize)]
struct RefResponse {
    object: ShaRef,
}

#[derive(Deserialize)]
struct CommitResponse {
    tree: ShaRef,
}

#[derive(Deserialize)]
struct ShaRef {
    sha: String,
}

#[derive(Serialize)]
struct BlobRequest<'a> {
    content: &'a str,
    encoding: &'static str,
}

#[derive(Serialize)]
struct TreeRequest<'a> {
    base_tree: &'a str,
    tree: Vec<TreeItem<'a>>,
}

#[derive(Serialize)]
struct TreeItem<'a> {
    path: &'a str,
    mode: &'static str,
    #[serde(rename = "type")]
    kind: &'static str,
    sha: &'a str,
}

#[derive(Serialize)]
struct CommitRequest<'a> {
    message: &'a str,
    tree: &'a str,
    parents: [&'a str; 1],
}

#[derive(Serialize)]
struct UpdateRefRequest<'a> {
    sha: &'a str,
    force: bool,
}

// ============ Client ============

/// HTTP client for one branch of one repository.
pub struct RemoteTreeClient {
    client: reqwest::Client,
    api_url: String,
    owner: String,
    repo: String,
    branch: String,
    token: String,
}

impl RemoteTreeClient {
    pub fn new(config: &RemoteConfig) -> Result<Self, StoreError> {
        let mut builder = reqwest::Client::builder()
            .user_agent(concat!("repo-docstore/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| StoreError::transport("build HTTP client", e))?;

        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            owner: config.owner.clone(),
            repo: config.repo.clone(),
            branch: config.branch.clone(),
            token: config.token(),
        })
    }

    pub fn branch(&self) -> &str {
        &self.branch
    }

    fn repo_url(&self, suffix: &str) -> String {
        format!(
            "{}/repos/{}/{}/{}",
            self.api_url, self.owner, self.repo, suffix
        )
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        req.bearer_auth(&self.token)
            .header("Accept", "application/vnd.github.v3+json")
    }

    async fn send(&self, req: RequestBuilder, context: &str) -> Result<Response, StoreError> {
        debug!(target: "docstore::remote", "{}", context);
        self.authorized(req)
            .send()
            .await
            .map_err(|e| StoreError::transport(context, e))
    }

    /// Sends a write step and decodes its JSON answer.
    async fn write<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        context: &str,
    ) -> Result<T, StoreError> {
        let resp = self.send(req, context).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::remote_write(context, status.as_u16(), &body));
        }
        decode_json(resp, context).await
    }

    /// Sends a read step and decodes its JSON answer.
    async fn read<T: DeserializeOwned>(
        &self,
        req: RequestBuilder,
        context: &str,
    ) -> Result<T, StoreError> {
        let resp = self.send(req, context).await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::remote_read(context, status.as_u16(), &body));
        }
        decode_json(resp, context).await
    }
}

async fn decode_json<T: DeserializeOwned>(resp: Response, context: &str) -> Result<T, StoreError> {
    resp.json::<T>()
        .await
        .map_err(|e| StoreError::Decode(format!("{}: {}", context, e)))
}

/// Decodes a contents-API payload: base64 (wrapped at 60 columns by the
/// remote) holding UTF-8 JSON, possibly behind a byte-order mark.
pub fn decode_content(encoded: &str) -> Result<serde_json::Value, StoreError> {
    let compact: String = encoded.chars().filter(|c| !c.is_whitespace()).collect();
    let bytes = base64::engine::general_purpose::STANDARD
        .decode(compact.as_bytes())
        .map_err(|e| StoreError::Decode(format!("invalid base64: {}", e)))?;
    let text =
        String::from_utf8(bytes).map_err(|e| StoreError::Decode(format!("invalid UTF-8: {}", e)))?;
    parse_file_text(&text)
}

#[async_trait]
impl GitDataApi for RemoteTreeClient {
    async fn read_file(&self, path: &str) -> Result<RemoteFile, StoreError> {
        let context = format!("GET {}", path);
        let url = self.repo_url(&format!("contents/{}", path.trim_start_matches('/')));
        let req = self.client.get(&url).query(&[("ref", self.branch.as_str())]);
        let resp = self.send(req, &context).await?;

        let status = resp.status();
        if status == StatusCode::NOT_FOUND {
            return Err(StoreError::NotFound(format!("File not found: {}", path)));
        }
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(StoreError::remote_read(context, status.as_u16(), &body));
        }

        let data: ContentsResponse = decode_json(resp, &context).await?;
        let content = decode_content(&data.content)?;
        Ok(RemoteFile {
            content,
            revision: Revision(data.sha),
        })
    }

    async fn get_branch_head(&self) -> Result<Revision, StoreError> {
        let context = format!("get branch ref heads/{}", self.branch);
        let url = self.repo_url(&format!("git/ref/heads/{}", self.branch));
        let data: RefResponse = self.read(self.client.get(&url), &context).await?;
        Ok(Revision(data.object.sha))
    }

    async fn get_commit_tree(&self, commit: &Revision) -> Result<Revision, StoreError> {
        let context = format!("get commit {}", commit);
        let url = self.repo_url(&format!("git/commits/{}", commit));
        let data: CommitResponse = self.read(self.client.get(&url), &context).await?;
        Ok(Revision(data.tree.sha))
    }

    async fn create_blob(&self, text: &str) -> Result<Revision, StoreError> {
        let body = BlobRequest {
            content: text,
            encoding: "utf-8",
        };
        let req = self.client.post(self.repo_url("git/blobs")).json(&body);
        let data: ShaRef = self.write(req, "create blob").await?;
        Ok(Revision(data.sha))
    }

    async fn create_tree(
        &self,
        base: &Revision,
        entries: &[TreeEntry],
    ) -> Result<Revision, StoreError> {
        let body = TreeRequest {
            base_tree: base.as_str(),
            tree: entries
                .iter()
                .map(|e| TreeItem {
                    path: &e.path,
                    mode: FILE_MODE,
                    kind: "blob",
                    sha: e.revision.as_str(),
                })
                .collect(),
        };
        let req = self.client.post(self.repo_url("git/trees")).json(&body);
        let data: ShaRef = self.write(req, "create tree").await?;
        Ok(Revision(data.sha))
    }

    async fn create_commit(
        &self,
        message: &str,
        tree: &Revision,
        parent: &Revision,
    ) -> Result<Revision, StoreError> {
        let body = CommitRequest {
            message,
            tree: tree.as_str(),
            parents: [parent.as_str()],
        };
        let req = self.client.post(self.repo_url("git/commits")).json(&body);
        let data: ShaRef = self.write(req, "create commit").await?;
        Ok(Revision(data.sha))
    }

    async fn update_branch_head(&self, commit: &Revision) -> Result<(), StoreError> {
        let context = format!("update ref heads/{}", self.branch);
        let url = self.repo_url(&format!("git/refs/heads/{}", self.branch));
        let body = UpdateRefRequest {
            sha: commit.as_str(),
            force: false,
        };
        let resp = self.send(self.client.patch(&url).json(&body), &context).await?;

        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }
        let body = resp.text().await.unwrap_or_default();
        // The remote refuses non-fast-forward moves with 409 or 422.
        if status == StatusCode::CONFLICT || status == StatusCode::UNPROCESSABLE_ENTITY {
            return Err(StoreError::conflict(&context, status.as_u16(), &body));
        }
        Err(StoreError::remote_write(context, status.as_u16(), &body))
    }
}
