//! Shared fixtures: a fake hosted Git API and helpers to start servers.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};
use base64::Engine;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use repo_docstore::auth::AuthGate;
use repo_docstore::config::{LayoutConfig, RemoteConfig};
use repo_docstore::remote::RemoteTreeClient;
use repo_docstore::server::{router, AppState};
use repo_docstore::store::{DocumentStore, RemoteDocumentStore};

pub const TOKEN_ENV: &str = "DOCSTORE_TEST_TOKEN";
pub const TOKEN: &str = "test-token";
pub const OWNER: &str = "acme";
pub const REPO: &str = "site";
pub const BRANCH: &str = "main";
pub const CACHE_CONTROL: &str = "s-maxage=60, stale-while-revalidate=300";

// ─── Fake repository ────────────────────────────────────────────────

#[derive(Default)]
pub struct FakeRepo {
    pub blobs: HashMap<String, String>,
    pub trees: HashMap<String, BTreeMap<String, String>>,
    /// commit sha → (tree sha, parent sha, message)
    pub commits: HashMap<String, (String, Option<String>, String)>,
    pub head: String,
    /// Answer 500 to every tree creation.
    pub fail_trees: bool,
    /// Number of successful ref updates.
    pub ref_updates: usize,
}

fn sha(kind: &str, payload: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update([0u8]);
    hasher.update(payload.as_bytes());
    hex::encode(&hasher.finalize()[..20])
}

impl FakeRepo {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let mut repo = FakeRepo::default();
        let mut tree = BTreeMap::new();
        for (path, text) in files {
            tree.insert(path.to_string(), repo.put_blob(text));
        }
        let tree_sha = repo.put_tree(tree);
        let commit = sha("commit", &format!("{}:initial", tree_sha));
        repo.commits
            .insert(commit.clone(), (tree_sha, None, "Initial commit".into()));
        repo.head = commit;
        repo
    }

    fn put_blob(&mut self, text: &str) -> String {
        let id = sha("blob", text);
        self.blobs.insert(id.clone(), text.to_string());
        id
    }

    fn put_tree(&mut self, tree: BTreeMap<String, String>) -> String {
        let id = sha("tree", &format!("{:?}", tree));
        self.trees.insert(id.clone(), tree);
        id
    }

    pub fn file_text(&self, path: &str) -> Option<String> {
        let (tree, _, _) = self.commits.get(&self.head)?;
        let blob = self.trees.get(tree)?.get(path)?;
        self.blobs.get(blob).cloned()
    }

    pub fn head_message(&self) -> String {
        self.commits[&self.head].2.clone()
    }
}

pub type SharedRepo = Arc<Mutex<FakeRepo>>;

fn authorized(headers: &HeaderMap) -> bool {
    headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(|v| v == format!("Bearer {}", TOKEN))
        .unwrap_or(false)
}

fn unauthorized() -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({ "message": "Bad credentials" })),
    )
        .into_response()
}

fn not_found() -> Response {
    (StatusCode::NOT_FOUND, Json(json!({ "message": "Not Found" }))).into_response()
}

/// GitHub wraps base64 content at 60 columns.
fn wrap_base64(text: &str) -> String {
    let encoded = base64::engine::general_purpose::STANDARD.encode(text.as_bytes());
    encoded
        .as_bytes()
        .chunks(60)
        .map(|c| format!("{}\n", std::str::from_utf8(c).unwrap()))
        .collect()
}

async fn contents(
    State(repo): State<SharedRepo>,
    Path((_owner, _repo, path)): Path<(String, String, String)>,
    Query(query): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(query.get("ref").map(String::as_str), Some(BRANCH));
    let repo = repo.lock().unwrap();
    let Some((tree, _, _)) = repo.commits.get(&repo.head) else {
        return not_found();
    };
    match repo.trees[tree].get(&path) {
        Some(blob) => Json(json!({
            "type": "file",
            "encoding": "base64",
            "path": path,
            "sha": blob,
            "content": wrap_base64(&repo.blobs[blob]),
        }))
        .into_response(),
        None => not_found(),
    }
}

async fn get_ref(
    State(repo): State<SharedRepo>,
    Path((_owner, _repo, branch)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if branch != BRANCH {
        return not_found();
    }
    let repo = repo.lock().unwrap();
    Json(json!({ "ref": "refs/heads/main", "object": { "type": "commit", "sha": repo.head } }))
        .into_response()
}

async fn get_commit(
    State(repo): State<SharedRepo>,
    Path((_owner, _repo, commit)): Path<(String, String, String)>,
    headers: HeaderMap,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let repo = repo.lock().unwrap();
    match repo.commits.get(&commit) {
        Some((tree, _, message)) => {
            Json(json!({ "sha": commit, "message": message, "tree": { "sha": tree } }))
                .into_response()
        }
        None => not_found(),
    }
}

async fn create_blob(
    State(repo): State<SharedRepo>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    assert_eq!(body["encoding"], "utf-8");
    let text = body["content"].as_str().unwrap_or_default();
    let id = repo.lock().unwrap().put_blob(text);
    (StatusCode::CREATED, Json(json!({ "sha": id }))).into_response()
}

async fn create_tree(
    State(repo): State<SharedRepo>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut repo = repo.lock().unwrap();
    if repo.fail_trees {
        return (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "message": "tree service unavailable" })),
        )
            .into_response();
    }
    let base = body["base_tree"].as_str().unwrap_or_default();
    let Some(mut tree) = repo.trees.get(base).cloned() else {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "base_tree is not a tree" })),
        )
            .into_response();
    };
    for entry in body["tree"].as_array().cloned().unwrap_or_default() {
        assert_eq!(entry["mode"], "100644");
        assert_eq!(entry["type"], "blob");
        tree.insert(
            entry["path"].as_str().unwrap().to_string(),
            entry["sha"].as_str().unwrap().to_string(),
        );
    }
    let id = repo.put_tree(tree);
    (StatusCode::CREATED, Json(json!({ "sha": id }))).into_response()
}

async fn create_commit(
    State(repo): State<SharedRepo>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    let mut repo = repo.lock().unwrap();
    let tree = body["tree"].as_str().unwrap_or_default().to_string();
    let message = body["message"].as_str().unwrap_or_default().to_string();
    let parents = body["parents"].as_array().cloned().unwrap_or_default();
    assert_eq!(parents.len(), 1, "commits must have exactly one parent");
    let parent = parents[0].as_str().map(str::to_string);
    let id = sha("commit", &format!("{}:{:?}:{}", tree, parent, message));
    repo.commits.insert(id.clone(), (tree, parent, message));
    (StatusCode::CREATED, Json(json!({ "sha": id }))).into_response()
}

async fn update_ref(
    State(repo): State<SharedRepo>,
    Path((_owner, _repo, branch)): Path<(String, String, String)>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if !authorized(&headers) {
        return unauthorized();
    }
    if branch != BRANCH {
        return not_found();
    }
    let mut repo = repo.lock().unwrap();
    let commit = body["sha"].as_str().unwrap_or_default().to_string();
    let force = body["force"].as_bool().unwrap_or(false);
    let parent = repo.commits.get(&commit).and_then(|c| c.1.clone());
    if !force && parent.as_deref() != Some(repo.head.as_str()) {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({ "message": "Update is not a fast forward" })),
        )
            .into_response();
    }
    repo.head = commit.clone();
    repo.ref_updates += 1;
    Json(json!({ "ref": "refs/heads/main", "object": { "sha": commit } })).into_response()
}

fn fake_github(repo: SharedRepo) -> Router {
    Router::new()
        .route("/repos/{owner}/{repo}/contents/{*path}", get(contents))
        .route("/repos/{owner}/{repo}/git/ref/heads/{branch}", get(get_ref))
        .route("/repos/{owner}/{repo}/git/commits/{sha}", get(get_commit))
        .route("/repos/{owner}/{repo}/git/blobs", post(create_blob))
        .route("/repos/{owner}/{repo}/git/trees", post(create_tree))
        .route("/repos/{owner}/{repo}/git/commits", post(create_commit))
        .route(
            "/repos/{owner}/{repo}/git/refs/heads/{branch}",
            patch(update_ref),
        )
        .with_state(repo)
}

/// Serves `app` on an ephemeral port and returns its base URL.
pub async fn spawn(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    format!("http://{}", addr)
}

/// Starts the fake remote seeded with `files`.
pub async fn start_fake_remote(files: &[(&str, &str)]) -> (SharedRepo, String) {
    let repo = Arc::new(Mutex::new(FakeRepo::with_files(files)));
    let url = spawn(fake_github(repo.clone())).await;
    (repo, url)
}

pub fn remote_config(api_url: &str) -> RemoteConfig {
    std::env::set_var(TOKEN_ENV, TOKEN);
    RemoteConfig {
        owner: OWNER.to_string(),
        repo: REPO.to_string(),
        branch: BRANCH.to_string(),
        api_url: api_url.to_string(),
        token_env: TOKEN_ENV.to_string(),
        timeout_secs: Some(10),
    }
}

pub fn remote_store(api_url: &str) -> RemoteDocumentStore {
    let client = RemoteTreeClient::new(&remote_config(api_url)).unwrap();
    RemoteDocumentStore::new(Arc::new(client), LayoutConfig::default())
}

/// Starts the docstore API over `store` and returns its base URL.
pub async fn start_api(store: Arc<dyn DocumentStore>, secret: Option<&str>) -> String {
    let state = AppState::new(store, AuthGate::new(secret.map(str::to_string)), CACHE_CONTROL);
    spawn(router(state)).await
}

/// Seed files for the mirrored layout: every collection in both dirs.
pub fn seed_files(events: &'static str) -> Vec<(&'static str, &'static str)> {
    vec![
        ("public/data/events.json", events),
        ("db/events.json", events),
        ("public/data/staff.json", "[]\n"),
        ("db/staff.json", "[]\n"),
        (
            "public/data/settings.json",
            "{\n  \"siteName\": \"Grace Church\"\n}\n",
        ),
        ("db/settings.json", "{\n  \"siteName\": \"Grace Church\"\n}\n"),
    ]
}
