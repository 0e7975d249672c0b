//! HTTP client for the document API, with a static-file fallback for reads.
//!
//! Public pages must render even when the API is down (for example a static
//! deployment without the server functions). The client probes the API once,
//! with a short timeout, and remembers the answer; while the API is
//! unavailable, reads are served from the static `{name}.json` copies that
//! the public directory publishes. Writes always go to the API.

use anyhow::{bail, Context, Result};
use reqwest::Method;
use serde_json::Value;
use std::time::Duration;
use tokio::sync::OnceCell;

use crate::auth::ADMIN_SECRET_HEADER;
use crate::documents;
use crate::models::{Collection, Document, SETTINGS_NAME};

/// How long the availability probe waits before giving up on the API.
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(1500);

pub struct ApiClient {
    http: reqwest::Client,
    api_url: String,
    static_url: Option<String>,
    secret: Option<String>,
    available: OnceCell<bool>,
}

impl ApiClient {
    /// `api_url` is the server root (`http://host:3000`); `static_url`, when
    /// given, is where `{name}.json` files are served (`http://host/data`).
    pub fn new(api_url: &str, static_url: Option<&str>, secret: Option<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_url: api_url.trim_end_matches('/').to_string(),
            static_url: static_url.map(|s| s.trim_end_matches('/').to_string()),
            secret: secret.filter(|s| !s.is_empty()),
            available: OnceCell::new(),
        }
    }

    /// Whether the API answered the probe. Probed once per client.
    pub async fn is_api_available(&self) -> bool {
        *self
            .available
            .get_or_init(|| async {
                let url = format!("{}/settings", self.api_url);
                match self.http.get(&url).timeout(PROBE_TIMEOUT).send().await {
                    Ok(resp) => resp.status().is_success(),
                    Err(_) => false,
                }
            })
            .await
    }

    /// True when reads should bypass the API.
    async fn use_static(&self) -> bool {
        self.static_url.is_some() && !self.is_api_available().await
    }

    fn static_file_url(&self, name: &str) -> String {
        format!(
            "{}/{}.json",
            self.static_url.as_deref().unwrap_or_default(),
            name
        )
    }

    async fn fetch_json(&self, url: &str) -> Result<Value> {
        let resp = self
            .http
            .get(url)
            .send()
            .await
            .with_context(|| format!("GET {}", url))?;
        let status = resp.status();
        if !status.is_success() {
            bail!("GET {} → {}", url, status.as_u16());
        }
        Ok(resp.json().await?)
    }

    pub async fn list(&self, collection: Collection) -> Result<Vec<Document>> {
        let value = if self.use_static().await {
            self.fetch_json(&self.static_file_url(collection.as_str()))
                .await?
        } else {
            self.fetch_json(&format!("{}/collections/{}", self.api_url, collection))
                .await?
        };
        Ok(documents::into_items(value, collection.as_str())?)
    }

    pub async fn get(&self, collection: Collection, id: &str) -> Result<Document> {
        if self.use_static().await {
            let items = self.list(collection).await?;
            return documents::find(&items, id)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("{}/{} not found", collection, id));
        }
        self.fetch_json(&format!(
            "{}/collections/{}/{}",
            self.api_url, collection, id
        ))
        .await
    }

    pub async fn settings(&self) -> Result<Document> {
        if self.use_static().await {
            return self.fetch_json(&self.static_file_url(SETTINGS_NAME)).await;
        }
        self.fetch_json(&format!("{}/settings", self.api_url)).await
    }

    async fn write(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.api_url, path);
        let mut req = self.http.request(method.clone(), &url);
        if let Some(secret) = &self.secret {
            req = req.header(ADMIN_SECRET_HEADER, secret);
        }
        if let Some(body) = body {
            req = req.json(body);
        }
        let resp = req
            .send()
            .await
            .with_context(|| format!("{} {}", method, url))?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            bail!("{} {} → {} {}", method, url, status.as_u16(), text);
        }
        Ok(resp.json().await?)
    }

    pub async fn create(&self, collection: Collection, doc: &Value) -> Result<Document> {
        self.write(Method::POST, &format!("/collections/{}", collection), Some(doc))
            .await
    }

    pub async fn update(&self, collection: Collection, id: &str, doc: &Value) -> Result<Document> {
        self.write(
            Method::PUT,
            &format!("/collections/{}/{}", collection, id),
            Some(doc),
        )
        .await
    }

    pub async fn delete(&self, collection: Collection, id: &str) -> Result<()> {
        self.write(
            Method::DELETE,
            &format!("/collections/{}/{}", collection, id),
            None,
        )
        .await?;
        Ok(())
    }

    pub async fn put_settings(&self, settings: &Value) -> Result<Document> {
        self.write(Method::PUT, "/settings", Some(settings)).await
    }
}
