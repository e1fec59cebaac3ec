//! REST adapter for a hosted Postgres + object storage service.
//!
//! Speaks the usual hosted-backend dialect: `/auth/v1` for identities,
//! `/rest/v1/{table}` for rows and `/storage/v1` for blobs. Requests are
//! authenticated with an `apikey` header plus a bearer token; sign-in uses the
//! anonymous key, everything else the service key when one is configured.

use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use reqwest::header::{CACHE_CONTROL, CONTENT_TYPE};
use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{json, Value};
use url::Url;

use super::{
    AuditEntry, AuditSink, BackendUser, ContentStore, IdentityBackend, ImageTransform,
    NewBackendUser, ObjectStore, RowPage, RowQuery,
};
use crate::{HavenError, Result};

/// Connect timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// User agent for backend calls.
const USER_AGENT: &str = concat!("haven/", env!("CARGO_PKG_VERSION"));

/// Cache lifetime for uploaded objects, in seconds.
const OBJECT_CACHE_SECS: u32 = 3600;

/// Table that receives audit entries.
const AUDIT_TABLE: &str = "admin_logs";

/// REST client for the hosted backend.
#[derive(Clone)]
pub struct RestBackend {
    client: Client,
    base: String,
    anon_key: String,
    service_key: String,
}

impl std::fmt::Debug for RestBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RestBackend")
            .field("base", &self.base)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct SignInResponse {
    user: BackendUser,
}

#[derive(Deserialize)]
struct SignedUploadResponse {
    #[serde(alias = "signedUrl", alias = "signedURL")]
    url: String,
}

impl RestBackend {
    /// Create a client for the backend at `url`.
    pub fn new(url: &str, anon_key: &str, service_key: &str, timeout: Duration) -> Result<Self> {
        let parsed = Url::parse(url.trim())
            .map_err(|e| HavenError::Config(format!("invalid backend url {url:?}: {e}")))?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(HavenError::Config(format!(
                "backend url must be http(s): {url}"
            )));
        }

        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| HavenError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base: parsed.as_str().trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            service_key: service_key.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base)
    }

    /// Key for privileged calls, falling back to the anonymous key.
    fn privileged_key(&self) -> &str {
        if self.service_key.is_empty() {
            &self.anon_key
        } else {
            &self.service_key
        }
    }

    fn authorize(&self, request: RequestBuilder, key: &str) -> RequestBuilder {
        request.header("apikey", key).bearer_auth(key)
    }

    fn table_url(&self, table: &str) -> String {
        self.endpoint(&format!("/rest/v1/{}", urlencoding::encode(table)))
    }

    fn object_url(&self, prefix: &str, bucket: &str, path: &str) -> String {
        self.endpoint(&format!(
            "/storage/v1/{prefix}/{}/{}",
            urlencoding::encode(bucket),
            encode_object_path(path)
        ))
    }
}

/// Percent-encode each segment of an object path, keeping the slashes.
fn encode_object_path(path: &str) -> String {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(|s| urlencoding::encode(s).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Total row count from a `Content-Range: 0-19/42` header.
fn parse_content_range(value: &str) -> Option<u64> {
    value.rsplit_once('/')?.1.trim().parse().ok()
}

/// Best human-readable message from an error response body.
fn error_message(status: reqwest::StatusCode, body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["msg", "message", "error_description", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| format!("HTTP {status}"))
}

/// Pass successful responses through, turn the rest into backend errors.
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(HavenError::Backend(error_message(status, &body)))
}

#[async_trait]
impl IdentityBackend for RestBackend {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<BackendUser> {
        let request = self
            .client
            .post(self.endpoint("/auth/v1/token"))
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        let response = self.authorize(request, &self.anon_key).send().await?;

        let status = response.status();
        if status.is_client_error() {
            let body = response.text().await.unwrap_or_default();
            return Err(HavenError::Auth(error_message(status, &body)));
        }
        let response = check(response).await?;
        Ok(response.json::<SignInResponse>().await?.user)
    }

    async fn create_user(&self, user: &NewBackendUser) -> Result<BackendUser> {
        let request = self
            .client
            .post(self.endpoint("/auth/v1/admin/users"))
            .json(user);
        let response = check(self.authorize(request, self.privileged_key()).send().await?).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl ContentStore for RestBackend {
    async fn select(&self, table: &str, query: &RowQuery) -> Result<RowPage> {
        let mut request = self
            .client
            .get(self.table_url(table))
            .query(&query.to_params());
        if query.count {
            request = request.header("Prefer", "count=exact");
        }
        let response = check(self.authorize(request, self.privileged_key()).send().await?).await?;

        let total = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .and_then(parse_content_range);
        let rows: Vec<Value> = response.json().await?;
        Ok(RowPage {
            total: if query.count {
                total.or(Some(rows.len() as u64))
            } else {
                None
            },
            rows,
        })
    }

    async fn insert(&self, table: &str, row: Value) -> Result<Value> {
        let request = self
            .client
            .post(self.table_url(table))
            .header("Prefer", "return=representation")
            .json(&row);
        let response = check(self.authorize(request, self.privileged_key()).send().await?).await?;
        let mut rows: Vec<Value> = response.json().await?;
        if rows.is_empty() {
            return Ok(row);
        }
        Ok(rows.swap_remove(0))
    }

    async fn update(&self, table: &str, id: &str, patch: Value) -> Result<()> {
        let request = self
            .client
            .patch(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))])
            .header("Prefer", "return=minimal")
            .json(&patch);
        check(self.authorize(request, self.privileged_key()).send().await?).await?;
        Ok(())
    }

    async fn delete(&self, table: &str, id: &str) -> Result<()> {
        let request = self
            .client
            .delete(self.table_url(table))
            .query(&[("id", format!("eq.{id}"))]);
        check(self.authorize(request, self.privileged_key()).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl ObjectStore for RestBackend {
    async fn upload(
        &self,
        bucket: &str,
        path: &str,
        bytes: Bytes,
        content_type: &str,
    ) -> Result<()> {
        let request = self
            .client
            .post(self.object_url("object", bucket, path))
            .header(CONTENT_TYPE, content_type)
            .header(CACHE_CONTROL, format!("max-age={OBJECT_CACHE_SECS}"))
            .header("x-upsert", "true")
            .body(bytes);
        check(self.authorize(request, self.privileged_key()).send().await?).await?;
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str, transform: Option<ImageTransform>) -> String {
        match transform {
            None => self.object_url("object/public", bucket, path),
            Some(t) => {
                let mut params: Vec<String> = Vec::new();
                if let Some(w) = t.width {
                    params.push(format!("width={w}"));
                }
                if let Some(h) = t.height {
                    params.push(format!("height={h}"));
                }
                if let Some(q) = t.quality {
                    params.push(format!("quality={q}"));
                }
                if t.cover {
                    params.push("resize=cover".to_string());
                }
                let url = self.object_url("render/image/public", bucket, path);
                if params.is_empty() {
                    url
                } else {
                    format!("{url}?{}", params.join("&"))
                }
            }
        }
    }

    async fn create_signed_upload_url(&self, bucket: &str, path: &str) -> Result<String> {
        let request = self
            .client
            .post(self.object_url("object/upload/sign", bucket, path));
        let response = check(self.authorize(request, self.privileged_key()).send().await?).await?;
        let signed: SignedUploadResponse = response.json().await?;

        if signed.url.starts_with("http://") || signed.url.starts_with("https://") {
            Ok(signed.url)
        } else {
            Ok(self.endpoint(&format!("/storage/v1{}", signed.url)))
        }
    }

    async fn remove(&self, bucket: &str, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let request = self
            .client
            .delete(self.endpoint(&format!(
                "/storage/v1/object/{}",
                urlencoding::encode(bucket)
            )))
            .json(&json!({ "prefixes": paths }));
        check(self.authorize(request, self.privileged_key()).send().await?).await?;
        Ok(())
    }
}

#[async_trait]
impl AuditSink for RestBackend {
    async fn record(&self, entry: &AuditEntry) -> Result<()> {
        let request = self
            .client
            .post(self.table_url(AUDIT_TABLE))
            .header("Prefer", "return=minimal")
            .json(entry);
        check(self.authorize(request, self.privileged_key()).send().await?).await?;
        Ok(())
    }
}
