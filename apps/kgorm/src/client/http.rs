//! # kg-core HTTP Client
//!
//! Thin wrapper around the kg-core v3 REST API. Every response body is
//! wrapped as `{"data": ...}`; this module unwraps it and maps HTTP status
//! codes onto [`ClientError`].

use super::{ClientError, KgApi, QueryParams, ResultPage};
use async_trait::async_trait;
use kgorm_core::{ReleaseStatus, Stage, uuid_from_uri};
use reqwest::{Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};
use uuid::Uuid;

const SCHEMA_ORG_IDENTIFIER: &str = "http://schema.org/identifier";
const SCHEMA_ORG_NAME: &str = "http://schema.org/name";
const SPACES_PAGE_SIZE: usize = 500;

/// HTTP client for one kg-core deployment.
#[derive(Debug, Clone)]
pub struct KgClient {
    http: reqwest::Client,
    base_url: String,
    token: Option<String>,
}

impl KgClient {
    /// Create a client for `host`.
    ///
    /// A bare host name (`core.kg.ebrains.eu`) targets `https://<host>/v3`;
    /// a full URL is used as the API root unchanged.
    pub fn new(host: &str, token: Option<String>, timeout: Duration) -> Result<Self, ClientError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ClientError::InvalidRequest(format!("cannot build HTTP client: {e}")))?;
        Ok(Self {
            http,
            base_url: base_url_for(host),
            token,
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Build a request with optional Bearer auth.
    fn request(&self, method: Method, path: &str) -> reqwest::RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let mut req = self.http.request(method, &url);
        if let Some(ref token) = self.token {
            req = req.bearer_auth(token);
        }
        req
    }

    /// Send a request and handle connection errors.
    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, ClientError> {
        req.send()
            .await
            .map_err(|e| ClientError::ConnectionFailed(format!("{}: {e}", self.base_url)))
    }

    /// Map non-success status codes onto errors.
    async fn check(&self, resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(match status {
            StatusCode::UNAUTHORIZED => ClientError::Unauthorized,
            StatusCode::FORBIDDEN => ClientError::Forbidden(body),
            StatusCode::NOT_FOUND => ClientError::NotFound(body),
            StatusCode::TOO_MANY_REQUESTS => ClientError::RateLimited,
            s if s.is_server_error() => ClientError::ServerError(s.as_u16(), body),
            s => ClientError::BadRequest(s.as_u16(), body),
        })
    }

    /// Parse the body and return its `data` member (`Null` if absent).
    async fn data(&self, resp: reqwest::Response) -> Result<Value, ClientError> {
        let resp = self.check(resp).await?;
        let text = resp
            .text()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))?;
        if text.trim().is_empty() {
            return Ok(Value::Null);
        }
        let mut body: Value =
            serde_json::from_str(&text).map_err(|e| ClientError::ParseError(e.to_string()))?;
        Ok(body.get_mut("data").map(Value::take).unwrap_or(Value::Null))
    }

    async fn discard(&self, resp: reqwest::Response) -> Result<(), ClientError> {
        self.check(resp).await.map(|_| ())
    }
}

fn base_url_for(host: &str) -> String {
    let host = host.trim_end_matches('/');
    if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("https://{host}/v3")
    }
}

/// Name of a space entry in a `/spaces` listing.
fn space_name(entry: &Value) -> Option<String> {
    entry
        .get(SCHEMA_ORG_IDENTIFIER)
        .or_else(|| entry.get(SCHEMA_ORG_NAME))
        .and_then(Value::as_str)
        .map(str::to_string)
}

#[async_trait]
impl KgApi for KgClient {
    #[instrument(skip(self, query, params), fields(stage = %params.stage, from = params.from, size = params.size))]
    async fn query(&self, query: &Value, params: &QueryParams) -> Result<ResultPage, ClientError> {
        let mut pairs: Vec<(String, String)> = vec![
            ("stage".into(), params.stage.as_str().into()),
            ("from".into(), params.from.to_string()),
            ("size".into(), params.size.to_string()),
            ("returnTotalResults".into(), "true".into()),
        ];
        if let Some(id) = params.instance_id {
            pairs.push(("instanceId".into(), id.to_string()));
        }
        pairs.extend(params.filters.iter().map(|(k, v)| (k.clone(), v.clone())));
        debug!(parameters = ?params.filters, "executing query");

        let req = self
            .request(Method::POST, "/queries")
            .query(&pairs)
            .json(query);
        let resp = self.check(self.send(req).await?).await?;
        resp.json::<ResultPage>()
            .await
            .map_err(|e| ClientError::ParseError(e.to_string()))
    }

    #[instrument(skip(self))]
    async fn instance_from_full_uri(
        &self,
        uri: &str,
        stage: Stage,
    ) -> Result<Option<Value>, ClientError> {
        let uuid = uuid_from_uri(uri).map_err(|e| ClientError::InvalidRequest(e.to_string()))?;
        let req = self
            .request(Method::GET, &format!("/instances/{uuid}"))
            .query(&[
                ("stage", stage.as_str()),
                ("returnEmbedded", "true"),
                ("returnPayload", "true"),
            ]);
        let resp = self.send(req).await?;
        if resp.status() == StatusCode::NOT_FOUND {
            debug!("instance not found");
            return Ok(None);
        }
        let data = self.data(resp).await?;
        Ok((!data.is_null()).then_some(data))
    }

    #[instrument(skip(self, data))]
    async fn create_new_instance(
        &self,
        data: &Value,
        space: &str,
        uuid: Uuid,
    ) -> Result<Value, ClientError> {
        let req = self
            .request(Method::POST, &format!("/instances/{uuid}"))
            .query(&[("space", space), ("returnPayload", "true")])
            .json(data);
        let resp = self.send(req).await?;
        self.data(resp).await
    }

    #[instrument(skip(self, data))]
    async fn update_instance(&self, uuid: Uuid, data: &Value) -> Result<Value, ClientError> {
        let req = self
            .request(Method::PATCH, &format!("/instances/{uuid}"))
            .query(&[("returnPayload", "true")])
            .json(data);
        let resp = self.send(req).await?;
        self.data(resp).await
    }

    #[instrument(skip(self))]
    async fn delete_instance(&self, uuid: Uuid) -> Result<(), ClientError> {
        let req = self.request(Method::DELETE, &format!("/instances/{uuid}"));
        let resp = self.send(req).await?;
        self.discard(resp).await
    }

    #[instrument(skip(self))]
    async fn release(&self, uuid: Uuid) -> Result<(), ClientError> {
        let req = self.request(Method::PUT, &format!("/instances/{uuid}/release"));
        let resp = self.send(req).await?;
        self.discard(resp).await
    }

    #[instrument(skip(self))]
    async fn unrelease(&self, uuid: Uuid) -> Result<(), ClientError> {
        let req = self.request(Method::DELETE, &format!("/instances/{uuid}/release"));
        let resp = self.send(req).await?;
        self.discard(resp).await
    }

    #[instrument(skip(self))]
    async fn release_status(&self, uuid: Uuid) -> Result<ReleaseStatus, ClientError> {
        let req = self
            .request(Method::GET, &format!("/instances/{uuid}/release/status"))
            .query(&[("releaseTreeScope", "TOP_INSTANCE_ONLY")]);
        let resp = self.send(req).await?;
        let data = self.data(resp).await?;
        let status = data
            .as_str()
            .ok_or_else(|| ClientError::ParseError(format!("release status is not a string: {data}")))?;
        status
            .parse()
            .map_err(|e: kgorm_core::KgError| ClientError::ParseError(e.to_string()))
    }

    async fn user_info(&self) -> Result<Value, ClientError> {
        let req = self.request(Method::GET, "/users/me");
        let resp = self.send(req).await?;
        self.data(resp).await
    }

    async fn spaces(&self) -> Result<Vec<String>, ClientError> {
        let mut names = Vec::new();
        let mut from = 0;
        loop {
            let req = self.request(Method::GET, "/spaces").query(&[
                ("permissions", "false".to_string()),
                ("from", from.to_string()),
                ("size", SPACES_PAGE_SIZE.to_string()),
            ]);
            let resp = self.check(self.send(req).await?).await?;
            let page = resp
                .json::<ResultPage>()
                .await
                .map_err(|e| ClientError::ParseError(e.to_string()))?;
            let count = page.data.len();
            names.extend(page.data.iter().filter_map(space_name));
            from += count;
            let more = page.total.map_or(count == SPACES_PAGE_SIZE, |total| from < total);
            if count == 0 || !more {
                break;
            }
        }
        Ok(names)
    }
}
