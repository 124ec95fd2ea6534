//! HTTP adapter for the provider gateway.
//!
//! The gateway is a separate local process that owns the provider session
//! and exposes resolved targets, message listings, attachments and member
//! rosters over plain JSON endpoints. This adapter translates gateway HTTP
//! failures into the archivist error taxonomy so callers can tell throttles,
//! permission problems and transient faults apart.

use super::{
    canonical_target_id, is_numeric_reference, validate_username, Attachment, MessageSource,
    RemoteMember, RemoteMessage, SenderProfile, TargetHandle,
};
use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use async_trait::async_trait;
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

const DEFAULT_THROTTLE_WAIT_SECS: u64 = 30;

/// Gateway-backed implementation of [`MessageSource`]
pub struct HttpSource {
    client: Client,
    base: Url,
}

#[derive(Debug, Deserialize)]
struct CountBody {
    count: u64,
}

impl HttpSource {
    pub fn new(config: &GatewayConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("archivist/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(config.timeout_secs))
            .gzip(true)
            .brotli(true)
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        let mut base = Url::parse(&config.url)?;
        if !base.path().ends_with('/') {
            base.set_path(&format!("{}/", base.path()));
        }

        Ok(Self { client, base })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base.join(path)?)
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: Url,
        query: &[(&str, String)],
    ) -> Result<T> {
        debug!("GET {}", url);
        let response = self.client.get(url).query(query).send().await?;
        let response = check_status(response)?;
        Ok(response.json().await?)
    }
}

/// Map a gateway response status to the failure taxonomy
fn check_status(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    match status {
        StatusCode::TOO_MANY_REQUESTS => {
            let wait = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(DEFAULT_THROTTLE_WAIT_SECS);
            Err(Error::Throttled(Duration::from_secs(wait)))
        }
        StatusCode::FORBIDDEN => {
            Err(Error::PermissionDenied(response.url().path().to_string()))
        }
        StatusCode::NOT_FOUND => Err(Error::TargetNotFound(response.url().path().to_string())),
        _ => Err(Error::Transient(format!(
            "HTTP {} from {}",
            status,
            response.url().path()
        ))),
    }
}

/// Extract the filename from a Content-Disposition header value
fn disposition_filename(header: &str) -> Option<String> {
    header.split(';').find_map(|part| {
        let part = part.trim();
        part.strip_prefix("filename=")
            .map(|name| name.trim_matches('"').to_string())
            .filter(|name| !name.is_empty())
    })
}

#[async_trait]
impl MessageSource for HttpSource {
    async fn resolve_target(&self, reference: &str) -> Result<TargetHandle> {
        let reference = if is_numeric_reference(reference) {
            canonical_target_id(reference)
        } else {
            format!("@{}", validate_username(reference)?)
        };

        let url = self.endpoint(&format!("v1/targets/{}", reference))?;
        let mut handle: TargetHandle = self.get_json(url, &[]).await?;
        handle.id = canonical_target_id(&handle.id);
        Ok(handle)
    }

    async fn count_messages_after(&self, target: &TargetHandle, after: i64) -> Result<u64> {
        let url = self.endpoint(&format!("v1/targets/{}/messages/count", target.id))?;
        let body: CountBody = self.get_json(url, &[("after", after.to_string())]).await?;
        Ok(body.count)
    }

    async fn messages_after(
        &self,
        target: &TargetHandle,
        after: i64,
        limit: usize,
    ) -> Result<Vec<RemoteMessage>> {
        let url = self.endpoint(&format!("v1/targets/{}/messages", target.id))?;
        self.get_json(
            url,
            &[("after", after.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn sender_profile(
        &self,
        _target: &TargetHandle,
        sender_id: i64,
    ) -> Result<SenderProfile> {
        let url = self.endpoint(&format!("v1/users/{}", sender_id))?;
        self.get_json(url, &[]).await
    }

    async fn fetch_attachment(
        &self,
        target: &TargetHandle,
        message_id: i64,
    ) -> Result<Attachment> {
        let url = self.endpoint(&format!(
            "v1/targets/{}/messages/{}/attachment",
            target.id, message_id
        ))?;
        debug!("GET {}", url);
        let response = self.client.get(url).send().await?;
        let response = check_status(response)?;

        let suggested_name = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(disposition_filename);
        let mime_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());
        let bytes = response.bytes().await?.to_vec();

        Ok(Attachment {
            bytes,
            suggested_name,
            mime_type,
        })
    }

    async fn members(
        &self,
        target: &TargetHandle,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RemoteMember>> {
        let url = self.endpoint(&format!("v1/targets/{}/members", target.id))?;
        self.get_json(
            url,
            &[("offset", offset.to_string()), ("limit", limit.to_string())],
        )
        .await
    }

    async fn visible_targets(&self, offset: usize, limit: usize) -> Result<Vec<TargetHandle>> {
        let url = self.endpoint("v1/targets")?;
        let mut targets: Vec<TargetHandle> = self
            .get_json(
                url,
                &[("offset", offset.to_string()), ("limit", limit.to_string())],
            )
            .await?;
        for t in &mut targets {
            t.id = canonical_target_id(&t.id);
        }
        Ok(targets)
    }
}
