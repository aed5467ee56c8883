use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode, Url};
use tokio_util::io::ReaderStream;

use super::error::ImmichError;
use super::types::{format_timestamp, AssetUploadResponse, UploadOutcome, UploadRequest};
use super::UploadTarget;
use crate::classify::mime_type;

const API_KEY_HEADER: &str = "x-api-key";
const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const PING_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for an Immich server.
pub struct ImmichClient {
    client: Client,
    base_url: Url,
    device_id: String,
}

impl ImmichClient {
    pub fn new(base_url: &str, api_key: &str, device_id: &str) -> Result<Self, ImmichError> {
        let parsed = Url::parse(base_url.trim_end_matches('/')).map_err(|e| {
            ImmichError::InvalidUrl {
                url: base_url.to_string(),
                reason: e.to_string(),
            }
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ImmichError::InvalidUrl {
                url: base_url.to_string(),
                reason: format!("unsupported scheme {}", parsed.scheme()),
            });
        }

        let mut key = HeaderValue::from_str(api_key).map_err(|_| ImmichError::InvalidApiKey)?;
        key.set_sensitive(true);
        let mut default_headers = HeaderMap::new();
        default_headers.insert(API_KEY_HEADER, key);

        // No overall timeout: large videos take as long as they take.
        let client = Client::builder()
            .default_headers(default_headers)
            .connect_timeout(CONNECT_TIMEOUT)
            .build()?;

        Ok(Self {
            client,
            base_url: parsed,
            device_id: device_id.to_string(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.base_url.as_str().trim_end_matches('/'), path)
    }

    async fn build_form(
        &self,
        request: &UploadRequest,
        len: u64,
        created_at: DateTime<Utc>,
        modified_at: DateTime<Utc>,
    ) -> Result<Form, String> {
        let file = tokio::fs::File::open(&request.path)
            .await
            .map_err(|e| format!("Failed to open {}: {}", request.path.display(), e))?;
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let part = Part::stream_with_length(body, len)
            .file_name(request.filename.clone())
            .mime_str(mime_type(&request.filename))
            .map_err(|e| format!("Request error: {}", e))?;

        Ok(Form::new()
            .part("assetData", part)
            .text("deviceAssetId", request.source_id.clone())
            .text("deviceId", self.device_id.clone())
            .text("fileCreatedAt", format_timestamp(&created_at))
            .text("fileModifiedAt", format_timestamp(&modified_at)))
    }
}

/// Fill in missing timestamps from the staged file.
///
/// Creation falls back to the file's birth time, or its modification time
/// where the platform has no birth time.
fn resolve_timestamps(
    request: &UploadRequest,
    meta: &std::fs::Metadata,
) -> (DateTime<Utc>, DateTime<Utc>) {
    let mtime = meta.modified().unwrap_or_else(|_| SystemTime::now());
    let birth = meta.created().unwrap_or(mtime);
    (
        request.created_at.unwrap_or_else(|| birth.into()),
        request.modified_at.unwrap_or_else(|| mtime.into()),
    )
}

async fn read_outcome(response: reqwest::Response) -> UploadOutcome {
    let status = response.status();
    let body = match response.text().await {
        Ok(b) => b,
        Err(e) => {
            return UploadOutcome::Failed {
                detail: format!("Request error: {}", e),
            }
        }
    };

    match status {
        StatusCode::CREATED | StatusCode::OK => {
            let parsed: AssetUploadResponse = match serde_json::from_str(&body) {
                Ok(p) => p,
                Err(e) => {
                    return UploadOutcome::Failed {
                        detail: format!(
                            "Unreadable upload response ({}): {} - {}",
                            status.as_u16(),
                            e,
                            body
                        ),
                    }
                }
            };
            if status == StatusCode::OK || parsed.is_duplicate() {
                UploadOutcome::Duplicate {
                    asset_id: parsed.id,
                }
            } else {
                UploadOutcome::Created {
                    asset_id: parsed.id,
                }
            }
        }
        _ => UploadOutcome::Failed {
            detail: format!("Upload failed: {} - {}", status.as_u16(), body),
        },
    }
}

#[async_trait]
impl UploadTarget for ImmichClient {
    async fn ping(&self) -> bool {
        let result = self
            .client
            .get(self.endpoint("/api/server/ping"))
            .timeout(PING_TIMEOUT)
            .send()
            .await;
        match result {
            Ok(resp) if resp.status() == StatusCode::OK => true,
            Ok(resp) => {
                tracing::debug!("Ping returned {}", resp.status());
                false
            }
            Err(e) => {
                tracing::debug!("Ping failed: {}", e);
                false
            }
        }
    }

    async fn upload(&self, request: &UploadRequest) -> UploadOutcome {
        let meta = match tokio::fs::metadata(&request.path).await {
            Ok(m) if m.is_file() => m,
            _ => {
                return UploadOutcome::Failed {
                    detail: format!("File not found: {}", request.path.display()),
                }
            }
        };
        let (created_at, modified_at) = resolve_timestamps(request, &meta);

        let form = match self
            .build_form(request, meta.len(), created_at, modified_at)
            .await
        {
            Ok(f) => f,
            Err(detail) => return UploadOutcome::Failed { detail },
        };

        tracing::debug!(
            id = %request.source_id,
            filename = %request.filename,
            bytes = meta.len(),
            "Uploading"
        );
        match self
            .client
            .post(self.endpoint("/api/assets"))
            .header(reqwest::header::ACCEPT, "application/json")
            .multipart(form)
            .send()
            .await
        {
            Ok(response) => read_outcome(response).await,
            Err(e) => UploadOutcome::Failed {
                detail: format!("Request error: {}", e),
            },
        }
    }
}
