//! Cloudinary media host
//!
//! Uploads and deletes use the signed upload API: every request carries a
//! timestamp and a SHA-256 signature of the sorted parameters followed by the
//! API secret. Listing goes through the admin API with basic auth.

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use bytes::Bytes;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::{DeleteStatus, MediaTransport, UploadedMedia};
use crate::error::{MemorialError, Result};
use crate::registry::MediaKind;

const DEFAULT_BASE_URL: &str = "https://api.cloudinary.com";
const LIST_PAGE_SIZE: u32 = 500;

/// Cloudinary transport
pub struct CloudinaryTransport {
    cloud_name: String,
    api_key: String,
    api_secret: String,
    folder_root: String,
    base_url: String,
    client: reqwest::Client,
}

/// Upload response (only the fields we use)
#[derive(Debug, Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
    bytes: u64,
}

/// Destroy response
#[derive(Debug, Deserialize)]
struct DestroyResponse {
    result: String,
}

/// One page of the admin resources listing
#[derive(Debug, Deserialize)]
struct ResourcesPage {
    resources: Vec<Resource>,
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Resource {
    public_id: String,
}

/// Error envelope returned on 4xx/5xx
#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

impl CloudinaryTransport {
    pub fn new(
        cloud_name: String,
        api_key: String,
        api_secret: String,
        folder_root: String,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MemorialError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            cloud_name,
            api_key,
            api_secret,
            folder_root,
            base_url: DEFAULT_BASE_URL.to_string(),
            client,
        })
    }

    pub fn with_base_url(mut self, base_url: String) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Remote folder for a media kind, e.g. `kora/photos`
    pub fn folder(&self, kind: MediaKind) -> String {
        format!("{}/{}", self.folder_root, kind.collection())
    }

    fn endpoint(&self, kind: MediaKind, action: &str) -> String {
        format!(
            "{}/v1_1/{}/{}/{}",
            self.base_url,
            self.cloud_name,
            kind.resource_type(),
            action
        )
    }

    /// Signature over `params` sorted by name, joined as `k=v&k=v`, then the secret
    pub fn sign(&self, params: &[(&str, String)]) -> String {
        let mut sorted: Vec<_> = params.iter().collect();
        sorted.sort_by(|a, b| a.0.cmp(b.0));

        let to_sign = sorted
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join("&");

        let mut hasher = Sha256::new();
        hasher.update(to_sign.as_bytes());
        hasher.update(self.api_secret.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    /// Attach credentials and the signature to the signed parameters
    fn signed_form(&self, mut params: Vec<(&'static str, String)>) -> Vec<(&'static str, String)> {
        let signature = self.sign(&params);
        params.push(("api_key", self.api_key.clone()));
        params.push(("signature", signature));
        params.push(("signature_algorithm", "sha256".to_string()));
        params
    }

    async fn post_form<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        form: &[(&'static str, String)],
    ) -> Result<T> {
        Self::read_json(self.client.post(url).form(form)).await
    }

    async fn read_json<T: serde::de::DeserializeOwned>(request: reqwest::RequestBuilder) -> Result<T> {
        let response = request
            .send()
            .await
            .map_err(|e| MemorialError::Transport(format!("request to media host failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            warn!("Media host returned {}: {}", status, message);
            return Err(MemorialError::Transport(format!(
                "media host returned {}: {}",
                status, message
            )));
        }

        response
            .json::<T>()
            .await
            .map_err(|e| MemorialError::Transport(format!("invalid media host response: {}", e)))
    }
}

fn unix_timestamp() -> String {
    chrono::Utc::now().timestamp().to_string()
}

#[async_trait]
impl MediaTransport for CloudinaryTransport {
    async fn upload(&self, data: Bytes, kind: MediaKind) -> Result<UploadedMedia> {
        let folder = self.folder(kind);
        debug!("Uploading {} bytes to {}", data.len(), folder);

        let mut form = self.signed_form(vec![("folder", folder), ("timestamp", unix_timestamp())]);
        form.push((
            "file",
            format!("data:application/octet-stream;base64,{}", BASE64.encode(&data)),
        ));

        let uploaded: UploadResponse = self
            .post_form(&self.endpoint(kind, "upload"), &form)
            .await
            .map_err(|e| {
                error!("Upload of {} failed: {}", kind, e);
                e
            })?;

        if uploaded.bytes == 0 {
            return Err(MemorialError::Transport(
                "media host reported an empty upload".to_string(),
            ));
        }

        info!("Uploaded {} {} ({} bytes)", kind, uploaded.public_id, uploaded.bytes);
        Ok(UploadedMedia {
            locator: uploaded.secure_url,
            external_id: uploaded.public_id,
            size_bytes: uploaded.bytes,
        })
    }

    async fn delete(&self, external_id: &str, kind: MediaKind) -> Result<DeleteStatus> {
        let form = self.signed_form(vec![
            ("invalidate", "true".to_string()),
            ("public_id", external_id.to_string()),
            ("timestamp", unix_timestamp()),
        ]);

        let destroyed: DestroyResponse = self.post_form(&self.endpoint(kind, "destroy"), &form).await?;

        match destroyed.result.as_str() {
            "ok" => {
                info!("Deleted {} {} from media host", kind, external_id);
                Ok(DeleteStatus::Ok)
            }
            "not found" => {
                debug!("{} {} already absent on media host", kind, external_id);
                Ok(DeleteStatus::NotFound)
            }
            other => Err(MemorialError::Transport(format!(
                "unexpected destroy result for {}: {}",
                external_id, other
            ))),
        }
    }

    async fn list_objects(&self, kind: MediaKind) -> Result<Vec<String>> {
        let url = format!(
            "{}/v1_1/{}/resources/{}/upload",
            self.base_url,
            self.cloud_name,
            kind.resource_type()
        );
        let prefix = format!("{}/", self.folder(kind));

        let mut ids = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let mut query = vec![
                ("prefix", prefix.clone()),
                ("max_results", LIST_PAGE_SIZE.to_string()),
            ];
            if let Some(cursor) = cursor.take() {
                query.push(("next_cursor", cursor));
            }

            let request = self
                .client
                .get(&url)
                .basic_auth(&self.api_key, Some(&self.api_secret))
                .query(&query);
            let page: ResourcesPage = Self::read_json(request).await?;

            ids.extend(page.resources.into_iter().map(|r| r.public_id));
            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!("Media host lists {} object(s) under {}", ids.len(), prefix);
        Ok(ids)
    }

    fn name(&self) -> &'static str {
        "cloudinary"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::extract::{Path, Query};
    use axum::http::HeaderMap;
    use axum::routing::{get, post};
    use axum::{Form, Json, Router};
    use std::collections::HashMap;

    fn transport(base_url: &str) -> CloudinaryTransport {
        CloudinaryTransport::new(
            "demo".to_string(),
            "key".to_string(),
            "secret".to_string(),
            "kora".to_string(),
            Duration::from_secs(5),
        )
        .unwrap()
        .with_base_url(base_url.to_string())
    }

    /// Fake media host: answers upload with a canned body and destroy by public_id
    async fn start_fake_host() -> String {
        async fn upload(
            Path((_cloud, resource)): Path<(String, String)>,
            Form(form): Form<HashMap<String, String>>,
        ) -> Json<serde_json::Value> {
            let file = form.get("file").cloned().unwrap_or_default();
            let payload = file.split(',').nth(1).unwrap_or_default();
            let bytes = BASE64.decode(payload).map(|b| b.len()).unwrap_or(0);
            Json(serde_json::json!({
                "secure_url": format!("https://res.test/{}/{}.bin", resource, form["folder"]),
                "public_id": format!("{}/abc123", form["folder"]),
                "bytes": bytes,
            }))
        }

        async fn destroy(Form(form): Form<HashMap<String, String>>) -> Json<serde_json::Value> {
            let result = if form["public_id"].ends_with("missing") {
                "not found"
            } else {
                "ok"
            };
            Json(serde_json::json!({ "result": result }))
        }

        /// Two pages under the requested prefix; requires basic auth
        async fn resources(
            headers: HeaderMap,
            Query(query): Query<HashMap<String, String>>,
        ) -> Json<serde_json::Value> {
            let expected = format!("Basic {}", BASE64.encode("key:secret"));
            if headers.get("authorization").and_then(|v| v.to_str().ok()) != Some(expected.as_str()) {
                return Json(serde_json::json!({ "resources": [] }));
            }

            let prefix = &query["prefix"];
            match query.get("next_cursor").map(String::as_str) {
                None => Json(serde_json::json!({
                    "resources": [{ "public_id": format!("{}a", prefix) }],
                    "next_cursor": "page2",
                })),
                Some(_) => Json(serde_json::json!({
                    "resources": [{ "public_id": format!("{}b", prefix) }],
                })),
            }
        }

        let app = Router::new()
            .route("/v1_1/:cloud/:resource/upload", post(upload))
            .route("/v1_1/:cloud/:resource/destroy", post(destroy))
            .route("/v1_1/:cloud/resources/:resource/upload", get(resources));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        format!("http://{}", addr)
    }

    #[test]
    fn test_sign_sorts_parameters() {
        let transport = transport(DEFAULT_BASE_URL);
        let signature = transport.sign(&[
            ("timestamp", "1700000000".to_string()),
            ("folder", "kora/photos".to_string()),
        ]);
        assert_eq!(
            signature,
            "743357292a8db76d9b196141d2c783211c9b0551a32759f5926cc6fbf3a16609"
        );
    }

    #[test]
    fn test_sign_destroy_parameters() {
        let transport = transport(DEFAULT_BASE_URL);
        let signature = transport.sign(&[
            ("public_id", "kora/photos/abc".to_string()),
            ("timestamp", "1700000000".to_string()),
            ("invalidate", "true".to_string()),
        ]);
        assert_eq!(
            signature,
            "2daed4bfadd16ae774783e145c98818e84fc8583fb3ad1a3277fe5f5882aff0e"
        );
    }

    #[test]
    fn test_folders_and_endpoints() {
        let transport = transport("https://api.test/");
        assert_eq!(transport.folder(MediaKind::Photo), "kora/photos");
        assert_eq!(transport.folder(MediaKind::Video), "kora/videos");
        assert_eq!(
            transport.endpoint(MediaKind::Video, "upload"),
            "https://api.test/v1_1/demo/video/upload"
        );
    }

    #[tokio::test]
    async fn test_upload_against_fake_host() {
        let base_url = start_fake_host().await;
        let transport = transport(&base_url);

        let uploaded = transport
            .upload(Bytes::from_static(b"0123456789"), MediaKind::Photo)
            .await
            .unwrap();
        assert_eq!(uploaded.size_bytes, 10);
        assert_eq!(uploaded.external_id, "kora/photos/abc123");
    }

    #[tokio::test]
    async fn test_delete_maps_not_found() {
        let base_url = start_fake_host().await;
        let transport = transport(&base_url);

        assert_eq!(
            transport.delete("kora/videos/x", MediaKind::Video).await.unwrap(),
            DeleteStatus::Ok
        );
        assert_eq!(
            transport.delete("kora/videos/missing", MediaKind::Video).await.unwrap(),
            DeleteStatus::NotFound
        );
    }

    #[tokio::test]
    async fn test_list_objects_follows_cursor() {
        let base_url = start_fake_host().await;
        let transport = transport(&base_url);

        let ids = transport.list_objects(MediaKind::Video).await.unwrap();
        assert_eq!(ids, vec!["kora/videos/a", "kora/videos/b"]);
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let transport = transport("http://127.0.0.1:9");
        let err = transport
            .upload(Bytes::from_static(b"x"), MediaKind::Photo)
            .await
            .unwrap_err();
        assert!(matches!(err, MemorialError::Transport(_)));
    }
}
