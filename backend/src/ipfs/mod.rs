use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;

pub const DEFAULT_GATEWAY: &str = "https://gateway.pinata.cloud/ipfs/";
pub const DEFAULT_PINNING_URL: &str = "https://api.pinata.cloud/pinning/pinFileToIPFS";

#[derive(Debug, thiserror::Error)]
pub enum PinningError {
    #[error("Pinning request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Pinning service rejected the upload with status {0}")]
    Rejected(u16),
    #[error("Pinning service is not configured")]
    NotConfigured,
}

/// Resolves a raw image reference against the default gateway.
pub fn format_image_url(url: &str) -> String {
    format_with_gateway(url, DEFAULT_GATEWAY)
}

/// Absolute URLs and site-relative paths pass through; content hashes,
/// with or without an `ipfs://` scheme, are joined onto `gateway`.
pub fn format_with_gateway(url: &str, gateway: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    if url.starts_with("http://") || url.starts_with("https://") || url.starts_with('/') {
        return url.to_string();
    }
    let hash = url.strip_prefix("ipfs://").unwrap_or(url);
    format!("{}{}", gateway, hash)
}

#[async_trait]
pub trait Pinning: Send + Sync {
    /// Uploads one file and returns its content hash.
    async fn pin_file(&self, file_name: &str, contents: Vec<u8>) -> Result<String, PinningError>;
}

#[derive(Deserialize)]
struct PinResponse {
    #[serde(rename = "IpfsHash")]
    ipfs_hash: String,
}

pub struct PinataClient {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    secret_api_key: String,
}

impl PinataClient {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, secret_api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            secret_api_key: secret_api_key.into(),
        }
    }
}

#[async_trait]
impl Pinning for PinataClient {
    async fn pin_file(&self, file_name: &str, contents: Vec<u8>) -> Result<String, PinningError> {
        if self.api_key.is_empty() || self.secret_api_key.is_empty() {
            return Err(PinningError::NotConfigured);
        }
        log::info!("Pinning {} ({} bytes)", file_name, contents.len());
        let form = Form::new().part("file", Part::bytes(contents).file_name(file_name.to_string()));
        let response = self
            .http
            .post(&self.endpoint)
            .header("pinata_api_key", &self.api_key)
            .header("pinata_secret_api_key", &self.secret_api_key)
            .multipart(form)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(PinningError::Rejected(response.status().as_u16()));
        }
        let pinned: PinResponse = response.json().await?;
        Ok(pinned.ipfs_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefixes_bare_hashes() {
        assert_eq!(format_image_url("Qm123"), "https://gateway.pinata.cloud/ipfs/Qm123");
        assert_eq!(format_image_url("ipfs://Qm123"), "https://gateway.pinata.cloud/ipfs/Qm123");
    }

    #[test]
    fn leaves_absolute_and_relative_urls() {
        assert_eq!(format_image_url("https://example.com/a.png"), "https://example.com/a.png");
        assert_eq!(format_image_url("/imageforLanding/house.jpg"), "/imageforLanding/house.jpg");
        assert_eq!(format_image_url(""), "");
    }

    #[test]
    fn formatting_is_idempotent() {
        for raw in ["Qm123", "ipfs://QmXyz", "https://gateway.pinata.cloud/ipfs/Qm1", "/x.jpg", ""] {
            let once = format_image_url(raw);
            assert_eq!(format_image_url(&once), once);
        }
    }

    #[tokio::test]
    async fn unconfigured_client_refuses_upload() {
        let client = PinataClient::new(DEFAULT_PINNING_URL, "", "");
        let err = client.pin_file("a.png", vec![1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, PinningError::NotConfigured));
    }
}
