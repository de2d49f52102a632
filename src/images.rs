use anyhow::{Context, anyhow};
use serde::Deserialize;
use sha2::{Digest, Sha256};

/// Signed client for a Cloudinary-style image CDN. The storefront only needs
/// upload, delete and enough URL parsing to recover a public id.
#[derive(Clone)]
pub struct ImageClient {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

#[derive(Debug, Clone, serde::Serialize, utoipa::ToSchema)]
pub struct UploadedImage {
    pub image_url: String,
    pub public_id: String,
}

#[derive(Deserialize)]
struct UploadResponse {
    secure_url: String,
    public_id: String,
}

#[derive(Deserialize)]
struct DestroyResponse {
    result: String,
}

impl ImageClient {
    /// Returns `None` unless the CDN credentials are fully configured.
    pub fn from_env() -> Option<Self> {
        let cloud_name = std::env::var("CDN_CLOUD_NAME").ok()?;
        let api_key = std::env::var("CDN_API_KEY").ok()?;
        let api_secret = std::env::var("CDN_API_SECRET").ok()?;
        let base_url = std::env::var("CDN_API_BASE")
            .unwrap_or_else(|_| "https://api.cloudinary.com/v1_1".to_string());

        Some(Self {
            http: reqwest::Client::new(),
            base_url: format!("{base_url}/{cloud_name}"),
            api_key,
            api_secret,
        })
    }

    pub async fn upload(&self, bytes: Vec<u8>, filename: String) -> anyhow::Result<UploadedImage> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("signature_algorithm", "sha256"),
            ("timestamp", &timestamp),
        ]);

        let form = reqwest::multipart::Form::new()
            .part(
                "file",
                reqwest::multipart::Part::bytes(bytes).file_name(filename),
            )
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .http
            .post(format!("{}/image/upload", self.base_url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()
            .context("image upload rejected by CDN")?;

        let uploaded: UploadResponse = response.json().await?;
        Ok(UploadedImage {
            image_url: uploaded.secure_url,
            public_id: uploaded.public_id,
        })
    }

    pub async fn delete(&self, public_id: &str) -> anyhow::Result<()> {
        let timestamp = chrono::Utc::now().timestamp().to_string();
        let signature = self.sign(&[
            ("public_id", public_id),
            ("signature_algorithm", "sha256"),
            ("timestamp", &timestamp),
        ]);

        let form = reqwest::multipart::Form::new()
            .text("public_id", public_id.to_string())
            .text("api_key", self.api_key.clone())
            .text("timestamp", timestamp)
            .text("signature_algorithm", "sha256")
            .text("signature", signature);

        let response = self
            .http
            .post(format!("{}/image/destroy", self.base_url))
            .multipart(form)
            .send()
            .await?
            .error_for_status()
            .context("image delete rejected by CDN")?;

        let destroyed: DestroyResponse = response.json().await?;
        match destroyed.result.as_str() {
            "ok" | "not found" => Ok(()),
            other => Err(anyhow!("CDN delete failed: {other}")),
        }
    }

    /// Request signature: parameters sorted by key, joined `k=v&...`, with the
    /// API secret appended, hashed with SHA-256.
    fn sign(&self, params: &[(&str, &str)]) -> String {
        let mut sorted: Vec<(&str, &str)> = params.to_vec();
        sorted.sort_by_key(|(key, _)| *key);
        let mut to_sign = sorted
            .iter()
            .map(|(key, value)| format!("{key}={value}"))
            .collect::<Vec<_>>()
            .join("&");
        to_sign.push_str(&self.api_secret);
        hex::encode(Sha256::digest(to_sign.as_bytes()))
    }
}

/// Recover the public id from a delivery URL: everything after `/upload/`,
/// minus the optional `v<digits>` version segment and the file extension.
pub fn extract_public_id(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/upload/")?;
    let segments: Vec<&str> = rest.split('/').filter(|s| !s.is_empty()).collect();

    let segments = match segments.first() {
        Some(first)
            if first.len() > 1
                && first.starts_with('v')
                && first[1..].chars().all(|c| c.is_ascii_digit()) =>
        {
            &segments[1..]
        }
        _ => &segments[..],
    };
    if segments.is_empty() {
        return None;
    }

    let joined = segments.join("/");
    match joined.rsplit_once('.') {
        Some((base, ext)) if !base.is_empty() && !ext.contains('/') => Some(base.to_string()),
        _ => Some(joined),
    }
}

#[cfg(test)]
mod tests {
    use super::extract_public_id;

    #[test]
    fn strips_version_and_extension() {
        let url = "https://res.example.com/demo/image/upload/v1712345678/products/widget.png";
        assert_eq!(extract_public_id(url).as_deref(), Some("products/widget"));
    }

    #[test]
    fn handles_urls_without_version_segment() {
        let url = "https://res.example.com/demo/image/upload/widget.jpg";
        assert_eq!(extract_public_id(url).as_deref(), Some("widget"));
    }

    #[test]
    fn keeps_dots_inside_the_id() {
        let url = "https://res.example.com/demo/image/upload/v1/catalog/spring.2024/hero.webp";
        assert_eq!(
            extract_public_id(url).as_deref(),
            Some("catalog/spring.2024/hero")
        );
    }

    #[test]
    fn rejects_urls_without_upload_segment() {
        assert_eq!(extract_public_id("https://res.example.com/demo/raw/x"), None);
        assert_eq!(extract_public_id("https://res.example.com/demo/image/upload/"), None);
    }
}
