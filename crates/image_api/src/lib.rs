use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use shared::domain::{AspectRatio, ImageCount, ModelType};
use thiserror::Error;

mod gemini;
pub use gemini::GeminiImageClient;

pub const DEFAULT_API_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Hosted image generation backend.
///
/// Both calls resolve to image URIs in the order the backend produced them.
/// Failures carry a human-readable message suitable for display.
#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn batch_generate(
        &self,
        prompt: &str,
        count: ImageCount,
        aspect_ratio: AspectRatio,
    ) -> anyhow::Result<Vec<String>>;

    /// Always yields exactly one image; aspect ratio is not configurable.
    async fn single_generate(&self, prompt: &str) -> anyhow::Result<Vec<String>>;
}

pub struct MissingImageGenerator;

#[async_trait]
impl ImageGenerator for MissingImageGenerator {
    async fn batch_generate(
        &self,
        _prompt: &str,
        _count: ImageCount,
        _aspect_ratio: AspectRatio,
    ) -> anyhow::Result<Vec<String>> {
        Err(anyhow::anyhow!("image api is unavailable"))
    }

    async fn single_generate(&self, _prompt: &str) -> anyhow::Result<Vec<String>> {
        Err(anyhow::anyhow!("image api is unavailable"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiSettings {
    pub base_url: String,
    pub api_key: String,
    pub imagen_model: String,
    pub flash_model: String,
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.into(),
            api_key: String::new(),
            imagen_model: ModelType::Imagen.default_model_id().into(),
            flash_model: ModelType::NanoBanana.default_model_id().into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImageApiError {
    #[error("missing API key; set GEMINI_API_KEY or api_key in the config file")]
    MissingApiKey,
    #[error("invalid image api url: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("failed to reach image api: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("{message}")]
    Upstream { status: u16, message: String },
    #[error("No image was generated. The prompt may have been blocked.")]
    NoImage,
}

pub fn encode_data_uri(mime_type: &str, base64_data: &str) -> String {
    format!("data:{mime_type};base64,{base64_data}")
}

/// Splits a `data:` URI into its mime type and decoded bytes.
pub fn decode_data_uri(uri: &str) -> Option<(String, Vec<u8>)> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mime_type = header.strip_suffix(";base64")?;
    let bytes = STANDARD.decode(payload.trim()).ok()?;
    let mime_type = if mime_type.is_empty() {
        "application/octet-stream"
    } else {
        mime_type
    };
    Some((mime_type.to_string(), bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn data_uri_round_trips_payload_bytes() {
        let uri = encode_data_uri("image/png", &STANDARD.encode(b"png-bytes"));
        assert!(uri.starts_with("data:image/png;base64,"));
        let (mime, bytes) = decode_data_uri(&uri).expect("decode");
        assert_eq!(mime, "image/png");
        assert_eq!(bytes, b"png-bytes");
    }

    #[test]
    fn non_base64_data_uri_is_rejected() {
        assert!(decode_data_uri("data:text/plain,hello").is_none());
        assert!(decode_data_uri("https://example.com/cat.png").is_none());
    }

    #[tokio::test]
    async fn missing_generator_reports_unavailable() {
        let err = MissingImageGenerator
            .single_generate("anything")
            .await
            .expect_err("must fail");
        assert_eq!(err.to_string(), "image api is unavailable");
    }
}
