use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use shared::{
    domain::{AspectRatio, ImageCount},
    protocol::{
        ApiErrorEnvelope, Content, GenerateContentRequest, GenerateContentResponse,
        GenerationConfig, Part, PredictInstance, PredictParameters, PredictRequest,
        PredictResponse,
    },
};
use tracing::{debug, warn};
use url::Url;

use crate::{encode_data_uri, ApiSettings, ImageApiError, ImageGenerator};

const API_KEY_HEADER: &str = "x-goog-api-key";
const IMAGEN_OUTPUT_MIME: &str = "image/jpeg";

pub struct GeminiImageClient {
    http: Client,
    settings: ApiSettings,
}

impl GeminiImageClient {
    pub fn new(settings: ApiSettings) -> Self {
        Self::with_http_client(Client::new(), settings)
    }

    pub fn with_http_client(http: Client, settings: ApiSettings) -> Self {
        Self { http, settings }
    }

    pub fn settings(&self) -> &ApiSettings {
        &self.settings
    }

    fn endpoint(&self, model: &str, method: &str) -> Result<Url, ImageApiError> {
        let base = self.settings.base_url.trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/v1beta/models/{model}:{method}"))?)
    }

    async fn post_json<B, R>(&self, url: Url, body: &B) -> Result<R, ImageApiError>
    where
        B: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        if self.settings.api_key.trim().is_empty() {
            return Err(ImageApiError::MissingApiKey);
        }

        let response = self
            .http
            .post(url)
            .header(API_KEY_HEADER, self.settings.api_key.trim())
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let raw = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ApiErrorEnvelope>(&raw)
                .ok()
                .map(|envelope| envelope.error.message)
                .filter(|message| !message.trim().is_empty())
                .unwrap_or_else(|| format!("image api returned HTTP {}", status.as_u16()));
            warn!(status = status.as_u16(), %message, "image api request rejected");
            return Err(ImageApiError::Upstream {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response.json::<R>().await?)
    }

    pub async fn predict_images(
        &self,
        prompt: &str,
        count: ImageCount,
        aspect_ratio: AspectRatio,
    ) -> Result<Vec<String>, ImageApiError> {
        let url = self.endpoint(&self.settings.imagen_model, "predict")?;
        let request = PredictRequest {
            instances: vec![PredictInstance {
                prompt: prompt.to_string(),
            }],
            parameters: PredictParameters {
                sample_count: count.get(),
                aspect_ratio: aspect_ratio.to_string(),
                output_mime_type: Some(IMAGEN_OUTPUT_MIME.to_string()),
            },
        };
        debug!(
            model = %self.settings.imagen_model,
            count = count.get(),
            %aspect_ratio,
            "requesting image batch"
        );

        let response: PredictResponse = self.post_json(url, &request).await?;
        let images: Vec<String> = response
            .predictions
            .into_iter()
            .filter_map(|prediction| {
                let data = prediction.bytes_base64_encoded?;
                let mime = prediction
                    .mime_type
                    .unwrap_or_else(|| IMAGEN_OUTPUT_MIME.to_string());
                Some(encode_data_uri(&mime, &data))
            })
            .collect();

        if images.is_empty() {
            return Err(ImageApiError::NoImage);
        }
        Ok(images)
    }

    pub async fn generate_content_image(&self, prompt: &str) -> Result<String, ImageApiError> {
        let url = self.endpoint(&self.settings.flash_model, "generateContent")?;
        let request = GenerateContentRequest {
            contents: vec![Content {
                role: None,
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                    inline_data: None,
                }],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["IMAGE".into(), "TEXT".into()],
            }),
        };
        debug!(model = %self.settings.flash_model, "requesting single image");

        let response: GenerateContentResponse = self.post_json(url, &request).await?;
        let image = response
            .inline_images()
            .next()
            .map(|inline| encode_data_uri(&inline.mime_type, &inline.data));
        image.ok_or(ImageApiError::NoImage)
    }
}

#[async_trait]
impl ImageGenerator for GeminiImageClient {
    async fn batch_generate(
        &self,
        prompt: &str,
        count: ImageCount,
        aspect_ratio: AspectRatio,
    ) -> anyhow::Result<Vec<String>> {
        Ok(self.predict_images(prompt, count, aspect_ratio).await?)
    }

    async fn single_generate(&self, prompt: &str) -> anyhow::Result<Vec<String>> {
        Ok(vec![self.generate_content_image(prompt).await?])
    }
}

#[cfg(test)]
#[path = "tests/gemini_tests.rs"]
mod tests;
