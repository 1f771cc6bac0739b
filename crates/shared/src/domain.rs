use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::StudioError;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ImageId(pub String);

impl ImageId {
    /// Ids are unique within a batch by `index` and across batches by the
    /// submission `sequence`, even when two submissions share a millisecond.
    pub fn for_batch(timestamp_millis: i64, sequence: u64, index: usize) -> Self {
        Self(format!("{timestamp_millis}-{sequence}-{index}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ImageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelType {
    /// High-fidelity model: multi-image batches, honours the aspect ratio.
    #[default]
    Imagen,
    /// Fast model: always a single image, ignores count and aspect ratio.
    NanoBanana,
}

impl ModelType {
    pub const ALL: [ModelType; 2] = [ModelType::Imagen, ModelType::NanoBanana];

    pub fn default_model_id(self) -> &'static str {
        match self {
            ModelType::Imagen => "imagen-4.0-generate-001",
            ModelType::NanoBanana => "gemini-2.5-flash-image",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            ModelType::Imagen => "Imagen 4",
            ModelType::NanoBanana => "Nano Banana",
        }
    }

    pub fn supports_batches(self) -> bool {
        self == ModelType::Imagen
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for ModelType {
    type Err = StudioError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let normalized = raw.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "imagen" | "imagen-4" | "imagen4" => Ok(ModelType::Imagen),
            "nano-banana" | "nano_banana" | "nano" | "nanobanana" => Ok(ModelType::NanoBanana),
            other if other == ModelType::Imagen.default_model_id() => Ok(ModelType::Imagen),
            other if other == ModelType::NanoBanana.default_model_id() => {
                Ok(ModelType::NanoBanana)
            }
            _ => Err(StudioError::Validation(format!("unknown model '{raw}'"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AspectRatio {
    #[default]
    #[serde(rename = "1:1")]
    Square,
    #[serde(rename = "16:9")]
    Landscape,
    #[serde(rename = "9:16")]
    Portrait,
    #[serde(rename = "4:3")]
    Standard,
    #[serde(rename = "3:4")]
    StandardPortrait,
}

impl AspectRatio {
    pub const ALL: [AspectRatio; 5] = [
        AspectRatio::Square,
        AspectRatio::Landscape,
        AspectRatio::Portrait,
        AspectRatio::Standard,
        AspectRatio::StandardPortrait,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AspectRatio::Square => "1:1",
            AspectRatio::Landscape => "16:9",
            AspectRatio::Portrait => "9:16",
            AspectRatio::Standard => "4:3",
            AspectRatio::StandardPortrait => "3:4",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = StudioError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        AspectRatio::ALL
            .into_iter()
            .find(|ratio| ratio.as_str() == trimmed)
            .ok_or_else(|| {
                StudioError::Validation(format!(
                    "unsupported aspect ratio '{raw}' (expected one of 1:1, 16:9, 9:16, 4:3, 3:4)"
                ))
            })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct ImageCount(u8);

impl ImageCount {
    pub const MIN: u8 = 1;
    pub const MAX: u8 = 4;
    pub const ONE: ImageCount = ImageCount(1);

    pub fn get(self) -> u8 {
        self.0
    }
}

impl Default for ImageCount {
    fn default() -> Self {
        Self::ONE
    }
}

impl TryFrom<u8> for ImageCount {
    type Error = StudioError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        if (Self::MIN..=Self::MAX).contains(&value) {
            Ok(Self(value))
        } else {
            Err(StudioError::Validation(format!(
                "image count must be between {} and {}, got {value}",
                Self::MIN,
                Self::MAX
            )))
        }
    }
}

impl From<ImageCount> for u8 {
    fn from(value: ImageCount) -> Self {
        value.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct GenerationOptions {
    pub model: ModelType,
    pub image_count: ImageCount,
    pub aspect_ratio: AspectRatio,
}

impl GenerationOptions {
    pub fn imagen(image_count: ImageCount, aspect_ratio: AspectRatio) -> Self {
        Self {
            model: ModelType::Imagen,
            image_count,
            aspect_ratio,
        }
    }

    pub fn nano_banana() -> Self {
        Self {
            model: ModelType::NanoBanana,
            image_count: ImageCount::ONE,
            aspect_ratio: AspectRatio::default(),
        }
    }

    /// Number of placeholders a front-end should lay out while waiting.
    pub fn expected_image_count(&self) -> usize {
        if self.model.supports_batches() {
            usize::from(self.image_count.get())
        } else {
            1
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpscaleState {
    Idle,
    Upscaling,
    Upscaled,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedImage {
    pub id: ImageId,
    pub source: String,
    pub prompt: String,
    pub options: GenerationOptions,
    pub upscaling: bool,
    pub upscaled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub upscale_error: Option<String>,
}

impl GeneratedImage {
    pub fn new(
        id: ImageId,
        source: impl Into<String>,
        prompt: impl Into<String>,
        options: GenerationOptions,
    ) -> Self {
        Self {
            id,
            source: source.into(),
            prompt: prompt.into(),
            options,
            upscaling: false,
            upscaled: false,
            upscale_error: None,
        }
    }

    pub fn upscale_state(&self) -> UpscaleState {
        if self.upscaled {
            UpscaleState::Upscaled
        } else if self.upscaling {
            UpscaleState::Upscaling
        } else {
            UpscaleState::Idle
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleContender {
    pub image: String,
    pub prompt: String,
    pub options: GenerationOptions,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleResult {
    pub contender_a: BattleContender,
    pub contender_b: BattleContender,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleRequest {
    pub prompt_a: String,
    pub options_a: GenerationOptions,
    pub prompt_b: String,
    pub options_b: GenerationOptions,
}
