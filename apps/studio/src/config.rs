use std::{
    fs, io,
    path::{Path, PathBuf},
};

use anyhow::Context;
use image_api::{ApiSettings, DEFAULT_API_BASE_URL};
use serde::Deserialize;
use shared::domain::ModelType;

pub const DEFAULT_CONFIG_FILE: &str = "studio.toml";
const FALLBACK_DATABASE_URL: &str = "sqlite://./data/history.db";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub api_base_url: String,
    pub api_key: String,
    pub imagen_model: String,
    pub flash_model: String,
    pub database_url: String,
    pub log_filter: String,
    pub output_dir: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.into(),
            api_key: String::new(),
            imagen_model: ModelType::Imagen.default_model_id().into(),
            flash_model: ModelType::NanoBanana.default_model_id().into(),
            database_url: default_database_url(),
            log_filter: "info".into(),
            output_dir: PathBuf::from("studio-output"),
        }
    }
}

impl Settings {
    pub fn api_settings(&self) -> ApiSettings {
        ApiSettings {
            base_url: self.api_base_url.clone(),
            api_key: self.api_key.clone(),
            imagen_model: self.imagen_model.clone(),
            flash_model: self.flash_model.clone(),
        }
    }
}

fn default_database_url() -> String {
    dirs::data_local_dir()
        .map(|base| base.join("image-studio").join("history.db"))
        .map(|path| format!("sqlite://{}", path.to_string_lossy().replace('\\', "/")))
        .unwrap_or_else(|| FALLBACK_DATABASE_URL.to_string())
}

/// Defaults, then the TOML file, then environment variables. An explicitly
/// requested config file must exist; the default one is optional.
pub fn load_settings(config_path: Option<&Path>) -> anyhow::Result<Settings> {
    let mut settings = match config_path {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file '{}'", path.display()))?;
            parse_settings(&raw)
                .with_context(|| format!("invalid config file '{}'", path.display()))?
        }
        None => match read_optional_config(Path::new(DEFAULT_CONFIG_FILE))? {
            Some(raw) => parse_settings(&raw)
                .with_context(|| format!("invalid config file '{DEFAULT_CONFIG_FILE}'"))?,
            None => Settings::default(),
        },
    };

    apply_env_overrides(&mut settings, |key| std::env::var(key).ok());
    Ok(settings)
}

/// A missing file is not an error; anything else reading it is.
fn read_optional_config(path: &Path) -> anyhow::Result<Option<String>> {
    match fs::read_to_string(path) {
        Ok(raw) => Ok(Some(raw)),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(error) => Err(error)
            .with_context(|| format!("failed to read config file '{}'", path.display())),
    }
}

fn parse_settings(raw: &str) -> anyhow::Result<Settings> {
    Ok(toml::from_str::<Settings>(raw)?)
}

fn apply_env_overrides(settings: &mut Settings, lookup: impl Fn(&str) -> Option<String>) {
    if let Some(v) = first_env(&lookup, &["APP__API_KEY", "GEMINI_API_KEY", "API_KEY"]) {
        settings.api_key = v;
    }
    if let Some(v) = first_env(&lookup, &["APP__API_BASE_URL"]) {
        settings.api_base_url = v;
    }
    if let Some(v) = first_env(&lookup, &["APP__IMAGEN_MODEL"]) {
        settings.imagen_model = v;
    }
    if let Some(v) = first_env(&lookup, &["APP__FLASH_MODEL"]) {
        settings.flash_model = v;
    }
    if let Some(v) = first_env(&lookup, &["APP__DATABASE_URL", "DATABASE_URL"]) {
        settings.database_url = v;
    }
    if let Some(v) = first_env(&lookup, &["APP__LOG_FILTER"]) {
        settings.log_filter = v;
    }
    if let Some(v) = first_env(&lookup, &["APP__OUTPUT_DIR"]) {
        settings.output_dir = PathBuf::from(v);
    }
}

fn first_env(lookup: &impl Fn(&str) -> Option<String>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| lookup(key))
}

pub fn prepare_database_url(raw_database_url: &str) -> String {
    let raw_database_url = raw_database_url.trim();

    if raw_database_url.is_empty() {
        return Settings::default().database_url;
    }

    if raw_database_url.starts_with("sqlite::memory:")
        || raw_database_url.starts_with("sqlite://")
        || raw_database_url.contains("://")
    {
        return raw_database_url.to_string();
    }

    if let Some(path) = raw_database_url.strip_prefix("sqlite:") {
        let path = path.replace('\\', "/");
        return format!("sqlite://{path}");
    }

    format!("sqlite://{}", raw_database_url.replace('\\', "/"))
}
