//! Writes generated images to disk.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use image_api::decode_data_uri;

const FALLBACK_EXTENSION: &str = "png";

pub fn extension_for_mime(mime_type: &str) -> &'static str {
    match mime_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        other => mime_guess::get_mime_extensions_str(other)
            .and_then(|extensions| extensions.first().copied())
            .unwrap_or(FALLBACK_EXTENSION),
    }
}

/// Decodes an inline `data:` image and writes it as `{dir}/{stem}.{ext}`.
pub async fn write_image(dir: &Path, stem: &str, source: &str) -> Result<PathBuf> {
    let Some((mime_type, bytes)) = decode_data_uri(source) else {
        bail!("image '{stem}' is not an inline data uri");
    };

    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("failed to create output directory '{}'", dir.display()))?;

    let path = dir.join(format!("{stem}.{}", extension_for_mime(&mime_type)));
    tokio::fs::write(&path, bytes)
        .await
        .with_context(|| format!("failed to write image '{}'", path.display()))?;
    Ok(path)
}

#[cfg(test)]
#[path = "tests/output_tests.rs"]
mod tests;
