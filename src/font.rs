use crate::config::FontConfig;
use crate::render::RenderConfig;
use reqwest::Client;
use std::{error::Error, path::PathBuf, time::Duration};
use tokio::fs;
use tracing::{info, warn};

const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(10);

/// Returns the local font file, downloading it first if it is missing.
/// Any failure leaves the caller on the default font.
pub async fn ensure_font(client: &Client, font: &FontConfig) -> Option<PathBuf> {
    if fs::try_exists(&font.path).await.unwrap_or(false) {
        return Some(font.path.clone());
    }

    match download(client, font).await {
        Ok(bytes) => {
            info!("downloaded {} ({bytes} bytes)", font.path.display());
            Some(font.path.clone())
        }
        Err(err) => {
            warn!("font download failed, using sans-serif: {err}");
            None
        }
    }
}

async fn download(client: &Client, font: &FontConfig) -> Result<usize, Box<dyn Error + Send + Sync>> {
    let bytes = client
        .get(&font.url)
        .timeout(DOWNLOAD_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    if let Some(parent) = font.path.parent() {
        fs::create_dir_all(parent).await?;
    }
    fs::write(&font.path, &bytes).await?;
    Ok(bytes.len())
}

pub async fn resolve_render_config(client: &Client, font: &FontConfig) -> RenderConfig {
    match ensure_font(client, font).await {
        Some(_) => RenderConfig::with_font(font.family.clone()),
        None => RenderConfig::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn existing_font_is_reused_without_network() {
        let path = std::env::temp_dir().join(format!("dashboard_font_{}.ttf", std::process::id()));
        fs::write(&path, b"not really a font").await.unwrap();
        let font = FontConfig {
            url: "http://127.0.0.1:9/unreachable.ttf".to_string(),
            path: path.clone(),
            family: "Iansui".to_string(),
        };

        let config = resolve_render_config(&Client::new(), &font).await;
        assert_eq!(config.font_family, "Iansui");
        let _ = fs::remove_file(&path).await;
    }

    #[tokio::test]
    async fn unreachable_font_falls_back() {
        let font = FontConfig {
            url: "http://127.0.0.1:9/unreachable.ttf".to_string(),
            path: std::env::temp_dir().join("dashboard_font_missing/none.ttf"),
            family: "Iansui".to_string(),
        };

        let config = resolve_render_config(&Client::new(), &font).await;
        assert_eq!(config.font_family, "sans-serif");
    }
}
