use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::OcrConfig;

/// Thin wrapper around the external tesseract binary. The engine downstream
/// treats an empty result as "nothing readable", so this only fails when the
/// process itself cannot be run.
pub struct OcrService {
    command: String,
    languages: String,
}

impl OcrService {
    pub fn new(config: &OcrConfig) -> Self {
        Self {
            command: config.command.clone(),
            languages: config.languages.clone(),
        }
    }

    pub async fn extract_text(&self, image: &[u8]) -> Result<String> {
        info!("Running OCR on image of {} bytes", image.len());

        let path = self.temp_path();
        tokio::fs::write(&path, image)
            .await
            .with_context(|| format!("Failed to write OCR temp file: {}", path.display()))?;

        let output = tokio::process::Command::new(&self.command)
            .arg(&path)
            .arg("stdout")
            .arg("-l")
            .arg(&self.languages)
            .output()
            .await
            .with_context(|| format!("Failed to run OCR command: {}", self.command));

        // The temp file is gone whether or not the command ran.
        let _ = tokio::fs::remove_file(&path).await;
        let output = output?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!(
                "OCR command exited with {}: {}",
                output.status,
                stderr.trim()
            );
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!("OCR extracted {} chars", text.len());
        Ok(text)
    }

    fn temp_path(&self) -> PathBuf {
        std::env::temp_dir().join(format!("leadscan-{}.png", Uuid::new_v4()))
    }
}
