use std::path::Path;

use crate::error::AppError;

/// Download `url` to `path` unless the file already exists. The body lands in
/// a `.part` file first and is renamed into place only once fully written, so
/// a failed download never leaves a truncated model behind.
pub async fn ensure_model(path: &Path, url: &str) -> Result<(), AppError> {
    if path.exists() {
        return Ok(());
    }

    tracing::info!("downloading {} -> {}", url, path.display());

    let bytes = reqwest::get(url)
        .await?
        .error_for_status()?
        .bytes()
        .await?;

    let part = path.with_extension("part");
    tokio::fs::write(&part, &bytes).await?;
    tokio::fs::rename(&part, path).await?;

    tracing::info!("downloaded {} ({} bytes)", path.display(), bytes.len());
    Ok(())
}
