use anyhow::{anyhow, bail, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use regex::Regex;
use std::path::Path;
use toolchat::models::content::ImageContent;

/// Load an image given either as a `data:` URL or as a path to a file on disk
pub fn load_image(spec: &str) -> Result<ImageContent> {
    let spec = spec.trim();
    let data_url = Regex::new(r"^data:([^;,]+);base64,(.+)$")?;

    if let Some(captures) = data_url.captures(spec) {
        let mime_type = &captures[1];
        let data = &captures[2];
        ensure_image(mime_type)?;
        STANDARD
            .decode(data)
            .context("image data is not valid base64")?;
        return Ok(ImageContent::new(data, mime_type));
    }

    let path = Path::new(spec);
    let mime = mime_guess::from_path(path)
        .first()
        .ok_or_else(|| anyhow!("cannot tell what kind of file {} is", path.display()))?;
    ensure_image(mime.essence_str())?;

    let bytes =
        std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(ImageContent::new(STANDARD.encode(bytes), mime.essence_str()))
}

fn ensure_image(mime_type: &str) -> Result<()> {
    if !mime_type.starts_with("image/") {
        bail!("{} is not an image type", mime_type);
    }
    Ok(())
}
