//! Standalone HTML tribute page.
//!
//! Renders a single self-contained file: the portrait is embedded as a
//! base64 data URI so the page survives being forwarded or opened offline.
//! Placeholder substitution is verbatim, so story text containing braces or
//! markup-looking fragments passes through untouched.

use std::path::{Path, PathBuf};

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use tracing::{info, warn};

/// Shipped default layout. Deployments can point at their own file instead.
const DEFAULT_TEMPLATE: &str = include_str!("templates/homenagem.html");

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("failed to read tribute template {path}: {source}")]
    Template {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write tribute page: {0}")]
    Write(#[from] std::io::Error),
}

#[derive(Clone)]
pub struct TributeRenderer {
    template: String,
}

impl Default for TributeRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TributeRenderer {
    pub fn new() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
        }
    }

    /// Use a custom template file. The template may reference `{pet_name}`,
    /// `{pet_date}`, `{pet_story}` and `{image_data_uri}`.
    pub fn from_file(path: &Path) -> Result<Self, RenderError> {
        let template = std::fs::read_to_string(path).map_err(|source| RenderError::Template {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Self { template })
    }

    /// Render the tribute into `out_dir` as `homenagem_{timestamp}.html` and
    /// return its path. A portrait that cannot be read degrades to an empty
    /// data URI rather than failing the order.
    pub fn render(
        &self,
        pet_name: &str,
        pet_date: &str,
        pet_story: &str,
        portrait: &Path,
        out_dir: &Path,
        timestamp: &str,
    ) -> Result<PathBuf, RenderError> {
        let html = self
            .template
            .replace("{pet_name}", &escape_html(pet_name))
            .replace("{pet_date}", &escape_html(pet_date))
            .replace("{pet_story}", &escape_html(pet_story))
            .replace("{image_data_uri}", &image_data_uri(portrait));

        let path = out_dir.join(format!("homenagem_{timestamp}.html"));
        std::fs::write(&path, html)?;
        info!(path = %path.display(), "tribute page rendered");
        Ok(path)
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Inline the portrait as a data URI. The media type follows the file
/// extension, defaulting to PNG since generated art is always PNG.
fn image_data_uri(portrait: &Path) -> String {
    let bytes = match std::fs::read(portrait) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(path = %portrait.display(), error = %e, "portrait unreadable, embedding empty image");
            return "data:image/png;base64,".to_string();
        }
    };

    let media_type = match portrait
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        _ => "image/png",
    };
    format!("data:{media_type};base64,{}", BASE64.encode(bytes))
}
