//! Configuration loaded from environment variables.
//!
//! Constructed once at process start and passed by reference into the
//! components that need it. There is no global settings singleton.

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";
const DEFAULT_SMTP_SERVER: &str = "smtp.gmail.com";
const DEFAULT_SMTP_PORT: u16 = 587;
const DEFAULT_GENERATION_DELAY_SECS: f64 = 2.0;
const DEFAULT_PAYMENT_FRESHNESS_HOURS: i64 = 24;

/// Prompt for the printable line-art variant.
const DEFAULT_COLORING_PROMPT: &str = "Transform this pet photo into a black and white \
     coloring book page: clean bold outlines, no shading, white background, printable line art.";

/// Prompt for the small-format sticker variant.
const DEFAULT_STICKER_PROMPT: &str = "Transform this pet photo into a cute die-cut sticker: \
     bold colors, thick white outline, simple shapes, small format.";

#[derive(Clone, Debug)]
pub struct Config {
    // Image generation
    pub gemini_api_key: String,
    pub gemini_image_model: String,
    pub coloring_prompt: String,
    /// `None` disables the sticker variant; the sticker page then falls back
    /// to the coloring art pool.
    pub sticker_prompt: Option<String>,
    /// Fixed delay between successive generation calls within one order, to
    /// respect the provider's rate limit.
    pub generation_delay: Duration,

    // Storage
    pub temp_dir: PathBuf,

    // SMTP
    pub smtp_server: String,
    pub smtp_port: u16,
    pub smtp_user: Option<String>,
    pub smtp_password: Option<String>,
    pub email_from: String,
    pub email_from_name: String,

    // Payment gate (consulted by the request boundary, never the pipeline)
    pub payment_required: bool,
    pub payment_freshness_hours: i64,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let gemini_api_key =
            env::var("GEMINI_API_KEY").map_err(|_| ConfigError::MissingVar("GEMINI_API_KEY"))?;

        let generation_delay_secs = match env::var("WORKER_SLEEP_SECONDS") {
            Ok(v) => v.parse::<f64>().map_err(|_| ConfigError::InvalidVar {
                name: "WORKER_SLEEP_SECONDS",
                value: v,
            })?,
            Err(_) => DEFAULT_GENERATION_DELAY_SECS,
        };
        if !generation_delay_secs.is_finite() || generation_delay_secs < 0.0 {
            return Err(ConfigError::InvalidVar {
                name: "WORKER_SLEEP_SECONDS",
                value: generation_delay_secs.to_string(),
            });
        }

        let stickers_enabled = env::var("STICKERS_ENABLED")
            .map(|v| v.to_lowercase() == "true" || v == "1")
            .unwrap_or(true);

        Ok(Self {
            gemini_api_key,
            gemini_image_model: env::var("GEMINI_IMAGE_MODEL")
                .unwrap_or_else(|_| DEFAULT_IMAGE_MODEL.to_string()),
            coloring_prompt: env::var("COLORING_PROMPT")
                .unwrap_or_else(|_| DEFAULT_COLORING_PROMPT.to_string()),
            sticker_prompt: stickers_enabled.then(|| {
                env::var("STICKER_PROMPT").unwrap_or_else(|_| DEFAULT_STICKER_PROMPT.to_string())
            }),
            generation_delay: Duration::from_secs_f64(generation_delay_secs),
            temp_dir: PathBuf::from(env::var("TEMP_DIR").unwrap_or_else(|_| "temp".to_string())),
            smtp_server: env::var("SMTP_SERVER")
                .unwrap_or_else(|_| DEFAULT_SMTP_SERVER.to_string()),
            smtp_port: env::var("SMTP_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SMTP_PORT),
            smtp_user: env::var("SMTP_USER").ok().filter(|v| !v.is_empty()),
            smtp_password: env::var("SMTP_PASSWORD").ok().filter(|v| !v.is_empty()),
            email_from: env::var("EMAIL_FROM")
                .unwrap_or_else(|_| "noreply@petstory.com".to_string()),
            email_from_name: env::var("EMAIL_FROM_NAME").unwrap_or_else(|_| "PetStory".to_string()),
            payment_required: env::var("PAYMENT_REQUIRED")
                .map(|v| v.to_lowercase() == "true" || v == "1")
                .unwrap_or(false),
            payment_freshness_hours: env::var("PAYMENT_FRESHNESS_HOURS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PAYMENT_FRESHNESS_HOURS),
        })
    }

    /// True when SMTP credentials are present and delivery can be attempted.
    pub fn smtp_configured(&self) -> bool {
        self.smtp_user.is_some() && self.smtp_password.is_some()
    }
}
