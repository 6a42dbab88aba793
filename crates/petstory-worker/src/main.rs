//! Process a single order from the command line.
//!
//! Usage:
//!   petstory-worker <email> <pet-name> <pet-date> <story-file> <photo>...
//!
//! Reads SMTP and generation settings from the environment (a `.env` file is
//! honored) and runs the full pipeline for one order.

use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{bail, Context};
use tracing::error;

use petstory_core::{Config, Order, PhotoUpload};
use petstory_services::{EmailService, GeminiGenerator};
use petstory_worker::OrderPipeline;

fn order_from_args() -> anyhow::Result<Order> {
    let args: Vec<String> = std::env::args().skip(1).collect();
    if args.len() < 5 {
        bail!("usage: petstory-worker <email> <pet-name> <pet-date> <story-file> <photo>...");
    }

    let story = std::fs::read_to_string(&args[3])
        .with_context(|| format!("reading story file {}", args[3]))?;

    let mut photos = Vec::new();
    for path in &args[4..] {
        let bytes =
            std::fs::read(path).with_context(|| format!("reading photo {path}"))?;
        photos.push(PhotoUpload {
            bytes,
            original_filename: path.clone(),
            content_type: String::new(),
        });
    }

    Ok(Order::new(
        args[0].clone(),
        args[1].clone(),
        args[2].clone(),
        story,
        photos,
    ))
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env()?;
    let order = order_from_args()?;

    let generator = Arc::new(GeminiGenerator::new(&config)?);
    let notifier = Arc::new(EmailService::from_config(&config));
    let pipeline = OrderPipeline::new(&config, generator, notifier);

    let result = pipeline.process(&order).await;
    if result.is_success() {
        Ok(ExitCode::SUCCESS)
    } else {
        error!(pet_name = %result.pet_name, "order did not complete");
        Ok(ExitCode::FAILURE)
    }
}
