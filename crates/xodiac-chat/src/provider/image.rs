//! Prompt-to-image adapter.
//!
//! No request is made from here: the adapter builds a deterministic image URL
//! for the prompt and a random seed, and the renderer fetches it.

use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use regex::Regex;
use tokio::sync::mpsc;
use tracing::debug;

use super::{emit, ProviderAdapter, ProviderEvent, TurnRequest};

/// Leading "generate an image of" phrasing removed from the prompt.
static IMAGE_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^(generate|create|draw|make) (an )?(image|visual|picture|photo) (of )?")
        .expect("Invalid image prefix regex")
});

/// Adapter that turns a query into a generated-image URL.
pub struct ImageAdapter {
    base_url: String,
    delay: Duration,
    max_seed: u32,
}

impl ImageAdapter {
    pub fn new(base_url: String, delay: Duration, max_seed: u32) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            delay,
            max_seed,
        }
    }
}

#[async_trait]
impl ProviderAdapter for ImageAdapter {
    fn name(&self) -> &'static str {
        "image"
    }

    async fn stream(&self, request: &TurnRequest, events: mpsc::Sender<ProviderEvent>) {
        let prompt = clean_prompt(&request.query);
        let seed = rand::rng().random_range(0..self.max_seed.max(1));
        let image_url = build_image_url(&self.base_url, &prompt, seed);
        debug!(seed, prompt = %prompt, "Built image URL");

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let ready = ProviderEvent::ImageReady {
            caption: format!("Generated image for: **{}**", prompt),
            image_url,
        };
        if emit(&events, ready).await {
            emit(&events, ProviderEvent::Done).await;
        }
    }
}

/// Strip the leading instruction phrase; fall back to the whole query.
pub fn clean_prompt(query: &str) -> String {
    let trimmed = query.trim();
    let cleaned = IMAGE_PREFIX_RE.replace(trimmed, "");
    let cleaned = cleaned.trim();
    if cleaned.is_empty() {
        trimmed.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `{base}/{encoded prompt}?nologo=true&seed={seed}`
pub fn build_image_url(base_url: &str, prompt: &str, seed: u32) -> String {
    format!(
        "{}/{}?nologo=true&seed={}",
        base_url.trim_end_matches('/'),
        urlencoding::encode(prompt),
        seed
    )
}
