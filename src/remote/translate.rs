//! Translation endpoint client

use serde::{Deserialize, Serialize};
use crate::{Error, Result};

#[derive(Debug, Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    source: &'a str,
    target: &'a str,
}

#[derive(Debug, Deserialize)]
struct TranslateResponse {
    #[serde(alias = "translatedText", alias = "translation", alias = "result", alias = "dst")]
    text: Option<String>,
}

/// Text in, translated text out, for a source/target language pair
pub struct Translator {
    endpoint: String,
    client: reqwest::Client,
}

impl Translator {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn translate(&self, text: &str, source: &str, target: &str) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(String::new());
        }

        tracing::debug!("Translating {} chars {} -> {}", text.len(), source, target);

        let response: TranslateResponse = self
            .client
            .post(&self.endpoint)
            .json(&TranslateRequest { text, source, target })
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        extract(response)
    }
}

fn extract(response: TranslateResponse) -> Result<String> {
    response
        .text
        .ok_or_else(|| Error::Validation("translation response has no text".into()))
}
