use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, warn};

use super::backend::TranslationBackend;
use crate::config::{Lang, TranslatorConfig};
use crate::error::{Error, Result};

/// OpenAI-compatible API translator
/// Works with: llama.cpp server, Ollama, DeepSeek, OpenAI, etc.
///
/// Batch requests send one numbered segment per line and expect the model
/// to answer with the same numbering; a count mismatch is reported as an
/// invalid response so the caller can degrade to per-item calls.
pub struct OpenAiTranslator {
    client: Client,
    /// Base URL for the API (e.g., "http://localhost:8080/v1")
    pub api_base: String,
    /// Optional API key for authentication
    pub api_key: Option<String>,
    /// Model identifier
    pub model: String,
    /// Number of retry attempts
    pub retry_count: u32,
    /// Delay between retries in milliseconds
    pub retry_delay_ms: u64,
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

impl OpenAiTranslator {
    /// Create a translator from configuration.
    ///
    /// # Panics
    /// Panics if the HTTP client cannot be created, which should only happen
    /// in extreme circumstances (e.g., TLS backend unavailable on the system).
    #[allow(clippy::expect_used)]
    pub fn new(config: &TranslatorConfig) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            api_base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            retry_count: config.retry_count,
            retry_delay_ms: config.retry_delay_ms,
        }
    }

    fn single_prompt(text: &str, source: &Lang, target: &Lang) -> String {
        format!(
            "Translate the following text from {} into {}. Output only the translation, no explanations.\n\nText: \"{}\"",
            language_name(source),
            language_name(target),
            text
        )
    }

    fn batch_prompt(texts: &[String], source: &Lang, target: &Lang) -> String {
        use std::fmt::Write;

        let mut prompt = format!(
            "Translate the following {} numbered segments from {} into {}. \
             Answer with exactly one numbered line per segment, keeping the numbering. \
             Output only the translations.\n\n",
            texts.len(),
            language_name(source),
            language_name(target),
        );
        for (i, text) in texts.iter().enumerate() {
            let _ = writeln!(prompt, "{}. {}", i + 1, text.replace('\n', " "));
        }
        prompt
    }

    /// Parse a numbered-line response back into one translation per segment.
    fn parse_batch_response(content: &str, expected: usize) -> Result<Vec<String>> {
        let mut results = Vec::with_capacity(expected);

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            // Accept "1. text", "1) text" or "1: text"
            let stripped = line
                .split_once(['.', ')', ':'])
                .filter(|(num, _)| num.chars().all(|c| c.is_ascii_digit()) && !num.is_empty())
                .map(|(_, rest)| rest.trim());

            match stripped {
                Some(text) => results.push(text.to_string()),
                // Continuation of the previous segment
                None => {
                    if let Some(last) = results.last_mut() {
                        last.push(' ');
                        last.push_str(line);
                    }
                }
            }
        }

        if results.len() == expected {
            Ok(results)
        } else {
            Err(Error::TranslationInvalidResponse(format!(
                "expected {expected} segments, got {}",
                results.len()
            )))
        }
    }

    /// Make API request with retry logic
    async fn request_with_retry(&self, prompt: String) -> Result<String> {
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt,
            }],
            // Lower temperature for more consistent translations
            temperature: Some(0.3),
        };

        let mut last_error = None;

        for attempt in 0..self.retry_count {
            debug!(
                "Translation request attempt {}/{} to {}",
                attempt + 1,
                self.retry_count,
                url
            );

            let mut req = self.client.post(&url).json(&request);

            if let Some(ref key) = self.api_key {
                req = req.header("Authorization", format!("Bearer {key}"));
            }

            match req.send().await {
                Ok(response) => {
                    if response.status().is_success() {
                        match response.json::<ChatResponse>().await {
                            Ok(chat_response) => {
                                if let Some(choice) = chat_response.choices.first() {
                                    let translated = choice.message.content.trim();
                                    // Remove quotes if the model wrapped the response
                                    let translated = translated
                                        .trim_start_matches('"')
                                        .trim_end_matches('"')
                                        .to_string();
                                    return Ok(translated);
                                }
                                last_error = Some(Error::TranslationInvalidResponse(
                                    "No choices in response".to_string(),
                                ));
                            }
                            Err(e) => {
                                warn!("Failed to parse response: {}", e);
                                last_error = Some(Error::TranslationInvalidResponse(e.to_string()));
                            }
                        }
                    } else if response.status().as_u16() == 429 {
                        let retry_after = response
                            .headers()
                            .get("retry-after")
                            .and_then(|v| v.to_str().ok())
                            .and_then(|v| v.parse().ok());

                        warn!("Rate limited, retry after {:?}s", retry_after);
                        last_error = Some(Error::TranslationRateLimited { retry_after });

                        // Wait longer on rate limit
                        let wait_time = retry_after.unwrap_or(5) * 1000;
                        tokio::time::sleep(Duration::from_millis(wait_time)).await;
                        continue;
                    } else {
                        let status = response.status();
                        let body = response.text().await.unwrap_or_default();
                        warn!("API error: {} - {}", status, body);
                        last_error =
                            Some(Error::TranslationRequest(format!("HTTP {status}: {body}")));
                    }
                }
                Err(e) => {
                    warn!("Request failed: {}", e);
                    if e.is_timeout() {
                        last_error = Some(Error::TranslationTimeout);
                    } else {
                        last_error = Some(Error::TranslationRequest(e.to_string()));
                    }
                }
            }

            if attempt < self.retry_count - 1 {
                tokio::time::sleep(Duration::from_millis(self.retry_delay_ms)).await;
            }
        }

        error!("Translation failed after {} attempts", self.retry_count);
        Err(last_error.unwrap_or(Error::TranslationMaxRetriesExceeded))
    }
}

#[async_trait]
impl TranslationBackend for OpenAiTranslator {
    fn name(&self) -> &'static str {
        "OpenAI Compatible"
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source: &Lang,
        target: &Lang,
    ) -> Result<Vec<String>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let prompt = Self::batch_prompt(texts, source, target);
        let content = self.request_with_retry(prompt).await?;
        Self::parse_batch_response(&content, texts.len())
    }

    async fn translate(&self, text: &str, source: &Lang, target: &Lang) -> Result<String> {
        if text.trim().is_empty() {
            return Ok(text.to_string());
        }

        self.request_with_retry(Self::single_prompt(text, source, target))
            .await
    }
}

/// Convert language code to human-readable name for prompts
fn language_name(lang: &Lang) -> &'static str {
    match lang.as_str() {
        "en" => "English",
        "zh" | "zh-CN" => "Simplified Chinese",
        "zh-TW" => "Traditional Chinese",
        "ja" => "Japanese",
        "ko" => "Korean",
        "es" => "Spanish",
        "fr" => "French",
        "de" => "German",
        "it" => "Italian",
        "pt" => "Portuguese",
        "ru" => "Russian",
        "ar" => "Arabic",
        "hi" => "Hindi",
        "th" => "Thai",
        "vi" => "Vietnamese",
        // For unknown languages, the LLM should still understand most ISO codes
        _ => "the specified language",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_language_name() {
        assert_eq!(language_name(&Lang::new("en")), "English");
        assert_eq!(language_name(&Lang::new("hi")), "Hindi");
        assert_eq!(
            language_name(&Lang::new("unknown")),
            "the specified language"
        );
    }

    #[test]
    fn test_parse_batch_response() {
        let content = "1. Hola\n2. Mundo\n3. Adios";
        let parsed = OpenAiTranslator::parse_batch_response(content, 3).unwrap();
        assert_eq!(parsed, vec!["Hola", "Mundo", "Adios"]);
    }

    #[test]
    fn test_parse_batch_response_with_continuation() {
        let content = "1. Primera linea\nque continua\n2. Segunda";
        let parsed = OpenAiTranslator::parse_batch_response(content, 2).unwrap();
        assert_eq!(parsed[0], "Primera linea que continua");
        assert_eq!(parsed[1], "Segunda");
    }

    #[test]
    fn test_parse_batch_response_count_mismatch() {
        let content = "1. only one";
        assert!(OpenAiTranslator::parse_batch_response(content, 3).is_err());
    }

    #[test]
    fn test_batch_prompt_numbers_segments() {
        let texts = vec!["hello".to_string(), "world".to_string()];
        let prompt =
            OpenAiTranslator::batch_prompt(&texts, &Lang::new("en"), &Lang::new("hi"));
        assert!(prompt.contains("1. hello"));
        assert!(prompt.contains("2. world"));
        assert!(prompt.contains("Hindi"));
    }
}
