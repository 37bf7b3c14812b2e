//! OpenAI-compatible chat client over `ureq`.
//!
//! One request per call, no retries: the answer engine degrades to its
//! extractive fallback instead of hammering a struggling endpoint.

use biosearch_core::config::GenerationConfig;
use biosearch_core::error::{Error, RefusalReason, Result};
use biosearch_core::traits::{GenerationRequest, Generator};
use serde_json::json;
use std::time::Duration;

pub struct ChatClient {
    agent: ureq::Agent,
    config: GenerationConfig,
}

impl ChatClient {
    /// Returns `None` when no API key is configured, so callers fall back to
    /// extractive answers instead of sending doomed requests.
    pub fn from_config(config: &GenerationConfig) -> Option<Self> {
        config.api_key.as_ref()?;
        Some(Self {
            agent: ureq::AgentBuilder::new()
                .timeout(Duration::from_secs(config.timeout_secs))
                .build(),
            config: config.clone(),
        })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }
}

impl Generator for ChatClient {
    fn generate(&self, request: &GenerationRequest<'_>) -> Result<String> {
        let api_key = self
            .config
            .api_key
            .as_deref()
            .ok_or_else(|| Error::GenerationUnavailable("no API key configured".to_string()))?;

        let body = json!({
            "model": self.config.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.prompt },
            ],
            "temperature": request.temperature,
            "max_tokens": request.max_tokens,
        });

        let response = self
            .agent
            .post(&self.endpoint())
            .set("Authorization", &format!("Bearer {api_key}"))
            .send_json(&body);

        match response {
            Ok(resp) => {
                let value: serde_json::Value = resp.into_json().map_err(|e| {
                    Error::GenerationUnavailable(format!("unreadable completion response: {e}"))
                })?;
                parse_completion(&value)
            }
            Err(ureq::Error::Status(code, resp)) => {
                let detail = resp.into_string().unwrap_or_default();
                tracing::warn!(%code, "generation endpoint rejected the request");
                Err(Error::GenerationUnavailable(format!(
                    "endpoint returned HTTP {code}: {detail}"
                )))
            }
            Err(e) => Err(Error::GenerationUnavailable(e.to_string())),
        }
    }
}

/// Maps an OpenAI-style completion payload to text or a typed refusal.
///
/// `content_filter` is a refusal regardless of any partial text. A `length`
/// stop with no text is a refusal too; a `length` stop with partial text is
/// returned as-is, since a truncated grounded answer beats none.
fn parse_completion(value: &serde_json::Value) -> Result<String> {
    let choice = &value["choices"][0];
    if choice.is_null() {
        return Err(Error::GenerationUnavailable(
            "completion response carried no choices".to_string(),
        ));
    }
    let finish_reason = choice["finish_reason"].as_str().unwrap_or("stop");
    let content = choice["message"]["content"].as_str().unwrap_or("").trim();

    match finish_reason {
        "content_filter" => Err(Error::GenerationRefused(RefusalReason::Safety)),
        "length" if content.is_empty() => Err(Error::GenerationRefused(RefusalReason::Length)),
        _ if content.is_empty() => Err(Error::GenerationRefused(RefusalReason::Other(
            format!("empty completion (finish_reason: {finish_reason})"),
        ))),
        _ => Ok(content.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normal_completion_yields_trimmed_text() {
        let payload = json!({
            "choices": [{
                "finish_reason": "stop",
                "message": { "content": "  Bone density drops in orbit [1].  " }
            }]
        });
        assert_eq!(
            parse_completion(&payload).expect("text"),
            "Bone density drops in orbit [1]."
        );
    }

    #[test]
    fn content_filter_maps_to_safety_refusal() {
        let payload = json!({
            "choices": [{
                "finish_reason": "content_filter",
                "message": { "content": "partial text" }
            }]
        });
        match parse_completion(&payload) {
            Err(Error::GenerationRefused(RefusalReason::Safety)) => {}
            other => panic!("expected safety refusal, got {other:?}"),
        }
    }

    #[test]
    fn empty_length_stop_is_a_length_refusal_but_partial_text_survives() {
        let empty = json!({
            "choices": [{ "finish_reason": "length", "message": { "content": "" } }]
        });
        match parse_completion(&empty) {
            Err(Error::GenerationRefused(RefusalReason::Length)) => {}
            other => panic!("expected length refusal, got {other:?}"),
        }

        let partial = json!({
            "choices": [{ "finish_reason": "length", "message": { "content": "Mice lose" } }]
        });
        assert_eq!(parse_completion(&partial).expect("partial"), "Mice lose");
    }

    #[test]
    fn missing_choices_is_unavailable_not_a_panic() {
        let payload = json!({ "choices": [] });
        assert!(matches!(
            parse_completion(&payload),
            Err(Error::GenerationUnavailable(_))
        ));
    }

    #[test]
    fn client_requires_an_api_key() {
        let config = GenerationConfig::default();
        assert!(config.api_key.is_none());
        assert!(ChatClient::from_config(&config).is_none());

        let keyed = GenerationConfig {
            api_key: Some("sk-test".to_string()),
            ..GenerationConfig::default()
        };
        assert!(ChatClient::from_config(&keyed).is_some());
    }
}
