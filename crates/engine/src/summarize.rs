//! Summarizer client for promotion and crystallization
//!
//! `ApiSummarizer` talks to an OpenAI-compatible chat completions endpoint.
//! The library supplies only the mode distinction (corridor vs. vault
//! prompt) and the input truncation budgets; endpoint, model, temperature,
//! token cap, and timeout come from configuration. A disabled configuration
//! produces a clean no-op so maintenance can run without a model server.
//!
//! Every transport failure maps to `SummarizerUnavailable`, which
//! maintenance treats as local to the one file being distilled.

use nautilus_core::{NautilusError, Result, Summarizer, SummarizerConfig, SummaryMode};
use serde::Deserialize;
use std::time::Duration;

const CORRIDOR_PROMPT: &str = "Summarize this memory file into a compact digest. \
     Keep concrete facts, decisions, names, and open threads. \
     Drop greetings, filler, and tool noise. Answer with the summary only.";

const VAULT_PROMPT: &str = "Distill this old memory file into durable lessons. \
     Keep only what still matters: conclusions, preferences, hard-won facts. \
     Write 3-8 short bullet points. Answer with the bullets only.";

fn prompt_for(mode: SummaryMode) -> &'static str {
    match mode {
        SummaryMode::Corridor => CORRIDOR_PROMPT,
        SummaryMode::Vault => VAULT_PROMPT,
    }
}

// ============================================================================
// Response shape
// ============================================================================

/// The slice of a chat completions response Nautilus cares about.
#[derive(Debug, Deserialize)]
struct ChatCompletion {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

impl ChatCompletion {
    /// The first choice's content, trimmed; `None` when the model declined
    /// or the response carried no choices.
    fn into_summary(self) -> Option<String> {
        let content = self.choices.into_iter().next()?.message.content;
        let trimmed = content.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    }
}

// ============================================================================
// ApiSummarizer
// ============================================================================

/// Summarizer backed by an OpenAI-compatible chat completions endpoint.
pub struct ApiSummarizer {
    config: SummarizerConfig,
    agent: ureq::Agent,
}

impl ApiSummarizer {
    /// Build a client from the summarizer configuration. The HTTP agent is
    /// constructed once, with the configured timeout applied globally per
    /// request.
    pub fn new(config: &SummarizerConfig) -> Self {
        let agent_config = ureq::Agent::config_builder()
            .timeout_global(Some(Duration::from_millis(config.timeout_ms)))
            .build();
        ApiSummarizer {
            config: config.clone(),
            agent: ureq::Agent::new_with_config(agent_config),
        }
    }

    fn completions_url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }

    fn request_body(&self, text: &str, mode: SummaryMode) -> Result<Vec<u8>> {
        serde_json::to_vec(&serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": prompt_for(mode)},
                {"role": "user", "content": text},
            ],
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        }))
        .map_err(|e| {
            NautilusError::summarizer_unavailable(format!("cannot encode request: {}", e))
        })
    }

    fn post(&self, body: &[u8]) -> Result<ChatCompletion> {
        let mut request = self
            .agent
            .post(&self.completions_url())
            .header("Content-Type", "application/json");
        if let Some(key) = &self.config.api_key {
            request = request.header("Authorization", &format!("Bearer {}", key));
        }

        let mut response = request.send(body).map_err(classify_transport)?;
        let text = response.body_mut().read_to_string().map_err(|e| {
            NautilusError::summarizer_unavailable(format!("cannot read response: {}", e))
        })?;
        serde_json::from_str(&text).map_err(|e| {
            NautilusError::summarizer_unavailable(format!("malformed completion: {}", e))
        })
    }
}

/// Classify a transport error: HTTP status, timeout (anywhere in the error
/// source chain), or general unreachability.
fn classify_transport(e: ureq::Error) -> NautilusError {
    if let ureq::Error::StatusCode(code) = e {
        return NautilusError::summarizer_unavailable(format!("endpoint returned HTTP {}", code));
    }
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(&e);
    while let Some(err) = source {
        if let Some(io) = err.downcast_ref::<std::io::Error>() {
            if io.kind() == std::io::ErrorKind::TimedOut {
                return NautilusError::summarizer_unavailable("model request timed out");
            }
        }
        source = err.source();
    }
    NautilusError::summarizer_unavailable(format!("endpoint unreachable: {}", e))
}

impl Summarizer for ApiSummarizer {
    fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    fn summarize(&self, text: &str, mode: SummaryMode) -> Result<Option<String>> {
        if !self.config.enabled {
            return Ok(None);
        }
        let body = self.request_body(text, mode)?;
        let completion = self.post(&body)?;
        Ok(completion.into_summary())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_config_is_noop() {
        let mut config = SummarizerConfig::default();
        config.enabled = false;
        let summarizer = ApiSummarizer::new(&config);
        assert!(!summarizer.is_enabled());
        assert_eq!(
            summarizer.summarize("anything", SummaryMode::Corridor).unwrap(),
            None
        );
    }

    #[test]
    fn test_completions_url_normalizes_slash() {
        let mut config = SummarizerConfig::default();
        config.endpoint = "http://localhost:11434/v1/".to_string();
        let summarizer = ApiSummarizer::new(&config);
        assert_eq!(
            summarizer.completions_url(),
            "http://localhost:11434/v1/chat/completions"
        );
    }

    #[test]
    fn test_completion_extracts_first_choice() {
        let completion: ChatCompletion = serde_json::from_str(
            r#"{"choices": [
                {"message": {"role": "assistant", "content": "  the summary  "}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(completion.into_summary(), Some("the summary".to_string()));
    }

    #[test]
    fn test_empty_or_missing_choices_decline() {
        let empty: ChatCompletion = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert_eq!(empty.into_summary(), None);

        let blank: ChatCompletion = serde_json::from_str(
            r#"{"choices": [{"message": {"content": "   "}}]}"#,
        )
        .unwrap();
        assert_eq!(blank.into_summary(), None);
    }

    #[test]
    fn test_unreachable_endpoint_is_summarizer_unavailable() {
        let mut config = SummarizerConfig::default();
        // Reserved port on localhost with nothing listening.
        config.endpoint = "http://127.0.0.1:1/v1".to_string();
        config.timeout_ms = 200;
        let summarizer = ApiSummarizer::new(&config);
        let err = summarizer
            .summarize("text", SummaryMode::Vault)
            .unwrap_err();
        assert!(matches!(
            err,
            NautilusError::SummarizerUnavailable { .. }
        ));
    }

    #[test]
    fn test_prompts_differ_by_mode() {
        assert_ne!(prompt_for(SummaryMode::Corridor), prompt_for(SummaryMode::Vault));
    }
}
