//! One provider round trip per batch: guard, request, parse, fall back, restore.

use serde_json::{Map, Value};

use crate::ai::prompt::build_request;
use crate::ai::response::parse_translation_object;
use crate::ai::retry::{evaluate_retry, RetryError, RetryPolicy};
use crate::ai::{ChatProvider, TranslationError};
use crate::config::ProviderOptions;
use crate::document::LocalizationMap;
use crate::protector::{ProtectedFragment, Protector};
use crate::usage::TokenUsage;

/// What a batch request finally produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ResponseOutcome {
    Parsed(Map<String, Value>),
    /// Replies arrived but none was usable; every key keeps its source text.
    Fallback(String),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchOutcome {
    /// Final values in batch key order.
    pub translations: LocalizationMap,
    /// Keys whose value is the untouched source text.
    pub fallback_keys: Vec<String>,
    /// Non-string values carried over without being sent.
    pub passthrough_keys: Vec<String>,
    /// Usage of every reply received, malformed ones included.
    pub usage: Vec<TokenUsage>,
    pub attempts: u32,
    pub fallback_reason: Option<String>,
}

impl BatchOutcome {
    pub fn translated_count(&self) -> usize {
        self.translations.len() - self.fallback_keys.len() - self.passthrough_keys.len()
    }
}

pub struct BatchTranslator<'a> {
    provider: &'a dyn ChatProvider,
    options: &'a ProviderOptions,
    policy: RetryPolicy,
}

impl<'a> BatchTranslator<'a> {
    pub fn new(provider: &'a dyn ChatProvider, options: &'a ProviderOptions, policy: RetryPolicy) -> Self {
        Self {
            provider,
            options,
            policy,
        }
    }

    /// Translates the values of `keys` looked up in `source_values`.
    ///
    /// Errors only when the provider failed fatally or no reply at all could
    /// be obtained; an unusable reply degrades to per-key fallback instead.
    pub async fn translate_batch(
        &self,
        keys: &[String],
        source_values: &LocalizationMap,
        source_language: &str,
        target_language: &str,
    ) -> Result<BatchOutcome, TranslationError> {
        let mut outcome = BatchOutcome::default();
        let mut fragments: Vec<(&str, ProtectedFragment)> = Vec::with_capacity(keys.len());
        let mut guarded = Map::new();

        for key in keys {
            match source_values.get(key) {
                Some(Value::String(text)) => {
                    let fragment = Protector::protect(text);
                    guarded.insert(key.clone(), Value::String(fragment.masked_text().to_string()));
                    fragments.push((key.as_str(), fragment));
                }
                Some(other) => {
                    outcome.passthrough_keys.push(key.clone());
                    outcome.translations.insert(key.clone(), other.clone());
                }
                None => log::warn!("key '{key}' has no source value; left out of the batch"),
            }
        }

        if fragments.is_empty() {
            return Ok(outcome);
        }

        let payload = serde_json::to_string_pretty(&guarded)
            .map_err(|error| TranslationError::InvalidResponse(error.to_string()))?;
        let request = build_request(self.options, source_language, target_language, &payload);

        let response = self.request_with_retry(&request, &mut outcome).await?;
        let parsed = match response {
            ResponseOutcome::Parsed(map) => map,
            ResponseOutcome::Fallback(reason) => {
                log::warn!(
                    "batch of {} keys falls back to source text: {reason}",
                    fragments.len()
                );
                outcome.fallback_reason = Some(reason);
                Map::new()
            }
        };

        // Rebuild in batch order; passthrough entries were inserted first.
        let mut ordered = LocalizationMap::new();
        let mut fragments = fragments.into_iter().peekable();
        for key in keys {
            if let Some(value) = outcome.translations.remove(key) {
                ordered.insert(key.clone(), value);
                continue;
            }
            let Some((_, fragment)) = fragments.next_if(|(name, _)| *name == key.as_str()) else {
                continue;
            };

            let translated = parsed
                .get(key)
                .and_then(Value::as_str)
                .filter(|text| !text.trim().is_empty());

            let value = match translated {
                Some(text) => {
                    let missing = fragment.missing_tokens(text);
                    if !missing.is_empty() {
                        log::warn!("translation of '{key}' dropped placeholders {missing:?}");
                    }
                    fragment.restore(text)
                }
                None => {
                    if outcome.fallback_reason.is_none() {
                        log::debug!("no usable translation for '{key}', keeping source text");
                    }
                    outcome.fallback_keys.push(key.clone());
                    fragment.original().to_string()
                }
            };
            ordered.insert(key.clone(), Value::String(value));
        }
        outcome.translations = ordered;

        Ok(outcome)
    }

    async fn request_with_retry(
        &self,
        request: &crate::ai::ChatRequest,
        outcome: &mut BatchOutcome,
    ) -> Result<ResponseOutcome, TranslationError> {
        let mut last_error: Option<TranslationError> = None;
        let mut last_reason: String;

        loop {
            outcome.attempts += 1;
            let class = match self.provider.complete(request).await {
                Ok(completion) => {
                    outcome.usage.push(completion.usage);
                    match parse_translation_object(&completion.content) {
                        Ok(map) => return Ok(ResponseOutcome::Parsed(map)),
                        Err(reason) => {
                            log::warn!(
                                "attempt {} returned malformed JSON: {reason}",
                                outcome.attempts
                            );
                            last_reason = reason;
                            RetryError::Malformed
                        }
                    }
                }
                Err(error) => {
                    if error.is_fatal() {
                        return Err(error);
                    }
                    log::warn!("attempt {} failed: {error}", outcome.attempts);
                    last_reason = error.to_string();
                    let class = error.retry_class();
                    last_error = Some(error);
                    class
                }
            };

            let decision = evaluate_retry(class, self.policy, outcome.attempts - 1);
            if !decision.should_retry {
                break;
            }
            if decision.delay_ms > 0 {
                log::info!("retrying batch in {} ms", decision.delay_ms);
                tokio::time::sleep(decision.delay()).await;
            }
        }

        match last_error {
            Some(error) if outcome.usage.is_empty() => Err(TranslationError::Exhausted {
                attempts: outcome.attempts,
                last: Box::new(error),
            }),
            _ => Ok(ResponseOutcome::Fallback(last_reason)),
        }
    }
}
