use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::ai::retry::RetryPolicy;
use crate::ai::{ChatProvider, TranslationError};
use crate::assemble::{assemble, AssembleError};
use crate::batch::{plan_batches, ProgressPlan};
use crate::config::{LanguageOptions, TranslatorConfig};
use crate::diff::Analysis;
use crate::document::{DocumentError, LocalizationMap};
use crate::selection::SelectionSnapshot;
use crate::translate::BatchTranslator;
use crate::usage::{CostBreakdown, UsageAccumulator};

const MAX_PREVIEW_CHARS: usize = 80;

/// Everything a run needs, frozen when it starts.
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub run_id: Uuid,
    pub analysis: Arc<Analysis>,
    pub selection: SelectionSnapshot,
    pub new_file: PathBuf,
    pub languages: LanguageOptions,
    pub config: TranslatorConfig,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    pub run_id: Uuid,
    pub output_path: PathBuf,
    pub translated: usize,
    pub fallback: usize,
    /// Non-text values copied over without a request.
    pub passthrough: usize,
    pub skipped: usize,
    pub kept: usize,
    pub obsolete: usize,
    pub batches: usize,
    pub failed_batches: usize,
    pub usage: UsageAccumulator,
    pub cost: CostBreakdown,
}

impl RunReport {
    pub fn total_tokens(&self) -> u64 {
        self.usage.total_tokens()
    }
}

/// Messages posted by the worker while a run proceeds.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum RunEvent {
    #[serde(rename_all = "camelCase")]
    Started {
        run_id: Uuid,
        total_keys: usize,
        batch_count: usize,
    },
    #[serde(rename_all = "camelCase")]
    Progress { run_id: Uuid, progress_pct: f32 },
    #[serde(rename_all = "camelCase")]
    BatchFinished {
        run_id: Uuid,
        index: usize,
        total: usize,
        key_count: usize,
        fallback_count: usize,
        first_key: Option<String>,
        preview: Option<String>,
        error: Option<String>,
        progress_pct: f32,
    },
    #[serde(rename_all = "camelCase")]
    Finished { run_id: Uuid, report: RunReport },
    #[serde(rename_all = "camelCase")]
    Failed {
        run_id: Uuid,
        code: &'static str,
        message: String,
    },
}

impl RunEvent {
    pub fn run_id(&self) -> Uuid {
        match self {
            RunEvent::Started { run_id, .. }
            | RunEvent::Progress { run_id, .. }
            | RunEvent::BatchFinished { run_id, .. }
            | RunEvent::Finished { run_id, .. }
            | RunEvent::Failed { run_id, .. } => *run_id,
        }
    }

    /// Percentage carried by the event, if any.
    pub fn progress(&self) -> Option<f32> {
        match self {
            RunEvent::Progress { progress_pct, .. }
            | RunEvent::BatchFinished { progress_pct, .. } => Some(*progress_pct),
            RunEvent::Finished { .. } => Some(100.0),
            RunEvent::Started { .. } | RunEvent::Failed { .. } => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("no keys selected for translation")]
    NothingSelected,
    #[error("translation provider failed: {0}")]
    Provider(#[from] TranslationError),
    #[error("translation provider unreachable: all {batches} batch(es) failed")]
    Unreachable { batches: usize },
    #[error(transparent)]
    Assemble(#[from] AssembleError),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("translation worker stopped unexpectedly: {0}")]
    Worker(String),
}

impl RunError {
    pub fn code(&self) -> &'static str {
        match self {
            RunError::NothingSelected => "NOTHING_SELECTED",
            RunError::Provider(TranslationError::Http { status, .. })
                if status.as_u16() == 401 || status.as_u16() == 403 =>
            {
                "INVALID_API_KEY"
            }
            RunError::Provider(_) => "PROVIDER_ERROR",
            RunError::Unreachable { .. } => "NETWORK_ERROR",
            RunError::Assemble(_) => "ASSEMBLE_ERROR",
            RunError::Document(_) => "WRITE_ERROR",
            RunError::Worker(_) => "WORKER_ERROR",
        }
    }
}

/// Translates the selected new keys batch by batch, assembles the output and
/// writes it. Every outcome, success or failure, is also posted on `events`.
pub async fn run_translation(
    request: RunRequest,
    provider: Arc<dyn ChatProvider>,
    events: mpsc::UnboundedSender<RunEvent>,
) -> Result<RunReport, RunError> {
    let run_id = request.run_id;
    let result = execute(request, provider.as_ref(), &events).await;

    match &result {
        Ok(report) => {
            log::info!(
                "run {run_id} finished: {} translated, {} fallback, written to {}",
                report.translated,
                report.fallback,
                report.output_path.display()
            );
            post(
                &events,
                RunEvent::Finished {
                    run_id,
                    report: report.clone(),
                },
            );
        }
        Err(error) => {
            log::error!("run {run_id} failed: {error}");
            post(
                &events,
                RunEvent::Failed {
                    run_id,
                    code: error.code(),
                    message: error.to_string(),
                },
            );
        }
    }

    result
}

async fn execute(
    request: RunRequest,
    provider: &dyn ChatProvider,
    events: &mpsc::UnboundedSender<RunEvent>,
) -> Result<RunReport, RunError> {
    let RunRequest {
        run_id,
        analysis,
        selection,
        new_file,
        languages,
        config,
    } = request;

    let selected = selection.selected();
    if selected.is_empty() {
        return Err(RunError::NothingSelected);
    }

    let mut usage = UsageAccumulator::new();

    let batches = plan_batches(selected, config.batch.batch_size);
    let plan = ProgressPlan::new(batches.len());
    let translator =
        BatchTranslator::new(provider, &config.provider, RetryPolicy::from(&config.retry));

    log::info!(
        "run {run_id}: {} keys in {} batch(es), {} -> {} via {}",
        selected.len(),
        batches.len(),
        languages.source,
        languages.target,
        provider.name()
    );
    post(
        events,
        RunEvent::Started {
            run_id,
            total_keys: selected.len(),
            batch_count: batches.len(),
        },
    );
    post(
        events,
        RunEvent::Progress {
            run_id,
            progress_pct: plan.initial(),
        },
    );

    let mut translated = LocalizationMap::new();
    let mut fallback = 0usize;
    let mut passthrough = 0usize;
    let mut requested_batches = 0usize;
    let mut failed_batches = 0usize;

    for batch in &batches {
        let (fallback_count, error) = match translator
            .translate_batch(&batch.keys, &analysis.new_map, &languages.source, &languages.target)
            .await
        {
            Ok(outcome) => {
                if outcome.attempts > 0 {
                    requested_batches += 1;
                }
                passthrough += outcome.passthrough_keys.len();
                outcome.usage.iter().for_each(|entry| usage.record_usage(*entry));
                let count = outcome.fallback_keys.len();
                translated.extend(outcome.translations);
                (count, None)
            }
            Err(error) if error.is_fatal() => return Err(error.into()),
            Err(error) => {
                log::warn!(
                    "batch {}/{} kept source text: {error}",
                    batch.index,
                    batches.len()
                );
                requested_batches += 1;
                failed_batches += 1;
                let mut unsent = 0usize;
                for key in &batch.keys {
                    if let Some(value) = analysis.new_map.get(key) {
                        if !value.is_string() {
                            unsent += 1;
                        }
                        translated.insert(key.clone(), value.clone());
                    }
                }
                passthrough += unsent;
                (batch.len() - unsent, Some(error.to_string()))
            }
        };
        fallback += fallback_count;

        let first_key = batch.keys.first().cloned();
        let preview = first_key
            .as_ref()
            .and_then(|key| translated.get(key))
            .map(|value| truncate_preview(value, MAX_PREVIEW_CHARS));

        post(
            events,
            RunEvent::BatchFinished {
                run_id,
                index: batch.index,
                total: batches.len(),
                key_count: batch.len(),
                fallback_count,
                first_key,
                preview,
                error,
                progress_pct: plan.after_batch(batch.index),
            },
        );
    }

    // Batches of non-text values only never reach the provider.
    if requested_batches > 0 && failed_batches == requested_batches {
        return Err(RunError::Unreachable {
            batches: failed_batches,
        });
    }

    let document = assemble(&analysis, &selection, &translated)?;
    let output_dir = config.output.resolved_directory();
    let now = crate::time::now();
    let output_path = tokio::task::spawn_blocking(move || document.write_to(&output_dir, &new_file, now))
        .await
        .map_err(|error| RunError::Worker(error.to_string()))??;

    let cost = usage.cost(&config.pricing);
    Ok(RunReport {
        run_id,
        output_path,
        translated: selected.len().saturating_sub(fallback + passthrough),
        fallback,
        passthrough,
        skipped: selection.skipped().len(),
        kept: analysis.classification.kept_keys.len(),
        obsolete: analysis.classification.obsolete_keys.len(),
        batches: batches.len(),
        failed_batches,
        usage,
        cost,
    })
}

fn post(events: &mpsc::UnboundedSender<RunEvent>, event: RunEvent) {
    if events.send(event).is_err() {
        log::debug!("run event dropped, receiver closed");
    }
}

fn truncate_preview(value: &Value, limit: usize) -> String {
    let text = match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    };
    if text.chars().count() <= limit {
        return text;
    }
    let mut truncated: String = text.chars().take(limit).collect();
    truncated.push_str("...");
    truncated
}
