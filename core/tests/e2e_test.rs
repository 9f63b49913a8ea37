//! End-to-end tests for a translation session.
//!
//! These tests drive the whole workflow with a scripted provider:
//! 1. Analysis of a new file against an old translation
//! 2. Key selection
//! 3. Batched translation with placeholder protection
//! 4. Assembly and writing of the output file

use std::collections::VecDeque;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use json_translator_core::usage::TokenUsage;
use json_translator_core::{
    load_localization_file, ChatCompletion, ChatProvider, ChatRequest, PreviewLabels, RunEvent,
    SessionState, TranslationError, TranslationSession, TranslatorConfig,
};
use reqwest::StatusCode;
use serde_json::{json, Value};
use tempfile::TempDir;

const NEW_FILE: &str = r#"{
    "title": "Settings",
    "greeting": "Hello {name}",
    "count": 3,
    "farewell": "Goodbye"
}"#;

const OLD_FILE: &str = r#"{
    "title": "Setări",
    "removed": "Șters"
}"#;

/// Replays canned replies in order; an exhausted script looks like a dead network.
struct ScriptedProvider {
    replies: Mutex<VecDeque<Result<ChatCompletion, TranslationError>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Result<ChatCompletion, TranslationError>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        })
    }

    fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &'static str {
        "scripted"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatCompletion, TranslationError> {
        self.requests.lock().unwrap().push(request.clone());
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(TranslationError::Network("connection refused".into())))
    }
}

fn reply(content: &str) -> Result<ChatCompletion, TranslationError> {
    Ok(ChatCompletion {
        content: content.to_string(),
        usage: TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 40,
        },
    })
}

struct Workspace {
    dir: TempDir,
    new_file: PathBuf,
    old_file: PathBuf,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let new_file = dir.path().join("messages.json");
        let old_file = dir.path().join("messages_ro.json");
        fs::write(&new_file, NEW_FILE).unwrap();
        fs::write(&old_file, OLD_FILE).unwrap();
        Self {
            dir,
            new_file,
            old_file,
        }
    }

    fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    fn session(&self, batch_size: usize) -> TranslationSession {
        let mut config = TranslatorConfig::default();
        config.batch.batch_size = batch_size;
        config.retry.base_delay_ms = 0;
        config.output.directory = Some(self.output_dir());
        let mut session = TranslationSession::new(config);
        session
            .analyze(&self.new_file, Some(self.old_file.as_path()))
            .unwrap();
        session
    }

    fn written_files(&self) -> Vec<PathBuf> {
        match fs::read_dir(self.output_dir()) {
            Ok(entries) => entries.map(|entry| entry.unwrap().path()).collect(),
            Err(_) => Vec::new(),
        }
    }
}

fn keys_of(path: &Path) -> Vec<String> {
    load_localization_file(path).unwrap().keys().cloned().collect()
}

#[tokio::test]
async fn test_e2e_partial_reply_keeps_source_for_missing_key() {
    let workspace = Workspace::new();
    let mut session = workspace.session(60);

    let summary = session.analysis().unwrap().summary();
    assert_eq!(summary.new_count, 3);
    assert_eq!(summary.obsolete_count, 1);
    assert_eq!(summary.kept_count, 1);

    let provider = ScriptedProvider::new(vec![reply("{\"greeting\": \"Salut __P0__\"}")]);
    let scripted = Arc::clone(&provider);
    let mut handle = session
        .start_translation_with(Some("sk-test"), move |_, _| {
            Ok(scripted as Arc<dyn ChatProvider>)
        })
        .unwrap();
    assert_eq!(session.state(), SessionState::Translating);

    while handle.next_event().await.is_some() {}
    let result = handle.join().await;
    session.finish(&result);
    let report = result.unwrap();

    assert_eq!(session.state(), SessionState::Done);
    assert_eq!(report.batches, 1);
    assert_eq!(report.failed_batches, 0);
    assert_eq!(report.fallback, 1);
    assert_eq!(report.kept, 1);
    assert_eq!(report.obsolete, 1);
    assert_eq!(report.total_tokens(), 140);

    // Placeholder masked on the way out, non-string value never sent.
    let requests = provider.requests();
    assert_eq!(requests.len(), 1);
    let payload = &requests[0].messages[1].content;
    assert!(payload.contains("Hello __P0__"));
    assert!(!payload.contains("{name}"));
    assert!(!payload.contains("\"count\""));

    let written = load_localization_file(&report.output_path).unwrap();
    assert_eq!(
        keys_of(&report.output_path),
        vec!["title", "greeting", "count", "farewell"]
    );
    assert_eq!(written["title"], json!("Setări"));
    assert_eq!(written["greeting"], json!("Salut {name}"));
    assert_eq!(written["count"], json!(3));
    assert_eq!(written["farewell"], json!("Goodbye"));
    assert!(!written.contains_key("removed"));
    assert_eq!(session.last_output(), Some(report.output_path.as_path()));
}

#[tokio::test]
async fn test_e2e_progress_is_monotonic_and_ends_at_100() {
    let workspace = Workspace::new();
    let mut session = workspace.session(1);

    let provider = ScriptedProvider::new(vec![
        reply("{\"greeting\": \"Salut __P0__\"}"),
        reply("{\"farewell\": \"La revedere\"}"),
    ]);
    let mut handle = session
        .start_translation_with(Some("sk-test"), move |_, _| {
            Ok(provider as Arc<dyn ChatProvider>)
        })
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    let report = handle.join().await.unwrap();

    assert!(matches!(
        events.first(),
        Some(RunEvent::Started {
            total_keys: 3,
            batch_count: 3,
            ..
        })
    ));
    assert!(matches!(events.last(), Some(RunEvent::Finished { .. })));
    assert!(events.iter().all(|event| event.run_id() == report.run_id));

    let progress: Vec<f32> = events.iter().filter_map(RunEvent::progress).collect();
    assert!(progress.windows(2).all(|pair| pair[0] <= pair[1]));
    assert_eq!(progress.last().copied(), Some(100.0));

    let batch_events = events
        .iter()
        .filter(|event| matches!(event, RunEvent::BatchFinished { .. }))
        .count();
    assert_eq!(batch_events, 3);

    let written = load_localization_file(&report.output_path).unwrap();
    assert_eq!(written["farewell"], json!("La revedere"));
    assert_eq!(written["count"], json!(3));
}

#[tokio::test]
async fn test_e2e_skipped_key_keeps_source_text() {
    let workspace = Workspace::new();
    let mut session = workspace.session(60);
    session.set_key_selected("farewell", false).unwrap();

    let preview = session.preview(&PreviewLabels::default()).unwrap();
    assert_eq!(preview["farewell"], json!("[skipped] Goodbye"));
    assert_eq!(preview["title"], json!("Setări"));

    let provider = ScriptedProvider::new(vec![reply("{\"greeting\": \"Salut __P0__\"}")]);
    let mut handle = session
        .start_translation_with(Some("sk-test"), move |_, _| {
            Ok(provider as Arc<dyn ChatProvider>)
        })
        .unwrap();
    while handle.next_event().await.is_some() {}
    let report = handle.join().await.unwrap();

    assert_eq!(report.skipped, 1);
    assert_eq!(report.fallback, 0);
    let written = load_localization_file(&report.output_path).unwrap();
    assert_eq!(written["farewell"], json!("Goodbye"));
    assert_eq!(written["greeting"], json!("Salut {name}"));
}

#[tokio::test]
async fn test_e2e_unreachable_provider_writes_nothing() {
    let workspace = Workspace::new();
    let mut session = workspace.session(60);

    let provider = ScriptedProvider::new(Vec::new());
    let mut handle = session
        .start_translation_with(Some("sk-test"), move |_, _| {
            Ok(provider as Arc<dyn ChatProvider>)
        })
        .unwrap();

    let mut failure_code = None;
    while let Some(event) = handle.next_event().await {
        if let RunEvent::Failed { code, .. } = event {
            failure_code = Some(code);
        }
    }
    let result = handle.join().await;
    session.finish(&result);

    assert!(result.is_err());
    assert_eq!(failure_code, Some("NETWORK_ERROR"));
    assert_eq!(session.state(), SessionState::Analyzed);
    assert!(session.last_failure().is_some());
    assert!(!session.is_running());
    assert!(workspace.written_files().is_empty());
}

#[tokio::test]
async fn test_e2e_rejected_key_aborts_run() {
    let workspace = Workspace::new();
    let mut session = workspace.session(1);

    let provider = ScriptedProvider::new(vec![Err(TranslationError::Http {
        status: StatusCode::UNAUTHORIZED,
        body: "invalid api key".into(),
        retry_after: None,
    })]);
    let scripted = Arc::clone(&provider);
    let mut handle = session
        .start_translation_with(Some("sk-wrong"), move |_, _| {
            Ok(scripted as Arc<dyn ChatProvider>)
        })
        .unwrap();

    let mut events = Vec::new();
    while let Some(event) = handle.next_event().await {
        events.push(event);
    }
    let result = handle.join().await;

    assert!(result.is_err());
    assert!(matches!(
        events.last(),
        Some(RunEvent::Failed {
            code: "INVALID_API_KEY",
            ..
        })
    ));
    // First batch failed fatally, later batches were never requested.
    assert_eq!(provider.requests().len(), 1);
    assert!(workspace.written_files().is_empty());
}

#[tokio::test]
async fn test_e2e_output_is_pretty_utf8_json() {
    let workspace = Workspace::new();
    let mut session = workspace.session(60);

    let provider = ScriptedProvider::new(vec![reply(
        "```json\n{\"greeting\": \"Salut __P0__\", \"farewell\": \"La revedere, ăîșț\"}\n```",
    )]);
    let mut handle = session
        .start_translation_with(Some("sk-test"), move |_, _| {
            Ok(provider as Arc<dyn ChatProvider>)
        })
        .unwrap();
    while handle.next_event().await.is_some() {}
    let report = handle.join().await.unwrap();

    let name = report
        .output_path
        .file_name()
        .unwrap()
        .to_string_lossy()
        .into_owned();
    assert!(name.starts_with("messages_translated_"));
    assert!(name.ends_with(".json"));

    let text = fs::read_to_string(&report.output_path).unwrap();
    assert!(text.contains("\n    \"title\": \"Setări\""));
    assert!(text.contains("ăîșț"));
    let parsed: Value = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed["greeting"], json!("Salut {name}"));
}
