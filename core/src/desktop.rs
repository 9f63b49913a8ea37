//! Desktop bridge over a shared [`TranslationSession`].
//!
//! [`DesktopState`] carries every operation the desktop shell invokes, with
//! errors flattened to strings for the frontend. With the `desktop` feature
//! the [`commands`] module exposes them as Tauri commands and forwards run
//! events as `translation-progress`.

use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use log::warn;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ai::{ChatProvider, OpenAiClient, TranslationError};
use crate::assemble::PreviewLabels;
use crate::config::{ProviderOptions, TranslatorConfig};
use crate::credentials::ApiKeyStore;
use crate::diff::AnalysisSummary;
use crate::document::{open_in_system_viewer, LocalizationMap};
use crate::job::RunEvent;
use crate::selection::{SelectionPage, KEYS_PER_PAGE};
use crate::session::TranslationSession;
use crate::usage::CostEstimate;

pub const PROGRESS_EVENT: &str = "translation-progress";

/// A run started from the desktop: its id plus the task forwarding its
/// events and recording the outcome on the session.
pub struct ForwardedRun {
    pub run_id: Uuid,
    pub forwarder: JoinHandle<()>,
}

pub struct DesktopState {
    session: Arc<Mutex<TranslationSession>>,
    keys: ApiKeyStore,
}

impl DesktopState {
    pub fn new(config: TranslatorConfig, keys: ApiKeyStore) -> Self {
        Self {
            session: Arc::new(Mutex::new(TranslationSession::new(config))),
            keys,
        }
    }

    pub fn with_session<T>(
        &self,
        action: impl FnOnce(&mut TranslationSession) -> Result<T, String>,
    ) -> Result<T, String> {
        lock_and_run(&self.session, action)
    }

    pub fn analyze_files(
        &self,
        new_path: &str,
        old_path: Option<&str>,
    ) -> Result<AnalysisSummary, String> {
        let new_path = PathBuf::from(new_path);
        let old_path = old_path
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from);
        self.with_session(|session| {
            session
                .analyze(&new_path, old_path.as_deref())
                .map_err(|error| error.to_string())
        })
    }

    pub fn set_key_selection(&self, key: &str, selected: bool) -> Result<(), String> {
        self.with_session(|session| {
            session
                .set_key_selected(key, selected)
                .map_err(|error| error.to_string())
        })
    }

    pub fn select_all_keys(&self, selected: bool) -> Result<(), String> {
        self.with_session(|session| {
            let result = if selected {
                session.select_all()
            } else {
                session.deselect_all()
            };
            result.map_err(|error| error.to_string())
        })
    }

    pub fn selection_page(&self, page: Option<usize>) -> Result<SelectionPage, String> {
        self.with_session(|session| {
            session
                .selection_page(page.unwrap_or(1), KEYS_PER_PAGE)
                .map_err(|error| error.to_string())
        })
    }

    pub fn set_languages(&self, source: String, target: String) -> Result<(), String> {
        self.with_session(|session| {
            session.set_languages(source, target);
            Ok(())
        })
    }

    pub fn estimate_cost(&self) -> Result<CostEstimate, String> {
        self.with_session(|session| session.estimate().map_err(|error| error.to_string()))
    }

    pub fn preview_translation(&self, labels: &PreviewLabels) -> Result<LocalizationMap, String> {
        self.with_session(|session| session.preview(labels).map_err(|error| error.to_string()))
    }

    pub fn load_api_key(&self) -> Result<Option<String>, String> {
        self.keys.load().map_err(|error| error.to_string())
    }

    pub fn save_api_key(&self, api_key: &str) -> Result<(), String> {
        self.keys.save(api_key).map_err(|error| error.to_string())
    }

    /// `path` when given, otherwise the last written output.
    pub fn output_target(&self, path: Option<String>) -> Result<PathBuf, String> {
        match path.filter(|path| !path.trim().is_empty()) {
            Some(path) => Ok(PathBuf::from(path)),
            None => self.with_session(|session| {
                session
                    .last_output()
                    .map(PathBuf::from)
                    .ok_or_else(|| "no output file yet".to_string())
            }),
        }
    }

    pub fn open_output(&self, path: Option<String>) -> Result<(), String> {
        let target = self.output_target(path)?;
        open_in_system_viewer(&target).map_err(|error| error.to_string())
    }

    /// Starts a run against the configured endpoint. See
    /// [`DesktopState::start_translation_with`].
    pub fn start_translation<E>(&self, api_key: Option<String>, emit: E) -> Result<ForwardedRun, String>
    where
        E: Fn(&RunEvent) + Send + 'static,
    {
        self.start_translation_with(api_key, emit, |key, options| {
            Ok(Arc::new(OpenAiClient::new(key, options)?) as Arc<dyn ChatProvider>)
        })
    }

    /// Starts a run and hands every event to `emit` as it arrives. A blank
    /// `api_key` falls back to the stored key. Once the run ends its outcome
    /// is recorded on the session.
    pub fn start_translation_with<E, F>(
        &self,
        api_key: Option<String>,
        emit: E,
        make_provider: F,
    ) -> Result<ForwardedRun, String>
    where
        E: Fn(&RunEvent) + Send + 'static,
        F: FnOnce(&str, &ProviderOptions) -> Result<Arc<dyn ChatProvider>, TranslationError>,
    {
        let api_key = match api_key.filter(|key| !key.trim().is_empty()) {
            Some(key) => Some(key),
            None => self.load_api_key()?,
        };

        let mut handle = self.with_session(|session| {
            session
                .start_translation_with(api_key.as_deref(), make_provider)
                .map_err(|error| error.to_string())
        })?;
        let run_id = handle.run_id();

        let session = Arc::clone(&self.session);
        let forwarder = tokio::spawn(async move {
            while let Some(event) = handle.next_event().await {
                emit(&event);
            }

            let result = handle.join().await;
            let recorded = lock_and_run(&session, |session| {
                session.finish(&result);
                Ok(())
            });
            if let Err(error) = recorded {
                warn!("could not record run outcome: {error}");
            }
        });

        Ok(ForwardedRun { run_id, forwarder })
    }
}

impl Default for DesktopState {
    fn default() -> Self {
        Self::new(TranslatorConfig::default(), ApiKeyStore::default())
    }
}

fn lock_and_run<T>(
    session: &Mutex<TranslationSession>,
    action: impl FnOnce(&mut TranslationSession) -> Result<T, String>,
) -> Result<T, String> {
    let mut session = session
        .lock()
        .map_err(|_| "session lock poisoned".to_string())?;
    action(&mut session)
}

/// Tauri command layer. The host application installs its own logger
/// (`tauri-plugin-log`) and calls [`commands::register`] on its builder.
#[cfg(feature = "desktop")]
pub mod commands {
    use tauri::{AppHandle, Emitter, State};

    use super::*;

    /// Manages the default state and wires every command into `builder`.
    pub fn register(builder: tauri::Builder<tauri::Wry>) -> tauri::Builder<tauri::Wry> {
        builder
            .manage(DesktopState::default())
            .invoke_handler(tauri::generate_handler![
                analyze_files,
                set_key_selection,
                select_all_keys,
                selection_page,
                set_languages,
                estimate_cost,
                preview_translation,
                start_translation,
                load_api_key,
                save_api_key,
                open_output_folder,
            ])
    }

    #[tauri::command]
    pub fn analyze_files(
        state: State<'_, DesktopState>,
        new_path: String,
        old_path: Option<String>,
    ) -> Result<AnalysisSummary, String> {
        state.analyze_files(&new_path, old_path.as_deref())
    }

    #[tauri::command]
    pub fn set_key_selection(
        state: State<'_, DesktopState>,
        key: String,
        selected: bool,
    ) -> Result<(), String> {
        state.set_key_selection(&key, selected)
    }

    #[tauri::command]
    pub fn select_all_keys(state: State<'_, DesktopState>, selected: bool) -> Result<(), String> {
        state.select_all_keys(selected)
    }

    #[tauri::command]
    pub fn selection_page(
        state: State<'_, DesktopState>,
        page: Option<usize>,
    ) -> Result<SelectionPage, String> {
        state.selection_page(page)
    }

    #[tauri::command]
    pub fn set_languages(
        state: State<'_, DesktopState>,
        source: String,
        target: String,
    ) -> Result<(), String> {
        state.set_languages(source, target)
    }

    #[tauri::command]
    pub fn estimate_cost(state: State<'_, DesktopState>) -> Result<CostEstimate, String> {
        state.estimate_cost()
    }

    /// Labels come from the frontend's UI language; missing ones fall back
    /// to the message keys.
    #[tauri::command]
    pub fn preview_translation(
        state: State<'_, DesktopState>,
        will_translate: Option<String>,
        skipped: Option<String>,
    ) -> Result<LocalizationMap, String> {
        let defaults = PreviewLabels::default();
        let labels = PreviewLabels::new(
            will_translate.unwrap_or(defaults.will_translate),
            skipped.unwrap_or(defaults.skipped),
        );
        state.preview_translation(&labels)
    }

    /// Starts a run and forwards its events as `translation-progress`.
    /// Returns the run id.
    #[tauri::command]
    pub async fn start_translation(
        app: AppHandle,
        state: State<'_, DesktopState>,
        api_key: Option<String>,
    ) -> Result<String, String> {
        let run = state.start_translation(api_key, move |event| emit_progress(&app, event))?;
        Ok(run.run_id.to_string())
    }

    #[tauri::command]
    pub fn load_api_key(state: State<'_, DesktopState>) -> Result<Option<String>, String> {
        state.load_api_key()
    }

    #[tauri::command]
    pub fn save_api_key(state: State<'_, DesktopState>, api_key: String) -> Result<(), String> {
        state.save_api_key(&api_key)
    }

    /// Opens the last written file, or `path` when given.
    #[tauri::command]
    pub fn open_output_folder(
        state: State<'_, DesktopState>,
        path: Option<String>,
    ) -> Result<(), String> {
        state.open_output(path)
    }

    fn emit_progress(app: &AppHandle, event: &RunEvent) {
        if let Err(error) = app.emit(PROGRESS_EVENT, event) {
            warn!("failed to emit translation progress: {}", error);
        }
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::SessionState;
    use crate::translate::tests::{reply, ScriptedProvider};
    use std::fs;

    struct Fixture {
        dir: tempfile::TempDir,
        state: DesktopState,
        new_file: String,
        old_file: String,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let new_file = dir.path().join("app.json");
        let old_file = dir.path().join("app_ro.json");
        fs::write(&new_file, r#"{"a": "1", "b": "2", "c": "3"}"#).unwrap();
        fs::write(&old_file, r#"{"a": "unu"}"#).unwrap();

        let mut config = TranslatorConfig::default();
        config.output.directory = Some(dir.path().join("out"));
        config.retry.base_delay_ms = 0;
        let state = DesktopState::new(config, ApiKeyStore::new(dir.path().join(".api_key")));

        Fixture {
            state,
            new_file: new_file.to_string_lossy().into_owned(),
            old_file: old_file.to_string_lossy().into_owned(),
            dir,
        }
    }

    fn scripted(
        replies: Vec<&'static str>,
    ) -> impl FnOnce(&str, &ProviderOptions) -> Result<Arc<dyn ChatProvider>, TranslationError> {
        move |_, _| {
            let provider = ScriptedProvider::new(replies.into_iter().map(reply).collect());
            Ok(Arc::new(provider) as Arc<dyn ChatProvider>)
        }
    }

    #[test]
    fn selection_and_preview_go_through_the_shared_session() {
        let fixture = fixture();
        let state = &fixture.state;

        let summary = state
            .analyze_files(&fixture.new_file, Some(&fixture.old_file))
            .unwrap();
        assert_eq!(summary.new_count, 2);

        let page = state.selection_page(None).unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.total_keys, 2);

        state.set_key_selection("c", false).unwrap();
        assert_eq!(state.estimate_cost().unwrap().keys, 1);
        assert!(state.set_key_selection("a", false).is_err());

        let labels = PreviewLabels::new("se va traduce", "omis");
        let preview = state.preview_translation(&labels).unwrap();
        assert_eq!(preview["a"], "unu");
        assert_eq!(preview["b"], "[se va traduce] 2");
        assert_eq!(preview["c"], "[omis] 3");

        state.select_all_keys(false).unwrap();
        assert_eq!(state.estimate_cost().unwrap().keys, 0);
    }

    #[test]
    fn blank_old_path_means_every_key_is_new() {
        let fixture = fixture();
        let summary = fixture
            .state
            .analyze_files(&fixture.new_file, Some("  "))
            .unwrap();
        assert_eq!(summary.new_count, 3);
    }

    #[test]
    fn errors_reach_the_frontend_as_text() {
        let fixture = fixture();
        let error = fixture.state.estimate_cost().unwrap_err();
        assert!(error.contains("analyze the files first"));
        assert_eq!(
            fixture.state.output_target(None).unwrap_err(),
            "no output file yet"
        );
        assert_eq!(
            fixture.state.output_target(Some("/tmp/x.json".into())).unwrap(),
            PathBuf::from("/tmp/x.json")
        );
    }

    #[tokio::test]
    async fn run_uses_stored_key_and_records_outcome() {
        let fixture = fixture();
        let state = &fixture.state;
        state.save_api_key("sk-stored").unwrap();
        assert_eq!(state.load_api_key().unwrap().as_deref(), Some("sk-stored"));
        state
            .analyze_files(&fixture.new_file, Some(&fixture.old_file))
            .unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let run = state
            .start_translation_with(
                Some("   ".into()),
                move |event: &RunEvent| sink.lock().unwrap().push(event.clone()),
                scripted(vec![r#"{"b": "doi", "c": "trei"}"#]),
            )
            .unwrap();
        run.forwarder.await.unwrap();

        let events = events.lock().unwrap();
        assert!(matches!(events.first(), Some(RunEvent::Started { .. })));
        assert!(matches!(events.last(), Some(RunEvent::Finished { .. })));
        assert!(events.iter().all(|event| event.run_id() == run.run_id));

        let finished = state.with_session(|session| Ok(session.state())).unwrap();
        assert_eq!(finished, SessionState::Done);
        let output = state.output_target(None).unwrap();
        assert!(output.starts_with(fixture.dir.path().join("out")));
        let written = crate::document::load_localization_file(&output).unwrap();
        assert_eq!(written["b"], "doi");
    }

    #[tokio::test]
    async fn run_without_any_key_is_refused() {
        let fixture = fixture();
        fixture
            .state
            .analyze_files(&fixture.new_file, None)
            .unwrap();

        let result = fixture
            .state
            .start_translation_with(None, |_: &RunEvent| {}, scripted(vec![]));

        let error = result.err().unwrap();
        assert!(error.contains("API key"));
        let state = fixture.state.with_session(|session| Ok(session.state())).unwrap();
        assert_eq!(state, SessionState::Analyzed);
    }
}
