//! Interactive session: analysis, key selection and run lifecycle.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::ai::{ChatProvider, OpenAiClient, TranslationError};
use crate::assemble::{build_preview, PreviewLabels};
use crate::config::{LanguageOptions, ProviderOptions, TranslatorConfig};
use crate::diff::{compare, Analysis, AnalysisSummary};
use crate::document::{load_localization_file, DocumentError, LocalizationMap};
use crate::job::{run_translation, RunError, RunEvent, RunReport, RunRequest};
use crate::selection::{SelectionPage, SelectionState};
use crate::usage::CostEstimate;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionState {
    Idle,
    Analyzed,
    Translating,
    Done,
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no analysis available, analyze the files first")]
    NoAnalysis,
    #[error("an API key is required to translate")]
    MissingCredential,
    #[error("no keys selected for translation")]
    NothingSelected,
    #[error("a translation is already running")]
    RunInFlight,
    #[error("'{0}' is not one of the new keys")]
    UnknownKey(String),
    #[error(transparent)]
    Document(#[from] DocumentError),
    #[error("could not create translation client: {0}")]
    Provider(#[from] TranslationError),
}

/// Receiving side of a started run.
pub struct RunHandle {
    run_id: Uuid,
    events: mpsc::UnboundedReceiver<RunEvent>,
    task: JoinHandle<Result<RunReport, RunError>>,
}

impl RunHandle {
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Next event of the run; `None` once the worker has finished.
    pub async fn next_event(&mut self) -> Option<RunEvent> {
        self.events.recv().await
    }

    pub async fn join(self) -> Result<RunReport, RunError> {
        self.task
            .await
            .map_err(|error| RunError::Worker(error.to_string()))?
    }
}

/// Clears the in-flight flag when the worker ends, panics included.
struct InFlightGuard(Arc<AtomicBool>);

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

pub struct TranslationSession {
    config: TranslatorConfig,
    languages: LanguageOptions,
    state: SessionState,
    analysis: Option<Arc<Analysis>>,
    new_file: Option<PathBuf>,
    old_file: Option<PathBuf>,
    selection: SelectionState,
    in_flight: Arc<AtomicBool>,
    last_report: Option<RunReport>,
    last_failure: Option<String>,
}

impl TranslationSession {
    pub fn new(config: TranslatorConfig) -> Self {
        Self {
            languages: config.languages.clone(),
            config,
            state: SessionState::Idle,
            analysis: None,
            new_file: None,
            old_file: None,
            selection: SelectionState::default(),
            in_flight: Arc::new(AtomicBool::new(false)),
            last_report: None,
            last_failure: None,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn config(&self) -> &TranslatorConfig {
        &self.config
    }

    pub fn languages(&self) -> &LanguageOptions {
        &self.languages
    }

    pub fn set_languages(&mut self, source: impl Into<String>, target: impl Into<String>) {
        self.languages = LanguageOptions {
            source: source.into(),
            target: target.into(),
        };
    }

    pub fn is_running(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    pub fn analysis(&self) -> Option<&Analysis> {
        self.analysis.as_deref()
    }

    pub fn new_file(&self) -> Option<&Path> {
        self.new_file.as_deref()
    }

    pub fn old_file(&self) -> Option<&Path> {
        self.old_file.as_deref()
    }

    /// Loads both files and classifies their keys. Without an old file every
    /// key of the new file counts as new. On error the session is unchanged.
    pub fn analyze(
        &mut self,
        new_path: &Path,
        old_path: Option<&Path>,
    ) -> Result<AnalysisSummary, SessionError> {
        if self.is_running() {
            return Err(SessionError::RunInFlight);
        }

        let new_map = load_localization_file(new_path)?;
        let old_map = match old_path {
            Some(path) => load_localization_file(path)?,
            None => LocalizationMap::new(),
        };

        let analysis = compare(old_map, new_map);
        let summary = analysis.summary();
        log::info!(
            "analyzed {}: {} new, {} obsolete, {} kept",
            new_path.display(),
            summary.new_count,
            summary.obsolete_count,
            summary.kept_count
        );

        self.selection = SelectionState::for_new_keys(&analysis.classification.new_keys);
        self.analysis = Some(Arc::new(analysis));
        self.new_file = Some(new_path.to_path_buf());
        self.old_file = old_path.map(Path::to_path_buf);
        self.state = SessionState::Analyzed;
        self.last_failure = None;
        Ok(summary)
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn set_key_selected(&mut self, key: &str, selected: bool) -> Result<(), SessionError> {
        self.require_analysis()?;
        if self.selection.set(key, selected) {
            Ok(())
        } else {
            Err(SessionError::UnknownKey(key.to_string()))
        }
    }

    pub fn toggle_key(&mut self, key: &str) -> Result<bool, SessionError> {
        self.require_analysis()?;
        self.selection
            .toggle(key)
            .ok_or_else(|| SessionError::UnknownKey(key.to_string()))
    }

    pub fn select_all(&mut self) -> Result<(), SessionError> {
        self.require_analysis()?;
        self.selection.select_all();
        Ok(())
    }

    pub fn deselect_all(&mut self) -> Result<(), SessionError> {
        self.require_analysis()?;
        self.selection.deselect_all();
        Ok(())
    }

    pub fn selection_page(&self, page: usize, per_page: usize) -> Result<SelectionPage, SessionError> {
        self.require_analysis()?;
        Ok(self.selection.page(page, per_page))
    }

    /// Advisory cost of translating the currently selected keys.
    pub fn estimate(&self) -> Result<CostEstimate, SessionError> {
        self.require_analysis()?;
        Ok(self.config.pricing.quote(self.selection.selected_count()))
    }

    /// Dry-run output with new values tagged by `labels`.
    pub fn preview(&self, labels: &PreviewLabels) -> Result<LocalizationMap, SessionError> {
        let analysis = self.require_analysis()?;
        Ok(build_preview(analysis, &self.selection.snapshot(), labels))
    }

    /// Starts a run against the OpenAI-compatible endpoint from the config.
    pub fn start_translation(&mut self, api_key: Option<&str>) -> Result<RunHandle, SessionError> {
        self.start_translation_with(api_key, |key, options| {
            Ok(Arc::new(OpenAiClient::new(key, options)?) as Arc<dyn ChatProvider>)
        })
    }

    /// Starts a run on a background task with a provider built by `make_provider`.
    ///
    /// Must be called from within a tokio runtime. Rejected, with the state
    /// left as it was, when the key is blank, nothing is selected or a run is
    /// already in flight.
    pub fn start_translation_with<F>(
        &mut self,
        api_key: Option<&str>,
        make_provider: F,
    ) -> Result<RunHandle, SessionError>
    where
        F: FnOnce(&str, &ProviderOptions) -> Result<Arc<dyn ChatProvider>, TranslationError>,
    {
        let analysis = Arc::clone(self.analysis.as_ref().ok_or(SessionError::NoAnalysis)?);
        let api_key = api_key
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .ok_or(SessionError::MissingCredential)?;
        if self.selection.selected_count() == 0 {
            return Err(SessionError::NothingSelected);
        }
        if self.is_running() {
            return Err(SessionError::RunInFlight);
        }

        let provider = make_provider(api_key, &self.config.provider)?;
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(SessionError::RunInFlight);
        }

        let run_id = Uuid::new_v4();
        let request = RunRequest {
            run_id,
            analysis,
            selection: self.selection.snapshot(),
            new_file: self.new_file.clone().unwrap_or_default(),
            languages: self.languages.clone(),
            config: self.config.clone(),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let guard = InFlightGuard(Arc::clone(&self.in_flight));
        let task = tokio::spawn(async move {
            let _guard = guard;
            run_translation(request, provider, tx).await
        });

        self.state = SessionState::Translating;
        self.last_failure = None;
        Ok(RunHandle {
            run_id,
            events: rx,
            task,
        })
    }

    /// Applies the outcome of a run: `Done` on success, back to `Analyzed`
    /// with the failure recorded otherwise.
    pub fn finish(&mut self, result: &Result<RunReport, RunError>) {
        match result {
            Ok(report) => {
                self.last_report = Some(report.clone());
                self.state = SessionState::Done;
            }
            Err(error) => {
                self.last_failure = Some(error.to_string());
                self.state = if self.analysis.is_some() {
                    SessionState::Analyzed
                } else {
                    SessionState::Idle
                };
            }
        }
    }

    pub fn last_report(&self) -> Option<&RunReport> {
        self.last_report.as_ref()
    }

    pub fn last_output(&self) -> Option<&Path> {
        self.last_report
            .as_ref()
            .map(|report| report.output_path.as_path())
    }

    pub fn last_failure(&self) -> Option<&str> {
        self.last_failure.as_deref()
    }

    fn require_analysis(&self) -> Result<&Analysis, SessionError> {
        self.analysis.as_deref().ok_or(SessionError::NoAnalysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::tests::{reply, ScriptedProvider};
    use std::fs;

    struct Fixture {
        dir: tempfile::TempDir,
        new_file: PathBuf,
        old_file: PathBuf,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let new_file = dir.path().join("app.json");
        let old_file = dir.path().join("app_ro.json");
        fs::write(&new_file, r#"{"a": "1", "b": "2"}"#).unwrap();
        fs::write(&old_file, r#"{"a": "unu"}"#).unwrap();
        Fixture {
            dir,
            new_file,
            old_file,
        }
    }

    fn session(fixture: &Fixture) -> TranslationSession {
        let mut config = TranslatorConfig::default();
        config.output.directory = Some(fixture.dir.path().join("out"));
        config.retry.base_delay_ms = 0;
        TranslationSession::new(config)
    }

    fn scripted(replies: Vec<&'static str>) -> impl FnOnce(&str, &ProviderOptions) -> Result<Arc<dyn ChatProvider>, TranslationError> {
        move |_, _| {
            let provider = ScriptedProvider::new(replies.into_iter().map(reply).collect());
            Ok(Arc::new(provider) as Arc<dyn ChatProvider>)
        }
    }

    #[test]
    fn test_analyze_transitions_to_analyzed() {
        let fixture = fixture();
        let mut session = session(&fixture);
        assert_eq!(session.state(), SessionState::Idle);

        let summary = session
            .analyze(&fixture.new_file, Some(&fixture.old_file))
            .unwrap();

        assert_eq!(session.state(), SessionState::Analyzed);
        assert_eq!(summary.new_count, 1);
        assert_eq!(summary.kept_count, 1);
        assert_eq!(session.selection().selected_keys(), vec!["b".to_string()]);
    }

    #[test]
    fn test_analyze_without_old_file_marks_all_new() {
        let fixture = fixture();
        let mut session = session(&fixture);

        let summary = session.analyze(&fixture.new_file, None).unwrap();
        assert_eq!(summary.new_count, 2);
        assert_eq!(summary.obsolete_count, 0);
    }

    #[test]
    fn test_failed_analysis_leaves_state() {
        let fixture = fixture();
        let mut session = session(&fixture);
        let bad = fixture.dir.path().join("list.json");
        fs::write(&bad, "[1, 2]").unwrap();

        assert!(session.analyze(&bad, None).is_err());
        assert_eq!(session.state(), SessionState::Idle);
        assert!(matches!(session.estimate(), Err(SessionError::NoAnalysis)));
    }

    #[tokio::test]
    async fn test_start_preconditions() {
        let fixture = fixture();
        let mut session = session(&fixture);
        assert!(matches!(
            session.start_translation_with(Some("sk"), scripted(vec![])),
            Err(SessionError::NoAnalysis)
        ));

        session.analyze(&fixture.new_file, Some(&fixture.old_file)).unwrap();
        assert!(matches!(
            session.start_translation_with(Some("   "), scripted(vec![])),
            Err(SessionError::MissingCredential)
        ));

        session.deselect_all().unwrap();
        assert!(matches!(
            session.start_translation_with(Some("sk"), scripted(vec![])),
            Err(SessionError::NothingSelected)
        ));
        assert_eq!(session.state(), SessionState::Analyzed);
        assert!(matches!(
            session.set_key_selected("zzz", true),
            Err(SessionError::UnknownKey(_))
        ));
    }

    #[tokio::test]
    async fn test_run_lifecycle() {
        let fixture = fixture();
        let mut session = session(&fixture);
        session.analyze(&fixture.new_file, Some(&fixture.old_file)).unwrap();

        let mut handle = session
            .start_translation_with(Some("sk-test"), scripted(vec![r#"{"b": "doi"}"#]))
            .unwrap();
        assert_eq!(session.state(), SessionState::Translating);
        assert!(matches!(
            session.start_translation_with(Some("sk-test"), scripted(vec![])),
            Err(SessionError::RunInFlight)
        ));

        // selection edits after start do not reach the running worker
        session.deselect_all().unwrap();

        let mut last = None;
        while let Some(event) = handle.next_event().await {
            assert_eq!(event.run_id(), handle.run_id());
            last = Some(event);
        }
        assert!(matches!(last, Some(RunEvent::Finished { .. })));

        let result = handle.join().await;
        session.finish(&result);
        assert_eq!(session.state(), SessionState::Done);
        assert!(!session.is_running());

        let output = fs::read_to_string(session.last_output().unwrap()).unwrap();
        let written: LocalizationMap = serde_json::from_str(&output).unwrap();
        assert_eq!(written["a"], "unu");
        assert_eq!(written["b"], "doi");

        // a finished session can run again
        session.select_all().unwrap();
        let handle = session
            .start_translation_with(Some("sk-test"), scripted(vec![r#"{"b": "doi"}"#]))
            .unwrap();
        let result = handle.join().await;
        session.finish(&result);
        assert_eq!(session.state(), SessionState::Done);
    }

    #[tokio::test]
    async fn test_failed_run_returns_to_analyzed() {
        let fixture = fixture();
        let mut session = session(&fixture);
        session.analyze(&fixture.new_file, None).unwrap();

        // empty script: every request fails with a network error
        let handle = session
            .start_translation_with(Some("sk-test"), scripted(vec![]))
            .unwrap();
        let result = handle.join().await;
        session.finish(&result);

        assert!(result.is_err());
        assert_eq!(session.state(), SessionState::Analyzed);
        assert!(session.last_failure().is_some());
    }

    #[test]
    fn test_estimate_and_preview() {
        let fixture = fixture();
        let mut session = session(&fixture);
        session.analyze(&fixture.new_file, Some(&fixture.old_file)).unwrap();

        let estimate = session.estimate().unwrap();
        assert_eq!(estimate.keys, 1);
        assert_eq!(estimate.requests, 2);

        let preview = session.preview(&PreviewLabels::default()).unwrap();
        assert_eq!(preview["a"], "unu");
        assert_eq!(preview["b"], "[will_translate] 2");

        let romanian = crate::ui_lang::LanguagePack::from_ftl(
            "ro",
            "will_translate = se va traduce\nskipped = omis\n",
        )
        .unwrap();
        let preview = session.preview(&romanian.preview_labels()).unwrap();
        assert_eq!(preview["b"], "[se va traduce] 2");

        session.set_key_selected("b", false).unwrap();
        let preview = session.preview(&romanian.preview_labels()).unwrap();
        assert_eq!(preview["b"], "[omis] 2");
    }
}
