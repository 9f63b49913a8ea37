pub mod ai;
pub mod assemble;
pub mod batch;
pub mod config;
pub mod credentials;
pub mod desktop;
pub mod diff;
pub mod document;
pub mod job;
pub mod protector;
pub mod selection;
pub mod session;
mod time;
pub mod translate;
pub mod ui_lang;
pub mod usage;

pub use ai::{ChatCompletion, ChatMessage, ChatProvider, ChatRequest, OpenAiClient, TranslationError};
pub use assemble::{assemble, build_preview, AssembleError, PreviewLabels};
pub use batch::{plan_batches, ProgressPlan, TranslationBatch};
pub use config::{ConfigError, TranslatorConfig, LANGUAGE_CHOICES};
pub use credentials::{ApiKeyStore, CredentialError};
pub use desktop::{DesktopState, ForwardedRun};
pub use diff::{compare, Analysis, AnalysisSummary, KeyClassification};
pub use document::{
    load_localization_file, open_in_system_viewer, to_pretty_json, DocumentError, LocalizationMap,
    OutputDocument,
};
pub use job::{run_translation, RunError, RunEvent, RunReport, RunRequest};
pub use protector::{ProtectedFragment, Protector, TokenClass};
pub use selection::{SelectionSnapshot, SelectionState, KEYS_PER_PAGE};
pub use session::{RunHandle, SessionError, SessionState, TranslationSession};
pub use translate::{BatchOutcome, BatchTranslator, ResponseOutcome};
pub use ui_lang::{FluentValue, LanguageCatalog, LanguagePack, LanguagePackError};
pub use usage::{CostBreakdown, CostEstimate, Pricing, TokenUsage, UsageAccumulator};
