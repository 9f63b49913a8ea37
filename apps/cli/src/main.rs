use std::io::{self, BufRead, Write};
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use json_translator_core::credentials::DEFAULT_KEY_FILE;
use json_translator_core::ui_lang::{fixed, DEFAULT_LANG_DIR};
use json_translator_core::{
    open_in_system_viewer, to_pretty_json, Analysis, AnalysisSummary, ApiKeyStore,
    LanguageCatalog, LanguagePack, RunError, RunEvent, RunHandle, RunReport, TranslationSession,
    TranslatorConfig,
};
use log::{info, warn};

const MAX_KEYS_DISPLAY: usize = 15;
const MAX_OBSOLETE_DISPLAY: usize = 10;

/// Translate only the keys a new localization file adds.
#[derive(Debug, Parser)]
#[command(name = "json-translator", version, about, long_about = None)]
struct Args {
    /// Incoming (source-language) JSON file
    #[arg(short = 'n', long = "new")]
    new_file: PathBuf,

    /// Previously translated JSON file; every key is new when omitted
    #[arg(short = 'o', long = "old")]
    old_file: Option<PathBuf>,

    /// Source language name
    #[arg(short = 's', long)]
    source: Option<String>,

    /// Target language name
    #[arg(short = 't', long)]
    target: Option<String>,

    /// Configuration file (.yaml, .yml or .json)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// API key; falls back to OPENAI_API_KEY and then the key file
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Store the given --api-key in the key file
    #[arg(long, requires = "api_key")]
    save_key: bool,

    /// Key file location
    #[arg(long, default_value = DEFAULT_KEY_FILE)]
    key_file: PathBuf,

    /// New keys to leave untranslated (comma separated)
    #[arg(long, value_delimiter = ',')]
    exclude: Vec<String>,

    /// Translate only these new keys (comma separated)
    #[arg(long, value_delimiter = ',')]
    only: Vec<String>,

    /// Print what a run would produce and exit
    #[arg(long)]
    preview: bool,

    /// Skip the confirmation prompt
    #[arg(short = 'y', long)]
    yes: bool,

    /// UI language code (file stem inside the language directory)
    #[arg(long)]
    ui_lang: Option<String>,

    /// Directory with UI language packs
    #[arg(long, default_value = DEFAULT_LANG_DIR)]
    lang_dir: PathBuf,

    /// Directory receiving the translated file
    #[arg(long)]
    out_dir: Option<PathBuf>,

    /// Open the translated file when done
    #[arg(long)]
    open: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let args = Args::parse();

    let mut catalog = LanguageCatalog::load_dir(&args.lang_dir);
    if let Some(code) = &args.ui_lang {
        if !catalog.set_language(code) {
            warn!(
                "UI language '{code}' not found, available: {:?}",
                catalog.available_languages()
            );
        }
    }
    let lang = catalog.pack();

    let mut config = match &args.config {
        Some(path) => TranslatorConfig::from_file(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => TranslatorConfig::default(),
    };
    if let Some(dir) = &args.out_dir {
        config.output.directory = Some(dir.clone());
    }
    if let Some(source) = &args.source {
        config.languages.source = source.clone();
    }
    if let Some(target) = &args.target {
        config.languages.target = target.clone();
    }

    let store = ApiKeyStore::new(&args.key_file);
    if args.save_key {
        let key = args.api_key.as_deref().unwrap_or_default();
        store
            .save(key)
            .with_context(|| format!("failed to save {}", store.path().display()))?;
        println!("{}", lang.text("api_key_saved"));
    }

    let mut session = TranslationSession::new(config);
    let summary = session
        .analyze(&args.new_file, args.old_file.as_deref())
        .with_context(|| lang.text("analysis_error"))?;
    print_summary(&session, lang, &summary);

    if !session.analysis().is_some_and(Analysis::has_changes) {
        println!("{}", lang.text("nothing_to_translate"));
        return Ok(());
    }
    if summary.new_count == 0 {
        println!("{}", lang.text("nothing_to_translate_info"));
        return Ok(());
    }

    apply_selection(&mut session, &args)?;
    if session.selection().selected_count() == 0 {
        bail!(lang.text("no_keys_selected"));
    }
    println!(
        "{}",
        lang.get(
            "selection_saved",
            &[("count", session.selection().selected_count().into())]
        )
    );

    if args.preview {
        let preview = session.preview(&lang.preview_labels())?;
        println!("\n{}", lang.text("preview_title"));
        println!("{}", to_pretty_json(&preview)?);
        return Ok(());
    }

    let estimate = session.estimate()?;
    let question = lang.get(
        "confirm_message",
        &[
            ("count", estimate.keys.into()),
            ("cost", fixed(estimate.cost, 4)),
            ("requests", estimate.requests.into()),
        ],
    );
    if !args.yes && !confirm(&lang.text("confirm_translation"), &question)? {
        println!("{}", lang.text("cancelled"));
        return Ok(());
    }

    let api_key = match args.api_key.clone() {
        Some(key) => Some(key),
        None => store.load()?,
    };
    if api_key.as_deref().map_or(true, |key| key.trim().is_empty()) {
        bail!(lang.text("enter_api_key"));
    }

    println!("\n{}", lang.text("translation_in_progress"));
    let handle = session.start_translation(api_key.as_deref())?;
    let result = follow_run(handle, lang).await;
    session.finish(&result);

    match result {
        Ok(report) => {
            print_report(&report, lang);
            if args.open {
                open_in_system_viewer(&report.output_path)?;
            }
            Ok(())
        }
        Err(error) => Err(error).context(lang.text("translation_error")),
    }
}

fn print_summary(session: &TranslationSession, lang: &LanguagePack, summary: &AnalysisSummary) {
    let Some(analysis) = session.analysis() else {
        return;
    };
    let estimate = session
        .config()
        .pricing
        .estimate(summary.new_count);

    println!("{}", lang.text("smart_analysis"));
    println!("  {}: {}", lang.text("new_keys_to_translate"), summary.new_count);
    println!("  {}: {}", lang.text("obsolete_keys"), summary.obsolete_count);
    println!("  {}: {}", lang.text("kept_keys"), summary.kept_count);
    println!("  {}: ~${estimate:.4}", lang.text("estimated_cost"));
    println!("{}", lang.get("total_in_new", &[("count", summary.new_file_total.into())]));
    println!("{}", lang.get("total_in_old", &[("count", summary.old_file_total.into())]));

    let new_keys = &analysis.classification.new_keys;
    if !new_keys.is_empty() {
        println!("\n{}", lang.get("new_keys_header", &[("count", new_keys.len().into())]));
        for (index, key) in new_keys.iter().take(MAX_KEYS_DISPLAY).enumerate() {
            println!("  {:2}. {key}", index + 1);
        }
        if new_keys.len() > MAX_KEYS_DISPLAY {
            println!(
                "  {}",
                lang.get(
                    "and_more",
                    &[("count", (new_keys.len() - MAX_KEYS_DISPLAY).into())]
                )
            );
        }
    }

    let obsolete = &analysis.classification.obsolete_keys;
    if !obsolete.is_empty() {
        println!("\n{}", lang.get("obsolete_keys_header", &[("count", obsolete.len().into())]));
        println!("  {}", lang.text("obsolete_warning1"));
        for (index, key) in obsolete.iter().take(MAX_OBSOLETE_DISPLAY).enumerate() {
            println!("  {:2}. {key}", index + 1);
        }
        if obsolete.len() > MAX_OBSOLETE_DISPLAY {
            println!(
                "  {}",
                lang.get(
                    "and_more",
                    &[("count", (obsolete.len() - MAX_OBSOLETE_DISPLAY).into())]
                )
            );
        }
    }
}

fn apply_selection(session: &mut TranslationSession, args: &Args) -> Result<()> {
    if !args.only.is_empty() {
        session.deselect_all()?;
        for key in args.only.iter().map(|key| key.trim()).filter(|key| !key.is_empty()) {
            if session.set_key_selected(key, true).is_err() {
                warn!("--only: '{key}' is not a new key");
            }
        }
    }
    for key in args.exclude.iter().map(|key| key.trim()).filter(|key| !key.is_empty()) {
        if session.set_key_selected(key, false).is_err() {
            warn!("--exclude: '{key}' is not a new key");
        }
    }
    Ok(())
}

fn confirm(title: &str, question: &str) -> Result<bool> {
    println!("\n{title}\n{question}");
    print!("[y/N] ");
    io::stdout().flush()?;

    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes"))
}

async fn follow_run(
    mut handle: RunHandle,
    lang: &LanguagePack,
) -> Result<RunReport, RunError> {
    while let Some(event) = handle.next_event().await {
        match event {
            RunEvent::Started {
                total_keys,
                batch_count,
                ..
            } => info!("translating {total_keys} keys in {batch_count} batch(es)"),
            RunEvent::Progress { progress_pct, .. } => {
                println!("[{progress_pct:5.1}%]");
            }
            RunEvent::BatchFinished {
                index,
                total,
                key_count,
                fallback_count,
                first_key,
                preview,
                error,
                progress_pct,
                ..
            } => {
                println!(
                    "[{progress_pct:5.1}%] {}",
                    lang.get(
                        "batch_finished",
                        &[
                            ("index", index.into()),
                            ("total", total.into()),
                            ("count", key_count.into()),
                        ]
                    )
                );
                if let (Some(key), Some(preview)) = (first_key, preview) {
                    println!("  ✅ {key}: {preview}");
                }
                if fallback_count > 0 {
                    println!("  {}", lang.get("batch_fallback", &[("count", fallback_count.into())]));
                }
                if let Some(error) = error {
                    println!("  ⚠ {error}");
                }
            }
            RunEvent::Finished { .. } | RunEvent::Failed { .. } => {}
        }
    }
    handle.join().await
}

fn print_report(report: &RunReport, lang: &LanguagePack) {
    let output = report.output_path.display().to_string();
    println!(
        "\n{}",
        lang.get("translation_complete", &[("path", output.into())])
    );
    println!(
        "  {}",
        lang.get(
            "token_usage",
            &[
                ("prompt", report.usage.prompt_tokens().into()),
                ("completion", report.usage.completion_tokens().into()),
                ("total", report.total_tokens().into()),
            ]
        )
    );
    println!(
        "  {}",
        lang.get(
            "real_cost",
            &[
                ("total", fixed(report.cost.total, 4)),
                ("input", fixed(report.cost.input, 4)),
                ("output", fixed(report.cost.output, 4)),
            ]
        )
    );
    if report.fallback > 0 {
        println!(
            "  {}",
            lang.get("fallback_summary", &[("count", report.fallback.into())])
        );
    }
    if report.passthrough > 0 {
        println!(
            "  {}",
            lang.get("passthrough_summary", &[("count", report.passthrough.into())])
        );
    }
}
