//! UI string packs loaded from `lang/<code>.ftl`.
//!
//! Each pack is a Fluent resource. Messages take named arguments
//! (`{ $count }`) supplied to [`LanguagePack::get`].

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use fluent_bundle::{FluentArgs, FluentBundle, FluentResource};
use thiserror::Error;
use unic_langid::LanguageIdentifier;

use crate::assemble::{PreviewLabels, SKIPPED_KEY, WILL_TRANSLATE_KEY};

pub use fluent_bundle::FluentValue;

pub const DEFAULT_LANG_DIR: &str = "lang";
pub const PACK_EXTENSION: &str = "ftl";

#[derive(Debug, Error)]
pub enum LanguagePackError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid Fluent syntax in pack '{code}': {details}")]
    Syntax { code: String, details: String },
    #[error("conflicting messages in pack '{code}': {details}")]
    Conflict { code: String, details: String },
}

/// Fixed-point rendering for amounts such as costs; Fluent numbers do not
/// cap fraction digits.
pub fn fixed(value: f64, digits: usize) -> FluentValue<'static> {
    FluentValue::from(format!("{value:.digits$}"))
}

#[derive(Default)]
pub struct LanguagePack {
    code: String,
    bundle: Option<FluentBundle<FluentResource>>,
}

impl fmt::Debug for LanguagePack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LanguagePack")
            .field("code", &self.code)
            .field("loaded", &self.bundle.is_some())
            .finish()
    }
}

impl LanguagePack {
    pub fn from_ftl(code: impl Into<String>, content: &str) -> Result<Self, LanguagePackError> {
        let code = code.into();
        let resource = FluentResource::try_new(content.to_string()).map_err(|(_, errors)| {
            LanguagePackError::Syntax {
                code: code.clone(),
                details: format!("{errors:?}"),
            }
        })?;

        let langid: LanguageIdentifier = code
            .parse()
            .ok()
            .or_else(|| "en-US".parse().ok())
            .unwrap_or_default();
        let mut bundle = FluentBundle::new(vec![langid]);
        // Terminal output, no bidi isolation marks around arguments.
        bundle.set_use_isolating(false);
        bundle
            .add_resource(resource)
            .map_err(|errors| LanguagePackError::Conflict {
                code: code.clone(),
                details: format!("{errors:?}"),
            })?;

        Ok(Self {
            code,
            bundle: Some(bundle),
        })
    }

    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn has_message(&self, key: &str) -> bool {
        self.bundle
            .as_ref()
            .is_some_and(|bundle| bundle.has_message(key))
    }

    /// Message for `key` with the named `args` substituted.
    ///
    /// Unknown keys, and messages without a value, come back as the key
    /// itself. Formatting problems such as a missing argument are logged and
    /// the best-effort text is returned.
    pub fn get<'a>(&self, key: &str, args: &[(&'a str, FluentValue<'a>)]) -> String {
        let Some(bundle) = &self.bundle else {
            return key.to_string();
        };
        let Some(pattern) = bundle.get_message(key).and_then(|message| message.value()) else {
            return key.to_string();
        };

        let mut fluent_args = FluentArgs::new();
        for (name, value) in args {
            fluent_args.set(*name, value.clone());
        }

        let mut errors = Vec::new();
        let text = bundle
            .format_pattern(pattern, Some(&fluent_args), &mut errors)
            .into_owned();
        if !errors.is_empty() {
            log::debug!("formatting '{key}' in pack '{}': {errors:?}", self.code);
        }
        text
    }

    pub fn text(&self, key: &str) -> String {
        self.get(key, &[])
    }

    pub fn preview_labels(&self) -> PreviewLabels {
        PreviewLabels::new(self.text(WILL_TRANSLATE_KEY), self.text(SKIPPED_KEY))
    }
}

/// All packs found in a directory plus the one currently in use.
#[derive(Debug, Default)]
pub struct LanguageCatalog {
    packs: BTreeMap<String, LanguagePack>,
    current: Option<String>,
    empty: LanguagePack,
}

impl LanguageCatalog {
    /// Reads every `*.ftl` file in `dir`. A missing directory yields an empty
    /// catalog; unreadable packs are logged and skipped.
    pub fn load_dir(dir: &Path) -> Self {
        let mut catalog = Self::default();
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(error) => {
                log::debug!("no language packs in {}: {error}", dir.display());
                return catalog;
            }
        };

        for entry in entries.flatten() {
            let path = entry.path();
            let is_pack = path
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case(PACK_EXTENSION));
            let Some(code) = path.file_stem().and_then(|stem| stem.to_str()) else {
                continue;
            };
            if !is_pack {
                continue;
            }

            match load_pack(&path, code) {
                Ok(pack) => {
                    catalog.packs.insert(code.to_string(), pack);
                }
                Err(error) => log::warn!("skipping language pack: {error}"),
            }
        }

        catalog.current = catalog.packs.keys().next().cloned();
        catalog
    }

    pub fn insert(&mut self, pack: LanguagePack) {
        let code = pack.code().to_string();
        self.packs.insert(code.clone(), pack);
        if self.current.is_none() {
            self.current = Some(code);
        }
    }

    /// Returns `false` when no pack with `code` was loaded.
    pub fn set_language(&mut self, code: &str) -> bool {
        if self.packs.contains_key(code) {
            self.current = Some(code.to_string());
            true
        } else {
            false
        }
    }

    pub fn current_language(&self) -> Option<&str> {
        self.current.as_deref()
    }

    pub fn available_languages(&self) -> Vec<String> {
        self.packs.keys().cloned().collect()
    }

    pub fn pack(&self) -> &LanguagePack {
        self.current
            .as_ref()
            .and_then(|code| self.packs.get(code))
            .unwrap_or(&self.empty)
    }
}

fn load_pack(path: &Path, code: &str) -> Result<LanguagePack, LanguagePackError> {
    let content = fs::read_to_string(path).map_err(|source| LanguagePackError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    LanguagePack::from_ftl(code, &content)
}
