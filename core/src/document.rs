//! Reading localization files and persisting the assembled result.
//!
//! Only flat objects are meaningful here. Values are kept as JSON values so
//! that anything which is not a string survives the round trip untouched.

use chrono::{DateTime, Local};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use serde_json::{Map, Value};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::time::output_timestamp;

/// Ordered key/value view of one localization file. Iteration order is the
/// order keys appear in the file.
pub type LocalizationMap = Map<String, Value>;

const OUTPUT_INDENT: &[u8] = b"    ";
/// Upper bound on `_2`, `_3`, ... suffixes tried for one timestamp.
const MAX_NAME_SUFFIX: u32 = 100;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{0} must contain a JSON object at the top level")]
    NotAnObject(PathBuf),
    #[error("failed to serialize output: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot open {path}: {message}")]
    Open { path: PathBuf, message: String },
}

/// Loads a localization file, rejecting anything that is not a JSON object.
pub fn load_localization_file(path: &Path) -> Result<LocalizationMap, DocumentError> {
    let content = fs::read_to_string(path).map_err(|source| DocumentError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_localization(&content).map_err(|error| match error {
        DocumentError::NotAnObject(_) => DocumentError::NotAnObject(path.to_path_buf()),
        DocumentError::Parse { source, .. } => DocumentError::Parse {
            path: path.to_path_buf(),
            source,
        },
        other => other,
    })
}

pub fn parse_localization(content: &str) -> Result<LocalizationMap, DocumentError> {
    let trimmed = content.trim_start_matches('\u{feff}');
    let value: Value = serde_json::from_str(trimmed).map_err(|source| DocumentError::Parse {
        path: PathBuf::new(),
        source,
    })?;

    match value {
        Value::Object(map) => Ok(map),
        _ => Err(DocumentError::NotAnObject(PathBuf::new())),
    }
}

/// The final mapping of one run. Built once by the assembler and never
/// mutated afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct OutputDocument {
    entries: LocalizationMap,
}

impl OutputDocument {
    pub(crate) fn new(entries: LocalizationMap) -> Self {
        Self { entries }
    }

    pub fn entries(&self) -> &LocalizationMap {
        &self.entries
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json_string(&self) -> Result<String, DocumentError> {
        to_pretty_json(&self.entries)
    }

    /// Writes `<new-basename>_translated_<timestamp>.json` into `dir` and
    /// returns the path of the written file. An existing file is never
    /// replaced: a taken name gets a `_2`, `_3`, ... suffix instead.
    pub fn write_to(
        &self,
        dir: &Path,
        new_file: &Path,
        now: DateTime<Local>,
    ) -> Result<PathBuf, DocumentError> {
        let content = self.to_json_string()?;

        if !dir.as_os_str().is_empty() {
            fs::create_dir_all(dir).map_err(|source| DocumentError::Write {
                path: dir.to_path_buf(),
                source,
            })?;
        }

        for attempt in 1..=MAX_NAME_SUFFIX {
            let target = dir.join(numbered_file_name(new_file, now, attempt));
            let mut file = match OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&target)
            {
                Ok(file) => file,
                Err(error) if error.kind() == ErrorKind::AlreadyExists => continue,
                Err(source) => return Err(DocumentError::Write { path: target, source }),
            };
            file.write_all(content.as_bytes())
                .map_err(|source| DocumentError::Write {
                    path: target.clone(),
                    source,
                })?;
            return Ok(target);
        }

        Err(DocumentError::Write {
            path: dir.join(output_file_name(new_file, now)),
            source: std::io::Error::new(
                ErrorKind::AlreadyExists,
                "every suffixed output name is already taken",
            ),
        })
    }
}

/// 4-space indented JSON with non-ASCII characters written as-is.
pub fn to_pretty_json(entries: &LocalizationMap) -> Result<String, DocumentError> {
    let mut buffer = Vec::new();
    let formatter = PrettyFormatter::with_indent(OUTPUT_INDENT);
    let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
    entries.serialize(&mut serializer)?;
    Ok(String::from_utf8_lossy(&buffer).into_owned())
}

pub fn output_file_name(new_file: &Path, now: DateTime<Local>) -> String {
    numbered_file_name(new_file, now, 1)
}

fn numbered_file_name(new_file: &Path, now: DateTime<Local>, attempt: u32) -> String {
    let stem = new_file
        .file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".into());
    let stamp = output_timestamp(now);
    if attempt <= 1 {
        format!("{stem}_translated_{stamp}.json")
    } else {
        format!("{stem}_translated_{stamp}_{attempt}.json")
    }
}

/// Hands a produced file (or its folder) to the desktop's default viewer.
pub fn open_in_system_viewer(path: &Path) -> Result<(), DocumentError> {
    if !path.exists() {
        return Err(DocumentError::Open {
            path: path.to_path_buf(),
            message: "path does not exist".into(),
        });
    }
    let resolved = dunce::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
    open::that_detached(&resolved).map_err(|error| DocumentError::Open {
        path: resolved,
        message: error.to_string(),
    })
}
