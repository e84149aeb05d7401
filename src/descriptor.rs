//! Sidecar descriptor parsing and the failure record written back into it.
//!
//! A sidecar is INI-style text:
//!
//! ```text
//! [PrintSettings]
//! PageSize=A4
//! Orientation=Landscape
//! MD5Hash=0x9e107d9d372bb6826bd81d3542a419d6
//!
//! [AdvancedSettings]
//! Color=Black and white
//! DelayPrintTime=
//!
//! [Submitter]
//! FullName=Alice Example
//! EmailAddress=alice@example.com
//! ```
//!
//! Every key and every section is optional. Sections are matched exactly, keys
//! case-insensitively.

use std::io::Write;
use std::path::{Path, PathBuf};

use ini::{EscapePolicy, Ini, ParseOption, Properties, WriteOption};
use tempfile::NamedTempFile;
use thiserror::Error;

pub const PRINT_SETTINGS: &str = "PrintSettings";
pub const ADVANCED_SETTINGS: &str = "AdvancedSettings";
pub const SUBMITTER: &str = "Submitter";
pub const STATUS: &str = "Status";

pub const DEFAULT_PAGE_SIZE: &str = "Letter";
pub const DEFAULT_ORIENTATION: &str = "Portrait";
pub const DEFAULT_COLOR_MODE: &str = "Color";

// Values are taken verbatim: no escape sequences, no quote stripping.
// `DOMAIN\user` names must survive both parsing and the status rewrite.
fn load_verbatim(text: &str) -> Result<Ini, ini::ParseError> {
    Ini::load_from_str_opt(
        text,
        ParseOption {
            enabled_escape: false,
            enabled_quote: false,
            ..Default::default()
        },
    )
}

#[derive(Debug, Error)]
pub enum DescriptorError {
    #[error("cannot read {}: {source}", path.display())]
    Unreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is not sectioned key-value text: {detail}", path.display())]
    Malformed { path: PathBuf, detail: String },
}

/// Parsed sidecar metadata. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub page_size: String,
    pub orientation: String,
    /// Lowercase-insensitive hex digest with any `0x` prefix removed.
    /// `None` skips verification.
    pub declared_checksum: Option<String>,
    pub color_mode: String,
    /// `DelayPrintTime`. Parsed and logged, never acted on.
    pub deferred_output_time: Option<String>,
    pub submitter_name: String,
    /// `None` disables notification.
    pub submitter_address: Option<String>,
}

impl Default for JobDescriptor {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE.to_string(),
            orientation: DEFAULT_ORIENTATION.to_string(),
            declared_checksum: None,
            color_mode: DEFAULT_COLOR_MODE.to_string(),
            deferred_output_time: None,
            submitter_name: String::new(),
            submitter_address: None,
        }
    }
}

impl JobDescriptor {
    /// Read and parse the sidecar at `path`.
    pub fn load(path: &Path) -> Result<Self, DescriptorError> {
        let bytes = std::fs::read(path).map_err(|source| DescriptorError::Unreadable {
            path: path.to_path_buf(),
            source,
        })?;
        let text = String::from_utf8(bytes).map_err(|e| DescriptorError::Malformed {
            path: path.to_path_buf(),
            detail: format!("not UTF-8 text ({e})"),
        })?;
        Self::parse(&text).map_err(|detail| DescriptorError::Malformed {
            path: path.to_path_buf(),
            detail,
        })
    }

    /// Parse descriptor text. Missing sections and keys fall back to defaults;
    /// only text that is not sectioned key-value data is rejected.
    pub fn parse(text: &str) -> Result<Self, String> {
        let ini = load_verbatim(text).map_err(|e| e.to_string())?;

        let stray_key = ini
            .section(None::<String>)
            .and_then(|general| general.iter().next().map(|(key, _)| key.to_string()));
        if let Some(key) = stray_key {
            return Err(format!("key '{key}' appears before any [section] header"));
        }

        let print = ini.section(Some(PRINT_SETTINGS));
        let advanced = ini.section(Some(ADVANCED_SETTINGS));
        let submitter = ini.section(Some(SUBMITTER));

        Ok(Self {
            page_size: lookup(print, "PageSize").unwrap_or_else(|| DEFAULT_PAGE_SIZE.to_string()),
            orientation: lookup(print, "Orientation")
                .unwrap_or_else(|| DEFAULT_ORIENTATION.to_string()),
            declared_checksum: lookup(print, "MD5Hash").and_then(|raw| normalize_checksum(&raw)),
            color_mode: lookup(advanced, "Color").unwrap_or_else(|| DEFAULT_COLOR_MODE.to_string()),
            deferred_output_time: lookup(advanced, "DelayPrintTime"),
            submitter_name: lookup(submitter, "FullName").unwrap_or_default(),
            submitter_address: lookup(submitter, "EmailAddress"),
        })
    }
}

// Non-empty, trimmed value for `key`, matched case-insensitively.
fn lookup(section: Option<&Properties>, key: &str) -> Option<String> {
    let section = section?;
    let value = section.get(key).or_else(|| {
        section
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v)
    })?;
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Strip a literal `0x`/`0X` prefix. Leading zero digits are part of the digest.
pub fn normalize_checksum(raw: &str) -> Option<String> {
    let trimmed = raw.trim();
    let digest = trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
        .unwrap_or(trimmed)
        .trim();
    if digest.is_empty() {
        None
    } else {
        Some(digest.to_string())
    }
}

/// Failure annotation written into a sidecar before it moves to the error folder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutcomeRecord {
    pub error_reason: String,
}

impl OutcomeRecord {
    pub fn new(error_reason: impl Into<String>) -> Self {
        Self {
            error_reason: error_reason.into(),
        }
    }

    /// Set `[Status] error=<reason>` in the sidecar at `path`.
    ///
    /// The new content is written to a temporary file beside the sidecar and
    /// renamed over it, so readers see either the old or the new file. A sidecar
    /// that does not parse gets the section appended to its raw text.
    pub fn write_into(&self, path: &Path) -> std::io::Result<()> {
        let original = std::fs::read(path)?;
        let reason = self.error_reason.replace(['\r', '\n'], " ");

        let parsed = std::str::from_utf8(&original)
            .ok()
            .and_then(|text| load_verbatim(text).ok());

        let rendered = match parsed {
            Some(mut ini) => {
                ini.with_section(Some(STATUS)).set("error", reason);
                let mut buf = Vec::new();
                ini.write_to_opt(
                    &mut buf,
                    WriteOption {
                        escape_policy: EscapePolicy::Nothing,
                        ..Default::default()
                    },
                )?;
                buf
            }
            None => {
                let mut buf = original;
                if !buf.is_empty() && !buf.ends_with(b"\n") {
                    buf.push(b'\n');
                }
                buf.extend_from_slice(format!("\n[{STATUS}]\nerror={reason}\n").as_bytes());
                buf
            }
        };

        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let mut tmp = NamedTempFile::new_in(dir)?;
        tmp.write_all(&rendered)?;
        tmp.as_file().sync_all()?;
        tmp.persist(path).map_err(|e| e.error)?;
        Ok(())
    }
}
