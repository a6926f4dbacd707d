//! Asset formats and the lookup table that drives source assembly.
//!
//! The set of formats is closed. Everything format-specific (wire tag, file
//! extensions, binary flag, how the assembler treats the content) lives in
//! [`FORMATS`] rather than in per-format types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{RepoError, RepoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AssetFormat {
    /// Plain rule text.
    #[serde(rename = "drl")]
    Rule,
    /// Function declarations.
    #[serde(rename = "function")]
    Function,
    /// DSL mapping sentences, consumed by DSL expansion only.
    #[serde(rename = "dsl")]
    DslMapping,
    /// Rule written against a DSL mapping.
    #[serde(rename = "dslr")]
    DslRule,
    /// Declared-type model (`declare ... end` blocks).
    #[serde(rename = "model.drl")]
    Model,
    /// Opaque bytes (images, spreadsheets, jars).
    #[serde(rename = "binary")]
    Binary,
}

/// How the assembler treats an asset's content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Emit {
    /// Copy the content into the assembled source verbatim.
    Inline,
    /// Leave the asset out of the assembled source.
    Omit,
}

pub struct FormatSpec {
    pub format: AssetFormat,
    pub tag: &'static str,
    /// File extensions that map to this format, longest first.
    pub extensions: &'static [&'static str],
    pub binary: bool,
    pub emit: Emit,
}

pub const FORMATS: &[FormatSpec] = &[
    FormatSpec {
        format: AssetFormat::Rule,
        tag: "drl",
        extensions: &["drl"],
        binary: false,
        emit: Emit::Inline,
    },
    FormatSpec {
        format: AssetFormat::Function,
        tag: "function",
        extensions: &["function"],
        binary: false,
        emit: Emit::Inline,
    },
    FormatSpec {
        format: AssetFormat::DslMapping,
        tag: "dsl",
        extensions: &["dsl"],
        binary: false,
        emit: Emit::Omit,
    },
    FormatSpec {
        format: AssetFormat::DslRule,
        tag: "dslr",
        extensions: &["dslr"],
        binary: false,
        emit: Emit::Inline,
    },
    FormatSpec {
        format: AssetFormat::Model,
        tag: "model.drl",
        extensions: &["model.drl"],
        binary: false,
        emit: Emit::Inline,
    },
    FormatSpec {
        format: AssetFormat::Binary,
        tag: "binary",
        extensions: &[
            "binary", "bin", "gif", "png", "jpg", "jpeg", "pdf", "xls", "xlsx", "jar",
        ],
        binary: true,
        emit: Emit::Omit,
    },
];

impl AssetFormat {
    fn spec(self) -> &'static FormatSpec {
        FORMATS
            .iter()
            .find(|spec| spec.format == self)
            .unwrap_or(&FORMATS[FORMATS.len() - 1])
    }

    pub fn tag(self) -> &'static str {
        self.spec().tag
    }

    pub fn is_binary(self) -> bool {
        self.spec().binary
    }

    pub fn emit(self) -> Emit {
        self.spec().emit
    }

    /// Parse a format tag. Known binary extensions are accepted as aliases
    /// for [`AssetFormat::Binary`].
    pub fn parse(tag: &str) -> RepoResult<Self> {
        let wanted = tag.trim().to_ascii_lowercase();
        FORMATS
            .iter()
            .find(|spec| spec.tag == wanted || spec.extensions.contains(&wanted.as_str()))
            .map(|spec| spec.format)
            .ok_or_else(|| RepoError::validation("format", format!("unknown format tag '{tag}'")))
    }
}

impl fmt::Display for AssetFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Split an uploaded file name into an asset name and a format.
///
/// The longest matching extension wins, so `rules.model.drl` is a model
/// named `rules`, not a rule named `rules.model`.
pub fn split_file_name(file_name: &str) -> RepoResult<(String, AssetFormat)> {
    let lowered = file_name.to_ascii_lowercase();
    let mut best: Option<(usize, AssetFormat)> = None;
    for spec in FORMATS {
        for ext in spec.extensions {
            let suffix_len = ext.len() + 1;
            if lowered.len() > suffix_len
                && lowered.ends_with(ext)
                && lowered.as_bytes()[lowered.len() - suffix_len] == b'.'
                && best.is_none_or(|(len, _)| suffix_len > len)
            {
                best = Some((suffix_len, spec.format));
            }
        }
    }
    match best {
        Some((suffix_len, format)) => {
            let name = file_name[..file_name.len() - suffix_len].to_string();
            Ok((name, format))
        }
        None => Err(RepoError::validation(
            "format",
            format!("cannot infer a format from file name '{file_name}'"),
        )),
    }
}
