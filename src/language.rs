//! Supported target languages and their structural signatures.
//!
//! A [`LanguageProfile`] carries everything the extraction chain needs to
//! recognize code for one language: the fence tag models use, the
//! line-anchored test-function marker, the top-level declaration keyword
//! (when the language has one) and the headers to synthesize when a split
//! produces a half without its own declaration.

use std::fmt;
use std::str::FromStr;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::CrucibleError;

/// A target language the engine can compile and test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Go,
    Python,
    Cpp,
}

impl Language {
    pub const ALL: &'static [Language] = &[Language::Go, Language::Python, Language::Cpp];

    /// Build the extraction profile for this language.
    pub fn profile(&self) -> LanguageProfile {
        match self {
            Language::Go => LanguageProfile::new(
                "go",
                r"(?m)^func\s+Test",
                Some("package main"),
                "package",
                "package main\n",
                "package main\nimport \"testing\"\n",
            ),
            Language::Python => LanguageProfile::new(
                "python",
                r"(?m)^(?:class\s+Test|def\s+test_)",
                None,
                "",
                "",
                "import unittest\n",
            ),
            // No declaration keyword: `#include` repeats inside a single
            // program, so splitting on it would cut valid code apart.
            Language::Cpp => LanguageProfile::new(
                "cpp",
                r"(?m)^(?:TEST(?:_F)?\s*\(|void\s+test_)",
                None,
                "#include",
                "",
                "#include <cassert>\n",
            ),
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Language::Go => "go",
            Language::Python => "python",
            Language::Cpp => "cpp",
        };
        write!(f, "{name}")
    }
}

impl FromStr for Language {
    type Err = CrucibleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "go" | "golang" => Ok(Language::Go),
            "python" | "py" => Ok(Language::Python),
            "cpp" | "c++" | "cxx" => Ok(Language::Cpp),
            other => Err(CrucibleError::UnsupportedLanguage(other.to_string())),
        }
    }
}

/// Structural signatures used by the extraction chain for one language.
#[derive(Debug, Clone)]
pub struct LanguageProfile {
    /// Fence tag the format directive asks for (` ```go `, ` ```python `, ...).
    pub fence_tag: &'static str,
    /// Line-anchored regex locating the first test function.
    pub test_marker: Regex,
    /// Top-level declaration keyword, when the language has one.
    pub decl_keyword: Option<&'static str>,
    /// Prefix that proves a half already carries its declaration header.
    pub header_probe: &'static str,
    /// Header synthesized for a main half that lacks one.
    pub main_header: &'static str,
    /// Header synthesized for a test half that lacks one.
    pub test_header: &'static str,
    /// Minimum length for each half of a test-marker split.
    pub marker_min_len: usize,
    /// Minimum length for each half of a declaration-keyword split.
    pub split_min_len: usize,
}

impl LanguageProfile {
    fn new(
        fence_tag: &'static str,
        test_marker: &str,
        decl_keyword: Option<&'static str>,
        header_probe: &'static str,
        main_header: &'static str,
        test_header: &'static str,
    ) -> Self {
        Self {
            fence_tag,
            test_marker: Regex::new(test_marker).expect("invalid test marker pattern"),
            decl_keyword,
            header_probe,
            main_header,
            test_header,
            marker_min_len: 30,
            split_min_len: 50,
        }
    }

    /// Prepend the synthesized main header when the half lacks a declaration.
    pub fn ensure_main_header(&self, code: &str) -> String {
        if self.header_probe.is_empty() || code.trim_start().starts_with(self.header_probe) {
            code.to_string()
        } else {
            format!("{}{}", self.main_header, code)
        }
    }

    /// Prepend the synthesized test header when the half lacks a declaration.
    pub fn ensure_test_header(&self, code: &str) -> String {
        if self.header_probe.is_empty() || code.trim_start().starts_with(self.header_probe) {
            code.to_string()
        } else {
            format!("{}{}", self.test_header, code)
        }
    }
}
