//! Error taxonomy and classification for build/run output.
//!
//! [`classify`] is a pure function: the same raw output and diagnostic
//! lists always map to the same [`ErrorKind`]. Matching is case-insensitive
//! substring search against curated pattern lists, evaluated in strict
//! precedence order so that the most specific category wins.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Coarse classification of why a compile-and-test attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorKind {
    /// Toolchain or environment failure (module init conflicts, missing deps).
    Infrastructure,
    /// Parse-level failure (unexpected token, unterminated construct).
    Syntax,
    /// Name resolution or type-checking failure.
    Type,
    /// Abnormal termination during execution (panic, segfault).
    Runtime,
    /// Built fine, assertions failed.
    Logic,
    /// No error.
    Success,
    /// Nothing matched.
    Unknown,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Infrastructure => "infrastructure",
            ErrorKind::Syntax => "syntax",
            ErrorKind::Type => "type",
            ErrorKind::Runtime => "runtime",
            ErrorKind::Logic => "logic",
            ErrorKind::Success => "success",
            ErrorKind::Unknown => "unknown",
        };
        write!(f, "{name}")
    }
}

const INFRASTRUCTURE_PATTERNS: &[&str] = &[
    "go.mod already exists",
    "cannot find package",
    "not in gopath",
    "invalid go.mod",
    "module not found",
    "go get",
    "no module named",
    "command not found",
    "permission denied",
];

const SYNTAX_PATTERNS: &[&str] = &[
    "syntax error",
    "syntaxerror",
    "expected",
    "unexpected",
    "invalid operation",
    "unclosed",
    "unterminated",
];

const TYPE_PATTERNS: &[&str] = &[
    "undefined",
    "undeclared",
    "type",
    "cannot use",
    "mismatched types",
    "wrong number of arguments",
    "not a function",
    "nameerror",
];

const RUNTIME_PATTERNS: &[&str] = &[
    "panic",
    "fatal",
    "signal: segmentation",
    "segmentation fault",
    "runtime error",
    "core dumped",
];

/// Classify raw build/run output into an [`ErrorKind`].
///
/// Precedence: infrastructure > syntax > type > runtime. When no pattern
/// matches, non-empty test diagnostics mean the code built but assertions
/// failed (`Logic`); non-empty compile diagnostics default to `Type` as the
/// most actionable guess; otherwise `Unknown`.
pub fn classify(raw_output: &str, compile_diags: &[String], test_diags: &[String]) -> ErrorKind {
    let lower = raw_output.to_lowercase();

    let matches_any = |patterns: &[&str]| patterns.iter().any(|p| lower.contains(p));

    if matches_any(INFRASTRUCTURE_PATTERNS) {
        return ErrorKind::Infrastructure;
    }
    if matches_any(SYNTAX_PATTERNS) {
        return ErrorKind::Syntax;
    }
    if matches_any(TYPE_PATTERNS) {
        return ErrorKind::Type;
    }
    if matches_any(RUNTIME_PATTERNS) {
        return ErrorKind::Runtime;
    }

    if !test_diags.is_empty() {
        return ErrorKind::Logic;
    }
    if !compile_diags.is_empty() {
        return ErrorKind::Type;
    }

    ErrorKind::Unknown
}

/// Partition raw combined output into compile-time and test-time lines.
///
/// Compile-time lines are the ones referencing the main source file path;
/// test-time lines are the ones carrying failure or error markers. The
/// partition feeds the classifier's fallback rules and the summarized
/// feedback shown to the model.
pub fn split_diagnostics(raw_output: &str, main_file: &str) -> (Vec<String>, Vec<String>) {
    let mut compile_diags = Vec::new();
    let mut test_diags = Vec::new();

    for line in raw_output.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed.contains(main_file) {
            compile_diags.push(trimmed.to_string());
        }
        if trimmed.contains("FAIL") || trimmed.contains("Error:") {
            test_diags.push(trimmed.to_string());
        }
    }

    (compile_diags, test_diags)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_infrastructure_first() {
        // "expected" would also match syntax, but infrastructure wins.
        let out = "go.mod already exists; expected token";
        assert_eq!(classify(out, &[], &[]), ErrorKind::Infrastructure);
    }

    #[test]
    fn classifies_syntax() {
        let out = "main.go:3:1: syntax error: unexpected semicolon";
        assert_eq!(classify(out, &[], &[]), ErrorKind::Syntax);
    }

    #[test]
    fn classifies_type() {
        let out = "main.go:10: undefined: double";
        assert_eq!(classify(out, &[], &[]), ErrorKind::Type);
    }

    #[test]
    fn classifies_runtime() {
        let out = "signal: segmentation violation, core dumped";
        assert_eq!(classify(out, &[], &[]), ErrorKind::Runtime);
    }

    #[test]
    fn falls_back_to_logic_on_test_failures() {
        let out = "--- some assertion did not hold";
        let tests = vec!["--- FAIL: TestDouble".to_string()];
        assert_eq!(classify(out, &[], &tests), ErrorKind::Logic);
    }

    #[test]
    fn falls_back_to_type_on_unrecognized_compile_failure() {
        let out = "weird compiler message";
        let compile = vec!["main.go:1: weird compiler message".to_string()];
        assert_eq!(classify(out, &compile, &[]), ErrorKind::Type);
    }

    #[test]
    fn unknown_when_nothing_matches() {
        assert_eq!(classify("all quiet", &[], &[]), ErrorKind::Unknown);
    }

    #[test]
    fn classification_is_deterministic() {
        let out = "main.go:3: syntax error near token";
        let first = classify(out, &[], &[]);
        for _ in 0..10 {
            assert_eq!(classify(out, &[], &[]), first);
        }
    }

    #[test]
    fn split_diagnostics_partitions_lines() {
        let out = "main.go:4:2: undefined: helper\n\
                   --- FAIL: TestHelper (0.00s)\n\
                   ok  \ttemp_module\t0.002s";
        let (compile, test) = split_diagnostics(out, "main.go");
        assert_eq!(compile, vec!["main.go:4:2: undefined: helper"]);
        assert_eq!(test, vec!["--- FAIL: TestHelper (0.00s)"]);
    }

    #[test]
    fn split_diagnostics_skips_blank_lines() {
        let (compile, test) = split_diagnostics("\n\n\n", "main.go");
        assert!(compile.is_empty());
        assert!(test.is_empty());
    }

    #[test]
    fn error_kind_display() {
        assert_eq!(ErrorKind::Infrastructure.to_string(), "infrastructure");
        assert_eq!(ErrorKind::Syntax.to_string(), "syntax");
        assert_eq!(ErrorKind::Type.to_string(), "type");
        assert_eq!(ErrorKind::Runtime.to_string(), "runtime");
        assert_eq!(ErrorKind::Logic.to_string(), "logic");
        assert_eq!(ErrorKind::Success.to_string(), "success");
        assert_eq!(ErrorKind::Unknown.to_string(), "unknown");
    }
}
