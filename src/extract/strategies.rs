//! The individual extraction strategies, ordered from strictest to loosest.
//!
//! Each strategy probes one shape of model output and fails fast when the
//! shape is absent; the [`Extractor`](super::Extractor) walks them in a
//! fixed priority order so a well-formatted response is never handled by a
//! lossy heuristic.

use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::language::LanguageProfile;

/// Internal per-strategy probe failure. Never escapes the extractor.
#[derive(Debug, Error)]
#[error("{strategy}: {message}")]
pub struct StrategyError {
    pub strategy: &'static str,
    pub message: String,
}

impl StrategyError {
    fn new(strategy: &'static str, message: impl Into<String>) -> Self {
        Self {
            strategy,
            message: message.into(),
        }
    }
}

/// One heuristic for recovering (main code, test code) from model text.
pub trait Strategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(
        &self,
        response: &str,
        profile: &LanguageProfile,
    ) -> Result<(String, String), StrategyError>;
}

// Any fenced block, regardless of declared tag.
static ANY_FENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)```(?:[a-zA-Z0-9+]*)?\n(.*?)```").expect("invalid fence pattern")
});

/// All fenced block bodies in the text, in order of appearance.
pub fn fenced_blocks(text: &str) -> Vec<String> {
    ANY_FENCE
        .captures_iter(text)
        .map(|cap| cap[1].trim().to_string())
        .collect()
}

/// Fenced block bodies restricted to the profile's language tag.
fn tagged_blocks(text: &str, profile: &LanguageProfile) -> Vec<String> {
    let pattern = format!(r"(?s)```{}\n(.*?)```", regex::escape(profile.fence_tag));
    let re = Regex::new(&pattern).expect("invalid tagged fence pattern");
    re.captures_iter(text)
        .map(|cap| cap[1].trim().to_string())
        .collect()
}

fn strip_stray_fences(code: &str) -> String {
    code.trim_matches('`').trim().to_string()
}

/// Strategy 1: first fenced block is main code, second is test code.
pub struct FencedBlockPair;

impl Strategy for FencedBlockPair {
    fn name(&self) -> &'static str {
        "fenced_block_pair"
    }

    fn extract(
        &self,
        response: &str,
        _profile: &LanguageProfile,
    ) -> Result<(String, String), StrategyError> {
        let blocks = fenced_blocks(response);
        if blocks.len() < 2 {
            return Err(StrategyError::new(
                self.name(),
                format!("expected at least 2 code blocks, found {}", blocks.len()),
            ));
        }
        if blocks[0].is_empty() || blocks[1].is_empty() {
            return Err(StrategyError::new(self.name(), "empty code blocks"));
        }
        Ok((blocks[0].clone(), blocks[1].clone()))
    }
}

/// Strategy 2: same pairing, restricted to blocks tagged with the target
/// language. Catches responses where generic detection picks up explanatory
/// snippets.
pub struct TaggedBlockPair;

impl Strategy for TaggedBlockPair {
    fn name(&self) -> &'static str {
        "tagged_block_pair"
    }

    fn extract(
        &self,
        response: &str,
        profile: &LanguageProfile,
    ) -> Result<(String, String), StrategyError> {
        let blocks = tagged_blocks(response, profile);
        if blocks.len() < 2 {
            return Err(StrategyError::new(
                self.name(),
                format!(
                    "expected at least 2 '{}' blocks, found {}",
                    profile.fence_tag,
                    blocks.len()
                ),
            ));
        }
        if blocks[0].is_empty() || blocks[1].is_empty() {
            return Err(StrategyError::new(self.name(), "empty code blocks"));
        }
        Ok((blocks[0].clone(), blocks[1].clone()))
    }
}

/// Strategy 3: split at the first line-anchored test-function marker.
/// Everything before is main code, everything from the marker on is test
/// code; a minimal declaration header is synthesized for whichever half
/// lacks one.
pub struct TestMarkerSplit;

impl Strategy for TestMarkerSplit {
    fn name(&self) -> &'static str {
        "test_marker_split"
    }

    fn extract(
        &self,
        response: &str,
        profile: &LanguageProfile,
    ) -> Result<(String, String), StrategyError> {
        let m = profile
            .test_marker
            .find(response)
            .ok_or_else(|| StrategyError::new(self.name(), "no test-function marker found"))?;

        let main_code = strip_stray_fences(response[..m.start()].trim());
        let test_code = strip_stray_fences(response[m.start()..].trim());

        let main_code = profile.ensure_main_header(&main_code);
        let test_code = profile.ensure_test_header(&test_code);

        if main_code.len() < profile.marker_min_len || test_code.len() < profile.marker_min_len {
            return Err(StrategyError::new(self.name(), "code halves too small"));
        }

        Ok((main_code, test_code))
    }
}

/// Strategy 4: split on repeated top-level declaration keywords (e.g. two
/// `package main` headers in one reply), re-prepending the keyword to each
/// half.
pub struct DeclKeywordSplit;

impl Strategy for DeclKeywordSplit {
    fn name(&self) -> &'static str {
        "decl_keyword_split"
    }

    fn extract(
        &self,
        response: &str,
        profile: &LanguageProfile,
    ) -> Result<(String, String), StrategyError> {
        let keyword = profile.decl_keyword.ok_or_else(|| {
            StrategyError::new(self.name(), "language has no declaration keyword")
        })?;

        let parts: Vec<&str> = response.split(keyword).collect();
        if parts.len() < 3 {
            return Err(StrategyError::new(
                self.name(),
                format!(
                    "expected at least 2 '{}' declarations, found {}",
                    keyword,
                    parts.len().saturating_sub(1)
                ),
            ));
        }

        let main_code = strip_stray_fences(format!("{}{}", keyword, parts[1]).trim());
        let test_code = strip_stray_fences(format!("{}{}", keyword, parts[2]).trim());

        if main_code.len() < profile.split_min_len || test_code.len() < profile.split_min_len {
            return Err(StrategyError::new(self.name(), "code halves too small"));
        }

        Ok((main_code, test_code))
    }
}

/// Strategy 5: last resort inside the chain. First fenced block (or the raw
/// text when long enough) becomes main code with empty test code, splitting
/// on the test marker when the block happens to contain one.
pub struct SingleBlockFallback;

impl Strategy for SingleBlockFallback {
    fn name(&self) -> &'static str {
        "single_block_fallback"
    }

    fn extract(
        &self,
        response: &str,
        profile: &LanguageProfile,
    ) -> Result<(String, String), StrategyError> {
        let blocks = fenced_blocks(response);

        let code = match blocks.first() {
            Some(block) => block.clone(),
            None => {
                let trimmed = response.trim();
                if trimmed.len() > profile.split_min_len {
                    return Ok((trimmed.to_string(), String::new()));
                }
                return Err(StrategyError::new(self.name(), "no code found"));
            }
        };

        if let Some(m) = profile.test_marker.find(&code) {
            let main_code = code[..m.start()].trim().to_string();
            let test_code = profile.ensure_test_header(code[m.start()..].trim());
            return Ok((main_code, test_code));
        }

        Ok((code, String::new()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::language::Language;

    const GO_MAIN: &str = "package main\n\nfunc double(x int) int { return x * 2 }\n\nfunc main() { println(double(2)) }";
    const GO_TEST: &str = "package main\n\nimport \"testing\"\n\nfunc TestDouble(t *testing.T) {\n\tif double(2) != 4 { t.Fail() }\n}";

    fn two_block_response() -> String {
        format!("Here is the code:\n```go\n{GO_MAIN}\n```\nAnd the tests:\n```go\n{GO_TEST}\n```\n")
    }

    #[test]
    fn fenced_pair_extracts_two_blocks() {
        let profile = Language::Go.profile();
        let (main, test) = FencedBlockPair
            .extract(&two_block_response(), &profile)
            .unwrap();
        assert_eq!(main, GO_MAIN);
        assert_eq!(test, GO_TEST);
    }

    #[test]
    fn fenced_pair_rejects_single_block() {
        let profile = Language::Go.profile();
        let response = format!("```go\n{GO_MAIN}\n```");
        assert!(FencedBlockPair.extract(&response, &profile).is_err());
    }

    #[test]
    fn fenced_pair_rejects_empty_blocks() {
        let profile = Language::Go.profile();
        let response = "```go\n\n```\n```go\n\n```";
        assert!(FencedBlockPair.extract(response, &profile).is_err());
    }

    #[test]
    fn tagged_pair_skips_untagged_noise() {
        let profile = Language::Go.profile();
        let response = format!(
            "```\nsome shell noise longer than nothing\n```\n```go\n{GO_MAIN}\n```\n```go\n{GO_TEST}\n```"
        );
        let (main, test) = TaggedBlockPair.extract(&response, &profile).unwrap();
        assert_eq!(main, GO_MAIN);
        assert_eq!(test, GO_TEST);
    }

    #[test]
    fn tagged_pair_requires_language_tag() {
        let profile = Language::Go.profile();
        let response = format!("```python\n{GO_MAIN}\n```\n```python\n{GO_TEST}\n```");
        assert!(TaggedBlockPair.extract(&response, &profile).is_err());
    }

    #[test]
    fn test_marker_split_synthesizes_headers() {
        let profile = Language::Go.profile();
        let response = "func double(x int) int { return x * 2 }\n\nfunc TestDouble(t *testing.T) { _ = double(2) }";
        let (main, test) = TestMarkerSplit.extract(response, &profile).unwrap();
        assert!(main.starts_with("package main\n"));
        assert!(test.starts_with("package main\nimport \"testing\"\n"));
        assert!(test.contains("func TestDouble"));
    }

    #[test]
    fn test_marker_split_rejects_tiny_halves() {
        let profile = Language::Go.profile();
        let response = "x\nfunc TestA(t *testing.T) {}";
        assert!(TestMarkerSplit.extract(response, &profile).is_err());
    }

    #[test]
    fn decl_keyword_split_recovers_two_packages() {
        let profile = Language::Go.profile();
        let response = format!("{GO_MAIN}\n\n{GO_TEST}");
        let (main, test) = DeclKeywordSplit.extract(&response, &profile).unwrap();
        assert!(main.starts_with("package main"));
        assert!(test.starts_with("package main"));
        assert!(test.contains("TestDouble"));
    }

    #[test]
    fn decl_keyword_split_needs_two_occurrences() {
        let profile = Language::Go.profile();
        assert!(DeclKeywordSplit.extract(GO_MAIN, &profile).is_err());
    }

    #[test]
    fn decl_keyword_split_unavailable_for_python() {
        let profile = Language::Python.profile();
        let err = DeclKeywordSplit.extract("anything", &profile).unwrap_err();
        assert!(err.message.contains("no declaration keyword"));
    }

    #[test]
    fn decl_keyword_split_unavailable_for_cpp() {
        // A single C++ program legitimately repeats `#include`, so there is
        // no keyword to split on.
        let profile = Language::Cpp.profile();
        let program = "#include <iostream>\n// prints the container size for the demonstration program\n#include <vector>\n\nint main() { std::vector<int> v{1, 2, 3}; std::cout << v.size(); }";
        let err = DeclKeywordSplit.extract(program, &profile).unwrap_err();
        assert!(err.message.contains("no declaration keyword"));
    }

    #[test]
    fn single_block_uses_first_fence() {
        let profile = Language::Go.profile();
        let response = format!("```go\n{GO_MAIN}\n```");
        let (main, test) = SingleBlockFallback.extract(&response, &profile).unwrap();
        assert_eq!(main, GO_MAIN);
        assert!(test.is_empty());
    }

    #[test]
    fn single_block_splits_embedded_tests() {
        let profile = Language::Go.profile();
        let response = "```go\nfunc double(x int) int { return x * 2 }\n\nfunc TestDouble(t *testing.T) {}\n```";
        let (main, test) = SingleBlockFallback.extract(response, &profile).unwrap();
        assert!(main.contains("func double"));
        assert!(test.contains("func TestDouble"));
    }

    #[test]
    fn single_block_accepts_long_raw_text() {
        let profile = Language::Go.profile();
        let raw = "func double(x int) int { return x * 2 } // no fences anywhere in this reply";
        let (main, test) = SingleBlockFallback.extract(raw, &profile).unwrap();
        assert_eq!(main, raw);
        assert!(test.is_empty());
    }

    #[test]
    fn single_block_rejects_short_raw_text() {
        let profile = Language::Go.profile();
        assert!(SingleBlockFallback.extract("too short", &profile).is_err());
    }

    #[test]
    fn fenced_blocks_handles_crlf_free_text() {
        let blocks = fenced_blocks("```\nalpha\n```\ntext\n```rust\nbeta\n```");
        assert_eq!(blocks, vec!["alpha".to_string(), "beta".to_string()]);
    }
}
