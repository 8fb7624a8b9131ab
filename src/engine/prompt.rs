//! Prompt composition: original task + per-language format directive +
//! truncated feedback from the previous failure.

use crate::classify::ErrorKind;
use crate::language::Language;

const GO_FORMAT_DIRECTIVE: &str = "
IMPORTANT: Generate Go code in this exact format:
- Two code blocks separated by a blank line
- First block: package main with main() function and helper functions
- Second block: package main with import \"testing\" and Test* functions
- Use ONLY \"package main\" in both blocks
- Provide code only, no explanations
";

const PYTHON_FORMAT_DIRECTIVE: &str = "
IMPORTANT: Generate Python code in this exact format:
- Two code blocks separated by a blank line
- First block: main code with functions and main() execution
- Second block: import unittest and test functions
- Provide code only, no explanations
";

const CPP_FORMAT_DIRECTIVE: &str = "
IMPORTANT: Generate C++ code in this exact format:
- Two code blocks separated by a blank line
- First block: main.cpp with function implementations and main()
- Second block: test functions using assert
- Include necessary #include statements
- Provide code only, no explanations
";

fn format_directive(language: Language) -> &'static str {
    match language {
        Language::Go => GO_FORMAT_DIRECTIVE,
        Language::Python => PYTHON_FORMAT_DIRECTIVE,
        Language::Cpp => CPP_FORMAT_DIRECTIVE,
    }
}

/// Composes the next prompt and measures its byte size for the size guard.
pub struct PromptBuilder {
    feedback_char_budget: usize,
}

impl PromptBuilder {
    pub fn new(feedback_char_budget: usize) -> Self {
        Self {
            feedback_char_budget,
        }
    }

    /// Build the prompt for one iteration. `last_error` carries the
    /// previous iteration's classified kind and diagnostic message; it is
    /// only rendered from the second iteration onward.
    pub fn build(
        &self,
        task: &str,
        language: Language,
        iteration: u32,
        last_error: Option<(ErrorKind, &str)>,
    ) -> (String, usize) {
        let mut prompt = String::with_capacity(task.len() + 512);
        prompt.push_str(task);
        prompt.push_str(format_directive(language));

        if iteration > 1
            && let Some((kind, message)) = last_error
        {
            prompt.push_str(&format!(
                "\n\n=== ERROR FEEDBACK FROM ITERATION {} ===\n",
                iteration - 1
            ));
            prompt.push_str(&format!("Error Type: {kind}\n"));
            prompt.push_str(&format!(
                "Error Message: {}\n",
                truncate_chars(message, self.feedback_char_budget)
            ));
            prompt.push_str("Please fix the error and regenerate the code.\n");
        }

        let size = prompt.len();
        (prompt, size)
    }
}

/// Truncate to a character budget, marking the cut. Char-based so a
/// multi-byte diagnostic never splits mid-codepoint.
fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let truncated: String = s.chars().take(max_chars).collect();
    format!("{truncated}...")
}
