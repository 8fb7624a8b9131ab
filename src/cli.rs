//! Command-line interface based on clap.
//!
//! Defines the [`Cli`] struct with subcommands [`Command`] (run, languages)
//! and global flags (--model, --max-iterations, --timeout-secs, --verbose).

use clap::{Parser, Subcommand, ValueEnum};

use crate::language::Language;

/// crucible — self-healing code generation against a local model.
#[derive(Debug, Parser)]
#[command(name = "crucible", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Model to use for this session (defaults to the configured one).
    #[arg(long, global = true)]
    pub model: Option<String>,

    /// Maximum number of generate-compile iterations per job.
    #[arg(long, global = true)]
    pub max_iterations: Option<u32>,

    /// Wall-clock budget for one job, in seconds.
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,

    /// Enable detailed output.
    #[arg(long, short, global = true, default_value_t = false)]
    pub verbose: bool,
}

/// Target language accepted on the command line, mapped to
/// [`Language`] internally.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum LanguageArg {
    /// Go, validated with `go build` and `go test`.
    Go,
    /// Python, validated with `py_compile` and `unittest`.
    Python,
    /// C++, validated with `g++` and assert-based tests.
    Cpp,
}

impl From<LanguageArg> for Language {
    fn from(arg: LanguageArg) -> Self {
        match arg {
            LanguageArg::Go => Language::Go,
            LanguageArg::Python => Language::Python,
            LanguageArg::Cpp => Language::Cpp,
        }
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one task through the iterative generation loop.
    Run {
        /// What the generated program should do.
        task: String,

        /// Target language for the generated code.
        #[arg(long, value_enum, default_value_t = LanguageArg::Go)]
        language: LanguageArg,
    },

    /// List the supported target languages.
    Languages,
}
