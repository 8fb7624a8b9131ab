//! Compile-and-test backends.
//!
//! A backend takes (main code, test code), runs the language toolchain in a
//! fresh sandbox directory and returns a [`CompilationResult`] — including
//! when the code fails to build. An `Err` from a backend means the
//! invocation machinery itself broke, which the controller treats as fatal,
//! unlike a normal failed result.

mod cpp;
mod golang;
mod python;

use std::process::Stdio;
use std::time::{Duration, Instant};

use tempfile::TempDir;
use thiserror::Error;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::classify::{self, ErrorKind};
use crate::language::Language;

/// Output of one compile-and-test attempt. Immutable after creation.
#[derive(Debug, Clone)]
pub struct CompilationResult {
    pub success: bool,
    pub exit_code: i32,
    pub compile_errors: Vec<String>,
    pub test_errors: Vec<String>,
    /// Raw combined stdout + stderr.
    pub output: String,
    pub error_kind: ErrorKind,
    pub execution_time: Duration,
}

impl CompilationResult {
    pub fn passed(output: String, execution_time: Duration) -> Self {
        Self {
            success: true,
            exit_code: 0,
            compile_errors: Vec::new(),
            test_errors: Vec::new(),
            output,
            error_kind: ErrorKind::Success,
            execution_time,
        }
    }

    /// An attempt the environment broke, not the generated code.
    pub fn infrastructure(message: impl Into<String>, execution_time: Duration) -> Self {
        let message = message.into();
        Self {
            success: false,
            exit_code: -1,
            compile_errors: vec![message.clone()],
            test_errors: Vec::new(),
            output: message,
            error_kind: ErrorKind::Infrastructure,
            execution_time,
        }
    }

    /// Diagnostic summary suitable for prompt feedback.
    pub fn feedback_message(&self) -> String {
        if !self.compile_errors.is_empty() {
            self.compile_errors.join("; ")
        } else if !self.test_errors.is_empty() {
            self.test_errors.join("; ")
        } else {
            self.output.clone()
        }
    }
}

/// The backend invocation itself failed (as opposed to the code under test
/// failing to compile).
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("failed to invoke toolchain: {0}")]
    Io(#[from] std::io::Error),
}

/// A pluggable per-language compile backend. Mirrors the model-client seam:
/// plain async trait methods, mocked by value in tests.
pub trait CompileBackend {
    async fn compile(
        &self,
        cancel: &CancellationToken,
        main_code: &str,
        test_code: &str,
    ) -> Result<CompilationResult, BackendError>;
}

/// What a language module wants executed inside the sandbox.
struct SandboxPlan {
    files: Vec<(&'static str, String)>,
    script: String,
    main_file: &'static str,
}

/// The real backend: dispatches on language and drives the toolchain as a
/// subprocess.
pub struct ToolchainBackend {
    language: Language,
    attempt_timeout: Duration,
}

impl ToolchainBackend {
    pub fn new(language: Language, attempt_timeout: Duration) -> Self {
        Self {
            language,
            attempt_timeout,
        }
    }
}

impl CompileBackend for ToolchainBackend {
    async fn compile(
        &self,
        cancel: &CancellationToken,
        main_code: &str,
        test_code: &str,
    ) -> Result<CompilationResult, BackendError> {
        let plan = match self.language {
            Language::Go => golang::plan(main_code, test_code),
            Language::Python => python::plan(main_code, test_code),
            Language::Cpp => cpp::plan(main_code, test_code),
        };
        run_sandbox(plan, cancel, self.attempt_timeout).await
    }
}

/// Write the plan's files into a fresh temp directory and run its script,
/// bounded by the attempt timeout and the cancellation token. Timeout and
/// cancellation score as infrastructure results; only a spawn failure is an
/// `Err`.
async fn run_sandbox(
    plan: SandboxPlan,
    cancel: &CancellationToken,
    timeout: Duration,
) -> Result<CompilationResult, BackendError> {
    let start = Instant::now();

    let dir = match TempDir::new() {
        Ok(dir) => dir,
        Err(err) => {
            return Ok(CompilationResult::infrastructure(
                format!("failed to create sandbox directory: {err}"),
                start.elapsed(),
            ));
        }
    };

    for (name, content) in &plan.files {
        if let Err(err) = tokio::fs::write(dir.path().join(name), content).await {
            return Ok(CompilationResult::infrastructure(
                format!("failed to write {name}: {err}"),
                start.elapsed(),
            ));
        }
    }

    let mut cmd = Command::new("bash");
    cmd.arg("-c")
        .arg(&plan.script)
        .current_dir(dir.path())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        // Dropping the future must not leave a toolchain process behind.
        .kill_on_drop(true);

    debug!(script = %plan.script, dir = %dir.path().display(), "running toolchain");

    let output = tokio::select! {
        _ = cancel.cancelled() => {
            return Ok(CompilationResult::infrastructure(
                "compile attempt cancelled",
                start.elapsed(),
            ));
        }
        _ = tokio::time::sleep(timeout) => {
            return Ok(CompilationResult::infrastructure(
                "compile attempt timeout",
                start.elapsed(),
            ));
        }
        result = cmd.output() => result?,
    };

    let mut raw = String::from_utf8_lossy(&output.stdout).into_owned();
    raw.push('\n');
    raw.push_str(&String::from_utf8_lossy(&output.stderr));

    let execution_time = start.elapsed();

    if output.status.success() {
        return Ok(CompilationResult::passed(raw, execution_time));
    }

    let (compile_errors, test_errors) = classify::split_diagnostics(&raw, plan.main_file);
    let error_kind = classify::classify(&raw, &compile_errors, &test_errors);

    Ok(CompilationResult {
        success: false,
        exit_code: output.status.code().unwrap_or(1),
        compile_errors,
        test_errors,
        output: raw,
        error_kind,
        execution_time,
    })
}
