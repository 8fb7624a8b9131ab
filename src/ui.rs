//! Terminal output: a spinner while the job iterates and colored result
//! lines as events arrive.
//!
//! Uses `indicatif` for the spinner and `console` for styling. The
//! [`JobRenderer`] consumes the engine's event stream; it never touches
//! job state itself.

use console::Style;
use indicatif::{ProgressBar, ProgressStyle};

use crate::engine::{AbortEvent, CompletionEvent, IterationEvent, JobEvent};

/// Visual progress for one job in the terminal.
pub struct JobRenderer {
    pb: ProgressBar,
    green: Style,
    red: Style,
    yellow: Style,
    /// When set, print the extracted code of every iteration, not just the
    /// final one.
    verbose: bool,
}

impl JobRenderer {
    /// Start the spinner with the task description.
    pub fn start(task: &str, verbose: bool) -> Self {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} {msg}")
                .expect("invalid template"),
        );
        pb.set_message(format!("iteration 1: {task}"));
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        Self {
            pb,
            green: Style::new().green().bold(),
            red: Style::new().red().bold(),
            yellow: Style::new().yellow(),
            verbose,
        }
    }

    /// Route one event to the terminal.
    pub fn render(&self, event: &JobEvent) {
        match event {
            JobEvent::Iteration(it) => self.iteration(it),
            JobEvent::Completion(done) => self.completion(done),
            JobEvent::Abort(abort) => self.abort(abort),
        }
    }

    fn iteration(&self, it: &IterationEvent) {
        if it.compiled_successfully {
            self.pb.println(format!(
                "  {} iteration {}: build and tests passed ({}s elapsed)",
                self.green.apply_to("✓"),
                it.iteration,
                it.elapsed_seconds
            ));
        } else {
            self.pb.println(format!(
                "  {} iteration {}: {} error",
                self.yellow.apply_to("↻"),
                it.iteration,
                it.error_type
            ));
        }
        if self.verbose {
            self.pb.println(format!(
                "    prompt {} bytes, model replied in {} ms",
                it.prompt_size, it.llm_response_time
            ));
            if !it.compiler_output.trim().is_empty() {
                self.pb.println(indent(&it.compiler_output, "    "));
            }
        }
        self.pb
            .set_message(format!("iteration {}", it.iteration + 1));
    }

    fn completion(&self, done: &CompletionEvent) {
        self.pb.finish_and_clear();
        println!(
            "  {} Job completed in {} iteration(s), {}",
            self.green.apply_to("✓"),
            done.total_iterations,
            done.total_time
        );
        println!();
        println!("{}", self.green.apply_to("─── Code ───"));
        println!("{}", done.code);
        if !done.tests.trim().is_empty() {
            println!("{}", self.green.apply_to("─── Tests ───"));
            println!("{}", done.tests);
        }
    }

    fn abort(&self, abort: &AbortEvent) {
        self.pb.finish_and_clear();
        println!(
            "  {} Job aborted at iteration {}: {} ({})",
            self.red.apply_to("✗"),
            abort.iteration,
            abort.reason,
            abort.last_error
        );
    }
}

fn indent(text: &str, prefix: &str) -> String {
    text.lines()
        .map(|line| format!("{prefix}{line}"))
        .collect::<Vec<_>>()
        .join("\n")
}
