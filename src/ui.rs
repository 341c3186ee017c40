// UI module for consistent terminal output with progress bars and styling
//
// Spinners and byte bars go to stderr; results go to stdout.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use console::{Term, style};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use svforge::Reporter;

const SPINNER_CHARS: &str = "⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏";

static PROGRESS_ENABLED: AtomicBool = AtomicBool::new(true);

/// Apply the `ui` settings section.
pub fn configure(color: bool, progress: bool) {
    console::set_colors_enabled(color);
    console::set_colors_enabled_stderr(color);
    PROGRESS_ENABLED.store(progress, Ordering::Relaxed);
}

/// Animated output only on an interactive stderr with progress enabled
fn is_interactive() -> bool {
    PROGRESS_ENABLED.load(Ordering::Relaxed) && Term::stderr().is_term()
}

fn template(template: &str, fallback: fn() -> ProgressStyle) -> ProgressStyle {
    ProgressStyle::with_template(template).unwrap_or_else(|_| fallback())
}

fn hide_unless_interactive(pb: &ProgressBar) {
    if !is_interactive() {
        pb.set_draw_target(ProgressDrawTarget::hidden());
    }
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    hide_unless_interactive(&pb);
    pb.set_style(
        template("{spinner:.cyan} {msg}", ProgressStyle::default_spinner).tick_chars(SPINNER_CHARS),
    );
    pb.set_message(message.to_string());
    if is_interactive() {
        pb.enable_steady_tick(Duration::from_millis(80));
    }
    pb
}

pub fn download_bar(total_size: u64) -> ProgressBar {
    let pb = ProgressBar::new(total_size);
    hide_unless_interactive(&pb);
    pb.set_style(
        template(
            "{spinner:.cyan} {msg} [{bar:25.cyan/dim}] {bytes}/{total_bytes} ({bytes_per_sec})",
            ProgressStyle::default_bar,
        )
        .tick_chars(SPINNER_CHARS)
        .progress_chars("━━╺"),
    );
    pb
}

/// Byte counter for transfers without a known size
pub fn download_bar_indeterminate() -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    hide_unless_interactive(&pb);
    pb.set_style(
        template(
            "{spinner:.cyan} {msg} {bytes} ({bytes_per_sec})",
            ProgressStyle::default_spinner,
        )
        .tick_chars(SPINNER_CHARS),
    );
    if is_interactive() {
        pb.enable_steady_tick(Duration::from_millis(80));
    }
    pb
}

pub fn success(message: &str) {
    println!("{} {}", style("✓").green(), message);
}

pub fn action(message: &str) {
    println!("{} {}", style("→").cyan(), message);
}

pub fn warning(message: &str) {
    eprintln!("{} {}", style("⚠").yellow(), message);
}

pub fn error(message: &str) {
    eprintln!("{} {}", style("✗").red(), message);
}

pub fn header(message: &str) {
    println!("{}", style(message).bold());
}

pub fn dim(message: &str) {
    println!("{}", style(message).dim());
}

/// Print a labelled value, e.g. `  Directory  /srv/paper-1.21.8`
pub fn status(prefix: &str, message: &str) {
    println!("  {} {}", style(format!("{:<10}", prefix)).cyan().bold(), message);
}

fn finish_with(pb: &ProgressBar, msg: String, to_stderr: bool) {
    if is_interactive() {
        pb.set_style(template("{msg}", ProgressStyle::default_spinner));
        pb.finish_with_message(msg);
    } else {
        pb.finish_and_clear();
        if to_stderr {
            eprintln!("{}", msg);
        } else {
            println!("{}", msg);
        }
    }
}

pub fn finish_spinner_success(pb: &ProgressBar, message: &str) {
    finish_with(pb, format!("{} {}", style("✓").green(), message), false);
}

pub fn finish_spinner_error(pb: &ProgressBar, message: &str) {
    finish_with(pb, format!("{} {}", style("✗").red(), message), true);
}

pub fn finish_download_success(pb: &ProgressBar, name: &str) {
    finish_with(
        pb,
        format!("{} {} {}", style("✓").green(), name, style("downloaded").dim()),
        false,
    );
}

/// Renders pipeline progress: one spinner per step, one bar per transfer.
#[derive(Default)]
pub struct TerminalReporter {
    step: Mutex<Option<(String, ProgressBar)>>,
    download: Mutex<Option<ProgressBar>>,
}

impl TerminalReporter {
    fn finish_step(&self) {
        let mut step = self.step.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((message, pb)) = step.take() {
            finish_spinner_success(&pb, &message);
        }
    }

    /// Mark the running step failed and drop any open bar.
    pub fn fail(&self) {
        if let Some(pb) = self.download.lock().unwrap_or_else(|p| p.into_inner()).take() {
            pb.finish_and_clear();
        }
        let mut step = self.step.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((message, pb)) = step.take() {
            finish_spinner_error(&pb, &message);
        }
    }

    pub fn finish(&self) {
        self.finish_step();
    }
}

impl Reporter for TerminalReporter {
    fn step(&self, message: &str) {
        self.finish_step();
        let pb = spinner(message);
        *self.step.lock().unwrap_or_else(|p| p.into_inner()) = Some((message.to_string(), pb));
    }

    fn download_started(&self, label: &str, total: Option<u64>) {
        let pb = match total {
            Some(total) => download_bar(total),
            None => download_bar_indeterminate(),
        };
        pb.set_message(label.to_string());
        *self.download.lock().unwrap_or_else(|p| p.into_inner()) = Some(pb);
    }

    fn download_progress(&self, bytes: u64) {
        if let Some(pb) = self.download.lock().unwrap_or_else(|p| p.into_inner()).as_ref() {
            pb.set_position(bytes);
        }
    }

    fn download_finished(&self, label: &str) {
        if let Some(pb) = self.download.lock().unwrap_or_else(|p| p.into_inner()).take() {
            finish_download_success(&pb, label);
        }
    }

    fn process_line(&self, line: &str) {
        let step = self.step.lock().unwrap_or_else(|p| p.into_inner());
        if let Some((message, pb)) = step.as_ref() {
            let line: String = line.trim().chars().take(60).collect();
            pb.set_message(format!("{} {}", message, style(line).dim()));
        }
    }
}
