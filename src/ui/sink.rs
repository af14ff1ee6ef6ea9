//! Terminal rendering of orchestration events.

use std::collections::HashMap;
use std::io::Write;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use console::Term;
use indicatif::{ProgressBar, ProgressStyle};

use crate::events::{ProgressEvent, ProgressSink};
use crate::runner::StepGraph;
use crate::session::{SessionReport, SessionStatus};
use crate::steps::{StepResult, StepStatus};

use super::{OutputMode, TrailheadTheme};

/// Human-friendly duration: `500ms`, `5.3s`, `1.5m`.
pub fn format_duration(d: Duration) -> String {
    let secs = d.as_secs_f64();
    if secs < 1.0 {
        format!("{}ms", d.as_millis())
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        format!("{:.1}m", secs / 60.0)
    }
}

/// One line describing a terminal step result.
pub fn result_line(title: &str, result: &StepResult) -> String {
    let duration = format_duration(Duration::from_millis(result.duration_ms));
    match result.status {
        StepStatus::Success if result.attempts > 1 => format!(
            "{} ({}, {} attempts)",
            title, duration, result.attempts
        ),
        StepStatus::Success => format!("{} ({})", title, duration),
        StepStatus::Failed => {
            let reason = result
                .error
                .as_ref()
                .map(|e| e.message.as_str())
                .unwrap_or("failed");
            format!("{} - {}", title, reason)
        }
        _ => match result.skip_reason {
            Some(reason) => format!("{} - {}", title, reason),
            None => format!("{} - skipped", title),
        },
    }
}

/// Progress sink that draws an indicatif bar per running step.
pub struct TerminalSink {
    term: Term,
    theme: TrailheadTheme,
    mode: OutputMode,
    titles: HashMap<String, String>,
    current: Mutex<Option<(String, ProgressBar)>>,
}

impl TerminalSink {
    pub fn new(graph: &StepGraph, mode: OutputMode, theme: TrailheadTheme) -> Self {
        let titles = graph
            .steps()
            .iter()
            .map(|s| (s.id.clone(), s.display_title().to_string()))
            .collect();
        Self {
            term: Term::stdout(),
            theme,
            mode,
            titles,
            current: Mutex::new(None),
        }
    }

    fn title<'a>(&'a self, step_id: &'a str) -> &'a str {
        self.titles.get(step_id).map(String::as_str).unwrap_or(step_id)
    }

    fn lock(&self) -> MutexGuard<'_, Option<(String, ProgressBar)>> {
        self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn new_bar(&self, step_id: &str) -> ProgressBar {
        if !self.mode.shows_progress() {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(100);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.magenta} {prefix} [{bar:20.magenta/dim}] {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");
        bar.set_style(style);
        bar.set_prefix(self.title(step_id).to_string());
        bar.enable_steady_tick(Duration::from_millis(80));
        bar
    }
}

impl ProgressSink for TerminalSink {
    fn on_progress(&self, event: &ProgressEvent) -> anyhow::Result<()> {
        let mut current = self.lock();
        if current.as_ref().map(|(id, _)| id.as_str()) != Some(event.step_id.as_str()) {
            if let Some((_, stale)) = current.take() {
                stale.finish_and_clear();
            }
            *current = Some((event.step_id.clone(), self.new_bar(&event.step_id)));
        }
        if let Some((_, bar)) = current.as_ref() {
            bar.set_position(u64::from(event.progress));
            if event.attempt > 1 {
                bar.set_message(format!("(attempt {}) {}", event.attempt, event.message));
            } else {
                bar.set_message(event.message.clone());
            }
            if self.mode.shows_command_output() {
                bar.println(format!("  {}", self.theme.dim.apply_to(&event.message)));
            }
        }
        Ok(())
    }

    fn on_step_completed(&self, result: &StepResult) -> anyhow::Result<()> {
        if let Some((_, bar)) = self.lock().take() {
            bar.finish_and_clear();
        }
        if !self.mode.shows_status() && result.status != StepStatus::Failed {
            return Ok(());
        }

        let line = result_line(self.title(&result.step_id), result);
        let formatted = match result.status {
            StepStatus::Success => self.theme.format_success(&line),
            StepStatus::Failed => self.theme.format_error(&line),
            _ => self.theme.format_skipped(&line),
        };
        writeln!(&self.term, "{}", formatted)?;
        Ok(())
    }

    fn on_session_finished(&self, report: &SessionReport) -> anyhow::Result<()> {
        if let Some((_, bar)) = self.lock().take() {
            bar.finish_and_clear();
        }
        if !self.mode.shows_status() {
            return Ok(());
        }

        let summary = format!(
            "{} succeeded, {} failed, {} skipped in {}",
            report.success,
            report.failed,
            report.skipped,
            format_duration(Duration::from_millis(report.elapsed_ms))
        );
        let line = match report.status {
            SessionStatus::Completed if report.failed == 0 => self.theme.format_success(&summary),
            SessionStatus::Completed => self.theme.format_warning(&summary),
            SessionStatus::Cancelled => {
                self.theme.format_warning(&format!("Cancelled: {}", summary))
            }
            _ => self.theme.format_error(&summary),
        };
        writeln!(&self.term)?;
        writeln!(&self.term, "{}", line)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::steps::{FailureKind, SkipReason, StepDefinition};

    #[test]
    fn format_duration_ranges() {
        assert_eq!(format_duration(Duration::ZERO), "0ms");
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
        assert_eq!(format_duration(Duration::from_secs_f64(5.3)), "5.3s");
        assert_eq!(format_duration(Duration::from_secs(90)), "1.5m");
    }

    #[test]
    fn result_line_variants() {
        let ok = StepResult::success("a", 1, Duration::from_millis(20));
        assert_eq!(result_line("Install", &ok), "Install (20ms)");

        let retried = StepResult::success("a", 3, Duration::from_millis(20));
        assert!(result_line("Install", &retried).ends_with("3 attempts)"));

        let failed =
            StepResult::failure("a", 1, Duration::ZERO, FailureKind::Fatal, "disk full");
        assert_eq!(result_line("Install", &failed), "Install - disk full");

        let skipped = StepResult::skipped("a", SkipReason::DependencyFailed);
        assert_eq!(result_line("Install", &skipped), "Install - dependency failed");
    }

    #[test]
    fn silent_sink_accepts_events() {
        let graph = StepGraph::load(vec![StepDefinition::new("a", 1).titled("Alpha")]).unwrap();
        let sink = TerminalSink::new(&graph, OutputMode::Silent, TrailheadTheme::plain());
        assert_eq!(sink.title("a"), "Alpha");
        assert_eq!(sink.title("zzz"), "zzz");

        let event = ProgressEvent {
            step_id: "a".into(),
            attempt: 1,
            progress: 40,
            message: "working".into(),
        };
        sink.on_progress(&event).unwrap();
        sink.on_step_completed(&StepResult::success("a", 1, Duration::ZERO))
            .unwrap();
        assert!(sink.lock().is_none());
    }
}
