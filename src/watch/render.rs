//! In-place terminal progress rendering.
//!
//! One line per generation step, repainted over the previous frame inside an
//! anchored region. When stdout is not a terminal (or cursor control fails
//! mid-session) rendering degrades to an append-only log bracketed by
//! separators.

use chrono::{DateTime, Utc};
use crossterm::{cursor, queue, terminal};
use std::io::{self, IsTerminal, Write};
use tracing::debug;
use unicode_width::UnicodeWidthChar;

use crate::api::models::{derive_step_state, Snapshot, StepState};

const SPINNER_FRAMES: [&str; 8] = ["→", "↘", "↓", "↙", "←", "↖", "↑", "↗"];
const NO_DURATION: &str = "--";
const FALLBACK_WIDTH: u16 = 120;
const SEPARATOR_WIDTH: usize = 60;

/// The anchored terminal region the progress block occupies.
#[derive(Debug, Clone, Copy)]
struct ProgressArea {
    /// Row of the first progress line.
    row: u16,
    /// Lines currently occupied.
    height: u16,
}

pub struct ProgressRenderer {
    /// None until the first interactive render, and again after a reset.
    area: Option<ProgressArea>,
    spinner_frame: usize,
    interactive: bool,
}

impl Default for ProgressRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressRenderer {
    pub fn new() -> Self {
        Self {
            area: None,
            spinner_frame: 0,
            interactive: io::stdout().is_terminal(),
        }
    }

    /// Repaint the progress block for a snapshot. Never fails: cursor-control
    /// errors switch the renderer to plain mode for the rest of the session.
    pub fn render(&mut self, snapshot: &Snapshot) {
        let lines = self.build_lines(snapshot, Utc::now());

        if self.interactive {
            if let Err(e) = self.render_in_place(&lines) {
                debug!("cursor control unavailable, using plain output: {e}");
                self.interactive = false;
                self.area = None;
                render_plain(&lines);
            }
        } else {
            render_plain(&lines);
        }
    }

    /// Forget the anchor so the next render re-anchors at the then-current
    /// cursor row. Call before printing unrelated output below the block.
    pub fn reset_area(&mut self) {
        self.area = None;
    }

    /// Print the final count/duration banner for a finished run.
    pub fn show_completion_summary(&mut self, snapshot: &Snapshot) {
        let mut completed_steps = 0usize;
        let mut total_secs = 0.0f64;

        for step in &snapshot.all_steps {
            if let StepState::Completed { elapsed_secs } =
                derive_step_state(step, snapshot, Utc::now())
            {
                completed_steps += 1;
                total_secs += elapsed_secs.unwrap_or(0.0);
            }
        }

        if completed_steps == 0 {
            return;
        }

        println!();
        println!("{}", "=".repeat(SEPARATOR_WIDTH));
        println!("✅ Generation completed successfully!");
        println!("   Total steps: {completed_steps}");
        println!("   Total duration: {}", format_duration(total_secs));
        println!("{}", "=".repeat(SEPARATOR_WIDTH));
    }

    /// One display line per step, advancing the spinner one frame per call.
    fn build_lines(&mut self, snapshot: &Snapshot, now: DateTime<Utc>) -> Vec<String> {
        if snapshot.all_steps.is_empty() {
            // The block must never be blank mid-session.
            return vec!["⏳ Waiting for generation steps...".to_string()];
        }

        self.spinner_frame = (self.spinner_frame + 1) % SPINNER_FRAMES.len();
        let spinner = SPINNER_FRAMES[self.spinner_frame];

        snapshot
            .all_steps
            .iter()
            .map(|step| {
                let (status, duration) = match derive_step_state(step, snapshot, now) {
                    StepState::Waiting => ("⏳ Waiting", NO_DURATION.to_string()),
                    StepState::InProgress { .. } => ("🔄 In Progress", spinner.to_string()),
                    StepState::Completed { elapsed_secs } => (
                        "✅ Completed",
                        elapsed_secs
                            .map(format_duration)
                            .unwrap_or_else(|| NO_DURATION.to_string()),
                    ),
                };
                format!("{} - {} [{}]", status, step.description, duration)
            })
            .collect()
    }

    fn render_in_place(&mut self, lines: &[String]) -> io::Result<()> {
        let mut out = io::stdout();

        let mut area = match self.area {
            Some(area) => area,
            None => {
                // Start on a fresh line and anchor at the row just written.
                writeln!(out)?;
                out.flush()?;
                let (_, row) = cursor::position()?;
                ProgressArea {
                    row: row.saturating_sub(1),
                    height: 0,
                }
            }
        };

        let width = buffer_width();

        // Move back to the anchor row, relative to wherever the cursor is.
        let (_, current) = cursor::position()?;
        if current > area.row {
            queue!(out, cursor::MoveUp(current - area.row))?;
        } else if current < area.row {
            queue!(out, cursor::MoveDown(area.row - current))?;
        }

        for line in lines {
            queue!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(terminal::ClearType::CurrentLine)
            )?;
            write!(out, "{}", truncate_to_width(line, width as usize))?;
            writeln!(out)?;
        }

        // Blank out surplus lines from a taller previous frame, then park the
        // cursor just below the last line written this frame.
        let surplus = area.height.saturating_sub(lines.len() as u16);
        for _ in 0..surplus {
            queue!(
                out,
                cursor::MoveToColumn(0),
                terminal::Clear(terminal::ClearType::CurrentLine),
                cursor::MoveDown(1)
            )?;
        }
        if surplus > 0 {
            queue!(out, cursor::MoveUp(surplus))?;
        }
        queue!(out, cursor::MoveToColumn(0))?;
        out.flush()?;

        area.height = lines.len() as u16;
        self.area = Some(area);
        Ok(())
    }
}

fn render_plain(lines: &[String]) {
    println!("{}", "=".repeat(SEPARATOR_WIDTH));
    println!("Generation Progress");
    println!("{}", "=".repeat(SEPARATOR_WIDTH));
    for line in lines {
        println!("{line}");
    }
    println!("{}", "=".repeat(SEPARATOR_WIDTH));
}

fn buffer_width() -> u16 {
    match terminal::size() {
        Ok((width, _)) if width > 0 => width,
        _ => FALLBACK_WIDTH,
    }
}

/// Clip a line to the terminal width, counting display columns rather than
/// bytes so wide glyphs don't wrap and smear the block.
fn truncate_to_width(line: &str, width: usize) -> String {
    let mut used = 0usize;
    let mut out = String::new();
    for c in line.chars() {
        let w = c.width().unwrap_or(0);
        if used + w > width {
            break;
        }
        used += w;
        out.push(c);
    }
    out
}

/// `1h 2m 5s` / `2m 5s` / `45.0s`, `--` for unusable values.
pub fn format_duration(secs: f64) -> String {
    if secs.is_nan() || secs.is_infinite() || secs < 0.0 {
        return NO_DURATION.to_string();
    }

    let whole = secs as u64;
    if whole >= 3600 {
        format!("{}h {}m {}s", whole / 3600, (whole % 3600) / 60, whole % 60)
    } else if whole >= 60 {
        format!("{}m {}s", whole / 60, whole % 60)
    } else {
        format!("{:.1}s", secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(json: &str) -> Snapshot {
        Snapshot::from_value(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_format_duration_magnitudes() {
        assert_eq!(format_duration(45.0), "45.0s");
        assert_eq!(format_duration(125.0), "2m 5s");
        assert_eq!(format_duration(3725.0), "1h 2m 5s");
        assert_eq!(format_duration(12.5), "12.5s");
        assert_eq!(format_duration(-1.0), "--");
        assert_eq!(format_duration(f64::NAN), "--");
    }

    #[test]
    fn test_empty_steps_render_placeholder() {
        let mut renderer = ProgressRenderer::new();
        let lines = renderer.build_lines(&Snapshot::default(), Utc::now());
        assert_eq!(lines, vec!["⏳ Waiting for generation steps...".to_string()]);
    }

    #[test]
    fn test_waiting_line_uses_placeholder_duration() {
        let mut renderer = ProgressRenderer::new();
        let snap = snapshot(r#"{"allSteps":[{"actionId":1,"description":"Build"}]}"#);
        let lines = renderer.build_lines(&snap, Utc::now());
        assert_eq!(lines, vec!["⏳ Waiting - Build [--]".to_string()]);
    }

    #[test]
    fn test_in_progress_line_shows_spinner() {
        let mut renderer = ProgressRenderer::new();
        let start = Utc::now() - chrono::Duration::seconds(5);
        let snap = snapshot(&format!(
            r#"{{"allSteps":[{{"actionId":1,"description":"Build"}}],
                "allActions":[{{"id":1,"isCompleted":false,"startDate":"{}"}}]}}"#,
            start.to_rfc3339()
        ));
        let lines = renderer.build_lines(&snap, Utc::now());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("🔄 In Progress - Build ["));
        let frame = lines[0]
            .trim_end_matches(']')
            .rsplit('[')
            .next()
            .unwrap();
        assert!(SPINNER_FRAMES.contains(&frame), "unexpected frame {frame:?}");
    }

    #[test]
    fn test_completed_line_shows_elapsed() {
        let mut renderer = ProgressRenderer::new();
        let snap = snapshot(
            r#"{"allSteps":[{"actionId":1,"description":"Build"}],
                "allActions":[{"id":1,"isCompleted":true,"elapsedTime":12500}]}"#,
        );
        let lines = renderer.build_lines(&snap, Utc::now());
        assert_eq!(lines, vec!["✅ Completed - Build [12.5s]".to_string()]);
    }

    #[test]
    fn test_rendering_same_snapshot_is_stable() {
        let mut renderer = ProgressRenderer::new();
        let snap = snapshot(
            r#"{"allSteps":[{"actionId":1,"description":"Build"},
                            {"actionId":2,"description":"Deploy"}],
                "allActions":[{"id":1,"isCompleted":true,"elapsedTime":100},
                              {"id":2,"isCompleted":true,"elapsedTime":200}]}"#,
        );
        let now = Utc::now();
        let first = renderer.build_lines(&snap, now);
        let second = renderer.build_lines(&snap, now);
        assert_eq!(first, second);
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_spinner_advances_per_render_call() {
        let mut renderer = ProgressRenderer::new();
        let snap = snapshot(
            r#"{"allSteps":[{"actionId":1,"description":"Build"}],
                "allActions":[{"id":1,"isCompleted":false,"startDate":1714564800000}]}"#,
        );
        let now = Utc::now();
        let first = renderer.build_lines(&snap, now);
        let second = renderer.build_lines(&snap, now);
        assert_ne!(first, second);
    }

    #[test]
    fn test_truncate_counts_display_columns() {
        assert_eq!(truncate_to_width("abcdef", 4), "abcd");
        // Wide CJK glyphs occupy two columns each.
        assert_eq!(truncate_to_width("日本語", 4), "日本");
        assert_eq!(truncate_to_width("short", 80), "short");
    }
}
