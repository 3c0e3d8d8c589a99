//! Output formatting for command results
//!
//! Every command renders either as pretty JSON (for scripts and clients) or as
//! human-readable text.
//!
//! # Example
//!
//! ```ignore
//! use cyclops::cli::output::{OutputFormat, OutputFormatter};
//!
//! let formatter = OutputFormatter::new(OutputFormat::Human);
//! println!("{}", formatter.format_lesson(&lesson)?);
//! ```

use anyhow::{Context, Result};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt::Write;

use crate::config::CyclopsConfig;
use crate::lessons::{FeedbackResponse, Lesson};
use crate::overlay::OverlayElement;
use crate::procedure::{ExtractionReport, Procedure};
use crate::verification::{VerificationOutcome, VerificationStatus};

const RULE: &str = "\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}\u{2501}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Pretty-printed JSON
    Json,
    /// Formatted text for terminals
    Human,
}

/// Result of probing one backend
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub available: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl HealthStatus {
    pub fn available(message: String) -> Self {
        Self {
            available: true,
            message,
            details: None,
        }
    }

    pub fn unavailable(message: String) -> Self {
        Self {
            available: false,
            message,
            details: None,
        }
    }

    pub fn with_details(mut self, details: String) -> Self {
        self.details = Some(details);
        self
    }
}

pub struct OutputFormatter {
    format: OutputFormat,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    fn json<T: Serialize + ?Sized>(&self, value: &T, what: &str) -> Result<String> {
        serde_json::to_string_pretty(value).with_context(|| format!("Failed to serialize {} to JSON", what))
    }

    pub fn format_report(&self, report: &ExtractionReport) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(report, "extraction report"),
            OutputFormat::Human => {
                let mut out = String::new();
                let header = if report.parse_quality == "complete" {
                    "\u{2713} Extracted Procedure"
                } else {
                    "\u{26A0} Extracted Procedure (Degraded)"
                };
                writeln!(out, "{}\n{}\n", header, RULE)?;
                writeln!(out, "Video:        {:.1}s, {} frames sent", report.video_duration, report.frames_sent)?;
                writeln!(out, "Parse:        {}", report.parse_quality)?;
                writeln!(out, "Clips:        {}", report.clips_extracted)?;
                writeln!(out, "Audio:        {}\n", report.audio_generated)?;
                write_steps(&mut out, &report.procedure)?;
                writeln!(out, "\nProcessed in {}ms", report.elapsed.as_millis())?;
                Ok(out)
            }
        }
    }

    pub fn format_lesson(&self, lesson: &Lesson) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(lesson, "lesson"),
            OutputFormat::Human => {
                let mut out = String::new();
                writeln!(out, "{}\n{}\n", lesson.title, RULE)?;
                writeln!(out, "ID:       {}", lesson.id)?;
                writeln!(out, "Status:   {}", lesson.status)?;
                writeln!(out, "Video:    {}", lesson.demo_video_url)?;
                writeln!(out, "Created:  {}", lesson.created_at.format("%Y-%m-%d %H:%M:%S UTC"))?;
                if let Some(reason) = &lesson.failure_reason {
                    writeln!(out, "Failure:  {}", reason)?;
                }
                if let Some(procedure) = lesson.procedure() {
                    out.push('\n');
                    write_steps(&mut out, procedure)?;
                }
                Ok(out)
            }
        }
    }

    pub fn format_lessons(&self, lessons: &[Lesson]) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(lessons, "lessons"),
            OutputFormat::Human => {
                if lessons.is_empty() {
                    return Ok("No lessons yet\n".to_string());
                }
                let mut out = String::new();
                for lesson in lessons {
                    let steps = lesson.procedure().map(|p| p.total_steps).unwrap_or(0);
                    writeln!(
                        out,
                        "{}  {:<10}  {:>2} steps  {}",
                        lesson.id, lesson.status, steps, lesson.title
                    )?;
                }
                Ok(out)
            }
        }
    }

    pub fn format_verification(&self, outcome: &VerificationOutcome) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(outcome, "verification result"),
            OutputFormat::Human => {
                let symbol = match outcome.status {
                    VerificationStatus::Complete => "\u{2713}",
                    VerificationStatus::Mistake => "\u{2717}",
                    VerificationStatus::InProgress => "\u{2026}",
                };
                let mut out = format!(
                    "{} {} ({:.0}%): {}\n",
                    symbol,
                    outcome.status,
                    outcome.confidence * 100.0,
                    outcome.reason
                );
                if let Some(suggestion) = &outcome.suggestion {
                    writeln!(out, "  Suggestion: {}", suggestion)?;
                }
                Ok(out)
            }
        }
    }

    pub fn format_feedback(&self, response: &FeedbackResponse) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(response, "feedback response"),
            OutputFormat::Human => {
                let mut out = String::new();
                writeln!(out, "{}", response.message)?;
                if let Some(overlay) = &response.overlay {
                    writeln!(out, "Say: \"{}\"", overlay.audio_text)?;
                    writeln!(out, "Show for {:.1}s:", overlay.duration_seconds)?;
                    for element in &overlay.elements {
                        writeln!(out, "  - {}", describe_element(element))?;
                    }
                }
                Ok(out)
            }
        }
    }

    pub fn format_config(&self, config: &CyclopsConfig) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let map: BTreeMap<_, _> = config.to_display_map().into_iter().collect();
                self.json(&map, "config")
            }
            OutputFormat::Human => Ok(config.to_string()),
        }
    }

    pub fn format_health(&self, results: &BTreeMap<String, HealthStatus>) -> Result<String> {
        match self.format {
            OutputFormat::Json => self.json(results, "health status"),
            OutputFormat::Human => {
                let mut out = String::new();
                writeln!(out, "Backend Health Status\n{}\n", RULE)?;
                for (name, status) in results {
                    let symbol = if status.available { "\u{2713}" } else { "\u{2717}" };
                    writeln!(out, "{} {}", symbol, name)?;
                    writeln!(
                        out,
                        "  Status: {}",
                        if status.available { "Available" } else { "Unavailable" }
                    )?;
                    writeln!(out, "  Message: {}", status.message)?;
                    if let Some(details) = &status.details {
                        writeln!(out, "  Details: {}", details)?;
                    }
                    out.push('\n');
                }
                Ok(out)
            }
        }
    }
}

fn write_steps(out: &mut String, procedure: &Procedure) -> std::fmt::Result {
    writeln!(out, "Steps ({}):", procedure.total_steps)?;
    for (i, step) in procedure.steps.iter().enumerate() {
        let connector = if i + 1 == procedure.steps.len() {
            "\u{2514}\u{2500}"
        } else {
            "\u{251C}\u{2500}"
        };
        writeln!(
            out,
            "{} {:>2}. [{:>6.1}s - {:>6.1}s] {}",
            connector, step.step_id, step.start_time, step.end_time, step.title
        )?;
    }
    Ok(())
}

fn describe_element(element: &OverlayElement) -> String {
    match element {
        OverlayElement::Circle(c) => format!(
            "circle at ({:.2}, {:.2}) r={:.2} {}",
            c.center[0], c.center[1], c.radius, c.color
        ),
        OverlayElement::Arrow(a) => format!(
            "arrow ({:.2}, {:.2}) -> ({:.2}, {:.2}) {}",
            a.from[0], a.from[1], a.to[0], a.to[1], a.color
        ),
        OverlayElement::Label(l) => format!(
            "label \"{}\" at ({:.2}, {:.2})",
            l.text, l.position[0], l.position[1]
        ),
        OverlayElement::Rectangle(r) => format!(
            "rectangle at ({:.2}, {:.2}) size {:.2}x{:.2} {}",
            r.origin[0], r.origin[1], r.size[0], r.size[1], r.color
        ),
    }
}
