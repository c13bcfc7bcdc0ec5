//! Shared terminal rendering.
//! Used by `advisor ask`, `advisor session` and `advisor status`.

use crate::playback::timeline::Timeline;
use crate::service::types::{DiagnosisResult, ManualRegistryStatus, SlideImage};
use crate::session::notice::SessionNotice;
use std::fmt::Write as _;
use std::io::{self, Write};

const DIM: &str = "\x1b[2m";
const BOLD: &str = "\x1b[1m";
const GREEN: &str = "\x1b[32m";
const YELLOW: &str = "\x1b[33m";
const RED: &str = "\x1b[31m";
const CYAN: &str = "\x1b[36m";
const RESET: &str = "\x1b[0m";

const BAR_WIDTH: usize = 24;

/// Clear the current terminal line (replaces the playback line etc.)
pub fn clear_line() {
    eprint!("\r\x1b[2K");
}

/// Whether a notice is shown at this verbosity.
pub fn should_render(notice: &SessionNotice, quiet: bool, verbosity: u8) -> bool {
    if quiet {
        return matches!(notice, SessionNotice::DiagnosisFailed { .. });
    }
    notice.min_verbosity() <= verbosity
}

/// At this `-v` count notices are written as JSON lines instead of text.
pub const JSON_NOTICE_VERBOSITY: u8 = 3;

/// One notice as a single JSON line.
pub fn format_notice_json(notice: &SessionNotice) -> String {
    serde_json::to_string(notice).unwrap_or_else(|e| {
        serde_json::json!({ "type": "unserializable", "error": e.to_string() }).to_string()
    })
}

/// Render a session notice to stderr.
pub fn render_notice(notice: &SessionNotice) {
    clear_line();
    match notice {
        SessionNotice::Transition { from, to, cycle } => {
            let cycle = cycle.map(|c| format!(" #{c}")).unwrap_or_default();
            eprintln!("{DIM}{from} → {to}{cycle}{RESET}");
        }
        SessionNotice::DiagnosisRequested {
            cycle,
            query,
            persona,
        } => {
            eprintln!("{DIM}#{cycle} asking ({persona}): {query}{RESET}");
        }
        SessionNotice::DiagnosisReady {
            cycle,
            causes,
            confidence,
            pages,
        } => {
            eprintln!(
                "{DIM}#{cycle} diagnosis: {causes} cause(s), {:.0}% confidence, pages {}{RESET}",
                confidence * 100.0,
                format_pages(pages)
            );
        }
        SessionNotice::DiagnosisFailed { message, kind, .. } => {
            eprintln!("{RED}{message}{RESET} {DIM}({kind}){RESET}");
        }
        SessionNotice::VideoRequested { cycle } => {
            eprintln!("{DIM}#{cycle} generating video…{RESET}");
        }
        SessionNotice::VideoReady { slides, .. } => {
            eprintln!("{GREEN}Video ready{RESET} {DIM}({slides} slides, :play to start){RESET}");
        }
        SessionNotice::VideoFailed { message, .. } => {
            eprintln!("{YELLOW}Video unavailable{RESET} {DIM}({message}){RESET}");
        }
        SessionNotice::Rejected { reason, .. } => {
            eprintln!("{YELLOW}Not now: {reason}{RESET}");
        }
        SessionNotice::Discarded { event, cycle } => {
            let cycle = cycle.map(|c| format!(" for #{c}")).unwrap_or_default();
            eprintln!("{DIM}[stale] dropped {event}{cycle}{RESET}");
        }
        SessionNotice::CaptureFailed { message, .. } => {
            eprintln!("{YELLOW}{message}{RESET}");
        }
    }
}

fn format_pages(pages: &[u32]) -> String {
    if pages.is_empty() {
        return "none".to_string();
    }
    pages
        .iter()
        .map(u32::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

fn push_list(out: &mut String, title: &str, items: &[String], numbered: bool) {
    if items.is_empty() {
        return;
    }
    writeln!(out, "{BOLD}{title}{RESET}").ok();
    for (i, item) in items.iter().enumerate() {
        if numbered {
            writeln!(out, "  {}. {item}", i + 1).ok();
        } else {
            writeln!(out, "  • {item}").ok();
        }
    }
}

/// Multi-line diagnosis card.
pub fn format_diagnosis(result: &DiagnosisResult) -> String {
    let mut out = String::new();
    let confidence = (result.confidence * 100.0).round();
    let color = if result.confidence >= 0.7 {
        GREEN
    } else if result.confidence >= 0.4 {
        YELLOW
    } else {
        RED
    };
    writeln!(out, "{BOLD}Diagnosis{RESET} {color}{confidence:.0}% confidence{RESET}").ok();

    push_list(&mut out, "Probable causes", &result.probable_causes, false);
    push_list(&mut out, "Steps", &result.steps, true);
    push_list(&mut out, "Cautions", &result.cautions, false);

    let source = result
        .source_file
        .as_deref()
        .map(|s| format!(" ({s})"))
        .unwrap_or_default();
    writeln!(
        out,
        "{DIM}Manual pages: {}{source}{RESET}",
        format_pages(&result.referenced_pages)
    )
    .ok();
    if let Some(page) = &result.visual_page {
        writeln!(
            out,
            "{DIM}Page image attached ({}, {} bytes; save with --save-page or :page){RESET}",
            page.mime,
            page.bytes.len()
        )
        .ok();
    }
    if !result.disclaimer.is_empty() {
        writeln!(out, "{DIM}{}{RESET}", result.disclaimer).ok();
    }
    out
}

/// `m:ss` clock.
pub fn format_clock(seconds: f64) -> String {
    let total = if seconds.is_finite() {
        seconds.max(0.0).floor() as u64
    } else {
        0
    };
    format!("{}:{:02}", total / 60, total % 60)
}

/// Fixed-width progress bar for a fraction in `[0, 1]`.
pub fn format_progress_bar(fraction: f64, width: usize) -> String {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (fraction * width as f64).round() as usize;
    format!("{}{}", "█".repeat(filled), "░".repeat(width - filled))
}

/// One-line playback status: slide, caption, bar and clock.
pub fn format_playback_line(timeline: &Timeline) -> String {
    let position = timeline.position();
    let slide = timeline.current_slide();
    let state = if position.is_playing { "▶" } else { "⏸" };
    let image = match &slide.image {
        Some(SlideImage::Inline(_)) => " [image]",
        Some(SlideImage::Remote(_)) => " [link]",
        None => "",
    };
    format!(
        "{state} {CYAN}[{}/{}]{RESET} {}{image} {DIM}{} {} / {}{RESET}",
        timeline.current_index() + 1,
        timeline.slides().len(),
        slide.caption,
        format_progress_bar(timeline.progress(), BAR_WIDTH),
        format_clock(position.elapsed_seconds),
        format_clock(position.total_seconds),
    )
}

/// Redraw the playback line in place.
pub fn render_playback(timeline: &Timeline) {
    eprint!("\r\x1b[2K{}", format_playback_line(timeline));
    io::stderr().flush().ok();
}

/// Manual registry summary.
pub fn format_status(status: &ManualRegistryStatus) -> String {
    let mut out = String::new();
    let loaded = if status.is_context_loaded {
        format!("{GREEN}loaded{RESET}")
    } else {
        format!("{YELLOW}not loaded{RESET}")
    };
    writeln!(
        out,
        "Manual context: {loaded} {DIM}({} chars){RESET}",
        status.context_length
    )
    .ok();
    if let Some(cached) = status.is_cached {
        writeln!(out, "{DIM}Cached: {}{RESET}", if cached { "yes" } else { "no" }).ok();
    }
    if status.manuals.is_empty() {
        writeln!(out, "No manuals uploaded").ok();
    } else {
        writeln!(out, "Manuals:").ok();
        for manual in &status.manuals {
            writeln!(out, "  • {manual}").ok();
        }
    }
    out
}
