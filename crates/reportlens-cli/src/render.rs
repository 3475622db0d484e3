//! Plain-text rendering for the terminal.

use std::fmt::Write as _;

use reportlens_contracts::chat::{ChatRole, ChatTurn};
use reportlens_contracts::identity::Principal;
use reportlens_contracts::report::{AnalysisResult, ParameterReading, TextBlocks};

pub fn render_report(report: &AnalysisResult) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "== {} ==", report.report_title);
    let _ = writeln!(out, "File: {}  |  Generated: {}", report.filename, report.created_at);
    let _ = writeln!(
        out,
        "Risk score: {}/10 ({})",
        format_number(report.risk_score),
        report.risk_band().as_str()
    );
    push_blocks(&mut out, "Risk rationale", &report.risk_rationale);

    if !report.detected_patterns.is_empty() {
        let _ = writeln!(out, "\nDetected patterns:");
        for pattern in &report.detected_patterns {
            let _ = writeln!(out, "  - {pattern}");
        }
    }

    if !report.parameter_interpretation.is_empty() {
        let _ = writeln!(out, "\nParameters:");
        for (name, reading) in &report.parameter_interpretation {
            let _ = writeln!(out, "  {}", render_parameter(name, reading));
        }
        let abnormal: Vec<&str> = report.abnormal_parameters().map(|(name, _)| name).collect();
        if !abnormal.is_empty() {
            let _ = writeln!(out, "  Outside range: {}", abnormal.join(", "));
        }
    }

    push_blocks(&mut out, "Synthesis", &report.synthesis_report);

    if !report.recommendations.is_empty() {
        let _ = writeln!(out, "\nRecommendations:");
        for (idx, item) in report.recommendations.iter().enumerate() {
            let _ = writeln!(out, "  {}. {item}", idx + 1);
        }
    }

    if let Some(context) = &report.context_analysis {
        let _ = writeln!(out, "\nContext:\n  {}", context.analysis);
        if let Some(concerns) = &context.adjusted_concerns {
            let _ = writeln!(out, "  Adjusted concerns: {concerns}");
        }
    }

    if report.collection_reference().is_none() {
        let _ = writeln!(out, "\n(Follow-up questions are unavailable for this report.)");
    }
    out
}

/// Non-blocking notice for partial-success responses.
pub fn render_warnings(warnings: &[String]) -> Option<String> {
    if warnings.is_empty() {
        return None;
    }
    let mut out = String::from("Analysis Issues Found:");
    for warning in warnings {
        let _ = write!(out, "\n  - {warning}");
    }
    Some(out)
}

pub fn render_turn(turn: &ChatTurn) -> String {
    match turn.role {
        ChatRole::User => format!("you: {}", turn.text),
        ChatRole::Assistant => format!("assistant: {}", turn.text),
    }
}

pub fn render_principal(principal: &Principal, avatar: Option<&str>) -> String {
    let avatar = match avatar {
        Some(url) if url.starts_with("data:") => "local image".to_string(),
        Some(url) => url.to_string(),
        None => format!("[{}]", principal.initial()),
    };
    let email = principal.email.as_deref().unwrap_or("-");
    format!(
        "{} <{email}>  id={}  avatar={avatar}",
        principal.label(),
        principal.id
    )
}

fn render_parameter(name: &str, reading: &ParameterReading) -> String {
    let value = reading
        .value
        .map(format_number)
        .unwrap_or_else(|| "-".to_string());
    let unit = reading
        .unit
        .as_deref()
        .map(|unit| format!(" {unit}"))
        .unwrap_or_default();
    let range = match (reading.reference_range.low, reading.reference_range.high) {
        (Some(low), Some(high)) => format!(" (ref {}-{})", format_number(low), format_number(high)),
        _ => String::new(),
    };
    let gauge = reading
        .range_position()
        .map(|pct| format!(" {}", gauge(pct)))
        .unwrap_or_default();
    format!(
        "{name}: {value}{unit} [{}]{range}{gauge}",
        reading.status.as_str()
    )
}

/// Twenty-cell bar with a marker at `pct`.
fn gauge(pct: f64) -> String {
    let cells = 20;
    let marker = ((pct / 100.0) * (cells - 1) as f64).round() as usize;
    (0..cells)
        .map(|idx| if idx == marker { '|' } else { '-' })
        .collect()
}

fn push_blocks(out: &mut String, heading: &str, blocks: &TextBlocks) {
    let blocks = blocks.blocks();
    if blocks.is_empty() {
        return;
    }
    let _ = writeln!(out, "\n{heading}:");
    for block in blocks {
        let _ = writeln!(out, "  {block}");
    }
}

fn format_number(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e15 {
        format!("{}", value as i64)
    } else {
        format!("{value}")
    }
}
