use crate::pipeline::ScanReport;
use anyhow::Result;

pub const CLEAN_MESSAGE: &str = "No known bug patterns found";

pub fn render_json(report: &ScanReport) -> Result<String> {
    Ok(serde_json::to_string_pretty(report)?)
}

/// Line-annotated terminal report
pub fn render_text(report: &ScanReport) -> String {
    let Some(decision) = &report.decision else {
        return format!("{CLEAN_MESSAGE} in {}\n", report.file.display());
    };
    let record = &decision.record;

    let mut out = String::new();
    out.push_str(&format!(
        "Bug {} [{}] {} ({})\n",
        decision.bug_id, decision.action, record.bug_type, record.language
    ));
    out.push_str(&format!("  file: {}\n", report.file.display()));
    for line in &report.lines {
        match line.text.as_deref() {
            Some(text) => out.push_str(&format!("  {:>5} | {}\n", line.line, truncate_one_line(text, 120))),
            None => out.push_str(&format!("  {:>5} | (not in this file)\n", line.line)),
        }
    }
    out.push_str(&format!("  signature: {}\n", record.signature));
    out.push_str(&format!("  confidence: {:.2}\n", record.confidence));
    if let Some(reference) = record.correct_reference.as_deref() {
        out.push_str("  correct code:\n");
        push_indented(&mut out, reference);
    }
    match record.explanation.as_deref() {
        Some(explanation) => {
            out.push_str(&format!("  explanation ({}):\n", record.origin));
            push_indented(&mut out, explanation);
        }
        None => out.push_str("  explanation: (none)\n"),
    }
    if report.suppressed_groups > 0 {
        out.push_str(&format!(
            "  {} other candidate pattern(s) ranked lower and were not reported\n",
            report.suppressed_groups
        ));
    }
    if let Some(stats) = report.stats {
        out.push_str(&format!(
            "  table: {} ({} created, {} updated, {} unchanged)\n",
            report.table.display(),
            stats.created,
            stats.updated,
            stats.unchanged
        ));
    }
    out
}

fn push_indented(out: &mut String, text: &str) {
    for line in text.lines() {
        out.push_str("    ");
        out.push_str(line);
        out.push('\n');
    }
}

fn truncate_one_line(text: &str, max_chars: usize) -> String {
    let one_line = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() <= max_chars {
        return one_line;
    }
    let mut out: String = one_line.chars().take(max_chars).collect();
    out.push_str("...");
    out
}
