//! Plain-text rendering of the final report.

use std::fmt::Write;
use sysrev_core::{PipelineReport, ReportEntry};

/// Render the report for the terminal.
pub fn render(report: &PipelineReport) -> String {
    let mut out = String::new();
    let elapsed = (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0;

    let _ = writeln!(out, "Run {} ({}) in {elapsed:.1}s", report.run_id, report.state);
    let _ = writeln!(
        out,
        "Candidates: {} retrieved, {} included",
        report.entries.len(),
        report.included_count()
    );
    let _ = writeln!(out);

    for (i, entry) in report.entries.iter().enumerate() {
        render_entry(&mut out, i + 1, entry);
    }

    if report.failures.is_empty() {
        let _ = writeln!(out, "No failures.");
    } else {
        let _ = writeln!(out, "Failures ({}):", report.failures.len());
        for failure in &report.failures {
            let scope = failure.item.as_deref().unwrap_or("stage-level");
            let _ = writeln!(
                out,
                "  - [{}] {} {:?}: {}",
                failure.stage, scope, failure.kind, failure.message
            );
        }
    }

    out
}

fn render_entry(out: &mut String, index: usize, entry: &ReportEntry) {
    let year = entry
        .work
        .year
        .map(|y| y.to_string())
        .unwrap_or_else(|| "n.d.".to_string());
    let _ = writeln!(out, "[{index}] {} ({year}) {}", entry.work.id, entry.work.title);

    match &entry.verdict {
        Some(v) if v.include => {
            let _ = writeln!(out, "    included");
        }
        Some(v) => {
            let _ = writeln!(out, "    excluded: {}", v.rationale);
        }
        None => {
            let _ = writeln!(out, "    not screened");
        }
    }

    if let Some(link) = &entry.link {
        match &link.url {
            Some(url) => {
                let _ = writeln!(out, "    link: {url}");
            }
            None => {
                let _ = writeln!(out, "    link: none found");
            }
        }
    }

    if let Some(synthesis) = &entry.synthesis {
        for finding in &synthesis.key_findings {
            let _ = writeln!(out, "    finding: {finding}");
        }
        for limitation in &synthesis.limitations {
            let _ = writeln!(out, "    limitation: {limitation}");
        }
        if let Some(confidence) = &synthesis.confidence {
            let _ = writeln!(out, "    confidence: {confidence}");
        }
    }
    let _ = writeln!(out);
}
