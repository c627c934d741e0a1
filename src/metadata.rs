use rsvp_reader::{DocumentInfo, LoadReport};

/// Header printed before a document is read or extracted.
pub fn format_banner(report: &LoadReport) -> String {
    let mut lines = Vec::new();

    lines.push(title_line(&report.document_name, &report.info));

    if !report.info.authors.is_empty() {
        lines.push(format!("by {}", report.info.authors.join(", ")));
    }

    let summary = &report.summary;
    let mut counts = format!(
        "{} words in {} of {} units",
        report.token_count,
        summary.total_units - summary.units_skipped,
        summary.total_units
    );
    if summary.is_degraded() {
        counts.push_str(&format!(" ({} unreadable, skipped)", summary.units_skipped));
    }
    lines.push(counts);

    if report.restored_index > 0 {
        lines.push(format!("resuming at word {}", report.restored_index + 1));
    }

    lines.join("\n") + "\n"
}

fn title_line(document_name: &str, info: &DocumentInfo) -> String {
    match info.title.as_deref().map(str::trim) {
        Some(title) if !title.is_empty() => format!("{title} [{document_name}]"),
        _ => document_name.to_string(),
    }
}
