//! Terminal progress for the import binary
//!
//! Provides an indicatif spinner driven by [`ImportObserver`] callbacks.

use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::pipeline::{ImportObserver, ImportStatus, ProgressSnapshot};
use crate::record::PreviewRow;

/// Create a spinner for indeterminate operations
pub fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} [{elapsed_precise}] {prefix:.bold} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

/// Format a count with thousands separators
pub fn format_count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

/// Observer that renders job progress on a spinner
pub struct ConsoleObserver {
    bar: ProgressBar,
}

impl ConsoleObserver {
    pub fn new(source: &str) -> Self {
        Self::with_bar(create_spinner(&format!("Reading {}", source)))
    }

    pub fn with_bar(bar: ProgressBar) -> Self {
        Self { bar }
    }

    pub fn finish(&self, message: impl Into<String>) {
        self.bar.finish_with_message(message.into());
    }

    pub fn abandon(&self, message: impl Into<String>) {
        self.bar.abandon_with_message(message.into());
    }

    pub fn message(&self) -> String {
        self.bar.message()
    }
}

impl ImportObserver for ConsoleObserver {
    fn on_progress(&self, progress: &ProgressSnapshot) {
        self.bar.set_message(format!(
            "{} rows processed, {} records uploaded in {} batches",
            format_count(progress.processed),
            format_count(progress.uploaded),
            progress.batches
        ));
    }

    fn on_preview(&self, preview: &[PreviewRow]) {
        if preview.len() == 1 {
            self.bar.println(format!("First record: {}", preview[0].name));
        }
    }

    fn on_status_change(&self, status: ImportStatus) {
        self.bar.set_prefix(status.as_str());
    }
}

/// Render preview rows as an aligned text table
pub fn preview_table(rows: &[PreviewRow]) -> String {
    let header = ["NAME", "STREET ADDRESS", "CITY", "STATE", "IMAGE URL"];
    let cells: Vec<[&str; 5]> = rows
        .iter()
        .map(|r| {
            [
                r.name.as_str(),
                r.street_address.as_str(),
                r.city.as_str(),
                r.state.as_str(),
                r.image_url.as_str(),
            ]
        })
        .collect();

    let mut widths = header.map(|h| h.chars().count());
    for row in &cells {
        for (width, cell) in widths.iter_mut().zip(row) {
            *width = (*width).max(cell.chars().count());
        }
    }

    let line = |row: &[&str; 5]| {
        row.iter()
            .zip(widths)
            .map(|(cell, width)| format!("{:<width$}", cell, width = width))
            .collect::<Vec<_>>()
            .join("  ")
            .trim_end()
            .to_string()
    };

    let mut out = line(&header);
    for row in &cells {
        out.push('\n');
        out.push_str(&line(row));
    }
    out
}
