//! Terminal output utilities
//!
//! Provides consistent formatting for CLI output.

use console::{measure_text_width, pad_str, Alignment};
use owo_colors::OwoColorize;
use sow_core::Error;

/// Status message helpers
pub struct Status;

impl Status {
    /// Print a success message
    pub fn success(message: &str) {
        println!("{} {}", "✓".green(), message);
    }

    /// Print an error message
    pub fn error(message: &str) {
        eprintln!("{} {}", "✗".red(), message);
    }

    /// Print a warning message
    pub fn warning(message: &str) {
        eprintln!("{} {}", "⚠".yellow(), message);
    }

    /// Print an info message
    pub fn info(message: &str) {
        println!("{} {}", "ℹ".blue(), message);
    }

    /// Print a step message (for multi-step operations)
    pub fn step(step: usize, total: usize, message: &str) {
        println!("{} {}", format!("[{}/{}]", step, total).dimmed(), message);
    }

    /// Print a header
    pub fn header(message: &str) {
        println!();
        println!("{}", message.bold());
        println!("{}", "─".repeat(measure_text_width(message)));
    }

    /// Print an application error with its code, context and suggestion.
    pub fn report(err: &Error) {
        eprintln!("{} {} {}", "✗".red(), err.code.to_string().dimmed(), err.message);
        if let Some(context) = &err.context {
            eprintln!("  {} {}", "context:".dimmed(), context);
        }
        if let Some(suggestion) = &err.suggestion {
            eprintln!("  {} {}", "hint:".cyan(), suggestion);
        }
    }
}

/// Format a distance in kilometres, switching to metres under 1 km.
pub fn format_distance(km: f64) -> String {
    if !km.is_finite() {
        "unknown".to_string()
    } else if km < 1.0 {
        format!("{:.0} m", km * 1000.0)
    } else {
        format!("{:.2} km", km)
    }
}

/// One-line check-in gate indicator.
pub fn gate_badge(distance_km: Option<f64>, radius_km: f64) -> String {
    match distance_km {
        None => format!("{} locating…", "◌".yellow()),
        Some(d) if d <= radius_km => {
            format!("{} in range ({})", "●".green(), format_distance(d))
        }
        Some(d) => format!(
            "{} out of range ({}, limit {})",
            "●".red(),
            format_distance(d),
            format_distance(radius_km)
        ),
    }
}

/// A heat-map cell for intensity level 0–4.
pub fn heat_cell(level: u8) -> String {
    match level {
        0 => "·".dimmed().to_string(),
        1 => "▪".green().to_string(),
        2 => "◼".green().to_string(),
        3 => "◼".bright_green().to_string(),
        _ => "█".bright_green().to_string(),
    }
}

/// Format a duration for display
pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs_f32();
    if secs < 1.0 {
        format!("{:.0}ms", secs * 1000.0)
    } else if secs < 60.0 {
        format!("{:.1}s", secs)
    } else {
        let mins = (secs / 60.0).floor();
        let remaining_secs = secs % 60.0;
        format!("{}m {:.0}s", mins, remaining_secs)
    }
}

/// Format a file size for display
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Plain-text table whose columns line up under wide (CJK) characters.
#[derive(Debug, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Create a table with the given column headers.
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    /// Append a row. Missing cells render empty; extra cells are dropped.
    pub fn row<I, S>(&mut self, cells: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut cells: Vec<String> = cells.into_iter().map(Into::into).collect();
        cells.resize(self.headers.len(), String::new());
        self.rows.push(cells);
        self
    }

    /// Whether no rows were added.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Render to lines, header first.
    pub fn render(&self) -> Vec<String> {
        let widths: Vec<usize> = (0..self.headers.len())
            .map(|col| {
                self.rows
                    .iter()
                    .map(|row| measure_text_width(&row[col]))
                    .chain(std::iter::once(measure_text_width(&self.headers[col])))
                    .max()
                    .unwrap_or(0)
            })
            .collect();

        let line = |cells: &[String]| {
            cells
                .iter()
                .zip(&widths)
                .map(|(cell, width)| pad_str(cell, *width, Alignment::Left, None).into_owned())
                .collect::<Vec<_>>()
                .join("  ")
                .trim_end()
                .to_string()
        };

        let mut out = Vec::with_capacity(self.rows.len() + 1);
        out.push(line(&self.headers));
        out.extend(self.rows.iter().map(|row| line(row)));
        out
    }

    /// Print to stdout with a bold header.
    pub fn print(&self) {
        let mut lines = self.render().into_iter();
        if let Some(header) = lines.next() {
            println!("{}", header.bold());
        }
        for line in lines {
            println!("{}", line);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_format_distance_metres() {
        assert_eq!(format_distance(0.4213), "421 m");
    }

    #[test]
    fn test_format_distance_km() {
        assert_eq!(format_distance(2.0), "2.00 km");
        assert_eq!(format_distance(f64::NAN), "unknown");
    }

    #[test]
    fn test_gate_badge_states() {
        assert!(gate_badge(None, 1.0).contains("locating"));
        assert!(gate_badge(Some(0.2), 1.0).contains("in range"));
        assert!(gate_badge(Some(1.0), 1.0).contains("in range"));
        assert!(gate_badge(Some(2.0), 1.0).contains("out of range"));
    }

    #[test]
    fn test_format_duration_ms() {
        assert_eq!(format_duration(Duration::from_millis(500)), "500ms");
    }

    #[test]
    fn test_format_duration_mins() {
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
    }

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(500), "500 B");
        assert_eq!(format_size(200 * 1024), "200.0 KB");
        assert_eq!(format_size(5 * 1024 * 1024), "5.00 MB");
    }

    #[test]
    fn test_table_aligns_wide_characters() {
        let mut table = Table::new(["名次", "name", "total"]);
        table.row(["1", "大安森林公園", "12"]);
        table.row(["2", "abc", "3"]);
        let lines = table.render();

        assert_eq!(lines.len(), 3);
        let prefix = |line: &str, cell: &str| {
            let at = line.rfind(cell).unwrap();
            measure_text_width(&line[..at])
        };
        // "名次" and "大安森林公園" are double width
        assert_eq!(prefix(&lines[0], "total"), 4 + 2 + 12 + 2);
        assert_eq!(prefix(&lines[1], "12"), prefix(&lines[0], "total"));
        assert_eq!(prefix(&lines[2], "3"), prefix(&lines[0], "total"));
    }

    #[test]
    fn test_table_pads_short_rows() {
        let mut table = Table::new(["a", "b"]);
        table.row(["only"]);
        assert_eq!(table.render()[1], "only");
        assert!(!table.is_empty());
    }
}
