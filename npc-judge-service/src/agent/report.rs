//! Report intent and rendering.

use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::error::ReportError;
use crate::tools::{Chart, ChartKind};

const REPORT_KEYWORDS: [&str; 3] = ["pdf", "report", "export"];

/// Whether a query asks for a downloadable report
pub fn report_requested(query: &str) -> bool {
    let query = query.to_lowercase();
    REPORT_KEYWORDS.iter().any(|keyword| query.contains(keyword))
}

/// A rendered report file
#[derive(Debug, Clone, PartialEq)]
pub struct Report {
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Turns narrative text and charts into a report file
pub trait ReportRenderer: Send + Sync {
    fn render(&self, text: &str, charts: &[Chart]) -> Result<Report, ReportError>;
}

/// Standalone HTML report built from Markdown
#[derive(Debug, Default)]
pub struct HtmlReportRenderer;

impl HtmlReportRenderer {
    pub fn new() -> Self {
        Self
    }

    fn file_name(at: &DateTime<Utc>) -> String {
        format!("GameReport_{}.html", at.format("%Y%m%d_%H%M%S"))
    }

    pub(crate) fn build_markdown(text: &str, charts: &[Chart], at: &DateTime<Utc>) -> String {
        let mut md = String::from("# Game Report\n\n");
        md.push_str(text.trim());
        md.push_str("\n\n");

        for chart in charts {
            let _ = writeln!(md, "## {}\n", escape_cell(&chart.title));
            let _ = writeln!(md, "*{} chart*\n", chart.kind);

            let total: f64 = chart.values.iter().sum();
            let with_share = chart.kind == ChartKind::Pie && total > 0.0;
            if with_share {
                md.push_str("| Label | Value | Share |\n|---|---:|---:|\n");
            } else {
                md.push_str("| Label | Value |\n|---|---:|\n");
            }

            for (i, value) in chart.values.iter().enumerate() {
                let label = chart
                    .labels
                    .get(i)
                    .map(|l| escape_cell(l))
                    .unwrap_or_else(|| format!("Item {}", i + 1));
                if with_share {
                    let _ = writeln!(
                        md,
                        "| {} | {} | {:.1}% |",
                        label,
                        format_value(*value),
                        value / total * 100.0
                    );
                } else {
                    let _ = writeln!(md, "| {} | {} |", label, format_value(*value));
                }
            }
            md.push('\n');
        }

        let _ = writeln!(md, "---\n\nGenerated on {}", at.format("%Y-%m-%d %H:%M UTC"));
        md
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

/// At most two decimals, without trailing zeros
fn format_value(value: f64) -> String {
    let rounded = format!("{:.2}", value);
    rounded
        .trim_end_matches('0')
        .trim_end_matches('.')
        .to_string()
}

impl ReportRenderer for HtmlReportRenderer {
    fn render(&self, text: &str, charts: &[Chart]) -> Result<Report, ReportError> {
        let now = Utc::now();
        let md = Self::build_markdown(text, charts, &now);

        let body = markdown::to_html_with_options(&md, &markdown::Options::gfm())
            .map_err(|e| ReportError::Rendering {
                message: e.to_string(),
            })?;

        let html = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n\
             <title>Game Report</title>\n</head>\n<body>\n{}\n</body>\n</html>\n",
            body
        );

        Ok(Report {
            file_name: Self::file_name(&now),
            content: html.into_bytes(),
        })
    }
}
