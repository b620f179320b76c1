//! Downloadable HTML report for a completed session.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::Utc;
use minijinja::{Environment, context};
use serde::Serialize;
use serde_json::Value;
use tracing::info;

use crate::core::session::ReportView;

const REPORT_TEMPLATE: &str = include_str!("templates/report.html");

/// One compared property from the scorer breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BreakdownRow {
    pub category: String,
    pub property: String,
    pub description: String,
    pub matched: bool,
    pub value: String,
}

/// Flatten a `{category: {property: {Match, Description, Value}}}` breakdown.
///
/// Entries without a `Match` field are skipped.
pub fn breakdown_rows(breakdown: &Value) -> Vec<BreakdownRow> {
    let Some(categories) = breakdown.as_object() else {
        return Vec::new();
    };
    let mut rows = Vec::new();
    for (category, properties) in categories {
        let Some(properties) = properties.as_object() else {
            continue;
        };
        for (property, detail) in properties {
            let Some(matched) = detail.get("Match").and_then(match_flag) else {
                continue;
            };
            let description = detail
                .get("Description")
                .and_then(Value::as_str)
                .unwrap_or(property)
                .to_string();
            let value = match detail.get("Value") {
                None | Some(Value::Null) => String::new(),
                Some(Value::String(text)) => text.clone(),
                Some(other) => other.to_string(),
            };
            rows.push(BreakdownRow {
                category: category.clone(),
                property: property.clone(),
                description,
                matched,
                value,
            });
        }
    }
    rows
}

fn match_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(flag) => Some(*flag),
        Value::String(text) => match text.to_ascii_lowercase().as_str() {
            "true" => Some(true),
            "false" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// Render the report HTML.
pub fn render_report(view: &ReportView, generated_at: &str) -> Result<String> {
    let mut env = Environment::new();
    env.add_template("report.html", REPORT_TEMPLATE)
        .context("load report template")?;
    let template = env.get_template("report.html")?;

    let summary = view.results.summary;
    let breakdown = view.results.breakdown.as_ref();
    let rows = breakdown.map(breakdown_rows).unwrap_or_default();
    let breakdown_json = match breakdown {
        Some(value) if rows.is_empty() => Some(serde_json::to_string_pretty(value)?),
        _ => None,
    };

    let rendered = template
        .render(context! {
            label => view.record_label,
            generated_at => generated_at,
            total => summary.total,
            correct => summary.correct,
            incorrect => summary.incorrect,
            rows => rows,
            breakdown => breakdown_json,
        })
        .context("render report")?;
    Ok(rendered)
}

/// `canary-report-{label}-{millis}.html`, with the label slugged.
pub fn report_file_name(record_label: &str, unix_millis: i64) -> String {
    format!("canary-report-{}-{unix_millis}.html", slug(record_label))
}

fn slug(label: &str) -> String {
    let mut out = String::with_capacity(label.len());
    for ch in label.chars() {
        if ch.is_ascii_alphanumeric() {
            out.push(ch.to_ascii_lowercase());
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.trim_matches('-').to_string()
}

/// A rendered report ready to be downloaded or written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportFile {
    pub file_name: String,
    pub html: String,
}

/// Render the report stamped with the current time.
pub fn render_download(view: &ReportView) -> Result<ReportFile> {
    let now = Utc::now();
    Ok(ReportFile {
        file_name: report_file_name(&view.record_label, now.timestamp_millis()),
        html: render_report(view, &now.to_rfc3339())?,
    })
}

/// Render and write the report into `dir`. Returns the written path.
pub fn write_report(dir: &Path, view: &ReportView) -> Result<PathBuf> {
    let report = render_download(view)?;
    fs::create_dir_all(dir).with_context(|| format!("create directory {}", dir.display()))?;
    let path = dir.join(&report.file_name);
    fs::write(&path, report.html).with_context(|| format!("write report {}", path.display()))?;
    info!(path = %path.display(), "report written");
    Ok(path)
}
