//! Text and JSON rendering of verdicts for the terminal.

use cardguard::error::PredictionError;
use cardguard::features::FeatureVector;
use cardguard::verdict::{Label, PredictionResult, RiskTier};
use clap::ValueEnum;
use itertools::Itertools;

const BAR_WIDTH: usize = 30;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

fn status_line(label: Label) -> &'static str {
    if label.is_fraud() {
        "🚨 Fraudulent Transaction Detected!"
    } else {
        "✅ Legitimate Transaction"
    }
}

fn risk_badge(risk: RiskTier) -> String {
    let marker = match risk {
        RiskTier::High => "🟥",
        RiskTier::Medium => "🟨",
        RiskTier::Low => "🟩",
    };
    format!("{marker} {risk}")
}

fn percent(probability: f64) -> String {
    format!("{:.2}%", probability * 100.0)
}

/// Verdict box for the hour/amount variant.
pub fn render_reconstructed(result: &PredictionResult) -> String {
    let mut lines = vec![status_line(result.label).to_string()];
    if let Some(p) = result.confidence {
        lines.push(format!("Confidence: {}", percent(p)));
    }
    if let Some(risk) = result.risk {
        lines.push(format!("Risk Level: {}", risk_badge(risk)));
    }
    lines.join("\n")
}

/// Verdict for the raw-vector variant, with a bar for the fraud probability.
pub fn render_raw(result: &PredictionResult) -> String {
    let mut lines = vec![status_line(result.label).to_string()];
    match result.confidence {
        Some(p) => lines.push(format!(
            "Fraud probability: {} {}",
            probability_bar(p, BAR_WIDTH),
            percent(p)
        )),
        None => lines.push("Fraud probability: not provided by this model".to_string()),
    }
    lines.join("\n")
}

pub fn render_result(
    result: &PredictionResult,
    format: OutputFormat,
    text: fn(&PredictionResult) -> String,
) -> Result<String, serde_json::Error> {
    match format {
        OutputFormat::Text => Ok(text(result)),
        OutputFormat::Json => serde_json::to_string_pretty(result),
    }
}

/// `[█████░░░░░]` filled in proportion to `probability`.
pub fn probability_bar(probability: f64, width: usize) -> String {
    let filled = ((probability.clamp(0.0, 1.0) * width as f64).round() as usize).min(width);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(width - filled))
}

pub fn render_error(error: &PredictionError) -> String {
    format!("❌ {}", error.user_message())
}

/// One `name = value` line per feature.
pub fn render_vector(vector: &FeatureVector) -> String {
    let width = vector.names().iter().map(String::len).max().unwrap_or(0);
    vector
        .iter()
        .map(|(name, value)| format!("{name:<width$} = {value}"))
        .join("\n")
}
