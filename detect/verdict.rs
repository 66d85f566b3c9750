//! # Verdicts
//!
//! Turns model output into a `PredictionResult`. The two entry points apply
//! different decision rules and are kept distinct on purpose:
//!
//! - [`classify`] thresholds the fraud-class probability of a named,
//!   reconstructed feature vector.
//! - [`classify_raw`] takes the model's discrete label for a raw 29-value vector
//!   and reports the probability only when the model exposes one.

use crate::error::PredictionError;
use crate::features::FeatureVector;
use crate::input::parse_raw_values;
use crate::model::{Classifier, ModelError, check_feature_alignment};
use ndarray::ArrayView1;
use serde::Serialize;
use std::fmt;

/// A fraud-class probability strictly above this is a fraud verdict.
pub const FRAUD_THRESHOLD: f64 = 0.5;
/// Probabilities strictly above this are HIGH risk.
pub const HIGH_RISK_CUTOFF: f64 = 0.7;
/// Probabilities strictly above this (and not HIGH) are MEDIUM risk.
pub const MEDIUM_RISK_CUTOFF: f64 = 0.3;
/// Model class value that denotes fraud.
pub const FRAUD_CLASS: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Label {
    Fraud,
    Legitimate,
}

impl Label {
    pub fn is_fraud(self) -> bool {
        self == Label::Fraud
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskTier {
    Low,
    Medium,
    High,
}

impl RiskTier {
    pub fn from_probability(probability: f64) -> Self {
        if probability > HIGH_RISK_CUTOFF {
            RiskTier::High
        } else if probability > MEDIUM_RISK_CUTOFF {
            RiskTier::Medium
        } else {
            RiskTier::Low
        }
    }
}

impl fmt::Display for RiskTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RiskTier::Low => "LOW",
            RiskTier::Medium => "MEDIUM",
            RiskTier::High => "HIGH",
        };
        f.write_str(text)
    }
}

/// Outcome of one successful prediction request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResult {
    pub label: Label,
    /// Probability of the fraud class, when the model exposes probabilities.
    pub confidence: Option<f64>,
    /// Present exactly when `confidence` is.
    pub risk: Option<RiskTier>,
}

impl PredictionResult {
    fn from_probability(label: Label, probability: Option<f64>) -> Self {
        Self {
            label,
            confidence: probability,
            risk: probability.map(RiskTier::from_probability),
        }
    }
}

/// Scores a named feature vector by thresholding the fraud probability at
/// [`FRAUD_THRESHOLD`].
pub fn classify<C: Classifier + ?Sized>(
    model: &C,
    vector: &FeatureVector,
) -> Result<PredictionResult, PredictionError> {
    check_feature_alignment(model, vector.names())?;

    let probability = fraud_probability(model, vector.values())?
        .ok_or_else(|| ModelError::ProbabilityUnavailable(model.name().to_string()))?;
    let label = if probability > FRAUD_THRESHOLD {
        Label::Fraud
    } else {
        Label::Legitimate
    };

    log::debug!("classify: p(fraud)={probability:.6} -> {label:?}");
    Ok(PredictionResult::from_probability(label, Some(probability)))
}

/// Scores a comma-separated string of exactly 29 values using the model's own
/// label output.
pub fn classify_raw<C: Classifier + ?Sized>(
    model: &C,
    input: &str,
) -> Result<PredictionResult, PredictionError> {
    let values = parse_raw_values(input)?;
    let features = ArrayView1::from(values.as_slice());

    let label = if model.predict(features)? == FRAUD_CLASS {
        Label::Fraud
    } else {
        Label::Legitimate
    };
    let probability = fraud_probability(model, features)?;

    log::debug!("classify_raw: label={label:?}, p(fraud)={probability:?}");
    Ok(PredictionResult::from_probability(label, probability))
}

fn fraud_probability<C: Classifier + ?Sized>(
    model: &C,
    features: ArrayView1<'_, f64>,
) -> Result<Option<f64>, ModelError> {
    Ok(model.predict_proba(features)?.map(|[_, fraud]| fraud))
}
