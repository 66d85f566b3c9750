use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufWriter, Write};
use std::path::Path;
use thiserror::Error;

// --- Public Data Structures ---
// These structs define the public, human-readable format of a trained model
// when serialized to a TOML file.

/// How the linear score of a model is turned into an output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelKind {
    /// Logistic regression. Exposes class probabilities through the sigmoid.
    Logistic,
    /// A maximum-margin linear classifier. Only the sign of the score is meaningful,
    /// so no probabilities are exposed.
    Margin,
}

/// Per-feature centering and scaling applied before the linear score,
/// equivalent to a standard scaler fitted at training time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub means: Vec<f64>,
    pub scales: Vec<f64>,
}

/// The top-level, self-contained, trained model artifact.
/// This is the structure that gets saved to and loaded from a file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    pub kind: ModelKind,
    /// Canonical feature order. When present it is strictly enforced for named inputs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feature_names: Option<Vec<String>>,
    pub intercept: f64,
    pub coefficients: Vec<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub standardizer: Option<Standardizer>,
}

/// Custom error type for model loading, saving, and prediction.
#[derive(Error, Debug)]
pub enum ModelError {
    #[error("Failed to read or write model file: {0}")]
    IoError(#[from] std::io::Error),
    #[error("Failed to parse TOML model file: {0}")]
    TomlParseError(#[from] toml::de::Error),
    #[error("Failed to serialize model to TOML format: {0}")]
    TomlSerializeError(#[from] toml::ser::Error),
    #[error("The model artifact has no coefficients.")]
    EmptyModel,
    #[error("The model artifact lists {names} feature names but has {coefficients} coefficients.")]
    MismatchedNameCount { names: usize, coefficients: usize },
    #[error("The standardizer has {found} entries, but the model has {expected} coefficients.")]
    MismatchedStandardizer { found: usize, expected: usize },
    #[error("Standardizer scale #{index} is {value}; scales must be finite and non-zero.")]
    InvalidScale { index: usize, value: f64 },
    #[error("Input has {found} features, but the model was trained on {expected}.")]
    MismatchedFeatureCount { found: usize, expected: usize },
    #[error("Feature #{position} is '{found}', but the model expects '{expected}' at that position.")]
    MismatchedFeatureName {
        position: usize,
        found: String,
        expected: String,
    },
    #[error("Input value for feature #{0} is not finite.")]
    NonFiniteInput(usize),
    #[error("Model '{0}' does not expose class probabilities.")]
    ProbabilityUnavailable(String),
}

/// A binary classifier over a fixed-width numeric feature vector.
///
/// Class `1` is the positive (fraud) class.
pub trait Classifier {
    fn name(&self) -> &str;

    fn feature_count(&self) -> usize;

    /// Trained feature names in canonical order, if the model recorded them.
    fn feature_names(&self) -> Option<&[String]>;

    /// Discrete class label for one sample.
    fn predict(&self, features: ArrayView1<'_, f64>) -> Result<i64, ModelError>;

    /// `[p_class0, p_class1]` for one sample, or `None` when the model has no
    /// probability output.
    fn predict_proba(&self, features: ArrayView1<'_, f64>) -> Result<Option<[f64; 2]>, ModelError>;
}

/// Checks that named inputs line up exactly with what `model` was trained on.
///
/// Models without stored names can only be checked by width.
pub fn check_feature_alignment<C: Classifier + ?Sized>(
    model: &C,
    names: &[String],
) -> Result<(), ModelError> {
    if names.len() != model.feature_count() {
        return Err(ModelError::MismatchedFeatureCount {
            found: names.len(),
            expected: model.feature_count(),
        });
    }
    let Some(expected) = model.feature_names() else {
        return Ok(());
    };
    for (i, (found, expected)) in names.iter().zip(expected).enumerate() {
        if found != expected {
            return Err(ModelError::MismatchedFeatureName {
                position: i + 1,
                found: found.clone(),
                expected: expected.clone(),
            });
        }
    }
    Ok(())
}

impl ModelArtifact {
    /// Saves the model to a file in a human-readable TOML format.
    pub fn save(&self, path: &Path) -> Result<(), ModelError> {
        let toml_string = toml::to_string_pretty(self)?;
        let mut file = BufWriter::new(fs::File::create(path)?);
        file.write_all(toml_string.as_bytes())?;
        file.flush()?;
        Ok(())
    }

    /// Loads and validates a model from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ModelError> {
        log::info!("Loading model from '{}'", path.display());
        let toml_string = fs::read_to_string(path)?;
        let model = Self::from_toml_str(&toml_string)?;
        log::info!(
            "Model '{}' ({:?}) expects {} features",
            model.name,
            model.kind,
            model.coefficients.len()
        );
        Ok(model)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, ModelError> {
        let model: Self = toml::from_str(text)?;
        model.validate()?;
        Ok(model)
    }

    fn validate(&self) -> Result<(), ModelError> {
        let width = self.coefficients.len();
        if width == 0 {
            return Err(ModelError::EmptyModel);
        }
        if let Some(names) = &self.feature_names {
            if names.len() != width {
                return Err(ModelError::MismatchedNameCount {
                    names: names.len(),
                    coefficients: width,
                });
            }
        }
        if let Some(standardizer) = &self.standardizer {
            for found in [standardizer.means.len(), standardizer.scales.len()] {
                if found != width {
                    return Err(ModelError::MismatchedStandardizer {
                        found,
                        expected: width,
                    });
                }
            }
            if let Some((index, &value)) = standardizer
                .scales
                .iter()
                .enumerate()
                .find(|(_, s)| !s.is_finite() || **s == 0.0)
            {
                return Err(ModelError::InvalidScale { index, value });
            }
        }
        Ok(())
    }

    /// The linear predictor `b + w·z`, where `z` is the standardized input.
    pub fn decision_function(&self, features: ArrayView1<'_, f64>) -> Result<f64, ModelError> {
        let expected = self.coefficients.len();
        if features.len() != expected {
            return Err(ModelError::MismatchedFeatureCount {
                found: features.len(),
                expected,
            });
        }
        if let Some(i) = features.iter().position(|v| !v.is_finite()) {
            return Err(ModelError::NonFiniteInput(i + 1));
        }

        let z: Array1<f64> = match &self.standardizer {
            Some(s) => features
                .iter()
                .zip(s.means.iter().zip(&s.scales))
                .map(|(x, (mean, scale))| (x - mean) / scale)
                .collect(),
            None => features.to_owned(),
        };
        let weights = ArrayView1::from(self.coefficients.as_slice());
        Ok(self.intercept + z.dot(&weights))
    }
}

impl Classifier for ModelArtifact {
    fn name(&self) -> &str {
        &self.name
    }

    fn feature_count(&self) -> usize {
        self.coefficients.len()
    }

    fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    fn predict(&self, features: ArrayView1<'_, f64>) -> Result<i64, ModelError> {
        let eta = self.decision_function(features)?;
        Ok(if eta > 0.0 { 1 } else { 0 })
    }

    fn predict_proba(&self, features: ArrayView1<'_, f64>) -> Result<Option<[f64; 2]>, ModelError> {
        match self.kind {
            ModelKind::Logistic => {
                let eta = self.decision_function(features)?;
                // Clamp eta to prevent numerical overflow in exp()
                let p = 1.0 / (1.0 + f64::exp(-eta.clamp(-700.0, 700.0)));
                Ok(Some([1.0 - p, p]))
            }
            ModelKind::Margin => Ok(None),
        }
    }
}
