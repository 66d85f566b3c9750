//! The two front-end pipelines, each wrapping immutable handles that are
//! created once at startup and then shared by every request.

use crate::data::ReferenceDataset;
use crate::error::PredictionError;
use crate::features::{FeatureReconstructor, FeatureVector};
use crate::model::{Classifier, ModelArtifact};
use crate::verdict::{PredictionResult, classify, classify_raw};
use std::path::Path;

/// Hour + amount in, verdict out, via median imputation.
#[derive(Debug, Clone)]
pub struct ReconstructedVariant<C = ModelArtifact> {
    reconstructor: FeatureReconstructor,
    model: C,
}

impl ReconstructedVariant<ModelArtifact> {
    /// Loads the model artifact and the reference dataset and computes the
    /// median profile.
    pub fn initialize(model_path: &Path, dataset_path: &Path) -> Result<Self, PredictionError> {
        let model = load_model(model_path)?;
        let dataset = ReferenceDataset::load(dataset_path)?;
        Ok(Self::new(FeatureReconstructor::from_dataset(&dataset), model))
    }
}

impl<C: Classifier> ReconstructedVariant<C> {
    pub fn new(reconstructor: FeatureReconstructor, model: C) -> Self {
        Self {
            reconstructor,
            model,
        }
    }

    pub fn reconstructor(&self) -> &FeatureReconstructor {
        &self.reconstructor
    }

    pub fn model(&self) -> &C {
        &self.model
    }

    pub fn reconstruct(&self, hour: u32, amount: f64) -> Result<FeatureVector, PredictionError> {
        Ok(self.reconstructor.reconstruct(hour, amount)?)
    }

    pub fn predict(&self, hour: u32, amount: f64) -> Result<PredictionResult, PredictionError> {
        let vector = self.reconstruct(hour, amount)?;
        classify(&self.model, &vector)
    }
}

/// 29 comma-separated values in, verdict out, no feature engineering.
#[derive(Debug, Clone)]
pub struct RawVariant<C = ModelArtifact> {
    model: C,
}

impl RawVariant<ModelArtifact> {
    pub fn initialize(model_path: &Path) -> Result<Self, PredictionError> {
        Ok(Self::new(load_model(model_path)?))
    }
}

impl<C: Classifier> RawVariant<C> {
    pub fn new(model: C) -> Self {
        Self { model }
    }

    pub fn model(&self) -> &C {
        &self.model
    }

    pub fn predict(&self, input: &str) -> Result<PredictionResult, PredictionError> {
        classify_raw(&self.model, input)
    }
}

fn load_model(path: &Path) -> Result<ModelArtifact, PredictionError> {
    ModelArtifact::load(path).map_err(|source| PredictionError::ModelUnavailable {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::model::ModelKind;
    use crate::verdict::Label;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn write_file(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().expect("tempfile");
        write!(file, "{content}").expect("write fixture");
        file.flush().expect("flush fixture");
        file
    }

    fn hour_model() -> ModelArtifact {
        // Fraud when Hour > 20 (eta = Hour - 20).
        ModelArtifact {
            name: "hour-only".to_string(),
            kind: ModelKind::Logistic,
            feature_names: Some(vec![
                "V1".to_string(),
                "Hour".to_string(),
                "LogAmount".to_string(),
            ]),
            intercept: -20.0,
            coefficients: vec![0.0, 1.0, 0.0],
            standardizer: None,
        }
    }

    #[test]
    fn test_reconstructed_variant_from_files() {
        let model_file = NamedTempFile::new().expect("tempfile");
        hour_model().save(model_file.path()).unwrap();
        let data_file = write_file("Time;V1;Amount;Class\n0;1.0;5.0;0\n5;2.0;9.0;1\n");

        let variant =
            ReconstructedVariant::initialize(model_file.path(), data_file.path()).unwrap();

        assert_eq!(variant.predict(23, 50.0).unwrap().label, Label::Fraud);
        assert_eq!(variant.predict(3, 50.0).unwrap().label, Label::Legitimate);
        assert_eq!(variant.reconstructor().medians().get("V1"), Some(1.5));
    }

    #[test]
    fn test_missing_dataset_is_data_unavailable() {
        let model_file = NamedTempFile::new().expect("tempfile");
        hour_model().save(model_file.path()).unwrap();

        let err = ReconstructedVariant::initialize(
            model_file.path(),
            Path::new("/nonexistent/creditcard.csv"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DataUnavailable);
    }

    #[test]
    fn test_missing_model_is_reported() {
        let err = RawVariant::initialize(Path::new("/nonexistent/model.toml")).unwrap_err();
        assert!(matches!(err, PredictionError::ModelUnavailable { .. }));
        assert_eq!(err.kind(), ErrorKind::Other);
    }

    #[test]
    fn test_dataset_without_model_features_fails_per_request() {
        // The dataset lacks V1 so the reconstructed vector is misaligned with the model.
        let data = "Time,V9,Amount,Class\n0,1.0,5.0,0\n";
        let dataset = ReferenceDataset::from_reader(data.as_bytes(), b',').unwrap();
        let variant =
            ReconstructedVariant::new(FeatureReconstructor::from_dataset(&dataset), hour_model());

        let err = variant.predict(12, 100.0).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inference);
        // The handle stays usable for the next request.
        assert_eq!(
            variant.predict(99, 1.0).unwrap_err().kind(),
            ErrorKind::InvalidInput
        );
    }
}
