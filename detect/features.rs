//! # Feature Reconstruction
//!
//! The user only ever supplies the hour and the amount of a transaction. Every
//! other feature the model was trained on is filled in with its median over the
//! reference dataset. Accuracy therefore depends entirely on how representative
//! the median row is.
//!
//! The medians are computed once, when the reconstructor is built, and every
//! reconstruction afterwards is a copy of that row with two overrides.

use crate::data::{LABEL_COLUMN, ReferenceDataset};
use crate::input::{InputError, validate_amount, validate_hour};
use ndarray::ArrayView1;
use serde::Serialize;

/// Feature holding the user-supplied transaction hour.
pub const HOUR_FEATURE: &str = "Hour";
/// Feature holding `ln(1 + amount)`.
pub const LOG_AMOUNT_FEATURE: &str = "LogAmount";
/// Raw fields that the derived features replace.
pub const SUPERSEDED_FEATURES: [&str; 2] = ["Time", "Amount"];

/// An ordered mapping from feature name to value.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeatureVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl FeatureVector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> ArrayView1<'_, f64> {
        ArrayView1::from(self.values.as_slice())
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.position(name).map(|i| self.values[i])
    }

    /// Overwrites `name` in place, or appends it when absent.
    pub fn set(&mut self, name: &str, value: f64) {
        match self.position(name) {
            Some(i) => self.values[i] = value,
            None => {
                self.names.push(name.to_string());
                self.values.push(value);
            }
        }
    }

    pub fn remove(&mut self, name: &str) -> Option<f64> {
        let i = self.position(name)?;
        self.names.remove(i);
        Some(self.values.remove(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> + '_ {
        self.names
            .iter()
            .map(String::as_str)
            .zip(self.values.iter().copied())
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }
}

impl<S: Into<String>> FromIterator<(S, f64)> for FeatureVector {
    fn from_iter<I: IntoIterator<Item = (S, f64)>>(iter: I) -> Self {
        let mut vector = FeatureVector::new();
        for (name, value) in iter {
            let name: String = name.into();
            vector.set(&name, value);
        }
        vector
    }
}

/// Builds complete feature vectors from an hour and an amount.
#[derive(Debug, Clone)]
pub struct FeatureReconstructor {
    medians: FeatureVector,
}

impl FeatureReconstructor {
    /// Computes the median of every non-label column of `dataset`.
    pub fn from_dataset(dataset: &ReferenceDataset) -> Self {
        let medians = dataset
            .columns()
            .iter()
            .zip(dataset.column_medians())
            .filter(|(name, _)| name.as_str() != LABEL_COLUMN)
            .map(|(name, median)| (name.clone(), median))
            .collect::<FeatureVector>();

        log::debug!("Median profile covers {} features", medians.len());
        Self::from_medians(medians)
    }

    pub fn from_medians(medians: FeatureVector) -> Self {
        Self { medians }
    }

    /// The per-feature medians, in reference dataset column order.
    pub fn medians(&self) -> &FeatureVector {
        &self.medians
    }

    /// Returns the median row with `Hour = hour` and `LogAmount = ln(1 + amount)`,
    /// without the `Time` and `Amount` fields.
    pub fn reconstruct(&self, hour: u32, amount: f64) -> Result<FeatureVector, InputError> {
        let hour = validate_hour(hour)?;
        let amount = validate_amount(amount)?;

        let mut vector = self.medians.clone();
        vector.set(HOUR_FEATURE, f64::from(hour));
        vector.set(LOG_AMOUNT_FEATURE, amount.ln_1p());
        for name in SUPERSEDED_FEATURES {
            vector.remove(name);
        }

        log::debug!("Reconstructed {} features for hour={hour}, amount={amount}", vector.len());
        Ok(vector)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn sample_dataset() -> ReferenceDataset {
        let content = "Time,V1,V2,Amount,Class\n\
                       0,1.0,-1.0,10.0,0\n\
                       10,2.0,-3.0,20.0,0\n\
                       20,3.0,-2.0,30.0,1\n\
                       20,3.0,-2.0,30.0,1\n";
        ReferenceDataset::from_reader(content.as_bytes(), b',').unwrap()
    }

    #[test]
    fn test_vector_set_get_remove() {
        let mut vector: FeatureVector = [("a", 1.0), ("b", 2.0)].into_iter().collect();
        vector.set("a", 5.0);
        vector.set("c", 3.0);

        assert_eq!(vector.names(), &["a", "b", "c"]);
        assert_eq!(vector.get("a"), Some(5.0));
        assert_eq!(vector.remove("b"), Some(2.0));
        assert_eq!(vector.remove("b"), None);
        assert_eq!(vector.values().to_vec(), vec![5.0, 3.0]);
    }

    #[test]
    fn test_medians_exclude_label_column() {
        let reconstructor = FeatureReconstructor::from_dataset(&sample_dataset());
        let medians = reconstructor.medians();

        assert_eq!(medians.names(), &["Time", "V1", "V2", "Amount"]);
        assert_abs_diff_eq!(medians.get("V1").unwrap(), 2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(medians.get("V2").unwrap(), -2.0, epsilon = 1e-12);
    }

    #[test]
    fn test_reconstruct_overrides_and_drops() {
        let reconstructor = FeatureReconstructor::from_dataset(&sample_dataset());
        let vector = reconstructor.reconstruct(12, 100.0).unwrap();

        assert_eq!(vector.names(), &["V1", "V2", "Hour", "LogAmount"]);
        assert_eq!(vector.get("Hour"), Some(12.0));
        assert_eq!(vector.get("LogAmount"), Some(100.0f64.ln_1p()));
        assert_abs_diff_eq!(vector.get("LogAmount").unwrap(), 101.0f64.ln(), epsilon = 1e-12);
        assert!(vector.get("Time").is_none());
        assert!(vector.get("Amount").is_none());
    }

    #[test]
    fn test_existing_derived_columns_keep_their_position() {
        let medians: FeatureVector = [("Hour", 3.0), ("V1", 0.5), ("LogAmount", 1.0)]
            .into_iter()
            .collect();
        let vector = FeatureReconstructor::from_medians(medians)
            .reconstruct(0, 0.0)
            .unwrap();

        assert_eq!(vector.names(), &["Hour", "V1", "LogAmount"]);
        assert_eq!(vector.get("Hour"), Some(0.0));
        assert_eq!(vector.get("LogAmount"), Some(0.0));
    }

    #[test]
    fn test_reconstruct_is_deterministic() {
        let reconstructor = FeatureReconstructor::from_dataset(&sample_dataset());
        for hour in 0..=23 {
            let amount = f64::from(hour) * 17.25;
            let first = reconstructor.reconstruct(hour, amount).unwrap();
            let second = reconstructor.reconstruct(hour, amount).unwrap();
            assert_eq!(first, second);
            assert_eq!(first.get("Hour"), Some(f64::from(hour)));
            assert_eq!(first.get("LogAmount"), Some(amount.ln_1p()));
        }
    }

    #[test]
    fn test_reconstruct_rejects_invalid_input() {
        let reconstructor = FeatureReconstructor::from_dataset(&sample_dataset());
        assert_eq!(
            reconstructor.reconstruct(24, 1.0),
            Err(InputError::HourOutOfRange(24))
        );
        assert!(matches!(
            reconstructor.reconstruct(1, -5.0),
            Err(InputError::InvalidAmount(_))
        ));
    }
}
