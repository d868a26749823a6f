//! Accuracy of border predictions against hand labels.
//!
//! Labels are a JSON object mapping image names to whether the image has a
//! border, e.g. `{"flag_01.png": true, "flag_02.png": false}`.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use crate::error::Result;

/// Ground-truth border labels keyed by image name.
pub type Labels = BTreeMap<String, bool>;

/// Parse labels from a JSON string.
///
/// # Errors
///
/// Returns [`crate::Error::Json`] if the text is not a `name -> bool` object.
pub fn parse_labels(json: &str) -> Result<Labels> {
    Ok(serde_json::from_str(json)?)
}

/// Read labels from a JSON file.
///
/// # Errors
///
/// Returns [`crate::Error::Io`] if the file cannot be read and
/// [`crate::Error::Json`] if it cannot be parsed.
pub fn load_labels(path: &Path) -> Result<Labels> {
    parse_labels(&std::fs::read_to_string(path)?)
}

/// A labeled image the detector got wrong.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Image name.
    pub name: String,
    /// Label value.
    pub expected: bool,
    /// Predicted value.
    pub predicted: bool,
}

/// Summary of predictions scored against labels.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    /// Labeled images that had a prediction.
    pub total: usize,
    /// Predictions that matched the label.
    pub correct: usize,
    /// `correct / total`, or `0.0` when nothing was scored.
    pub accuracy: f64,
    /// Wrong predictions, sorted by name.
    pub mismatches: Vec<Mismatch>,
    /// Labeled images with no prediction, sorted.
    pub missing: Vec<String>,
}

/// Score `predictions` against `labels`.
///
/// Predictions for unlabeled images are ignored.
#[must_use]
pub fn evaluate(labels: &Labels, predictions: &BTreeMap<String, bool>) -> Evaluation {
    let mut correct = 0;
    let mut mismatches = Vec::new();
    let mut missing = Vec::new();

    for (name, &expected) in labels {
        match predictions.get(name) {
            Some(&predicted) if predicted == expected => correct += 1,
            Some(&predicted) => mismatches.push(Mismatch {
                name: name.clone(),
                expected,
                predicted,
            }),
            None => missing.push(name.clone()),
        }
    }

    let total = correct + mismatches.len();
    #[allow(clippy::cast_precision_loss)]
    let accuracy = if total == 0 {
        0.0
    } else {
        correct as f64 / total as f64
    };

    Evaluation {
        total,
        correct,
        accuracy,
        mismatches,
        missing,
    }
}
