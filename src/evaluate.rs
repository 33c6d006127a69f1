use std::fs;
use std::path::Path;

use crate::config::Config;
use crate::confusion_matrix::ConfusionCounts;
use crate::corpus::{encode_jpeg, list_class_dirs, list_images, write_audit_csv, UploadRecord};
use crate::failures::{FailureSink, FailureStage, ItemFailure};
use crate::normalize::normalize_image;
use crate::providers::{PredictionService, Prediction, ProjectId};

/// Everything an evaluation run produced: true labels in first-seen order,
/// (true, predicted) occurrence counts, and the audit rows for testModel.csv
pub struct EvaluationOutcome {
    pub labels: Vec<String>,
    pub counts: ConfusionCounts,
    pub records: Vec<UploadRecord>,
}

/// Score the trained model against a class-labeled test tree.
///
/// Mirrors the corpus traversal, but each image goes to the prediction
/// service instead of being uploaded; the top prediction is tallied against
/// the directory-derived true label. Per-image failures (including an empty
/// prediction list) are reported to the sink and skipped; labels, counts and
/// audit rows reflect successes only.
pub fn evaluate_model(
    config: &Config,
    prediction: &mut dyn PredictionService,
    project: &ProjectId,
    sink: &mut dyn FailureSink,
    root: &Path,
) -> Result<EvaluationOutcome, Box<dyn std::error::Error>> {
    if !root.exists() || !root.is_dir() {
        return Err(format!(
            "Test set directory does not exist or is not a directory: {}",
            root.display()
        )
        .into());
    }

    let class_dirs = list_class_dirs(root)?;
    if class_dirs.is_empty() {
        return Err(format!("No class subdirectories found in {}", root.display()).into());
    }

    println!("Evaluating model against: {}", root.display());

    let mut outcome = EvaluationOutcome {
        labels: Vec::new(),
        counts: ConfusionCounts::new(),
        records: Vec::new(),
    };

    for class_dir in &class_dirs {
        let label = class_dir
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        for path in list_images(class_dir, config)? {
            println!("Actual tag: {}", label);

            let predictions = match predict_one(config, prediction, project, &path) {
                Ok(predictions) => predictions,
                Err(failure) => {
                    sink.report(failure);
                    continue;
                }
            };

            for entry in &predictions {
                println!("\t{}: {:.1}%", entry.label, entry.probability * 100.0);
            }

            let top = &predictions[0];
            *outcome
                .counts
                .entry((label.clone(), top.label.clone()))
                .or_insert(0) += 1;

            if !outcome.labels.contains(&label) {
                outcome.labels.push(label.clone());
            }
            outcome.records.push(UploadRecord {
                label: label.clone(),
                path: path.to_string_lossy().to_string(),
            });
        }
    }

    let audit_path = root.join("testModel.csv");
    write_audit_csv(&outcome.records, &audit_path)?;
    println!(
        "Evaluation complete: {} test images scored, audit written to {}",
        outcome.records.len(),
        audit_path.display()
    );

    Ok(outcome)
}

// Run one test image through (optional) normalization and the prediction
// service. An empty prediction list counts as a failure for this image.
fn predict_one(
    config: &Config,
    prediction: &mut dyn PredictionService,
    project: &ProjectId,
    path: &Path,
) -> Result<Vec<Prediction>, ItemFailure> {
    let item = path.display().to_string();

    let raw = fs::read(path)
        .map_err(|e| ItemFailure::new(FailureStage::Decode, item.as_str(), e))?;

    let bytes = if config.perform_augmentation {
        let img = image::load_from_memory(&raw)
            .map_err(|e| ItemFailure::new(FailureStage::Decode, item.as_str(), e))?;
        let normalized = normalize_image(&img, config.target_image_size, config.pad_pixels)
            .map_err(|e| ItemFailure::new(FailureStage::Normalize, item.as_str(), e))?;
        encode_jpeg(&normalized, config.jpeg_quality)
            .map_err(|e| ItemFailure::new(FailureStage::Normalize, item.as_str(), e))?
    } else {
        raw
    };

    let predictions = prediction
        .predict(project, &bytes)
        .map_err(|e| ItemFailure::new(FailureStage::Predict, item.as_str(), e))?;

    if predictions.is_empty() {
        return Err(ItemFailure::new(
            FailureStage::Predict,
            item.as_str(),
            "prediction service returned no predictions",
        ));
    }

    Ok(predictions)
}
