use std::fs;
use std::path::Path;
use std::time::Duration;

use rand::{Rng, RngCore};

use crate::config::Config;
use crate::corpus::{list_class_dirs, list_images};
use crate::failures::{FailureSink, FailureStage, ItemFailure};
use crate::providers::{RatePacer, SmartResizeService};

/// How many images landed on each side of the split
#[derive(Debug, Default, PartialEq)]
pub struct SplitSummary {
    pub training: usize,
    pub test: usize,
}

/// Split a class-labeled source tree into TrainingSet and TestSet.
///
/// Every image is assigned by an independent random draw against
/// `train_ratio`. When a smart-resize service is supplied, each image's bytes
/// are sent through it (target x target) and the returned bytes are written
/// instead of a raw copy; the service is rate limited, so a delay is inserted
/// after every Nth call. Per-image failures are reported to the sink and the
/// split carries on.
pub fn split_dataset(
    config: &Config,
    mut assist: Option<&mut dyn SmartResizeService>,
    rng: &mut dyn RngCore,
    sink: &mut dyn FailureSink,
) -> Result<SplitSummary, Box<dyn std::error::Error>> {
    let source_root = config.get_source_dir();
    if !source_root.exists() || !source_root.is_dir() {
        return Err(format!(
            "Source directory does not exist or is not a directory: {}",
            source_root.display()
        )
        .into());
    }

    let class_dirs = list_class_dirs(&source_root)?;
    if class_dirs.is_empty() {
        return Err(format!("No class subdirectories found in {}", source_root.display()).into());
    }

    let training_root = config.get_training_set_dir();
    let test_root = config.get_test_set_dir();
    println!("TrainingSetPath: {}", training_root.display());
    println!("TestSetPath: {}", test_root.display());

    let mut pacer = RatePacer::new(
        config.smart_resize_pace_every,
        Duration::from_secs(config.smart_resize_pace_secs),
    );
    let mut summary = SplitSummary::default();

    for class_dir in &class_dirs {
        let label = class_dir
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();
        println!("Starting the process for: {}", label);

        let training_dir = training_root.join(&label);
        let test_dir = test_root.join(&label);
        fs::create_dir_all(&training_dir)?;
        fs::create_dir_all(&test_dir)?;

        for path in list_images(class_dir, config)? {
            let is_training = rng.gen_bool(config.train_ratio);
            let dest_dir = if is_training { &training_dir } else { &test_dir };
            let dest = dest_dir.join(path.file_name().unwrap_or_default());

            let placed = match assist.as_deref_mut() {
                Some(service) => {
                    pacer.pace();
                    resize_into(config, service, &path, &dest)
                }
                None => fs::copy(&path, &dest).map(|_| ()).map_err(|e| {
                    ItemFailure::new(FailureStage::Copy, path.display().to_string(), e)
                }),
            };

            match placed {
                Ok(()) => {
                    if is_training {
                        summary.training += 1;
                    } else {
                        summary.test += 1;
                    }
                }
                Err(failure) => sink.report(failure),
            }
        }
    }

    println!(
        "Split complete: {} training images, {} test images",
        summary.training, summary.test
    );
    Ok(summary)
}

// Push one image through the smart-resize service and write the result
fn resize_into(
    config: &Config,
    assist: &mut dyn SmartResizeService,
    source: &Path,
    dest: &Path,
) -> Result<(), ItemFailure> {
    let item = source.display().to_string();

    let raw = fs::read(source)
        .map_err(|e| ItemFailure::new(FailureStage::Decode, item.as_str(), e))?;
    let resized = assist
        .resize(&raw, config.target_image_size, config.target_image_size)
        .map_err(|e| ItemFailure::new(FailureStage::SmartResize, item.as_str(), e))?;
    fs::write(dest, resized)
        .map_err(|e| ItemFailure::new(FailureStage::Copy, item.as_str(), e))
}
