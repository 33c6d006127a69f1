use std::fs;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::DynamicImage;
use rand::RngCore;
use serde::Serialize;

use crate::augment::generate_variants;
use crate::config::Config;
use crate::failures::{FailureSink, FailureStage, ItemFailure};
use crate::normalize::normalize_image;
use crate::providers::{ProjectId, TagId, TrainingService};

/// One audit row: class label plus the source file it came from
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UploadRecord {
    pub label: String,
    pub path: String,
}

/// Encode an image as JPEG bytes at the given quality
pub fn encode_jpeg(img: &DynamicImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    let mut bytes = Vec::new();
    let mut cursor = std::io::Cursor::new(&mut bytes);
    JpegEncoder::new_with_quality(&mut cursor, quality).encode_image(&img.to_rgb8())?;
    Ok(bytes)
}

/// List the class subdirectories of a dataset root
pub fn list_class_dirs(root: &Path) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let dirs: Vec<PathBuf> = fs::read_dir(root)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_dir())
        .collect();
    Ok(dirs)
}

/// List the supported image files directly inside a class directory
pub fn list_images(dir: &Path, config: &Config) -> Result<Vec<PathBuf>, Box<dyn std::error::Error>> {
    let images: Vec<PathBuf> = fs::read_dir(dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file() && is_supported_image_file(path, config))
        .collect();
    Ok(images)
}

// Check if a file is a supported image format
fn is_supported_image_file(path: &Path, config: &Config) -> bool {
    match path.extension() {
        Some(ext) => config.is_supported_format(&ext.to_string_lossy()),
        None => false,
    }
}

/// Build the training corpus: one tag per class subdirectory, then for every
/// image upload the normalized base plus its augmented variants. A failure on
/// one image is reported to the sink and the batch moves on; tag creation
/// failures abort the run.
///
/// With augmentation disabled the raw file bytes are uploaded untouched.
pub fn build_corpus(
    config: &Config,
    training: &mut dyn TrainingService,
    project: &ProjectId,
    rng: &mut dyn RngCore,
    sink: &mut dyn FailureSink,
    root: &Path,
) -> Result<Vec<UploadRecord>, Box<dyn std::error::Error>> {
    if !root.exists() || !root.is_dir() {
        return Err(format!(
            "Training set directory does not exist or is not a directory: {}",
            root.display()
        )
        .into());
    }

    let class_dirs = list_class_dirs(root)?;
    if class_dirs.is_empty() {
        return Err(format!("No class subdirectories found in {}", root.display()).into());
    }

    println!("Building corpus from: {}", root.display());
    println!("Augmentation: {}, variants per image: {}",
             config.perform_augmentation, config.variant_count);

    let mut records = Vec::new();

    for class_dir in &class_dirs {
        let name = class_dir
            .file_name()
            .unwrap_or_default()
            .to_string_lossy()
            .to_string();

        println!("Adding tag - {}", name);
        let tag = training.create_tag(project, &name)?;

        for path in list_images(class_dir, config)? {
            println!("Uploading image with tag: {}", tag.name);
            match upload_one(config, training, project, &tag.id, rng, &path) {
                Ok(()) => records.push(UploadRecord {
                    label: name.clone(),
                    path: path.to_string_lossy().to_string(),
                }),
                Err(failure) => sink.report(failure),
            }
        }
    }

    let audit_path = root.join("trainingModel.csv");
    write_audit_csv(&records, &audit_path)?;
    println!(
        "Corpus complete: {} images uploaded, audit written to {}",
        records.len(),
        audit_path.display()
    );

    Ok(records)
}

// Process a single source image and push every resulting byte stream to the
// training service. Any error maps to a structured per-item failure.
fn upload_one(
    config: &Config,
    training: &mut dyn TrainingService,
    project: &ProjectId,
    tag_id: &TagId,
    rng: &mut dyn RngCore,
    path: &Path,
) -> Result<(), ItemFailure> {
    let item = path.display().to_string();
    let tag_ids = [tag_id.clone()];

    let raw = fs::read(path)
        .map_err(|e| ItemFailure::new(FailureStage::Decode, item.as_str(), e))?;

    if !config.perform_augmentation {
        return training
            .upload_image(project, &raw, &tag_ids)
            .map_err(|e| ItemFailure::new(FailureStage::Upload, item.as_str(), e));
    }

    let img = image::load_from_memory(&raw)
        .map_err(|e| ItemFailure::new(FailureStage::Decode, item.as_str(), e))?;
    let normalized = normalize_image(&img, config.target_image_size, config.pad_pixels)
        .map_err(|e| ItemFailure::new(FailureStage::Normalize, item.as_str(), e))?;

    let base = encode_jpeg(&normalized, config.jpeg_quality)
        .map_err(|e| ItemFailure::new(FailureStage::Normalize, item.as_str(), e))?;
    training
        .upload_image(project, &base, &tag_ids)
        .map_err(|e| ItemFailure::new(FailureStage::Upload, item.as_str(), e))?;

    for variant in generate_variants(&normalized, config.variant_count, rng) {
        let bytes = encode_jpeg(&variant, config.jpeg_quality)
            .map_err(|e| ItemFailure::new(FailureStage::Augment, item.as_str(), e))?;
        training
            .upload_image(project, &bytes, &tag_ids)
            .map_err(|e| ItemFailure::new(FailureStage::Upload, item.as_str(), e))?;
    }

    Ok(())
}

/// Write header-less (label, path) audit rows, replacing any previous file
pub fn write_audit_csv(records: &[UploadRecord], path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    if path.exists() {
        fs::remove_file(path)?;
    }
    let mut writer = csv::WriterBuilder::new().has_headers(false).from_path(path)?;
    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    use crate::failures::CollectSink;
    use crate::providers::Tag;

    struct CountingTrainingService {
        tags: Vec<String>,
        uploads: Vec<Vec<u8>>,
    }

    impl CountingTrainingService {
        fn new() -> Self {
            CountingTrainingService { tags: Vec::new(), uploads: Vec::new() }
        }
    }

    impl TrainingService for CountingTrainingService {
        fn find_or_create_project(&mut self, name: &str) -> Result<ProjectId, Box<dyn std::error::Error>> {
            Ok(ProjectId(name.to_string()))
        }

        fn create_tag(&mut self, _project: &ProjectId, name: &str) -> Result<Tag, Box<dyn std::error::Error>> {
            self.tags.push(name.to_string());
            Ok(Tag { id: TagId(name.to_string()), name: name.to_string() })
        }

        fn upload_image(
            &mut self,
            _project: &ProjectId,
            bytes: &[u8],
            _tag_ids: &[TagId],
        ) -> Result<(), Box<dyn std::error::Error>> {
            self.uploads.push(bytes.to_vec());
            Ok(())
        }

        fn train(&mut self, _project: &ProjectId) -> Result<(), Box<dyn std::error::Error>> {
            Ok(())
        }
    }

    fn temp_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("vision_trainer_corpus_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_jpeg(path: &Path, color: [u8; 3]) {
        let img = RgbImage::from_pixel(48, 64, Rgb(color));
        DynamicImage::ImageRgb8(img).save(path).unwrap();
    }

    fn test_config() -> Config {
        let mut config = Config::default();
        config.target_image_size = 64;
        config.pad_pixels = 4;
        config.variant_count = 3;
        config
    }

    #[test]
    fn one_bad_image_does_not_abort_the_batch() {
        let root = temp_dir("isolation");
        let class_dir = root.join("cat");
        fs::create_dir_all(&class_dir).unwrap();

        for i in 0..2 {
            write_jpeg(&class_dir.join(format!("good_{}.jpg", i)), [200, 10, 10]);
        }
        fs::write(class_dir.join("broken.jpg"), b"not really a jpeg").unwrap();
        for i in 2..4 {
            write_jpeg(&class_dir.join(format!("good_{}.jpg", i)), [200, 10, 10]);
        }

        let config = test_config();
        let mut training = CountingTrainingService::new();
        let mut sink = CollectSink::default();
        let mut rng = StdRng::seed_from_u64(11);
        let project = ProjectId("p".to_string());

        let records = build_corpus(&config, &mut training, &project, &mut rng, &mut sink, &root).unwrap();

        assert_eq!(records.len(), 4);
        assert_eq!(sink.failures.len(), 1);
        assert_eq!(sink.failures[0].stage, FailureStage::Decode);
        assert!(sink.failures[0].item.contains("broken.jpg"));
        // base + 3 variants for each of the 4 good images
        assert_eq!(training.uploads.len(), 16);

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn augmentation_disabled_uploads_raw_bytes() {
        let root = temp_dir("raw");
        let class_dir = root.join("dog");
        fs::create_dir_all(&class_dir).unwrap();
        write_jpeg(&class_dir.join("only.jpg"), [10, 10, 200]);
        let raw = fs::read(class_dir.join("only.jpg")).unwrap();

        let mut config = test_config();
        config.perform_augmentation = false;

        let mut training = CountingTrainingService::new();
        let mut sink = CollectSink::default();
        let mut rng = StdRng::seed_from_u64(3);
        let project = ProjectId("p".to_string());

        let records = build_corpus(&config, &mut training, &project, &mut rng, &mut sink, &root).unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(training.uploads.len(), 1);
        assert_eq!(training.uploads[0], raw);
        assert!(sink.failures.is_empty());

        let _ = fs::remove_dir_all(&root);
    }

    #[test]
    fn missing_root_is_a_setup_error() {
        let config = test_config();
        let mut training = CountingTrainingService::new();
        let mut sink = CollectSink::default();
        let mut rng = StdRng::seed_from_u64(0);
        let project = ProjectId("p".to_string());

        let result = build_corpus(
            &config,
            &mut training,
            &project,
            &mut rng,
            &mut sink,
            Path::new("/definitely/not/here"),
        );
        assert!(result.is_err());
        assert!(training.tags.is_empty());
    }

    #[test]
    fn audit_csv_rows_are_label_then_path() {
        let root = temp_dir("audit");
        let records = vec![
            UploadRecord { label: "cat".to_string(), path: "a/b.jpg".to_string() },
            UploadRecord { label: "dog".to_string(), path: "c/d.jpg".to_string() },
        ];
        let path = root.join("trainingModel.csv");
        write_audit_csv(&records, &path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines, vec!["cat,a/b.jpg", "dog,c/d.jpg"]);

        let _ = fs::remove_dir_all(&root);
    }
}
