use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Available run modes for the application
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Split a source tree into TrainingSet and TestSet
    Split,
    /// Build the training corpus and train the model
    Prepare,
    /// Score the trained model against the test set
    Evaluate,
    /// Run split, prepare and evaluate in sequence
    Full,
}

impl Default for RunMode {
    fn default() -> Self {
        RunMode::Full
    }
}

/// Application configuration structure that matches config.json
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    // Directory paths
    pub source_directory: String,
    pub dataset_directory: String,
    pub output_directory: String,

    // Remote project settings
    #[serde(default)]
    pub project_name: String,

    // Image preparation settings
    #[serde(default = "default_target_image_size")]
    pub target_image_size: u32,
    #[serde(default = "default_pad_pixels")]
    pub pad_pixels: u32,
    #[serde(default = "default_jpeg_quality")]
    pub jpeg_quality: u8,
    #[serde(default = "default_supported_formats")]
    pub supported_formats: Vec<String>,

    // Augmentation settings
    #[serde(default = "default_true")]
    pub perform_augmentation: bool,
    #[serde(default = "default_variant_count")]
    pub variant_count: usize,

    // Dataset split settings
    #[serde(default = "default_train_ratio")]
    pub train_ratio: f64,

    // Smart resize (normalization assist) settings
    #[serde(default = "default_true")]
    pub perform_smart_resize: bool,
    #[serde(default = "default_pace_every")]
    pub smart_resize_pace_every: usize,
    #[serde(default = "default_pace_secs")]
    pub smart_resize_pace_secs: u64,

    // Phase toggles
    #[serde(default = "default_true")]
    pub perform_split: bool,
    #[serde(default = "default_true")]
    pub train_model: bool,
    #[serde(default = "default_true")]
    pub test_model: bool,

    // General settings
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // Mode selection
    #[serde(default)]
    pub run_mode: RunMode,
}

// Default functions for parameters
fn default_target_image_size() -> u32 {
    // 299 suits ResNet V2 style transfer learning; 224/192/160/128 trade accuracy for speed
    299
}

fn default_pad_pixels() -> u32 {
    10
}

fn default_jpeg_quality() -> u8 {
    95
}

fn default_supported_formats() -> Vec<String> {
    vec![
        "jpg".to_string(),
        "jpeg".to_string(),
        "png".to_string(),
        "gif".to_string(),
        "bmp".to_string(),
        "webp".to_string(),
    ]
}

fn default_variant_count() -> usize {
    3
}

fn default_train_ratio() -> f64 {
    0.8
}

fn default_pace_every() -> usize {
    5
}

fn default_pace_secs() -> u64 {
    2
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Config {
    /// Load configuration from file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, Box<dyn std::error::Error>> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_json::from_reader(reader)?;
        Ok(config)
    }

    /// Get source directory (one subdirectory per class of raw images)
    pub fn get_source_dir(&self) -> PathBuf {
        PathBuf::from(&self.source_directory)
    }

    /// Get the dataset root (holds TrainingSet and TestSet)
    pub fn get_dataset_dir(&self) -> PathBuf {
        PathBuf::from(&self.dataset_directory)
    }

    /// Get the training set directory
    pub fn get_training_set_dir(&self) -> PathBuf {
        self.get_dataset_dir().join("TrainingSet")
    }

    /// Get the test set directory
    pub fn get_test_set_dir(&self) -> PathBuf {
        self.get_dataset_dir().join("TestSet")
    }

    /// Get output directory
    pub fn get_output_dir(&self) -> PathBuf {
        PathBuf::from(&self.output_directory)
    }

    /// Get the directory where the local training stand-in materializes uploads
    pub fn get_uploads_dir(&self) -> PathBuf {
        self.get_output_dir().join("uploads")
    }

    /// Check if a file extension is supported
    pub fn is_supported_format(&self, extension: &str) -> bool {
        self.supported_formats
            .iter()
            .any(|format| format.eq_ignore_ascii_case(extension))
    }

    /// Project name from config, or one generated from the class names
    pub fn project_name_or_default(&self, labels: &[String]) -> String {
        if !self.project_name.is_empty() {
            return self.project_name.clone();
        }
        let stamp = chrono::Local::now().format("%Y%m%d%H%M");
        if labels.len() == 2 {
            format!("{} {} classifier {}", labels[0], labels[1], stamp)
        } else {
            stamp.to_string()
        }
    }

    /// Save configuration to file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), Box<dyn std::error::Error>> {
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    /// Get the default configuration
    pub fn default() -> Self {
        Self {
            source_directory: "data/source".to_string(),
            dataset_directory: "data/dataset".to_string(),
            output_directory: "data/output".to_string(),

            project_name: String::new(),

            target_image_size: 299,
            pad_pixels: 10,
            jpeg_quality: 95,
            supported_formats: default_supported_formats(),

            perform_augmentation: true,
            variant_count: 3,

            train_ratio: 0.8,

            perform_smart_resize: true,
            smart_resize_pace_every: 5,
            smart_resize_pace_secs: 2,

            perform_split: true,
            train_model: true,
            test_model: true,

            log_level: "info".to_string(),

            run_mode: RunMode::Full,
        }
    }
}

/// Load the configuration, creating a default one if it doesn't exist
pub fn load_config() -> Result<Config, Box<dyn std::error::Error>> {
    let config_path = "config.json";

    if !std::path::Path::new(config_path).exists() {
        let default_config = Config::default();
        default_config.save_to_file(config_path)?;
        println!("Created default configuration file: {}", config_path);
    }

    let mut config = Config::from_file(config_path)?;

    // Validate and apply post-load logic
    if config.log_level.is_empty() {
        config.log_level = default_log_level();
    }
    if config.train_ratio < 0.0 || config.train_ratio > 1.0 {
        return Err(format!("train_ratio must be between 0.0 and 1.0, got {}", config.train_ratio).into());
    }

    Ok(config)
}
