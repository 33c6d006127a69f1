use vision_trainer::config::{load_config, Config, RunMode};
use vision_trainer::confusion_matrix::{
    build_confusion_table, pretty_print_table, save_heatmap_png, save_table_csv,
};
use vision_trainer::corpus::{self, list_class_dirs};
use vision_trainer::dataset;
use vision_trainer::evaluate;
use vision_trainer::failures::LogSink;
use vision_trainer::providers::{
    LocalSmartResizeService, LocalTrainingService, ProjectId, RandomGuessPredictionService,
    TrainingService,
};

use rand::rngs::StdRng;
use rand::SeedableRng;
use std::env;
use std::path::Path;
use std::time::Instant;

// Main application
fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Get command line arguments
    let args: Vec<String> = env::args().collect();

    // If no arguments provided, run the default mode from config
    if args.len() <= 1 {
        return run_from_config();
    }

    // Handle different commands
    match args[1].as_str() {
        "split" => {
            let mut config = load_config()?;
            init_logging(&config);

            // Override source/dataset directories if provided
            if args.len() > 2 {
                config.source_directory = args[2].clone();
            }
            if args.len() > 3 {
                config.dataset_directory = args[3].clone();
            }

            run_split(&config)?;
        }
        "prepare" => {
            let mut config = load_config()?;
            init_logging(&config);

            if args.len() > 2 {
                config.dataset_directory = args[2].clone();
            }

            run_prepare(&config)?;
        }
        "evaluate" => {
            let mut config = load_config()?;
            init_logging(&config);

            if args.len() > 2 {
                config.dataset_directory = args[2].clone();
            }

            run_evaluate(&config)?;
        }
        "run" => {
            let config = load_config()?;
            init_logging(&config);
            run_full(&config)?;
        }
        "config" => {
            if args.len() < 3 {
                println!("Usage: vision-trainer config <command> [args]");
                println!("Commands:");
                println!("  create - Create default configuration file");
                println!("  show   - Show current configuration");
                println!("  check  - Check configuration settings");
                println!("  set <key> <value> - Modify a configuration setting");
                return Ok(());
            }

            match args[2].as_str() {
                "create" => create_config()?,
                "show" => show_config()?,
                "check" => check_config()?,
                "set" => {
                    if args.len() < 5 {
                        println!("Usage: vision-trainer config set <key> <value>");
                        return Ok(());
                    }
                    set_config(&args[3], &args[4])?;
                }
                _ => {
                    println!("Unknown config command: {}", args[2]);
                }
            }
        }
        "help" => {
            print_help();
        }
        _ => {
            println!("Unknown command: {}", args[1]);
            print_help();
        }
    }

    Ok(())
}

/// Run the appropriate mode based on configuration
fn run_from_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    init_logging(&config);

    println!("Running mode from configuration: {:?}", config.run_mode);

    match config.run_mode {
        RunMode::Split => run_split(&config),
        RunMode::Prepare => run_prepare(&config),
        RunMode::Evaluate => run_evaluate(&config),
        RunMode::Full => run_full(&config),
    }
}

fn init_logging(config: &Config) {
    let env = env_logger::Env::default().default_filter_or(config.log_level.clone());
    let _ = env_logger::Builder::from_env(env).try_init();
}

/// Split the source tree into TrainingSet and TestSet
fn run_split(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    println!("Splitting images from: {}", config.source_directory);
    println!("Train ratio: {:.0}%", config.train_ratio * 100.0);

    let mut sink = LogSink;
    let mut rng = rand::thread_rng();

    if config.perform_smart_resize {
        let mut assist = LocalSmartResizeService::new(config.jpeg_quality);
        dataset::split_dataset(config, Some(&mut assist), &mut rng, &mut sink)?;
    } else {
        dataset::split_dataset(config, None, &mut rng, &mut sink)?;
    }

    Ok(())
}

/// Build the training corpus and train the model
fn run_prepare(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let training_root = config.get_training_set_dir();
    let labels = class_labels(&training_root)?;

    let project_name = config.project_name_or_default(&labels);
    println!("Creating or returning project - project name: {}", project_name);

    let mut training = LocalTrainingService::new(config.get_uploads_dir());
    let project = training.find_or_create_project(&project_name)?;

    let mut sink = LogSink;
    let mut rng = rand::thread_rng();

    println!("Creating the model");
    corpus::build_corpus(config, &mut training, &project, &mut rng, &mut sink, &training_root)?;

    println!("Waiting for training process to finish");
    training.train(&project)?;

    Ok(())
}

/// Score the trained model against the test set and export the confusion matrix
fn run_evaluate(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let test_root = config.get_test_set_dir();
    let labels = class_labels(&test_root)?;

    let project_name = config.project_name_or_default(&labels);
    let project = ProjectId(project_name);

    let mut prediction = RandomGuessPredictionService::new(labels, StdRng::from_entropy());
    let mut sink = LogSink;

    println!("Testing the model");
    let outcome = evaluate::evaluate_model(config, &mut prediction, &project, &mut sink, &test_root)?;

    let table = build_confusion_table(&outcome.labels, &outcome.counts);
    pretty_print_table(&table);
    save_table_csv(&table, &test_root.join("result.csv"))?;

    if !outcome.labels.is_empty() {
        std::fs::create_dir_all(config.get_output_dir())?;
        let heatmap_path = config.get_output_dir().join("confusion_heatmap.png");
        save_heatmap_png(&outcome.labels, &outcome.counts, &heatmap_path)?;
    }

    Ok(())
}

/// Run the whole pipeline according to the configured phase toggles
fn run_full(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let start = Instant::now();

    if config.perform_split {
        run_split(config)?;
    }
    if config.train_model {
        run_prepare(config)?;
    }
    if config.test_model {
        run_evaluate(config)?;
    }

    println!("RunTime: {:?}", start.elapsed());
    Ok(())
}

/// Class labels derived from the subdirectory names of a dataset root
fn class_labels(root: &Path) -> Result<Vec<String>, Box<dyn std::error::Error>> {
    if !root.exists() || !root.is_dir() {
        return Err(format!(
            "Dataset directory does not exist or is not a directory: {}",
            root.display()
        )
        .into());
    }
    let labels = list_class_dirs(root)?
        .iter()
        .map(|dir| dir.file_name().unwrap_or_default().to_string_lossy().to_string())
        .collect();
    Ok(labels)
}

/// Create default configuration file
fn create_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = Config::default();
    config.save_to_file("config.json")?;
    println!("Created default configuration file: config.json");
    Ok(())
}

/// Show current configuration
fn show_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    println!("{:#?}", config);
    Ok(())
}

/// Check configuration settings
fn check_config() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;

    println!("Configuration check:");
    println!("  Source directory: {}", config.get_source_dir().display());
    println!("  Dataset directory: {}", config.get_dataset_dir().display());
    println!("  Output directory: {}", config.get_output_dir().display());
    println!("  Target image size: {}", config.target_image_size);
    println!("  Padding: {} px", config.pad_pixels);
    println!("  Augmentation: {} ({} variants)", config.perform_augmentation, config.variant_count);
    println!("  Train ratio: {:.0}%", config.train_ratio * 100.0);
    println!("  Smart resize: {}", config.perform_smart_resize);

    Ok(())
}

/// Set configuration setting
fn set_config(key: &str, value: &str) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config()?;

    // Update configuration based on key
    match key {
        "target_image_size" => {
            let size = value.parse::<u32>()?;
            if size < 32 || size > 2048 {
                return Err("Target image size must be between 32 and 2048".into());
            }
            config.target_image_size = size;
        }
        "pad_pixels" => {
            config.pad_pixels = value.parse::<u32>()?;
        }
        "train_ratio" => {
            let ratio = value.parse::<f64>()?;
            if ratio < 0.0 || ratio > 1.0 {
                return Err("Train ratio must be between 0.0 and 1.0".into());
            }
            config.train_ratio = ratio;
        }
        "perform_augmentation" => {
            config.perform_augmentation = value.parse::<bool>()?;
        }
        "perform_smart_resize" => {
            config.perform_smart_resize = value.parse::<bool>()?;
        }
        "project_name" => {
            config.project_name = value.to_string();
        }
        "source_directory" => {
            config.source_directory = value.to_string();
        }
        "dataset_directory" => {
            config.dataset_directory = value.to_string();
        }
        "output_directory" => {
            config.output_directory = value.to_string();
        }
        _ => {
            return Err(format!("Unknown configuration key: {}", key).into());
        }
    }

    // Save updated configuration
    config.save_to_file("config.json")?;
    println!("Updated configuration saved");
    Ok(())
}

/// Print help information
fn print_help() {
    println!("Vision Trainer - Transfer Learning Dataset Pipeline");
    println!();
    println!("Commands:");
    println!("  split [source_dir] [dataset_dir]  - Split source images into TrainingSet and TestSet");
    println!("  prepare [dataset_dir]             - Build the training corpus and train the model");
    println!("  evaluate [dataset_dir]            - Score the model and export the confusion matrix");
    println!("  run                               - Run split, prepare and evaluate in sequence");
    println!("  config <subcommand>               - Manage configuration");
    println!("  help                              - Show this help message");
    println!();
    println!("Running without arguments:");
    println!("  The application will run according to the \"run_mode\" setting in config.json");
    println!();
    println!("Available run_mode values:");
    println!("  - split");
    println!("  - prepare");
    println!("  - evaluate");
    println!("  - full");
}
