// Export modules
pub mod augment;
pub mod config;
pub mod confusion_matrix;
pub mod corpus;
pub mod dataset;
pub mod evaluate;
pub mod failures;
pub mod normalize;
pub mod providers;

// Re-export commonly used types
pub use config::{Config, RunMode};
