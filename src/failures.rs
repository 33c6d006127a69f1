use std::fmt;

/// Pipeline stage in which a per-item failure occurred
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureStage {
    Decode,
    Normalize,
    Augment,
    Upload,
    Predict,
    SmartResize,
    Copy,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureStage::Decode => "decode",
            FailureStage::Normalize => "normalize",
            FailureStage::Augment => "augment",
            FailureStage::Upload => "upload",
            FailureStage::Predict => "predict",
            FailureStage::SmartResize => "smart_resize",
            FailureStage::Copy => "copy",
        };
        write!(f, "{}", name)
    }
}

/// A single skipped item: which stage failed, for which item, and why
#[derive(Debug, Clone)]
pub struct ItemFailure {
    pub stage: FailureStage,
    pub item: String,
    pub cause: String,
}

impl ItemFailure {
    pub fn new(stage: FailureStage, item: impl Into<String>, cause: impl fmt::Display) -> Self {
        ItemFailure {
            stage,
            item: item.into(),
            cause: cause.to_string(),
        }
    }
}

/// Receives per-item failures so a batch can skip the item and keep going.
/// Batch-level failures never go through the sink; they propagate as errors.
pub trait FailureSink {
    fn report(&mut self, failure: ItemFailure);
}

/// Default sink: log and move on
pub struct LogSink;

impl FailureSink for LogSink {
    fn report(&mut self, failure: ItemFailure) {
        log::warn!(
            "skipping {} (failed during {}): {}",
            failure.item,
            failure.stage,
            failure.cause
        );
    }
}

/// Collects failures for later inspection; used by tests
#[derive(Default)]
pub struct CollectSink {
    pub failures: Vec<ItemFailure>,
}

impl FailureSink for CollectSink {
    fn report(&mut self, failure: ItemFailure) {
        self.failures.push(failure);
    }
}
