pub mod classifier;

pub use classifier::{ClassificationEngine, HideReason, Verdict};
