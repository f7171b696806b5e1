pub mod inference;
pub mod metrics;
pub mod staging;

pub use inference::{InferenceOutput, InferenceRunner, ScriptRunner};
pub use metrics::{get_metrics, init_metrics};
pub use staging::{ArtifactPath, StagedFile};
