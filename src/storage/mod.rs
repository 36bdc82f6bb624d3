pub mod artifacts;

pub use artifacts::{ArtifactStore, DEFAULT_RETENTION, IMAGE_PREFIX, SWEEP_PREFIXES};
