pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod rotator;
pub mod storage;
pub mod vertex;

pub use config::VertexConfig;
pub use error::{Result, VertexError};
pub use models::{GenerationRequest, GenerationResult, SavedImage};
pub use rotator::KeyRotator;
pub use storage::ArtifactStore;
pub use vertex::{HttpTransport, ImageClient, ProviderTransport, VertexClient};
