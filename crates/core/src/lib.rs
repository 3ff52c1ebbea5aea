pub mod detection;
pub mod embedding;
pub mod gallery;
pub mod pipeline;
pub mod shared;

/// Error type returned by the pluggable face capabilities.
pub type CapabilityError = Box<dyn std::error::Error + Send + Sync>;
