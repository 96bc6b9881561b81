// Resolver module - media reference resolution and downloads

pub mod classifier;
pub mod config;
pub mod diagnostics;
pub mod duration;
pub mod entities;
pub mod errors;
pub mod executor;
pub mod flags;
pub mod formats;
pub mod models;
pub mod orchestrator;
pub mod providers;
pub mod tools;
pub mod utils;

pub use config::ResolverConfig;
pub use entities::{extract_media_url, ChatMessage, EntityKind, MessageEntity};
pub use errors::{ResolveError, Result};
pub use executor::{DownloadExecutor, DownloadState};
pub use flags::{FeatureFlags, StaticFlags};
pub use models::{
    DownloadArtifact, DownloadMode, DownloadRequest, DurationInfo, FormatDescriptor, MediaSummary,
    TrackDetails,
};
pub use orchestrator::Orchestrator;
pub use providers::{MediaProvider, ProviderRegistry};
