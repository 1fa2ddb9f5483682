//! Prism Render
//!
//! Shapes transformed rows into typed chart payloads and serializes results
//! into downloadable artifacts (csv, json, excel, pdf). Artifacts are written
//! through an [`ArtifactStore`] and carry a blake3 checksum of their bytes.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod builder;
pub mod chart;
pub mod error;
pub mod format;
pub mod render;
pub mod store;

pub use builder::VisualizationBuilder;
pub use chart::{ChartConfig, ChartPayload, ChartSpec, ChartType, VisualizationConfig};
pub use error::{RenderError, RenderResult};
pub use format::OutputFormat;
pub use render::{Artifact, OutputRenderer, artifact_filename, encode};
pub use store::{ArtifactStore, FsArtifactStore, MemoryArtifactStore, StoreStats};
