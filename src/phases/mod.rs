//! The phases of a build.
//!
//! ## Overview
//!
//! 1. Discovery - resolve the inheritance graph of layers
//! 2. Composition - merge the layers into one build configuration and
//!    hydrate its inputs with hash placeholders
//! 3. Rendering - run every chart and resource creation in parallel
//! 4. Overlay - run the overlay tool and the optional kustomization
//! 5. Partitioning - split the stream into per-resource files and hash them
//! 6. Writing - hydrate again with the digests and deliver the resources
//!
//! The [`orchestrator`] drives a build through these phases.

pub mod compose;
pub mod discovery;
pub mod orchestrator;
pub mod overlay;
pub mod render;
pub mod split;
pub mod write;

pub use compose::{BuildConfig, BuildOptions, OutputTarget};
pub use discovery::Layer;
pub use orchestrator::{BuildReport, BuildState, Runner};
