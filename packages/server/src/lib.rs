//! Presentation job pipeline.
//!
//! An asynchronous job-processing service that turns structured
//! presentation specs into rendered PPTX artifacts and slide thumbnails.
//! The core is the pipeline: a durable queue with deduplication, a polling
//! worker dispatching to per-type processors (generate, bind, render,
//! preview, export), a retry/dead-letter state machine, and an asset
//! lifecycle that binds produced bytes to opaque identifiers.
//!
//! Layering:
//!
//! - [`kernel`]: infrastructure. Job queue/worker/registry, asset stores,
//!   configuration, and the trait seams to the renderer, design AI, and
//!   object storage.
//! - [`domains`]: business entities. Templates, decks, and their spec
//!   versions.
//! - [`processors`]: the per-job-type work, wired into the registry.

pub mod domains;
pub mod kernel;
pub mod processors;
