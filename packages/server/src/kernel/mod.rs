// Kernel - core infrastructure with dependency injection
//
// The kernel owns the job pipeline machinery (queue, worker, processors'
// registry, retry policy), the asset lifecycle, and the trait seams to the
// external collaborators (renderer, design AI, object storage).
//
// IMPORTANT: Kernel is for INFRASTRUCTURE only, not business logic.
// Business entities (templates, decks, versions) live in the domains layer.

pub mod assets;
pub mod config;
pub mod db;
pub mod deps;
pub mod jobs;
pub mod storage;
pub mod test_dependencies;
pub mod traits;

pub use config::ServiceConfig;
pub use deps::ServerDeps;
pub use storage::FsObjectStorage;
pub use test_dependencies::{
    test_deps, test_deps_with_config, MockDesignAi, MockObjectStorage, MockRenderer,
    TestDependencies,
};
pub use traits::*;
