//! Asset lifecycle: produced bytes bound to durable, opaque identifiers.

pub mod asset;
pub mod postgres;
pub mod store;

pub use asset::{Asset, AssetKind};
pub use postgres::PgAssetStore;
pub use store::{AssetStore, AssetStoreError, InMemoryAssetStore};
