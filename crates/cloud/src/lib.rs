//! # ForestWatch Cloud
//!
//! Scene discovery and download from STAC catalogs.
//!
//! [`StacClient`] wraps STAC Item Search with pagination, retries and
//! Planetary Computer asset signing. [`StacSceneSource`] adapts it to the
//! blocking [`forestwatch_core::SceneSource`] trait used by the monitor:
//! matching items are searched once, then each scene's NIR, red and QA
//! bands are downloaded and decoded lazily.

pub mod error;
pub mod scene_source;
pub mod stac_client;
pub mod stac_models;

pub use error::{CloudError, Result};
pub use scene_source::{StacSceneSource, StacSourceConfig};
pub use stac_client::{StacCatalog, StacClient, StacClientOptions};
pub use stac_models::{StacItem, StacItemCollection, StacSearchParams};
