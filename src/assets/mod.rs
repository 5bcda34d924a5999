//! # Asset Module
//!
//! Holds the uploaded assets of a session and lazily decodes their rasters.
//!
//! - [`AssetLibrary`] owns every [`AssetItem`] and the revocable resource
//!   handle minted for it
//! - [`AssetCache`] decodes image bytes off the render path and hands out
//!   shared rasters once they are ready
//!
//! A failed decode never reaches the renderer: the asset is marked
//! unavailable and any segment pointing at it renders as background only.

pub mod cache;
pub mod types;

pub use cache::{AssetCache, AssetLookup};
pub use types::{AssetId, AssetItem, AssetKind, AssetLibrary, ResourceTable, ResourceUrl};
