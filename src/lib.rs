// src/lib.rs
//! Tile-based deferred light culling.
//!
//! The screen is split into 8×8-pixel tiles. For every tile a view-space
//! frustum is built once per resolution; every frame one fused pass reduces
//! the tile's depth bounds and tests all point lights against the frustum,
//! producing an opaque and a transparent light list. Lighting then looks up
//! `pixel / 8` in the light grid to find which lights to evaluate.
//!
//! The CPU path in [`culler`] mirrors the compute-shader structure of
//! [`gpu`]: one task per tile, 64 lanes, shared atomics and a global bump
//! allocator per list.

// -------------------------------
// Core
// -------------------------------
pub mod context;
pub mod error;
pub mod math;
pub mod tiles;

pub mod camera;
pub mod config;
pub mod gbuffer;
pub mod light;

// -------------------------------
// Culling
// -------------------------------
pub mod culler;
pub mod frustum_grid;
pub mod light_grid;
pub mod resolver;

// -------------------------------
// Frame orchestration
// -------------------------------
pub mod arena;
pub mod backend;
pub mod demo;
pub mod renderer;
pub mod resize;

#[cfg(not(target_arch = "wasm32"))]
pub mod gpu;

pub use backend::{RecordingBackend, RenderBackend, RenderContext, Stage};
pub use camera::{Camera, DepthConvention};
pub use config::CullingConfig;
pub use culler::{CullStats, LightCuller, ThreadOrder};
pub use error::{Error, Result};
pub use frustum_grid::FrustumGrid;
pub use gbuffer::{GBuffer, GBufferProducer, Surface};
pub use light::{LightSet, PointLight};
pub use light_grid::{LightGridEntry, LightList, LightLists, ListKind};
pub use renderer::{FrameStats, TiledRenderer};
pub use resize::{ResizeCoordinator, ResizeState};
pub use resolver::LightingResolver;
pub use tiles::{TileGrid, MAX_LIGHTS_PER_TILE, MAX_POINT_LIGHTS, TILE_SIZE};
