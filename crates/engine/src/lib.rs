//! Anchor resolution engine
//!
//! This crate provides:
//! - `Resolver`, which places markers at HEAD and in live buffers
//! - Coalescing of concurrent delta and blame requests
//! - TOML configuration for the engine

pub mod coalesce;
pub mod config;
pub mod resolver;

// Re-exports
pub use coalesce::Coalescer;
pub use config::EngineConfig;
pub use resolver::{
    plan_hops, AnchorReferences, MarkerRequest, NotLocated, NotLocatedReason, ReferenceLocation, Resolution,
    ResolveRequest, Resolver, UncommittedLocation,
};
