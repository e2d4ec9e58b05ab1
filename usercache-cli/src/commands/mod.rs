//! CLI command implementations.
//!
//! Each subcommand has its own module with argument definitions and handlers.
//!
//! # Command Modules
//!
//! - [`cache`] - Cache management (clear, stats)
//! - [`classify`] - Entry type classification
//! - [`thumb`] - Thumbnail generation through the cache
//! - [`tile`] - Map tile generation through the cache

pub mod cache;
pub mod classify;
pub mod common;
pub mod thumb;
pub mod tile;
