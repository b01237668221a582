//! cloud-bucket - one object storage bucket, many deployment targets
//!
//! This crate provides:
//! - A uniform async client contract with simulator and GCS backends
//! - Per-target synthesis of a logical bucket into a resource graph
//! - Least-privilege binding of consumers from their declared operations
//! - redb-backed deployment state that keeps generated names stable
//! - An HTTP service exposing the local simulator's buckets

pub mod api;
pub mod app;
pub mod binding;
pub mod client;
pub mod config;
pub mod infra;
pub mod resource;
pub mod state;
pub mod target;
#[cfg(test)]
pub mod testutil;

use client::SimRegistry;
use config::Config;

/// Shared state of the simulator service
pub struct AppState {
    pub config: Config,
    pub registry: SimRegistry,
}
