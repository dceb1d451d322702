//! services/api/src/lib.rs
//!
//! The HTTP service around `lingo_core`: configuration, adapters for the
//! external collaborators, and the axum web layer.

pub mod adapters;
pub mod config;
pub mod error;
pub mod web;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Installs the global tracing subscriber at the configured level.
pub fn init_tracing(level: tracing::Level) {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(level.to_string()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
