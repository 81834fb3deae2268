//! Server-side components of `pichord-server`.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/env configuration and validation.
//! - [`identity`] - bearer-token verification of participants.
//! - [`scheduler`] - periodic background re-render.
//! - [`service`] - axum routes and error mapping.
//! - [`telemetry`] - logging, optional OpenTelemetry export and metrics.

pub mod config;
pub mod identity;
pub mod scheduler;
pub mod service;
pub mod telemetry;
