//! Server-side components of the greeter service.
//!
//! This module contains the building blocks necessary to run the gRPC
//! server, including service logic, worker pool orchestration, and telemetry
//! setup.
//!
//! ## Submodules
//!
//! - [`config`] - CLI/environment configuration and its validation.
//! - [`pool`] - Worker pool computing asynchronous greetings.
//! - [`service`] - The `Greeter` gRPC implementation and call admission.
//! - [`streaming`] - Server-stream emission and bidirectional sessions.
//! - [`telemetry`] - Logging initialization and optional OpenTelemetry
//!   export.
//!
//! These components are wired together in the server's `main.rs`.

pub mod config;
pub mod pool;
pub mod service;
pub mod streaming;
pub mod telemetry;
