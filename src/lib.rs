//! # avatar-core
//!
//! Background work-queue draining and ordered live-session delivery for the
//! avatar chat service.
//!
//! Provides the drain loop over pending thumbnail-count and serve-time work
//! (Postgres + pgmq, or in memory), the transcription ordering gate used by
//! live sessions, an HTTP trigger surface, and OpenTelemetry observability.

pub mod config;
pub mod db;
pub mod drain;
pub mod error;
pub mod health;
pub mod http;
pub mod model;
pub mod schedule;
pub mod sequencer;
pub mod store;
pub mod telemetry;
