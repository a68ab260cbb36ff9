//! # Marque Interfaces
//!
//! Core interfaces and traits shared across the Marque workspace.
//!
//! This crate is the neutral ground between the resilience core and its
//! collaborators: the key-value store every service caches through, and
//! the metrics recorder every component reports into. It depends on no
//! other workspace member, so any crate can consume these traits without
//! creating circular dependencies.
//!
//! ## Main Interfaces
//!
//! - [`KvStore`] - Key-value store with TTL, pattern scans, atomic
//!   increment, and pipelined batches
//! - [`MetricsRecorder`] - Latency and outcome reporting for guarded
//!   operations

pub mod kv;
pub mod metrics;

// Re-export commonly used types
pub use kv::{KvCommand, KvError, KvReply, KvResult, KvStore};
pub use metrics::{LogMetrics, MetricsRecorder, NoopMetrics, OperationStatus, SharedMetrics};
