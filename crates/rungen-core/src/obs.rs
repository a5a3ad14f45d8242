//! Structured observability hooks for a generator invocation.
//!
//! This module provides:
//! - A run-scoped tracing span via the `RunSpan` RAII guard
//! - Emission functions for the selection and emission lifecycle
//!
//! Events go to the subscriber configured by [`crate::init_tracing`], which
//! writes to stderr so that stdout carries only the message stream.

use tracing::{debug, info, warn};

/// RAII guard that enters a span tagged with the run id and correlation id.
///
/// # Example
///
/// ```ignore
/// let _span = RunSpan::enter("210101_M00001_0001_000000000-AAAAA", &correlation_id);
/// // every event emitted while building this run's messages carries both ids
/// ```
pub struct RunSpan {
    _span: tracing::span::EnteredSpan,
}

impl RunSpan {
    pub fn enter(run_id: &str, correlation_id: &str) -> Self {
        let span = tracing::info_span!("rungen.run", run_id = %run_id, correlation_id = %correlation_id);
        Self {
            _span: span.entered(),
        }
    }
}

/// Emit event: parent directory scanned.
pub fn emit_scan_completed(parent: &std::path::Path, candidates: usize) {
    info!(event = "scan.completed", parent = %parent.display(), candidates = candidates);
}

/// Emit event: a candidate failed a criterion (debug level; most candidates are rejected).
pub fn emit_run_rejected(run_id: &str, criterion: &str) {
    debug!(event = "run.rejected", run_id = %run_id, criterion = %criterion);
}

/// Emit event: a candidate's evaluation failed and it was skipped.
pub fn emit_run_skipped(run_id: &str, error: &dyn std::fmt::Display) {
    warn!(event = "run.skipped", run_id = %run_id, error = %error);
}

/// Emit event: a run was selected and its messages emitted.
pub fn emit_run_selected(run_id: &str, correlation_id: &str, messages: usize) {
    info!(
        event = "run.selected",
        run_id = %run_id,
        correlation_id = %correlation_id,
        messages = messages,
    );
}

/// Emit event: one message line written (debug level).
pub fn emit_message_written(message_id: &str, correlation_id: Option<&str>) {
    debug!(
        event = "message.written",
        message_id = %message_id,
        correlation_id = correlation_id.unwrap_or(""),
    );
}

/// Emit event: invocation finished.
pub fn emit_generation_finished(candidates: usize, selected: usize, skipped: usize, messages: usize) {
    info!(
        event = "generation.finished",
        candidates = candidates,
        selected = selected,
        skipped = skipped,
        messages = messages,
    );
}
