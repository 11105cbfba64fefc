// Copyright 2025 glcap Authors
// SPDX-License-Identifier: Apache-2.0

//! GLES frame capture and replay-generation engine
//!
//! This crate records a live GLES session (the intercepted call stream plus
//! the resource state it mutates) into a minimal replayable program: replay
//! source text per frame, setup/reset functions, a binary data blob and a
//! JSON metadata document.
//!
//! # Architecture
//!
//! ```text
//! intercepted call ──▶ FrameCallLog ──▶ per-frame CallRecord list
//!                        │  (skip / override / tracker bookkeeping)
//!                        ├─▶ ResourceTracker   (regen/restore set algebra)
//!                        ├─▶ CoherentBufferTracker (page-fault dirty tracking)
//!                        └─▶ BinaryDataStore   (bulk payload arena)
//!
//! mid-session start ──▶ mec::synthesize
//!                        (walks live snapshots, seeds the tracker)
//!
//! end of frame ──────▶ CaptureSession ──▶ ReplayWriter
//!                        (emit::* serializes calls, setup and reset)
//! ```
//!
//! Capture logic runs synchronously on the thread issuing the intercepted
//! call. The only concurrent piece is the coherent-buffer fault path; see
//! [`coherent`] for its locking discipline.

pub mod binary_data;
pub mod call;
pub mod coherent;
pub mod emit;
pub mod frame;
pub mod mec;
pub mod session;
pub mod tracker;

pub use binary_data::{BinaryDataStore, BINARY_ALIGNMENT};
pub use call::{CallRecord, Param, ParamValue};
pub use coherent::{CoherentBufferTracker, MprotectBacked, PageProtection, PageRange};
pub use emit::{EmittedFunction, ReplayEmitter};
pub use frame::{FrameCallLog, ValidationPredicate};
pub use mec::MecResult;
pub use session::{
    CaptureMetadata, CaptureSession, CaptureWindow, InMemoryWriter, ReplayWriter, SessionConfig,
};
pub use tracker::{ResourceTracker, TrackedResource};

/// Result type for capture operations.
///
/// Recoverable failures are rare by design: interception either records
/// something (possibly a comment record) or aborts on a design-invariant
/// violation. What remains recoverable is I/O on the writer sink and the
/// memory-protection syscalls.
pub type Result<T> = std::result::Result<T, CaptureError>;

/// Capture error types.
#[derive(Debug, thiserror::Error)]
pub enum CaptureError {
    /// The writer sink failed while persisting replay output.
    #[error("replay writer error: {0}")]
    Writer(#[from] std::io::Error),

    /// A memory-protection syscall failed.
    ///
    /// Protection being denied outright on a platform is not an error; the
    /// coherent tracker falls back to shadow memory for that. This variant
    /// covers protect/unprotect failing after the strategy was chosen.
    #[error("memory protection failed: {0}")]
    Protection(String),

    /// A shadow-memory allocation failed.
    #[error("shadow allocation failed: {0}")]
    ShadowAllocation(String),

    /// The serialized-state checkpoint could not be produced.
    #[error("state serialization failed: {0}")]
    StateSerialization(#[from] serde_json::Error),
}
