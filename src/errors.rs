//! Error Types
//!
//! This module defines the error types used throughout the sync engine.
//!
//! # Overview
//!
//! [`SyncError`] covers the recoverable failure modes of a synchronization
//! pass:
//! - Per-element scan failures (invalid element, degenerate bounds,
//!   unreadable header, light or camera record)
//! - Tree edits the registry refuses (attach cycles, unknown nodes)
//! - Settings parsing
//!
//! Scan failures never abort [`SyncRegistry::synchronize`]: the scan helpers
//! return them as `Err`, and the scan loop logs, counts and skips the element.
//!
//! [`SyncRegistry::synchronize`]: crate::sync::SyncRegistry::synchronize

use thiserror::Error;

use crate::id::StableId;

/// The main error type for the sync engine.
#[derive(Error, Debug)]
pub enum SyncError {
    // ========================================================================
    // Skippable Scan Errors
    // ========================================================================
    /// The host reports no element at this ordinal, or an invalid one.
    #[error("Invalid element at index {index}")]
    InvalidElement {
        /// Ordinal of the element in the live model
        index: usize,
    },

    /// The element has no bounding box, or one with non-finite or inverted extents.
    #[error("Element {id} has invalid or empty bounds")]
    InvalidBounds {
        /// Stable id of the skipped element
        id: StableId,
    },

    /// The element header could not be read.
    #[error("Unreadable header for element {id}")]
    UnreadableHeader {
        /// Stable id of the skipped element
        id: StableId,
    },

    /// A light record attached to an element could not be read.
    #[error("Unreadable light {light_index} on element {id}")]
    UnreadableLight {
        /// Stable id of the owning element
        id: StableId,
        /// Index of the light on the element
        light_index: u32,
    },

    /// A camera record in a camera chain could not be read.
    #[error("Unreadable camera record {id}")]
    UnreadableCamera {
        /// Stable id of the camera record
        id: StableId,
    },

    /// A camera chain links back to a camera it already visited.
    #[error("Camera set {set} links back to camera {camera}")]
    CameraChainCycle {
        /// Stable id of the camera set
        set: StableId,
        /// The camera reached twice
        camera: StableId,
    },

    /// The host enumerated the same id twice in one pass.
    #[error("Element {id} was already scanned this pass")]
    DuplicateId {
        /// The repeated id
        id: StableId,
    },

    // ========================================================================
    // Tree Errors
    // ========================================================================
    /// Attaching would create a cycle (node under itself or a descendant).
    #[error("Cannot attach {child} under {parent}: would create a cycle")]
    InvalidAttach {
        /// Node being attached
        child: StableId,
        /// Requested parent
        parent: StableId,
    },

    /// The node is not (or no longer) registered.
    #[error("Unknown sync node")]
    UnknownNode,

    // ========================================================================
    // Configuration Errors
    // ========================================================================
    /// Settings could not be parsed.
    #[error("Settings parse error: {0}")]
    Settings(#[from] serde_json::Error),
}

/// Alias for `Result<T, SyncError>`.
pub type Result<T> = std::result::Result<T, SyncError>;
