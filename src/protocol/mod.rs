//! Wire protocol message types.
//!
//! This module defines the envelope format exchanged with the remote
//! end and the codec that converts between envelopes and text frames.
//!
//! # Protocol Overview
//!
//! | Message Type | Direction | Purpose |
//! |--------------|-----------|---------|
//! | `Request` | Local → Remote | Command envelope |
//! | `Response` | Remote → Local | Command result or error |
//! | `Event` | Remote → Local | Notification |
//!
//! # Method Naming
//!
//! Commands and events follow `Domain.methodName` format:
//!
//! - `Input.dispatchKeyEvent`
//! - `Runtime.evaluate`
//! - `DOMStorage.domStorageItemAdded`
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `codec` | Frame encoding and classification |
//! | `event` | Event type |
//! | `request` | Request and Response types |

// ============================================================================
// Submodules
// ============================================================================

/// Frame encoding and classification.
pub mod codec;

/// Event message type.
pub mod event;

/// Request and Response message types.
pub mod request;

// ============================================================================
// Re-exports
// ============================================================================

pub use codec::{Message, decode, encode};
pub use event::Event;
pub use request::{Request, Response, ResponseError, params_object};
