//! Sessions.
//!
//! A connection carries one root session and any number of child
//! sessions, each addressed by the `sessionId` routing tag. Sessions form
//! a tree: closing one closes its descendants.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Session`] | Cheap handle to one session |
//! | [`SessionRegistry`] | Tree of open sessions and the close cascade |
//! | [`SessionClient`] | Connection bound to one session, with typed calls |
//! | [`LifecycleHook`] | Reports attach/detach from inbound events |

// ============================================================================
// Submodules
// ============================================================================

/// Session-bound client.
pub mod client;

/// Session handle.
pub mod handle;

/// Lifecycle hook.
pub mod hook;

/// Session tree.
pub mod registry;

// ============================================================================
// Re-exports
// ============================================================================

pub use client::SessionClient;
pub use handle::Session;
pub use hook::{
    LifecycleChange, LifecycleHook, TARGET_ATTACHED_EVENT, TARGET_DETACHED_EVENT,
    target_lifecycle_hook,
};
pub use registry::SessionRegistry;
