//! Event hub.
//!
//! Decoded events are republished per session to standing
//! subscriptions. Session isolation is structural: subscriptions are
//! indexed by session, so an event on one session is never offered to
//! a subscriber on another.
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `filter` | Method / domain / catch-all filters |
//! | `hub` | The multicast registry |
//! | `subscription` | Subscriber handle (`Stream` of events) |

// ============================================================================
// Submodules
// ============================================================================

/// Event filters.
pub mod filter;

/// Per-session multicast.
pub mod hub;

/// Subscription handle.
pub mod subscription;

// ============================================================================
// Re-exports
// ============================================================================

pub use filter::EventFilter;
pub use hub::{EventBuffer, EventHub};
pub use subscription::Subscription;
