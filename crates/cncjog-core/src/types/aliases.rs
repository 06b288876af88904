//! Type aliases for commonly used complex types.
//!
//! `Arc<Mutex<T>>` and boxed callbacks are hard to read at a glance; these
//! aliases give them names that say what they hold.

use parking_lot::Mutex;
use std::sync::Arc;

// =============================================================================
// THREAD-SAFE SHARED TYPES (Arc<Mutex<T>>)
// =============================================================================

/// A thread-safe, mutex-protected wrapper for cross-thread sharing.
///
/// Uses `parking_lot::Mutex`, which cannot be poisoned.
///
/// # Example
/// ```rust,ignore
/// let state: ThreadSafe<DeviceState> = thread_safe(DeviceState::default());
/// state.lock().read_calls += 1;
/// ```
pub type ThreadSafe<T> = Arc<Mutex<T>>;

// =============================================================================
// CALLBACK TYPES
// =============================================================================

/// A callback that receives a single parameter.
///
/// Used for fire-and-forget notifications such as jog feedback.
pub type DataCallback<T> = Box<dyn Fn(T) + Send + Sync>;

// =============================================================================
// CONSTRUCTOR HELPERS
// =============================================================================

/// Create a new `ThreadSafe<T>` from a value.
#[inline]
pub fn thread_safe<T>(value: T) -> ThreadSafe<T> {
    Arc::new(Mutex::new(value))
}
