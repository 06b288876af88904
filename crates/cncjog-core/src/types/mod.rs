//! Type aliases for shared state and callbacks.
//!
//! - [`aliases`]: `Arc<Mutex<T>>` wrappers and callback types.

pub mod aliases;

pub use aliases::*;
