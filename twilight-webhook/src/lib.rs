//! Caching and utility methods for the Discord webhooks chat is relayed
//! through, built on the [Twilight ecosystem](https://api.twilight.rs)
//!
//! Refer to the modules' docs for more

#![warn(clippy::nursery, clippy::pedantic)]

/// The webhooks cache
pub mod cache;
/// Utility functions for executing webhooks in threads
pub mod util;
