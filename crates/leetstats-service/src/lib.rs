//! Fetches a LeetCode profile on a schedule and keeps the latest good summary in memory.
//!
//! The [`upstream`] module talks to the GraphQL endpoint and flattens its responses into a
//! [`ProfileSummary`](types::ProfileSummary). The [`cache`] module owns the shared
//! [`CacheState`](cache::CacheState) and decides what to keep when a fetch fails.

#[macro_use]
pub mod metrics;

pub mod cache;
pub mod config;
pub mod types;
pub mod upstream;
pub mod utils;
