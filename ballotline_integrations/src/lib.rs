//! Concrete adapters implementing the `ballotline_core` source traits.
//!
//! Each adapter is feature-gated so deployments compile only the sources
//! they actually register.

#![forbid(unsafe_code)]

#[cfg(feature = "census")]
pub mod census;
#[cfg(feature = "civic-info")]
pub mod civic_info;
#[cfg(feature = "page-content")]
pub mod page_content;
#[cfg(feature = "state-feed")]
pub mod state_feed;
#[cfg(feature = "web-search")]
pub mod web_search;

/// User agent sent by every adapter in this crate.
pub(crate) const USER_AGENT_VALUE: &str = "ballotline/0.1";
