//! Mercurius Client - HTTP clients for external APIs
//!
//! This crate provides HTTP clients for interacting with:
//!
//! - [`listings`] - the marketplace listings API (listing source)
//! - [`hubspot`] - the HubSpot CRM deals API (deal gateway)
//!
//! Both implement the collaborator traits from [`mercurius_core::sync`], so
//! they plug straight into a [`mercurius_core::SyncService`].

mod http;
pub mod hubspot;
pub mod listings;

// Re-export main client types
pub use hubspot::HubSpotClient;
pub use listings::ListingsClient;
