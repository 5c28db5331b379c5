//! Mercurius DB - PostgreSQL persistence for listings.

pub mod repository;

pub use repository::ListingRepository;
