//! Mercurius CLI - Command-line interface for the listing-to-CRM synchronizer
//!
//! This crate provides the CLI application that ties together all Mercurius components.

pub mod config;
pub mod export;

pub use config::{Command, Config, ExportFormat};
