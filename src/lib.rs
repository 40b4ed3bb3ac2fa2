// ABOUTME: Library root for imagewright - container image lifecycle management.
// ABOUTME: The main binary is in main.rs.

pub mod auth;
pub mod build;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod lifecycle;
pub mod registry;
pub mod resource;
pub mod runtime;
pub mod types;
