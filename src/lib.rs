//! SOAT Quote Gateway Library
//!
//! This library provides the core functionality for the SOAT quote gateway:
//! the upstream token manager, the quote workflow with its header-strategy
//! retry protocol, the response normalizer, and the HTTP handlers.
//!
//! # Modules
//!
//! - `api`: API definitions.
//! - `core`: Core business logic.
//! - `integrations`: External service integrations.
//! - `config`: Configuration management.
//! - `errors`: Error handling types.
//! - `handlers`: HTTP request handlers.
//! - `models`: Request, response and reference data models.
//! - `normalizer`: Field extraction over the upstream payload.
//! - `quote_gateway`: Quote workflow.
//! - `token_manager`: Upstream token state and issuance.
//! - `upstream_client`: Upstream quoting API client.

pub mod api;
pub mod core;
pub mod integrations;

// Re-export primary modules for shared use in tests and the binary
pub mod config;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod normalizer;
pub mod quote_gateway;
pub mod token_manager;
pub mod upstream_client;
