//! Lead Intake API Library
//!
//! This library provides the core functionality for the lead-intake backend:
//! the multi-step public form endpoints, the scoring and tag-derivation
//! engine, and the authenticated admin surface for lead management.
//!
//! # Modules
//!
//! - `admin_handlers`: Admin lead-management and account endpoints.
//! - `auth`: Token and password primitives plus the admin auth extractor.
//! - `auth_handlers`: Registration, login, password reset, profile.
//! - `config`: Configuration management.
//! - `db`: Database connection and pool management.
//! - `db_storage`: Database storage operations.
//! - `errors`: Error handling types.
//! - `geo`: IP geolocation service.
//! - `handlers`: Public form HTTP handlers.
//! - `models`: Core data models and vocabularies.
//! - `scoring`: Lead scoring and tag derivation engine.

// Re-export primary modules for shared use in tests and other binaries
pub mod admin_handlers;
pub mod auth;
pub mod auth_handlers;
pub mod config;
pub mod db;
pub mod db_storage;
pub mod errors;
pub mod geo;
pub mod handlers;
pub mod models;
pub mod scoring;
