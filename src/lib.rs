//! Library root for the `nav_admin` crate

// Core error handling
pub mod api_errors;
pub mod errors;

// Configuration & CLI
pub mod cli;
pub mod config;

// Storage
pub mod db;
pub mod models;
pub mod repository;

// Backup validation, import and extraction
pub mod archive_validator;
pub mod backup;
pub mod extractor;
pub mod importer;
pub mod manifest;
pub mod paths;

// Uploaded files
pub mod managed_files;

// nav.json generation
pub mod snapshot;

// Web server interface
pub mod api;
pub mod app_state;
pub mod session;
pub mod web;

pub use app_state::AppState;
pub use config::{load_config, NavConfig};
pub use errors::{NavError, NavResult};
