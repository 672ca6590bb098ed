//! # SurveyHook Common Library
//!
//! Shared code for the SurveyHook receiver including:
//! - Error and result types
//! - Bootstrap configuration loading
//! - Submission and answer models
//! - Webhook signature verification
//! - Timestamp helpers

pub mod config;
pub mod error;
pub mod models;
pub mod signature;
pub mod time;

pub use error::{Error, Result};
pub use signature::{SignatureCheck, SignatureVerifier};
