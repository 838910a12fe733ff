//! Onboarding wizard — step assignment and progression service.

pub mod auth;
pub mod config;
pub mod error;
pub mod onboarding;
pub mod store;
