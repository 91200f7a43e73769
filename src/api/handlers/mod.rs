//! HTTP request handlers

pub mod health;
pub mod composites;
pub mod sessions;
