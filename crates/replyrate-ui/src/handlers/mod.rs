//! HTTP handlers

pub mod api;
pub mod dashboard;
pub mod static_files;
