// storefront/src/lib.rs

//! Order lifecycle and payment reconciliation service built on the orka pipeline engine.

pub mod config;
pub mod db;
pub mod errors;
pub mod models;
pub mod pipelines;
pub mod services;
pub mod state;
pub mod web;
