// ABOUTME: Library root for stackyard: command queue, stores and the convergence engine.
// ABOUTME: The CLI binary in main.rs is a thin layer over these modules.

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod output;
pub mod runtime;
pub mod service;
pub mod stack;
pub mod store;
pub mod types;
pub mod worker;
