//! Topic subscriptions backed by a local article cache that a background
//! scheduler keeps in sync with a remote news source.

pub mod app;
pub mod config;
pub mod db;
pub mod error;
pub mod feed;
pub mod models;
pub mod services;

#[cfg(test)]
mod test_support;

pub use app::{Engine, EngineHandle};
pub use error::{AppError, Result};
