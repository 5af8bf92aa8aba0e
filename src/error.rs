//! Centralized error type for the ibuki umbrella crate.
//!
//! Wraps subsystem errors so `?` propagates naturally across crate
//! boundaries.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Core(#[from] ibuki_core::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
