//! Food-ordering backend core: menu availability, orders, invoices and
//! payment authorization behind async repository ports.

pub mod config;
pub mod domain;
pub mod error;
pub mod metrics;
pub mod persistence;
pub mod ports;
pub mod services;

#[cfg(test)]
mod test_support;

pub use error::{AppError, AppResult, ErrorKind};
