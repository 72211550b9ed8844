//! Bearer token to user id resolution over a SQL `identities` table.
//!
//! One engine is chosen at startup (SQLite, PostgreSQL or MySQL) and hidden
//! behind [`db::IdentityStore`]. [`resolver::IdentityResolver`] turns a lookup
//! into a [`resolver::Resolution`], and [`web`] exposes it as salvo middleware.

#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod db;
pub mod metrics;
pub mod resolver;
pub mod utils;
pub mod web;

pub use self::resolver::{IdentityResolver, RejectReason, Resolution, RetryPolicy};
