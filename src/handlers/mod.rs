//! HTTP handlers.
//!
//! `pages` serves the read paths classified by the route gate. The remaining modules are
//! the mutating actions mounted under `/api`; each one runs the same pipeline:
//! authorize the caller, parse and validate the body, write, then mark views stale.

pub mod auth;
pub mod content;
pub mod donations;
pub mod pages;
pub mod prayer;
pub mod profile;
pub mod users;
