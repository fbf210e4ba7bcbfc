//! Common types used across the application.

pub mod session;

pub use session::SessionToken;
