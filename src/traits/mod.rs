//! Core traits for resources managed by scopes.

mod release;

pub use release::Release;
