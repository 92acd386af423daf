//! PostgREST-backed [`RemoteSource`](stockflow_admin::remote::RemoteSource).
//!
//! Talks to a Supabase-style `/rest/v1` endpoint over HTTP. Row-level security
//! is enforced by the server; this crate only forwards the session's token.

pub mod client;
pub mod config;
pub mod error;
pub mod query;

pub use client::PostgrestSource;
pub use config::PostgrestConfig;
pub use error::PostgrestError;
