//! # Volley Infra
//!
//! Adapters binding the orchestration core to the outside world:
//! - `http`: reqwest-backed request executor and header construction
//! - `auth`: Google identity token source (metadata server / impersonation)
//! - `io`: JSONL ingestion and emission

pub mod auth;
pub mod http;
pub mod io;
