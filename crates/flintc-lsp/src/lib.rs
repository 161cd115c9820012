//! A language server skeleton for the language described in spec.md.
//!
//! Spec.md §1 lists "a language server" among the surrounding developer
//! tools explicitly out of scope for this repository's core subject (the
//! numeric core, signature engine, and LLIR generator). This crate is
//! deliberately thin: a stdio JSON-RPC transport ([`protocol`]) and a
//! request dispatcher ([`server`]) that answers the LSP lifecycle every
//! client expects, plus one real capability -- running this repo's own
//! tier-1 checker (`flintc-check`) over a single resolved file and
//! reporting the results as diagnostics.
//!
//! # Modules
//!
//! - [`protocol`] -- `Content-Length`-framed JSON-RPC message I/O
//! - [`server`] -- request dispatch and diagnostics translation
//! - [`error`] -- JSON-RPC error codes

pub mod error;
pub mod protocol;
pub mod server;

pub use error::LspError;
pub use server::Server;
