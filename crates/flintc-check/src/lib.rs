//! Semantic resolution over the AST produced by `flintc-core`.
//!
//! Deep semantic analysis is explicitly out of scope (spec.md §1); this
//! crate keeps a small but real checker -- scope/symbol population and
//! narrowing-conversion diagnostics -- that `flintc-codegen` depends on for
//! resolved types before LLIR lowering runs.
//!
//! # Modules
//!
//! - [`diagnostics`] -- the `TypeError` diagnostic enum
//! - [`coercion`] -- implicit-coercion and widening rules
//! - [`resolve`] -- scope/symbol population and expression type inference

pub mod coercion;
pub mod diagnostics;
pub mod resolve;

pub use coercion::{can_coerce, common_numeric_type, is_float, is_integer, is_numeric};
pub use diagnostics::{FixSuggestion, TypeError};
pub use resolve::check_file;
