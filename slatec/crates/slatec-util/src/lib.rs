//! slatec-util - Foundation types for the Slate compiler.
//!
//! This crate provides the infrastructure every other `slatec` crate builds
//! on:
//!
//! - [`Symbol`]: interned strings with O(1) comparison
//! - [`Idx`] / [`IndexVec`] / [`define_idx!`]: typed indices into the
//!   append-only arenas that own all long-lived compiler entities
//! - [`Span`] / [`FileId`] / [`SourceMap`]: source locations
//! - [`Diagnostic`] / [`Handler`] / [`DiagnosticCode`]: error and warning
//!   reporting
//!
//! Entities in the semantic graph reference each other exclusively through
//! typed indices; the arenas outlive every scope, so no record is ever
//! dropped while a handle to it exists. That makes `IndexVec` plus the id
//! newtypes generated by [`define_idx!`] the ownership backbone of the
//! whole compiler.

pub mod diagnostic;
pub mod error;
pub mod index_vec;
pub mod span;
pub mod symbol;

pub use diagnostic::{Diagnostic, DiagnosticCode, Handler, Level};
pub use index_vec::{Idx, IndexVec};
pub use span::{FileId, SourceMap, Span};
pub use symbol::Symbol;

// Re-export commonly used hash collections
pub use rustc_hash::FxHashMap;
pub use rustc_hash::FxHashSet;
