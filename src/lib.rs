//! # hif-base
//!
//! Core library for hardware intermediate representation (HIF) analysis and
//! manipulation. A HIF tree is produced by a front-end (VHDL, Verilog,
//! SystemC) and reworked here until a back-end can emit it; the heart of the
//! crate is the expression/tree simplification engine together with the
//! reference-resolution and type-inference services it consumes.
//!
//! ## Module Structure (dependency order)
//!
//! ```text
//! manip      → whole-design fixes (multi-writer signals, range directions,
//!              span rebasing, edge lowering, top-level discovery) + sorting
//!   ↓
//! simplify   → the simplification driver and its rewrite catalogue
//!   ↓
//! fold       → constant folding over pairs of operand values
//!   ↓
//! typing     → semantic type inference, spans, constant transformation
//!   ↓
//! resolve    → symbol → declaration resolution with cached lookups
//!   ↓
//! semantics  → pluggable language-semantics oracle (HIF, SystemC)
//!   ↓
//! tree       → arena object model, copy/equals/compare, traversal
//!   ↓
//! base       → primitives (Name interning, fresh-name table)
//! ```

/// Foundation types: `Name` interning and the fresh-name table.
pub mod base;

/// The arena object model: nodes, ownership, copy, equality, ordering.
pub mod tree;

/// Language-semantics oracle: per-dialect type rules.
pub mod semantics;

/// Symbol resolution: associate references with their declarations.
pub mod resolve;

/// Semantic type inference over values.
pub mod typing;

/// Child-first tree traversal and the deferred-deletion trash.
pub mod rewrite;

/// Constant folding over pairs of operand values.
pub mod fold;

/// The simplification driver.
pub mod simplify;

/// Whole-design manipulation passes and canonical sorting.
pub mod manip;

/// Diagnostics: error taxonomy and warning sets.
pub mod diag;

// Re-export foundation types
pub use base::{Name, NameTable};
pub use diag::{HifError, RewriteError, RewriteResult};
pub use tree::{Arena, NodeId};
