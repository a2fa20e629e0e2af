//! The HIF object tree.
//!
//! A design is a strictly tree-shaped ownership graph of nodes stored in an
//! [`Arena`]. This module defines the node variants, the arena with its
//! single-parent discipline, deep copy, structural equality, the stable
//! total order used for canonicalization, and navigation helpers.

pub mod action;
mod arena;
pub mod build;
pub mod compare;
pub mod copy;
pub mod decl;
pub mod equals;
pub mod key;
pub mod nav;
mod node;
mod operators;
pub mod types;
pub mod value;

pub use arena::{Arena, NodeId, Trash};
pub use node::{Node, NodeKind};
pub use operators::Operator;
pub use value::{BitConstant, Direction, TimeUnit};
