//! Whole-design manipulation passes.
//!
//! Each pass traverses a full design, invoking the simplification driver
//! on the subtrees it rewrites. They share the reference map built by
//! [`crate::resolve::get_all_references`].

mod analyze;
mod global_actions;
mod last_value;
mod match_trees;
mod multi_writers;
mod ranges_direction;
mod rebase_span;
// Crate-visible: the simplification driver canonicalizes expressions
// through the same routines instead of keeping its own copy.
pub(crate) mod sort;
mod top_level;

pub use analyze::{AnalyzeProcessOptions, ProcessStyle, analyze_process};
pub use global_actions::transform_global_actions;
pub use last_value::{LastValueOptions, map_last_value_to_systemc};
pub use match_trees::{MatchMaps, match_trees};
pub use multi_writers::{FixMultipleSignalPortAssignsOptions, fix_multiple_signal_port_assigns};
pub use ranges_direction::fix_ranges_direction;
pub use rebase_span::rebase_type_span;
pub use sort::{ParameterList, SortMissingKind, SortOptions, sort, sort_parameters};
pub use top_level::{
    FindTopOptions, ViewDependencyOptions, find_top_level_module, find_top_level_modules,
    find_view_dependencies,
};
