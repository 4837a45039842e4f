//! Control flow analyses over the SSA IR.
//!
//! This module provides the block-level analyses the optimization pass
//! consumes:
//!
//! - [`Cfg`] - predecessor/successor lists, reverse post-order, exits
//! - [`DominatorTree`] - Lengauer-Tarjan dominators with sortable child
//!   lists, plus [`dominance_frontiers`]
//! - [`IdfCalculator`] - iterated dominance frontiers for factor and φ
//!   placement
//!
//! All analyses are snapshots of the function at build time; passes that
//! change the CFG are responsible for rebuilding them.

mod cfg;
mod dominators;
mod idf;

pub use cfg::Cfg;
pub use dominators::{dominance_frontiers, DominatorTree};
pub use idf::IdfCalculator;
