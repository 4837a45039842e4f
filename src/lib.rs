#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]

//! # ssapre
//!
//! [![Crates.io](https://img.shields.io/crates/v/ssapre.svg)](https://crates.io/crates/ssapre)
//! [![Documentation](https://docs.rs/ssapre/badge.svg)](https://docs.rs/ssapre)
//! [![License](https://img.shields.io/badge/license-Apache--2.0-blue.svg)](https://github.com/BinFlip/ssapre/blob/main/LICENSE)
//!
//! SSA-based partial redundancy elimination for a small SSA intermediate
//! representation, built in pure Rust. The crate bundles the IR, the
//! control-flow analyses, and the six-step SSAPRE pass: factor insertion,
//! renaming, down-safety, will-be-available, finalize, and code motion.
//!
//! # Architecture
//!
//! - [`crate::ir`] - the host IR: typed values, decomposed operations,
//!   basic blocks, functions, a construction builder, and an instruction
//!   simplifier
//! - [`crate::analysis`] - CFG extraction, Lengauer-Tarjan dominators,
//!   dominance frontiers, iterated dominance frontiers
//! - [`crate::pre`] - the SSAPRE pass itself ([`SsaPre`]), with its
//!   outcome report ([`PreOutcome`]) and counters ([`PreStats`])
//! - [`crate::Error`] and [`crate::Result`] - error handling
//!
//! # What the pass does
//!
//! Given a function in SSA form, the pass removes redundant evaluations
//! of pure scalar expressions. Fully redundant computations collapse onto
//! a dominating evaluation; partially redundant ones are completed by
//! inserting the computation on the paths where it is missing and merging
//! with a φ node - never lengthening any path of execution.
//!
//! ```rust
//! use ssapre::{
//!     ir::{BinaryOp, FunctionBuilder, Type},
//!     SsaPre,
//! };
//!
//! // entry -> {left, right} -> join, with x+y in left and join.
//! let mut b = FunctionBuilder::new("diamond", &[Type::I32, Type::I32, Type::I1]);
//! let (x, y, c) = (b.args()[0], b.args()[1], b.args()[2]);
//! let entry = b.create_block();
//! let left = b.create_block();
//! let right = b.create_block();
//! let join = b.create_block();
//! b.switch_to(entry);
//! b.branch(c, left, right);
//! b.switch_to(left);
//! b.binary(BinaryOp::Add, x, y);
//! b.jump(join);
//! b.switch_to(right);
//! b.jump(join);
//! b.switch_to(join);
//! let t = b.binary(BinaryOp::Add, x, y);
//! b.ret(Some(t));
//! let mut func = b.finish()?;
//!
//! let outcome = SsaPre::run(&mut func)?;
//! assert!(outcome.changed);
//! // x+y is now computed once per path: the original in `left`, an
//! // inserted copy in `right`, and a φ at the join.
//! assert_eq!(outcome.stats.inserted, 1);
//! assert_eq!(outcome.stats.reloaded, 1);
//! func.verify()?;
//! # Ok::<(), ssapre::Error>(())
//! ```
//!
//! # Scope
//!
//! The pass handles pure scalar expressions: binary arithmetic and
//! bitwise operations, comparisons, casts, selects, address computations,
//! and vector lane operations. Calls, loads, stores and aggregates are
//! classified as unknown and left untouched. There is no interprocedural
//! analysis, no alias analysis, and no speculation past side effects.

pub mod analysis;
mod error;
pub mod ir;
pub mod pre;
pub mod prelude;

pub use error::{Error, Result};
pub use pre::{PreOutcome, PreStats, SsaPre};
