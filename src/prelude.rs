//! Convenient re-exports of the most commonly used types.
//!
//! ```rust
//! use ssapre::prelude::*;
//!
//! let mut b = FunctionBuilder::new("f", &[Type::I32]);
//! let entry = b.create_block();
//! b.switch_to(entry);
//! b.ret(None);
//! let mut func = b.finish()?;
//! let outcome = SsaPre::run(&mut func)?;
//! assert!(!outcome.changed);
//! # Ok::<(), ssapre::Error>(())
//! ```

pub use crate::analysis::{Cfg, DominatorTree, IdfCalculator};
pub use crate::ir::{
    BasicBlock, BinaryOp, CastKind, CmpPredicate, ConstValue, Function, FunctionBuilder,
    Instruction, Op, PhiOperand, Type, ValueId, ValueKind,
};
pub use crate::{Error, PreOutcome, PreStats, Result, SsaPre};
