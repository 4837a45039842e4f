//! Iterated dominance frontier computation.
//!
//! The iterated dominance frontier IDF(S) of a set of defining blocks S is
//! the least fixed point of `X = DF(S ∪ X)`: the blocks where definitions
//! in S merge, plus the blocks where *those* merges merge, and so on. SSA
//! construction places φ nodes at the IDF of each variable's definition
//! blocks; the redundancy elimination pass places factors at the IDF of
//! each expression's occurrence blocks.

use std::collections::HashSet;

use rustc_hash::FxHashSet;

use crate::analysis::{dominance_frontiers, Cfg, DominatorTree};

/// Iterated dominance frontier calculator.
///
/// Precomputes the per-block dominance frontiers once and answers IDF
/// queries for arbitrary defining sets with a simple worklist.
///
/// # Examples
///
/// ```rust
/// use ssapre::analysis::{Cfg, DominatorTree, IdfCalculator};
/// use ssapre::ir::{FunctionBuilder, Type};
///
/// let mut b = FunctionBuilder::new("diamond", &[Type::I1]);
/// let cond = b.args()[0];
/// let entry = b.create_block();
/// let left = b.create_block();
/// let right = b.create_block();
/// let join = b.create_block();
/// b.switch_to(entry);
/// b.branch(cond, left, right);
/// b.switch_to(left);
/// b.jump(join);
/// b.switch_to(right);
/// b.jump(join);
/// b.switch_to(join);
/// b.ret(None);
/// let func = b.finish()?;
///
/// let cfg = Cfg::build(&func)?;
/// let dom = DominatorTree::build(&cfg);
/// let idf = IdfCalculator::new(&cfg, &dom);
///
/// // A definition in `left` merges at `join`.
/// assert_eq!(idf.calculate(&[left]), vec![join]);
/// # Ok::<(), ssapre::Error>(())
/// ```
#[derive(Debug)]
pub struct IdfCalculator {
    frontiers: Vec<HashSet<usize>>,
}

impl IdfCalculator {
    /// Builds the calculator for a CFG and its dominator tree.
    #[must_use]
    pub fn new(cfg: &Cfg, dom: &DominatorTree) -> Self {
        Self {
            frontiers: dominance_frontiers(cfg, dom),
        }
    }

    /// Computes the iterated dominance frontier of the given defining
    /// blocks. The result is sorted for determinism.
    #[must_use]
    pub fn calculate(&self, defs: &[usize]) -> Vec<usize> {
        let mut result: FxHashSet<usize> = FxHashSet::default();
        let mut worklist: Vec<usize> = defs.to_vec();
        let mut enqueued: FxHashSet<usize> = defs.iter().copied().collect();

        while let Some(block) = worklist.pop() {
            for &frontier in &self.frontiers[block] {
                if result.insert(frontier) && enqueued.insert(frontier) {
                    worklist.push(frontier);
                }
            }
        }

        let mut sorted: Vec<usize> = result.into_iter().collect();
        sorted.sort_unstable();
        sorted
    }
}
