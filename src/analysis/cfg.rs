//! Control flow graph extraction.
//!
//! The [`Cfg`] captures the block-level structure of a
//! [`Function`](crate::ir::Function): predecessor and successor lists,
//! reverse post-order, and exit blocks. It is a snapshot; passes that
//! mutate the CFG (edge splitting, block insertion) must rebuild it.
//!
//! Predecessor lists are deterministic: edges are discovered by walking
//! blocks in index order, so the i-th predecessor of a join is stable
//! across runs. Factor operand vectors and φ operands both rely on that
//! ordering staying fixed for the lifetime of the snapshot.

use crate::{error::invalid_ir, ir::Function, Result};

/// Block-level control flow graph of a single function.
#[derive(Debug, Clone)]
pub struct Cfg {
    /// Predecessors per block, in edge-discovery order.
    preds: Vec<Vec<usize>>,
    /// Successors per block, deduplicated.
    succs: Vec<Vec<usize>>,
    /// Reverse post-order over reachable blocks, starting at the entry.
    rpo: Vec<usize>,
    /// Blocks whose terminator has no successors.
    exits: Vec<usize>,
}

impl Cfg {
    /// Builds the CFG of a function. Block 0 is the entry.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIr`](crate::Error::InvalidIr) if a block is
    /// missing its terminator or a terminator targets an unknown block.
    pub fn build(func: &Function) -> Result<Self> {
        let n = func.block_count();
        let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut succs: Vec<Vec<usize>> = vec![Vec::new(); n];
        let mut exits = Vec::new();

        for block in func.blocks() {
            let id = block.id();
            let Some(term) = block.terminator() else {
                return Err(invalid_ir!("block b{id} is missing its terminator"));
            };
            let targets = term.op.successors();
            if targets.is_empty() {
                exits.push(id);
            }
            for target in targets {
                if target >= n {
                    return Err(invalid_ir!("block b{id} branches to unknown block b{target}"));
                }
                succs[id].push(target);
                preds[target].push(id);
            }
        }

        let rpo = reverse_postorder(n, &succs);
        Ok(Self {
            preds,
            succs,
            rpo,
            exits,
        })
    }

    /// Number of blocks covered by this CFG.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.preds.len()
    }

    /// The entry block index.
    #[must_use]
    pub const fn entry(&self) -> usize {
        0
    }

    /// Predecessors of a block, in stable edge-discovery order.
    #[must_use]
    pub fn preds(&self, block: usize) -> &[usize] {
        &self.preds[block]
    }

    /// Successors of a block, deduplicated.
    #[must_use]
    pub fn succs(&self, block: usize) -> &[usize] {
        &self.succs[block]
    }

    /// Exit blocks (terminators with no successors).
    #[must_use]
    pub fn exits(&self) -> &[usize] {
        &self.exits
    }

    /// Reverse post-order over the reachable blocks.
    #[must_use]
    pub fn rpo(&self) -> &[usize] {
        &self.rpo
    }

    /// Returns `true` if the block is reachable from the entry.
    #[must_use]
    pub fn is_reachable(&self, block: usize) -> bool {
        // rpo only contains reachable blocks; linear scan is fine at the
        // sizes this crate deals with.
        self.rpo.contains(&block)
    }

    /// Returns `true` if the edge `from -> to` is critical: the source has
    /// several successors and the target several predecessors.
    ///
    /// Computations cannot be inserted at the end of `from` on such an
    /// edge without executing them on the paths to the other successors.
    #[must_use]
    pub fn is_critical_edge(&self, from: usize, to: usize) -> bool {
        self.succs[from].len() > 1 && self.preds[to].len() > 1
    }
}

/// Iterative post-order DFS over the successor lists, reversed.
fn reverse_postorder(n: usize, succs: &[Vec<usize>]) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    let mut visited = vec![false; n];
    let mut postorder = Vec::with_capacity(n);
    // (block, next successor position)
    let mut stack = vec![(0usize, 0usize)];
    visited[0] = true;

    while let Some(&(block, pos)) = stack.last() {
        if let Some(&succ) = succs[block].get(pos) {
            stack.last_mut().expect("stack is non-empty").1 += 1;
            if !visited[succ] {
                visited[succ] = true;
                stack.push((succ, 0));
            }
        } else {
            postorder.push(block);
            stack.pop();
        }
    }

    postorder.reverse();
    postorder
}
