//! DFS and SDFS instruction numbering over the dominator tree.
//!
//! Both numberings walk the dominator tree in preorder and hand out
//! consecutive integers starting at 1 to every instruction of every
//! visited block. They differ only in sibling order:
//!
//! - **DFS**: children sorted into CFG reverse post-order.
//! - **SDFS**: children sorted into the *opposite* order.
//!
//! Renaming walks blocks in RPO while stamping stack entries with SDFS
//! numbers. Because SDFS visits siblings in reverse, leaving a dominator
//! subtree is detectable with one comparison: any stack entry whose SDFS
//! is greater than the current instruction's is out of scope and gets
//! popped. No explicit "on subtree exit" callback is needed.
//!
//! ```text
//!  CFG:    DT:      RPO(CFG):  a c b d e
//!   a       a       DFS(DT):   a c b d e   (children RPO-sorted)
//!  / \    / | \     SDFS(DT):  a d e b c   (children reverse-sorted)
//! b   c  b  d  c
//!  \ /      |
//!   d       e
//!   |
//!   e
//! ```

use crate::{
    analysis::{Cfg, DominatorTree},
    ir::Function,
};

/// Per-instruction DFS and SDFS numbers, indexed `[block][instruction]`.
///
/// Instructions in unreachable blocks keep number 0 and must not be
/// queried; the pass never visits them.
#[derive(Debug)]
pub(crate) struct Numbering {
    dfs: Vec<Vec<u32>>,
    sdfs: Vec<Vec<u32>>,
}

impl Numbering {
    /// Computes both numberings. Sorts the dominator tree's child lists
    /// twice as a side effect; the tree is left in reverse-RPO child
    /// order.
    pub(crate) fn compute(func: &Function, cfg: &Cfg, dom: &mut DominatorTree) -> Self {
        let mut rpo_index = vec![usize::MAX; cfg.block_count()];
        for (i, &block) in cfg.rpo().iter().enumerate() {
            rpo_index[block] = i;
        }

        dom.sort_children_by_key(|b| rpo_index[b]);
        let dfs = assign(func, &dom.preorder());

        dom.sort_children_by_key(|b| std::cmp::Reverse(rpo_index[b]));
        let sdfs = assign(func, &dom.preorder());

        Self { dfs, sdfs }
    }

    /// DFS number of an instruction.
    pub(crate) fn dfs(&self, block: usize, index: usize) -> u32 {
        self.dfs[block][index]
    }

    /// SDFS number of an instruction.
    pub(crate) fn sdfs(&self, block: usize, index: usize) -> u32 {
        self.sdfs[block][index]
    }

    /// SDFS number factors at a block are stamped with: the number of the
    /// block's first instruction.
    pub(crate) fn block_entry_sdfs(&self, block: usize) -> u32 {
        self.sdfs[block][0]
    }
}

fn assign(func: &Function, preorder: &[usize]) -> Vec<Vec<u32>> {
    let mut numbers: Vec<Vec<u32>> = func
        .blocks()
        .iter()
        .map(|b| vec![0; b.instructions.len()])
        .collect();
    let mut counter = 1u32;
    for &block in preorder {
        for slot in &mut numbers[block] {
            *slot = counter;
            counter += 1;
        }
    }
    numbers
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FunctionBuilder, Type};

    /// The doc comment's five block shape: a -> {b, c}, b -> d, c -> d,
    /// d -> e.
    fn sample() -> (Function, Cfg, DominatorTree) {
        let mut bld = FunctionBuilder::new("sample", &[Type::I1]);
        let cond = bld.args()[0];
        let a = bld.create_block();
        let b = bld.create_block();
        let c = bld.create_block();
        let d = bld.create_block();
        let e = bld.create_block();
        bld.switch_to(a);
        bld.branch(cond, b, c);
        bld.switch_to(b);
        bld.jump(d);
        bld.switch_to(c);
        bld.jump(d);
        bld.switch_to(d);
        bld.jump(e);
        bld.switch_to(e);
        bld.ret(None);
        let func = bld.finish().unwrap();
        let cfg = Cfg::build(&func).unwrap();
        let dom = DominatorTree::build(&cfg);
        (func, cfg, dom)
    }

    #[test]
    fn test_numbers_are_dense_from_one() {
        let (func, cfg, mut dom) = sample();
        let numbering = Numbering::compute(&func, &cfg, &mut dom);

        let mut all: Vec<u32> = (0..func.block_count())
            .map(|b| numbering.dfs(b, 0))
            .collect();
        all.sort_unstable();
        // One instruction per block here, so block-entry numbers cover 1..=5.
        assert_eq!(all, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn test_sdfs_reverses_sibling_order() {
        let (func, cfg, mut dom) = sample();
        let numbering = Numbering::compute(&func, &cfg, &mut dom);

        // DFS and SDFS visit the entry first either way.
        assert_eq!(numbering.dfs(0, 0), 1);
        assert_eq!(numbering.block_entry_sdfs(0), 1);

        // b and c are siblings under a: whichever DFS numbers first, SDFS
        // numbers last.
        let dfs_b_first = numbering.dfs(1, 0) < numbering.dfs(2, 0);
        let sdfs_b_first = numbering.sdfs(1, 0) < numbering.sdfs(2, 0);
        assert_ne!(dfs_b_first, sdfs_b_first);
    }

    #[test]
    fn test_subtree_exit_is_one_comparison() {
        let (func, cfg, mut dom) = sample();
        let numbering = Numbering::compute(&func, &cfg, &mut dom);

        // Walking in RPO, the second visited branch block has a smaller
        // SDFS than the first, signalling that the first subtree was left.
        let rpo = cfg.rpo();
        assert_eq!(rpo[0], 0);
        let first_branch = numbering.block_entry_sdfs(rpo[1]);
        let second_branch = numbering.block_entry_sdfs(rpo[2]);
        assert!(second_branch < first_branch);
    }
}
