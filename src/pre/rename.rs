//! Step 2: renaming.
//!
//! Walks blocks in CFG reverse post-order while maintaining one stack of
//! `(sdfs, occurrence)` pairs per prototype. Factors receive fresh
//! versions at block entry; real occurrences inherit the version on top
//! of their prototype's stack or open a new one. Because stack entries
//! are stamped with SDFS numbers, leaving a dominator subtree needs no
//! callback: entries with an SDFS greater than the current instruction's
//! are simply popped before each use of a stack.
//!
//! Renaming also seeds the down-safety analysis: a factor is not
//! down-safe when its version is superseded by a fresh one, or when it is
//! still the live version at a function exit with no consumer having
//! appeared.

use super::{
    expression::ExprClass,
    factor::{FactorOperand, OccId},
    PreContext,
};

/// Per-prototype renaming stacks.
pub(crate) struct RenameStacks {
    stacks: Vec<Vec<(u32, OccId)>>,
}

impl RenameStacks {
    pub(crate) fn new(protos: usize) -> Self {
        Self {
            stacks: vec![Vec::new(); protos],
        }
    }

    pub(crate) fn push(&mut self, proto: usize, sdfs: u32, occ: OccId) {
        self.stacks[proto].push((sdfs, occ));
    }

    pub(crate) fn top(&self, proto: usize) -> Option<OccId> {
        self.stacks[proto].last().map(|&(_, occ)| occ)
    }

    /// Pops every entry, on every stack, stamped with an SDFS greater
    /// than `sdfs` - those definitions belong to dominator subtrees the
    /// walk has left.
    pub(crate) fn backtrace(&mut self, sdfs: u32) {
        for stack in &mut self.stacks {
            while stack.last().is_some_and(|&(entry, _)| entry > sdfs) {
                stack.pop();
            }
        }
    }
}

impl PreContext<'_> {
    /// Step 2: assign versions to every live occurrence and fill factor
    /// operand slots.
    pub(crate) fn rename(&mut self) {
        let mut stacks = RenameStacks::new(self.protos.len());

        for &block in self.cfg.rpo() {
            let entry_sdfs = self.numbering.block_entry_sdfs(block);

            for i in 0..self.block_factors[block].len() {
                let occ = self.block_factors[block][i];
                let proto = self.occs[occ].proto;
                self.occs[occ].version = self.next_version(proto);
                stacks.push(proto, entry_sdfs, occ);
            }

            let len = self.func.block(block).instructions.len();
            for index in 0..len {
                let sdfs = self.numbering.sdfs(block, index);
                let is_terminator = self.func.block(block).instructions[index].is_terminator();

                if is_terminator {
                    stacks.backtrace(sdfs);
                    self.update_successor_factors(block, &stacks);
                    if self.cfg.succs(block).is_empty() {
                        self.clear_exit_down_safety(&stacks);
                    }
                    break;
                }

                let ExprClass::Occ(occ) = self.classes[block][index] else {
                    continue;
                };
                stacks.backtrace(sdfs);

                let proto = self.occs[occ].proto;
                match stacks.top(proto) {
                    None => {
                        let version = self.next_version(proto);
                        self.occs[occ].version = version;
                    }
                    Some(top) if self.occs[top].is_real() => {
                        self.occs[occ].version = self.occs[top].version;
                    }
                    Some(top) => {
                        // Top is a factor. The occurrence is a use of the
                        // factor's merged value only when all its operand
                        // definitions reach above the join.
                        let factor_block = self.occs[top].block();
                        if self.operands_dominate(proto, factor_block) {
                            self.occs[occ].version = self.occs[top].version;
                        } else {
                            let version = self.next_version(proto);
                            self.occs[occ].version = version;
                            if let Some(data) = self.occs[top].as_factor_mut() {
                                data.down_safe = false;
                            }
                        }
                    }
                }
                stacks.push(proto, sdfs, occ);
            }
        }
    }

    /// At a terminator, hand the current stack tops to every factor in
    /// every CFG successor. An empty stack means ⊥ on that edge.
    fn update_successor_factors(&mut self, block: usize, stacks: &RenameStacks) {
        for &succ in self.cfg.succs(block) {
            for i in 0..self.block_factors[succ].len() {
                let occ = self.block_factors[succ][i];
                let proto = self.occs[occ].proto;
                let top = stacks.top(proto);
                let is_real = top.is_some_and(|t| self.occs[t].is_real());
                let data = self.occs[occ]
                    .as_factor_mut()
                    .expect("block factor lists contain factors");
                let slot = data
                    .pred_index(block)
                    .expect("terminator's block is a predecessor of its successors");
                data.operands[slot] = match top {
                    Some(t) => FactorOperand::Def(t),
                    None => FactorOperand::Bottom,
                };
                data.has_real_use[slot] = is_real;
            }
        }
    }

    /// Values still merged-but-unconsumed at a function exit are not
    /// anticipated beyond it.
    fn clear_exit_down_safety(&mut self, stacks: &RenameStacks) {
        for proto in 0..self.protos.len() {
            if let Some(top) = stacks.top(proto) {
                if let Some(data) = self.occs[top].as_factor_mut() {
                    data.down_safe = false;
                }
            }
        }
    }
}
