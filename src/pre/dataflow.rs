//! Steps 3 and 4: down-safety and will-be-available.
//!
//! Both analyses are monotone fixed points over the factor graph, driven
//! by explicit worklists. Renaming seeds `down_safe = false` on factors
//! whose value is superseded or reaches an exit unconsumed; step 3
//! propagates the clearing backwards through factor operands that carry
//! no real use. Step 4 then computes `can_be_avail` and `later` forwards;
//! a factor is chosen as a realization point iff
//! `can_be_avail ∧ ¬later`.

use super::{
    factor::{FactorOperand, OccId},
    PreContext,
};

impl PreContext<'_> {
    /// Step 3: propagate down-safety clearing to a fixed point.
    ///
    /// A factor that is not down-safe poisons every factor it consumes
    /// through an operand slot, unless that slot also carries a real use
    /// (the value is computed there regardless).
    pub(crate) fn down_safety(&mut self) {
        let mut worklist: Vec<OccId> = self
            .factors
            .iter()
            .copied()
            .filter(|&f| !self.occs[f].as_factor().unwrap().down_safe)
            .collect();

        while let Some(factor) = worklist.pop() {
            let data = self.occs[factor].as_factor().unwrap();
            let operands: Vec<(FactorOperand, bool)> = data
                .operands
                .iter()
                .copied()
                .zip(data.has_real_use.iter().copied())
                .collect();

            for (operand, has_real_use) in operands {
                if has_real_use {
                    continue;
                }
                let Some(def) = operand.as_def() else { continue };
                if !self.occs[def].is_factor() {
                    continue;
                }
                let inner = self.occs[def].as_factor_mut().unwrap();
                if inner.down_safe {
                    inner.down_safe = false;
                    worklist.push(def);
                }
            }
        }
    }

    /// Step 4: `CanBeAvail`, `Later`, and with them `WillBeAvail`.
    pub(crate) fn will_be_avail(&mut self) {
        self.compute_can_be_avail();
        self.compute_later();
    }

    fn compute_can_be_avail(&mut self) {
        // A factor that cannot legally be realized by inserting on its
        // incoming edges (an operand is defined at or below the join, as
        // with an operand-φ) must not be chosen whenever any edge might
        // need an insert.
        for i in 0..self.factors.len() {
            let factor = self.factors[i];
            let occ = &self.occs[factor];
            let data = occ.as_factor().unwrap();
            if !data.can_be_avail {
                continue;
            }
            if self.operands_dominate(occ.proto, data.block) {
                continue;
            }
            let needs_insert = data
                .operands
                .iter()
                .zip(&data.has_real_use)
                .any(|(op, &hru)| op.is_bottom() || !hru);
            if needs_insert {
                self.reset_can_be_avail(factor);
            }
        }

        for i in 0..self.factors.len() {
            let factor = self.factors[i];
            let data = self.occs[factor].as_factor().unwrap();
            if !data.down_safe
                && data.can_be_avail
                && data.operands.iter().any(|op| op.is_bottom())
            {
                self.reset_can_be_avail(factor);
            }
        }
    }

    /// Clears `can_be_avail` on `factor` and rewrites every non-real-use
    /// reference to it to ⊥, cascading into consumers that now match the
    /// trigger themselves.
    fn reset_can_be_avail(&mut self, factor: OccId) {
        let mut worklist = vec![factor];
        while let Some(cleared) = worklist.pop() {
            self.occs[cleared].as_factor_mut().unwrap().can_be_avail = false;
            for i in 0..self.factors.len() {
                let consumer = self.factors[i];
                let data = self.occs[consumer].as_factor().unwrap();
                let slots: Vec<usize> = data
                    .operands
                    .iter()
                    .enumerate()
                    .filter(|&(slot, op)| {
                        *op == FactorOperand::Def(cleared) && !data.has_real_use[slot]
                    })
                    .map(|(slot, _)| slot)
                    .collect();
                if slots.is_empty() {
                    continue;
                }
                let data = self.occs[consumer].as_factor_mut().unwrap();
                for slot in slots {
                    data.operands[slot] = FactorOperand::Bottom;
                }
                if !data.down_safe && data.can_be_avail {
                    data.can_be_avail = false;
                    worklist.push(consumer);
                }
            }
        }
    }

    fn compute_later(&mut self) {
        for i in 0..self.factors.len() {
            let factor = self.factors[i];
            let data = self.occs[factor].as_factor_mut().unwrap();
            data.later = data.can_be_avail;
        }

        for i in 0..self.factors.len() {
            let factor = self.factors[i];
            let data = self.occs[factor].as_factor().unwrap();
            if !data.later {
                continue;
            }
            let has_real_operand = data
                .operands
                .iter()
                .zip(&data.has_real_use)
                .any(|(op, &hru)| hru && !op.is_bottom());
            if has_real_operand {
                self.reset_later(factor);
            }
        }
    }

    /// A factor with a real operand on some edge must realize the value
    /// no later than itself, and so must everything consuming it.
    fn reset_later(&mut self, factor: OccId) {
        let mut worklist = vec![factor];
        while let Some(cleared) = worklist.pop() {
            self.occs[cleared].as_factor_mut().unwrap().later = false;
            for i in 0..self.factors.len() {
                let consumer = self.factors[i];
                let data = self.occs[consumer].as_factor().unwrap();
                if !data.later {
                    continue;
                }
                let references = data
                    .operands
                    .iter()
                    .any(|op| *op == FactorOperand::Def(cleared));
                if references {
                    worklist.push(consumer);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests_support::{diamond_pre, prepare};
    use super::*;
    use crate::ir::BinaryOp;

    #[test]
    fn test_diamond_factor_will_be_avail() {
        let (mut func, cfg, dom, numbering) = diamond_pre();
        let mut ctx = PreContext::new(&mut func, &cfg, &dom, numbering);
        ctx.collect();
        ctx.insert_factors();
        ctx.rename();
        ctx.down_safety();
        ctx.will_be_avail();

        let &factor = ctx.factors.first().unwrap();
        let data = ctx.occs[factor].as_factor().unwrap();
        assert!(data.down_safe);
        assert!(data.can_be_avail);
        assert!(!data.later);
        assert!(data.will_be_avail());
    }

    #[test]
    fn test_unconsumed_join_is_not_chosen() {
        // x+y above the join, nothing below: the factor lost down-safety
        // during renaming and has a ⊥ edge, so it cannot be available.
        let (mut func, cfg, dom, numbering) = prepare(|b| {
            let (x, y, c) = (b.args()[0], b.args()[1], b.args()[2]);
            let entry = b.create_block();
            let left = b.create_block();
            let right = b.create_block();
            let join = b.create_block();
            b.switch_to(entry);
            b.branch(c, left, right);
            b.switch_to(left);
            b.binary(BinaryOp::Add, x, y);
            b.jump(join);
            b.switch_to(right);
            b.jump(join);
            b.switch_to(join);
            b.ret(None);
        });
        let mut ctx = PreContext::new(&mut func, &cfg, &dom, numbering);
        ctx.collect();
        ctx.insert_factors();
        ctx.rename();
        ctx.down_safety();
        ctx.will_be_avail();

        let &factor = ctx.factors.first().unwrap();
        assert!(!ctx.occs[factor].will_be_avail());
    }

    #[test]
    fn test_fully_available_join_is_later() {
        // x+y in both branches and nothing below the join: available on
        // every edge, but with no consumer the factor stays `later` and
        // is not chosen.
        let (mut func, cfg, dom, numbering) = prepare(|b| {
            let (x, y, c) = (b.args()[0], b.args()[1], b.args()[2]);
            let entry = b.create_block();
            let left = b.create_block();
            let right = b.create_block();
            let join = b.create_block();
            b.switch_to(entry);
            b.branch(c, left, right);
            b.switch_to(left);
            b.binary(BinaryOp::Add, x, y);
            b.jump(join);
            b.switch_to(right);
            b.binary(BinaryOp::Add, x, y);
            b.jump(join);
            b.switch_to(join);
            b.ret(None);
        });
        let mut ctx = PreContext::new(&mut func, &cfg, &dom, numbering);
        ctx.collect();
        ctx.insert_factors();
        ctx.rename();
        ctx.down_safety();
        ctx.will_be_avail();

        let &factor = ctx.factors.first().unwrap();
        let data = ctx.occs[factor].as_factor().unwrap();
        // Real operands on both edges clear `later`...
        assert!(!data.later);
        // ...but the factor is also not down-safe, with no ⊥ edge, so it
        // still qualifies as a realization point for φ purposes only if
        // some consumer appears; will_be_avail itself holds.
        assert!(data.will_be_avail());
    }

    #[test]
    fn test_operand_phi_factor_never_chosen() {
        let (mut func, cfg, dom, numbering) = prepare(|b| {
            let (x, y, c) = (b.args()[0], b.args()[1], b.args()[2]);
            let entry = b.create_block();
            let left = b.create_block();
            let right = b.create_block();
            let join = b.create_block();
            let tail = b.create_block();
            b.switch_to(entry);
            b.branch(c, left, right);
            b.switch_to(left);
            b.jump(join);
            b.switch_to(right);
            b.jump(join);
            b.switch_to(join);
            let merged = b.phi(crate::ir::Type::I32, &[(x, left), (y, right)]);
            b.binary(BinaryOp::Add, merged, y);
            b.jump(tail);
            b.switch_to(tail);
            b.binary(BinaryOp::Add, merged, y);
            b.ret(None);
        });
        let mut ctx = PreContext::new(&mut func, &cfg, &dom, numbering);
        ctx.collect();
        ctx.insert_factors();
        ctx.rename();
        ctx.down_safety();
        ctx.will_be_avail();

        // The factor at the join cannot be realized by edge insertion
        // (its operand is the φ at the join itself).
        for &factor in &ctx.factors {
            let data = ctx.occs[factor].as_factor().unwrap();
            if data.block == 3 {
                assert!(!data.will_be_avail());
            }
        }
    }
}
