//! Step 5: finalize.
//!
//! A forward scan in RPO that decides, for every (prototype, version),
//! which occurrence is the surviving definition. The first dominating
//! occurrence wins the `AvailDef` slot; occurrences below it become
//! reloads and the definition is marked saved. Factor operands feeding a
//! chosen (will-be-available) factor either pin their version's
//! definition as saved or, where no definition reaches the edge, record
//! an insertion for code motion to materialize.
//!
//! A reload whose definition is a factor marks the factor *needed*: its
//! φ must actually be materialized. Neededness propagates through
//! factor-valued operand slots so incoming values exist for every edge.

use super::{expression::ExprClass, factor::FactorOperand, EdgeInsert, PreContext};

impl PreContext<'_> {
    /// Step 5: mark saves and reloads, record edge inserts.
    pub(crate) fn finalize(&mut self) {
        for &block in self.cfg.rpo() {
            self.finalize_factors_at(block);
            self.finalize_instructions_at(block);
        }
        self.propagate_needed();
    }

    fn finalize_factors_at(&mut self, block: usize) {
        for i in 0..self.block_factors[block].len() {
            let factor = self.block_factors[block][i];
            self.occs[factor].save = false;
            self.occs[factor].reload = false;
            if self.occs[factor].will_be_avail() {
                let key = (self.occs[factor].proto, self.occs[factor].version);
                self.avail_def.insert(key, factor);
            }
        }
    }

    fn finalize_instructions_at(&mut self, block: usize) {
        let len = self.func.block(block).instructions.len();
        for index in 0..len {
            if self.func.block(block).instructions[index].is_terminator() {
                self.finalize_terminator(block);
                break;
            }
            let ExprClass::Occ(occ) = self.classes[block][index] else {
                continue;
            };

            self.occs[occ].save = false;
            self.occs[occ].reload = false;
            let proto = self.occs[occ].proto;
            let version = self.occs[occ].version;
            debug_assert!(version >= 0, "renaming left an occurrence unversioned");

            match self.avail_def.get(&(proto, version)).copied() {
                None => {
                    self.avail_def.insert((proto, version), occ);
                }
                Some(def) if !self.occ_dominates(def, occ) => {
                    self.avail_def.insert((proto, version), occ);
                }
                Some(def) => {
                    if self.occs[def].is_real() {
                        self.occs[def].save = true;
                    } else {
                        // Reloading from a factor commits code motion to
                        // materializing its φ.
                        self.occs[def].as_factor_mut().unwrap().needed = true;
                    }
                    self.occs[occ].reload = true;
                }
            }
        }
    }

    /// At a terminator, every will-be-available factor in a successor
    /// either finds its edge operand's definition (and pins it as saved)
    /// or requires an insertion on this edge.
    fn finalize_terminator(&mut self, block: usize) {
        for &succ in self.cfg.succs(block) {
            for i in 0..self.block_factors[succ].len() {
                let factor = self.block_factors[succ][i];
                if !self.occs[factor].will_be_avail() {
                    continue;
                }
                let proto = self.occs[factor].proto;
                let data = self.occs[factor].as_factor().unwrap();
                let slot = data
                    .pred_index(block)
                    .expect("factor predecessor lists track CFG edges");
                let operand = data.operands[slot];
                let has_real_use = data.has_real_use[slot];

                let needs_insert = match operand {
                    FactorOperand::Bottom => true,
                    FactorOperand::Def(def) => {
                        !has_real_use
                            && self.occs[def].is_factor()
                            && !self.occs[def].will_be_avail()
                    }
                };

                if needs_insert {
                    self.inserts.push(EdgeInsert {
                        pred: block,
                        succ,
                        factor,
                        slot,
                        proto,
                    });
                } else if let FactorOperand::Def(def) = operand {
                    let version = self.occs[def].version;
                    if let Some(&sink) = self.avail_def.get(&(proto, version)) {
                        if self.occs[sink].is_real() {
                            self.occs[sink].save = true;
                        }
                    }
                }
            }
        }
    }

    /// A needed factor whose incoming edge carries another factor needs
    /// that factor's φ too.
    fn propagate_needed(&mut self) {
        let mut worklist: Vec<usize> = self
            .factors
            .iter()
            .copied()
            .filter(|&f| self.occs[f].as_factor().unwrap().needed)
            .collect();

        while let Some(factor) = worklist.pop() {
            let operands = self.occs[factor].as_factor().unwrap().operands.clone();
            for operand in operands {
                let Some(def) = operand.as_def() else { continue };
                if !self.occs[def].is_factor() {
                    continue;
                }
                let inner = self.occs[def].as_factor_mut().unwrap();
                if inner.will_be_avail() && !inner.needed {
                    inner.needed = true;
                    worklist.push(def);
                }
            }
        }
    }
}
