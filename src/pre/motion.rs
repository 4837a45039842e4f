//! Step 6: code motion.
//!
//! The only step that touches the IR. It runs in four phases:
//!
//! 1. **Inserts** - materialize the computations finalize recorded on
//!    predecessor edges. An insert landing on a critical edge splits the
//!    edge first; one computation serves every factor slot that asked for
//!    it on that edge.
//! 2. **φ planning** - allocate a result value for every needed factor so
//!    reloads can refer to the φ before it physically exists.
//! 3. **Walk** - one more RPO pass with the renaming stack discipline.
//!    Saved occurrences are pushed; reloads record a substitution to the
//!    stack top's value and join the kill list; at each terminator the
//!    per-predecessor incoming value of every needed successor factor is
//!    snapshotted from the stack tops.
//! 4. **Commit** - apply the substitution map everywhere, erase killed
//!    instructions, place the planned φs and edge inserts, and refresh
//!    recorded definition sites.
//!
//! The walk itself never mutates instruction lists, so the (block, index)
//! coordinates captured at collection time stay valid until commit.

use rustc_hash::FxHashMap;

use crate::ir::{Op, ValueId, ValueKind};

use super::{
    expression::ExprClass,
    factor::{FactorOperand, OccId, OccKind, Occurrence},
    rename::RenameStacks,
    PreContext, PreOutcome,
};

/// An instruction awaiting placement at commit time.
struct PendingInsert {
    block: usize,
    op: Op,
}

/// A φ node awaiting placement at commit time.
struct PendingPhi {
    factor: OccId,
    block: usize,
    value: ValueId,
}

/// Everything the walk decides without touching the IR.
#[derive(Default)]
struct WalkResult {
    /// Killed reload value -> surviving definition value.
    subst: FxHashMap<ValueId, ValueId>,
    /// (block, index) of instructions to erase.
    kills: Vec<(usize, usize)>,
    /// Killed values, for the post-commit use-freeness check.
    killed_values: Vec<ValueId>,
    /// (factor, slot) -> incoming value snapshot.
    incoming: FxHashMap<(OccId, usize), ValueId>,
}

impl PreContext<'_> {
    /// Step 6: rewrite the function and report the outcome.
    pub(crate) fn code_motion(&mut self) -> PreOutcome {
        let (pending_inserts, edge_remap) = self.materialize_inserts();
        let (phi_values, pending_phis) = self.plan_phis();
        let walk = self.walk(&phi_values);
        self.commit(pending_inserts, pending_phis, &edge_remap, walk)
    }

    /// Phase 1: create the inserted computations (still unplaced),
    /// splitting critical edges as needed. Factor slots that triggered an
    /// insert are repointed at the new occurrence.
    fn materialize_inserts(&mut self) -> (Vec<PendingInsert>, FxHashMap<(usize, usize), usize>) {
        let mut edge_remap: FxHashMap<(usize, usize), usize> = FxHashMap::default();
        let mut created: FxHashMap<(usize, super::factor::ProtoId), (ValueId, OccId)> =
            FxHashMap::default();
        let mut pending = Vec::new();

        let inserts = std::mem::take(&mut self.inserts);
        for insert in &inserts {
            let target = if self.cfg.is_critical_edge(insert.pred, insert.succ) {
                *edge_remap.entry((insert.pred, insert.succ)).or_insert_with(|| {
                    let mid = self.func.split_edge(insert.pred, insert.succ);
                    self.stats.blocks_added += 1;
                    mid
                })
            } else {
                insert.pred
            };

            let (_, occ) = match created.get(&(target, insert.proto)) {
                Some(&entry) => entry,
                None => {
                    let (tb, ti) = self.protos[insert.proto].template;
                    let mut op = self.func.block(tb).instructions[ti].op.clone();
                    let value = self.func.new_value(
                        ValueKind::Inst {
                            block: target,
                            index: 0,
                        },
                        self.protos[insert.proto].result_ty.clone(),
                    );
                    op.set_dest(value);
                    let version = self.occs[insert.factor].version;
                    let occ = self.push_occ(Occurrence::inserted(
                        insert.proto,
                        version,
                        target,
                        value,
                    ));
                    pending.push(PendingInsert { block: target, op });
                    self.stats.inserted += 1;
                    created.insert((target, insert.proto), (value, occ));
                    (value, occ)
                }
            };

            let data = self.occs[insert.factor].as_factor_mut().unwrap();
            data.operands[insert.slot] = FactorOperand::Def(occ);
        }

        (pending, edge_remap)
    }

    /// Phase 2: allocate the φ result values for needed factors.
    fn plan_phis(&mut self) -> (FxHashMap<OccId, ValueId>, Vec<PendingPhi>) {
        let mut values = FxHashMap::default();
        let mut pending = Vec::new();
        for &factor in &self.factors {
            let occ = &self.occs[factor];
            let data = occ.as_factor().unwrap();
            if !data.needed {
                continue;
            }
            debug_assert!(data.will_be_avail(), "only chosen factors are needed");
            let value = self.func.new_value(
                ValueKind::Inst {
                    block: data.block,
                    index: 0,
                },
                self.protos[occ.proto].result_ty.clone(),
            );
            values.insert(factor, value);
            pending.push(PendingPhi {
                factor,
                block: data.block,
                value,
            });
        }
        (values, pending)
    }

    /// Phase 3: the final stack walk.
    fn walk(&mut self, phi_values: &FxHashMap<OccId, ValueId>) -> WalkResult {
        let mut stacks = RenameStacks::new(self.protos.len());
        let mut result = WalkResult::default();

        for &block in self.cfg.rpo() {
            let entry_sdfs = self.numbering.block_entry_sdfs(block);
            for i in 0..self.block_factors[block].len() {
                let factor = self.block_factors[block][i];
                stacks.push(self.occs[factor].proto, entry_sdfs, factor);
            }

            let len = self.func.block(block).instructions.len();
            for index in 0..len {
                let sdfs = self.numbering.sdfs(block, index);
                if self.func.block(block).instructions[index].is_terminator() {
                    stacks.backtrace(sdfs);
                    self.snapshot_incoming(block, &stacks, phi_values, &mut result);
                    break;
                }

                let ExprClass::Occ(occ) = self.classes[block][index] else {
                    continue;
                };
                stacks.backtrace(sdfs);
                let proto = self.occs[occ].proto;

                if self.occs[occ].reload {
                    let top = stacks
                        .top(proto)
                        .expect("reload without a dominating definition on the stack");
                    let replacement = self.resolve(top, phi_values);
                    let killed = self.occs[occ]
                        .value()
                        .expect("real occurrences define a value");
                    result.subst.insert(killed, replacement);
                    result.kills.push((block, index));
                    result.killed_values.push(killed);
                    self.repoint_factor_slots(occ, top);
                    self.stats.reloaded += 1;
                } else {
                    // Saved definitions and ordinary occurrences both stay
                    // in place and shadow the stack for everything below.
                    stacks.push(proto, sdfs, occ);
                }
            }
        }

        result
    }

    /// At each terminator visit, capture the incoming value of every
    /// needed successor factor for this edge from the current stack tops.
    fn snapshot_incoming(
        &self,
        block: usize,
        stacks: &RenameStacks,
        phi_values: &FxHashMap<OccId, ValueId>,
        result: &mut WalkResult,
    ) {
        for &succ in self.cfg.succs(block) {
            for &factor in &self.block_factors[succ] {
                let data = self.occs[factor].as_factor().unwrap();
                if !data.needed {
                    continue;
                }
                let slot = data
                    .pred_index(block)
                    .expect("factor predecessor lists track CFG edges");
                let value = match data.operands[slot] {
                    FactorOperand::Def(def)
                        if matches!(self.occs[def].kind, OccKind::Inserted { .. }) =>
                    {
                        self.occs[def].value().unwrap()
                    }
                    _ => {
                        let top = stacks.top(self.occs[factor].proto).expect(
                            "a chosen factor has a definition on every non-inserted edge",
                        );
                        self.resolve(top, phi_values)
                    }
                };
                result.incoming.insert((factor, slot), value);
            }
        }
    }

    /// The SSA value an occurrence stands for after code motion.
    fn resolve(&self, occ: OccId, phi_values: &FxHashMap<OccId, ValueId>) -> ValueId {
        match &self.occs[occ].kind {
            OccKind::Real { value, .. } | OccKind::Inserted { value, .. } => *value,
            OccKind::Factor(_) => *phi_values
                .get(&occ)
                .expect("reload through a factor whose φ was not planned"),
        }
    }

    /// A killed occurrence referenced from factor operand slots is
    /// replaced by its surviving definition.
    fn repoint_factor_slots(&mut self, killed: OccId, replacement: OccId) {
        for i in 0..self.factors.len() {
            let factor = self.factors[i];
            let data = self.occs[factor].as_factor().unwrap();
            let slots: Vec<usize> = data
                .operands
                .iter()
                .enumerate()
                .filter(|&(_, op)| *op == FactorOperand::Def(killed))
                .map(|(slot, _)| slot)
                .collect();
            if slots.is_empty() {
                continue;
            }
            let data = self.occs[factor].as_factor_mut().unwrap();
            for slot in slots {
                data.operands[slot] = FactorOperand::Def(replacement);
            }
        }
    }

    /// Phase 4: apply every decision to the IR.
    fn commit(
        &mut self,
        pending_inserts: Vec<PendingInsert>,
        pending_phis: Vec<PendingPhi>,
        edge_remap: &FxHashMap<(usize, usize), usize>,
        walk: WalkResult,
    ) -> PreOutcome {
        let changed = !walk.kills.is_empty() || !pending_inserts.is_empty();

        // Rewrite uses of killed reloads to their surviving definitions.
        if !walk.subst.is_empty() {
            for block in 0..self.func.block_count() {
                for inst in &mut self.func.block_mut(block).instructions {
                    inst.op.map_uses(|v| walk.subst.get(&v).copied().unwrap_or(v));
                }
            }
        }

        // Erase the kill list.
        let mut kills_by_block: FxHashMap<usize, Vec<usize>> = FxHashMap::default();
        for (block, index) in &walk.kills {
            kills_by_block.entry(*block).or_default().push(*index);
        }
        for (block, indexes) in kills_by_block {
            let instructions = std::mem::take(&mut self.func.block_mut(block).instructions);
            self.func.block_mut(block).instructions = instructions
                .into_iter()
                .enumerate()
                .filter(|(i, _)| !indexes.contains(i))
                .map(|(_, inst)| inst)
                .collect();
        }
        self.stats.deleted += walk.kills.len();

        // Place the planned φs; incoming predecessors go through the
        // critical-edge remap.
        for phi in pending_phis {
            let data = self.occs[phi.factor].as_factor().unwrap();
            let incoming = data
                .preds
                .iter()
                .enumerate()
                .map(|(slot, &pred)| {
                    let value = *walk
                        .incoming
                        .get(&(phi.factor, slot))
                        .expect("every edge of a needed factor was snapshotted");
                    let pred = edge_remap.get(&(pred, phi.block)).copied().unwrap_or(pred);
                    crate::ir::PhiOperand::new(value, pred)
                })
                .collect();
            self.func.block_mut(phi.block).insert_phi(Op::Phi {
                dest: phi.value,
                incoming,
            });
        }

        // Place the edge inserts, with the substitution applied in case a
        // template operand was itself reloaded.
        for mut insert in pending_inserts {
            insert
                .op
                .map_uses(|v| walk.subst.get(&v).copied().unwrap_or(v));
            self.func
                .block_mut(insert.block)
                .insert_before_terminator(insert.op);
        }

        if changed {
            self.func.recompute_def_sites();
        }

        // Structural check: erased reloads must have no remaining uses.
        for killed in &walk.killed_values {
            assert_eq!(
                self.func.count_uses(*killed),
                0,
                "erased occurrence still has uses"
            );
        }

        self.stats.saved = self
            .occs
            .iter()
            .filter(|occ| occ.save && !occ.is_factor())
            .count();

        PreOutcome {
            changed,
            stats: self.stats,
        }
    }
}
