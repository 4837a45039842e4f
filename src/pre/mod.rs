//! SSA-based partial redundancy elimination.
//!
//! The pass eliminates redundant computations of pure scalar expressions
//! by inserting compensating copies on paths where a value is missing and
//! replacing later occurrences with references to the surviving dominating
//! computation - without lengthening any execution path.
//!
//! # Pipeline
//!
//! Data flows strictly through six steps; each reads the products of the
//! earlier ones and mutates only its own fields:
//!
//! 1. **Factor insertion** - place synthetic φ-for-expression nodes at the
//!    iterated dominance frontier of each expression's occurrence blocks,
//!    and at joins where an operand is itself an IR φ.
//! 2. **Renaming** - assign versions to real and factor occurrences with a
//!    per-prototype stack walk keyed on SDFS numbers.
//! 3. **Down-safety** - clear `DownSafe` on factors whose value is not
//!    anticipated on every path to exit (backward fixed point).
//! 4. **Will-be-available** - compute `CanBeAvail` and `Later` to their
//!    least fixed points; `WillBeAvail = CanBeAvail ∧ ¬Later`.
//! 5. **Finalize** - decide per version which occurrence is the saved
//!    definition, which occurrences reload it, and which edges need an
//!    inserted computation.
//! 6. **Code motion** - mutate the IR: split critical edges, materialize
//!    inserts and φ nodes, rewrite reload uses, erase dead occurrences.
//!
//! Only step 6 touches the IR. The whole pass is a pure function of the
//! input function; all intermediate state lives in a per-run context that
//! is dropped on return.
//!
//! # Usage
//!
//! ```rust
//! use ssapre::{ir::{BinaryOp, FunctionBuilder, Type}, SsaPre};
//!
//! let mut b = FunctionBuilder::new("redundant", &[Type::I32, Type::I32]);
//! let (x, y) = (b.args()[0], b.args()[1]);
//! let entry = b.create_block();
//! b.switch_to(entry);
//! let t1 = b.binary(BinaryOp::Add, x, y);
//! let t2 = b.binary(BinaryOp::Add, x, y);
//! let sum = b.binary(BinaryOp::Mul, t1, t2);
//! b.ret(Some(sum));
//! let mut func = b.finish()?;
//!
//! let outcome = SsaPre::run(&mut func)?;
//! assert!(outcome.changed);
//! assert_eq!(outcome.stats.reloaded, 1);
//! assert_eq!(outcome.stats.deleted, 1);
//! # Ok::<(), ssapre::Error>(())
//! ```

mod dataflow;
mod expression;
mod factor;
mod finalize;
mod motion;
mod numbering;
mod rename;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::{
    analysis::{Cfg, DominatorTree, IdfCalculator},
    ir::{Function, Type, ValueKind},
    Result,
};

use expression::{build_key, ExprClass, ExprKey};
use factor::{OccId, OccKind, Occurrence, ProtoId};
use numbering::Numbering;

/// Observable counters of one pass run.
///
/// `saved` counts surviving definitions (including inserted ones) that at
/// least one other occurrence relies on; `reloaded` counts occurrences
/// rewritten to reuse a definition; `inserted` and `deleted` count
/// materialized and erased instructions; `blocks_added` counts critical
/// edges split to host an insertion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreStats {
    /// Definitions marked as the sink other occurrences reuse.
    pub saved: usize,
    /// Occurrences replaced by a reference to a dominating definition.
    pub reloaded: usize,
    /// Computations materialized on predecessor edges.
    pub inserted: usize,
    /// Instructions erased.
    pub deleted: usize,
    /// Blocks created by splitting critical edges.
    pub blocks_added: usize,
}

/// Result of one pass run: the change report plus counters.
#[derive(Debug, Clone, Copy, Default)]
pub struct PreOutcome {
    /// Whether the IR was mutated. When `false`, every analysis the
    /// caller holds is still valid.
    pub changed: bool,
    /// Counters for this run.
    pub stats: PreStats,
}

/// SSA partial redundancy elimination pass.
///
/// Stateless entry point; all working state is per-run. See the module
/// documentation for the algorithm.
#[derive(Debug, Default)]
pub struct SsaPre;

impl SsaPre {
    /// Runs the pass, computing the CFG and dominator tree internally.
    ///
    /// # Errors
    ///
    /// Returns an error if the function's block structure is malformed.
    pub fn run(func: &mut Function) -> Result<PreOutcome> {
        let cfg = Cfg::build(func)?;
        let mut dom = DominatorTree::build(&cfg);
        Self::run_with(func, &cfg, &mut dom)
    }

    /// Runs the pass against precomputed analyses.
    ///
    /// The dominator tree's child ordering is sorted twice as a side
    /// effect of the numbering step. After a run that reports `changed`,
    /// both analyses are stale and must be rebuilt by the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the function's block structure is malformed.
    pub fn run_with(
        func: &mut Function,
        cfg: &Cfg,
        dom: &mut DominatorTree,
    ) -> Result<PreOutcome> {
        if func.block_count() == 0 {
            return Ok(PreOutcome::default());
        }
        let numbering = Numbering::compute(func, cfg, dom);
        let mut ctx = PreContext::new(func, cfg, dom, numbering);
        ctx.collect();
        ctx.insert_factors();
        ctx.rename();
        ctx.down_safety();
        ctx.will_be_avail();
        ctx.finalize();
        Ok(ctx.code_motion())
    }
}

/// A prototype expression: the canonical key plus what the pass needs to
/// re-materialize the computation.
#[derive(Debug)]
pub(crate) struct ProtoData {
    /// Canonical identity.
    key: ExprKey,
    /// Result type of the computation (differs from `key.ty` for address
    /// computations, whose key carries the element type).
    result_ty: Type,
    /// (block, index) of the first collected occurrence; cloned as the
    /// instruction template for edge inserts.
    template: (usize, usize),
    /// Blocks containing real occurrences, deduplicated, in RPO
    /// discovery order.
    blocks: Vec<usize>,
}

/// An edge insertion decided by finalize: `factor`'s operand `slot` on the
/// edge `pred -> succ` needs a fresh computation of `proto`.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EdgeInsert {
    pred: usize,
    succ: usize,
    factor: OccId,
    slot: usize,
    proto: ProtoId,
}

/// Per-run working state shared by the six steps.
pub(crate) struct PreContext<'a> {
    func: &'a mut Function,
    cfg: &'a Cfg,
    dom: &'a DominatorTree,
    numbering: Numbering,
    /// Prototype table.
    protos: Vec<ProtoData>,
    proto_index: FxHashMap<ExprKey, ProtoId>,
    /// Occurrence arena; factors reference each other through it.
    occs: Vec<Occurrence>,
    /// Per-instruction classification, `[block][index]`, lock-step with
    /// the instruction lists at collection time.
    classes: Vec<Vec<ExprClass>>,
    /// Factors at each block, in creation order.
    block_factors: Vec<Vec<OccId>>,
    /// All factors.
    factors: Vec<OccId>,
    /// Per-prototype version counters.
    counters: Vec<i32>,
    /// Finalize: (prototype, version) -> defining occurrence.
    avail_def: FxHashMap<(ProtoId, i32), OccId>,
    /// Finalize: edges requiring an inserted computation.
    inserts: Vec<EdgeInsert>,
    stats: PreStats,
}

impl<'a> PreContext<'a> {
    fn new(
        func: &'a mut Function,
        cfg: &'a Cfg,
        dom: &'a DominatorTree,
        numbering: Numbering,
    ) -> Self {
        let n = func.block_count();
        Self {
            func,
            cfg,
            dom,
            numbering,
            protos: Vec::new(),
            proto_index: FxHashMap::default(),
            occs: Vec::new(),
            classes: vec![Vec::new(); n],
            block_factors: vec![Vec::new(); n],
            factors: Vec::new(),
            counters: Vec::new(),
            avail_def: FxHashMap::default(),
            inserts: Vec::new(),
            stats: PreStats::default(),
        }
    }

    /// Classifies every instruction and interns prototypes. Two
    /// expression objects per instruction in spirit: the prototype groups
    /// syntactic occurrences, the arena occurrence carries the version.
    fn collect(&mut self) {
        for &block in self.cfg.rpo() {
            let len = self.func.block(block).instructions.len();
            for index in 0..len {
                let inst = self.func.block(block).instructions[index].clone();
                if inst.is_terminator() {
                    self.classes[block].push(ExprClass::Unknown);
                    continue;
                }
                let class = match build_key(&inst.op, block, self.func, &self.numbering) {
                    Err(inert) => inert,
                    Ok((key, result_ty)) => {
                        let proto = self.intern_proto(key, result_ty, (block, index));
                        if self.protos[proto].blocks.last() != Some(&block) {
                            self.protos[proto].blocks.push(block);
                        }
                        let value = inst
                            .def()
                            .expect("pure and phi instructions define a value");
                        let occ = self.push_occ(Occurrence::real(
                            proto,
                            block,
                            index,
                            value,
                            inst.is_phi(),
                        ));
                        ExprClass::Occ(occ)
                    }
                };
                self.classes[block].push(class);
            }
        }
    }

    fn intern_proto(&mut self, key: ExprKey, result_ty: Type, template: (usize, usize)) -> ProtoId {
        if let Some(&id) = self.proto_index.get(&key) {
            return id;
        }
        let id = self.protos.len();
        self.protos.push(ProtoData {
            key: key.clone(),
            result_ty,
            template,
            blocks: Vec::new(),
        });
        self.proto_index.insert(key, id);
        self.counters.push(0);
        id
    }

    fn push_occ(&mut self, occ: Occurrence) -> OccId {
        let id = self.occs.len();
        self.occs.push(occ);
        id
    }

    /// Step 1: place factors at the iterated dominance frontier of each
    /// prototype's occurrence blocks, and at the join block of every IR φ
    /// appearing as an operand of the prototype.
    fn insert_factors(&mut self) {
        let idf = IdfCalculator::new(self.cfg, self.dom);
        let mut present: FxHashSet<(ProtoId, usize)> = FxHashSet::default();

        for proto in 0..self.protos.len() {
            for block in idf.calculate(&self.protos[proto].blocks) {
                self.add_factor(proto, block, &mut present);
            }

            // An operand redefined through a φ merge starts a new
            // expression version at the same join, even when the
            // expression's own occurrences don't merge there.
            if self.protos[proto].key.block.is_none() {
                let operands = self.protos[proto].key.operands.clone();
                for operand in operands {
                    if let ValueKind::Inst { block, index } = self.func.value(operand).kind {
                        if self.func.block(block).instructions[index].is_phi() {
                            self.add_factor(proto, block, &mut present);
                        }
                    }
                }
            }
        }
    }

    fn add_factor(&mut self, proto: ProtoId, block: usize, present: &mut FxHashSet<(ProtoId, usize)>) {
        if !present.insert((proto, block)) || !self.cfg.is_reachable(block) {
            return;
        }
        let preds = self.cfg.preds(block).to_vec();
        let occ = self.push_occ(Occurrence::factor(proto, block, preds));
        self.block_factors[block].push(occ);
        self.factors.push(occ);
    }

    /// Fresh version for a prototype.
    fn next_version(&mut self, proto: ProtoId) -> i32 {
        let version = self.counters[proto];
        self.counters[proto] += 1;
        version
    }

    /// Whether all operand definitions of a prototype strictly dominate a
    /// block. Holding this at a factor's block is what makes edge inserts
    /// for the prototype legal on the factor's incoming edges.
    fn operands_dominate(&self, proto: ProtoId, block: usize) -> bool {
        self.protos[proto]
            .key
            .operands
            .iter()
            .all(|&operand| match self.func.value(operand).kind {
                ValueKind::Inst { block: def, .. } => self.dom.strictly_dominates(def, block),
                _ => true,
            })
    }

    /// Whether the definition occurrence dominates the (real) use
    /// occurrence. Factors sit conceptually at the top of their block.
    fn occ_dominates(&self, def: OccId, use_occ: OccId) -> bool {
        let OccKind::Real {
            block: use_block,
            index: use_index,
            ..
        } = self.occs[use_occ].kind
        else {
            unreachable!("availability is only queried at real occurrences");
        };
        match &self.occs[def].kind {
            OccKind::Real { block, index, .. } => {
                if *block == use_block {
                    *index < use_index
                } else {
                    self.dom.strictly_dominates(*block, use_block)
                }
            }
            OccKind::Factor(data) => self.dom.dominates(data.block, use_block),
            OccKind::Inserted { .. } => {
                unreachable!("inserted occurrences do not exist before code motion")
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, FunctionBuilder};

    fn prepared(
        build: impl FnOnce(&mut FunctionBuilder),
    ) -> (Function, Cfg, DominatorTree) {
        let mut b = FunctionBuilder::new("t", &[Type::I32, Type::I32, Type::I1]);
        build(&mut b);
        let func = b.finish().unwrap();
        let cfg = Cfg::build(&func).unwrap();
        let dom = DominatorTree::build(&cfg);
        (func, cfg, dom)
    }

    #[test]
    fn test_collect_groups_occurrences_by_prototype() {
        let (mut func, cfg, mut dom) = prepared(|b| {
            let (x, y) = (b.args()[0], b.args()[1]);
            let entry = b.create_block();
            b.switch_to(entry);
            b.binary(BinaryOp::Add, x, y);
            b.binary(BinaryOp::Add, y, x); // commutes to the same prototype
            b.binary(BinaryOp::Mul, x, y);
            b.ret(None);
        });
        let numbering = Numbering::compute(&func, &cfg, &mut dom);
        let mut ctx = PreContext::new(&mut func, &cfg, &dom, numbering);
        ctx.collect();

        assert_eq!(ctx.protos.len(), 2);
        assert_eq!(ctx.occs.len(), 3);
        assert_eq!(ctx.occs[0].proto, ctx.occs[1].proto);
        assert_ne!(ctx.occs[0].proto, ctx.occs[2].proto);
    }

    #[test]
    fn test_factors_placed_at_idf() {
        let (mut func, cfg, mut dom) = prepared(|b| {
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
            b.binary(BinaryOp::Add, x, y);
            b.ret(None);
        });
        let numbering = Numbering::compute(&func, &cfg, &mut dom);
        let mut ctx = PreContext::new(&mut func, &cfg, &dom, numbering);
        ctx.collect();
        ctx.insert_factors();

        assert_eq!(ctx.factors.len(), 1);
        assert_eq!(ctx.block_factors[3].len(), 1);
        let factor = ctx.occs[ctx.factors[0]].as_factor().unwrap();
        assert_eq!(factor.preds, vec![1, 2]);
    }

    #[test]
    fn test_operand_phi_gets_factor() {
        let (mut func, cfg, mut dom) = prepared(|b| {
            let (x, y, c) = (b.args()[0], b.args()[1], b.args()[2]);
            let entry = b.create_block();
            let left = b.create_block();
            let right = b.create_block();
            let join = b.create_block();
            b.switch_to(entry);
            b.branch(c, left, right);
            b.switch_to(left);
            b.jump(join);
            b.switch_to(right);
            b.jump(join);
            b.switch_to(join);
            let merged = b.phi(Type::I32, &[(x, left), (y, right)]);
            // x+merged only occurs below the join; its factor comes from
            // the operand-φ rule, not the IDF.
            b.binary(BinaryOp::Add, x, merged);
            b.ret(None);
        });
        let numbering = Numbering::compute(&func, &cfg, &mut dom);
        let mut ctx = PreContext::new(&mut func, &cfg, &dom, numbering);
        ctx.collect();
        ctx.insert_factors();

        let add_proto = ctx.occs.iter().find_map(|o| match &o.kind {
            OccKind::Real { is_phi: false, .. } => Some(o.proto),
            _ => None,
        });
        let factor_protos: Vec<ProtoId> = ctx
            .factors
            .iter()
            .map(|&f| ctx.occs[f].proto)
            .collect();
        assert!(factor_protos.contains(&add_proto.unwrap()));
        assert!(ctx.block_factors[3].iter().any(|&f| ctx.occs[f].proto == add_proto.unwrap()));
    }
}
