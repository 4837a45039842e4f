//! Function representation: blocks plus the value table.
//!
//! A [`Function`] owns its basic blocks and a table describing every SSA
//! value in scope: arguments, interned constants, globals, and
//! instruction results. Block 0 is always the entry block.
//!
//! # Structure
//!
//! ```text
//! Function
//! ├── blocks: Vec<BasicBlock>   // block 0 is the entry
//! ├── values: Vec<ValueData>    // definition records, indexed by ValueId
//! └── constants: interning map  // ConstValue+Type -> ValueId
//! ```
//!
//! # Mutation surface
//!
//! The optimization pass mutates functions through a small set of
//! operations: [`Function::replace_all_uses`], [`Function::split_edge`],
//! and direct block edits. [`Function::verify`] checks SSA well-formedness
//! and is used by the test suites to validate both inputs and outputs.
//!
//! # Thread Safety
//!
//! `Function` is `Send` and `Sync` once constructed.

use std::fmt;

use rustc_hash::FxHashMap;

use crate::{
    analysis::{Cfg, DominatorTree},
    error::invalid_ir,
    ir::{BasicBlock, ConstValue, Instruction, Op, Type, ValueData, ValueId, ValueKind},
    Error, Result,
};

/// A function in SSA form.
#[derive(Debug, Clone)]
pub struct Function {
    /// Function name, used only for display.
    name: String,
    /// Basic blocks; block 0 is the entry.
    blocks: Vec<BasicBlock>,
    /// Value table indexed by [`ValueId`].
    values: Vec<ValueData>,
    /// Argument values in declaration order.
    args: Vec<ValueId>,
    /// Interning map for constants.
    constants: FxHashMap<(ConstValue, Type), ValueId>,
}

impl Function {
    /// Creates a new function with the given argument types and no blocks.
    #[must_use]
    pub fn new(name: impl Into<String>, arg_types: &[Type]) -> Self {
        let mut func = Self {
            name: name.into(),
            blocks: Vec::new(),
            values: Vec::new(),
            args: Vec::new(),
            constants: FxHashMap::default(),
        };
        for (i, ty) in arg_types.iter().enumerate() {
            let id = func.new_value(ValueKind::Argument(i as u32), ty.clone());
            func.args.push(id);
        }
        func
    }

    /// Returns the function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the basic blocks.
    #[must_use]
    pub fn blocks(&self) -> &[BasicBlock] {
        &self.blocks
    }

    /// Returns the number of blocks.
    #[must_use]
    pub fn block_count(&self) -> usize {
        self.blocks.len()
    }

    /// Returns a block by index.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    #[must_use]
    pub fn block(&self, id: usize) -> &BasicBlock {
        &self.blocks[id]
    }

    /// Returns a mutable block by index.
    ///
    /// # Panics
    ///
    /// Panics if the index is out of bounds.
    pub fn block_mut(&mut self, id: usize) -> &mut BasicBlock {
        &mut self.blocks[id]
    }

    /// Appends a new empty block and returns its index.
    pub fn add_block(&mut self) -> usize {
        let id = self.blocks.len();
        self.blocks.push(BasicBlock::new(id));
        id
    }

    /// Returns the argument values in declaration order.
    #[must_use]
    pub fn args(&self) -> &[ValueId] {
        &self.args
    }

    /// Returns the definition record of a value.
    ///
    /// # Panics
    ///
    /// Panics if the id is out of bounds.
    #[must_use]
    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.index()]
    }

    /// Number of values in the table.
    #[must_use]
    pub fn value_count(&self) -> usize {
        self.values.len()
    }

    /// Allocates a fresh value table entry.
    pub fn new_value(&mut self, kind: ValueKind, ty: Type) -> ValueId {
        let id = ValueId::new(self.values.len());
        self.values.push(ValueData::new(kind, ty));
        id
    }

    /// Returns the interned value for a constant, creating it on first use.
    pub fn constant(&mut self, value: ConstValue, ty: Type) -> ValueId {
        if let Some(&id) = self.constants.get(&(value, ty.clone())) {
            return id;
        }
        let id = self.new_value(ValueKind::Constant(value), ty.clone());
        self.constants.insert((value, ty), id);
        id
    }

    /// Creates a value for a named global.
    pub fn global(&mut self, name: impl Into<String>, ty: Type) -> ValueId {
        self.new_value(ValueKind::Global(name.into()), ty)
    }

    /// Records the definition site of an instruction-defined value.
    pub(crate) fn set_def_site(&mut self, id: ValueId, block: usize, index: usize) {
        self.values[id.index()].kind = ValueKind::Inst { block, index };
    }

    /// Rewrites every use of `from` into `to`, across all blocks.
    pub fn replace_all_uses(&mut self, from: ValueId, to: ValueId) {
        for block in &mut self.blocks {
            for inst in &mut block.instructions {
                inst.op.replace_uses(from, to);
            }
        }
    }

    /// Counts the uses of a value across the function.
    #[must_use]
    pub fn count_uses(&self, id: ValueId) -> usize {
        self.blocks
            .iter()
            .flat_map(|b| &b.instructions)
            .flat_map(Instruction::uses)
            .filter(|&u| u == id)
            .count()
    }

    /// Splits the CFG edge `from -> to` by inserting a fresh block that
    /// carries only an unconditional jump to `to`.
    ///
    /// The predecessor's terminator is retargeted and φ nodes in `to` have
    /// their incoming predecessor rewritten. Returns the new block's index.
    ///
    /// # Panics
    ///
    /// Panics if `from` has no terminator edge to `to`.
    pub fn split_edge(&mut self, from: usize, to: usize) -> usize {
        let mid = self.add_block();
        let term = self.blocks[from]
            .instructions
            .last_mut()
            .expect("split_edge: predecessor has no terminator");
        assert!(
            term.op.successors().contains(&to),
            "split_edge: no edge b{from} -> b{to}"
        );
        term.op.retarget(to, mid);
        self.blocks[mid].push(Op::Jump { target: to });

        for inst in &mut self.blocks[to].instructions {
            if let Op::Phi { incoming, .. } = &mut inst.op {
                for op in incoming {
                    if op.pred == from {
                        op.pred = mid;
                    }
                }
            }
        }
        mid
    }

    /// Renumbers recorded definition sites after block surgery.
    ///
    /// Walks every instruction and refreshes the (block, index) pair of the
    /// value it defines. Called by passes after inserting or deleting
    /// instructions.
    pub fn recompute_def_sites(&mut self) {
        let mut sites = Vec::new();
        for (b, block) in self.blocks.iter().enumerate() {
            for (i, inst) in block.instructions.iter().enumerate() {
                if let Some(def) = inst.def() {
                    sites.push((def, b, i));
                }
            }
        }
        for (def, b, i) in sites {
            self.set_def_site(def, b, i);
        }
    }

    /// Verifies SSA well-formedness.
    ///
    /// Checks, in order:
    ///
    /// 1. every block ends with a terminator and contains no interior one;
    /// 2. φ nodes appear only at block tops, with one operand per CFG
    ///    predecessor;
    /// 3. every use is dominated by its definition (φ operands are checked
    ///    against the end of their incoming predecessor).
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidIr`] for shape violations and
    /// [`Error::SsaViolation`] for dominance violations.
    pub fn verify(&self) -> Result<()> {
        for block in &self.blocks {
            let Some(last) = block.instructions.last() else {
                return Err(invalid_ir!("block b{} is empty (missing terminator)", block.id()));
            };
            if !last.is_terminator() {
                return Err(invalid_ir!("block b{} is missing its terminator", block.id()));
            }
            for inst in &block.instructions[..block.instructions.len() - 1] {
                if inst.is_terminator() {
                    return Err(invalid_ir!(
                        "terminator in the middle of block b{}",
                        block.id()
                    ));
                }
            }
            let mut seen_real = false;
            for inst in &block.instructions {
                if inst.is_phi() {
                    if seen_real {
                        return Err(invalid_ir!(
                            "phi below a non-phi instruction in block b{}",
                            block.id()
                        ));
                    }
                } else {
                    seen_real = true;
                }
            }
        }

        let cfg = Cfg::build(self)?;
        let dom = DominatorTree::build(&cfg);

        for block in &self.blocks {
            let preds = cfg.preds(block.id());
            for inst in block.phis() {
                let Op::Phi { incoming, .. } = &inst.op else {
                    unreachable!()
                };
                if incoming.len() != preds.len()
                    || !preds.iter().all(|p| incoming.iter().any(|op| op.pred == *p))
                {
                    return Err(invalid_ir!(
                        "phi in block b{} disagrees with its {} CFG predecessors",
                        block.id(),
                        preds.len()
                    ));
                }
            }
        }

        for block in &self.blocks {
            if !cfg.is_reachable(block.id()) {
                continue;
            }
            for (i, inst) in block.instructions.iter().enumerate() {
                if let Op::Phi { incoming, .. } = &inst.op {
                    for op in incoming {
                        if !self.def_dominates_block_end(&dom, op.value, op.pred) {
                            return Err(Error::SsaViolation {
                                value: op.value.index(),
                                block: block.id(),
                            });
                        }
                    }
                } else {
                    for used in inst.uses() {
                        if !self.def_dominates_use(&dom, used, block.id(), i) {
                            return Err(Error::SsaViolation {
                                value: used.index(),
                                block: block.id(),
                            });
                        }
                    }
                }
            }
        }
        Ok(())
    }

    fn def_dominates_use(
        &self,
        dom: &DominatorTree,
        value: ValueId,
        block: usize,
        index: usize,
    ) -> bool {
        match self.value(value).kind {
            ValueKind::Inst {
                block: db,
                index: di,
            } => {
                if db == block {
                    di < index
                } else {
                    dom.strictly_dominates(db, block)
                }
            }
            _ => true,
        }
    }

    fn def_dominates_block_end(&self, dom: &DominatorTree, value: ValueId, block: usize) -> bool {
        match self.value(value).kind {
            ValueKind::Inst { block: db, .. } => db == block || dom.strictly_dominates(db, block),
            _ => true,
        }
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "fn {}(", self.name)?;
        for (i, arg) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{arg}: {}", self.value(*arg).ty)?;
        }
        writeln!(f, ") {{")?;
        for block in &self.blocks {
            write!(f, "{block}")?;
        }
        writeln!(f, "}}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::BinaryOp;

    fn straight_line() -> Function {
        let mut func = Function::new("f", &[Type::I32, Type::I32]);
        let (x, y) = (func.args()[0], func.args()[1]);
        let b0 = func.add_block();
        let t = func.new_value(ValueKind::Inst { block: b0, index: 0 }, Type::I32);
        func.block_mut(b0).push(Op::Binary {
            op: BinaryOp::Add,
            dest: t,
            left: x,
            right: y,
        });
        func.block_mut(b0).push(Op::Return { value: Some(t) });
        func
    }

    #[test]
    fn test_constant_interning() {
        let mut func = Function::new("f", &[]);
        let a = func.constant(ConstValue::Int(1), Type::I32);
        let b = func.constant(ConstValue::Int(1), Type::I32);
        let c = func.constant(ConstValue::Int(1), Type::I64);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_verify_straight_line() {
        let func = straight_line();
        assert!(func.verify().is_ok());
    }

    #[test]
    fn test_verify_rejects_missing_terminator() {
        let mut func = Function::new("f", &[]);
        func.add_block();
        assert!(matches!(func.verify(), Err(Error::InvalidIr { .. })));
    }

    #[test]
    fn test_verify_rejects_use_before_def() {
        let mut func = Function::new("f", &[Type::I32]);
        let x = func.args()[0];
        let b0 = func.add_block();
        // v defined at index 1 but used at index 0
        let v = func.new_value(ValueKind::Inst { block: b0, index: 1 }, Type::I32);
        let u = func.new_value(ValueKind::Inst { block: b0, index: 0 }, Type::I32);
        func.block_mut(b0).push(Op::Binary {
            op: BinaryOp::Add,
            dest: u,
            left: v,
            right: x,
        });
        func.block_mut(b0).push(Op::Binary {
            op: BinaryOp::Add,
            dest: v,
            left: x,
            right: x,
        });
        func.block_mut(b0).push(Op::Return { value: None });
        assert!(matches!(func.verify(), Err(Error::SsaViolation { .. })));
    }

    #[test]
    fn test_replace_all_uses() {
        let mut func = straight_line();
        let x = func.args()[0];
        let y = func.args()[1];
        func.replace_all_uses(x, y);
        assert_eq!(func.count_uses(x), 0);
        assert_eq!(func.count_uses(y), 2);
    }

    #[test]
    fn test_split_edge() {
        let mut func = Function::new("f", &[Type::I1]);
        let c = func.args()[0];
        let b0 = func.add_block();
        let b1 = func.add_block();
        let b2 = func.add_block();
        func.block_mut(b0).push(Op::Branch {
            cond: c,
            on_true: b1,
            on_false: b2,
        });
        func.block_mut(b1).push(Op::Jump { target: b2 });
        func.block_mut(b2).push(Op::Return { value: None });

        let mid = func.split_edge(b0, b2);
        assert_eq!(func.block(b0).successors(), vec![b1, mid]);
        assert_eq!(func.block(mid).successors(), vec![b2]);
        assert!(func.verify().is_ok());
    }
}
