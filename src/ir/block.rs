//! Basic blocks.
//!
//! A block is a straight-line instruction sequence. φ nodes, when present,
//! sit at the top and are conceptually evaluated simultaneously at block
//! entry; the last instruction is always a terminator. The φ-at-top and
//! terminator-last invariants are enforced by
//! [`Function::verify`](crate::ir::Function::verify), not by this
//! container.

use std::fmt;

use crate::ir::{Instruction, Op};

/// A basic block: an id plus its instruction list.
#[derive(Debug, Clone, PartialEq)]
pub struct BasicBlock {
    /// Block index within the function.
    id: usize,
    /// Instructions in execution order, φs first, terminator last.
    pub instructions: Vec<Instruction>,
}

impl BasicBlock {
    /// Creates a new empty block.
    #[must_use]
    pub const fn new(id: usize) -> Self {
        Self {
            id,
            instructions: Vec::new(),
        }
    }

    /// Returns the block index.
    #[must_use]
    pub const fn id(&self) -> usize {
        self.id
    }

    /// Returns the terminator, or `None` for a block still under
    /// construction.
    #[must_use]
    pub fn terminator(&self) -> Option<&Instruction> {
        self.instructions.last().filter(|i| i.is_terminator())
    }

    /// Successor blocks of this block's terminator.
    #[must_use]
    pub fn successors(&self) -> Vec<usize> {
        self.terminator().map_or_else(Vec::new, |t| t.op.successors())
    }

    /// Returns an iterator over the φ nodes at the top of the block.
    pub fn phis(&self) -> impl Iterator<Item = &Instruction> {
        self.instructions.iter().take_while(|i| i.is_phi())
    }

    /// Number of φ nodes at the top of the block.
    #[must_use]
    pub fn phi_count(&self) -> usize {
        self.phis().count()
    }

    /// Appends an instruction.
    pub fn push(&mut self, op: Op) {
        self.instructions.push(Instruction::new(op));
    }

    /// Inserts an instruction immediately before the terminator.
    ///
    /// # Panics
    ///
    /// Panics if the block has no terminator.
    pub fn insert_before_terminator(&mut self, op: Op) {
        assert!(
            self.terminator().is_some(),
            "block b{} has no terminator",
            self.id
        );
        let at = self.instructions.len() - 1;
        self.instructions.insert(at, Instruction::new(op));
    }

    /// Inserts a φ node at the top of the block, after any existing φs.
    pub fn insert_phi(&mut self, op: Op) {
        debug_assert!(op.is_phi(), "insert_phi requires a phi operation");
        let at = self.phi_count();
        self.instructions.insert(at, Instruction::new(op));
    }
}

impl fmt::Display for BasicBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "b{}:", self.id)?;
        for inst in &self.instructions {
            writeln!(f, "  {inst}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{BinaryOp, PhiOperand, ValueId};

    #[test]
    fn test_block_shape_helpers() {
        let mut block = BasicBlock::new(2);
        block.push(Op::Phi {
            dest: ValueId::new(3),
            incoming: vec![PhiOperand::new(ValueId::new(1), 0)],
        });
        block.push(Op::Binary {
            op: BinaryOp::Add,
            dest: ValueId::new(4),
            left: ValueId::new(3),
            right: ValueId::new(3),
        });
        block.push(Op::Return {
            value: Some(ValueId::new(4)),
        });

        assert_eq!(block.id(), 2);
        assert_eq!(block.phi_count(), 1);
        assert!(block.terminator().is_some());
        assert!(block.successors().is_empty());
    }

    #[test]
    fn test_insert_before_terminator() {
        let mut block = BasicBlock::new(0);
        block.push(Op::Jump { target: 1 });
        block.insert_before_terminator(Op::Binary {
            op: BinaryOp::Add,
            dest: ValueId::new(2),
            left: ValueId::new(0),
            right: ValueId::new(1),
        });

        assert_eq!(block.instructions.len(), 2);
        assert!(block.instructions[1].is_terminator());
        assert_eq!(block.instructions[0].def(), Some(ValueId::new(2)));
    }

    #[test]
    fn test_insert_phi_after_existing_phis() {
        let mut block = BasicBlock::new(1);
        block.push(Op::Phi {
            dest: ValueId::new(5),
            incoming: vec![],
        });
        block.push(Op::Jump { target: 2 });
        block.insert_phi(Op::Phi {
            dest: ValueId::new(6),
            incoming: vec![],
        });

        assert_eq!(block.phi_count(), 2);
        assert_eq!(block.instructions[1].def(), Some(ValueId::new(6)));
    }
}
