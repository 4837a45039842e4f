//! Convenience builder for constructing functions.
//!
//! [`FunctionBuilder`] keeps an insertion cursor on the current block and
//! allocates result values as instructions are appended, so call sites
//! read like the IR they produce. [`FunctionBuilder::finish`] verifies the
//! result before handing it out; malformed construction is caught at the
//! boundary instead of deep inside a pass.
//!
//! # Examples
//!
//! ```rust
//! use ssapre::ir::{BinaryOp, FunctionBuilder, Type};
//!
//! let mut b = FunctionBuilder::new("sum", &[Type::I32, Type::I32]);
//! let (x, y) = (b.args()[0], b.args()[1]);
//! let entry = b.create_block();
//! b.switch_to(entry);
//! let t = b.binary(BinaryOp::Add, x, y);
//! b.ret(Some(t));
//! let func = b.finish()?;
//! assert_eq!(func.block_count(), 1);
//! # Ok::<(), ssapre::Error>(())
//! ```

use crate::ir::{
    BinaryOp, CastKind, CmpPredicate, ConstValue, Function, Op, PhiOperand, Type, ValueId,
    ValueKind,
};
use crate::Result;

/// Builder producing verified [`Function`]s.
#[derive(Debug)]
pub struct FunctionBuilder {
    func: Function,
    current: Option<usize>,
}

impl FunctionBuilder {
    /// Creates a builder for a function with the given argument types.
    #[must_use]
    pub fn new(name: impl Into<String>, arg_types: &[Type]) -> Self {
        Self {
            func: Function::new(name, arg_types),
            current: None,
        }
    }

    /// Returns the argument values in declaration order.
    #[must_use]
    pub fn args(&self) -> &[ValueId] {
        self.func.args()
    }

    /// Appends a new block. The first created block is the entry.
    pub fn create_block(&mut self) -> usize {
        self.func.add_block()
    }

    /// Moves the insertion cursor to a block.
    pub fn switch_to(&mut self, block: usize) {
        self.current = Some(block);
    }

    /// Interns an `i32` constant.
    pub fn const_i32(&mut self, value: i32) -> ValueId {
        self.func.constant(ConstValue::Int(i64::from(value)), Type::I32)
    }

    /// Interns a constant of an arbitrary type.
    pub fn constant(&mut self, value: ConstValue, ty: Type) -> ValueId {
        self.func.constant(value, ty)
    }

    /// Creates a named global value.
    pub fn global(&mut self, name: &str, ty: Type) -> ValueId {
        self.func.global(name, ty)
    }

    fn current_block(&self) -> usize {
        self.current.expect("no current block; call switch_to first")
    }

    fn push_def(&mut self, ty: Type, make: impl FnOnce(ValueId) -> Op) -> ValueId {
        let block = self.current_block();
        let index = self.func.block(block).instructions.len();
        let dest = self.func.new_value(ValueKind::Inst { block, index }, ty);
        self.func.block_mut(block).push(make(dest));
        dest
    }

    /// Appends a binary operation; the result type is the left operand's.
    pub fn binary(&mut self, op: BinaryOp, left: ValueId, right: ValueId) -> ValueId {
        let ty = self.func.value(left).ty.clone();
        self.push_def(ty, |dest| Op::Binary {
            op,
            dest,
            left,
            right,
        })
    }

    /// Appends a comparison; the result type is `I1`.
    pub fn cmp(&mut self, pred: CmpPredicate, left: ValueId, right: ValueId) -> ValueId {
        self.push_def(Type::I1, |dest| Op::Cmp {
            pred,
            dest,
            left,
            right,
        })
    }

    /// Appends a cast to `ty`.
    pub fn cast(&mut self, kind: CastKind, operand: ValueId, ty: Type) -> ValueId {
        self.push_def(ty.clone(), |dest| Op::Cast {
            kind,
            dest,
            operand,
            ty,
        })
    }

    /// Appends a select; the result type is the true-arm operand's.
    pub fn select(&mut self, cond: ValueId, on_true: ValueId, on_false: ValueId) -> ValueId {
        let ty = self.func.value(on_true).ty.clone();
        self.push_def(ty, |dest| Op::Select {
            dest,
            cond,
            on_true,
            on_false,
        })
    }

    /// Appends an address computation over `element_ty`.
    pub fn gep(&mut self, base: ValueId, indices: &[ValueId], element_ty: Type) -> ValueId {
        let indices = indices.to_vec();
        self.push_def(Type::Ptr, |dest| Op::Gep {
            dest,
            base,
            indices,
            element_ty,
        })
    }

    /// Appends a φ node at the current position.
    ///
    /// φ nodes must be appended before any non-φ instruction of the block;
    /// [`FunctionBuilder::finish`] verifies this.
    pub fn phi(&mut self, ty: Type, incoming: &[(ValueId, usize)]) -> ValueId {
        let incoming: Vec<PhiOperand> = incoming
            .iter()
            .map(|&(value, pred)| PhiOperand::new(value, pred))
            .collect();
        self.push_def(ty, |dest| Op::Phi { dest, incoming })
    }

    /// Appends an opaque call. Pass a type to receive a result value.
    pub fn call(&mut self, callee: &str, args: &[ValueId], ty: Option<Type>) -> Option<ValueId> {
        let callee = callee.to_string();
        let args = args.to_vec();
        match ty {
            Some(ty) => Some(self.push_def(ty, |dest| Op::Call {
                dest: Some(dest),
                callee,
                args,
            })),
            None => {
                let block = self.current_block();
                self.func.block_mut(block).push(Op::Call {
                    dest: None,
                    callee,
                    args,
                });
                None
            }
        }
    }

    /// Appends a load from `addr`.
    pub fn load(&mut self, addr: ValueId, ty: Type) -> ValueId {
        self.push_def(ty, |dest| Op::Load { dest, addr })
    }

    /// Appends a store of `value` to `addr`.
    pub fn store(&mut self, value: ValueId, addr: ValueId) {
        let block = self.current_block();
        self.func.block_mut(block).push(Op::Store { value, addr });
    }

    /// Terminates the current block with an unconditional jump.
    pub fn jump(&mut self, target: usize) {
        let block = self.current_block();
        self.func.block_mut(block).push(Op::Jump { target });
    }

    /// Terminates the current block with a conditional branch.
    pub fn branch(&mut self, cond: ValueId, on_true: usize, on_false: usize) {
        let block = self.current_block();
        self.func.block_mut(block).push(Op::Branch {
            cond,
            on_true,
            on_false,
        });
    }

    /// Terminates the current block with a return.
    pub fn ret(&mut self, value: Option<ValueId>) {
        let block = self.current_block();
        self.func.block_mut(block).push(Op::Return { value });
    }

    /// Verifies and returns the constructed function.
    ///
    /// # Errors
    ///
    /// Returns the first verification failure; see
    /// [`Function::verify`].
    pub fn finish(self) -> Result<Function> {
        self.func.verify()?;
        Ok(self.func)
    }

    /// Returns the function without verifying it. Intended for tests that
    /// deliberately construct malformed IR.
    #[must_use]
    pub fn finish_unchecked(self) -> Function {
        self.func
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_diamond_with_phi() {
        let mut b = FunctionBuilder::new("max", &[Type::I32, Type::I32]);
        let (x, y) = (b.args()[0], b.args()[1]);
        let entry = b.create_block();
        let left = b.create_block();
        let right = b.create_block();
        let join = b.create_block();

        b.switch_to(entry);
        let cond = b.cmp(CmpPredicate::Slt, x, y);
        b.branch(cond, left, right);

        b.switch_to(left);
        b.jump(join);
        b.switch_to(right);
        b.jump(join);

        b.switch_to(join);
        let merged = b.phi(Type::I32, &[(y, left), (x, right)]);
        b.ret(Some(merged));

        let func = b.finish().unwrap();
        assert_eq!(func.block_count(), 4);
        assert_eq!(func.block(join).phi_count(), 1);
    }

    #[test]
    fn test_builder_rejects_phi_pred_mismatch() {
        let mut b = FunctionBuilder::new("bad", &[Type::I32]);
        let x = b.args()[0];
        let b0 = b.create_block();
        let b1 = b.create_block();
        b.switch_to(b0);
        b.jump(b1);
        b.switch_to(b1);
        // b1 has one predecessor but the phi claims two.
        b.phi(Type::I32, &[(x, b0), (x, b1)]);
        b.ret(None);

        assert!(b.finish().is_err());
    }

    #[test]
    fn test_builder_type_propagation() {
        let mut b = FunctionBuilder::new("types", &[Type::I64]);
        let x = b.args()[0];
        let entry = b.create_block();
        b.switch_to(entry);
        let s = b.binary(BinaryOp::Add, x, x);
        let c = b.cmp(CmpPredicate::Eq, s, x);
        let n = b.cast(CastKind::Trunc, s, Type::I32);
        b.ret(None);
        let func = b.finish().unwrap();

        assert_eq!(func.value(s).ty, Type::I64);
        assert_eq!(func.value(c).ty, Type::I1);
        assert_eq!(func.value(n).ty, Type::I32);
    }
}
