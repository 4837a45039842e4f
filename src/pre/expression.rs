//! Expression construction and canonicalization.
//!
//! Every non-terminator instruction is classified once, up front: φ nodes
//! become PHI expressions, pure scalar computations become Basic
//! expressions, everything else (calls, memory, anything unmodeled) is
//! Unknown and inert. A Basic expression that the simplifier collapses to
//! a constant, argument, or global is Ignored - a separate folding pass
//! will retire it; this one has nothing to eliminate.
//!
//! Prototype identity is an [`ExprKey`]: packed opcode, result type, and
//! canonically ordered operand list (plus the block for PHI expressions,
//! which never merge across blocks). Commutative operands are ordered by
//! rank; comparisons swap the predicate along with the operands so the
//! packed opcode `(raw << 8) | predicate` stays semantics-preserving.

use crate::ir::{simplify::simplify_op, Function, Op, Type, ValueId, ValueKind};
use crate::pre::numbering::Numbering;

/// Packed opcode space. Comparisons occupy `(OPC_CMP << 8) | predicate`;
/// everything else stays below 256.
pub(crate) const OPC_PHI: u32 = 1;
pub(crate) const OPC_SELECT: u32 = 2;
pub(crate) const OPC_GEP: u32 = 3;
pub(crate) const OPC_EXTRACT: u32 = 4;
pub(crate) const OPC_INSERT: u32 = 5;
pub(crate) const OPC_CMP: u32 = 8;
pub(crate) const OPC_BINARY_BASE: u32 = 0x10;
pub(crate) const OPC_CAST_BASE: u32 = 0x30;

/// Canonical, version-less identity of an expression. Used as the map key
/// that groups syntactic occurrences into prototypes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) struct ExprKey {
    /// Packed opcode.
    pub opcode: u32,
    /// Result type, or the element type for address computations.
    pub ty: Type,
    /// Operands in canonical order, compared by identity.
    pub operands: Vec<ValueId>,
    /// Owning block for PHI expressions, `None` otherwise.
    pub block: Option<usize>,
}

/// Per-instruction classification, recorded in lock-step with each
/// block's instruction list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ExprClass {
    /// Simplifies to a constant/argument/global; inert.
    Ignored,
    /// Unsupported instruction or terminator; inert.
    Unknown,
    /// A live occurrence in the arena.
    Occ(super::factor::OccId),
}

/// Global operand ranking for canonical ordering: undef < constants <
/// arguments (by position) < instructions (by DFS number). Globals rank
/// last.
pub(crate) fn rank(func: &Function, numbering: &Numbering, value: ValueId) -> u64 {
    let data = func.value(value);
    match &data.kind {
        ValueKind::Constant(c) if c.is_undef() => 0,
        ValueKind::Constant(_) => 1,
        ValueKind::Argument(i) => 2 + u64::from(*i),
        ValueKind::Inst { block, index } => {
            3 + func.args().len() as u64 + u64::from(numbering.dfs(*block, *index))
        }
        ValueKind::Global(_) => u64::MAX,
    }
}

/// Whether two commutative operands should be swapped into canonical
/// order. Rank gives a strict weak ordering for everything but constants;
/// the value index breaks the remaining ties.
pub(crate) fn should_swap(func: &Function, numbering: &Numbering, a: ValueId, b: ValueId) -> bool {
    (rank(func, numbering, a), a.index()) > (rank(func, numbering, b), b.index())
}

/// Builds the canonical key for a pure or φ operation, or classifies it
/// away.
///
/// Returns `Ok((key, result_ty))` for live expressions; `Err(class)` with
/// [`ExprClass::Ignored`] or [`ExprClass::Unknown`] for inert ones.
pub(crate) fn build_key(
    op: &Op,
    block: usize,
    func: &mut Function,
    numbering: &Numbering,
) -> Result<(ExprKey, Type), ExprClass> {
    match op {
        Op::Phi { dest, incoming } => {
            let ty = func.value(*dest).ty.clone();
            Ok((
                ExprKey {
                    opcode: OPC_PHI,
                    ty: ty.clone(),
                    operands: incoming.iter().map(|o| o.value).collect(),
                    block: Some(block),
                },
                ty,
            ))
        }
        Op::Binary {
            op: bin,
            dest,
            left,
            right,
        } => {
            let ty = func.value(*dest).ty.clone();
            let mut operands = vec![*left, *right];
            if bin.is_commutative() && should_swap(func, numbering, operands[0], operands[1]) {
                operands.swap(0, 1);
            }
            finish_basic(
                op,
                OPC_BINARY_BASE + *bin as u32,
                ty,
                operands,
                func,
            )
        }
        Op::Cmp {
            pred,
            left,
            right,
            ..
        } => {
            let mut operands = vec![*left, *right];
            let mut pred = *pred;
            if should_swap(func, numbering, operands[0], operands[1]) {
                operands.swap(0, 1);
                pred = pred.swapped();
            }
            finish_basic(op, (OPC_CMP << 8) | pred.code(), Type::I1, operands, func)
        }
        Op::Cast {
            kind,
            dest,
            operand,
            ..
        } => {
            let ty = func.value(*dest).ty.clone();
            finish_basic(op, OPC_CAST_BASE + kind.code(), ty, vec![*operand], func)
        }
        Op::Select {
            dest,
            cond,
            on_true,
            on_false,
        } => {
            let ty = func.value(*dest).ty.clone();
            finish_basic(
                op,
                OPC_SELECT,
                ty,
                vec![*cond, *on_true, *on_false],
                func,
            )
        }
        Op::Gep {
            base,
            indices,
            element_ty,
            ..
        } => {
            let mut operands = vec![*base];
            operands.extend_from_slice(indices);
            finish_basic(op, OPC_GEP, element_ty.clone(), operands, func)
        }
        Op::ExtractElement {
            dest,
            vector,
            index,
        } => {
            let ty = func.value(*dest).ty.clone();
            finish_basic(op, OPC_EXTRACT, ty, vec![*vector, *index], func)
        }
        Op::InsertElement {
            dest,
            vector,
            element,
            index,
        } => {
            let ty = func.value(*dest).ty.clone();
            finish_basic(
                op,
                OPC_INSERT,
                ty,
                vec![*vector, *element, *index],
                func,
            )
        }
        _ => Err(ExprClass::Unknown),
    }
}

/// Consults the simplifier; expressions that collapse onto an inert value
/// are Ignored, everything else keeps its canonical key.
fn finish_basic(
    op: &Op,
    opcode: u32,
    ty: Type,
    operands: Vec<ValueId>,
    func: &mut Function,
) -> Result<(ExprKey, Type), ExprClass> {
    if let Some(simplified) = simplify_op(op, func) {
        if func.value(simplified).kind.is_inert() {
            return Err(ExprClass::Ignored);
        }
        // A simpler-but-still-instruction result is not worth rewriting
        // here; keep the canonical form.
    }
    let result_ty = match op {
        Op::Gep { dest, .. } => func.value(*dest).ty.clone(),
        _ => ty.clone(),
    };
    Ok((
        ExprKey {
            opcode,
            ty,
            operands,
            block: None,
        },
        result_ty,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{Cfg, DominatorTree};
    use crate::ir::{BinaryOp, CmpPredicate, ConstValue, FunctionBuilder};

    fn setup(build: impl FnOnce(&mut FunctionBuilder)) -> (Function, Numbering) {
        let mut b = FunctionBuilder::new("t", &[Type::I32, Type::I32]);
        let entry = b.create_block();
        b.switch_to(entry);
        build(&mut b);
        b.ret(None);
        let func = b.finish().unwrap();
        let cfg = Cfg::build(&func).unwrap();
        let mut dom = DominatorTree::build(&cfg);
        let numbering = Numbering::compute(&func, &cfg, &mut dom);
        (func, numbering)
    }

    fn key_of(func: &mut Function, numbering: &Numbering, block: usize, index: usize) -> ExprKey {
        let op = func.block(block).instructions[index].op.clone();
        build_key(&op, block, func, numbering).unwrap().0
    }

    #[test]
    fn test_commutative_operands_share_key() {
        let (mut func, numbering) = setup(|b| {
            let (x, y) = (b.args()[0], b.args()[1]);
            b.binary(BinaryOp::Add, x, y);
            b.binary(BinaryOp::Add, y, x);
        });
        let a = key_of(&mut func, &numbering, 0, 0);
        let b = key_of(&mut func, &numbering, 0, 1);
        assert_eq!(a, b);
    }

    #[test]
    fn test_non_commutative_operands_distinct() {
        let (mut func, numbering) = setup(|b| {
            let (x, y) = (b.args()[0], b.args()[1]);
            b.binary(BinaryOp::Sub, x, y);
            b.binary(BinaryOp::Sub, y, x);
        });
        let a = key_of(&mut func, &numbering, 0, 0);
        let b = key_of(&mut func, &numbering, 0, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_swapped_compare_shares_key() {
        let (mut func, numbering) = setup(|b| {
            let (x, y) = (b.args()[0], b.args()[1]);
            b.cmp(CmpPredicate::Slt, x, y);
            b.cmp(CmpPredicate::Sgt, y, x);
        });
        let a = key_of(&mut func, &numbering, 0, 0);
        let b = key_of(&mut func, &numbering, 0, 1);
        assert_eq!(a, b);
        assert_eq!(a.opcode >> 8, OPC_CMP);
    }

    #[test]
    fn test_constant_folding_is_ignored() {
        let (mut func, numbering) = setup(|b| {
            let two = b.const_i32(2);
            let three = b.const_i32(3);
            b.binary(BinaryOp::Add, two, three);
        });
        let op = func.block(0).instructions[0].op.clone();
        assert_eq!(
            build_key(&op, 0, &mut func, &numbering),
            Err(ExprClass::Ignored)
        );
    }

    #[test]
    fn test_rank_ordering() {
        let (mut func, numbering) = setup(|b| {
            let (x, y) = (b.args()[0], b.args()[1]);
            b.binary(BinaryOp::Mul, x, y);
        });
        let undef = func.constant(ConstValue::Undef, Type::I32);
        let one = func.constant(ConstValue::Int(1), Type::I32);
        let x = func.args()[0];
        let inst = func.block(0).instructions[0].def().unwrap();

        assert!(rank(&func, &numbering, undef) < rank(&func, &numbering, one));
        assert!(rank(&func, &numbering, one) < rank(&func, &numbering, x));
        assert!(rank(&func, &numbering, x) < rank(&func, &numbering, inst));
    }

    #[test]
    fn test_calls_are_unknown() {
        let (mut func, numbering) = setup(|b| {
            let x = b.args()[0];
            b.call("opaque", &[x], Some(Type::I32));
        });
        let op = func.block(0).instructions[0].op.clone();
        assert_eq!(
            build_key(&op, 0, &mut func, &numbering),
            Err(ExprClass::Unknown)
        );
    }
}
