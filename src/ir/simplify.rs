//! Instruction simplification.
//!
//! [`simplify_op`] answers one question for the optimizer: does this
//! operation reduce to an already-existing value? Constant operands are
//! folded (interning the result), and a handful of algebraic identities
//! collapse operations onto one of their operands. The caller decides what
//! to do with the answer; the redundancy elimination pass only retires an
//! occurrence when the simplified value is a constant, argument, or
//! global.
//!
//! Folding is deliberately conservative: division by zero, shifts past the
//! width, and float identities that change NaN or signed-zero behavior are
//! left alone.

use crate::ir::{BinaryOp, CmpPredicate, ConstValue, Function, Op, Type, ValueId};

/// Attempts to simplify an operation to an existing or interned value.
///
/// Returns `None` when no simplification applies. May intern new constant
/// values into the function, which is why it takes `&mut Function`.
#[must_use]
pub fn simplify_op(op: &Op, func: &mut Function) -> Option<ValueId> {
    match op {
        Op::Binary {
            op, left, right, ..
        } => simplify_binary(*op, *left, *right, func),
        Op::Cmp {
            pred, left, right, ..
        } => simplify_cmp(*pred, *left, *right, func),
        Op::Select {
            cond,
            on_true,
            on_false,
            ..
        } => simplify_select(*cond, *on_true, *on_false, func),
        _ => None,
    }
}

fn const_of(func: &Function, value: ValueId) -> Option<ConstValue> {
    func.value(value).kind.as_constant().copied()
}

fn int_of(func: &Function, value: ValueId) -> Option<i64> {
    const_of(func, value).and_then(|c| c.as_int())
}

fn simplify_binary(
    op: BinaryOp,
    left: ValueId,
    right: ValueId,
    func: &mut Function,
) -> Option<ValueId> {
    let ty = func.value(left).ty.clone();

    // Both operands constant: fold.
    if let (Some(a), Some(b)) = (int_of(func, left), int_of(func, right)) {
        if let Some(folded) = fold_int_binary(op, a, b, &ty) {
            return Some(func.constant(ConstValue::Int(folded), ty));
        }
    }

    // Identities on integer types.
    if ty.is_integer() {
        let rc = int_of(func, right);
        let lc = int_of(func, left);
        match op {
            BinaryOp::Add | BinaryOp::Or | BinaryOp::Xor => {
                if rc == Some(0) {
                    return Some(left);
                }
                if lc == Some(0) {
                    return Some(right);
                }
                if op == BinaryOp::Xor && left == right {
                    return Some(func.constant(ConstValue::Int(0), ty));
                }
            }
            BinaryOp::Sub => {
                if rc == Some(0) {
                    return Some(left);
                }
                if left == right {
                    return Some(func.constant(ConstValue::Int(0), ty));
                }
            }
            BinaryOp::Mul => {
                if rc == Some(1) {
                    return Some(left);
                }
                if lc == Some(1) {
                    return Some(right);
                }
                if rc == Some(0) || lc == Some(0) {
                    return Some(func.constant(ConstValue::Int(0), ty));
                }
            }
            BinaryOp::And => {
                if left == right {
                    return Some(left);
                }
                if rc == Some(0) || lc == Some(0) {
                    return Some(func.constant(ConstValue::Int(0), ty));
                }
            }
            BinaryOp::Or if left == right => return Some(left),
            BinaryOp::Shl | BinaryOp::LShr | BinaryOp::AShr => {
                if rc == Some(0) {
                    return Some(left);
                }
            }
            _ => {}
        }
    }

    None
}

fn fold_int_binary(op: BinaryOp, a: i64, b: i64, ty: &Type) -> Option<i64> {
    let bits = ty.int_bits()?;
    let result = match op {
        BinaryOp::Add => a.wrapping_add(b),
        BinaryOp::Sub => a.wrapping_sub(b),
        BinaryOp::Mul => a.wrapping_mul(b),
        BinaryOp::SDiv => {
            if b == 0 {
                return None;
            }
            a.wrapping_div(b)
        }
        BinaryOp::SRem => {
            if b == 0 {
                return None;
            }
            a.wrapping_rem(b)
        }
        BinaryOp::UDiv => {
            if b == 0 {
                return None;
            }
            ((a as u64) / (b as u64)) as i64
        }
        BinaryOp::URem => {
            if b == 0 {
                return None;
            }
            ((a as u64) % (b as u64)) as i64
        }
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::Xor => a ^ b,
        BinaryOp::Shl => {
            if (b as u64) >= u64::from(bits) {
                return None;
            }
            a.wrapping_shl(b as u32)
        }
        BinaryOp::LShr => {
            if (b as u64) >= u64::from(bits) {
                return None;
            }
            ((a as u64).wrapping_shr(b as u32)) as i64
        }
        BinaryOp::AShr => {
            if (b as u64) >= u64::from(bits) {
                return None;
            }
            a.wrapping_shr(b as u32)
        }
        // Float arithmetic is folded only through typed float constants,
        // which fold_int_binary never sees.
        _ => return None,
    };
    Some(truncate_to(result, bits))
}

/// Wraps a folded result back into the type's width, sign-extended.
fn truncate_to(value: i64, bits: u32) -> i64 {
    if bits >= 64 {
        return value;
    }
    let shift = 64 - bits;
    (value << shift) >> shift
}

fn simplify_cmp(
    pred: CmpPredicate,
    left: ValueId,
    right: ValueId,
    func: &mut Function,
) -> Option<ValueId> {
    if let (Some(a), Some(b)) = (int_of(func, left), int_of(func, right)) {
        let result = match pred {
            CmpPredicate::Eq => a == b,
            CmpPredicate::Ne => a != b,
            CmpPredicate::Slt => a < b,
            CmpPredicate::Sle => a <= b,
            CmpPredicate::Sgt => a > b,
            CmpPredicate::Sge => a >= b,
            CmpPredicate::Ult => (a as u64) < (b as u64),
            CmpPredicate::Ule => (a as u64) <= (b as u64),
            CmpPredicate::Ugt => (a as u64) > (b as u64),
            CmpPredicate::Uge => (a as u64) >= (b as u64),
            _ => return None,
        };
        return Some(func.constant(ConstValue::Bool(result), Type::I1));
    }

    // Reflexive integer compares have a known answer; float ones do not
    // because of NaN.
    if left == right && func.value(left).ty.is_integer() {
        let result = match pred {
            CmpPredicate::Eq
            | CmpPredicate::Sle
            | CmpPredicate::Sge
            | CmpPredicate::Ule
            | CmpPredicate::Uge => true,
            CmpPredicate::Ne
            | CmpPredicate::Slt
            | CmpPredicate::Sgt
            | CmpPredicate::Ult
            | CmpPredicate::Ugt => false,
            _ => return None,
        };
        return Some(func.constant(ConstValue::Bool(result), Type::I1));
    }

    None
}

fn simplify_select(
    cond: ValueId,
    on_true: ValueId,
    on_false: ValueId,
    func: &mut Function,
) -> Option<ValueId> {
    if on_true == on_false {
        return Some(on_true);
    }
    match const_of(func, cond) {
        Some(ConstValue::Bool(true)) => Some(on_true),
        Some(ConstValue::Bool(false)) => Some(on_false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::ValueKind;

    fn func_with_consts() -> (Function, ValueId, ValueId, ValueId) {
        let mut func = Function::new("f", &[Type::I32]);
        let x = func.args()[0];
        let two = func.constant(ConstValue::Int(2), Type::I32);
        let three = func.constant(ConstValue::Int(3), Type::I32);
        (func, x, two, three)
    }

    #[test]
    fn test_fold_constant_add() {
        let (mut func, _, two, three) = func_with_consts();
        let op = Op::Binary {
            op: BinaryOp::Add,
            dest: ValueId::new(999),
            left: two,
            right: three,
        };
        let folded = simplify_op(&op, &mut func).unwrap();
        assert_eq!(
            func.value(folded).kind,
            ValueKind::Constant(ConstValue::Int(5))
        );
    }

    #[test]
    fn test_add_zero_returns_operand() {
        let (mut func, x, _, _) = func_with_consts();
        let zero = func.constant(ConstValue::Int(0), Type::I32);
        let op = Op::Binary {
            op: BinaryOp::Add,
            dest: ValueId::new(999),
            left: x,
            right: zero,
        };
        assert_eq!(simplify_op(&op, &mut func), Some(x));
    }

    #[test]
    fn test_sub_self_is_zero() {
        let (mut func, x, _, _) = func_with_consts();
        let op = Op::Binary {
            op: BinaryOp::Sub,
            dest: ValueId::new(999),
            left: x,
            right: x,
        };
        let folded = simplify_op(&op, &mut func).unwrap();
        assert_eq!(
            func.value(folded).kind,
            ValueKind::Constant(ConstValue::Int(0))
        );
    }

    #[test]
    fn test_div_by_zero_not_folded() {
        let (mut func, _, two, _) = func_with_consts();
        let zero = func.constant(ConstValue::Int(0), Type::I32);
        let op = Op::Binary {
            op: BinaryOp::SDiv,
            dest: ValueId::new(999),
            left: two,
            right: zero,
        };
        assert_eq!(simplify_op(&op, &mut func), None);
    }

    #[test]
    fn test_fold_respects_width() {
        let mut func = Function::new("f", &[]);
        let a = func.constant(ConstValue::Int(200), Type::I8);
        let b = func.constant(ConstValue::Int(100), Type::I8);
        let op = Op::Binary {
            op: BinaryOp::Add,
            dest: ValueId::new(999),
            left: a,
            right: b,
        };
        let folded = simplify_op(&op, &mut func).unwrap();
        // 300 wraps to 44 in 8 bits.
        assert_eq!(
            func.value(folded).kind,
            ValueKind::Constant(ConstValue::Int(44))
        );
    }

    #[test]
    fn test_cmp_reflexive_int() {
        let (mut func, x, _, _) = func_with_consts();
        let op = Op::Cmp {
            pred: CmpPredicate::Sle,
            dest: ValueId::new(999),
            left: x,
            right: x,
        };
        let folded = simplify_op(&op, &mut func).unwrap();
        assert_eq!(
            func.value(folded).kind,
            ValueKind::Constant(ConstValue::Bool(true))
        );
    }

    #[test]
    fn test_select_same_arms() {
        let (mut func, x, two, _) = func_with_consts();
        let op = Op::Select {
            dest: ValueId::new(999),
            cond: two,
            on_true: x,
            on_false: x,
        };
        assert_eq!(simplify_op(&op, &mut func), Some(x));
    }

    #[test]
    fn test_no_simplification() {
        let (mut func, x, two, _) = func_with_consts();
        let op = Op::Binary {
            op: BinaryOp::Mul,
            dest: ValueId::new(999),
            left: x,
            right: two,
        };
        assert_eq!(simplify_op(&op, &mut func), None);
    }
}
