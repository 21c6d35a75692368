//! Tree-walking evaluator.
//!
//! `evaluate` dispatches on [`Node`] and returns a [`Value`] or an
//! [`EvalError`]. The only place traversal is conditional is short-circuit
//! `&&`/`||`: the right child is not visited once the left child settles the
//! result (spec.md §4.F, §8 property 4).

use crate::ast::{BinaryOp, Node, UnaryOp};
use crate::error::EvalError;
use crate::symbol::SymbolValues;
use crate::target::Target;
use crate::value::{Value, ValueType};

/// Evaluate `node` against `symbols` (the driver's live `Var` bindings) and
/// `target` (consulted only by `Deref`).
pub fn evaluate(node: &Node, symbols: &SymbolValues, target: &dyn Target) -> Result<Value, EvalError> {
    match node {
        Node::Literal(v) => Ok(*v),

        Node::Var { sym, result_ty } => {
            let v = symbols.get(*sym);
            Ok(v.cast_to(*result_ty))
        }

        Node::Cast { target: ty, child } => {
            let v = evaluate(child, symbols, target)?;
            Ok(v.cast_to(*ty))
        }

        Node::Deref { result_ty, child } => {
            let addr_val = evaluate(child, symbols, target)?;
            let addr = addr_val.cast_to(ValueType::U64).u64();
            let mut buf = [0u8; 8];
            let n = result_ty.size_of();
            target
                .read(addr, &mut buf[..n])
                .map_err(|_| EvalError::DerefReadFailed)?;
            Ok(Value::from_bytes(*result_ty, &buf[..n]))
        }

        Node::Unary { op, child, .. } => {
            let v = evaluate(child, symbols, target)?;
            match op {
                UnaryOp::Neg => v.neg(),
                UnaryOp::Not => v.not(),
                UnaryOp::Compl => v.compl(),
            }
        }

        Node::Binary { op, left, right, .. } => eval_binary(*op, left, right, symbols, target),
    }
}

fn eval_binary(
    op: BinaryOp,
    left: &Node,
    right: &Node,
    symbols: &SymbolValues,
    target: &dyn Target,
) -> Result<Value, EvalError> {
    // Short-circuit operators must not evaluate the right child when the
    // left child alone settles the result.
    if op == BinaryOp::AndCond {
        let l = evaluate(left, symbols, target)?;
        if l.is_zero() {
            return Ok(Value::from_s32(0));
        }
        let r = evaluate(right, symbols, target)?;
        return Ok(Value::from_s32(r.is_nonzero() as i32));
    }
    if op == BinaryOp::OrCond {
        let l = evaluate(left, symbols, target)?;
        if l.is_nonzero() {
            return Ok(Value::from_s32(1));
        }
        let r = evaluate(right, symbols, target)?;
        return Ok(Value::from_s32(r.is_nonzero() as i32));
    }

    let l = evaluate(left, symbols, target)?;
    let r = evaluate(right, symbols, target)?;
    match op {
        BinaryOp::Add => l.add(r),
        BinaryOp::Sub => l.sub(r),
        BinaryOp::Mul => l.mul(r),
        BinaryOp::Div => l.div(r),
        BinaryOp::Mod => l.rem(r),
        BinaryOp::And => l.bitand(r),
        BinaryOp::Xor => l.bitxor(r),
        BinaryOp::Or => l.bitor(r),
        BinaryOp::Shl => l.shl(r),
        BinaryOp::Shr => l.shr(r),
        BinaryOp::Eq => l.eq(r),
        BinaryOp::Neq => l.neq(r),
        BinaryOp::Lt => l.lt(r),
        BinaryOp::Gt => l.gt(r),
        BinaryOp::Le => l.le(r),
        BinaryOp::Ge => l.ge(r),
        BinaryOp::AndCond | BinaryOp::OrCond => unreachable!("handled above"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::NullTarget;

    fn empty_symbols() -> SymbolValues {
        SymbolValues::new()
    }

    #[test]
    fn short_circuit_and_skips_right_deref() {
        // 0 && (*(s32*)0 == 0) must not attempt the dereference.
        let zero = Node::Literal(Value::from_s32(0));
        let bad_deref = Node::deref(ValueType::S32, Node::Literal(Value::from_u64(0)));
        let rhs = Node::binary(
            BinaryOp::Eq,
            ValueType::S32,
            bad_deref,
            Node::Literal(Value::from_s32(0)),
        );
        let tree = Node::binary(BinaryOp::AndCond, ValueType::S32, zero, rhs);

        let symbols = empty_symbols();
        let target = NullTarget;
        let result = evaluate(&tree, &symbols, &target).unwrap();
        assert_eq!(result.s32(), 0);
    }

    #[test]
    fn short_circuit_or_skips_right() {
        let one = Node::Literal(Value::from_s32(1));
        let bad_deref = Node::deref(ValueType::S32, Node::Literal(Value::from_u64(0)));
        let tree = Node::binary(BinaryOp::OrCond, ValueType::S32, one, bad_deref);

        let symbols = empty_symbols();
        let target = NullTarget;
        let result = evaluate(&tree, &symbols, &target).unwrap();
        assert_eq!(result.s32(), 1);
    }

    #[test]
    fn relational_results_are_s32_zero_or_one() {
        let tree = Node::binary(
            BinaryOp::Lt,
            ValueType::S32,
            Node::Literal(Value::from_s32(1)),
            Node::Literal(Value::from_s32(2)),
        );
        let symbols = empty_symbols();
        let target = NullTarget;
        let result = evaluate(&tree, &symbols, &target).unwrap();
        assert_eq!(result.ty(), ValueType::S32);
        assert_eq!(result.s32(), 1);
    }
}
