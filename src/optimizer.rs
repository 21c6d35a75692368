//! Constant folding.
//!
//! Grounded in `original_source/src/opt.c`'s `ast_optimize`: walk the tree
//! bottom-up, and whenever every child of a node is already a [`Node::Literal`]
//! evaluate the node once and replace it with its result. `Var` and `Deref`
//! are never folded since both read live state; a `Cast` over a non-constant
//! child is rebuilt but not folded.

use crate::ast::Node;
use crate::eval::evaluate;
use crate::symbol::SymbolValues;
use crate::target::NullTarget;

/// Fold every constant subtree of `node`, returning a new, possibly smaller
/// tree. Folding never fails: if evaluating a constant subtree would error
/// (e.g. division by zero), the subtree is left unfolded so the error
/// surfaces from the real evaluator at scan time instead of from
/// optimization.
pub fn optimize(node: Node) -> Node {
    match node {
        Node::Literal(_) | Node::Var { .. } => node,

        Node::Cast { target, child } => {
            let child = optimize(*child);
            let folded = Node::Cast { target, child: Box::new(child) };
            try_fold(folded)
        }

        Node::Deref { result_ty, child } => {
            let child = optimize(*child);
            Node::Deref { result_ty, child: Box::new(child) }
        }

        Node::Unary { op, result_ty, child } => {
            let child = optimize(*child);
            let folded = Node::Unary { op, result_ty, child: Box::new(child) };
            try_fold(folded)
        }

        Node::Binary { op, result_ty, left, right } => {
            let left = optimize(*left);
            let right = optimize(*right);
            let folded = Node::Binary { op, result_ty, left: Box::new(left), right: Box::new(right) };
            try_fold(folded)
        }
    }
}

/// If every child of `node` is constant, evaluate it against an empty
/// environment and return a `Literal`; otherwise return `node` unchanged.
/// `Var`/`Deref` nodes are never passed in here with constant children
/// reaching this point, since a `Var`/`Deref` itself is never constant.
fn try_fold(node: Node) -> Node {
    let foldable = match &node {
        Node::Cast { child, .. } => child.is_constant(),
        Node::Unary { child, .. } => child.is_constant(),
        Node::Binary { left, right, .. } => left.is_constant() && right.is_constant(),
        _ => false,
    };

    if !foldable {
        return node;
    }

    let symbols = SymbolValues::new();
    let target = NullTarget;
    match evaluate(&node, &symbols, &target) {
        Ok(value) => Node::Literal(value),
        Err(_) => node,
    }
}
