//! Parser/optimizer/evaluator behavior exercised through the public surface,
//! independent of any target or scan.

use ramscope::ast::Node;
use ramscope::error::ParseError;
use ramscope::eval::evaluate;
use ramscope::optimizer::optimize;
use ramscope::parser::Parser;
use ramscope::symbol::{SymbolTable, SymbolValues};
use ramscope::target::NullTarget;
use ramscope::value::ValueType;

fn eval_str(src: &str, symtab: &SymbolTable, symbols: &SymbolValues) -> ramscope::value::Value {
    let ast = Parser::new(src, symtab).unwrap().parse().unwrap();
    let folded = optimize(ast);
    evaluate(&folded, symbols, &NullTarget).unwrap()
}

#[test]
fn bitwise_binds_tighter_than_conditional_and_looser_than_relational() {
    let symtab = SymbolTable::new();
    let symbols = SymbolValues::new();
    let v = eval_str("0x10 | 0x20 & 0x30", &symtab, &symbols);
    assert_eq!(v.s32(), 0x10 | (0x20 & 0x30));
}

#[test]
fn a_bound_variable_participates_in_arithmetic() {
    let mut symtab = SymbolTable::new();
    let sym = symtab.add("value", ValueType::S32).unwrap();
    let mut symbols = SymbolValues::new();
    symbols.push(ValueType::S32);
    symbols.set(sym, ramscope::value::Value::from_s32(41));

    let v = eval_str("value + 1", &symtab, &symbols);
    assert_eq!(v.s32(), 42);
}

#[test]
fn mixed_int_float_arithmetic_promotes_to_double() {
    let symtab = SymbolTable::new();
    let symbols = SymbolValues::new();
    let v = eval_str("1 + 2.5", &symtab, &symbols);
    assert_eq!(v.ty(), ValueType::F64);
    assert_eq!(v.f64(), 3.5);
}

#[test]
fn integer_division_by_zero_is_a_parse_time_survivor_but_an_eval_error() {
    let symtab = SymbolTable::new();
    let symbols = SymbolValues::new();
    let ast = Parser::new("1 / 0", &symtab).unwrap().parse().unwrap();
    let folded = optimize(ast);
    // Division by zero can't be folded away, so the tree still carries a
    // Binary node rather than a pre-computed Literal.
    assert!(matches!(folded, Node::Binary { .. }));
    assert!(evaluate(&folded, &symbols, &NullTarget).is_err());
}

#[test]
fn float_division_by_zero_yields_infinity_instead_of_an_error() {
    let symtab = SymbolTable::new();
    let symbols = SymbolValues::new();
    let v = eval_str("1.0 / 0.0", &symtab, &symbols);
    assert!(v.f64().is_infinite());
}

#[test]
fn bitwise_and_on_a_float_literal_is_rejected_at_parse_time() {
    let symtab = SymbolTable::new();
    let err = Parser::new("1.5 & 2", &symtab).unwrap().parse().unwrap_err();
    assert!(matches!(err, ParseError::Accumulated(_)));
}

#[test]
fn referencing_an_unbound_name_is_a_parse_error() {
    let symtab = SymbolTable::new();
    let err = Parser::new("nonexistent == 0", &symtab).unwrap().parse().unwrap_err();
    assert!(matches!(err, ParseError::Accumulated(_)));
}

#[test]
fn relational_and_conditional_results_are_always_s32() {
    let symtab = SymbolTable::new();
    let symbols = SymbolValues::new();
    let v = eval_str("(1 < 2) && (3 > 2)", &symtab, &symbols);
    assert_eq!(v.ty(), ValueType::S32);
    assert_eq!(v.s32(), 1);
}
