#![warn(rust_2018_idioms)]
#![warn(clippy::print_stdout)]

//! Compile-time type checking of object-oriented expression trees.
//!
//! This crate deals only with compile-time types: it determines the static
//! type of every expression node and validates method calls and object
//! construction against the declared signatures in a
//! [`type_lattice::TypeLattice`]. It does not evaluate expressions.

pub mod checker;
pub mod expr;

pub use self::{
    checker::{check_arguments, TypeError},
    expr::{Expr, NoDeclaredType},
};
