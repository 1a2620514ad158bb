//! LSS, the source form of OSI bytecode.
//!
//! Only the statement tree is modelled here; it is the output of
//! [`crate::osi::Decompiler`].

pub mod ast;

pub use ast::{
    render, BinaryOp, ElseBranch, Expression, IfStatement, Statement, UnaryOp, Variable,
    WhileStatement,
};
