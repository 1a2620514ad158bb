//! Structured LSS statements produced by the decompiler.
//!
//! The tree is deliberately small: expressions over literals, variables, operators and
//! calls, and the statements needed to express reconstructed control flow (`if`,
//! `if`/`else`, `else if` chains and `while`). The [`std::fmt::Display`] implementations
//! render a compact LSS-like listing, which is what the flow graph DOT dumps and the tests
//! use; a full source printer lives outside this crate.

use std::fmt;

/// A unary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOp {
    /// Arithmetic negation, `-x`
    Neg,
    /// Logical negation, `!x`
    Not,
}

/// A binary operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOp {
    /// `+`
    Add,
    /// `-`
    Sub,
    /// `*`
    Mul,
    /// `/`
    Div,
    /// `%`
    Mod,
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
    /// `&&`
    And,
    /// `||`
    Or,
}

impl BinaryOp {
    /// Source form of the operator.
    #[must_use]
    pub const fn symbol(self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Mod => "%",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    /// The comparison with the opposite outcome, used to simplify `!(a < b)`.
    #[must_use]
    pub const fn inverse_comparison(self) -> Option<BinaryOp> {
        match self {
            BinaryOp::Eq => Some(BinaryOp::Ne),
            BinaryOp::Ne => Some(BinaryOp::Eq),
            BinaryOp::Lt => Some(BinaryOp::Ge),
            BinaryOp::Le => Some(BinaryOp::Gt),
            BinaryOp::Gt => Some(BinaryOp::Le),
            BinaryOp::Ge => Some(BinaryOp::Lt),
            _ => None,
        }
    }
}

/// A storage location.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variable {
    /// Subroutine local slot
    Local(u16),
    /// Module global slot
    Global(u16),
}

/// An LSS expression.
#[derive(Debug, Clone, PartialEq)]
pub enum Expression {
    /// Integer literal
    Int(i32),
    /// Float literal
    Float(f32),
    /// String literal
    Str(String),
    /// Variable read
    Variable(Variable),
    /// Unary operation
    Unary {
        /// Operator
        op: UnaryOp,
        /// Operand
        operand: Box<Expression>,
    },
    /// Binary operation
    Binary {
        /// Operator
        op: BinaryOp,
        /// Left operand, pushed first
        lhs: Box<Expression>,
        /// Right operand
        rhs: Box<Expression>,
    },
    /// Call of subroutine `target` of the same module.
    Call {
        /// Subroutine index
        target: u16,
        /// Arguments in source order
        args: Vec<Expression>,
    },
}

impl Expression {
    /// Builds the logical negation of `self`.
    ///
    /// Comparisons are flipped and double negations cancel, so an inverted `if` reads
    /// `if (a >= b)` rather than `if (!(a < b))`.
    #[must_use]
    pub fn negate(self) -> Expression {
        match self {
            Expression::Unary {
                op: UnaryOp::Not,
                operand,
            } => *operand,
            Expression::Binary { op, lhs, rhs } => match op.inverse_comparison() {
                Some(inverse) => Expression::Binary {
                    op: inverse,
                    lhs,
                    rhs,
                },
                None => Expression::Unary {
                    op: UnaryOp::Not,
                    operand: Box::new(Expression::Binary { op, lhs, rhs }),
                },
            },
            other => Expression::Unary {
                op: UnaryOp::Not,
                operand: Box::new(other),
            },
        }
    }
}

/// An `if` statement with an optional else part.
#[derive(Debug, Clone, PartialEq)]
pub struct IfStatement {
    /// Condition under which `body` runs
    pub condition: Expression,
    /// Statements of the then part
    pub body: Vec<Statement>,
    /// Optional else part
    pub else_branch: Option<ElseBranch>,
}

/// The else part of an [`IfStatement`].
#[derive(Debug, Clone, PartialEq)]
pub enum ElseBranch {
    /// `else { ... }`
    Block(Vec<Statement>),
    /// `else if (...) { ... }`, a false branch that consisted of a single `if`
    If(Box<IfStatement>),
}

impl ElseBranch {
    /// Wraps a folded false branch, collapsing a lone `if` into an `else if`.
    #[must_use]
    pub fn from_statements(mut statements: Vec<Statement>) -> ElseBranch {
        if statements.len() == 1 {
            if let Some(Statement::If(_)) = statements.first() {
                if let Some(Statement::If(nested)) = statements.pop() {
                    return ElseBranch::If(Box::new(nested));
                }
            }
        }
        ElseBranch::Block(statements)
    }
}

/// A `while` loop.
#[derive(Debug, Clone, PartialEq)]
pub struct WhileStatement {
    /// Loop condition, checked before every iteration
    pub condition: Expression,
    /// Loop body
    pub body: Vec<Statement>,
}

/// An LSS statement.
#[derive(Debug, Clone, PartialEq)]
pub enum Statement {
    /// An expression evaluated for its side effects, typically a call.
    Expression(Expression),
    /// `target = value;`
    Assign {
        /// Variable written
        target: Variable,
        /// Value stored
        value: Expression,
    },
    /// `return;` or `return value;`
    Return(Option<Expression>),
    /// `if`, `if`/`else` or an `else if` chain
    If(IfStatement),
    /// `while` loop
    While(WhileStatement),
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variable::Local(index) => write!(f, "local_{index}"),
            Variable::Global(index) => write!(f, "global_{index}"),
        }
    }
}

impl fmt::Display for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Expression::Int(value) => write!(f, "{value}"),
            Expression::Float(value) => write!(f, "{value:?}"),
            Expression::Str(value) => write!(f, "\"{}\"", value.escape_default()),
            Expression::Variable(variable) => write!(f, "{variable}"),
            Expression::Unary { op, operand } => {
                let symbol = match op {
                    UnaryOp::Neg => "-",
                    UnaryOp::Not => "!",
                };
                write!(f, "{symbol}{operand}")
            }
            Expression::Binary { op, lhs, rhs } => {
                write!(f, "({lhs} {} {rhs})", op.symbol())
            }
            Expression::Call { target, args } => {
                write!(f, "sub_{target}(")?;
                for (index, arg) in args.iter().enumerate() {
                    if index > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str(")")
            }
        }
    }
}

fn write_block(f: &mut fmt::Formatter<'_>, statements: &[Statement], depth: usize) -> fmt::Result {
    for statement in statements {
        write_statement(f, statement, depth)?;
    }
    Ok(())
}

fn write_if(f: &mut fmt::Formatter<'_>, statement: &IfStatement, depth: usize) -> fmt::Result {
    let indent = "    ".repeat(depth);
    writeln!(f, "if ({}) {{", strip_parens(&statement.condition))?;
    write_block(f, &statement.body, depth + 1)?;
    match &statement.else_branch {
        None => writeln!(f, "{indent}}}"),
        Some(ElseBranch::Block(body)) => {
            writeln!(f, "{indent}}} else {{")?;
            write_block(f, body, depth + 1)?;
            writeln!(f, "{indent}}}")
        }
        Some(ElseBranch::If(nested)) => {
            write!(f, "{indent}}} else ")?;
            write_if(f, nested, depth)
        }
    }
}

fn write_statement(f: &mut fmt::Formatter<'_>, statement: &Statement, depth: usize) -> fmt::Result {
    let indent = "    ".repeat(depth);
    match statement {
        Statement::Expression(expression) => writeln!(f, "{indent}{expression};"),
        Statement::Assign { target, value } => writeln!(f, "{indent}{target} = {value};"),
        Statement::Return(None) => writeln!(f, "{indent}return;"),
        Statement::Return(Some(value)) => writeln!(f, "{indent}return {value};"),
        Statement::If(statement) => {
            f.write_str(&indent)?;
            write_if(f, statement, depth)
        }
        Statement::While(statement) => {
            writeln!(f, "{indent}while ({}) {{", strip_parens(&statement.condition))?;
            write_block(f, &statement.body, depth + 1)?;
            writeln!(f, "{indent}}}")
        }
    }
}

fn strip_parens(condition: &Expression) -> String {
    let text = condition.to_string();
    match condition {
        Expression::Binary { .. } => text[1..text.len() - 1].to_string(),
        _ => text,
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_statement(f, self, 0)
    }
}

/// Renders a statement list, one statement per line, nested blocks indented.
#[must_use]
pub fn render(statements: &[Statement]) -> String {
    struct Block<'a>(&'a [Statement]);

    impl fmt::Display for Block<'_> {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write_block(f, self.0, 0)
        }
    }

    Block(statements).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local(index: u16) -> Expression {
        Expression::Variable(Variable::Local(index))
    }

    fn less(lhs: Expression, rhs: Expression) -> Expression {
        Expression::Binary {
            op: BinaryOp::Lt,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    #[test]
    fn negate_comparison() {
        let negated = less(local(0), Expression::Int(3)).negate();
        assert_eq!(negated.to_string(), "(local_0 >= 3)");
    }

    #[test]
    fn negate_twice() {
        let value = local(1);
        assert_eq!(value.clone().negate().negate(), value);

        let sum = Expression::Binary {
            op: BinaryOp::Add,
            lhs: Box::new(local(0)),
            rhs: Box::new(Expression::Int(1)),
        };
        assert_eq!(sum.clone().negate().to_string(), "!(local_0 + 1)");
        assert_eq!(sum.clone().negate().negate(), sum);
    }

    #[test]
    fn else_if_collapse() {
        let nested = IfStatement {
            condition: local(1),
            body: vec![Statement::Return(None)],
            else_branch: None,
        };
        let branch = ElseBranch::from_statements(vec![Statement::If(nested.clone())]);
        assert_eq!(branch, ElseBranch::If(Box::new(nested)));

        let branch = ElseBranch::from_statements(vec![Statement::Return(None)]);
        assert!(matches!(branch, ElseBranch::Block(body) if body.len() == 1));
    }

    #[test]
    fn render_nested() {
        let statements = vec![
            Statement::Assign {
                target: Variable::Local(0),
                value: Expression::Int(0),
            },
            Statement::While(WhileStatement {
                condition: less(local(0), Expression::Int(10)),
                body: vec![Statement::If(IfStatement {
                    condition: local(1),
                    body: vec![Statement::Expression(Expression::Call {
                        target: 4,
                        args: vec![Expression::Str("hit".into()), local(0)],
                    })],
                    else_branch: Some(ElseBranch::If(Box::new(IfStatement {
                        condition: local(2),
                        body: vec![Statement::Return(Some(Expression::Float(1.5)))],
                        else_branch: None,
                    }))),
                })],
            }),
            Statement::Return(None),
        ];

        let expected = "\
local_0 = 0;
while (local_0 < 10) {
    if (local_1) {
        sub_4(\"hit\", local_0);
    } else if (local_2) {
        return 1.5;
    }
}
return;
";
        assert_eq!(render(&statements), expected);
    }
}
