//! Statement reconstruction.
//!
//! Walks a [`SubroutineGraph`] depth-first from its entry block and rebuilds every block
//! as a list of LSS statements, evaluating the raw instructions against a symbolic operand
//! stack. Each successor is reconstructed with its own copy of the stack, so sibling
//! paths never observe each other's pushes and pops. A two-way block pops one more value
//! at its end, which becomes the block condition.
//!
//! The result is a parallel [`FlowGraph`] of [`LssBlock`]s with the same jumps. Nodes are
//! tracked as unvisited, in progress or done. A jump into a node that is still in progress
//! (a loop back-edge) cannot be wired yet because its destination has no id in the new
//! graph; it is parked as a pending jump and connected once that node is done.

use crate::{
    lss::{Expression, Statement},
    osi::{
        builder::{OsiBlock, SubroutineGraph},
        instruction::Operation,
    },
    utils::graph::{FlowGraph, JumpType, NodeId},
    Error, Result,
};

/// A block of reconstructed statements.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LssBlock {
    /// Statements in execution order
    pub statements: Vec<Statement>,
    /// Branch condition for two-way blocks; the true edge is taken when it holds
    pub condition: Option<Expression>,
}

/// Symbolic operand stack of the subroutine being reconstructed.
#[derive(Debug, Clone, Default)]
pub struct StackContext {
    stack: Vec<Expression>,
}

impl StackContext {
    /// Creates an empty stack.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of values on the stack.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    fn push(&mut self, expression: Expression) {
        self.stack.push(expression);
    }

    fn pop(&mut self, offset: u64) -> Result<Expression> {
        self.stack.pop().ok_or(Error::StackUnderflow { offset })
    }

    /// Rebuilds the statements of `block`, leaving produced values on the stack.
    ///
    /// # Errors
    /// Returns [`crate::Error::StackUnderflow`] if an instruction pops more values than
    /// the stack holds.
    pub fn decompile_block(&mut self, block: &OsiBlock) -> Result<Vec<Statement>> {
        let mut statements = Vec::new();

        for instruction in &block.instructions {
            let offset = instruction.offset;
            match &instruction.operation {
                Operation::Nop | Operation::Jump(_) => {}
                Operation::PushInt(value) => self.push(Expression::Int(*value)),
                Operation::PushFloat(value) => self.push(Expression::Float(*value)),
                Operation::PushString(value) => self.push(Expression::Str(value.clone())),
                Operation::Load(variable) => self.push(Expression::Variable(*variable)),
                Operation::Store(variable) => {
                    let value = self.pop(offset)?;
                    statements.push(Statement::Assign {
                        target: *variable,
                        value,
                    });
                }
                Operation::Pop => {
                    let value = self.pop(offset)?;
                    statements.push(Statement::Expression(value));
                }
                Operation::Binary(op) => {
                    let rhs = self.pop(offset)?;
                    let lhs = self.pop(offset)?;
                    self.push(Expression::Binary {
                        op: *op,
                        lhs: Box::new(lhs),
                        rhs: Box::new(rhs),
                    });
                }
                Operation::Unary(op) => {
                    let operand = self.pop(offset)?;
                    self.push(Expression::Unary {
                        op: *op,
                        operand: Box::new(operand),
                    });
                }
                Operation::Call { target, argc } => {
                    let mut args = Vec::with_capacity(usize::from(*argc));
                    for _ in 0..*argc {
                        args.push(self.pop(offset)?);
                    }
                    args.reverse();
                    self.push(Expression::Call {
                        target: *target,
                        args,
                    });
                }
                // A conditional branch kept inside a block only discards its condition.
                Operation::JumpIfFalse(_) => {
                    self.pop(offset)?;
                }
                Operation::Return => statements.push(Statement::Return(None)),
                Operation::ReturnValue => {
                    let value = self.pop(offset)?;
                    statements.push(Statement::Return(Some(value)));
                }
            }
            log::trace!("0x{:X}: stack depth {}", offset, self.stack.len());
        }

        Ok(statements)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    Unvisited,
    InProgress,
    Done(NodeId),
}

struct Reconstructor<'a> {
    raw: &'a FlowGraph<OsiBlock>,
    reduced: FlowGraph<LssBlock>,
    state: Vec<Visit>,
    /// Jumps into nodes still in progress: (new source, raw destination, kind)
    pending: Vec<(NodeId, NodeId, JumpType)>,
}

impl Reconstructor<'_> {
    fn visit(&mut self, raw_id: NodeId, mut context: StackContext) -> Result<NodeId> {
        self.state[raw_id.index()] = Visit::InProgress;

        let raw = self.raw;
        let block = raw
            .node(raw_id)
            .ok_or_else(|| consistency_error!("block {} vanished", raw_id))?;
        let statements = context.decompile_block(block)?;

        let two_way = raw.successor(raw_id, JumpType::ConditionalTrue).is_some()
            && raw.successor(raw_id, JumpType::ConditionalFalse).is_some();
        let condition = if two_way {
            Some(context.pop(block.branch_offset.unwrap_or(block.end))?)
        } else {
            None
        };

        let mut resolved = Vec::new();
        let mut deferred = Vec::new();
        let successors: Vec<(NodeId, JumpType)> = raw.out_jumps(raw_id).collect();
        for (destination, kind) in successors {
            match self.state[destination.index()] {
                Visit::Done(new) => resolved.push((new, kind)),
                Visit::InProgress => deferred.push((destination, kind)),
                Visit::Unvisited => {
                    let new = self.visit(destination, context.clone())?;
                    resolved.push((new, kind));
                }
            }
        }

        let new_id = self.reduced.add_node(LssBlock {
            statements,
            condition,
        });
        for (destination, kind) in resolved {
            self.reduced.add_jump(new_id, destination, kind)?;
        }
        for (destination, kind) in deferred {
            self.pending.push((new_id, destination, kind));
        }

        self.state[raw_id.index()] = Visit::Done(new_id);

        let mut index = 0;
        while index < self.pending.len() {
            if self.pending[index].1 == raw_id {
                let (source, _, kind) = self.pending.swap_remove(index);
                self.reduced.add_jump(source, new_id, kind)?;
            } else {
                index += 1;
            }
        }

        Ok(new_id)
    }
}

/// Rebuilds every block reachable from the entry of `graph` as LSS statements.
///
/// # Errors
/// Returns [`crate::Error::StackUnderflow`] for blocks that pop values nobody pushed and
/// [`crate::Error::Consistency`] if the jumps cannot be mirrored.
pub fn reconstruct(graph: &SubroutineGraph) -> Result<FlowGraph<LssBlock>> {
    let raw = &graph.graph;
    let slots = raw.node_ids().map(NodeId::index).max().unwrap_or(0) + 1;

    let mut reconstructor = Reconstructor {
        raw,
        reduced: FlowGraph::new(),
        state: vec![Visit::Unvisited; slots],
        pending: Vec::new(),
    };
    let end = reconstructor.reduced.end();
    reconstructor.state[raw.end().index()] = Visit::Done(end);

    match graph.entry() {
        Some(entry) => {
            let new_entry = reconstructor.visit(entry, StackContext::new())?;
            let start = reconstructor.reduced.start();
            reconstructor
                .reduced
                .add_jump(start, new_entry, JumpType::Always)?;
        }
        None => {
            let (start, end) = (reconstructor.reduced.start(), reconstructor.reduced.end());
            reconstructor.reduced.add_jump(start, end, JumpType::Always)?;
        }
    }

    if let Some((source, destination, _)) = reconstructor.pending.first() {
        return Err(consistency_error!(
            "jump from {} to unfinished block {}",
            source,
            destination
        ));
    }

    Ok(reconstructor.reduced)
}
