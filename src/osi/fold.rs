//! Structured control flow recovery by local graph rewrites.
//!
//! [`fold`] repeatedly scans the reconstructed graph depth-first from `Start` and applies
//! the first matching rule to each node. Every rule removes at least one node, so the
//! process terminates; it stops once a full pass changes nothing.
//!
//! For a branch node `n` with true successor `t` and false successor `f`:
//!
//! - **if**: `t` is entered only from `n` and continues to `f` ⇒ `if (c) { t }`
//! - **inverted if**: `f` is entered only from `n` and continues to `t` ⇒ `if (!c) { f }`
//! - **if/else**: `t` and `f` are entered only from `n` and both continue to the same
//!   node `j` ⇒ `if (c) { t } else { f }`, with a lone `if` in `f` becoming `else if`
//! - **while**: `n` carries no statements and `t` is entered only from `n` and continues
//!   to `n` ⇒ `while (c) { t }`, leaving through `f` (inverted: body on `f`, exit on `t`)
//!
//! Afterwards `n` holds the new statement and jumps to the continuation with
//! [`JumpType::Always`]. A straight-line node whose only successor is entered from
//! nowhere else absorbs that successor (**merge**); merging never touches `Start`
//! or `End`.

use std::collections::BTreeSet;

use crate::{
    config::DecompilerConfig,
    lss::{ElseBranch, IfStatement, Statement, WhileStatement},
    osi::reconstruct::LssBlock,
    utils::graph::{FlowGraph, JumpType, NodeId},
    Result,
};

/// The rewrite applied to a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FoldKind {
    /// `if` without else
    If,
    /// `if` with negated condition, body on the false edge
    InvertedIf,
    /// `if` with else or `else if`
    IfElse,
    /// `while` loop
    While,
    /// Straight-line successor absorbed
    Merge,
}

struct Folder<'a> {
    graph: &'a mut FlowGraph<LssBlock>,
    config: &'a DecompilerConfig,
}

impl Folder<'_> {
    /// Sole `Always` successor of `id`, if that is its only out-jump.
    fn single_always(&self, id: NodeId) -> Option<NodeId> {
        if self.graph.out_degree(id) != 1 {
            return None;
        }
        self.graph.successor(id, JumpType::Always)
    }

    /// `id` is an ordinary node entered only from `from`.
    fn is_private(&self, id: NodeId, from: NodeId) -> bool {
        !self.graph.is_sentinel(id)
            && id != from
            && self.graph.in_degree(id) == 1
            && self.graph.jump(from, id).is_some()
    }

    fn take(&mut self, id: NodeId) -> Result<LssBlock> {
        self.graph.remove_node(id)
    }

    fn block_mut(&mut self, id: NodeId) -> Result<&mut LssBlock> {
        self.graph
            .node_mut(id)
            .ok_or_else(|| consistency_error!("block {} vanished", id))
    }

    /// Replaces the branch of `node` by a plain jump to `next`, appending `statement`.
    fn close_branch(&mut self, node: NodeId, next: NodeId, statement: Statement) -> Result<()> {
        let remaining: Vec<NodeId> = self.graph.out_jumps(node).map(|(to, _)| to).collect();
        for to in remaining {
            self.graph.remove_jump(node, to);
        }
        self.block_mut(node)?.statements.push(statement);
        self.graph.add_jump(node, next, JumpType::Always)
    }

    fn try_fold(&mut self, node: NodeId) -> Result<Option<FoldKind>> {
        if self.graph.is_sentinel(node) {
            return Ok(None);
        }

        let yes = self.graph.successor(node, JumpType::ConditionalTrue);
        let no = self.graph.successor(node, JumpType::ConditionalFalse);
        if let (Some(yes), Some(no)) = (yes, no) {
            return self.try_fold_branch(node, yes, no);
        }

        self.try_merge(node)
    }

    fn try_fold_branch(&mut self, node: NodeId, yes: NodeId, no: NodeId) -> Result<Option<FoldKind>> {
        let yes_next = self.is_private(yes, node).then(|| self.single_always(yes)).flatten();
        let no_next = self.is_private(no, node).then(|| self.single_always(no)).flatten();
        let header_empty = self
            .graph
            .node(node)
            .is_some_and(|block| block.statements.is_empty());

        if yes_next == Some(node) && header_empty {
            let body = self.take(yes)?.statements;
            let condition = self.condition(node)?;
            self.close_branch(
                node,
                no,
                Statement::While(WhileStatement { condition, body }),
            )?;
            return Ok(Some(FoldKind::While));
        }

        if self.config.fold_inverted_if && no_next == Some(node) && header_empty {
            let body = self.take(no)?.statements;
            let condition = self.condition(node)?.negate();
            self.close_branch(
                node,
                yes,
                Statement::While(WhileStatement { condition, body }),
            )?;
            return Ok(Some(FoldKind::While));
        }

        if yes_next == Some(no) {
            let body = self.take(yes)?.statements;
            let condition = self.condition(node)?;
            self.close_branch(
                node,
                no,
                Statement::If(IfStatement {
                    condition,
                    body,
                    else_branch: None,
                }),
            )?;
            return Ok(Some(FoldKind::If));
        }

        if self.config.fold_inverted_if && no_next == Some(yes) {
            let body = self.take(no)?.statements;
            let condition = self.condition(node)?.negate();
            self.close_branch(
                node,
                yes,
                Statement::If(IfStatement {
                    condition,
                    body,
                    else_branch: None,
                }),
            )?;
            return Ok(Some(FoldKind::InvertedIf));
        }

        if let (Some(join), Some(other)) = (yes_next, no_next) {
            if join == other && join != node {
                let body = self.take(yes)?.statements;
                let else_body = self.take(no)?.statements;
                let condition = self.condition(node)?;
                self.close_branch(
                    node,
                    join,
                    Statement::If(IfStatement {
                        condition,
                        body,
                        else_branch: Some(ElseBranch::from_statements(else_body)),
                    }),
                )?;
                return Ok(Some(FoldKind::IfElse));
            }
        }

        Ok(None)
    }

    fn try_merge(&mut self, node: NodeId) -> Result<Option<FoldKind>> {
        let Some(next) = self.single_always(node) else {
            return Ok(None);
        };
        if !self.is_private(next, node) {
            return Ok(None);
        }

        self.graph.remove_jump(node, next);
        self.graph.transfer_out_jumps(next, node)?;
        let absorbed = self.take(next)?;

        let block = self.block_mut(node)?;
        block.statements.extend(absorbed.statements);
        block.condition = absorbed.condition;
        Ok(Some(FoldKind::Merge))
    }

    fn condition(&mut self, node: NodeId) -> Result<crate::lss::Expression> {
        self.block_mut(node)?
            .condition
            .take()
            .ok_or_else(|| consistency_error!("branch {} has no condition", node))
    }

    /// Live nodes in depth-first preorder from `Start`.
    fn preorder(&self) -> Vec<NodeId> {
        let mut order = Vec::new();
        let mut seen = BTreeSet::new();
        let mut stack = vec![self.graph.start()];
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            order.push(id);
            let mut next: Vec<NodeId> = self.graph.out_jumps(id).map(|(to, _)| to).collect();
            next.reverse();
            stack.extend(next);
        }
        order
    }
}

/// Folds `graph` until no rule applies and returns the number of rewrites.
///
/// # Errors
/// Returns [`crate::Error::Consistency`] if a rewrite would break the graph shape.
pub fn fold(graph: &mut FlowGraph<LssBlock>, config: &DecompilerConfig) -> Result<usize> {
    let mut folder = Folder { graph, config };
    let mut applied = 0;

    loop {
        let mut changed = false;
        for node in folder.preorder() {
            if !folder.graph.contains(node) {
                continue;
            }
            if let Some(kind) = folder.try_fold(node)? {
                log::debug!("fold {:?} at {}", kind, node);
                applied += 1;
                changed = true;
            }
        }
        if !changed {
            return Ok(applied);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lss::{render, Expression, Variable};

    fn local(index: u16) -> Expression {
        Expression::Variable(Variable::Local(index))
    }

    fn assign(slot: u16, value: i32) -> Statement {
        Statement::Assign {
            target: Variable::Local(slot),
            value: Expression::Int(value),
        }
    }

    fn block(statements: Vec<Statement>) -> LssBlock {
        LssBlock {
            statements,
            condition: None,
        }
    }

    fn branch(statements: Vec<Statement>, condition: Expression) -> LssBlock {
        LssBlock {
            statements,
            condition: Some(condition),
        }
    }

    fn fold_default(graph: &mut FlowGraph<LssBlock>) -> usize {
        fold(graph, &DecompilerConfig::default()).unwrap()
    }

    fn body(graph: &FlowGraph<LssBlock>) -> String {
        let entry = graph.successor(graph.start(), JumpType::Always).unwrap();
        assert_eq!(graph.successor(entry, JumpType::Always), Some(graph.end()));
        assert_eq!(graph.node_count(), 3);
        render(&graph.node(entry).unwrap().statements)
    }

    #[test]
    fn if_only() {
        let mut graph = FlowGraph::new();
        let head = graph.add_node(branch(vec![assign(0, 1)], local(0)));
        let then = graph.add_node(block(vec![assign(1, 2)]));
        let join = graph.add_node(block(vec![Statement::Return(None)]));
        graph.add_jump(graph.start(), head, JumpType::Always).unwrap();
        graph.add_jump(head, then, JumpType::ConditionalTrue).unwrap();
        graph.add_jump(head, join, JumpType::ConditionalFalse).unwrap();
        graph.add_jump(then, join, JumpType::Always).unwrap();
        graph.add_jump(join, graph.end(), JumpType::Always).unwrap();

        assert_eq!(fold_default(&mut graph), 2);
        assert_eq!(
            body(&graph),
            "local_0 = 1;\nif (local_0) {\n    local_1 = 2;\n}\nreturn;\n"
        );
        graph.validate().unwrap();
    }

    #[test]
    fn converging_branches_without_statements() {
        let mut graph = FlowGraph::new();
        let head = graph.add_node(branch(vec![], local(0)));
        let then = graph.add_node(block(vec![]));
        let join = graph.add_node(block(vec![]));
        graph.add_jump(graph.start(), head, JumpType::Always).unwrap();
        graph.add_jump(head, then, JumpType::ConditionalTrue).unwrap();
        graph.add_jump(head, join, JumpType::ConditionalFalse).unwrap();
        graph.add_jump(then, join, JumpType::Always).unwrap();
        graph.add_jump(join, graph.end(), JumpType::Always).unwrap();

        fold_default(&mut graph);
        assert_eq!(body(&graph), "if (local_0) {\n}\n");
    }

    #[test]
    fn inverted_if() {
        let mut graph = FlowGraph::new();
        let head = graph.add_node(branch(vec![], local(0)));
        let other = graph.add_node(block(vec![assign(1, 1)]));
        let join = graph.add_node(block(vec![]));
        graph.add_jump(graph.start(), head, JumpType::Always).unwrap();
        graph.add_jump(head, join, JumpType::ConditionalTrue).unwrap();
        graph.add_jump(head, other, JumpType::ConditionalFalse).unwrap();
        graph.add_jump(other, join, JumpType::Always).unwrap();
        graph.add_jump(join, graph.end(), JumpType::Always).unwrap();

        let mut conservative = graph.clone();
        fold(&mut conservative, &DecompilerConfig::conservative()).unwrap();
        assert_eq!(conservative.node_count(), 5);

        fold_default(&mut graph);
        assert_eq!(body(&graph), "if (!local_0) {\n    local_1 = 1;\n}\n");
    }

    #[test]
    fn if_else_and_else_if() {
        // if (l0) { l1 = 1 } else { if (l2) { l1 = 2 } }
        let mut graph = FlowGraph::new();
        let head = graph.add_node(branch(vec![], local(0)));
        let then = graph.add_node(block(vec![assign(1, 1)]));
        let other = graph.add_node(branch(vec![], local(2)));
        let nested = graph.add_node(block(vec![assign(1, 2)]));
        let inner_join = graph.add_node(block(vec![]));
        let join = graph.add_node(block(vec![Statement::Return(None)]));
        let (start, end) = (graph.start(), graph.end());
        graph.add_jump(start, head, JumpType::Always).unwrap();
        graph.add_jump(head, then, JumpType::ConditionalTrue).unwrap();
        graph.add_jump(head, other, JumpType::ConditionalFalse).unwrap();
        graph.add_jump(then, join, JumpType::Always).unwrap();
        graph.add_jump(other, nested, JumpType::ConditionalTrue).unwrap();
        graph.add_jump(other, inner_join, JumpType::ConditionalFalse).unwrap();
        graph.add_jump(nested, inner_join, JumpType::Always).unwrap();
        graph.add_jump(inner_join, join, JumpType::Always).unwrap();
        graph.add_jump(join, end, JumpType::Always).unwrap();

        fold_default(&mut graph);
        assert_eq!(
            body(&graph),
            "if (local_0) {\n    local_1 = 1;\n} else if (local_2) {\n    local_1 = 2;\n}\nreturn;\n"
        );
    }

    #[test]
    fn while_loop_keeps_exit_statements() {
        let mut graph = FlowGraph::new();
        let init = graph.add_node(block(vec![assign(0, 0)]));
        let header = graph.add_node(branch(vec![], local(0)));
        let looped = graph.add_node(block(vec![assign(0, 1)]));
        let exit = graph.add_node(block(vec![Statement::Return(Some(local(0)))]));
        let (start, end) = (graph.start(), graph.end());
        graph.add_jump(start, init, JumpType::Always).unwrap();
        graph.add_jump(init, header, JumpType::Always).unwrap();
        graph.add_jump(header, looped, JumpType::ConditionalTrue).unwrap();
        graph.add_jump(header, exit, JumpType::ConditionalFalse).unwrap();
        graph.add_jump(looped, header, JumpType::Always).unwrap();
        graph.add_jump(exit, end, JumpType::Always).unwrap();

        fold_default(&mut graph);
        assert_eq!(
            body(&graph),
            "local_0 = 0;\nwhile (local_0) {\n    local_0 = 1;\n}\nreturn local_0;\n"
        );
    }

    #[test]
    fn loop_header_with_statements_stays_residual() {
        let mut graph = FlowGraph::new();
        let header = graph.add_node(branch(vec![assign(3, 3)], local(0)));
        let looped = graph.add_node(block(vec![assign(0, 1)]));
        let (start, end) = (graph.start(), graph.end());
        graph.add_jump(start, header, JumpType::Always).unwrap();
        graph.add_jump(header, looped, JumpType::ConditionalTrue).unwrap();
        graph.add_jump(header, end, JumpType::ConditionalFalse).unwrap();
        graph.add_jump(looped, header, JumpType::Always).unwrap();

        assert_eq!(fold_default(&mut graph), 0);
        assert_eq!(graph.node_count(), 4);
        graph.validate().unwrap();
    }

    #[test]
    fn merge_never_absorbs_shared_successor() {
        let mut graph = FlowGraph::new();
        let head = graph.add_node(branch(vec![], local(0)));
        let a = graph.add_node(block(vec![assign(0, 1)]));
        let b = graph.add_node(block(vec![assign(0, 2)]));
        let shared = graph.add_node(block(vec![assign(0, 3)]));
        let (start, end) = (graph.start(), graph.end());
        graph.add_jump(start, head, JumpType::Always).unwrap();
        graph.add_jump(head, a, JumpType::ConditionalTrue).unwrap();
        graph.add_jump(head, b, JumpType::ConditionalFalse).unwrap();
        graph.add_jump(a, shared, JumpType::Always).unwrap();
        graph.add_jump(b, shared, JumpType::Always).unwrap();
        graph.add_jump(shared, end, JumpType::Always).unwrap();

        let mut folder = Folder {
            graph: &mut graph,
            config: &DecompilerConfig::default(),
        };
        assert_eq!(folder.try_merge(a).unwrap(), None);
        assert_eq!(folder.try_fold(head).unwrap(), Some(FoldKind::IfElse));
        assert_eq!(folder.try_merge(head).unwrap(), Some(FoldKind::Merge));
        assert_eq!(folder.try_merge(head).unwrap(), None);
    }
}
