//! Basic block graph construction.
//!
//! [`build_graph`] turns the linear instruction stream of a [`Subroutine`] into a
//! [`SubroutineGraph`] in a single pass plus a fix-up phase:
//!
//! 1. Instructions are appended to the current block. Branches close the block. A
//!    conditional branch links the fall-through block as [`JumpType::ConditionalTrue`] and
//!    records its target as a delayed [`JumpType::ConditionalFalse`] jump; an unconditional
//!    branch records a delayed [`JumpType::Always`] jump and starts a fresh, unlinked block.
//!    When the stream reaches the offset of an already recorded forward target, the current
//!    block is closed there and linked to its successor with an `Always` jump.
//! 2. Once every block exists, delayed jumps are resolved. A target that starts a block is
//!    linked directly. A target in the middle of a block splits it: the tail becomes a new
//!    block that inherits the out-jumps, and the head falls through to it.
//!
//! Branch delta 0 never creates a delayed jump. An unconditional `jmp 0` is dropped; a
//! conditional one gets an empty synthetic true block that falls through to the false
//! block, so the two edges leaving the branch stay distinct.
//!
//! Only the textually last `ret` ends the subroutine, and only if no recorded jump target
//! lies beyond it. Any other `ret` stays inside its block as a statement.

use std::collections::BTreeMap;

use crate::{
    config::DecompilerConfig,
    osi::{
        decoder::Subroutine,
        instruction::{FlowType, Instruction, Operation},
    },
    utils::graph::{FlowGraph, JumpType, NodeId},
    Result,
};

/// A basic block of raw instructions.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OsiBlock {
    /// Offset of the first byte covered by the block
    pub start: u64,
    /// Offset one past the last byte covered by the block, closing branch included
    pub end: u64,
    /// The instructions of the block; closing branches and the final `ret` are not kept
    pub instructions: Vec<Instruction>,
    /// Offset of the conditional branch that closes the block, if any
    pub branch_offset: Option<u64>,
}

impl OsiBlock {
    fn at(offset: u64) -> Self {
        OsiBlock {
            start: offset,
            end: offset,
            ..OsiBlock::default()
        }
    }

    fn push(&mut self, instruction: Instruction) {
        self.end = instruction.next_offset();
        self.instructions.push(instruction);
    }

    /// Returns `true` if the block holds no instructions.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }
}

/// The raw flow graph of one subroutine.
#[derive(Debug, Clone)]
pub struct SubroutineGraph {
    /// Blocks connected by typed jumps
    pub graph: FlowGraph<OsiBlock>,
    /// Absolute offset of the first instruction
    pub base_offset: u64,
    /// Offset one past the last instruction
    pub end_offset: u64,
}

impl SubroutineGraph {
    /// The block control enters first.
    #[must_use]
    pub fn entry(&self) -> Option<NodeId> {
        self.graph.successor(self.graph.start(), JumpType::Always)
    }

    /// Graphviz rendering with one instruction per line.
    #[must_use]
    pub fn to_dot(&self, name: &str) -> String {
        self.graph.to_dot(name, |id, block| {
            let mut label = format!("{} [{:04X}..{:04X})\n", id, block.start, block.end);
            for instruction in &block.instructions {
                label.push_str(&instruction.to_string());
                label.push('\n');
            }
            label
        })
    }
}

#[derive(Debug, Clone, Copy)]
struct DelayedJump {
    source: NodeId,
    target: u64,
    kind: JumpType,
}

struct Builder {
    graph: FlowGraph<OsiBlock>,
    /// Blocks by start offset; synthetic blocks are not registered
    starts: BTreeMap<u64, NodeId>,
    delayed: Vec<DelayedJump>,
    current: NodeId,
}

impl Builder {
    fn new(base_offset: u64) -> Result<Self> {
        let mut graph = FlowGraph::new();
        let entry = graph.add_node(OsiBlock::at(base_offset));
        graph.add_jump(graph.start(), entry, JumpType::Always)?;

        Ok(Builder {
            graph,
            starts: BTreeMap::from([(base_offset, entry)]),
            delayed: Vec::new(),
            current: entry,
        })
    }

    fn block(&self, id: NodeId) -> Result<&OsiBlock> {
        self.graph
            .node(id)
            .ok_or_else(|| consistency_error!("block {} vanished", id))
    }

    fn block_mut(&mut self, id: NodeId) -> Result<&mut OsiBlock> {
        self.graph
            .node_mut(id)
            .ok_or_else(|| consistency_error!("block {} vanished", id))
    }

    fn new_block(&mut self, offset: u64) -> NodeId {
        let id = self.graph.add_node(OsiBlock::at(offset));
        self.starts.insert(offset, id);
        id
    }

    fn is_delayed_target(&self, offset: u64) -> bool {
        self.delayed.iter().any(|jump| jump.target == offset)
    }

    fn step(&mut self, instruction: Instruction, is_last: bool) -> Result<()> {
        let offset = instruction.offset;
        if self.block(self.current)?.start != offset && self.is_delayed_target(offset) {
            let next = self.new_block(offset);
            self.graph.add_jump(self.current, next, JumpType::Always)?;
            self.current = next;
        }

        match instruction.flow_type() {
            FlowType::Sequential => self.block_mut(self.current)?.push(instruction),
            FlowType::Return => {
                let exits = is_last && !self.delayed.iter().any(|jump| jump.target > offset);
                if !exits {
                    self.block_mut(self.current)?.push(instruction);
                    return Ok(());
                }

                let next = instruction.next_offset();
                if matches!(instruction.operation, Operation::ReturnValue) {
                    self.block_mut(self.current)?.push(instruction);
                } else {
                    self.block_mut(self.current)?.end = next;
                }
                let end = self.graph.end();
                self.graph.add_jump(self.current, end, JumpType::Always)?;
                // Nothing follows the final return, the new block only anchors end offset targets.
                self.current = self.graph.add_node(OsiBlock::at(next));
            }
            FlowType::Branch => {
                let (delta, target) = branch(&instruction)?;
                let next = instruction.next_offset();
                self.block_mut(self.current)?.end = next;
                if delta == 0 {
                    return Ok(());
                }

                self.delayed.push(DelayedJump {
                    source: self.current,
                    target,
                    kind: JumpType::Always,
                });
                self.current = self.new_block(next);
            }
            FlowType::ConditionalBranch => {
                let (delta, target) = branch(&instruction)?;
                let next = instruction.next_offset();
                let block = self.block_mut(self.current)?;
                block.end = next;
                block.branch_offset = Some(offset);

                let fallthrough = self.new_block(next);
                if delta == 0 {
                    let synthetic = self.graph.add_node(OsiBlock::at(next));
                    self.graph
                        .add_jump(self.current, synthetic, JumpType::ConditionalTrue)?;
                    self.graph
                        .add_jump(self.current, fallthrough, JumpType::ConditionalFalse)?;
                    self.graph
                        .add_jump(synthetic, fallthrough, JumpType::Always)?;
                } else {
                    self.graph
                        .add_jump(self.current, fallthrough, JumpType::ConditionalTrue)?;
                    self.delayed.push(DelayedJump {
                        source: self.current,
                        target,
                        kind: JumpType::ConditionalFalse,
                    });
                }
                self.current = fallthrough;
            }
        }
        Ok(())
    }

    /// Handles the block left open after the last instruction.
    ///
    /// Jumps to `end_offset` land in a trailing empty block that falls off into `End`.
    fn finish_tail(&mut self, end_offset: u64) -> Result<()> {
        let (start, empty) = {
            let block = self.block(self.current)?;
            (block.start, block.is_empty())
        };
        if start != end_offset && self.is_delayed_target(end_offset) {
            let next = self.new_block(end_offset);
            self.graph.add_jump(self.current, next, JumpType::Always)?;
            self.current = next;
            return self.finish_tail(end_offset);
        }

        let tail = self.current;
        let referenced = self.graph.in_degree(tail) > 0 || self.is_delayed_target(start);
        if empty && !referenced {
            self.graph.remove_node(tail)?;
            self.starts.retain(|_, id| *id != tail);
        } else if self.graph.out_degree(tail) == 0 {
            self.starts.entry(start).or_insert(tail);
            let end = self.graph.end();
            self.graph.add_jump(tail, end, JumpType::Always)?;
        }
        Ok(())
    }

    fn resolve(&mut self) -> Result<()> {
        let mut index = 0;
        while index < self.delayed.len() {
            let jump = self.delayed[index];
            let destination = match self.starts.get(&jump.target) {
                Some(id) => *id,
                None => self.split_at(jump.target)?,
            };

            // A split may have moved the source's closing branch into the tail.
            let source = self.delayed[index].source;
            self.graph.add_jump(source, destination, jump.kind)?;
            index += 1;
        }
        Ok(())
    }

    fn split_at(&mut self, target: u64) -> Result<NodeId> {
        let mut found = None;
        for id in self.graph.node_ids() {
            if let Some(block) = self.graph.node(id) {
                if let Some(position) = block
                    .instructions
                    .iter()
                    .position(|instruction| instruction.offset == target)
                {
                    found = Some((id, position));
                    break;
                }
            }
        }
        let Some((head, position)) = found else {
            return Err(consistency_error!("split point 0x{:X} not found", target));
        };

        let head_block = self.block_mut(head)?;
        let tail_instructions = head_block.instructions.split_off(position);
        let tail_block = OsiBlock {
            start: target,
            end: head_block.end,
            instructions: tail_instructions,
            branch_offset: head_block.branch_offset.take(),
        };
        head_block.end = target;

        let tail = self.graph.add_node(tail_block);
        self.starts.insert(target, tail);
        self.graph.transfer_out_jumps(head, tail)?;
        self.graph.add_jump(head, tail, JumpType::Always)?;
        for jump in &mut self.delayed {
            if jump.source == head {
                jump.source = tail;
            }
        }
        if self.current == head {
            self.current = tail;
        }

        log::debug!("split block {} at 0x{:X} into {}", head, target, tail);
        Ok(tail)
    }
}

/// Displacement and absolute target of a branch instruction.
fn branch(instruction: &Instruction) -> Result<(i16, u64)> {
    let Some(delta) = instruction.branch_delta() else {
        return Err(consistency_error!(
            "branch at 0x{:X} without target",
            instruction.offset
        ));
    };
    let Some(target) = instruction.branch_target() else {
        return Err(consistency_error!(
            "branch at 0x{:X} targets before 0",
            instruction.offset
        ));
    };
    Ok((delta, target))
}

/// Builds the basic block graph of `subroutine`.
///
/// # Errors
/// Returns [`crate::Error::Consistency`] if a jump target lies before offset 0 or outside
/// every block, or if two jumps between the same blocks disagree on their kind.
pub fn build_graph(subroutine: &Subroutine, config: &DecompilerConfig) -> Result<SubroutineGraph> {
    let mut builder = Builder::new(subroutine.base_offset)?;

    let count = subroutine.instructions.len();
    for (index, instruction) in subroutine.instructions.iter().enumerate() {
        builder.step(instruction.clone(), index + 1 == count)?;
    }
    builder.finish_tail(subroutine.end_offset())?;
    builder.resolve()?;

    let mut graph = builder.graph;
    if config.prune_unreachable {
        for (_, block) in graph.prune_unreachable()? {
            if !block.is_empty() {
                log::warn!(
                    "{}: dropping unreachable code at 0x{:X}..0x{:X}",
                    subroutine.name,
                    block.start,
                    block.end
                );
            }
        }
        graph.validate()?;
    }

    log::debug!(
        "{}: {} instructions in {} blocks",
        subroutine.name,
        count,
        graph.node_count() - 2
    );

    Ok(SubroutineGraph {
        graph,
        base_offset: subroutine.base_offset,
        end_offset: subroutine.end_offset(),
    })
}
