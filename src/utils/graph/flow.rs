//! Arena-backed control flow graph with typed jumps.
//!
//! [`FlowGraph`] stores its nodes in a vector and addresses them through [`NodeId`]s.
//! Every graph owns two sentinel nodes, `Start` and `End`, which never carry payload.
//! Edges are kept twice, as out-jumps on the source and in-jumps on the destination,
//! each map keyed by the node on the other side. Removing a node only marks its slot
//! dead, so ids held by a rewrite in progress stay valid; [`FlowGraph::compact`]
//! renumbers the survivors once rewriting is finished.
//!
//! # Invariants
//!
//! [`FlowGraph::add_jump`] refuses edges that would break the graph shape:
//! - `End` has no out-jumps and `Start` has no in-jumps
//! - at most one jump between any ordered pair of nodes
//! - at most one out-jump of each [`JumpType`] per node
//!
//! [`FlowGraph::validate`] additionally checks that every node's out-jump set is one of
//! `{}`, `{Always}` or `{ConditionalTrue, ConditionalFalse}` and that every live node is
//! reachable from `Start`.

use std::{
    collections::{BTreeMap, BTreeSet},
    fmt::Write as _,
    mem,
};

use crate::{
    utils::{
        escape_dot,
        graph::{JumpType, NodeId},
    },
    Result,
};

const START: NodeId = NodeId(0);
const END: NodeId = NodeId(1);

#[derive(Debug, Clone)]
struct Slot<T> {
    data: T,
    out_jumps: BTreeMap<NodeId, JumpType>,
    in_jumps: BTreeMap<NodeId, JumpType>,
    alive: bool,
}

impl<T> Slot<T> {
    fn new(data: T) -> Self {
        Slot {
            data,
            out_jumps: BTreeMap::new(),
            in_jumps: BTreeMap::new(),
            alive: true,
        }
    }
}

/// A directed flow graph with `Start`/`End` sentinels and typed jumps.
///
/// # Examples
///
/// ```rust
/// use sagekit::utils::graph::{FlowGraph, JumpType};
///
/// let mut graph: FlowGraph<&str> = FlowGraph::new();
/// let body = graph.add_node("body");
/// graph.add_jump(graph.start(), body, JumpType::Always)?;
/// graph.add_jump(body, graph.end(), JumpType::Always)?;
///
/// graph.validate()?;
/// assert_eq!(graph.successor(body, JumpType::Always), Some(graph.end()));
/// # Ok::<(), sagekit::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct FlowGraph<T> {
    slots: Vec<Slot<T>>,
}

impl<T: Default> Default for FlowGraph<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Default> FlowGraph<T> {
    /// Creates a graph holding only the `Start` and `End` sentinels.
    #[must_use]
    pub fn new() -> Self {
        FlowGraph {
            slots: vec![Slot::new(T::default()), Slot::new(T::default())],
        }
    }

    /// Removes `id` and all of its jumps, returning its payload.
    ///
    /// # Errors
    /// Returns [`crate::Error::Consistency`] for the sentinels and for dead or unknown ids.
    pub fn remove_node(&mut self, id: NodeId) -> Result<T> {
        if id == START || id == END {
            return Err(consistency_error!("sentinel {} cannot be removed", id));
        }
        self.check_alive(id)?;

        let outgoing: Vec<NodeId> = self.slots[id.0].out_jumps.keys().copied().collect();
        for to in outgoing {
            self.remove_jump(id, to);
        }
        let incoming: Vec<NodeId> = self.slots[id.0].in_jumps.keys().copied().collect();
        for from in incoming {
            self.remove_jump(from, id);
        }

        let slot = &mut self.slots[id.0];
        slot.alive = false;
        Ok(mem::take(&mut slot.data))
    }

    /// Removes every live node not reachable from `Start`, returning ids and payloads.
    ///
    /// # Errors
    /// Returns [`crate::Error::Consistency`] if a node cannot be removed.
    pub fn prune_unreachable(&mut self) -> Result<Vec<(NodeId, T)>> {
        let reachable = self.reachable();
        let dead: Vec<NodeId> = self
            .node_ids()
            .filter(|id| *id != END && !reachable.contains(id))
            .collect();

        dead.into_iter()
            .map(|id| self.remove_node(id).map(|data| (id, data)))
            .collect()
    }

    /// Rebuilds the graph without dead slots.
    ///
    /// Live nodes keep their relative order; `Start` and `End` keep ids 0 and 1. Returns
    /// the new graph together with the old-to-new id mapping.
    #[must_use]
    pub fn compact(mut self) -> (FlowGraph<T>, BTreeMap<NodeId, NodeId>) {
        let mut mapping = BTreeMap::new();
        for (index, slot) in self.slots.iter().enumerate() {
            if slot.alive {
                mapping.insert(NodeId(index), NodeId(mapping.len()));
            }
        }

        let mut slots = Vec::with_capacity(mapping.len());
        for slot in self.slots.drain(..) {
            if !slot.alive {
                continue;
            }
            let renumber = |jumps: BTreeMap<NodeId, JumpType>| {
                jumps
                    .into_iter()
                    .filter_map(|(id, kind)| mapping.get(&id).map(|new| (*new, kind)))
                    .collect()
            };
            slots.push(Slot {
                data: slot.data,
                out_jumps: renumber(slot.out_jumps),
                in_jumps: renumber(slot.in_jumps),
                alive: true,
            });
        }

        (FlowGraph { slots }, mapping)
    }
}

impl<T> FlowGraph<T> {
    /// The `Start` sentinel.
    #[must_use]
    pub const fn start(&self) -> NodeId {
        START
    }

    /// The `End` sentinel.
    #[must_use]
    pub const fn end(&self) -> NodeId {
        END
    }

    /// Returns `true` for `Start` and `End`.
    #[must_use]
    pub fn is_sentinel(&self, id: NodeId) -> bool {
        id == START || id == END
    }

    /// Appends a node and returns its id.
    pub fn add_node(&mut self, data: T) -> NodeId {
        self.slots.push(Slot::new(data));
        NodeId(self.slots.len() - 1)
    }

    /// Returns `true` if `id` names a live node.
    #[must_use]
    pub fn contains(&self, id: NodeId) -> bool {
        self.slots.get(id.0).is_some_and(|slot| slot.alive)
    }

    /// Payload of a live node.
    #[must_use]
    pub fn node(&self, id: NodeId) -> Option<&T> {
        self.slots
            .get(id.0)
            .filter(|slot| slot.alive)
            .map(|slot| &slot.data)
    }

    /// Mutable payload of a live node.
    pub fn node_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.slots
            .get_mut(id.0)
            .filter(|slot| slot.alive)
            .map(|slot| &mut slot.data)
    }

    /// Ids of all live nodes, sentinels included, in ascending order.
    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, slot)| slot.alive)
            .map(|(index, _)| NodeId(index))
    }

    /// Number of live nodes, sentinels included.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.slots.iter().filter(|slot| slot.alive).count()
    }

    /// Adds a jump `from -> to` of kind `kind`.
    ///
    /// Re-adding an identical jump is a no-op.
    ///
    /// # Errors
    /// Returns [`crate::Error::Consistency`] if either node is not live, if a jump between
    /// the two nodes already exists with a different kind, if `from` already has a jump
    /// of that kind elsewhere, or if the jump would leave `End` or enter `Start`.
    pub fn add_jump(&mut self, from: NodeId, to: NodeId, kind: JumpType) -> Result<()> {
        self.check_alive(from)?;
        self.check_alive(to)?;
        if from == END {
            return Err(consistency_error!("jump {} -> {} leaves End", from, to));
        }
        if to == START {
            return Err(consistency_error!("jump {} -> {} enters Start", from, to));
        }

        match self.slots[from.0].out_jumps.get(&to) {
            Some(existing) if *existing == kind => return Ok(()),
            Some(existing) => {
                return Err(consistency_error!(
                    "jump {} -> {} is already {}, cannot add it as {}",
                    from,
                    to,
                    existing,
                    kind
                ))
            }
            None => {}
        }
        if let Some(other) = self.successor(from, kind) {
            return Err(consistency_error!(
                "{} already has a {} jump to {}, cannot add one to {}",
                from,
                kind,
                other,
                to
            ));
        }

        self.slots[from.0].out_jumps.insert(to, kind);
        self.slots[to.0].in_jumps.insert(from, kind);
        Ok(())
    }

    /// Removes the jump `from -> to`, returning its kind if it existed.
    pub fn remove_jump(&mut self, from: NodeId, to: NodeId) -> Option<JumpType> {
        let kind = self.slots.get_mut(from.0)?.out_jumps.remove(&to)?;
        if let Some(slot) = self.slots.get_mut(to.0) {
            slot.in_jumps.remove(&from);
        }
        Some(kind)
    }

    /// Kind of the jump `from -> to`, if present.
    #[must_use]
    pub fn jump(&self, from: NodeId, to: NodeId) -> Option<JumpType> {
        self.slots.get(from.0)?.out_jumps.get(&to).copied()
    }

    /// Outgoing jumps of `id` as `(destination, kind)`.
    pub fn out_jumps(&self, id: NodeId) -> impl Iterator<Item = (NodeId, JumpType)> + '_ {
        self.slots
            .get(id.0)
            .into_iter()
            .flat_map(|slot| slot.out_jumps.iter().map(|(to, kind)| (*to, *kind)))
    }

    /// Incoming jumps of `id` as `(source, kind)`.
    pub fn in_jumps(&self, id: NodeId) -> impl Iterator<Item = (NodeId, JumpType)> + '_ {
        self.slots
            .get(id.0)
            .into_iter()
            .flat_map(|slot| slot.in_jumps.iter().map(|(from, kind)| (*from, *kind)))
    }

    /// Number of outgoing jumps of `id`.
    #[must_use]
    pub fn out_degree(&self, id: NodeId) -> usize {
        self.slots.get(id.0).map_or(0, |slot| slot.out_jumps.len())
    }

    /// Number of incoming jumps of `id`.
    #[must_use]
    pub fn in_degree(&self, id: NodeId) -> usize {
        self.slots.get(id.0).map_or(0, |slot| slot.in_jumps.len())
    }

    /// The destination of the out-jump of kind `kind`, if any.
    #[must_use]
    pub fn successor(&self, id: NodeId, kind: JumpType) -> Option<NodeId> {
        self.slots
            .get(id.0)?
            .out_jumps
            .iter()
            .find(|(_, k)| **k == kind)
            .map(|(to, _)| *to)
    }

    /// Moves every out-jump of `from` onto `to`, keeping the kinds.
    ///
    /// # Errors
    /// Returns [`crate::Error::Consistency`] if `to` cannot accept one of the jumps.
    pub fn transfer_out_jumps(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        let jumps: Vec<(NodeId, JumpType)> = self.out_jumps(from).collect();
        for (dest, kind) in jumps {
            self.remove_jump(from, dest);
            self.add_jump(to, dest, kind)?;
        }
        Ok(())
    }

    /// Live nodes reachable from `Start`, `Start` included.
    #[must_use]
    pub fn reachable(&self) -> BTreeSet<NodeId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![START];
        while let Some(id) = stack.pop() {
            if !self.contains(id) || !seen.insert(id) {
                continue;
            }
            stack.extend(self.slots[id.0].out_jumps.keys().copied());
        }
        seen
    }

    /// Checks the well-formedness rules listed in the module documentation.
    ///
    /// # Errors
    /// Returns [`crate::Error::Consistency`] naming the first violation found.
    pub fn validate(&self) -> Result<()> {
        if self.out_degree(END) != 0 {
            return Err(consistency_error!("End has outgoing jumps"));
        }
        if self.in_degree(START) != 0 {
            return Err(consistency_error!("Start has incoming jumps"));
        }

        let reachable = self.reachable();
        for id in self.node_ids() {
            let kinds: BTreeSet<JumpType> = self.out_jumps(id).map(|(_, kind)| kind).collect();
            let shape_ok = kinds.is_empty()
                || kinds == BTreeSet::from([JumpType::Always])
                || kinds == BTreeSet::from([JumpType::ConditionalTrue, JumpType::ConditionalFalse]);
            if !shape_ok || kinds.len() != self.out_degree(id) {
                return Err(consistency_error!(
                    "{} has an invalid out-jump set {:?}",
                    id,
                    kinds
                ));
            }
            if id != END && !reachable.contains(&id) {
                return Err(consistency_error!("{} is not reachable from Start", id));
            }
        }
        Ok(())
    }

    /// Renders the graph in Graphviz DOT format.
    ///
    /// `label` produces the text shown inside each non-sentinel node.
    pub fn to_dot<F>(&self, name: &str, label: F) -> String
    where
        F: Fn(NodeId, &T) -> String,
    {
        let mut dot = String::new();
        let _ = writeln!(dot, "digraph \"{}\" {{", escape_dot(name));
        let _ = writeln!(dot, "    node [shape=box, fontname=\"monospace\"];");

        for id in self.node_ids() {
            let text = match id {
                START => "Start".to_string(),
                END => "End".to_string(),
                _ => label(id, &self.slots[id.0].data),
            };
            let shape = if self.is_sentinel(id) { ", shape=ellipse" } else { "" };
            let _ = writeln!(
                dot,
                "    {} [label=\"{}\"{}];",
                id,
                escape_dot(&text).replace("\\n", "\\l"),
                shape
            );
        }

        for from in self.node_ids() {
            for (to, kind) in self.out_jumps(from) {
                let _ = writeln!(dot, "    {} -> {} [{}];", from, to, kind.dot_style());
            }
        }

        dot.push_str("}\n");
        dot
    }

    fn check_alive(&self, id: NodeId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(consistency_error!("{} is not a live node", id))
        }
    }
}
