//! Decompilation pipeline.
//!
//! [`Decompiler`] chains the three stages for one subroutine: block graph construction,
//! statement reconstruction and pattern folding. The result is a [`ReducedGraph`], which
//! either collapsed to a single statement list or kept the blocks no rule could fold.

use rayon::prelude::*;

use crate::{
    config::DecompilerConfig,
    lss::Statement,
    osi::{
        builder::{build_graph, SubroutineGraph},
        decoder::{Module, Subroutine},
        fold::fold,
        reconstruct::{reconstruct, LssBlock},
    },
    utils::graph::{FlowGraph, JumpType},
    Result,
};

/// The reconstructed and folded graph of one subroutine.
#[derive(Debug, Clone)]
pub struct ReducedGraph {
    /// Blocks of structured statements; compacted, so ids are dense
    pub graph: FlowGraph<LssBlock>,
    /// Number of fold rewrites applied
    pub folds: usize,
}

impl ReducedGraph {
    /// Statement list of a fully reduced graph.
    ///
    /// Returns `Some` when the graph is `Start -> End` (an empty body) or
    /// `Start -> block -> End` with a block that does not branch, and `None` for a
    /// residual graph that still needs explicit jumps.
    #[must_use]
    pub fn body(&self) -> Option<&[Statement]> {
        let graph = &self.graph;
        let entry = graph.successor(graph.start(), JumpType::Always)?;
        if entry == graph.end() {
            return Some(&[]);
        }

        let block = graph.node(entry)?;
        let reduced = graph.out_degree(entry) == 1
            && graph.successor(entry, JumpType::Always) == Some(graph.end())
            && graph.in_degree(entry) == 1
            && block.condition.is_none()
            && graph.node_count() == 3;
        reduced.then_some(block.statements.as_slice())
    }

    /// Returns `true` if [`ReducedGraph::body`] yields a statement list.
    #[must_use]
    pub fn is_fully_reduced(&self) -> bool {
        self.body().is_some()
    }

    /// Graphviz rendering with the statements of every block.
    #[must_use]
    pub fn to_dot(&self, name: &str) -> String {
        self.graph.to_dot(name, |id, block| {
            let mut label = format!("{id}\n{}", crate::lss::render(&block.statements));
            if let Some(condition) = &block.condition {
                label.push_str(&format!("? {condition}\n"));
            }
            label
        })
    }
}

/// Result of decompiling one subroutine of a module.
#[derive(Debug)]
pub struct DecompiledSubroutine {
    /// Name of the subroutine
    pub name: String,
    /// Decompilation outcome
    pub result: Result<ReducedGraph>,
}

/// Bytecode to LSS decompiler.
///
/// # Examples
///
/// ```rust
/// use sagekit::osi::{decoder::encode_stream, Decompiler, Operation, Subroutine};
/// use sagekit::lss::{render, Variable};
///
/// let code = encode_stream(&[
///     Operation::PushInt(1),
///     Operation::Store(Variable::Local(0)),
///     Operation::Return,
/// ])?;
/// let subroutine = Subroutine::decode("main", &code, 0)?;
///
/// let reduced = Decompiler::default().decompile(&subroutine)?;
/// assert_eq!(render(reduced.body().unwrap()), "local_0 = 1;\n");
/// # Ok::<(), sagekit::Error>(())
/// ```
#[derive(Debug, Clone, Copy, Default)]
pub struct Decompiler {
    config: DecompilerConfig,
}

impl Decompiler {
    /// Creates a decompiler with the given configuration.
    #[must_use]
    pub fn new(config: DecompilerConfig) -> Self {
        Decompiler { config }
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &DecompilerConfig {
        &self.config
    }

    /// Builds the raw block graph of `subroutine`.
    ///
    /// # Errors
    /// See [`build_graph`].
    pub fn build_graph(&self, subroutine: &Subroutine) -> Result<SubroutineGraph> {
        build_graph(subroutine, &self.config)
    }

    /// Decompiles one subroutine.
    ///
    /// # Errors
    /// Returns [`crate::Error::Consistency`] for jump layouts the block builder cannot
    /// represent and [`crate::Error::StackUnderflow`] for unbalanced operand stacks.
    pub fn decompile(&self, subroutine: &Subroutine) -> Result<ReducedGraph> {
        let raw = self.build_graph(subroutine)?;
        let mut graph = reconstruct(&raw)?;

        let folds = if self.config.enable_folding {
            fold(&mut graph, &self.config)?
        } else {
            0
        };

        let (graph, _) = graph.compact();
        let reduced = ReducedGraph { graph, folds };
        if self.config.enable_folding && !reduced.is_fully_reduced() {
            log::warn!(
                "{}: control flow not fully reduced, {} blocks remain",
                subroutine.name,
                reduced.graph.node_count() - 2
            );
        }
        Ok(reduced)
    }

    /// Decompiles every subroutine of `module` in parallel.
    ///
    /// Each subroutine is processed on its own and reports its own result, so one broken
    /// subroutine does not prevent the others from being decompiled. Results keep the
    /// module order.
    #[must_use]
    pub fn decompile_all(&self, module: &Module) -> Vec<DecompiledSubroutine> {
        module
            .subroutines
            .par_iter()
            .map(|subroutine| DecompiledSubroutine {
                name: subroutine.name.clone(),
                result: self.decompile(subroutine),
            })
            .collect()
    }
}
