//! Workflow graph: named steps wired by plain or routed edges
//!
//! The topology is data. `GraphBuilder::build` checks it once, before any
//! turn runs, so a traversal can never reach a step with nowhere to go.

use super::routers::Router;
use super::state::ConversationState;
use super::steps::StepId;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use thiserror::Error;

/// Where a step hands off when it finishes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Next(StepId),
    Branch {
        router: Router,
        if_true: StepId,
        if_false: StepId,
    },
    End,
}

impl Transition {
    fn targets(self) -> Vec<StepId> {
        match self {
            Transition::Next(to) => vec![to],
            Transition::Branch {
                if_true, if_false, ..
            } => vec![if_true, if_false],
            Transition::End => Vec::new(),
        }
    }
}

/// One printable edge; `to = None` marks the end of the turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub from: StepId,
    pub to: Option<StepId>,
    pub router: Option<Router>,
    pub when: Option<bool>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GraphError {
    #[error("graph has no entry step")]
    MissingEntry,

    #[error("entry step '{0}' is not part of the graph")]
    UnknownEntry(StepId),

    #[error("edge from '{0}', which is not part of the graph")]
    UnknownSource(StepId),

    #[error("edge from '{from}' targets '{to}', which is not part of the graph")]
    UnknownTarget { from: StepId, to: StepId },

    #[error("step '{0}' has no outgoing edge")]
    MissingEdge(StepId),

    #[error("step '{0}' has more than one outgoing edge")]
    DuplicateEdge(StepId),

    #[error("cycle through step '{0}'")]
    Cycle(StepId),

    #[error("step '{0}' cannot be reached from the entry")]
    Unreachable(StepId),
}

#[derive(Debug, Default)]
pub struct GraphBuilder {
    entry: Option<StepId>,
    steps: BTreeSet<StepId>,
    transitions: Vec<(StepId, Transition)>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_step(mut self, step: StepId) -> Self {
        self.steps.insert(step);
        self
    }

    pub fn add_steps(self, steps: impl IntoIterator<Item = StepId>) -> Self {
        steps.into_iter().fold(self, Self::add_step)
    }

    pub fn entry(mut self, step: StepId) -> Self {
        self.entry = Some(step);
        self
    }

    pub fn add_edge(mut self, from: StepId, to: StepId) -> Self {
        self.transitions.push((from, Transition::Next(to)));
        self
    }

    pub fn add_branch(mut self, from: StepId, router: Router, if_true: StepId, if_false: StepId) -> Self {
        self.transitions.push((
            from,
            Transition::Branch {
                router,
                if_true,
                if_false,
            },
        ));
        self
    }

    pub fn add_terminal(mut self, from: StepId) -> Self {
        self.transitions.push((from, Transition::End));
        self
    }

    pub fn build(self) -> Result<WorkflowGraph, GraphError> {
        let entry = self.entry.ok_or(GraphError::MissingEntry)?;
        if !self.steps.contains(&entry) {
            return Err(GraphError::UnknownEntry(entry));
        }

        let mut transitions = BTreeMap::new();
        for (from, transition) in self.transitions {
            if !self.steps.contains(&from) {
                return Err(GraphError::UnknownSource(from));
            }
            if let Some(to) = transition
                .targets()
                .into_iter()
                .find(|to| !self.steps.contains(to))
            {
                return Err(GraphError::UnknownTarget { from, to });
            }
            if transitions.insert(from, transition).is_some() {
                return Err(GraphError::DuplicateEdge(from));
            }
        }

        if let Some(step) = self.steps.iter().find(|s| !transitions.contains_key(s)) {
            return Err(GraphError::MissingEdge(*step));
        }

        let graph = WorkflowGraph { entry, transitions };
        graph.check_acyclic()?;

        let reachable = graph.reachable();
        if let Some(step) = self.steps.iter().find(|s| !reachable.contains(s)) {
            return Err(GraphError::Unreachable(*step));
        }

        tracing::debug!(steps = graph.transitions.len(), entry = %entry, "Workflow graph validated");
        Ok(graph)
    }
}

/// A validated, acyclic graph
#[derive(Debug, Clone)]
pub struct WorkflowGraph {
    entry: StepId,
    transitions: BTreeMap<StepId, Transition>,
}

#[derive(Clone, Copy, PartialEq)]
enum Mark {
    Visiting,
    Done,
}

impl WorkflowGraph {
    pub fn entry(&self) -> StepId {
        self.entry
    }

    /// Step that follows `from` for this state, or `None` at the end of the turn
    pub fn next(&self, from: StepId, state: &ConversationState) -> Option<StepId> {
        match self.transitions.get(&from)? {
            Transition::Next(to) => Some(*to),
            Transition::Branch {
                router,
                if_true,
                if_false,
            } => {
                let taken = router.evaluate(state);
                tracing::debug!(step = %from, router = %router, taken, "Routed");
                Some(if taken { *if_true } else { *if_false })
            }
            Transition::End => None,
        }
    }

    #[cfg(test)]
    pub fn steps(&self) -> impl Iterator<Item = StepId> + '_ {
        self.transitions.keys().copied()
    }

    /// Flattened edge list in step order
    pub fn edges(&self) -> Vec<Edge> {
        self.transitions
            .iter()
            .flat_map(|(from, transition)| match *transition {
                Transition::Next(to) => vec![Edge {
                    from: *from,
                    to: Some(to),
                    router: None,
                    when: None,
                }],
                Transition::Branch {
                    router,
                    if_true,
                    if_false,
                } => vec![
                    Edge {
                        from: *from,
                        to: Some(if_true),
                        router: Some(router),
                        when: Some(true),
                    },
                    Edge {
                        from: *from,
                        to: Some(if_false),
                        router: Some(router),
                        when: Some(false),
                    },
                ],
                Transition::End => vec![Edge {
                    from: *from,
                    to: None,
                    router: None,
                    when: None,
                }],
            })
            .collect()
    }

    fn reachable(&self) -> BTreeSet<StepId> {
        let mut seen = BTreeSet::new();
        let mut stack = vec![self.entry];
        while let Some(step) = stack.pop() {
            if seen.insert(step) {
                if let Some(transition) = self.transitions.get(&step) {
                    stack.extend(transition.targets());
                }
            }
        }
        seen
    }

    fn check_acyclic(&self) -> Result<(), GraphError> {
        let mut marks = HashMap::new();
        for step in self.transitions.keys() {
            self.visit(*step, &mut marks)?;
        }
        Ok(())
    }

    fn visit(&self, step: StepId, marks: &mut HashMap<StepId, Mark>) -> Result<(), GraphError> {
        match marks.get(&step) {
            Some(Mark::Done) => return Ok(()),
            Some(Mark::Visiting) => return Err(GraphError::Cycle(step)),
            None => {}
        }

        marks.insert(step, Mark::Visiting);
        if let Some(transition) = self.transitions.get(&step) {
            for next in transition.targets() {
                self.visit(next, marks)?;
            }
        }
        marks.insert(step, Mark::Done);
        Ok(())
    }
}

/// The vote inquiry topology
///
/// Every adapter-calling step is followed by an error check. Every reply
/// goes through `UpdateContext`, except `NoDataFound`, which ends the turn
/// directly.
pub fn vote_inquiry_graph() -> Result<WorkflowGraph, GraphError> {
    use Router::*;
    use StepId::*;

    GraphBuilder::new()
        .add_steps(StepId::ALL)
        .entry(ScopeCheck)
        .add_branch(ScopeCheck, RouteByClassification, Converse, OutOfScopeReply)
        .add_branch(Converse, LookForErrors, ErrorReply, CheckClarification)
        .add_branch(
            CheckClarification,
            RouteByClarification,
            AskClarification,
            ResolveEntityByAlias,
        )
        .add_branch(ResolveEntityByAlias, LookForErrors, ErrorReply, CheckAliasLookup)
        .add_branch(
            CheckAliasLookup,
            AnyEntityFound,
            BuildFinalQuery,
            ResolveEntityByFormalName,
        )
        .add_branch(
            ResolveEntityByFormalName,
            LookForErrors,
            ErrorReply,
            CheckFormalNameLookup,
        )
        .add_branch(CheckFormalNameLookup, AnyEntityFound, BuildFinalQuery, NoEntityFound)
        .add_branch(BuildFinalQuery, LookForErrors, ErrorReply, RunFinalQuery)
        .add_branch(RunFinalQuery, LookForErrors, ErrorReply, CheckFinalResult)
        .add_branch(
            CheckFinalResult,
            CheckFinalQueryResult,
            FormatFinalAnswer,
            NoDataFound,
        )
        .add_branch(FormatFinalAnswer, LookForErrors, ErrorReply, UpdateContext)
        .add_edge(OutOfScopeReply, UpdateContext)
        .add_edge(ErrorReply, UpdateContext)
        .add_edge(AskClarification, UpdateContext)
        .add_edge(NoEntityFound, UpdateContext)
        .add_terminal(NoDataFound)
        .add_terminal(UpdateContext)
        .build()
}
