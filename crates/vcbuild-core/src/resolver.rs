//! Dependency discovery and ordering.
//!
//! [`discover`] grows a [`DependencyGraph`] breadth-first from the requested
//! roots by asking a query for each node's direct dependencies. A node whose
//! query short-circuits ("already installed") stays in the graph as a leaf.
//! [`Resolution::from_graph`] then emits a post-order over the graph so every
//! package follows the packages it depends on, and rejects cycles.

use std::collections::{HashMap, VecDeque};

use vcbuild_schema::{PackageName, normalize};

use crate::EngineError;

/// Index of a node inside a [`DependencyGraph`].
pub type NodeId = usize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum OrderMark {
    #[default]
    Unvisited,
    InProgress,
    Emitted,
}

/// One package in a resolution run.
#[derive(Debug, Clone)]
pub struct PackageNode {
    /// Canonical name, unique within the graph.
    pub name: PackageName,
    /// Set once this node's own query returned a list (as opposed to the
    /// short-circuit answer).
    pub resolved: bool,
    /// Set once the node has been placed on the discovery queue.
    pub enqueued: bool,
    /// Outgoing edges, in the order the tool reported them.
    pub dependencies: Vec<NodeId>,
    mark: OrderMark,
}

impl PackageNode {
    fn new(name: PackageName) -> Self {
        Self {
            name,
            resolved: false,
            enqueued: false,
            dependencies: Vec::new(),
            mark: OrderMark::Unvisited,
        }
    }

    /// Whether the node has been emitted into the topological order.
    pub fn visited_for_order(&self) -> bool {
        self.mark == OrderMark::Emitted
    }
}

/// Index-based dependency graph for a single resolution run.
///
/// Nodes are stored in discovery order; edges are node ids, so the graph owns
/// every node and edges never form ownership cycles.
#[derive(Debug, Default)]
pub struct DependencyGraph {
    nodes: Vec<PackageNode>,
    index: HashMap<PackageName, NodeId>,
}

impl DependencyGraph {
    /// Create an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the id for `name`, creating the node if it is unseen.
    pub fn get_or_insert(&mut self, name: &PackageName) -> NodeId {
        if let Some(&id) = self.index.get(name) {
            return id;
        }
        let id = self.nodes.len();
        self.nodes.push(PackageNode::new(name.clone()));
        self.index.insert(name.clone(), id);
        id
    }

    /// Append an edge `from -> to`.
    pub fn add_edge(&mut self, from: NodeId, to: NodeId) {
        self.nodes[from].dependencies.push(to);
    }

    /// Look a node up by name. `name` is normalized first, so `"zlib"` and
    /// `"zlib[core]"` find the same node.
    pub fn get(&self, name: &str) -> Option<&PackageNode> {
        self.index
            .get(normalize(name).as_str())
            .map(|&id| &self.nodes[id])
    }

    /// The node with the given id.
    ///
    /// # Panics
    ///
    /// Panics if `id` did not come from this graph.
    pub fn node(&self, id: NodeId) -> &PackageNode {
        &self.nodes[id]
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no nodes.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Nodes in discovery order.
    pub fn nodes(&self) -> impl Iterator<Item = &PackageNode> {
        self.nodes.iter()
    }

    /// Every edge as `(dependent, dependency)`.
    pub fn edges(&self) -> impl Iterator<Item = (&PackageName, &PackageName)> {
        self.nodes.iter().flat_map(move |node| {
            node.dependencies
                .iter()
                .map(move |&dep| (&node.name, &self.nodes[dep].name))
        })
    }

    /// Post-order depth-first emission, started from every node in discovery
    /// order.
    ///
    /// A node's dependencies are emitted (in edge order) before the node
    /// itself, so for every edge `a -> b`, `b` precedes `a`. Each node is
    /// emitted once however many paths reach it. An explicit stack replaces
    /// recursion so deep chains cannot overflow.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DependencyCycle`] if a back edge is found.
    pub fn topological_order(&mut self) -> Result<Vec<NodeId>, EngineError> {
        let mut order = Vec::with_capacity(self.nodes.len());

        for start in 0..self.nodes.len() {
            if self.nodes[start].mark != OrderMark::Unvisited {
                continue;
            }
            self.nodes[start].mark = OrderMark::InProgress;
            // (node, index of the next edge to follow)
            let mut stack: Vec<(NodeId, usize)> = vec![(start, 0)];

            while let Some(frame) = stack.last_mut() {
                let (id, next) = *frame;
                if let Some(&dep) = self.nodes[id].dependencies.get(next) {
                    frame.1 += 1;
                    match self.nodes[dep].mark {
                        OrderMark::Unvisited => {
                            self.nodes[dep].mark = OrderMark::InProgress;
                            stack.push((dep, 0));
                        }
                        OrderMark::InProgress => {
                            return Err(self.cycle_error(&stack, dep));
                        }
                        OrderMark::Emitted => {}
                    }
                } else {
                    self.nodes[id].mark = OrderMark::Emitted;
                    order.push(id);
                    stack.pop();
                }
            }
        }

        Ok(order)
    }

    fn cycle_error(&self, stack: &[(NodeId, usize)], back_to: NodeId) -> EngineError {
        let start = stack
            .iter()
            .position(|&(id, _)| id == back_to)
            .unwrap_or(0);
        let cycle = stack[start..]
            .iter()
            .map(|&(id, _)| self.nodes[id].name.clone())
            .chain(std::iter::once(self.nodes[back_to].name.clone()))
            .collect();
        EngineError::DependencyCycle { cycle }
    }
}

/// Outcome of a resolution run: the graph and its emission order.
#[derive(Debug)]
pub struct Resolution {
    graph: DependencyGraph,
    order: Vec<NodeId>,
}

impl Resolution {
    /// Order a discovered graph.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::DependencyCycle`] if the graph is not acyclic.
    pub fn from_graph(mut graph: DependencyGraph) -> Result<Self, EngineError> {
        let order = graph.topological_order()?;
        tracing::debug!(
            order = ?order.iter().map(|&id| graph.nodes[id].name.as_str()).collect::<Vec<_>>(),
            "resolved"
        );
        Ok(Self { graph, order })
    }

    /// Every discovered package, dependencies first.
    pub fn order(&self) -> Vec<&PackageName> {
        self.order.iter().map(|&id| &self.graph.nodes[id].name).collect()
    }

    /// Packages in order whose query returned a list, i.e. the ones the tool
    /// still has to act on. Short-circuited nodes are skipped.
    pub fn actionable(&self) -> Vec<&PackageName> {
        self.order
            .iter()
            .map(|&id| &self.graph.nodes[id])
            .filter(|node| node.resolved)
            .map(|node| &node.name)
            .collect()
    }

    /// The underlying graph.
    pub fn graph(&self) -> &DependencyGraph {
        &self.graph
    }

    /// Number of packages discovered.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether nothing was discovered.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

/// Breadth-first discovery of the transitive closure of `roots` via `query`.
///
/// `query` is asked once per package. It returns:
/// - `Some(list)`: the packages this one points at (dependencies for an
///   install, dependents for a removal). Each becomes an edge and is queued
///   if new.
/// - `None`: the package is already in the desired state. It stays in the
///   graph as a leaf and nothing behind it is explored.
///
/// The same algorithm serves installs and removals; only the query differs.
///
/// # Errors
///
/// Propagates the first error from `query`.
pub fn discover<F>(roots: &[PackageName], mut query: F) -> Result<DependencyGraph, EngineError>
where
    F: FnMut(&PackageName) -> Result<Option<Vec<PackageName>>, EngineError>,
{
    let mut graph = DependencyGraph::new();
    let mut queue = VecDeque::new();

    for root in roots {
        let id = graph.get_or_insert(root);
        if !graph.nodes[id].enqueued {
            graph.nodes[id].enqueued = true;
            queue.push_back(id);
        }
    }

    while let Some(id) = queue.pop_front() {
        let name = graph.nodes[id].name.clone();
        let Some(deps) = query(&name)? else {
            tracing::debug!(package = %name, "already in desired state");
            continue;
        };
        tracing::debug!(package = %name, count = deps.len(), "discovered edges");

        graph.nodes[id].resolved = true;
        for dep in &deps {
            let dep_id = graph.get_or_insert(dep);
            graph.add_edge(id, dep_id);
            if !graph.nodes[dep_id].enqueued {
                graph.nodes[dep_id].enqueued = true;
                queue.push_back(dep_id);
            }
        }
    }

    Ok(graph)
}

/// [`discover`] followed by [`Resolution::from_graph`].
///
/// # Errors
///
/// Propagates the first error from `query`, or
/// [`EngineError::DependencyCycle`] from the ordering pass.
pub fn resolve<F>(roots: &[PackageName], query: F) -> Result<Resolution, EngineError>
where
    F: FnMut(&PackageName) -> Result<Option<Vec<PackageName>>, EngineError>,
{
    Resolution::from_graph(discover(roots, query)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Answers from a fixed table and records every query.
    struct Table {
        answers: HashMap<PackageName, Option<Vec<PackageName>>>,
        asked: Vec<PackageName>,
    }

    impl Table {
        fn new(rows: &[(&str, Option<&[&str]>)]) -> Self {
            let answers = rows
                .iter()
                .map(|(name, deps)| {
                    (
                        PackageName::new(name),
                        deps.map(|d| d.iter().map(|n| PackageName::new(n)).collect()),
                    )
                })
                .collect();
            Self {
                answers,
                asked: Vec::new(),
            }
        }

        fn query(&mut self, name: &PackageName) -> Result<Option<Vec<PackageName>>, EngineError> {
            self.asked.push(name.clone());
            Ok(self.answers.get(name).cloned().unwrap_or(Some(Vec::new())))
        }
    }

    fn names(list: &[&str]) -> Vec<PackageName> {
        list.iter().map(|n| PackageName::new(n)).collect()
    }

    fn position(order: &[&PackageName], name: &str) -> usize {
        order.iter().position(|n| **n == name).unwrap()
    }

    fn assert_topological(resolution: &Resolution) {
        let order = resolution.order();
        for (from, to) in resolution.graph().edges() {
            assert!(
                position(&order, to) < position(&order, from),
                "{to} must precede {from} in {order:?}"
            );
        }
    }

    #[test]
    fn test_simple_resolution() {
        let mut table = Table::new(&[("a", Some(&["b"])), ("b", Some(&[]))]);
        let resolved = resolve(&names(&["a"]), |n| table.query(n)).unwrap();
        assert_eq!(resolved.order(), vec!["b", "a"]);
        assert_eq!(resolved.actionable(), vec!["b", "a"]);
    }

    #[test]
    fn test_diamond_emits_each_once() {
        let mut table = Table::new(&[
            ("a", Some(&["b", "c"])),
            ("b", Some(&["d"])),
            ("c", Some(&["d"])),
            ("d", Some(&[])),
        ]);
        let resolved = resolve(&names(&["a"]), |n| table.query(n)).unwrap();
        assert_eq!(resolved.order(), vec!["d", "b", "c", "a"]);
        assert_topological(&resolved);
        // d was reached twice but queried once
        assert_eq!(table.asked, names(&["a", "b", "c", "d"]));
    }

    #[test]
    fn test_breadth_first_discovery() {
        let mut table = Table::new(&[
            ("a", Some(&["b", "c"])),
            ("b", Some(&["e"])),
            ("c", Some(&["d"])),
        ]);
        let resolved = resolve(&names(&["a"]), |n| table.query(n)).unwrap();
        assert_eq!(table.asked, names(&["a", "b", "c", "e", "d"]));
        assert_topological(&resolved);
    }

    #[test]
    fn test_short_circuit_leaf() {
        // x needs y, y is already installed
        let mut table = Table::new(&[("x", Some(&["y"])), ("y", None), ("z", Some(&[]))]);
        let resolved = resolve(&names(&["x"]), |n| table.query(n)).unwrap();

        assert_eq!(resolved.order(), vec!["y", "x"]);
        assert_eq!(resolved.actionable(), vec!["x"]);

        let y = resolved.graph().get("y").unwrap();
        assert!(!y.resolved);
        assert!(y.dependencies.is_empty());
        assert!(y.visited_for_order());
        assert_eq!(table.asked, names(&["x", "y"]));
    }

    #[test]
    fn test_graph_lookup_accepts_bare_and_canonical_names() {
        let mut graph = DependencyGraph::default();
        let id = graph.get_or_insert(&PackageName::new("zlib"));

        assert_eq!(graph.get("zlib").map(|n| &n.name), Some(&graph.node(id).name));
        assert!(graph.get("zlib[core]").is_some());
        assert!(graph.get("zlib[ssl]").is_none());
    }

    #[test]
    fn test_short_circuited_root_is_present() {
        let mut table = Table::new(&[("a", None)]);
        let resolved = resolve(&names(&["a"]), |n| table.query(n)).unwrap();
        assert_eq!(resolved.order(), vec!["a"]);
        assert!(resolved.actionable().is_empty());
    }

    #[test]
    fn test_root_that_is_also_a_dependency_is_queried_once() {
        let mut table = Table::new(&[("a", Some(&["b"])), ("b", Some(&[]))]);
        let resolved = resolve(&names(&["a", "b", "a[core]"]), |n| table.query(n)).unwrap();
        assert_eq!(table.asked, names(&["a", "b"]));
        assert_eq!(resolved.order(), vec!["b", "a"]);
    }

    #[test]
    fn test_multiple_roots_share_dependencies() {
        let mut table = Table::new(&[
            ("cppfs", Some(&["fmt", "zlib"])),
            ("nova", Some(&["glm", "fmt"])),
        ]);
        let resolved = resolve(&names(&["cppfs", "nova"]), |n| table.query(n)).unwrap();
        assert_eq!(resolved.len(), 5);
        assert_topological(&resolved);
    }

    #[test]
    fn test_removal_query_orders_dependents_first() {
        // dependents query: removing u takes d with it
        let mut table = Table::new(&[("u", Some(&["d"])), ("d", Some(&[]))]);
        let resolved = resolve(&names(&["u"]), |n| table.query(n)).unwrap();
        let order = resolved.actionable();
        assert!(position(&order, "d") < position(&order, "u"));
    }

    #[test]
    fn test_cycle_fails_fast() {
        let mut table = Table::new(&[("a", Some(&["b"])), ("b", Some(&["a"]))]);
        let err = resolve(&names(&["a"]), |n| table.query(n)).unwrap_err();
        match err {
            EngineError::DependencyCycle { cycle } => {
                assert_eq!(cycle, vec!["a", "b", "a"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_query_error_propagates() {
        let err = resolve(&names(&["a"]), |_| {
            Err(EngineError::ToolMissing("vcpkg".to_string()))
        })
        .unwrap_err();
        assert!(matches!(err, EngineError::ToolMissing(_)));
    }

    #[test]
    fn test_deep_chain_does_not_overflow() {
        let mut graph = DependencyGraph::new();
        let mut prev = graph.get_or_insert(&PackageName::new("p0"));
        for i in 1..100_000 {
            let next = graph.get_or_insert(&PackageName::new(&format!("p{i}")));
            graph.add_edge(prev, next);
            prev = next;
        }
        let order = graph.topological_order().unwrap();
        assert_eq!(order.len(), 100_000);
        assert_eq!(graph.node(order[0]).name, "p99999");
        assert_eq!(graph.node(order[99_999]).name, "p0");
    }

    #[test]
    fn test_empty_roots() {
        let resolved = resolve(&[], |_| Ok(Some(Vec::new()))).unwrap();
        assert!(resolved.is_empty());
        assert!(resolved.graph().is_empty());
    }
}
