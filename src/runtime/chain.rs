use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;

use indexmap::IndexMap;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::compiler::core::ScriptCompiler;
use crate::dsl::{Character, Graph, GraphLibrary, NodeKind, ScriptSource};
use crate::error::ChainError;
use crate::nodes::Script;

pub use crate::dsl::DEFAULT_PORT;

/// Return addresses kept while inside nested subgraphs.
pub const MAX_CALL_DEPTH: usize = 256;
/// Subgraph/end hops allowed before a transfer must reach a story node.
pub const MAX_TRANSFER_HOPS: usize = 1024;

/// Position of a chain node: graph id + index into that graph's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub graph: Uuid,
    pub index: usize,
}

#[derive(Debug, Clone)]
pub enum ChainNodeKind {
    Story {
        script: Arc<Script>,
        characters: Vec<Character>,
    },
    SubGraph {
        graph: Uuid,
    },
    End,
}

/// 编译后的链节点
#[derive(Debug, Clone)]
pub struct ChainNode {
    /// Id of the graph node this was built from.
    pub node: Uuid,
    pub kind: ChainNodeKind,
    branches: IndexMap<String, Target>,
}

impl ChainNode {
    /// Port label → target, in connection order.
    pub fn branches(&self) -> &IndexMap<String, Target> {
        &self.branches
    }

    pub fn branch(&self, label: &str) -> Option<Target> {
        self.branches.get(label).copied()
    }
}

/// Result of moving along the chain.
#[derive(Debug, Clone)]
pub enum Step {
    /// Control arrived on a story node; run this script.
    Story(Arc<Script>),
    /// No branch for the label; the current story node keeps control.
    Stay,
    /// The root graph's end was reached.
    Ended,
}

/// A graph and every graph it reaches through subgraph nodes, flattened
/// into per-graph chains, plus the cursor that walks them.
#[derive(Debug)]
pub struct Chain {
    root: Uuid,
    graphs: HashMap<Uuid, Vec<ChainNode>>,
    stack: Vec<Target>,
    current: Target,
    ended: bool,
}

impl Chain {
    pub fn build(library: &GraphLibrary, root: Uuid) -> Result<Self, ChainError> {
        Self::build_with(&ScriptCompiler::new(), library, root)
    }

    pub fn build_with(compiler: &ScriptCompiler, library: &GraphLibrary, root: Uuid) -> Result<Self, ChainError> {
        let mut builder = ChainBuilder {
            compiler,
            scripts: HashMap::new(),
            queue: VecDeque::from([root]),
            seen: HashSet::from([root]),
        };

        let mut graphs = HashMap::new();
        while let Some(id) = builder.queue.pop_front() {
            let graph = library.get(id).ok_or(ChainError::MissingGraph(id))?;
            let chain = builder.build_graph(graph)?;
            debug!(graph = %id, nodes = chain.len(), "graph flattened");
            graphs.insert(id, chain);
        }

        Ok(Self {
            root,
            graphs,
            stack: Vec::new(),
            current: Target { graph: root, index: 0 },
            ended: false,
        })
    }

    pub fn root(&self) -> Uuid {
        self.root
    }

    /// Chain of one graph, if it was reached while building.
    pub fn nodes(&self, graph: Uuid) -> Option<&[ChainNode]> {
        self.graphs.get(&graph).map(Vec::as_slice)
    }

    pub fn position(&self) -> Target {
        self.current
    }

    /// Number of pending return addresses.
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn ended(&self) -> bool {
        self.ended
    }

    pub fn current_node(&self) -> Option<&ChainNode> {
        self.graphs.get(&self.current.graph)?.get(self.current.index)
    }

    pub fn current_script(&self) -> Option<Arc<Script>> {
        match &self.current_node()?.kind {
            ChainNodeKind::Story { script, .. } => Some(script.clone()),
            _ => None,
        }
    }

    /// The identity bound to `key` on the current story node.
    pub fn current_character(&self, key: &str) -> Result<&Character, ChainError> {
        let Some(ChainNodeKind::Story { script, characters }) = self.current_node().map(|n| &n.kind) else {
            return Err(ChainError::NotAStory);
        };
        script
            .character_index(key)
            .and_then(|i| characters.get(i))
            .ok_or_else(|| ChainError::UnknownCharacter(key.to_string()))
    }

    /// Back to the first node of the root graph.
    pub fn reset(&mut self) -> Result<Step, ChainError> {
        self.stack.clear();
        self.ended = false;
        self.enter(Target { graph: self.root, index: 0 })
    }

    pub fn next(&mut self) -> Result<Step, ChainError> {
        self.next_by(DEFAULT_PORT)
    }

    pub fn next_by(&mut self, label: &str) -> Result<Step, ChainError> {
        if self.ended {
            return Ok(Step::Ended);
        }

        let kind = match self.node_at(self.current)? {
            Some(node) => {
                if let Some(target) = node.branch(label) {
                    return self.enter(target);
                }
                node.kind.clone()
            }
            None => ChainNodeKind::End,
        };

        match kind {
            ChainNodeKind::Story { .. } => {
                debug!(port = label, "story node has no branch for port");
                Ok(Step::Stay)
            }
            ChainNodeKind::SubGraph { graph } => self.enter(Target { graph, index: 0 }),
            ChainNodeKind::End => self.enter(self.current),
        }
    }

    /// Moves to `target`, passing through subgraph and end nodes until a
    /// story node or the root end is reached.
    fn enter(&mut self, mut target: Target) -> Result<Step, ChainError> {
        for _ in 0..MAX_TRANSFER_HOPS {
            self.current = target;

            let (kind, resume) = match self.node_at(target)? {
                Some(node) => (node.kind.clone(), node.branch(DEFAULT_PORT)),
                // An empty graph behaves as if start led straight to end.
                None => (ChainNodeKind::End, None),
            };

            match kind {
                ChainNodeKind::Story { script, .. } => return Ok(Step::Story(script)),
                ChainNodeKind::SubGraph { graph } => {
                    if let Some(resume) = resume {
                        if self.stack.len() >= MAX_CALL_DEPTH {
                            return Err(ChainError::CallDepthExceeded(MAX_CALL_DEPTH));
                        }
                        self.stack.push(resume);
                    }
                    target = Target { graph, index: 0 };
                }
                ChainNodeKind::End => match self.stack.pop() {
                    Some(resume) => target = resume,
                    None => {
                        self.ended = true;
                        return Ok(Step::Ended);
                    }
                },
            }
        }
        Err(ChainError::NoProgress(MAX_TRANSFER_HOPS))
    }

    fn node_at(&self, target: Target) -> Result<Option<&ChainNode>, ChainError> {
        let chain = self
            .graphs
            .get(&target.graph)
            .ok_or(ChainError::MissingGraph(target.graph))?;
        Ok(chain.get(target.index))
    }
}

struct ChainBuilder<'a> {
    compiler: &'a ScriptCompiler,
    scripts: HashMap<ScriptSource, Arc<Script>>,
    queue: VecDeque<Uuid>,
    seen: HashSet<Uuid>,
}

impl ChainBuilder<'_> {
    fn build_graph(&mut self, graph: &Graph) -> Result<Vec<ChainNode>, ChainError> {
        let mut chain = Vec::new();
        let mut visited = HashMap::new();

        let first = graph
            .node_connections(graph.start().id)
            .find(|c| c.is_default())
            .map(|c| c.to);

        match first {
            Some(first) => {
                self.visit(graph, first, &mut visited, &mut chain)?;
            }
            None => warn!(graph = %graph.id(), "start node is not connected, graph is empty"),
        }
        Ok(chain)
    }

    /// Materializes `id` (once per graph) and everything reachable from it.
    /// Returns the node's chain index.
    fn visit(
        &mut self,
        graph: &Graph,
        id: Uuid,
        visited: &mut HashMap<Uuid, usize>,
        chain: &mut Vec<ChainNode>,
    ) -> Result<Option<usize>, ChainError> {
        if let Some(&index) = visited.get(&id) {
            return Ok(Some(index));
        }

        let Some(data) = graph.node(id) else {
            warn!(graph = %graph.id(), node = %id, "connection leads to a missing node");
            return Ok(None);
        };

        let kind = match &data.kind {
            NodeKind::Start => {
                warn!(graph = %graph.id(), "connection back into the start node ignored");
                return Ok(None);
            }
            NodeKind::End => ChainNodeKind::End,
            NodeKind::SubGraph { graph: sub } => {
                if self.seen.insert(*sub) {
                    self.queue.push_back(*sub);
                }
                ChainNodeKind::SubGraph { graph: *sub }
            }
            NodeKind::Story(story) => ChainNodeKind::Story {
                script: self.script(id, &story.source)?,
                characters: story.characters.clone(),
            },
        };

        let index = chain.len();
        let is_end = matches!(kind, ChainNodeKind::End);
        chain.push(ChainNode {
            node: id,
            kind,
            branches: IndexMap::new(),
        });
        visited.insert(id, index);

        if is_end {
            return Ok(Some(index));
        }

        for connection in graph.node_connections(id) {
            if chain[index].branches.contains_key(&connection.from_port) {
                debug!(node = %id, port = %connection.from_port, "port already has a branch, extra connection ignored");
                continue;
            }
            let Some(next) = graph.output_node(connection).map(|n| n.id) else {
                warn!(node = %id, port = %connection.from_port, "dangling connection");
                continue;
            };
            if let Some(target) = self.visit(graph, next, visited, chain)? {
                chain[index].branches.insert(
                    connection.from_port.clone(),
                    Target { graph: graph.id(), index: target },
                );
            }
        }

        Ok(Some(index))
    }

    fn script(&mut self, node: Uuid, source: &ScriptSource) -> Result<Arc<Script>, ChainError> {
        if let Some(script) = self.scripts.get(source) {
            return Ok(script.clone());
        }

        let script = self
            .compiler
            .compile(&source.name, &source.text)
            .map_err(|e| ChainError::Compile { node, source: e })?;
        let script = Arc::new(script);
        self.scripts.insert(source.clone(), script.clone());
        Ok(script)
    }
}
