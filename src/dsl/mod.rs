pub mod builder;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

use crate::compiler::core::ScriptCompiler;
use crate::error::GraphError;

/// Label of the unnamed output port and of every node's flow-in port.
pub const DEFAULT_PORT: &str = "→";

fn default_port() -> String {
    DEFAULT_PORT.to_string()
}

/// Editor layout only; has no effect on execution.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

/// Identity a script's declared character key is bound to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Character {
    pub name: String,
}

impl Character {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct ScriptSource {
    pub name: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StoryNode {
    pub source: ScriptSource,
    /// Bound by position to the script's declared characters.
    #[serde(default)]
    pub characters: Vec<Character>,
}

/// 图中的节点类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type")]
pub enum NodeKind {
    Start,
    End,
    Story(StoryNode),
    SubGraph { graph: Uuid },
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NodeData {
    pub id: Uuid,
    #[serde(default)]
    pub position: Position,
    #[serde(flatten)]
    pub kind: NodeKind,
}

impl NodeData {
    pub fn new(kind: NodeKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            position: Position::default(),
            kind,
        }
    }

    fn start() -> Self {
        Self::new(NodeKind::Start)
    }

    fn end() -> Self {
        Self::new(NodeKind::End)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.kind, NodeKind::Start | NodeKind::End)
    }
}

/// 有向连接：(源节点, 源端口) → (目标节点, 目标端口)
/// Equality is structural over all four fields.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Connection {
    pub from: Uuid,
    #[serde(default = "default_port")]
    pub from_port: String,
    pub to: Uuid,
    #[serde(default = "default_port")]
    pub to_port: String,
}

impl Connection {
    /// Default output port to the default flow-in port.
    pub fn new(from: Uuid, to: Uuid) -> Self {
        Self::on_port(from, DEFAULT_PORT, to)
    }

    pub fn on_port(from: Uuid, port: impl Into<String>, to: Uuid) -> Self {
        Self {
            from,
            from_port: port.into(),
            to,
            to_port: default_port(),
        }
    }

    pub fn is_default(&self) -> bool {
        self.from_port == DEFAULT_PORT
    }
}

/// A story graph. Start and end nodes always exist.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Graph {
    #[serde(default = "Uuid::new_v4")]
    id: Uuid,
    name: String,
    #[serde(default = "NodeData::start")]
    start: NodeData,
    #[serde(default = "NodeData::end")]
    end: NodeData,
    #[serde(default)]
    stories: Vec<NodeData>,
    #[serde(default)]
    subgraphs: Vec<NodeData>,
    #[serde(default)]
    connections: Vec<Connection>,
}

impl Graph {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_id(Uuid::new_v4(), name)
    }

    pub fn with_id(id: Uuid, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            start: NodeData::start(),
            end: NodeData::end(),
            stories: Vec::new(),
            subgraphs: Vec::new(),
            connections: Vec::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn start(&self) -> &NodeData {
        &self.start
    }

    pub fn end(&self) -> &NodeData {
        &self.end
    }

    /// Every node: start, end, story nodes, then subgraph nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &NodeData> {
        [&self.start, &self.end]
            .into_iter()
            .chain(self.stories.iter())
            .chain(self.subgraphs.iter())
    }

    pub fn node(&self, id: Uuid) -> Option<&NodeData> {
        self.nodes().find(|n| n.id == id)
    }

    pub fn nodes_where(&self, predicate: impl Fn(&NodeData) -> bool) -> Vec<&NodeData> {
        self.nodes().filter(|n| predicate(n)).collect()
    }

    fn node_mut(&mut self, id: Uuid) -> Option<&mut NodeData> {
        [&mut self.start, &mut self.end]
            .into_iter()
            .chain(self.stories.iter_mut())
            .chain(self.subgraphs.iter_mut())
            .find(|n| n.id == id)
    }

    pub fn add_node(&mut self, node: NodeData) -> Result<Uuid, GraphError> {
        let id = node.id;
        match node.kind {
            NodeKind::Start | NodeKind::End => return Err(GraphError::DuplicateTerminal),
            NodeKind::Story(_) => self.stories.push(node),
            NodeKind::SubGraph { .. } => self.subgraphs.push(node),
        }
        Ok(id)
    }

    pub fn add_nodes(&mut self, nodes: impl IntoIterator<Item = NodeData>) -> Result<(), GraphError> {
        for node in nodes {
            self.add_node(node)?;
        }
        Ok(())
    }

    /// Removes a story or subgraph node and every connection touching it.
    /// Start and end nodes cannot be removed.
    pub fn remove_node(&mut self, id: Uuid) -> Option<NodeData> {
        let removed = take_where(&mut self.stories, |n| n.id == id)
            .into_iter()
            .chain(take_where(&mut self.subgraphs, |n| n.id == id))
            .next()?;
        self.connections.retain(|c| c.from != id && c.to != id);
        Some(removed)
    }

    /// Returns how many nodes were removed.
    pub fn remove_all_nodes(&mut self, predicate: impl Fn(&NodeData) -> bool) -> usize {
        let mut removed = take_where(&mut self.stories, &predicate);
        removed.extend(take_where(&mut self.subgraphs, &predicate));

        self.connections
            .retain(|c| !removed.iter().any(|n| n.id == c.from || n.id == c.to));
        removed.len()
    }

    pub fn move_node(&mut self, id: Uuid, position: Position) -> Result<(), GraphError> {
        let node = self.node_mut(id).ok_or(GraphError::UnknownNode(id))?;
        node.position = position;
        Ok(())
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    /// Outgoing connections of `node`, in storage order.
    pub fn node_connections(&self, node: Uuid) -> impl Iterator<Item = &Connection> {
        self.connections.iter().filter(move |c| c.from == node)
    }

    /// Destination node of a connection.
    pub fn output_node(&self, connection: &Connection) -> Option<&NodeData> {
        if connection.to == self.end.id {
            return Some(&self.end);
        }
        self.node(connection.to)
    }

    /// Adds a connection. Returns `false` if an equal one already exists.
    pub fn connect(&mut self, connection: Connection) -> Result<bool, GraphError> {
        for id in [connection.from, connection.to] {
            if self.node(id).is_none() {
                return Err(GraphError::UnknownNode(id));
            }
        }

        if self.connections.contains(&connection) {
            return Ok(false);
        }

        if !connection.is_default()
            && self
                .node_connections(connection.from)
                .any(|c| c.from_port == connection.from_port)
        {
            return Err(GraphError::PortOccupied {
                node: connection.from,
                port: connection.from_port,
            });
        }

        self.connections.push(connection);
        Ok(true)
    }

    pub fn disconnect(&mut self, connection: &Connection) -> bool {
        let before = self.connections.len();
        self.connections.retain(|c| c != connection);
        before != self.connections.len()
    }

    /// Output ports of a node: the default port, then for story nodes every
    /// jump label of the compiled script.
    pub fn output_ports(&self, id: Uuid, compiler: &ScriptCompiler) -> Result<Vec<String>, GraphError> {
        let node = self.node(id).ok_or(GraphError::UnknownNode(id))?;

        let ports = match &node.kind {
            NodeKind::End => Vec::new(),
            NodeKind::Start | NodeKind::SubGraph { .. } => vec![default_port()],
            NodeKind::Story(story) => {
                let mut ports = vec![default_port()];
                match compiler.compile(&story.source.name, &story.source.text) {
                    Ok(script) => ports.extend(script.jumps().iter().cloned()),
                    Err(e) => warn!(node = %id, "script does not compile, only the default port is listed: {}", e),
                }
                ports
            }
        };
        Ok(ports)
    }

    /// Drops connections leaving from ports that no longer exist.
    /// Returns how many were removed.
    pub fn prune_ports(&mut self, compiler: &ScriptCompiler) -> usize {
        let stale: Vec<Connection> = self
            .connections
            .iter()
            .filter(|c| {
                self.output_ports(c.from, compiler)
                    .map(|ports| !ports.contains(&c.from_port))
                    .unwrap_or(true)
            })
            .cloned()
            .collect();

        self.connections.retain(|c| !stale.contains(c));
        stale.len()
    }
}

fn take_where(nodes: &mut Vec<NodeData>, predicate: impl Fn(&NodeData) -> bool) -> Vec<NodeData> {
    let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(nodes).into_iter().partition(|n| predicate(n));
    *nodes = kept;
    taken
}

/// All graphs a story may reach, keyed by graph id.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct GraphLibrary {
    graphs: IndexMap<Uuid, Graph>,
}

impl GraphLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, graph: Graph) -> Uuid {
        let id = graph.id();
        self.graphs.insert(id, graph);
        id
    }

    pub fn with(mut self, graph: Graph) -> Self {
        self.insert(graph);
        self
    }

    pub fn get(&self, id: Uuid) -> Option<&Graph> {
        self.graphs.get(&id)
    }

    pub fn by_name(&self, name: &str) -> Option<&Graph> {
        self.graphs.values().find(|g| g.name() == name)
    }

    pub fn graphs(&self) -> impl Iterator<Item = &Graph> {
        self.graphs.values()
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }
}
