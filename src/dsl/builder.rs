use std::collections::HashMap;

use uuid::Uuid;

use crate::dsl::{
    Character, Connection, Graph, NodeData, NodeKind, Position, ScriptSource, StoryNode, DEFAULT_PORT,
};
use crate::error::GraphError;

/// Builds a [`Graph`] using short aliases instead of node ids.
/// `"start"` and `"end"` name the graph's terminal nodes.
pub struct GraphBuilder {
    graph: Graph,
    aliases: HashMap<String, Uuid>,
    pending: Vec<(String, String, String)>,
    error: Option<GraphError>,
}

impl GraphBuilder {
    pub fn new(name: &str) -> Self {
        Self::from_graph(Graph::new(name))
    }

    pub fn with_id(id: Uuid, name: &str) -> Self {
        Self::from_graph(Graph::with_id(id, name))
    }

    fn from_graph(graph: Graph) -> Self {
        let mut aliases = HashMap::new();
        aliases.insert("start".to_string(), graph.start().id);
        aliases.insert("end".to_string(), graph.end().id);
        Self {
            graph,
            aliases,
            pending: Vec::new(),
            error: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.graph.id()
    }

    pub fn id_of(&self, alias: &str) -> Option<Uuid> {
        self.aliases.get(alias).copied()
    }

    /// Starts a story node; finish it with [`StoryBuilder::build`].
    pub fn story(self, alias: &str, script_name: &str) -> StoryBuilder {
        StoryBuilder {
            graph_builder: self,
            alias: alias.to_string(),
            source: ScriptSource {
                name: script_name.to_string(),
                text: String::new(),
            },
            characters: Vec::new(),
            position: Position::default(),
        }
    }

    pub fn subgraph(self, alias: &str, graph: Uuid) -> Self {
        self.node(alias, NodeData::new(NodeKind::SubGraph { graph }))
    }

    fn node(mut self, alias: &str, node: NodeData) -> Self {
        match self.graph.add_node(node) {
            Ok(id) => {
                self.aliases.insert(alias.to_string(), id);
            }
            Err(e) => {
                self.error.get_or_insert(e);
            }
        }
        self
    }

    /// Connects the default output port of `source` to `target`.
    pub fn connect(self, source: &str, target: &str) -> Self {
        self.connect_port(source, DEFAULT_PORT, target)
    }

    /// Connects a named output port (a jump label) of `source` to `target`.
    pub fn connect_port(mut self, source: &str, port: &str, target: &str) -> Self {
        self.pending
            .push((source.to_string(), port.to_string(), target.to_string()));
        self
    }

    pub fn build(mut self) -> Result<Graph, GraphError> {
        if let Some(e) = self.error {
            return Err(e);
        }

        for (source, port, target) in std::mem::take(&mut self.pending) {
            let from = self.resolve(&source)?;
            let to = self.resolve(&target)?;
            self.graph.connect(Connection::on_port(from, port, to))?;
        }
        Ok(self.graph)
    }

    fn resolve(&self, alias: &str) -> Result<Uuid, GraphError> {
        self.id_of(alias)
            .ok_or_else(|| GraphError::UnknownAlias(alias.to_string()))
    }
}

pub struct StoryBuilder {
    graph_builder: GraphBuilder,
    alias: String,
    source: ScriptSource,
    characters: Vec<Character>,
    position: Position,
}

impl StoryBuilder {
    pub fn text(mut self, text: &str) -> Self {
        self.source.text = text.to_string();
        self
    }

    /// Binds the next declared character of the script.
    pub fn character(mut self, name: &str) -> Self {
        self.characters.push(Character::new(name));
        self
    }

    pub fn at(mut self, x: f32, y: f32) -> Self {
        self.position = Position { x, y };
        self
    }

    pub fn build(self) -> GraphBuilder {
        let mut node = NodeData::new(NodeKind::Story(StoryNode {
            source: self.source,
            characters: self.characters,
        }));
        node.position = self.position;
        self.graph_builder.node(&self.alias, node)
    }
}
