use hamstory::compiler::core::ScriptCompiler;
use hamstory::dsl::builder::GraphBuilder;
use hamstory::dsl::{Connection, Graph, GraphLibrary, NodeData, NodeKind, Position, DEFAULT_PORT};
use hamstory::error::GraphError;
use serde_json::json;

fn two_story_graph() -> GraphBuilder {
    GraphBuilder::new("village")
        .story("intro", "intro").text("[Char] A\nA: hello\n[Jump] shop").character("Ham").build()
        .story("shop", "shop").text(": welcome").at(120.0, 40.0).build()
        .connect("start", "intro")
        .connect_port("intro", "shop", "shop")
        .connect("shop", "end")
}

#[test]
fn test_build_story_graph() {
    let builder = two_story_graph();
    let intro = builder.id_of("intro").unwrap();
    let shop = builder.id_of("shop").unwrap();
    let graph = builder.build().unwrap();

    assert_eq!(graph.name(), "village");
    assert_eq!(graph.nodes().count(), 4);
    assert_eq!(graph.connections().len(), 3);

    // 检查故事节点
    let Some(NodeKind::Story(story)) = graph.node(intro).map(|n| &n.kind) else {
        panic!("intro should be a story node");
    };
    assert_eq!(story.source.name, "intro");
    assert_eq!(story.characters.len(), 1);
    assert_eq!(graph.node(shop).unwrap().position, Position { x: 120.0, y: 40.0 });

    let jump = graph.node_connections(intro).next().unwrap();
    assert_eq!(jump.from_port, "shop");
    assert_eq!(jump.to, shop);
    assert_eq!(graph.output_node(jump).map(|n| n.id), Some(shop));
}

#[test]
fn test_builder_reports_unknown_alias() {
    let err = GraphBuilder::new("g").connect("start", "missing").build().unwrap_err();
    assert_eq!(err, GraphError::UnknownAlias("missing".to_string()));
}

#[test]
fn test_terminal_nodes_are_unique() {
    let mut graph = Graph::new("g");
    assert_eq!(
        graph.add_node(NodeData::new(NodeKind::End)),
        Err(GraphError::DuplicateTerminal)
    );
    assert_eq!(graph.nodes_where(|n| n.is_terminal()).len(), 2);
}

#[test]
fn test_connect_rules() {
    let builder = two_story_graph();
    let intro = builder.id_of("intro").unwrap();
    let shop = builder.id_of("shop").unwrap();
    let mut graph = builder.build().unwrap();

    // Equal connections are stored once.
    assert_eq!(graph.connect(Connection::on_port(intro, "shop", shop)), Ok(false));

    // A named port leads to one place only.
    let end = graph.end().id;
    assert_eq!(
        graph.connect(Connection::on_port(intro, "shop", end)),
        Err(GraphError::PortOccupied { node: intro, port: "shop".to_string() })
    );

    // The default port may fan out; the first connection wins at run time.
    assert_eq!(graph.connect(Connection::new(intro, end)), Ok(true));
    assert_eq!(graph.connect(Connection::new(intro, shop)), Ok(true));

    let stranger = uuid::Uuid::new_v4();
    assert_eq!(
        graph.connect(Connection::new(intro, stranger)),
        Err(GraphError::UnknownNode(stranger))
    );

    assert!(graph.disconnect(&Connection::new(intro, shop)));
    assert!(!graph.disconnect(&Connection::new(intro, shop)));
}

#[test]
fn test_remove_nodes_drops_their_connections() {
    let builder = two_story_graph();
    let intro = builder.id_of("intro").unwrap();
    let mut graph = builder.build().unwrap();

    let removed = graph.remove_node(intro).unwrap();
    assert_eq!(removed.id, intro);
    assert!(graph.node(intro).is_none());
    assert_eq!(graph.connections().len(), 1);

    // Terminals stay.
    let start = graph.start().id;
    assert!(graph.remove_node(start).is_none());

    let mut graph = two_story_graph().build().unwrap();
    assert_eq!(graph.remove_all_nodes(|n| !n.is_terminal()), 2);
    assert_eq!(graph.nodes().count(), 2);
    assert!(graph.connections().is_empty());
}

#[test]
fn test_move_node() {
    let builder = two_story_graph();
    let shop = builder.id_of("shop").unwrap();
    let mut graph = builder.build().unwrap();

    graph.move_node(shop, Position { x: 1.0, y: 2.0 }).unwrap();
    assert_eq!(graph.node(shop).unwrap().position, Position { x: 1.0, y: 2.0 });

    let stranger = uuid::Uuid::new_v4();
    assert_eq!(
        graph.move_node(stranger, Position::default()),
        Err(GraphError::UnknownNode(stranger))
    );
}

#[test]
fn test_output_ports_come_from_jump_labels() {
    let builder = GraphBuilder::new("ports")
        .story("hub", "hub").text("[Jump] shop\n[Jump] back\n[Jump] shop\n[Jump]").build()
        .story("bad", "bad").text("[Nope]").build();
    let hub = builder.id_of("hub").unwrap();
    let bad = builder.id_of("bad").unwrap();
    let graph = builder.build().unwrap();
    let compiler = ScriptCompiler::new();

    assert_eq!(graph.output_ports(hub, &compiler).unwrap(), vec![DEFAULT_PORT, "shop", "back"]);
    assert_eq!(graph.output_ports(bad, &compiler).unwrap(), vec![DEFAULT_PORT]);
    assert_eq!(graph.output_ports(graph.start().id, &compiler).unwrap(), vec![DEFAULT_PORT]);
    assert!(graph.output_ports(graph.end().id, &compiler).unwrap().is_empty());
}

#[test]
fn test_prune_stale_ports() {
    let mut graph = GraphBuilder::new("stale")
        .story("a", "a").text("[Jump] keep").build()
        .connect("start", "a")
        .connect_port("a", "keep", "end")
        .connect_port("a", "gone", "end")
        .build()
        .unwrap();

    assert_eq!(graph.prune_ports(&ScriptCompiler::new()), 1);
    let ports: Vec<&str> = graph.connections().iter().map(|c| c.from_port.as_str()).collect();
    assert_eq!(ports, vec![DEFAULT_PORT, "keep"]);
}

#[test]
fn test_serde_round_trip() {
    let graph = two_story_graph().build().unwrap();

    let value = serde_json::to_value(&graph).unwrap();
    let back: Graph = serde_json::from_value(value).unwrap();
    assert_eq!(back, graph);
}

#[test]
fn test_deserialize_fills_defaults() {
    let from = uuid::Uuid::new_v4();
    let value = json!({
        "name": "minimal",
        "stories": [
            { "id": from, "type": "Story", "source": { "name": "s", "text": ": hi" } }
        ],
        "connections": [ { "from": from, "to": from } ]
    });

    let graph: Graph = serde_json::from_value(value).unwrap();
    assert_eq!(graph.name(), "minimal");
    assert_eq!(graph.nodes().count(), 3);
    assert_ne!(graph.start().id, graph.end().id);

    let connection = &graph.connections()[0];
    assert!(connection.is_default());
    assert_eq!(connection.to_port, DEFAULT_PORT);

    let Some(NodeKind::Story(story)) = graph.node(from).map(|n| &n.kind) else {
        panic!("expected a story node");
    };
    assert!(story.characters.is_empty());
}

#[test]
fn test_library_lookup() {
    let first = Graph::new("first");
    let second = Graph::new("second");
    let id = second.id();

    let library = GraphLibrary::new().with(first).with(second);
    assert_eq!(library.len(), 2);
    assert_eq!(library.by_name("second").map(|g| g.id()), Some(id));
    assert_eq!(library.get(id).map(|g| g.name()), Some("second"));
    assert_eq!(library.graphs().next().map(|g| g.name()), Some("first"));
    assert!(library.by_name("third").is_none());
}
