use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context as AnyhowContext, Result};
use serde::Deserialize;
use uuid::Uuid;

use crate::dsl::builder::GraphBuilder;
use crate::dsl::{GraphLibrary, DEFAULT_PORT};

/// File extension of script sources.
pub const SCRIPT_EXTENSION: &str = "hamstory";

#[derive(Debug, Deserialize)]
struct Manifest {
    graphs: Vec<ManifestGraph>,
}

#[derive(Debug, Deserialize)]
struct ManifestGraph {
    name: String,
    #[serde(default)]
    nodes: Vec<ManifestNode>,
    #[serde(default)]
    connections: Vec<ManifestConnection>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ManifestNode {
    Story {
        id: String,
        script: PathBuf,
        #[serde(default)]
        characters: Vec<String>,
        #[serde(default)]
        position: Option<(f32, f32)>,
    },
    Subgraph {
        id: String,
        graph: String,
    },
}

#[derive(Debug, Deserialize)]
struct ManifestConnection {
    from: String,
    #[serde(default)]
    port: Option<String>,
    to: String,
}

/// Reads a script file; the script is named after the file.
pub fn load_script(path: &Path) -> Result<(String, String)> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read script from {}", path.display()))?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    Ok((name, text))
}

/// Every script file directly inside `dir`, sorted by path.
pub fn script_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = fs::read_dir(dir)
        .with_context(|| format!("Failed to list {}", dir.display()))?
        .flatten()
        .map(|entry| entry.path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(SCRIPT_EXTENSION))
        .collect();
    files.sort();
    Ok(files)
}

/// Loads a YAML story manifest. Graph order in the library follows the manifest,
/// so the first graph is the natural root. Script paths are relative to the manifest.
pub fn load_library(path: impl AsRef<Path>) -> Result<GraphLibrary> {
    let path = path.as_ref();
    let yaml_content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest from {}", path.display()))?;

    let manifest: Manifest = serde_yaml::from_str(&yaml_content)
        .with_context(|| format!("Failed to deserialize manifest {}", path.display()))?;

    let base = path.parent().unwrap_or_else(|| Path::new("."));

    let mut ids: HashMap<&str, Uuid> = HashMap::new();
    for graph in &manifest.graphs {
        if ids.insert(&graph.name, Uuid::new_v4()).is_some() {
            bail!("graph '{}' is defined twice in {}", graph.name, path.display());
        }
    }

    let mut library = GraphLibrary::new();
    for graph in &manifest.graphs {
        let mut builder = GraphBuilder::with_id(ids[graph.name.as_str()], &graph.name);

        for node in &graph.nodes {
            builder = match node {
                ManifestNode::Story {
                    id,
                    script,
                    characters,
                    position,
                } => {
                    let (_, text) = load_script(&base.join(script))
                        .with_context(|| format!("story node '{}' of graph '{}'", id, graph.name))?;

                    let mut story = builder
                        .story(id, &script.to_string_lossy())
                        .text(&text);
                    for character in characters {
                        story = story.character(character);
                    }
                    if let Some((x, y)) = position {
                        story = story.at(*x, *y);
                    }
                    story.build()
                }
                ManifestNode::Subgraph { id, graph: target } => {
                    let Some(&target_id) = ids.get(target.as_str()) else {
                        bail!("node '{}' of graph '{}' references unknown graph '{}'", id, graph.name, target);
                    };
                    builder.subgraph(id, target_id)
                }
            };
        }

        for connection in &graph.connections {
            let port = connection.port.as_deref().unwrap_or(DEFAULT_PORT);
            builder = builder.connect_port(&connection.from, port, &connection.to);
        }

        let built = builder
            .build()
            .with_context(|| format!("Invalid graph '{}' in {}", graph.name, path.display()))?;
        library.insert(built);
    }

    Ok(library)
}
