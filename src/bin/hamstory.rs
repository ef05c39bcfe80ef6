use std::path::PathBuf;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use clap::{Parser, Subcommand};
use hamstory::compiler::core::ScriptCompiler;
use hamstory::compiler::loader::{load_library, load_script, script_files};
use hamstory::dsl::Character;
use hamstory::nodes::MenuOption;
use hamstory::runtime::chain::Chain;
use hamstory::runtime::context::MemoryData;
use hamstory::runtime::director::{ChainDirector, Director, SingleScript};
use hamstory::runtime::executor::{Executor, RunStatus};
use hamstory::runtime::visual::Presenter;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile scripts and report diagnostics
    Check {
        /// Script files, or directories of .hamstory files
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },

    /// Play a single script in the terminal
    Play {
        /// Path to the script file
        file: PathBuf,

        /// Initial variables (key=value)
        #[arg(long, short = 'D', value_parser = parse_key_val)]
        vars: Vec<(String, serde_json::Value)>,
    },

    /// Play a story graph described by a YAML manifest
    Graph {
        /// Path to the manifest
        manifest: PathBuf,

        /// Graph to start from (defaults to the first one in the manifest)
        #[arg(long)]
        root: Option<String>,

        /// Initial variables (key=value)
        #[arg(long, short = 'D', value_parser = parse_key_val)]
        vars: Vec<(String, serde_json::Value)>,
    },
}

fn parse_key_val(s: &str) -> Result<(String, serde_json::Value), String> {
    let pos = s.find('=').ok_or_else(|| format!("invalid KEY=value: no `=` found in `{}`", s))?;
    let key = s[..pos].to_string();
    let val_str = &s[pos + 1..];
    // Try parsing as JSON, otherwise treat as string
    let val = serde_json::from_str(val_str).unwrap_or_else(|_| serde_json::Value::String(val_str.to_string()));
    Ok((key, val))
}

/// Prints dialogue to stdout.
#[derive(Default)]
struct Console {
    speaker: Option<String>,
}

impl Presenter for Console {
    fn set_character(&mut self, character: &Character, extra: &str) {
        self.speaker = Some(if extra.is_empty() {
            character.name.clone()
        } else {
            format!("{} ({})", character.name, extra)
        });
    }

    fn clear_character(&mut self) {
        self.speaker = None;
    }

    fn set_text(&mut self, text: &str) {
        match &self.speaker {
            Some(speaker) => println!("{speaker}: {text}"),
            None => println!("{text}"),
        }
    }

    fn show_menu(&mut self, options: &[MenuOption]) {
        for (i, option) in options.iter().enumerate() {
            println!("  {}. {}", i + 1, option.text);
        }
    }

    fn clear_menu(&mut self) {}

    fn set_visible(&mut self, visible: bool) {
        if !visible {
            println!("-- end --");
        }
    }
}

/// Feeds stdin to the executor until the story finishes or input ends.
/// Enter continues; a number picks a menu option.
async fn interact<D: Director>(executor: &mut Executor<D>) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while executor.status() == RunStatus::Suspended {
        let Some(line) = lines.next_line().await? else {
            info!("input closed, stopping");
            break;
        };

        match executor.active_menu().map(|options| options.len()) {
            Some(count) => match line.trim().parse::<usize>() {
                Ok(n) if (1..=count).contains(&n) => executor.choose(n - 1)?,
                _ => println!("choose 1-{count}"),
            },
            None => executor.proceed()?,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Check { paths } => {
            let compiler = ScriptCompiler::new();
            let mut failed = 0;

            for path in paths {
                let files = if path.is_dir() { script_files(&path)? } else { vec![path] };
                for file in files {
                    let (name, text) = load_script(&file)?;
                    match compiler.compile(&name, &text) {
                        Ok(script) => {
                            for warning in script.warnings() {
                                println!("warning: {warning}");
                            }
                            println!("ok: {} ({} sentences)", file.display(), script.len());
                        }
                        Err(e) => {
                            error!("{}", e);
                            println!("error: {e}");
                            failed += 1;
                        }
                    }
                }
            }

            if failed > 0 {
                return Err(anyhow!("{} script(s) failed to compile", failed));
            }
        }

        Commands::Play { file, vars } => {
            let (name, text) = load_script(&file)?;
            let script = ScriptCompiler::new()
                .compile(&name, &text)
                .with_context(|| format!("this dialogue cannot be shown: {}", file.display()))?;

            let data: MemoryData = vars.into_iter().collect();
            let mut executor = Executor::new(SingleScript::by_name(), Console::default(), data);
            executor.execute(script)?;
            interact(&mut executor).await?;
        }

        Commands::Graph { manifest, root, vars } => {
            let library = load_library(&manifest)?;
            let root = match &root {
                Some(name) => library.by_name(name),
                None => library.graphs().next(),
            }
            .ok_or_else(|| anyhow!("no graph to start from in {}", manifest.display()))?
            .id();

            let chain = Chain::build(&library, root)?;
            let data: MemoryData = vars.into_iter().collect();
            let mut executor = Executor::new(ChainDirector::new(chain), Console::default(), data);
            executor.start()?;
            interact(&mut executor).await?;

            if executor.status() != RunStatus::Finished {
                warn!("story stopped before its end");
            }
        }
    }

    Ok(())
}
