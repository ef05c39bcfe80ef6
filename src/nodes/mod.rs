//! Compiled instruction set.
//!
//! A [`Script`] is a flat list of [`Sentence`]s. Block openers (`Menu`, `If`)
//! carry a [`Block`] that the compiler closes once their closer is found; the
//! executor keeps the indices of currently open blocks on its scope stack.

pub mod common;
pub mod flow;

use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;

use crate::error::{Diagnostic, RuntimeError};
use crate::runtime::syscall::Syscall;

pub use common::{Jump, Say};
pub use flow::{Else, ElseIf, If, IfBranch, Menu, MenuItem, MenuOption};

/// Resolution data shared by every block opener.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Block {
    exit: Option<usize>,
}

impl Block {
    pub fn is_open(&self) -> bool {
        self.exit.is_none()
    }

    pub fn close(&mut self, exit: usize) {
        self.exit = Some(exit);
    }

    /// Index of the closer, or one past `own` when the block was never closed.
    pub fn exit_point(&self, own: usize) -> usize {
        self.exit.unwrap_or(own + 1)
    }
}

/// Extension instruction emitted by a registered parser.
pub trait Command: Send + Sync + fmt::Debug {
    fn name(&self) -> &str;
    fn execute(&self, syscall: &mut dyn Syscall) -> Result<(), RuntimeError>;
}

#[derive(Debug, Clone)]
pub enum Sentence {
    Say(Say),
    Close,
    Menu(Menu),
    MenuItem(MenuItem),
    If(If),
    ElseIf(ElseIf),
    Else(Else),
    Jump(Jump),
    Custom(Arc<dyn Command>),
}

impl Sentence {
    pub fn block(&self) -> Option<&Block> {
        match self {
            Sentence::Menu(menu) => Some(&menu.block),
            Sentence::If(stn) => Some(&stn.block),
            _ => None,
        }
    }

    pub fn block_mut(&mut self) -> Option<&mut Block> {
        match self {
            Sentence::Menu(menu) => Some(&mut menu.block),
            Sentence::If(stn) => Some(&mut stn.block),
            _ => None,
        }
    }

    /// True for block openers that have not met their closer yet.
    pub fn is_open(&self) -> bool {
        self.block().is_some_and(Block::is_open)
    }

    pub fn execute(&self, syscall: &mut dyn Syscall) -> Result<(), RuntimeError> {
        match self {
            Sentence::Say(say) => say.execute(syscall),
            Sentence::Close => {
                common::close(syscall);
                Ok(())
            }
            Sentence::Menu(menu) => {
                menu.execute(syscall);
                Ok(())
            }
            Sentence::If(stn) => stn.execute(syscall),
            Sentence::Jump(jump) => jump.execute(syscall),
            Sentence::Custom(command) => command.execute(syscall),
            // Only reachable as jump targets; inert otherwise.
            Sentence::MenuItem(_) | Sentence::ElseIf(_) | Sentence::Else(_) => {
                syscall.advance();
                Ok(())
            }
        }
    }

    /// Called on the innermost open scope (at index `own`) before the sentence
    /// at `current` executes. Returns the index control must be moved to.
    pub fn on_advance_inside(&self, own: usize, current: &Sentence) -> Option<usize> {
        match self {
            Sentence::Menu(menu) => menu.on_advance_inside(own, current),
            Sentence::If(stn) => stn.on_advance_inside(own, current),
            _ => None,
        }
    }
}

impl PartialEq for Sentence {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Sentence::Say(a), Sentence::Say(b)) => a == b,
            (Sentence::Close, Sentence::Close) => true,
            (Sentence::Menu(a), Sentence::Menu(b)) => a == b,
            (Sentence::MenuItem(a), Sentence::MenuItem(b)) => a == b,
            (Sentence::If(a), Sentence::If(b)) => a == b,
            (Sentence::ElseIf(a), Sentence::ElseIf(b)) => a == b,
            (Sentence::Else(a), Sentence::Else(b)) => a == b,
            (Sentence::Jump(a), Sentence::Jump(b)) => a == b,
            (Sentence::Custom(a), Sentence::Custom(b)) => {
                a.name() == b.name() && format!("{a:?}") == format!("{b:?}")
            }
            _ => false,
        }
    }
}

impl fmt::Display for Sentence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sentence::Say(say) if say.extra.is_empty() => write!(f, "{}: {}", say.speaker, say.text),
            Sentence::Say(say) => write!(f, "{}({}): {}", say.speaker, say.extra, say.text),
            Sentence::Close => write!(f, "/"),
            Sentence::Menu(_) => write!(f, "[Menu]"),
            Sentence::MenuItem(item) => write!(f, "- {}", item.text),
            Sentence::If(stn) => write!(f, "[If] {}", stn.condition),
            Sentence::ElseIf(stn) => write!(f, "[Elif] {}", stn.condition),
            Sentence::Else(_) => write!(f, "[Else]"),
            Sentence::Jump(Jump { label: Some(label) }) => write!(f, "[Jump] {label}"),
            Sentence::Jump(Jump { label: None }) => write!(f, "[Jump]"),
            Sentence::Custom(command) => write!(f, "[{}]", command.name()),
        }
    }
}

/// Immutable result of compiling one script source.
#[derive(Debug, Clone, PartialEq)]
pub struct Script {
    name: String,
    sentences: Vec<Sentence>,
    characters: IndexSet<String>,
    jumps: IndexSet<String>,
    warnings: Vec<Diagnostic>,
}

impl Script {
    pub(crate) fn new(
        name: String,
        sentences: Vec<Sentence>,
        characters: IndexSet<String>,
        jumps: IndexSet<String>,
        warnings: Vec<Diagnostic>,
    ) -> Self {
        Self {
            name,
            sentences,
            characters,
            jumps,
            warnings,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn sentence(&self, index: usize) -> Option<&Sentence> {
        self.sentences.get(index)
    }

    pub fn sentences(&self) -> &[Sentence] {
        &self.sentences
    }

    /// Declared characters in declaration order.
    pub fn characters(&self) -> &IndexSet<String> {
        &self.characters
    }

    pub fn character_index(&self, key: &str) -> Option<usize> {
        self.characters.get_index_of(key)
    }

    /// Labels of every `[Jump] label` in the script, in encounter order.
    pub fn jumps(&self) -> &IndexSet<String> {
        &self.jumps
    }

    /// Non-fatal diagnostics reported while compiling.
    pub fn warnings(&self) -> &[Diagnostic] {
        &self.warnings
    }
}
