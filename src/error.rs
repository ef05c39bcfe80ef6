use std::fmt;

use thiserror::Error;
use uuid::Uuid;

/// What went wrong on a single script line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("unknown keyword [{0}]")]
    UnknownKeyword(String),

    #[error("square bracket is never closed")]
    UnclosedBracket,

    #[error("[{0}] requires a condition")]
    EmptyCondition(String),

    #[error("menu option has no text")]
    EmptyMenuOption,

    #[error("menu option \"{0}\" must be placed inside a [Menu]")]
    OptionOutsideMenu(String),

    #[error("[{0}] must follow an open [If] or [Elif]")]
    NoOpenIf(String),

    #[error("[{0}] cannot follow the [Else] of the same [If]")]
    ElseAlreadyDefined(String),

    #[error("{0}")]
    Custom(String),
}

/// Fatal compile error. Aborts compilation of one script.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{source_name} line {line}: {kind}")]
pub struct CompileError {
    pub source_name: String,
    /// 1-based line number.
    pub line: usize,
    pub kind: ParseErrorKind,
}

/// Non-fatal compile diagnostic, kept on the compiled script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub source_name: String,
    pub line: usize,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} line {}: {}", self.source_name, self.line, self.message)
    }
}

/// Errors raised while a script is executing.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RuntimeError {
    #[error("character '{key}' is not bound (at #{index} {sentence})")]
    UnknownCharacter {
        key: String,
        index: usize,
        sentence: String,
    },

    #[error("no comparison operator found in '{0}' (supported: == != >= <= > <)")]
    UnknownOperator(String),

    #[error("unbalanced braces in '{0}'")]
    UnbalancedBraces(String),

    #[error("there is no open menu to choose from")]
    NoActiveMenu,

    #[error("menu has {available} options, option {chosen} does not exist")]
    InvalidChoice { chosen: usize, available: usize },

    #[error("nothing is executing")]
    NotRunning,

    #[error("{message} (at #{index} {sentence})")]
    Command {
        message: String,
        index: usize,
        sentence: String,
    },

    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// Errors raised while building or walking a story chain.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChainError {
    #[error("graph {0} is not part of the library")]
    MissingGraph(Uuid),

    #[error("script of node {node} failed to compile")]
    Compile {
        node: Uuid,
        #[source]
        source: CompileError,
    },

    #[error("current chain node is not a story node")]
    NotAStory,

    #[error("character '{0}' is not configured on the current story node")]
    UnknownCharacter(String),

    #[error("subgraph calls nested deeper than {0}")]
    CallDepthExceeded(usize),

    #[error("no story node reached after {0} transfers")]
    NoProgress(usize),
}

/// Errors raised by graph editing operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("node {0} is not part of the graph")]
    UnknownNode(Uuid),

    #[error("output port '{port}' of node {node} is already connected")]
    PortOccupied { node: Uuid, port: String },

    #[error("a graph has exactly one start and one end node")]
    DuplicateTerminal,

    #[error("no node is named '{0}'")]
    UnknownAlias(String),
}
