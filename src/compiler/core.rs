use std::collections::HashMap;

use indexmap::IndexSet;
use tracing::{debug, warn};

use crate::compiler::parsers::{self, ParserKind, SentenceParser};
use crate::compiler::say::SayParser;
use crate::error::{CompileError, Diagnostic, ParseErrorKind};
use crate::nodes::{Script, Sentence};

/// Line-based script compiler with a keyword/prefix parser registry.
pub struct ScriptCompiler {
    keywords: HashMap<String, Box<dyn SentenceParser>>,
    prefixes: Vec<Box<dyn SentenceParser>>,
    fallback: Box<dyn SentenceParser>,
}

impl Default for ScriptCompiler {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptCompiler {
    /// Compiler with every built-in keyword and prefix registered.
    pub fn new() -> Self {
        let mut compiler = Self::empty();
        for parser in parsers::builtin() {
            compiler.register(parser);
        }
        compiler
    }

    /// Compiler that only understands dialogue lines.
    pub fn empty() -> Self {
        Self {
            keywords: HashMap::new(),
            prefixes: Vec::new(),
            fallback: Box::new(SayParser),
        }
    }

    pub fn register(&mut self, parser: Box<dyn SentenceParser>) {
        match parser.kind() {
            ParserKind::Keyword => {
                let key = parser.header().to_lowercase();
                if self.keywords.insert(key, parser).is_some() {
                    debug!("keyword parser replaced");
                }
            }
            ParserKind::Prefix => self.prefixes.push(parser),
        }
    }

    pub fn with_parser(mut self, parser: Box<dyn SentenceParser>) -> Self {
        self.register(parser);
        self
    }

    /// Replaces the parser used for lines no keyword or prefix claims.
    pub fn with_fallback(mut self, parser: Box<dyn SentenceParser>) -> Self {
        self.fallback = parser;
        self
    }

    pub fn compile(&self, source_name: &str, text: &str) -> Result<Script, CompileError> {
        let mut program = Program::new(source_name);

        for (number, raw) in text.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() {
                continue;
            }
            program.line = number + 1;

            self.compile_line(line, &mut program)
                .map_err(|kind| program.error(kind))?;
        }

        program.finish()
    }

    fn compile_line(&self, line: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        if let Some(rest) = line.strip_prefix('[') {
            let close = rest.find(']').ok_or(ParseErrorKind::UnclosedBracket)?;
            let keyword = &rest[..close];
            let parser = self
                .keywords
                .get(&keyword.to_lowercase())
                .ok_or_else(|| ParseErrorKind::UnknownKeyword(keyword.to_string()))?;
            return parser.parse(rest[close + 1..].trim(), program);
        }

        let matched: Vec<&dyn SentenceParser> = self
            .prefixes
            .iter()
            .map(|p| p.as_ref())
            .filter(|p| p.matches(line))
            .collect();

        match matched.split_first() {
            Some((first, others)) => {
                if !others.is_empty() {
                    let names: Vec<&str> = others.iter().map(|p| p.header()).collect();
                    program.warn(format!(
                        "line matches several prefix parsers, using '{}' over {:?}",
                        first.header(),
                        names
                    ));
                }
                first.parse(first.strip(line).trim(), program)
            }
            None => self.fallback.parse(line, program),
        }
    }
}

/// The program under construction, handed to every parser.
pub struct Program<'a> {
    source_name: &'a str,
    line: usize,
    sentences: Vec<Sentence>,
    lines: Vec<usize>,
    characters: IndexSet<String>,
    jumps: IndexSet<String>,
    warnings: Vec<Diagnostic>,
}

impl<'a> Program<'a> {
    fn new(source_name: &'a str) -> Self {
        Self {
            source_name,
            line: 0,
            sentences: Vec::new(),
            lines: Vec::new(),
            characters: IndexSet::new(),
            jumps: IndexSet::new(),
            warnings: Vec::new(),
        }
    }

    pub fn source_name(&self) -> &str {
        self.source_name
    }

    /// 1-based line currently being compiled.
    pub fn line(&self) -> usize {
        self.line
    }

    /// Appends a sentence and returns its index.
    pub fn push(&mut self, sentence: Sentence) -> usize {
        self.sentences.push(sentence);
        self.lines.push(self.line);
        self.sentences.len() - 1
    }

    /// Index the next pushed sentence will get.
    pub fn len(&self) -> usize {
        self.sentences.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sentences.is_empty()
    }

    pub fn sentence_mut(&mut self, index: usize) -> Option<&mut Sentence> {
        self.sentences.get_mut(index)
    }

    /// Nearest already emitted sentence, scanning backward from the last one,
    /// that satisfies `predicate`.
    pub fn search_back(&self, predicate: impl Fn(&Sentence) -> bool) -> Option<usize> {
        self.sentences.iter().rposition(predicate)
    }

    pub fn register_character(&mut self, name: &str) {
        self.characters.insert(name.to_string());
    }

    pub fn has_character(&self, name: &str) -> bool {
        self.characters.contains(name)
    }

    pub fn register_jump(&mut self, label: &str) {
        self.jumps.insert(label.to_string());
    }

    pub fn warn(&mut self, message: impl Into<String>) {
        let message = message.into();
        warn!(source = %self.source_name, line = self.line, "{}", message);
        self.warnings.push(Diagnostic {
            source_name: self.source_name.to_string(),
            line: self.line,
            message,
        });
    }

    fn error(&self, kind: ParseErrorKind) -> CompileError {
        CompileError {
            source_name: self.source_name.to_string(),
            line: self.line,
            kind,
        }
    }

    fn finish(mut self) -> Result<Script, CompileError> {
        let unclosed: Vec<(usize, String)> = self
            .sentences
            .iter()
            .zip(&self.lines)
            .filter(|(sentence, _)| sentence.is_open())
            .map(|(sentence, line)| (*line, sentence.to_string()))
            .collect();

        for (line, sentence) in unclosed {
            self.line = line;
            self.warn(format!("{sentence} is never closed, add a '/' after its block"));
        }

        Ok(Script::new(
            self.source_name.to_string(),
            self.sentences,
            self.characters,
            self.jumps,
            self.warnings,
        ))
    }
}
