use tracing::debug;

use crate::compiler::core::Program;
use crate::compiler::parsers::{ParserKind, SentenceParser};
use crate::error::ParseErrorKind;
use crate::nodes::{Say, Sentence};

/// Dialogue line: `Speaker(extra): text`, `Speaker: text` or `: narration`.
pub struct SayParser;

impl SentenceParser for SayParser {
    fn header(&self) -> &str { "" }
    fn kind(&self) -> ParserKind { ParserKind::Prefix }

    fn matches(&self, line: &str) -> bool {
        line.contains(':')
    }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        let Some((host, text)) = content.split_once(':') else {
            debug!(source = %program.source_name(), line = program.line(), "line without speaker separator ignored: {}", content);
            return Ok(());
        };

        let (speaker, extra) = split_extra(host.trim(), program);

        if !speaker.is_empty() && !program.has_character(speaker) {
            program.warn(format!("character '{speaker}' is not declared, add it to a [Char] line"));
        }

        program.push(Sentence::Say(Say::new(speaker, text.trim(), extra)));
        Ok(())
    }
}

/// `Name(extra)` into its parts. Unbalanced parentheses only warn.
fn split_extra<'l>(host: &'l str, program: &mut Program) -> (&'l str, &'l str) {
    if let Some(inner) = host.strip_suffix(')') {
        return match inner.find('(') {
            Some(open) => (inner[..open].trim(), inner[open + 1..].trim()),
            None => {
                program.warn(format!("speaker '{host}' has ')' without a matching '('"));
                (host, "")
            }
        };
    }

    if host.contains('(') {
        program.warn(format!("speaker '{host}' has '(' without a matching ')'"));
    }
    (host, "")
}
