use crate::compiler::core::Program;
use crate::error::ParseErrorKind;
use crate::nodes::{Else, ElseIf, If, Jump, Menu, MenuItem, Sentence};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParserKind {
    /// `[Header] content`, matched case-insensitively.
    Keyword,
    /// A line starting with the header literal.
    Prefix,
}

/// 语句解析器接口：每个关键字或前缀对应一个实现
pub trait SentenceParser: Send + Sync {
    fn header(&self) -> &str;

    fn kind(&self) -> ParserKind;

    fn matches(&self, line: &str) -> bool {
        let header = self.header();
        line.get(..header.len())
            .is_some_and(|start| start.eq_ignore_ascii_case(header))
    }

    /// Content handed to `parse` for a line this prefix parser matched.
    fn strip<'l>(&self, line: &'l str) -> &'l str {
        line.get(self.header().len()..).unwrap_or("")
    }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind>;
}

pub fn builtin() -> Vec<Box<dyn SentenceParser>> {
    vec![
        Box::new(CharParser),
        Box::new(CloseParser),
        Box::new(MenuParser),
        Box::new(MenuItemParser),
        Box::new(IfParser),
        Box::new(ElifParser),
        Box::new(ElseParser),
        Box::new(JumpParser),
    ]
}

fn reject_content(header: &str, content: &str, program: &mut Program) {
    if !content.is_empty() {
        program.warn(format!("text after [{header}] is ignored: '{content}'"));
    }
}

fn open_if(program: &Program) -> Option<usize> {
    program.search_back(|s| matches!(s, Sentence::If(stn) if stn.block.is_open()))
}

pub struct CharParser;

impl SentenceParser for CharParser {
    fn header(&self) -> &str { "Char" }
    fn kind(&self) -> ParserKind { ParserKind::Keyword }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        for name in content.split(',').map(str::trim).filter(|n| !n.is_empty()) {
            program.register_character(name);
        }
        Ok(())
    }
}

pub struct CloseParser;

impl SentenceParser for CloseParser {
    fn header(&self) -> &str { "/" }
    fn kind(&self) -> ParserKind { ParserKind::Prefix }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        reject_content("/", content, program);
        let opener = program.search_back(Sentence::is_open);
        let at = program.push(Sentence::Close);

        match opener.and_then(|i| program.sentence_mut(i)).and_then(Sentence::block_mut) {
            Some(block) => block.close(at),
            None => program.warn("this '/' has no open block to close"),
        }
        Ok(())
    }
}

pub struct MenuParser;

impl SentenceParser for MenuParser {
    fn header(&self) -> &str { "Menu" }
    fn kind(&self) -> ParserKind { ParserKind::Keyword }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        reject_content(self.header(), content, program);
        program.push(Sentence::Menu(Menu::default()));
        Ok(())
    }
}

pub struct MenuItemParser;

impl SentenceParser for MenuItemParser {
    fn header(&self) -> &str { "-" }
    fn kind(&self) -> ParserKind { ParserKind::Prefix }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        if content.is_empty() {
            return Err(ParseErrorKind::EmptyMenuOption);
        }

        let menu_at = program
            .search_back(|s| matches!(s, Sentence::Menu(menu) if menu.block.is_open()))
            .ok_or_else(|| ParseErrorKind::OptionOutsideMenu(content.to_string()))?;

        // The option's body starts right after its own marker.
        let target = program.len() + 1;
        if let Some(Sentence::Menu(menu)) = program.sentence_mut(menu_at) {
            menu.add_option(content, target);
        }

        program.push(Sentence::MenuItem(MenuItem {
            text: content.to_string(),
            menu: menu_at,
        }));
        Ok(())
    }
}

pub struct IfParser;

impl SentenceParser for IfParser {
    fn header(&self) -> &str { "If" }
    fn kind(&self) -> ParserKind { ParserKind::Keyword }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        if content.is_empty() {
            return Err(ParseErrorKind::EmptyCondition(self.header().to_string()));
        }
        program.push(Sentence::If(If::new(content)));
        Ok(())
    }
}

pub struct ElifParser;

impl SentenceParser for ElifParser {
    fn header(&self) -> &str { "Elif" }
    fn kind(&self) -> ParserKind { ParserKind::Keyword }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        if content.is_empty() {
            return Err(ParseErrorKind::EmptyCondition(self.header().to_string()));
        }

        let owner = open_if(program).ok_or_else(|| ParseErrorKind::NoOpenIf(self.header().to_string()))?;
        let target = program.len() + 1;
        if let Some(Sentence::If(stn)) = program.sentence_mut(owner) {
            stn.add_branch(content, target)?;
        }

        program.push(Sentence::ElseIf(ElseIf {
            condition: content.to_string(),
            owner,
        }));
        Ok(())
    }
}

pub struct ElseParser;

impl SentenceParser for ElseParser {
    fn header(&self) -> &str { "Else" }
    fn kind(&self) -> ParserKind { ParserKind::Keyword }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        reject_content(self.header(), content, program);

        let owner = open_if(program).ok_or_else(|| ParseErrorKind::NoOpenIf(self.header().to_string()))?;
        let target = program.len() + 1;
        if let Some(Sentence::If(stn)) = program.sentence_mut(owner) {
            stn.set_else(target)?;
        }

        program.push(Sentence::Else(Else { owner }));
        Ok(())
    }
}

pub struct JumpParser;

impl SentenceParser for JumpParser {
    fn header(&self) -> &str { "Jump" }
    fn kind(&self) -> ParserKind { ParserKind::Keyword }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        let label = if content.is_empty() {
            None
        } else {
            program.register_jump(content);
            Some(content.to_string())
        };
        program.push(Sentence::Jump(Jump { label }));
        Ok(())
    }
}
