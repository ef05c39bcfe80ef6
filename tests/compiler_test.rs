use std::sync::Arc;

use hamstory::compiler::core::{Program, ScriptCompiler};
use hamstory::compiler::parsers::{ParserKind, SentenceParser};
use hamstory::error::{ParseErrorKind, RuntimeError};
use hamstory::nodes::{Command, Jump, Say, Sentence};
use hamstory::runtime::context::MemoryData;
use hamstory::runtime::director::SingleScript;
use hamstory::runtime::executor::{RunStatus, SingleExecutor};
use hamstory::runtime::syscall::Syscall;
use hamstory::runtime::visual::Transcript;

fn compile(text: &str) -> hamstory::nodes::Script {
    ScriptCompiler::new().compile("test", text).expect("Compilation failed")
}

fn compile_err(text: &str) -> hamstory::error::CompileError {
    ScriptCompiler::new()
        .compile("test", text)
        .expect_err("Compilation should fail")
}

#[test]
fn test_single_say_line() {
    let script = compile("[Char] A\nA: Hi!\n");

    assert_eq!(script.len(), 1);
    assert_eq!(script.sentence(0), Some(&Sentence::Say(Say::new("A", "Hi!", ""))));
    assert_eq!(script.characters().iter().collect::<Vec<_>>(), vec!["A"]);
    assert!(script.jumps().is_empty());
    assert!(script.warnings().is_empty());
}

#[test]
fn test_menu_options_and_exit() {
    let script = compile("[Menu]\n- One\n- Two\n/\n");

    assert_eq!(script.len(), 4);
    let Some(Sentence::Menu(menu)) = script.sentence(0) else {
        panic!("expected a menu at index 0");
    };
    let options: Vec<(&str, usize)> = menu.options().iter().map(|o| (o.text.as_str(), o.target)).collect();
    // Each option starts right after its own marker.
    assert_eq!(options, vec![("One", 2), ("Two", 3)]);
    assert_eq!(menu.block.exit_point(0), 3);

    assert!(matches!(script.sentence(1), Some(Sentence::MenuItem(item)) if item.menu == 0 && item.text == "One"));
    assert!(matches!(script.sentence(2), Some(Sentence::MenuItem(item)) if item.menu == 0 && item.text == "Two"));
    assert_eq!(script.sentence(3), Some(&Sentence::Close));
}

#[test]
fn test_if_elif_else_targets() {
    let script = compile(
        "[If] {x}==1\n: one\n[Elif] {x}==2\n: two\n[Elif] {x}==3\n: three\n[Else]\n: other\n/\n: after",
    );

    let Some(Sentence::If(stn)) = script.sentence(0) else {
        panic!("expected an if at index 0");
    };
    let branches: Vec<(&str, usize)> = stn.branches().iter().map(|b| (b.condition.as_str(), b.target)).collect();
    assert_eq!(branches, vec![("{x}==2", 3), ("{x}==3", 5)]);
    assert_eq!(stn.else_target(), Some(7));
    assert_eq!(stn.block.exit_point(0), 8);
    assert_eq!(script.sentence(8), Some(&Sentence::Close));
}

#[test]
fn test_exit_points_follow_their_openers() {
    let script = compile("[Menu]\n- a\n[If] {x}==1\n: in\n/\n: body\n/\n: tail");

    for (index, sentence) in script.sentences().iter().enumerate() {
        if let Some(block) = sentence.block() {
            let exit = block.exit_point(index);
            assert!(exit > index);
            assert_eq!(script.sentence(exit), Some(&Sentence::Close));
        }
    }

    let Some(Sentence::Menu(menu)) = script.sentence(0) else {
        panic!("expected a menu");
    };
    assert_eq!(menu.block.exit_point(0), 6);
    let Some(Sentence::If(stn)) = script.sentence(2) else {
        panic!("expected an if");
    };
    assert_eq!(stn.block.exit_point(2), 4);
}

#[test]
fn test_unclosed_block_warns_and_exits_after_itself() {
    let script = compile("[If] {x}==1\n: never closed");

    let Some(Sentence::If(stn)) = script.sentence(0) else {
        panic!("expected an if");
    };
    assert!(stn.block.is_open());
    assert_eq!(stn.block.exit_point(0), 1);
    assert_eq!(script.warnings().len(), 1);
    assert_eq!(script.warnings()[0].line, 1);
}

#[test]
fn test_unknown_keyword_is_fatal() {
    let err = compile_err("[Foo] bar");
    assert_eq!(err.kind, ParseErrorKind::UnknownKeyword("Foo".to_string()));
    assert_eq!(err.line, 1);
    assert_eq!(err.source_name, "test");
}

#[test]
fn test_option_outside_menu_is_fatal() {
    let err = compile_err("- lonely");
    assert_eq!(err.kind, ParseErrorKind::OptionOutsideMenu("lonely".to_string()));
}

#[test]
fn test_fatal_errors_report_line_numbers() {
    let err = compile_err("[Char] A\n\nA: hi\n[Elif] {x}==1");
    assert_eq!(err.line, 4);
    assert_eq!(err.kind, ParseErrorKind::NoOpenIf("Elif".to_string()));

    assert_eq!(compile_err("[If]").kind, ParseErrorKind::EmptyCondition("If".to_string()));
    assert_eq!(compile_err("[Menu\n").kind, ParseErrorKind::UnclosedBracket);
    assert_eq!(compile_err("[Menu]\n-").kind, ParseErrorKind::EmptyMenuOption);
    assert_eq!(compile_err("[Else]").kind, ParseErrorKind::NoOpenIf("Else".to_string()));
}

#[test]
fn test_else_only_once() {
    let err = compile_err("[If] {a}==1\n[Else]\n[Else]\n/");
    assert_eq!(err.kind, ParseErrorKind::ElseAlreadyDefined("Else".to_string()));
    assert_eq!(err.line, 3);

    let err = compile_err("[If] {a}==1\n[Else]\n[Elif] {a}==2\n/");
    assert_eq!(err.kind, ParseErrorKind::ElseAlreadyDefined("Elif".to_string()));
}

#[test]
fn test_keywords_are_case_insensitive() {
    let script = compile("[CHAR] A\n[menu]\n- go\n/\n[jump] shop");
    assert!(script.characters().contains("A"));
    assert!(matches!(script.sentence(0), Some(Sentence::Menu(_))));
    assert_eq!(script.sentence(3), Some(&Sentence::Jump(Jump { label: Some("shop".to_string()) })));
}

#[test]
fn test_declarations_are_ordered_sets() {
    let script = compile("[Char] B, A\n[Char] A, C\n[Jump] x\n[Jump] y\n[Jump] x\n[Jump]");

    assert_eq!(script.characters().iter().collect::<Vec<_>>(), vec!["B", "A", "C"]);
    assert_eq!(script.character_index("C"), Some(2));
    assert_eq!(script.jumps().iter().collect::<Vec<_>>(), vec!["x", "y"]);
    assert_eq!(script.len(), 4);
    assert_eq!(script.sentence(3), Some(&Sentence::Jump(Jump { label: None })));
}

#[test]
fn test_non_fatal_diagnostics() {
    // Undeclared speaker, stray closer and trailing text on [Menu].
    let script = compile("Ghost: boo\n/\n[Menu] extra\n- a\n/");

    assert_eq!(script.len(), 5);
    let lines: Vec<usize> = script.warnings().iter().map(|w| w.line).collect();
    assert_eq!(lines, vec![1, 2, 3]);
}

#[test]
fn test_blank_lines_and_indentation_are_ignored() {
    let a = compile("[Char] A\n[Menu]\n- x\nA: one\n/");
    let b = compile("\n  [Char] A\n\n[Menu]\n    - x\n        A: one\n\t/\n\n");
    assert_eq!(a.sentences(), b.sentences());
}

#[test]
fn test_recompilation_is_idempotent() {
    let text = "[Char] A, B\n[If] {x}>1\nA: big\n[Else]\nB: small\n/\n[Menu]\n- go\n[Jump] shop\n/";
    let compiler = ScriptCompiler::new();

    let first = compiler.compile("same", text).unwrap();
    let second = compiler.compile("same", text).unwrap();
    assert_eq!(first, second);
}

#[derive(Debug)]
struct Wait(u32);

impl Command for Wait {
    fn name(&self) -> &str {
        "Wait"
    }

    fn execute(&self, syscall: &mut dyn Syscall) -> Result<(), RuntimeError> {
        if self.0 == 0 {
            return Err(RuntimeError::Command {
                message: "cannot wait for 0 ms".to_string(),
                index: syscall.index(),
                sentence: format!("[{}] {}", self.name(), self.0),
            });
        }
        syscall.advance();
        Ok(())
    }
}

struct WaitParser;

impl SentenceParser for WaitParser {
    fn header(&self) -> &str { "Wait" }
    fn kind(&self) -> ParserKind { ParserKind::Keyword }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        let ms = content
            .parse()
            .map_err(|_| ParseErrorKind::Custom(format!("'{content}' is not a duration")))?;
        program.push(Sentence::Custom(Arc::new(Wait(ms))));
        Ok(())
    }
}

struct ShoutParser;

impl SentenceParser for ShoutParser {
    fn header(&self) -> &str { "!" }
    fn kind(&self) -> ParserKind { ParserKind::Prefix }

    fn parse(&self, content: &str, program: &mut Program) -> Result<(), ParseErrorKind> {
        program.push(Sentence::Say(Say::new("", content.to_uppercase(), "")));
        Ok(())
    }
}

struct LoudShoutParser;

impl SentenceParser for LoudShoutParser {
    fn header(&self) -> &str { "!!" }
    fn kind(&self) -> ParserKind { ParserKind::Prefix }

    fn parse(&self, _content: &str, _program: &mut Program) -> Result<(), ParseErrorKind> {
        Ok(())
    }
}

#[test]
fn test_registered_parsers() {
    let compiler = ScriptCompiler::new()
        .with_parser(Box::new(WaitParser))
        .with_parser(Box::new(ShoutParser));

    let script = compiler.compile("ext", "[wait] 300\n! run").unwrap();
    assert_eq!(script.len(), 2);
    assert!(matches!(script.sentence(0), Some(Sentence::Custom(c)) if c.name() == "Wait"));
    assert_eq!(script.sentence(1), Some(&Sentence::Say(Say::new("", "RUN", ""))));

    let err = compiler.compile("ext", "[Wait] soon").unwrap_err();
    assert_eq!(err.kind, ParseErrorKind::Custom("'soon' is not a duration".to_string()));
}

#[test]
fn test_custom_command_runs_and_reports_errors() {
    let compiler = ScriptCompiler::new().with_parser(Box::new(WaitParser));
    let transcript = Transcript::new();
    let mut exec = SingleExecutor::new(SingleScript::by_name(), transcript.clone(), MemoryData::new());

    exec.execute(compiler.compile("ext", "[Wait] 10\n: done").unwrap()).unwrap();
    assert_eq!(transcript.lines(), vec!["done"]);

    exec.execute(compiler.compile("ext", ": first\n[Wait] 0").unwrap()).unwrap();
    let err = exec.proceed().unwrap_err();
    assert_eq!(
        err,
        RuntimeError::Command {
            message: "cannot wait for 0 ms".to_string(),
            index: 1,
            sentence: "[Wait] 0".to_string(),
        }
    );
    assert_eq!(exec.status(), RunStatus::Idle);
}

#[test]
fn test_ambiguous_prefix_uses_first_registered() {
    let compiler = ScriptCompiler::new()
        .with_parser(Box::new(ShoutParser))
        .with_parser(Box::new(LoudShoutParser));

    let script = compiler.compile("ext", "!! hey").unwrap();
    assert_eq!(script.sentence(0), Some(&Sentence::Say(Say::new("", "! HEY", ""))));
    assert_eq!(script.warnings().len(), 1);
}

#[test]
fn test_empty_compiler_only_knows_dialogue() {
    let compiler = ScriptCompiler::empty();
    assert!(compiler.compile("bare", ": hello").is_ok());
    assert_eq!(
        compiler.compile("bare", "[Menu]").unwrap_err().kind,
        ParseErrorKind::UnknownKeyword("Menu".to_string())
    );
}
