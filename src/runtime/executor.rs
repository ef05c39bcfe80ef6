use std::sync::Arc;

use tracing::{debug, error, info};
use uuid::Uuid;

use crate::error::RuntimeError;
use crate::nodes::{Menu, MenuOption, Script, Sentence};
use crate::runtime::context::DataProvider;
use crate::runtime::director::{ChainDirector, Director, SingleScript, Transfer};
use crate::runtime::syscall::Syscall;
use crate::runtime::visual::Presenter;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Nothing loaded, or the last run failed.
    Idle,
    Running,
    /// Waiting for `proceed`, `goto`, `choose` or a jump from the host.
    Suspended,
    Finished,
}

pub type SingleExecutor = Executor<SingleScript>;
pub type GraphExecutor = Executor<ChainDirector>;

/// 脚本执行器
/// A resumable interpreter over one script at a time. Each call runs until a
/// sentence suspends (dialogue, menu) or the story finishes.
pub struct Executor<D: Director> {
    director: D,
    presenter: Box<dyn Presenter>,
    data: Box<dyn DataProvider>,

    script: Option<Arc<Script>>,
    index: usize,
    scopes: Vec<usize>,
    status: RunStatus,
    advanced: bool,
    run_id: Uuid,

    on_finished: Option<Box<dyn FnOnce()>>,
    observers: Vec<Box<dyn FnMut()>>,
}

impl<D: Director> Executor<D> {
    pub fn new(director: D, presenter: impl Presenter + 'static, data: impl DataProvider + 'static) -> Self {
        Self {
            director,
            presenter: Box::new(presenter),
            data: Box::new(data),
            script: None,
            index: 0,
            scopes: Vec::new(),
            status: RunStatus::Idle,
            advanced: false,
            run_id: Uuid::nil(),
            on_finished: None,
            observers: Vec::new(),
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn scope_depth(&self) -> usize {
        self.scopes.len()
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn script(&self) -> Option<&Arc<Script>> {
        self.script.as_ref()
    }

    pub fn director(&self) -> &D {
        &self.director
    }

    pub fn director_mut(&mut self) -> &mut D {
        &mut self.director
    }

    /// Called every time a run finishes.
    pub fn on_story_finished(&mut self, observer: impl FnMut() + 'static) {
        self.observers.push(Box::new(observer));
    }

    /// Starts `script` from its first sentence, abandoning any active run.
    pub fn execute(&mut self, script: impl Into<Arc<Script>>) -> Result<(), RuntimeError> {
        self.begin(None);
        self.load(script.into());
        self.drive()
    }

    /// Like [`execute`](Self::execute); `callback` fires once, when this run finishes.
    pub fn execute_then(
        &mut self,
        script: impl Into<Arc<Script>>,
        callback: impl FnOnce() + 'static,
    ) -> Result<(), RuntimeError> {
        self.begin(Some(Box::new(callback)));
        self.load(script.into());
        self.drive()
    }

    /// Resumes at the next sentence. Continuing past a menu skips its options.
    pub fn proceed(&mut self) -> Result<(), RuntimeError> {
        self.ensure_suspended()?;
        if self.waiting_menu().is_some() {
            self.presenter.clear_menu();
        }
        self.index += 1;
        self.drive()
    }

    /// Resumes at `index`.
    pub fn goto(&mut self, index: usize) -> Result<(), RuntimeError> {
        self.ensure_suspended()?;
        self.index = index;
        self.drive()
    }

    /// Picks an option of the menu the executor is suspended on and resumes
    /// at its body.
    pub fn choose(&mut self, option: usize) -> Result<(), RuntimeError> {
        self.ensure_suspended()?;
        let options = self.active_menu().ok_or(RuntimeError::NoActiveMenu)?;
        let target = options
            .get(option)
            .map(|o| o.target)
            .ok_or(RuntimeError::InvalidChoice {
                chosen: option,
                available: options.len(),
            })?;

        debug!(run_id = %self.run_id, option = option, target = target, "menu option chosen");
        self.presenter.clear_menu();
        self.index = target;
        self.drive()
    }

    /// Options of the menu waiting for a choice. `None` once control has
    /// moved into an option's body.
    pub fn active_menu(&self) -> Option<Vec<MenuOption>> {
        self.waiting_menu().map(|menu| menu.options().to_vec())
    }

    /// The menu at the current index, if it is also the innermost open scope.
    fn waiting_menu(&self) -> Option<&Menu> {
        if self.status != RunStatus::Suspended || self.scopes.last() != Some(&self.index) {
            return None;
        }
        match self.script.as_ref()?.sentence(self.index)? {
            Sentence::Menu(menu) => Some(menu),
            _ => None,
        }
    }

    /// Leaves the current script by label, as a `[Jump] label` would.
    pub fn jump_to(&mut self, label: &str) -> Result<(), RuntimeError> {
        self.ensure_suspended()?;
        let transfer = self.director.jump_to(label)?;
        self.apply_jump(transfer);
        if self.status == RunStatus::Finished {
            return Ok(());
        }
        self.drive()
    }

    pub fn jump_to_next(&mut self) -> Result<(), RuntimeError> {
        self.ensure_suspended()?;
        let transfer = self.director.jump_to_next()?;
        self.apply_jump(transfer);
        if self.status == RunStatus::Finished {
            return Ok(());
        }
        self.drive()
    }

    fn begin(&mut self, callback: Option<Box<dyn FnOnce()>>) {
        if matches!(self.status, RunStatus::Running | RunStatus::Suspended) {
            info!(run_id = %self.run_id, "active run abandoned");
        }
        self.run_id = Uuid::new_v4();
        self.on_finished = callback;
        self.status = RunStatus::Running;
        self.presenter.set_visible(true);
    }

    fn load(&mut self, script: Arc<Script>) {
        debug!(run_id = %self.run_id, script = script.name(), sentences = script.len(), "script loaded");
        self.script = Some(script);
        self.index = 0;
        self.scopes.clear();
        self.advanced = true;
    }

    fn ensure_suspended(&self) -> Result<(), RuntimeError> {
        match self.status {
            RunStatus::Suspended => Ok(()),
            _ => Err(RuntimeError::NotRunning),
        }
    }

    /// Outcome of a jump taken while a script is running.
    fn apply_jump(&mut self, transfer: Transfer) {
        match transfer {
            Transfer::Stay => {
                self.index += 1;
                self.advanced = true;
            }
            Transfer::Execute(script) => self.load(script),
            Transfer::Finish => self.finish(),
        }
    }

    fn drive(&mut self) -> Result<(), RuntimeError> {
        self.status = RunStatus::Running;
        let result = self.run();
        if let Err(e) = &result {
            error!(run_id = %self.run_id, index = self.index, "run aborted: {}", e);
            self.status = RunStatus::Idle;
            self.scopes.clear();
            self.on_finished = None;
        }
        result
    }

    fn run(&mut self) -> Result<(), RuntimeError> {
        while self.status == RunStatus::Running {
            let Some(script) = self.script.clone() else {
                self.finish();
                break;
            };

            let Some(sentence) = script.sentence(self.index) else {
                match self.director.finished()? {
                    Transfer::Execute(next) => self.load(next),
                    Transfer::Stay | Transfer::Finish => self.finish(),
                }
                continue;
            };

            if let Some(&opener) = self.scopes.last() {
                let redirect = script
                    .sentence(opener)
                    .and_then(|scope| scope.on_advance_inside(opener, sentence));
                if let Some(target) = redirect {
                    debug!(run_id = %self.run_id, from = self.index, to = target, "left block at sibling branch");
                    self.index = target;
                    continue;
                }
            }

            self.advanced = false;
            sentence.execute(self)?;

            if !self.advanced && self.status == RunStatus::Running {
                self.status = RunStatus::Suspended;
            }
        }
        Ok(())
    }

    fn finish(&mut self) {
        info!(run_id = %self.run_id, "story finished");
        self.status = RunStatus::Finished;
        self.scopes.clear();
        self.presenter.set_visible(false);

        if let Some(callback) = self.on_finished.take() {
            callback();
        }
        for observer in &mut self.observers {
            observer();
        }
    }

    fn describe_current(&self) -> String {
        self.script
            .as_ref()
            .and_then(|s| s.sentence(self.index))
            .map(ToString::to_string)
            .unwrap_or_default()
    }
}

impl Executor<ChainDirector> {
    /// Rewinds the chain and runs its first story node.
    pub fn start(&mut self) -> Result<(), RuntimeError> {
        self.begin(None);
        let first = self.director.start();
        match first {
            Ok(Transfer::Execute(script)) => {
                self.load(script);
                self.drive()
            }
            Ok(_) => {
                self.finish();
                Ok(())
            }
            Err(e) => {
                self.status = RunStatus::Idle;
                Err(e)
            }
        }
    }
}

impl<D: Director> Syscall for Executor<D> {
    fn index(&self) -> usize {
        self.index
    }

    fn advance(&mut self) {
        self.index += 1;
        self.advanced = true;
    }

    fn goto(&mut self, target: usize) {
        self.index = target;
        self.advanced = true;
    }

    fn jump_to(&mut self, label: &str) -> Result<(), RuntimeError> {
        let transfer = self.director.jump_to(label)?;
        self.apply_jump(transfer);
        Ok(())
    }

    fn jump_to_next(&mut self) -> Result<(), RuntimeError> {
        let transfer = self.director.jump_to_next()?;
        self.apply_jump(transfer);
        Ok(())
    }

    fn push_scope(&mut self, opener: usize) {
        self.scopes.push(opener);
    }

    fn pop_scope(&mut self) -> Option<usize> {
        self.scopes.pop()
    }

    fn set_character(&mut self, key: &str, extra: &str) -> Result<(), RuntimeError> {
        let character = self
            .script
            .as_ref()
            .and_then(|script| self.director.character(script, key))
            .ok_or_else(|| RuntimeError::UnknownCharacter {
                key: key.to_string(),
                index: self.index,
                sentence: self.describe_current(),
            })?;
        self.presenter.set_character(&character, extra);
        Ok(())
    }

    fn clear_character(&mut self) {
        self.presenter.clear_character();
    }

    fn set_text(&mut self, content: &str) -> Result<(), RuntimeError> {
        let text = self.data.render(content)?;
        self.presenter.set_text(&text);
        Ok(())
    }

    fn show_menu(&mut self, options: &[MenuOption]) {
        self.presenter.show_menu(options);
    }

    fn predicate(&mut self, expression: &str) -> Result<bool, RuntimeError> {
        self.data.predicate(expression)
    }
}
