use crate::error::{ParseErrorKind, RuntimeError};
use crate::nodes::{Block, Sentence};
use crate::runtime::syscall::Syscall;

// --- MENU ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuOption {
    pub text: String,
    /// First instruction of the option's body.
    pub target: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Menu {
    pub block: Block,
    options: Vec<MenuOption>,
}

impl Menu {
    pub fn options(&self) -> &[MenuOption] {
        &self.options
    }

    pub(crate) fn add_option(&mut self, text: impl Into<String>, target: usize) {
        self.options.push(MenuOption {
            text: text.into(),
            target,
        });
    }

    pub(crate) fn execute(&self, syscall: &mut dyn Syscall) {
        syscall.show_menu(&self.options);
        let own = syscall.index();
        syscall.push_scope(own);
    }

    pub(crate) fn on_advance_inside(&self, own: usize, current: &Sentence) -> Option<usize> {
        if self.block.is_open() {
            return None;
        }
        match current {
            Sentence::MenuItem(item) if item.menu == own => Some(self.block.exit_point(own)),
            _ => None,
        }
    }
}

/// Marker left in the program for each option; never executed on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub text: String,
    /// Index of the owning `[Menu]`.
    pub menu: usize,
}

// --- IF ---

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IfBranch {
    pub condition: String,
    pub target: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct If {
    pub condition: String,
    pub block: Block,
    branches: Vec<IfBranch>,
    else_target: Option<usize>,
}

impl If {
    pub fn new(condition: impl Into<String>) -> Self {
        Self {
            condition: condition.into(),
            block: Block::default(),
            branches: Vec::new(),
            else_target: None,
        }
    }

    /// `[Elif]` branches in declaration order.
    pub fn branches(&self) -> &[IfBranch] {
        &self.branches
    }

    pub fn else_target(&self) -> Option<usize> {
        self.else_target
    }

    pub(crate) fn add_branch(&mut self, condition: impl Into<String>, target: usize) -> Result<(), ParseErrorKind> {
        if self.else_target.is_some() {
            return Err(ParseErrorKind::ElseAlreadyDefined("Elif".to_string()));
        }
        self.branches.push(IfBranch {
            condition: condition.into(),
            target,
        });
        Ok(())
    }

    pub(crate) fn set_else(&mut self, target: usize) -> Result<(), ParseErrorKind> {
        if self.else_target.is_some() {
            return Err(ParseErrorKind::ElseAlreadyDefined("Else".to_string()));
        }
        self.else_target = Some(target);
        Ok(())
    }

    pub(crate) fn execute(&self, syscall: &mut dyn Syscall) -> Result<(), RuntimeError> {
        let own = syscall.index();
        syscall.push_scope(own);

        if syscall.predicate(&self.condition)? {
            syscall.advance();
            return Ok(());
        }

        for branch in &self.branches {
            if syscall.predicate(&branch.condition)? {
                syscall.goto(branch.target);
                return Ok(());
            }
        }

        match self.else_target {
            Some(target) => syscall.goto(target),
            None => syscall.goto(self.block.exit_point(own)),
        }
        Ok(())
    }

    /// Stops a finished branch from falling into its siblings.
    pub(crate) fn on_advance_inside(&self, own: usize, current: &Sentence) -> Option<usize> {
        if self.block.is_open() {
            return None;
        }
        match current {
            Sentence::ElseIf(stn) if stn.owner == own => Some(self.block.exit_point(own)),
            Sentence::Else(stn) if stn.owner == own => Some(self.block.exit_point(own)),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ElseIf {
    pub condition: String,
    /// Index of the owning `[If]`.
    pub owner: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Else {
    pub owner: usize,
}
