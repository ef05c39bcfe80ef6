use crate::error::RuntimeError;
use crate::runtime::syscall::Syscall;

/// A dialogue line. Suspends until the host resumes the executor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Say {
    /// Declared character key; empty for narration.
    pub speaker: String,
    pub extra: String,
    pub text: String,
}

impl Say {
    pub fn new(speaker: impl Into<String>, text: impl Into<String>, extra: impl Into<String>) -> Self {
        Self {
            speaker: speaker.into(),
            extra: extra.into(),
            text: text.into(),
        }
    }

    pub(crate) fn execute(&self, syscall: &mut dyn Syscall) -> Result<(), RuntimeError> {
        if self.speaker.is_empty() {
            syscall.clear_character();
        } else {
            syscall.set_character(&self.speaker, &self.extra)?;
        }
        syscall.set_text(&self.text)
    }
}

/// Leaves the current story node, by label or along the default branch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Jump {
    pub label: Option<String>,
}

impl Jump {
    pub(crate) fn execute(&self, syscall: &mut dyn Syscall) -> Result<(), RuntimeError> {
        match &self.label {
            Some(label) => syscall.jump_to(label),
            None => syscall.jump_to_next(),
        }
    }
}

pub(crate) fn close(syscall: &mut dyn Syscall) {
    syscall.pop_scope();
    syscall.advance();
}
