use std::sync::Arc;

use tracing::warn;

use crate::dsl::Character;
use crate::error::RuntimeError;
use crate::nodes::Script;
use crate::runtime::chain::{Chain, Step, DEFAULT_PORT};

/// What the executor should do after asking its director to move on.
#[derive(Debug, Clone)]
pub enum Transfer {
    /// Nowhere to go; the executor decides (continue, or finish at script end).
    Stay,
    Execute(Arc<Script>),
    Finish,
}

/// 跨脚本调度策略
/// Decides where control goes when a script jumps away or runs out, and which
/// identity a speaker key stands for.
pub trait Director {
    fn jump_to(&mut self, label: &str) -> Result<Transfer, RuntimeError>;
    fn jump_to_next(&mut self) -> Result<Transfer, RuntimeError>;

    /// The running script reached its last sentence.
    fn finished(&mut self) -> Result<Transfer, RuntimeError>;

    fn character(&self, script: &Script, key: &str) -> Option<Character>;
}

/// Runs one script on its own. Jumps are not supported.
#[derive(Debug, Clone, Default)]
pub struct SingleScript {
    bindings: Option<Vec<Character>>,
}

impl SingleScript {
    /// Binds declared characters by position, like a story node does.
    pub fn new(characters: Vec<Character>) -> Self {
        Self {
            bindings: Some(characters),
        }
    }

    /// Every speaker key stands for a character of the same name.
    pub fn by_name() -> Self {
        Self { bindings: None }
    }
}

impl Director for SingleScript {
    fn jump_to(&mut self, label: &str) -> Result<Transfer, RuntimeError> {
        warn!(label = %label, "a single script cannot jump to another node, continuing");
        Ok(Transfer::Stay)
    }

    fn jump_to_next(&mut self) -> Result<Transfer, RuntimeError> {
        warn!("a single script has no next node, continuing");
        Ok(Transfer::Stay)
    }

    fn finished(&mut self) -> Result<Transfer, RuntimeError> {
        Ok(Transfer::Finish)
    }

    fn character(&self, script: &Script, key: &str) -> Option<Character> {
        match &self.bindings {
            Some(bindings) => script
                .character_index(key)
                .and_then(|i| bindings.get(i))
                .cloned(),
            None => Some(Character::new(key)),
        }
    }
}

/// Drives an executor through a [`Chain`].
#[derive(Debug)]
pub struct ChainDirector {
    chain: Chain,
}

impl ChainDirector {
    pub fn new(chain: Chain) -> Self {
        Self { chain }
    }

    pub fn chain(&self) -> &Chain {
        &self.chain
    }

    pub fn chain_mut(&mut self) -> &mut Chain {
        &mut self.chain
    }

    /// Rewinds the chain to its root and returns the first script.
    pub fn start(&mut self) -> Result<Transfer, RuntimeError> {
        Ok(transfer(self.chain.reset()?))
    }
}

fn transfer(step: Step) -> Transfer {
    match step {
        Step::Story(script) => Transfer::Execute(script),
        Step::Stay => Transfer::Stay,
        Step::Ended => Transfer::Finish,
    }
}

impl Director for ChainDirector {
    fn jump_to(&mut self, label: &str) -> Result<Transfer, RuntimeError> {
        let step = self.chain.next_by(label)?;
        if matches!(step, Step::Stay) {
            warn!(label = %label, "no connection on this port, continuing");
        }
        Ok(transfer(step))
    }

    fn jump_to_next(&mut self) -> Result<Transfer, RuntimeError> {
        self.jump_to(DEFAULT_PORT)
    }

    fn finished(&mut self) -> Result<Transfer, RuntimeError> {
        Ok(transfer(self.chain.next()?))
    }

    fn character(&self, _script: &Script, key: &str) -> Option<Character> {
        self.chain.current_character(key).ok().cloned()
    }
}
