use std::sync::{Arc, Mutex, MutexGuard};

use crate::dsl::Character;
use crate::nodes::MenuOption;

/// Presentation collaborator. Drawing dialogue, menus and input polling
/// all live behind this trait.
pub trait Presenter {
    fn set_character(&mut self, character: &Character, extra: &str);
    fn clear_character(&mut self);
    fn set_text(&mut self, text: &str);
    fn show_menu(&mut self, options: &[MenuOption]);
    fn clear_menu(&mut self);
    fn set_visible(&mut self, visible: bool);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Character { name: String, extra: String },
    ClearCharacter,
    Text(String),
    Menu(Vec<String>),
    ClearMenu,
    Visible(bool),
}

/// Presenter that records everything it is asked to show.
/// Clones share the same log, so a test can keep one handle and give the
/// other to an executor.
#[derive(Debug, Clone, Default)]
pub struct Transcript {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    fn log(&self) -> MutexGuard<'_, Vec<Event>> {
        self.events.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn events(&self) -> Vec<Event> {
        self.log().clone()
    }

    /// Only the dialogue text, in display order.
    pub fn lines(&self) -> Vec<String> {
        self.log()
            .iter()
            .filter_map(|e| match e {
                Event::Text(text) => Some(text.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.log().clear();
    }

    fn push(&self, event: Event) {
        self.log().push(event);
    }
}

impl Presenter for Transcript {
    fn set_character(&mut self, character: &Character, extra: &str) {
        self.push(Event::Character {
            name: character.name.clone(),
            extra: extra.to_string(),
        });
    }

    fn clear_character(&mut self) {
        self.push(Event::ClearCharacter);
    }

    fn set_text(&mut self, text: &str) {
        self.push(Event::Text(text.to_string()));
    }

    fn show_menu(&mut self, options: &[MenuOption]) {
        self.push(Event::Menu(options.iter().map(|o| o.text.clone()).collect()));
    }

    fn clear_menu(&mut self) {
        self.push(Event::ClearMenu);
    }

    fn set_visible(&mut self, visible: bool) {
        self.push(Event::Visible(visible));
    }
}
