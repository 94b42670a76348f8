//! Keyboard shortcuts.
//!
//! | Key                         | Command            |
//! |-----------------------------|--------------------|
//! | Space                       | Toggle play/pause  |
//! | Delete / Backspace          | Delete selection   |
//! | Shift+Delete / Backspace    | Ripple delete      |
//! | S                           | Split at playhead  |
//! | D                           | Duplicate          |
//! | T                           | Add text           |
//! | Ctrl+Z                      | Undo               |
//! | Ctrl+Shift+Z / Ctrl+Y       | Redo               |
//! | V / C                       | Select / razor tool|
//! | ] / [                       | Layer up / down    |
//!
//! Shortcuts are ignored while a text field has focus.

use montage_project_model::EntityId;
use serde::{Deserialize, Serialize};

use crate::error::EditError;
use crate::interaction::{InteractionController, PointerEffect, Tool};
use crate::ops::{EditOp, LayerDirection};
use crate::store::TimelineStore;

/// Default length of a text overlay added from the keyboard.
pub const DEFAULT_TEXT_SECS: f64 = 3.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Key {
    Space,
    Delete,
    Backspace,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        shift: false,
    };
    pub const CTRL: Self = Self {
        ctrl: true,
        shift: false,
    };
    pub const SHIFT: Self = Self {
        ctrl: false,
        shift: true,
    };
    pub const CTRL_SHIFT: Self = Self {
        ctrl: true,
        shift: true,
    };
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    TogglePlay,
    Delete,
    RippleDelete,
    SplitAtPlayhead,
    Duplicate,
    AddText,
    Undo,
    Redo,
    SelectTool,
    RazorTool,
    LayerUp,
    LayerDown,
}

/// Resolve a key press. `None` for unbound keys.
pub fn command_for(key: Key, mods: Modifiers) -> Option<Command> {
    let command = match (key, mods) {
        (Key::Space, Modifiers::NONE) => Command::TogglePlay,
        (Key::Delete | Key::Backspace, Modifiers::NONE) => Command::Delete,
        (Key::Delete | Key::Backspace, Modifiers::SHIFT) => Command::RippleDelete,
        (Key::Char(c), m) => match (c.to_ascii_lowercase(), m) {
            ('z', Modifiers::CTRL) => Command::Undo,
            ('z', Modifiers::CTRL_SHIFT) | ('y', Modifiers::CTRL) => Command::Redo,
            ('s', Modifiers::NONE) => Command::SplitAtPlayhead,
            ('d', Modifiers::NONE) => Command::Duplicate,
            ('t', Modifiers::NONE) => Command::AddText,
            ('v', Modifiers::NONE) => Command::SelectTool,
            ('c', Modifiers::NONE) => Command::RazorTool,
            (']', Modifiers::NONE) => Command::LayerUp,
            ('[', Modifiers::NONE) => Command::LayerDown,
            _ => return None,
        },
        _ => return None,
    };
    Some(command)
}

/// What the caller must do after a command ran.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    /// Handled entirely by the editing layer.
    Done(PointerEffect),
    /// The playback clock owns this one.
    TogglePlayback,
}

/// Run `command` against the store. `playhead` is the current timeline time.
pub fn dispatch(
    command: Command,
    store: &mut TimelineStore,
    interaction: &mut InteractionController,
    playhead: f64,
) -> CommandOutcome {
    let selected = interaction.selection();
    let result = match command {
        Command::TogglePlay => return CommandOutcome::TogglePlayback,
        Command::SelectTool => {
            interaction.set_tool(Tool::Select);
            return CommandOutcome::Done(PointerEffect::Nothing);
        }
        Command::RazorTool => {
            interaction.set_tool(Tool::Razor);
            return CommandOutcome::Done(PointerEffect::Nothing);
        }
        Command::Undo => store.undo(),
        Command::Redo => store.redo(),
        Command::AddText => store.execute(EditOp::AddText {
            text: "Text".to_string(),
            at: Some(playhead),
            duration: DEFAULT_TEXT_SECS,
        }),
        Command::Delete => on_selection(selected, |id| store.execute(EditOp::Delete { id })),
        Command::RippleDelete => {
            on_selection(selected, |id| store.execute(EditOp::RippleDelete { id }))
        }
        Command::SplitAtPlayhead => on_selection(selected, |id| {
            store.execute(EditOp::Split { id, at: playhead })
        }),
        Command::Duplicate => on_selection(selected, |id| store.execute(EditOp::Duplicate { id })),
        Command::LayerUp => on_selection(selected, |id| {
            store.execute(EditOp::Layer {
                id,
                direction: LayerDirection::Up,
            })
        }),
        Command::LayerDown => on_selection(selected, |id| {
            store.execute(EditOp::Layer {
                id,
                direction: LayerDirection::Down,
            })
        }),
    };
    interaction.sync_selection(store.state());

    CommandOutcome::Done(match result {
        Ok(()) => PointerEffect::Edited,
        Err(err) if err.is_noop() => PointerEffect::Nothing,
        Err(err) => PointerEffect::Rejected(err),
    })
}

fn on_selection(
    selected: Option<EntityId>,
    f: impl FnOnce(EntityId) -> Result<(), EditError>,
) -> Result<(), EditError> {
    match selected {
        Some(id) => f(id),
        None => Err(EditError::NoSelection),
    }
}
