//! Keyboard shortcut registry and resolution.

/// An editor action reachable from the keyboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditorCommand {
    Save,
    Undo,
    Redo,
    ZoomIn,
    ZoomOut,
    Copy,
    Paste,
    DeleteSelection,
    Cancel,
}

/// A key press as reported by the host. `key` is the logical key name
/// (`"s"`, `"="`, `"Delete"`, ...).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyInput {
    pub key: String,
    pub ctrl: bool,
    /// Cmd on macOS; treated the same as Ctrl.
    pub meta: bool,
    pub shift: bool,
}

impl KeyInput {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ctrl: false,
            meta: false,
            shift: false,
        }
    }

    pub fn ctrl(key: impl Into<String>) -> Self {
        Self {
            ctrl: true,
            ..Self::new(key)
        }
    }

    pub fn with_shift(mut self) -> Self {
        self.shift = true;
        self
    }

    fn command_modifier(&self) -> bool {
        self.ctrl || self.meta
    }
}

/// A keyboard shortcut definition.
#[derive(Debug, Clone)]
pub struct Shortcut {
    pub key: &'static str,
    pub ctrl: bool,
    /// `None` accepts either shift state.
    pub shift: Option<bool>,
    pub command: EditorCommand,
    pub description: &'static str,
}

impl Shortcut {
    pub const fn new(
        key: &'static str,
        ctrl: bool,
        shift: Option<bool>,
        command: EditorCommand,
        description: &'static str,
    ) -> Self {
        Self {
            key,
            ctrl,
            shift,
            command,
            description,
        }
    }

    /// Format the shortcut for display (e.g., "Ctrl+S").
    pub fn format(&self) -> String {
        let mut parts = Vec::new();
        if self.ctrl {
            parts.push("Ctrl".to_string());
        }
        if self.shift == Some(true) {
            parts.push("Shift".to_string());
        }
        parts.push(self.key.to_uppercase());
        parts.join("+")
    }

    pub fn matches(&self, input: &KeyInput) -> bool {
        self.ctrl == input.command_modifier()
            && self.shift.is_none_or(|shift| shift == input.shift)
            && self.key.eq_ignore_ascii_case(&input.key)
    }
}

/// Registry of all keyboard shortcuts.
pub struct ShortcutRegistry;

impl ShortcutRegistry {
    /// All shortcuts, most specific first.
    pub fn all() -> Vec<Shortcut> {
        use EditorCommand::*;
        vec![
            Shortcut::new("s", true, None, Save, "Save"),
            Shortcut::new("z", true, Some(true), Redo, "Redo"),
            Shortcut::new("z", true, Some(false), Undo, "Undo"),
            Shortcut::new("y", true, None, Redo, "Redo"),
            Shortcut::new("=", true, None, ZoomIn, "Zoom in"),
            Shortcut::new("+", true, None, ZoomIn, "Zoom in"),
            Shortcut::new("-", true, None, ZoomOut, "Zoom out"),
            Shortcut::new("c", true, Some(false), Copy, "Copy selection"),
            Shortcut::new("v", true, Some(false), Paste, "Paste"),
            Shortcut::new("Delete", false, None, DeleteSelection, "Delete selection"),
            Shortcut::new("Backspace", false, None, DeleteSelection, "Delete selection"),
            Shortcut::new("Escape", false, None, Cancel, "Cancel current gesture"),
        ]
    }

    /// The command bound to a key press, if any.
    pub fn resolve(input: &KeyInput) -> Option<EditorCommand> {
        Self::all()
            .into_iter()
            .find(|s| s.matches(input))
            .map(|s| s.command)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_core_bindings() {
        use EditorCommand::*;
        assert_eq!(ShortcutRegistry::resolve(&KeyInput::ctrl("s")), Some(Save));
        assert_eq!(ShortcutRegistry::resolve(&KeyInput::ctrl("Z")), Some(Undo));
        assert_eq!(ShortcutRegistry::resolve(&KeyInput::ctrl("z").with_shift()), Some(Redo));
        assert_eq!(ShortcutRegistry::resolve(&KeyInput::ctrl("y")), Some(Redo));
        assert_eq!(ShortcutRegistry::resolve(&KeyInput::ctrl("=")), Some(ZoomIn));
        assert_eq!(ShortcutRegistry::resolve(&KeyInput::ctrl("+").with_shift()), Some(ZoomIn));
        assert_eq!(ShortcutRegistry::resolve(&KeyInput::ctrl("-")), Some(ZoomOut));
        assert_eq!(ShortcutRegistry::resolve(&KeyInput::new("Delete")), Some(DeleteSelection));
    }

    #[test]
    fn test_meta_counts_as_ctrl() {
        let mut input = KeyInput::new("s");
        input.meta = true;
        assert_eq!(ShortcutRegistry::resolve(&input), Some(EditorCommand::Save));
    }

    #[test]
    fn test_plain_letters_do_nothing() {
        assert_eq!(ShortcutRegistry::resolve(&KeyInput::new("s")), None);
        assert_eq!(ShortcutRegistry::resolve(&KeyInput::ctrl("q")), None);
    }

    #[test]
    fn test_format() {
        let redo = &ShortcutRegistry::all()[1];
        assert_eq!(redo.format(), "Ctrl+Shift+Z");
    }
}
