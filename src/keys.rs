//! Key codes, mouse buttons and modifier bits as delivered by the host.
//!
//! Key codes follow the GLFW/sokol numbering: printable keys use their uppercase ASCII
//! code point, named keys start at 256, and [`Key::MENU`] (348) is the highest code.

use bitflags::bitflags;

/// Number of distinct key codes tracked per frame.
pub const KEY_COUNT: usize = 349;

/// Number of mouse buttons tracked per frame.
pub const MOUSE_BUTTON_COUNT: usize = 3;

/// A keyboard key code.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Key(pub u16);

impl Key {
    pub const SPACE: Key = Key(32);
    pub const APOSTROPHE: Key = Key(39);
    pub const COMMA: Key = Key(44);
    pub const MINUS: Key = Key(45);
    pub const PERIOD: Key = Key(46);
    pub const SLASH: Key = Key(47);
    pub const SEMICOLON: Key = Key(59);
    pub const EQUAL: Key = Key(61);
    pub const LEFT_BRACKET: Key = Key(91);
    pub const BACKSLASH: Key = Key(92);
    pub const RIGHT_BRACKET: Key = Key(93);
    pub const GRAVE_ACCENT: Key = Key(96);
    pub const WORLD_1: Key = Key(161);
    pub const WORLD_2: Key = Key(162);
    pub const ESCAPE: Key = Key(256);
    pub const ENTER: Key = Key(257);
    pub const TAB: Key = Key(258);
    pub const BACKSPACE: Key = Key(259);
    pub const INSERT: Key = Key(260);
    pub const DELETE: Key = Key(261);
    pub const RIGHT: Key = Key(262);
    pub const LEFT: Key = Key(263);
    pub const DOWN: Key = Key(264);
    pub const UP: Key = Key(265);
    pub const PAGE_UP: Key = Key(266);
    pub const PAGE_DOWN: Key = Key(267);
    pub const HOME: Key = Key(268);
    pub const END: Key = Key(269);
    pub const CAPS_LOCK: Key = Key(280);
    pub const SCROLL_LOCK: Key = Key(281);
    pub const NUM_LOCK: Key = Key(282);
    pub const PRINT_SCREEN: Key = Key(283);
    pub const PAUSE: Key = Key(284);
    /// `F1`; `F1..=F25` are contiguous.
    pub const F1: Key = Key(290);
    pub const F25: Key = Key(314);
    pub const LEFT_SHIFT: Key = Key(340);
    pub const LEFT_CONTROL: Key = Key(341);
    pub const LEFT_ALT: Key = Key(342);
    pub const LEFT_SUPER: Key = Key(343);
    pub const RIGHT_SHIFT: Key = Key(344);
    pub const RIGHT_CONTROL: Key = Key(345);
    pub const RIGHT_ALT: Key = Key(346);
    pub const RIGHT_SUPER: Key = Key(347);
    pub const MENU: Key = Key(348);

    /// Key for a letter or digit. Letters map to their uppercase code point.
    pub fn from_char(ch: char) -> Option<Key> {
        if ch.is_ascii_alphanumeric() {
            Some(Key(ch.to_ascii_uppercase() as u16))
        } else {
            None
        }
    }

    /// Function key `Fn`, `n` in `1..=25`.
    pub fn function(n: u16) -> Option<Key> {
        (1..=25).contains(&n).then(|| Key(Self::F1.0 + n - 1))
    }

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// A mouse button.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left = 0,
    Right = 1,
    Middle = 2,
}

impl MouseButton {
    pub fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Self::Left),
            1 => Some(Self::Right),
            2 => Some(Self::Middle),
            _ => None,
        }
    }

    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

bitflags! {
    /// Modifier mask attached to every host input event.
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u32 {
        const SHIFT = 0x1;
        const CTRL = 0x2;
        const ALT = 0x4;
        const SUPER = 0x8;
        const LMB = 0x100;
        const RMB = 0x200;
        const MMB = 0x400;
    }
}

/// Multi-character key names understood by the combo parser (matched case-insensitively).
pub(crate) const KEY_NAMES: &[(&str, Key)] = &[
    ("SPACE", Key::SPACE),
    ("APOSTROPHE", Key::APOSTROPHE),
    ("COMMA", Key::COMMA),
    ("MINUS", Key::MINUS),
    ("PERIOD", Key::PERIOD),
    ("SLASH", Key::SLASH),
    ("SEMICOLON", Key::SEMICOLON),
    ("EQUAL", Key::EQUAL),
    ("LBRACKET", Key::LEFT_BRACKET),
    ("BACKSLASH", Key::BACKSLASH),
    ("RBRACKET", Key::RIGHT_BRACKET),
    ("GRAVE", Key::GRAVE_ACCENT),
    ("WORLD1", Key::WORLD_1),
    ("WORLD2", Key::WORLD_2),
    ("ESCAPE", Key::ESCAPE),
    ("ENTER", Key::ENTER),
    ("TAB", Key::TAB),
    ("BACKSPACE", Key::BACKSPACE),
    ("INSERT", Key::INSERT),
    ("DELETE", Key::DELETE),
    ("RIGHT", Key::RIGHT),
    ("LEFT", Key::LEFT),
    ("DOWN", Key::DOWN),
    ("UP", Key::UP),
    ("PGUP", Key::PAGE_UP),
    ("PGDN", Key::PAGE_DOWN),
    ("HOME", Key::HOME),
    ("END", Key::END),
    ("CAPSLOCK", Key::CAPS_LOCK),
    ("SCROLLLOCK", Key::SCROLL_LOCK),
    ("NUMLOCK", Key::NUM_LOCK),
    ("PRNTSCRN", Key::PRINT_SCREEN),
    ("PAUSE", Key::PAUSE),
    ("MENU", Key::MENU),
];

/// Modifier names understood by the combo parser. Left/right variants share one bit.
pub(crate) const MODIFIER_NAMES: &[(&str, Modifiers)] = &[
    ("SHIFT", Modifiers::SHIFT),
    ("LSHIFT", Modifiers::SHIFT),
    ("RSHIFT", Modifiers::SHIFT),
    ("CONTROL", Modifiers::CTRL),
    ("CTRL", Modifiers::CTRL),
    ("LCTRL", Modifiers::CTRL),
    ("RCTRL", Modifiers::CTRL),
    ("LCONTROL", Modifiers::CTRL),
    ("RCONTROL", Modifiers::CTRL),
    ("ALT", Modifiers::ALT),
    ("LALT", Modifiers::ALT),
    ("RALT", Modifiers::ALT),
    ("SUPER", Modifiers::SUPER),
    ("LSUPER", Modifiers::SUPER),
    ("RSUPER", Modifiers::SUPER),
    ("CMD", Modifiers::SUPER),
    ("LCMD", Modifiers::SUPER),
    ("RCMD", Modifiers::SUPER),
];

/// Look up a named key, including `F1`..`F25`.
pub(crate) fn key_by_name(name: &str) -> Option<Key> {
    if let Some(&(_, key)) = KEY_NAMES.iter().find(|(n, _)| n.eq_ignore_ascii_case(name)) {
        return Some(key);
    }
    let digits = name
        .strip_prefix('F')
        .or_else(|| name.strip_prefix('f'))?;
    if digits.starts_with('0') {
        return None;
    }
    Key::function(digits.parse().ok()?)
}

pub(crate) fn modifier_by_name(name: &str) -> Option<Modifiers> {
    MODIFIER_NAMES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|&(_, m)| m)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chars_map_to_uppercase_codes() {
        assert_eq!(Key::from_char('a'), Some(Key(65)));
        assert_eq!(Key::from_char('Z'), Some(Key(90)));
        assert_eq!(Key::from_char('7'), Some(Key(55)));
        assert_eq!(Key::from_char('-'), None);
    }

    #[test]
    fn function_keys() {
        assert_eq!(key_by_name("f1"), Some(Key::F1));
        assert_eq!(key_by_name("F25"), Some(Key::F25));
        assert_eq!(key_by_name("F26"), None);
        assert_eq!(key_by_name("F01"), None);
        assert_eq!(key_by_name("F"), None);
    }

    #[test]
    fn names_are_case_insensitive() {
        assert_eq!(key_by_name("escape"), Some(Key::ESCAPE));
        assert_eq!(key_by_name("PgDn"), Some(Key::PAGE_DOWN));
        assert_eq!(modifier_by_name("cmd"), Some(Modifiers::SUPER));
        assert_eq!(modifier_by_name("RCtrl"), Some(Modifiers::CTRL));
        assert_eq!(modifier_by_name("hyper"), None);
    }

    #[test]
    fn every_named_key_is_tracked() {
        for &(_, key) in KEY_NAMES {
            assert!(key.index() < KEY_COUNT);
        }
        assert_eq!(Key::MENU.index(), KEY_COUNT - 1);
    }
}
