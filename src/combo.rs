//! Human-readable key combinations.
//!
//! A combo is a list of tokens separated by `+` or `,` (the two are interchangeable):
//!
//! ```text
//! combo  := sep* token (sep+ token)* sep*
//! sep    := '+' | ',' | whitespace
//! token  := [A-Za-z0-9]+
//! ```
//!
//! A one-character token is a key named by that letter or digit. Longer tokens are looked up,
//! ignoring case, first among modifier names (`CTRL`, `SHIFT`, `ALT`, `CMD`, ...) and then among
//! key names (`ESCAPE`, `F5`, `PGUP`, ...). Modifiers are OR'd into one mask, keys are collected
//! once each in the order they first appear.
//!
//! ```
//! use padframe::{parse_combo, Key, Modifiers};
//!
//! let combo = parse_combo("ctrl+shift+S").unwrap();
//! assert_eq!(combo.modifiers, Modifiers::CTRL | Modifiers::SHIFT);
//! assert_eq!(combo.keys, vec![Key::from_char('S').unwrap()]);
//! ```

use crate::error::ComboError;
use crate::keys::{key_by_name, modifier_by_name, Key, Modifiers};
use std::str::FromStr;

/// A parsed combination.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Combo {
    pub modifiers: Modifiers,
    /// Distinct keys in first-seen order.
    pub keys: Vec<Key>,
}

impl Combo {
    fn add_key(&mut self, key: Key) {
        if !self.keys.contains(&key) {
            self.keys.push(key);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modifiers.is_empty() && self.keys.is_empty()
    }
}

impl FromStr for Combo {
    type Err = ComboError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_combo(s)
    }
}

/// Parse `input` into a [`Combo`].
///
/// Fails on an unknown token, on a character that is neither a separator nor alphanumeric, and
/// on input that names nothing. Failures are logged at `warn` level.
pub fn parse_combo(input: &str) -> Result<Combo, ComboError> {
    let result = Parser { input, pos: 0 }.combo();
    if let Err(err) = &result {
        tracing::warn!(input, "[COMBO/PARSE] {err}");
    }
    result
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Parser<'a> {
    fn combo(mut self) -> Result<Combo, ComboError> {
        let mut combo = Combo::default();
        loop {
            self.skip_separators();
            let Some(ch) = self.peek() else { break };
            if !ch.is_ascii_alphanumeric() {
                return Err(ComboError::InvalidCharacter {
                    ch,
                    offset: self.pos,
                });
            }
            let token = self.token();
            Self::apply(token, &mut combo)?;
        }
        if combo.is_empty() {
            return Err(ComboError::Empty);
        }
        Ok(combo)
    }

    fn apply(token: &str, combo: &mut Combo) -> Result<(), ComboError> {
        let mut chars = token.chars();
        if let (Some(ch), None) = (chars.next(), chars.next()) {
            if let Some(key) = Key::from_char(ch) {
                combo.add_key(key);
                return Ok(());
            }
        }
        if let Some(m) = modifier_by_name(token) {
            combo.modifiers |= m;
            return Ok(());
        }
        if let Some(key) = key_by_name(token) {
            combo.add_key(key);
            return Ok(());
        }
        Err(ComboError::UnknownToken {
            token: token.to_string(),
        })
    }

    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn skip_separators(&mut self) {
        while let Some(ch) = self.peek() {
            if ch == '+' || ch == ',' || ch.is_whitespace() {
                self.pos += ch.len_utf8();
            } else {
                break;
            }
        }
    }

    fn token(&mut self) -> &'a str {
        let rest = &self.input[self.pos..];
        let len = rest
            .find(|c: char| !c.is_ascii_alphanumeric())
            .unwrap_or(rest.len());
        self.pos += len;
        &rest[..len]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(c: char) -> Key {
        Key::from_char(c).unwrap()
    }

    #[test]
    fn ctrl_a() {
        let c = parse_combo("CTRL+A").unwrap();
        assert!(c.modifiers.contains(Modifiers::CTRL));
        assert_eq!(c.keys, vec![key('A')]);
    }

    #[test]
    fn comma_and_plus_are_the_same_separator() {
        let c = parse_combo("CTRL+A,B").unwrap();
        assert_eq!(c.modifiers, Modifiers::CTRL);
        assert_eq!(c.keys, vec![key('A'), key('B')]);
    }

    #[test]
    fn unknown_token_fails() {
        assert_eq!(
            parse_combo("FOO"),
            Err(ComboError::UnknownToken {
                token: "FOO".into()
            })
        );
        assert!(parse_combo("CTRL+FOO+A").is_err());
    }

    #[test]
    fn empty_input_fails() {
        assert_eq!(parse_combo(""), Err(ComboError::Empty));
        assert_eq!(parse_combo(" + , "), Err(ComboError::Empty));
    }

    #[test]
    fn bad_character_reports_offset() {
        assert_eq!(
            parse_combo("ALT+-"),
            Err(ComboError::InvalidCharacter { ch: '-', offset: 4 })
        );
    }

    #[test]
    fn keys_are_deduplicated_and_modifiers_merge() {
        let c = parse_combo("lshift + a + A + rshift + alt + F5 + escape").unwrap();
        assert_eq!(c.modifiers, Modifiers::SHIFT | Modifiers::ALT);
        assert_eq!(c.keys, vec![key('A'), Key::function(5).unwrap(), Key::ESCAPE]);
    }

    #[test]
    fn modifiers_only_and_digits() {
        let c: Combo = "cmd".parse().unwrap();
        assert_eq!(c.modifiers, Modifiers::SUPER);
        assert!(c.keys.is_empty());

        let c = parse_combo("1,2").unwrap();
        assert_eq!(c.keys, vec![key('1'), key('2')]);
        assert!(parse_combo("12").is_err());
    }

    #[test]
    fn long_side_specific_modifier_names() {
        for (name, bit) in [
            ("LCONTROL", Modifiers::CTRL),
            ("RCONTROL", Modifiers::CTRL),
            ("LCMD", Modifiers::SUPER),
            ("RCMD", Modifiers::SUPER),
        ] {
            let c = parse_combo(&format!("{name}+A")).unwrap();
            assert_eq!(c.modifiers, bit, "{name}");
            assert_eq!(c.keys, vec![key('A')]);
        }
        assert_eq!(parse_combo("rcontrol").unwrap().modifiers, Modifiers::CTRL);
    }
}
