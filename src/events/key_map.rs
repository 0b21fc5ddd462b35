//! Key Maps - key-stroke descriptors for `Key` events
//!
//! A [`KeyMap`] is a key code plus modifier flags. Every key map has a stable
//! signature string used as its identity in the [`KeyMapping`] registry:
//!
//! ```text
//! <code>|<alt><ctrl><meta><shift>     e.g. "13|fftf" = Meta+Enter
//! ```
//!
//! Each flag is `t` or `f`. Short signatures are completed with `f`, so `"13"`
//! and `"13|"` both mean plain Enter.
//!
//! # API
//!
//! - `KeyMap::new(key, modifiers)` - Build a key map
//! - `KeyMap::from_crossterm(&event)` - Convert a terminal key event
//! - `KeyMapping::add` / `KeyMapping::get` - Registry of named key maps
//!
//! # Example
//!
//! ```ignore
//! use spark_forms::events::{KeyMap, KeyMapping, KeyModifiers};
//!
//! let mut mapping = KeyMapping::new();
//! mapping.add(KeyMap::new(83, KeyModifiers::CTRL)); // Ctrl+S
//!
//! let save = mapping.get("83|ftff")?;
//! assert!(save.ctrl());
//! ```

use std::collections::HashMap;
use std::fmt;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers as CrosstermModifiers};
use thiserror::Error;

// =============================================================================
// MODIFIERS
// =============================================================================

bitflags::bitflags! {
    /// Modifier keys held during a key stroke.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyModifiers: u8 {
        const NONE  = 0;
        const ALT   = 1 << 0;
        const CTRL  = 1 << 1;
        const META  = 1 << 2;
        const SHIFT = 1 << 3;
    }
}

/// Signature flag order after the `|`.
const FLAG_ORDER: [KeyModifiers; 4] = [
    KeyModifiers::ALT,
    KeyModifiers::CTRL,
    KeyModifiers::META,
    KeyModifiers::SHIFT,
];

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum KeyMapError {
    #[error("invalid key signature '{0}': key is not a number")]
    InvalidKey(String),
    #[error("invalid key signature '{0}': flags must be 't' or 'f'")]
    InvalidFlags(String),
}

// =============================================================================
// KEY MAP
// =============================================================================

/// A key code with modifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyMap {
    key: u32,
    modifiers: KeyModifiers,
}

impl KeyMap {
    pub const ENTER: KeyMap = KeyMap::new(13, KeyModifiers::NONE);
    pub const ESCAPE: KeyMap = KeyMap::new(27, KeyModifiers::NONE);
    pub const TAB: KeyMap = KeyMap::new(9, KeyModifiers::NONE);
    pub const BACKTAB: KeyMap = KeyMap::new(9, KeyModifiers::SHIFT);
    pub const PREV_RECORD: KeyMap = KeyMap::new(38, KeyModifiers::NONE);
    pub const NEXT_RECORD: KeyMap = KeyMap::new(40, KeyModifiers::NONE);
    pub const PAGE_UP: KeyMap = KeyMap::new(33, KeyModifiers::NONE);
    pub const PAGE_DOWN: KeyMap = KeyMap::new(34, KeyModifiers::NONE);

    pub const fn new(key: u32, modifiers: KeyModifiers) -> Self {
        Self { key, modifiers }
    }

    /// Parse a signature, completing missing flags with `f`.
    pub fn parse(signature: &str) -> Result<Self, KeyMapError> {
        let signature = complete_signature(signature);
        let (code, flags) = signature
            .split_once('|')
            .ok_or_else(|| KeyMapError::InvalidKey(signature.clone()))?;

        let key: u32 = code
            .parse()
            .map_err(|_| KeyMapError::InvalidKey(signature.clone()))?;

        let mut modifiers = KeyModifiers::NONE;
        for (flag, modifier) in flags.chars().zip(FLAG_ORDER) {
            match flag {
                't' => modifiers |= modifier,
                'f' => {}
                _ => return Err(KeyMapError::InvalidFlags(signature.clone())),
            }
        }

        Ok(Self { key, modifiers })
    }

    /// Convert a crossterm key event.
    ///
    /// Letters map to their upper-case code so `a` and `A` share a key code;
    /// the shift flag tells them apart.
    pub fn from_crossterm(event: &KeyEvent) -> Self {
        let key = match event.code {
            KeyCode::Backspace => 8,
            KeyCode::Tab | KeyCode::BackTab => 9,
            KeyCode::Enter => 13,
            KeyCode::Esc => 27,
            KeyCode::PageUp => 33,
            KeyCode::PageDown => 34,
            KeyCode::End => 35,
            KeyCode::Home => 36,
            KeyCode::Left => 37,
            KeyCode::Up => 38,
            KeyCode::Right => 39,
            KeyCode::Down => 40,
            KeyCode::Insert => 45,
            KeyCode::Delete => 46,
            KeyCode::F(n) => 111 + n as u32,
            KeyCode::Char(c) => c.to_ascii_uppercase() as u32,
            _ => 0,
        };

        let mut modifiers = convert_modifiers(event.modifiers);
        if event.code == KeyCode::BackTab {
            modifiers |= KeyModifiers::SHIFT;
        }

        Self { key, modifiers }
    }

    pub fn key(&self) -> u32 {
        self.key
    }

    pub fn modifiers(&self) -> KeyModifiers {
        self.modifiers
    }

    pub fn alt(&self) -> bool {
        self.modifiers.contains(KeyModifiers::ALT)
    }

    pub fn ctrl(&self) -> bool {
        self.modifiers.contains(KeyModifiers::CTRL)
    }

    pub fn meta(&self) -> bool {
        self.modifiers.contains(KeyModifiers::META)
    }

    pub fn shift(&self) -> bool {
        self.modifiers.contains(KeyModifiers::SHIFT)
    }

    /// Stable identity string, `<code>|<a><c><m><s>`.
    pub fn signature(&self) -> String {
        let mut sig = format!("{}|", self.key);
        for modifier in FLAG_ORDER {
            sig.push(if self.modifiers.contains(modifier) { 't' } else { 'f' });
        }
        sig
    }
}

impl fmt::Display for KeyMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

fn convert_modifiers(mods: CrosstermModifiers) -> KeyModifiers {
    let mut out = KeyModifiers::NONE;
    if mods.contains(CrosstermModifiers::ALT) {
        out |= KeyModifiers::ALT;
    }
    if mods.contains(CrosstermModifiers::CONTROL) {
        out |= KeyModifiers::CTRL;
    }
    if mods.intersects(CrosstermModifiers::META | CrosstermModifiers::SUPER) {
        out |= KeyModifiers::META;
    }
    if mods.contains(CrosstermModifiers::SHIFT) {
        out |= KeyModifiers::SHIFT;
    }
    out
}

/// Pad a signature to `<code>|` plus four flags.
fn complete_signature(signature: &str) -> String {
    let mut sig = signature.to_string();
    let pos = match sig.find('|') {
        Some(pos) if pos > 0 => pos,
        _ => {
            sig.push('|');
            sig.len() - 1
        }
    };
    while sig.len() - pos < 5 {
        sig.push('f');
    }
    sig
}

// =============================================================================
// KEY MAPPING REGISTRY
// =============================================================================

/// Registry of known key maps, keyed by signature.
///
/// Unknown signatures are parsed and remembered on first lookup, so every
/// signature resolves to one canonical `KeyMap`.
#[derive(Debug, Default)]
pub struct KeyMapping {
    map: HashMap<String, KeyMap>,
}

impl KeyMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the navigation keys.
    pub fn with_defaults() -> Self {
        let mut mapping = Self::new();
        for key in [
            KeyMap::ENTER,
            KeyMap::ESCAPE,
            KeyMap::TAB,
            KeyMap::BACKTAB,
            KeyMap::PREV_RECORD,
            KeyMap::NEXT_RECORD,
            KeyMap::PAGE_UP,
            KeyMap::PAGE_DOWN,
        ] {
            mapping.add(key);
        }
        mapping
    }

    pub fn add(&mut self, key: KeyMap) {
        self.map.insert(key.signature(), key);
    }

    /// Merge several key maps at once.
    pub fn merge(&mut self, keys: impl IntoIterator<Item = KeyMap>) {
        for key in keys {
            self.add(key);
        }
    }

    /// Look up a signature, completing and creating it if needed.
    pub fn get(&mut self, signature: &str) -> Result<KeyMap, KeyMapError> {
        let signature = complete_signature(signature);
        if let Some(key) = self.map.get(&signature) {
            return Ok(*key);
        }

        let key = KeyMap::parse(&signature)?;
        self.map.insert(key.signature(), key);
        Ok(key)
    }

    pub fn contains(&self, signature: &str) -> bool {
        self.map.contains_key(&complete_signature(signature))
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

// =============================================================================
// TESTS
// =============================================================================
