//! # 快捷键组合解析模块
//!
//! ## 设计思路
//!
//! 把用户可读的快捷键字符串（如 `"Cmd+Shift+C"`）解析为
//! “主键码 + 修饰键集合”的不可变值 `KeyCombo`，作为整个快捷键子系统
//! 匹配、缓存查询与策略判断的最小单位。
//!
//! ## 实现思路
//!
//! - 按 `+` 切分，修饰键别名（`cmd`/`command`、`ctrl`/`control`、
//!   `alt`/`option`、`shift`）大小写不敏感地折叠进 `Modifiers`。
//! - 其余片段都视为候选主键，数量必须恰好为 1，否则返回 `InvalidCombo`。
//! - 主键通过固定的键名表映射为 macOS 虚拟键码（统一键码空间）。
//! - `Display` 输出规范字符串：小写、修饰键顺序 `cmd,ctrl,alt,shift`、
//!   `+` 连接；系统快捷键缓存与冲突策略表都使用这一形式。

use std::collections::HashMap;
use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;

use once_cell::sync::Lazy;
use serde::{Serialize, Serializer};

// ============================================================================
// 修饰键集合
// ============================================================================

/// 修饰键位集合，仅包含 Cmd / Ctrl / Alt / Shift 四种。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Modifiers(u8);

impl Modifiers {
    pub const NONE: Self = Self(0);
    pub const CMD: Self = Self(1 << 0);
    pub const CTRL: Self = Self(1 << 1);
    pub const ALT: Self = Self(1 << 2);
    pub const SHIFT: Self = Self(1 << 3);
    pub const ALL: Self = Self(0b1111);

    /// 规范字符串中修饰键的固定顺序。
    pub const ORDERED: [(Self, &'static str); 4] = [
        (Self::CMD, "cmd"),
        (Self::CTRL, "ctrl"),
        (Self::ALT, "alt"),
        (Self::SHIFT, "shift"),
    ];

    pub const fn bits(self) -> u8 {
        self.0
    }

    /// 从任意事件标志位截取修饰键部分，其余位（大写锁定、Fn 等）全部丢弃。
    pub const fn from_bits_truncate(bits: u32) -> Self {
        Self((bits & Self::ALL.0 as u32) as u8)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for Modifiers {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

fn modifier_for_token(token: &str) -> Option<Modifiers> {
    match token {
        "cmd" | "command" => Some(Modifiers::CMD),
        "ctrl" | "control" => Some(Modifiers::CTRL),
        "alt" | "option" => Some(Modifiers::ALT),
        "shift" => Some(Modifiers::SHIFT),
        _ => None,
    }
}

// ============================================================================
// 键名 ↔ 键码映射表
// ============================================================================

/// 主键名 → macOS 虚拟键码。键名均为小写规范形式。
const KEY_TABLE: &[(&str, u16)] = &[
    // 字母键
    ("a", 0x00), ("s", 0x01), ("d", 0x02), ("f", 0x03),
    ("h", 0x04), ("g", 0x05), ("z", 0x06), ("x", 0x07),
    ("c", 0x08), ("v", 0x09), ("b", 0x0B), ("q", 0x0C),
    ("w", 0x0D), ("e", 0x0E), ("r", 0x0F), ("y", 0x10),
    ("t", 0x11), ("o", 0x1F), ("u", 0x20), ("i", 0x22),
    ("p", 0x23), ("l", 0x25), ("j", 0x26), ("k", 0x28),
    ("n", 0x2D), ("m", 0x2E),
    // 数字键（主键盘）
    ("1", 0x12), ("2", 0x13), ("3", 0x14), ("4", 0x15), ("5", 0x17),
    ("6", 0x16), ("7", 0x1A), ("8", 0x1C), ("9", 0x19), ("0", 0x1D),
    // 符号键
    ("=", 0x18), ("-", 0x1B), ("]", 0x1E), ("[", 0x21), ("'", 0x27),
    (";", 0x29), ("\\", 0x2A), (",", 0x2B), ("/", 0x2C), (".", 0x2F),
    ("`", 0x32),
    // 特殊键
    ("enter", 0x24), ("tab", 0x30), ("space", 0x31), ("delete", 0x33),
    ("escape", 0x35),
    // 功能键
    ("f1", 0x7A), ("f2", 0x78), ("f3", 0x63), ("f4", 0x76),
    ("f5", 0x60), ("f6", 0x61), ("f7", 0x62), ("f8", 0x64),
    ("f9", 0x65), ("f10", 0x6D), ("f11", 0x67), ("f12", 0x6F),
];

/// 小键盘数字：只参与键码 → 键名的反查，解析时统一落到主键盘数字。
const KEYPAD_DIGITS: &[(&str, u16)] = &[
    ("0", 0x52), ("1", 0x53), ("2", 0x54), ("3", 0x55), ("4", 0x56),
    ("5", 0x57), ("6", 0x58), ("7", 0x59), ("8", 0x5B), ("9", 0x5C),
];

const KEY_ALIASES: &[(&str, &str)] = &[("return", "enter"), ("esc", "escape")];

static NAME_TO_CODE: Lazy<HashMap<&'static str, u16>> =
    Lazy::new(|| KEY_TABLE.iter().copied().collect());

static CODE_TO_NAME: Lazy<HashMap<u16, &'static str>> = Lazy::new(|| {
    KEY_TABLE
        .iter()
        .chain(KEYPAD_DIGITS.iter())
        .map(|&(name, code)| (code, name))
        .collect()
});

/// 按键名（大小写不敏感，支持少量别名）查询键码。
pub fn key_code_for(name: &str) -> Option<u16> {
    let lower = name.trim().to_ascii_lowercase();
    let canonical = KEY_ALIASES
        .iter()
        .find(|(alias, _)| *alias == lower)
        .map(|(_, target)| *target)
        .unwrap_or(lower.as_str());
    NAME_TO_CODE.get(canonical).copied()
}

/// 按键码反查规范键名。
pub fn key_name(code: u16) -> Option<&'static str> {
    CODE_TO_NAME.get(&code).copied()
}

/// 解析器可识别的全部主键名（规范形式）。
pub fn known_key_names() -> impl Iterator<Item = &'static str> {
    KEY_TABLE.iter().map(|(name, _)| *name)
}

// ============================================================================
// KeyCombo
// ============================================================================

/// 快捷键组合解析错误。
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// 主键数量不是 1（没有主键或多个主键）
    #[error("无效的快捷键组合，主键数量必须为 1: {main_keys:?}")]
    InvalidCombo { main_keys: Vec<String> },

    /// 主键不在键名表中
    #[error("未知按键: {0}")]
    UnknownKey(String),
}

/// 快捷键组合：主键码 + 修饰键集合，结构相等。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCombo {
    pub key_code: u16,
    pub modifiers: Modifiers,
}

impl KeyCombo {
    pub const fn new(key_code: u16, modifiers: Modifiers) -> Self {
        Self { key_code, modifiers }
    }

    /// 解析快捷键字符串。纯函数：相同输入总是得到相同结果。
    ///
    /// # 示例
    /// ```rust
    /// use clip_flow_native::hotkey::{KeyCombo, Modifiers};
    ///
    /// let combo = KeyCombo::parse("Cmd+Shift+V")?;
    /// assert_eq!(combo.modifiers, Modifiers::CMD | Modifiers::SHIFT);
    /// assert_eq!(combo.to_string(), "cmd+shift+v");
    /// # Ok::<(), clip_flow_native::hotkey::ParseError>(())
    /// ```
    pub fn parse(input: &str) -> Result<Self, ParseError> {
        let mut modifiers = Modifiers::NONE;
        let mut main_keys: Vec<String> = Vec::new();

        for token in input.split('+').map(str::trim).filter(|t| !t.is_empty()) {
            let lower = token.to_ascii_lowercase();
            match modifier_for_token(&lower) {
                Some(modifier) => modifiers.insert(modifier),
                None => main_keys.push(lower),
            }
        }

        if main_keys.len() != 1 {
            return Err(ParseError::InvalidCombo { main_keys });
        }

        let key = &main_keys[0];
        let key_code = key_code_for(key).ok_or_else(|| ParseError::UnknownKey(key.clone()))?;

        Ok(Self { key_code, modifiers })
    }

    /// 主键的规范名称；键码未收录时返回 `None`。
    pub fn key_name(&self) -> Option<&'static str> {
        key_name(self.key_code)
    }
}

impl FromStr for KeyCombo {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyCombo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (modifier, name) in Modifiers::ORDERED {
            if self.modifiers.contains(modifier) {
                write!(f, "{}+", name)?;
            }
        }
        f.write_str(self.key_name().unwrap_or("unknown"))
    }
}

/// 序列化为规范字符串，前端展示与诊断输出保持一致。
impl Serialize for KeyCombo {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.collect_str(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_folds_modifier_aliases_case_insensitively() {
        let a = KeyCombo::parse("Command+Option+Control+Shift+K").unwrap();
        let b = KeyCombo::parse("cmd+alt+ctrl+shift+k").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.modifiers, Modifiers::ALL);
        assert_eq!(a.key_code, 0x28);
    }

    #[test]
    fn parse_renders_canonical_modifier_order() {
        let combo = KeyCombo::parse("Shift+Alt+Ctrl+Cmd+C").unwrap();
        assert_eq!(combo.to_string(), "cmd+ctrl+alt+shift+c");
    }

    #[test]
    fn parse_accepts_function_and_named_keys() {
        assert_eq!(KeyCombo::parse("Cmd+F12").unwrap().key_code, 0x6F);
        assert_eq!(KeyCombo::parse("ctrl+Space").unwrap().key_code, 0x31);
        assert_eq!(KeyCombo::parse("alt+return").unwrap().to_string(), "alt+enter");
        assert_eq!(KeyCombo::parse("cmd+esc").unwrap().to_string(), "cmd+escape");
        assert_eq!(KeyCombo::parse("cmd+option+`").unwrap().to_string(), "cmd+alt+`");
    }

    #[test]
    fn parse_tolerates_whitespace_and_duplicate_modifiers() {
        let combo = KeyCombo::parse(" cmd + cmd + shift + v ").unwrap();
        assert_eq!(combo.to_string(), "cmd+shift+v");
    }

    #[test]
    fn parse_rejects_missing_or_multiple_main_keys() {
        assert_eq!(
            KeyCombo::parse("cmd+shift"),
            Err(ParseError::InvalidCombo { main_keys: vec![] })
        );
        assert_eq!(
            KeyCombo::parse(""),
            Err(ParseError::InvalidCombo { main_keys: vec![] })
        );
        assert_eq!(
            KeyCombo::parse("cmd+a+b"),
            Err(ParseError::InvalidCombo {
                main_keys: vec!["a".to_string(), "b".to_string()]
            })
        );
    }

    #[test]
    fn parse_rejects_unknown_key() {
        assert_eq!(
            KeyCombo::parse("cmd+f13"),
            Err(ParseError::UnknownKey("f13".to_string()))
        );
        assert_eq!(
            KeyCombo::parse("meta+v"),
            Err(ParseError::InvalidCombo {
                main_keys: vec!["meta".to_string(), "v".to_string()]
            })
        );
    }

    #[test]
    fn keypad_digits_render_as_digits() {
        let combo = KeyCombo::new(0x53, Modifiers::CMD);
        assert_eq!(combo.to_string(), "cmd+1");
        assert_ne!(combo, KeyCombo::parse("cmd+1").unwrap());
    }

    #[test]
    fn unmapped_key_code_renders_unknown() {
        assert_eq!(KeyCombo::new(0x7F, Modifiers::SHIFT).to_string(), "shift+unknown");
    }

    #[test]
    fn from_bits_truncate_drops_non_modifier_flags() {
        let bits = (Modifiers::CMD | Modifiers::SHIFT).bits() as u32 | 1 << 8 | 1 << 9;
        assert_eq!(
            Modifiers::from_bits_truncate(bits),
            Modifiers::CMD | Modifiers::SHIFT
        );
    }

    #[test]
    fn combo_serializes_as_canonical_string() {
        let combo = KeyCombo::parse("Cmd+Shift+V").unwrap();
        assert_eq!(serde_json::to_string(&combo).unwrap(), "\"cmd+shift+v\"");
    }
}
