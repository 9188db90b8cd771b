//! # 系统快捷键判定模块
//!
//! ## 设计思路
//!
//! 维护一份“被操作系统与常用开发/设计工具占用”的快捷键集合，
//! 注册前拒绝这些组合，避免抢占系统或前台应用的核心快捷键。
//! 集合来自静态整理的清单（不向系统内省其他应用的真实绑定）。
//!
//! ## 实现思路
//!
//! - 清单在重建时逐条经过 `KeyCombo::parse` 再渲染，统一落到规范字符串，
//!   `option`/`control`/`ctrl+cmd+q` 等写法都能正确命中。
//! - 缓存带有效期：过期（或从未构建）时在本次查询返回前同步重建，
//!   不会以空缓存作答。
//! - 重建在锁外进行、结果整体替换，多个查询并发触发重建是安全的（后写者胜出），
//!   因为底层清单在进程内是静态的。

use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use super::clock::Clock;
use super::combo::KeyCombo;

/// 保留快捷键清单加载失败。
#[derive(Debug, thiserror::Error)]
#[error("系统快捷键清单加载失败: {0}")]
pub struct ShortcutSourceError(pub String);

/// 保留快捷键清单来源。
pub trait ReservedShortcutSource: Send + Sync {
    fn load(&self) -> Result<Vec<String>, ShortcutSourceError>;
}

/// 内置整理的保留快捷键清单。
#[derive(Debug, Default, Clone, Copy)]
pub struct CuratedShortcuts;

impl ReservedShortcutSource for CuratedShortcuts {
    fn load(&self) -> Result<Vec<String>, ShortcutSourceError> {
        Ok(curated_reserved_shortcuts())
    }
}

const OS_SHORTCUTS: &[&str] = &[
    "cmd+q", "cmd+w", "cmd+tab", "cmd+space",
    "cmd+c", "cmd+v", "cmd+x", "cmd+z", "cmd+y",
    "cmd+a", "cmd+s", "cmd+f", "cmd+g", "cmd+h",
    "cmd+m", "cmd+n", "cmd+o", "cmd+p", "cmd+r",
    "cmd+t", "cmd+shift+3", "cmd+shift+4", "cmd+shift+5",
];

const DEVELOPER_TOOL_SHORTCUTS: &[&str] = &[
    "cmd+shift+o", "cmd+j", "cmd+shift+j", "cmd+option+j",
    "cmd+shift+b", "cmd+option+b", "cmd+control+b",
    "cmd+shift+c", "cmd+option+c", "cmd+control+c",
    "cmd+shift+d", "cmd+shift+e", "cmd+shift+k",
    "cmd+shift+l", "cmd+shift+m", "cmd+shift+n",
    "cmd+shift+p", "cmd+shift+r", "cmd+shift+u",
    "cmd+shift+w", "cmd+shift+y", "cmd+shift+z",
    "cmd+option+0", "cmd+option+1", "cmd+option+2",
    "cmd+option+3", "cmd+option+4", "cmd+option+5",
    "cmd+option+6", "cmd+option+7", "cmd+option+8",
    "cmd+option+9", "cmd+control+0", "cmd+control+1",
    "cmd+control+2", "cmd+control+3", "cmd+control+4",
    "cmd+control+5", "cmd+control+6", "cmd+control+7",
    "cmd+control+8", "cmd+control+9",
];

const EDITOR_SHORTCUTS: &[&str] = &[
    "cmd+1", "cmd+2", "cmd+3", "cmd+4", "cmd+5",
    "cmd+6", "cmd+7", "cmd+8", "cmd+9", "cmd+0",
    "cmd+-", "cmd+=", "cmd+[", "cmd+]", "cmd+\\",
    "cmd+;", "cmd+'", "cmd+,", "cmd+.", "cmd+/",
    "cmd+option+t", "cmd+option+w", "cmd+option+r",
    "cmd+control+t", "cmd+control+w", "cmd+control+r",
];

/// 功能键在这些修饰前缀下全部视为保留。
const FUNCTION_KEY_PREFIXES: &[&str] = &[
    "cmd", "cmd+shift", "cmd+option", "cmd+control",
    "ctrl", "ctrl+shift", "ctrl+option",
];

const WINDOW_MANAGEMENT_SHORTCUTS: &[&str] = &[
    "cmd+option+escape", "cmd+control+q", "ctrl+cmd+q",
    "cmd+option+d", "cmd+control+d", "cmd+shift+d",
    "cmd+option+f", "cmd+control+f", "cmd+option+h",
    "cmd+option+i", "cmd+option+j", "cmd+option+k",
    "cmd+option+l", "cmd+option+m", "cmd+option+n",
];

/// 生成内置保留清单（原始写法，未规范化）。
pub fn curated_reserved_shortcuts() -> Vec<String> {
    let mut shortcuts: Vec<String> = OS_SHORTCUTS
        .iter()
        .chain(DEVELOPER_TOOL_SHORTCUTS)
        .chain(EDITOR_SHORTCUTS)
        .chain(WINDOW_MANAGEMENT_SHORTCUTS)
        .map(|s| s.to_string())
        .collect();

    for prefix in FUNCTION_KEY_PREFIXES {
        for n in 1..=12 {
            shortcuts.push(format!("{}+f{}", prefix, n));
        }
    }

    shortcuts
}

/// 将原始清单规范化为缓存条目；无法解析的条目记录日志后跳过。
fn canonicalize(raw: Vec<String>) -> HashSet<String> {
    raw.into_iter()
        .filter_map(|entry| match KeyCombo::parse(&entry) {
            Ok(combo) => Some(combo.to_string()),
            Err(err) => {
                log::warn!("⚠️ 忽略无法解析的系统快捷键条目 {:?}: {}", entry, err);
                None
            }
        })
        .collect()
}

#[derive(Debug, Default)]
struct SystemShortcutCache {
    entries: Arc<HashSet<String>>,
    captured_at: Option<Instant>,
}

/// 系统快捷键判定器（带有效期缓存）。
pub struct SystemShortcutOracle {
    clock: Arc<dyn Clock>,
    source: Arc<dyn ReservedShortcutSource>,
    ttl: Duration,
    cache: Mutex<SystemShortcutCache>,
}

impl SystemShortcutOracle {
    pub fn new(
        clock: Arc<dyn Clock>,
        source: Arc<dyn ReservedShortcutSource>,
        ttl: Duration,
    ) -> Self {
        Self {
            clock,
            source,
            ttl,
            cache: Mutex::new(SystemShortcutCache::default()),
        }
    }

    fn lock_cache(&self) -> MutexGuard<'_, SystemShortcutCache> {
        match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                log::warn!("系统快捷键缓存锁中毒，继续使用恢复数据");
                poisoned.into_inner()
            }
        }
    }

    /// 返回当前有效的保留集合，过期时先同步重建。
    fn entries(&self) -> Arc<HashSet<String>> {
        let now = self.clock.now();
        {
            let cache = self.lock_cache();
            let fresh = cache
                .captured_at
                .is_some_and(|at| now.saturating_duration_since(at) <= self.ttl);
            if fresh {
                return Arc::clone(&cache.entries);
            }
        }

        match self.source.load() {
            Ok(raw) => {
                let entries = Arc::new(canonicalize(raw));
                log::debug!("⌨️ 已加载 {} 个系统快捷键", entries.len());
                let mut cache = self.lock_cache();
                cache.entries = Arc::clone(&entries);
                cache.captured_at = Some(now);
                entries
            }
            Err(err) => {
                // 保留旧条目；冷缓存时等价于“不是系统快捷键”
                log::warn!("⚠️ {}，沿用上一次的缓存", err);
                Arc::clone(&self.lock_cache().entries)
            }
        }
    }

    pub fn is_reserved(&self, combo: &KeyCombo) -> bool {
        self.is_reserved_str(&combo.to_string())
    }

    /// 按规范字符串查询。
    pub fn is_reserved_str(&self, canonical: &str) -> bool {
        self.entries().contains(canonical)
    }

    pub fn entry_count(&self) -> usize {
        self.entries().len()
    }
}
