//! # 应用感知抑制策略
//!
//! 前台为开发 / 设计工具时，让路给它们最常用的快捷键：
//!
//! | 场景 | 规则 |
//! |------|------|
//! | 开发者模式 + 开发工具 | 仅放行开发者白名单 |
//! | 开发工具 / 设计工具 | 冲突名单内的组合被抑制，除非同时在应用默认白名单中（白名单优先） |
//! | 其他 | 不抑制 |
//!
//! 名单与原生插件保持一致；其中白名单会重新放行部分冲突组合，
//! 这一优先级关系按原样保留。

use std::collections::HashSet;

use once_cell::sync::Lazy;

use super::combo::KeyCombo;
use super::foreground::{AppCategory, ForegroundAppState};

const DEVELOPER_MODE_ALLOWED: &[&str] = &[
    "cmd+f8", "cmd+f9", "cmd+option+`", "cmd+control+v", "cmd+shift+f",
];

const CONFLICTING_IN_TOOLS: &[&str] = &[
    "cmd+shift+o", "cmd+j", "cmd+shift+j", "cmd+option+j",
    "cmd+shift+b", "cmd+option+b", "cmd+control+b",
    "cmd+shift+c", "cmd+option+c", "cmd+control+c",
    "cmd+shift+d", "cmd+shift+e", "cmd+shift+k",
    "cmd+shift+l", "cmd+shift+m", "cmd+shift+n",
    "cmd+shift+p", "cmd+shift+r", "cmd+shift+u",
    "cmd+shift+w", "cmd+shift+y", "cmd+shift+z",
    "cmd+1", "cmd+2", "cmd+3", "cmd+4", "cmd+5",
    "cmd+6", "cmd+7", "cmd+8", "cmd+9", "cmd+0",
];

const ALWAYS_ALLOWED_APP_DEFAULTS: &[&str] = &[
    "cmd+option+`", "cmd+control+v", "cmd+f9", "cmd+f8", "cmd+shift+f",
];

fn combo_set(raw: &[&str]) -> HashSet<KeyCombo> {
    raw.iter()
        .filter_map(|entry| match KeyCombo::parse(entry) {
            Ok(combo) => Some(combo),
            Err(err) => {
                log::warn!("⚠️ 忽略无法解析的策略条目 {:?}: {}", entry, err);
                None
            }
        })
        .collect()
}

/// 抑制判定结果。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SuppressionVerdict {
    Allow,
    /// 开发者模式下不在开发者白名单中
    DeveloperModeRestricted,
    /// 命中开发 / 设计工具的冲突名单
    ConflictsWithApp,
}

impl SuppressionVerdict {
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// 应用感知抑制策略（三份名单均为规范化后的组合集合）。
#[derive(Debug, Clone)]
pub struct SuppressionPolicy {
    developer_allowed: HashSet<KeyCombo>,
    conflicting: HashSet<KeyCombo>,
    always_allowed: HashSet<KeyCombo>,
}

static DEFAULT_POLICY: Lazy<SuppressionPolicy> = Lazy::new(|| {
    SuppressionPolicy::with_lists(
        DEVELOPER_MODE_ALLOWED,
        CONFLICTING_IN_TOOLS,
        ALWAYS_ALLOWED_APP_DEFAULTS,
    )
});

impl Default for SuppressionPolicy {
    fn default() -> Self {
        DEFAULT_POLICY.clone()
    }
}

impl SuppressionPolicy {
    pub fn with_lists(
        developer_allowed: &[&str],
        conflicting: &[&str],
        always_allowed: &[&str],
    ) -> Self {
        Self {
            developer_allowed: combo_set(developer_allowed),
            conflicting: combo_set(conflicting),
            always_allowed: combo_set(always_allowed),
        }
    }

    /// 基于前台应用类别与开发者模式的纯判定函数。
    pub fn evaluate(
        &self,
        combo: &KeyCombo,
        category: AppCategory,
        developer_mode: bool,
    ) -> SuppressionVerdict {
        if developer_mode && category == AppCategory::Development {
            return if self.developer_allowed.contains(combo) {
                SuppressionVerdict::Allow
            } else {
                SuppressionVerdict::DeveloperModeRestricted
            };
        }

        if matches!(category, AppCategory::Development | AppCategory::Design)
            && self.conflicting.contains(combo)
            && !self.always_allowed.contains(combo)
        {
            return SuppressionVerdict::ConflictsWithApp;
        }

        SuppressionVerdict::Allow
    }

    pub fn evaluate_state(&self, combo: &KeyCombo, state: &ForegroundAppState) -> SuppressionVerdict {
        self.evaluate(combo, state.classification, state.developer_mode_enabled)
    }
}
