use std::collections::{BTreeSet, HashMap};

use serde::{Deserialize, Serialize};

use crate::full_key::FullKey;
use crate::key_registry::KeyRegistry;
use crate::locale_file::LocaleFile;
use crate::utils::{normalize_newlines, LoadFailure};

/// 单个 (文件, 键) 的翻译条目
///
/// `value` / `comment` 为 `None` 表示该文件没有设置。没有显式审核标记时
/// `approved` 为 false。
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationEntry {
    pub key: String,
    pub value: Option<String>,
    pub comment: Option<String>,
    pub approved: bool,
}

impl TranslationEntry {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            ..Default::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>, approved: bool) -> Self {
        self.value = Some(value.into());
        self.approved = approved;
        self
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn has_value(&self) -> bool {
        self.value.as_deref().is_some_and(|v| !v.is_empty())
    }

    pub fn has_comment(&self) -> bool {
        self.comment.as_deref().is_some_and(|c| !c.is_empty())
    }
}

/// 比较两个条目（缺失的条目视为空条目），换行统一后逐字段比较
pub fn entries_equal(a: Option<&TranslationEntry>, b: Option<&TranslationEntry>) -> bool {
    fn text_eq(a: Option<&str>, b: Option<&str>) -> bool {
        match (a, b) {
            (Some(a), Some(b)) => normalize_newlines(a) == normalize_newlines(b),
            (None, None) => true,
            _ => false,
        }
    }

    let empty = TranslationEntry::default();
    let a = a.unwrap_or(&empty);
    let b = b.unwrap_or(&empty);

    text_eq(a.value.as_deref(), b.value.as_deref())
        && text_eq(a.comment.as_deref(), b.comment.as_deref())
        && a.approved == b.approved
}

/// 待处理更新日志
///
/// `before` 记录每个 FullKey 第一次被修改前的基线值（不存在则为 `None`），
/// `after` 记录最新值；被删除的条目只出现在 `before` 中。
#[derive(Debug, Clone, Default)]
pub struct UpdateLog {
    pub before: HashMap<FullKey, Option<TranslationEntry>>,
    pub after: HashMap<FullKey, TranslationEntry>,
    len: usize,
}

impl UpdateLog {
    /// `before` 与 `after` 键的并集（有序）
    pub fn touched(&self) -> BTreeSet<FullKey> {
        self.before
            .keys()
            .chain(self.after.keys())
            .cloned()
            .collect()
    }

    /// 重新计算长度
    pub fn recount(&mut self) -> usize {
        self.len = self
            .before
            .keys()
            .chain(self.after.keys().filter(|k| !self.before.contains_key(*k)))
            .count();
        self.len
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn forget(&mut self, full_key: &FullKey) {
        self.before.remove(full_key);
        self.after.remove(full_key);
    }

    pub fn clear(&mut self) {
        self.before.clear();
        self.after.clear();
        self.len = 0;
    }
}

/// 引擎状态
///
/// 每个引擎实例独占一个，加载时整体替换，编辑时增量修改。
/// 外部只能拿到只读引用。
#[derive(Debug, Clone, Default)]
pub struct EngineState {
    pub keys: KeyRegistry,
    /// 键集合变化后置位，通知送达后清除
    pub keys_changed: bool,
    pub files: Vec<LocaleFile>,
    /// 最近一次加载/保存的基线
    pub original: HashMap<FullKey, TranslationEntry>,
    /// 当前工作视图（基线 + 已应用的更新）
    pub updated: HashMap<FullKey, TranslationEntry>,
    pub updates: UpdateLog,
    pub error: Option<LoadFailure>,
    pub loaded: bool,
}

impl EngineState {
    pub fn file(&self, name: &str) -> Option<&LocaleFile> {
        self.files.iter().find(|f| f.name == name)
    }

    pub fn has_file(&self, name: &str) -> bool {
        self.file(name).is_some()
    }

    pub fn translation(&self, file_name: &str, key: &str) -> Option<&TranslationEntry> {
        self.updated.get(&FullKey::compose(file_name, key))
    }

    pub fn original_translation(&self, file_name: &str, key: &str) -> Option<&TranslationEntry> {
        self.original.get(&FullKey::compose(file_name, key))
    }

    /// 开始新的编辑会话：清空日志，当前视图成为基线
    pub(crate) fn reset_updates(&mut self) {
        self.updates.clear();
        self.original = self.updated.clone();
    }
}
