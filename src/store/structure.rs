use std::collections::BTreeSet;
use std::io;

use tracing::info;

use super::TranslationStore;
use crate::full_key::FullKey;
use crate::line::Line;
use crate::locale_file::LocaleFile;
use crate::state::TranslationEntry;
use crate::utils::{is_valid_file_name, validate_key, Result, StoreError};

/// 撤销范围，两个字段都为 `None` 时撤销全部
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RevertScope {
    pub file_name: Option<String>,
    pub key: Option<String>,
}

impl RevertScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn file(file_name: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            key: None,
        }
    }

    pub fn key(key: impl Into<String>) -> Self {
        Self {
            file_name: None,
            key: Some(key.into()),
        }
    }

    pub fn entry(file_name: impl Into<String>, key: impl Into<String>) -> Self {
        Self {
            file_name: Some(file_name.into()),
            key: Some(key.into()),
        }
    }

    fn matches(&self, full_key: &FullKey) -> bool {
        let (file_name, key) = full_key.decompose();
        self.file_name.as_deref().map_or(true, |f| f == file_name)
            && self.key.as_deref().map_or(true, |k| k == key)
    }
}

impl TranslationStore {
    // === 直接编辑 ===

    /// 修改值，审核标记被清除
    ///
    /// # 参数
    /// * `file_name` - 语言文件名
    /// * `key` - 已注册的键
    /// * `value` - 新值，可以包含换行
    ///
    /// # 返回
    /// 文件或键不存在时返回 `FileNotExists` / `KeyNotExists`
    pub fn update_value(&mut self, file_name: &str, key: &str, value: &str) -> Result<()> {
        self.gated("update_value", |store| {
            store.check_entry_target(file_name, key)?;
            store.append(file_name, Line::value(key, value, false))
        })
    }

    /// 修改注释，值与审核标记不变
    ///
    /// # 参数
    /// * `file_name` - 语言文件名
    /// * `key` - 已注册的键
    /// * `comment` - 新注释
    pub fn update_comment(&mut self, file_name: &str, key: &str, comment: &str) -> Result<()> {
        self.gated("update_comment", |store| {
            store.check_entry_target(file_name, key)?;
            store.append(file_name, Line::comment(key, comment))
        })
    }

    /// 修改审核标记，值保持不变（没有值时写入空值）
    pub fn update_approved(&mut self, file_name: &str, key: &str, approved: bool) -> Result<()> {
        self.gated("update_approved", |store| {
            store.check_entry_target(file_name, key)?;
            let value = store
                .state
                .translation(file_name, key)
                .and_then(|entry| entry.value.clone())
                .unwrap_or_default();
            store.append(file_name, Line::value(key, value, approved))
        })
    }

    /// 整体写入一个条目：先注释行，再值行
    ///
    /// # 参数
    /// * `entry` - 新条目，`key` 字段被忽略，以参数 `key` 为准
    pub fn update_translation(&mut self, file_name: &str, key: &str, entry: &TranslationEntry) -> Result<()> {
        self.gated("update_translation", |store| {
            store.check_entry_target(file_name, key)?;
            store.write_translation(file_name, key, entry)
        })
    }

    fn check_entry_target(&self, file_name: &str, key: &str) -> Result<()> {
        if !self.state.has_file(file_name) {
            return Err(StoreError::FileNotExists(file_name.to_string()));
        }
        if !self.state.keys.contains(key) {
            return Err(StoreError::KeyNotExists(key.to_string()));
        }
        Ok(())
    }

    fn write_translation(&mut self, file_name: &str, key: &str, entry: &TranslationEntry) -> Result<()> {
        if let Some(comment) = &entry.comment {
            self.append(file_name, Line::comment(key, comment))?;
        }
        let value = entry.value.clone().unwrap_or_default();
        self.append(file_name, Line::value(key, value, entry.approved))
    }

    // === 键操作 ===

    /// 新增键，每个文件追加一行空的未审核值
    ///
    /// # 参数
    /// * `key` - 新键，不能为空也不能包含分隔符
    ///
    /// # 返回
    /// 键已存在返回 `KeyExists`，没有语言文件返回 `NoLocaleFiles`
    pub fn add_key(&mut self, key: &str) -> Result<()> {
        self.gated("add_key", |store| {
            validate_key(key)?;
            let position = store
                .state
                .keys
                .sorted_index_of(key)
                .ok_or_else(|| StoreError::KeyExists(key.to_string()))?;
            if store.state.files.is_empty() {
                return Err(StoreError::NoLocaleFiles);
            }

            store.state.keys.insert(position, key);
            store.state.keys_changed = true;
            for file_name in store.file_names() {
                store.append(&file_name, Line::value(key, "", false))?;
            }
            info!("added key {}", key);
            Ok(())
        })
    }

    /// 复制键的所有条目到新键
    ///
    /// # 参数
    /// * `from` - 已注册的源键
    /// * `to` - 尚未注册的目标键
    pub fn copy_key(&mut self, from: &str, to: &str) -> Result<()> {
        self.gated("copy_key", |store| store.copy_key_unchecked(from, to))
    }

    fn copy_key_unchecked(&mut self, from: &str, to: &str) -> Result<()> {
        if from == to {
            return Ok(());
        }
        validate_key(to)?;
        if !self.state.keys.contains(from) {
            return Err(StoreError::KeyNotExists(from.to_string()));
        }
        let position = self
            .state
            .keys
            .sorted_index_of(to)
            .ok_or_else(|| StoreError::KeyExists(to.to_string()))?;

        self.state.keys.insert(position, to);
        self.state.keys_changed = true;
        for file_name in self.file_names() {
            let entry = self
                .state
                .translation(&file_name, from)
                .cloned()
                .unwrap_or_else(|| TranslationEntry::new(to));
            self.write_translation(&file_name, to, &entry)?;
        }
        info!("copied key {} to {}", from, to);
        Ok(())
    }

    /// 重命名 = 复制 + 删除
    pub fn rename_key(&mut self, from: &str, to: &str) -> Result<()> {
        self.gated("rename_key", |store| {
            if from == to {
                return Ok(());
            }
            store.copy_key_unchecked(from, to)?;
            store.delete_key_unchecked(from)
        })
    }

    /// 删除键，键不存在时什么也不做
    pub fn delete_key(&mut self, key: &str) -> Result<()> {
        self.gated("delete_key", |store| store.delete_key_unchecked(key))
    }

    fn delete_key_unchecked(&mut self, key: &str) -> Result<()> {
        if !self.state.keys.remove(key) {
            return Ok(());
        }
        self.state.keys_changed = true;
        for file_name in self.file_names() {
            self.append(&file_name, Line::delete(key))?;
        }
        info!("deleted key {}", key);
        Ok(())
    }

    /// 撤销范围内的待处理更新，恢复为基线
    ///
    /// # 参数
    /// * `scope` - 撤销范围，文件与键都为空时表示全部
    ///
    /// 日志因此清空时压缩，否则只重写日志行。
    pub fn revert(&mut self, scope: &RevertScope) -> Result<()> {
        self.gated("revert", |store| store.revert_unchecked(scope))
    }

    fn revert_unchecked(&mut self, scope: &RevertScope) -> Result<()> {
        let touched = self.state.updates.touched();
        let mut affected_keys = BTreeSet::new();

        for full_key in touched.iter().filter(|k| scope.matches(k)) {
            match self.state.original.get(full_key) {
                Some(entry) => {
                    self.state.updated.insert(full_key.clone(), entry.clone());
                }
                None => {
                    self.state.updated.remove(full_key);
                }
            }
            self.state.updates.forget(full_key);
            affected_keys.insert(full_key.key().to_string());
        }

        if affected_keys.is_empty() {
            return Ok(());
        }

        // 注册表跟随恢复后的条目：被撤销的新增键移除，被撤销的删除键恢复
        for key in &affected_keys {
            let present = self
                .state
                .files
                .iter()
                .any(|file| self.state.updated.contains_key(&FullKey::compose(&file.name, key)));
            let changed = if present {
                self.state.keys.add(key)
            } else {
                self.state.keys.remove(key)
            };
            if changed {
                self.state.keys_changed = true;
            }
        }

        if self.state.updates.recount() == 0 {
            self.compact()?;
        } else {
            self.rewrite_log()?;
        }
        info!("reverted {} keys", affected_keys.len());

        self.schedule_change();
        self.schedule_auto_export();
        Ok(())
    }

    // === 文件操作 ===

    /// 新增语言文件，要求没有待处理更新
    ///
    /// # 参数
    /// * `file_name` - 符合命名约定的文件名
    ///
    /// # 返回
    /// 有待处理更新返回 `UnappliedChanges`，文件已存在返回 `FileExists`
    pub fn add_file(&mut self, file_name: &str) -> Result<()> {
        self.gated("add_file", |store| {
            if store.is_dirty() {
                return Err(StoreError::UnappliedChanges);
            }
            let file = store.check_file_name(file_name)?;
            if store.state.has_file(file_name) {
                return Err(StoreError::FileExists(file_name.to_string()));
            }

            store.storage.create_file(&file.path).map_err(|e| {
                if e.kind() == io::ErrorKind::AlreadyExists {
                    StoreError::FileExists(file_name.to_string())
                } else {
                    StoreError::Io(e)
                }
            })?;

            store.state.files.push(file);
            store.state.files.sort_by(|a, b| a.name.cmp(&b.name));
            store.state.keys_changed = true;
            store.compact()?;
            info!("added locale file {}", file_name);
            Ok(())
        })
    }

    /// 删除语言文件，要求没有待处理更新
    pub fn delete_file(&mut self, file_name: &str) -> Result<()> {
        self.gated("delete_file", |store| {
            if store.is_dirty() {
                return Err(StoreError::UnappliedChanges);
            }
            store.check_file_name(file_name)?;
            let path = store.file_path(file_name)?;

            store.storage.delete_file(&path)?;

            store.state.files.retain(|f| f.name != file_name);
            store.state.original.retain(|k, _| k.file_name() != file_name);
            store.state.updated.retain(|k, _| k.file_name() != file_name);
            store.state.keys_changed = true;
            store.compact()?;
            info!("deleted locale file {}", file_name);
            Ok(())
        })
    }

    fn check_file_name(&self, file_name: &str) -> Result<LocaleFile> {
        if !is_valid_file_name(file_name) || file_name == self.options.export_module {
            return Err(StoreError::InvalidFileName(file_name.to_string()));
        }
        self.pattern
            .parse(&self.options.directory, file_name)
            .ok_or_else(|| StoreError::InvalidFileName(file_name.to_string()))
    }

    fn file_names(&self) -> Vec<String> {
        self.state.files.iter().map(|f| f.name.clone()).collect()
    }
}
