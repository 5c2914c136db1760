use std::collections::{BTreeSet, HashMap};
use std::time::Instant;

use tracing::{debug, info};

use super::TranslationStore;
use crate::full_key::FullKey;
use crate::io::Storage;
use crate::line::{Line, LineKind};
use crate::locale_file::LocaleFile;
use crate::state::{entries_equal, EngineState, TranslationEntry};
use crate::utils::Result;

fn set_field(entry: &mut TranslationEntry, kind: LineKind, value: &str) {
    match kind {
        LineKind::Comment => entry.comment = Some(value.to_string()),
        LineKind::Value { approved } => {
            entry.value = Some(value.to_string());
            entry.approved = approved;
        }
        LineKind::Delete => {}
    }
}

impl EngineState {
    /// 把一行基线内容合并进 `original`
    pub(crate) fn apply_baseline(&mut self, file_name: &str, line: &Line) {
        let full_key = FullKey::compose(file_name, &line.key);
        match line.kind {
            LineKind::Delete => {
                self.original.remove(&full_key);
            }
            kind => {
                let entry = self
                    .original
                    .entry(full_key)
                    .or_insert_with(|| TranslationEntry::new(&line.key));
                set_field(entry, kind, &line.value);
            }
        }
    }

    /// 状态转换：把一行更新应用到 `updated` 与更新日志
    ///
    /// 第一次触及某个 FullKey 时把它的基线值记入 `updates.before`；
    /// 删除行从工作视图与 `after` 中移除条目，并把键移出注册表。
    pub(crate) fn apply_update(&mut self, file_name: &str, line: &Line) {
        let full_key = FullKey::compose(file_name, &line.key);
        if !self.updates.before.contains_key(&full_key) {
            let baseline = self.original.get(&full_key).cloned();
            self.updates.before.insert(full_key.clone(), baseline);
        }

        match line.kind {
            LineKind::Delete => {
                self.updated.remove(&full_key);
                self.updates.after.remove(&full_key);
                if self.keys.remove(&line.key) {
                    self.keys_changed = true;
                }
            }
            kind => {
                let entry = self
                    .updated
                    .entry(full_key.clone())
                    .or_insert_with(|| TranslationEntry::new(&line.key));
                set_field(entry, kind, &line.value);
                self.updates.after.insert(full_key, entry.clone());
            }
        }
        self.updates.recount();
    }
}

impl TranslationStore {
    /// 单个编辑单元：编码、应用、优化，然后追加到文件
    ///
    /// 如果优化器因为净变化为零而触发了压缩，这一行已经体现在新的基线里，
    /// 不再追加。
    pub(crate) fn append(&mut self, file_name: &str, line: Line) -> Result<()> {
        let path = self.file_path(file_name)?;
        let encoded = line.encode_update();

        self.state.apply_update(file_name, &line);
        let compacted = self.optimize()?;
        if !compacted {
            self.storage.append_line(&path, &encoded)?;
            self.last_write = Some(Instant::now());
            debug!("{}: appended {}", file_name, encoded);
        }

        self.schedule_change();
        self.schedule_auto_export();
        Ok(())
    }

    /// 优化器：丢弃与基线相同的日志条目
    ///
    /// 日志从非空变为空时执行压缩，返回是否压缩。
    pub(crate) fn optimize(&mut self) -> Result<bool> {
        let touched = self.state.updates.touched();
        if touched.is_empty() {
            return Ok(false);
        }

        for full_key in &touched {
            if entries_equal(self.state.original.get(full_key), self.state.updated.get(full_key)) {
                self.state.updates.forget(full_key);
            }
        }

        if self.state.updates.recount() == 0 {
            self.compact()?;
            return Ok(true);
        }
        Ok(false)
    }

    /// 强制压缩：按当前状态重写所有语言文件并清空日志
    pub fn save(&mut self) -> Result<()> {
        self.gated("save", |store| store.compact())
    }

    /// 保存（压缩）
    ///
    /// 按注册表顺序为每个键输出跨文件对齐的块：任何文件有注释时，所有文件都
    /// 输出注释行（没有则为空），随后每个文件输出一行值。所有更新行被丢弃。
    pub(crate) fn compact(&mut self) -> Result<()> {
        let keys: Vec<String> = self.state.keys.iter().map(str::to_string).collect();
        let rendered = render_blocks(&self.state.files, &keys, &mut self.state.updated);

        for (file, lines) in self.state.files.iter().zip(rendered) {
            write_lines(self.storage.as_ref(), file, &lines)?;
        }
        self.last_write = Some(Instant::now());

        self.state.reset_updates();
        info!(
            "compacted {} locale files ({} keys)",
            self.state.files.len(),
            keys.len()
        );

        self.schedule_change();
        self.schedule_auto_export();
        Ok(())
    }

    /// 只重写日志：基线来自 `original`，日志由剩余的待处理条目重新生成
    ///
    /// 部分撤销之后使用，保证磁盘上不再留有被撤销条目的更新行。
    pub(crate) fn rewrite_log(&mut self) -> Result<()> {
        let mut original = self.state.original.clone();
        let baseline_keys: Vec<String> = original
            .values()
            .map(|entry| entry.key.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let rendered = render_blocks(&self.state.files, &baseline_keys, &mut original);

        let touched = self.state.updates.touched();
        for (file, mut lines) in self.state.files.iter().zip(rendered) {
            for full_key in touched.iter().filter(|k| k.file_name() == file.name) {
                match self.state.updates.after.get(full_key) {
                    Some(entry) => {
                        if let Some(comment) = &entry.comment {
                            lines.push(Line::comment(&entry.key, comment).encode_update());
                        }
                        if let Some(value) = &entry.value {
                            lines.push(Line::value(&entry.key, value, entry.approved).encode_update());
                        }
                    }
                    None => lines.push(Line::delete(full_key.key()).encode_update()),
                }
            }
            write_lines(self.storage.as_ref(), file, &lines)?;
        }
        self.last_write = Some(Instant::now());

        debug!("rewrote update log ({} pending)", self.state.updates.len());
        Ok(())
    }
}

fn write_lines(storage: &dyn Storage, file: &LocaleFile, lines: &[String]) -> Result<()> {
    let mut writer = storage.line_writer(&file.path)?;
    for line in lines {
        writer.write_line(line)?;
    }
    writer.close()?;
    Ok(())
}

/// 生成每个文件的基线行
///
/// 输出的空注释/空值会同步写回 `entries`，使内存状态与磁盘内容一致。
fn render_blocks(
    files: &[LocaleFile],
    keys: &[String],
    entries: &mut HashMap<FullKey, TranslationEntry>,
) -> Vec<Vec<String>> {
    let mut rendered = vec![Vec::new(); files.len()];

    for key in keys {
        let full_keys: Vec<FullKey> = files
            .iter()
            .map(|file| FullKey::compose(&file.name, key))
            .collect();
        let any_comment = full_keys
            .iter()
            .any(|full_key| entries.get(full_key).is_some_and(|e| e.has_comment()));

        for (lines, full_key) in rendered.iter_mut().zip(&full_keys) {
            let entry = entries
                .entry(full_key.clone())
                .or_insert_with(|| TranslationEntry::new(key.as_str()));
            if any_comment {
                let comment = entry.comment.get_or_insert_with(String::new);
                lines.push(Line::comment(key.as_str(), comment.as_str()).encode());
            }
            let value = entry.value.get_or_insert_with(String::new);
            lines.push(Line::value(key.as_str(), value.as_str(), entry.approved).encode());
        }
    }

    rendered
}
