use std::collections::{BTreeSet, HashSet};
use std::io;

use tracing::{debug, info, warn};

use super::TranslationStore;
use crate::io::{LineReader, Storage};
use crate::key_registry::KeyRegistry;
use crate::line::{strip_update_prefix, Line, LineKind};
use crate::locale_file::LocaleFile;
use crate::state::EngineState;
use crate::utils::{LoadFailure, Result, StoreError};

/// 基线之后排队等待重放的更新行：(行号, 去掉前缀的内容)
type QueuedLines = Vec<(usize, String)>;

impl TranslationStore {
    /// 加载（或重新加载）目录中的所有语言文件
    ///
    /// 解析错误与重复键不会返回 `Err`，而是记录在 `state().error` 中；
    /// 只有目录不存在或压缩写入失败才会返回错误。无论成功与否都会安排一次
    /// 变更通知与自动导出，让观察者知道加载已经结束。
    pub fn load(&mut self) -> Result<()> {
        let files = self.scan()?;

        let mut state = EngineState {
            files,
            ..Default::default()
        };
        let mut keys_seen = BTreeSet::new();

        if let Err(failure) = parse_files(self.storage.as_ref(), &mut state, &mut keys_seen) {
            warn!("load failed: {}", failure);
            state.error = Some(failure);
        }

        state.updates.recount();
        state.keys = KeyRegistry::from_keys(keys_seen);
        state.keys_changed = true;
        state.loaded = true;
        self.state = state;

        if self.state.error.is_none() {
            // 净变化为零的残留日志在这里被压缩掉
            self.optimize()?;
        }

        info!(
            "loaded {} locale files, {} keys, {} pending updates",
            self.state.files.len(),
            self.state.keys.len(),
            self.state.updates.len()
        );
        if self.options.debug {
            self.log_file_summary();
        }

        self.schedule_change();
        self.schedule_auto_export();
        Ok(())
    }

    /// 扫描目录，返回按文件名排序的语言文件
    fn scan(&mut self) -> Result<Vec<LocaleFile>> {
        let directory = &self.options.directory;
        let names = self.storage.files_in(directory).map_err(|e| {
            if e.kind() == io::ErrorKind::NotFound {
                StoreError::InvalidDirectory(directory.display().to_string())
            } else {
                StoreError::Io(e)
            }
        })?;

        self.export_module_present = names.iter().any(|name| *name == self.options.export_module);

        let mut files: Vec<LocaleFile> = names
            .iter()
            .filter(|name| **name != self.options.export_module)
            .filter_map(|name| self.pattern.parse(directory, name))
            .collect();
        files.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(files)
    }

    fn log_file_summary(&self) {
        for file in &self.state.files {
            let entries = self
                .state
                .updated
                .keys()
                .filter(|full| full.file_name() == file.name)
                .count();
            let pending = self
                .state
                .updates
                .touched()
                .iter()
                .filter(|full| full.file_name() == file.name)
                .count();
            info!(
                "{} (locale {}): {} entries, {} pending",
                file.name,
                file.locale.as_deref().unwrap_or("-"),
                entries,
                pending
            );
        }
    }
}

/// 解析所有文件：先读基线，再按文件顺序重放更新行
fn parse_files(
    storage: &dyn Storage,
    state: &mut EngineState,
    keys_seen: &mut BTreeSet<String>,
) -> std::result::Result<(), LoadFailure> {
    let files = state.files.clone();
    let mut queues: Vec<QueuedLines> = Vec::with_capacity(files.len());

    for file in &files {
        let queue = read_baseline(storage, file, state, keys_seen)?;
        debug!("{}: {} queued updates", file.name, queue.len());
        queues.push(queue);
    }

    state.updated = state.original.clone();

    for (file, queue) in files.iter().zip(queues) {
        for (line_no, text) in queue {
            let line = Line::decode(&text).map_err(|_| LoadFailure::Malformed {
                file: file.name.clone(),
                line: line_no,
                text: text.clone(),
            })?;
            match line.kind {
                LineKind::Delete => {
                    keys_seen.remove(&line.key);
                }
                _ => {
                    keys_seen.insert(line.key.clone());
                }
            }
            state.apply_update(&file.name, &line);
        }
    }

    Ok(())
}

/// 读取一个文件的基线部分，返回排队的更新行
fn read_baseline(
    storage: &dyn Storage,
    file: &LocaleFile,
    state: &mut EngineState,
    keys_seen: &mut BTreeSet<String>,
) -> std::result::Result<QueuedLines, LoadFailure> {
    let io_failure = |e: io::Error| LoadFailure::Io {
        file: file.name.clone(),
        message: e.to_string(),
    };

    let mut reader = storage.line_reader(&file.path).map_err(io_failure)?;
    let result = read_lines(reader.as_mut(), file, state, keys_seen);
    // 出错时也要关闭
    let closed = reader.close().map_err(io_failure);
    let queue = result?;
    closed?;
    Ok(queue)
}

fn read_lines(
    reader: &mut dyn LineReader,
    file: &LocaleFile,
    state: &mut EngineState,
    keys_seen: &mut BTreeSet<String>,
) -> std::result::Result<QueuedLines, LoadFailure> {
    let mut value_keys = HashSet::new();
    let mut comment_keys = HashSet::new();
    let mut queue = QueuedLines::new();
    let mut line_no = 0;

    loop {
        let text = match reader.next_line() {
            Ok(Some(text)) => text,
            Ok(None) => break,
            Err(e) => {
                return Err(LoadFailure::Io {
                    file: file.name.clone(),
                    message: e.to_string(),
                })
            }
        };
        line_no += 1;

        if text.trim().is_empty() {
            continue;
        }
        if let Some(update) = strip_update_prefix(&text) {
            queue.push((line_no, update.to_string()));
            continue;
        }

        let line = Line::decode(&text).map_err(|_| LoadFailure::Malformed {
            file: file.name.clone(),
            line: line_no,
            text: text.clone(),
        })?;

        let (seen, kind) = match line.kind {
            LineKind::Comment => (&mut comment_keys, "comment"),
            LineKind::Value { .. } => (&mut value_keys, "value"),
            LineKind::Delete => {
                // 与重放一致，删除行同时把键移出全局键集合
                keys_seen.remove(&line.key);
                state.apply_baseline(&file.name, &line);
                continue;
            }
        };
        if !seen.insert(line.key.clone()) {
            return Err(LoadFailure::DuplicateKey {
                file: file.name.clone(),
                line: line_no,
                key: line.key,
                kind,
            });
        }

        keys_seen.insert(line.key.clone());
        state.apply_baseline(&file.name, &line);
    }

    Ok(queue)
}
