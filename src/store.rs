//! 翻译状态引擎
//!
//! 维护一组共享同一键集合的语言文件：内存中的工作状态与磁盘上可人工编辑的
//! 追加式更新日志保持同步，支持结构性编辑、日志压缩与导出。
//!
//! # 架构设计
//!
//! - **load**: 扫描目录、解析基线与待处理更新、检测重复键
//! - **update**: 单行状态转换、追加、优化器与保存（压缩）
//! - **structure**: 增删改键、撤销、增删语言文件
//! - **orchestrate**: 变更通知节流、自动导出防抖、目录监听与导出
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use locale_store::{StoreOptions, TranslationStore};
//!
//! let mut store = TranslationStore::new(StoreOptions::new("i18n"))?;
//! store.load()?;
//! if let Some(error) = &store.state().error {
//!     eprintln!("{}", error);
//! }
//!
//! store.add_key("greeting")?;
//! store.update_value("app.en", "greeting", "Hello")?;
//! store.save()?;
//! ```
mod load;
mod orchestrate;
mod structure;
mod update;

#[cfg(test)]
mod tests;

use std::fmt;
use std::path::PathBuf;
use std::time::Instant;

use tracing::debug_span;

use crate::config::{StoreOptions, AUTO_EXPORT_DELAY, NOTIFY_INTERVAL, RELOAD_INTERVAL};
use crate::export::{DescriptorLoader, Exporter, ExporterLoader};
use crate::full_key::FullKey;
use crate::io::{FsStorage, Storage};
use crate::locale_file::{LocaleFile, LocaleFilePattern};
use crate::schedule::{Debounce, Throttle};
use crate::state::{EngineState, TranslationEntry};
use crate::utils::{Result, StoreError};
use crate::watch::{DirectoryWatcher, WatchEvent};

pub use structure::RevertScope;

/// 变更订阅回调
pub type ChangeCallback = Box<dyn FnMut(&EngineState)>;

/// 订阅标识，用于取消订阅
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// 翻译状态引擎
///
/// # 核心特性
/// - **单写者**: 每个目录只有一个引擎实例写入
/// - **日志化**: 每次编辑立即追加到对应文件末尾，净变化为零时自动压缩
/// - **隔离性**: 多个引擎实例互不影响
pub struct TranslationStore {
    options: StoreOptions,
    pattern: LocaleFilePattern,
    storage: Box<dyn Storage>,
    exporter: Option<Box<dyn Exporter>>,
    loader: Box<dyn ExporterLoader>,
    state: EngineState,
    /// 导出模块每变化一次加一
    export_version: u64,
    export_module_present: bool,
    /// 引擎自身最后一次写文件的时间，用于忽略自己引起的监听事件
    last_write: Option<Instant>,
    notify_timer: Throttle,
    reload_timer: Throttle,
    export_timer: Debounce,
    subscribers: Vec<(SubscriptionId, ChangeCallback)>,
    next_subscription: u64,
    watcher: Option<DirectoryWatcher>,
    pending_events: Vec<WatchEvent>,
}

impl TranslationStore {
    /// 创建引擎，状态为空，需要调用 `load` 或 `connect`
    pub fn new(options: StoreOptions) -> Result<Self> {
        options.validate()?;
        let pattern = options.file_pattern()?;

        Ok(Self {
            options,
            pattern,
            storage: Box::new(FsStorage),
            exporter: None,
            loader: Box::new(DescriptorLoader::new()),
            state: EngineState::default(),
            export_version: 0,
            export_module_present: false,
            last_write: None,
            notify_timer: Throttle::new(NOTIFY_INTERVAL),
            reload_timer: Throttle::new(RELOAD_INTERVAL),
            export_timer: Debounce::new(AUTO_EXPORT_DELAY),
            subscribers: Vec::new(),
            next_subscription: 0,
            watcher: None,
            pending_events: Vec::new(),
        })
    }

    /// 替换存储协作者
    pub fn with_storage(mut self, storage: impl Storage + 'static) -> Self {
        self.storage = Box::new(storage);
        self
    }

    /// 使用固定的导出器（不再从导出模块加载）
    pub fn with_exporter(mut self, exporter: impl Exporter + 'static) -> Self {
        self.exporter = Some(Box::new(exporter));
        self
    }

    pub fn with_exporter_loader(mut self, loader: impl ExporterLoader + 'static) -> Self {
        self.loader = Box::new(loader);
        self
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    /// 当前状态的只读视图
    pub fn state(&self) -> &EngineState {
        &self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.state.loaded
    }

    pub fn keys(&self) -> &[String] {
        self.state.keys.as_slice()
    }

    pub fn files(&self) -> &[LocaleFile] {
        &self.state.files
    }

    /// 查询工作视图中的条目
    ///
    /// # 参数
    /// * `file_name` - 语言文件名
    /// * `key` - 键名
    ///
    /// # 返回
    /// 条目不存在（包括已删除）时返回 `None`
    pub fn translation(&self, file_name: &str, key: &str) -> Option<&TranslationEntry> {
        self.state.translation(file_name, key)
    }

    pub fn original_translation(&self, file_name: &str, key: &str) -> Option<&TranslationEntry> {
        self.state.original_translation(file_name, key)
    }

    /// 待处理日志条目数
    pub fn pending_len(&self) -> usize {
        self.state.updates.len()
    }

    pub fn is_dirty(&self) -> bool {
        !self.state.updates.is_empty()
    }

    pub fn export_version(&self) -> u64 {
        self.export_version
    }

    /// 统计信息
    pub fn summary(&self) -> StoreStats {
        let mut stats = StoreStats {
            files: self.state.files.len(),
            keys: self.state.keys.len(),
            pending: self.state.updates.len(),
            ..Default::default()
        };
        for file in &self.state.files {
            for key in self.state.keys.iter() {
                match self.state.updated.get(&FullKey::compose(&file.name, key)) {
                    Some(entry) if entry.has_value() => {
                        stats.translated += 1;
                        if entry.approved {
                            stats.approved += 1;
                        }
                    }
                    _ => stats.missing += 1,
                }
            }
        }
        stats
    }

    /// 前置条件检查：已加载且没有捕获的错误
    pub fn ensure_ready(&self) -> Result<()> {
        if !self.state.loaded {
            return Err(StoreError::NotLoaded);
        }
        if let Some(cause) = &self.state.error {
            return Err(StoreError::NotResolved(cause.clone()));
        }
        Ok(())
    }

    /// 所有受保护的公开操作都经过这里
    fn gated<T>(&mut self, operation: &'static str, op: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        let span = debug_span!("store_op", operation);
        let _entered = span.enter();
        self.ensure_ready()?;
        op(self)
    }

    fn file_path(&self, file_name: &str) -> Result<PathBuf> {
        self.state
            .file(file_name)
            .map(|f| f.path.clone())
            .ok_or_else(|| StoreError::FileNotExists(file_name.to_string()))
    }
}

impl fmt::Debug for TranslationStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslationStore")
            .field("options", &self.options)
            .field("files", &self.state.files.len())
            .field("keys", &self.state.keys.len())
            .field("pending", &self.state.updates.len())
            .field("loaded", &self.state.loaded)
            .field("error", &self.state.error)
            .finish()
    }
}

/// 引擎统计信息
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoreStats {
    pub files: usize,
    pub keys: usize,
    pub translated: usize,
    pub approved: usize,
    pub missing: usize,
    pub pending: usize,
}

impl fmt::Display for StoreStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== 翻译统计 ===")?;
        writeln!(f, "语言文件: {}", self.files)?;
        writeln!(f, "键数量: {}", self.keys)?;
        writeln!(f, "已翻译: {}", self.translated)?;
        writeln!(f, "已审核: {}", self.approved)?;
        writeln!(f, "缺失: {}", self.missing)?;
        writeln!(f, "待压缩更新: {}", self.pending)?;
        Ok(())
    }
}
