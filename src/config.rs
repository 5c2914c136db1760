use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::locale_file::{LocaleFilePattern, DEFAULT_FILE_PATTERN};
use crate::utils::{is_valid_file_name, Result, StoreError};

/// 默认导出模块（导出描述文件）名
pub const DEFAULT_EXPORT_MODULE: &str = "export.json";

/// 变更通知的最小调度间隔
pub const NOTIFY_INTERVAL: Duration = Duration::from_millis(10);
/// 监听触发的重新加载节流间隔
pub const RELOAD_INTERVAL: Duration = Duration::from_millis(100);
/// 自动导出防抖窗口
pub const AUTO_EXPORT_DELAY: Duration = Duration::from_millis(1000);
/// 自身写入后忽略监听事件的时间窗口
pub const SELF_WRITE_WINDOW: Duration = Duration::from_millis(500);

/// 引擎配置
///
/// 存储与导出器这类协作者不在这里，通过 `TranslationStore::with_storage`
/// 等方法注入。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct StoreOptions {
    /// 语言文件所在目录
    pub directory: PathBuf,
    /// 每次变更后自动导出
    #[serde(default)]
    pub auto_export: bool,
    /// 每次加载后输出详细摘要
    #[serde(default)]
    pub debug: bool,
    /// 导出描述文件名（位于 `directory` 中）
    #[serde(default = "default_export_module")]
    pub export_module: String,
    /// 自定义语言文件名规则
    #[serde(default)]
    pub file_pattern: Option<String>,
}

fn default_export_module() -> String {
    DEFAULT_EXPORT_MODULE.to_string()
}

impl StoreOptions {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            auto_export: false,
            debug: false,
            export_module: default_export_module(),
            file_pattern: None,
        }
    }

    pub fn with_auto_export(mut self, auto_export: bool) -> Self {
        self.auto_export = auto_export;
        self
    }

    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// 从 JSON 字符串读取配置
    ///
    /// 顶层必须是对象，否则返回 `InvalidOptions`。
    pub fn from_json_str(text: &str) -> Result<Self> {
        let value: serde_json::Value = serde_json::from_str(text)?;
        if !value.is_object() {
            return Err(StoreError::InvalidOptions(
                "options must be a JSON object".to_string(),
            ));
        }
        let options: StoreOptions = serde_json::from_value(value)
            .map_err(|e| StoreError::InvalidOptions(e.to_string()))?;
        options.validate()?;
        Ok(options)
    }

    /// 从 JSON 文件读取配置，相对目录以配置文件所在目录为基准
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut options = Self::from_json_str(&text)?;
        if options.directory.is_relative() {
            if let Some(parent) = path.parent() {
                options.directory = parent.join(&options.directory);
            }
        }
        Ok(options)
    }

    pub fn validate(&self) -> Result<()> {
        if self.directory.as_os_str().is_empty() {
            return Err(StoreError::InvalidOptions(
                "directory must not be empty".to_string(),
            ));
        }
        if !is_valid_file_name(&self.export_module) {
            return Err(StoreError::InvalidOptions(format!(
                "invalid export module name {:?}",
                self.export_module
            )));
        }
        self.file_pattern()?;
        Ok(())
    }

    /// 编译语言文件名规则
    pub fn file_pattern(&self) -> Result<LocaleFilePattern> {
        LocaleFilePattern::new(self.file_pattern.as_deref().unwrap_or(DEFAULT_FILE_PATTERN))
            .map_err(|e| StoreError::InvalidOptions(format!("invalid file pattern: {}", e)))
    }

    pub fn export_module_path(&self) -> PathBuf {
        self.directory.join(&self.export_module)
    }
}
