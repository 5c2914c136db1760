use thiserror::Error;

use crate::line::SEPARATOR;

/// 自定义错误类型
///
/// 调用方可以直接 `match` 各个变体来区分前置条件失败与 IO 失败。
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("translations are not loaded yet")]
    NotLoaded,

    #[error("translations could not be resolved: {0}")]
    NotResolved(#[source] LoadFailure),

    #[error("invalid directory: {0}")]
    InvalidDirectory(String),

    #[error("invalid key: {0:?}")]
    InvalidKey(String),

    #[error("key already exists: {0}")]
    KeyExists(String),

    #[error("key does not exist: {0}")]
    KeyNotExists(String),

    #[error("no locale files found")]
    NoLocaleFiles,

    #[error("there are unapplied changes, save or revert them first")]
    UnappliedChanges,

    #[error("invalid file name: {0:?}")]
    InvalidFileName(String),

    #[error("locale file already exists: {0}")]
    FileExists(String),

    #[error("locale file does not exist: {0}")]
    FileNotExists(String),

    #[error("export failed: {0}")]
    ExportFailed(#[source] Box<dyn std::error::Error + Send + Sync>),

    #[error("invalid options: {0}")]
    InvalidOptions(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// 加载阶段捕获的致命错误
///
/// 不会被抛出，而是保存在 `EngineState::error` 中，之后所有受保护的操作都会以
/// `StoreError::NotResolved` 的形式返回它。行号从 1 开始。
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LoadFailure {
    #[error("{file}:{line}: malformed line {text:?}")]
    Malformed {
        file: String,
        line: usize,
        text: String,
    },

    #[error("{file}:{line}: duplicate {kind} for key {key:?}")]
    DuplicateKey {
        file: String,
        line: usize,
        key: String,
        kind: &'static str,
    },

    #[error("{file}: {message}")]
    Io { file: String, message: String },
}

impl LoadFailure {
    /// 出错的文件名
    pub fn file(&self) -> &str {
        match self {
            LoadFailure::Malformed { file, .. }
            | LoadFailure::DuplicateKey { file, .. }
            | LoadFailure::Io { file, .. } => file,
        }
    }
}

pub type Result<T, E = StoreError> = std::result::Result<T, E>;

/// 键名验证：非空且不含分隔符
pub fn is_valid_key(key: &str) -> bool {
    !key.is_empty() && !key.contains(SEPARATOR)
}

/// 验证键名，失败时返回 `InvalidKey`
pub fn validate_key(key: &str) -> Result<()> {
    if is_valid_key(key) {
        Ok(())
    } else {
        Err(StoreError::InvalidKey(key.to_string()))
    }
}

/// 文件名验证
///
/// 文件名会被拼进 FullKey，所以不能包含路径分隔符或行分隔符。
pub fn is_valid_file_name(name: &str) -> bool {
    let name = name.trim();
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\', SEPARATOR])
        && name.chars().all(|c| !c.is_control())
}

/// 统一换行符（`\r\n` / `\r` -> `\n`），用于比较
pub fn normalize_newlines(text: &str) -> std::borrow::Cow<'_, str> {
    if text.contains('\r') {
        std::borrow::Cow::Owned(text.replace("\r\n", "\n").replace('\r', "\n"))
    } else {
        std::borrow::Cow::Borrowed(text)
    }
}
