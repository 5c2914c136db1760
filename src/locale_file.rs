use std::path::{Path, PathBuf};

use regex::Regex;
use serde::Serialize;

/// 默认的语言文件命名规则：`<base>` 或 `<base>.<locale>`
pub const DEFAULT_FILE_PATTERN: &str =
    r"^[A-Za-z0-9_-]+(?:\.(?P<locale>[a-z]{2,3}(?:[-_][A-Za-z0-9]{2,8})*))?$";

/// 一个语言文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LocaleFile {
    /// 文件名（同时是 FullKey 的文件部分）
    pub name: String,
    pub path: PathBuf,
    /// 从文件名推导的语言，基础文件为 `None`
    pub locale: Option<String>,
}

impl LocaleFile {
    /// 导出时使用的标签：有语言用语言，否则用文件名
    pub fn label(&self) -> &str {
        self.locale.as_deref().unwrap_or(&self.name)
    }
}

/// 语言文件名匹配器
///
/// 自定义规则可以用命名分组 `locale` 标出语言部分。
#[derive(Debug, Clone)]
pub struct LocaleFilePattern {
    regex: Regex,
}

impl LocaleFilePattern {
    pub fn new(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            regex: Regex::new(pattern)?,
        })
    }

    pub fn matches(&self, name: &str) -> bool {
        self.regex.is_match(name)
    }

    /// 解析文件名，不符合规则时返回 `None`
    pub fn parse(&self, directory: &Path, name: &str) -> Option<LocaleFile> {
        let captures = self.regex.captures(name)?;
        let locale = captures
            .name("locale")
            .map(|m| m.as_str().to_string())
            .filter(|locale| !locale.is_empty());

        Some(LocaleFile {
            name: name.to_string(),
            path: directory.join(name),
            locale,
        })
    }
}

impl Default for LocaleFilePattern {
    fn default() -> Self {
        Self {
            regex: Regex::new(DEFAULT_FILE_PATTERN).expect("default locale file pattern is valid"),
        }
    }
}
