use std::fmt;

/// FullKey 分隔符，文件名中不可能出现
pub const FULL_KEY_SEPARATOR: char = '/';

/// (文件名, 键) 组合标识
///
/// 所有条目映射都以它为键。文件名与键本身不做转义，调用方通过文件名验证
/// 保证文件名中不含分隔符，因此按第一个分隔符拆分即可精确还原。
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FullKey(String);

impl FullKey {
    /// 组合文件名与键
    pub fn compose(file_name: &str, key: &str) -> Self {
        let mut full = String::with_capacity(file_name.len() + key.len() + 1);
        full.push_str(file_name);
        full.push(FULL_KEY_SEPARATOR);
        full.push_str(key);
        FullKey(full)
    }

    /// 拆分为 (文件名, 键)
    pub fn decompose(&self) -> (&str, &str) {
        self.0
            .split_once(FULL_KEY_SEPARATOR)
            .unwrap_or((self.0.as_str(), ""))
    }

    pub fn file_name(&self) -> &str {
        self.decompose().0
    }

    pub fn key(&self) -> &str {
        self.decompose().1
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FullKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
