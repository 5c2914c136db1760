//! 行编解码
//!
//! 每一行都是 `<标记><键><分隔符><内容>`：
//!
//! | 标记 | 含义 |
//! |------|------|
//! | `#`  | 注释 |
//! | `+`  | 已审核的值 |
//! | `-`  | 未审核的值 |
//! | `!`  | 删除（内容为空） |
//!
//! 追加在基线之后的待处理更新行额外带一个 `>` 前缀。键与内容中的换行都被
//! 替换成单个占位字符，保证一个逻辑条目只占一个物理行。

use thiserror::Error;

pub const COMMENT_MARKER: char = '#';
pub const APPROVED_MARKER: char = '+';
pub const NOT_APPROVED_MARKER: char = '-';
pub const DELETE_MARKER: char = '!';
pub const UPDATE_PREFIX: char = '>';
pub const SEPARATOR: char = '=';

const NEWLINE_PLACEHOLDER: char = '\u{2424}';
const CARRIAGE_RETURN_PLACEHOLDER: char = '\u{240D}';

/// 行类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineKind {
    Comment,
    Value { approved: bool },
    Delete,
}

impl LineKind {
    fn marker(self) -> char {
        match self {
            LineKind::Comment => COMMENT_MARKER,
            LineKind::Value { approved: true } => APPROVED_MARKER,
            LineKind::Value { approved: false } => NOT_APPROVED_MARKER,
            LineKind::Delete => DELETE_MARKER,
        }
    }

    fn from_marker(marker: char) -> Option<Self> {
        match marker {
            COMMENT_MARKER => Some(LineKind::Comment),
            APPROVED_MARKER => Some(LineKind::Value { approved: true }),
            NOT_APPROVED_MARKER => Some(LineKind::Value { approved: false }),
            DELETE_MARKER => Some(LineKind::Delete),
            _ => None,
        }
    }
}

/// 解码后的一行
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Line {
    pub kind: LineKind,
    pub key: String,
    /// 注释或值，删除行为空
    pub value: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("malformed line: {0:?}")]
pub struct MalformedLine(pub String);

impl Line {
    pub fn comment(key: impl Into<String>, comment: impl Into<String>) -> Self {
        Line {
            kind: LineKind::Comment,
            key: key.into(),
            value: comment.into(),
        }
    }

    pub fn value(key: impl Into<String>, value: impl Into<String>, approved: bool) -> Self {
        Line {
            kind: LineKind::Value { approved },
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<String>) -> Self {
        Line {
            kind: LineKind::Delete,
            key: key.into(),
            value: String::new(),
        }
    }

    /// 编码为基线行
    pub fn encode(&self) -> String {
        let mut out = String::with_capacity(self.key.len() + self.value.len() + 2);
        out.push(self.kind.marker());
        out.push_str(&escape(&self.key));
        out.push(SEPARATOR);
        if self.kind != LineKind::Delete {
            out.push_str(&escape(&self.value));
        }
        out
    }

    /// 编码为带更新前缀的日志行
    pub fn encode_update(&self) -> String {
        let mut out = String::with_capacity(self.key.len() + self.value.len() + 3);
        out.push(UPDATE_PREFIX);
        out.push_str(&self.encode());
        out
    }

    /// 解码一行（不含更新前缀）
    pub fn decode(text: &str) -> Result<Self, MalformedLine> {
        let malformed = || MalformedLine(text.to_string());

        let marker = text.chars().next().ok_or_else(malformed)?;
        let kind = LineKind::from_marker(marker).ok_or_else(malformed)?;
        let body = &text[marker.len_utf8()..];

        // 分隔符必须在标记之后，且键不能为空
        let separator = body.find(SEPARATOR).ok_or_else(malformed)?;
        if separator == 0 {
            return Err(malformed());
        }

        let key = unescape(&body[..separator]);
        let payload = &body[separator + SEPARATOR.len_utf8()..];
        let value = match kind {
            LineKind::Delete => String::new(),
            _ => unescape(payload),
        };

        Ok(Line { kind, key, value })
    }
}

/// 去掉更新前缀，返回剩余部分；不是更新行时返回 `None`
pub fn strip_update_prefix(text: &str) -> Option<&str> {
    text.strip_prefix(UPDATE_PREFIX)
}

fn escape(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '\n' => NEWLINE_PLACEHOLDER,
            '\r' => CARRIAGE_RETURN_PLACEHOLDER,
            other => other,
        })
        .collect()
}

fn unescape(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            NEWLINE_PLACEHOLDER => '\n',
            CARRIAGE_RETURN_PLACEHOLDER => '\r',
            other => other,
        })
        .collect()
}
