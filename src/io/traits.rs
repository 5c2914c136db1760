//! IO 抽象层 - trait 定义
//!
//! 目录列举、逐行读写、追加、创建与删除文件都是可替换的协作者。

use std::io;
use std::path::Path;

/// 顺序行读取器
///
/// 每个文件同一时刻最多只打开一个读取器；读取器在 drop 时释放资源，
/// `close` 用于显式结束。
pub trait LineReader {
    /// 读取下一行（不含行尾），文件结束返回 `Ok(None)`
    fn next_line(&mut self) -> io::Result<Option<String>>;

    /// 关闭读取器
    fn close(self: Box<Self>) -> io::Result<()> {
        Ok(())
    }
}

/// 顺序行写入器
pub trait LineWriter {
    /// 写入一行（自动追加换行）
    fn write_line(&mut self, line: &str) -> io::Result<()>;

    /// 刷新并关闭写入器，未调用 `close` 就 drop 的写入内容不保证落盘
    fn close(self: Box<Self>) -> io::Result<()>;
}

/// 存储协作者
///
/// # 职责
/// - 列出目录中的文件名
/// - 为单个文件提供读取器/写入器
/// - 追加单行、创建与删除文件
pub trait Storage {
    /// 列出目录中的文件名
    ///
    /// # 参数
    /// * `directory` - 要列举的目录
    ///
    /// # 返回
    /// 返回文件名列表（不含目录部分），目录不存在时返回 `NotFound`
    fn files_in(&self, directory: &Path) -> io::Result<Vec<String>>;

    /// 在文件末尾追加一行
    ///
    /// # 参数
    /// * `path` - 目标文件路径
    /// * `line` - 不含换行的一行内容
    fn append_line(&self, path: &Path, line: &str) -> io::Result<()>;

    /// 打开读取器
    ///
    /// # 参数
    /// * `path` - 语言文件路径
    ///
    /// # 返回
    /// 返回从文件开头逐行读取的读取器
    fn line_reader(&self, path: &Path) -> io::Result<Box<dyn LineReader>>;

    /// 打开写入器
    ///
    /// # 参数
    /// * `path` - 语言文件路径，已有内容被截断
    ///
    /// # 返回
    /// 返回写入器，调用 `close` 后内容才保证落盘
    fn line_writer(&self, path: &Path) -> io::Result<Box<dyn LineWriter>>;

    /// 创建空文件
    ///
    /// # 参数
    /// * `path` - 新文件路径，文件已存在时返回 `AlreadyExists`
    fn create_file(&self, path: &Path) -> io::Result<()>;

    /// 删除文件
    ///
    /// # 参数
    /// * `path` - 要删除的文件路径
    fn delete_file(&self, path: &Path) -> io::Result<()>;
}
