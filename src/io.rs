//! IO 抽象层模块
//!
//! 引擎只通过这里的 trait 访问存储，便于注入内存实现或其它后端。
//!
//! # 架构设计
//!
//! - **traits**: 定义 `Storage` / `LineReader` / `LineWriter` 接口
//! - **fs_io**: 基于文件系统的默认实现
//!
//! # 使用示例
//!
//! ```rust,ignore
//! use locale_store::io::{FsStorage, Storage};
//!
//! let storage = FsStorage;
//! let mut reader = storage.line_reader(Path::new("i18n/app.en"))?;
//! while let Some(line) = reader.next_line()? {
//!     println!("{}", line);
//! }
//! ```
pub mod fs_io;
pub mod traits;

// === 导出 trait 定义 ===
pub use traits::{LineReader, LineWriter, Storage};

// === 导出默认实现 ===
pub use fs_io::FsStorage;
