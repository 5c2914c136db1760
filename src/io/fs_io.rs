//! 基于文件系统的默认存储实现

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;

use encoding_rs::{Encoding, UTF_8};

use super::traits::{LineReader, LineWriter, Storage};

/// 默认存储：直接读写目录中的文件
#[derive(Debug, Clone, Copy, Default)]
pub struct FsStorage;

impl Storage for FsStorage {
    fn files_in(&self, directory: &Path) -> io::Result<Vec<String>> {
        let mut names = Vec::new();
        for entry in fs::read_dir(directory)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            // 非 UTF-8 文件名不可能是语言文件
            if let Ok(name) = entry.file_name().into_string() {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    fn append_line(&self, path: &Path, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .read(true)
            .append(true)
            .create(true)
            .open(path)?;

        // 原文件没有以换行结尾时先补一个，避免两行粘在一起
        if file.metadata()?.len() > 0 {
            file.seek(SeekFrom::End(-1))?;
            let mut last = [0u8; 1];
            file.read_exact(&mut last)?;
            if last[0] != b'\n' {
                file.write_all(b"\n")?;
            }
        }

        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()
    }

    fn line_reader(&self, path: &Path) -> io::Result<Box<dyn LineReader>> {
        let bytes = fs::read(path)?;
        Ok(Box::new(FsLineReader::from_bytes(&bytes)))
    }

    fn line_writer(&self, path: &Path) -> io::Result<Box<dyn LineWriter>> {
        let file = File::create(path)?;
        Ok(Box::new(FsLineWriter {
            inner: BufWriter::new(file),
        }))
    }

    fn create_file(&self, path: &Path) -> io::Result<()> {
        OpenOptions::new().write(true).create_new(true).open(path)?;
        Ok(())
    }

    fn delete_file(&self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)
    }
}

/// 文件行读取器
///
/// 整个文件先按 BOM 解码（无 BOM 按 UTF-8 处理，非法字节被替换），再逐行产出。
pub struct FsLineReader {
    lines: std::vec::IntoIter<String>,
}

impl FsLineReader {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let text = match Encoding::for_bom(bytes) {
            Some((encoding, bom_len)) => encoding.decode_without_bom_handling(&bytes[bom_len..]).0,
            None => UTF_8.decode_without_bom_handling(bytes).0,
        };

        let lines: Vec<String> = text.lines().map(str::to_string).collect();
        Self {
            lines: lines.into_iter(),
        }
    }
}

impl LineReader for FsLineReader {
    fn next_line(&mut self) -> io::Result<Option<String>> {
        Ok(self.lines.next())
    }
}

/// 文件行写入器
pub struct FsLineWriter {
    inner: BufWriter<File>,
}

impl LineWriter for FsLineWriter {
    fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.inner.write_all(line.as_bytes())?;
        self.inner.write_all(b"\n")
    }

    fn close(mut self: Box<Self>) -> io::Result<()> {
        self.inner.flush()
    }
}
