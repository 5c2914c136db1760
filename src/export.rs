//! 导出模块
//!
//! 把合并后的翻译数据交给可插拔的导出器生成产物。
//!
//! # 架构设计
//!
//! - **Exporter**: 导出器接口，`validate` 一次，然后对每个语言文件
//!   `open` → 按键顺序 `write` → `close`
//! - **ExporterLoader**: 按版本号加载导出器，导出模块变化时版本号递增
//! - **json**: 默认的 JSON 导出器及其描述文件加载器
pub mod json;

use std::path::Path;

use serde::Serialize;

use crate::config::StoreOptions;
use crate::full_key::FullKey;
use crate::locale_file::LocaleFile;
use crate::state::{EngineState, TranslationEntry};

pub use json::{DescriptorLoader, ExportDescriptor, JsonExporter};

/// 导出器返回的错误
pub type ExportError = Box<dyn std::error::Error + Send + Sync>;

/// 导出器接口
pub trait Exporter {
    /// 导出开始前调用一次
    fn validate(&mut self, _options: &StoreOptions, _state: &EngineState) -> Result<(), ExportError> {
        Ok(())
    }

    fn open(&mut self, file: &LocaleFile) -> Result<(), ExportError>;

    fn write(&mut self, file: &LocaleFile, entry: &TranslationEntry) -> Result<(), ExportError>;

    fn close(&mut self, file: &LocaleFile) -> Result<(), ExportError>;
}

/// 按版本加载导出器
///
/// 版本号随导出模块的每次变化递增，实现可以据此缓存或重新加载。
pub trait ExporterLoader {
    fn load(&mut self, module: &Path, version: u64) -> Result<Box<dyn Exporter>, ExportError>;
}

/// 导出结果
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportReport {
    pub version: u64,
    pub files: usize,
    pub entries: usize,
}

/// 执行一次完整导出
pub(crate) fn run_export(
    exporter: &mut dyn Exporter,
    options: &StoreOptions,
    state: &EngineState,
    version: u64,
) -> Result<ExportReport, ExportError> {
    exporter.validate(options, state)?;

    let mut report = ExportReport {
        version,
        ..Default::default()
    };

    for file in &state.files {
        exporter.open(file)?;
        for key in state.keys.iter() {
            if let Some(entry) = state.updated.get(&FullKey::compose(&file.name, key)) {
                exporter.write(file, entry)?;
                report.entries += 1;
            }
        }
        exporter.close(file)?;
        report.files += 1;
    }

    Ok(report)
}
