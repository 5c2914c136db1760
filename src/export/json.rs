//! 默认 JSON 导出器
//!
//! 导出模块是目录中的一个 JSON 描述文件，例如：
//!
//! ```json
//! { "outputDir": "dist", "approvedOnly": false, "pretty": true }
//! ```
//!
//! 每个语言文件生成 `<outputDir>/<locale>.json`（基础文件用文件名），
//! 内容是键到值的对象。

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::debug;

use super::{ExportError, Exporter, ExporterLoader};
use crate::config::StoreOptions;
use crate::locale_file::LocaleFile;
use crate::state::{EngineState, TranslationEntry};

/// 导出描述文件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ExportDescriptor {
    /// 输出目录，相对路径以描述文件所在目录为基准
    pub output_dir: PathBuf,
    /// 只导出已审核的值
    #[serde(default)]
    pub approved_only: bool,
    /// 导出空字符串值
    #[serde(default)]
    pub include_empty: bool,
    #[serde(default = "default_pretty")]
    pub pretty: bool,
}

fn default_pretty() -> bool {
    true
}

impl ExportDescriptor {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
            approved_only: false,
            include_empty: false,
            pretty: true,
        }
    }
}

/// JSON 导出器
#[derive(Debug, Clone)]
pub struct JsonExporter {
    descriptor: ExportDescriptor,
    current: Map<String, Value>,
}

impl JsonExporter {
    /// `output_dir` 应为绝对路径或相对当前工作目录的路径
    pub fn new(descriptor: ExportDescriptor) -> Self {
        Self {
            descriptor,
            current: Map::new(),
        }
    }

    pub fn output_path(&self, file: &LocaleFile) -> PathBuf {
        self.descriptor
            .output_dir
            .join(format!("{}.json", file.label()))
    }
}

impl Exporter for JsonExporter {
    fn validate(&mut self, _options: &StoreOptions, state: &EngineState) -> Result<(), ExportError> {
        // 两个文件导出到同一个目标会互相覆盖
        let mut targets: Vec<PathBuf> = state.files.iter().map(|f| self.output_path(f)).collect();
        targets.sort();
        if let Some(pair) = targets.windows(2).find(|pair| pair[0] == pair[1]) {
            return Err(format!("several locale files export to {}", pair[0].display()).into());
        }
        if let Some(file) = state.files.iter().find(|f| targets.contains(&f.path)) {
            return Err(format!("export would overwrite locale file {}", file.name).into());
        }
        Ok(())
    }

    fn open(&mut self, _file: &LocaleFile) -> Result<(), ExportError> {
        self.current.clear();
        Ok(())
    }

    fn write(&mut self, _file: &LocaleFile, entry: &TranslationEntry) -> Result<(), ExportError> {
        let Some(value) = entry.value.as_deref() else {
            return Ok(());
        };
        if self.descriptor.approved_only && !entry.approved {
            return Ok(());
        }
        if value.is_empty() && !self.descriptor.include_empty {
            return Ok(());
        }
        self.current
            .insert(entry.key.clone(), Value::String(value.to_string()));
        Ok(())
    }

    fn close(&mut self, file: &LocaleFile) -> Result<(), ExportError> {
        let path = self.output_path(file);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let object = Value::Object(std::mem::take(&mut self.current));
        let mut text = if self.descriptor.pretty {
            serde_json::to_string_pretty(&object)?
        } else {
            serde_json::to_string(&object)?
        };
        text.push('\n');
        fs::write(&path, text)?;
        debug!("exported {} to {}", file.name, path.display());
        Ok(())
    }
}

/// 描述文件加载器
///
/// 同一版本只解析一次描述文件，版本变化后重新读取。
#[derive(Debug, Clone, Default)]
pub struct DescriptorLoader {
    cache: Option<(u64, PathBuf, ExportDescriptor)>,
}

impl DescriptorLoader {
    pub fn new() -> Self {
        Self { cache: None }
    }

    fn read_descriptor(module: &Path) -> Result<ExportDescriptor, ExportError> {
        let text = fs::read_to_string(module)
            .map_err(|e| format!("cannot read export module {}: {}", module.display(), e))?;
        let mut descriptor: ExportDescriptor = serde_json::from_str(&text)
            .map_err(|e| format!("invalid export module {}: {}", module.display(), e))?;

        if descriptor.output_dir.is_relative() {
            if let Some(parent) = module.parent() {
                descriptor.output_dir = parent.join(&descriptor.output_dir);
            }
        }
        Ok(descriptor)
    }
}

impl ExporterLoader for DescriptorLoader {
    fn load(&mut self, module: &Path, version: u64) -> Result<Box<dyn Exporter>, ExportError> {
        let cached = self
            .cache
            .as_ref()
            .filter(|(cached_version, cached_path, _)| *cached_version == version && cached_path == module)
            .map(|(_, _, descriptor)| descriptor.clone());

        let descriptor = match cached {
            Some(descriptor) => descriptor,
            None => {
                debug!("loading export module {} (version {})", module.display(), version);
                let descriptor = Self::read_descriptor(module)?;
                self.cache = Some((version, module.to_path_buf(), descriptor.clone()));
                descriptor
            }
        };

        Ok(Box::new(JsonExporter::new(descriptor)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn locale_file(dir: &Path, name: &str, locale: Option<&str>) -> LocaleFile {
        LocaleFile {
            name: name.to_string(),
            path: dir.join(name),
            locale: locale.map(str::to_string),
        }
    }

    #[test]
    fn test_json_exporter_filters_entries() {
        let temp_dir = TempDir::new().unwrap();
        let mut descriptor = ExportDescriptor::new(temp_dir.path().join("dist"));
        descriptor.approved_only = true;
        let mut exporter = JsonExporter::new(descriptor);
        let file = locale_file(temp_dir.path(), "app.en", Some("en"));

        exporter.open(&file).unwrap();
        exporter
            .write(&file, &TranslationEntry::new("hello").with_value("Hi", true))
            .unwrap();
        exporter
            .write(&file, &TranslationEntry::new("draft").with_value("WIP", false))
            .unwrap();
        exporter
            .write(&file, &TranslationEntry::new("note").with_comment("only a comment"))
            .unwrap();
        exporter.close(&file).unwrap();

        let written = fs::read_to_string(temp_dir.path().join("dist").join("en.json")).unwrap();
        let value: Value = serde_json::from_str(&written).unwrap();
        assert_eq!(value, serde_json::json!({ "hello": "Hi" }));
    }

    #[test]
    fn test_validate_rejects_colliding_targets() {
        let temp_dir = TempDir::new().unwrap();
        let mut exporter = JsonExporter::new(ExportDescriptor::new(temp_dir.path()));
        let mut state = EngineState::default();
        state.files = vec![
            locale_file(temp_dir.path(), "app.en", Some("en")),
            locale_file(temp_dir.path(), "web.en", Some("en")),
        ];

        let options = StoreOptions::new(temp_dir.path());
        assert!(exporter.validate(&options, &state).is_err());
    }

    #[test]
    fn test_loader_caches_per_version() {
        let temp_dir = TempDir::new().unwrap();
        let module = temp_dir.path().join("export.json");
        fs::write(&module, r#"{"outputDir": "dist"}"#).unwrap();

        let mut loader = DescriptorLoader::new();
        loader.load(&module, 0).unwrap();
        let (_, _, cached) = loader.cache.clone().unwrap();
        assert_eq!(cached.output_dir, temp_dir.path().join("dist"));

        // 同版本不会重新读取
        fs::write(&module, r#"{"outputDir": "other"}"#).unwrap();
        loader.load(&module, 0).unwrap();
        assert_eq!(loader.cache.as_ref().unwrap().2.output_dir, temp_dir.path().join("dist"));

        loader.load(&module, 1).unwrap();
        assert_eq!(loader.cache.as_ref().unwrap().2.output_dir, temp_dir.path().join("other"));
    }

    #[test]
    fn test_loader_reports_invalid_module() {
        let temp_dir = TempDir::new().unwrap();
        let module = temp_dir.path().join("export.json");
        fs::write(&module, "not json").unwrap();

        let mut loader = DescriptorLoader::new();
        assert!(loader.load(&module, 0).is_err());
        assert!(loader.load(&temp_dir.path().join("missing.json"), 0).is_err());
    }
}
