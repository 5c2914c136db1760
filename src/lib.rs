pub mod config;
pub mod export;
pub mod full_key;
pub mod io;
pub mod key_registry;
pub mod line;
pub mod locale_file;
pub mod schedule;
pub mod state;
pub mod store;
pub mod utils;
pub mod watch;

// 重新导出主要结构
pub use config::StoreOptions;
pub use export::{ExportReport, Exporter, ExporterLoader};
pub use full_key::FullKey;
pub use key_registry::KeyRegistry;
pub use line::{Line, LineKind};
pub use locale_file::LocaleFile;
pub use state::{EngineState, TranslationEntry};
pub use store::{RevertScope, StoreStats, SubscriptionId, TranslationStore};
pub use utils::{is_valid_key, LoadFailure, StoreError};
pub use watch::{WatchEvent, WatchEventKind};
