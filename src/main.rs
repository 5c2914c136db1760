use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use locale_store::{RevertScope, StoreOptions, TranslationEntry, TranslationStore};

#[derive(Parser)]
#[command(name = "locale_store")]
#[command(about = "维护共享同一键集合的语言文件")]
#[command(version)]
struct Cli {
    /// 语言文件目录
    #[arg(short, long, default_value = ".")]
    dir: PathBuf,

    /// 从 JSON 配置文件读取选项（覆盖 --dir）
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// 每次加载后输出详细摘要
    #[arg(long)]
    debug: bool,

    /// 变更后自动导出
    #[arg(long)]
    auto_export: bool,

    /// 静默模式(仅输出错误)
    #[arg(short, long)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// 加载目录并报告解析错误
    Check,
    /// 列出所有键
    Keys,
    /// 显示一个键在各个文件中的条目
    Get { key: String },
    /// 修改值（清除审核标记）
    Set { file: String, key: String, value: String },
    /// 修改注释
    Comment { file: String, key: String, comment: String },
    /// 修改审核标记
    Approve {
        file: String,
        key: String,
        /// 取消审核
        #[arg(long)]
        revoke: bool,
    },
    /// 新增键
    AddKey { key: String },
    /// 复制键
    CopyKey { from: String, to: String },
    /// 重命名键
    RenameKey { from: String, to: String },
    /// 删除键
    DeleteKey { key: String },
    /// 撤销待处理的更新
    Revert {
        #[arg(long)]
        file: Option<String>,
        #[arg(long)]
        key: Option<String>,
    },
    /// 新增语言文件
    AddFile { file: String },
    /// 删除语言文件
    DeleteFile { file: String },
    /// 压缩更新日志
    Save,
    /// 导出
    Export,
    /// 监听目录变化（Ctrl+C 结束）
    Watch,
    /// 显示统计信息
    Stats,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let options = build_options(&cli)?;
    let mut store = TranslationStore::new(options)?;

    // 监听模式自己负责加载，并且容忍解析错误
    if !matches!(cli.command, Command::Watch) {
        store.load()?;
        if let Some(error) = &store.state().error {
            bail!("语言文件解析失败: {}", error);
        }
    }

    handle_command(&cli, &mut store)
}

/// 初始化日志，`RUST_LOG` 优先
fn init_logging(cli: &Cli) {
    let default_level = if cli.debug {
        "debug"
    } else if cli.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_options(cli: &Cli) -> Result<StoreOptions> {
    let mut options = match &cli.config {
        Some(path) => StoreOptions::from_file(path)
            .with_context(|| format!("读取配置文件失败: {:?}", path))?,
        None => StoreOptions::new(&cli.dir),
    };
    if cli.debug {
        options.debug = true;
    }
    if cli.auto_export {
        options.auto_export = true;
    }
    Ok(options)
}

/// 执行一次性命令
fn handle_command(cli: &Cli, store: &mut TranslationStore) -> Result<()> {
    match &cli.command {
        Command::Check => {
            if !cli.quiet {
                println!("✓ {} 个语言文件, {} 个键", store.files().len(), store.keys().len());
                if store.is_dirty() {
                    println!("⚠ 有 {} 个待压缩的更新", store.pending_len());
                }
            }
        }
        Command::Keys => {
            for key in store.keys() {
                println!("{}", key);
            }
        }
        Command::Get { key } => print_key(store, key)?,
        Command::Set { file, key, value } => store.update_value(file, key, value)?,
        Command::Comment { file, key, comment } => store.update_comment(file, key, comment)?,
        Command::Approve { file, key, revoke } => store.update_approved(file, key, !revoke)?,
        Command::AddKey { key } => store.add_key(key)?,
        Command::CopyKey { from, to } => store.copy_key(from, to)?,
        Command::RenameKey { from, to } => store.rename_key(from, to)?,
        Command::DeleteKey { key } => store.delete_key(key)?,
        Command::Revert { file, key } => {
            let scope = RevertScope {
                file_name: file.clone(),
                key: key.clone(),
            };
            store.revert(&scope)?;
        }
        Command::AddFile { file } => store.add_file(file)?,
        Command::DeleteFile { file } => store.delete_file(file)?,
        Command::Save => {
            store.save()?;
            if !cli.quiet {
                println!("已压缩 {} 个语言文件", store.files().len());
            }
        }
        Command::Export => {
            let report = store.export().context("导出失败")?;
            if !cli.quiet {
                println!("已导出 {} 个文件, {} 个条目", report.files, report.entries);
            }
        }
        Command::Stats => println!("{}", store.summary()),
        Command::Watch => return handle_watch(cli, store),
    }

    // 把最后的定时动作（例如自动导出）执行完再退出
    while let Some(deadline) = store.next_deadline() {
        std::thread::sleep(deadline.saturating_duration_since(std::time::Instant::now()));
        store.tick()?;
    }
    Ok(())
}

/// 显示一个键在各个文件中的条目
fn print_key(store: &TranslationStore, key: &str) -> Result<()> {
    if !store.keys().iter().any(|k| k == key) {
        bail!("键不存在: {}", key);
    }
    for file in store.files() {
        match store.translation(&file.name, key) {
            Some(entry) => println!("{}: {}", file.name, describe(entry)),
            None => println!("{}: (缺失)", file.name),
        }
    }
    Ok(())
}

fn describe(entry: &TranslationEntry) -> String {
    let mark = if entry.approved { "✓" } else { " " };
    let value = entry.value.as_deref().unwrap_or("");
    let preview = if value.chars().count() > 50 {
        format!("{}...", value.chars().take(50).collect::<String>())
    } else {
        value.to_string()
    };
    match entry.comment.as_deref().filter(|c| !c.is_empty()) {
        Some(comment) => format!("[{}] \"{}\" # {}", mark, preview, comment),
        None => format!("[{}] \"{}\"", mark, preview),
    }
}

/// 监听模式：加载后一直处理目录事件
fn handle_watch(cli: &Cli, store: &mut TranslationStore) -> Result<()> {
    store.connect()?;
    let quiet = cli.quiet;
    store.subscribe(move |state| {
        if quiet {
            return;
        }
        match &state.error {
            Some(error) => println!("⚠ {}", error),
            None => println!(
                "✓ {} 个语言文件, {} 个键, {} 个待压缩的更新",
                state.files.len(),
                state.keys.len(),
                state.updates.len()
            ),
        }
    });

    if !cli.quiet {
        println!("正在监听: {:?} (Ctrl+C 结束)", store.options().directory);
    }
    loop {
        store.wait(Duration::from_secs(1));
        store.tick()?;
    }
}
