//! 目录监听
//!
//! 包装 `notify` 的监听器，把文件系统事件转换成 (事件类型, 文件名) 放进通道，
//! 由引擎在 `tick` 时取出处理。

use std::path::Path;
use std::sync::mpsc::{channel, Receiver, RecvTimeoutError};
use std::time::{Duration, Instant};

use notify::event::EventKind;
use notify::{Config, RecommendedWatcher, RecursiveMode, Watcher};
use tracing::warn;

/// 事件类型
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchEventKind {
    Created,
    Modified,
    Removed,
}

/// 一个监听事件
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchEvent {
    pub kind: WatchEventKind,
    pub file_name: String,
    /// 事件到达监听回调的时刻，而不是被引擎取出的时刻
    pub at: Instant,
}

impl WatchEvent {
    /// 以当前时刻创建事件
    pub fn new(kind: WatchEventKind, file_name: impl Into<String>) -> Self {
        Self::at(kind, file_name, Instant::now())
    }

    pub fn at(kind: WatchEventKind, file_name: impl Into<String>, at: Instant) -> Self {
        Self {
            kind,
            file_name: file_name.into(),
            at,
        }
    }
}

/// 目录监听器，drop 时停止监听
pub struct DirectoryWatcher {
    _watcher: RecommendedWatcher,
    receiver: Receiver<WatchEvent>,
}

impl DirectoryWatcher {
    /// 开始监听目录（不递归）
    pub fn start(directory: &Path) -> notify::Result<Self> {
        let (tx, rx) = channel();
        let mut watcher = RecommendedWatcher::new(
            move |res: notify::Result<notify::Event>| {
                let event = match res {
                    Ok(event) => event,
                    Err(e) => {
                        warn!("watch error: {:?}", e);
                        return;
                    }
                };
                let kind = match event.kind {
                    EventKind::Create(_) => WatchEventKind::Created,
                    EventKind::Modify(_) => WatchEventKind::Modified,
                    EventKind::Remove(_) => WatchEventKind::Removed,
                    _ => return,
                };
                let at = Instant::now();
                for path in &event.paths {
                    let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                        continue;
                    };
                    // 接收端已关闭说明监听器正在销毁
                    if tx.send(WatchEvent::at(kind, file_name, at)).is_err() {
                        return;
                    }
                }
            },
            Config::default(),
        )?;
        watcher.watch(directory, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            receiver: rx,
        })
    }

    /// 取出一个已到达的事件，不阻塞
    pub fn try_next(&self) -> Option<WatchEvent> {
        self.receiver.try_recv().ok()
    }

    /// 最多等待 `timeout` 取一个事件
    pub fn next_timeout(&self, timeout: Duration) -> Option<WatchEvent> {
        match self.receiver.recv_timeout(timeout) {
            Ok(event) => Some(event),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        }
    }
}
