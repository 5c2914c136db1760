use std::io;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use super::{ChangeCallback, SubscriptionId, TranslationStore};
use crate::config::SELF_WRITE_WINDOW;
use crate::export::{run_export, ExportReport, Exporter};
use crate::state::EngineState;
use crate::utils::{Result, StoreError};
use crate::watch::{DirectoryWatcher, WatchEvent, WatchEventKind};

impl TranslationStore {
    // === 变更通知 ===

    /// 订阅变更通知
    ///
    /// 回调收到的是触发时刻的最新状态；同一调度间隔内的多次变更只通知一次。
    ///
    /// # 返回
    /// 返回用于 `unsubscribe` 的订阅标识
    pub fn subscribe(&mut self, callback: impl FnMut(&EngineState) + 'static) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscription);
        self.next_subscription += 1;
        self.subscribers.push((id, Box::new(callback) as ChangeCallback));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(existing, _)| *existing != id);
        self.subscribers.len() != before
    }

    pub(crate) fn schedule_change(&mut self) {
        self.notify_timer.request(Instant::now());
    }

    pub(crate) fn schedule_auto_export(&mut self) {
        if self.options.auto_export {
            self.export_timer.request(Instant::now());
        }
    }

    fn deliver_change(&mut self) {
        let mut subscribers = std::mem::take(&mut self.subscribers);
        for (_, callback) in subscribers.iter_mut() {
            callback(&self.state);
        }
        // 回调期间新增的订阅排在后面
        subscribers.append(&mut self.subscribers);
        self.subscribers = subscribers;
        self.state.keys_changed = false;
    }

    // === 定时器驱动 ===

    /// 处理到期的延迟动作
    pub fn tick(&mut self) -> Result<()> {
        self.tick_at(Instant::now())
    }

    /// 以给定时刻处理监听事件、重新加载、变更通知与自动导出
    ///
    /// # 参数
    /// * `now` - 判断定时器是否到期的时刻
    pub fn tick_at(&mut self, now: Instant) -> Result<()> {
        let mut events = std::mem::take(&mut self.pending_events);
        if let Some(watcher) = &self.watcher {
            while let Some(event) = watcher.try_next() {
                events.push(event);
            }
        }
        for event in events {
            self.handle_watch_event_at(&event, now);
        }

        if self.reload_timer.fire(now) {
            info!("reloading after external change");
            self.load()?;
        }

        if self.notify_timer.fire(now) {
            self.deliver_change();
        }

        if self.export_timer.fire(now) {
            if let Err(e) = self.auto_export() {
                warn!("auto export failed: {}", e);
            }
        }
        Ok(())
    }

    /// 最近一个待触发动作的时间
    pub fn next_deadline(&self) -> Option<Instant> {
        [
            self.notify_timer.deadline(),
            self.reload_timer.deadline(),
            self.export_timer.deadline(),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    /// 等待监听事件，最多到下一个截止时间或 `max_wait`
    pub fn wait(&mut self, max_wait: Duration) {
        let now = Instant::now();
        let timeout = self
            .next_deadline()
            .map(|deadline| deadline.saturating_duration_since(now).min(max_wait))
            .unwrap_or(max_wait);

        match &self.watcher {
            Some(watcher) => {
                if let Some(event) = watcher.next_timeout(timeout) {
                    self.pending_events.push(event);
                }
            }
            None => std::thread::sleep(timeout),
        }
    }

    // === 目录监听 ===

    /// 加载并开始监听目录
    pub fn connect(&mut self) -> Result<()> {
        self.load()?;
        if self.watcher.is_none() {
            let watcher = DirectoryWatcher::start(&self.options.directory)
                .map_err(|e| StoreError::Io(io::Error::new(io::ErrorKind::Other, e)))?;
            self.watcher = Some(watcher);
            info!("watching {}", self.options.directory.display());
        }
        Ok(())
    }

    /// 停止监听并移除所有订阅
    pub fn disconnect(&mut self) {
        if self.watcher.take().is_some() {
            info!("stopped watching {}", self.options.directory.display());
        }
        self.pending_events.clear();
        self.subscribers.clear();
        self.reload_timer.cancel();
        self.notify_timer.cancel();
    }

    pub fn is_connected(&self) -> bool {
        self.watcher.is_some()
    }

    pub fn handle_watch_event(&mut self, event: &WatchEvent) {
        self.handle_watch_event_at(event, Instant::now());
    }

    /// 处理一个监听事件
    ///
    /// 导出模块的变化只递增版本并安排重新导出；语言文件的变化如果在事件
    /// 到达时紧挨着引擎自身的写入则忽略，否则在 `now` 安排一次节流的重新加载。
    ///
    /// # 参数
    /// * `event` - 监听事件，`event.at` 用来判断是否为自身写入
    /// * `now` - 重新加载节流的起始时刻
    pub fn handle_watch_event_at(&mut self, event: &WatchEvent, now: Instant) {
        if event.file_name == self.options.export_module {
            self.export_version += 1;
            self.export_module_present = event.kind != WatchEventKind::Removed;
            debug!(
                "export module changed, version {}",
                self.export_version
            );
            self.schedule_auto_export();
            return;
        }

        if !self.pattern.matches(&event.file_name) {
            return;
        }

        if self.is_own_write(event.at) {
            debug!("ignoring {:?} of {} (own write)", event.kind, event.file_name);
            return;
        }

        debug!("{:?} {}, reload scheduled", event.kind, event.file_name);
        self.reload_timer.request(now);
    }

    /// 事件时刻是否落在引擎最近一次写入的前后窗口内
    ///
    /// 写入完成的时刻在写入之后才记录，回调线程可能先收到事件，所以两个方向
    /// 都要比较。
    fn is_own_write(&self, at: Instant) -> bool {
        let Some(last_write) = self.last_write else {
            return false;
        };
        let gap = at
            .saturating_duration_since(last_write)
            .max(last_write.saturating_duration_since(at));
        gap < SELF_WRITE_WINDOW
    }

    // === 导出 ===

    /// 导出当前数据
    ///
    /// 尚未加载时先加载；存在捕获的加载错误时返回 `NotResolved`。
    ///
    /// # 返回
    /// 返回导出报告，导出器加载或写入失败时返回 `ExportFailed`
    pub fn export(&mut self) -> Result<ExportReport> {
        if !self.state.loaded {
            self.load()?;
        }
        if let Some(cause) = &self.state.error {
            return Err(StoreError::NotResolved(cause.clone()));
        }

        let version = self.export_version;
        let mut loaded: Box<dyn Exporter>;
        let exporter: &mut dyn Exporter = match self.exporter.as_deref_mut() {
            Some(exporter) => exporter,
            None => {
                let module = self.options.export_module_path();
                loaded = self
                    .loader
                    .load(&module, version)
                    .map_err(StoreError::ExportFailed)?;
                loaded.as_mut()
            }
        };

        let report = run_export(exporter, &self.options, &self.state, version)
            .map_err(StoreError::ExportFailed)?;
        info!(
            "exported {} entries from {} files (version {})",
            report.entries, report.files, report.version
        );
        Ok(report)
    }

    /// 没有可用导出器时静默跳过
    fn auto_export(&mut self) -> Result<Option<ExportReport>> {
        if self.exporter.is_none() && !self.export_module_present {
            debug!("auto export skipped, no export module");
            return Ok(None);
        }
        if self.state.error.is_some() {
            debug!("auto export skipped, state has errors");
            return Ok(None);
        }
        self.export().map(Some)
    }
}
