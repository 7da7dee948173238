//! 事件通知器
//!
//! 事件键 -> 订阅回调列表。回调按注册顺序同步调用；调用期间不持有注册表的锁，
//! 因此回调内部可以继续订阅。单个回调 panic 会被捕获并记录，不影响其余回调。

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use dashmap::DashMap;
use tracing::{debug, error, warn};

use super::types::{EventKind, EventPayload};

/// 订阅回调
pub type EventCallback = Arc<dyn Fn(&EventPayload) + Send + Sync>;

/// 事件通知器
#[derive(Default)]
pub struct EventNotifier {
    /// 事件键 -> 回调列表（注册顺序即调用顺序）
    subscribers: DashMap<String, Vec<EventCallback>>,
}

impl std::fmt::Debug for EventNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let counts: Vec<(String, usize)> = self
            .subscribers
            .iter()
            .map(|entry| (entry.key().clone(), entry.value().len()))
            .collect();
        f.debug_struct("EventNotifier")
            .field("subscribers", &counts)
            .finish()
    }
}

impl EventNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册回调
    pub fn on<F>(&self, event: impl Into<String>, callback: F)
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        let event = event.into();
        debug!("订阅事件: {}", event);
        self.subscribers
            .entry(event)
            .or_default()
            .push(Arc::new(callback));
    }

    /// 发布事件
    ///
    /// 没有订阅者时什么也不做
    pub fn emit(&self, event: &str, payload: EventPayload) {
        // 先复制回调列表并释放分片锁
        let callbacks: Vec<EventCallback> = match self.subscribers.get(event) {
            Some(list) => list.value().clone(),
            None => return,
        };

        for (i, callback) in callbacks.iter().enumerate() {
            let result = panic::catch_unwind(AssertUnwindSafe(|| callback(&payload)));
            if result.is_err() {
                error!("事件回调执行失败: event={}, 回调序号={}", event, i);
            }
        }
    }

    /// 按事件类型发布
    pub fn emit_kind(&self, kind: EventKind, payload: EventPayload) {
        self.emit(kind.key(), payload);
    }

    /// 通过 `on<EventName>` 形式的名称订阅
    ///
    /// 只接受已知事件，未知名称返回 false
    pub fn subscribe_accessor<F>(&self, accessor: &str, callback: F) -> bool
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        match EventKind::from_accessor(accessor) {
            Some(kind) => {
                self.on(kind.key(), callback);
                true
            }
            None => {
                warn!("未知的订阅名称: {}", accessor);
                false
            }
        }
    }

    pub fn on_initialized<F>(&self, callback: F)
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.on(EventKind::Initialized.key(), callback);
    }

    pub fn on_error<F>(&self, callback: F)
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.on(EventKind::Error.key(), callback);
    }

    pub fn on_dir_created<F>(&self, callback: F)
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.on(EventKind::DirCreated.key(), callback);
    }

    pub fn on_file_created<F>(&self, callback: F)
    where
        F: Fn(&EventPayload) + Send + Sync + 'static,
    {
        self.on(EventKind::FileCreated.key(), callback);
    }

    /// 某事件的订阅者数量
    pub fn subscriber_count(&self, event: &str) -> usize {
        self.subscribers
            .get(event)
            .map(|list| list.len())
            .unwrap_or(0)
    }
}
