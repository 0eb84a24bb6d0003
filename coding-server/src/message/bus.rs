//! 状态总线
//!
//! 编排器向外部订阅者单向推送批次和打印状态：
//!
//! ```text
//! Orchestrator ──▶ publish() ──▶ broadcast::Sender<StatusEvent> ──▶ subscribers (SSE, tests)
//! ```
//!
//! 没有订阅者时发布的事件直接丢弃。

use shared::status::StatusEvent;
use tokio::sync::broadcast;

pub const DEFAULT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone)]
pub struct StatusBus {
    tx: broadcast::Sender<StatusEvent>,
}

impl StatusBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// 发布事件，返回收到事件的订阅者数量
    pub fn publish(&self, event: StatusEvent) -> usize {
        let name = event.name();
        match self.tx.send(event) {
            Ok(receivers) => {
                tracing::trace!(event = name, receivers, "Status event published");
                receivers
            }
            Err(_) => 0,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<StatusEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for StatusBus {
    fn default() -> Self {
        Self::new(DEFAULT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let bus = StatusBus::default();
        assert_eq!(bus.publish(StatusEvent::BatchInfo(None)), 0);

        let mut rx = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(bus.publish(StatusEvent::BatchInfo(None)), 1);

        match rx.recv().await.unwrap() {
            StatusEvent::BatchInfo(None) => {}
            other => panic!("unexpected event: {other:?}"),
        }
    }
}
