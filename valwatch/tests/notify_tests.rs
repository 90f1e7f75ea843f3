//! Dispatcher tests: per-channel failure isolation and enqueue-order
//! delivery with fake channel senders.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio_util::sync::CancellationToken;
use valwatch::alerts::{AlertCategory, AlertMsg, Severity};
use valwatch::errors::NotificationError;
use valwatch::notify::{ChannelSender, Dispatcher};

struct RecordingSender {
    name: &'static str,
    delivered: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl ChannelSender for RecordingSender {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn send(&self, msg: &AlertMsg) -> Result<(), NotificationError> {
        self.delivered.lock().await.push(msg.message.clone());
        Ok(())
    }
}

struct FailingSender;

#[async_trait]
impl ChannelSender for FailingSender {
    fn name(&self) -> &'static str {
        "failing"
    }

    async fn send(&self, _msg: &AlertMsg) -> Result<(), NotificationError> {
        Err(NotificationError::SendFailed {
            channel: "failing".to_string(),
            reason: "connection refused".to_string(),
        })
    }
}

fn alert(text: &str) -> AlertMsg {
    AlertMsg {
        chain_id: "osmosis-1".to_string(),
        category: AlertCategory::Stalled,
        severity: Severity::Warning,
        message: text.to_string(),
        resolved: false,
    }
}

#[tokio::test]
async fn failing_channel_does_not_block_the_others() {
    let first = Arc::new(Mutex::new(Vec::new()));
    let last = Arc::new(Mutex::new(Vec::new()));

    let dispatcher = Dispatcher::new(vec![
        Box::new(RecordingSender {
            name: "first",
            delivered: first.clone(),
        }),
        Box::new(FailingSender),
        Box::new(RecordingSender {
            name: "last",
            delivered: last.clone(),
        }),
    ]);

    let (tx, rx) = mpsc::channel(16);
    for i in 0..3 {
        tx.send(alert(&format!("alert {}", i))).await.unwrap();
    }
    drop(tx); // dispatcher drains the queue, then returns

    dispatcher.run(rx, CancellationToken::new()).await;

    let expected: Vec<String> = (0..3).map(|i| format!("alert {}", i)).collect();
    assert_eq!(*first.lock().await, expected);
    assert_eq!(
        *last.lock().await,
        expected,
        "channels after the failing one still receive every alert in order"
    );
}

#[tokio::test]
async fn dispatch_order_matches_enqueue_order() {
    let delivered = Arc::new(Mutex::new(Vec::new()));
    let dispatcher = Dispatcher::new(vec![Box::new(RecordingSender {
        name: "only",
        delivered: delivered.clone(),
    })]);

    let (tx, rx) = mpsc::channel(16);
    for i in 0..10 {
        tx.send(alert(&format!("{}", i))).await.unwrap();
    }
    drop(tx);

    dispatcher.run(rx, CancellationToken::new()).await;

    let got = delivered.lock().await;
    let expected: Vec<String> = (0..10).map(|i| i.to_string()).collect();
    assert_eq!(*got, expected);
}

#[tokio::test]
async fn dispatcher_stops_on_cancellation() {
    let dispatcher = Dispatcher::new(Vec::new());
    let (_tx, rx) = mpsc::channel::<AlertMsg>(1);
    let cancel = CancellationToken::new();
    cancel.cancel();

    // returns promptly instead of waiting for messages
    dispatcher.run(rx, cancel).await;
}
