use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use iotdm_api::QoS;
use tokio::sync::mpsc;

use super::Transport;
use crate::errors::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Published {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

impl Published {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.payload).unwrap_or(serde_json::Value::Null)
    }
}

/// In-process transport that records traffic instead of sending it.
#[derive(Default)]
pub struct MemoryTransport {
    published: Mutex<Vec<Published>>,
    subscriptions: Mutex<BTreeSet<String>>,
    tap: Option<mpsc::UnboundedSender<Published>>,
    fail_publish: AtomicBool,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also forward every successful publish to the returned receiver.
    pub fn with_tap() -> (Self, mpsc::UnboundedReceiver<Published>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let transport = Self {
            tap: Some(tx),
            ..Self::default()
        };
        (transport, rx)
    }

    pub fn set_fail_publish(&self, fail: bool) {
        self.fail_publish.store(fail, Ordering::SeqCst);
    }

    pub fn published(&self) -> Vec<Published> {
        self.published.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn published_on(&self, topic: &str) -> Vec<Published> {
        self.published()
            .into_iter()
            .filter(|message| message.topic == topic)
            .collect()
    }

    pub fn subscriptions(&self) -> BTreeSet<String> {
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn is_subscribed(&self, topic: &str) -> bool {
        self.subscriptions.lock().unwrap_or_else(|e| e.into_inner()).contains(topic)
    }

    pub fn clear(&self) {
        self.published.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[async_trait]
impl Transport for MemoryTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), TransportError> {
        if self.fail_publish.load(Ordering::SeqCst) {
            return Err(TransportError::publish(topic, "publish disabled"));
        }

        let message = Published {
            topic: topic.to_string(),
            payload,
            qos,
        };
        self.published
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(message.clone());

        if let Some(tap) = &self.tap {
            let _ = tap.send(message);
        }

        Ok(())
    }

    async fn subscribe(&self, topic: &str, _qos: QoS) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(topic.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.subscriptions
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(topic);
        Ok(())
    }
}
