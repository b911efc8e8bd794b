use std::time::Duration;

use async_trait::async_trait;
use iotdm_api::{DeviceIdentity, QoS};
use rumqttc::{AsyncClient, Event, MqttOptions, Packet};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{InboundMessage, Transport};
use crate::configs::Broker;
use crate::errors::TransportError;

const TOKEN_AUTH_USER: &str = "use-token-auth";
const REQUEST_CAPACITY: usize = 10;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// MQTT connection to the management broker.
#[derive(Clone)]
pub struct MqttTransport {
    client: AsyncClient,
}

impl MqttTransport {
    /// Build the client and spawn its event loop. Inbound publishes are
    /// forwarded on the returned channel; the loop ends once that receiver
    /// is dropped.
    pub fn connect(
        identity: &DeviceIdentity,
        host: &str,
        broker: &Broker,
        auth_token: Option<&str>,
    ) -> (Self, mpsc::UnboundedReceiver<InboundMessage>, JoinHandle<()>) {
        let mut options = MqttOptions::new(identity.client_id(), host, broker.port);
        options.set_keep_alive(Duration::from_secs(broker.keep_alive_secs));

        if let Some(token) = auth_token {
            options.set_credentials(TOKEN_AUTH_USER, token);
        }

        if broker.tls {
            options.set_transport(rumqttc::Transport::tls_with_default_config());
        }

        let (client, mut event_loop) = AsyncClient::new(options, REQUEST_CAPACITY);
        let (tx, rx) = mpsc::unbounded_channel();

        let handle = tokio::spawn(async move {
            loop {
                match event_loop.poll().await {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let message = InboundMessage {
                            topic: publish.topic,
                            payload: publish.payload.to_vec(),
                        };
                        if tx.send(message).is_err() {
                            tracing::debug!("Inbound receiver dropped, stopping MQTT event loop");
                            break;
                        }
                    }
                    Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                        tracing::info!(code = ?ack.code, "MQTT connected");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        tracing::error!("MQTT error: {}", e);
                        tokio::time::sleep(RECONNECT_DELAY).await;
                    }
                }
            }
        });

        (Self { client }, rx, handle)
    }

    pub async fn disconnect(&self) -> Result<(), TransportError> {
        self.client
            .disconnect()
            .await
            .map_err(|e| TransportError::Connection(e.to_string()))
    }
}

#[async_trait]
impl Transport for MqttTransport {
    async fn publish(&self, topic: &str, payload: Vec<u8>, qos: QoS) -> Result<(), TransportError> {
        self.client
            .publish(topic, map_qos(qos), false, payload)
            .await
            .map_err(|e| TransportError::publish(topic, e))
    }

    async fn subscribe(&self, topic: &str, qos: QoS) -> Result<(), TransportError> {
        self.client
            .subscribe(topic, map_qos(qos))
            .await
            .map_err(|e| TransportError::subscribe(topic, e))?;

        tracing::debug!("subscribe topic {}", topic);

        Ok(())
    }

    async fn unsubscribe(&self, topic: &str) -> Result<(), TransportError> {
        self.client
            .unsubscribe(topic)
            .await
            .map_err(|e| TransportError::unsubscribe(topic, e))?;

        tracing::debug!("unsubscribe topic {}", topic);

        Ok(())
    }
}

fn map_qos(qos: QoS) -> rumqttc::QoS {
    match qos {
        QoS::AtMostOnce => rumqttc::QoS::AtMostOnce,
        QoS::AtLeastOnce => rumqttc::QoS::AtLeastOnce,
        QoS::ExactlyOnce => rumqttc::QoS::ExactlyOnce,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_map_qos() {
        assert_eq!(map_qos(QoS::AtMostOnce), rumqttc::QoS::AtMostOnce);
        assert_eq!(map_qos(QoS::AtLeastOnce), rumqttc::QoS::AtLeastOnce);
        assert_eq!(map_qos(QoS::ExactlyOnce), rumqttc::QoS::ExactlyOnce);
    }
}
