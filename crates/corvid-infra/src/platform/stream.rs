//! Streaming event connection to the platform.
//!
//! `EventStream` owns one persistent duplex (websocket) connection: it
//! subscribes to the configured logical channels, classifies every inbound
//! frame via `corvid_core::event::classify`, and publishes the resulting
//! `InboundEvent`s on the shared bus. Event handling happens on subscriber
//! tasks; nothing downstream can block this read loop.
//!
//! Reconnects use a fixed delay and a capped attempt counter. The counter
//! resets after every successful connect; once it exceeds the cap the
//! stream ends in the terminal `GaveUp` state, reported upward -- external
//! intervention (process restart) is required from there.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde_json::json;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use corvid_core::event::classify::classify_frame;
use corvid_core::event::EventBus;
use corvid_types::config::ConnectionConfig;
use corvid_types::error::ConnectionError;

/// How one connection session ended.
enum SessionEnd {
    /// Shutdown was requested; no reconnect.
    Shutdown,
    /// The connection dropped after a successful connect; reconnect.
    Disconnected,
}

/// Persistent streaming connection with reconnect/backoff.
pub struct EventStream {
    stream_url: String,
    token: SecretString,
    bot_user_id: String,
    bot_handle: String,
    config: ConnectionConfig,
    bus: EventBus,
    shutdown: CancellationToken,
}

impl EventStream {
    pub fn new(
        stream_url: String,
        token: SecretString,
        bot_user_id: String,
        bot_handle: String,
        config: ConnectionConfig,
        bus: EventBus,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            stream_url,
            token,
            bot_user_id,
            bot_handle,
            config,
            bus,
            shutdown,
        }
    }

    /// Run the connect/read/reconnect loop until shutdown or terminal
    /// failure.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectionError::GaveUp`] after the configured maximum of
    /// consecutive failed attempts. This is the only unrecoverable failure
    /// at this layer.
    pub async fn run(self) -> Result<(), ConnectionError> {
        let mut attempts: u32 = 0;

        loop {
            if self.shutdown.is_cancelled() {
                return Ok(());
            }

            match self.session().await {
                Ok(SessionEnd::Shutdown) => return Ok(()),
                Ok(SessionEnd::Disconnected) => {
                    // We did connect: the upcoming reconnect starts a fresh
                    // attempt count.
                    attempts = 1;
                    warn!("event stream disconnected");
                }
                Err(err) => {
                    attempts += 1;
                    warn!(error = %err, attempts, "event stream connect failed");
                }
            }

            if attempts > self.config.max_reconnect_attempts {
                return Err(ConnectionError::GaveUp { attempts });
            }

            debug!(
                delay_secs = self.config.reconnect_delay_secs,
                "scheduling reconnect"
            );
            tokio::select! {
                _ = self.shutdown.cancelled() => return Ok(()),
                _ = tokio::time::sleep(Duration::from_secs(self.config.reconnect_delay_secs)) => {}
            }
        }
    }

    /// One connection session: connect, subscribe, pump frames.
    async fn session(&self) -> Result<SessionEnd, ConnectionError> {
        let url = self.connect_url();
        let (ws, _) = connect_async(url.as_str())
            .await
            .map_err(|e| ConnectionError::Handshake(e.to_string()))?;

        info!("event stream connected");
        let (mut write, mut read) = ws.split();

        for channel in &self.config.channels {
            write
                .send(Message::Text(subscribe_frame(channel)))
                .await
                .map_err(|e| ConnectionError::Transport(e.to_string()))?;
        }

        let mut ping = tokio::time::interval(Duration::from_secs(self.config.ping_interval_secs));
        // The first tick fires immediately; consume it so pings start one
        // interval from now.
        ping.tick().await;

        loop {
            tokio::select! {
                _ = self.shutdown.cancelled() => {
                    let _ = write.send(Message::Close(None)).await;
                    return Ok(SessionEnd::Shutdown);
                }
                _ = ping.tick() => {
                    if let Err(err) = write.send(Message::Ping(Vec::new())).await {
                        warn!(error = %err, "keepalive ping failed");
                        return Ok(SessionEnd::Disconnected);
                    }
                }
                frame = read.next() => match frame {
                    Some(Ok(Message::Text(text))) => self.handle_frame(&text),
                    Some(Ok(Message::Ping(payload))) => {
                        let _ = write.send(Message::Pong(payload)).await;
                    }
                    Some(Ok(Message::Close(_))) | None => {
                        return Ok(SessionEnd::Disconnected);
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!(error = %err, "event stream read error");
                        return Ok(SessionEnd::Disconnected);
                    }
                }
            }
        }
    }

    fn handle_frame(&self, text: &str) {
        let value: serde_json::Value = match serde_json::from_str(text) {
            Ok(value) => value,
            Err(err) => {
                debug!(error = %err, "unparseable frame dropped");
                return;
            }
        };

        match classify_frame(&value, &self.bot_user_id, &self.bot_handle) {
            Some(event) => {
                debug!(event_id = %event.id, kind = %event.kind, "event classified");
                self.bus.publish(event);
            }
            None => debug!("frame carried no classifiable event"),
        }
    }

    fn connect_url(&self) -> String {
        format!("{}?i={}", self.stream_url, self.token.expose_secret())
    }
}

/// Channel subscription frame.
fn subscribe_frame(channel: &str) -> String {
    json!({ "type": "subscribe", "channel": channel }).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_subscribe_frame_shape() {
        let frame: serde_json::Value =
            serde_json::from_str(&subscribe_frame("notifications")).unwrap();
        assert_eq!(frame["type"], "subscribe");
        assert_eq!(frame["channel"], "notifications");
    }

    #[test]
    fn test_connect_url_appends_token() {
        let stream = EventStream::new(
            "wss://social.example.com/streaming".to_string(),
            SecretString::from("sekrit".to_string()),
            "bot-1".to_string(),
            "corvid".to_string(),
            ConnectionConfig::default(),
            EventBus::new(16),
            CancellationToken::new(),
        );
        assert_eq!(
            stream.connect_url(),
            "wss://social.example.com/streaming?i=sekrit"
        );
    }

    #[tokio::test]
    async fn test_handle_frame_publishes_classified_event() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let stream = EventStream::new(
            "wss://example".to_string(),
            SecretString::from("t".to_string()),
            "bot-1".to_string(),
            "corvid".to_string(),
            ConnectionConfig::default(),
            bus.clone(),
            CancellationToken::new(),
        );

        stream.handle_frame(
            r#"{"type":"message","body":{"id":"m-1","user_id":"u-1","text":"hi"}}"#,
        );

        let event = rx.recv().await.unwrap();
        assert_eq!(event.id, "m-1");
    }

    #[tokio::test]
    async fn test_handle_frame_ignores_garbage() {
        let bus = EventBus::new(16);
        let mut rx = bus.subscribe();
        let stream = EventStream::new(
            "wss://example".to_string(),
            SecretString::from("t".to_string()),
            "bot-1".to_string(),
            "corvid".to_string(),
            ConnectionConfig::default(),
            bus.clone(),
            CancellationToken::new(),
        );

        stream.handle_frame("{{{{ not json");
        stream.handle_frame(r#"{"type":"note","body":{"id":"n","user_id":"bot-1","text":"self"}}"#);

        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_run_gives_up_after_max_attempts() {
        // An unroutable URL fails the handshake on every attempt.
        let stream = EventStream::new(
            "ws://127.0.0.1:1/streaming".to_string(),
            SecretString::from("t".to_string()),
            "bot-1".to_string(),
            "corvid".to_string(),
            ConnectionConfig {
                reconnect_delay_secs: 0,
                max_reconnect_attempts: 2,
                ping_interval_secs: 30,
                channels: vec!["notifications".to_string()],
            },
            EventBus::new(16),
            CancellationToken::new(),
        );

        let err = stream.run().await.unwrap_err();
        assert!(matches!(err, ConnectionError::GaveUp { attempts: 3 }));
    }

    #[tokio::test]
    async fn test_run_returns_ok_when_already_shut_down() {
        let shutdown = CancellationToken::new();
        shutdown.cancel();
        let stream = EventStream::new(
            "ws://127.0.0.1:1/streaming".to_string(),
            SecretString::from("t".to_string()),
            "bot-1".to_string(),
            "corvid".to_string(),
            ConnectionConfig::default(),
            EventBus::new(16),
            shutdown,
        );

        assert!(stream.run().await.is_ok());
    }
}
