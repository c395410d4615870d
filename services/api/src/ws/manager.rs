//! Owns the single upstream session bound to a client connection.

use super::{
    protocol::AudioFrame,
    provider::{SessionConnector, SessionError, UpstreamSink, UpstreamSource},
};
use bytes::Bytes;
use live_relay_core::LiveSessionConfig;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// The response side of a session, shared by every turn relay of a connection.
///
/// A relay holds the lock for the whole of its turn, so relays of consecutive
/// turns drain the stream one after another.
pub type SharedSource = Arc<Mutex<Box<dyn UpstreamSource>>>;

pub struct SessionManager {
    sink: Box<dyn UpstreamSink>,
    source: SharedSource,
    mime_type: String,
    closed: bool,
}

impl SessionManager {
    /// Opens the upstream session for a new connection.
    pub async fn open(
        connector: &dyn SessionConnector,
        config: &LiveSessionConfig,
    ) -> Result<Self, SessionError> {
        let session = connector.open(config).await?;
        Ok(Self {
            sink: session.sink,
            source: Arc::new(Mutex::new(session.source)),
            mime_type: config.input_mime_type(),
            closed: false,
        })
    }

    /// Forwards one client audio frame upstream, byte for byte.
    ///
    /// Frames are never dropped. A zero-length frame reaches upstream exactly
    /// like a flush does.
    pub async fn send_audio(&mut self, frame: AudioFrame) -> Result<(), SessionError> {
        let AudioFrame(payload) = frame;
        if payload.is_empty() {
            debug!("Forwarding empty audio frame.");
        }
        self.send(payload).await
    }

    /// Signals upstream that the client's input for the current turn has ended.
    pub async fn flush_turn(&mut self) -> Result<(), SessionError> {
        self.send(Bytes::new()).await
    }

    async fn send(&mut self, payload: Bytes) -> Result<(), SessionError> {
        if self.closed {
            return Err(SessionError::Closed);
        }
        self.sink.send_realtime(payload, &self.mime_type).await
    }

    /// A handle on the response stream for a turn relay to drain.
    pub fn response_stream(&self) -> SharedSource {
        self.source.clone()
    }

    /// Releases the upstream session. Later calls do nothing.
    pub async fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        match self.sink.close().await {
            Ok(()) => info!("Upstream session closed."),
            Err(e) => warn!(error = %e, "Upstream session did not close cleanly."),
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ws::provider::{ResponseFragment, UpstreamSession};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default, Clone)]
    struct Recorded {
        sent: Arc<StdMutex<Vec<(Vec<u8>, String)>>>,
        closes: Arc<StdMutex<usize>>,
    }

    struct RecordingSink(Recorded);

    #[async_trait]
    impl UpstreamSink for RecordingSink {
        async fn send_realtime(&mut self, payload: Bytes, mime_type: &str) -> Result<(), SessionError> {
            self.0
                .sent
                .lock()
                .unwrap()
                .push((payload.to_vec(), mime_type.to_string()));
            Ok(())
        }

        async fn close(&mut self) -> Result<(), SessionError> {
            *self.0.closes.lock().unwrap() += 1;
            Ok(())
        }
    }

    struct SilentSource;

    #[async_trait]
    impl UpstreamSource for SilentSource {
        async fn next_fragment(&mut self) -> Option<Result<ResponseFragment, SessionError>> {
            None
        }
    }

    struct Connector {
        recorded: Recorded,
        fail: bool,
    }

    #[async_trait]
    impl SessionConnector for Connector {
        async fn open(&self, _config: &LiveSessionConfig) -> Result<UpstreamSession, SessionError> {
            if self.fail {
                return Err(SessionError::ConnectFailure("upstream unreachable".into()));
            }
            Ok(UpstreamSession {
                sink: Box::new(RecordingSink(self.recorded.clone())),
                source: Box::new(SilentSource),
            })
        }
    }

    fn frame(bytes: &'static [u8]) -> AudioFrame {
        AudioFrame(Bytes::from_static(bytes))
    }

    #[tokio::test]
    async fn test_audio_and_flush_preserve_order_and_tag() {
        let recorded = Recorded::default();
        let connector = Connector {
            recorded: recorded.clone(),
            fail: false,
        };
        let config = LiveSessionConfig::audio("m").with_input_sample_rate(16_000);
        let mut manager = SessionManager::open(&connector, &config).await.unwrap();

        manager.send_audio(frame(b"a1")).await.unwrap();
        manager.send_audio(frame(b"a2")).await.unwrap();
        manager.send_audio(frame(b"a3")).await.unwrap();
        manager.flush_turn().await.unwrap();

        let sent = recorded.sent.lock().unwrap().clone();
        let payloads: Vec<Vec<u8>> = sent.iter().map(|(p, _)| p.clone()).collect();
        assert_eq!(
            payloads,
            vec![b"a1".to_vec(), b"a2".to_vec(), b"a3".to_vec(), vec![]]
        );
        assert!(sent.iter().all(|(_, mime)| mime == "audio/pcm;rate=16000"));
    }

    #[tokio::test]
    async fn test_empty_audio_frame_is_forwarded() {
        let recorded = Recorded::default();
        let connector = Connector {
            recorded: recorded.clone(),
            fail: false,
        };
        let mut manager = SessionManager::open(&connector, &LiveSessionConfig::audio("m"))
            .await
            .unwrap();

        manager.send_audio(frame(b"a1")).await.unwrap();
        manager.send_audio(frame(b"")).await.unwrap();
        manager.send_audio(frame(b"a2")).await.unwrap();

        let payloads: Vec<Vec<u8>> = recorded
            .sent
            .lock()
            .unwrap()
            .iter()
            .map(|(p, _)| p.clone())
            .collect();
        assert_eq!(payloads, vec![b"a1".to_vec(), vec![], b"a2".to_vec()]);
    }

    #[tokio::test]
    async fn test_close_is_idempotent_and_blocks_sends() {
        let recorded = Recorded::default();
        let connector = Connector {
            recorded: recorded.clone(),
            fail: false,
        };
        let mut manager = SessionManager::open(&connector, &LiveSessionConfig::audio("m"))
            .await
            .unwrap();

        manager.close().await;
        manager.close().await;
        assert!(manager.is_closed());
        assert_eq!(*recorded.closes.lock().unwrap(), 1);

        assert!(matches!(
            manager.send_audio(frame(b"late")).await,
            Err(SessionError::Closed)
        ));
        assert!(matches!(manager.flush_turn().await, Err(SessionError::Closed)));
    }

    #[tokio::test]
    async fn test_open_failure_is_a_connect_failure() {
        let connector = Connector {
            recorded: Recorded::default(),
            fail: true,
        };
        let result = SessionManager::open(&connector, &LiveSessionConfig::audio("m")).await;
        assert!(matches!(result, Err(SessionError::ConnectFailure(_))));
    }
}
