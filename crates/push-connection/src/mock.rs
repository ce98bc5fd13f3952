//! In-memory connector for tests.
//!
//! Every accepted connection hands a [`MockServer`] to the paired
//! [`MockListener`], through which a test plays the remote end.

use std::io;
use std::sync::{Arc, Mutex, PoisonError};

use futures_util::future::BoxFuture;
use futures_util::{sink, stream};
use tokio::sync::mpsc;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;

use crate::error::PushError;
use crate::target::ConnectionTarget;
use crate::transport::{Connector, Transport};

type Frame = Result<tungstenite::Message, tungstenite::Error>;

/// A recorded connect call.
#[derive(Debug, Clone)]
pub struct MockAttempt {
    pub url: String,
    pub protocols: Vec<String>,
    pub at: Instant,
}

struct MockInner {
    attempts: Vec<MockAttempt>,
    refuse_next: u32,
    refuse_all: bool,
}

/// Connector whose connections terminate in the test.
pub struct MockConnector {
    inner: Arc<Mutex<MockInner>>,
    accepted_tx: mpsc::UnboundedSender<MockServer>,
}

impl MockConnector {
    /// Creates a connector that accepts every attempt.
    pub fn new() -> (Self, MockListener) {
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();
        let connector = Self {
            inner: Arc::new(Mutex::new(MockInner {
                attempts: Vec::new(),
                refuse_next: 0,
                refuse_all: false,
            })),
            accepted_tx,
        };
        (connector, MockListener { rx: accepted_rx })
    }

    /// Refuses every attempt while `refuse` is set.
    pub fn refuse_all(&self, refuse: bool) {
        self.lock().refuse_all = refuse;
    }

    /// Refuses the next `n` attempts, then accepts again.
    pub fn refuse_next(&self, n: u32) {
        self.lock().refuse_next = n;
    }

    /// All connect calls so far, oldest first.
    pub fn attempts(&self) -> Vec<MockAttempt> {
        self.lock().attempts.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MockInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Connector for MockConnector {
    fn connect(
        &self,
        target: &ConnectionTarget,
        protocols: &[String],
    ) -> BoxFuture<'static, Result<Transport, PushError>> {
        let refused = {
            let mut inner = self.lock();
            inner.attempts.push(MockAttempt {
                url: target.url().to_string(),
                protocols: protocols.to_vec(),
                at: Instant::now(),
            });
            if inner.refuse_next > 0 {
                inner.refuse_next -= 1;
                true
            } else {
                inner.refuse_all
            }
        };

        if refused {
            return Box::pin(async {
                Err(PushError::Ws(tungstenite::Error::Io(io::Error::new(
                    io::ErrorKind::ConnectionRefused,
                    "connection refused",
                ))))
            });
        }

        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel::<Frame>();
        let (from_client_tx, from_client_rx) = mpsc::unbounded_channel::<tungstenite::Message>();

        let stream = stream::unfold(to_client_rx, |mut rx| async move {
            rx.recv().await.map(|frame| (frame, rx))
        });
        let sink = sink::unfold(
            from_client_tx,
            |tx, msg: tungstenite::Message| async move {
                tx.send(msg)
                    .map_err(|_| tungstenite::Error::ConnectionClosed)?;
                Ok::<_, tungstenite::Error>(tx)
            },
        );

        let server = MockServer {
            url: target.url().to_string(),
            to_client: Some(to_client_tx),
            from_client: from_client_rx,
        };
        // A dropped listener just means nobody plays the server.
        let _ = self.accepted_tx.send(server);

        Box::pin(async move {
            Ok(Transport {
                sink: Box::pin(sink),
                stream: Box::pin(stream),
            })
        })
    }
}

/// Receives the server ends of accepted connections.
pub struct MockListener {
    rx: mpsc::UnboundedReceiver<MockServer>,
}

impl MockListener {
    /// Waits for the next accepted connection.
    pub async fn accept(&mut self) -> Option<MockServer> {
        self.rx.recv().await
    }

    pub fn try_accept(&mut self) -> Option<MockServer> {
        self.rx.try_recv().ok()
    }
}

/// Remote end of one mock connection.
pub struct MockServer {
    pub url: String,
    to_client: Option<mpsc::UnboundedSender<Frame>>,
    from_client: mpsc::UnboundedReceiver<tungstenite::Message>,
}

impl MockServer {
    /// Sends a raw frame to the client.
    pub fn send(&self, msg: tungstenite::Message) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(Ok(msg));
        }
    }

    pub fn send_text(&self, text: &str) {
        self.send(tungstenite::Message::Text(text.into()));
    }

    /// Sends a close frame with `code` and `reason`.
    pub fn send_close(&self, code: u16, reason: &str) {
        self.send(tungstenite::Message::Close(Some(CloseFrame {
            code: CloseCode::from(code),
            reason: reason.into(),
        })));
    }

    /// Fails the client's read side with an I/O error.
    pub fn send_error(&self) {
        if let Some(tx) = &self.to_client {
            let _ = tx.send(Err(tungstenite::Error::Io(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "connection reset",
            ))));
        }
    }

    /// Ends the client's inbound stream without a close frame.
    pub fn drop_connection(&mut self) {
        self.to_client = None;
    }

    /// Next frame written by the client; `None` once the client's sink is gone.
    pub async fn recv(&mut self) -> Option<tungstenite::Message> {
        self.from_client.recv().await
    }

    /// Next text frame written by the client, skipping control frames.
    pub async fn recv_text(&mut self) -> Option<String> {
        loop {
            match self.from_client.recv().await? {
                tungstenite::Message::Text(t) => return Some(t.as_str().to_string()),
                _ => continue,
            }
        }
    }

    /// Text frames already written by the client, without waiting.
    pub fn drain_text(&mut self) -> Vec<String> {
        let mut out = Vec::new();
        while let Ok(msg) = self.from_client.try_recv() {
            if let tungstenite::Message::Text(t) = msg {
                out.push(t.as_str().to_string());
            }
        }
        out
    }
}
