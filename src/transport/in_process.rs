//! In-memory transport pair gluing a `ClientCore` to a `ServerCore` in the
//! same process (spec.md §4.6.5). Used primarily for testing.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::protocol::Frame;
use crate::transport::{FrameHandler, Transport, TransportError, TransportResult};

/// One half of an in-process pipe. `InProcessTransport::pair()` returns the
/// two ends wired to each other.
pub struct InProcessTransport {
    outbound: mpsc::UnboundedSender<Frame>,
    inbound: Option<mpsc::UnboundedReceiver<Frame>>,
    handler: Option<Arc<dyn FrameHandler>>,
    connected: Arc<AtomicBool>,
    reader: Option<JoinHandle<()>>,
}

impl InProcessTransport {
    /// Builds two transports, each side's outbound queue feeding the other's
    /// inbound queue.
    pub fn pair() -> (Self, Self) {
        let (a_to_b_tx, a_to_b_rx) = mpsc::unbounded_channel();
        let (b_to_a_tx, b_to_a_rx) = mpsc::unbounded_channel();

        let a = Self {
            outbound: a_to_b_tx,
            inbound: Some(b_to_a_rx),
            handler: None,
            connected: Arc::new(AtomicBool::new(false)),
            reader: None,
        };
        let b = Self {
            outbound: b_to_a_tx,
            inbound: Some(a_to_b_rx),
            handler: None,
            connected: Arc::new(AtomicBool::new(false)),
            reader: None,
        };
        (a, b)
    }
}

#[async_trait]
impl Transport for InProcessTransport {
    async fn start(&mut self) -> TransportResult<()> {
        let mut inbound = self
            .inbound
            .take()
            .ok_or(TransportError::NotConnected)?;
        let handler = self.handler.clone();
        self.connected.store(true, Ordering::SeqCst);
        let connected = Arc::clone(&self.connected);

        self.reader = Some(tokio::spawn(async move {
            while let Some(frame) = inbound.recv().await {
                if let Some(handler) = &handler {
                    handler.handle_frame(frame).await;
                }
            }
            connected.store(false, Ordering::SeqCst);
            if let Some(handler) = &handler {
                handler.handle_close().await;
            }
        }));
        Ok(())
    }

    async fn send(&self, frame: &Frame) -> TransportResult<()> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(TransportError::NotConnected);
        }
        self.outbound
            .send(frame.clone())
            .map_err(|_| TransportError::Disconnected)
    }

    fn set_frame_handler(&mut self, handler: Arc<dyn FrameHandler>) {
        self.handler = Some(handler);
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        if let Some(reader) = self.reader.take() {
            reader.abort();
        }
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        None
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn transport_type(&self) -> &'static str {
        "in-process"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::{JsonRpcRequest, RequestId};
    use std::sync::Mutex;

    struct CollectingHandler {
        frames: Mutex<Vec<Frame>>,
    }

    #[async_trait]
    impl FrameHandler for CollectingHandler {
        async fn handle_frame(&self, frame: Frame) {
            self.frames.lock().unwrap().push(frame);
        }
        async fn handle_error(&self, _error: TransportError) {}
        async fn handle_close(&self) {}
    }

    #[tokio::test]
    async fn frames_sent_on_one_side_arrive_on_the_other() {
        let (mut client, mut server) = InProcessTransport::pair();
        let collected = Arc::new(CollectingHandler {
            frames: Mutex::new(Vec::new()),
        });
        server.set_frame_handler(collected.clone());

        client.start().await.unwrap();
        server.start().await.unwrap();

        let request = JsonRpcRequest::new("ping", None, RequestId::new_number(1));
        client.send(&Frame::Request(request)).await.unwrap();

        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        assert_eq!(collected.frames.lock().unwrap().len(), 1);
    }
}
