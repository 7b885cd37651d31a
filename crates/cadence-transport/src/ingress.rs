//! TCP ingress
//!
//! Clients connect and write one JSON line per event or request. Each
//! connection receives, as JSON lines, the replies of every client it has
//! sent messages for, plus an error line for each line it sent that could
//! not be decoded or delivered.

use std::collections::HashSet;
use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use cadence_core::{CadenceError, CadenceResult, ClientId, Reply};
use cadence_wire::{decode_inbound, encode_outbound, Outbound, MAX_LINE_LEN};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::{deliver, Router};

/// Outbound lines buffered per connection
const OUTBOUND_BUFFER: usize = 64;

/// TCP listener feeding the router
pub struct TcpIngress {
    listener: TcpListener,
    local_addr: SocketAddr,
}

impl TcpIngress {
    /// Bind to a local address
    pub async fn bind(addr: SocketAddr) -> CadenceResult<Self> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|e| CadenceError::TransportError(e.to_string()))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| CadenceError::TransportError(e.to_string()))?;

        Ok(TcpIngress {
            listener,
            local_addr,
        })
    }

    /// Get local address
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Accept connections until `shutdown` fires
    pub async fn run(self, router: Arc<Router>, mut shutdown: broadcast::Receiver<()>) {
        info!(addr = %self.local_addr, "ingress listening");

        loop {
            tokio::select! {
                _ = shutdown.recv() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        tokio::spawn(serve_connection(
                            stream,
                            peer,
                            Arc::clone(&router),
                            shutdown.resubscribe(),
                        ));
                    }
                    Err(e) => warn!(error = %e, "accept failed"),
                },
            }
        }

        info!(addr = %self.local_addr, "ingress stopped");
    }
}

async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    router: Arc<Router>,
    mut shutdown: broadcast::Receiver<()>,
) {
    debug!(%peer, "connection opened");

    let (reader, mut writer) = stream.into_split();
    let mut lines = LineReader::new(reader, MAX_LINE_LEN);
    let (out_tx, mut out_rx) = mpsc::channel::<Outbound>(OUTBOUND_BUFFER);
    let mut subscribed: HashSet<ClientId> = HashSet::new();

    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            frame = lines.next_frame() => match frame {
                Ok(Some(frame)) => {
                    let handled = match frame {
                        Frame::Line(line) if line.trim().is_empty() => continue,
                        Frame::Line(line) => handle_line(&line, &router, &mut subscribed, &out_tx),
                        Frame::NotUtf8 => Err(CadenceError::InvalidWireFormat(
                            "line is not valid UTF-8".to_string(),
                        )),
                        Frame::Oversized => Err(CadenceError::InvalidWireFormat(format!(
                            "line exceeds {MAX_LINE_LEN} bytes"
                        ))),
                    };
                    if let Err(e) = handled {
                        warn!(%peer, error = %e, "dropped inbound line");
                        let reply = Outbound::error(e.to_string());
                        if write_line(&mut writer, &reply).await.is_err() {
                            break;
                        }
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!(%peer, error = %e, "read failed");
                    break;
                }
            },
            Some(message) = out_rx.recv() => {
                if let Err(e) = write_line(&mut writer, &message).await {
                    debug!(%peer, error = %e, "write failed");
                    break;
                }
            }
        }
    }

    debug!(%peer, "connection closed");
}

/// One unit read off a connection
#[derive(Debug, PartialEq)]
enum Frame {
    Line(String),
    NotUtf8,
    /// The line outgrew the limit; the rest of it is skipped unread
    Oversized,
}

/// Newline-delimited reader that never holds more than `max_len` bytes of
/// one line. `next_frame` is cancel-safe: partial lines stay in `buf`.
struct LineReader<R> {
    inner: BufReader<R>,
    buf: Vec<u8>,
    max_len: usize,
    /// Skipping the tail of an oversized line
    discarding: bool,
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    fn new(reader: R, max_len: usize) -> Self {
        LineReader {
            inner: BufReader::new(reader),
            buf: Vec::new(),
            max_len,
            discarding: false,
        }
    }

    /// Next line without its terminator, or `None` at end of stream
    async fn next_frame(&mut self) -> io::Result<Option<Frame>> {
        loop {
            let available = self.inner.fill_buf().await?;
            if available.is_empty() {
                self.discarding = false;
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(self.take_line()));
            }

            let (complete, used) = match available.iter().position(|&b| b == b'\n') {
                Some(i) => (true, i + 1),
                None => (false, available.len()),
            };

            if self.discarding {
                self.inner.consume(used);
                self.discarding = !complete;
                continue;
            }

            let content = if complete { used - 1 } else { used };
            if self.buf.len() + content > self.max_len {
                self.buf.clear();
                self.inner.consume(used);
                self.discarding = !complete;
                return Ok(Some(Frame::Oversized));
            }

            self.buf.extend_from_slice(&available[..content]);
            self.inner.consume(used);
            if complete {
                return Ok(Some(self.take_line()));
            }
        }
    }

    fn take_line(&mut self) -> Frame {
        let mut line = std::mem::take(&mut self.buf);
        if line.last() == Some(&b'\r') {
            line.pop();
        }
        match String::from_utf8(line) {
            Ok(line) => Frame::Line(line),
            Err(_) => Frame::NotUtf8,
        }
    }
}

/// Decode and deliver one line. Replies of a client are subscribed to
/// before its first message is delivered, so none are missed.
fn handle_line(
    line: &str,
    router: &Router,
    subscribed: &mut HashSet<ClientId>,
    out: &mpsc::Sender<Outbound>,
) -> CadenceResult<()> {
    let message = decode_inbound(line)?;
    let client_id = message.client_id();
    let engine = router.engine_for(client_id)?;

    if subscribed.insert(client_id) {
        tokio::spawn(forward_replies(engine.subscribe_replies(), out.clone()));
    }

    deliver(&engine, message)
}

async fn forward_replies(mut replies: broadcast::Receiver<Reply>, out: mpsc::Sender<Outbound>) {
    loop {
        tokio::select! {
            _ = out.closed() => break,
            reply = replies.recv() => match reply {
                Ok(reply) => {
                    if out.send(Outbound::Reply(reply)).await.is_err() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "connection lagging, replies dropped")
                }
                Err(RecvError::Closed) => break,
            },
        }
    }
}

async fn write_line<W: AsyncWrite + Unpin>(
    writer: &mut W,
    message: &Outbound,
) -> CadenceResult<()> {
    let mut line = encode_outbound(message)?;
    line.push('\n');
    writer
        .write_all(line.as_bytes())
        .await
        .map_err(|e| CadenceError::TransportError(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use cadence_core::{ActuatorCommand, ActuatorRef, EntityId, Outcome};
    use cadence_runtime::{ActuatorControl, EngineConfig};
    use cadence_wire::decode_outbound;
    use tokio::io::{BufReader, Lines};
    use tokio::net::tcp::OwnedReadHalf;

    struct NoControl;

    impl ActuatorControl for NoControl {
        fn send(&self, _actuator: &ActuatorRef, _command: ActuatorCommand) {}
    }

    async fn start() -> (SocketAddr, Arc<Router>, broadcast::Sender<()>) {
        let config = EngineConfig {
            max_wait_time: 0.0,
            ..Default::default()
        };
        let router = Arc::new(Router::new(config, Arc::new(NoControl)));
        let ingress = TcpIngress::bind("127.0.0.1:0".parse().unwrap()).await.unwrap();
        let addr = ingress.local_addr();
        let (shutdown_tx, _) = broadcast::channel(1);
        tokio::spawn(ingress.run(Arc::clone(&router), shutdown_tx.subscribe()));
        (addr, router, shutdown_tx)
    }

    async fn next_outbound(lines: &mut Lines<BufReader<OwnedReadHalf>>) -> Outbound {
        let line = tokio::time::timeout(Duration::from_secs(5), lines.next_line())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        decode_outbound(&line).unwrap()
    }

    #[tokio::test]
    async fn test_event_and_request_over_tcp() {
        let (addr, router, _shutdown) = start().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer
            .write_all(concat!(
                r#"{"v":1,"type":"event","timestamp":1.0,"client_id":8,"entity_id":11,"entity_type":"TempSensor","value":{"double":20.0}}"#,
                "\n",
                r#"{"v":1,"type":"request","timestamp":2.0,"client_id":8,"email":"a@b.c","command":{"kind":"ANALYSIS_GET_MOST_ACTIVE_ENTITY"}}"#,
                "\n",
            ).as_bytes())
            .await
            .unwrap();

        let Outbound::Reply(reply) = next_outbound(&mut lines).await else {
            panic!("expected a reply");
        };
        assert_eq!(reply.client_id, ClientId::new(8));
        assert_eq!(
            reply.outcome,
            Outcome::MostActiveEntity {
                entity_id: Some(EntityId::new(11))
            }
        );
        assert_eq!(router.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_line_gets_error_and_connection_survives() {
        let (addr, _router, _shutdown) = start().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        writer.write_all(b"this is not json\n").await.unwrap();
        assert!(matches!(next_outbound(&mut lines).await, Outbound::Error { .. }));

        writer
            .write_all(b"{\"v\":9,\"type\":\"event\"}\n")
            .await
            .unwrap();
        let Outbound::Error { message } = next_outbound(&mut lines).await else {
            panic!("expected an error");
        };
        assert!(message.contains("version"));

        writer
            .write_all(concat!(
                r#"{"v":1,"type":"request","timestamp":1.0,"client_id":3,"command":{"kind":"ANALYSIS_GET_ALL_ENTITIES"}}"#,
                "\n",
            ).as_bytes())
            .await
            .unwrap();
        let Outbound::Reply(reply) = next_outbound(&mut lines).await else {
            panic!("expected a reply");
        };
        assert_eq!(reply.outcome, Outcome::Entities { entity_ids: vec![] });
    }

    #[tokio::test]
    async fn test_line_reader_caps_lines() {
        let input: &[u8] = b"short\r\nmuch too long for eight\nok\n\xff\xfe\ntail";
        let mut reader = LineReader::new(input, 8);

        assert_eq!(reader.next_frame().await.unwrap(), Some(Frame::Line("short".into())));
        assert_eq!(reader.next_frame().await.unwrap(), Some(Frame::Oversized));
        assert!(reader.buf.len() <= 8);
        assert_eq!(reader.next_frame().await.unwrap(), Some(Frame::Line("ok".into())));
        assert_eq!(reader.next_frame().await.unwrap(), Some(Frame::NotUtf8));
        assert_eq!(reader.next_frame().await.unwrap(), Some(Frame::Line("tail".into())));
        assert_eq!(reader.next_frame().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_oversized_line_rejected_before_it_ends() {
        let (addr, _router, _shutdown) = start().await;
        let stream = TcpStream::connect(addr).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut lines = BufReader::new(reader).lines();

        // No newline yet: the error must arrive while the line is still open
        writer.write_all(&vec![b'x'; MAX_LINE_LEN + 1024]).await.unwrap();
        let Outbound::Error { message } = next_outbound(&mut lines).await else {
            panic!("expected an error");
        };
        assert!(message.contains("exceeds"));

        // The tail of the oversized line is skipped, then the connection carries on
        writer.write_all(&vec![b'x'; 4096]).await.unwrap();
        writer
            .write_all(concat!(
                "\n",
                r#"{"v":1,"type":"request","timestamp":1.0,"client_id":5,"command":{"kind":"ANALYSIS_GET_ALL_ENTITIES"}}"#,
                "\n",
            ).as_bytes())
            .await
            .unwrap();
        let Outbound::Reply(reply) = next_outbound(&mut lines).await else {
            panic!("expected a reply");
        };
        assert_eq!(reply.client_id, ClientId::new(5));
    }

    #[tokio::test]
    async fn test_shutdown_stops_accepting() {
        let (addr, _router, shutdown) = start().await;
        shutdown.send(()).unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let refused = tokio::time::timeout(Duration::from_secs(5), TcpStream::connect(addr)).await;
        assert!(matches!(refused, Ok(Err(_))));
    }
}
