// ! Stdio transport
// !
// ! Line-delimited framing over an input/output stream pair, with the single
// ! implicit session id `"stdio"`. One complete JSON value per
// ! newline-terminated line; partial trailing data is retained across reads
// ! by the buffered reader. A periodic tick drains the session's outbound
// ! queue (server-initiated notifications) to the writer.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader, BufWriter};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::core::error::{McpError, McpResult};
use crate::session::{SessionStore, STDIO_SESSION_ID};
use crate::transport::traits::{MessageContext, ServerTransport, TransportEvent};

/// Interval between outbound-queue drain ticks
const WRITER_TICK: Duration = Duration::from_millis(100);

/// Event channel depth; readers apply backpressure past this
const EVENT_BUFFER: usize = 256;

/// Stdio server transport, generic over its streams so tests can drive it
/// with in-memory pipes
pub struct StdioServerTransport<R = tokio::io::Stdin, W = tokio::io::Stdout>
where
    R: AsyncRead + Unpin + Send + Sync + 'static,
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    reader: Option<BufReader<R>>,
    writer: Arc<Mutex<BufWriter<W>>>,
    session_store: Arc<dyn SessionStore>,
    tasks: Vec<JoinHandle<()>>,
}

impl StdioServerTransport {
    /// Bind to the process's stdin and stdout
    pub fn new(session_store: Arc<dyn SessionStore>) -> Self {
        Self::with_streams(tokio::io::stdin(), tokio::io::stdout(), session_store)
    }
}

impl<R, W> StdioServerTransport<R, W>
where
    R: AsyncRead + Unpin + Send + Sync + 'static,
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    /// Bind to an arbitrary stream pair
    pub fn with_streams(reader: R, writer: W, session_store: Arc<dyn SessionStore>) -> Self {
        Self {
            reader: Some(BufReader::new(reader)),
            writer: Arc::new(Mutex::new(BufWriter::new(writer))),
            session_store,
            tasks: Vec::new(),
        }
    }

    async fn write_line(writer: &Mutex<BufWriter<W>>, frame: &str) -> McpResult<()> {
        let mut writer = writer.lock().await;
        writer
            .write_all(frame.as_bytes())
            .await
            .map_err(|e| McpError::transport(format!("failed to write frame: {e}")))?;
        writer
            .write_all(b"\n")
            .await
            .map_err(|e| McpError::transport(format!("failed to write newline: {e}")))?;
        writer
            .flush()
            .await
            .map_err(|e| McpError::transport(format!("failed to flush: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl<R, W> ServerTransport for StdioServerTransport<R, W>
where
    R: AsyncRead + Unpin + Send + Sync + 'static,
    W: AsyncWrite + Unpin + Send + Sync + 'static,
{
    async fn start(&mut self) -> McpResult<mpsc::Receiver<TransportEvent>> {
        let mut reader = self
            .reader
            .take()
            .ok_or_else(|| McpError::transport("stdio transport already started"))?;

        let (events, receiver) = mpsc::channel(EVENT_BUFFER);

        let _ = events.send(TransportEvent::Ready).await;
        let _ = events
            .send(TransportEvent::ClientConnected {
                session_id: STDIO_SESSION_ID.to_string(),
            })
            .await;

        // Reader loop: one Message event per complete line
        let reader_events = events.clone();
        self.tasks.push(tokio::spawn(async move {
            let mut line = String::new();
            loop {
                line.clear();
                match reader.read_line(&mut line).await {
                    Ok(0) => {
                        tracing::debug!("stdio reached EOF, closing");
                        let _ = reader_events
                            .send(TransportEvent::ClientDisconnected {
                                session_id: STDIO_SESSION_ID.to_string(),
                                reason: Some("eof".to_string()),
                            })
                            .await;
                        let _ = reader_events
                            .send(TransportEvent::Closed {
                                reason: Some("eof".to_string()),
                            })
                            .await;
                        break;
                    }
                    Ok(_) => {
                        let frame = line.trim();
                        if frame.is_empty() {
                            continue;
                        }
                        tracing::trace!("stdio received: {}", frame);
                        if reader_events
                            .send(TransportEvent::Message {
                                session_id: STDIO_SESSION_ID.to_string(),
                                frame: frame.to_string(),
                                context: MessageContext::default(),
                            })
                            .await
                            .is_err()
                        {
                            break;
                        }
                    }
                    Err(e) => {
                        tracing::error!("error reading from stdio: {}", e);
                        let _ = reader_events
                            .send(TransportEvent::Error {
                                session_id: Some(STDIO_SESSION_ID.to_string()),
                                message: e.to_string(),
                            })
                            .await;
                        let _ = reader_events
                            .send(TransportEvent::Closed {
                                reason: Some(e.to_string()),
                            })
                            .await;
                        break;
                    }
                }
            }
        }));

        // Writer tick: queued notifications ride out between responses
        let writer = Arc::clone(&self.writer);
        let store = Arc::clone(&self.session_store);
        self.tasks.push(tokio::spawn(async move {
            let mut tick = tokio::time::interval(WRITER_TICK);
            loop {
                tick.tick().await;
                let frames = match store.drain(STDIO_SESSION_ID).await {
                    Ok(frames) => frames,
                    Err(e) => {
                        tracing::warn!("stdio drain failed: {}", e);
                        continue;
                    }
                };
                for frame in frames {
                    if let Err(e) = Self::write_line(&writer, &frame).await {
                        tracing::warn!("stdio notification write failed: {}", e);
                    }
                }
            }
        }));

        Ok(receiver)
    }

    async fn send(
        &self,
        _session_id: &str,
        frame: String,
        _context: &MessageContext,
    ) -> McpResult<()> {
        tracing::trace!("stdio sending: {}", frame);
        Self::write_line(&self.writer, &frame).await
    }

    async fn close(&mut self) -> McpResult<()> {
        tracing::debug!("closing stdio transport");
        for task in self.tasks.drain(..) {
            task.abort();
        }
        let mut writer = self.writer.lock().await;
        let _ = writer.shutdown().await;
        Ok(())
    }

    fn transport_info(&self) -> String {
        format!("stdio transport (started: {})", self.reader.is_none())
    }
}
