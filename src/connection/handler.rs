//! Connection Handler
//!
//! Each client gets its own task running a decode → execute → reply loop
//! until the client hangs up or sends something that is not a valid frame.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! accept ──> ConnectionHandler::run
//!               │
//!               ▼
//!     ┌───────────────────────────┐
//!     │ decode frames in buffer   │◄──┐
//!     │   execute, write reply    │   │
//!     └─────────────┬─────────────┘   │
//!                   │ need more bytes │
//!                   ▼                 │
//!     ┌───────────────────────────┐   │
//!     │ read from socket          │───┘
//!     └─────────────┬─────────────┘
//!                   │ EOF / decode error / I/O error
//!                   ▼
//!              task ends
//! ```
//!
//! A malformed frame, or a stream that ends halfway through a frame, closes
//! the connection without a reply. Command errors are ordinary replies and
//! keep the connection open.

use crate::commands::CommandHandler;
use crate::protocol::{DecodeError, Frame, FrameDecoder, Reply, MAX_BULK_SIZE};
use bytes::BytesMut;
use std::net::SocketAddr;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, error, trace, warn};

/// Upper bound on buffered, not-yet-decoded input
const MAX_BUFFER_SIZE: usize = MAX_BULK_SIZE + 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// The client sent a malformed frame
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// The stream ended in the middle of a frame
    #[error("Unexpected end of stream")]
    UnexpectedEof,

    #[error("Buffer size limit exceeded")]
    BufferFull,
}

/// Serves one client connection.
///
/// Generic over the stream so it can run on a `TcpStream` or an in-memory
/// test double.
pub struct ConnectionHandler<S> {
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    /// Bytes read but not yet decoded
    buffer: BytesMut,

    decoder: FrameDecoder,

    command_handler: CommandHandler,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(stream: S, addr: SocketAddr, command_handler: CommandHandler) -> Self {
        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            decoder: FrameDecoder::new(),
            command_handler,
        }
    }

    /// Runs the connection until the client disconnects or an error occurs.
    ///
    /// Returns `Ok(())` when the client closed the stream between frames.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        debug!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => debug!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::IoError(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Closing connection"),
        }

        result
    }

    /// The main read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(frame) = self.try_decode_frame()? {
                if let Some(reply) = self.command_handler.execute(&frame) {
                    self.send_reply(&reply).await?;
                }
            }

            if !self.read_more_data().await? {
                return Ok(());
            }
        }
    }

    /// Decodes one frame from the buffer, if a whole one has arrived.
    fn try_decode_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        match self.decoder.decode(&self.buffer)? {
            Some((frame, consumed)) => {
                let _ = self.buffer.split_to(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Decoded frame"
                );
                Ok(Some(frame))
            }
            None => Ok(None),
        }
    }

    /// Reads more data from the socket into the buffer.
    ///
    /// Returns `false` when the client closed the stream cleanly.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        if self.buffer.len() >= MAX_BUFFER_SIZE {
            error!(
                client = %self.addr,
                size = self.buffer.len(),
                "Buffer size limit exceeded"
            );
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            return if self.buffer.is_empty() {
                Ok(false)
            } else {
                Err(ConnectionError::UnexpectedEof)
            };
        }

        trace!(client = %self.addr, bytes = n, "Read data");
        Ok(true)
    }

    async fn send_reply(&mut self, reply: &Reply) -> Result<(), ConnectionError> {
        let bytes = reply.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        trace!(client = %self.addr, bytes = bytes.len(), "Sent reply");
        Ok(())
    }
}

/// Serves a client connection to completion.
///
/// Errors are logged by [`ConnectionHandler::run`]; this wrapper exists so
/// the accept loop can hand it straight to `tokio::spawn`.
pub async fn handle_connection<S>(stream: S, addr: SocketAddr, command_handler: CommandHandler)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler);
    let _ = handler.run().await;
}
