//! The worker side of the fleet: a TCP server that trial-divides one
//! divisor range per request and streams the factors back line by line.
//!
//! A worker serves exactly one client at a time. When the connected client
//! disconnects it goes back to listening for the next one; only a failure
//! to bind the listening port is fatal.

use crate::bigmath;
use crate::protocol::{Reply, Request};
use log::{error, info};
use std::io;
use std::net::SocketAddr;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Port used when none is given on the command line.
pub const DEFAULT_PORT: u16 = 4444;

/// A listening factor worker. Bind first, then [`run`](Worker::run) forever.
pub struct Worker {
    listener: TcpListener,
}

impl Worker {
    /// Binds the listening socket. Pass port `0` to let the OS pick one.
    pub async fn bind(port: u16) -> io::Result<Self> {
        let listener = TcpListener::bind(("0.0.0.0", port)).await?;
        Ok(Self { listener })
    }

    /// The address the worker is actually listening on.
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept loop: serve one client until it disconnects, then accept the
    /// next. Never returns except on listener failure.
    pub async fn run(self) -> io::Result<()> {
        info!("Worker listening on {}", self.local_addr()?);
        loop {
            let (stream, peer) = self.listener.accept().await?;
            info!("Client connected from {}", peer);
            if let Err(e) = serve(stream).await {
                error!("Connection to {} failed: {}", peer, e);
            }
            info!("Client disconnected, waiting for the next one");
        }
    }
}

/// Reads newline-delimited requests until the peer closes the stream.
/// Replies are flushed immediately since the coordinator blocks on them.
async fn serve(stream: TcpStream) -> io::Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut lines = BufReader::new(read_half).lines();
    while let Some(line) = lines.next_line().await? {
        write_half.write_all(handle_line(&line).as_bytes()).await?;
        write_half.flush().await?;
    }
    Ok(())
}

/// Produces the full reply (one or more lines) for a single request line.
///
/// A line that is not a well-formed `factor` request, or whose range the
/// search rejects, answers `invalid` and leaves the connection usable. The
/// `done` line echoes the bounds as requested, even when the search clamped
/// them to `sqrt(n)`.
fn handle_line(line: &str) -> String {
    let Ok(Request::Factor { n, low, high }) = line.parse() else {
        return format!("{}\n", Reply::Invalid);
    };
    match bigmath::factors_in_range(&n, &low, &high) {
        Ok(factors) => {
            let mut out = String::new();
            for p in factors {
                out.push_str(&Reply::Found { n: n.clone(), p }.to_string());
                out.push('\n');
            }
            out.push_str(&Reply::Done { n, low, high }.to_string());
            out.push('\n');
            out
        }
        Err(_) => format!("{}\n", Reply::Invalid),
    }
}
