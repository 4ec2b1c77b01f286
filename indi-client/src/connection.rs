//! Transport layer: the duplex connection and its background receive
//! worker.
//!
//! The worker is the only code that reads the socket. It feeds bytes to
//! the stream codec and hands completed protocol objects off through two
//! queues: every vector goes to the registry-update queue, and every
//! event (vectors and messages) goes to the event queue consumed by
//! `process_events`. The worker never touches the registry and never
//! invokes user callbacks.
//!
//! Transient I/O failure is recovered here: on a read error or EOF the
//! worker tears the socket down and reconnects with a doubling backoff,
//! reissuing the initial `getProperties` announcement, until it succeeds
//! or the client shuts down. The caller never sees these failures.

use std::io::{ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};

use parking_lot::Mutex;

use indi_protocol::{
    enable_blob_frame, get_properties_frame, PropertyVector, StreamCodec, WireEvent,
};

use crate::config::ClientConfig;
use crate::error::ClientResult;

pub(crate) struct Connection {
    writer: Arc<Mutex<TcpStream>>,
    shutdown: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
    /// Completed protocol objects, in codec-completion order.
    pub(crate) event_rx: Receiver<WireEvent>,
    /// Independent copies of completed vectors for registry merging.
    pub(crate) registry_rx: Receiver<PropertyVector>,
}

impl Connection {
    /// Connect, announce `getProperties`, and start the receive worker.
    pub(crate) fn open(config: &ClientConfig) -> ClientResult<Self> {
        let stream = TcpStream::connect((config.host.as_str(), config.port))?;
        stream.set_read_timeout(Some(config.read_timeout))?;
        (&stream).write_all(get_properties_frame().as_bytes())?;

        let reader = stream.try_clone()?;
        let writer = Arc::new(Mutex::new(stream));
        let shutdown = Arc::new(AtomicBool::new(false));
        let (event_tx, event_rx) = mpsc::channel();
        let (registry_tx, registry_rx) = mpsc::channel();

        let worker = {
            let writer = Arc::clone(&writer);
            let shutdown = Arc::clone(&shutdown);
            let config = config.clone();
            thread::spawn(move || {
                receive_loop(reader, writer, shutdown, event_tx, registry_tx, config)
            })
        };

        Ok(Self {
            writer,
            shutdown,
            worker: Some(worker),
            event_rx,
            registry_rx,
        })
    }

    /// Write a frame to the server. Write failures are logged and
    /// swallowed; the receive worker owns failure detection and recovery.
    pub(crate) fn send(&self, frame: &str) {
        let mut stream = self.writer.lock();
        if let Err(error) = stream.write_all(frame.as_bytes()) {
            tracing::warn!(%error, "write failed, leaving recovery to the receive worker");
        }
    }

    /// Opt in to receiving BLOB vectors.
    pub(crate) fn enable_blob(&self) {
        self.send(enable_blob_frame());
    }

    pub(crate) fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Stop the worker, close the socket, and join. Idempotent.
    pub(crate) fn shutdown(&mut self) {
        if self.shutdown.swap(true, Ordering::SeqCst) {
            return;
        }
        {
            let stream = self.writer.lock();
            let _ = stream.shutdown(Shutdown::Both);
        }
        if let Some(worker) = self.worker.take() {
            let _ = worker.join();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn receive_loop(
    mut reader: TcpStream,
    writer: Arc<Mutex<TcpStream>>,
    shutdown: Arc<AtomicBool>,
    event_tx: Sender<WireEvent>,
    registry_tx: Sender<PropertyVector>,
    config: ClientConfig,
) {
    tracing::info!(host = %config.host, port = config.port, "receive worker started");
    let mut codec = StreamCodec::new();
    let mut buf = [0u8; 65536];

    while !shutdown.load(Ordering::SeqCst) {
        match reader.read(&mut buf) {
            Ok(0) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                tracing::warn!("server closed the connection, resetting");
                match reconnect(&writer, &shutdown, &config) {
                    Some(fresh) => {
                        reader = fresh;
                        codec = StreamCodec::new();
                    }
                    None => break,
                }
            }
            Ok(n) => {
                for event in codec.feed(&buf[..n]) {
                    if let WireEvent::Vector(vector, _) = &event {
                        let _ = registry_tx.send(vector.clone());
                    }
                    let _ = event_tx.send(event);
                }
            }
            Err(error)
                if matches!(
                    error.kind(),
                    ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                ) => {}
            Err(error) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                tracing::warn!(%error, "socket read failed, resetting connection");
                match reconnect(&writer, &shutdown, &config) {
                    Some(fresh) => {
                        reader = fresh;
                        codec = StreamCodec::new();
                    }
                    None => break,
                }
            }
        }
    }
    tracing::info!("receive worker stopped");
}

/// Rebuild the connection from scratch: new socket, fresh announcement,
/// swapped writer. Retries with a doubling backoff until success or
/// shutdown.
fn reconnect(
    writer: &Arc<Mutex<TcpStream>>,
    shutdown: &Arc<AtomicBool>,
    config: &ClientConfig,
) -> Option<TcpStream> {
    let mut backoff = config.reconnect_initial_backoff;
    loop {
        if shutdown.load(Ordering::SeqCst) {
            return None;
        }
        thread::sleep(backoff);
        backoff = (backoff * 2).min(config.reconnect_max_backoff);

        let stream = match TcpStream::connect((config.host.as_str(), config.port)) {
            Ok(stream) => stream,
            Err(error) => {
                tracing::debug!(%error, "reconnect attempt failed");
                continue;
            }
        };
        if stream.set_read_timeout(Some(config.read_timeout)).is_err() {
            continue;
        }
        if (&stream).write_all(get_properties_frame().as_bytes()).is_err() {
            continue;
        }
        match stream.try_clone() {
            Ok(reader) => {
                *writer.lock() = stream;
                tracing::info!(host = %config.host, port = config.port, "connection reset");
                return Some(reader);
            }
            Err(error) => {
                tracing::debug!(%error, "reconnect attempt failed");
            }
        }
    }
}
