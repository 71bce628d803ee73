use crate::config::ServerConfig;
use crate::error::AppError;
use crate::http::{handle_client, ResourceResolver};
use log::{debug, error, info, warn};
use rand::Rng;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use threadpool::ThreadPool;

const ACCEPT_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Binds the configured address. The listener is non-blocking so the accept
/// loop can notice shutdown requests.
pub fn bind(config: &ServerConfig) -> Result<TcpListener, AppError> {
    let bind_address = config.bind_address();
    let listener = TcpListener::bind(&bind_address).map_err(|source| AppError::Bind {
        addr: bind_address.clone(),
        source,
    })?;
    listener.set_nonblocking(true)?;
    Ok(listener)
}

fn accept_loop(
    listener: TcpListener,
    config: Arc<ServerConfig>,
    resolver: Arc<dyn ResourceResolver>,
    shutdown_rx: mpsc::Receiver<()>,
) {
    let local_addr = listener
        .local_addr()
        .map(|addr| addr.to_string())
        .unwrap_or_else(|_| "unknown".to_string());
    info!("Server listening on {local_addr}");

    // `threads` workers stay warm; the pool grows whenever every worker is
    // busy so a stalled client never holds up a new connection.
    let mut pool = ThreadPool::new(config.threads.max(1));
    let in_flight = Arc::new(AtomicUsize::new(0));

    'server_loop: loop {
        match shutdown_rx.try_recv() {
            Ok(()) | Err(mpsc::TryRecvError::Disconnected) => {
                info!("Shutdown signal received. Shutting down gracefully.");
                break 'server_loop;
            }
            Err(mpsc::TryRecvError::Empty) => {}
        }

        match listener.accept() {
            Ok((stream, peer)) => {
                let request_id = generate_request_id();
                let log_prefix = format!("[ReqID: {request_id}][Peer: {peer}]");
                if let Err(e) = prepare_stream(&stream, &config) {
                    warn!("{log_prefix} Failed to configure connection: {e}");
                    continue;
                }

                let busy = in_flight.fetch_add(1, Ordering::SeqCst) + 1;
                if busy > pool.max_count() {
                    debug!("{log_prefix} All {} workers busy, adding one", pool.max_count());
                    pool.set_num_threads(busy);
                }

                let resolver = Arc::clone(&resolver);
                let in_flight = Arc::clone(&in_flight);
                let chunk_size = config.chunk_size;
                pool.execute(move || {
                    debug!("{log_prefix} Handling client connection");
                    handle_client(stream, resolver.as_ref(), chunk_size, &log_prefix);
                    in_flight.fetch_sub(1, Ordering::SeqCst);
                    debug!("{log_prefix} Client connection closed");
                });
            }
            Err(e) => thread::sleep(accept_delay(&e)),
        }
    }

    // Dropping the listener here releases the port; in-flight connections
    // keep running on the pool until they finish.
    drop(listener);
    info!("Server on {local_addr} stopped accepting connections.");
}

// Nothing to accept and failed accepts (EMFILE and friends) both wait a poll
// interval before retrying.
fn accept_delay(e: &std::io::Error) -> Duration {
    if e.kind() != std::io::ErrorKind::WouldBlock {
        error!("Error accepting connection: {e}");
    }
    ACCEPT_POLL_INTERVAL
}

// Accepted sockets may inherit the listener's non-blocking mode on some
// platforms.
fn prepare_stream(stream: &TcpStream, config: &ServerConfig) -> std::io::Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(config.io_timeout)?;
    stream.set_write_timeout(config.io_timeout)?;
    Ok(())
}

fn generate_request_id() -> String {
    rand::rng()
        .sample_iter(&rand::distr::Alphanumeric)
        .take(8)
        .map(char::from)
        .collect()
}

struct Running {
    local_addr: SocketAddr,
    shutdown_tx: mpsc::Sender<()>,
    handle: JoinHandle<()>,
}

/// An HTTP transport running its accept loop on a background thread.
/// Requests are answered by the injected [`ResourceResolver`].
pub struct FileServer {
    config: Arc<ServerConfig>,
    resolver: Arc<dyn ResourceResolver>,
    running: Option<Running>,
}

impl FileServer {
    pub fn new(config: ServerConfig, resolver: Arc<dyn ResourceResolver>) -> Self {
        Self {
            config: Arc::new(config),
            resolver,
            running: None,
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Binds and starts accepting. Bind failures are returned, not retried.
    pub fn start(&mut self) -> Result<SocketAddr, AppError> {
        if let Some(ref running) = self.running {
            return Err(AppError::AlreadyRunning(running.local_addr));
        }

        let listener = bind(&self.config)?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = mpsc::channel();
        let config = Arc::clone(&self.config);
        let resolver = Arc::clone(&self.resolver);
        let handle = thread::Builder::new()
            .name("cast-fs-accept".to_string())
            .spawn(move || accept_loop(listener, config, resolver, shutdown_rx))?;

        self.running = Some(Running {
            local_addr,
            shutdown_tx,
            handle,
        });
        Ok(local_addr)
    }

    /// Stops accepting and releases the port. Returns once the listener is
    /// closed.
    pub fn stop(&mut self) -> Result<(), AppError> {
        let running = self.running.take().ok_or(AppError::NotRunning)?;
        running.shutdown_tx.send(()).ok();
        running
            .handle
            .join()
            .map_err(|_| AppError::InternalServerError("accept thread panicked".to_string()))
    }

    /// Blocks until the accept loop exits.
    pub fn join(mut self) -> Result<(), AppError> {
        let running = self.running.take().ok_or(AppError::NotRunning)?;
        // Keep the shutdown channel open so the loop does not see a hang-up.
        let _shutdown_tx = running.shutdown_tx;
        running
            .handle
            .join()
            .map_err(|_| AppError::InternalServerError("accept thread panicked".to_string()))
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.running.as_ref().map(|running| running.local_addr)
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }
}

impl Drop for FileServer {
    fn drop(&mut self) {
        if self.running.is_some() {
            self.stop().ok();
        }
    }
}
