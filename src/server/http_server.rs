use may::coroutine::JoinHandle;
use may_minihttp::{HttpServerWithHeaders, HttpService};
use std::fmt;
use std::io;
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Request headers accepted per request before the transport rejects it.
pub const MAX_REQUEST_HEADERS: usize = 32;

const READY_POLL: Duration = Duration::from_millis(5);
const READY_TIMEOUT: Duration = Duration::from_millis(250);

/// Serves an [`HttpService`] (normally [`AppService`](super::AppService))
/// on may_minihttp.
pub struct HttpServer<S>(pub S);

/// A listening server. Dropping it leaves the server running; call
/// [`ServerHandle::stop`] to shut it down.
pub struct ServerHandle {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl fmt::Debug for ServerHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerHandle").field("addr", &self.addr).finish_non_exhaustive()
    }
}

impl ServerHandle {
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// [`ServerHandle::wait_ready_for`] with a 250ms budget.
    ///
    /// # Errors
    ///
    /// `TimedOut` when nothing accepts in time.
    pub fn wait_ready(&self) -> io::Result<()> {
        self.wait_ready_for(READY_TIMEOUT)
    }

    /// Connect repeatedly until the listener accepts or `timeout` elapses.
    ///
    /// # Errors
    ///
    /// `TimedOut` when nothing accepts in time.
    pub fn wait_ready_for(&self, timeout: Duration) -> io::Result<()> {
        let deadline = Instant::now() + timeout;
        loop {
            if TcpStream::connect(self.addr).is_ok() {
                debug!(addr = %self.addr, "HTTP server ready");
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(io::Error::new(io::ErrorKind::TimedOut, "server not ready"));
            }
            thread::sleep(READY_POLL);
        }
    }

    /// Cancel the accept loop and wait for it to exit.
    pub fn stop(self) {
        // SAFETY: the accept coroutine is ours and only this handle joins it.
        unsafe {
            self.handle.coroutine().cancel();
        }
        let _ = self.handle.join();
        info!(addr = %self.addr, "HTTP server stopped");
    }

    /// Block until the accept loop exits, which normally means forever.
    ///
    /// # Errors
    ///
    /// The accept coroutine panicked.
    pub fn join(self) -> thread::Result<()> {
        self.handle.join()
    }
}

impl<S: HttpService + Clone + Send + Sync + 'static> HttpServer<S> {
    /// Bind the first address `addr` resolves to and start accepting.
    ///
    /// # Errors
    ///
    /// The address resolves to nothing or cannot be bound.
    pub fn start<A: ToSocketAddrs>(self, addr: A) -> io::Result<ServerHandle> {
        let addr = addr
            .to_socket_addrs()?
            .next()
            .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "address resolved to nothing"))?;
        let handle = HttpServerWithHeaders::<_, MAX_REQUEST_HEADERS>(self.0).start(addr)?;
        info!(addr = %addr, max_headers = MAX_REQUEST_HEADERS, "HTTP server listening");
        Ok(ServerHandle { addr, handle })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;

    #[test]
    fn test_unresolvable_address_is_invalid_input() {
        let empty: Vec<SocketAddr> = Vec::new();
        let err = HttpServer(crate::server::AppService::new(
            crate::app::App::new(crate::config::AppConfig::default()).into_shared(),
        ))
        .start(empty.as_slice())
        .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidInput);
    }

    #[test]
    fn test_wait_ready_times_out_without_listener() {
        // Reserve a port, then free it so nothing listens there.
        let addr = TcpListener::bind("127.0.0.1:0").unwrap().local_addr().unwrap();
        let handle = may::go!(|| {});
        let server = ServerHandle { addr, handle };
        let err = server.wait_ready_for(Duration::from_millis(20)).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
        server.join().unwrap();
    }
}
