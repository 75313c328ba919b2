//! Blocking TCP transport speaking newline-delimited JSON frames.
//!
//! # Threads
//!
//! ```text
//! Tick Thread               Stream Writer (per missile)     Stream Reader (per missile)
//!     |                           |                               |
//!     |--send(state)------------->| rx.recv()                     |
//!     |   [tx: bounded(cap)]      | connect + OpenStream          |
//!     |                           | write State frames            |
//!     |                           |------------spawn------------->|
//!     |--complete()-------------->| (sender dropped)              | read_frame()
//!     |                           | CloseStream, shutdown(Write)  | Control -> observer
//!     |                           |                               | EOF -> Completed
//! ```
//!
//! Requests (`health_check`, `register_missile`) open a short-lived
//! connection each, bounded by the caller's deadline.

use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpStream, ToSocketAddrs};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;
use std::time::Duration;

use crossbeam_channel::{Receiver, Sender, TrySendError};
use homing_core::{HardwareConfig, Missile, MissileState, TransportError};

use crate::codec::{read_frame, write_frame, Frame};
use crate::transport::{Channel, OutboundStream, StreamEvent, StreamObserver, Transport};

// ── TcpTransport ─────────────────────────────────────────────────

/// Creates [`TcpChannel`]s.
#[derive(Clone, Debug)]
pub struct TcpTransport {
    outbound_capacity: usize,
    connect_timeout: Duration,
    linger: Duration,
}

impl TcpTransport {
    /// A transport queueing up to `outbound_capacity` snapshots per stream.
    pub fn new(outbound_capacity: usize) -> Self {
        Self {
            outbound_capacity: outbound_capacity.max(1),
            connect_timeout: Duration::from_secs(2),
            linger: Duration::from_secs(60),
        }
    }

    /// Timeout for establishing a stream connection. Default: 2s.
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// How long a half-closed stream waits for the server to finish.
    /// Default: 60s.
    pub fn with_linger(mut self, linger: Duration) -> Self {
        self.linger = linger;
        self
    }
}

impl Transport for TcpTransport {
    fn connect(&self, endpoint: &str) -> Result<Arc<dyn Channel>, TransportError> {
        Ok(Arc::new(TcpChannel {
            endpoint: endpoint.to_string(),
            resolved: Mutex::new(None),
            outbound_capacity: self.outbound_capacity,
            connect_timeout: self.connect_timeout,
            linger: self.linger,
        }))
    }
}

// ── TcpChannel ───────────────────────────────────────────────────

/// Channel to one guidance server.
///
/// Name resolution is deferred to first use and then cached, so the
/// first probe absorbs the DNS cost instead of the first session.
pub struct TcpChannel {
    endpoint: String,
    resolved: Mutex<Option<SocketAddr>>,
    outbound_capacity: usize,
    connect_timeout: Duration,
    linger: Duration,
}

impl TcpChannel {
    fn cached(&self) -> Option<SocketAddr> {
        *self.resolved.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self) -> Result<SocketAddr, TransportError> {
        if let Some(addr) = self.cached() {
            return Ok(addr);
        }
        let addr = resolve_endpoint(&self.endpoint)?;
        *self.resolved.lock().unwrap_or_else(PoisonError::into_inner) = Some(addr);
        Ok(addr)
    }

    fn unavailable(&self, reason: String) -> TransportError {
        unavailable(&self.endpoint, reason)
    }

    fn dial(&self, timeout: Duration) -> Result<TcpStream, TransportError> {
        let addr = self.resolve()?;
        let stream = TcpStream::connect_timeout(&addr, timeout).map_err(|e| {
            if e.kind() == std::io::ErrorKind::TimedOut {
                TransportError::DeadlineExceeded { deadline: timeout }
            } else {
                self.unavailable(e.to_string())
            }
        })?;
        stream.set_nodelay(true)?;
        Ok(stream)
    }

    /// One request/response exchange on a fresh connection.
    fn request(&self, frame: &Frame, deadline: Duration) -> Result<Frame, TransportError> {
        let mut stream = self.dial(deadline)?;
        stream.set_read_timeout(Some(deadline))?;
        stream.set_write_timeout(Some(deadline))?;
        write_frame(&mut stream, frame)?;
        let mut reader = BufReader::new(stream);
        match read_frame(&mut reader) {
            Ok(Some(reply)) => Ok(reply),
            Ok(None) => Err(TransportError::StreamClosed),
            Err(TransportError::Io { .. }) => Err(TransportError::DeadlineExceeded { deadline }),
            Err(e) => Err(e),
        }
    }
}

impl Channel for TcpChannel {
    fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn health_check(&self, deadline: Duration) -> Result<(), TransportError> {
        match self.request(&Frame::HealthCheck, deadline)? {
            Frame::HealthOk => Ok(()),
            Frame::Error { reason } => Err(self.unavailable(reason)),
            other => Err(unexpected(&other)),
        }
    }

    fn register_missile(
        &self,
        missile: &Missile,
        deadline: Duration,
    ) -> Result<HardwareConfig, TransportError> {
        let frame = Frame::Register {
            missile: missile.clone(),
        };
        match self.request(&frame, deadline)? {
            Frame::Registered { hardware } => Ok(hardware),
            Frame::Error { reason } => Err(self.unavailable(reason)),
            other => Err(unexpected(&other)),
        }
    }

    fn open_stream(
        &self,
        missile: &Missile,
        observer: Arc<dyn StreamObserver>,
    ) -> Result<Box<dyn OutboundStream>, TransportError> {
        let (tx, rx) = crossbeam_channel::bounded(self.outbound_capacity);
        let observer = Arc::new(TerminalOnce::new(observer));
        let writer = StreamWriter {
            missile: missile.clone(),
            endpoint: self.endpoint.clone(),
            addr: self.cached(),
            connect_timeout: self.connect_timeout,
            linger: self.linger,
            rx,
            observer,
        };
        thread::Builder::new()
            .name(format!("homing-stream-{}", missile.id))
            .spawn(move || writer.run())
            .map_err(|e| TransportError::Io {
                reason: format!("spawn stream writer: {e}"),
            })?;
        Ok(Box::new(TcpOutbound {
            tx: Mutex::new(Some(tx)),
        }))
    }
}

fn resolve_endpoint(endpoint: &str) -> Result<SocketAddr, TransportError> {
    endpoint
        .to_socket_addrs()
        .map_err(|e| unavailable(endpoint, e.to_string()))?
        .next()
        .ok_or_else(|| unavailable(endpoint, "no addresses resolved".into()))
}

fn unavailable(endpoint: &str, reason: String) -> TransportError {
    TransportError::Unavailable {
        endpoint: endpoint.to_string(),
        reason,
    }
}

fn unexpected(frame: &Frame) -> TransportError {
    TransportError::Protocol {
        reason: format!("unexpected frame {frame:?}"),
    }
}

// ── Stream plumbing ──────────────────────────────────────────────

/// Forwards events until the first terminal one, then drops the rest.
///
/// Reader and writer threads may both observe a broken connection.
struct TerminalOnce {
    inner: Arc<dyn StreamObserver>,
    done: AtomicBool,
}

impl TerminalOnce {
    fn new(inner: Arc<dyn StreamObserver>) -> Self {
        Self {
            inner,
            done: AtomicBool::new(false),
        }
    }

    fn deliver(&self, event: StreamEvent) {
        if self.done.load(Ordering::Acquire) {
            return;
        }
        if event.is_terminal() && self.done.swap(true, Ordering::AcqRel) {
            return;
        }
        self.inner.on_event(event);
    }

    fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }
}

struct TcpOutbound {
    tx: Mutex<Option<Sender<MissileState>>>,
}

impl OutboundStream for TcpOutbound {
    fn send(&self, state: MissileState) -> Result<(), TransportError> {
        let guard = self.tx.lock().unwrap_or_else(PoisonError::into_inner);
        let tx = guard.as_ref().ok_or(TransportError::StreamClosed)?;
        tx.try_send(state).map_err(|e| match e {
            TrySendError::Full(_) => TransportError::Backpressure,
            TrySendError::Disconnected(_) => TransportError::StreamClosed,
        })
    }

    fn complete(&self) {
        // Dropping the sender lets the writer drain the queue and then
        // half-close.
        self.tx.lock().unwrap_or_else(PoisonError::into_inner).take();
    }
}

struct StreamWriter {
    missile: Missile,
    endpoint: String,
    addr: Option<SocketAddr>,
    connect_timeout: Duration,
    linger: Duration,
    rx: Receiver<MissileState>,
    observer: Arc<TerminalOnce>,
}

impl StreamWriter {
    fn run(self) {
        if let Err(e) = self.pump() {
            log::debug!(
                "missile {} stream to {} failed: {e}",
                self.missile.id,
                self.endpoint
            );
            self.observer.deliver(StreamEvent::Failed(e));
        }
    }

    fn pump(&self) -> Result<(), TransportError> {
        // Resolve here, not on the caller's thread, if no probe primed
        // the channel yet.
        let addr = match self.addr {
            Some(addr) => addr,
            None => resolve_endpoint(&self.endpoint)?,
        };
        let mut stream = TcpStream::connect_timeout(&addr, self.connect_timeout)
            .map_err(|e| unavailable(&self.endpoint, e.to_string()))?;
        stream.set_nodelay(true)?;
        write_frame(
            &mut stream,
            &Frame::OpenStream {
                missile: self.missile.clone(),
            },
        )?;

        let read_half = stream.try_clone()?;
        let observer = Arc::clone(&self.observer);
        thread::Builder::new()
            .name(format!("homing-stream-rx-{}", self.missile.id))
            .spawn(move || read_loop(read_half, &observer))
            .map_err(|e| TransportError::Io {
                reason: format!("spawn stream reader: {e}"),
            })?;

        // recv() errors once the outbound side is completed and drained.
        while let Ok(state) = self.rx.recv() {
            if self.observer.is_done() {
                return Ok(());
            }
            write_frame(&mut stream, &Frame::State { state })?;
        }

        write_frame(&mut stream, &Frame::CloseStream)?;
        stream.set_read_timeout(Some(self.linger))?;
        // The peer may already have closed the socket.
        let _ = stream.shutdown(Shutdown::Write);
        Ok(())
    }
}

fn read_loop(stream: TcpStream, observer: &TerminalOnce) {
    let mut reader = BufReader::new(stream);
    loop {
        match read_frame(&mut reader) {
            Ok(Some(Frame::Control { input })) => observer.deliver(StreamEvent::Command(input)),
            Ok(Some(Frame::Error { reason })) => {
                observer.deliver(StreamEvent::Failed(TransportError::Protocol { reason }));
                return;
            }
            Ok(Some(other)) => {
                observer.deliver(StreamEvent::Failed(unexpected(&other)));
                return;
            }
            Ok(None) => {
                observer.deliver(StreamEvent::Completed);
                return;
            }
            Err(e) => {
                observer.deliver(StreamEvent::Failed(e));
                return;
            }
        }
        if observer.is_done() {
            return;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homing_core::{ConnectionId, ControlInput, MissileId, TickId};
    use std::io::BufRead;
    use std::net::TcpListener;
    use std::time::Instant;

    fn missile() -> Missile {
        Missile {
            id: MissileId(77),
            name: "tcp".into(),
            connection_id: ConnectionId(0),
            budget: 1_000,
        }
    }

    fn recorder() -> (Arc<dyn StreamObserver>, Arc<Mutex<Vec<StreamEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&events);
        let observer: Arc<dyn StreamObserver> = Arc::new(move |e: StreamEvent| {
            sink.lock().unwrap().push(e);
        });
        (observer, events)
    }

    fn wait_for<F: Fn() -> bool>(cond: F) {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            if Instant::now() > deadline {
                panic!("condition not reached within 5s");
            }
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn health_check_round_trip() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(sock.try_clone().unwrap());
            assert_eq!(read_frame(&mut reader).unwrap(), Some(Frame::HealthCheck));
            let mut sock = sock;
            write_frame(&mut sock, &Frame::HealthOk).unwrap();
        });

        let channel = TcpTransport::new(8).connect(&addr.to_string()).unwrap();
        channel.health_check(Duration::from_secs(2)).unwrap();
        server.join().unwrap();
    }

    #[test]
    fn health_check_against_closed_port_fails() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let channel = TcpTransport::new(8).connect(&addr.to_string()).unwrap();
        assert!(channel.health_check(Duration::from_millis(500)).is_err());
    }

    #[test]
    fn register_returns_server_hardware() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(sock.try_clone().unwrap());
            match read_frame(&mut reader).unwrap() {
                Some(Frame::Register { missile }) => assert_eq!(missile.id, MissileId(77)),
                other => panic!("expected Register, got {other:?}"),
            }
            let mut sock = sock;
            let hardware = HardwareConfig {
                warhead: homing_core::Warhead::TntM,
                ..HardwareConfig::default()
            };
            write_frame(&mut sock, &Frame::Registered { hardware }).unwrap();
        });

        let channel = TcpTransport::new(8).connect(&addr.to_string()).unwrap();
        let hw = channel
            .register_missile(&missile(), Duration::from_secs(2))
            .unwrap();
        assert_eq!(hw.warhead, homing_core::Warhead::TntM);
        server.join().unwrap();
    }

    #[test]
    fn stream_exchanges_state_and_commands() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let server = thread::spawn(move || {
            let (sock, _) = listener.accept().unwrap();
            let mut writer = sock.try_clone().unwrap();
            let mut reader = BufReader::new(sock);
            match read_frame(&mut reader).unwrap() {
                Some(Frame::OpenStream { missile }) => assert_eq!(missile.id, MissileId(77)),
                other => panic!("expected OpenStream, got {other:?}"),
            }
            let mut states = 0;
            loop {
                match read_frame(&mut reader).unwrap() {
                    Some(Frame::State { .. }) => {
                        states += 1;
                        write_frame(
                            &mut writer,
                            &Frame::Control {
                                input: ControlInput::turn(states, 1.0, 0.0),
                            },
                        )
                        .unwrap();
                    }
                    Some(Frame::CloseStream) => break,
                    other => panic!("unexpected {other:?}"),
                }
            }
            // Trailing EOF from the client half-close.
            let mut rest = String::new();
            let _ = reader.read_line(&mut rest);
            writer.shutdown(Shutdown::Both).unwrap();
            states
        });

        let (observer, events) = recorder();
        let channel = TcpTransport::new(8).connect(&addr.to_string()).unwrap();
        let out = channel.open_stream(&missile(), observer).unwrap();
        out.send(MissileState::destroyed(MissileId(77), TickId(0)))
            .unwrap();
        out.send(MissileState::destroyed(MissileId(77), TickId(1)))
            .unwrap();
        out.complete();
        assert!(matches!(
            out.send(MissileState::destroyed(MissileId(77), TickId(2))),
            Err(TransportError::StreamClosed)
        ));

        wait_for(|| {
            events
                .lock()
                .unwrap()
                .last()
                .is_some_and(StreamEvent::is_terminal)
        });
        assert_eq!(server.join().unwrap(), 2);

        let events = events.lock().unwrap();
        let commands = events
            .iter()
            .filter(|e| matches!(e, StreamEvent::Command(_)))
            .count();
        assert_eq!(commands, 2);
        assert_eq!(events.last(), Some(&StreamEvent::Completed));
    }

    #[test]
    fn stream_to_dead_endpoint_reports_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let (observer, events) = recorder();
        let channel = TcpTransport::new(8)
            .with_connect_timeout(Duration::from_millis(500))
            .connect(&addr.to_string())
            .unwrap();
        let _out = channel.open_stream(&missile(), observer).unwrap();
        wait_for(|| !events.lock().unwrap().is_empty());
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(matches!(events[0], StreamEvent::Failed(_)));
    }

    #[test]
    fn terminal_once_drops_duplicates() {
        let (observer, events) = recorder();
        let once = TerminalOnce::new(observer);
        once.deliver(StreamEvent::Command(ControlInput::turn(1, 0.0, 0.0)));
        once.deliver(StreamEvent::Completed);
        once.deliver(StreamEvent::Failed(TransportError::StreamClosed));
        once.deliver(StreamEvent::Command(ControlInput::turn(2, 0.0, 0.0)));
        assert_eq!(events.lock().unwrap().len(), 2);
    }

    #[test]
    fn full_queue_reports_backpressure() {
        let (tx, _rx) = crossbeam_channel::bounded(1);
        let out = TcpOutbound {
            tx: Mutex::new(Some(tx)),
        };
        out.send(MissileState::destroyed(MissileId(1), TickId(0)))
            .unwrap();
        assert_eq!(
            out.send(MissileState::destroyed(MissileId(1), TickId(1))),
            Err(TransportError::Backpressure)
        );
    }
}
