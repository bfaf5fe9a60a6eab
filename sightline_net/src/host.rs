// TCP host: accept loop, per-connection reader threads, and the tick loop.
//
// Architecture: thread-per-connection around one lock-guarded `Session`.
//
// - **Accept thread** (`TcpListener::accept()` loop): hands each new
//   connection its own thread.
// - **Connection threads**: run the handshake (send `SessionInfo`, block for
//   the reply), then become that connection's reader loop — feeding raw
//   bytes through a `FrameDecoder` and applying each message to the session
//   under the lock. A `ping` reply closes the socket without a roster entry.
// - **Tick loop** (`run_host_loop` / `host_tick`): on its own fixed-rate
//   schedule, drains queued session events into the simulation, advances it,
//   arbitrates locally observed damage, and fans out the `State` broadcast.
//
// Handshakes are serialized by a dedicated gate mutex so the index promised
// in `SessionInfo` is still free when the reply arrives; the session lock
// itself is only ever held for short, non-blocking operations, so the tick
// cadence never waits on a slow joiner.
//
// Shutdown: `HostHandle::stop` flips `keep_running`, broadcasts the quit
// literal, and closes every socket, which unblocks the reader threads.

use std::collections::VecDeque;
use std::io::Read;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use sightline_protocol::{ClientMessage, FrameDecoder, ServerMessage, random_delimiter};
use sightline_sim::{InputState, Simulation};

use crate::error::SessionSetupError;
use crate::session::{ConnectionId, Session, SessionEvent, send_message};

/// How long a connection may sit in the handshake before it is dropped.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Configuration for hosting a session.
pub struct HostConfig {
    pub port: u16,
    pub host_name: String,
    pub host_team: String,
    pub teams: Vec<String>,
    pub map: String,
    pub max_players: u32,
    pub tick_hz: u32,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            port: 7878,
            host_name: "Host".into(),
            host_team: "Red".into(),
            teams: vec!["Red".into(), "Blue".into()],
            map: "arena".into(),
            max_players: 4,
            tick_hz: 120,
        }
    }
}

/// Handle returned by `start_host` to drive and stop the running host.
pub struct HostHandle {
    session: Arc<Mutex<Session>>,
    keep_running: Arc<AtomicBool>,
    accept_thread: Option<thread::JoinHandle<()>>,
}

impl HostHandle {
    pub fn session(&self) -> Arc<Mutex<Session>> {
        self.session.clone()
    }

    pub fn keep_running(&self) -> Arc<AtomicBool> {
        self.keep_running.clone()
    }

    /// Signal every thread to stop, tell the peers goodbye, and wait for the
    /// accept loop to wind down.
    pub fn stop(mut self) {
        self.keep_running.store(false, Ordering::SeqCst);
        lock(&self.session).shutdown();
        if let Some(handle) = self.accept_thread.take() {
            let _ = handle.join();
        }
    }
}

/// Start hosting: bind the listener on all interfaces, create the session
/// with a fresh framing delimiter, and spawn the accept loop. Returns the
/// handle and the actual bound address (port 0 lets the OS pick).
pub fn start_host(config: &HostConfig) -> Result<(HostHandle, SocketAddr), SessionSetupError> {
    let listener = TcpListener::bind(("0.0.0.0", config.port)).map_err(|source| {
        SessionSetupError::Bind {
            port: config.port,
            source,
        }
    })?;
    let addr = listener
        .local_addr()
        .map_err(|source| SessionSetupError::Bind {
            port: config.port,
            source,
        })?;

    let session = Arc::new(Mutex::new(Session::new(
        &config.host_name,
        &config.host_team,
        config.teams.clone(),
        &config.map,
        random_delimiter(),
    )));
    let keep_running = Arc::new(AtomicBool::new(true));

    // Accept thread polls so it can notice `keep_running` going false.
    listener.set_nonblocking(true).ok();
    let accept_session = session.clone();
    let accept_keep_running = keep_running.clone();
    let max_players = config.max_players;
    let accept_thread = thread::spawn(move || {
        accept_loop(listener, accept_session, accept_keep_running, max_players);
    });

    log::info!("hosting session on {addr}");
    Ok((
        HostHandle {
            session,
            keep_running,
            accept_thread: Some(accept_thread),
        },
        addr,
    ))
}

/// One simulation/broadcast tick on the host. Order matters: queued roster
/// and state events reach the simulation *before* it advances, so a
/// disconnect is never applied after something that indexes past it.
pub fn host_tick(session: &Mutex<Session>, sim: &mut Simulation, input: &InputState, dt: f32) {
    let events = lock(session).drain_events();
    for event in events {
        apply_event(sim, event);
    }

    let out = sim.tick(input, dt);

    let mut session = lock(session);
    for event in out.damage {
        // The host's own hits go through the same arbitration gate as
        // client-reported ones.
        if session.arbitrate(event) {
            sim.apply_damage(&event);
        }
    }
    session.prune_expired(&out.expired);
    session.broadcast_state(out.state);
}

/// Drive `host_tick` at a fixed cadence until `keep_running` goes false.
/// The standalone host binary runs this on its main thread; embedded hosts
/// and tests spawn it.
pub fn run_host_loop(
    session: Arc<Mutex<Session>>,
    keep_running: Arc<AtomicBool>,
    mut sim: Simulation,
    tick_hz: u32,
    input: InputState,
) {
    let cadence = Duration::from_secs_f64(1.0 / f64::from(tick_hz.max(1)));
    while keep_running.load(Ordering::SeqCst) {
        host_tick(&session, &mut sim, &input, 1.0);
        thread::sleep(cadence);
    }
}

fn apply_event(sim: &mut Simulation, event: SessionEvent) {
    match event {
        SessionEvent::Joined(index) => sim.add_participant(index),
        SessionEvent::Removed(index) => sim.remove_participant(index),
        SessionEvent::RemoteState(index, update) => sim.apply_remote_state(index, &update),
        SessionEvent::Damage(event) => {
            sim.apply_damage(&event);
        }
    }
}

fn accept_loop(
    listener: TcpListener,
    session: Arc<Mutex<Session>>,
    keep_running: Arc<AtomicBool>,
    max_players: u32,
) {
    // Handshakes are serialized: the promised index must stay the next free
    // one until the reply arrives or the connection is dropped.
    let handshake_gate = Arc::new(Mutex::new(()));
    while keep_running.load(Ordering::SeqCst) {
        match listener.accept() {
            Ok((stream, peer_addr)) => {
                stream.set_nonblocking(false).ok();
                log::debug!("connection from {peer_addr}");
                let session = session.clone();
                let keep_running = keep_running.clone();
                let gate = handshake_gate.clone();
                thread::spawn(move || {
                    handle_connection(stream, session, gate, keep_running, max_players);
                });
            }
            Err(ref e) if e.kind() == std::io::ErrorKind::WouldBlock => {
                thread::sleep(Duration::from_millis(50));
            }
            Err(_) => break,
        }
    }
}

/// Handshake, then steady-state receive loop, for one accepted connection.
/// Every early return while `Connecting` closes the socket with no roster
/// entry and no announcement.
fn handle_connection(
    mut stream: TcpStream,
    session: Arc<Mutex<Session>>,
    gate: Arc<Mutex<()>>,
    keep_running: Arc<AtomicBool>,
    max_players: u32,
) {
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT)).ok();
    let joining = lock(&gate);

    let (promised, info) = {
        let session = lock(&session);
        if session.roster().len() >= max_players as usize {
            log::info!("turning away a connection: session is full");
            return;
        }
        let promised = session.next_index();
        (promised, session.session_info(promised))
    };
    let delimiter = info.delimiter.clone();

    if send_message(&mut stream, &ServerMessage::Session(info), &delimiter).is_err() {
        return;
    }

    // Block for the handshake reply.
    let mut decoder = FrameDecoder::new(&delimiter);
    let mut pending = VecDeque::new();
    let mut buf = [0u8; 4096];
    while pending.is_empty() {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => return,
            Ok(n) => pending.extend(decoder.feed_parse(&buf[..n], ClientMessage::from_wire)),
        }
    }

    let conn = match pending.pop_front() {
        // Liveness probe: a prospective joiner checking the session exists.
        // Close without adding a participant.
        Some(ClientMessage::Ping) => return,
        Some(ClientMessage::Hello { name, team }) => {
            let write_stream = match stream.try_clone() {
                Ok(s) => s,
                Err(_) => return,
            };
            match lock(&session).admit(promised, &name, &team, write_stream) {
                Ok(conn) => conn,
                Err(reason) => {
                    log::warn!("join aborted: {reason}");
                    return;
                }
            }
        }
        Some(other) => {
            log::warn!("expected a handshake reply, got {other:?}; dropping connection");
            return;
        }
        None => return,
    };
    drop(joining);

    stream.set_read_timeout(None).ok();
    reader_loop(stream, decoder, pending, conn, &session, &keep_running);
}

/// Steady-state receive loop for one `Active` connection. Exits on the quit
/// literal, any transport failure, or host shutdown — all of which tear the
/// participant down the same way.
fn reader_loop(
    mut stream: TcpStream,
    mut decoder: FrameDecoder,
    mut pending: VecDeque<ClientMessage>,
    conn: ConnectionId,
    session: &Mutex<Session>,
    keep_running: &AtomicBool,
) {
    let mut buf = [0u8; 4096];
    loop {
        while let Some(msg) = pending.pop_front() {
            if !dispatch(session, conn, msg) {
                lock(session).disconnect(conn);
                return;
            }
        }
        if !keep_running.load(Ordering::SeqCst) {
            return;
        }
        match stream.read(&mut buf) {
            // Zero-length read: the peer vanished without the quit literal.
            Ok(0) => {
                lock(session).disconnect(conn);
                return;
            }
            Ok(n) => pending.extend(decoder.feed_parse(&buf[..n], ClientMessage::from_wire)),
            Err(e) => {
                log::debug!("read from {conn:?} failed: {e}");
                lock(session).disconnect(conn);
                return;
            }
        }
    }
}

/// Apply one client message to the session. Returns false when the
/// connection should be torn down (graceful quit).
fn dispatch(session: &Mutex<Session>, conn: ConnectionId, msg: ClientMessage) -> bool {
    match msg {
        ClientMessage::Update { state } => lock(session).handle_update(conn, state),
        ClientMessage::Damage(event) => lock(session).report_damage(event),
        ClientMessage::IndexChanged { index } => lock(session).confirm_index(conn, index),
        ClientMessage::Quit => return false,
        ClientMessage::Hello { .. } | ClientMessage::Ping => {
            log::warn!("unexpected handshake message mid-session from {conn:?}; ignored");
        }
    }
    true
}

/// Lock a mutex, recovering the data if a panicking thread poisoned it —
/// the host must keep serving the surviving connections.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
