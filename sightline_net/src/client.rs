// TCP client for joining a hosted session.
//
// Provides a non-blocking interface for the game loop:
// - `NetClient::probe()` checks a session is joinable without joining: it
//   reads the `SessionInfo` bootstrap, answers with the `ping` literal, and
//   returns the bootstrap so the menu can validate the chosen name and team
//   *before* committing (`validate_join`).
// - `NetClient::connect()` performs the real handshake on the calling
//   thread — read exactly one `SessionInfo`, reply `Hello` — then spawns a
//   background reader thread. That one bounded read is the only blocking
//   network operation the main thread ever performs.
// - The reader thread feeds raw bytes through a `FrameDecoder` and pushes
//   decoded messages into an `mpsc` channel; `poll()` drains it without
//   blocking.
// - `client_tick` is the per-tick driver: apply everything buffered (in
//   arrival order, so disconnect removals land before anything that indexes
//   the roster), advance the simulation, report observed hits, send the
//   local delta.
//
// Bootstrap framing: the `SessionInfo` frame carries the very delimiter that
// terminates it, so the handshake read parses the first JSON value straight
// off the stream and only then strips the delimiter it just learned.

use std::io::{self, Read, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use sightline_protocol::{
    ClientMessage, FrameDecoder, PlayerIndex, ServerMessage, SessionInfo, encode_frame,
};
use sightline_sim::{GameConfig, InputState, MapGrid, Simulation};

use crate::error::{JoinValidationError, SessionSetupError};
use crate::roster::Roster;

/// How long a joiner waits for the bootstrap before giving up.
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Hard cap on bootstrap size; a handshake larger than this is garbage.
const MAX_BOOTSTRAP: usize = 64 * 1024;

/// Check a join against the announced session *before* connecting for real.
/// The error text is meant for the join screen as-is.
pub fn validate_join(
    info: &SessionInfo,
    name: &str,
    team: &str,
) -> Result<(), JoinValidationError> {
    if info.player_names().any(|taken| taken == name) {
        return Err(JoinValidationError::NameTaken {
            name: name.to_owned(),
        });
    }
    if !info.teams.iter().any(|t| t == team) {
        return Err(JoinValidationError::UnknownTeam {
            team: team.to_owned(),
            teams: info.teams.join(", "),
        });
    }
    Ok(())
}

/// Build the client-side simulation from the handshake bootstrap: resolve
/// the map identifier and create a mirror slot for every known participant.
pub fn build_simulation(
    info: &SessionInfo,
    config: GameConfig,
    team: &str,
) -> Result<Simulation, SessionSetupError> {
    let map = MapGrid::builtin(&info.map)
        .ok_or_else(|| SessionSetupError::UnknownMap(info.map.clone()))?;
    let mut sim = Simulation::new(config, map, team, info.assigned_index);
    for entry in &info.roster {
        sim.add_participant(entry.index);
    }
    Ok(sim)
}

/// A joined client connection.
pub struct NetClient {
    stream: TcpStream,
    delimiter: String,
    info: SessionInfo,
    roster: Roster,
    inbox: Receiver<ServerMessage>,
    closed: Arc<AtomicBool>,
    _reader: Option<JoinHandle<()>>,
}

impl NetClient {
    /// Liveness probe: read the bootstrap, identify as a probe so the host
    /// closes the socket without a roster entry, and hand the bootstrap to
    /// the caller for join validation.
    pub fn probe(addr: &str) -> Result<SessionInfo, SessionSetupError> {
        let mut stream = open(addr)?;
        let (info, _leftover) = read_bootstrap(&mut stream)?;
        let wire = ClientMessage::Ping
            .to_wire()
            .map_err(|e| SessionSetupError::Bootstrap(e.to_string()))?;
        stream.write_all(&encode_frame(&wire, &info.delimiter))?;
        Ok(info)
    }

    /// Join a session: bootstrap, `Hello` reply, reader thread.
    pub fn connect(addr: &str, name: &str, team: &str) -> Result<Self, SessionSetupError> {
        let mut stream = open(addr)?;
        let (info, leftover) = read_bootstrap(&mut stream)?;
        let delimiter = info.delimiter.clone();

        // Anything the host sent right behind the bootstrap belongs to the
        // steady-state stream.
        let mut decoder = FrameDecoder::new(&delimiter);
        let early: Vec<ServerMessage> = decoder.feed_parse(&leftover, ServerMessage::from_wire);

        let hello = ClientMessage::Hello {
            name: name.to_owned(),
            team: team.to_owned(),
        };
        let wire = hello
            .to_wire()
            .map_err(|e| SessionSetupError::Bootstrap(e.to_string()))?;
        stream.write_all(&encode_frame(&wire, &delimiter))?;

        stream.set_read_timeout(None).ok();
        let read_stream = stream.try_clone()?;

        let (tx, rx) = mpsc::channel();
        for msg in early {
            let _ = tx.send(msg);
        }
        let closed = Arc::new(AtomicBool::new(false));
        let reader_closed = closed.clone();
        let reader = thread::spawn(move || {
            reader_loop(read_stream, decoder, tx, reader_closed);
        });

        let roster = Roster::from_entries(info.roster.clone());
        log::info!(
            "joined '{}' on map '{}' as index {}",
            info.host_name,
            info.map,
            info.assigned_index.0
        );
        Ok(Self {
            stream,
            delimiter,
            info,
            roster,
            inbox: rx,
            closed,
            _reader: Some(reader),
        })
    }

    /// The handshake bootstrap this client joined with.
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    /// The client's mirror of the roster.
    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    /// Drain all buffered host messages (non-blocking).
    pub fn poll(&self) -> Vec<ServerMessage> {
        let mut messages = Vec::new();
        while let Ok(msg) = self.inbox.try_recv() {
            messages.push(msg);
        }
        messages
    }

    /// True once the connection is gone — the host quit, kicked us, or the
    /// transport failed.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    pub fn send_update(&mut self, state: sightline_protocol::PlayerUpdate) -> io::Result<()> {
        self.send(&ClientMessage::Update { state })
    }

    pub fn send_damage(&mut self, event: sightline_protocol::DamageEvent) -> io::Result<()> {
        self.send(&ClientMessage::Damage(event))
    }

    pub fn send_index_changed(&mut self, index: PlayerIndex) -> io::Result<()> {
        self.send(&ClientMessage::IndexChanged { index })
    }

    /// Graceful disconnect: the quit literal, then close.
    pub fn send_quit(&mut self) {
        let _ = self.send(&ClientMessage::Quit);
        self.closed.store(true, Ordering::SeqCst);
    }

    fn send(&mut self, msg: &ClientMessage) -> io::Result<()> {
        let wire = msg
            .to_wire()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
        self.stream.write_all(&encode_frame(&wire, &self.delimiter))
    }

    /// Apply one inbound message to the simulation and the roster mirror.
    fn apply_message(&mut self, sim: &mut Simulation, msg: ServerMessage) -> io::Result<()> {
        match msg {
            ServerMessage::State { players } => {
                for snapshot in players {
                    if snapshot.index == sim.local_index() {
                        continue;
                    }
                    if !self.roster.contains(snapshot.index) {
                        log::warn!(
                            "state for unknown index {} skipped",
                            snapshot.index.0
                        );
                        continue;
                    }
                    sim.apply_remote_state(snapshot.index, &snapshot.state);
                }
            }
            ServerMessage::Joined { entry } => {
                sim.add_participant(entry.index);
                self.roster.insert(entry);
            }
            ServerMessage::Damage(event) => {
                sim.apply_damage(&event);
            }
            ServerMessage::Disconnect { index } => {
                if index == sim.local_index() {
                    log::info!("removed from the session by the host");
                    self.closed.store(true, Ordering::SeqCst);
                    return Ok(());
                }
                let own_before = sim.local_index();
                sim.remove_participant(index);
                self.roster.remove(index);
                if index < own_before {
                    // Our index shifted down; tell the host its bookkeeping
                    // for this connection is still right.
                    self.send_index_changed(sim.local_index())?;
                }
            }
            ServerMessage::Quit => {
                self.closed.store(true, Ordering::SeqCst);
            }
            ServerMessage::Session(_) => {
                log::warn!("unexpected bootstrap mid-session; ignored");
            }
        }
        Ok(())
    }
}

/// One client tick: apply buffered inbound messages in arrival order, then
/// advance the simulation and send the local delta (and any observed hits)
/// to the host.
pub fn client_tick(
    client: &mut NetClient,
    sim: &mut Simulation,
    input: &InputState,
    dt: f32,
) -> io::Result<()> {
    for msg in client.poll() {
        client.apply_message(sim, msg)?;
    }
    if client.is_closed() {
        return Ok(());
    }

    let out = sim.tick(input, dt);
    for event in out.damage {
        client.send_damage(event)?;
    }
    client.send_update(out.state)?;
    Ok(())
}

fn open(addr: &str) -> Result<TcpStream, SessionSetupError> {
    let stream = TcpStream::connect(addr).map_err(|source| SessionSetupError::Connect {
        addr: addr.to_owned(),
        source,
    })?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT)).ok();
    Ok(stream)
}

/// Read exactly one `SessionInfo` off the stream. The bootstrap frame is
/// parsed as the first JSON value in the byte stream (its terminating
/// delimiter is only known *from* it); whatever follows the delimiter is
/// returned for the steady-state decoder.
fn read_bootstrap(stream: &mut TcpStream) -> Result<(SessionInfo, Vec<u8>), SessionSetupError> {
    let mut buf: Vec<u8> = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        if let Some(result) = try_parse_bootstrap(&buf)? {
            let (info, consumed) = result;
            // Wait until the full trailing delimiter has arrived, then
            // strip it.
            let delim = info.delimiter.as_bytes();
            if buf.len() >= consumed + delim.len() {
                if &buf[consumed..consumed + delim.len()] != delim {
                    return Err(SessionSetupError::Bootstrap(
                        "bootstrap frame not terminated by its own delimiter".into(),
                    ));
                }
                let leftover = buf.split_off(consumed + delim.len());
                return Ok((info, leftover));
            }
        }
        if buf.len() > MAX_BOOTSTRAP {
            return Err(SessionSetupError::Bootstrap("bootstrap too large".into()));
        }
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Err(SessionSetupError::Bootstrap(
                "connection closed during handshake".into(),
            ));
        }
        buf.extend_from_slice(&chunk[..n]);
    }
}

/// Try to parse the first JSON value in `buf` as the bootstrap. Returns
/// `Ok(None)` while the value is still incomplete.
fn try_parse_bootstrap(buf: &[u8]) -> Result<Option<(SessionInfo, usize)>, SessionSetupError> {
    if buf.is_empty() {
        return Ok(None);
    }
    let mut iter = serde_json::Deserializer::from_slice(buf).into_iter::<ServerMessage>();
    match iter.next() {
        Some(Ok(ServerMessage::Session(info))) => Ok(Some((info, iter.byte_offset()))),
        Some(Ok(other)) => Err(SessionSetupError::Bootstrap(format!(
            "expected the session bootstrap, got {other:?}"
        ))),
        Some(Err(e)) if e.is_eof() => Ok(None),
        Some(Err(e)) => Err(SessionSetupError::Bootstrap(e.to_string())),
        None => Ok(None),
    }
}

/// Reader thread: decode frames into the inbox until the stream dies or the
/// host says quit.
fn reader_loop(
    mut stream: TcpStream,
    mut decoder: FrameDecoder,
    tx: Sender<ServerMessage>,
    closed: Arc<AtomicBool>,
) {
    let mut buf = [0u8; 4096];
    'read: loop {
        match stream.read(&mut buf) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                for msg in decoder.feed_parse(&buf[..n], ServerMessage::from_wire) {
                    let quit = matches!(msg, ServerMessage::Quit);
                    if tx.send(msg).is_err() || quit {
                        break 'read;
                    }
                }
            }
        }
    }
    closed.store(true, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use std::net::TcpListener;

    use sightline_protocol::RosterEntry;

    use super::*;

    fn info_fixture() -> SessionInfo {
        SessionInfo {
            host_name: "Ada".into(),
            teams: vec!["Red".into(), "Blue".into()],
            map: "arena".into(),
            delimiter: "Z7q$kX#p9!".into(),
            assigned_index: PlayerIndex(1),
            roster: vec![RosterEntry {
                index: PlayerIndex(0),
                name: "Ada".into(),
                team: "Red".into(),
            }],
        }
    }

    #[test]
    fn join_validation_catches_taken_names_and_bad_teams() {
        let info = info_fixture();
        assert!(validate_join(&info, "Brin", "Blue").is_ok());

        let err = validate_join(&info, "Ada", "Blue").unwrap_err();
        assert_eq!(
            err.to_string(),
            "the name 'Ada' is already taken in this session"
        );

        let err = validate_join(&info, "Brin", "Green").unwrap_err();
        assert!(err.to_string().contains("not one of this session's teams"));
        assert!(err.to_string().contains("Red, Blue"));
    }

    #[test]
    fn build_simulation_rejects_unknown_maps() {
        let mut info = info_fixture();
        info.map = "volcano".into();
        let err = build_simulation(&info, GameConfig::default(), "Blue").unwrap_err();
        assert!(matches!(err, SessionSetupError::UnknownMap(name) if name == "volcano"));
    }

    #[test]
    fn build_simulation_mirrors_the_roster() {
        let info = info_fixture();
        let sim = build_simulation(&info, GameConfig::default(), "Blue").unwrap();
        assert_eq!(sim.local_index(), PlayerIndex(1));
        assert!(sim.remote(PlayerIndex(0)).is_some());
    }

    /// The bootstrap parser must cope with arbitrary chunking, including the
    /// delimiter itself arriving late, and must hand trailing bytes over.
    #[test]
    fn bootstrap_reads_one_message_and_returns_the_rest() {
        let info = info_fixture();
        let bootstrap = ServerMessage::Session(info.clone()).to_wire().unwrap();
        let mut wire = encode_frame(&bootstrap, &info.delimiter);
        // A State frame right on the bootstrap's heels.
        let followup = ServerMessage::State { players: vec![] }.to_wire().unwrap();
        wire.extend_from_slice(&encode_frame(&followup, &info.delimiter));

        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let writer = thread::spawn(move || {
            let (mut server, _) = listener.accept().unwrap();
            // Dribble the wire out in awkward chunks.
            for chunk in wire.chunks(7) {
                server.write_all(chunk).unwrap();
                thread::sleep(Duration::from_millis(1));
            }
            server
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let (recovered, leftover) = read_bootstrap(&mut stream).unwrap();
        assert_eq!(recovered, info);

        // The follow-up frame (or its prefix) is in `leftover`; together
        // with the rest of the stream it decodes cleanly.
        let mut decoder = FrameDecoder::new(&info.delimiter);
        let mut msgs = decoder.feed_parse(&leftover, ServerMessage::from_wire);
        let mut buf = [0u8; 4096];
        while msgs.is_empty() {
            let n = stream.read(&mut buf).unwrap();
            msgs = decoder.feed_parse(&buf[..n], ServerMessage::from_wire);
        }
        assert_eq!(msgs, vec![ServerMessage::State { players: vec![] }]);
        drop(writer.join().unwrap());
    }

    #[test]
    fn bootstrap_rejects_a_non_session_first_message() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let writer = thread::spawn(move || {
            let (mut server, _) = listener.accept().unwrap();
            let msg = ServerMessage::State { players: vec![] }.to_wire().unwrap();
            server.write_all(&encode_frame(&msg, "##########")).unwrap();
            server
        });

        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let err = read_bootstrap(&mut stream).unwrap_err();
        assert!(matches!(err, SessionSetupError::Bootstrap(_)));
        drop(writer.join().unwrap());
    }
}
