// Canonical session state owned by the host.
//
// `Session` is the lock-guarded object every host-side thread works through:
// the accept/handshake path admits participants, each connection's reader
// thread applies incoming messages, and the tick loop assembles and fans out
// the per-tick `State` broadcast. All of it happens under one `Mutex` held
// briefly per operation — there is no process-wide ambient state.
//
// Responsibilities:
// - Index assignment and disconnect renumbering (via `Roster`). The host is
//   the single writer of both; clients only mirror them.
// - Per-peer state: the write half of the socket, the peer's last reported
//   delta, projectiles spawned since the last broadcast, and the live
//   projectile-id list that damage arbitration consumes.
// - Damage arbitration: removal of the referenced projectile is the commit
//   gate; a committed event is rebroadcast verbatim to every connection.
// - Write-failure isolation: a failed write to one peer marks that peer
//   disconnected and never blocks delivery to the others.
//
// The host's own simulation is *not* in here — the tick loop owns it. The
// session queues `SessionEvent`s (join, removal, remote state, committed
// damage) that the tick loop drains, in order, into the simulation before
// each tick, which is the same ordering discipline clients apply to their
// inbound message stream.

use std::io::{self, Write};
use std::net::{Shutdown, TcpStream};

use sightline_protocol::{
    DamageEvent, PlayerIndex, PlayerSnapshot, PlayerUpdate, ProjectileId, ProjectileSpawn,
    RosterEntry, ServerMessage, SessionInfo, encode_frame,
};

use crate::roster::Roster;

/// Stable identity of one accepted connection. Unlike a `PlayerIndex` it
/// never shifts, so reader threads address their peer by it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ConnectionId(u64);

/// Per-connection lifecycle. `Closed` is terminal: the peer is gone from the
/// session and no further messages are accepted for its slot.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionState {
    Connecting,
    Active,
    Disconnecting,
    Closed,
}

/// What the session tells the tick loop to apply to the simulation, in
/// arrival order.
#[derive(Clone, Debug)]
pub enum SessionEvent {
    Joined(PlayerIndex),
    Removed(PlayerIndex),
    RemoteState(PlayerIndex, PlayerUpdate),
    Damage(DamageEvent),
}

/// One admitted remote participant.
struct Peer {
    conn: ConnectionId,
    index: PlayerIndex,
    stream: TcpStream,
    state: ConnectionState,
    /// Last reported delta, minus projectile spawns (those are queued
    /// separately so each is relayed exactly once). `None` until the first
    /// report arrives.
    latest: Option<PlayerUpdate>,
    /// Spawns to relay in the next `State` broadcast.
    pending: Vec<ProjectileSpawn>,
    /// Live projectile ids for damage arbitration.
    live: Vec<ProjectileId>,
}

pub struct Session {
    host_name: String,
    teams: Vec<String>,
    map: String,
    delimiter: String,
    roster: Roster,
    peers: Vec<Peer>,
    next_conn: u64,
    /// Live projectile ids for the host's own player (index 0).
    local_live: Vec<ProjectileId>,
    events: Vec<SessionEvent>,
}

impl Session {
    pub fn new(
        host_name: &str,
        host_team: &str,
        teams: Vec<String>,
        map: &str,
        delimiter: String,
    ) -> Self {
        let mut roster = Roster::new();
        roster.push(host_name, host_team);
        Self {
            host_name: host_name.to_owned(),
            teams,
            map: map.to_owned(),
            delimiter,
            roster,
            peers: Vec::new(),
            next_conn: 0,
            local_live: Vec::new(),
            events: Vec::new(),
        }
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn delimiter(&self) -> &str {
        &self.delimiter
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    /// The index the next successful join will receive.
    pub fn next_index(&self) -> PlayerIndex {
        PlayerIndex(self.roster.len() as u32)
    }

    /// The handshake bootstrap for a connection about to be offered
    /// `assigned`.
    pub fn session_info(&self, assigned: PlayerIndex) -> SessionInfo {
        SessionInfo {
            host_name: self.host_name.clone(),
            teams: self.teams.clone(),
            map: self.map.clone(),
            delimiter: self.delimiter.clone(),
            assigned_index: assigned,
            roster: self.roster.entries().to_vec(),
        }
    }

    /// Complete a handshake: add the participant under the index that was
    /// promised in its `SessionInfo`, announce it to the existing peers, and
    /// hand back the connection id its reader thread will use.
    ///
    /// Fails if the roster moved between the promise and the reply (a
    /// disconnect renumbered it) — the caller closes the socket and the
    /// joiner retries with fresh bootstrap data.
    pub fn admit(
        &mut self,
        promised: PlayerIndex,
        name: &str,
        team: &str,
        stream: TcpStream,
    ) -> Result<ConnectionId, String> {
        if promised != self.next_index() {
            return Err(format!(
                "roster changed during handshake (promised index {}, next is {})",
                promised.0,
                self.next_index().0
            ));
        }
        let index = self.roster.push(name, team);
        let conn = ConnectionId(self.next_conn);
        self.next_conn += 1;

        // Still `Connecting` while the join is announced: broadcasts skip
        // non-active peers, so the joiner never sees its own announcement.
        self.peers.push(Peer {
            conn,
            index,
            stream,
            state: ConnectionState::Connecting,
            latest: None,
            pending: Vec::new(),
            live: Vec::new(),
        });
        let entry = RosterEntry {
            index,
            name: name.to_owned(),
            team: team.to_owned(),
        };
        let failed = self.broadcast(&ServerMessage::Joined { entry });
        self.drop_failed(failed);

        if let Some(peer) = self.peers.iter_mut().find(|p| p.conn == conn) {
            peer.state = ConnectionState::Active;
        }
        self.events.push(SessionEvent::Joined(index));
        log::info!("participant '{name}' joined as index {}", index.0);
        Ok(conn)
    }

    /// Store a peer's per-tick delta and queue its projectile spawns for the
    /// next broadcast. Ignored unless the connection is still `Active`.
    pub fn handle_update(&mut self, conn: ConnectionId, mut update: PlayerUpdate) {
        let Some(peer) = self.peers.iter_mut().find(|p| p.conn == conn) else {
            log::debug!("update from closed connection {conn:?} dropped");
            return;
        };
        if peer.state != ConnectionState::Active {
            return;
        }
        let spawns = std::mem::take(&mut update.projectiles);
        peer.live.extend(spawns.iter().map(|s| s.id));
        peer.pending.extend(spawns.iter().cloned());
        peer.latest = Some(update.clone());

        // Forward to the host simulation with the spawns re-attached.
        update.projectiles = spawns;
        self.events
            .push(SessionEvent::RemoteState(peer.index, update));
    }

    /// A client's confirmation of its own index after a renumbering. The
    /// host already rebound the connection itself, so this only verifies;
    /// a mismatch is a protocol violation worth logging, not acting on.
    pub fn confirm_index(&mut self, conn: ConnectionId, claimed: PlayerIndex) {
        match self.peers.iter().find(|p| p.conn == conn) {
            Some(peer) if peer.index == claimed => {}
            Some(peer) => log::warn!(
                "connection {conn:?} claims index {} but is bound to {}",
                claimed.0,
                peer.index.0
            ),
            None => log::debug!("index confirmation from closed connection {conn:?}"),
        }
    }

    /// Arbitrate a victim-reported damage event. Commits iff the referenced
    /// projectile is still in the shooter's live list; a committed event is
    /// applied to the victim's mirrored health and rebroadcast verbatim to
    /// every connection. Returns whether it committed.
    pub fn arbitrate(&mut self, event: DamageEvent) -> bool {
        if !self.roster.contains(event.shooter) || !self.roster.contains(event.victim) {
            log::warn!(
                "damage event references a stale index (shooter {}, victim {})",
                event.shooter.0,
                event.victim.0
            );
            return false;
        }
        let removed = if event.shooter == PlayerIndex(0) {
            remove_id(&mut self.local_live, event.projectile)
        } else {
            match self.peer_by_index(event.shooter) {
                Some(peer) => remove_id(&mut peer.live, event.projectile),
                None => false,
            }
        };
        if !removed {
            // Duplicate delivery or already-expired projectile: idempotent no-op.
            return false;
        }

        if event.victim != PlayerIndex(0)
            && let Some(peer) = self.peer_by_index(event.victim)
            && let Some(latest) = peer.latest.as_mut()
        {
            latest.health -= event.amount;
        }

        let failed = self.broadcast(&ServerMessage::Damage(event));
        self.drop_failed(failed);
        true
    }

    /// Reader-thread entry point for client-reported damage: arbitrate, and
    /// on commit queue the event for the host simulation.
    pub fn report_damage(&mut self, event: DamageEvent) {
        if self.arbitrate(event) {
            self.events.push(SessionEvent::Damage(event));
        }
    }

    /// Drop projectiles that expired in the host simulation from the live
    /// lists, so the lists do not grow for the lifetime of the session.
    pub fn prune_expired(&mut self, expired: &[(PlayerIndex, ProjectileId)]) {
        for &(owner, id) in expired {
            if owner == PlayerIndex(0) {
                remove_id(&mut self.local_live, id);
            } else if let Some(peer) = self.peer_by_index(owner) {
                remove_id(&mut peer.live, id);
            }
        }
    }

    /// Assemble and fan out this tick's `State` broadcast: the host's own
    /// delta first, then every peer's last report with its queued spawns,
    /// ordered by index. A write failure disconnects that peer and never
    /// blocks the rest.
    pub fn broadcast_state(&mut self, local: PlayerUpdate) {
        self.local_live.extend(local.projectiles.iter().map(|s| s.id));

        let mut players = vec![PlayerSnapshot {
            index: PlayerIndex(0),
            state: local,
        }];
        for peer in &mut self.peers {
            if let Some(latest) = &peer.latest {
                let mut state = latest.clone();
                state.projectiles = std::mem::take(&mut peer.pending);
                players.push(PlayerSnapshot {
                    index: peer.index,
                    state,
                });
            }
        }
        players.sort_by_key(|snapshot| snapshot.index);

        let failed = self.broadcast(&ServerMessage::State { players });
        self.drop_failed(failed);
    }

    /// Tear a connection down: `Disconnecting` → remove from roster, close
    /// the socket, renumber, notify survivors, queue the removal for the
    /// simulation → `Closed` (the slot is gone; nothing more is accepted
    /// for it). Safe to call twice — the second call finds nothing.
    pub fn disconnect(&mut self, conn: ConnectionId) {
        let Some(pos) = self.peers.iter().position(|p| p.conn == conn) else {
            return;
        };
        self.peers[pos].state = ConnectionState::Disconnecting;
        let mut peer = self.peers.remove(pos);
        let index = peer.index;

        let _ = peer.stream.shutdown(Shutdown::Both);
        peer.state = ConnectionState::Closed;

        let removed = self.roster.remove(index);
        for other in &mut self.peers {
            if other.index > index {
                other.index.0 -= 1;
            }
        }
        self.events.push(SessionEvent::Removed(index));
        if let Some(entry) = removed {
            log::info!("participant '{}' (index {}) left", entry.name, index.0);
        }

        let failed = self.broadcast(&ServerMessage::Disconnect { index });
        self.drop_failed(failed);
    }

    /// Graceful teardown: tell every peer the session is over and close all
    /// sockets.
    pub fn shutdown(&mut self) {
        let _ = self.broadcast(&ServerMessage::Quit);
        for peer in &mut self.peers {
            let _ = peer.stream.shutdown(Shutdown::Both);
            peer.state = ConnectionState::Closed;
        }
        self.peers.clear();
    }

    /// Take the queued simulation work, in arrival order.
    pub fn drain_events(&mut self) -> Vec<SessionEvent> {
        std::mem::take(&mut self.events)
    }

    fn peer_by_index(&mut self, index: PlayerIndex) -> Option<&mut Peer> {
        self.peers.iter_mut().find(|p| p.index == index)
    }

    /// Write a message to every active peer. Returns the connections whose
    /// write failed so the caller can disconnect them.
    fn broadcast(&mut self, msg: &ServerMessage) -> Vec<ConnectionId> {
        let wire = match msg.to_wire() {
            Ok(wire) => wire,
            Err(e) => {
                log::warn!("unserializable broadcast dropped: {e}");
                return Vec::new();
            }
        };
        let frame = encode_frame(&wire, &self.delimiter);
        let mut failed = Vec::new();
        for peer in &mut self.peers {
            if peer.state != ConnectionState::Active {
                continue;
            }
            if let Err(e) = peer.stream.write_all(&frame) {
                log::warn!("write to index {} failed: {e}", peer.index.0);
                peer.state = ConnectionState::Disconnecting;
                failed.push(peer.conn);
            }
        }
        failed
    }

    fn drop_failed(&mut self, failed: Vec<ConnectionId>) {
        for conn in failed {
            self.disconnect(conn);
        }
    }
}

/// Send one message over a peer connection (handshake path, where no `Peer`
/// exists yet).
pub fn send_message(
    stream: &mut TcpStream,
    msg: &ServerMessage,
    delimiter: &str,
) -> io::Result<()> {
    let wire = msg
        .to_wire()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    stream.write_all(&encode_frame(&wire, delimiter))
}

fn remove_id(ids: &mut Vec<ProjectileId>, id: ProjectileId) -> bool {
    match ids.iter().position(|&candidate| candidate == id) {
        Some(pos) => {
            ids.swap_remove(pos);
            true
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::net::TcpListener;
    use std::time::Duration;

    use sightline_protocol::{FrameDecoder, ProjectileSpawn, Weapon};

    use super::*;

    const DELIM: &str = "#TeStDeLiM";

    /// Create a TCP pair: (client_stream, server_stream) on localhost.
    fn tcp_pair() -> (TcpStream, TcpStream) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let client = TcpStream::connect(addr).unwrap();
        let (server, _) = listener.accept().unwrap();
        client
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        (client, server)
    }

    /// Queued reader over a raw client socket: one TCP read may carry many
    /// frames, so decoded messages are buffered and handed out one at a time.
    struct TestReader {
        stream: TcpStream,
        decoder: FrameDecoder,
        queue: VecDeque<ServerMessage>,
    }

    impl TestReader {
        fn new(stream: TcpStream) -> Self {
            Self {
                stream,
                decoder: FrameDecoder::new(DELIM),
                queue: VecDeque::new(),
            }
        }

        fn next(&mut self) -> ServerMessage {
            use std::io::Read;
            loop {
                if let Some(msg) = self.queue.pop_front() {
                    return msg;
                }
                let mut buf = [0u8; 4096];
                let n = self.stream.read(&mut buf).unwrap();
                assert!(n > 0, "socket closed while expecting a message");
                self.queue
                    .extend(self.decoder.feed_parse(&buf[..n], ServerMessage::from_wire));
            }
        }

        /// Skip messages until one satisfies `pred`.
        fn next_matching(&mut self, pred: impl Fn(&ServerMessage) -> bool) -> ServerMessage {
            loop {
                let msg = self.next();
                if pred(&msg) {
                    return msg;
                }
            }
        }
    }

    fn session() -> Session {
        Session::new(
            "A",
            "Red",
            vec!["Red".into(), "Blue".into()],
            "arena",
            DELIM.into(),
        )
    }

    fn update(health: f32, spawns: Vec<ProjectileSpawn>) -> PlayerUpdate {
        PlayerUpdate {
            center: (128.0, 96.0),
            rotation: 0.0,
            weapon: Weapon::Pistol,
            frame: 0,
            health,
            team: "Blue".into(),
            projectiles: spawns,
        }
    }

    fn spawn(id: u64) -> ProjectileSpawn {
        ProjectileSpawn {
            id: ProjectileId(id),
            direction: (1.0, 0.0),
            origin: (158.0, 96.0),
            speed: 30.0,
            damage: 1.0,
        }
    }

    #[test]
    fn handshake_scenario_roster_grows_and_index_is_promised() {
        let (_client, server) = tcp_pair();
        let mut session = session();

        let promised = session.next_index();
        assert_eq!(promised, PlayerIndex(1));
        let info = session.session_info(promised);
        assert_eq!(info.assigned_index, PlayerIndex(1));
        assert_eq!(info.roster.len(), 1);
        assert_eq!(info.roster[0].name, "A");

        session.admit(promised, "B", "Red", server).unwrap();
        let names: Vec<&str> = session
            .roster()
            .entries()
            .iter()
            .map(|e| e.name.as_str())
            .collect();
        assert_eq!(names, vec!["A", "B"]);
        assert_eq!(session.roster().get(PlayerIndex(1)).unwrap().team, "Red");
    }

    #[test]
    fn stale_promise_is_rejected() {
        let (_c1, s1) = tcp_pair();
        let (_c2, s2) = tcp_pair();
        let mut session = session();
        let promised = session.next_index();
        session.admit(promised, "B", "Red", s1).unwrap();
        // Same promise again: the roster has moved on.
        assert!(session.admit(promised, "C", "Blue", s2).is_err());
        assert_eq!(session.roster().len(), 2);
    }

    #[test]
    fn admit_announces_join_to_existing_peers() {
        let (c1, s1) = tcp_pair();
        let (_c2, s2) = tcp_pair();
        let mut session = session();
        session.admit(session.next_index(), "B", "Red", s1).unwrap();
        session
            .admit(session.next_index(), "C", "Blue", s2)
            .unwrap();

        let mut reader = TestReader::new(c1);
        match reader.next() {
            ServerMessage::Joined { entry } => {
                assert_eq!(entry.index, PlayerIndex(2));
                assert_eq!(entry.name, "C");
            }
            other => panic!("expected Joined, got {other:?}"),
        }
    }

    #[test]
    fn disconnect_renumbers_and_notifies_survivors() {
        let (_c1, s1) = tcp_pair();
        let (c2, s2) = tcp_pair();
        let mut session = session();
        let conn_b = session.admit(session.next_index(), "B", "Red", s1).unwrap();
        session
            .admit(session.next_index(), "C", "Blue", s2)
            .unwrap();
        let mut reader = TestReader::new(c2);

        session.disconnect(conn_b);
        match reader.next_matching(|m| matches!(m, ServerMessage::Disconnect { .. })) {
            ServerMessage::Disconnect { index } => assert_eq!(index, PlayerIndex(1)),
            other => panic!("expected Disconnect, got {other:?}"),
        }
        // C moved down into the gap.
        assert_eq!(session.roster().get(PlayerIndex(1)).unwrap().name, "C");
        assert_eq!(session.roster().len(), 2);

        // A subsequent broadcast has contiguous indices.
        session.handle_update(session.peers[0].conn, update(3.0, vec![]));
        session.broadcast_state(update(3.0, vec![]));
        match reader.next_matching(|m| matches!(m, ServerMessage::State { .. })) {
            ServerMessage::State { players } => {
                let indices: Vec<u32> = players.iter().map(|p| p.index.0).collect();
                assert_eq!(indices, vec![0, 1]);
            }
            other => panic!("expected State, got {other:?}"),
        }
    }

    #[test]
    fn double_disconnect_is_harmless() {
        let (_c1, s1) = tcp_pair();
        let mut session = session();
        let conn = session.admit(session.next_index(), "B", "Red", s1).unwrap();
        session.disconnect(conn);
        session.disconnect(conn);
        assert_eq!(session.roster().len(), 1);
    }

    #[test]
    fn arbitration_commits_once_and_rebroadcasts() {
        let (c1, s1) = tcp_pair();
        let (_c2, s2) = tcp_pair();
        let mut session = session();
        let conn_b = session.admit(session.next_index(), "B", "Red", s1).unwrap();
        session
            .admit(session.next_index(), "C", "Blue", s2)
            .unwrap();
        let mut reader = TestReader::new(c1);

        // B reports a state with one live projectile; C is the victim.
        session.handle_update(conn_b, update(3.0, vec![spawn(0)]));
        let conn_c = session.peers[1].conn;
        session.handle_update(conn_c, update(3.0, vec![]));

        let event = DamageEvent {
            shooter: PlayerIndex(1),
            projectile: ProjectileId(0),
            amount: 1.0,
            victim: PlayerIndex(2),
        };
        assert!(session.arbitrate(event));
        // Duplicate delivery: projectile already removed, nothing changes.
        assert!(!session.arbitrate(event));

        // Victim's mirrored health dropped exactly once.
        assert_eq!(session.peers[1].latest.as_ref().unwrap().health, 2.0);

        // The shooter (and every other connection) got the verbatim event.
        match reader.next_matching(|m| matches!(m, ServerMessage::Damage(_))) {
            ServerMessage::Damage(received) => assert_eq!(received, event),
            other => panic!("expected Damage, got {other:?}"),
        }
    }

    #[test]
    fn arbitration_rejects_stale_indices() {
        let mut session = session();
        assert!(!session.arbitrate(DamageEvent {
            shooter: PlayerIndex(4),
            projectile: ProjectileId(0),
            amount: 1.0,
            victim: PlayerIndex(0),
        }));
    }

    #[test]
    fn expired_projectiles_leave_the_live_lists() {
        let (_c1, s1) = tcp_pair();
        let mut session = session();
        let conn = session.admit(session.next_index(), "B", "Red", s1).unwrap();
        session.handle_update(conn, update(3.0, vec![spawn(7)]));

        session.prune_expired(&[(PlayerIndex(1), ProjectileId(7))]);
        // The projectile is gone, so damage referencing it cannot commit.
        assert!(!session.arbitrate(DamageEvent {
            shooter: PlayerIndex(1),
            projectile: ProjectileId(7),
            amount: 1.0,
            victim: PlayerIndex(0),
        }));
    }

    #[test]
    fn state_broadcast_relays_each_spawn_once() {
        let (c1, s1) = tcp_pair();
        let mut session = session();
        let conn = session.admit(session.next_index(), "B", "Red", s1).unwrap();
        session.handle_update(conn, update(3.0, vec![spawn(0)]));

        let mut reader = TestReader::new(c1);
        session.broadcast_state(update(3.0, vec![]));
        match reader.next_matching(|m| matches!(m, ServerMessage::State { .. })) {
            ServerMessage::State { players } => {
                assert_eq!(players.len(), 2);
                assert_eq!(players[1].state.projectiles.len(), 1);
            }
            other => panic!("expected State, got {other:?}"),
        }

        // Next broadcast: the spawn has been relayed, only transforms remain.
        session.broadcast_state(update(3.0, vec![]));
        match reader.next_matching(|m| matches!(m, ServerMessage::State { .. })) {
            ServerMessage::State { players } => {
                assert!(players[1].state.projectiles.is_empty());
            }
            other => panic!("expected State, got {other:?}"),
        }
    }

    #[test]
    fn events_preserve_arrival_order() {
        let (_c1, s1) = tcp_pair();
        let mut session = session();
        let conn = session.admit(session.next_index(), "B", "Red", s1).unwrap();
        session.handle_update(conn, update(3.0, vec![spawn(0)]));
        session.disconnect(conn);

        let events = session.drain_events();
        assert!(matches!(events[0], SessionEvent::Joined(PlayerIndex(1))));
        assert!(matches!(
            events[1],
            SessionEvent::RemoteState(PlayerIndex(1), _)
        ));
        assert!(matches!(events[2], SessionEvent::Removed(PlayerIndex(1))));
        assert!(session.drain_events().is_empty());
    }
}
