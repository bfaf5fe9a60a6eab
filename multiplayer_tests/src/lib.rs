// Test-only game client for multiplayer integration tests.
//
// Wraps the real `NetClient` (from `sightline_net::client`) and a real
// `Simulation` (from `sightline_sim`) to provide a synchronous,
// test-friendly API for exercising the full multiplayer pipeline:
// host → probe → join → move/shoot → state broadcast → damage arbitration →
// disconnect renumbering.
//
// The only test-specific code here is the synchronous polling wrappers
// (blocking loops around `client_tick`). All networking and sim logic uses
// the same code paths as the real game.
//
// See also: `tests/full_pipeline.rs` for the integration scenarios.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use sightline_net::client::{NetClient, build_simulation, client_tick, validate_join};
use sightline_net::host::{HostConfig, HostHandle, run_host_loop, start_host};
use sightline_net::session::Session;
use sightline_protocol::PlayerIndex;
use sightline_sim::{GameConfig, InputState, MapGrid, Simulation};

/// Default timeout for blocking poll operations.
const POLL_TIMEOUT: Duration = Duration::from_secs(5);

/// Sleep duration between poll ticks.
const POLL_INTERVAL: Duration = Duration::from_millis(2);

/// A hosted session with its tick loop on a background thread.
pub struct TestHost {
    handle: Option<HostHandle>,
    pub addr: String,
}

impl TestHost {
    /// Start a host named `host_name` on a random port, tick loop included.
    pub fn start(host_name: &str) -> Self {
        let config = HostConfig {
            port: 0,
            host_name: host_name.into(),
            ..HostConfig::default()
        };
        let (handle, addr) = start_host(&config).expect("start_host failed");

        let sim = Simulation::new(
            GameConfig::default(),
            MapGrid::builtin(&config.map).expect("builtin map"),
            &config.host_team,
            PlayerIndex(0),
        );
        let session = handle.session();
        let keep_running = handle.keep_running();
        thread::spawn(move || {
            run_host_loop(session, keep_running, sim, 120, InputState::default());
        });
        thread::sleep(Duration::from_millis(50));

        Self {
            handle: Some(handle),
            addr: format!("127.0.0.1:{}", addr.port()),
        }
    }

    pub fn session(&self) -> Arc<Mutex<Session>> {
        self.handle
            .as_ref()
            .expect("host already stopped")
            .session()
    }

    pub fn stop(mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

impl Drop for TestHost {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.stop();
        }
    }
}

/// A test game client wrapping a real `NetClient` and `Simulation`.
pub struct TestGameClient {
    pub client: NetClient,
    pub sim: Simulation,
}

impl TestGameClient {
    /// Probe, validate, join, and build the local simulation — the same
    /// sequence the join screen runs.
    pub fn join(addr: &str, name: &str, team: &str) -> Self {
        let info = NetClient::probe(addr).expect("probe failed");
        validate_join(&info, name, team).expect("join validation failed");
        let client = NetClient::connect(addr, name, team).expect("connect failed");
        let sim = build_simulation(client.info(), GameConfig::default(), team)
            .expect("build_simulation failed");
        Self { client, sim }
    }

    /// One synchronous game tick.
    pub fn tick(&mut self, input: &InputState) {
        client_tick(&mut self.client, &mut self.sim, input, 1.0).expect("client_tick failed");
    }

    /// Tick with `input` until `pred` holds, panicking after the timeout.
    pub fn tick_until(
        &mut self,
        input: &InputState,
        what: &str,
        pred: impl Fn(&TestGameClient) -> bool,
    ) {
        let start = Instant::now();
        loop {
            self.tick(input);
            if pred(self) {
                return;
            }
            assert!(
                start.elapsed() < POLL_TIMEOUT,
                "timed out waiting for {what}"
            );
            thread::sleep(POLL_INTERVAL);
        }
    }

    /// Where this client currently sees the participant at `index`.
    pub fn mirror_center(&self, index: PlayerIndex) -> Option<(f32, f32)> {
        self.sim.remote(index).map(|r| r.center)
    }

    /// Graceful leave.
    pub fn quit(&mut self) {
        self.client.send_quit();
    }
}
