#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use assistant_gateway::CancelSignal;
use assistant_gateway_mock::ScriptedGateway;
use conversation::{PollClock, PollPolicy, SessionDefaults, SessionManager};
use session_store::SessionStore;
use tempfile::TempDir;

#[derive(Default)]
struct ClockTrace {
    elapsed: Duration,
    sleeps: Vec<Duration>,
    raise_after: Option<(usize, CancelSignal)>,
}

/// Virtual clock: `sleep` advances time instantly and is recorded.
#[derive(Clone)]
pub struct VirtualClock {
    origin: Instant,
    state: Arc<Mutex<ClockTrace>>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            state: Arc::new(Mutex::new(ClockTrace::default())),
        }
    }

    /// Raises `signal` once `sleeps` sleeps have happened.
    pub fn raise_after(&self, sleeps: usize, signal: CancelSignal) {
        lock_unpoisoned(&self.state).raise_after = Some((sleeps, signal));
    }

    pub fn sleeps(&self) -> Vec<Duration> {
        lock_unpoisoned(&self.state).sleeps.clone()
    }

    pub fn elapsed(&self) -> Duration {
        lock_unpoisoned(&self.state).elapsed
    }
}

impl PollClock for VirtualClock {
    fn now(&self) -> Instant {
        self.origin + lock_unpoisoned(&self.state).elapsed
    }

    fn sleep(&self, duration: Duration) {
        let mut state = lock_unpoisoned(&self.state);
        state.elapsed += duration;
        state.sleeps.push(duration);
        let count = state.sleeps.len();
        if let Some((threshold, signal)) = &state.raise_after {
            if count >= *threshold {
                signal.store(true, Ordering::SeqCst);
            }
        }
    }
}

pub fn cancel_signal() -> CancelSignal {
    Arc::new(AtomicBool::new(false))
}

pub fn fast_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_secs(3),
        max_wait: Duration::from_secs(30),
        read_retries: 3,
        retry_base_delay: Duration::from_secs(1),
    }
}

pub struct Harness {
    pub dir: TempDir,
    pub store_path: PathBuf,
    pub clock: VirtualClock,
    pub manager: SessionManager<ScriptedGateway, VirtualClock>,
}

impl Harness {
    pub fn new(gateway: ScriptedGateway) -> Self {
        Self::with_defaults(gateway, SessionDefaults::default())
    }

    pub fn with_defaults(gateway: ScriptedGateway, defaults: SessionDefaults) -> Self {
        let dir = tempfile::tempdir().expect("tempdir should be created");
        let store_path = dir.path().join("openai.env");
        let clock = VirtualClock::new();
        let manager = SessionManager::new(
            gateway,
            SessionStore::open(&store_path),
            fast_policy(),
            defaults,
        )
        .with_clock(clock.clone());

        Self {
            dir,
            store_path,
            clock,
            manager,
        }
    }

    pub fn gateway(&self) -> &ScriptedGateway {
        self.manager.gateway()
    }

    pub fn seed_store(&self, contents: &str) {
        std::fs::write(&self.store_path, contents).expect("store should be seeded");
    }

    pub fn store_contents(&self) -> String {
        std::fs::read_to_string(&self.store_path).expect("store should be readable")
    }

    /// File names in the store directory other than the store itself, sorted.
    pub fn backups(&self) -> Vec<PathBuf> {
        let mut backups: Vec<PathBuf> = std::fs::read_dir(self.dir.path())
            .expect("store dir should be listable")
            .map(|entry| entry.expect("dir entry").path())
            .filter(|path| path != &self.store_path)
            .collect();
        backups.sort();
        backups
    }
}

pub fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
