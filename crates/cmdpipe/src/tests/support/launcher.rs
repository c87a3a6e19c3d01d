//! Scripted [`WorkerLauncher`] that stands in for a real worker process.
//!
//! The scripted worker drains its stdin on a background thread. Its `wait`
//! joins that thread, so a wait can only complete once the write end of the
//! pipe has been closed.

use std::ffi::OsString;
use std::io::{self, PipeReader, Read};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crate::supervisor::{ExitOutcome, SupervisorError, WorkerHandle, WorkerLauncher};

pub const SCRIPTED_PID: u32 = 4242;

#[derive(Debug, Clone, Copy)]
enum Behaviour {
    Drain,
    CloseImmediately,
    FailToSpawn,
}

/// Shared view of what the scripted worker saw.
#[derive(Debug, Clone, Default)]
pub struct LaunchProbe {
    received: Arc<Mutex<Vec<u8>>>,
    spawns: Arc<AtomicUsize>,
    waits: Arc<AtomicUsize>,
}

impl LaunchProbe {
    pub fn received_text(&self) -> String {
        String::from_utf8(self.received.lock().expect("probe mutex poisoned").clone())
            .expect("worker input utf8")
    }

    pub fn spawns(&self) -> usize {
        self.spawns.load(Ordering::SeqCst)
    }

    pub fn waits(&self) -> usize {
        self.waits.load(Ordering::SeqCst)
    }
}

/// Launcher whose workers follow a fixed script.
#[derive(Debug, Clone)]
pub struct ScriptedLauncher {
    behaviour: Behaviour,
    outcome: ExitOutcome,
    probe: LaunchProbe,
}

impl ScriptedLauncher {
    /// Worker that reads its stdin to EOF and exits with `outcome`.
    pub fn draining(outcome: ExitOutcome) -> Self {
        Self::with_behaviour(Behaviour::Drain, outcome)
    }

    /// Worker that closes its stdin without reading anything.
    pub fn closing_immediately(outcome: ExitOutcome) -> Self {
        Self::with_behaviour(Behaviour::CloseImmediately, outcome)
    }

    /// Launcher whose spawn always fails.
    pub fn failing() -> Self {
        Self::with_behaviour(Behaviour::FailToSpawn, ExitOutcome::Unknown)
    }

    pub fn probe(&self) -> LaunchProbe {
        self.probe.clone()
    }

    fn with_behaviour(behaviour: Behaviour, outcome: ExitOutcome) -> Self {
        Self {
            behaviour,
            outcome,
            probe: LaunchProbe::default(),
        }
    }
}

impl WorkerLauncher for ScriptedLauncher {
    type Handle = ScriptedHandle;

    fn spawn(&self, stdin: PipeReader) -> Result<ScriptedHandle, SupervisorError> {
        let reader = match self.behaviour {
            Behaviour::FailToSpawn => {
                return Err(SupervisorError::SpawnFailed {
                    program: OsString::from("scripted-worker"),
                    source: Arc::new(io::Error::from(io::ErrorKind::NotFound)),
                });
            }
            Behaviour::CloseImmediately => {
                drop(stdin);
                None
            }
            Behaviour::Drain => {
                let received = Arc::clone(&self.probe.received);
                Some(thread::spawn(move || {
                    let mut stdin = stdin;
                    let mut buffer = Vec::new();
                    stdin
                        .read_to_end(&mut buffer)
                        .expect("scripted worker read");
                    received
                        .lock()
                        .expect("probe mutex poisoned")
                        .extend_from_slice(&buffer);
                }))
            }
        };
        self.probe.spawns.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedHandle {
            reader,
            outcome: self.outcome,
            waits: Arc::clone(&self.probe.waits),
        })
    }
}

/// Handle to a scripted worker.
#[derive(Debug)]
pub struct ScriptedHandle {
    reader: Option<JoinHandle<()>>,
    outcome: ExitOutcome,
    waits: Arc<AtomicUsize>,
}

impl WorkerHandle for ScriptedHandle {
    fn id(&self) -> u32 {
        SCRIPTED_PID
    }

    fn wait(self) -> Result<ExitOutcome, SupervisorError> {
        if let Some(reader) = self.reader {
            reader.join().expect("scripted worker thread panicked");
        }
        self.waits.fetch_add(1, Ordering::SeqCst);
        Ok(self.outcome)
    }
}
