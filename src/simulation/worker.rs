//! Simulation worker: a dedicated thread that owns the simulation.
//!
//! The UI side talks to it only through [`SimulationHandle`], sending
//! [`Command`]s and draining [`Event`]s without blocking. While running, the
//! worker checks for commands between every tick, so `stop` takes effect
//! before the next tick is computed.

use super::engine::Simulation;
use super::protocol::{Command, Event};
use super::types::{Link, NodePatch, SimulationNode, SimulationOptions};
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Pacing for the worker loop
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WorkerConfig {
    /// Delay between ticks; zero ticks as fast as possible
    pub tick_interval: Duration,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(16),
        }
    }
}

/// State published by the worker after every command and on convergence
#[derive(Debug, Default)]
struct WorkerStatus {
    running: AtomicBool,
    processed: AtomicU64,
}

struct Worker {
    simulation: Option<Simulation>,
    running: bool,
    events: Sender<Event>,
    status: Arc<WorkerStatus>,
    tick_interval: Duration,
    /// Commands taken in so far, stamped on every event
    applied: u64,
}

impl Worker {
    fn run(mut self, commands: Receiver<Command>) {
        loop {
            if !self.running {
                match commands.recv() {
                    Ok(command) => self.handle(command),
                    Err(_) => break,
                }
                continue;
            }

            loop {
                match commands.try_recv() {
                    Ok(command) => self.handle(command),
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return self.exit(),
                }
            }
            if !self.running {
                continue;
            }
            if !self.step() {
                break;
            }
            if !self.tick_interval.is_zero() {
                match commands.recv_timeout(self.tick_interval) {
                    Ok(command) => self.handle(command),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => break,
                }
            }
        }
        self.exit();
    }

    fn exit(&self) {
        tracing::debug!("Simulation worker exiting");
    }

    fn handle(&mut self, command: Command) {
        self.applied += 1;
        let name = command.name();
        match command {
            Command::Initialize { nodes, links, options } => {
                self.simulation = Some(Simulation::new(nodes, links, options));
                self.running = false;
            }
            Command::Start => self.update(name, |sim| {
                sim.set_alpha(1.0);
                true
            }),
            Command::Stop => self.stop(),
            Command::Reheat => self.update(name, |sim| {
                sim.reheat();
                true
            }),
            Command::UpdateOptions { options } => self.update(name, |sim| {
                sim.set_options(options);
                sim.reheat();
                true
            }),
            Command::UpdateNetwork { nodes, links, restart } => self.update(name, |sim| {
                sim.replace_network(nodes, links);
                if restart {
                    sim.reheat();
                }
                restart
            }),
            Command::UpdateNode { node_id, patch } => self.update(name, |sim| {
                if sim.update_node(&node_id, &patch) {
                    sim.reheat();
                    true
                } else {
                    tracing::debug!("update_node: no simulated node {}", node_id);
                    false
                }
            }),
        }
        self.status.running.store(self.running, Ordering::Release);
        self.status.processed.store(self.applied, Ordering::Release);
    }

    /// Apply `f` to the simulation; it returns whether ticking should resume
    fn update(&mut self, name: &str, f: impl FnOnce(&mut Simulation) -> bool) {
        match self.simulation.as_mut() {
            Some(simulation) => {
                if f(simulation) {
                    self.running = true;
                }
            }
            None => tracing::trace!("Ignoring '{}' before initialize", name),
        }
    }

    fn stop(&mut self) {
        let Some(simulation) = self.simulation.as_ref() else {
            tracing::trace!("Ignoring 'stop' before initialize");
            return;
        };
        if !self.running {
            return;
        }
        self.running = false;
        let _ = self.events.send(Event::End {
            nodes: simulation.nodes().to_vec(),
            applied: self.applied,
        });
    }

    /// One tick plus its events. Returns false once nobody is listening.
    fn step(&mut self) -> bool {
        let Some(simulation) = self.simulation.as_mut() else {
            self.running = false;
            return true;
        };
        simulation.tick();
        if self
            .events
            .send(Event::Tick {
                nodes: simulation.nodes().to_vec(),
                applied: self.applied,
            })
            .is_err()
        {
            return false;
        }

        if simulation.is_settled() {
            self.running = false;
            self.status.running.store(false, Ordering::Release);
            tracing::debug!("Simulation settled (alpha {:.4})", simulation.alpha());
            return self
                .events
                .send(Event::End {
                    nodes: simulation.nodes().to_vec(),
                    applied: self.applied,
                })
                .is_ok();
        }
        true
    }
}

/// UI-side handle to one simulation worker.
///
/// Dropping the handle terminates the worker. Every command sent after
/// termination, or before `initialize`, is silently ignored.
pub struct SimulationHandle {
    commands: Option<Sender<Command>>,
    events: Receiver<Event>,
    status: Arc<WorkerStatus>,
    thread: Option<JoinHandle<()>>,
    /// Commands handed to the worker so far
    sent: u64,
    initialized: bool,
    /// Whether the worker will be running once it catches up with `sent`
    expect_running: bool,
}

impl SimulationHandle {
    pub fn spawn(config: WorkerConfig) -> io::Result<Self> {
        let (command_tx, command_rx) = mpsc::channel();
        let (event_tx, event_rx) = mpsc::channel();
        let status = Arc::new(WorkerStatus::default());

        let worker = Worker {
            simulation: None,
            running: false,
            events: event_tx,
            status: Arc::clone(&status),
            tick_interval: config.tick_interval,
            applied: 0,
        };
        let thread = thread::Builder::new()
            .name("sociogram-simulation".to_string())
            .spawn(move || worker.run(command_rx))?;

        tracing::debug!("Simulation worker spawned (tick interval {:?})", config.tick_interval);

        Ok(Self {
            commands: Some(command_tx),
            events: event_rx,
            status,
            thread: Some(thread),
            sent: 0,
            initialized: false,
            expect_running: false,
        })
    }

    pub fn send(&mut self, command: Command) {
        if self.commands.is_none() {
            tracing::trace!("Ignoring '{}' after terminate", command.name());
            return;
        }

        let expect_running = match &command {
            Command::Initialize { .. } => {
                self.initialized = true;
                false
            }
            Command::Start | Command::Reheat | Command::UpdateOptions { .. } | Command::UpdateNode { .. } => {
                self.initialized
            }
            Command::UpdateNetwork { restart, .. } => (*restart && self.initialized) || self.is_running(),
            Command::Stop => false,
        };

        let name = command.name();
        let delivered = self
            .commands
            .as_ref()
            .is_some_and(|tx| tx.send(command).is_ok());
        if delivered {
            self.sent += 1;
            self.expect_running = expect_running;
        } else {
            tracing::debug!("Simulation worker has exited; dropping '{}'", name);
        }
    }

    pub fn initialize(&mut self, nodes: Vec<SimulationNode>, links: Vec<Link>, options: SimulationOptions) {
        self.send(Command::Initialize { nodes, links, options });
    }

    pub fn start(&mut self) {
        self.send(Command::Start);
    }

    pub fn stop(&mut self) {
        self.send(Command::Stop);
    }

    pub fn reheat(&mut self) {
        self.send(Command::Reheat);
    }

    pub fn update_options(&mut self, options: SimulationOptions) {
        self.send(Command::UpdateOptions { options });
    }

    pub fn update_network(&mut self, nodes: Vec<SimulationNode>, links: Vec<Link>, restart: bool) {
        self.send(Command::UpdateNetwork { nodes, links, restart });
    }

    pub fn update_node(&mut self, node_id: impl Into<String>, patch: NodePatch) {
        self.send(Command::UpdateNode {
            node_id: node_id.into(),
            patch,
        });
    }

    /// Commands delivered to the worker so far; compare with [`Event::applied`]
    pub fn sent(&self) -> u64 {
        self.sent
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether the engine is ticking, as far as this handle knows.
    ///
    /// Reflects the worker's own state once it has processed every command
    /// sent so far, and the expected outcome of the latest command before that.
    pub fn is_running(&self) -> bool {
        if self.commands.is_none() {
            return false;
        }
        if self.status.processed.load(Ordering::Acquire) >= self.sent {
            self.status.running.load(Ordering::Acquire)
        } else {
            self.expect_running
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.commands.is_none()
    }

    /// Next pending event, without blocking
    pub fn try_recv(&self) -> Option<Event> {
        if self.is_terminated() {
            return None;
        }
        self.events.try_recv().ok()
    }

    /// Wait up to `timeout` for the next event
    pub fn recv_timeout(&self, timeout: Duration) -> Option<Event> {
        if self.is_terminated() {
            return None;
        }
        self.events.recv_timeout(timeout).ok()
    }

    /// All pending events, without blocking
    pub fn drain(&self) -> Vec<Event> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }

    /// Stop the worker thread and wait for it to exit
    pub fn terminate(&mut self) {
        if self.commands.take().is_none() {
            return;
        }
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("Simulation worker panicked");
            }
        }
        tracing::debug!("Simulation worker terminated");
    }
}

impl Drop for SimulationHandle {
    fn drop(&mut self) {
        self.terminate();
    }
}
