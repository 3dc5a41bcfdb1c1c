//! The thread that owns the [`Simulation`] and the two producers feeding it.
//!
//! Only the owner thread ever touches the grids. The ticker and the input
//! consumer send [`Command`]s over one channel, so every step, toggle, clear
//! and publish runs to completion before the next one starts, in the order
//! the commands were sent.

use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
        mpsc::{self, Receiver, RecvTimeoutError, Sender},
    },
    thread,
    time::{Duration, Instant},
};

use anyhow::{Context, anyhow};
use arc_swap::ArcSwap;

use crate::{
    config::LifeConfig,
    device::{DeviceError, InputAction, InputMap, PadInput, PadOutput},
    rendering::{self, FramePainter},
    sim::{Simulation, SimulationFrame, SimulationStatistics},
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Publish the current generation, then advance one step.
    Tick,
    /// Advance one step, then publish.
    Step,
    Toggle { x: usize, y: usize },
    Clear,
    /// One input batch, applied as a unit and published once at the end.
    Input(Vec<InputAction>),
    /// The input source failed for good. Stops the controller with an error.
    InputLost(DeviceError),
    Shutdown,
}

/// A producer handle onto the owner's command queue.
#[derive(Clone)]
pub struct CommandSender(Sender<Command>);

impl CommandSender {
    /// Queues a command. Returns `false` once the controller has stopped.
    pub fn send(&self, command: Command) -> bool {
        self.0.send(command).is_ok()
    }
}

pub struct ControllerHandle {
    commands: CommandSender,
    stop: Arc<AtomicBool>,
    latest_frame: Arc<ArcSwap<SimulationFrame>>,
    owner: thread::JoinHandle<Result<SimulationStatistics, DeviceError>>,
    ticker: thread::JoinHandle<()>,
    input: thread::JoinHandle<()>,
}

/// Starts the owner, ticker and input consumer threads.
///
/// `output.clear_all()` runs once on the owner thread before anything else.
pub fn spawn_controller(
    simulation: Simulation,
    config: &LifeConfig,
    output: Box<dyn PadOutput>,
    input: Box<dyn PadInput>,
) -> anyhow::Result<ControllerHandle> {
    let stop = Arc::new(AtomicBool::new(false));
    let latest_frame = Arc::new(ArcSwap::from_pointee(simulation.snapshot()));
    let (command_tx, command_rx) = mpsc::channel();
    // Never sent on; dropping the sender wakes the ticker.
    let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

    let painter = FramePainter {
        layout: config.layout,
        alive_color: config.alive_color,
        dead_color: config.dead_color,
        batched: config.batched_output,
    };
    let owner = Owner {
        simulation,
        output,
        painter,
        stop: Arc::clone(&stop),
        latest_frame: Arc::clone(&latest_frame),
        stats: SimulationStatistics::default(),
        total_step_time: Duration::ZERO,
        lost_input: None,
    };
    let owner = thread::Builder::new()
        .name("life-owner".into())
        .spawn(move || owner.run(command_rx, shutdown_tx))
        .context("failed to spawn owner thread")?;

    let tick_period = config.tick_period;
    let (c, s) = (command_tx.clone(), Arc::clone(&stop));
    let ticker = thread::Builder::new()
        .name("life-ticker".into())
        .spawn(move || ticker_thread(tick_period, c, s, shutdown_rx))
        .context("failed to spawn ticker thread")?;

    let map = InputMap {
        layout: config.layout,
        ..InputMap::apc_mini(config.width, config.height)
    };
    let poll_interval = config.poll_interval;
    let (c, s) = (command_tx.clone(), Arc::clone(&stop));
    let input = thread::Builder::new()
        .name("life-input".into())
        .spawn(move || input_thread(input, map, poll_interval, c, s))
        .context("failed to spawn input thread")?;

    log::info!(
        "controller started: {}x{} grid, {:?} per generation",
        config.width,
        config.height,
        tick_period
    );
    Ok(ControllerHandle {
        commands: CommandSender(command_tx),
        stop,
        latest_frame,
        owner,
        ticker,
        input,
    })
}

impl ControllerHandle {
    pub fn commands(&self) -> CommandSender {
        self.commands.clone()
    }

    /// The latest settled frame. Never a half-stepped grid.
    pub fn latest_frame(&self) -> Arc<SimulationFrame> {
        self.latest_frame.load_full()
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Acquire)
    }

    /// Asks the owner to stop after the commands already queued.
    pub fn stop(&self) {
        self.commands.send(Command::Shutdown);
    }

    /// Blocks until the controller stops, by the pad's stop key or by
    /// [`ControllerHandle::stop`].
    ///
    /// Fails with the [`DeviceError`] if the controller stopped because the
    /// input source went away.
    pub fn join(self) -> anyhow::Result<SimulationStatistics> {
        let outcome = self
            .owner
            .join()
            .map_err(|_| anyhow!("owner thread panicked"))?;
        self.ticker
            .join()
            .map_err(|_| anyhow!("ticker thread panicked"))?;
        self.input
            .join()
            .map_err(|_| anyhow!("input thread panicked"))?;
        outcome.context("pad input lost before the stop key")
    }
}

struct Owner {
    simulation: Simulation,
    output: Box<dyn PadOutput>,
    painter: FramePainter,
    stop: Arc<AtomicBool>,
    latest_frame: Arc<ArcSwap<SimulationFrame>>,
    stats: SimulationStatistics,
    total_step_time: Duration,
    lost_input: Option<DeviceError>,
}

impl Owner {
    fn run(
        mut self,
        commands: Receiver<Command>,
        shutdown: Sender<()>,
    ) -> Result<SimulationStatistics, DeviceError> {
        if let Err(e) = self.output.clear_all() {
            log::warn!("{e}");
        }
        self.publish();

        while let Ok(command) = commands.recv() {
            if !self.apply(command) {
                break;
            }
        }

        if !self.stop.swap(true, Ordering::AcqRel) {
            log::info!(
                "controller stopped after {} generations",
                self.simulation.generation()
            );
        }
        drop(shutdown);

        if self.stats.generations > 0 {
            self.stats.average_step_exec_time =
                self.total_step_time.div_f64(self.stats.generations as f64);
        }
        match self.lost_input {
            Some(e) => Err(e),
            None => Ok(self.stats),
        }
    }

    /// Applies one command. Returns `false` when the controller should stop.
    fn apply(&mut self, command: Command) -> bool {
        match command {
            Command::Tick => {
                let frame = self.publish();
                log::debug!("\n{}", rendering::text_dump(&frame));
                self.step();
            }
            Command::Step => {
                self.step();
                self.publish();
            }
            Command::Toggle { x, y } => {
                self.toggle(x, y);
                self.publish();
            }
            Command::Clear => {
                self.clear();
                self.publish();
            }
            Command::Input(actions) => {
                self.stats.input_batches += 1;
                let mut stopping = false;
                for action in actions {
                    match action {
                        InputAction::Clear => {
                            self.clear();
                            self.publish();
                        }
                        InputAction::Toggle { x, y } => self.toggle(x, y),
                        InputAction::Stop => stopping = true,
                    }
                }
                self.publish();
                if stopping {
                    log::info!("stop key released");
                    return false;
                }
            }
            Command::InputLost(e) => {
                self.lost_input = Some(e);
                return false;
            }
            Command::Shutdown => return false,
        }
        true
    }

    fn step(&mut self) {
        let start = Instant::now();
        self.simulation.step();
        self.total_step_time += start.elapsed();
        self.stats.generations += 1;
        self.store();
    }

    fn toggle(&mut self, x: usize, y: usize) {
        match self.simulation.toggle(x, y) {
            Ok(()) => {
                self.stats.toggles += 1;
                self.store();
            }
            Err(e) => log::error!("dropping toggle: {e}"),
        }
    }

    fn clear(&mut self) {
        self.simulation.clear();
        self.stats.clears += 1;
        self.store();
    }

    fn store(&self) -> Arc<SimulationFrame> {
        let frame = Arc::new(self.simulation.snapshot());
        self.latest_frame.store(Arc::clone(&frame));
        frame
    }

    /// Writes the current generation to the pad. Write failures are logged and
    /// the next publish tries again.
    fn publish(&mut self) -> Arc<SimulationFrame> {
        let frame = self.latest_frame.load_full();
        if let Err(e) = self.painter.publish(&frame, self.output.as_mut()) {
            log::warn!("{e}");
        }
        frame
    }
}

fn ticker_thread(
    period: Duration,
    commands: Sender<Command>,
    stop: Arc<AtomicBool>,
    shutdown: Receiver<()>,
) {
    while !stop.load(Ordering::Acquire) {
        if commands.send(Command::Tick).is_err() {
            break;
        }
        match shutdown.recv_timeout(period) {
            Err(RecvTimeoutError::Timeout) => {}
            _ => break,
        }
    }
    log::debug!("ticker exiting");
}

fn input_thread(
    mut input: Box<dyn PadInput>,
    map: InputMap,
    poll_interval: Duration,
    commands: Sender<Command>,
    stop: Arc<AtomicBool>,
) {
    while !stop.load(Ordering::Acquire) {
        let events = match input.poll(poll_interval) {
            Ok(events) => events,
            Err(e) if e.is_transient() => {
                log::warn!("{e}");
                thread::sleep(poll_interval);
                continue;
            }
            Err(e) => {
                log::error!("{e}, shutting down");
                let _ = commands.send(Command::InputLost(e));
                break;
            }
        };
        if events.is_empty() {
            continue;
        }
        log::debug!("events: {events:?}");

        let actions = map.classify_batch(&events);
        let stopping = actions.contains(&InputAction::Stop);
        if commands.send(Command::Input(actions)).is_err() || stopping {
            break;
        }
    }
    log::debug!("input consumer exiting");
}
