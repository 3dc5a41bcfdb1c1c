use std::{
    collections::VecDeque,
    sync::{Arc, Mutex, mpsc},
    thread,
    time::{Duration, Instant},
};

use padlife::{
    Command, ControllerHandle, Grid, LifeConfig, Simulation, SimulationFrame, spawn_controller,
    device::{ChannelInput, DeviceError, KeyLayout, PadEvent, PadInput, PadOutput},
    util::LedColor,
};

#[derive(Default)]
struct Recorded {
    clears: usize,
    single_writes: usize,
    frames: Vec<Vec<(u8, LedColor)>>,
}

#[derive(Clone, Default)]
struct RecordingOutput(Arc<Mutex<Recorded>>);

impl PadOutput for RecordingOutput {
    fn clear_all(&mut self) -> Result<(), DeviceError> {
        self.0.lock().unwrap().clears += 1;
        Ok(())
    }
    fn set_key(&mut self, _key: u8, _color: LedColor) -> Result<(), DeviceError> {
        self.0.lock().unwrap().single_writes += 1;
        Ok(())
    }
    fn write_frame(&mut self, keys: &[(u8, LedColor)]) -> Result<(), DeviceError> {
        self.0.lock().unwrap().frames.push(keys.to_vec());
        Ok(())
    }
}

/// Hands out pre-recorded poll results, then idles. With a gate it stays
/// silent until the gate fires.
struct ScriptedInput {
    script: VecDeque<Result<Vec<PadEvent>, DeviceError>>,
    gate: Option<mpsc::Receiver<()>>,
}

fn scripted<const N: usize>(script: [Result<Vec<PadEvent>, DeviceError>; N]) -> ScriptedInput {
    ScriptedInput {
        script: VecDeque::from(script),
        gate: None,
    }
}

impl PadInput for ScriptedInput {
    fn poll(&mut self, timeout: Duration) -> Result<Vec<PadEvent>, DeviceError> {
        if let Some(gate) = &self.gate {
            if gate.recv_timeout(timeout).is_err() {
                return Ok(Vec::new());
            }
            self.gate = None;
        }
        match self.script.pop_front() {
            Some(result) => result,
            None => {
                thread::sleep(timeout);
                Ok(Vec::new())
            }
        }
    }
}

fn quiet_config() -> LifeConfig {
    LifeConfig {
        // Only the tick issued at startup fires during a test.
        tick_period: Duration::from_secs(3600),
        poll_interval: Duration::from_millis(2),
        ..LifeConfig::apc_mini()
    }
}

fn wait_for(
    handle: &ControllerHandle,
    what: impl Fn(&SimulationFrame) -> bool,
) -> Arc<SimulationFrame> {
    let deadline = Instant::now() + Duration::from_secs(10);
    loop {
        let frame = handle.latest_frame();
        if what(&frame) {
            return frame;
        }
        assert!(Instant::now() < deadline, "timed out waiting for controller");
        thread::sleep(Duration::from_millis(1));
    }
}

fn live_cells(grid: &Grid) -> Vec<(usize, usize)> {
    let mut cells: Vec<_> = grid
        .cells()
        .filter(|&(_, _, alive)| alive)
        .map(|(x, y, _)| (x, y))
        .collect();
    cells.sort();
    cells
}

fn grid_from_keys(keys: &[(u8, LedColor)]) -> Grid {
    let layout = KeyLayout::APC_MINI;
    let mut grid = Grid::new(8, 8);
    for &(key, color) in keys {
        let (x, y) = layout.coord_for_key(key).unwrap();
        grid.set(x, y, color.is_lit()).unwrap();
    }
    grid
}

fn press(x: usize, y: usize) -> PadEvent {
    PadEvent::press(KeyLayout::APC_MINI.key_for_coord(x, y).unwrap(), 127)
}

const STOP: PadEvent = PadEvent::release(82, 127);
const CLEAR: PadEvent = PadEvent::press(89, 127);

#[test]
fn toggled_row_rotates_after_one_step() {
    let output = RecordingOutput::default();
    let (events, rx) = mpsc::channel();
    let handle = spawn_controller(
        Simulation::new(8, 8),
        &quiet_config(),
        Box::new(output.clone()),
        Box::new(ChannelInput::new(rx)),
    )
    .unwrap();
    wait_for(&handle, |f| f.generation == 1);

    for event in [press(3, 3), press(4, 3), press(5, 3)] {
        events.send(event).unwrap();
    }
    let frame = wait_for(&handle, |f| f.grid.live_count() == 3);
    assert_eq!(live_cells(&frame.grid), vec![(3, 3), (4, 3), (5, 3)]);

    assert!(handle.commands().send(Command::Step));
    let frame = wait_for(&handle, |f| f.generation == 2);
    assert_eq!(live_cells(&frame.grid), vec![(4, 2), (4, 3), (4, 4)]);

    events.send(STOP).unwrap();
    let stats = handle.join().unwrap();
    assert_eq!(stats.toggles, 3);
    assert_eq!(stats.generations, 2);

    let recorded = output.0.lock().unwrap();
    assert_eq!(recorded.clears, 1);
    let last = grid_from_keys(recorded.frames.last().unwrap());
    assert_eq!(live_cells(&last), vec![(4, 2), (4, 3), (4, 4)]);
}

#[test]
fn stop_key_finishes_its_batch() {
    let output = RecordingOutput::default();
    let batch = vec![press(0, 0), STOP, press(1, 1)];
    let handle = spawn_controller(
        Simulation::new(8, 8),
        &quiet_config(),
        Box::new(output.clone()),
        Box::new(scripted([Ok(batch)])),
    )
    .unwrap();

    let stats = handle.join().unwrap();
    assert_eq!(stats.toggles, 2);
    assert_eq!(stats.input_batches, 1);

    let recorded = output.0.lock().unwrap();
    let last = grid_from_keys(recorded.frames.last().unwrap());
    assert_eq!(live_cells(&last), vec![(0, 0), (1, 1)]);
}

#[test]
fn clear_key_empties_the_grid_and_republishes() {
    let output = RecordingOutput::default();
    let mut simulation = Simulation::new(8, 8);
    simulation.random_init_with(&mut fastrand::Rng::with_seed(3));
    let (open, gate) = mpsc::channel();
    let input = ScriptedInput {
        gate: Some(gate),
        ..scripted([Ok(vec![CLEAR, press(2, 2)]), Ok(vec![STOP])])
    };
    let handle = spawn_controller(
        simulation,
        &quiet_config(),
        Box::new(output.clone()),
        Box::new(input),
    )
    .unwrap();
    wait_for(&handle, |f| f.generation == 1);
    open.send(()).unwrap();

    let stats = handle.join().unwrap();
    assert_eq!(stats.clears, 1);
    let recorded = output.0.lock().unwrap();
    let frames: Vec<_> = recorded.frames.iter().map(|f| grid_from_keys(f)).collect();
    // The clear is published before the toggle that follows it lands.
    let cleared = frames.iter().position(|g| g.live_count() == 0).unwrap();
    assert_eq!(live_cells(&frames[cleared + 1]), vec![(2, 2)]);
    assert_eq!(live_cells(frames.last().unwrap()), vec![(2, 2)]);
}

#[test]
fn transient_read_failures_are_retried() {
    let script = scripted([
        Err(DeviceError::Read("buffer overflow".into())),
        Ok(vec![]),
        Err(DeviceError::Read("buffer overflow".into())),
        Ok(vec![press(6, 6)]),
        Ok(vec![STOP]),
    ]);
    let handle = spawn_controller(
        Simulation::new(8, 8),
        &quiet_config(),
        Box::new(RecordingOutput::default()),
        Box::new(script),
    )
    .unwrap();

    let stats = handle.join().unwrap();
    assert_eq!(stats.toggles, 1);
    assert_eq!(stats.input_batches, 2);
}

#[test]
fn lost_input_shuts_the_controller_down() {
    let handle = spawn_controller(
        Simulation::new(8, 8),
        &quiet_config(),
        Box::new(RecordingOutput::default()),
        Box::new(scripted([Err(DeviceError::Disconnected)])),
    )
    .unwrap();
    let err = handle.join().unwrap_err();
    assert_eq!(
        err.downcast_ref::<DeviceError>(),
        Some(&DeviceError::Disconnected)
    );
}

#[test]
fn average_step_time_covers_every_generation() {
    let (_events, rx) = mpsc::channel();
    let handle = spawn_controller(
        Simulation::new(8, 8),
        &quiet_config(),
        Box::new(RecordingOutput::default()),
        Box::new(ChannelInput::new(rx)),
    )
    .unwrap();
    wait_for(&handle, |f| f.generation == 1);
    for _ in 0..4 {
        assert!(handle.commands().send(Command::Step));
    }
    wait_for(&handle, |f| f.generation == 5);
    handle.stop();
    let stats = handle.join().unwrap();
    assert_eq!(stats.generations, 5);
    assert!(stats.average_step_exec_time > Duration::ZERO);
}

#[test]
fn programmatic_stop_wakes_a_sleeping_ticker() {
    let (_events, rx) = mpsc::channel();
    let handle = spawn_controller(
        Simulation::new(8, 8),
        &quiet_config(),
        Box::new(RecordingOutput::default()),
        Box::new(ChannelInput::new(rx)),
    )
    .unwrap();
    wait_for(&handle, |f| f.generation == 1);
    assert!(!handle.is_stopped());

    let commands = handle.commands();
    handle.stop();
    let start = Instant::now();
    handle.join().unwrap();
    assert!(start.elapsed() < Duration::from_secs(5));
    assert!(!commands.send(Command::Step));
}

#[test]
fn ticker_keeps_generations_coming() {
    let config = LifeConfig {
        tick_period: Duration::from_millis(5),
        ..quiet_config()
    };
    let mut simulation = Simulation::new(8, 8);
    for (x, y) in [(1, 0), (1, 1), (1, 2)] {
        simulation.set(x, y, true).unwrap();
    }
    let (_events, rx) = mpsc::channel();
    let handle = spawn_controller(
        simulation,
        &config,
        Box::new(RecordingOutput::default()),
        Box::new(ChannelInput::new(rx)),
    )
    .unwrap();

    // Every settled frame is one of the two blinker phases.
    let horizontal: Vec<(usize, usize)> = vec![(0, 1), (1, 1), (2, 1)];
    let vertical: Vec<(usize, usize)> = vec![(1, 0), (1, 1), (1, 2)];
    let deadline = Instant::now() + Duration::from_secs(10);
    while handle.latest_frame().generation < 10 {
        let frame = handle.latest_frame();
        let cells = live_cells(&frame.grid);
        let expected = if frame.generation % 2 == 0 { &vertical } else { &horizontal };
        assert_eq!(&cells, expected);
        assert!(Instant::now() < deadline);
        thread::yield_now();
    }
    handle.stop();
    let stats = handle.join().unwrap();
    assert!(stats.generations >= 10);
}

#[test]
fn per_cell_publishing_writes_whole_frames() {
    let output = RecordingOutput::default();
    let config = LifeConfig {
        batched_output: false,
        ..quiet_config()
    };
    let handle = spawn_controller(
        Simulation::new(8, 8),
        &config,
        Box::new(output.clone()),
        Box::new(scripted([Ok(vec![press(0, 0)]), Ok(vec![STOP])])),
    )
    .unwrap();
    handle.join().unwrap();

    let recorded = output.0.lock().unwrap();
    assert!(recorded.frames.is_empty());
    assert!(recorded.single_writes >= 64 * 3);
    assert_eq!(recorded.single_writes % 64, 0);
}

/// Toggles and steps race in from several threads. Whatever order the owner
/// picked, the final grid and every published frame must match a sequential
/// replay of the commands in send order.
#[test]
fn concurrent_toggles_and_steps_serialize() {
    let output = RecordingOutput::default();
    let (_events, rx) = mpsc::channel();
    let handle = spawn_controller(
        Simulation::new(8, 8),
        &quiet_config(),
        Box::new(output.clone()),
        Box::new(ChannelInput::new(rx)),
    )
    .unwrap();
    let start = wait_for(&handle, |f| f.generation == 1);

    let journal = Arc::new(Mutex::new(Vec::new()));
    let mut producers = Vec::new();
    for seed in 0..5u64 {
        let journal = Arc::clone(&journal);
        let commands = handle.commands();
        producers.push(thread::spawn(move || {
            let mut rng = fastrand::Rng::with_seed(seed);
            for _ in 0..60 {
                let command = if seed == 0 {
                    Command::Step
                } else {
                    Command::Toggle {
                        x: rng.usize(..8),
                        y: rng.usize(..8),
                    }
                };
                {
                    let mut journal = journal.lock().unwrap();
                    journal.push(command.clone());
                    assert!(commands.send(command));
                }
                if rng.bool() {
                    thread::yield_now();
                }
            }
        }));
    }
    for producer in producers {
        producer.join().unwrap();
    }

    let journal = journal.lock().unwrap().clone();
    let expected_revision = start.revision + journal.len() as u64;
    let end = wait_for(&handle, |f| f.revision == expected_revision);

    let mut replay = Simulation::new(8, 8);
    let mut states = vec![replay.grid().clone()];
    for command in &journal {
        match *command {
            Command::Step => replay.step(),
            Command::Toggle { x, y } => replay.toggle(x, y).unwrap(),
            _ => unreachable!(),
        }
        states.push(replay.grid().clone());
    }
    assert_eq!(&end.grid, replay.grid());
    assert_eq!(end.generation, start.generation + 60);

    handle.stop();
    handle.join().unwrap();

    let recorded = output.0.lock().unwrap();
    let mut at = 0;
    for keys in &recorded.frames {
        let published = grid_from_keys(keys);
        match states[at..].iter().position(|s| *s == published) {
            Some(offset) => at += offset,
            None => panic!("published a grid no sequential order produces:\n{published}"),
        }
    }
}
