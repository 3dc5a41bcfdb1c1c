use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use padlife::{
    LifeConfig, Simulation,
    device::{InputMap, PadInput, PadOutput, console},
    spawn_controller,
    util::LedColor,
};

/// Conway's Game of Life on a pad controller.
#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Which pad to drive.
    #[arg(long, value_enum, default_value_t = DeviceKind::Console)]
    device: DeviceKind,
    /// MIDI port name filter used with `--device apc`.
    #[arg(long, value_name = "SUBSTRING", default_value = padlife::device::DEFAULT_PORT_FILTER)]
    port: String,
    /// Milliseconds between generations.
    #[arg(
        long = "tick-ms",
        value_name = "MILLISECONDS",
        default_value_t = 1_000,
        value_parser = clap::value_parser!(u64).range(1..=60_000)
    )]
    tick_ms: u64,
    /// Milliseconds a single input read may block.
    #[arg(
        long = "poll-ms",
        value_name = "MILLISECONDS",
        default_value_t = 10,
        value_parser = clap::value_parser!(u64).range(1..=1_000)
    )]
    poll_ms: u64,
    /// Seed about a quarter of the grid with live cells.
    #[arg(long)]
    random: bool,
    /// Write one light at a time instead of one batch per frame.
    #[arg(long)]
    per_cell: bool,
    /// Light colour for live cells (green, red, yellow, optionally -blink).
    #[arg(long, value_name = "COLOR", default_value = "green", value_parser = parse_color)]
    color: LedColor,
    /// Most verbose log level written to stderr.
    #[arg(long, value_name = "LEVEL", default_value_t = log::LevelFilter::Info)]
    log_level: log::LevelFilter,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
enum DeviceKind {
    Console,
    Apc,
}

fn parse_color(name: &str) -> Result<LedColor, String> {
    LedColor::by_name(name).ok_or_else(|| format!("unknown colour {name:?}"))
}

fn main() -> Result<()> {
    let args = CliArgs::parse();
    padlife::init_logging(args.log_level);

    let config = LifeConfig {
        tick_period: Duration::from_millis(args.tick_ms),
        poll_interval: Duration::from_millis(args.poll_ms),
        random_init: args.random,
        alive_color: args.color,
        batched_output: !args.per_cell,
        ..LifeConfig::apc_mini()
    };
    config.validate()?;

    let map = InputMap {
        layout: config.layout,
        ..InputMap::apc_mini(config.width, config.height)
    };
    let (output, input, session) = open_device(args.device, &args.port, &config, map)?;

    let mut simulation = Simulation::new(config.width, config.height);
    if config.random_init {
        simulation.random_init();
    }

    let controller = spawn_controller(simulation, &config, output, input)?;
    let stats = controller.join()?;
    drop(session);

    log::info!(
        "ran {} generations, {} toggles, {} clears over {} input batches; average step {}μs",
        stats.generations,
        stats.toggles,
        stats.clears,
        stats.input_batches,
        stats.average_step_exec_time.as_micros()
    );
    Ok(())
}

/// Whatever must outlive the controller for the pad to keep working.
type Session = Option<Box<dyn std::any::Any>>;

fn open_device(
    kind: DeviceKind,
    port: &str,
    config: &LifeConfig,
    map: InputMap,
) -> Result<(Box<dyn PadOutput>, Box<dyn PadInput>, Session)> {
    match kind {
        DeviceKind::Console => {
            let input = console::stdin_input(map).context("failed to start console input")?;
            Ok((
                Box::new(console::ConsolePad::stdout(config.layout)),
                Box::new(input),
                None,
            ))
        }
        #[cfg(feature = "apc-mini")]
        DeviceKind::Apc => {
            let (output, input, session) =
                padlife::device::apc::open(port).context("failed to open APC mini")?;
            Ok((Box::new(output), Box::new(input), Some(Box::new(session))))
        }
        #[cfg(not(feature = "apc-mini"))]
        DeviceKind::Apc => {
            anyhow::bail!("cannot open {port:?}: built without the `apc-mini` feature")
        }
    }
}
