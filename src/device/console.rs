//! A terminal stand-in for the pad.
//!
//! Lights are printed as a text matrix at the end of every frame.
//! Keys are typed on stdin, one command per line:
//!
//! ```text
//! 35      press pad key 35
//! 3,3     press the key over grid cell (3, 3)
//! clear   press the clear key
//! quit    release the stop key
//! ```
//!
//! End of input counts as `quit`.

use std::{
    io::{self, BufRead, Write},
    sync::mpsc::{self, Sender},
    thread,
};

use super::{
    APC_MINI_LED_COUNT, ChannelInput, DeviceError, InputMap, KeyLayout, PadEvent, PadOutput,
};
use crate::util::LedColor;

const FULL_VELOCITY: u8 = 127;

pub struct ConsolePad<W: Write + Send = io::Stdout> {
    layout: KeyLayout,
    lights: [LedColor; APC_MINI_LED_COUNT as usize],
    out: W,
}

impl ConsolePad {
    pub fn stdout(layout: KeyLayout) -> ConsolePad {
        ConsolePad::new(layout, io::stdout())
    }
}

impl<W: Write + Send> ConsolePad<W> {
    pub fn new(layout: KeyLayout, out: W) -> Self {
        Self {
            layout,
            lights: [LedColor::OFF; APC_MINI_LED_COUNT as usize],
            out,
        }
    }

    pub fn light(&self, key: u8) -> LedColor {
        self.lights
            .get(key as usize)
            .copied()
            .unwrap_or(LedColor::OFF)
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn draw(&mut self) -> Result<(), DeviceError> {
        let mut text = String::new();
        for row in 0..self.layout.height {
            for col in 0..self.layout.width {
                let key = row * self.layout.width + col;
                text.push(match self.light(key) {
                    LedColor::OFF => '.',
                    LedColor::GREEN | LedColor::GREEN_BLINK => 'o',
                    LedColor::RED | LedColor::RED_BLINK => 'x',
                    _ => '*',
                });
            }
            text.push('\n');
        }
        writeln!(self.out, "{text}")
            .and_then(|_| self.out.flush())
            .map_err(|e| DeviceError::Write(e.to_string()))
    }
}

impl<W: Write + Send> PadOutput for ConsolePad<W> {
    fn clear_all(&mut self) -> Result<(), DeviceError> {
        self.lights = [LedColor::OFF; APC_MINI_LED_COUNT as usize];
        Ok(())
    }

    fn set_key(&mut self, key: u8, color: LedColor) -> Result<(), DeviceError> {
        match self.lights.get_mut(key as usize) {
            Some(light) => {
                *light = color;
                Ok(())
            }
            None => Err(DeviceError::Write(format!("no light for key {key}"))),
        }
    }

    fn flush(&mut self) -> Result<(), DeviceError> {
        self.draw()
    }
}

/// Parses one console line into the events it stands for.
pub fn parse_command(line: &str, map: &InputMap) -> Result<PadEvent, String> {
    let line = line.trim();
    match line {
        "clear" | "c" => return Ok(PadEvent::press(map.clear.key, FULL_VELOCITY)),
        "quit" | "q" | "exit" => return Ok(PadEvent::release(map.stop.key, FULL_VELOCITY)),
        _ => {}
    }
    if let Some((x, y)) = line.split_once(',') {
        let x = x.trim().parse::<usize>().map_err(|e| format!("invalid x: {e}"))?;
        let y = y.trim().parse::<usize>().map_err(|e| format!("invalid y: {e}"))?;
        let key = map
            .layout
            .key_for_coord(x, y)
            .ok_or_else(|| format!("({x}, {y}) is not on the pad"))?;
        return Ok(PadEvent::press(key, FULL_VELOCITY));
    }
    line.parse::<u8>()
        .map(|key| PadEvent::press(key, FULL_VELOCITY))
        .map_err(|_| format!("unrecognised command {line:?}"))
}

/// Starts a stdin reader thread and returns the input side of the console pad.
pub fn stdin_input(map: InputMap) -> Result<ChannelInput, DeviceError> {
    let (tx, rx) = mpsc::channel();
    thread::Builder::new()
        .name("console-stdin".into())
        .spawn(move || read_lines(io::stdin().lock(), map, tx))
        .map_err(|e| DeviceError::Init(e.to_string()))?;
    Ok(ChannelInput::new(rx))
}

fn read_lines(input: impl BufRead, map: InputMap, events: Sender<PadEvent>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => {
                log::warn!("stdin: {e}");
                break;
            }
        };
        if line.trim().is_empty() {
            continue;
        }
        match parse_command(&line, &map) {
            Ok(event) => {
                if events.send(event).is_err() {
                    return;
                }
            }
            Err(e) => log::warn!("{e}"),
        }
    }
    log::info!("console input closed");
    let _ = events.send(PadEvent::release(map.stop.key, FULL_VELOCITY));
}
