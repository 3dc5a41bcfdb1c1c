//! Pad collaborators: the LED sink and the key event source.
//!
//! The controller only talks to [`PadOutput`] and [`PadInput`]. Concrete pads
//! live in the submodules: [`console`] is a terminal stand-in that is always
//! built, `apc` drives a real AKAI APC mini over MIDI when the `apc-mini`
//! feature is enabled.

use std::{
    error::Error,
    fmt,
    sync::mpsc::{Receiver, RecvTimeoutError},
    time::Duration,
};

use crate::util::LedColor;

#[cfg(feature = "apc-mini")]
pub mod apc;
pub mod console;

pub const NOTE_OFF: u8 = 0x80;
pub const NOTE_ON: u8 = 0x90;

/// The APC mini lights answer to note numbers 0..=99.
pub const APC_MINI_LED_COUNT: u8 = 100;
/// Upper bound on how many events a single input batch carries.
pub const MAX_BATCH_EVENTS: usize = 1024;
/// MIDI port name substring the APC mini shows up under.
pub const DEFAULT_PORT_FILTER: &str = "APC MINI";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceError {
    /// The pad could not be opened. Fatal at startup.
    Init(String),
    /// A read failed; the next poll may succeed.
    Read(String),
    /// An LED write failed.
    Write(String),
    /// The input source is gone for good.
    Disconnected,
}

impl DeviceError {
    pub fn is_transient(&self) -> bool {
        matches!(self, DeviceError::Read(_) | DeviceError::Write(_))
    }
}

impl fmt::Display for DeviceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceError::Init(e) => write!(f, "failed to open pad: {e}"),
            DeviceError::Read(e) => write!(f, "failed to read pad input: {e}"),
            DeviceError::Write(e) => write!(f, "failed to write pad output: {e}"),
            DeviceError::Disconnected => write!(f, "pad input disconnected"),
        }
    }
}

impl Error for DeviceError {}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EventKind {
    Press,
    Release,
    Other(u8),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PadEvent {
    pub kind: EventKind,
    pub key: u8,
    pub velocity: u8,
}

impl PadEvent {
    pub const fn press(key: u8, velocity: u8) -> PadEvent {
        PadEvent {
            kind: EventKind::Press,
            key,
            velocity,
        }
    }

    pub const fn release(key: u8, velocity: u8) -> PadEvent {
        PadEvent {
            kind: EventKind::Release,
            key,
            velocity,
        }
    }

    /// Decodes a three byte channel message. Note-on with velocity 0 is the
    /// running-status spelling of note-off.
    pub fn from_midi(status: u8, key: u8, velocity: u8) -> PadEvent {
        let kind = match status {
            NOTE_ON if velocity > 0 => EventKind::Press,
            NOTE_ON | NOTE_OFF => EventKind::Release,
            other => EventKind::Other(other),
        };
        PadEvent {
            kind,
            key,
            velocity,
        }
    }
}

/// Matches one specific key event, for example "release key 82 at full
/// velocity".
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Signature {
    pub kind: EventKind,
    pub key: u8,
    /// `None` accepts any velocity
    pub velocity: Option<u8>,
}

impl Signature {
    pub fn matches(&self, event: &PadEvent) -> bool {
        self.kind == event.kind
            && self.key == event.key
            && self.velocity.is_none_or(|v| v == event.velocity)
    }
}

/// Row-major key numbering of a pad, counted from its top-left key.
///
/// Grid rows grow the other way, so key `k` sits at
/// `x = k % width, y = height - 1 - k / width`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KeyLayout {
    pub width: u8,
    pub height: u8,
}

impl KeyLayout {
    pub const APC_MINI: KeyLayout = KeyLayout {
        width: 8,
        height: 8,
    };

    pub fn key_count(&self) -> u16 {
        self.width as u16 * self.height as u16
    }

    /// Grid coordinate of a pad key, `None` for keys outside the pad matrix.
    pub fn coord_for_key(&self, key: u8) -> Option<(usize, usize)> {
        if key as u16 >= self.key_count() {
            return None;
        }
        let (w, h) = (self.width as usize, self.height as usize);
        let key = key as usize;
        Some((key % w, h - 1 - key / w))
    }

    pub fn key_for_coord(&self, x: usize, y: usize) -> Option<u8> {
        let (w, h) = (self.width as usize, self.height as usize);
        if x >= w || y >= h {
            return None;
        }
        let rows_from_top = h - 1 - y;
        u8::try_from(rows_from_top * w + x).ok()
    }
}

/// What a single pad event asks the controller to do.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InputAction {
    Clear,
    Toggle { x: usize, y: usize },
    Stop,
}

/// Turns raw pad events into [`InputAction`]s.
#[derive(Clone, Copy, Debug)]
pub struct InputMap {
    pub layout: KeyLayout,
    pub clear: Signature,
    pub stop: Signature,
    /// Grid bounds; keys mapping outside them are ignored
    pub width: usize,
    pub height: usize,
}

impl InputMap {
    pub const APC_MINI_CLEAR: Signature = Signature {
        kind: EventKind::Press,
        key: 89,
        velocity: Some(127),
    };
    pub const APC_MINI_STOP: Signature = Signature {
        kind: EventKind::Release,
        key: 82,
        velocity: Some(127),
    };

    pub fn apc_mini(width: usize, height: usize) -> InputMap {
        InputMap {
            layout: KeyLayout::APC_MINI,
            clear: Self::APC_MINI_CLEAR,
            stop: Self::APC_MINI_STOP,
            width,
            height,
        }
    }

    pub fn classify(&self, event: &PadEvent) -> Option<InputAction> {
        if self.stop.matches(event) {
            return Some(InputAction::Stop);
        }
        if self.clear.matches(event) {
            return Some(InputAction::Clear);
        }
        if event.kind != EventKind::Press {
            return None;
        }
        match self.layout.coord_for_key(event.key) {
            Some((x, y)) if x < self.width && y < self.height => Some(InputAction::Toggle { x, y }),
            _ => {
                log::debug!("ignoring press of unmapped key {}", event.key);
                None
            }
        }
    }

    pub fn classify_batch(&self, events: &[PadEvent]) -> Vec<InputAction> {
        events.iter().filter_map(|e| self.classify(e)).collect()
    }
}

/// The LED side of a pad.
pub trait PadOutput: Send {
    /// Turns every light off.
    fn clear_all(&mut self) -> Result<(), DeviceError>;

    fn set_key(&mut self, key: u8, color: LedColor) -> Result<(), DeviceError>;

    /// Writes a whole frame worth of keys. Pads that can batch writes should
    /// override this; the default issues one `set_key` per entry.
    fn write_frame(&mut self, keys: &[(u8, LedColor)]) -> Result<(), DeviceError> {
        for &(key, color) in keys {
            self.set_key(key, color)?;
        }
        Ok(())
    }

    /// Called once after every published frame, however it was written.
    fn flush(&mut self) -> Result<(), DeviceError> {
        Ok(())
    }
}

/// The key side of a pad.
pub trait PadInput: Send {
    /// Waits up to `timeout` for the next batch. An empty batch means nothing
    /// arrived in time.
    fn poll(&mut self, timeout: Duration) -> Result<Vec<PadEvent>, DeviceError>;
}

/// A [`PadInput`] fed by a reader thread or a driver callback.
///
/// `poll` blocks for the first event, then drains whatever else is already
/// queued into the same batch.
pub struct ChannelInput {
    events: Receiver<PadEvent>,
}

impl ChannelInput {
    pub fn new(events: Receiver<PadEvent>) -> ChannelInput {
        ChannelInput { events }
    }
}

impl PadInput for ChannelInput {
    fn poll(&mut self, timeout: Duration) -> Result<Vec<PadEvent>, DeviceError> {
        let first = match self.events.recv_timeout(timeout) {
            Ok(event) => event,
            Err(RecvTimeoutError::Timeout) => return Ok(Vec::new()),
            Err(RecvTimeoutError::Disconnected) => return Err(DeviceError::Disconnected),
        };
        let mut batch = vec![first];
        while batch.len() < MAX_BATCH_EVENTS {
            match self.events.try_recv() {
                Ok(event) => batch.push(event),
                Err(_) => break,
            }
        }
        Ok(batch)
    }
}
