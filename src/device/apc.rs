//! AKAI APC mini over MIDI.

use std::sync::mpsc;

use midir::{Ignore, MidiInput, MidiInputConnection, MidiOutput, MidiOutputConnection};

use super::{APC_MINI_LED_COUNT, ChannelInput, DeviceError, NOTE_ON, PadEvent, PadOutput};
use crate::util::LedColor;

const CLIENT_NAME: &str = "padlife";

/// Keeps the input port open. Events stop flowing once this is dropped.
pub struct ApcSession {
    _input: MidiInputConnection<()>,
}

impl Drop for ApcSession {
    fn drop(&mut self) {
        log::info!("closed APC mini");
    }
}

pub struct ApcOutput {
    connection: MidiOutputConnection,
}

/// Opens the first input and output ports whose names contain `port_filter`
/// (case insensitive).
pub fn open(port_filter: &str) -> Result<(ApcOutput, ChannelInput, ApcSession), DeviceError> {
    let filter = port_filter.to_ascii_lowercase();

    let mut midi_in = MidiInput::new(CLIENT_NAME).map_err(|e| DeviceError::Init(e.to_string()))?;
    midi_in.ignore(Ignore::All);
    let in_port = midi_in
        .ports()
        .into_iter()
        .find(|p| {
            midi_in
                .port_name(p)
                .is_ok_and(|name| name.to_ascii_lowercase().contains(&filter))
        })
        .ok_or_else(|| DeviceError::Init(format!("no MIDI input matching {port_filter:?}")))?;

    let midi_out = MidiOutput::new(CLIENT_NAME).map_err(|e| DeviceError::Init(e.to_string()))?;
    let out_port = midi_out
        .ports()
        .into_iter()
        .find(|p| {
            midi_out
                .port_name(p)
                .is_ok_and(|name| name.to_ascii_lowercase().contains(&filter))
        })
        .ok_or_else(|| DeviceError::Init(format!("no MIDI output matching {port_filter:?}")))?;

    let (tx, rx) = mpsc::channel();
    let input = midi_in
        .connect(
            &in_port,
            "padlife-in",
            move |_stamp, message, _| {
                if let &[status, key, velocity] = message {
                    let _ = tx.send(PadEvent::from_midi(status, key, velocity));
                }
            },
            (),
        )
        .map_err(|e| DeviceError::Init(e.to_string()))?;
    let connection = midi_out
        .connect(&out_port, "padlife-out")
        .map_err(|e| DeviceError::Init(e.to_string()))?;

    log::info!("opened APC mini on ports matching {port_filter:?}");
    Ok((
        ApcOutput { connection },
        ChannelInput::new(rx),
        ApcSession { _input: input },
    ))
}

impl PadOutput for ApcOutput {
    fn clear_all(&mut self) -> Result<(), DeviceError> {
        for key in 0..APC_MINI_LED_COUNT {
            self.set_key(key, LedColor::OFF)?;
        }
        Ok(())
    }

    fn set_key(&mut self, key: u8, color: LedColor) -> Result<(), DeviceError> {
        self.connection
            .send(&[NOTE_ON, key, color.velocity()])
            .map_err(|e| DeviceError::Write(e.to_string()))
    }
}
