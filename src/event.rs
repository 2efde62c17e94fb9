// src/event.rs

use crate::host::RuntimeUnit;

/// Channel whose messages are dropped entirely (General MIDI percussion).
pub const SUPPRESSED_CHANNEL: u8 = 9;

const NOTE_OFF: u8 = 0x8;
const NOTE_ON: u8 = 0x9;
const CONTROL_CHANGE: u8 = 0xB;
const PITCH_BEND: u8 = 0xE;

/// ===============================
/// Decoded MIDI events
/// ===============================

/// A channel message the running unit understands.
///
/// These events:
/// - are decoded from raw bytes exactly once
/// - carry the original 7-bit data (pitch bend is combined to 14 bits)
/// - are dispatched straight to the unit, never queued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MidiEvent {
    NoteOn { channel: u8, note: u8, velocity: u8 },

    NoteOff { channel: u8, note: u8, velocity: u8 },

    ControlChange { channel: u8, controller: u8, value: u8 },

    /// `value` is `msb * 128 + lsb`, centre 8192.
    PitchBend { channel: u8, value: u16 },
}

impl MidiEvent {
    /// Decode one raw message.
    ///
    /// Messages shorter than three bytes, messages on the suppressed channel
    /// and commands other than note on/off, control change and pitch bend
    /// yield `None`. A note-on with zero velocity is a note-off.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        let [status, data1, data2, ..] = *bytes else {
            return None;
        };

        let cmd = status >> 4;
        let channel = status & 0x0F;
        if channel == SUPPRESSED_CHANNEL {
            return None;
        }

        match cmd {
            NOTE_OFF => Some(MidiEvent::NoteOff {
                channel,
                note: data1,
                velocity: data2,
            }),
            NOTE_ON if data2 == 0 => Some(MidiEvent::NoteOff {
                channel,
                note: data1,
                velocity: data2,
            }),
            NOTE_ON => Some(MidiEvent::NoteOn {
                channel,
                note: data1,
                velocity: data2,
            }),
            CONTROL_CHANGE => Some(MidiEvent::ControlChange {
                channel,
                controller: data1,
                value: data2,
            }),
            PITCH_BEND => Some(MidiEvent::PitchBend {
                channel,
                value: u16::from(data2) * 128 + u16::from(data1),
            }),
            _ => None,
        }
    }

    pub fn channel(&self) -> u8 {
        match *self {
            MidiEvent::NoteOn { channel, .. }
            | MidiEvent::NoteOff { channel, .. }
            | MidiEvent::ControlChange { channel, .. }
            | MidiEvent::PitchBend { channel, .. } => channel,
        }
    }

    /// Forward this event to a running unit.
    pub fn dispatch(&self, unit: &dyn RuntimeUnit) {
        match *self {
            MidiEvent::NoteOn {
                channel,
                note,
                velocity,
            } => unit.key_on(channel, note, velocity),
            MidiEvent::NoteOff {
                channel,
                note,
                velocity,
            } => unit.key_off(channel, note, velocity),
            MidiEvent::ControlChange {
                channel,
                controller,
                value,
            } => unit.ctrl_change(channel, controller, value),
            MidiEvent::PitchBend { channel, value } => unit.pitch_wheel(channel, value),
        }
    }
}
