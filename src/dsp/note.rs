/// Pitches below this cannot be mapped to a MIDI note; the conversion
/// returns `None` instead.
pub const MIN_VALID_PITCH_HZ: f32 = 20.0;

/// MIDI range with a standard piano keyboard: A0 through C8.
pub const MIN_PIANO_NOTE: i32 = 21;
pub const MAX_PIANO_NOTE: i32 = 108;

/// Reference point of the conversion: A1 = 55 Hz = MIDI note 33.
const REFERENCE_PITCH_HZ: f32 = 55.0;
const REFERENCE_MIDI_NOTE: f32 = 33.0;

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];
const FLAT_NAMES: [&str; 12] = [
    "C", "Db", "D", "Eb", "E", "F", "Gb", "G", "Ab", "A", "Bb", "B",
];

/// Fractional MIDI note for a pitch, without the validity gate.
/// `12 * log2(pitch / 55) + 33`, so 440 Hz lands exactly on 69 (A4).
pub(crate) fn midi_note_exact(pitch_hz: f32) -> f32 {
    12.0 * (pitch_hz / REFERENCE_PITCH_HZ).log2() + REFERENCE_MIDI_NOTE
}

/// Convert a pitch in Hz to a fractional MIDI note number.
///
/// Returns `None` below 20 Hz, where the logarithmic mapping stops
/// being meaningful for note tracking.
pub fn pitch_to_midi_note(pitch_hz: f32) -> Option<f32> {
    if pitch_hz < MIN_VALID_PITCH_HZ {
        return None;
    }
    Some(midi_note_exact(pitch_hz))
}

/// Convert a (possibly fractional) MIDI note number back to Hz.
pub fn midi_note_to_pitch(midi_note: f32) -> f32 {
    REFERENCE_PITCH_HZ * 2f32.powf((midi_note - REFERENCE_MIDI_NOTE) / 12.0)
}

/// Name of a MIDI note within the piano range (A0..C8), or `None`
/// outside it. `sharps` picks the sharp or flat spelling for the black
/// keys; `show_octave` appends the scientific octave number (MIDI 60
/// is C4).
pub fn note_name(midi_note: i32, sharps: bool, show_octave: bool) -> Option<String> {
    if !(MIN_PIANO_NOTE..=MAX_PIANO_NOTE).contains(&midi_note) {
        return None;
    }
    let names = if sharps { &SHARP_NAMES } else { &FLAT_NAMES };
    let name = names[(midi_note % 12) as usize];
    if show_octave {
        Some(format!("{}{}", name, midi_note / 12 - 1))
    } else {
        Some(name.to_string())
    }
}

/// A detected pitch resolved to its nearest MIDI note, with the
/// remaining offset in cents. This is the shape downstream note logic
/// consumes: the note says *which* key the singer is on, the cents say
/// how sharp or flat they are.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NoteObservation {
    /// Detected fundamental in Hz.
    pub pitch_hz: f32,
    /// Nearest MIDI note number.
    pub midi_note: i32,
    /// Signed offset from that note, -50..=50 cents.
    pub cents: i32,
}

impl NoteObservation {
    /// Resolve a pitch to a note/cents pair. `None` below 20 Hz.
    pub fn from_pitch(pitch_hz: f32) -> Option<Self> {
        let exact = pitch_to_midi_note(pitch_hz)?;
        let midi_note = exact.round() as i32;
        let cents = ((exact - midi_note as f32) * 100.0).round() as i32;
        Some(Self {
            pitch_hz,
            midi_note,
            cents,
        })
    }

    /// Note name with octave, or `None` outside the piano range.
    pub fn name(&self, sharps: bool) -> Option<String> {
        note_name(self.midi_note, sharps, true)
    }
}
