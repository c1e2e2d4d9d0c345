//! # pitchtrack
//!
//! Frame-by-frame fundamental-frequency estimation for a monophonic
//! vocal signal, built for singing evaluation: upstream capture hands
//! this crate fixed-size sample buffers, and downstream note logic
//! receives a pitch in Hz (or silence) plus its MIDI note and cents
//! offset.
//!
//! Two pieces do the real work and can be used on their own:
//!
//! * [`dsp::filter::StreamingIirFilter`] — a configurable streaming
//!   IIR filter (Butterworth/Chebyshev prototypes; low-, high- and
//!   band-pass) designed via the bilinear transform.
//! * [`dsp::pitch::PitchEstimator`] — a coarse-to-fine pitch search
//!   over two band-filtered views of the same window, with hill-climb
//!   refinement, Hermite-interpolated fine scanning, and continuity
//!   hysteresis across frames.
//!
//! [`tracker::PitchTracker`] wires both together for the common case,
//! and [`analysis`] runs a tracker over a whole recording to produce a
//! pitch contour.
//!
//! # Example
//! ```
//! use pitchtrack::config::TrackerConfig;
//! use pitchtrack::tracker::PitchTracker;
//!
//! let config = TrackerConfig::default();
//! let mut tracker = PitchTracker::new(&config);
//!
//! // Three consecutive 93 ms frames of A3 (220 Hz) at 44.1 kHz.
//! let samples: Vec<f32> = (0..3 * 4096)
//!     .map(|i| 0.4 * (2.0 * std::f32::consts::PI * 220.0 * i as f32 / 44100.0).sin())
//!     .collect();
//!
//! let mut note = None;
//! for frame in samples.chunks_exact(4096) {
//!     note = tracker.process_frame(frame);
//! }
//!
//! let note = note.expect("a clean tone should be detected");
//! assert_eq!(note.midi_note, 57); // A3
//! assert!((note.pitch_hz - 220.0).abs() < 2.2);
//! ```

pub mod analysis;
pub mod config;
pub mod dsp;
pub mod tracker;
pub mod wav;

pub use dsp::note::NoteObservation;
pub use tracker::PitchTracker;
