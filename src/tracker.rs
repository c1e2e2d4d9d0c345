use crate::config::TrackerConfig;
use crate::dsp::filter::StreamingIirFilter;
use crate::dsp::note::NoteObservation;
use crate::dsp::pitch::{EstimatorConfig, PitchEstimator};

/// Per-stream pitch tracking pipeline: band-splitting filters plus the
/// coarse-to-fine estimator.
///
/// Each capture frame is filtered into two views of the same window —
/// a low band that keeps fundamentals below the detection crossover
/// while shedding their harmonics, and a high band covering the rest
/// of the singing range — and the estimator scores candidates against
/// whichever band they belong to. Each band is a high-pass stage (kills
/// rumble and handling noise) into a low-pass stage.
///
/// The filters and the estimator all carry state between frames, so a
/// tracker serves exactly one stream: one microphone, one tracker.
/// Frames must be consecutive; call [`reset`](Self::reset) when the
/// stream stops or seeks.
pub struct PitchTracker {
    low_hp: StreamingIirFilter,
    low_lp: StreamingIirFilter,
    high_hp: StreamingIirFilter,
    high_lp: StreamingIirFilter,
    estimator: PitchEstimator,
    band_lo: Vec<f32>,
    band_hi: Vec<f32>,
    scratch: Vec<f32>,
}

impl PitchTracker {
    /// Build the pipeline. Scratch buffers are sized for the configured
    /// frame size up front, so processing frames up to that size never
    /// allocates.
    pub fn new(config: &TrackerConfig) -> Self {
        let sample_rate = config.detection.sample_rate as f32;
        let capacity = config.frames.frame_size;
        Self {
            low_hp: StreamingIirFilter::new(config.bands.low.highpass_settings(sample_rate)),
            low_lp: StreamingIirFilter::new(config.bands.low.lowpass_settings(sample_rate)),
            high_hp: StreamingIirFilter::new(config.bands.high.highpass_settings(sample_rate)),
            high_lp: StreamingIirFilter::new(config.bands.high.lowpass_settings(sample_rate)),
            estimator: PitchEstimator::new(&EstimatorConfig::from(&config.detection)),
            band_lo: Vec::with_capacity(capacity),
            band_hi: Vec::with_capacity(capacity),
            scratch: Vec::with_capacity(capacity),
        }
    }

    pub fn estimator(&self) -> &PitchEstimator {
        &self.estimator
    }

    /// Filter one capture frame into both bands and run the estimator.
    ///
    /// Returns the detected note, or `None` when the frame is silent
    /// or ambiguous. Frames are assumed to be consecutive samples of
    /// one stream; the filter histories carry across calls.
    pub fn process_frame(&mut self, frame: &[f32]) -> Option<NoteObservation> {
        let n = frame.len();
        if n == 0 {
            return None;
        }
        self.scratch.resize(n, 0.0);
        self.band_lo.resize(n, 0.0);
        self.band_hi.resize(n, 0.0);

        self.low_hp.filter_buffer(frame, &mut self.scratch);
        self.low_lp.filter_buffer(&self.scratch, &mut self.band_lo);
        self.high_hp.filter_buffer(frame, &mut self.scratch);
        self.high_lp.filter_buffer(&self.scratch, &mut self.band_hi);

        let pitch = self.estimator.detect_pitch(&self.band_lo, &self.band_hi, n);
        if pitch > 0.0 {
            NoteObservation::from_pitch(pitch)
        } else {
            None
        }
    }

    /// Clear all filter histories and the estimator's continuity state,
    /// e.g. on stream start/stop, so stale state cannot color the next
    /// frame and restarting produces no transient click.
    pub fn reset(&mut self) {
        self.low_hp.reset();
        self.low_lp.reset();
        self.high_hp.reset();
        self.high_lp.reset();
        self.estimator.reset();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    const SR: f32 = 44100.0;
    const FRAME: usize = 4096;

    fn tracker() -> PitchTracker {
        PitchTracker::new(&TrackerConfig::default())
    }

    /// Phase-continuous sine covering `frames` whole frames.
    fn sine_stream(freq: f32, frames: usize, amplitude: f32) -> Vec<f32> {
        (0..frames * FRAME)
            .map(|i| amplitude * (2.0 * PI * freq * i as f32 / SR).sin())
            .collect()
    }

    /// Feed a stream frame by frame and return the last observation.
    fn track_stream(tracker: &mut PitchTracker, samples: &[f32]) -> Option<NoteObservation> {
        let mut last = None;
        for frame in samples.chunks_exact(FRAME) {
            last = tracker.process_frame(frame);
        }
        last
    }

    #[test]
    fn tracks_a3_through_the_low_band() {
        let mut t = tracker();
        // 220 Hz sits below the crossover, so this exercises the
        // high-pass + low-pass low-band chain.
        let obs = track_stream(&mut t, &sine_stream(220.0, 3, 0.4))
            .expect("a clean 220 Hz tone should be detected");
        assert!(
            (obs.pitch_hz - 220.0).abs() < 2.2,
            "expected ~220 Hz, got {:.2}",
            obs.pitch_hz
        );
        assert_eq!(obs.midi_note, 57, "220 Hz is A3");
        assert!(obs.cents.abs() <= 20, "cents offset too large: {}", obs.cents);
    }

    #[test]
    fn tracks_a4_through_the_high_band() {
        let mut t = tracker();
        let obs = track_stream(&mut t, &sine_stream(440.0, 3, 0.4))
            .expect("a clean 440 Hz tone should be detected");
        assert!(
            (obs.pitch_hz - 440.0).abs() < 4.4,
            "expected ~440 Hz, got {:.2}",
            obs.pitch_hz
        );
        assert_eq!(obs.midi_note, 69, "440 Hz is A4");
    }

    #[test]
    fn silence_yields_no_observation() {
        let mut t = tracker();
        let silence = vec![0.0f32; FRAME];
        assert!(t.process_frame(&silence).is_none());
    }

    #[test]
    fn empty_frame_is_a_no_op() {
        let mut t = tracker();
        assert!(t.process_frame(&[]).is_none());
    }

    #[test]
    fn reset_matches_a_fresh_tracker() {
        let stream = sine_stream(330.0, 3, 0.4);

        let mut used = tracker();
        // Pollute the filter histories with an unrelated tone, then
        // reset.
        track_stream(&mut used, &sine_stream(110.0, 2, 0.4));
        used.reset();

        let mut fresh = tracker();
        let from_used = track_stream(&mut used, &stream).expect("detection after reset");
        let from_fresh = track_stream(&mut fresh, &stream).expect("detection when fresh");

        assert!(
            (from_used.pitch_hz - from_fresh.pitch_hz).abs() < 0.01,
            "reset tracker {:.3} Hz vs fresh tracker {:.3} Hz",
            from_used.pitch_hz,
            from_fresh.pitch_hz
        );
    }

    #[test]
    fn tone_after_silence_is_reacquired() {
        let mut t = tracker();
        let tone = sine_stream(220.0, 3, 0.4);
        assert!(track_stream(&mut t, &tone).is_some());

        let silence = vec![0.0f32; 2 * FRAME];
        assert!(track_stream(&mut t, &silence).is_none());

        assert!(
            track_stream(&mut t, &tone).is_some(),
            "detection should come back after a silent gap"
        );
    }

    #[test]
    fn wav_recording_round_trips_through_the_tracker() {
        // End-to-end: synthesize a tone, store it as a 16-bit WAV the
        // way a recording would be, load it back, and track it.
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a4.wav");

        let samples = sine_stream(440.0, 4, 0.4);
        let spec = crate::wav::recording_spec(SR as u32);
        let mut writer = hound::WavWriter::create(&path, spec).unwrap();
        for &s in &samples {
            writer.write_sample((s * i16::MAX as f32) as i16).unwrap();
        }
        writer.finalize().unwrap();

        let (loaded, loaded_spec) = crate::wav::load_samples(&path).unwrap();
        assert_eq!(loaded_spec.sample_rate, SR as u32);

        let mut t = tracker();
        let obs = track_stream(&mut t, &loaded).expect("detection from the loaded WAV");
        assert!(
            (obs.pitch_hz - 440.0).abs() < 4.4,
            "expected ~440 Hz from WAV, got {:.2}",
            obs.pitch_hz
        );
    }
}
