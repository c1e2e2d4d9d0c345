use crate::config::TrackerConfig;
use crate::tracker::PitchTracker;

/// A single point in a pitch contour: a timestamp and an optional
/// frequency. `None` means the frame was unvoiced (no detectable
/// pitch).
#[derive(Debug, Clone)]
pub struct PitchFrame {
    /// Time in seconds from the start of the audio.
    pub time: f32,
    /// Detected fundamental frequency, or None if unvoiced.
    pub frequency: Option<f32>,
}

/// Extract a pitch contour from a full recording.
///
/// Slices the audio into consecutive frames of the configured size and
/// runs one tracker over them in order, so the band filters stay
/// continuous across frame boundaries exactly as they would in a live
/// stream. The trailing partial frame, if any, is dropped.
pub fn extract_contour(samples: &[f32], config: &TrackerConfig) -> Vec<PitchFrame> {
    let mut tracker = PitchTracker::new(config);
    let frame_size = config.frames.frame_size;
    let sample_rate = config.detection.sample_rate as f32;

    let mut contour = Vec::new();
    let mut pos = 0;
    while pos + frame_size <= samples.len() {
        let time = pos as f32 / sample_rate;
        let obs = tracker.process_frame(&samples[pos..pos + frame_size]);
        contour.push(PitchFrame {
            time,
            frequency: obs.map(|o| o.pitch_hz),
        });
        pos += frame_size;
    }
    contour
}

/// Extract only the voiced frequencies from a pitch contour. Useful
/// for statistics where only detected frames matter.
pub fn voiced_frequencies(contour: &[PitchFrame]) -> Vec<f32> {
    contour.iter().filter_map(|frame| frame.frequency).collect()
}

/// Fraction of frames that are voiced (have a detected pitch).
/// Returns 0.0 for an empty contour.
pub fn voiced_fraction(contour: &[PitchFrame]) -> f32 {
    if contour.is_empty() {
        return 0.0;
    }
    let voiced = contour.iter().filter(|f| f.frequency.is_some()).count();
    voiced as f32 / contour.len() as f32
}
