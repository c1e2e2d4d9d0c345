use super::note;

/// Logarithmic resolution of the coarse candidate table.
const COARSE_STEPS_PER_OCTAVE: f32 = 96.0;

/// The coarse pass probes every 8th bin; the similarity peak of a real
/// voice is far wider than that, so nothing is skipped over.
const COARSE_SCAN_STEP: usize = 8;

/// Semitones of slack added above and below the configured pitch range
/// so peaks right at the range edge still have neighbors to compare
/// against.
const GUARD_SEMITONES: i32 = 2;

/// Candidates below this frequency are measured on the low-band buffer,
/// candidates above it on the high-band buffer.
const CROSSOVER_HZ: f32 = 250.0;

/// Bins cleared on each side of the crossover when the scan first
/// switches to the low band, so a hill-climb straddling the boundary
/// never mixes ratios measured on different buffers.
const CROSSOVER_CLEAR_BINS: usize = 11;

/// A coarse probe above this ratio is worth refining with a hill-climb.
const RATIO_CLIMB_THRESHOLD: f32 = 200.0;

/// A refined peak below this ratio is too weak to be a pitch.
const RATIO_PEAK_THRESHOLD: f32 = 600.0;

/// A peak needs this many bins of table on both sides before its shape
/// can be judged.
const PEAK_MARGIN_BINS: usize = 6;

/// Distance of the shoulder bins used for the pointiness score.
const POINTINESS_SHOULDER: usize = 5;

/// Minimum peak-to-shoulder sharpness, and the relaxed value granted
/// when the peak continues the previous frame's pitch.
const POINTINESS_STRICT: f32 = 1.5;
const POINTINESS_CONTINUITY: f32 = 1.2;

/// How close (in coarse bins) the previous frame's pitch must be for
/// the continuity relaxation to apply.
const CONTINUITY_BINS: usize = 10;

/// Fine-search window: 31 candidates spaced 0.5% apart, centered on
/// the coarse bin.
const FINE_STEPS: usize = 31;
const FINE_STEP_RATIO: f32 = 1.005;
const FINE_CENTER: usize = 15;

/// Shortest usable similarity window, in samples.
const MIN_COMPARE_LEN: usize = 16;

/// Pitch estimator configuration.
pub struct EstimatorConfig {
    pub sample_rate: f32,

    /// Lowest detectable fundamental in Hz. Must be at least 20 Hz
    /// (the MIDI conversion's validity floor).
    pub min_pitch_hz: f32,

    /// Highest detectable fundamental in Hz.
    pub max_pitch_hz: f32,

    /// A frame with no sample reaching this absolute level is treated
    /// as silence and skipped entirely.
    pub detect_level_threshold: f32,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100.0,
            // 50 Hz reaches below a bass singer's range; 1600 Hz covers
            // soprano territory with headroom.
            min_pitch_hz: 50.0,
            max_pitch_hz: 1600.0,
            detect_level_threshold: 0.01,
        }
    }
}

/// Coarse-to-fine pitch estimator for a single monophonic stream.
///
/// Works on two parallel views of the same audio window: a low-band
/// buffer used for candidates below ~250 Hz and a high-band buffer for
/// candidates above it. Each frame is scanned against a precomputed
/// logarithmic table of candidate periods; a normalized self-similarity
/// ratio scores each candidate, a halving-direction hill-climb locks
/// onto the local peak, and a Hermite-interpolated fine pass with a
/// log-domain parabolic fit recovers the frequency to sub-bin accuracy.
///
/// The only state carried between frames is the coarse bin of the last
/// detected pitch, which relaxes the peak-sharpness requirement for a
/// continuing note. Everything else is per-call scratch, so one
/// estimator serves exactly one stream and calls must be serialized.
pub struct PitchEstimator {
    sample_rate: f32,
    min_pitch_hz: f32,
    max_pitch_hz: f32,
    detect_level_threshold: f32,

    /// MIDI bounds of the detection range, guard band included.
    min_note: i32,
    max_note: i32,

    /// Quarter fractions (1/4 .. 4/4) of the period at `min_pitch_hz`;
    /// the similarity window for a candidate is the shortest fraction
    /// spanning two of its periods.
    block_lens: [usize; 4],

    /// Candidate frequencies, highest first, 96 steps per octave, with
    /// the matching periods in samples.
    coarse_freqs: Vec<f32>,
    coarse_periods: Vec<f32>,

    /// First bin at or below the band crossover frequency.
    crossover_idx: usize,

    /// Frequency multipliers of the fine-search window, 1.005^(k - 15)
    /// for k in 0..31.
    fine_steps: [f32; FINE_STEPS],

    /// Per-frame cache of coarse similarity ratios (0.0 = not yet
    /// computed this frame).
    detect_curve: Vec<f32>,

    /// Per-fine-search cache of Hermite similarity ratios.
    fine_peaks: [f32; FINE_STEPS],

    /// Coarse bin of the previous frame's detected pitch; 0 means no
    /// previous pitch. Continuity relaxation therefore requires a
    /// nonzero index.
    prev_pitch_idx: usize,
}

impl PitchEstimator {
    /// Build the estimator and its candidate tables. All buffers are
    /// sized here and never reallocated.
    ///
    /// # Panics
    /// If the configured range is empty, below 20 Hz, or the sample
    /// rate is not positive.
    pub fn new(config: &EstimatorConfig) -> Self {
        assert!(config.sample_rate > 0.0, "sample rate must be positive");
        assert!(
            config.min_pitch_hz >= 20.0 && config.min_pitch_hz < config.max_pitch_hz,
            "pitch range must be ordered and start at 20 Hz or above"
        );

        let min_note = note::midi_note_exact(config.min_pitch_hz).round() as i32 - GUARD_SEMITONES;
        let max_note = note::midi_note_exact(config.max_pitch_hz).round() as i32 + GUARD_SEMITONES;
        let top_freq = note::midi_note_to_pitch(max_note as f32);
        let bottom_freq = note::midi_note_to_pitch(min_note as f32);

        let steps = ((top_freq / bottom_freq).log2() * COARSE_STEPS_PER_OCTAVE).ceil() as usize + 1;
        let coarse_freqs: Vec<f32> = (0..steps)
            .map(|i| top_freq * 2f32.powf(-(i as f32) / COARSE_STEPS_PER_OCTAVE))
            .collect();
        let coarse_periods: Vec<f32> =
            coarse_freqs.iter().map(|&f| config.sample_rate / f).collect();
        let crossover_idx = coarse_freqs
            .iter()
            .position(|&f| f <= CROSSOVER_HZ)
            .unwrap_or(steps);

        let block_len = config.sample_rate / config.min_pitch_hz;
        let block_lens = [
            (block_len * 0.25) as usize,
            (block_len * 0.5) as usize,
            (block_len * 0.75) as usize,
            block_len as usize,
        ];

        let mut fine_steps = [0.0f32; FINE_STEPS];
        for (k, step) in fine_steps.iter_mut().enumerate() {
            *step = FINE_STEP_RATIO.powi(k as i32 - FINE_CENTER as i32);
        }

        Self {
            sample_rate: config.sample_rate,
            min_pitch_hz: config.min_pitch_hz,
            max_pitch_hz: config.max_pitch_hz,
            detect_level_threshold: config.detect_level_threshold,
            min_note,
            max_note,
            block_lens,
            fine_steps,
            detect_curve: vec![0.0; steps],
            coarse_freqs,
            coarse_periods,
            crossover_idx,
            fine_peaks: [0.0; FINE_STEPS],
            prev_pitch_idx: 0,
        }
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn min_pitch_hz(&self) -> f32 {
        self.min_pitch_hz
    }

    pub fn max_pitch_hz(&self) -> f32 {
        self.max_pitch_hz
    }

    /// MIDI range covered by the candidate table (guard band included).
    pub fn note_range(&self) -> (i32, i32) {
        (self.min_note, self.max_note)
    }

    /// Frequency of a MIDI note, clamped to the configured ceiling.
    pub fn midi_note_to_pitch(&self, midi_note: f32) -> f32 {
        note::midi_note_to_pitch(midi_note).min(self.max_pitch_hz)
    }

    /// Forget the previous frame's pitch, e.g. when the input stream
    /// restarts. The next detection starts without a continuity bonus.
    pub fn reset(&mut self) {
        self.prev_pitch_idx = 0;
        self.detect_curve.iter_mut().for_each(|v| *v = 0.0);
    }

    /// Estimate the fundamental frequency of one frame.
    ///
    /// `samples_lo` and `samples_hi` are the same time window filtered
    /// into a low and a high band; only the first `num_samples` of each
    /// are read. Returns the pitch in Hz, or 0.0 when the frame is
    /// silent or no candidate is convincing.
    ///
    /// # Panics
    /// If either buffer is shorter than `num_samples`.
    pub fn detect_pitch(
        &mut self,
        samples_lo: &[f32],
        samples_hi: &[f32],
        num_samples: usize,
    ) -> f32 {
        assert!(
            samples_lo.len() >= num_samples && samples_hi.len() >= num_samples,
            "detect_pitch buffers must hold at least num_samples samples"
        );

        // Silence fast-path: nothing in either band reaches the
        // detection level, so skip the scan entirely.
        let threshold = self.detect_level_threshold;
        let has_signal = samples_lo[..num_samples]
            .iter()
            .chain(samples_hi[..num_samples].iter())
            .any(|s| s.abs() >= threshold);
        if !has_signal {
            self.prev_pitch_idx = 0;
            return 0.0;
        }

        self.detect_curve.iter_mut().for_each(|v| *v = 0.0);
        let mut low_band_cleared = false;
        let last = self.coarse_freqs.len() - 1;

        // High-to-low frequency scan: the first qualifying peak wins,
        // which keeps an octave-below alias (also perfectly periodic)
        // from shadowing the true pitch.
        let mut idx = 0;
        while idx < self.coarse_freqs.len() {
            let ratio =
                self.coarse_ratio(idx, samples_lo, samples_hi, num_samples, &mut low_band_cleared);

            if ratio > RATIO_CLIMB_THRESHOLD {
                let mut climb = HillClimb::new(idx, ratio, 0, last);
                while let Some(cand) = climb.candidate() {
                    let v = self.coarse_ratio(
                        cand,
                        samples_lo,
                        samples_hi,
                        num_samples,
                        &mut low_band_cleared,
                    );
                    climb.advance(cand, v);
                }
                let (peak_idx, peak_ratio) = climb.peak();

                let has_margin =
                    peak_idx >= PEAK_MARGIN_BINS && peak_idx + PEAK_MARGIN_BINS <= last;
                if peak_ratio > RATIO_PEAK_THRESHOLD && has_margin {
                    let left = self.coarse_ratio(
                        peak_idx - POINTINESS_SHOULDER,
                        samples_lo,
                        samples_hi,
                        num_samples,
                        &mut low_band_cleared,
                    );
                    let right = self.coarse_ratio(
                        peak_idx + POINTINESS_SHOULDER,
                        samples_lo,
                        samples_hi,
                        num_samples,
                        &mut low_band_cleared,
                    );
                    let pointiness = 2.0 * peak_ratio / (left + right);

                    if pointiness >= self.required_pointiness(peak_idx) {
                        let buf = if peak_idx >= self.crossover_idx {
                            samples_lo
                        } else {
                            samples_hi
                        };
                        let pitch = self.fine_search(peak_idx, buf, num_samples);
                        if pitch > 1.0 {
                            self.prev_pitch_idx = peak_idx;
                            return pitch;
                        }
                    }
                }
            }

            idx += COARSE_SCAN_STEP;
        }

        self.prev_pitch_idx = 0;
        0.0
    }

    /// Sharpness a peak must show before it is accepted. A peak that
    /// continues the previous frame's pitch gets the relaxed value;
    /// index 0 is the "no previous pitch" sentinel and never grants it.
    fn required_pointiness(&self, peak_idx: usize) -> f32 {
        if self.prev_pitch_idx > 0 && peak_idx.abs_diff(self.prev_pitch_idx) <= CONTINUITY_BINS {
            POINTINESS_CONTINUITY
        } else {
            POINTINESS_STRICT
        }
    }

    /// Cached coarse similarity ratio at `idx`, measured on the band
    /// buffer the bin belongs to. The first time the scan enters
    /// low-band territory, a window around the crossover is dropped
    /// from the cache so values measured on the high band cannot leak
    /// into a low-band hill-climb.
    fn coarse_ratio(
        &mut self,
        idx: usize,
        samples_lo: &[f32],
        samples_hi: &[f32],
        num_samples: usize,
        low_band_cleared: &mut bool,
    ) -> f32 {
        let use_low = idx >= self.crossover_idx;
        if use_low && !*low_band_cleared {
            let start = self.crossover_idx.saturating_sub(CROSSOVER_CLEAR_BINS);
            let end = (self.crossover_idx + CROSSOVER_CLEAR_BINS).min(self.detect_curve.len() - 1);
            for v in &mut self.detect_curve[start..=end] {
                *v = 0.0;
            }
            *low_band_cleared = true;
        }

        if self.detect_curve[idx] > 0.0 {
            return self.detect_curve[idx];
        }

        let buf = if use_low { samples_lo } else { samples_hi };
        let ratio =
            similarity_ratio_linear(buf, num_samples, self.coarse_periods[idx], &self.block_lens);
        self.detect_curve[idx] = ratio;
        ratio
    }

    /// Refine a coarse peak to sub-bin accuracy.
    ///
    /// Thirty-one candidates spaced 0.5% apart around the coarse bin
    /// are scored with Hermite-interpolated similarity and climbed the
    /// same way as the coarse pass. The winner and its two neighbors
    /// are then fitted with a parabola in the log10 domain (after
    /// subtracting an estimated noise floor, so the logarithm never
    /// sees a near-zero value) to place the peak between bins. Returns
    /// 0.0 when no interior peak is bracketed.
    fn fine_search(&mut self, coarse_idx: usize, buf: &[f32], num_samples: usize) -> f32 {
        self.fine_peaks = [0.0; FINE_STEPS];
        let base_freq = self.coarse_freqs[coarse_idx];

        let center = self.fine_ratio(FINE_CENTER, base_freq, buf, num_samples);
        let mut climb = HillClimb::new(FINE_CENTER, center, 0, FINE_STEPS - 1);
        while let Some(cand) = climb.candidate() {
            let v = self.fine_ratio(cand, base_freq, buf, num_samples);
            climb.advance(cand, v);
        }
        let (peak_idx, peak_value) = climb.peak();
        if peak_idx == 0 || peak_idx == FINE_STEPS - 1 {
            return 0.0;
        }

        let left = self.fine_ratio(peak_idx - 1, base_freq, buf, num_samples);
        let right = self.fine_ratio(peak_idx + 1, base_freq, buf, num_samples);
        if peak_value <= left || peak_value <= right {
            return 0.0;
        }

        // Noise floor: just under the lower neighbor, so the smallest
        // log argument is 1/32 of that neighbor rather than zero.
        let floor = {
            let m = left.min(right);
            m - m / 32.0
        };
        let y1 = f64::from(left - floor).max(1e-12).log10();
        let y2 = f64::from(peak_value - floor).max(1e-12).log10();
        let y3 = f64::from(right - floor).max(1e-12).log10();
        let denom = 2.0 * (2.0 * y2 - y1 - y3);
        let offset = if denom.abs() > 1e-12 {
            ((y3 - y1) / denom) as f32
        } else {
            0.0
        };

        base_freq * self.fine_steps[peak_idx] * FINE_STEP_RATIO.powf(offset)
    }

    /// Cached Hermite similarity at fine step `k`.
    fn fine_ratio(&mut self, k: usize, base_freq: f32, buf: &[f32], num_samples: usize) -> f32 {
        if self.fine_peaks[k] > 0.0 {
            return self.fine_peaks[k];
        }
        let freq = base_freq * self.fine_steps[k];
        let period = self.sample_rate / freq;
        let ratio = similarity_ratio_hermite(buf, num_samples, period, &self.block_lens);
        self.fine_peaks[k] = ratio;
        ratio
    }
}

/// Halving-direction peak search over a discrete curve.
///
/// The climb starts with a +4 step. A probe that fails to improve on
/// the current position halves the step and flips its sign; when the
/// step collapses to zero, the current position is the bracketed peak.
/// Progress is bounded: improving probes each visit a new bin, and
/// every failure strictly shrinks the step.
#[derive(Debug)]
struct HillClimb {
    pos: usize,
    value: f32,
    dir: i32,
    lo: usize,
    hi: usize,
}

impl HillClimb {
    fn new(start: usize, value: f32, lo: usize, hi: usize) -> Self {
        Self {
            pos: start,
            value,
            dir: 4,
            lo,
            hi,
        }
    }

    /// Next index to evaluate, or `None` once the peak is bracketed.
    fn candidate(&mut self) -> Option<usize> {
        while self.dir != 0 {
            let cand =
                (self.pos as i64 + i64::from(self.dir)).clamp(self.lo as i64, self.hi as i64)
                    as usize;
            if cand != self.pos {
                return Some(cand);
            }
            // Pinned against a boundary counts as a failed probe.
            self.dir = -(self.dir / 2);
        }
        None
    }

    /// Feed back the value measured at the candidate index.
    fn advance(&mut self, idx: usize, value: f32) {
        if value > self.value {
            self.pos = idx;
            self.value = value;
        } else {
            self.dir = -(self.dir / 2);
        }
    }

    fn peak(&self) -> (usize, f32) {
        (self.pos, self.value)
    }
}

/// Similarity window for a candidate period: the shortest block-length
/// fraction spanning two periods, clamped so the shifted read (plus
/// interpolation lookahead) stays inside the frame.
fn compare_len(period: f32, num_samples: usize, block_lens: &[usize; 4]) -> usize {
    let needed = (2.0 * period).ceil() as usize;
    let mut len = block_lens[3];
    for &b in block_lens {
        if b >= needed {
            len = b;
            break;
        }
    }
    let lookahead = period.ceil() as usize + 3;
    len.min(num_samples.saturating_sub(lookahead))
}

/// Normalized self-similarity at a (fractional) candidate period,
/// using linear interpolation for the shifted copy.
///
/// The score is `100 * (sum|x| + sum|shifted|) / (0.01 + sum|x - shifted|)`:
/// a perfectly periodic signal drives the difference term toward zero
/// and the ratio sky-high, while uncorrelated content keeps it near
/// 100-150 regardless of level, since numerator and denominator scale
/// together.
fn similarity_ratio_linear(
    buf: &[f32],
    num_samples: usize,
    period: f32,
    block_lens: &[usize; 4],
) -> f32 {
    let len = compare_len(period, num_samples, block_lens);
    if len < MIN_COMPARE_LEN {
        return 0.0;
    }
    let whole = period as usize;
    let frac = period - whole as f32;

    let mut level = 0.0f64;
    let mut diff = 0.0f64;
    for i in 0..len {
        let a = buf[i];
        let j = i + whole;
        let b = buf[j] + (buf[j + 1] - buf[j]) * frac;
        level += f64::from(a.abs()) + f64::from(b.abs());
        diff += f64::from((a - b).abs());
    }
    (100.0 * level / (0.01 + diff)) as f32
}

/// Same score as [`similarity_ratio_linear`], but the shifted copy is
/// read through 4-point, 3rd-order Hermite interpolation. Linear
/// interpolation low-passes the shifted copy slightly, which is fine
/// for ranking coarse bins but biases the sub-bin fit; the cubic
/// kernel tracks the waveform closely enough for the fine pass.
fn similarity_ratio_hermite(
    buf: &[f32],
    num_samples: usize,
    period: f32,
    block_lens: &[usize; 4],
) -> f32 {
    let len = compare_len(period, num_samples, block_lens);
    if len < MIN_COMPARE_LEN {
        return 0.0;
    }
    let whole = period as usize;
    if whole < 1 {
        return 0.0;
    }
    let frac = period - whole as f32;

    let mut level = 0.0f64;
    let mut diff = 0.0f64;
    for i in 0..len {
        let a = buf[i];
        let j = i + whole;
        let b = hermite(buf[j - 1], buf[j], buf[j + 1], buf[j + 2], frac);
        level += f64::from(a.abs()) + f64::from(b.abs());
        diff += f64::from((a - b).abs());
    }
    (100.0 * level / (0.01 + diff)) as f32
}

/// 4-point, 3rd-order Hermite interpolation between `x0` and `x1`
/// (`t` in [0, 1)), with `xm1` and `x2` as the outer support points.
fn hermite(xm1: f32, x0: f32, x1: f32, x2: f32, t: f32) -> f32 {
    let c = 0.5 * (x1 - xm1);
    let v = x0 - x1;
    let w = c + v;
    let a = w + v + 0.5 * (x2 - x0);
    let b = w + a;
    ((a * t - b) * t + c) * t + x0
}
