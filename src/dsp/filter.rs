use std::f64::consts::PI;

/// Number of frequency points sampled when normalizing the pass-band gain.
const GAIN_SWEEP_POINTS: usize = 1000;

/// Capacity of the streaming history buffers. Must be a power of two and
/// at least `MAX_ORDER + 1` so the recursion can always reach back far
/// enough without wrapping onto samples it still needs.
const HISTORY_LEN: usize = 32;
const HISTORY_MASK: usize = HISTORY_LEN - 1;

/// Highest supported recursion order.
const MAX_ORDER: usize = 16;

/// Tiny alternating offset mixed into the input history during buffer
/// filtering. Sustained near-zero input would otherwise drive the
/// recursion into denormal floats, which are dramatically slower on
/// most CPUs. The offset is far below the 16-bit noise floor.
const DENORMAL_OFFSET: f32 = 1e-15;

/// Analog prototype family for the filter design.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterPrototype {
    /// Maximally flat pass-band, no ripple.
    #[default]
    Butterworth,
    /// Steeper rolloff for the same order, at the cost of pass-band
    /// ripple controlled by `ripple_db`.
    Chebyshev,
}

/// Frequency response shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterKind {
    /// Passes frequencies below `freq_high`.
    #[default]
    LowPass,
    /// Passes frequencies above `freq_low`.
    HighPass,
    /// Passes frequencies between `freq_low` and `freq_high`.
    BandPass,
}

/// Filter design parameters.
///
/// `freq_low` and `freq_high` are band edges in Hz; which one matters
/// depends on `kind` (see [`FilterKind`]). `ripple_db` is only used by
/// the Chebyshev prototype.
#[derive(Debug, Clone, Copy)]
pub struct FilterSettings {
    pub prototype: FilterPrototype,
    pub kind: FilterKind,
    /// Recursion order, 1..=16. Band-pass designs round odd orders up
    /// to the next even order, since each prototype pole splits in two.
    pub order: usize,
    pub sample_rate: f32,
    pub freq_low: f32,
    pub freq_high: f32,
    pub ripple_db: f32,
}

impl Default for FilterSettings {
    fn default() -> Self {
        Self {
            prototype: FilterPrototype::Butterworth,
            kind: FilterKind::LowPass,
            order: 5,
            sample_rate: 44100.0,
            freq_low: 45.0,
            freq_high: 280.0,
            ripple_db: 0.5,
        }
    }
}

/// A recursive digital filter designed from a classic analog prototype,
/// usable as a continuous stream processor.
///
/// The design path is the textbook one: place the normalized analog
/// low-pass poles (Butterworth circle or Chebyshev ellipse), pre-warp
/// the cutoff with `tan(0.5 * PI * f1 / nyquist)` so the bilinear
/// transform lands the band edge on the requested digital frequency,
/// map to the z-plane, then reshape for high-pass (spectral inversion)
/// or band-pass (quadratic pole splitting). All sections are collapsed
/// into one order-N recursion, and the numerator is scaled so the
/// pass-band peak sits at exactly 0 dB.
///
/// Streaming state lives in two fixed 32-slot circular histories with
/// bitmask indexing, so the per-sample hot path is allocation-free.
/// One instance serves exactly one logical stream; calls must be
/// serialized per instance.
pub struct StreamingIirFilter {
    settings: FilterSettings,

    /// Feed-forward (numerator) coefficients, `designed_order + 1` long.
    a_coeff: Vec<f64>,
    /// Feedback (denominator) coefficients, monic: `b_coeff[0] == 1`.
    b_coeff: Vec<f64>,
    /// Order of the currently active recursion. May differ from the
    /// requested order (band-pass rounds up to even) and stays at its
    /// previous value when a redesign is rejected.
    designed_order: usize,
    /// Whether any valid design has ever been applied. Until then the
    /// filter passes input through unchanged.
    designed: bool,

    in_history: [f32; HISTORY_LEN],
    out_history: [f32; HISTORY_LEN],
    hist_idx: usize,
    /// Sign of the denormal-avoidance offset, flipped once per
    /// `filter_buffer` call.
    denormal_sign: f32,
}

impl StreamingIirFilter {
    /// Create a filter and design it from `settings`. If the settings
    /// are invalid the filter starts undesigned (identity passthrough);
    /// check [`is_designed`](Self::is_designed).
    pub fn new(settings: FilterSettings) -> Self {
        let mut filter = Self {
            settings,
            a_coeff: vec![1.0],
            b_coeff: vec![1.0],
            designed_order: 0,
            designed: false,
            in_history: [0.0; HISTORY_LEN],
            out_history: [0.0; HISTORY_LEN],
            hist_idx: 0,
            denormal_sign: 1.0,
        };
        filter.design();
        filter
    }

    /// Current design parameters.
    pub fn settings(&self) -> &FilterSettings {
        &self.settings
    }

    /// Whether a valid design has ever been applied.
    pub fn is_designed(&self) -> bool {
        self.designed
    }

    // Property setters. Each one triggers a full redesign; an invalid
    // combination leaves the previous coefficients in effect.

    pub fn set_order(&mut self, order: usize) -> bool {
        self.settings.order = order;
        self.design()
    }

    pub fn set_prototype(&mut self, prototype: FilterPrototype) -> bool {
        self.settings.prototype = prototype;
        self.design()
    }

    pub fn set_kind(&mut self, kind: FilterKind) -> bool {
        self.settings.kind = kind;
        self.design()
    }

    pub fn set_sample_rate(&mut self, sample_rate: f32) -> bool {
        self.settings.sample_rate = sample_rate;
        self.design()
    }

    pub fn set_freq_low(&mut self, freq_low: f32) -> bool {
        self.settings.freq_low = freq_low;
        self.design()
    }

    pub fn set_freq_high(&mut self, freq_high: f32) -> bool {
        self.settings.freq_high = freq_high;
        self.design()
    }

    pub fn set_ripple_db(&mut self, ripple_db: f32) -> bool {
        self.settings.ripple_db = ripple_db;
        self.design()
    }

    fn nyquist(&self) -> f64 {
        f64::from(self.settings.sample_rate) * 0.5
    }

    /// Band-pass needs an even pole count; everything else uses the
    /// requested order as-is.
    fn effective_order(&self) -> usize {
        match self.settings.kind {
            FilterKind::BandPass => (self.settings.order + 1) & !1,
            _ => self.settings.order,
        }
    }

    /// Check the type-specific ordering constraints on the parameters.
    pub fn config_is_valid(&self) -> bool {
        let s = &self.settings;
        if s.order < 1 || s.order > MAX_ORDER || !(s.sample_rate > 0.0) {
            return false;
        }
        let nyquist = self.nyquist() as f32;
        let edges_ok = match s.kind {
            FilterKind::LowPass => s.freq_high > 0.0 && s.freq_high < nyquist,
            FilterKind::HighPass => s.freq_low > 0.0 && s.freq_low < nyquist,
            FilterKind::BandPass => {
                s.freq_low > 0.0 && s.freq_low < s.freq_high && s.freq_high < nyquist
            }
        };
        let ripple_ok = match s.prototype {
            FilterPrototype::Butterworth => true,
            FilterPrototype::Chebyshev => s.ripple_db > 0.0,
        };
        edges_ok && ripple_ok
    }

    /// Compute the recursion coefficients for the current settings.
    ///
    /// Returns `false` (leaving any prior design untouched) when the
    /// parameters fail validation, so a misconfigured setter can never
    /// corrupt a filter that is already streaming.
    pub fn design(&mut self) -> bool {
        if !self.config_is_valid() {
            return false;
        }

        let order = self.effective_order();
        let proto_order = match self.settings.kind {
            FilterKind::BandPass => order / 2,
            _ => order,
        };
        let nyquist = self.nyquist();

        // Eigenfrequency of the low-pass prototype. High-pass designs a
        // low-pass at the mirrored edge and spectrally inverts it;
        // band-pass designs a low-pass whose cutoff is the bandwidth
        // and splits each pole around the band center.
        let f1 = match self.settings.kind {
            FilterKind::LowPass => f64::from(self.settings.freq_high),
            FilterKind::HighPass => nyquist - f64::from(self.settings.freq_low),
            FilterKind::BandPass => {
                f64::from(self.settings.freq_high) - f64::from(self.settings.freq_low)
            }
        };
        // Pre-warp so the bilinear transform maps the analog cutoff
        // onto the requested digital frequency.
        let warped = (0.5 * PI * f1 / nyquist).tan();

        // Normalized analog low-pass poles, scaled by the warped cutoff
        // and mapped to the z-plane. Conjugate pairs are represented by
        // their upper-half-plane member; an odd prototype contributes
        // one real pole.
        let pair_poles: Vec<Complex> = (0..proto_order / 2)
            .map(|k| {
                let phi = PI * (2 * k + 1) as f64 / (2 * proto_order) as f64;
                let s = self.prototype_pole(phi).scale(warped);
                bilinear(s)
            })
            .collect();
        let real_pole = if proto_order % 2 == 1 {
            // The middle pole sits on the negative real axis.
            let s = self.prototype_pole(PI * 0.5).scale(warped);
            Some(bilinear(s).re)
        } else {
            None
        };

        let mut num = vec![1.0f64];
        let mut den = vec![1.0f64];

        match self.settings.kind {
            FilterKind::LowPass => {
                for p in &pair_poles {
                    convolve(&mut den, &[1.0, -2.0 * p.re, p.norm_sqr()]);
                }
                if let Some(p) = real_pole {
                    convolve(&mut den, &[1.0, -p]);
                }
                // All zeros at z = -1 (the images of the analog zeros
                // at infinity under the bilinear transform).
                for _ in 0..order {
                    convolve(&mut num, &[1.0, 1.0]);
                }
            }
            FilterKind::HighPass => {
                // Spectral inversion z -> -z: negate the real part of
                // every pole pair and move the zeros to z = +1. The
                // low-pass cutoff at `f1` lands at `nyquist - f1`,
                // which is exactly `freq_low`.
                for p in &pair_poles {
                    convolve(&mut den, &[1.0, 2.0 * p.re, p.norm_sqr()]);
                }
                if let Some(p) = real_pole {
                    convolve(&mut den, &[1.0, p]);
                }
                for _ in 0..order {
                    convolve(&mut num, &[1.0, -1.0]);
                }
            }
            FilterKind::BandPass => {
                // Quadratic substitution: every low-pass pole p becomes
                // the root pair of z^2 - alpha*(1 + p)*z + p, where
                // alpha is the band-center ratio. Complex prototype
                // poles yield two sections (one per root, paired with
                // its conjugate from the mirrored prototype pole); the
                // real pole's quadratic already has real coefficients.
                let alpha = self.band_center_ratio(nyquist);
                for p in &pair_poles {
                    let (r1, r2) = split_bandpass_pole(*p, alpha);
                    convolve(&mut den, &[1.0, -2.0 * r1.re, r1.norm_sqr()]);
                    convolve(&mut den, &[1.0, -2.0 * r2.re, r2.norm_sqr()]);
                }
                if let Some(p) = real_pole {
                    convolve(&mut den, &[1.0, -alpha * (1.0 + p), p]);
                }
                // Half the zeros at z = +1, half at z = -1.
                for _ in 0..order / 2 {
                    convolve(&mut num, &[1.0, 0.0, -1.0]);
                }
            }
        }

        self.a_coeff = num;
        self.b_coeff = den;
        self.designed_order = order;
        self.designed = true;
        // Not optional: the raw cascade has an arbitrary pass-band
        // level, so every design ends by pulling the peak to 0 dB.
        self.normalize_gain();
        true
    }

    /// Normalized analog low-pass pole at angle `phi` from the positive
    /// imaginary axis. Butterworth poles sit on the unit circle;
    /// Chebyshev poles sit on an ellipse whose eccentricity follows
    /// from the ripple specification.
    fn prototype_pole(&self, phi: f64) -> Complex {
        match self.settings.prototype {
            FilterPrototype::Butterworth => Complex::new(-phi.sin(), phi.cos()),
            FilterPrototype::Chebyshev => {
                let eps = (10f64.powf(f64::from(self.settings.ripple_db) / 10.0) - 1.0).sqrt();
                let proto_order = match self.settings.kind {
                    FilterKind::BandPass => self.effective_order() / 2,
                    _ => self.effective_order(),
                };
                let mu = (1.0 / eps).asinh() / proto_order as f64;
                Complex::new(-mu.sinh() * phi.sin(), mu.cosh() * phi.cos())
            }
        }
    }

    /// Band-center ratio `cos(f4 + f5) / cos(f5 - f4)` where `f4`/`f5`
    /// are the half-angles of the digital band edges. This is the
    /// `alpha` of the digital low-pass-to-band-pass substitution; the
    /// band center lands at `acos(alpha)`.
    fn band_center_ratio(&self, nyquist: f64) -> f64 {
        let f4 = 0.5 * PI * f64::from(self.settings.freq_low) / nyquist;
        let f5 = 0.5 * PI * f64::from(self.settings.freq_high) / nyquist;
        (f4 + f5).cos() / (f5 - f4).cos()
    }

    /// Sample the magnitude response at `points` frequencies spread
    /// uniformly from DC to Nyquist (endpoints nudged inward so the
    /// response is evaluated strictly inside the band). Returns linear
    /// magnitudes.
    pub fn filter_gain(&self, points: usize) -> Vec<f32> {
        (0..points)
            .map(|i| {
                let theta = (PI * i as f64 / (points - 1) as f64)
                    .clamp(PI * 1e-4, PI * (1.0 - 1e-4));
                self.magnitude_at_theta(theta) as f32
            })
            .collect()
    }

    /// Magnitude response at `freq` Hz.
    pub fn gain_at(&self, freq: f32) -> f32 {
        let theta = (PI * f64::from(freq) / self.nyquist()).clamp(PI * 1e-4, PI * (1.0 - 1e-4));
        self.magnitude_at_theta(theta) as f32
    }

    /// |A(e^-jw)| / |B(e^-jw)| evaluated from the coefficient arrays.
    fn magnitude_at_theta(&self, theta: f64) -> f64 {
        let mut num_re = 0.0;
        let mut num_im = 0.0;
        let mut den_re = 0.0;
        let mut den_im = 0.0;
        for k in 0..=self.designed_order {
            let (sin_k, cos_k) = (k as f64 * theta).sin_cos();
            num_re += self.a_coeff[k] * cos_k;
            num_im -= self.a_coeff[k] * sin_k;
            den_re += self.b_coeff[k] * cos_k;
            den_im -= self.b_coeff[k] * sin_k;
        }
        let num = num_re * num_re + num_im * num_im;
        let den = den_re * den_re + den_im * den_im;
        if den > 0.0 {
            (num / den).sqrt()
        } else {
            0.0
        }
    }

    /// Scale the feed-forward coefficients so the pass-band peak sits
    /// at exactly 0 dB.
    ///
    /// `design` always ends with this call; calling it directly also
    /// rescales the coefficients. Once a design is normalized the peak
    /// is already 0 dB, so repeating the call is a no-op rescale.
    pub fn normalize_gain(&mut self) {
        let peak_db = self
            .filter_gain(GAIN_SWEEP_POINTS)
            .into_iter()
            .map(|g| 20.0 * f64::from(g.max(1e-20)).log10())
            .fold(f64::NEG_INFINITY, f64::max);
        if !peak_db.is_finite() {
            return;
        }
        let scale = 10f64.powf(-peak_db / 20.0);
        for a in &mut self.a_coeff {
            *a *= scale;
        }
    }

    /// Run one sample through the direct-form recursion.
    pub fn filter_sample(&mut self, input: f32) -> f32 {
        self.run_sample(input)
    }

    /// Filter `src` into `dst` (same length), maintaining streaming
    /// history across calls.
    ///
    /// A tiny alternating-sign offset is mixed into the input history
    /// each call to keep sustained near-silence out of denormal
    /// territory; the sign flips per call, not per sample.
    pub fn filter_buffer(&mut self, src: &[f32], dst: &mut [f32]) {
        assert_eq!(
            src.len(),
            dst.len(),
            "filter_buffer requires equal-length source and destination"
        );
        self.denormal_sign = -self.denormal_sign;
        let offset = self.denormal_sign * DENORMAL_OFFSET;
        for (out, &x) in dst.iter_mut().zip(src.iter()) {
            *out = self.run_sample(x + offset);
        }
    }

    fn run_sample(&mut self, input: f32) -> f32 {
        self.in_history[self.hist_idx] = input;
        let mut acc = 0.0f64;
        for k in 0..=self.designed_order {
            let idx = (self.hist_idx + HISTORY_LEN - k) & HISTORY_MASK;
            acc += self.a_coeff[k] * f64::from(self.in_history[idx]);
        }
        for k in 1..=self.designed_order {
            let idx = (self.hist_idx + HISTORY_LEN - k) & HISTORY_MASK;
            acc -= self.b_coeff[k] * f64::from(self.out_history[idx]);
        }
        let y = acc as f32;
        self.out_history[self.hist_idx] = y;
        self.hist_idx = (self.hist_idx + 1) & HISTORY_MASK;
        y
    }

    /// Clear the streaming history. The next sample behaves as if the
    /// filter had just been constructed.
    pub fn reset(&mut self) {
        self.in_history = [0.0; HISTORY_LEN];
        self.out_history = [0.0; HISTORY_LEN];
        self.hist_idx = 0;
    }

    /// Seed the history with `start` instead of zero, so a stream that
    /// begins at a nonzero level does not produce a click. Low-pass
    /// filters (unity DC gain) seed the output history too; other
    /// types would settle to zero anyway, so their output history is
    /// cleared.
    pub fn reset_to(&mut self, start: f32) {
        self.in_history = [start; HISTORY_LEN];
        self.out_history = match self.settings.kind {
            FilterKind::LowPass => [start; HISTORY_LEN],
            _ => [0.0; HISTORY_LEN],
        };
        self.hist_idx = 0;
    }
}

/// Bilinear transform of an analog pole: z = (1 + s) / (1 - s).
fn bilinear(s: Complex) -> Complex {
    Complex::new(1.0 + s.re, s.im).div(Complex::new(1.0 - s.re, -s.im))
}

/// Roots of `z^2 - alpha*(1 + p)*z + p`, the band-pass image of the
/// low-pass pole `p`. The two roots are not conjugates of each other;
/// each pairs with its conjugate from the mirrored prototype pole.
fn split_bandpass_pole(p: Complex, alpha: f64) -> (Complex, Complex) {
    let b = Complex::new(1.0 + p.re, p.im).scale(alpha);
    let disc = b.mul(b).sub(p.scale(4.0)).sqrt();
    let r1 = b.add(disc).scale(0.5);
    let r2 = b.sub(disc).scale(0.5);
    (r1, r2)
}

/// Multiply the running polynomial by `factor` (coefficients in
/// ascending powers of z^-1, both monic in practice).
fn convolve(poly: &mut Vec<f64>, factor: &[f64]) {
    let mut out = vec![0.0; poly.len() + factor.len() - 1];
    for (i, &p) in poly.iter().enumerate() {
        for (j, &f) in factor.iter().enumerate() {
            out[i + j] += p * f;
        }
    }
    *poly = out;
}

/// Minimal complex arithmetic for pole bookkeeping. Only the handful
/// of operations the design path needs.
#[derive(Debug, Clone, Copy)]
struct Complex {
    re: f64,
    im: f64,
}

impl Complex {
    fn new(re: f64, im: f64) -> Self {
        Self { re, im }
    }

    fn add(self, o: Self) -> Self {
        Self::new(self.re + o.re, self.im + o.im)
    }

    fn sub(self, o: Self) -> Self {
        Self::new(self.re - o.re, self.im - o.im)
    }

    fn mul(self, o: Self) -> Self {
        Self::new(
            self.re * o.re - self.im * o.im,
            self.re * o.im + self.im * o.re,
        )
    }

    fn div(self, o: Self) -> Self {
        let d = o.re * o.re + o.im * o.im;
        Self::new(
            (self.re * o.re + self.im * o.im) / d,
            (self.im * o.re - self.re * o.im) / d,
        )
    }

    fn scale(self, k: f64) -> Self {
        Self::new(self.re * k, self.im * k)
    }

    fn norm_sqr(self) -> f64 {
        self.re * self.re + self.im * self.im
    }

    /// Principal square root.
    fn sqrt(self) -> Self {
        let r = self.re.hypot(self.im).sqrt();
        let half_angle = self.im.atan2(self.re) * 0.5;
        Self::new(r * half_angle.cos(), r * half_angle.sin())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI as PI32;

    const SR: f32 = 44100.0;

    fn lowpass(order: usize, cutoff: f32) -> StreamingIirFilter {
        StreamingIirFilter::new(FilterSettings {
            kind: FilterKind::LowPass,
            order,
            freq_high: cutoff,
            sample_rate: SR,
            ..FilterSettings::default()
        })
    }

    fn highpass(order: usize, cutoff: f32) -> StreamingIirFilter {
        StreamingIirFilter::new(FilterSettings {
            kind: FilterKind::HighPass,
            order,
            freq_low: cutoff,
            sample_rate: SR,
            ..FilterSettings::default()
        })
    }

    fn bandpass(order: usize, low: f32, high: f32) -> StreamingIirFilter {
        StreamingIirFilter::new(FilterSettings {
            kind: FilterKind::BandPass,
            order,
            freq_low: low,
            freq_high: high,
            sample_rate: SR,
            ..FilterSettings::default()
        })
    }

    fn chebyshev(kind: FilterKind, order: usize, low: f32, high: f32) -> StreamingIirFilter {
        StreamingIirFilter::new(FilterSettings {
            prototype: FilterPrototype::Chebyshev,
            kind,
            order,
            freq_low: low,
            freq_high: high,
            ripple_db: 1.0,
            sample_rate: SR,
        })
    }

    /// Every valid design must normalize its pass-band peak to 0 dB.
    #[test]
    fn gain_normalizes_to_zero_db() {
        let mut filters: Vec<StreamingIirFilter> = Vec::new();
        for order in 1..=16 {
            filters.push(lowpass(order, 1000.0));
            filters.push(highpass(order, 1000.0));
            filters.push(bandpass(order, 300.0, 1200.0));
            filters.push(chebyshev(FilterKind::LowPass, order, 0.0, 1000.0));
            filters.push(chebyshev(FilterKind::HighPass, order, 1000.0, 0.0));
            filters.push(chebyshev(FilterKind::BandPass, order, 300.0, 1200.0));
        }
        for f in &filters {
            assert!(f.is_designed());
            let peak = f
                .filter_gain(1000)
                .into_iter()
                .fold(f32::MIN, f32::max);
            assert!(
                (peak - 1.0).abs() < 1e-3,
                "{:?} order {} peak should be 0 dB, got {peak}",
                f.settings().kind,
                f.settings().order,
            );
        }
    }

    #[test]
    fn lowpass_response_shape() {
        let f = lowpass(5, 280.0);
        assert!(f.gain_at(50.0) > 0.99, "pass-band should be flat");
        assert!(f.gain_at(280.0) > 0.6 && f.gain_at(280.0) < 0.8, "edge near -3 dB");
        assert!(f.gain_at(2800.0) < 1e-4, "a decade up should be buried");
    }

    #[test]
    fn highpass_response_shape() {
        let f = highpass(5, 280.0);
        assert!(f.gain_at(2000.0) > 0.99);
        assert!(f.gain_at(280.0) > 0.6 && f.gain_at(280.0) < 0.8);
        assert!(f.gain_at(28.0) < 1e-4);
    }

    #[test]
    fn bandpass_response_shape() {
        let f = bandpass(4, 300.0, 1200.0);
        // Band center at acos(alpha), which is the geometric-ish middle.
        assert!(f.gain_at(600.0) > 0.9, "mid-band should pass");
        assert!(f.gain_at(30.0) < 0.02, "well below the band");
        assert!(f.gain_at(12000.0) < 0.02, "well above the band");
    }

    #[test]
    fn bandpass_rounds_order_up_to_even() {
        let f = bandpass(5, 300.0, 1200.0);
        assert_eq!(f.designed_order, 6);
        assert_eq!(f.a_coeff.len(), 7);
        assert_eq!(f.b_coeff.len(), 7);
    }

    #[test]
    fn chebyshev_rolls_off_steeper_than_butterworth() {
        let b = lowpass(4, 500.0);
        let c = chebyshev(FilterKind::LowPass, 4, 0.0, 500.0);
        assert!(
            c.gain_at(1000.0) < b.gain_at(1000.0),
            "chebyshev {} vs butterworth {}",
            c.gain_at(1000.0),
            b.gain_at(1000.0)
        );
    }

    /// A unit impulse must produce a bounded, decaying response for
    /// every supported order/prototype/type combination.
    #[test]
    fn impulse_response_is_stable() {
        let mut filters: Vec<StreamingIirFilter> = Vec::new();
        for order in 1..=16 {
            filters.push(lowpass(order, 2000.0));
            filters.push(highpass(order, 2000.0));
            filters.push(bandpass(order, 400.0, 1600.0));
            filters.push(chebyshev(FilterKind::LowPass, order, 0.0, 2000.0));
            filters.push(chebyshev(FilterKind::HighPass, order, 2000.0, 0.0));
            filters.push(chebyshev(FilterKind::BandPass, order, 400.0, 1600.0));
        }
        for f in &mut filters {
            let kind = f.settings().kind;
            let order = f.settings().order;
            let mut peak = 0.0f32;
            let mut tail = 0.0f32;
            for n in 0..12288 {
                let x = if n == 0 { 1.0 } else { 0.0 };
                let y = f.filter_sample(x);
                assert!(y.is_finite(), "{kind:?} order {order} output not finite");
                peak = peak.max(y.abs());
                if n >= 11264 {
                    tail = tail.max(y.abs());
                }
            }
            assert!(
                tail < 0.02 * peak.max(1e-6),
                "{kind:?} order {order} impulse response should decay: tail {tail}, peak {peak}"
            );
        }
    }

    #[test]
    fn lowpass_passes_dc() {
        let mut f = lowpass(5, 1000.0);
        let mut y = 0.0;
        for _ in 0..8192 {
            y = f.filter_sample(1.0);
        }
        assert!((y - 1.0).abs() < 0.01, "LP should settle to unity on DC, got {y}");
    }

    #[test]
    fn highpass_blocks_dc() {
        let mut f = highpass(5, 1000.0);
        let mut y = 1.0;
        for _ in 0..8192 {
            y = f.filter_sample(1.0);
        }
        assert!(y.abs() < 0.01, "HP should reject DC, got {y}");
    }

    /// Measured sine gain through the streaming path should agree with
    /// the analytic response the normalization is based on.
    #[test]
    fn streamed_sine_gain_matches_analytic_response() {
        for &freq in &[100.0f32, 280.0, 800.0] {
            let mut f = lowpass(5, 280.0);
            let n = SR as usize;
            let mut peak = 0.0f32;
            for i in 0..n {
                let x = (2.0 * PI32 * freq * i as f32 / SR).sin();
                let y = f.filter_sample(x);
                // Skip the transient before measuring.
                if i > n / 2 {
                    peak = peak.max(y.abs());
                }
            }
            let expected = f.gain_at(freq);
            assert!(
                (peak - expected).abs() < 0.02,
                "{freq} Hz: streamed peak {peak} vs analytic {expected}"
            );
        }
    }

    #[test]
    fn invalid_design_keeps_prior_coefficients() {
        let mut f = lowpass(5, 1000.0);
        let before = f.a_coeff.clone();
        // Band edge beyond Nyquist is invalid; the old design stays.
        assert!(!f.set_freq_high(SR));
        assert_eq!(f.a_coeff, before);
        assert!(f.is_designed());
        // A valid setter change takes effect again.
        assert!(f.set_freq_high(500.0));
        assert_ne!(f.a_coeff, before);
    }

    #[test]
    fn never_designed_filter_passes_through() {
        let f = StreamingIirFilter::new(FilterSettings {
            order: 0,
            ..FilterSettings::default()
        });
        assert!(!f.is_designed());
        let mut f = f;
        assert_eq!(f.filter_sample(0.25), 0.25);
    }

    #[test]
    fn order_bounds_are_enforced() {
        let mut f = lowpass(5, 1000.0);
        assert!(!f.set_order(0));
        assert!(!f.set_order(17));
        assert!(f.set_order(16));
    }

    #[test]
    fn reset_is_idempotent_and_matches_fresh_filter() {
        let noise: Vec<f32> = (0..256).map(|i| ((i * 7919) % 101) as f32 / 50.0 - 1.0).collect();

        let mut used = lowpass(5, 500.0);
        let mut scratch = vec![0.0; noise.len()];
        used.filter_buffer(&noise, &mut scratch);
        used.reset();
        used.reset();

        let mut fresh = lowpass(5, 500.0);
        let mut out_used = vec![0.0; noise.len()];
        let mut out_fresh = vec![0.0; noise.len()];
        used.filter_buffer(&noise, &mut out_used);
        fresh.filter_buffer(&noise, &mut out_fresh);

        for i in 0..noise.len() {
            assert!(
                (out_used[i] - out_fresh[i]).abs() < 1e-6,
                "reset filter should match fresh filter at sample {i}"
            );
        }
    }

    #[test]
    fn reset_to_seeds_lowpass_without_transient() {
        let mut f = lowpass(5, 500.0);
        f.reset_to(0.5);
        // A constant input equal to the seed should come out already
        // settled; no click at stream start.
        for _ in 0..64 {
            let y = f.filter_sample(0.5);
            assert!((y - 0.5).abs() < 1e-3, "seeded LP should stay settled, got {y}");
        }
    }

    #[test]
    fn reset_to_clears_output_history_for_highpass() {
        let mut f = highpass(5, 500.0);
        f.reset_to(0.5);
        // The seeded input history means the DC step is already in the
        // past; a high-pass should output near zero, not a click.
        let y = f.filter_sample(0.5);
        assert!(y.abs() < 0.05, "seeded HP should not click, got {y}");
    }

    #[test]
    #[should_panic(expected = "equal-length")]
    fn mismatched_buffer_lengths_panic() {
        let mut f = lowpass(5, 500.0);
        let src = [0.0f32; 8];
        let mut dst = [0.0f32; 4];
        f.filter_buffer(&src, &mut dst);
    }

    #[test]
    fn normalize_gain_is_stable_when_repeated() {
        let mut f = lowpass(5, 500.0);
        let before = f.a_coeff.clone();
        f.normalize_gain();
        for (a, b) in f.a_coeff.iter().zip(before.iter()) {
            assert!((a - b).abs() < 1e-9, "re-normalizing a normalized design should not move it");
        }
    }
}
