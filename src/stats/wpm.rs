//! Words-per-minute smoothing and extrema

use serde::{Deserialize, Serialize};

use crate::utils::elapsed_ms;

/// Default time between two WPM samples
pub const DEFAULT_SAMPLE_INTERVAL_MS: u32 = 50;

/// Smoothing factor `num / den` of the exponential moving average
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmaFactor {
    num: u16,
    den: u16,
}

impl Default for EmaFactor {
    fn default() -> Self {
        Self { num: 1, den: 8 }
    }
}

impl EmaFactor {
    /// Factor in `(0, 1]`; `None` for a zero numerator or denominator or a
    /// fraction above one
    pub fn new(num: u16, den: u16) -> Option<Self> {
        if num == 0 || den == 0 || num > den {
            return None;
        }
        Some(Self { num, den })
    }

    pub fn num(&self) -> u16 {
        self.num
    }

    pub fn den(&self) -> u16 {
        self.den
    }

    /// One EMA step: `ema + floor(num * (sample - ema) / den)`.
    ///
    /// The difference is taken in `i32` so a falling sample moves the average
    /// down instead of wrapping, and the result is clamped back into `u16`.
    pub fn apply(&self, ema: u16, sample: u16) -> u16 {
        let delta = i32::from(sample) - i32::from(ema);
        let step = (i32::from(self.num) * delta).div_euclid(i32::from(self.den));
        (i32::from(ema) + step).clamp(0, i32::from(u16::MAX)) as u16
    }
}

/// Persisted WPM figures
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WpmStats {
    /// Highest sample ever seen
    pub max_wpm: u16,
    /// Smoothed average
    pub avg_wpm_ema: u16,
    /// Highest sample since the session started
    pub session_max_wpm: u16,
}

impl WpmStats {
    /// Fold one instantaneous sample in. Returns whether any figure changed.
    pub fn sample(&mut self, wpm: u16, factor: EmaFactor) -> bool {
        let mut changed = false;

        if wpm > self.max_wpm {
            self.max_wpm = wpm;
            changed = true;
        }
        if wpm > self.session_max_wpm {
            self.session_max_wpm = wpm;
            changed = true;
        }

        let ema = factor.apply(self.avg_wpm_ema, wpm);
        if ema != self.avg_wpm_ema {
            self.avg_wpm_ema = ema;
            changed = true;
        }

        changed
    }

    /// Only the session maximum is session scoped
    pub fn reset_session(&mut self) {
        self.session_max_wpm = 0;
    }
}

/// Fixed sampling cadence on the host's millisecond clock
#[derive(Debug, Clone, Copy)]
pub struct SampleClock {
    interval_ms: u32,
    last_sample: Option<u32>,
}

impl SampleClock {
    pub fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms: interval_ms.max(1),
            last_sample: None,
        }
    }

    pub fn interval_ms(&self) -> u32 {
        self.interval_ms
    }

    /// Start the cadence at `now`, so the first sample lands one interval later
    pub fn seed(&mut self, now: u32) {
        self.last_sample = Some(now);
    }

    /// Whether a sample is due at `now`; consumes the slot when it is
    pub fn poll(&mut self, now: u32) -> bool {
        match self.last_sample {
            Some(last) if elapsed_ms(now, last) < self.interval_ms => false,
            _ => {
                self.last_sample = Some(now);
                true
            }
        }
    }
}

impl Default for SampleClock {
    fn default() -> Self {
        Self::new(DEFAULT_SAMPLE_INTERVAL_MS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ema_rises_by_an_eighth() {
        let factor = EmaFactor::default();
        assert_eq!(factor.apply(0, 80), 10);
        assert_eq!(factor.apply(10, 80), 18);
    }

    #[test]
    fn ema_falls_without_wrapping() {
        let factor = EmaFactor::default();
        assert_eq!(factor.apply(80, 0), 70);
    }

    #[test]
    fn ema_floors_negative_steps() {
        // -1/8 floors to -1, so the average still reaches the sample
        let factor = EmaFactor::default();
        assert_eq!(factor.apply(41, 40), 40);
        // +7/8 floors to 0
        assert_eq!(factor.apply(40, 47), 40);
    }

    #[test]
    fn ema_factor_rejects_nonsense() {
        assert!(EmaFactor::new(0, 8).is_none());
        assert!(EmaFactor::new(1, 0).is_none());
        assert!(EmaFactor::new(9, 8).is_none());
        assert_eq!(EmaFactor::new(1, 1).map(|f| f.apply(3, 200)), Some(200));
    }

    #[test]
    fn sample_tracks_maxima() {
        let mut stats = WpmStats::default();
        assert!(stats.sample(90, EmaFactor::default()));
        assert_eq!(stats.max_wpm, 90);
        assert_eq!(stats.session_max_wpm, 90);

        stats.reset_session();
        stats.sample(40, EmaFactor::default());
        assert_eq!(stats.max_wpm, 90);
        assert_eq!(stats.session_max_wpm, 40);
    }

    #[test]
    fn zero_sample_on_zero_stats_is_unchanged() {
        let mut stats = WpmStats::default();
        assert!(!stats.sample(0, EmaFactor::default()));
    }

    #[test]
    fn sample_clock_cadence() {
        let mut clock = SampleClock::new(50);
        clock.seed(1_000);
        assert!(!clock.poll(1_010));
        assert!(!clock.poll(1_049));
        assert!(clock.poll(1_050));
        assert!(!clock.poll(1_060));
        assert!(clock.poll(1_100));
    }

    #[test]
    fn unseeded_clock_samples_immediately() {
        let mut clock = SampleClock::default();
        assert!(clock.poll(7));
    }
}
