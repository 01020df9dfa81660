//! Press-to-press sequence analysis: finger reuse, rolls, alternation and rhythm

use crate::matrix::{Finger, Hand};
use crate::utils::elapsed_ms;

/// Gaps longer than this are pauses, not typing rhythm
pub const RHYTHM_PAUSE_MS: u32 = 2_000;

/// How a press relates to the one before it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Different key, same finger of the same hand
    SameFinger,
    /// Same hand, neighbouring fingers
    Roll,
    /// Left to right or right to left
    Alternation,
    /// Anything else, including the first press and unknown hands
    Other,
}

/// Running population variance (Welford)
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Rhythm {
    samples: u32,
    mean: f64,
    m2: f64,
}

impl Rhythm {
    pub fn push(&mut self, interval_ms: u32) {
        self.samples = self.samples.saturating_add(1);
        let x = f64::from(interval_ms);
        let delta = x - self.mean;
        self.mean += delta / f64::from(self.samples);
        self.m2 += delta * (x - self.mean);
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    pub fn mean_ms(&self) -> f64 {
        self.mean
    }

    /// Population variance in ms², 0.0 with fewer than two intervals
    pub fn variance(&self) -> f64 {
        if self.samples < 2 {
            return 0.0;
        }
        self.m2 / f64::from(self.samples)
    }
}

/// Transient state between consecutive presses; never persisted
#[derive(Debug, Clone, Copy, Default)]
pub struct SequenceTracker {
    last_key: Option<(u16, Option<(Hand, Finger)>)>,
    last_press_ms: Option<u32>,
    rhythm: Rhythm,
}

impl SequenceTracker {
    /// Classify a press against the previous one and remember it
    pub fn observe(
        &mut self,
        index: u16,
        finger: Option<(Hand, Finger)>,
        timestamp: u32,
    ) -> Transition {
        if let Some(last) = self.last_press_ms {
            let gap = elapsed_ms(timestamp, last);
            if gap <= RHYTHM_PAUSE_MS {
                self.rhythm.push(gap);
            }
        }
        self.last_press_ms = Some(timestamp);

        let previous = self.last_key.replace((index, finger));
        let Some((prev_index, prev_finger)) = previous else {
            return Transition::Other;
        };

        match (prev_finger, finger) {
            (Some((h1, _)), Some((h2, _))) if h1 != h2 => Transition::Alternation,
            (Some((_, f1)), Some((_, f2))) if f1 == f2 && prev_index != index => {
                Transition::SameFinger
            }
            (Some((_, f1)), Some((_, f2))) if (f1 as i8 - f2 as i8).abs() == 1 => Transition::Roll,
            _ => Transition::Other,
        }
    }

    pub fn rhythm(&self) -> &Rhythm {
        &self.rhythm
    }

    /// Rhythm is session scoped; the previous key carries over
    pub fn reset_session(&mut self) {
        self.rhythm = Rhythm::default();
        self.last_press_ms = None;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
