use crate::reading::Reading;
use crate::window::SlidingWindow;

/// Rule deciding whether a full window of readings shows a stall.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StallRule {
    /// Fires when the oldest reading exceeds the newest by at least `threshold`.
    DecreasingDelta { threshold: f64 },
    /// Fires when the spread of the whole window is at most `threshold`.
    RangePlateau { threshold: f64 },
}

/// What a rule measured when it fired.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StallMeasure {
    Drop { first: f64, last: f64, drop: f64 },
    Plateau { min: f64, max: f64, spread: f64 },
}

impl StallRule {
    pub fn threshold(&self) -> f64 {
        match *self {
            StallRule::DecreasingDelta { threshold } | StallRule::RangePlateau { threshold } => threshold,
        }
    }

    /// Evaluates the rule against `window`.
    ///
    /// Partial windows never stall. The window is only read, so repeated calls on
    /// the same contents give the same answer.
    #[inline(always)]
    pub fn evaluate(&self, window: &SlidingWindow<Reading>) -> Option<StallMeasure> {
        if !window.is_full() {
            return None;
        }
        match *self {
            StallRule::DecreasingDelta { threshold } => {
                let first = window.oldest()?.temperature;
                let last = window.newest()?.temperature;
                let drop = first - last;
                (drop >= threshold).then_some(StallMeasure::Drop { first, last, drop })
            }
            StallRule::RangePlateau { threshold } => {
                let (min, max) = window.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), r| {
                    (lo.min(r.temperature), hi.max(r.temperature))
                });
                let spread = max - min;
                (spread <= threshold).then_some(StallMeasure::Plateau { min, max, spread })
            }
        }
    }
}
