//! Reward shaping for neurofeedback loops
//!
//! Gates a per-update boolean reward signal with two optional behaviors:
//! dwell (the raw condition must hold for a minimum time before the output
//! turns on) and refractory (after an on→off transition, a minimum time must
//! pass before the next turn-on). A freeze flag (artifact veto) forces the
//! output off.

/// Dwell/refractory boolean gate.
#[derive(Debug, Clone)]
pub struct RewardShaper {
    dwell_seconds: f64,
    refractory_seconds: f64,
    dwell_accum_sec: f64,
    output_on: bool,
    last_off_time_sec: f64,
}

impl Default for RewardShaper {
    fn default() -> Self {
        Self {
            dwell_seconds: 0.0,
            refractory_seconds: 0.0,
            dwell_accum_sec: 0.0,
            output_on: false,
            last_off_time_sec: f64::NAN,
        }
    }
}

impl RewardShaper {
    pub fn new(dwell_seconds: f64, refractory_seconds: f64) -> Self {
        let mut s = Self::default();
        s.set_dwell_seconds(dwell_seconds);
        s.set_refractory_seconds(refractory_seconds);
        s
    }

    pub fn reset(&mut self) {
        self.dwell_accum_sec = 0.0;
        self.output_on = false;
        self.last_off_time_sec = f64::NAN;
    }

    pub fn set_dwell_seconds(&mut self, s: f64) {
        self.dwell_seconds = if s.is_finite() && s > 0.0 { s } else { 0.0 };
        if self.dwell_seconds == 0.0 {
            self.dwell_accum_sec = 0.0;
        }
    }

    pub fn set_refractory_seconds(&mut self, s: f64) {
        self.refractory_seconds = if s.is_finite() && s > 0.0 { s } else { 0.0 };
    }

    #[inline]
    pub fn dwell_seconds(&self) -> f64 {
        self.dwell_seconds
    }

    #[inline]
    pub fn refractory_seconds(&self) -> f64 {
        self.refractory_seconds
    }

    /// Update the gate and return the shaped reward.
    ///
    /// - `raw_reward`: the instantaneous reward condition.
    /// - `dt_seconds`: time since the previous update (accumulates dwell).
    /// - `t_end_sec`: current timestamp (anchors the refractory window).
    /// - `freeze`: force the output off and reset dwell (artifact veto).
    pub fn update(&mut self, raw_reward: bool, dt_seconds: f64, t_end_sec: f64, freeze: bool) -> bool {
        let dt = if dt_seconds.is_finite() && dt_seconds > 0.0 { dt_seconds } else { 0.0 };

        if freeze || !raw_reward {
            self.dwell_accum_sec = 0.0;
            if self.output_on && t_end_sec.is_finite() {
                self.last_off_time_sec = t_end_sec;
            }
            self.output_on = false;
            return false;
        }

        if self.dwell_seconds > 0.0 {
            self.dwell_accum_sec += dt;
            if self.dwell_accum_sec < self.dwell_seconds {
                self.output_on = false;
                return false;
            }
        }

        // Already on: stay on until the raw condition drops.
        if self.output_on {
            return true;
        }

        // Turning on: honor the refractory window since the last turn-off.
        if self.refractory_seconds > 0.0
            && self.last_off_time_sec.is_finite()
            && t_end_sec.is_finite()
        {
            let since = t_end_sec - self.last_off_time_sec;
            if !since.is_finite() || since < self.refractory_seconds {
                return false;
            }
        }

        self.output_on = true;
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_shaping_passes_through() {
        let mut rs = RewardShaper::new(0.0, 0.0);
        assert!(rs.update(true, 0.25, 0.25, false));
        assert!(!rs.update(false, 0.25, 0.5, false));
        assert!(rs.update(true, 0.25, 0.75, false));
    }

    #[test]
    fn test_dwell_delays_turn_on() {
        let mut rs = RewardShaper::new(0.5, 0.0);
        // First update accumulates 0.25s of dwell: not enough.
        assert!(!rs.update(true, 0.25, 0.25, false));
        // Second reaches 0.5s: on.
        assert!(rs.update(true, 0.25, 0.5, false));
    }

    #[test]
    fn test_dwell_resets_on_drop() {
        let mut rs = RewardShaper::new(0.5, 0.0);
        assert!(!rs.update(true, 0.25, 0.25, false));
        assert!(!rs.update(false, 0.25, 0.5, false));
        // Dwell restarts from zero.
        assert!(!rs.update(true, 0.25, 0.75, false));
        assert!(rs.update(true, 0.25, 1.0, false));
    }

    #[test]
    fn test_refractory_blocks_retrigger() {
        let mut rs = RewardShaper::new(0.0, 0.5);
        assert!(rs.update(true, 0.25, 0.25, false));
        // Turn off at t=0.5.
        assert!(!rs.update(false, 0.25, 0.5, false));
        // 0.25s later: still refractory.
        assert!(!rs.update(true, 0.25, 0.75, false));
        // Another 0.25s later: allowed again.
        assert!(rs.update(true, 0.25, 1.0, false));
    }

    #[test]
    fn test_freeze_forces_off_and_stamps_time() {
        let mut rs = RewardShaper::new(0.0, 0.5);
        assert!(rs.update(true, 0.25, 0.25, false));
        assert!(!rs.update(true, 0.25, 0.5, true));
        // The freeze-induced off-time anchors the refractory window.
        assert!(!rs.update(true, 0.25, 0.75, false));
        assert!(rs.update(true, 0.25, 1.0, false));
    }
}
