// Gain adaptation policies for the adaptive PID controller
// Copyright © 2025 Hs293Go
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the "Software"),
// to deal in the Software without restriction, including without limitation
// the rights to use, copy, modify, merge, publish, distribute, sublicense,
// and/or sell copies of the Software, and to permit persons to whom the
// Software is furnished to do so, subject to the following conditions:
//
// The above copyright notice and this permission notice shall be included
// in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES
// OF MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT.
// IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM,
// DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION OF CONTRACT,
// TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE
// OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use num_traits::float::FloatCore;

use crate::constant;
use crate::pid::{ConfigError, Gains};

/// A policy that proposes new gains from the latest two error samples.
///
/// The controller only consults the strategy once it has a non-zero previous error, and clamps
/// whatever the strategy returns into the configured gain limits. Returning `None` keeps the
/// prior gains for this step.
///
/// Any `Fn(Gains<F>, F, F) -> Option<Gains<F>>` closure is a strategy.
pub trait TuningStrategy<F> {
    /// Proposes the gains for the next step.
    fn adapt(&self, gains: Gains<F>, error: F, previous_error: F) -> Option<Gains<F>>;
}

impl<F, G> TuningStrategy<F> for G
where
    G: Fn(Gains<F>, F, F) -> Option<Gains<F>>,
{
    fn adapt(&self, gains: Gains<F>, error: F, previous_error: F) -> Option<Gains<F>> {
        self(gains, error, previous_error)
    }
}

/// Never changes the gains, turning the adaptive controller into a classic fixed-gain PID.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FixedGains;

impl<F> TuningStrategy<F> for FixedGains {
    fn adapt(&self, _gains: Gains<F>, _error: F, _previous_error: F) -> Option<Gains<F>> {
        None
    }
}

/// The default tuning heuristic: scales each gain by a bounded fraction of the relative change
/// in error magnitude.
///
/// With `relative = (|e| - |e_prev|) / |e_prev|`, the raw adjustment is
///
/// - `relax_rate * relative` while the error shrinks faster than the dead band,
/// - `flat_boost` while the error magnitude stays within the dead band,
/// - `growth_rate * relative` while the error grows faster than the dead band.
///
/// Each gain then moves by `base * clamp(weight * raw, -max_step, max_step)`, where `base` is the
/// gain itself when relaxing and `max(g, gain_floor)` when raising. Since `max_step` is below
/// one, a gain never changes sign, shrinking errors relax the gains geometrically towards the
/// lower gain limit, and persistent errors push them up towards the upper one. The floor lets a
/// gain that sits at zero come back.
///
/// This is an approximation of a self-tuning law, tuned to converge smoothly on geometrically
/// decaying errors, not an identification method. Use [`crate::relay`] to measure starting gains.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RelativeErrorTuner<F> {
    /// Defaults to 0.25.
    relax_rate: F,
    /// Defaults to 0.5.
    growth_rate: F,
    /// Defaults to 0.02.
    flat_boost: F,
    /// Defaults to 0.02.
    deadband: F,
    /// Defaults to 0.25.
    max_step: F,
    /// Defaults to kp = 1.0, ki = 0.25, kd = 0.5.
    weights: Gains<F>,
    /// Smallest base an upward adjustment scales. Defaults to 0.01.
    gain_floor: F,
}

impl<F: FloatCore> Default for RelativeErrorTuner<F> {
    fn default() -> Self {
        RelativeErrorTuner {
            relax_rate: constant(0.25),
            growth_rate: constant(0.5),
            flat_boost: constant(0.02),
            deadband: constant(0.02),
            max_step: constant(0.25),
            weights: Gains::new(F::one(), constant(0.25), constant(0.5)),
            gain_floor: constant(0.01),
        }
    }
}

fn non_negative<F: FloatCore>(value: F) -> Result<F, ConfigError> {
    if value.is_finite() && value >= F::zero() {
        Ok(value)
    } else {
        Err(ConfigError::InvalidTuningParameter)
    }
}

impl<F: FloatCore> RelativeErrorTuner<F> {
    /// Returns the rate at which shrinking errors relax the gains.
    pub fn relax_rate(&self) -> F {
        self.relax_rate
    }

    /// Returns the rate at which growing errors raise the gains.
    pub fn growth_rate(&self) -> F {
        self.growth_rate
    }

    /// Returns the adjustment applied while the error magnitude stays flat.
    pub fn flat_boost(&self) -> F {
        self.flat_boost
    }

    /// Returns the relative change below which the error counts as flat.
    pub fn deadband(&self) -> F {
        self.deadband
    }

    /// Returns the largest fraction by which a gain may change in one step.
    pub fn max_step(&self) -> F {
        self.max_step
    }

    /// Returns the per-gain weights of the raw adjustment.
    pub fn weights(&self) -> Gains<F> {
        self.weights
    }

    /// Returns the smallest base an upward adjustment scales.
    pub fn gain_floor(&self) -> F {
        self.gain_floor
    }

    /// Sets the relax rate. Must be finite and non-negative.
    pub fn set_relax_rate(&mut self, relax_rate: F) -> Result<(), ConfigError> {
        self.relax_rate = non_negative(relax_rate)?;
        Ok(())
    }

    /// Sets the growth rate. Must be finite and non-negative.
    pub fn set_growth_rate(&mut self, growth_rate: F) -> Result<(), ConfigError> {
        self.growth_rate = non_negative(growth_rate)?;
        Ok(())
    }

    /// Sets the flat-error boost and the dead band that defines "flat". Both must be finite
    /// and non-negative; a zero boost holds the gains while the error is flat.
    pub fn set_flat_response(&mut self, flat_boost: F, deadband: F) -> Result<(), ConfigError> {
        let flat_boost = non_negative(flat_boost)?;
        self.deadband = non_negative(deadband)?;
        self.flat_boost = flat_boost;
        Ok(())
    }

    /// Sets the per-step change bound. Must lie strictly between 0 and 1.
    pub fn set_max_step(&mut self, max_step: F) -> Result<(), ConfigError> {
        if !(max_step > F::zero() && max_step < F::one()) {
            return Err(ConfigError::InvalidTuningParameter);
        }
        self.max_step = max_step;
        Ok(())
    }

    /// Sets the per-gain weights. Each must be finite and non-negative; a zero weight freezes
    /// that gain.
    pub fn set_weights(&mut self, weights: Gains<F>) -> Result<(), ConfigError> {
        non_negative(weights.kp)?;
        non_negative(weights.ki)?;
        non_negative(weights.kd)?;
        self.weights = weights;
        Ok(())
    }

    /// Sets the gain floor. Must be finite and non-negative; zero makes the adjustment purely
    /// proportional, so a zero gain never rises.
    pub fn set_gain_floor(&mut self, gain_floor: F) -> Result<(), ConfigError> {
        self.gain_floor = non_negative(gain_floor)?;
        Ok(())
    }

    fn fraction(&self, weight: F, raw: F) -> F {
        if weight == F::zero() {
            return F::zero();
        }
        num_traits::clamp(weight * raw, -self.max_step, self.max_step)
    }
}

impl<F: FloatCore> TuningStrategy<F> for RelativeErrorTuner<F> {
    fn adapt(&self, gains: Gains<F>, error: F, previous_error: F) -> Option<Gains<F>> {
        let previous = previous_error.abs();
        if previous == F::zero() {
            return None;
        }
        // Infinite when the previous error is subnormal
        let relative = ((error.abs() - previous) / previous).min(F::max_value());

        let raw = if relative < -self.deadband {
            self.relax_rate * relative
        } else if relative <= self.deadband {
            self.flat_boost
        } else {
            self.growth_rate * relative
        };

        let scale = |gain: F, weight: F| {
            let fraction = self.fraction(weight, raw);
            let base = if fraction > F::zero() {
                gain.max(self.gain_floor)
            } else {
                gain
            };
            gain + base * fraction
        };
        Some(Gains::new(
            scale(gains.kp, self.weights.kp),
            scale(gains.ki, self.weights.ki),
            scale(gains.kd, self.weights.kd),
        ))
    }
}

/// A gap-following heuristic with conservative and aggressive fallback tunings.
///
/// The gap is the error magnitude scaled by an oscillation factor. Each step the change of the
/// gap, limited to `±max_delta`, is added to the gains with fixed ratios: `2x` to kp, `x/2` to
/// kd and `x/8` to ki. Gains that have fallen below the conservative tuning, or risen above
/// the aggressive one, snap to that tuning instead.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GapTuner<F> {
    /// Defaults to kp = 1.0, ki = 0.05, kd = 0.25.
    conservative: Gains<F>,
    /// Defaults to kp = 8.0, ki = 0.5, kd = 2.0.
    aggressive: Gains<F>,
    /// Defaults to 0.2. Values between 0.1 and 0.8 move the gains at a reasonable pace.
    oscillation: F,
    /// Defaults to 0.8.
    max_delta: F,
}

impl<F: FloatCore> Default for GapTuner<F> {
    fn default() -> Self {
        GapTuner {
            conservative: Gains::new(F::one(), constant(0.05), constant(0.25)),
            aggressive: Gains::new(constant(8.0), constant(0.5), constant(2.0)),
            oscillation: constant(0.2),
            max_delta: constant(0.8),
        }
    }
}

impl<F: FloatCore> GapTuner<F> {
    /// Creates a gap tuner with the given fallback tunings and default pace.
    ///
    /// # Errors
    /// [`ConfigError::InvalidTuningParameter`] if either tuning has a negative or non-finite
    /// gain, or if a conservative gain exceeds its aggressive counterpart.
    pub fn new(conservative: Gains<F>, aggressive: Gains<F>) -> Result<Self, ConfigError> {
        for gain in [conservative.kp, conservative.ki, conservative.kd] {
            non_negative(gain)?;
        }
        for gain in [aggressive.kp, aggressive.ki, aggressive.kd] {
            non_negative(gain)?;
        }
        if conservative.kp > aggressive.kp
            || conservative.ki > aggressive.ki
            || conservative.kd > aggressive.kd
        {
            return Err(ConfigError::InvalidTuningParameter);
        }
        Ok(GapTuner {
            conservative,
            aggressive,
            ..Default::default()
        })
    }

    /// Returns the conservative tuning.
    pub fn conservative(&self) -> Gains<F> {
        self.conservative
    }

    /// Returns the aggressive tuning.
    pub fn aggressive(&self) -> Gains<F> {
        self.aggressive
    }

    /// Sets the oscillation factor. Must be finite and strictly positive.
    pub fn set_oscillation(&mut self, oscillation: F) -> Result<(), ConfigError> {
        if !(oscillation.is_finite() && oscillation > F::zero()) {
            return Err(ConfigError::InvalidTuningParameter);
        }
        self.oscillation = oscillation;
        Ok(())
    }

    /// Sets the largest gap change considered in one step. Must be finite and strictly
    /// positive.
    pub fn set_max_delta(&mut self, max_delta: F) -> Result<(), ConfigError> {
        if !(max_delta.is_finite() && max_delta > F::zero()) {
            return Err(ConfigError::InvalidTuningParameter);
        }
        self.max_delta = max_delta;
        Ok(())
    }
}

impl<F: FloatCore> TuningStrategy<F> for GapTuner<F> {
    fn adapt(&self, gains: Gains<F>, error: F, previous_error: F) -> Option<Gains<F>> {
        let low = &self.conservative;
        if gains.kp < low.kp || gains.ki < low.ki || gains.kd < low.kd {
            return Some(*low);
        }
        let high = &self.aggressive;
        if gains.kp > high.kp || gains.ki > high.ki || gains.kd > high.kd {
            return Some(*high);
        }

        let gap_change = self.oscillation * (error.abs() - previous_error.abs());
        let delta = num_traits::clamp(gap_change, -self.max_delta, self.max_delta);
        let two: F = constant(2.0);
        let eight: F = constant(8.0);
        Some(Gains::new(
            gains.kp + delta * two,
            gains.ki + delta / eight,
            gains.kd + delta / two,
        ))
    }
}
