// Adaptive PID controller: configuration, per-loop state and the step law
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

use core::time::Duration;

use num_traits::float::FloatCore;

use crate::tuning::{RelativeErrorTuner, TuningStrategy};
use crate::{as_f64, constant};

/// Errors raised when a configuration value is rejected.
///
/// Configuration is validated when it is built or modified, never while stepping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum ConfigError {
    /// The setpoint is not finite.
    #[cfg_attr(feature = "std", error("setpoint must be finite"))]
    InvalidSetpoint,

    /// The initial gains are not finite, negative, or outside the gain limits.
    #[cfg_attr(
        feature = "std",
        error("initial gains must be finite and lie within the gain limits")
    )]
    InvalidInitialGains,

    /// A gain bound is negative or not finite, or a lower bound exceeds its upper bound.
    #[cfg_attr(
        feature = "std",
        error("gain limits must be finite, non-negative and ordered (min <= max)")
    )]
    InvalidGainLimits,

    /// The integrator lower limit is not strictly below the upper limit, or either is NaN.
    #[cfg_attr(feature = "std", error("integrator limits must satisfy min < max"))]
    InvalidIntegratorLimits,

    /// The output lower limit is not strictly below the upper limit, or either is NaN.
    #[cfg_attr(feature = "std", error("output limits must satisfy min < max"))]
    InvalidOutputLimits,

    /// The sample time is zero or unbounded.
    #[cfg_attr(feature = "std", error("sample time must be positive and bounded"))]
    InvalidSampleTime,

    /// A rate, weight or band of a tuning strategy is out of range.
    #[cfg_attr(feature = "std", error("tuning strategy parameter out of range"))]
    InvalidTuningParameter,

    /// The relay output step is not strictly positive and finite.
    #[cfg_attr(feature = "std", error("relay output step must be positive and finite"))]
    InvalidOutputStep,

    /// The relay lookback window is shorter than one sample time or spans too many samples.
    #[cfg_attr(
        feature = "std",
        error("relay lookback must span between one and 100000 sample times")
    )]
    InvalidLookback,

    /// The hysteresis band is negative or not finite.
    #[cfg_attr(feature = "std", error("hysteresis band must be finite and non-negative"))]
    InvalidBand,

    /// The relay noise band is negative or not finite.
    #[cfg_attr(feature = "std", error("relay noise band must be finite and non-negative"))]
    InvalidNoiseband,
}

/// Errors raised by a single controller step. The controller state is never modified when a
/// step fails; the caller should keep commanding the last known-good output.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "std", derive(thiserror::Error))]
pub enum StepError {
    /// The supplied error value is NaN or infinite.
    #[cfg_attr(feature = "std", error("error sample is not finite"))]
    InvalidInput,

    /// The combined output overflowed to a non-finite value.
    #[cfg_attr(feature = "std", error("controller output is not finite"))]
    NonFiniteOutput,
}

/// A set of proportional, integral and derivative gains.
///
/// Gains used by the controller are in per-sample form: the integral gain multiplies the sum of
/// errors and the derivative gain multiplies the difference between consecutive errors. Use
/// [`Gains::from_continuous`] to convert gains expressed per second.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Gains<F> {
    /// Proportional gain.
    pub kp: F,
    /// Integral gain.
    pub ki: F,
    /// Derivative gain.
    pub kd: F,
}

impl<F: FloatCore> Gains<F> {
    /// Creates a new set of gains.
    pub fn new(kp: F, ki: F, kd: F) -> Self {
        Gains { kp, ki, kd }
    }

    /// Creates a set of gains where all three share one value.
    pub fn uniform(value: F) -> Self {
        Gains::new(value, value, value)
    }

    /// Converts gains expressed per second into per-sample gains for the given sample time.
    ///
    /// The integral gain is scaled by the sample time and the derivative gain inversely so.
    pub fn from_continuous(kp: F, ki: F, kd: F, sample_time: Duration) -> Self {
        let ts: F = constant(sample_time.as_secs_f64());
        Gains::new(kp, ki * ts, kd / ts)
    }

    /// Converts per-sample gains back into gains expressed per second.
    pub fn to_continuous(&self, sample_time: Duration) -> Self {
        let ts: F = constant(sample_time.as_secs_f64());
        Gains::new(self.kp, self.ki / ts, self.kd * ts)
    }

    /// Returns true if all three gains are finite.
    pub fn is_finite(&self) -> bool {
        self.kp.is_finite() && self.ki.is_finite() && self.kd.is_finite()
    }

    fn is_non_negative(&self) -> bool {
        self.kp >= F::zero() && self.ki >= F::zero() && self.kd >= F::zero()
    }

    fn all_le(&self, other: &Self) -> bool {
        self.kp <= other.kp && self.ki <= other.ki && self.kd <= other.kd
    }
}

/// Per-gain bounds applied after every adaptation.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct GainLimits<F> {
    min: Gains<F>,
    max: Gains<F>,
}

impl<F: FloatCore> GainLimits<F> {
    /// Creates bounds shared by all three gains.
    pub fn uniform(min: F, max: F) -> Result<Self, ConfigError> {
        Self::new(Gains::uniform(min), Gains::uniform(max))
    }

    /// Creates per-gain bounds.
    ///
    /// # Errors
    /// [`ConfigError::InvalidGainLimits`] if any bound is negative or not finite, or if a lower
    /// bound exceeds the matching upper bound.
    pub fn new(min: Gains<F>, max: Gains<F>) -> Result<Self, ConfigError> {
        if !min.is_finite() || !max.is_finite() || !min.is_non_negative() || !min.all_le(&max) {
            return Err(ConfigError::InvalidGainLimits);
        }
        Ok(GainLimits { min, max })
    }

    /// Returns the lower bounds.
    pub fn min(&self) -> Gains<F> {
        self.min
    }

    /// Returns the upper bounds.
    pub fn max(&self) -> Gains<F> {
        self.max
    }

    /// Returns true if every gain lies within its bounds.
    pub fn contains(&self, gains: &Gains<F>) -> bool {
        self.min.all_le(gains) && gains.all_le(&self.max)
    }

    /// Clamps each gain into its bounds. NaN gains pass through unchanged.
    pub fn clamp(&self, gains: Gains<F>) -> Gains<F> {
        Gains::new(
            num_traits::clamp(gains.kp, self.min.kp, self.max.kp),
            num_traits::clamp(gains.ki, self.min.ki, self.max.ki),
            num_traits::clamp(gains.kd, self.min.kd, self.max.kd),
        )
    }
}

/// Whether a positive error should raise or lower the output.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Direction {
    /// A positive error raises the output, e.g. a heater or a humidifier.
    #[default]
    Direct,
    /// A positive error lowers the output, e.g. a cooling fan or a dehumidifier.
    Reverse,
}

impl Direction {
    fn apply<F: FloatCore>(self, value: F) -> F {
        match self {
            Direction::Direct => value,
            Direction::Reverse => -value,
        }
    }
}

/// Which side of a hysteresis band the controller regulates from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BandMode {
    /// Drive up from below the band towards its upper edge, e.g. a heater.
    Raise,
    /// Drive down from above the band towards its lower edge, e.g. a cooler.
    Lower,
    /// Regulate towards the nearer edge from either side, idling inside the band.
    #[default]
    Both,
}

/// Which way a band-regulated loop is currently driving.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BandPhase {
    /// Output suppressed, or no band configured.
    #[default]
    Idle,
    /// Driving the process value up.
    Raising,
    /// Driving the process value down.
    Lowering,
}

/// Configuration of an adaptive PID controller.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct AutotuneConfig<F> {
    /// Target process value.
    /// Defaults to 0.0.
    setpoint: F,

    /// Gains the controller starts with.
    /// Defaults to kp = 1.0, ki = 0.1, kd = 0.01.
    initial_gains: Gains<F>,

    /// Bounds the adapted gains are clamped into.
    /// Defaults to [0.0, 10.0] for every gain.
    gain_limits: GainLimits<F>,

    /// Lower bound of the error accumulator.
    /// Defaults to -500.0.
    integrator_min: F,

    /// Upper bound of the error accumulator.
    /// Defaults to 500.0.
    integrator_max: F,

    /// Minimum output value.
    /// Defaults to negative infinity, i.e. no limit.
    output_min: F,

    /// Maximum output value.
    /// Defaults to positive infinity, i.e. no limit.
    output_max: F,

    /// Defaults to [`Direction::Direct`].
    direction: Direction,

    /// Period at which the scheduler calls the controller. Only used to convert gains between
    /// per-second and per-sample form.
    /// Defaults to 1s.
    sample_time: Duration,

    /// Half-width of the hysteresis band around the setpoint used by
    /// [`FuncAdaptivePid::step_measurement`]. Zero disables the band.
    /// Defaults to 0.0.
    band: F,

    /// Defaults to [`BandMode::Both`].
    band_mode: BandMode,
}

impl<F: FloatCore> Default for AutotuneConfig<F> {
    fn default() -> Self {
        AutotuneConfig {
            setpoint: F::zero(),
            initial_gains: Gains::new(F::one(), constant(0.1), constant(0.01)),
            gain_limits: GainLimits {
                min: Gains::uniform(F::zero()),
                max: Gains::uniform(constant(10.0)),
            },
            integrator_min: constant(-500.0),
            integrator_max: constant(500.0),
            output_min: F::neg_infinity(),
            output_max: F::infinity(),
            direction: Direction::Direct,
            sample_time: Duration::from_secs(1),
            band: F::zero(),
            band_mode: BandMode::Both,
        }
    }
}

impl<F: FloatCore> AutotuneConfig<F> {
    /// Returns the setpoint.
    pub fn setpoint(&self) -> F {
        self.setpoint
    }

    /// Returns the gains a fresh controller state starts with.
    pub fn initial_gains(&self) -> Gains<F> {
        self.initial_gains
    }

    /// Returns the gain bounds.
    pub fn gain_limits(&self) -> GainLimits<F> {
        self.gain_limits
    }

    /// Returns the lower bound of the error accumulator.
    pub fn integrator_min(&self) -> F {
        self.integrator_min
    }

    /// Returns the upper bound of the error accumulator.
    pub fn integrator_max(&self) -> F {
        self.integrator_max
    }

    /// Returns the minimum output limit.
    pub fn output_min(&self) -> F {
        self.output_min
    }

    /// Returns the maximum output limit.
    pub fn output_max(&self) -> F {
        self.output_max
    }

    /// Returns the controller direction.
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Returns the sample time.
    pub fn sample_time(&self) -> Duration {
        self.sample_time
    }

    /// Returns the half-width of the hysteresis band; zero when disabled.
    pub fn band(&self) -> F {
        self.band
    }

    /// Returns the hysteresis band mode.
    pub fn band_mode(&self) -> BandMode {
        self.band_mode
    }

    /// Sets the setpoint used by freshly created controller states.
    ///
    /// # Errors
    /// [`ConfigError::InvalidSetpoint`] if the setpoint is not finite.
    pub fn set_setpoint(&mut self, setpoint: F) -> Result<(), ConfigError> {
        self.update(|cfg| cfg.setpoint = setpoint)
    }

    /// Sets the initial gains.
    ///
    /// # Errors
    /// [`ConfigError::InvalidInitialGains`] if any gain is not finite or lies outside the gain
    /// limits.
    pub fn set_initial_gains(&mut self, gains: Gains<F>) -> Result<(), ConfigError> {
        self.update(|cfg| cfg.initial_gains = gains)
    }

    /// Sets the same bounds for all three gains.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidGainLimits`] if the bounds are negative, not finite or inverted.
    /// - [`ConfigError::InvalidInitialGains`] if the current initial gains fall outside the new
    ///   bounds. Set the initial gains first in that case.
    pub fn set_gain_limits(&mut self, min: F, max: F) -> Result<(), ConfigError> {
        let limits = GainLimits::uniform(min, max)?;
        self.update(|cfg| cfg.gain_limits = limits)
    }

    /// Sets per-gain bounds. Fails like [`AutotuneConfig::set_gain_limits`].
    pub fn set_gain_bounds(&mut self, min: Gains<F>, max: Gains<F>) -> Result<(), ConfigError> {
        let limits = GainLimits::new(min, max)?;
        self.update(|cfg| cfg.gain_limits = limits)
    }

    /// Sets the bounds of the error accumulator. These limits may be infinite to disable the
    /// windup guard.
    ///
    /// # Errors
    /// [`ConfigError::InvalidIntegratorLimits`] if `min >= max` or either limit is NaN.
    pub fn set_integrator_limits(&mut self, min: F, max: F) -> Result<(), ConfigError> {
        self.update(|cfg| {
            cfg.integrator_min = min;
            cfg.integrator_max = max;
        })
    }

    /// Sets the output limits. These limits may be infinite to disable clamping.
    ///
    /// # Errors
    /// [`ConfigError::InvalidOutputLimits`] if `min >= max` or either limit is NaN.
    pub fn set_output_limits(&mut self, min: F, max: F) -> Result<(), ConfigError> {
        self.update(|cfg| {
            cfg.output_min = min;
            cfg.output_max = max;
        })
    }

    /// Sets the controller direction.
    pub fn set_direction(&mut self, direction: Direction) {
        self.direction = direction;
    }

    /// Sets the sample time.
    ///
    /// # Errors
    /// [`ConfigError::InvalidSampleTime`] if the sample time is zero or `Duration::MAX`.
    pub fn set_sample_time(&mut self, sample_time: Duration) -> Result<(), ConfigError> {
        self.update(|cfg| cfg.sample_time = sample_time)
    }

    /// Sets the hysteresis band. A width of zero disables it.
    ///
    /// # Errors
    /// [`ConfigError::InvalidBand`] if the width is negative or not finite.
    pub fn set_band(&mut self, width: F, mode: BandMode) -> Result<(), ConfigError> {
        self.update(|cfg| {
            cfg.band = width;
            cfg.band_mode = mode;
        })
    }

    /// Applies a modification to a copy, and commits it only if the copy validates.
    fn update(&mut self, modify: impl FnOnce(&mut Self)) -> Result<(), ConfigError> {
        let mut candidate = *self;
        modify(&mut candidate);
        candidate.validate()?;
        *self = candidate;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.setpoint.is_finite() {
            return Err(ConfigError::InvalidSetpoint);
        }
        if self.sample_time.is_zero() || self.sample_time == Duration::MAX {
            return Err(ConfigError::InvalidSampleTime);
        }
        // Re-run the bound checks in case the limits were built without `GainLimits::new`
        GainLimits::new(self.gain_limits.min, self.gain_limits.max)?;
        if !self.initial_gains.is_finite() || !self.gain_limits.contains(&self.initial_gains) {
            return Err(ConfigError::InvalidInitialGains);
        }
        if !ordered(self.integrator_min, self.integrator_max) {
            return Err(ConfigError::InvalidIntegratorLimits);
        }
        if !ordered(self.output_min, self.output_max) {
            return Err(ConfigError::InvalidOutputLimits);
        }
        if !(self.band.is_finite() && self.band >= F::zero()) {
            return Err(ConfigError::InvalidBand);
        }
        Ok(())
    }
}

fn ordered<F: FloatCore>(min: F, max: F) -> bool {
    !min.is_nan() && !max.is_nan() && min < max
}

/// Builder for [`AutotuneConfig`]. Unset fields keep their defaults; `build` validates the
/// whole configuration at once, so fields may be given in any order.
///
/// With the `serde` feature the builder can be deserialized from the settings store of the
/// surrounding system, then built.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct AutotuneConfigBuilder<F> {
    setpoint: Option<F>,
    kp: Option<F>,
    ki: Option<F>,
    kd: Option<F>,
    gain_min: Option<Gains<F>>,
    gain_max: Option<Gains<F>>,
    integrator_limits: Option<(F, F)>,
    output_limits: Option<(F, F)>,
    direction: Option<Direction>,
    sample_time: Option<Duration>,
    band: Option<(F, BandMode)>,
}

impl<F> Default for AutotuneConfigBuilder<F> {
    fn default() -> Self {
        AutotuneConfigBuilder {
            setpoint: None,
            kp: None,
            ki: None,
            kd: None,
            gain_min: None,
            gain_max: None,
            integrator_limits: None,
            output_limits: None,
            direction: None,
            sample_time: None,
            band: None,
        }
    }
}

impl<F: FloatCore> AutotuneConfigBuilder<F> {
    /// Sets the setpoint.
    pub fn setpoint(mut self, setpoint: F) -> Self {
        self.setpoint = Some(setpoint);
        self
    }

    /// Sets the initial proportional gain.
    pub fn kp(mut self, kp: F) -> Self {
        self.kp = Some(kp);
        self
    }

    /// Sets the initial integral gain.
    pub fn ki(mut self, ki: F) -> Self {
        self.ki = Some(ki);
        self
    }

    /// Sets the initial derivative gain.
    pub fn kd(mut self, kd: F) -> Self {
        self.kd = Some(kd);
        self
    }

    /// Sets all three initial gains.
    pub fn gains(self, gains: Gains<F>) -> Self {
        self.kp(gains.kp).ki(gains.ki).kd(gains.kd)
    }

    /// Sets the same bounds for all three gains.
    pub fn gain_limits(self, min: F, max: F) -> Self {
        self.gain_bounds(Gains::uniform(min), Gains::uniform(max))
    }

    /// Sets per-gain bounds.
    pub fn gain_bounds(mut self, min: Gains<F>, max: Gains<F>) -> Self {
        self.gain_min = Some(min);
        self.gain_max = Some(max);
        self
    }

    /// Sets the bounds of the error accumulator.
    pub fn integrator_limits(mut self, min: F, max: F) -> Self {
        self.integrator_limits = Some((min, max));
        self
    }

    /// Sets the output limits.
    pub fn output_limits(mut self, min: F, max: F) -> Self {
        self.output_limits = Some((min, max));
        self
    }

    /// Sets the controller direction.
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// Sets the sample time.
    pub fn sample_time(mut self, sample_time: Duration) -> Self {
        self.sample_time = Some(sample_time);
        self
    }

    /// Sets the hysteresis band.
    pub fn band(mut self, width: F, mode: BandMode) -> Self {
        self.band = Some((width, mode));
        self
    }

    /// Validates the collected values and produces a configuration.
    pub fn build(self) -> Result<AutotuneConfig<F>, ConfigError> {
        let mut config = AutotuneConfig::default();
        if let Some(setpoint) = self.setpoint {
            config.setpoint = setpoint;
        }
        let defaults = config.initial_gains;
        config.initial_gains = Gains::new(
            self.kp.unwrap_or(defaults.kp),
            self.ki.unwrap_or(defaults.ki),
            self.kd.unwrap_or(defaults.kd),
        );
        if let Some(min) = self.gain_min {
            config.gain_limits.min = min;
        }
        if let Some(max) = self.gain_max {
            config.gain_limits.max = max;
        }
        if let Some((min, max)) = self.integrator_limits {
            config.integrator_min = min;
            config.integrator_max = max;
        }
        if let Some((min, max)) = self.output_limits {
            config.output_min = min;
            config.output_max = max;
        }
        if let Some(direction) = self.direction {
            config.direction = direction;
        }
        if let Some(sample_time) = self.sample_time {
            config.sample_time = sample_time;
        }
        if let Some((width, mode)) = self.band {
            config.band = width;
            config.band_mode = mode;
        }
        config.validate()?;
        Ok(config)
    }
}

/// The individual contributions summed into the controller output.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct PidTerms<F> {
    /// `kp * error`
    pub proportional: F,
    /// `ki * integral`
    pub integral: F,
    /// `kd * (error - previous_error)`
    pub derivative: F,
}

impl<F: FloatCore> PidTerms<F> {
    fn zero() -> Self {
        PidTerms {
            proportional: F::zero(),
            integral: F::zero(),
            derivative: F::zero(),
        }
    }
}

/// The persistent state of one regulation loop.
///
/// A state is created once per loop with [`FuncAdaptivePid::initial_state`] and carried from
/// step to step. It starts Uninitialized: the first step seeds `previous_error` and skips both
/// the derivative term and gain adaptation.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct ControllerState<F> {
    setpoint: F,
    gains: Gains<F>,
    previous_error: Option<F>,
    integral: F,
    last_output: F,
    last_terms: PidTerms<F>,
    band_phase: BandPhase,
}

impl<F: FloatCore> ControllerState<F> {
    /// Creates an Uninitialized state with the configured setpoint and initial gains.
    pub fn new(config: &AutotuneConfig<F>) -> Self {
        ControllerState {
            setpoint: config.setpoint,
            gains: config.initial_gains,
            previous_error: None,
            integral: F::zero(),
            last_output: F::zero(),
            last_terms: PidTerms::zero(),
            band_phase: BandPhase::Idle,
        }
    }

    /// Returns the setpoint.
    pub fn setpoint(&self) -> F {
        self.setpoint
    }

    /// Returns the current gains.
    pub fn gains(&self) -> Gains<F> {
        self.gains
    }

    /// Returns the error of the previous step, or `None` if the state is Uninitialized.
    pub fn previous_error(&self) -> Option<F> {
        self.previous_error
    }

    /// Returns the clamped sum of all errors seen so far.
    pub fn integral(&self) -> F {
        self.integral
    }

    /// Returns the output of the last successful step.
    pub fn output(&self) -> F {
        self.last_output
    }

    /// Returns the P, I and D contributions of the last successful step.
    pub fn terms(&self) -> PidTerms<F> {
        self.last_terms
    }

    /// Returns true once the first step has been taken.
    pub fn is_initialized(&self) -> bool {
        self.previous_error.is_some()
    }

    /// Returns which way the hysteresis band is currently driving.
    pub fn band_phase(&self) -> BandPhase {
        self.band_phase
    }

    /// Moves the setpoint. The accumulated integral is kept for a bumpless transition.
    ///
    /// # Errors
    /// [`ConfigError::InvalidSetpoint`] if the setpoint is not finite.
    pub fn set_setpoint(&mut self, setpoint: F) -> Result<(), ConfigError> {
        if !setpoint.is_finite() {
            return Err(ConfigError::InvalidSetpoint);
        }
        self.setpoint = setpoint;
        Ok(())
    }

    /// Returns the state to Uninitialized, keeping its gains, setpoint and last output.
    pub fn reset(&mut self) {
        self.previous_error = None;
        self.integral = F::zero();
        self.band_phase = BandPhase::Idle;
    }

    /// Clears the error accumulator.
    pub fn reset_integral(&mut self) {
        self.integral = F::zero();
    }
}

/// One entry of a replayed error sequence.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct StepRecord<F> {
    /// The error fed to the controller.
    pub error: F,
    /// The output the controller produced.
    pub output: F,
    /// The gains after adaptation.
    pub gains: Gains<F>,
    /// The contributions summed into `output`.
    pub terms: PidTerms<F>,
}

/// A functional implementation of the adaptive PID controller.
///
/// The controller holds only its configuration and tuning strategy; the `step` method is
/// functionally pure, taking a [`ControllerState`] and returning the next one. A single
/// controller can therefore drive any number of independent loops, and a logged error sequence
/// can be replayed offline to reproduce the exact same outputs and gains.
#[derive(Clone, Debug)]
pub struct FuncAdaptivePid<F, T = RelativeErrorTuner<F>> {
    config: AutotuneConfig<F>,
    strategy: T,
}

impl<F: FloatCore> FuncAdaptivePid<F> {
    /// Creates a controller that adapts its gains with the default [`RelativeErrorTuner`].
    pub fn new(config: AutotuneConfig<F>) -> Self {
        Self::with_strategy(config, RelativeErrorTuner::default())
    }
}

impl<F: FloatCore, T: TuningStrategy<F>> FuncAdaptivePid<F, T> {
    /// Creates a controller with a custom tuning strategy.
    pub fn with_strategy(config: AutotuneConfig<F>, strategy: T) -> Self {
        FuncAdaptivePid { config, strategy }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AutotuneConfig<F> {
        &self.config
    }

    /// Returns the configuration for modification. Gains of running states are clamped into
    /// new gain limits on their next step.
    pub fn config_mut(&mut self) -> &mut AutotuneConfig<F> {
        &mut self.config
    }

    /// Returns the tuning strategy.
    pub fn strategy(&self) -> &T {
        &self.strategy
    }

    /// Creates an Uninitialized state from the configuration.
    pub fn initial_state(&self) -> ControllerState<F> {
        ControllerState::new(&self.config)
    }

    /// Advances the loop by one sample.
    ///
    /// Computes `kp * error + ki * integral + kd * (error - previous_error)` with the gains
    /// held on entry, applies the direction and output limits, then lets the tuning strategy
    /// adapt the gains for the next step.
    ///
    /// Adaptation is skipped on the first step and whenever the previous error is exactly zero,
    /// since the relative change of the error is undefined there.
    ///
    /// # Errors
    /// - [`StepError::InvalidInput`] if `error` is not finite.
    /// - [`StepError::NonFiniteOutput`] if the output is not finite after clamping.
    ///
    /// In both cases no new state is produced; the caller's state is left as it was.
    pub fn step(
        &self,
        state: ControllerState<F>,
        error: F,
    ) -> Result<(F, ControllerState<F>), StepError> {
        if !error.is_finite() {
            tracing::debug!(error = as_f64(error), "rejected non-finite error sample");
            return Err(StepError::InvalidInput);
        }

        let mut next = state;
        let gains = state.gains;

        // Windup guard
        next.integral = num_traits::clamp(
            state.integral + error,
            self.config.integrator_min,
            self.config.integrator_max,
        );

        let derivative = match state.previous_error {
            Some(previous) => error - previous,
            None => F::zero(),
        };

        let terms = PidTerms {
            proportional: gains.kp * error,
            integral: gains.ki * next.integral,
            derivative: gains.kd * derivative,
        };
        let raw = terms.proportional + terms.integral + terms.derivative;
        let output = num_traits::clamp(
            self.config.direction.apply(raw),
            self.config.output_min,
            self.config.output_max,
        );
        if !output.is_finite() {
            tracing::debug!(error = as_f64(error), "rejected non-finite output");
            return Err(StepError::NonFiniteOutput);
        }

        let mut candidate = gains;
        match state.previous_error {
            Some(previous) if previous != F::zero() => {
                if let Some(adapted) = self.strategy.adapt(gains, error, previous) {
                    candidate = adapted;
                }
            }
            Some(_) => {
                tracing::debug!("previous error is zero, skipping gain adaptation");
            }
            None => {}
        }
        let clamped = self.config.gain_limits.clamp(candidate);
        if clamped.is_finite() {
            next.gains = clamped;
        } else {
            tracing::debug!("tuning strategy produced non-finite gains, keeping prior gains");
            next.gains = self.config.gain_limits.clamp(gains);
        }

        next.previous_error = Some(error);
        next.last_output = output;
        next.last_terms = terms;

        tracing::trace!(
            error = as_f64(error),
            output = as_f64(output),
            kp = as_f64(next.gains.kp),
            ki = as_f64(next.gains.ki),
            kd = as_f64(next.gains.kd),
            "adaptive pid step"
        );

        Ok((output, next))
    }

    /// Advances the loop by one sample given a measured process value instead of an error.
    ///
    /// Without a hysteresis band the error is `setpoint - measured`. With a band of half-width
    /// `b`, the loop regulates towards an edge of `[setpoint - b, setpoint + b]` and is held idle
    /// otherwise, as selected by the [`BandMode`]:
    ///
    /// - [`BandMode::Raise`] starts once the value falls below the band, targets the upper edge,
    ///   and idles once the value rises above it.
    /// - [`BandMode::Lower`] mirrors `Raise`.
    /// - [`BandMode::Both`] targets the lower edge below the band and the upper edge above it,
    ///   and idles inside. Switching between the two returns the state to Uninitialized, which
    ///   clears the integral.
    ///
    /// An idle step outputs zero clamped into the output limits, and leaves the gains, the
    /// integral and the previous error untouched.
    ///
    /// # Errors
    /// Fails like [`FuncAdaptivePid::step`]; a non-finite measurement is
    /// [`StepError::InvalidInput`].
    pub fn step_measurement(
        &self,
        state: ControllerState<F>,
        measured: F,
    ) -> Result<(F, ControllerState<F>), StepError> {
        if !measured.is_finite() {
            tracing::debug!(measured = as_f64(measured), "rejected non-finite measurement");
            return Err(StepError::InvalidInput);
        }

        let mut next = state;
        match self.band_setpoint(&mut next, measured) {
            Some(setpoint) => self.step(next, setpoint - measured),
            None => {
                let output =
                    num_traits::clamp(F::zero(), self.config.output_min, self.config.output_max);
                next.last_output = output;
                next.last_terms = PidTerms::zero();
                tracing::trace!(
                    measured = as_f64(measured),
                    output = as_f64(output),
                    "inside hysteresis band, output held"
                );
                Ok((output, next))
            }
        }
    }

    /// Returns the setpoint to regulate towards, or `None` while the band holds the loop idle.
    fn band_setpoint(&self, state: &mut ControllerState<F>, measured: F) -> Option<F> {
        let band = self.config.band;
        if band == F::zero() {
            return Some(state.setpoint);
        }
        let low = state.setpoint - band;
        let high = state.setpoint + band;
        let inside = low < measured && measured < high;

        match self.config.band_mode {
            BandMode::Raise => {
                if measured < low || (inside && state.band_phase == BandPhase::Raising) {
                    state.band_phase = BandPhase::Raising;
                    return Some(high);
                }
                if measured > high {
                    state.band_phase = BandPhase::Idle;
                }
                None
            }
            BandMode::Lower => {
                if measured > high || (inside && state.band_phase == BandPhase::Lowering) {
                    state.band_phase = BandPhase::Lowering;
                    return Some(low);
                }
                if measured < low {
                    state.band_phase = BandPhase::Idle;
                }
                None
            }
            BandMode::Both => {
                let (phase, target) = if measured < low {
                    (BandPhase::Raising, low)
                } else if measured > high {
                    (BandPhase::Lowering, high)
                } else {
                    return None;
                };
                if state.band_phase != phase {
                    tracing::debug!(?phase, "hysteresis direction switch, resetting loop");
                    state.reset();
                    state.band_phase = phase;
                }
                Some(target)
            }
        }
    }

    /// Lazily replays an error sequence starting from `state`.
    ///
    /// A rejected sample yields its error and the replay continues from the last good state.
    pub fn replay<I>(&self, state: ControllerState<F>, errors: I) -> Replay<'_, F, T, I::IntoIter>
    where
        I: IntoIterator<Item = F>,
    {
        Replay {
            controller: self,
            state,
            errors: errors.into_iter(),
        }
    }
}

/// Iterator returned by [`FuncAdaptivePid::replay`].
#[derive(Debug)]
pub struct Replay<'a, F, T, I> {
    controller: &'a FuncAdaptivePid<F, T>,
    state: ControllerState<F>,
    errors: I,
}

impl<F: FloatCore, T: TuningStrategy<F>, I> Replay<'_, F, T, I> {
    /// Returns the state after the last successful step.
    pub fn state(&self) -> &ControllerState<F> {
        &self.state
    }
}

impl<F: FloatCore, T: TuningStrategy<F>, I: Iterator<Item = F>> Iterator for Replay<'_, F, T, I> {
    type Item = Result<StepRecord<F>, StepError>;

    fn next(&mut self) -> Option<Self::Item> {
        let error = self.errors.next()?;
        Some(
            self.controller
                .step(self.state, error)
                .map(|(output, state)| {
                    self.state = state;
                    StepRecord {
                        error,
                        output,
                        gains: state.gains,
                        terms: state.last_terms,
                    }
                }),
        )
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.errors.size_hint()
    }
}

/// A stateful implementation of the adaptive PID controller.
///
/// This struct owns one [`ControllerState`] and forwards to a [`FuncAdaptivePid`]. A failed
/// step leaves the owned state untouched, so [`AdaptivePidController::output`] keeps reporting
/// the last known-good output.
#[derive(Clone, Debug)]
pub struct AdaptivePidController<F, T = RelativeErrorTuner<F>> {
    state: ControllerState<F>,
    controller: FuncAdaptivePid<F, T>,
}

impl<F: FloatCore> AdaptivePidController<F> {
    /// Creates a controller with the default [`RelativeErrorTuner`].
    pub fn new(config: AutotuneConfig<F>) -> Self {
        Self::with_strategy(config, RelativeErrorTuner::default())
    }
}

impl<F: FloatCore, T: TuningStrategy<F>> AdaptivePidController<F, T> {
    /// Creates a controller with a custom tuning strategy.
    pub fn with_strategy(config: AutotuneConfig<F>, strategy: T) -> Self {
        let controller = FuncAdaptivePid::with_strategy(config, strategy);
        AdaptivePidController {
            state: controller.initial_state(),
            controller,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &AutotuneConfig<F> {
        self.controller.config()
    }

    /// Returns the configuration for modification.
    pub fn config_mut(&mut self) -> &mut AutotuneConfig<F> {
        self.controller.config_mut()
    }

    /// Returns the owned state.
    pub fn state(&self) -> &ControllerState<F> {
        &self.state
    }

    /// Returns the current gains.
    pub fn gains(&self) -> Gains<F> {
        self.state.gains()
    }

    /// Returns the output of the last successful step.
    pub fn output(&self) -> F {
        self.state.output()
    }

    /// Returns true once the first step has been taken.
    pub fn is_initialized(&self) -> bool {
        self.state.is_initialized()
    }

    /// Advances the loop by one sample. See [`FuncAdaptivePid::step`].
    pub fn step(&mut self, error: F) -> Result<F, StepError> {
        let (output, state) = self.controller.step(self.state, error)?;
        self.state = state;
        Ok(output)
    }

    /// Advances the loop by one sample given a measured process value. See
    /// [`FuncAdaptivePid::step_measurement`].
    pub fn step_measurement(&mut self, measured: F) -> Result<F, StepError> {
        let (output, state) = self.controller.step_measurement(self.state, measured)?;
        self.state = state;
        Ok(output)
    }

    /// Moves the setpoint of the owned state.
    ///
    /// # Errors
    /// [`ConfigError::InvalidSetpoint`] if the setpoint is not finite.
    pub fn set_setpoint(&mut self, setpoint: F) -> Result<(), ConfigError> {
        self.state.set_setpoint(setpoint)
    }

    /// Returns the owned state to Uninitialized, keeping its gains and setpoint.
    pub fn reset(&mut self) {
        self.state.reset();
    }

    /// Clears the error accumulator of the owned state.
    pub fn reset_integral(&mut self) {
        self.state.reset_integral();
    }
}
