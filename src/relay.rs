// Relay autotuning experiment producing starting gains for the adaptive controller
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
use std::collections::VecDeque;

use num_traits::float::FloatCore;

use crate::pid::{ConfigError, Gains};
use crate::time::InstantLike;
use crate::{as_f64, constant};

/// Relative deviation between the measured and the averaged amplitude below which the induced
/// oscillation counts as stable.
const PEAK_AMPLITUDE_TOLERANCE: f64 = 0.05;

/// Number of peaks after which an experiment that has not converged is abandoned.
const MAX_PEAKS: usize = 20;

/// Peaks (and peak timestamps) retained for the convergence check.
const PEAK_HISTORY: usize = 5;

/// Largest number of samples the lookback window may span.
const MAX_LOOKBACK_SAMPLES: f64 = 100_000.0;

/// Phase of a relay experiment.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RelayState {
    /// No experiment has run yet.
    Off,
    /// The relay drives the output above its initial value.
    RelayStepUp,
    /// The relay drives the output below its initial value.
    RelayStepDown,
    /// A stable oscillation was measured; gains are available.
    Succeeded,
    /// No stable oscillation was found within the peak budget.
    Failed,
}

impl RelayState {
    /// Returns true once the experiment has either succeeded or failed.
    pub fn is_finished(&self) -> bool {
        matches!(self, RelayState::Succeeded | RelayState::Failed)
    }
}

/// Empirical rules mapping the ultimate gain and period to PID gains.
///
/// Each rule is a triple of divisors `(a, b, c)`: `kp = Ku / a`, `ki = kp / (Pu / b)` and
/// `kd = kp * (Pu / c)`.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "kebab-case"))]
pub enum TuningRule {
    /// Classic Ziegler-Nichols.
    #[default]
    ZieglerNichols,
    /// Tyreus-Luyben, less aggressive integral action.
    TyreusLuyben,
    /// Ciancone-Marlin.
    CianconeMarlin,
    /// Pessen integral rule.
    PessenIntegral,
    /// Accepts some overshoot.
    SomeOvershoot,
    /// Avoids overshoot.
    NoOvershoot,
    /// Slow thermal processes such as mash tuns and greenhouse heating.
    Brewing,
}

impl TuningRule {
    /// All available rules.
    pub const ALL: [TuningRule; 7] = [
        TuningRule::ZieglerNichols,
        TuningRule::TyreusLuyben,
        TuningRule::CianconeMarlin,
        TuningRule::PessenIntegral,
        TuningRule::SomeOvershoot,
        TuningRule::NoOvershoot,
        TuningRule::Brewing,
    ];

    fn divisors(self) -> (f64, f64, f64) {
        match self {
            TuningRule::ZieglerNichols => (34.0, 40.0, 160.0),
            TuningRule::TyreusLuyben => (44.0, 9.0, 126.0),
            TuningRule::CianconeMarlin => (66.0, 88.0, 162.0),
            TuningRule::PessenIntegral => (28.0, 50.0, 133.0),
            TuningRule::SomeOvershoot => (60.0, 40.0, 60.0),
            TuningRule::NoOvershoot => (100.0, 40.0, 60.0),
            TuningRule::Brewing => (2.5, 6.0, 380.0),
        }
    }
}

/// Configuration of a relay experiment.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RelayConfig<F> {
    /// Target process value the relay oscillates around.
    pub setpoint: F,
    /// Amount added to or removed from the initial output while stepping up or down.
    /// Defaults to 10.0.
    pub output_step: F,
    /// Interval between samples; earlier calls are ignored.
    /// Defaults to 5s.
    pub sample_time: Duration,
    /// Window over which an input must be extreme to count as a peak.
    /// Defaults to 60s.
    pub lookback: Duration,
    /// Defaults to negative infinity, i.e. no limit.
    pub output_min: F,
    /// Defaults to positive infinity, i.e. no limit.
    pub output_max: F,
    /// How far the input must overshoot the setpoint before the relay switches.
    /// Defaults to 0.5.
    pub noiseband: F,
}

impl<F: FloatCore> RelayConfig<F> {
    /// Creates a configuration with default settings around `setpoint`.
    pub fn new(setpoint: F) -> Self {
        RelayConfig {
            setpoint,
            output_step: constant(10.0),
            sample_time: Duration::from_secs(5),
            lookback: Duration::from_secs(60),
            output_min: F::neg_infinity(),
            output_max: F::infinity(),
            noiseband: constant(0.5),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !self.setpoint.is_finite() {
            return Err(ConfigError::InvalidSetpoint);
        }
        if !(self.output_step.is_finite() && self.output_step > F::zero()) {
            return Err(ConfigError::InvalidOutputStep);
        }
        if self.sample_time.is_zero() {
            return Err(ConfigError::InvalidSampleTime);
        }
        if self.lookback < self.sample_time || self.window_ratio() > MAX_LOOKBACK_SAMPLES {
            return Err(ConfigError::InvalidLookback);
        }
        if self.output_min.is_nan() || self.output_max.is_nan() || self.output_min >= self.output_max
        {
            return Err(ConfigError::InvalidOutputLimits);
        }
        if !(self.noiseband.is_finite() && self.noiseband >= F::zero()) {
            return Err(ConfigError::InvalidNoiseband);
        }
        Ok(())
    }

    fn window_ratio(&self) -> f64 {
        self.lookback.as_secs_f64() / self.sample_time.as_secs_f64()
    }
}

/// Rounds to the nearest integer, resolving ties to the even neighbour.
fn round_half_even(x: f64) -> f64 {
    let r = x.round();
    if (r - x).abs() == 0.5 && r % 2.0 != 0.0 {
        r - x.signum()
    } else {
        r
    }
}

/// Determines the ultimate gain and period of a process with a relay experiment.
///
/// The tuner toggles the output between two levels whenever the input crosses the setpoint by
/// more than the noise band, which drives most processes into a stable limit cycle. From the
/// amplitude and period of that cycle it derives the ultimate gain `Ku` and period `Pu`, which
/// [`TuningRule`]s turn into PID gains.
///
/// Call [`RelayAutotuner::run`] once per sample and apply [`RelayAutotuner::output`] to the
/// actuator until the returned state is finished.
#[derive(Clone, Debug)]
pub struct RelayAutotuner<I, F> {
    config: RelayConfig<F>,
    inputs: VecDeque<F>,
    window: usize,
    peaks: VecDeque<F>,
    peak_timestamps: VecDeque<I>,
    state: RelayState,
    output: F,
    initial_output: F,
    last_run: Option<I>,
    peak_type: i8,
    peak_count: usize,
    induced_amplitude: F,
    ultimate_gain: F,
    ultimate_period: F,
}

impl<I: InstantLike, F: FloatCore> RelayAutotuner<I, F> {
    /// Creates a tuner in the [`RelayState::Off`] state.
    ///
    /// # Errors
    /// - [`ConfigError::InvalidSetpoint`] if the setpoint is not finite.
    /// - [`ConfigError::InvalidOutputStep`] if the output step is not positive.
    /// - [`ConfigError::InvalidSampleTime`] if the sample time is zero.
    /// - [`ConfigError::InvalidLookback`] if the lookback is shorter than the sample time, or spans
    ///   more than 100 000 samples.
    /// - [`ConfigError::InvalidOutputLimits`] if `output_min >= output_max` or either is NaN.
    /// - [`ConfigError::InvalidNoiseband`] if the noise band is negative or not finite.
    pub fn new(config: RelayConfig<F>) -> Result<Self, ConfigError> {
        config.validate()?;
        // Validation bounds the ratio to [1, MAX_LOOKBACK_SAMPLES]
        let window = round_half_even(config.window_ratio()).max(1.0) as usize;
        Ok(RelayAutotuner {
            config,
            inputs: VecDeque::with_capacity(window),
            window,
            peaks: VecDeque::with_capacity(PEAK_HISTORY),
            peak_timestamps: VecDeque::with_capacity(PEAK_HISTORY),
            state: RelayState::Off,
            output: F::zero(),
            initial_output: F::zero(),
            last_run: None,
            peak_type: 0,
            peak_count: 0,
            induced_amplitude: F::zero(),
            ultimate_gain: F::zero(),
            ultimate_period: F::zero(),
        })
    }

    /// Returns the configuration.
    pub fn config(&self) -> &RelayConfig<F> {
        &self.config
    }

    /// Returns the phase of the experiment.
    pub fn state(&self) -> RelayState {
        self.state
    }

    /// Returns the output to apply to the actuator.
    pub fn output(&self) -> F {
        self.output
    }

    /// Returns the number of peaks detected so far.
    pub fn peak_count(&self) -> usize {
        self.peak_count
    }

    /// Returns the measured ultimate gain, or zero before the experiment succeeded.
    pub fn ultimate_gain(&self) -> F {
        self.ultimate_gain
    }

    /// Returns the measured ultimate period in seconds, or zero before the experiment
    /// succeeded.
    pub fn ultimate_period(&self) -> F {
        self.ultimate_period
    }

    /// Returns per-second PID gains for `rule`, or `None` unless the experiment succeeded.
    ///
    /// Convert them with [`Gains::from_continuous`] before handing them to the adaptive
    /// controller.
    pub fn pid_parameters(&self, rule: TuningRule) -> Option<Gains<F>> {
        if self.state != RelayState::Succeeded {
            return None;
        }
        let (a, b, c) = rule.divisors();
        let kp = self.ultimate_gain / constant(a);
        let ki = kp / (self.ultimate_period / constant(b));
        let kd = kp * (self.ultimate_period / constant(c));
        Some(Gains::new(kp, ki, kd))
    }

    /// Feeds one input sample taken at `timestamp` and returns the resulting phase.
    ///
    /// Calls made before one sample time has elapsed since the previous sample are ignored.
    /// Calling again after the experiment finished starts a new one.
    pub fn run(&mut self, input: F, timestamp: I) -> RelayState {
        if matches!(
            self.state,
            RelayState::Off | RelayState::Succeeded | RelayState::Failed
        ) {
            self.restart(timestamp);
        } else if let Some(last_run) = self.last_run {
            if timestamp.duration_since(last_run) < self.config.sample_time {
                return self.state;
            }
        }
        self.last_run = Some(timestamp);

        self.switch_relay(input);

        self.output = match self.state {
            RelayState::RelayStepUp => self.initial_output + self.config.output_step,
            RelayState::RelayStepDown => self.initial_output - self.config.output_step,
            _ => self.output,
        };
        self.output = num_traits::clamp(self.output, self.config.output_min, self.config.output_max);

        let is_max = self.inputs.iter().all(|&value| input >= value);
        let is_min = self.inputs.iter().all(|&value| input <= value);

        if self.inputs.len() == self.window {
            self.inputs.pop_front();
        }
        self.inputs.push_back(input);

        // Extremes are not trustworthy until the window is full
        if self.inputs.len() < self.window {
            return self.state;
        }

        let mut inflection = false;
        if is_max {
            inflection = self.peak_type == -1;
            self.peak_type = 1;
        } else if is_min {
            inflection = self.peak_type == 1;
            self.peak_type = -1;
        }

        if inflection {
            self.peak_count += 1;
            push_bounded(&mut self.peaks, input, PEAK_HISTORY);
            push_bounded(&mut self.peak_timestamps, timestamp, PEAK_HISTORY);
            tracing::debug!(
                peak = as_f64(input),
                peak_count = self.peak_count,
                "relay found peak"
            );
        }

        // Convergence of the amplitude is assessed on the last four peaks, i.e. 1.5 cycles
        self.induced_amplitude = F::zero();
        if inflection && self.peak_count > 4 {
            self.check_convergence();
        }

        if self.peak_count >= MAX_PEAKS {
            self.output = F::zero();
            self.state = RelayState::Failed;
            tracing::debug!(peak_count = self.peak_count, "relay autotune failed");
            return self.state;
        }

        if self.state == RelayState::Succeeded {
            self.finish();
        }
        self.state
    }

    fn restart(&mut self, timestamp: I) {
        self.peak_type = 0;
        self.peak_count = 0;
        self.output = F::zero();
        self.initial_output = F::zero();
        self.ultimate_gain = F::zero();
        self.ultimate_period = F::zero();
        self.inputs.clear();
        self.peaks.clear();
        self.peak_timestamps.clear();
        self.peak_timestamps.push_back(timestamp);
        self.state = RelayState::RelayStepUp;
    }

    fn switch_relay(&mut self, input: F) {
        let next = match self.state {
            RelayState::RelayStepUp if input > self.config.setpoint + self.config.noiseband => {
                RelayState::RelayStepDown
            }
            RelayState::RelayStepDown if input < self.config.setpoint - self.config.noiseband => {
                RelayState::RelayStepUp
            }
            state => state,
        };
        if next != self.state {
            tracing::debug!(input = as_f64(input), state = ?next, "relay switched");
            self.state = next;
        }
    }

    fn check_convergence(&mut self) {
        let Some(&pivot) = self.peaks.get(self.peaks.len().saturating_sub(2)) else {
            return;
        };
        let mut abs_max = pivot;
        let mut abs_min = pivot;
        for (current, next) in self
            .peaks
            .iter()
            .zip(self.peaks.iter().skip(1))
            .take(self.peaks.len().saturating_sub(2))
        {
            self.induced_amplitude = self.induced_amplitude + (*current - *next).abs();
            abs_max = abs_max.max(*current);
            abs_min = abs_min.min(*current);
        }
        self.induced_amplitude = self.induced_amplitude / constant(6.0);

        let half_swing = constant::<F>(0.5) * (abs_max - abs_min);
        let deviation = (half_swing - self.induced_amplitude) / self.induced_amplitude;
        tracing::debug!(
            amplitude = as_f64(self.induced_amplitude),
            deviation = as_f64(deviation),
            "relay amplitude"
        );

        // NaN when all peaks coincide, which never converges
        if deviation < constant(PEAK_AMPLITUDE_TOLERANCE) {
            self.state = RelayState::Succeeded;
        }
    }

    fn finish(&mut self) {
        self.output = F::zero();

        let pi: F = constant(core::f64::consts::PI);
        let four: F = constant(4.0);
        self.ultimate_gain = four * self.config.output_step / (self.induced_amplitude * pi);

        let period = |from: usize, to: usize| -> f64 {
            match (self.peak_timestamps.get(from), self.peak_timestamps.get(to)) {
                (Some(start), Some(end)) => end.duration_since(*start).as_secs_f64(),
                _ => 0.0,
            }
        };
        let seconds = 0.5 * (period(1, 3) + period(2, 4));
        self.ultimate_period = constant(seconds);

        tracing::debug!(
            ultimate_gain = as_f64(self.ultimate_gain),
            ultimate_period = seconds,
            "relay autotune succeeded"
        );
    }
}

fn push_bounded<T>(queue: &mut VecDeque<T>, value: T, capacity: usize) {
    if queue.len() == capacity {
        queue.pop_front();
    }
    queue.push_back(value);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::Millis;

    #[test]
    fn test_config_validation() {
        let base = RelayConfig::<f64>::new(20.0);
        let cases = [
            (
                RelayConfig {
                    setpoint: f64::NAN,
                    ..base
                },
                ConfigError::InvalidSetpoint,
            ),
            (
                RelayConfig {
                    output_step: 0.0,
                    ..base
                },
                ConfigError::InvalidOutputStep,
            ),
            (
                RelayConfig {
                    sample_time: Duration::ZERO,
                    ..base
                },
                ConfigError::InvalidSampleTime,
            ),
            (
                RelayConfig {
                    lookback: Duration::from_secs(1),
                    ..base
                },
                ConfigError::InvalidLookback,
            ),
            (
                RelayConfig {
                    sample_time: Duration::from_nanos(1),
                    lookback: Duration::from_secs(u64::MAX / 2),
                    ..base
                },
                ConfigError::InvalidLookback,
            ),
            (
                RelayConfig {
                    output_min: 5.0,
                    output_max: 5.0,
                    ..base
                },
                ConfigError::InvalidOutputLimits,
            ),
            (
                RelayConfig {
                    noiseband: -0.1,
                    ..base
                },
                ConfigError::InvalidNoiseband,
            ),
        ];
        for (config, expected) in cases {
            assert_eq!(
                RelayAutotuner::<Millis, f64>::new(config).map(|_| ()),
                Err(expected)
            );
        }
        assert!(RelayAutotuner::<Millis, f64>::new(base).is_ok());
    }

    #[test]
    fn test_relay_switches_around_noiseband() {
        let mut config = RelayConfig::new(20.0);
        config.sample_time = Duration::from_secs(1);
        config.lookback = Duration::from_secs(3);
        config.output_min = -5.0;
        let mut tuner = RelayAutotuner::new(config).unwrap();

        assert_eq!(tuner.state(), RelayState::Off);
        assert_eq!(tuner.run(19.0, Millis(0)), RelayState::RelayStepUp);
        assert_eq!(tuner.output(), 10.0);

        // Early calls are ignored
        assert_eq!(tuner.run(30.0, Millis(500)), RelayState::RelayStepUp);
        assert_eq!(tuner.output(), 10.0);

        // Inside the noise band nothing changes
        assert_eq!(tuner.run(20.4, Millis(1000)), RelayState::RelayStepUp);
        assert_eq!(tuner.run(20.6, Millis(2000)), RelayState::RelayStepDown);
        // Clamped to the output limits
        assert_eq!(tuner.output(), -5.0);
        assert_eq!(tuner.run(19.6, Millis(3000)), RelayState::RelayStepDown);
        assert_eq!(tuner.run(19.4, Millis(4000)), RelayState::RelayStepUp);
        assert_eq!(tuner.pid_parameters(TuningRule::ZieglerNichols), None);
    }

    #[test]
    fn test_window_rounds_ties_to_even() {
        let window = |lookback_ms| {
            let mut config = RelayConfig::<f64>::new(20.0);
            config.sample_time = Duration::from_secs(1);
            config.lookback = Duration::from_millis(lookback_ms);
            RelayAutotuner::<Millis, f64>::new(config).unwrap().window
        };
        assert_eq!(window(2500), 2);
        assert_eq!(window(3500), 4);
        assert_eq!(window(2600), 3);
        assert_eq!(window(1000), 1);

        assert_eq!(round_half_even(0.5), 0.0);
        assert_eq!(round_half_even(-2.5), -2.0);
        assert_eq!(round_half_even(-3.5), -4.0);
    }

    #[test]
    fn test_tuning_rule_divisors() {
        assert_eq!(TuningRule::default(), TuningRule::ZieglerNichols);
        assert_eq!(TuningRule::ALL.len(), 7);
        for rule in TuningRule::ALL {
            let (a, b, c) = rule.divisors();
            assert!(a > 0.0 && b > 0.0 && c > 0.0);
        }
    }
}
