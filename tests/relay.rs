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

#![cfg(feature = "std")]

use std::collections::VecDeque;
use std::time::Duration;

use adaptive_pid::pid::{AutotuneConfigBuilder, Gains};
use adaptive_pid::relay::{RelayAutotuner, RelayConfig, RelayState, TuningRule};
use adaptive_pid::time::Millis;

use approx::assert_relative_eq;

/// First order plus dead time process, `tau y' = gain * u(t - delay) - y`, sampled once per
/// second.
struct DeadTimeProcess {
    tau: f64,
    gain: f64,
    value: f64,
    pending: VecDeque<f64>,
}

impl DeadTimeProcess {
    fn new(tau: f64, delay_samples: usize) -> Self {
        DeadTimeProcess {
            tau,
            gain: 1.0,
            value: 0.0,
            pending: VecDeque::from(vec![0.0; delay_samples]),
        }
    }

    fn advance(&mut self, command: f64) {
        self.pending.push_back(command);
        let u = self.pending.pop_front().unwrap();
        self.value += 1.0 / self.tau * (self.gain * u - self.value);
    }
}

fn relay_config() -> RelayConfig<f64> {
    let mut config = RelayConfig::new(0.0);
    config.sample_time = Duration::from_secs(1);
    config.lookback = Duration::from_secs(10);
    config
}

/// Runs the experiment to completion and returns the tuner with the sample count it took.
fn run_experiment(process: &mut DeadTimeProcess) -> (RelayAutotuner<Millis, f64>, u64) {
    let mut tuner = RelayAutotuner::new(relay_config()).unwrap();
    for k in 0..2000 {
        if tuner.run(process.value, Millis(k * 1000)).is_finished() {
            return (tuner, k);
        }
        process.advance(tuner.output());
    }
    panic!("relay experiment did not finish");
}

#[test]
fn test_relay_experiment_on_slow_process() {
    let mut process = DeadTimeProcess::new(20.0, 3);
    let (tuner, samples) = run_experiment(&mut process);

    assert_eq!(tuner.state(), RelayState::Succeeded);
    assert_eq!(samples, 61);
    assert_eq!(tuner.peak_count(), 6);
    assert_eq!(tuner.output(), 0.0);
    assert_relative_eq!(tuner.ultimate_gain(), 18.37379448208434, epsilon = 1e-9);
    assert_eq!(tuner.ultimate_period(), 16.0);

    let zn = tuner.pid_parameters(TuningRule::ZieglerNichols).unwrap();
    assert_relative_eq!(zn.kp, 0.540405720061304, epsilon = 1e-9);
    assert_relative_eq!(zn.ki, 1.35101430015326, epsilon = 1e-9);
    assert_relative_eq!(zn.kd, 0.05404057200613041, epsilon = 1e-9);

    let tl = tuner.pid_parameters(TuningRule::TyreusLuyben).unwrap();
    assert_relative_eq!(tl.kp, 0.4175862382291895, epsilon = 1e-9);
    assert_relative_eq!(tl.ki, 0.2348922590039191, epsilon = 1e-9);
    assert_relative_eq!(tl.kd, 0.0530268239021193, epsilon = 1e-9);
}

#[test]
fn test_relay_experiment_on_fast_process() {
    let mut process = DeadTimeProcess::new(10.0, 2);
    let (tuner, samples) = run_experiment(&mut process);

    assert_eq!(tuner.state(), RelayState::Succeeded);
    assert_eq!(samples, 355);
    assert_relative_eq!(tuner.ultimate_gain(), 4.945116757846765, epsilon = 1e-9);
    assert_eq!(tuner.ultimate_period(), 10.0);
}

#[test]
fn test_every_rule_yields_usable_gains() {
    let mut process = DeadTimeProcess::new(20.0, 3);
    let (tuner, _) = run_experiment(&mut process);

    for rule in TuningRule::ALL {
        let gains = tuner.pid_parameters(rule).unwrap();
        assert!(gains.is_finite());
        assert!(gains.kp > 0.0 && gains.ki > 0.0 && gains.kd > 0.0);

        // Seed the adaptive controller with per-sample gains
        let seeded = Gains::from_continuous(gains.kp, gains.ki, gains.kd, Duration::from_secs(1));
        let config = AutotuneConfigBuilder::default()
            .gains(seeded)
            .gain_limits(0.0, 10.0)
            .sample_time(Duration::from_secs(1))
            .build();
        assert!(config.is_ok(), "{rule:?}");
    }
}

#[test]
fn test_finished_experiment_restarts_on_next_sample() {
    let mut process = DeadTimeProcess::new(20.0, 3);
    let (mut tuner, samples) = run_experiment(&mut process);
    assert!(tuner.pid_parameters(TuningRule::Brewing).is_some());

    let state = tuner.run(process.value, Millis((samples + 1) * 1000));
    assert_eq!(state, RelayState::RelayStepUp);
    assert_eq!(tuner.peak_count(), 0);
    assert_eq!(tuner.pid_parameters(TuningRule::Brewing), None);
}
