//! Heats a simulated greenhouse: a relay experiment picks the starting gains, then the adaptive
//! controller holds the air temperature.
//! This example requires the `--features simulation` flag to be enabled.
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

#[cfg(feature = "simulation")]
pub fn main() {
    use std::time::Duration;

    use adaptive_pid::pid::{AutotuneConfigBuilder, FuncAdaptivePid, GainLimits, Gains};
    use adaptive_pid::relay::{RelayAutotuner, RelayConfig, TuningRule};
    use adaptive_pid::sim;
    use adaptive_pid::time::Seconds;

    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "greenhouse_heater=info,adaptive_pid=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    const SETPOINT: f64 = 25.0;
    const SAMPLE_TIME_S: f64 = 1.0;
    let sample_time = Duration::from_secs_f64(SAMPLE_TIME_S);

    let mdl = sim::GreenhouseThermal::default();
    let mut x = mdl.ambient_state();
    let mut now = Seconds(0.0);

    // Relay experiment around the setpoint
    let mut relay_config = RelayConfig::new(SETPOINT);
    relay_config.sample_time = sample_time;
    relay_config.lookback = Duration::from_secs(30);
    relay_config.output_min = 0.0;
    relay_config.output_max = 100.0;
    let mut relay = RelayAutotuner::new(relay_config).unwrap();

    let mut seeded = None;
    for _ in 0..20_000 {
        let state = relay.run(mdl.h(x), now);
        if state.is_finished() {
            seeded = relay.pid_parameters(TuningRule::TyreusLuyben);
            tracing::info!(
                ?state,
                ultimate_gain = relay.ultimate_gain(),
                ultimate_period = relay.ultimate_period(),
                elapsed_s = now.as_secs_f64(),
                "relay experiment finished"
            );
            break;
        }
        let duty = relay.output();
        x = sim::rk4_step(|x| mdl.f(x, duty), x, SAMPLE_TIME_S);
        now = now + sample_time;
    }

    let limits = GainLimits::new(Gains::new(0.1, 0.01, 0.0), Gains::new(8.0, 0.5, 2.0)).unwrap();
    let initial = seeded
        .map(|g| limits.clamp(Gains::from_continuous(g.kp, g.ki, g.kd, sample_time)))
        .unwrap_or(Gains::new(1.0, 0.1, 0.01));
    tracing::info!(kp = initial.kp, ki = initial.ki, kd = initial.kd, "starting gains");

    let config = AutotuneConfigBuilder::default()
        .setpoint(SETPOINT)
        .gains(initial)
        .gain_bounds(limits.min(), limits.max())
        .output_limits(0.0, 100.0)
        .sample_time(sample_time)
        .build()
        .unwrap();
    let pid = FuncAdaptivePid::new(config);
    let mut state = pid.initial_state();

    for step in 0..4 * 3600 {
        let measured = mdl.h(x);
        let duty = match pid.step_measurement(state, measured) {
            Ok((duty, next)) => {
                state = next;
                duty
            }
            Err(err) => {
                tracing::warn!(%err, "holding last duty");
                state.output()
            }
        };
        x = sim::rk4_step(|x| mdl.f(x, duty), x, SAMPLE_TIME_S);

        if step % 600 == 0 {
            let gains = state.gains();
            tracing::info!(
                minute = step / 60,
                air = measured,
                mass = x[1],
                duty,
                kp = gains.kp,
                ki = gains.ki,
                kd = gains.kd
            );
        }
    }
}

#[cfg(not(feature = "simulation"))]
fn main() {
    eprintln!("This example requires `--features simulation` to run.");
}
