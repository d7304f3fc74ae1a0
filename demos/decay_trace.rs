//! Prints how the gains relax while the error decays geometrically.
//! Run with `RUST_LOG=adaptive_pid=trace` to see every step logged by the controller.
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

use adaptive_pid::pid::{AutotuneConfigBuilder, FuncAdaptivePid};
use adaptive_pid::signal::GeometricDecay;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "decay_trace=info,adaptive_pid=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AutotuneConfigBuilder::default()
        .setpoint(30.0)
        .kp(1.0)
        .ki(0.1)
        .kd(0.01)
        .gain_limits(0.0, 10.0)
        .build()
        .unwrap();
    let pid = FuncAdaptivePid::new(config);

    let errors = GeometricDecay::new(10.0, 0.6).take(20);
    let mut replay = pid.replay(pid.initial_state(), errors);
    for (step, record) in replay.by_ref().enumerate() {
        match record {
            Ok(record) => tracing::info!(
                step,
                error = record.error,
                output = record.output,
                kp = record.gains.kp,
                ki = record.gains.ki,
                kd = record.gains.kd
            ),
            Err(err) => tracing::warn!(step, %err, "sample rejected"),
        }
    }

    let state = replay.state();
    tracing::info!(
        integral = state.integral(),
        previous_error = ?state.previous_error(),
        "final state"
    );
}
