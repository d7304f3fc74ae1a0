#![warn(missing_docs)]

//! # Adaptive PID Controller Library
//!
//! This library provides a self-tuning discrete PID (Proportional-Integral-Derivative)
//! controller for slow regulation loops such as greenhouse heating, humidification and CO2
//! dosing. Instead of fixed, hand-tuned gains, the controller adjusts Kp, Ki and Kd online from
//! the trend of the error it observes.
//!
//! ## Features
//!
//! - Pure, replayable control law:
//!   - `step(state, error) -> (output, state)` holds no hidden state, so any number of loops
//!     can share one controller and logged error sequences replay bit-for-bit offline.
//!   - Non-finite inputs are rejected without touching the state, so the caller can keep
//!     commanding the last known-good output.
//!
//! - Bounded online gain adaptation:
//!   - Pluggable [`tuning::TuningStrategy`] with a smooth default heuristic and a
//!     gap-following alternative.
//!   - Per-gain limits, exact clamping and a per-step change bound.
//!   - Anti reset-windup: clamped integrator and output.
//!
//! - Starting gains from a relay experiment ([`relay`], `std` only) with the classic
//!   Ziegler-Nichols family of tuning rules.
//!
//! ## Usage
//!
//! ### Functional controller
//!
//! ```rust
//! use adaptive_pid::pid::{AutotuneConfigBuilder, FuncAdaptivePid};
//!
//! let config = AutotuneConfigBuilder::default()
//!     .setpoint(30.0)
//!     .kp(1.0)
//!     .ki(0.1)
//!     .kd(0.01)
//!     .gain_limits(0.0, 10.0)
//!     .build()
//!     .expect("Invalid controller config");
//! let pid = FuncAdaptivePid::new(config);
//! let mut state = pid.initial_state();
//!
//! let mut error = 10.0;
//! for _ in 0..20 {
//!     // Map the output onto a relay duty cycle or PWM percentage here
//!     let (_output, next) = pid.step(state, error).expect("finite error");
//!     state = next;
//!     error *= 0.6;
//! }
//! assert!(state.gains().kp < 1.0);
//! ```
//!
//! ### Stateful controller
//!
//! ```rust
//! use adaptive_pid::pid::{AdaptivePidController, AutotuneConfigBuilder};
//!
//! let config = AutotuneConfigBuilder::default()
//!     .setpoint(24.0)
//!     .output_limits(0.0, 100.0)
//!     .build()
//!     .unwrap();
//! let mut pid = AdaptivePidController::new(config);
//!
//! let duty = pid.step_measurement(21.5).unwrap();
//! assert!(duty > 0.0);
//!
//! // A broken sensor reading is rejected and the last output is kept
//! assert!(pid.step_measurement(f64::NAN).is_err());
//! assert_eq!(pid.output(), duty);
//! ```
//!
//! ## License
//!
#![no_std]

#[cfg(feature = "std")]
extern crate std;

use num_traits::float::FloatCore;

/// The adaptive PID controller, its configuration and per-loop state.
pub mod pid;

/// Gain adaptation policies.
pub mod tuning;

/// Lazy, restartable sequences of readings and errors.
pub mod signal;

/// The module containing time-related utilities for the relay experiment.
pub mod time;

/// Relay (Åström-Hägglund) autotuning experiment for starting gains.
#[cfg(feature = "std")]
pub mod relay;

#[doc(hidden)]
#[cfg(feature = "simulation")]
pub mod sim;

#[doc = include_str!("../README.md")]
#[cfg(doctest)]
pub struct ReadmeDoctests;

/// Converts a literal into `F`.
pub(crate) fn constant<F: FloatCore>(value: f64) -> F {
    num_traits::cast(value).unwrap_or_else(F::nan)
}

/// Widens a value for structured logging.
pub(crate) fn as_f64<F: FloatCore>(value: F) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}
