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

/// An endless error sequence that starts at `initial` and is multiplied by `factor` after
/// every sample: `e0, e0 * f, e0 * f * f, ...`.
///
/// Cloning or calling [`GeometricDecay::restart`] replays the sequence from the start, so the
/// same scenario can be fed to several controllers.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct GeometricDecay<F> {
    initial: F,
    factor: F,
    current: F,
}

impl<F: FloatCore> GeometricDecay<F> {
    /// Creates a sequence starting at `initial`.
    pub fn new(initial: F, factor: F) -> Self {
        GeometricDecay {
            initial,
            factor,
            current: initial,
        }
    }

    /// Rewinds to the first sample.
    pub fn restart(&mut self) {
        self.current = self.initial;
    }
}

impl<F: FloatCore> Iterator for GeometricDecay<F> {
    type Item = F;

    fn next(&mut self) -> Option<F> {
        let sample = self.current;
        self.current = self.current * self.factor;
        Some(sample)
    }
}

/// Turns a sequence of measured process values into errors against a setpoint.
#[derive(Clone, Debug)]
pub struct ErrorSignal<F, I> {
    setpoint: F,
    readings: I,
}

impl<F: FloatCore, I: Iterator<Item = F>> ErrorSignal<F, I> {
    /// Wraps `readings`; nothing is pulled from them until the signal is iterated.
    pub fn new<R>(setpoint: F, readings: R) -> Self
    where
        R: IntoIterator<IntoIter = I>,
    {
        ErrorSignal {
            setpoint,
            readings: readings.into_iter(),
        }
    }

    /// Returns the setpoint.
    pub fn setpoint(&self) -> F {
        self.setpoint
    }
}

impl<F: FloatCore, I: Iterator<Item = F>> Iterator for ErrorSignal<F, I> {
    type Item = F;

    fn next(&mut self) -> Option<F> {
        self.readings.next().map(|reading| self.setpoint - reading)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.readings.size_hint()
    }
}
