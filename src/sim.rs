use nalgebra as na;

/// Advances `x' = f(x)` by one classic fourth-order Runge-Kutta step of size `h`.
pub fn rk4_step<const N: usize>(
    f: impl Fn(na::SVector<f64, N>) -> na::SVector<f64, N>,
    x: na::SVector<f64, N>,
    h: f64,
) -> na::SVector<f64, N> {
    let k1 = f(x);
    let k2 = f(x + k1 * (h / 2.0));
    let k3 = f(x + k2 * (h / 2.0));
    let k4 = f(x + k3 * h);
    x + (k1 + k2 * 2.0 + k3 * 2.0 + k4) * (h / 6.0)
}

/// A two-node thermal model of a small greenhouse: the air volume, heated directly, exchanges
/// heat with the thermal mass (soil, benches, water barrels) and with the outside through the
/// envelope.
///
/// Temperatures are in °C, capacities in kJ/K, conductances in kW/K, and the control input is
/// the heater duty cycle in percent.
pub struct GreenhouseThermal {
    pub air_capacity: f64,
    pub mass_capacity: f64,
    pub air_mass_conductance: f64,
    pub envelope_conductance: f64,
    /// Heat delivered per percent of duty cycle.
    pub heater_gain: f64,
    pub ambient: f64,
}

impl Default for GreenhouseThermal {
    fn default() -> Self {
        GreenhouseThermal {
            air_capacity: 50.0,
            mass_capacity: 500.0,
            air_mass_conductance: 5.0,
            envelope_conductance: 2.0,
            heater_gain: 5.0,
            ambient: 10.0,
        }
    }
}

impl GreenhouseThermal {
    /// State derivative for the state `x = [air temperature, mass temperature]`:
    /// ```text
    /// Cₐ Tₐ' = k u - gₐₘ (Tₐ - Tₘ) - gₑ (Tₐ - T∞)
    /// Cₘ Tₘ' = gₐₘ (Tₐ - Tₘ)
    /// ```
    pub fn f(&self, x: na::Vector2<f64>, u: f64) -> na::Vector2<f64> {
        let (air, mass) = (x[0], x[1]);
        let to_mass = self.air_mass_conductance * (air - mass);
        let to_outside = self.envelope_conductance * (air - self.ambient);
        na::Vector2::new(
            (self.heater_gain * u - to_mass - to_outside) / self.air_capacity,
            to_mass / self.mass_capacity,
        )
    }

    /// The measured output is the air temperature.
    pub fn h(&self, x: na::Vector2<f64>) -> f64 {
        x[0]
    }

    /// Both nodes at ambient temperature.
    pub fn ambient_state(&self) -> na::Vector2<f64> {
        na::Vector2::new(self.ambient, self.ambient)
    }

    /// Duty cycle that holds the air at `temperature` in steady state.
    pub fn holding_duty(&self, temperature: f64) -> f64 {
        self.envelope_conductance * (temperature - self.ambient) / self.heater_gain
    }
}
