//! Reduction of a layer stack to the analogous model of VDI 6007.
//!
//! Each homogeneous layer is a two-port whose transfer matrix, for a harmonic
//! excitation with angular frequency `omega`, is
//!
//! ```text
//! | cosh(k d)            sinh(k d) / (lambda k) |      k = sqrt(i omega rho c / lambda)
//! | lambda k sinh(k d)   cosh(k d)              |
//! ```
//!
//! The complex entries are written as real 2x2 blocks, so every layer becomes a
//! real 4x4 matrix and the whole element is the product of its layers taken in
//! traversal order. R1/C1 describe the side of the first layer, R2/C2 the side of
//! the last one and R3 is what remains of the conduction resistance in between.

use itertools::izip;
use nalgebra::Matrix4;
use uom::si::{
    f64::{HeatCapacity, Time},
    heat_capacity::joule_per_kelvin,
    time::{day, second},
};

use crate::errors::{ElementError, ElementResult};

/// Per-layer material data in conduction-path order, SI units.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct LayerArrays {
    /// [kg/m^3]
    pub density: Vec<f64>,
    /// [W/(m.K)]
    pub thermal_conductivity: Vec<f64>,
    /// [J/(kg.K)]
    pub heat_capacity: Vec<f64>,
    /// [m]
    pub thickness: Vec<f64>,
}

impl LayerArrays {
    pub fn len(&self) -> usize {
        self.thickness.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thickness.is_empty()
    }

    pub fn reversed(&self) -> LayerArrays {
        let rev = |v: &Vec<f64>| v.iter().rev().copied().collect::<Vec<_>>();
        LayerArrays {
            density: rev(&self.density),
            thermal_conductivity: rev(&self.thermal_conductivity),
            heat_capacity: rev(&self.heat_capacity),
            thickness: rev(&self.thickness),
        }
    }

    /// Sum of thickness / conductivity over all layers [m^2.K/W]
    pub fn resistance_per_area(&self) -> f64 {
        self.thickness
            .iter()
            .zip(&self.thermal_conductivity)
            .map(|(d, lambda)| d / lambda)
            .sum()
    }

    fn validate(&self) -> ElementResult<()> {
        let n = self.len();
        if self.density.len() != n
            || self.thermal_conductivity.len() != n
            || self.heat_capacity.len() != n
        {
            return Err(ElementError::invalid_configuration(
                "layer arrays have different lengths",
            ));
        }
        for (i, (rho, lambda, c, d)) in izip!(
            &self.density,
            &self.thermal_conductivity,
            &self.heat_capacity,
            &self.thickness
        )
        .enumerate()
        {
            if [rho, lambda, c, d].iter().any(|v| !(v.is_finite() && **v > 0.0)) {
                return Err(ElementError::invalid_configuration(format!(
                    "layer {i} needs positive density, conductivity, heat capacity and thickness"
                )));
            }
        }
        Ok(())
    }
}

/// Period of the harmonic excitation used for the reduction (`t_bt` in VDI 6007).
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ReductionSettings {
    pub period: Time,
}

impl Default for ReductionSettings {
    fn default() -> Self {
        ReductionSettings {
            period: Time::new::<day>(7.0),
        }
    }
}

impl ReductionSettings {
    fn omega(&self) -> f64 {
        2.0 * std::f64::consts::PI / self.period.get::<second>()
    }
}

/// Three resistors and two (three with the correction) capacitors of the
/// analogous model. Resistances are in K/W.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct EquivalentCircuit {
    pub r1: f64,
    pub r2: f64,
    pub r3: f64,
    pub c1: HeatCapacity,
    pub c2: HeatCapacity,
    /// C1 corrected for asymmetric thermal load
    pub c1_korr: HeatCapacity,
}

impl EquivalentCircuit {
    /// Conduction resistance of the whole network, R1 + R2 + R3 [K/W]
    pub fn conduction_resistance(&self) -> f64 {
        self.r1 + self.r2 + self.r3
    }

    /// Surface-to-surface resistance plus both film resistances [K/W]
    pub fn total_resistance(&self, r_inner_comb: f64, r_outer_comb: f64) -> f64 {
        r_inner_comb + self.conduction_resistance() + r_outer_comb
    }

    /// Exchange the two sides of the circuit, R3 stays in the middle.
    pub fn swap_sides(&mut self) {
        std::mem::swap(&mut self.r1, &mut self.r2);
        std::mem::swap(&mut self.c1, &mut self.c2);
    }

    /// Element without thermal mass: the whole conduction resistance sits in R1.
    pub fn massless(layers: &LayerArrays, area: f64) -> ElementResult<EquivalentCircuit> {
        check_area(area)?;
        layers.validate()?;
        Ok(EquivalentCircuit {
            r1: layers.resistance_per_area() / area,
            ..Default::default()
        })
    }

    /// Reduce the layer stack of an element with the given area [m^2].
    ///
    /// An empty stack is a valid massless element with no resistance at all.
    pub fn reduce(
        layers: &LayerArrays,
        area: f64,
        settings: &ReductionSettings,
    ) -> ElementResult<EquivalentCircuit> {
        check_area(area)?;
        layers.validate()?;
        if layers.is_empty() {
            return Ok(EquivalentCircuit::default());
        }

        let omega = settings.omega();
        let m = izip!(
            &layers.density,
            &layers.thermal_conductivity,
            &layers.heat_capacity,
            &layers.thickness
        )
        .map(|(rho, lambda, c, d)| layer_matrix(d / lambda, c * rho * d, omega))
        .fold(Matrix4::<f64>::identity(), |acc, a| acc * a);

        let r_conduc = layers.resistance_per_area() / area;

        let a = m[(3, 3)] - 1.0;
        let b = m[(0, 0)] - 1.0;
        let r1 = (a * m[(0, 2)] + m[(2, 3)] * m[(0, 3)]) / (a.powi(2) + m[(2, 3)].powi(2)) / area;
        let r2 = (b * m[(0, 2)] + m[(0, 1)] * m[(0, 3)]) / (b.powi(2) + m[(0, 1)].powi(2)) / area;
        let c1 = area * (a.powi(2) + m[(2, 3)].powi(2))
            / (omega * (m[(0, 2)] * m[(2, 3)] - a * m[(0, 3)]));
        let c2 = area * (b.powi(2) + m[(0, 1)].powi(2))
            / (omega * (m[(0, 2)] * m[(0, 1)] - b * m[(0, 3)]));
        let r3 = r_conduc - r1 - r2;

        let c1_korr = (r_conduc * area - m[(0, 2)] * m[(3, 3)] - m[(0, 3)] * m[(2, 3)])
            / (m[(3, 3)] * m[(0, 3)] - m[(0, 2)] * m[(2, 3)])
            / (omega * r1);

        let circuit = EquivalentCircuit {
            r1,
            r2,
            r3,
            c1: HeatCapacity::new::<joule_per_kelvin>(c1),
            c2: HeatCapacity::new::<joule_per_kelvin>(c2),
            c1_korr: HeatCapacity::new::<joule_per_kelvin>(c1_korr),
        };
        if [r1, r2, r3, c1, c2, c1_korr].iter().any(|v| !v.is_finite()) {
            return Err(ElementError::invalid_configuration(format!(
                "reduction produced non-finite values: {circuit:?}"
            )));
        }
        Ok(circuit)
    }
}

fn check_area(area: f64) -> ElementResult<()> {
    if area.is_finite() && area > 0.0 {
        Ok(())
    } else {
        Err(ElementError::invalid_configuration(format!(
            "area must be positive, got {area}"
        )))
    }
}

/// Real 4x4 form of the complex transfer matrix of one layer with resistance
/// `r` [m^2.K/W] and capacity `c` [J/(m^2.K)].
fn layer_matrix(r: f64, c: f64, omega: f64) -> Matrix4<f64> {
    let x = (0.5 * omega * r * c).sqrt();
    let (ch, sh, co, si) = (x.cosh(), x.sinh(), x.cos(), x.sin());

    let re11 = ch * co;
    let im11 = sh * si;
    let re12 = r / (2.0 * x) * (ch * si + sh * co);
    let im12 = r / (2.0 * x) * (ch * si - sh * co);
    let re21 = -x / r * (ch * si - sh * co);
    let im21 = x / r * (ch * si + sh * co);

    #[rustfmt::skip]
    let matrix = Matrix4::new(
        re11,  im11,  re12,  im12,
        -im11, re11,  -im12, re12,
        re21,  im21,  re11,  im11,
        -im21, re21,  -im11, re11,
    );
    matrix
}
