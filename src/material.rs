use log::warn;
use serde::{Deserialize, Serialize};
use uom::si::{
    f64::{MassDensity, Ratio, SpecificHeatCapacity, ThermalConductivity},
    mass_density::kilogram_per_cubic_meter,
    ratio::ratio,
    specific_heat_capacity::joule_per_kilogram_kelvin,
    thermal_conductivity::watt_per_meter_kelvin,
};

use crate::errors::{ElementError, ElementResult};

#[cfg(test)]
use proptest::{
    arbitrary::Arbitrary,
    strategy::{BoxedStrategy, Strategy},
};

/// Heat capacity used when a material doesn't specify one, 1.0 kJ/(kg.K)
pub const DEFAULT_HEAT_CAPACITY_J_PER_KG_K: f64 = 1000.0;

/// Static physical properties of a layer material.
///
/// Density and conductivity are guaranteed to be positive, the heat capacity is
/// never zero (see [`Material::new`]).
#[derive(Clone, Debug, PartialEq)]
pub struct Material {
    pub name: String,
    pub material_id: Option<String>,
    density: MassDensity,
    thermal_conductivity: ThermalConductivity,
    heat_capacity: SpecificHeatCapacity,
    pub solar_absorptance: Ratio,
    pub ir_emissivity: Ratio,
    pub transmittance: Ratio,
}

impl Material {
    /// Create a material, rejecting zero density or conductivity.
    /// A missing (or zero) heat capacity falls back to 1.0 kJ/(kg.K) with a warning.
    pub fn new(
        name: impl Into<String>,
        density: MassDensity,
        thermal_conductivity: ThermalConductivity,
        heat_capacity: Option<SpecificHeatCapacity>,
    ) -> ElementResult<Material> {
        let name = name.into();
        let rho = density.get::<kilogram_per_cubic_meter>();
        let lambda = thermal_conductivity.get::<watt_per_meter_kelvin>();
        if !(rho.is_finite() && rho > 0.0 && lambda.is_finite() && lambda > 0.0) {
            return Err(ElementError::InsufficientMaterial { name });
        }

        let heat_capacity = match heat_capacity {
            Some(c) if c.get::<joule_per_kilogram_kelvin>() != 0.0 => {
                if !c.is_finite() || c.get::<joule_per_kilogram_kelvin>() < 0.0 {
                    return Err(ElementError::invalid_input(
                        "heat_capacity",
                        c.get::<joule_per_kilogram_kelvin>(),
                        "must be a positive number",
                    ));
                }
                c
            }
            _ => {
                warn!(
                    "Material {:?} heat capacity not specified. 1.0 kJ/(kg*K) will be used.",
                    name
                );
                SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(
                    DEFAULT_HEAT_CAPACITY_J_PER_KG_K,
                )
            }
        };

        Ok(Material {
            name,
            material_id: None,
            density,
            thermal_conductivity,
            heat_capacity,
            solar_absorptance: Ratio::new::<ratio>(0.7),
            ir_emissivity: Ratio::new::<ratio>(0.9),
            transmittance: Ratio::new::<ratio>(0.0),
        })
    }

    pub fn with_optical_properties(
        mut self,
        solar_absorptance: Ratio,
        ir_emissivity: Ratio,
        transmittance: Ratio,
    ) -> Self {
        self.solar_absorptance = solar_absorptance;
        self.ir_emissivity = ir_emissivity;
        self.transmittance = transmittance;
        self
    }

    pub fn with_id(mut self, material_id: impl Into<String>) -> Self {
        self.material_id = Some(material_id.into());
        self
    }

    pub fn density(&self) -> MassDensity {
        self.density
    }

    pub fn thermal_conductivity(&self) -> ThermalConductivity {
        self.thermal_conductivity
    }

    pub fn heat_capacity(&self) -> SpecificHeatCapacity {
        self.heat_capacity
    }

    /// Return a default implementation of air, used for zone heat capacities
    /// if the model doesn't define its own.
    pub fn default_air() -> Material {
        Material {
            name: "air".into(),
            material_id: None,
            density: MassDensity::new::<kilogram_per_cubic_meter>(1.199),
            thermal_conductivity: ThermalConductivity::new::<watt_per_meter_kelvin>(0.026),
            heat_capacity: SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(1012.0),
            solar_absorptance: Ratio::new::<ratio>(0.0),
            ir_emissivity: Ratio::new::<ratio>(0.0),
            transmittance: Ratio::new::<ratio>(1.0),
        }
    }
}

#[cfg(test)]
impl Arbitrary for Material {
    type Parameters = ();
    type Strategy = BoxedStrategy<Material>;

    /// Physically plausible building materials, from insulation to concrete.
    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        ("[a-z]{1,8}", 10f64..2500f64, 0.02f64..3f64, 0.1f64..3f64)
            .prop_map(|tuple| {
                Material::new(
                    tuple.0,
                    MassDensity::new::<kilogram_per_cubic_meter>(tuple.1),
                    ThermalConductivity::new::<watt_per_meter_kelvin>(tuple.2),
                    Some(SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(
                        tuple.3 * 1000.0,
                    )),
                )
                .unwrap()
            })
            .boxed()
    }
}

/// Partial material description used for custom layers.
///
/// `id` or `name` select a catalog material as the starting point, every other
/// field overrides the catalog value when present.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct MaterialSpec {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub density: Option<MassDensity>,
    #[serde(default)]
    pub thermal_conductivity: Option<ThermalConductivity>,
    #[serde(default)]
    pub heat_capacity: Option<SpecificHeatCapacity>,
    #[serde(default)]
    pub solar_absorptance: Option<Ratio>,
    #[serde(default)]
    pub ir_emissivity: Option<Ratio>,
    #[serde(default)]
    pub transmittance: Option<Ratio>,
}

impl MaterialSpec {
    /// Apply the overrides on top of `base` (the material resolved from the catalog,
    /// if any) and validate the result.
    pub fn resolve(&self, base: Option<&Material>) -> ElementResult<Material> {
        let name = self
            .name
            .clone()
            .or_else(|| base.map(|m| m.name.clone()))
            .unwrap_or_default();
        let density = self
            .density
            .or_else(|| base.map(Material::density))
            .unwrap_or_default();
        let thermal_conductivity = self
            .thermal_conductivity
            .or_else(|| base.map(Material::thermal_conductivity))
            .unwrap_or_default();
        let heat_capacity = self.heat_capacity.or_else(|| base.map(Material::heat_capacity));

        let mut material = Material::new(name, density, thermal_conductivity, heat_capacity)?;
        material.material_id = self
            .id
            .clone()
            .or_else(|| base.and_then(|m| m.material_id.clone()));
        if let Some(base) = base {
            material.solar_absorptance = base.solar_absorptance;
            material.ir_emissivity = base.ir_emissivity;
            material.transmittance = base.transmittance;
        }
        if let Some(value) = self.solar_absorptance {
            material.solar_absorptance = value;
        }
        if let Some(value) = self.ir_emissivity {
            material.ir_emissivity = value;
        }
        if let Some(value) = self.transmittance {
            material.transmittance = value;
        }
        Ok(material)
    }
}
