use std::rc::Rc;

use uom::si::{
    f64::{Area, HeatCapacity, Length},
    length::meter,
    thermal_conductivity::watt_per_meter_kelvin,
};

use crate::errors::{ElementError, ElementResult};
use crate::material::Material;

#[cfg(test)]
use proptest::{
    arbitrary::{any, Arbitrary},
    strategy::{BoxedStrategy, Strategy},
};

/// One slab of a building element. Its position in the owning element's layer
/// list is its index, 0 being the inner side.
#[derive(Clone, Debug, PartialEq)]
pub struct Layer {
    thickness: Length,
    pub material: Rc<Material>,
}

impl Layer {
    pub fn new(thickness: Length, material: Rc<Material>) -> ElementResult<Layer> {
        let t = thickness.get::<meter>();
        if !t.is_finite() || t <= 0.0 {
            return Err(ElementError::invalid_input(
                "thickness",
                t,
                "layer thickness must be positive",
            ));
        }
        Ok(Layer {
            thickness,
            material,
        })
    }

    pub fn thickness(&self) -> Length {
        self.thickness
    }

    /// Conductive resistance of a unit area of this layer [m^2.K/W]
    pub fn resistance_per_area(&self) -> f64 {
        self.thickness.get::<meter>()
            / self
                .material
                .thermal_conductivity()
                .get::<watt_per_meter_kelvin>()
    }

    pub fn heat_capacity(&self, area: Area) -> HeatCapacity {
        let volume = area * self.thickness;
        let material_mass = volume * self.material.density();
        material_mass * self.material.heat_capacity()
    }
}

#[cfg(test)]
impl Arbitrary for Layer {
    type Parameters = ();
    type Strategy = BoxedStrategy<Layer>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (any::<Material>(), 0.005f64..0.5f64)
            .prop_map(|(material, thickness)| {
                Layer::new(Length::new::<meter>(thickness), Rc::new(material)).unwrap()
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use uom::si::{
        area::square_meter,
        f64::{MassDensity, SpecificHeatCapacity, ThermalConductivity},
        heat_capacity::joule_per_kelvin,
        mass_density::kilogram_per_cubic_meter,
        specific_heat_capacity::joule_per_kilogram_kelvin,
    };

    fn concrete() -> Rc<Material> {
        Rc::new(
            Material::new(
                "concrete",
                MassDensity::new::<kilogram_per_cubic_meter>(2000.0),
                ThermalConductivity::new::<watt_per_meter_kelvin>(2.0),
                Some(SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(1000.0)),
            )
            .unwrap(),
        )
    }

    #[test]
    fn resistance_and_capacity() {
        let layer = Layer::new(Length::new::<meter>(0.2), concrete()).unwrap();
        assert_relative_eq!(layer.resistance_per_area(), 0.1);
        assert_relative_eq!(
            layer
                .heat_capacity(Area::new::<square_meter>(10.0))
                .get::<joule_per_kelvin>(),
            10.0 * 0.2 * 2000.0 * 1000.0
        );
    }

    #[test]
    fn zero_thickness_rejected() {
        assert_matches!(
            Layer::new(Length::new::<meter>(0.0), concrete()),
            Err(ElementError::InvalidInput {
                field: "thickness",
                ..
            })
        );
    }
}
