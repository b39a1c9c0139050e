//! Typical building elements and materials by construction year and type.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use log::warn;
use uom::si::{
    f64::{HeatTransfer, Length},
    heat_transfer::watt_per_square_meter_kelvin,
};

use crate::element::{BuildingElement, ElementKind};
use crate::errors::{ElementError, ElementResult};
use crate::layer::Layer;
use crate::material::{Material, MaterialSpec};
use crate::tools::sanitize_name;

/// Source of typical elements and materials.
pub trait ConstructionCatalog {
    fn type_element_by_key(&self, key: &str) -> Option<&TypeElement>;

    /// First entry of the given kind whose age group covers `year`, optionally
    /// restricted to one construction type.
    fn type_element_for_year(
        &self,
        kind: ElementKind,
        year: i32,
        construction: Option<&str>,
    ) -> Option<&TypeElement>;

    fn material_by_id(&self, id: &str) -> Option<Rc<Material>>;

    fn material_by_name(&self, name: &str) -> Option<Rc<Material>>;
}

/// Catalog entry: film coefficients and layers of a typical element.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeElement {
    pub kind: ElementKind,
    pub building_age_group: [i32; 2],
    pub construction_type: String,
    pub inner_convection: Option<HeatTransfer>,
    pub inner_radiation: Option<HeatTransfer>,
    pub outer_convection: Option<HeatTransfer>,
    pub outer_radiation: Option<HeatTransfer>,
    pub layers: Vec<Layer>,
}

impl TypeElement {
    pub fn key(&self) -> String {
        type_element_key(
            self.kind,
            self.building_age_group,
            &self.construction_type,
        )
    }

    pub fn covers(&self, year: i32) -> bool {
        self.building_age_group[0] <= year && year <= self.building_age_group[1]
    }
}

pub fn type_element_key(kind: ElementKind, age_group: [i32; 2], construction: &str) -> String {
    format!(
        "{}_{}_{}_{}",
        kind, age_group[0], age_group[1], construction
    )
}

/// What to load into an element from a catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct TypeElementRequest {
    pub year: i32,
    pub construction: String,
    /// Load entries of a different kind than the element's own.
    pub kind: Option<ElementKind>,
    pub reverse_layers: bool,
    /// Clear the film coefficients before applying the catalog values.
    pub reset_basic_data: bool,
    /// Exact catalog key, tried before the year lookup.
    pub key: Option<String>,
}

impl TypeElementRequest {
    pub fn new(year: i32, construction: impl Into<String>) -> TypeElementRequest {
        TypeElementRequest {
            year,
            construction: construction.into(),
            kind: None,
            reverse_layers: false,
            reset_basic_data: true,
            key: None,
        }
    }
}

impl BuildingElement {
    /// Replace layers and basic data of the element with a typical element from
    /// the catalog. A key that isn't in the catalog falls back to the lookup by
    /// year and construction type.
    pub fn load_type_element<C>(&mut self, catalog: &C, request: &TypeElementRequest) -> ElementResult<()>
    where
        C: ConstructionCatalog + ?Sized,
    {
        let kind = request.kind.unwrap_or_else(|| self.kind());

        let by_key = request.key.as_deref().and_then(|key| {
            let found = catalog.type_element_by_key(key);
            if found.is_none() {
                warn!(
                    "Type element {} was not found. Going back to default element for year and construction...",
                    key
                );
            }
            found
        });
        let entry = by_key
            .or_else(|| {
                catalog.type_element_for_year(kind, request.year, Some(&request.construction))
            })
            .ok_or_else(|| ElementError::NoMatchingCatalogEntry {
                kind,
                year: Some(request.year),
                construction: Some(request.construction.clone()),
                key: request.key.clone(),
            })?;

        let mut updated = self.clone();
        updated.clear_layers()?;
        if request.reset_basic_data {
            updated.reset_film_coefficients();
        }
        updated.apply_basic_data(entry, &entry.construction_type)?;
        if request.reverse_layers {
            updated.add_layer_list(entry.layers.iter().rev().cloned())?;
        } else {
            updated.add_layer_list(entry.layers.iter().cloned())?;
        }

        *self = updated;
        Ok(())
    }

    /// Build the layers from explicit `(thickness, material)` pairs, inner side
    /// first. Materials may reference a catalog material by id or name and
    /// override any of its properties.
    ///
    /// Film coefficients come from the first catalog entry of the kind covering
    /// `year`, the construction type is set to `custom`.
    pub fn use_layer_properties<C>(
        &mut self,
        catalog: &C,
        layers: &[(Length, MaterialSpec)],
        year: i32,
        kind: Option<ElementKind>,
    ) -> ElementResult<()>
    where
        C: ConstructionCatalog + ?Sized,
    {
        let kind = kind.unwrap_or_else(|| self.kind());

        let converted = layers
            .iter()
            .map(|(thickness, spec)| {
                let base = match (&spec.id, &spec.name) {
                    (Some(id), _) => catalog.material_by_id(id),
                    (None, Some(name)) => catalog.material_by_name(name),
                    (None, None) => None,
                };
                let material = spec.resolve(base.as_deref())?;
                Layer::new(*thickness, Rc::new(material))
            })
            .collect::<ElementResult<Vec<_>>>()?;

        let mut updated = self.clone();
        updated.clear_layers()?;
        updated.reset_film_coefficients();
        if let Some(entry) = catalog.type_element_for_year(kind, year, None) {
            updated.apply_basic_data(entry, "custom")?;
        }
        updated.add_layer_list(converted)?;

        *self = updated;
        Ok(())
    }

    fn apply_basic_data(&mut self, entry: &TypeElement, construction_type: &str) -> ElementResult<()> {
        self.building_age_group = Some(entry.building_age_group);
        self.construction_type = Some(construction_type.to_string());
        self.set_inner_convection(entry.inner_convection)?;
        self.set_inner_radiation(entry.inner_radiation)?;
        self.set_outer_convection(entry.outer_convection)?;
        self.set_outer_radiation(entry.outer_radiation)
    }
}

/// Catalog backed by a JSON5 document with `materials` (by id) and
/// `type_elements` (by key).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TypeElementCatalog {
    materials: BTreeMap<String, Rc<Material>>,
    type_elements: BTreeMap<String, TypeElement>,
}

impl TypeElementCatalog {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let string = fs::read_to_string(path)?;
        Self::from_json(&string)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let loaded: as_loaded::Catalog = json5::from_str(json)?;
        let converted = loaded.try_into()?;
        Ok(converted)
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn to_json(&self) -> anyhow::Result<String> {
        Ok(json5::to_string(&as_loaded::Catalog::from(self))?)
    }

    pub fn materials(&self) -> impl Iterator<Item = &Rc<Material>> {
        self.materials.values()
    }

    pub fn type_elements(&self) -> impl Iterator<Item = &TypeElement> {
        self.type_elements.values()
    }

    /// Add a material under its id, assigning a fresh id if it has none or the
    /// id is taken by a different material. Returns the stored material.
    pub fn insert_material(&mut self, material: Rc<Material>) -> Rc<Material> {
        if let Some(id) = &material.material_id {
            match self.materials.get(id) {
                Some(existing) if existing == &material => return Rc::clone(existing),
                None => {
                    self.materials.insert(id.clone(), Rc::clone(&material));
                    return material;
                }
                Some(_) => {}
            }
        }

        let stem = sanitize_name(&material.name).unwrap_or_else(|| "material".into());
        let mut n = self.materials.len();
        let id = loop {
            let id = format!("{stem}_{n}");
            if !self.materials.contains_key(&id) {
                break id;
            }
            n += 1;
        };
        let stored = Rc::new((*material).clone().with_id(id.clone()));
        self.materials.insert(id, Rc::clone(&stored));
        stored
    }

    /// Store the element as a typical element. It needs a building age group
    /// and a construction type to form its key, which is returned.
    /// An entry with the same key is replaced.
    pub fn save_type_element(&mut self, element: &BuildingElement) -> ElementResult<String> {
        let (building_age_group, construction_type) =
            match (element.building_age_group, &element.construction_type) {
                (Some(age), Some(construction)) => (age, construction.clone()),
                _ => {
                    return Err(ElementError::invalid_input(
                        "type_element",
                        element.kind(),
                        "building age group and construction type are needed for the key",
                    ))
                }
            };

        let layers = element
            .layers()
            .iter()
            .map(|layer| {
                Layer::new(
                    layer.thickness(),
                    self.insert_material(Rc::clone(&layer.material)),
                )
            })
            .collect::<ElementResult<Vec<_>>>()?;

        let type_element = TypeElement {
            kind: element.kind(),
            building_age_group,
            construction_type,
            inner_convection: element.inner_convection(),
            inner_radiation: element.inner_radiation(),
            outer_convection: element.outer_convection(),
            outer_radiation: element.outer_radiation(),
            layers,
        };
        let key = type_element.key();
        self.type_elements.insert(key.clone(), type_element);
        Ok(key)
    }

    /// Remove the typical element matching kind, age group and construction
    /// type of the element.
    pub fn delete_type_element(&mut self, element: &BuildingElement) -> Option<TypeElement> {
        let key = type_element_key(
            element.kind(),
            element.building_age_group?,
            element.construction_type.as_deref()?,
        );
        self.type_elements.remove(&key)
    }
}

impl ConstructionCatalog for TypeElementCatalog {
    fn type_element_by_key(&self, key: &str) -> Option<&TypeElement> {
        self.type_elements.get(key)
    }

    fn type_element_for_year(
        &self,
        kind: ElementKind,
        year: i32,
        construction: Option<&str>,
    ) -> Option<&TypeElement> {
        self.type_elements.values().find(|element| {
            element.kind == kind
                && element.covers(year)
                && construction.map_or(true, |c| element.construction_type == c)
        })
    }

    fn material_by_id(&self, id: &str) -> Option<Rc<Material>> {
        self.materials.get(id).cloned()
    }

    fn material_by_name(&self, name: &str) -> Option<Rc<Material>> {
        self.materials.values().find(|m| m.name == name).cloned()
    }
}

impl TryFrom<as_loaded::Catalog> for TypeElementCatalog {
    type Error = anyhow::Error;

    fn try_from(value: as_loaded::Catalog) -> Result<Self, Self::Error> {
        let materials = value
            .materials
            .into_iter()
            .map(|(id, material)| Ok((id.clone(), Rc::new(material.convert(id)?))))
            .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

        let type_elements = value
            .type_elements
            .into_iter()
            .map(|(key, element)| {
                let converted = element.convert(&key, &materials)?;
                if converted.key() != key {
                    anyhow::bail!(
                        "Type element key {:?} doesn't match its content (expected {:?})",
                        key,
                        converted.key()
                    );
                }
                Ok((key, converted))
            })
            .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

        Ok(TypeElementCatalog {
            materials,
            type_elements,
        })
    }
}

impl From<&TypeElementCatalog> for as_loaded::Catalog {
    fn from(value: &TypeElementCatalog) -> Self {
        as_loaded::Catalog {
            materials: value
                .materials
                .iter()
                .map(|(id, material)| (id.clone(), as_loaded::Material::from(material.as_ref())))
                .collect(),
            type_elements: value
                .type_elements
                .iter()
                .map(|(key, element)| (key.clone(), as_loaded::TypeElement::from(element)))
                .collect(),
        }
    }
}

fn coefficient(value: Option<f64>) -> Option<HeatTransfer> {
    value.map(HeatTransfer::new::<watt_per_square_meter_kelvin>)
}

pub(crate) mod as_loaded {
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use anyhow::Context;
    use serde::{Deserialize, Serialize};
    use uom::si::{
        f64::{
            HeatTransfer, Length, MassDensity, Ratio, SpecificHeatCapacity, ThermalConductivity,
        },
        heat_transfer::watt_per_square_meter_kelvin,
        length::meter,
        mass_density::kilogram_per_cubic_meter,
        ratio::ratio,
        specific_heat_capacity::joule_per_kilogram_kelvin,
        thermal_conductivity::watt_per_meter_kelvin,
    };

    use super::coefficient;
    use crate::element::ElementKind;
    use crate::tools::get;

    #[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq)]
    pub struct Catalog {
        #[serde(default)]
        pub materials: BTreeMap<String, Material>,
        #[serde(default)]
        pub type_elements: BTreeMap<String, TypeElement>,
    }

    /// Plain numbers: kg/m^3, W/(m.K) and kJ/(kg.K).
    #[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
    pub struct Material {
        pub name: String,
        pub density: f64,
        pub thermal_conductivity: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub heat_capacity: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub solar_absorptance: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub ir_emissivity: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub transmittance: Option<f64>,
    }

    impl Material {
        pub fn convert(self, id: String) -> anyhow::Result<super::Material> {
            let material = super::Material::new(
                self.name,
                MassDensity::new::<kilogram_per_cubic_meter>(self.density),
                ThermalConductivity::new::<watt_per_meter_kelvin>(self.thermal_conductivity),
                self.heat_capacity
                    .map(|c| SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(c * 1000.0)),
            )
            .with_context(|| format!("Material {:?}", id))?
            .with_id(id);
            let optical = |value: Option<f64>, current: Ratio| value.map_or(current, Ratio::new::<ratio>);
            let solar_absorptance = optical(self.solar_absorptance, material.solar_absorptance);
            let ir_emissivity = optical(self.ir_emissivity, material.ir_emissivity);
            let transmittance = optical(self.transmittance, material.transmittance);
            Ok(material.with_optical_properties(solar_absorptance, ir_emissivity, transmittance))
        }
    }

    impl From<&super::Material> for Material {
        fn from(value: &super::Material) -> Self {
            Material {
                name: value.name.clone(),
                density: value.density().get::<kilogram_per_cubic_meter>(),
                thermal_conductivity: value.thermal_conductivity().get::<watt_per_meter_kelvin>(),
                heat_capacity: Some(value.heat_capacity().get::<joule_per_kilogram_kelvin>() / 1000.0),
                solar_absorptance: Some(value.solar_absorptance.get::<ratio>()),
                ir_emissivity: Some(value.ir_emissivity.get::<ratio>()),
                transmittance: Some(value.transmittance.get::<ratio>()),
            }
        }
    }

    /// Film coefficients in W/(m^2.K), the outer pair is missing for interior elements.
    #[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
    pub struct TypeElement {
        pub building_age_group: [i32; 2],
        pub construction_type: String,
        #[serde(default)]
        pub inner_convection: Option<f64>,
        #[serde(default)]
        pub inner_radiation: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub outer_convection: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        pub outer_radiation: Option<f64>,
        pub layers: Vec<Layer>,
    }

    impl TypeElement {
        pub fn convert(
            self,
            key: &str,
            materials: &BTreeMap<String, Rc<super::Material>>,
        ) -> anyhow::Result<super::TypeElement> {
            let kind: ElementKind = key
                .split('_')
                .next()
                .unwrap_or_default()
                .parse()
                .with_context(|| format!("Type element {:?}", key))?;
            let layers = self
                .layers
                .into_iter()
                .map(|layer| layer.convert(materials))
                .collect::<anyhow::Result<Vec<_>>>()
                .with_context(|| format!("Type element {:?}", key))?;
            Ok(super::TypeElement {
                kind,
                building_age_group: self.building_age_group,
                construction_type: self.construction_type,
                inner_convection: coefficient(self.inner_convection),
                inner_radiation: coefficient(self.inner_radiation),
                outer_convection: coefficient(self.outer_convection),
                outer_radiation: coefficient(self.outer_radiation),
                layers,
            })
        }
    }

    impl From<&super::TypeElement> for TypeElement {
        fn from(value: &super::TypeElement) -> Self {
            let h = |v: Option<HeatTransfer>| {
                v.map(|v| v.get::<watt_per_square_meter_kelvin>())
            };
            TypeElement {
                building_age_group: value.building_age_group,
                construction_type: value.construction_type.clone(),
                inner_convection: h(value.inner_convection),
                inner_radiation: h(value.inner_radiation),
                outer_convection: h(value.outer_convection),
                outer_radiation: h(value.outer_radiation),
                layers: value
                    .layers
                    .iter()
                    .map(|layer| Layer {
                        material: layer.material.material_id.clone().unwrap_or_default(),
                        thickness: layer.thickness().get::<meter>(),
                    })
                    .collect(),
            }
        }
    }

    /// Material id and thickness in meters.
    #[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
    pub struct Layer {
        pub material: String,
        pub thickness: f64,
    }

    impl Layer {
        pub fn convert(
            self,
            materials: &BTreeMap<String, Rc<super::Material>>,
        ) -> anyhow::Result<super::Layer> {
            Ok(super::Layer::new(
                Length::new::<meter>(self.thickness),
                get(materials, &self.material, "material")?,
            )?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use uom::si::{
        area::square_meter,
        f64::{Area, MassDensity, SpecificHeatCapacity, ThermalConductivity},
        length::meter,
        mass_density::kilogram_per_cubic_meter,
        ratio::ratio,
        specific_heat_capacity::joule_per_kilogram_kelvin,
        thermal_conductance::watt_per_kelvin,
        thermal_conductivity::watt_per_meter_kelvin,
    };

    fn sample_catalog_json() -> &'static str {
        r#"{
            materials: {
                "m-plaster": { name: "plaster", density: 1000, thermal_conductivity: 0.5, heat_capacity: 1.0 },
                "m-brick": { name: "brick", density: 1800, thermal_conductivity: 0.8, heat_capacity: 0.84 },
                "m-wool": { name: "wool", density: 30, thermal_conductivity: 0.04 },
                "m-glass": {
                    name: "glass", density: 2500, thermal_conductivity: 0.96, heat_capacity: 0.75,
                    transmittance: 0.8, ir_emissivity: 0.84,
                },
            },
            type_elements: {
                "OuterWall_1950_1958_heavy": {
                    building_age_group: [1950, 1958],
                    construction_type: "heavy",
                    inner_convection: 2.7,
                    inner_radiation: 5.0,
                    outer_convection: 20.0,
                    outer_radiation: 5.0,
                    layers: [
                        { material: "m-plaster", thickness: 0.015 },
                        { material: "m-brick", thickness: 0.3 },
                    ],
                },
                "OuterWall_1950_1958_light": {
                    building_age_group: [1950, 1958],
                    construction_type: "light",
                    inner_convection: 2.7,
                    inner_radiation: 5.0,
                    outer_convection: 20.0,
                    outer_radiation: 5.0,
                    layers: [
                        { material: "m-plaster", thickness: 0.015 },
                        { material: "m-wool", thickness: 0.06 },
                        { material: "m-plaster", thickness: 0.015 },
                    ],
                },
                "InnerWall_0_2100_heavy": {
                    building_age_group: [0, 2100],
                    construction_type: "heavy",
                    inner_convection: 1.7,
                    inner_radiation: 5.0,
                    layers: [{ material: "m-brick", thickness: 0.115 }],
                },
            },
        }"#
    }

    fn catalog() -> TypeElementCatalog {
        TypeElementCatalog::from_json(sample_catalog_json()).unwrap()
    }

    fn wall_with_area() -> BuildingElement {
        let mut wall = BuildingElement::new(ElementKind::OuterWall);
        wall.set_area(Some(Area::new::<square_meter>(10.0))).unwrap();
        wall
    }

    #[test]
    fn load_catalog() {
        let catalog = catalog();
        assert_eq!(catalog.materials().count(), 4);
        assert_eq!(catalog.type_elements().count(), 3);

        let wool = catalog.material_by_id("m-wool").unwrap();
        assert_eq!(wool.name, "wool");
        assert_eq!(
            wool.heat_capacity(),
            SpecificHeatCapacity::new::<joule_per_kilogram_kelvin>(1000.0)
        );
        let brick = catalog.material_by_name("brick").unwrap();
        assert_eq!(brick.material_id.as_deref(), Some("m-brick"));
        assert_relative_eq!(brick.heat_capacity().get::<joule_per_kilogram_kelvin>(), 840.0);

        let glass = catalog.material_by_id("m-glass").unwrap();
        assert_relative_eq!(glass.transmittance.get::<ratio>(), 0.8);
        assert_relative_eq!(glass.ir_emissivity.get::<ratio>(), 0.84);
        assert_relative_eq!(glass.solar_absorptance.get::<ratio>(), 0.7);

        let inner = catalog.type_element_by_key("InnerWall_0_2100_heavy").unwrap();
        assert_eq!(inner.kind, ElementKind::InnerWall);
        assert_eq!(inner.outer_convection, None);
    }

    #[test]
    fn load_catalog_from_file() {
        let mut f = tempfile::NamedTempFile::new().unwrap();

        use std::io::Write;
        write!(f, "{}", sample_catalog_json()).unwrap();

        assert_eq!(TypeElementCatalog::load(f.path()).unwrap(), catalog());
    }

    #[test]
    fn missing_material_is_reported() {
        let json = r#"{
            type_elements: {
                "Rooftop_1950_1958_heavy": {
                    building_age_group: [1950, 1958],
                    construction_type: "heavy",
                    layers: [{ material: "m-tile", thickness: 0.02 }],
                },
            },
        }"#;
        let message = format!("{:#}", TypeElementCatalog::from_json(json).unwrap_err());
        assert!(message.contains("material"));
        assert!(message.contains("m-tile"));
    }

    #[test]
    fn inconsistent_key_is_rejected() {
        let json = r#"{
            type_elements: {
                "Rooftop_1950_1958_heavy": {
                    building_age_group: [1960, 1968],
                    construction_type: "heavy",
                    layers: [],
                },
            },
        }"#;
        assert!(TypeElementCatalog::from_json(json).is_err());
    }

    #[test]
    fn load_by_year_and_construction() {
        let mut wall = wall_with_area();
        wall.load_type_element(&catalog(), &TypeElementRequest::new(1955, "light"))
            .unwrap();

        assert_eq!(wall.layers().len(), 3);
        assert_eq!(wall.layers()[1].material.name, "wool");
        assert_eq!(wall.construction_type.as_deref(), Some("light"));
        assert_eq!(wall.building_age_group, Some([1950, 1958]));

        let expected_u = 1.0 / (0.015 / 0.5 + 0.06 / 0.04 + 0.015 / 0.5 + 1.0 / 7.7 + 1.0 / 25.0);
        assert_relative_eq!(
            wall.ua_value().get::<watt_per_kelvin>(),
            expected_u * 10.0,
            max_relative = 1e-12
        );
    }

    #[test]
    fn load_by_key() {
        let mut wall = wall_with_area();
        let request = TypeElementRequest {
            key: Some("OuterWall_1950_1958_heavy".into()),
            ..TypeElementRequest::new(2020, "light")
        };
        wall.load_type_element(&catalog(), &request).unwrap();
        assert_eq!(wall.construction_type.as_deref(), Some("heavy"));
        assert_eq!(wall.layers().len(), 2);
    }

    #[test]
    fn unknown_key_falls_back_to_year() {
        let mut wall = wall_with_area();
        let request = TypeElementRequest {
            key: Some("OuterWall_1800_1801_stone".into()),
            ..TypeElementRequest::new(1952, "heavy")
        };
        wall.load_type_element(&catalog(), &request).unwrap();
        assert_eq!(wall.construction_type.as_deref(), Some("heavy"));
        assert_eq!(wall.layers()[1].material.name, "brick");
    }

    #[test]
    fn no_matching_entry() {
        let mut wall = wall_with_area();
        let before = wall.clone();
        assert_matches!(
            wall.load_type_element(&catalog(), &TypeElementRequest::new(2020, "heavy")),
            Err(ElementError::NoMatchingCatalogEntry {
                kind: ElementKind::OuterWall,
                year: Some(2020),
                ..
            })
        );
        assert_eq!(wall, before);
    }

    #[test]
    fn load_other_kind_reversed() {
        let mut wall = BuildingElement::new(ElementKind::InterzonalWall);
        let request = TypeElementRequest {
            kind: Some(ElementKind::OuterWall),
            reverse_layers: true,
            ..TypeElementRequest::new(1950, "heavy")
        };
        wall.load_type_element(&catalog(), &request).unwrap();
        assert_eq!(wall.layers()[0].material.name, "brick");
        assert_eq!(wall.layers()[1].material.name, "plaster");
    }

    #[test]
    fn reload_replaces_layers() {
        let mut wall = wall_with_area();
        let catalog = catalog();
        wall.load_type_element(&catalog, &TypeElementRequest::new(1955, "light"))
            .unwrap();
        wall.load_type_element(&catalog, &TypeElementRequest::new(1955, "heavy"))
            .unwrap();
        assert_eq!(wall.layers().len(), 2);
    }

    #[test]
    fn custom_layers() {
        let mut wall = wall_with_area();
        let layers = vec![
            (
                Length::new::<meter>(0.02),
                MaterialSpec {
                    id: Some("m-plaster".into()),
                    ..Default::default()
                },
            ),
            (
                Length::new::<meter>(0.2),
                MaterialSpec {
                    name: Some("brick".into()),
                    density: Some(MassDensity::new::<kilogram_per_cubic_meter>(1200.0)),
                    ..Default::default()
                },
            ),
        ];
        wall.use_layer_properties(&catalog(), &layers, 1955, None)
            .unwrap();

        assert_eq!(wall.construction_type.as_deref(), Some("custom"));
        assert_eq!(wall.layers().len(), 2);
        assert_eq!(wall.layers()[0].material.name, "plaster");
        assert_eq!(
            wall.layers()[1].material.density(),
            MassDensity::new::<kilogram_per_cubic_meter>(1200.0)
        );
        assert!(wall.ua_value().get::<watt_per_kelvin>() > 0.0);
    }

    #[test]
    fn custom_layer_needs_density_and_conductivity() {
        let mut wall = wall_with_area();
        let before = wall.clone();
        let layers = vec![(
            Length::new::<meter>(0.1),
            MaterialSpec {
                name: Some("unknown stuff".into()),
                ..Default::default()
            },
        )];
        assert_matches!(
            wall.use_layer_properties(&catalog(), &layers, 1955, None),
            Err(ElementError::InsufficientMaterial { .. })
        );
        assert_eq!(wall, before);
    }

    #[test]
    fn save_and_delete_type_element() {
        let mut catalog = catalog();
        let mut wall = wall_with_area();
        let layers = vec![(
            Length::new::<meter>(0.1),
            MaterialSpec {
                name: Some("clay".into()),
                density: Some(MassDensity::new::<kilogram_per_cubic_meter>(1500.0)),
                thermal_conductivity: Some(ThermalConductivity::new::<watt_per_meter_kelvin>(0.7)),
                ..Default::default()
            },
        )];
        wall.use_layer_properties(&catalog, &layers, 1955, None)
            .unwrap();

        let key = catalog.save_type_element(&wall).unwrap();
        assert_eq!(key, "OuterWall_1950_1958_custom");
        assert_eq!(catalog.materials().count(), 5);

        let saved = catalog.type_element_by_key(&key).unwrap();
        assert!(saved.layers[0].material.material_id.is_some());

        let deleted = catalog.delete_type_element(&wall).unwrap();
        assert_eq!(deleted.key(), key);
        assert!(catalog.type_element_by_key(&key).is_none());
    }

    #[test]
    fn save_needs_age_group() {
        let mut catalog = catalog();
        assert_matches!(
            catalog.save_type_element(&BuildingElement::new(ElementKind::Door)),
            Err(ElementError::InvalidInput { .. })
        );
    }

    #[test]
    fn insert_material_keeps_ids_unique() {
        let mut catalog = TypeElementCatalog::default();
        let brick = Rc::new(
            Material::new(
                "brick",
                MassDensity::new::<kilogram_per_cubic_meter>(1800.0),
                ThermalConductivity::new::<watt_per_meter_kelvin>(0.8),
                None,
            )
            .unwrap(),
        );
        let first = catalog.insert_material(Rc::clone(&brick));
        let again = catalog.insert_material(Rc::clone(&first));
        let second = catalog.insert_material(brick);

        assert_eq!(first, again);
        assert_ne!(first.material_id, second.material_id);
        assert_eq!(catalog.materials().count(), 2);
    }

    #[test]
    fn save_and_reload() {
        let mut catalog = catalog();
        let mut wall = wall_with_area();
        wall.load_type_element(&catalog, &TypeElementRequest::new(1955, "light"))
            .unwrap();
        wall.construction_type = Some("copy".into());
        catalog.save_type_element(&wall).unwrap();

        let f = tempfile::NamedTempFile::new().unwrap();
        catalog.save(f.path()).unwrap();
        let reloaded = TypeElementCatalog::load(f.path()).unwrap();

        assert_eq!(reloaded.type_elements().count(), 4);
        let copy = reloaded
            .type_element_by_key("OuterWall_1950_1958_copy")
            .unwrap();
        assert_eq!(copy.layers.len(), 3);
        assert_eq!(copy.layers[1].material.name, "wool");
        assert_relative_eq!(
            copy.inner_convection.unwrap().get::<watt_per_square_meter_kelvin>(),
            2.7
        );
    }
}
