use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;

use log::warn;
use uom::si::{
    f64::{Area, HeatCapacity, Volume},
    heat_capacity::joule_per_kelvin,
};

use crate::element::{AreaTable, BuildingElement, ElementKind, Orientation, TraversalOrder};
use crate::equivalent::ReductionSettings;
use crate::errors::{ElementError, ElementResult};
use crate::material::Material;

#[cfg(test)]
use proptest::{
    arbitrary::{any, Arbitrary},
    prelude::prop,
    strategy::{BoxedStrategy, Strategy},
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneId(pub usize);

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementId(pub usize);

impl fmt::Display for ZoneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "zone #{}", self.0)
    }
}

impl fmt::Display for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element #{}", self.0)
    }
}

/// Air volume of a building with uniform conditioning.
#[derive(Clone, Debug, PartialEq)]
pub struct ThermalZone {
    pub name: String,
    pub volume: Option<Volume>,
    pub with_heating: bool,
    elements: Vec<ElementId>,
    outer_area: Vec<(Orientation, Area)>,
    window_area: Vec<(Orientation, Area)>,
}

impl ThermalZone {
    pub fn new(name: impl Into<String>, volume: Option<Volume>, with_heating: bool) -> ThermalZone {
        ThermalZone {
            name: name.into(),
            volume,
            with_heating,
            elements: Vec::new(),
            outer_area: Vec::new(),
            window_area: Vec::new(),
        }
    }

    pub fn elements(&self) -> &[ElementId] {
        &self.elements
    }

    /// Opaque outer area per orientation.
    pub fn outer_area(&self) -> &[(Orientation, Area)] {
        &self.outer_area
    }

    /// Window area per orientation.
    pub fn window_area(&self) -> &[(Orientation, Area)] {
        &self.window_area
    }

    pub fn outer_area_facing(&self, orientation: Orientation) -> Area {
        area_facing(&self.outer_area, orientation)
    }

    pub fn window_area_facing(&self, orientation: Orientation) -> Area {
        area_facing(&self.window_area, orientation)
    }

    /// Heat capacity of the air in the zone, zero if the volume is unknown.
    pub fn air_heat_capacity(&self, air: &Material) -> HeatCapacity {
        match self.volume {
            Some(volume) => volume * air.density() * air.heat_capacity(),
            None => HeatCapacity::new::<joule_per_kelvin>(0.0),
        }
    }
}

fn area_facing(table: &[(Orientation, Area)], orientation: Orientation) -> Area {
    table
        .iter()
        .filter(|(o, _)| *o == orientation)
        .map(|(_, area)| *area)
        .sum()
}

fn add_area(table: &mut Vec<(Orientation, Area)>, orientation: Orientation, area: Area) {
    match table.iter_mut().find(|(o, _)| *o == orientation) {
        Some((_, sum)) => *sum += area,
        None => table.push((orientation, area)),
    }
}

/// Zones and the elements bounding them. Elements are addressed by
/// [`ElementId`] and know their zone by [`ZoneId`].
#[derive(Clone, Debug, PartialEq)]
pub struct Building {
    pub name: String,
    pub year_of_construction: Option<i32>,
    pub reduction: ReductionSettings,
    pub air: Rc<Material>,
    zones: Vec<ThermalZone>,
    elements: Vec<BuildingElement>,
}

impl Building {
    pub fn new(name: impl Into<String>) -> Building {
        Building {
            name: name.into(),
            year_of_construction: None,
            reduction: ReductionSettings::default(),
            air: Rc::new(Material::default_air()),
            zones: Vec::new(),
            elements: Vec::new(),
        }
    }

    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let string = fs::read_to_string(path)?;
        Self::from_json(&string)
    }

    pub fn from_json(json: &str) -> anyhow::Result<Self> {
        let loaded: as_loaded::Building = json5::from_str(json)?;
        let converted = loaded.try_into()?;
        Ok(converted)
    }

    pub fn add_zone(&mut self, zone: ThermalZone) -> ZoneId {
        self.zones.push(zone);
        ZoneId(self.zones.len() - 1)
    }

    pub fn add_element(&mut self, zone: ZoneId, kind: ElementKind) -> ElementResult<ElementId> {
        let id = ElementId(self.elements.len());
        self.zone_mut(zone)?.elements.push(id);
        self.elements.push(BuildingElement::with_parent(kind, zone));
        Ok(id)
    }

    pub fn zone(&self, id: ZoneId) -> ElementResult<&ThermalZone> {
        self.zones.get(id.0).ok_or(ElementError::UnknownHandle {
            label: "zone",
            index: id.0,
        })
    }

    fn zone_mut(&mut self, id: ZoneId) -> ElementResult<&mut ThermalZone> {
        self.zones.get_mut(id.0).ok_or(ElementError::UnknownHandle {
            label: "zone",
            index: id.0,
        })
    }

    pub fn element(&self, id: ElementId) -> ElementResult<&BuildingElement> {
        self.elements.get(id.0).ok_or(ElementError::UnknownHandle {
            label: "element",
            index: id.0,
        })
    }

    pub fn zones(&self) -> impl Iterator<Item = (ZoneId, &ThermalZone)> {
        self.zones.iter().enumerate().map(|(i, z)| (ZoneId(i), z))
    }

    pub fn elements(&self) -> impl Iterator<Item = (ElementId, &BuildingElement)> {
        self.elements
            .iter()
            .enumerate()
            .map(|(i, e)| (ElementId(i), e))
    }

    pub fn zone_id(&self, name: &str) -> Option<ZoneId> {
        self.zones().find(|(_, z)| z.name == name).map(|(id, _)| id)
    }

    /// Modify an element. Area tables of its zone are refreshed afterwards,
    /// so geometry changes made here are always reflected there.
    pub fn update_element<R, F>(&mut self, id: ElementId, f: F) -> ElementResult<R>
    where
        F: FnOnce(&mut BuildingElement) -> ElementResult<R>,
    {
        let element = self.elements.get_mut(id.0).ok_or(ElementError::UnknownHandle {
            label: "element",
            index: id.0,
        })?;
        let result = f(element)?;
        let table = element.kind().area_table();
        let parent = element.parent();
        if let (Some(_), Some(zone)) = (table, parent) {
            self.refresh_area_tables(zone)?;
        }
        Ok(result)
    }

    pub fn set_element_area(&mut self, id: ElementId, area: Option<Area>) -> ElementResult<()> {
        self.update_element(id, |e| e.set_area(area))
    }

    pub fn set_element_orientation(
        &mut self,
        id: ElementId,
        orientation: Option<Orientation>,
    ) -> ElementResult<()> {
        self.update_element(id, |e| {
            e.set_orientation(orientation);
            Ok(())
        })
    }

    pub fn set_element_other_side(&mut self, id: ElementId, other: Option<ZoneId>) -> ElementResult<()> {
        if let Some(zone) = other {
            self.zone(zone)?;
        }
        self.update_element(id, |e| e.set_other_side(other))
    }

    /// The year of construction required by a retrofit year may come from the
    /// building.
    pub fn set_element_year_of_retrofit(&mut self, id: ElementId, year: Option<i32>) -> ElementResult<()> {
        let fallback = self.year_of_construction;
        self.update_element(id, |e| e.set_year_of_retrofit_with(year, [fallback]))
    }

    /// Rebuild the per-orientation area tables of a zone from its elements.
    pub fn refresh_area_tables(&mut self, id: ZoneId) -> ElementResult<()> {
        let zone = self.zones.get_mut(id.0).ok_or(ElementError::UnknownHandle {
            label: "zone",
            index: id.0,
        })?;
        zone.outer_area.clear();
        zone.window_area.clear();
        for element_id in &zone.elements {
            let element = &self.elements[element_id.0];
            let (Some(table), Some(orientation), Some(area)) = (
                element.kind().area_table(),
                element.orientation(),
                element.area(),
            ) else {
                continue;
            };
            match table {
                AreaTable::Outer => add_area(&mut zone.outer_area, orientation, area),
                AreaTable::Window => add_area(&mut zone.window_area, orientation, area),
            }
        }
        Ok(())
    }

    /// Interzonal elements of the zone leading to another zone.
    pub fn interior_boundaries(&self, zone: ZoneId) -> ElementResult<Vec<ElementId>> {
        Ok(self
            .zone(zone)?
            .elements
            .iter()
            .copied()
            .filter(|id| {
                let element = &self.elements[id.0];
                element.kind().is_interzonal() && element.other_side().is_some()
            })
            .collect())
    }

    /// The reduction has to start at the heated side, so interior boundaries of
    /// an unheated zone towards a heated one are traversed outer to inner.
    pub fn traversal_order(&self, id: ElementId) -> ElementResult<TraversalOrder> {
        let element = self.element(id)?;
        if let (Some(parent), Some(other)) = (element.parent(), element.other_side()) {
            if self.interior_boundaries(parent)?.contains(&id)
                && !self.zone(parent)?.with_heating
                && self.zone(other)?.with_heating
            {
                return Ok(TraversalOrder::OuterToInner);
            }
        }
        Ok(TraversalOrder::InnerToOuter)
    }

    /// Year of construction of the element, falling back to the building.
    pub fn year_of_construction(&self, id: ElementId) -> ElementResult<Option<i32>> {
        Ok(self
            .element(id)?
            .resolve_year_of_construction([self.year_of_construction]))
    }

    /// Element name, or kind and index if it has none.
    pub fn element_label(&self, id: ElementId) -> ElementResult<String> {
        let element = self.element(id)?;
        Ok(match element.name() {
            Some(name) => name.to_string(),
            None => format!("{}{}", element.kind(), id.0),
        })
    }

    /// Compute UA values and equivalent circuits of all elements.
    /// Elements without an area are skipped.
    pub fn calc_all(&mut self) -> ElementResult<()> {
        for index in 0..self.elements.len() {
            let id = ElementId(index);
            let order = self.traversal_order(id)?;
            let label = self.element_label(id)?;
            let element = &mut self.elements[index];

            if element.area().is_none() {
                warn!("{} has no area, skipping", label);
                continue;
            }
            if element.is_ready() {
                element.recompute_thermal_properties()?;
            } else {
                warn!("{} is missing inner film coefficients, UA value not computed", label);
            }
            element.compute_equivalent_circuit(order, &self.reduction)?;
        }
        Ok(())
    }
}

impl TryFrom<as_loaded::Building> for Building {
    type Error = anyhow::Error;

    fn try_from(value: as_loaded::Building) -> Result<Self, Self::Error> {
        use anyhow::Context;

        let materials = value
            .materials
            .into_iter()
            .map(|(id, material)| Ok((id.clone(), Rc::new(material.convert(id)?))))
            .collect::<anyhow::Result<BTreeMap<_, _>>>()?;

        let mut building = Building::new(value.name.unwrap_or_default());
        building.year_of_construction = value.year_of_construction;
        if let Some(period) = value.reduction_period {
            building.reduction = ReductionSettings { period };
        }
        if let Some(air) = materials.get("air") {
            building.air = Rc::clone(air);
        }

        let zone_ids: BTreeMap<_, _> = value
            .zones
            .into_iter()
            .map(|(name, zone)| {
                let id = building.add_zone(ThermalZone::new(name.clone(), zone.volume, zone.with_heating));
                (name, id)
            })
            .collect();

        for (index, element) in value.elements.into_iter().enumerate() {
            let zone = crate::tools::get(&zone_ids, &element.zone, "zone")?;
            let other_side = element
                .other_side
                .as_ref()
                .map(|name| crate::tools::get(&zone_ids, name, "zone"))
                .transpose()?;
            let id = building.add_element(zone, element.kind)?;
            element
                .apply(&mut building, id, other_side, &materials)
                .with_context(|| format!("Element {} ({}) of zone {:?}", index, element.kind, element.zone))?;
        }

        Ok(building)
    }
}

mod as_loaded {
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use serde::Deserialize;
    use uom::si::{
        angle::degree,
        f64::{Angle, Area, HeatTransfer, Time, Volume},
    };

    use super::{ElementId, ZoneId};
    use crate::catalog::as_loaded::Layer;
    use crate::element::{ElementKind, Orientation};

    fn default_heating() -> bool {
        true
    }

    #[derive(Clone, Debug, Deserialize)]
    pub struct Building {
        #[serde(default)]
        pub name: Option<String>,
        #[serde(default)]
        pub year_of_construction: Option<i32>,
        /// Seconds
        #[serde(default)]
        pub reduction_period: Option<Time>,
        #[serde(default)]
        pub materials: BTreeMap<String, crate::catalog::as_loaded::Material>,
        pub zones: BTreeMap<String, Zone>,
        #[serde(default)]
        pub elements: Vec<Element>,
    }

    #[derive(Clone, Debug, Deserialize, PartialEq)]
    pub struct Zone {
        #[serde(default)]
        pub volume: Option<Volume>,
        #[serde(default = "default_heating")]
        pub with_heating: bool,
    }

    /// Angles in degrees, orientation -1 for roof and -2 for floor.
    #[derive(Clone, Debug, Deserialize, PartialEq)]
    pub struct Element {
        pub kind: ElementKind,
        pub zone: String,
        #[serde(default)]
        pub name: Option<String>,
        #[serde(default)]
        pub other_side: Option<String>,
        #[serde(default)]
        pub area: Option<Area>,
        #[serde(default)]
        pub tilt: Option<f64>,
        #[serde(default)]
        pub orientation: Option<f64>,
        #[serde(default)]
        pub inner_convection: Option<HeatTransfer>,
        #[serde(default)]
        pub inner_radiation: Option<HeatTransfer>,
        #[serde(default)]
        pub outer_convection: Option<HeatTransfer>,
        #[serde(default)]
        pub outer_radiation: Option<HeatTransfer>,
        #[serde(default)]
        pub year_of_construction: Option<i32>,
        #[serde(default)]
        pub year_of_retrofit: Option<i32>,
        #[serde(default)]
        pub construction_type: Option<String>,
        #[serde(default)]
        pub view_factors: Option<Vec<f64>>,
        #[serde(default)]
        pub layers: Vec<Layer>,
    }

    impl Element {
        pub fn apply(
            &self,
            building: &mut super::Building,
            id: ElementId,
            other_side: Option<ZoneId>,
            materials: &BTreeMap<String, Rc<crate::material::Material>>,
        ) -> anyhow::Result<()> {
            let layers = self
                .layers
                .iter()
                .cloned()
                .map(|layer| layer.convert(materials))
                .collect::<anyhow::Result<Vec<_>>>()?;

            building.update_element(id, |e| {
                if let Some(name) = &self.name {
                    e.set_name(name);
                }
                e.construction_type = self.construction_type.clone();
                e.set_year_of_construction(self.year_of_construction);
                if let Some(tilt) = self.tilt {
                    e.set_tilt(Some(Angle::new::<degree>(tilt)))?;
                }
                if let Some(orientation) = self.orientation {
                    e.set_orientation(Some(Orientation::from_degrees(orientation)));
                }
                if let Some(view_factors) = &self.view_factors {
                    e.set_view_factors(view_factors)?;
                }
                e.add_layer_list(layers)?;
                e.set_area(self.area)?;
                e.set_inner_convection(self.inner_convection)?;
                e.set_inner_radiation(self.inner_radiation)?;
                e.set_outer_convection(self.outer_convection)?;
                e.set_outer_radiation(self.outer_radiation)
            })?;
            building.set_element_year_of_retrofit(id, self.year_of_retrofit)?;
            building.set_element_other_side(id, other_side)?;
            Ok(())
        }
    }
}

#[cfg(test)]
impl Arbitrary for Building {
    type Parameters = ();
    type Strategy = BoxedStrategy<Building>;

    /// Computed buildings with 1 to 4 zones and up to 12 elements of any kind.
    fn arbitrary_with(_args: Self::Parameters) -> Self::Strategy {
        use crate::layer::Layer;
        use uom::si::{
            area::square_meter, f64::HeatTransfer, heat_transfer::watt_per_square_meter_kelvin,
            volume::cubic_meter,
        };

        let zones = prop::collection::vec((prop::option::of(1f64..1000f64), any::<bool>()), 1..4);
        let elements = prop::collection::vec(
            (
                0..ElementKind::ALL.len(),
                0usize..4,
                0usize..4,
                0.5f64..50f64,
                prop::collection::vec(any::<Layer>(), 0..5),
            ),
            0..12,
        );
        (zones, elements)
            .prop_map(|(zones, elements)| {
                let h = |v: f64| Some(HeatTransfer::new::<watt_per_square_meter_kelvin>(v));
                let mut building = Building::new("arbitrary");
                let zone_ids: Vec<_> = zones
                    .into_iter()
                    .enumerate()
                    .map(|(i, (volume, with_heating))| {
                        building.add_zone(ThermalZone::new(
                            format!("zone{i}"),
                            volume.map(Volume::new::<cubic_meter>),
                            with_heating,
                        ))
                    })
                    .collect();

                for (kind, zone, other, area, layers) in elements {
                    let kind = ElementKind::ALL[kind];
                    let id = building
                        .add_element(zone_ids[zone % zone_ids.len()], kind)
                        .unwrap();
                    building
                        .update_element(id, |e| {
                            e.add_layer_list(layers)?;
                            e.set_area(Some(Area::new::<square_meter>(area)))?;
                            e.set_inner_convection(h(2.5))?;
                            e.set_inner_radiation(h(5.0))?;
                            if kind.area_table().is_some() {
                                e.set_outer_convection(h(20.0))?;
                                e.set_outer_radiation(h(5.0))?;
                            }
                            Ok(())
                        })
                        .unwrap();
                    if kind.is_interzonal() {
                        building
                            .set_element_other_side(id, Some(zone_ids[other % zone_ids.len()]))
                            .unwrap();
                    }
                }
                building.calc_all().unwrap();
                building
            })
            .boxed()
    }
}
