use std::fmt;
use std::rc::Rc;
use std::str::FromStr;

use approx::abs_diff_eq;
use log::warn;
use serde::{Deserialize, Serialize};
use uom::si::{
    angle::degree,
    area::square_meter,
    f64::{Angle, Area, HeatCapacity, HeatTransfer, Length, ThermalConductance},
    heat_capacity::joule_per_kelvin,
    heat_transfer::watt_per_square_meter_kelvin,
    length::meter,
    mass_density::kilogram_per_cubic_meter,
    specific_heat_capacity::joule_per_kilogram_kelvin,
    thermal_conductance::watt_per_kelvin,
    thermal_conductivity::watt_per_meter_kelvin,
};

use crate::building::ZoneId;
use crate::equivalent::{EquivalentCircuit, LayerArrays, ReductionSettings};
use crate::errors::{ElementError, ElementResult};
use crate::layer::Layer;
use crate::material::Material;
use crate::tools::{reciprocal_sum, sanitize_name};

#[cfg(test)]
use proptest::{
    arbitrary::{any, Arbitrary},
    prelude::prop,
    strategy::{BoxedStrategy, Strategy},
};

/// Earliest year covered by the retrofit standards.
pub const FIRST_RETROFIT_YEAR: i32 = 1977;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ElementKind {
    OuterWall,
    Door,
    Rooftop,
    GroundFloor,
    Window,
    InnerWall,
    Ceiling,
    Floor,
    InterzonalWall,
    InterzonalCeiling,
    InterzonalFloor,
}

/// Per-orientation area table of a zone that an element contributes to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum AreaTable {
    Outer,
    Window,
}

impl ElementKind {
    pub const ALL: [ElementKind; 11] = [
        ElementKind::OuterWall,
        ElementKind::Door,
        ElementKind::Rooftop,
        ElementKind::GroundFloor,
        ElementKind::Window,
        ElementKind::InnerWall,
        ElementKind::Ceiling,
        ElementKind::Floor,
        ElementKind::InterzonalWall,
        ElementKind::InterzonalCeiling,
        ElementKind::InterzonalFloor,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ElementKind::OuterWall => "OuterWall",
            ElementKind::Door => "Door",
            ElementKind::Rooftop => "Rooftop",
            ElementKind::GroundFloor => "GroundFloor",
            ElementKind::Window => "Window",
            ElementKind::InnerWall => "InnerWall",
            ElementKind::Ceiling => "Ceiling",
            ElementKind::Floor => "Floor",
            ElementKind::InterzonalWall => "InterzonalWall",
            ElementKind::InterzonalCeiling => "InterzonalCeiling",
            ElementKind::InterzonalFloor => "InterzonalFloor",
        }
    }

    /// Which area table of the parent zone has to be refreshed when area or
    /// orientation of this element change.
    pub fn area_table(&self) -> Option<AreaTable> {
        match self {
            ElementKind::OuterWall
            | ElementKind::Door
            | ElementKind::Rooftop
            | ElementKind::GroundFloor => Some(AreaTable::Outer),
            ElementKind::Window => Some(AreaTable::Window),
            _ => None,
        }
    }

    /// Elements loaded asymmetrically (sun on one face) use C1_korr instead of C1.
    pub fn uses_corrected_capacity(&self) -> bool {
        matches!(
            self,
            ElementKind::OuterWall | ElementKind::Rooftop | ElementKind::GroundFloor
        )
    }

    pub fn is_massless(&self) -> bool {
        matches!(self, ElementKind::Window)
    }

    pub fn is_interzonal(&self) -> bool {
        matches!(
            self,
            ElementKind::InterzonalWall
                | ElementKind::InterzonalCeiling
                | ElementKind::InterzonalFloor
        )
    }

    pub fn default_orientation(&self) -> Option<Orientation> {
        match self {
            ElementKind::Rooftop | ElementKind::Ceiling | ElementKind::InterzonalCeiling => {
                Some(Orientation::Roof)
            }
            ElementKind::GroundFloor | ElementKind::Floor | ElementKind::InterzonalFloor => {
                Some(Orientation::Floor)
            }
            _ => None,
        }
    }

    pub fn default_tilt(&self) -> Option<Angle> {
        match self.default_orientation() {
            Some(_) => Some(Angle::new::<degree>(0.0)),
            None => None,
        }
    }

    /// Maximal U-value [W/(m^2.K)] after a retrofit in the given year
    /// (WSVO 1977/1982/1995, EnEV 2002/2009/2014).
    pub fn retrofit_u_value(&self, year: i32) -> Option<f64> {
        let table: [f64; 5] = match self {
            ElementKind::OuterWall => [1.06, 0.6, 0.5, 0.45, 0.24],
            ElementKind::Rooftop => [0.45, 0.45, 0.3, 0.3, 0.2],
            ElementKind::GroundFloor => [0.8, 0.7, 0.5, 0.4, 0.3],
            _ => return None,
        };
        let index = match year.max(FIRST_RETROFIT_YEAR) {
            i32::MIN..=1981 => 0,
            1982..=1994 => 1,
            1995..=2001 => 2,
            2002..=2008 => 3,
            _ => 4,
        };
        Some(table[index])
    }
}

impl fmt::Display for ElementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ElementKind {
    type Err = ElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementKind::ALL
            .iter()
            .find(|kind| kind.name() == s)
            .copied()
            .ok_or_else(|| ElementError::Conversion {
                field: "kind",
                value: s.into(),
            })
    }
}

/// Direction the outer face of an element is facing.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum Orientation {
    /// 0 north, 90 east, 180 south, 270 west
    Azimuth(Angle),
    Roof,
    Floor,
}

impl Orientation {
    /// Degrees with the usual catalog convention of -1 for roofs and -2 for floors.
    pub fn from_degrees(value: f64) -> Orientation {
        if value == -1.0 {
            Orientation::Roof
        } else if value == -2.0 {
            Orientation::Floor
        } else {
            Orientation::Azimuth(Angle::new::<degree>(value))
        }
    }

    pub fn to_degrees(&self) -> f64 {
        match self {
            Orientation::Azimuth(angle) => angle.get::<degree>(),
            Orientation::Roof => -1.0,
            Orientation::Floor => -2.0,
        }
    }
}

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Orientation::Azimuth(_) => write!(f, "{}°", self.to_degrees()),
            Orientation::Roof => f.write_str("roof"),
            Orientation::Floor => f.write_str("floor"),
        }
    }
}

/// Fractions of the outer surface's radiative exchange with sky, ground,
/// obstructions and other surfaces at ambient temperature.
/// Either all zero (use defaults downstream) or summing up to 1.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ViewFactors([f64; 4]);

impl ViewFactors {
    pub fn new(values: [f64; 4]) -> ElementResult<ViewFactors> {
        if values.iter().any(|v| !v.is_finite()) {
            return Err(ElementError::Conversion {
                field: "view_factors",
                value: format!("{values:?}"),
            });
        }
        let sum: f64 = values.iter().sum();
        let all_zero = values.iter().all(|v| *v == 0.0);
        if values.iter().any(|v| *v < 0.0) || !(all_zero || abs_diff_eq!(sum, 1.0, epsilon = 1e-9))
        {
            return Err(ElementError::invalid_input(
                "view_factors",
                format!("{values:?}"),
                "view factors must be >= 0 and sum up to 1 or be all 0",
            ));
        }
        Ok(ViewFactors(values))
    }

    pub fn values(&self) -> [f64; 4] {
        self.0
    }
}

impl TryFrom<&[f64]> for ViewFactors {
    type Error = ElementError;

    fn try_from(value: &[f64]) -> Result<Self, Self::Error> {
        let values: [f64; 4] = value.try_into().map_err(|_| ElementError::Conversion {
            field: "view_factors",
            value: format!("{value:?}"),
        })?;
        ViewFactors::new(values)
    }
}

/// Order in which the layers are handed to the reduction.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub enum TraversalOrder {
    #[default]
    InnerToOuter,
    /// Used when the inner side is unheated and the outer side is heated,
    /// so that the reduction always starts at the conditioned side.
    OuterToInner,
}

/// Steady-state resistances of an element. All resistances in K/W.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct SteadyState {
    pub r_conduc: f64,
    pub r_inner_conv: f64,
    pub r_inner_rad: f64,
    pub r_inner_comb: f64,
    pub r_outer_conv: f64,
    pub r_outer_rad: f64,
    pub r_outer_comb: f64,
    pub ua_value: ThermalConductance,
    pub u_value: HeatTransfer,
}

impl SteadyState {
    /// Conduction through the layers in series with the two surface films, each
    /// film being convection and radiation in parallel.
    /// A missing outer film counts as zero resistance.
    pub fn compute(
        layers: &[Layer],
        area: Area,
        inner: (HeatTransfer, HeatTransfer),
        outer: Option<(HeatTransfer, HeatTransfer)>,
    ) -> ElementResult<SteadyState> {
        let a = area.get::<square_meter>();
        if !(a.is_finite() && a > 0.0) {
            return Err(ElementError::invalid_configuration(format!(
                "area must be positive, got {a} m^2"
            )));
        }

        let r_conduc = layers.iter().map(Layer::resistance_per_area).sum::<f64>() / a;
        let (r_inner_conv, r_inner_rad, r_inner_comb) = film(inner, a, "inner")?;
        let (r_outer_conv, r_outer_rad, r_outer_comb) = match outer {
            Some(outer) => film(outer, a, "outer")?,
            None => (0.0, 0.0, 0.0),
        };

        let r_total = r_inner_comb + r_conduc + r_outer_comb;
        if !(r_total.is_finite() && r_total > 0.0) {
            return Err(ElementError::invalid_configuration(format!(
                "total resistance must be positive, got {r_total} K/W"
            )));
        }
        let ua = r_total.recip();

        Ok(SteadyState {
            r_conduc,
            r_inner_conv,
            r_inner_rad,
            r_inner_comb,
            r_outer_conv,
            r_outer_rad,
            r_outer_comb,
            ua_value: ThermalConductance::new::<watt_per_kelvin>(ua),
            u_value: HeatTransfer::new::<watt_per_square_meter_kelvin>(ua / a),
        })
    }
}

fn film(coefficients: (HeatTransfer, HeatTransfer), area: f64, side: &str) -> ElementResult<(f64, f64, f64)> {
    let h_conv = coefficients.0.get::<watt_per_square_meter_kelvin>();
    let h_rad = coefficients.1.get::<watt_per_square_meter_kelvin>();
    if !(h_conv > 0.0 && h_rad > 0.0) {
        return Err(ElementError::invalid_configuration(format!(
            "{side} convection ({h_conv}) and radiation ({h_rad}) must be positive"
        )));
    }
    let r_conv = (h_conv * area).recip();
    let r_rad = (h_rad * area).recip();
    Ok((r_conv, r_rad, reciprocal_sum!(r_conv, r_rad)))
}

/// Field of an element that can be set from text.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum ElementProperty {
    Area,
    Tilt,
    Orientation,
    InnerConvection,
    InnerRadiation,
    OuterConvection,
    OuterRadiation,
    YearOfConstruction,
    YearOfRetrofit,
    ViewFactors,
}

impl ElementProperty {
    pub fn field(&self) -> &'static str {
        match self {
            ElementProperty::Area => "area",
            ElementProperty::Tilt => "tilt",
            ElementProperty::Orientation => "orientation",
            ElementProperty::InnerConvection => "inner_convection",
            ElementProperty::InnerRadiation => "inner_radiation",
            ElementProperty::OuterConvection => "outer_convection",
            ElementProperty::OuterRadiation => "outer_radiation",
            ElementProperty::YearOfConstruction => "year_of_construction",
            ElementProperty::YearOfRetrofit => "year_of_retrofit",
            ElementProperty::ViewFactors => "view_factors",
        }
    }
}

impl FromStr for ElementProperty {
    type Err = ElementError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use ElementProperty::*;
        [
            Area,
            Tilt,
            Orientation,
            InnerConvection,
            InnerRadiation,
            OuterConvection,
            OuterRadiation,
            YearOfConstruction,
            YearOfRetrofit,
            ViewFactors,
        ]
        .into_iter()
        .find(|p| p.field() == s)
        .ok_or_else(|| ElementError::Conversion {
            field: "property",
            value: s.into(),
        })
    }
}

/// Wall, roof, floor or window made of a stack of layers.
#[derive(Clone, Debug, PartialEq)]
pub struct BuildingElement {
    kind: ElementKind,
    name: Option<String>,
    parent: Option<ZoneId>,
    other_side: Option<ZoneId>,

    pub construction_type: Option<String>,
    year_of_construction: Option<i32>,
    year_of_retrofit: Option<i32>,
    pub building_age_group: Option<[i32; 2]>,

    area: Option<Area>,
    tilt: Option<Angle>,
    orientation: Option<Orientation>,
    inner_convection: Option<HeatTransfer>,
    inner_radiation: Option<HeatTransfer>,
    outer_convection: Option<HeatTransfer>,
    outer_radiation: Option<HeatTransfer>,

    layers: Vec<Layer>,
    view_factors: ViewFactors,

    steady_state: SteadyState,
    circuit: EquivalentCircuit,
}

impl BuildingElement {
    /// Standalone element, not attached to any zone.
    pub fn new(kind: ElementKind) -> BuildingElement {
        BuildingElement {
            kind,
            name: None,
            parent: None,
            other_side: None,
            construction_type: None,
            year_of_construction: None,
            year_of_retrofit: None,
            building_age_group: None,
            area: None,
            tilt: kind.default_tilt(),
            orientation: kind.default_orientation(),
            inner_convection: None,
            inner_radiation: None,
            outer_convection: None,
            outer_radiation: None,
            layers: Vec::new(),
            view_factors: ViewFactors::default(),
            steady_state: SteadyState::default(),
            circuit: EquivalentCircuit::default(),
        }
    }

    pub(crate) fn with_parent(kind: ElementKind, parent: ZoneId) -> BuildingElement {
        BuildingElement {
            parent: Some(parent),
            ..BuildingElement::new(kind)
        }
    }

    pub fn kind(&self) -> ElementKind {
        self.kind
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn parent(&self) -> Option<ZoneId> {
        self.parent
    }

    pub fn other_side(&self) -> Option<ZoneId> {
        self.other_side
    }

    pub fn area(&self) -> Option<Area> {
        self.area
    }

    pub fn tilt(&self) -> Option<Angle> {
        self.tilt
    }

    pub fn orientation(&self) -> Option<Orientation> {
        self.orientation
    }

    pub fn inner_convection(&self) -> Option<HeatTransfer> {
        self.inner_convection
    }

    pub fn inner_radiation(&self) -> Option<HeatTransfer> {
        self.inner_radiation
    }

    pub fn outer_convection(&self) -> Option<HeatTransfer> {
        self.outer_convection
    }

    pub fn outer_radiation(&self) -> Option<HeatTransfer> {
        self.outer_radiation
    }

    pub fn layers(&self) -> &[Layer] {
        &self.layers
    }

    pub fn view_factors(&self) -> ViewFactors {
        self.view_factors
    }

    pub fn year_of_construction(&self) -> Option<i32> {
        self.year_of_construction
    }

    pub fn year_of_retrofit(&self) -> Option<i32> {
        self.year_of_retrofit
    }

    /// Year of construction of the element, or the first known year of the
    /// fallback chain (zone, building, ...).
    pub fn resolve_year_of_construction<I>(&self, fallbacks: I) -> Option<i32>
    where
        I: IntoIterator<Item = Option<i32>>,
    {
        self.year_of_construction
            .or_else(|| fallbacks.into_iter().flatten().next())
    }

    pub fn steady_state(&self) -> &SteadyState {
        &self.steady_state
    }

    pub fn circuit(&self) -> &EquivalentCircuit {
        &self.circuit
    }

    pub fn ua_value(&self) -> ThermalConductance {
        self.steady_state.ua_value
    }

    pub fn u_value(&self) -> HeatTransfer {
        self.steady_state.u_value
    }

    /// Heat capacity of all layers, zero without an area.
    pub fn heat_capacity(&self) -> HeatCapacity {
        match self.area {
            Some(area) => self.layers.iter().map(|layer| layer.heat_capacity(area)).sum(),
            None => HeatCapacity::new::<joule_per_kelvin>(0.0),
        }
    }

    /// Area and both inner film coefficients are known, derived values can be computed.
    pub fn is_ready(&self) -> bool {
        self.area.is_some() && self.inner_convection.is_some() && self.inner_radiation.is_some()
    }

    /// Recompute the steady-state resistances and UA/U values from the current
    /// layers, area and film coefficients. Nothing is written on failure.
    pub fn recompute_thermal_properties(&mut self) -> ElementResult<()> {
        let (area, inner_convection, inner_radiation) =
            match (self.area, self.inner_convection, self.inner_radiation) {
                (Some(a), Some(c), Some(r)) => (a, c, r),
                _ => {
                    return Err(ElementError::invalid_configuration(
                        "area, inner convection and inner radiation have to be set",
                    ))
                }
            };
        let outer = self.outer_convection.zip(self.outer_radiation);
        self.steady_state = SteadyState::compute(
            &self.layers,
            area,
            (inner_convection, inner_radiation),
            outer,
        )?;
        Ok(())
    }

    /// Same as [`Self::update`] for optional inputs, `None` keeps the current value.
    fn update_if_some<T>(
        &mut self,
        field: fn(&mut Self) -> &mut Option<T>,
        value: Option<T>,
    ) -> ElementResult<()> {
        match value {
            Some(value) => self.update(field, Some(value)),
            None => self.refresh(),
        }
    }

    /// Zero every calculated value.
    pub fn set_calc_default(&mut self) {
        self.steady_state = SteadyState::default();
        self.circuit = EquivalentCircuit::default();
    }

    fn refresh(&mut self) -> ElementResult<()> {
        if self.is_ready() {
            self.recompute_thermal_properties()?;
        }
        Ok(())
    }

    /// Replace a field and refresh the derived values, restoring the old value
    /// if the refresh fails.
    fn update<T>(&mut self, field: fn(&mut Self) -> &mut T, value: T) -> ElementResult<()> {
        let old = std::mem::replace(field(self), value);
        if let Err(e) = self.refresh() {
            *field(self) = old;
            return Err(e);
        }
        Ok(())
    }

    /// Material data of all layers in conduction-path order.
    pub fn gather_layer_arrays(&self, order: TraversalOrder) -> LayerArrays {
        let mut arrays = LayerArrays::default();
        let layers: Box<dyn Iterator<Item = &Layer>> = match order {
            TraversalOrder::InnerToOuter => Box::new(self.layers.iter()),
            TraversalOrder::OuterToInner => Box::new(self.layers.iter().rev()),
        };
        for layer in layers {
            arrays
                .density
                .push(layer.material.density().get::<kilogram_per_cubic_meter>());
            arrays.thermal_conductivity.push(
                layer
                    .material
                    .thermal_conductivity()
                    .get::<watt_per_meter_kelvin>(),
            );
            arrays
                .heat_capacity
                .push(layer.material.heat_capacity().get::<joule_per_kilogram_kelvin>());
            arrays.thickness.push(layer.thickness().get::<meter>());
        }
        arrays
    }

    /// Reduce the element to the analogous model and store the result.
    ///
    /// With [`TraversalOrder::OuterToInner`] the reduction runs on the reversed
    /// stack and the two sides are swapped back afterwards, so R1/C1 always
    /// belong to the first stored layer.
    pub fn compute_equivalent_circuit(
        &mut self,
        order: TraversalOrder,
        settings: &ReductionSettings,
    ) -> ElementResult<EquivalentCircuit> {
        let area = self
            .area
            .ok_or_else(|| ElementError::invalid_configuration("area has to be set"))?
            .get::<square_meter>();
        let arrays = self.gather_layer_arrays(order);

        let mut circuit = if self.kind.is_massless() {
            EquivalentCircuit::massless(&arrays, area)?
        } else {
            EquivalentCircuit::reduce(&arrays, area, settings)?
        };
        if order == TraversalOrder::OuterToInner {
            circuit.swap_sides();
        }
        if self.kind.uses_corrected_capacity() {
            circuit.c1 = circuit.c1_korr;
        }

        self.circuit = circuit;
        Ok(circuit)
    }

    /// Insert a layer at `position` (0 is the inner side) or append it.
    pub fn add_layer(&mut self, layer: Layer, position: Option<usize>) -> ElementResult<()> {
        let index = position.unwrap_or(self.layers.len());
        if index > self.layers.len() {
            return Err(ElementError::invalid_input(
                "layer position",
                index,
                format!("element has only {} layers", self.layers.len()),
            ));
        }
        self.layers.insert(index, layer);
        if let Err(e) = self.refresh() {
            self.layers.remove(index);
            return Err(e);
        }
        Ok(())
    }

    /// Append already ordered layers.
    pub fn add_layer_list<I>(&mut self, layers: I) -> ElementResult<()>
    where
        I: IntoIterator<Item = Layer>,
    {
        let len = self.layers.len();
        self.layers.extend(layers);
        if let Err(e) = self.refresh() {
            self.layers.truncate(len);
            return Err(e);
        }
        Ok(())
    }

    pub fn clear_layers(&mut self) -> ElementResult<()> {
        self.update(|e| &mut e.layers, Vec::new())
    }

    pub fn set_name(&mut self, value: &str) {
        self.name = sanitize_name(value);
    }

    pub fn set_area(&mut self, value: Option<Area>) -> ElementResult<()> {
        if let Some(area) = value {
            let a = area.get::<square_meter>();
            if !a.is_finite() {
                return Err(ElementError::Conversion {
                    field: "area",
                    value: a.to_string(),
                });
            }
            if a <= 0.0 {
                return Err(ElementError::invalid_input("area", a, "area must be positive"));
            }
        }
        self.update_if_some(|e| &mut e.area, value)
    }

    pub fn set_tilt(&mut self, value: Option<Angle>) -> ElementResult<()> {
        if let Some(tilt) = value {
            check_finite("tilt", tilt.get::<degree>())?;
        }
        self.tilt = value;
        Ok(())
    }

    pub fn set_orientation(&mut self, value: Option<Orientation>) {
        self.orientation = value;
    }

    pub fn set_inner_convection(&mut self, value: Option<HeatTransfer>) -> ElementResult<()> {
        check_coefficient("inner_convection", value)?;
        self.update_if_some(|e| &mut e.inner_convection, value)
    }

    pub fn set_inner_radiation(&mut self, value: Option<HeatTransfer>) -> ElementResult<()> {
        check_coefficient("inner_radiation", value)?;
        self.update_if_some(|e| &mut e.inner_radiation, value)
    }

    pub fn set_outer_convection(&mut self, value: Option<HeatTransfer>) -> ElementResult<()> {
        check_coefficient("outer_convection", value)?;
        self.update_if_some(|e| &mut e.outer_convection, value)
    }

    pub fn set_outer_radiation(&mut self, value: Option<HeatTransfer>) -> ElementResult<()> {
        check_coefficient("outer_radiation", value)?;
        self.update_if_some(|e| &mut e.outer_radiation, value)
    }

    /// Clear all four film coefficients without recomputing.
    pub fn reset_film_coefficients(&mut self) {
        self.inner_convection = None;
        self.inner_radiation = None;
        self.outer_convection = None;
        self.outer_radiation = None;
    }

    pub fn set_year_of_construction(&mut self, value: Option<i32>) {
        self.year_of_construction = value;
    }

    pub fn set_year_of_retrofit(&mut self, value: Option<i32>) -> ElementResult<()> {
        self.set_year_of_retrofit_with(value, [])
    }

    /// Like [`Self::set_year_of_retrofit`], the year of construction may also
    /// come from the fallback chain (zone, building, ...).
    pub fn set_year_of_retrofit_with<I>(
        &mut self,
        value: Option<i32>,
        fallbacks: I,
    ) -> ElementResult<()>
    where
        I: IntoIterator<Item = Option<i32>>,
    {
        if value.is_some() && self.resolve_year_of_construction(fallbacks).is_none() {
            return Err(ElementError::RetrofitBeforeConstruction);
        }
        self.year_of_retrofit = value;
        Ok(())
    }

    pub fn set_view_factors(&mut self, value: &[f64]) -> ElementResult<()> {
        self.view_factors = ViewFactors::try_from(value)?;
        Ok(())
    }

    pub fn set_other_side(&mut self, value: Option<ZoneId>) -> ElementResult<()> {
        if value.is_some() && !self.kind.is_interzonal() {
            return Err(ElementError::invalid_input(
                "other_side",
                self.kind,
                "other side can only be set for interzonal elements",
            ));
        }
        self.other_side = value;
        Ok(())
    }

    /// Set a property from its textual representation. Empty text, `None` and
    /// `null` are passed on to the typed setter as `None`.
    /// The element is unchanged on error.
    pub fn set_from_text(&mut self, property: ElementProperty, raw: &str) -> ElementResult<()> {
        let field = property.field();
        let raw = raw.trim();
        let is_null = raw.is_empty() || raw == "None" || raw == "null";

        let number = || -> ElementResult<Option<f64>> {
            if is_null {
                return Ok(None);
            }
            raw.parse::<f64>()
                .ok()
                .filter(|v| v.is_finite())
                .map(Some)
                .ok_or_else(|| ElementError::Conversion {
                    field,
                    value: raw.into(),
                })
        };
        let year = || -> ElementResult<Option<i32>> {
            if is_null {
                return Ok(None);
            }
            raw.parse::<i32>()
                .map(Some)
                .map_err(|_| ElementError::Conversion {
                    field,
                    value: raw.into(),
                })
        };
        let coefficient = |v: Option<f64>| v.map(HeatTransfer::new::<watt_per_square_meter_kelvin>);

        match property {
            ElementProperty::Area => self.set_area(number()?.map(Area::new::<square_meter>)),
            ElementProperty::Tilt => self.set_tilt(number()?.map(Angle::new::<degree>)),
            ElementProperty::Orientation => {
                self.set_orientation(number()?.map(Orientation::from_degrees));
                Ok(())
            }
            ElementProperty::InnerConvection => self.set_inner_convection(coefficient(number()?)),
            ElementProperty::InnerRadiation => self.set_inner_radiation(coefficient(number()?)),
            ElementProperty::OuterConvection => self.set_outer_convection(coefficient(number()?)),
            ElementProperty::OuterRadiation => self.set_outer_radiation(coefficient(number()?)),
            ElementProperty::YearOfConstruction => {
                self.set_year_of_construction(year()?);
                Ok(())
            }
            ElementProperty::YearOfRetrofit => self.set_year_of_retrofit(year()?),
            ElementProperty::ViewFactors => {
                let values = raw
                    .trim_start_matches('[')
                    .trim_end_matches(']')
                    .split(',')
                    .map(|v| v.trim().parse::<f64>())
                    .collect::<Result<Vec<_>, _>>()
                    .map_err(|_| ElementError::Conversion {
                        field,
                        value: raw.into(),
                    })?;
                self.set_view_factors(&values)
            }
        }
    }

    /// Add an insulation layer, by default on the outer side, optionally covered
    /// with plaster. Plaster is only possible on a surface: innermost for
    /// position 0, outermost without a position.
    /// Returns the index of the insulation layer.
    pub fn insulate(
        &mut self,
        material: Rc<Material>,
        thickness: Length,
        position: Option<usize>,
        plaster: Option<(Rc<Material>, Length)>,
    ) -> ElementResult<usize> {
        let mut updated = self.clone();
        let index = match (position, plaster) {
            (position, None) => {
                let index = position.unwrap_or(updated.layers.len());
                updated.add_layer(Layer::new(thickness, material)?, Some(index))?;
                index
            }
            (Some(0), Some((plaster, plaster_thickness))) => {
                updated.add_layer(Layer::new(thickness, material)?, Some(0))?;
                updated.add_layer(Layer::new(plaster_thickness, plaster)?, Some(0))?;
                1
            }
            (None, Some((plaster, plaster_thickness))) => {
                let index = updated.layers.len();
                updated.add_layer(Layer::new(thickness, material)?, None)?;
                updated.add_layer(Layer::new(plaster_thickness, plaster)?, None)?;
                index
            }
            (Some(position), Some(_)) => {
                return Err(ElementError::invalid_input(
                    "insulation position",
                    position,
                    "plaster can only cover the innermost or outermost layer",
                ))
            }
        };
        *self = updated;
        Ok(index)
    }

    /// Bring the element to the U-value required for a retrofit in the given
    /// year by adding an outside insulation layer of just the right thickness.
    ///
    /// Returns the thickness of the added layer, or `None` if the element
    /// already complies.
    pub fn retrofit(
        &mut self,
        year_of_retrofit: i32,
        insulation: Rc<Material>,
    ) -> ElementResult<Option<Length>> {
        let year = if year_of_retrofit < FIRST_RETROFIT_YEAR {
            warn!(
                "Year of retrofit {} is not covered by the retrofit standards, using {} instead",
                year_of_retrofit, FIRST_RETROFIT_YEAR
            );
            FIRST_RETROFIT_YEAR
        } else {
            year_of_retrofit
        };
        let u_target = self
            .kind
            .retrofit_u_value(year)
            .ok_or(ElementError::RetrofitUnsupported { kind: self.kind })?;

        let mut updated = self.clone();
        updated.set_calc_default();
        updated.recompute_thermal_properties()?;

        let area = updated.area.map(|a| a.get::<square_meter>()).unwrap_or_default();
        let ua_target = u_target * area;
        if updated.ua_value().get::<watt_per_kelvin>() <= ua_target {
            *self = updated;
            return Ok(None);
        }

        let s = &updated.steady_state;
        let r_layers_needed =
            (1.0 - ua_target * s.r_inner_comb - ua_target * s.r_outer_comb) / ua_target * area;
        let r_insulation = r_layers_needed - s.r_conduc * area;
        let thickness = Length::new::<meter>(
            r_insulation
                * insulation
                    .thermal_conductivity()
                    .get::<watt_per_meter_kelvin>(),
        );

        updated.insulate(insulation, thickness, None, None)?;
        *self = updated;
        Ok(Some(thickness))
    }
}

fn check_finite(field: &'static str, value: f64) -> ElementResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ElementError::Conversion {
            field,
            value: value.to_string(),
        })
    }
}

fn check_coefficient(field: &'static str, value: Option<HeatTransfer>) -> ElementResult<()> {
    if let Some(h) = value {
        let h = h.get::<watt_per_square_meter_kelvin>();
        check_finite(field, h)?;
        if h < 0.0 {
            return Err(ElementError::invalid_input(
                field,
                h,
                "heat transfer coefficient can't be negative",
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
impl Arbitrary for BuildingElement {
    type Parameters = ();
    type Strategy = BoxedStrategy<BuildingElement>;

    /// Ready outer walls with 0 to 8 layers.
    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (
            0.5f64..100f64,
            prop::array::uniform4(0.5f64..30f64),
            prop::bool::ANY,
            prop::collection::vec(any::<Layer>(), 0..8),
        )
            .prop_map(|(area, h, has_outer, layers)| {
                let h = h.map(HeatTransfer::new::<watt_per_square_meter_kelvin>);
                let mut element = BuildingElement::new(ElementKind::OuterWall);
                element.add_layer_list(layers).unwrap();
                element
                    .set_area(Some(Area::new::<square_meter>(area)))
                    .unwrap();
                element.set_inner_convection(Some(h[0])).unwrap();
                element.set_inner_radiation(Some(h[1])).unwrap();
                if has_outer {
                    element.set_outer_convection(Some(h[2])).unwrap();
                    element.set_outer_radiation(Some(h[3])).unwrap();
                }
                element
            })
            .boxed()
    }
}
