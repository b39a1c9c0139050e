use std::collections::BTreeMap;
use std::fmt;

use log::warn;
use multimap::MultiMap;
use petgraph::{
    graph::{NodeIndex, UnGraph},
    visit::{EdgeRef, IntoNodeReferences, NodeIndexable},
};
use uom::si::{
    f64::{HeatCapacity, ThermalConductance},
    heat_capacity::joule_per_kelvin,
    thermal_conductance::watt_per_kelvin,
};

use crate::building::{Building, ElementId, ZoneId};
use crate::element::{BuildingElement, ElementKind};
use crate::errors::{ElementError, ElementResult};

#[derive(Clone, Debug, PartialEq)]
pub struct Node {
    pub zone_name: Option<String>,
    /// Element label and capacity name (`C1`, `C2`)
    pub marker: Option<(String, String)>,
    pub heat_capacity: HeatCapacity,
    pub element_group_index: Option<usize>, // Groups nodes belonging to the same element, only for display
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Edge {
    pub conductance: ThermalConductance,
}

/// Thermal network of a computed building: one node per zone, ambient and
/// ground, plus the capacities of the equivalent circuit of each element.
#[derive(Clone, Debug)]
pub struct RcNetwork {
    pub graph: UnGraph<Node, Edge>,

    pub zone_indices: BTreeMap<ZoneId, NodeIndex>,
    pub ambient: NodeIndex,
    pub ground: NodeIndex,

    /// Capacity nodes of each element, C1 first
    pub element_indices: MultiMap<ElementId, NodeIndex>,
}

/// What the outer side of an element is connected to.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum FarSide {
    Ambient,
    Ground,
    Zone(ZoneId),
    /// Both faces see the same zone, the element is only a capacity.
    None,
}

impl FarSide {
    pub fn of(element: &BuildingElement) -> FarSide {
        match element.kind() {
            ElementKind::OuterWall | ElementKind::Door | ElementKind::Rooftop | ElementKind::Window => {
                FarSide::Ambient
            }
            ElementKind::GroundFloor => FarSide::Ground,
            ElementKind::InterzonalWall | ElementKind::InterzonalCeiling | ElementKind::InterzonalFloor => {
                element.other_side().map_or(FarSide::None, FarSide::Zone)
            }
            ElementKind::InnerWall | ElementKind::Ceiling | ElementKind::Floor => FarSide::None,
        }
    }
}

#[derive(Copy, Clone, Debug)]
pub struct DotDisplayer<'a> {
    rc_network: &'a RcNetwork,
}

impl<'a> fmt::Display for DotDisplayer<'a> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let g = &self.rc_network.graph;

        let mut ungrouped_nodes: Vec<_> = Vec::new();
        let mut grouped_nodes: BTreeMap<usize, Vec<_>> = BTreeMap::new();

        for (index, node) in g.node_references() {
            let index = g.to_index(index);
            match node.element_group_index {
                Some(group) => grouped_nodes.entry(group).or_default().push((index, node)),
                None => ungrouped_nodes.push((index, node)),
            }
        }

        writeln!(f, "graph {{")?;
        for (index, node) in ungrouped_nodes {
            writeln!(f, "    node_{} [ label = \"{}\" ]", index, node)?;
        }

        for (group_index, group) in grouped_nodes {
            writeln!(f, "    subgraph cluster_{} {{", group_index)?;
            if let Some((element, _)) = group.first().and_then(|(_, node)| node.marker.as_ref()) {
                writeln!(f, "        label = \"{}\"", element)?;
            }
            for (index, node) in group {
                writeln!(f, "        node_{} [ label = \"{}\" ]", index, node)?;
            }
            writeln!(f, "    }}")?;
        }

        for edge in g.edge_references() {
            writeln!(
                f,
                "    node_{} -- node_{} [ label = \"{}\" ]",
                g.to_index(edge.source()),
                g.to_index(edge.target()),
                edge.weight()
            )?
        }

        writeln!(f, "}}")
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(name) = &self.zone_name {
            write!(f, "{name}\\n")?;
        }
        if let Some((element, capacity)) = &self.marker {
            write!(f, "{element}/{capacity}\\n")?;
        }
        write!(f, "{} J/K", self.heat_capacity.get::<joule_per_kelvin>())
    }
}

impl fmt::Display for Edge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} W/K", self.conductance.get::<watt_per_kelvin>())
    }
}

impl<'a> RcNetwork {
    pub fn to_dot(&'a self) -> DotDisplayer<'a> {
        DotDisplayer { rc_network: self }
    }
}

impl TryFrom<&Building> for RcNetwork {
    type Error = ElementError;

    /// Uses the circuits as last computed, see [`Building::calc_all`].
    /// Elements without an area are left out.
    fn try_from(building: &Building) -> ElementResult<Self> {
        let mut graph = UnGraph::default();
        let zone_indices: BTreeMap<_, _> = building
            .zones()
            .map(|(id, zone)| {
                (
                    id,
                    graph.add_node(Node {
                        zone_name: Some(zone.name.clone()),
                        marker: None,
                        heat_capacity: zone.air_heat_capacity(&building.air),
                        element_group_index: None,
                    }),
                )
            })
            .collect();
        let mut boundary_node = |name: &str| {
            graph.add_node(Node {
                zone_name: Some(name.into()),
                marker: None,
                heat_capacity: HeatCapacity::new::<joule_per_kelvin>(f64::INFINITY),
                element_group_index: None,
            })
        };
        let ambient = boundary_node("ambient");
        let ground = boundary_node("ground");
        let mut element_indices = MultiMap::new();

        let mut group_index = 0;
        for (id, element) in building.elements() {
            let label = building.element_label(id)?;
            let Some(parent) = element.parent() else {
                continue;
            };
            if element.area().is_none() {
                warn!("{} has no area, left out of the network", label);
                continue;
            }
            let far_node = match FarSide::of(element) {
                FarSide::Ambient => Some(ambient),
                FarSide::Ground => Some(ground),
                FarSide::Zone(zone) => Some(zone_node(&zone_indices, zone)?),
                FarSide::None => None,
            };

            let builder = ElementChainBuilder {
                zone_node: zone_node(&zone_indices, parent)?,
                far_node,
                element: id,
                label: &label,
                source: element,
                group_index,
            };
            if builder.add_element_nodes(&mut graph, &mut element_indices)? {
                group_index += 1;
            }
        }

        Ok(RcNetwork {
            graph,
            zone_indices,
            ambient,
            ground,
            element_indices,
        })
    }
}

fn zone_node(indices: &BTreeMap<ZoneId, NodeIndex>, zone: ZoneId) -> ElementResult<NodeIndex> {
    indices.get(&zone).copied().ok_or(ElementError::UnknownHandle {
        label: "zone",
        index: zone.0,
    })
}

/// Helper for adding nodes and edges of one element.
/// Holds the arguments in a slightly organized fashion.
struct ElementChainBuilder<'a> {
    zone_node: NodeIndex,
    far_node: Option<NodeIndex>,
    element: ElementId,
    label: &'a str,
    source: &'a BuildingElement,
    group_index: usize,
}

impl<'a> ElementChainBuilder<'a> {
    /// zone -(R_inner + R1)- C1 -R3- C2 -(R2 + R_outer)- far side
    ///
    /// Elements without a far side end at C1, elements without mass are a
    /// single UA edge. Returns whether capacity nodes were added.
    fn add_element_nodes(
        &self,
        graph: &mut UnGraph<Node, Edge>,
        element_indices: &mut MultiMap<ElementId, NodeIndex>,
    ) -> ElementResult<bool> {
        if !self.source.is_ready() {
            return Err(ElementError::invalid_configuration(format!(
                "{}: film coefficients are missing, thermal properties were not computed",
                self.label
            )));
        }
        let s = self.source.steady_state();
        let circuit = self.source.circuit();

        if self.source.kind().is_massless() || self.source.layers().is_empty() {
            if let Some(far_node) = self.far_node {
                let ua = self.source.ua_value().get::<watt_per_kelvin>();
                graph.add_edge(
                    self.zone_node,
                    far_node,
                    Edge {
                        conductance: self.conductance(ua.recip())?,
                    },
                );
            }
            return Ok(false);
        }

        let c1 = self.add_capacity_node(
            "C1",
            circuit.c1,
            self.zone_node,
            s.r_inner_comb + circuit.r1,
            graph,
            element_indices,
        )?;

        if let Some(far_node) = self.far_node {
            let c2 = self.add_capacity_node("C2", circuit.c2, c1, circuit.r3, graph, element_indices)?;
            graph.add_edge(
                c2,
                far_node,
                Edge {
                    conductance: self.conductance(circuit.r2 + s.r_outer_comb)?,
                },
            );
        }
        Ok(true)
    }

    fn add_capacity_node(
        &self,
        name: &str,
        heat_capacity: HeatCapacity,
        prev_node: NodeIndex,
        resistance: f64,
        graph: &mut UnGraph<Node, Edge>,
        element_indices: &mut MultiMap<ElementId, NodeIndex>,
    ) -> ElementResult<NodeIndex> {
        let conductance = self.conductance(resistance)?;
        let node = graph.add_node(Node {
            zone_name: None,
            marker: Some((self.label.into(), name.into())),
            heat_capacity,
            element_group_index: Some(self.group_index),
        });
        element_indices.insert(self.element, node);
        graph.add_edge(prev_node, node, Edge { conductance });
        Ok(node)
    }

    fn conductance(&self, resistance: f64) -> ElementResult<ThermalConductance> {
        if !(resistance.is_finite() && resistance > 0.0) {
            return Err(ElementError::invalid_configuration(format!(
                "{}: resistance {} K/W can't be part of the network",
                self.label, resistance
            )));
        }
        Ok(ThermalConductance::new::<watt_per_kelvin>(resistance.recip()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use test_strategy::proptest;

    fn is_chain(element: &BuildingElement) -> bool {
        element.area().is_some() && !element.kind().is_massless() && !element.layers().is_empty()
    }

    #[proptest]
    fn graph_node_count(building: Building) {
        let mut expected_node_count = building.zones().count() + 2;
        let mut expected_edge_count = 0;
        for (_, element) in building.elements() {
            let two_sided = FarSide::of(element) != FarSide::None;
            match (is_chain(element), two_sided) {
                (true, true) => {
                    expected_node_count += 2;
                    expected_edge_count += 3;
                }
                (true, false) => {
                    expected_node_count += 1;
                    expected_edge_count += 1;
                }
                (false, true) => expected_edge_count += 1,
                (false, false) => {}
            }
        }

        let net = RcNetwork::try_from(&building).unwrap();

        assert_eq!(net.graph.node_count(), expected_node_count);
        assert_eq!(net.graph.edge_count(), expected_edge_count);
    }

    /// Total finite heat capacity of the network is the zone air plus the
    /// circuit capacities of every element, nothing gets lost.
    #[proptest]
    fn heat_capacity_sum(building: Building) {
        let mut expected_capacity: HeatCapacity = building
            .zones()
            .map(|(_, zone)| zone.air_heat_capacity(&building.air))
            .sum();
        expected_capacity += building
            .elements()
            .filter(|(_, element)| is_chain(element))
            .map(|(_, element)| {
                let circuit = element.circuit();
                match FarSide::of(element) {
                    FarSide::None => circuit.c1,
                    _ => circuit.c1 + circuit.c2,
                }
            })
            .sum::<HeatCapacity>();

        let net = RcNetwork::try_from(&building).unwrap();

        let actual_capacity: HeatCapacity = net
            .graph
            .node_weights()
            .filter(|node| node.heat_capacity.is_finite())
            .map(|node| node.heat_capacity)
            .sum();

        assert_relative_eq!(
            actual_capacity.get::<joule_per_kelvin>(),
            expected_capacity.get::<joule_per_kelvin>(),
            max_relative = 1e-9,
            epsilon = 1e-9
        );
    }

    /// Series resistance from zone to far side equals 1 / UA of the element.
    #[proptest]
    fn chain_matches_ua(building: Building) {
        let net = RcNetwork::try_from(&building).unwrap();
        for (id, element) in building.elements() {
            if !is_chain(element) || FarSide::of(element) == FarSide::None {
                continue;
            }
            let nodes = net.element_indices.get_vec(&id).unwrap();
            let zone = net.zone_indices[&element.parent().unwrap()];
            let resistance = |a, b| {
                let edge = net.graph.find_edge(a, b).unwrap();
                net.graph.edge_weight(edge).unwrap().conductance.get::<watt_per_kelvin>().recip()
            };
            let far = net.graph.neighbors(nodes[1]).find(|n| *n != nodes[0]).unwrap();
            let total = resistance(zone, nodes[0]) + resistance(nodes[0], nodes[1]) + resistance(nodes[1], far);
            assert_relative_eq!(
                total.recip(),
                element.ua_value().get::<watt_per_kelvin>(),
                max_relative = 1e-9
            );
        }
    }

    #[test]
    fn node_access() {
        let mut building = Building::from_json(
            r#"{
            materials: {
                air: { name: "air", density: 1, thermal_conductivity: 1, heat_capacity: 0.001 },
                brick: { name: "brick", density: 1800, thermal_conductivity: 0.8, heat_capacity: 0.84 },
            },
            zones: {
                a: { volume: 123 },
                b: { volume: 234 },
            },
            elements: [
                {
                    kind: "OuterWall", zone: "a", area: 10,
                    inner_convection: 2.5, inner_radiation: 5, outer_convection: 20, outer_radiation: 5,
                    layers: [{ material: "brick", thickness: 0.24 }],
                },
                {
                    kind: "Window", zone: "a", area: 2,
                    inner_convection: 2.5, inner_radiation: 5, outer_convection: 20, outer_radiation: 5,
                },
                {
                    kind: "InnerWall", zone: "b", area: 8,
                    inner_convection: 2.5, inner_radiation: 5,
                    layers: [{ material: "brick", thickness: 0.115 }],
                },
                {
                    kind: "GroundFloor", zone: "b", area: 30,
                    inner_convection: 2.5, inner_radiation: 5,
                    layers: [{ material: "brick", thickness: 0.3 }],
                },
            ],
        }"#,
        )
        .unwrap();
        building.calc_all().unwrap();
        let net = RcNetwork::try_from(&building).unwrap();

        // use std::io::Write;
        // let mut file = std::fs::File::create("/tmp/graph.dot").unwrap();
        // write!(file, "{}", net.to_dot()).unwrap();

        let a = net.zone_indices[&building.zone_id("a").unwrap()];
        let b = net.zone_indices[&building.zone_id("b").unwrap()];

        assert_eq!(
            net.graph.node_weight(a).unwrap(),
            &Node {
                zone_name: Some("a".into()),
                marker: None,
                heat_capacity: HeatCapacity::new::<joule_per_kelvin>(123.0),
                element_group_index: None
            }
        );
        assert!(net
            .graph
            .node_weight(net.ambient)
            .unwrap()
            .heat_capacity
            .is_infinite());

        let wall = net.element_indices.get_vec(&ElementId(0)).unwrap();
        assert_eq!(wall.len(), 2);
        assert!(net.graph.contains_edge(a, wall[0]));
        assert!(net.graph.contains_edge(wall[0], wall[1]));
        assert!(net.graph.contains_edge(wall[1], net.ambient));
        let circuit = building.element(ElementId(0)).unwrap().circuit();
        assert_eq!(
            net.graph.node_weight(wall[0]).unwrap(),
            &Node {
                zone_name: None,
                marker: Some(("OuterWall0".into(), "C1".into())),
                heat_capacity: circuit.c1,
                element_group_index: Some(0),
            }
        );

        assert!(net.element_indices.get_vec(&ElementId(1)).is_none());
        let window_edge = net.graph.find_edge(a, net.ambient).unwrap();
        assert_relative_eq!(
            net.graph
                .edge_weight(window_edge)
                .unwrap()
                .conductance
                .get::<watt_per_kelvin>(),
            building
                .element(ElementId(1))
                .unwrap()
                .ua_value()
                .get::<watt_per_kelvin>(),
            max_relative = 1e-12
        );

        let inner = net.element_indices.get_vec(&ElementId(2)).unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(net.graph.neighbors(inner[0]).collect::<Vec<_>>(), vec![b]);

        let floor = net.element_indices.get_vec(&ElementId(3)).unwrap();
        assert!(net.graph.contains_edge(floor[1], net.ground));
        assert_eq!(
            net.graph.node_weight(floor[1]).unwrap().element_group_index,
            Some(2)
        );

        let dot = format!("{}", net.to_dot());
        assert!(dot.starts_with("graph {"));
        assert!(dot.contains("subgraph cluster_0"));
        assert!(dot.contains("OuterWall0/C1"));
        assert!(dot.contains("label = \"OuterWall0\""));
    }

    #[test]
    fn uncomputed_building_is_rejected() {
        let building = Building::from_json(
            r#"{
            materials: {
                brick: { name: "brick", density: 1800, thermal_conductivity: 0.8 },
            },
            zones: { a: { volume: 10 } },
            elements: [
                { kind: "OuterWall", zone: "a", area: 10, layers: [{ material: "brick", thickness: 0.24 }] },
            ],
        }"#,
        )
        .unwrap();
        // circuit still all zero, R3 can't be an edge
        assert!(RcNetwork::try_from(&building).is_err());
    }

    #[test]
    fn window_without_films_is_rejected() {
        let mut building = Building::from_json(
            r#"{
            materials: {
                glass: { name: "glass", density: 2500, thermal_conductivity: 0.96, heat_capacity: 0.75 },
            },
            zones: { a: { volume: 10 } },
            elements: [
                { kind: "Window", zone: "a", area: 2, layers: [{ material: "glass", thickness: 0.024 }] },
            ],
        }"#,
        )
        .unwrap();
        building.calc_all().unwrap();
        assert_matches!(
            RcNetwork::try_from(&building),
            Err(ElementError::InvalidThermalConfiguration { .. })
        );
    }
}
