pub mod building;
pub mod catalog;
pub mod element;
pub mod equivalent;
pub mod errors;
pub mod layer;
pub mod material;
pub mod rc_network;
pub mod tools;

pub use building::{Building, ElementId, ThermalZone, ZoneId};
pub use catalog::{ConstructionCatalog, TypeElement, TypeElementCatalog, TypeElementRequest};
pub use element::{BuildingElement, ElementKind, Orientation, TraversalOrder};
pub use equivalent::{EquivalentCircuit, ReductionSettings};
pub use errors::{ElementError, ElementResult};
pub use layer::Layer;
pub use material::{Material, MaterialSpec};
pub use rc_network::RcNetwork;
