pub mod shipment;

pub use shipment::{Entity as Shipment, ShipmentStatus};
