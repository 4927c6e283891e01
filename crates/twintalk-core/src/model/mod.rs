//! Domain model: twins, definitions, attributes, states, and the SenML
//! records telemetry messages carry.

pub mod senml;
pub mod state;
pub mod twin;
pub mod value;

pub use senml::{BusMessage, SenmlRecord};
pub use state::State;
pub use twin::{Attribute, Definition, Twin, TwinId, SUBTOPIC_WILDCARD};
pub use value::Value;
