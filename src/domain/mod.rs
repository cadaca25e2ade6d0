// Domain layer: core models, message contract and ports (interfaces).

pub mod messages;
pub mod model;
pub mod ports;
