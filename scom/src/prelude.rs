pub use crate::protocol::{
    InfoMessage, Transport,
    config::ScomConfig,
    engine::{Engine, LinkStats, State},
    error::{HandshakeStage, ScomError},
    master::Master,
    signal::{Signal, opcode},
    slave::Slave,
};
pub use crate::traits::AxisSensor;
