pub mod serde;
pub mod serial;
pub mod simulated;
