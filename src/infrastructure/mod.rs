pub mod tor_control;
pub mod tor_transport;

pub use tor_control::{CircuitController, CircuitRotator, Rotation};
pub use tor_transport::{ExitCheck, TorTransport};
