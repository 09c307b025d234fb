//! Entity definitions for the school schema.

pub mod academic;
pub mod account;
pub mod communication;
pub mod coursework;
pub mod records;
pub mod role;

pub use academic::*;
pub use account::*;
pub use communication::*;
pub use coursework::*;
pub use records::*;
pub use role::*;
