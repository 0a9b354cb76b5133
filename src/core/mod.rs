// Core module - Protocol and session logic
pub mod communication;
pub mod session;
