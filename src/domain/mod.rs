//! Domain layer - core business logic and entities

pub mod exchange;
pub mod registry;
pub mod swap;
