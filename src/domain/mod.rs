// Domain layer - Core types, failure taxonomy and policies

pub mod errors;
pub mod model;
pub mod rules;
pub mod surface;
