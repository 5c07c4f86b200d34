pub mod dto;
pub mod seed;
pub mod services;

pub use seed::seed_demo_data;
pub use services::*;
