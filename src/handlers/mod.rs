pub mod generate;
pub mod health;

pub use generate::generate_model;
pub use health::health_check;
