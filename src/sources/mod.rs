pub mod direct;
pub mod manager;
pub mod plugin;
pub mod youtube;

pub use manager::Registry;
pub use plugin::Extractor;
