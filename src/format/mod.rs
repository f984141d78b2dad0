pub mod descriptor;
pub mod selector;

pub use descriptor::*;
pub use selector::*;
