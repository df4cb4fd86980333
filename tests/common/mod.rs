pub mod asserts;
pub mod fixtures;
pub mod handlers;

pub use asserts::*;
pub use fixtures::*;
pub use handlers::*;
