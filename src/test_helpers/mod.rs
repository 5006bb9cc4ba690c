pub mod fixtures;
pub mod temp;

pub use fixtures::*;
pub use temp::TestContext;
