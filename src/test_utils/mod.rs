//! the test_utils folder here will share utils or test components between
//! the unit tests of each module
mod common;
mod mock;

pub use common::*;
pub use mock::*;
