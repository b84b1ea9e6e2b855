#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

pub mod config;
pub mod error;
pub mod filter;
pub mod params;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use filter::{FilterState, YearRange};
pub use params::ShareableParams;
