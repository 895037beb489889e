#![deny(unsafe_code)]
#![warn(clippy::all)]

pub mod error;
pub mod privacy;
pub mod token;

pub use error::*;
pub use privacy::*;
pub use token::*;
