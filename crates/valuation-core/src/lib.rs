pub mod error;
pub mod outcome;
pub mod traits;
pub mod types;

pub use error::*;
pub use outcome::*;
pub use traits::*;
pub use types::*;
