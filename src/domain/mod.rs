pub mod params;
pub mod price;
pub mod slot;

pub use params::*;
pub use price::*;
pub use slot::*;
