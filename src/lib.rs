pub mod error;
pub mod params;

pub mod align;
pub mod genome;
pub mod io;
pub mod junction;
pub mod mapq;
pub mod stats;

pub use error::Error;
