pub mod csv_out;
pub mod sink;
pub mod store;

pub use csv_out::*;
pub use sink::*;
pub use store::*;
