pub mod chunk;
pub mod lexicon;
pub mod model;
pub mod preprocess;
pub mod scorer;

pub use chunk::*;
pub use lexicon::*;
pub use model::*;
pub use preprocess::*;
pub use scorer::*;
