pub mod combination;
pub mod hero;
pub mod run;
pub mod snapshot;

pub use combination::*;
pub use hero::*;
pub use run::*;
pub use snapshot::*;
