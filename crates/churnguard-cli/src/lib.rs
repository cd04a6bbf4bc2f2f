pub mod cli;
pub mod render;
pub mod startup;

pub use cli::*;
pub use render::*;
pub use startup::*;
