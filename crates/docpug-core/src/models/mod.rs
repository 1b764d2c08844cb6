//! Domain models for the clinic core.

mod catalog;
mod discharge;
mod file;
pub(crate) mod lenient;
mod owner;
mod patient;
mod visit;

pub use catalog::*;
pub use discharge::*;
pub use file::*;
pub use owner::*;
pub use patient::*;
pub use visit::*;
