//! Discharge document composition and the note/prescription text codecs.

mod discharge;
mod notes;

pub use discharge::*;
pub use notes::*;
