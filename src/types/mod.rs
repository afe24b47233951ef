pub mod clef;
pub mod duration;
pub mod element;
pub mod field;
pub mod header;
pub mod instruction;
pub mod key;
pub mod meter;
pub mod pitch;
pub mod tempo;
pub mod text;
pub mod unit;
pub mod voice;
