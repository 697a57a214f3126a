pub mod import;
pub mod practice;
pub mod preview;
pub mod roster;
