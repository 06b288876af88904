//! GRBL command support

pub mod command_creator;

pub use command_creator::JogCommand;
