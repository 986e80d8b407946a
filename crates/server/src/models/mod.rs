mod message;
mod profile;
mod room;

pub use message::*;
pub use profile::*;
pub use room::*;
