//! Gateway frames are shared with the client crate so both ends agree on the
//! wire shape.

pub use roomchat_shared::wire::{ClientEvent, ServerEvent};
