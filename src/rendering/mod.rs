//! Prompt rendering.
//!
//! Turns profile state and retrieved memories into the text handed to the
//! completion service. Everything here is pure and deterministic.

mod persona;

pub use persona::{DEFAULT_INTERLOCUTOR, Interlocutor, build_system_prompt, render_context};
