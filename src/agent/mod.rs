//! AI agents: the Gemini client and the specialist workers built on it.

pub mod gemini;
pub mod specialist;

pub use specialist::{specialist_specs, team_factory, Specialty};
