//! The PALNS problem definition for the orienteering engine:
//! solution wrapper, destroy and repair operators, and the visitor that
//! polishes incumbents and steers destroy aggressiveness.

pub mod destroy;
pub mod repair;
pub mod solution;
pub mod visitor;
