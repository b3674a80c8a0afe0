#[macro_use]
extern crate serde;

mod anoncred;
pub mod base32c;
mod channel;
mod client;
mod ctx;
mod election;
mod eligibility;
mod error;
mod hash;
mod invitation;
mod messages;
pub mod methods;
mod params;
mod pubkey;
mod secrets;
mod vdf;
mod wire;

pub use anoncred::*;
pub use channel::*;
pub use client::*;
pub use ctx::*;
pub use election::*;
pub use eligibility::*;
pub use error::*;
pub use hash::*;
pub use invitation::*;
pub use messages::*;
pub use methods::{Tally, VotingMethod};
pub use params::*;
pub use pubkey::*;
pub use secrets::*;
pub use vdf::*;
pub use wire::*;
