#[macro_use]
extern crate serde;

#[macro_use]
extern crate lazy_static;

#[macro_use]
mod hash;

mod auxiliary;
mod ballot;
mod chaum_pedersen;
mod config;
mod context;
mod decryption;
mod dlog;
mod elgamal;
mod error;
mod group;
mod guardian;
mod key_ceremony;
mod key_ceremony_mediator;
mod nonces;
mod polynomial;
mod scheduler;
mod schnorr;
mod serde_hex;
mod tally;
mod tracker;

pub use auxiliary::*;
pub use ballot::*;
pub use chaum_pedersen::*;
pub use config::*;
pub use context::*;
pub use decryption::*;
pub use dlog::*;
pub use elgamal::*;
pub use error::*;
pub use group::*;
pub use guardian::*;
pub use hash::*;
pub use key_ceremony::*;
pub use key_ceremony_mediator::*;
pub use nonces::*;
pub use polynomial::*;
pub use scheduler::*;
pub use schnorr::*;
pub use serde_hex::*;
pub use tally::*;
pub use tracker::*;

#[cfg(test)]
mod tests;
