// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Signature forgery against a Winternitz OTS service with a truncated checksum.

mod error;

pub mod chain;
pub mod codec;
pub mod forge;
pub mod literal;
pub mod params;
pub mod session;
pub mod signature;
pub mod transport;
pub mod wots;

pub use crate::error::{Error, Result};
pub use crate::forge::{Forgery, DEFAULT_CHECKSUM_CANDIDATES};
pub use crate::params::{Params, HS, NITWIT};
pub use crate::session::{Outcome, Session, SessionConfig};
pub use crate::signature::{Signature, SignatureEncoding};
