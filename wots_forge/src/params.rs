// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Parameter sets for the base-`W` Winternitz variant with a short checksum.

use num_bigint::BigUint;
use num_traits::One;

use crate::error::{Error, Result};

/// Hash output size in bytes (SHA-256).
pub const HS: usize = 256 / 8;

/// Shape of a WOTS instance: message length, digit base and digit counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Params {
    /// Message length in bytes.
    pub msg_len: usize,
    /// Digit base, `d + 1`.
    pub base: u32,
    /// Number of message digits.
    pub n0: usize,
    /// Number of checksum digits.
    pub n1: usize,
}

/// The parameters used by the attacked service: 256-bit messages in base 16.
/// `n1 = 2` although `15 * 64 = 960` needs three base-16 digits.
pub const NITWIT: Params = Params {
    msg_len: 32,
    base: 16,
    n0: 64,
    n1: 2,
};

impl Params {
    /// Derives the digit counts for `msg_len`-byte messages in the given base.
    ///
    /// `n1` is computed as `floor(log_base(n0)) + 1`, the formula the service uses.
    /// It counts the digits of `n0` rather than of the largest checksum `(base - 1) * n0`,
    /// so the checksum vector comes out too short.
    pub fn new(msg_len: usize, base: u32) -> Result<Self> {
        if !(2..=256).contains(&base) {
            return Err(Error::UnsupportedParams(format!(
                "base {} outside 2..=256",
                base
            )));
        }
        if msg_len == 0 {
            return Err(Error::UnsupportedParams("empty messages".into()));
        }

        let max = (BigUint::one() << (8 * msg_len)) - 1u32;
        let n0 = max.to_radix_be(base).len();
        let n1 = ilog(n0, base as usize) + 1;

        return Ok(Self {
            msg_len,
            base,
            n0,
            n1,
        });
    }

    /// Largest digit value, `base - 1`.
    pub const fn d(&self) -> u32 {
        self.base - 1
    }

    /// Total number of hash chains, i.e. digests per signature.
    pub const fn n(&self) -> usize {
        self.n0 + self.n1
    }

    /// `(base - 1) * n0`, the value the checksum is taken against.
    pub const fn checksum_total(&self) -> u32 {
        self.d() * self.n0 as u32
    }

    /// Number of digits a single message byte splits into.
    /// Only defined when the base is a power of two whose digits tile each byte exactly
    /// and the message digits cover the message without padding.
    pub fn digits_per_byte(&self) -> Option<usize> {
        if !self.base.is_power_of_two() {
            return None;
        }
        let bits = self.base.trailing_zeros() as usize;
        if 8 % bits != 0 || self.n0 != self.msg_len * (8 / bits) {
            return None;
        }
        Some(8 / bits)
    }
}

/// `floor(log_base(n))` for `n >= 1`, in exact integer arithmetic.
fn ilog(n: usize, base: usize) -> usize {
    let mut k = 0;
    let mut power = base;
    while power <= n {
        k += 1;
        power = match power.checked_mul(base) {
            Some(p) => p,
            None => break,
        };
    }
    k
}
