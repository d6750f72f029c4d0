// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Message to digit-vector encoding, including the service's truncated checksum.
//!
//! Both truncations below are deliberate: the attacked service drops high-order digits
//! when a value does not fit, and its checksum vector is too short to hold the largest
//! checksum. Forgeries only verify if these are reproduced exactly.

use num_bigint::BigUint;
use num_traits::Zero;

use crate::params::Params;

/// Convert `value` into `len` digits of base `base`, most significant first.
/// Pads with zeros on the left and silently drops digits above `base^len`.
pub fn encode(value: &BigUint, len: usize, base: u32) -> Vec<u8> {
    let mut digits = vec![0u8; len];
    if value.is_zero() {
        return digits;
    }

    let full = value.to_radix_be(base);
    let keep = full.len().min(len);
    digits[len - keep..].copy_from_slice(&full[full.len() - keep..]);

    return digits;
}

/// Recompose big-endian digits into their integer value.
pub fn decode(digits: &[u8], base: u32) -> BigUint {
    return digits
        .iter()
        .fold(BigUint::zero(), |acc, &digit| acc * base + digit);
}

/// Base-`base` representation of a message, `n0` digits long.
pub fn encode_message(msg: &[u8], params: &Params) -> Vec<u8> {
    return encode(&BigUint::from_bytes_be(msg), params.n0, params.base);
}

pub fn digit_sum(digits: &[u8]) -> u32 {
    return digits.iter().map(|&x| x as u32).sum();
}

/// Checksum digits for a message digit vector: `(base - 1) * n0 - sum`, written with
/// only `n1` digits. When `n1` is too small for that value the upper digits are lost;
/// under [`NITWIT`](crate::params::NITWIT) only the value modulo 256 survives.
pub fn checksum(digits: &[u8], params: &Params) -> Vec<u8> {
    let csum = params.checksum_total().saturating_sub(digit_sum(digits));
    return encode(&BigUint::from(csum), params.n1, params.base);
}

/// Number of chain steps the signer applies per chain: message digits followed by
/// checksum digits, `n` entries in total.
pub fn full_vector(msg: &[u8], params: &Params) -> Vec<u8> {
    let mut steps = encode_message(msg, params);
    let csum = checksum(&steps, params);
    steps.extend_from_slice(&csum);
    return steps;
}
