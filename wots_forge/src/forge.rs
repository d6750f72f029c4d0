// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Forging a second signature from one honest WOTS signature.
//!
//! A signature element at chain position `s1[i]` can be hashed forward to any position
//! `s2[i] >= s1[i]`. The checksum normally makes it impossible for one full step vector
//! to dominate another, but the service keeps only `n1` checksum digits, so the checksum
//! wraps around and a message with a large digit sum can still have large checksum digits.
//!
//! The search fixes a required prefix and picks the checksum value it wants to end up
//! with. That determines the digit sum the message must have, which is then spread over
//! the free bytes of the message.
//!
//! Candidates are checked on the rayon pool, the only parallel code in the crate. It pays
//! off for long candidate lists such as a sweep over every checksum value; the result is
//! always the one a sequential scan would pick. Everything that touches the network stays
//! on the calling thread.

use log::{debug, info};
use rayon::prelude::*;

use crate::chain::chain;
use crate::codec::{digit_sum, encode_message, full_vector};
use crate::error::{Error, Result};
use crate::params::Params;
use crate::signature::Signature;

/// Checksum values tried by default. For the zero message under
/// [`NITWIT`](crate::params::NITWIT) the truncated checksum digits are `[12, 0]`,
/// and each of these values has a high digit of at least 12.
pub const DEFAULT_CHECKSUM_CANDIDATES: [u32; 10] =
    [205, 206, 207, 211, 212, 213, 214, 215, 216, 217];

/// A message whose full step vector dominates the signed one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Candidate {
    pub message: Vec<u8>,
    /// Full step vector (`s2`) of `message`.
    pub digits: Vec<u8>,
    /// The checksum value the message was built for.
    pub checksum_target: u32,
}

/// A forged message together with its signature.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Forgery {
    pub message: Vec<u8>,
    pub digits: Vec<u8>,
    pub checksum_target: u32,
    pub signature: Signature,
}

/// Whether every position of `s2` is at least the corresponding position of `s1`.
pub fn dominates(s2: &[u8], s1: &[u8]) -> bool {
    s2.len() == s1.len() && s2.iter().zip(s1.iter()).all(|(a, b)| a >= b)
}

/// Builds a message starting with `prefix` whose digits sum up to `target_sum`.
///
/// The bytes after the prefix are filled front to back, each taking as much of the
/// remaining sum as its digits can hold. Returns `None` if the prefix alone already
/// exceeds the target, or the free bytes cannot absorb all of it.
pub fn message_with_digit_sum(
    prefix: &[u8],
    target_sum: u32,
    params: &Params,
) -> Option<Vec<u8>> {
    let per_byte = params.digits_per_byte()?;
    if prefix.len() > params.msg_len {
        return None;
    }
    let bits = 8 / per_byte;
    let d = params.d();

    let mut msg = vec![0u8; params.msg_len];
    msg[..prefix.len()].copy_from_slice(prefix);

    let have = digit_sum(&encode_message(&msg, params));
    let mut need = target_sum.checked_sub(have)?;

    for byte in msg[prefix.len()..].iter_mut() {
        if need == 0 {
            break;
        }
        let add = need.min(per_byte as u32 * d);

        // Spread evenly, lower digits take the remainder.
        let share = add / per_byte as u32;
        let extra = add % per_byte as u32;
        let mut value = 0u32;
        for j in 0..per_byte as u32 {
            let digit = if j >= per_byte as u32 - extra {
                share + 1
            } else {
                share
            };
            value = (value << bits) | digit;
        }

        *byte = value as u8;
        need -= add;
    }

    if need != 0 {
        return None;
    }
    return Some(msg);
}

/// Finds a message starting with `prefix` whose step vector dominates `s1`.
///
/// Candidates are checksum values; the first one in list order that yields a dominating
/// message wins. Fails with [`Error::NoDominatingCandidate`] if none does, which may
/// happen for unlucky prefixes and is fixed by trying more candidates.
pub fn find_dominating(
    s1: &[u8],
    prefix: &[u8],
    candidates: &[u32],
    params: &Params,
) -> Result<Candidate> {
    if prefix.len() > params.msg_len {
        return Err(Error::PrefixTooLong {
            len: prefix.len(),
            msg_len: params.msg_len,
        });
    }
    if params.digits_per_byte().is_none() {
        return Err(Error::UnsupportedParams(format!(
            "base {} digits do not tile {}-byte messages",
            params.base, params.msg_len
        )));
    }
    if s1.len() != params.n() {
        return Err(Error::BadLength(params.n(), s1.len()));
    }

    let total = params.checksum_total();
    candidates
        .par_iter()
        .find_map_first(|&target_c| {
            let target_sum = total.checked_sub(target_c)?;
            let message = match message_with_digit_sum(prefix, target_sum, params) {
                Some(m) => m,
                None => {
                    debug!("checksum target {}: digit sum {} unreachable", target_c, target_sum);
                    return None;
                }
            };
            let digits = full_vector(&message, params);
            if !dominates(&digits, s1) {
                debug!("checksum target {}: not dominating", target_c);
                return None;
            }
            Some(Candidate {
                message,
                digits,
                checksum_target: target_c,
            })
        })
        .ok_or(Error::NoDominatingCandidate {
            tried: candidates.len(),
        })
}

/// Pushes every element of `sig1` forward from position `s1[i]` to `s2[i]`.
/// Positions where `s2` is smaller cannot be reached and are reported as an error.
pub fn forge_signature(sig1: &Signature, s1: &[u8], s2: &[u8]) -> Result<Signature> {
    if sig1.len() != s1.len() {
        return Err(Error::BadLength(s1.len(), sig1.len()));
    }
    if s2.len() != s1.len() {
        return Err(Error::BadLength(s1.len(), s2.len()));
    }

    let mut forged = Vec::with_capacity(sig1.len());
    for (index, (element, (&from, &to))) in sig1
        .elements
        .iter()
        .zip(s1.iter().zip(s2.iter()))
        .enumerate()
    {
        let steps = to
            .checked_sub(from)
            .ok_or(Error::NotDominated { index, from, to })?;
        forged.push(chain(element, steps as usize));
    }

    return Ok(Signature::new(forged));
}

/// Forges a signature on a message starting with `prefix`, given the signature `sig1`
/// on `msg1`.
pub fn forge(
    msg1: &[u8],
    sig1: &Signature,
    prefix: &[u8],
    candidates: &[u32],
    params: &Params,
) -> Result<Forgery> {
    if msg1.len() != params.msg_len {
        return Err(Error::BadLength(params.msg_len, msg1.len()));
    }
    let s1 = full_vector(msg1, params);
    let candidate = find_dominating(&s1, prefix, candidates, params)?;
    info!(
        "checksum target {} gives message {}",
        candidate.checksum_target,
        hex::encode(&candidate.message)
    );

    let signature = forge_signature(sig1, &s1, &candidate.digits)?;

    return Ok(Forgery {
        message: candidate.message,
        digits: candidate.digits,
        checksum_target: candidate.checksum_target,
        signature,
    });
}
