// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Winternitz One-Time Signature (WOTS) Scheme, as run by the attacked service.
//!
//! Messages are signed directly (no hashing) and the checksum is computed with the
//! truncated digit count from [`Params`]. Each chain has length `d = base - 1`:
//! the public key holds `chain(sk[i], d)` and a signature reveals `chain(sk[i], s[i])`.
//! Two messages whose step vectors dominate each other therefore share enough
//! information to forge, which is what [`forge`](crate::forge) exploits.

use rand::{rngs::OsRng, RngCore};
use subtle::ConstantTimeEq;

use crate::chain::{chain, Digest};
use crate::codec::full_vector;
use crate::error::{Error, Result};
use crate::params::{Params, HS};
use crate::signature::{PublicKey, Signature};

/// WOTS Keypair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Keypair {
    pub params: Params,
    pub pk: PublicKey,
    sk: Vec<Digest>,
}

impl Keypair {
    /// Generates a new WOTS Keypair.
    pub fn new(params: Params) -> Self {
        return Self::from_rng(params, &mut OsRng);
    }

    /// Draws the `n` chain starts from `rng`.
    pub fn from_rng(params: Params, rng: &mut impl RngCore) -> Self {
        let sk: Vec<Digest> = (0..params.n())
            .map(|_| {
                let mut secret = [0u8; HS];
                rng.fill_bytes(&mut secret);
                secret
            })
            .collect();
        let pk = sk.iter().map(|s| chain(s, params.d() as usize)).collect();

        return Self { params, pk, sk };
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.pk
    }

    /// Signs a message of exactly `msg_len` bytes.
    pub fn sign(&self, msg: &[u8]) -> Result<Signature> {
        if msg.len() != self.params.msg_len {
            return Err(Error::BadLength(self.params.msg_len, msg.len()));
        }
        let steps = full_vector(msg, &self.params);

        let elements = self
            .sk
            .iter()
            .zip(steps.iter())
            .map(|(secret, &s)| chain(secret, s as usize))
            .collect();

        return Ok(Signature::new(elements));
    }
}

/// Verifies `sig` on `msg` against the public key: every element, pushed to the end of
/// its chain, must equal the public chain end.
pub fn verify(pk: &[Digest], msg: &[u8], sig: &Signature, params: &Params) -> bool {
    if msg.len() != params.msg_len || pk.len() != params.n() || sig.len() != params.n() {
        return false;
    }
    let steps = full_vector(msg, params);

    let mut ok = 1u8;
    for ((element, public), &s) in sig.elements.iter().zip(pk.iter()).zip(steps.iter()) {
        let end = chain(element, (params.d() - s as u32) as usize);
        ok &= end[..].ct_eq(&public[..]).unwrap_u8();
    }

    return ok == 1;
}
