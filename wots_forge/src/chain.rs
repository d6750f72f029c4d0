// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! SHA-256 hash chains.

use sha2::{Digest as _, Sha256};

use crate::params::HS;

/// A single chain element.
pub type Digest = [u8; HS];

/// One application of the one-way function.
pub fn hash(input: &[u8]) -> Digest {
    let mut output = [0u8; HS];
    output.copy_from_slice(&Sha256::digest(input));
    return output;
}

/// Applies `steps` cycles of SHA-256 to `seed`.
/// Anyone holding the element at position `i` can compute every position `j >= i`.
pub fn chain(seed: &Digest, steps: usize) -> Digest {
    let mut output = *seed;

    for _ in 0..steps {
        output = hash(&output);
    }

    return output;
}
