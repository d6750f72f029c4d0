// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Transport closed by peer")]
    TransportClosed,
    #[error("Transport timed out waiting for data")]
    TransportTimeout,
    #[error("Malformed literal: {0}")]
    MalformedLiteral(String),
    #[error("Signature shape mismatch: expected {expected} {what}, found {found}")]
    SignatureShapeMismatch {
        what: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("No dominating candidate among {tried} checksum targets")]
    NoDominatingCandidate { tried: usize },
    #[error("Chain {index} would have to run backwards ({from} -> {to})")]
    NotDominated { index: usize, from: u8, to: u8 },
    #[error("Prefix of {len} bytes does not fit a {msg_len}-byte message")]
    PrefixTooLong { len: usize, msg_len: usize },
    #[error("Unsupported parameters: {0}")]
    UnsupportedParams(String),
    #[error("Invalid length: expected {0} bytes, found {1} bytes")]
    BadLength(usize, usize),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
