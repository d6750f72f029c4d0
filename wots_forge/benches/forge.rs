// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

use criterion::*;
use rand::{thread_rng, RngCore};

use wots_forge::chain::chain;
use wots_forge::codec::full_vector;
use wots_forge::forge::{find_dominating, forge, DEFAULT_CHECKSUM_CANDIDATES};
use wots_forge::wots::Keypair;
use wots_forge::{Signature, SignatureEncoding, NITWIT};

fn wots_full_vector(c: &mut Criterion) {
    let mut rng = thread_rng();
    c.bench_function("WOTS Convert Msg to Steps", |b| {
        b.iter_batched(
            || {
                let mut m = [0u8; 32];
                rng.fill_bytes(&mut m);
                m
            },
            |m| full_vector(&m, &NITWIT),
            BatchSize::SmallInput,
        )
    });
}

fn wots_chain(c: &mut Criterion) {
    let seed = [7u8; 32];
    c.bench_function("SHA-256 Chain (15 steps)", |b| b.iter(|| chain(&seed, 15)));
}

fn wots_search(c: &mut Criterion) {
    let s1 = full_vector(&[0u8; 32], &NITWIT);
    c.bench_function("Dominating Message Search", |b| {
        b.iter(|| find_dominating(&s1, b"admin", &DEFAULT_CHECKSUM_CANDIDATES, &NITWIT))
    });
}

fn wots_forge_signature(c: &mut Criterion) {
    let w = Keypair::new(NITWIT);
    let msg1 = [0u8; 32];
    let sig1 = w.sign(&msg1).unwrap();
    c.bench_function("WOTS Forge", |b| {
        b.iter(|| forge(&msg1, &sig1, b"admin", &DEFAULT_CHECKSUM_CANDIDATES, &NITWIT))
    });
}

fn wots_parse(c: &mut Criterion) {
    let w = Keypair::new(NITWIT);
    let text = w
        .sign(&[0u8; 32])
        .unwrap()
        .to_literal(SignatureEncoding::Bytes);
    println!("Signature Literal Size: {} Bytes", text.len());
    c.bench_function("Parse Signature Literal", |b| {
        b.iter(|| Signature::from_literal(text.as_bytes(), &NITWIT))
    });
}

criterion_group!(
    benches,
    wots_full_vector,
    wots_chain,
    wots_search,
    wots_forge_signature,
    wots_parse
);
criterion_main!(benches);
