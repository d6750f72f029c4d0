// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

use log::info;

use wots_forge::codec::full_vector;
use wots_forge::forge::{forge, DEFAULT_CHECKSUM_CANDIDATES};
use wots_forge::wots::{verify, Keypair};
use wots_forge::NITWIT;

fn main() -> wots_forge::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // The service signs a harmless message for us.
    let wots = Keypair::new(NITWIT);
    let msg1 = [0u8; 32];
    let sig1 = wots.sign(&msg1)?;
    info!("signed step vector: {:?}", full_vector(&msg1, &NITWIT));

    // Forge a signature for an admin message using only the public key, msg1 and its signature.
    let forged = forge(
        &msg1,
        &sig1,
        b"admin",
        &DEFAULT_CHECKSUM_CANDIDATES,
        &NITWIT,
    )?;
    info!("forged step vector: {:?}", forged.digits);

    if verify(wots.public_key(), &forged.message, &forged.signature, &NITWIT) {
        println!("Signature verification successful!");
    } else {
        println!("Signature verification failed!");
    }
    println!("message: {}", hex::encode(&forged.message));

    Ok(())
}
