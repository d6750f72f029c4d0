// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Command line front end: run the whole attack against a service, or forge offline from
//! a signature obtained some other way.

use std::io::{self, Read};
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{ensure, Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use log::info;

use wots_forge::forge::forge;
use wots_forge::literal::{LiteralReader, Step};
use wots_forge::transport::TcpTransport;
use wots_forge::{
    Session, SessionConfig, Signature, SignatureEncoding, DEFAULT_CHECKSUM_CANDIDATES, NITWIT,
};

#[derive(Parser)]
#[command(name = "wots-forge")]
#[command(about = "Forge WOTS signatures against a service with a truncated checksum", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Connect to the service and run the full exchange
    Attack {
        /// Service host
        #[arg(long, default_value = "localhost")]
        host: String,

        /// Service port
        #[arg(short, long, default_value_t = 1337)]
        port: u16,

        /// Seconds to wait for a prompt
        #[arg(long, default_value_t = 180)]
        prompt_timeout: u64,

        /// Seconds to wait for the signature list
        #[arg(long, default_value_t = 300)]
        literal_timeout: u64,

        /// Seconds to collect the final reply
        #[arg(long, default_value_t = 5)]
        drain: u64,

        /// Seconds to wait for the connection
        #[arg(long, default_value_t = 60)]
        connect_timeout: u64,

        #[command(flatten)]
        forge: ForgeArgs,
    },

    /// Forge from a signature literal read from a file or stdin
    Forge {
        /// Signed message (hex), defaults to all zeros
        #[arg(short, long)]
        message: Option<String>,

        /// File holding the signature list, stdin if omitted
        #[arg(short, long)]
        signature: Option<PathBuf>,

        #[command(flatten)]
        forge: ForgeArgs,
    },
}

#[derive(Args)]
struct ForgeArgs {
    /// Required prefix of the forged message
    #[arg(long, default_value = "admin")]
    prefix: String,

    /// Checksum values to try, in order (comma separated)
    #[arg(long, value_delimiter = ',')]
    candidates: Vec<u32>,

    /// Encoding of the submitted signature list
    #[arg(long, value_enum, default_value_t = Encoding::Bytes)]
    encoding: Encoding,
}

#[derive(Clone, Copy, ValueEnum)]
enum Encoding {
    Hex,
    Bytes,
    Ints,
}

impl From<Encoding> for SignatureEncoding {
    fn from(e: Encoding) -> Self {
        match e {
            Encoding::Hex => SignatureEncoding::Hex,
            Encoding::Bytes => SignatureEncoding::Bytes,
            Encoding::Ints => SignatureEncoding::Ints,
        }
    }
}

impl ForgeArgs {
    fn candidates(&self) -> Vec<u32> {
        if self.candidates.is_empty() {
            DEFAULT_CHECKSUM_CANDIDATES.to_vec()
        } else {
            self.candidates.clone()
        }
    }
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Attack {
            host,
            port,
            prompt_timeout,
            literal_timeout,
            drain,
            connect_timeout,
            forge,
        } => cmd_attack(
            &host,
            port,
            SessionConfig {
                prefix: forge.prefix.clone().into_bytes(),
                candidates: forge.candidates(),
                encoding: forge.encoding.into(),
                prompt_timeout: Duration::from_secs(prompt_timeout),
                literal_timeout: Duration::from_secs(literal_timeout),
                drain_grace: Duration::from_secs(drain),
                ..SessionConfig::default()
            },
            Duration::from_secs(connect_timeout),
        ),
        Commands::Forge {
            message,
            signature,
            forge,
        } => cmd_forge(message, signature, &forge),
    }
}

fn cmd_attack(
    host: &str,
    port: u16,
    config: SessionConfig,
    connect_timeout: Duration,
) -> Result<()> {
    info!("connecting to {}:{}", host, port);
    let transport = TcpTransport::connect((host, port), connect_timeout)
        .with_context(|| format!("failed to connect to {}:{}", host, port))?;

    let outcome = Session::new(transport, config).run().context("attack failed")?;

    info!("forged message: {}", hex::encode(&outcome.forgery.message));
    println!("{}", String::from_utf8_lossy(&outcome.payoff));
    Ok(())
}

fn cmd_forge(
    message: Option<String>,
    signature: Option<PathBuf>,
    args: &ForgeArgs,
) -> Result<()> {
    let msg1 = match message {
        Some(m) => hex::decode(m.trim()).context("message is not hex")?,
        None => vec![0u8; NITWIT.msg_len],
    };
    ensure!(
        msg1.len() == NITWIT.msg_len,
        "message must be {} bytes, got {}",
        NITWIT.msg_len,
        msg1.len()
    );

    let text = match signature {
        Some(path) => {
            std::fs::read(&path).with_context(|| format!("reading {}", path.display()))?
        }
        None => {
            let mut buf = Vec::new();
            io::stdin().read_to_end(&mut buf)?;
            buf
        }
    };
    let mut reader = LiteralReader::brackets();
    for &b in &text {
        if reader.push(b)? == Step::Complete {
            break;
        }
    }
    let raw = reader
        .into_literal()
        .context("no complete signature list found")?;
    let sig1 = Signature::from_literal(&raw, &NITWIT)?;

    let forgery = forge(
        &msg1,
        &sig1,
        args.prefix.as_bytes(),
        &args.candidates(),
        &NITWIT,
    )?;

    println!("{}", hex::encode(&forgery.message));
    println!("{}", forgery.signature.to_literal(args.encoding.into()));
    Ok(())
}
