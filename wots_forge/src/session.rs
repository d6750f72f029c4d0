// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! The attack conversation with a signing service.
//!
//! The service signs any message except privileged ones and then asks for a message and
//! a signature to check. The session requests a signature on a harmless message, forges
//! one for a message with the privileged prefix, submits it and collects the reply.

use std::fmt;
use std::time::{Duration, Instant};

use log::info;

use crate::error::{Error, Result};
use crate::forge::{forge, Forgery, DEFAULT_CHECKSUM_CANDIDATES};
use crate::literal::{read_literal, LiteralReader};
use crate::params::{Params, NITWIT};
use crate::signature::{message_line, Signature, SignatureEncoding};
use crate::transport::{Inbox, Transport};

/// Everything the session needs to know about the service and the attack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub params: Params,
    /// Input prompt printed before each message.
    pub prompt: Vec<u8>,
    /// Text preceding the signature list.
    pub signature_marker: Vec<u8>,
    /// Message the service is willing to sign.
    pub safe_message: Vec<u8>,
    /// Required start of the forged message.
    pub prefix: Vec<u8>,
    pub candidates: Vec<u32>,
    pub encoding: SignatureEncoding,
    pub prompt_timeout: Duration,
    pub literal_timeout: Duration,
    pub drain_grace: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            params: NITWIT,
            prompt: b">>> ".to_vec(),
            signature_marker: b"Your signature is:".to_vec(),
            safe_message: vec![0u8; NITWIT.msg_len],
            prefix: b"admin".to_vec(),
            candidates: DEFAULT_CHECKSUM_CANDIDATES.to_vec(),
            encoding: SignatureEncoding::default(),
            prompt_timeout: Duration::from_secs(180),
            literal_timeout: Duration::from_secs(300),
            drain_grace: Duration::from_secs(5),
        }
    }
}

/// Where the conversation stands; each variant carries what later stages need.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Connected,
    AwaitPrompt,
    SentMessage1,
    GotSignature1(Signature),
    AwaitPrompt2(Signature),
    ComputedForgery(Forgery),
    SentMessage2(Forgery),
    SentForgedSig(Forgery),
    Done(Outcome),
}

impl Stage {
    pub fn name(&self) -> &'static str {
        match self {
            Stage::Connected => "connected",
            Stage::AwaitPrompt => "await-prompt",
            Stage::SentMessage1 => "sent-message-1",
            Stage::GotSignature1(_) => "got-signature-1",
            Stage::AwaitPrompt2(_) => "await-prompt-2",
            Stage::ComputedForgery(_) => "computed-forgery",
            Stage::SentMessage2(_) => "sent-message-2",
            Stage::SentForgedSig(_) => "sent-forged-signature",
            Stage::Done(_) => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Result of a completed session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub forgery: Forgery,
    /// Whatever the service sent after the forged signature.
    pub payoff: Vec<u8>,
}

pub struct Session<T> {
    inbox: Inbox<T>,
    config: SessionConfig,
    /// Signature list read so far, kept across a timed out read.
    literal: Option<LiteralReader>,
}

impl<T: Transport> Session<T> {
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            inbox: Inbox::new(transport),
            config,
            literal: None,
        }
    }

    /// Runs the conversation to the end. The first error aborts the session, there are
    /// no retries. The transport is dropped, and thereby closed, on return.
    pub fn run(mut self) -> Result<Outcome> {
        let mut stage = Stage::Connected;
        loop {
            stage = self.step(&stage)?;
            info!("stage: {}", stage);
            if let Stage::Done(outcome) = stage {
                return Ok(outcome);
            }
        }
    }

    /// Performs the work of `stage` and returns the stage that follows.
    ///
    /// On error the caller still holds `stage`. After [`Error::TransportTimeout`] the
    /// same stage can be stepped again: waits leave unmatched input buffered and a partly
    /// read signature list is resumed.
    pub fn step(&mut self, stage: &Stage) -> Result<Stage> {
        let cfg = &self.config;
        let next = match stage {
            Stage::Connected => Stage::AwaitPrompt,
            Stage::AwaitPrompt => {
                self.inbox
                    .wait_for(&cfg.prompt, deadline(cfg.prompt_timeout))?;
                info!("requesting signature on {}", hex::encode(&cfg.safe_message));
                self.inbox.send(&message_line(&cfg.safe_message))?;
                Stage::SentMessage1
            }
            Stage::SentMessage1 => {
                let until = deadline(cfg.literal_timeout);
                let mut reader = match self.literal.take() {
                    Some(reader) => reader,
                    None => {
                        self.inbox.wait_for(&cfg.signature_marker, until)?;
                        LiteralReader::brackets()
                    }
                };
                let literal = match read_literal(&mut self.inbox, &mut reader, until) {
                    Ok(literal) => literal,
                    Err(Error::TransportTimeout) => {
                        self.literal = Some(reader);
                        return Err(Error::TransportTimeout);
                    }
                    Err(e) => return Err(e),
                };
                info!("signature literal: {} bytes", literal.raw.len());
                let sig = Signature::from_literal(&literal.raw, &cfg.params)?;
                Stage::GotSignature1(sig)
            }
            Stage::GotSignature1(sig) => Stage::AwaitPrompt2(sig.clone()),
            Stage::AwaitPrompt2(sig) => {
                self.inbox
                    .wait_for(&cfg.prompt, deadline(cfg.prompt_timeout))?;
                let forgery = forge(
                    &cfg.safe_message,
                    sig,
                    &cfg.prefix,
                    &cfg.candidates,
                    &cfg.params,
                )?;
                Stage::ComputedForgery(forgery)
            }
            Stage::ComputedForgery(forgery) => {
                self.inbox.send(&message_line(&forgery.message))?;
                Stage::SentMessage2(forgery.clone())
            }
            Stage::SentMessage2(forgery) => {
                self.inbox
                    .wait_for(&cfg.prompt, deadline(cfg.prompt_timeout))?;
                let mut line = forgery.signature.to_literal(cfg.encoding).into_bytes();
                line.push(b'\n');
                self.inbox.send(&line)?;
                Stage::SentForgedSig(forgery.clone())
            }
            Stage::SentForgedSig(forgery) => {
                let payoff = self.inbox.drain(cfg.drain_grace)?;
                Stage::Done(Outcome {
                    forgery: forgery.clone(),
                    payoff,
                })
            }
            Stage::Done(outcome) => Stage::Done(outcome.clone()),
        };
        Ok(next)
    }

    pub fn into_transport(self) -> T {
        self.inbox.into_inner()
    }
}

fn deadline(timeout: Duration) -> Instant {
    Instant::now() + timeout
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;
    use std::io;

    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::transport::mock::ScriptedTransport;
    use crate::transport::Recv;
    use crate::wots::{verify, Keypair};

    const FLAG: &[u8] = b"bctf{fake_flag_for_tests}\n";

    /// In-process stand-in for the signing service. Replies are queued in small chunks
    /// so every wait crosses chunk boundaries.
    struct FakeService {
        keypair: Keypair,
        encoding: SignatureEncoding,
        outbox: VecDeque<Recv>,
        line: Vec<u8>,
        lines_seen: usize,
        forged_msg: Vec<u8>,
        accepted: bool,
    }

    impl FakeService {
        fn new(seed: u64, encoding: SignatureEncoding) -> Self {
            let mut service = Self {
                keypair: Keypair::from_rng(NITWIT, &mut ChaCha20Rng::seed_from_u64(seed)),
                encoding,
                outbox: VecDeque::new(),
                line: Vec::new(),
                lines_seen: 0,
                forged_msg: Vec::new(),
                accepted: false,
            };
            service.queue(b"Welcome to the signing service!\nmessage to sign\n>>> ");
            service
        }

        fn queue(&mut self, data: &[u8]) {
            for c in data.chunks(7) {
                self.outbox.push_back(Recv::Data(c.to_vec()));
            }
        }

        fn handle_line(&mut self, line: Vec<u8>) {
            self.lines_seen += 1;
            match self.lines_seen {
                1 => {
                    let msg = hex::decode(&line).unwrap();
                    if msg.starts_with(b"admin") {
                        self.queue(b"no admin for you\n");
                        return;
                    }
                    let sig = self.keypair.sign(&msg).unwrap();
                    let mut reply = b"Your signature is:\n".to_vec();
                    reply.extend_from_slice(sig.to_literal(self.encoding).as_bytes());
                    reply.extend_from_slice(b"\nNow give me a message\n>>> ");
                    self.queue(&reply);
                }
                2 => {
                    self.forged_msg = hex::decode(&line).unwrap();
                    self.queue(b"and its signature\n>>> ");
                }
                _ => {
                    let sig = Signature::from_literal(&line, &NITWIT).unwrap();
                    self.accepted = self.forged_msg.starts_with(b"admin")
                        && verify(self.keypair.public_key(), &self.forged_msg, &sig, &NITWIT);
                    if self.accepted {
                        self.queue(b"Welcome, admin: ");
                        self.queue(FLAG);
                    } else {
                        self.queue(b"invalid\n");
                    }
                }
            }
        }
    }

    impl Transport for FakeService {
        fn recv(&mut self, _timeout: Duration) -> io::Result<Recv> {
            Ok(self.outbox.pop_front().unwrap_or(Recv::Closed))
        }

        fn send(&mut self, data: &[u8]) -> io::Result<()> {
            for &b in data {
                if b == b'\n' {
                    let line = std::mem::take(&mut self.line);
                    self.handle_line(line);
                } else {
                    self.line.push(b);
                }
            }
            Ok(())
        }
    }

    fn fast_config() -> SessionConfig {
        SessionConfig {
            drain_grace: Duration::from_millis(200),
            ..SessionConfig::default()
        }
    }

    #[test]
    fn end_to_end_forgery() {
        for &encoding in &[
            SignatureEncoding::Bytes,
            SignatureEncoding::Hex,
            SignatureEncoding::Ints,
        ] {
            let service = FakeService::new(11, encoding);
            let config = SessionConfig {
                encoding,
                ..fast_config()
            };
            let session = Session::new(service, config);
            let outcome = session.run().unwrap();

            assert!(outcome.forgery.message.starts_with(b"admin"));
            assert!(outcome.payoff.ends_with(FLAG));
        }
    }

    #[test]
    fn stages_follow_protocol_order() {
        let mut session = Session::new(FakeService::new(12, SignatureEncoding::Bytes), fast_config());
        let mut stage = Stage::Connected;
        let mut names = vec![stage.name()];
        while !matches!(stage, Stage::Done(_)) {
            stage = session.step(&stage).unwrap();
            names.push(stage.name());
        }
        assert_eq!(
            names,
            vec![
                "connected",
                "await-prompt",
                "sent-message-1",
                "got-signature-1",
                "await-prompt-2",
                "computed-forgery",
                "sent-message-2",
                "sent-forged-signature",
                "done",
            ]
        );
        let service = session.into_transport();
        assert!(service.accepted);
    }

    #[test]
    fn closed_before_prompt() {
        let session = Session::new(ScriptedTransport::default(), fast_config());
        assert!(matches!(session.run(), Err(Error::TransportClosed)));
    }

    #[test]
    fn timeout_waiting_for_prompt() {
        let t = ScriptedTransport::new(vec![Recv::Data(b"banner\n".to_vec()), Recv::Timeout]);
        let session = Session::new(t, fast_config());
        assert!(matches!(session.run(), Err(Error::TransportTimeout)));
    }

    #[test]
    fn truncated_signature_list() {
        let t = ScriptedTransport::chunked(b">>> Your signature is:\n[b'\\x00', b'\\x01'", 5);
        let session = Session::new(t, fast_config());
        assert!(matches!(session.run(), Err(Error::MalformedLiteral(_))));
    }

    #[test]
    fn short_signature_list() {
        let t = ScriptedTransport::chunked(b">>> Your signature is: ['00', '11']\n>>> ", 5);
        let mut session = Session::new(t, fast_config());
        let err = session
            .step(&Stage::AwaitPrompt)
            .and_then(|s| session.step(&s))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::SignatureShapeMismatch {
                what: "elements",
                ..
            }
        ));
        // Only the harmless message was sent.
        let sent = session.into_transport().sent;
        assert_eq!(sent, message_line(&[0u8; 32]));
    }

    #[test]
    fn signature_read_resumes_after_timeout() {
        let keypair = Keypair::from_rng(NITWIT, &mut ChaCha20Rng::seed_from_u64(14));
        let sig = keypair.sign(&[0u8; 32]).unwrap();
        let text = sig.to_literal(SignatureEncoding::Bytes).into_bytes();
        let (head, tail) = text.split_at(text.len() / 2);

        let mut first = b"Your signature is:\n".to_vec();
        first.extend_from_slice(head);
        let mut rest = tail.to_vec();
        rest.extend_from_slice(b"\n>>> ");
        let t = ScriptedTransport::new(vec![
            Recv::Data(b">>> ".to_vec()),
            Recv::Data(first),
            Recv::Timeout,
            Recv::Data(rest),
        ]);

        let mut session = Session::new(t, fast_config());
        let stage = session.step(&Stage::AwaitPrompt).unwrap();
        assert_eq!(stage, Stage::SentMessage1);
        assert!(matches!(
            session.step(&stage),
            Err(Error::TransportTimeout)
        ));
        assert_eq!(session.step(&stage).unwrap(), Stage::GotSignature1(sig));
        assert_eq!(session.into_transport().sent, message_line(&[0u8; 32]));
    }

    #[test]
    fn search_failure_ends_session() {
        let service = FakeService::new(13, SignatureEncoding::Bytes);
        let config = SessionConfig {
            candidates: vec![0, 1, 2],
            ..fast_config()
        };
        let mut session = Session::new(service, config);
        let mut stage = Stage::Connected;
        let err = loop {
            match session.step(&stage) {
                Ok(next) => stage = next,
                Err(e) => break e,
            }
        };
        assert!(matches!(err, Error::NoDominatingCandidate { tried: 3 }));
        // The forged message was never sent.
        assert_eq!(session.into_transport().lines_seen, 1);
    }
}
