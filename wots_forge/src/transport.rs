// Copyright (C) 2021 Quentin Kniep <hello@quentinkniep.com>
// Distributed under terms of the MIT license.

//! Blocking byte transport and the receive buffer shared by all waits of a session.

use std::io::{self, Read, Write};
use std::net::{TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use log::debug;

use crate::error::{Error, Result};

/// Outcome of a single receive attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recv {
    Data(Vec<u8>),
    Timeout,
    Closed,
}

/// A duplex byte channel with chunked, time-limited receives.
pub trait Transport {
    /// Waits at most `timeout` for the next chunk.
    fn recv(&mut self, timeout: Duration) -> io::Result<Recv>;
    fn send(&mut self, data: &[u8]) -> io::Result<()>;
}

const CHUNK: usize = 4096;

/// Plain TCP transport.
pub struct TcpTransport {
    stream: TcpStream,
    buf: Box<[u8]>,
}

impl TcpTransport {
    /// Connects to the first reachable address within `timeout`.
    pub fn connect<A: ToSocketAddrs>(addr: A, timeout: Duration) -> Result<Self> {
        let mut last_err = None;
        for sa in addr.to_socket_addrs()? {
            match TcpStream::connect_timeout(&sa, timeout) {
                Ok(stream) => return Ok(Self::from_stream(stream)),
                Err(e) => last_err = Some(e),
            }
        }
        Err(last_err
            .unwrap_or_else(|| io::Error::new(io::ErrorKind::NotFound, "no address resolved"))
            .into())
    }

    pub fn from_stream(stream: TcpStream) -> Self {
        Self {
            stream,
            buf: vec![0u8; CHUNK].into_boxed_slice(),
        }
    }
}

impl Transport for TcpTransport {
    fn recv(&mut self, timeout: Duration) -> io::Result<Recv> {
        // A zero read timeout is rejected by the OS.
        let timeout = timeout.max(Duration::from_millis(1));
        self.stream.set_read_timeout(Some(timeout))?;
        loop {
            match self.stream.read(&mut self.buf) {
                Ok(0) => return Ok(Recv::Closed),
                Ok(n) => return Ok(Recv::Data(self.buf[..n].to_vec())),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e)
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut =>
                {
                    return Ok(Recv::Timeout)
                }
                Err(e) => return Err(e),
            }
        }
    }

    fn send(&mut self, data: &[u8]) -> io::Result<()> {
        self.stream.write_all(data)?;
        self.stream.flush()
    }
}

/// Owns a transport together with bytes that were received but not yet consumed.
/// Waits consume only what they need, the remainder stays for the next wait.
pub struct Inbox<T> {
    transport: T,
    pending: Vec<u8>,
    pos: usize,
}

impl<T: Transport> Inbox<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            pending: Vec::new(),
            pos: 0,
        }
    }

    /// Unconsumed bytes currently buffered.
    pub fn buffered(&self) -> &[u8] {
        &self.pending[self.pos..]
    }

    /// Receives one more chunk, waiting no longer than `deadline`.
    fn fill(&mut self, deadline: Instant) -> Result<()> {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining == Duration::ZERO {
            return Err(Error::TransportTimeout);
        }
        match self.transport.recv(remaining)? {
            Recv::Data(chunk) => {
                debug!("<< {}", String::from_utf8_lossy(&chunk));
                if self.pos > 0 {
                    self.pending.drain(..self.pos);
                    self.pos = 0;
                }
                self.pending.extend_from_slice(&chunk);
                Ok(())
            }
            Recv::Timeout => Err(Error::TransportTimeout),
            Recv::Closed => Err(Error::TransportClosed),
        }
    }

    /// Next unconsumed byte, suspending on the transport if the buffer is empty.
    pub fn next_byte(&mut self, deadline: Instant) -> Result<u8> {
        while self.pos >= self.pending.len() {
            self.fill(deadline)?;
        }
        let byte = self.pending[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    /// Consumes input up to and including the first occurrence of `marker`.
    /// Returns everything consumed.
    pub fn wait_for(&mut self, marker: &[u8], deadline: Instant) -> Result<Vec<u8>> {
        loop {
            if let Some(end) = find(self.buffered(), marker) {
                let out = self.pending[self.pos..self.pos + end].to_vec();
                self.pos += end;
                return Ok(out);
            }
            self.fill(deadline)?;
        }
    }

    /// Collects whatever arrives within `grace`, stopping early on close.
    pub fn drain(&mut self, grace: Duration) -> Result<Vec<u8>> {
        let deadline = Instant::now() + grace;
        loop {
            match self.fill(deadline) {
                Ok(()) => continue,
                Err(Error::TransportTimeout) | Err(Error::TransportClosed) => break,
                Err(e) => return Err(e),
            }
        }
        let out = self.buffered().to_vec();
        self.pos = self.pending.len();
        Ok(out)
    }

    pub fn send(&mut self, data: &[u8]) -> Result<()> {
        debug!(">> {}", String::from_utf8_lossy(data));
        self.transport.send(data)?;
        Ok(())
    }

    pub fn into_inner(self) -> T {
        self.transport
    }
}

/// End offset of the first occurrence of `marker` in `haystack`.
fn find(haystack: &[u8], marker: &[u8]) -> Option<usize> {
    if marker.is_empty() {
        return Some(0);
    }
    haystack
        .windows(marker.len())
        .position(|w| w == marker)
        .map(|start| start + marker.len())
}


#[cfg(test)]
mod tests {
    use super::mock::ScriptedTransport;
    use super::*;

    fn soon() -> Instant {
        Instant::now() + Duration::from_secs(5)
    }

    #[test]
    fn wait_for_marker_split_across_chunks() {
        let mut t = ScriptedTransport::chunked(b"hello\n>>", 3);
        t.script.push_back(Recv::Data(b"> rest".to_vec()));
        let mut inbox = Inbox::new(t);
        let got = inbox.wait_for(b">>> ", soon()).unwrap();
        assert_eq!(got, b"hello\n>>> ");
        assert_eq!(inbox.buffered(), b"rest");
    }

    #[test]
    fn next_byte_uses_leftover_first() {
        let mut inbox = Inbox::new(ScriptedTransport::new(vec![
            Recv::Data(b"ab".to_vec()),
            Recv::Data(b"c".to_vec()),
        ]));
        inbox.wait_for(b"a", soon()).unwrap();
        assert_eq!(inbox.next_byte(soon()).unwrap(), b'b');
        assert_eq!(inbox.next_byte(soon()).unwrap(), b'c');
        assert!(matches!(
            inbox.next_byte(soon()),
            Err(Error::TransportClosed)
        ));
    }

    #[test]
    fn timeout_and_close_are_distinct() {
        let mut inbox = Inbox::new(ScriptedTransport::new(vec![Recv::Timeout]));
        assert!(matches!(
            inbox.wait_for(b"x", soon()),
            Err(Error::TransportTimeout)
        ));
        assert!(matches!(
            inbox.wait_for(b"x", soon()),
            Err(Error::TransportClosed)
        ));
    }

    #[test]
    fn expired_deadline_times_out() {
        let mut inbox = Inbox::new(ScriptedTransport::chunked(b"data", 4));
        let past = Instant::now() - Duration::from_millis(1);
        assert!(matches!(
            inbox.next_byte(past),
            Err(Error::TransportTimeout)
        ));
    }

    #[test]
    fn drain_collects_until_close() {
        let mut inbox = Inbox::new(ScriptedTransport::new(vec![
            Recv::Data(b"flag{".to_vec()),
            Recv::Data(b"ok}\n".to_vec()),
        ]));
        let out = inbox.drain(Duration::from_secs(1)).unwrap();
        assert_eq!(out, b"flag{ok}\n");
        assert!(inbox.buffered().is_empty());
    }

    #[test]
    fn send_reaches_transport() {
        let mut inbox = Inbox::new(ScriptedTransport::default());
        inbox.send(b"00ff\n").unwrap();
        assert_eq!(inbox.into_inner().sent, b"00ff\n");
    }
}
