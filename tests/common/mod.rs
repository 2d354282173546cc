#![allow(dead_code)]

use parking_lot::Mutex;
use rover_link::Transport;
use std::collections::VecDeque;
use std::io;
use std::sync::Arc;
use std::time::Duration;

/// How the scripted device answers the next request.
#[derive(Debug, Clone)]
pub enum Script {
    Reply(&'static str),
    Silence,
    ReadError,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Write(Vec<u8>),
    Read,
    Discard,
    Close,
}

#[derive(Debug, Default)]
struct Shared {
    script: VecDeque<Script>,
    events: Vec<Event>,
    rx: VecDeque<u8>,
    fail_writes: bool,
    fail_discard: bool,
    write_delay: Duration,
}

/// Transport double that replays a script and records every call.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    shared: Arc<Mutex<Shared>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_script(script: impl IntoIterator<Item = Script>) -> Self {
        let transport = Self::new();
        transport.shared.lock().script.extend(script);
        transport
    }

    pub fn push(&self, step: Script) {
        self.shared.lock().script.push_back(step);
    }

    /// Bytes already sitting in the receive buffer.
    pub fn preload(&self, bytes: &[u8]) {
        self.shared.lock().rx.extend(bytes);
    }

    pub fn fail_writes(&self) {
        self.shared.lock().fail_writes = true;
    }

    pub fn fail_discard(&self) {
        self.shared.lock().fail_discard = true;
    }

    pub fn set_write_delay(&self, delay: Duration) {
        self.shared.lock().write_delay = delay;
    }

    pub fn events(&self) -> Vec<Event> {
        self.shared.lock().events.clone()
    }

    pub fn writes(&self) -> Vec<String> {
        self.shared
            .lock()
            .events
            .iter()
            .filter_map(|e| match e {
                Event::Write(bytes) => Some(String::from_utf8_lossy(bytes).into_owned()),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.shared.lock().events.iter().filter(|e| *e == event).count()
    }
}

impl Transport for ScriptedTransport {
    fn write_all(&mut self, bytes: &[u8]) -> io::Result<()> {
        let delay = self.shared.lock().write_delay;
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let mut shared = self.shared.lock();
        if shared.fail_writes {
            return Err(io::Error::new(io::ErrorKind::BrokenPipe, "device unplugged"));
        }
        shared.events.push(Event::Write(bytes.to_vec()));
        Ok(())
    }

    fn read_line(&mut self, buf: &mut Vec<u8>, _timeout: Duration) -> io::Result<bool> {
        let mut shared = self.shared.lock();
        shared.events.push(Event::Read);

        if let Some(end) = shared.rx.iter().position(|b| *b == b'\n') {
            buf.extend(shared.rx.drain(..=end));
            return Ok(true);
        }

        match shared.script.pop_front() {
            Some(Script::Reply(line)) => {
                buf.extend_from_slice(line.as_bytes());
                Ok(true)
            }
            Some(Script::ReadError) => Err(io::Error::new(io::ErrorKind::Other, "read failed")),
            Some(Script::Silence) | None => Ok(false),
        }
    }

    fn discard_input(&mut self) -> io::Result<()> {
        let mut shared = self.shared.lock();
        if shared.fail_discard {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "port locked"));
        }
        shared.events.push(Event::Discard);
        shared.rx.clear();
        Ok(())
    }

    fn close(&mut self) {
        self.shared.lock().events.push(Event::Close);
    }
}
