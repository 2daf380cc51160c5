#![allow(dead_code)]

use std::collections::VecDeque;
use std::io::{self, ErrorKind, Read, Write};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use labrelay_lib::config::RelayConfig;
use labrelay_lib::relay::Relay;
use labrelay_lib::serial::{SerialInterface, SerialSettings};
use tokio::sync::oneshot;

/// Replays canned replies, one per read, then times out. Records every write.
pub struct ScriptedPort {
    pub written: Arc<Mutex<Vec<u8>>>,
    pub replies: VecDeque<Vec<u8>>,
}

impl Read for ScriptedPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self.replies.pop_front() {
            Some(reply) => {
                let n = reply.len().min(buf.len());
                buf[..n].copy_from_slice(&reply[..n]);
                Ok(n)
            }
            None => Err(io::Error::new(ErrorKind::TimedOut, "timed out")),
        }
    }
}

impl Write for ScriptedPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Answers each write with the same bytes, like a device in echo mode.
#[derive(Default)]
pub struct EchoPort {
    pending: Vec<u8>,
}

impl Read for EchoPort {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pending.is_empty() {
            return Err(io::Error::new(ErrorKind::TimedOut, "timed out"));
        }
        // Yield so an unlocked concurrent writer would get a chance to interleave.
        std::thread::yield_now();
        let n = self.pending.len().min(buf.len());
        buf[..n].copy_from_slice(&self.pending[..n]);
        self.pending.drain(..n);
        Ok(n)
    }
}

impl Write for EchoPort {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.pending.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

pub fn scripted_channel(replies: &[&str]) -> (SerialInterface, Arc<Mutex<Vec<u8>>>) {
    let written = Arc::new(Mutex::new(Vec::new()));
    let port = ScriptedPort {
        written: written.clone(),
        replies: replies.iter().map(|r| r.as_bytes().to_vec()).collect(),
    };
    let channel = SerialInterface::from_io(Box::new(port), &SerialSettings::new("mock0"));
    (channel, written)
}

pub fn echo_channel() -> SerialInterface {
    SerialInterface::from_io(Box::new(EchoPort::default()), &SerialSettings::new("echo0"))
}

pub struct RunningRelay {
    pub addr: SocketAddr,
    stop: Option<oneshot::Sender<()>>,
    task: tokio::task::JoinHandle<()>,
}

impl RunningRelay {
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        let _ = self.task.await;
    }
}

/// Serve `relay` on an ephemeral loopback port.
pub async fn spawn_relay(config: RelayConfig, channel: Option<SerialInterface>) -> RunningRelay {
    let relay = Relay::from_parts(config, channel);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (stop, stopped) = oneshot::channel::<()>();

    let task = tokio::spawn(async move {
        relay
            .serve(listener, async move {
                let _ = stopped.await;
            })
            .await
            .unwrap();
        relay.shutdown().await;
    });

    RunningRelay {
        addr,
        stop: Some(stop),
        task,
    }
}
