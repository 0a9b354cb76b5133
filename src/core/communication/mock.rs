//! Scripted in-memory transport for unit tests.

use crate::core::communication::transport::{CloseHandle, Transport};
use crate::domain::error::{DmmError, DmmResult};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

type Responder = Box<dyn FnMut(&str) -> Option<String> + Send>;

pub(crate) struct MockTransport {
    written: Arc<Mutex<Vec<String>>>,
    incoming: VecDeque<Vec<u8>>,
    responder: Option<Responder>,
    failing_writes: usize,
    eof_when_drained: bool,
    shutdowns: Arc<Mutex<usize>>,
    close: CloseHandle,
}

impl MockTransport {
    /// A transport that accepts every write and never answers
    pub(crate) fn silent() -> Self {
        Self {
            written: Arc::new(Mutex::new(Vec::new())),
            incoming: VecDeque::new(),
            responder: None,
            failing_writes: 0,
            eof_when_drained: false,
            shutdowns: Arc::new(Mutex::new(0)),
            close: CloseHandle::new(),
        }
    }

    /// Answer each written line with whatever `responder` returns
    pub(crate) fn responding<F>(responder: F) -> Self
    where
        F: FnMut(&str) -> Option<String> + Send + 'static,
    {
        let mut mock = Self::silent();
        mock.responder = Some(Box::new(responder));
        mock
    }

    /// Bytes already waiting on the connection when it opens
    pub(crate) fn with_incoming(mut self, chunk: &[u8]) -> Self {
        self.incoming.push_back(chunk.to_vec());
        self
    }

    pub(crate) fn failing_first_writes(mut self, count: usize) -> Self {
        self.failing_writes = count;
        self
    }

    /// Report end-of-stream instead of timing out once nothing is queued
    pub(crate) fn eof_when_drained(mut self) -> Self {
        self.eof_when_drained = true;
        self
    }

    /// Every line written, including failed attempts, without terminators
    pub(crate) fn written(&self) -> Arc<Mutex<Vec<String>>> {
        Arc::clone(&self.written)
    }

    pub(crate) fn shutdowns(&self) -> Arc<Mutex<usize>> {
        Arc::clone(&self.shutdowns)
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn send(&mut self, data: &[u8]) -> DmmResult<()> {
        if self.close.is_closed() {
            return Err(DmmError::NotConnected);
        }

        let line = String::from_utf8_lossy(data).trim_end_matches('\n').to_string();
        self.written.lock().unwrap().push(line.clone());

        if self.failing_writes > 0 {
            self.failing_writes -= 1;
            return Err(DmmError::Network(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "scripted write failure",
            )));
        }

        if let Some(responder) = self.responder.as_mut() {
            if let Some(reply) = responder(&line) {
                self.incoming.push_back(reply.into_bytes());
            }
        }
        Ok(())
    }

    async fn receive(&mut self, buf: &mut [u8], timeout: Duration) -> DmmResult<usize> {
        if self.close.is_closed() {
            return Err(DmmError::NotConnected);
        }

        if let Some(mut chunk) = self.incoming.pop_front() {
            let n = chunk.len().min(buf.len());
            buf[..n].copy_from_slice(&chunk[..n]);
            if n < chunk.len() {
                self.incoming.push_front(chunk.split_off(n));
            }
            return Ok(n);
        }

        if self.eof_when_drained {
            return Ok(0);
        }

        tokio::select! {
            _ = self.close.closed() => Err(DmmError::NotConnected),
            _ = tokio::time::sleep(timeout) => Err(DmmError::Timeout),
        }
    }

    fn close_handle(&self) -> CloseHandle {
        self.close.clone()
    }

    async fn shutdown(&mut self) -> DmmResult<()> {
        self.close.close();
        *self.shutdowns.lock().unwrap() += 1;
        Ok(())
    }
}
