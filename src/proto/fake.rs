use std::pin::Pin;
use std::sync::{Arc, Mutex};

/// In-memory instrument: replays canned response bytes and records every
/// write the session performs.
pub(crate) struct FakeBuffer {
    response_buf: Vec<u8>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    shutdowns: Arc<Mutex<usize>>,
    releases: Arc<Mutex<usize>>,
}

/// Handle to inspect what a [`FakeBuffer`] received.
#[derive(Clone, Default)]
pub(crate) struct FakeLog {
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    shutdowns: Arc<Mutex<usize>>,
    releases: Arc<Mutex<usize>>,
}

impl FakeLog {
    /// Bytes of each write, in order.
    pub(crate) fn writes(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }

    /// Writes decoded as text, with the termination removed.
    pub(crate) fn lines(&self) -> Vec<String> {
        self.writes()
            .iter()
            .map(|w| {
                String::from_utf8_lossy(w)
                    .trim_end_matches('\n')
                    .to_string()
            })
            .collect()
    }

    pub(crate) fn shutdowns(&self) -> usize {
        *self.shutdowns.lock().unwrap()
    }

    /// Number of times the buffer itself was dropped.
    pub(crate) fn releases(&self) -> usize {
        *self.releases.lock().unwrap()
    }
}

impl FakeBuffer {
    pub(crate) fn new(response_buf: Vec<u8>) -> (Self, FakeLog) {
        let log = FakeLog::default();
        (
            Self {
                response_buf,
                written: log.written.clone(),
                shutdowns: log.shutdowns.clone(),
                releases: log.releases.clone(),
            },
            log,
        )
    }
}

impl Drop for FakeBuffer {
    fn drop(&mut self) {
        *self.releases.lock().unwrap() += 1;
    }
}

impl tokio::io::AsyncRead for FakeBuffer {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> std::task::Poll<std::io::Result<()>> {
        if !self.response_buf.is_empty() {
            let c = if buf.remaining() < self.response_buf.len() {
                buf.remaining()
            } else {
                self.response_buf.len()
            };
            buf.put_slice(&self.response_buf[0..c]);
            self.response_buf.drain(0..c);
        }
        std::task::Poll::Ready(Ok(()))
    }
}

impl tokio::io::AsyncWrite for FakeBuffer {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
        buf: &[u8],
    ) -> std::task::Poll<std::result::Result<usize, std::io::Error>> {
        self.written.lock().unwrap().push(buf.to_vec());
        std::task::Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), std::io::Error>> {
        std::task::Poll::Ready(Ok(()))
    }

    fn poll_shutdown(
        self: Pin<&mut Self>,
        _cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<std::result::Result<(), std::io::Error>> {
        *self.shutdowns.lock().unwrap() += 1;
        std::task::Poll::Ready(Ok(()))
    }
}
