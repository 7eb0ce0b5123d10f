use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use std::future::Future;
use std::{io, pin::Pin, time::Duration};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::Decoder;

use crate::proto::{codec::ScpiCodec, command::Command, response::Response, ProtoError, Result};
use crate::resource::{ResourceAddress, Transport};
use crate::DEFAULT_BAUDRATE;

trait AsyncReadWrite<S>: futures::Sink<S> + futures::Stream {}

impl<T, S> AsyncReadWrite<S> for T where T: futures::Sink<S> + futures::Stream {}

type FramedStream = Pin<
    Box<
        dyn AsyncReadWrite<Command, Error = io::Error, Item = std::result::Result<Response, io::Error>>
            + Send,
    >,
>;

/// Connection settings of a [`Session`].
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Bound for opening and for every read and write. `None` waits forever.
    pub timeout: Option<Duration>,
    pub write_termination: String,
    pub read_termination: u8,
    /// Only used by serial resources.
    pub baud_rate: u32,
    /// Log every command at debug level.
    pub echo: bool,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            timeout: None,
            write_termination: String::from("\n"),
            read_termination: b'\n',
            baud_rate: DEFAULT_BAUDRATE,
            echo: true,
        }
    }
}

impl SessionOptions {
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn without_timeout(mut self) -> Self {
        self.timeout = None;
        self
    }

    pub fn with_write_termination(mut self, termination: impl Into<String>) -> Self {
        self.write_termination = termination.into();
        self
    }

    pub fn with_read_termination(mut self, termination: u8) -> Self {
        self.read_termination = termination;
        self
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_echo(mut self, echo: bool) -> Self {
        self.echo = echo;
        self
    }
}

async fn bounded<F: Future>(timeout: Option<Duration>, fut: F) -> Result<F::Output> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| ProtoError::Timeout),
        None => Ok(fut.await),
    }
}

/// Fail for commands the instrument never answers.
fn expect_reply(command: &Command) -> Result<()> {
    if command.is_query() {
        Ok(())
    } else {
        Err(ProtoError::InvalidValue(format!("{} is not a query", command)))
    }
}

/// An open connection to one instrument.
///
/// The transport is released exactly once: by [`Session::close`], or when
/// the session is dropped without being closed.
///
/// ```no_run
/// use fungen::{Session, SessionOptions};
/// # async fn run() -> fungen::Result<()> {
/// let mut session = Session::open(
///     "TCPIP0::192.168.1.10::5025::SOCKET",
///     SessionOptions::default(),
/// )
/// .await?;
/// println!("{}", session.query("*IDN?").await?);
/// session.close().await?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    resource: String,
    options: SessionOptions,
    stream: Option<FramedStream>,
}

impl Session {
    pub async fn open(address: impl AsRef<str>, options: SessionOptions) -> Result<Self> {
        let address: ResourceAddress = address.as_ref().parse()?;
        let resource = address.to_string();
        let session = match address.open(&options).await? {
            Transport::Tcp(stream) => Self::from_stream(resource, stream, options),
            Transport::Serial(stream) => Self::from_stream(resource, stream, options),
            Transport::Device(file) => Self::from_stream(resource, file, options),
        };
        log::info!("Opened {}", session.resource);
        Ok(session)
    }

    /// Wrap an already connected byte stream.
    pub fn from_stream<T>(resource: impl Into<String>, io: T, options: SessionOptions) -> Self
    where
        T: AsyncRead + AsyncWrite + Send + 'static,
    {
        let codec = ScpiCodec::new(options.write_termination.clone(), options.read_termination);
        let stream = codec.framed(io);

        Self {
            resource: resource.into(),
            options,
            stream: Some(Box::pin(stream)),
        }
    }

    #[cfg(test)]
    pub(crate) fn new_faked(response_buf: &str) -> (Self, crate::proto::fake::FakeLog) {
        let (buffer, log) = crate::proto::fake::FakeBuffer::new(response_buf.as_bytes().to_vec());
        (
            Self::from_stream("FAKE::INSTR", buffer, SessionOptions::default()),
            log,
        )
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn options(&self) -> &SessionOptions {
        &self.options
    }

    pub fn is_open(&self) -> bool {
        self.stream.is_some()
    }

    fn stream(&mut self) -> Result<&mut FramedStream> {
        self.stream.as_mut().ok_or(ProtoError::Closed)
    }

    /// Transmit a command. Returns once the bytes are handed to the transport.
    pub async fn send(&mut self, command: Command) -> Result<()> {
        if self.options.echo {
            log::debug!("{} >> {}", self.resource, command);
        }
        let timeout = self.options.timeout;
        let stream = self.stream()?;
        bounded(timeout, stream.send(command)).await??;
        Ok(())
    }

    /// Send a SCPI command verbatim.
    pub async fn write(&mut self, command: impl AsRef<str>) -> Result<()> {
        self.send(Command::Raw(command.as_ref().to_string())).await
    }

    /// Wait for the next message from the instrument.
    pub async fn receive(&mut self) -> Result<Response> {
        let timeout = self.options.timeout;
        let stream = self.stream()?;
        match bounded(timeout, stream.next()).await? {
            Some(Ok(response)) => Ok(response),
            Some(Err(ioerr)) => Err(ioerr.into()),
            None => Err(ProtoError::Io(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "Instrument closed the connection",
            ))),
        }
    }

    pub async fn query_command(&mut self, command: Command) -> Result<String> {
        expect_reply(&command)?;
        self.send(command).await?;
        match self.receive().await? {
            Response::Text(text) => Ok(text),
            response => Err(response.into()),
        }
    }

    /// Send a query and return the text response without its termination.
    pub async fn query(&mut self, command: impl AsRef<str>) -> Result<String> {
        self.query_command(Command::Raw(command.as_ref().to_string()))
            .await
    }

    /// Send a query answered with an IEEE 488.2 block and return its payload.
    pub async fn query_block(&mut self, command: impl AsRef<str>) -> Result<Bytes> {
        let command = Command::Raw(command.as_ref().to_string());
        expect_reply(&command)?;
        self.send(command).await?;
        match self.receive().await? {
            Response::Block(data) => Ok(data),
            response => Err(response.into()),
        }
    }

    /// Flush and release the transport. Closing a closed session is a no-op.
    pub async fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        let result = bounded(self.options.timeout, stream.close()).await;
        drop(stream);
        log::info!("Closed {}", self.resource);
        result??;
        Ok(())
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.stream.take().is_some() {
            log::debug!("Released {} without close", self.resource);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("resource", &self.resource)
            .field("open", &self.is_open())
            .finish()
    }
}
