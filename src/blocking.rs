//! Synchronous wrappers.
//!
//! Each handle owns a current-thread runtime and blocks the calling thread
//! until the operation completes or the session timeout expires. Do not use
//! these from inside an async context.

use bytes::Bytes;
use tokio::runtime::{Builder, Runtime};

use crate::proto::command::{BurstCycles, BurstMode, BurstPeriod, Command, Function, TriggerSource, VoltageUnit};
use crate::proto::response::{Ident, SystemError};
use crate::proto::Result;
use crate::session::SessionOptions;
use crate::waveform::{UploadOptions, Waveform};

fn runtime() -> Result<Runtime> {
    Ok(Builder::new_current_thread().enable_all().build()?)
}

macro_rules! forward {
    ($( $(#[$meta:meta])* fn $name:ident(&mut self $(, $arg:ident: $ty:ty)*) -> $ret:ty; )*) => {
        $(
            $(#[$meta])*
            pub fn $name(&mut self $(, $arg: $ty)*) -> $ret {
                self.runtime.block_on(self.inner.$name($($arg),*))
            }
        )*
    };
}

/// Blocking [`crate::Session`].
///
/// ```no_run
/// use fungen::blocking::Session;
/// use fungen::{SessionOptions, UploadOptions, Waveform};
///
/// # fn main() -> fungen::Result<()> {
/// let waveform = Waveform::new(vec![0.0, 0.5, -0.5, 1.0], 1000.0)?;
/// let mut session = Session::open("TCPIP0::192.168.1.10::5025::SOCKET", SessionOptions::default())?;
/// session.write_waveform(&waveform, &UploadOptions::default())?;
/// # Ok(())
/// # }
/// ```
pub struct Session {
    // Dropped before the runtime it was created on.
    inner: crate::Session,
    runtime: Runtime,
}

impl Session {
    pub fn open(address: impl AsRef<str>, options: SessionOptions) -> Result<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(crate::Session::open(address, options))?;
        Ok(Self { inner, runtime })
    }

    pub fn resource(&self) -> &str {
        self.inner.resource()
    }

    pub fn is_open(&self) -> bool {
        self.inner.is_open()
    }

    forward! {
        fn send(&mut self, command: Command) -> Result<()>;
        fn write(&mut self, command: impl AsRef<str>) -> Result<()>;
        fn query(&mut self, command: impl AsRef<str>) -> Result<String>;
        fn query_block(&mut self, command: impl AsRef<str>) -> Result<Bytes>;
        fn close(&mut self) -> Result<()>;
    }

    pub fn write_waveform(&mut self, waveform: &Waveform, options: &UploadOptions) -> Result<()> {
        self.runtime
            .block_on(waveform.write_to_device(&mut self.inner, options))
    }
}

/// Blocking [`crate::FunctionGenerator`].
pub struct FunctionGenerator {
    inner: crate::FunctionGenerator,
    runtime: Runtime,
}

impl FunctionGenerator {
    pub fn open(address: impl AsRef<str>, options: SessionOptions) -> Result<Self> {
        let runtime = runtime()?;
        let inner = runtime.block_on(crate::FunctionGenerator::open(address, options))?;
        Ok(Self { inner, runtime })
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.inner.set_channel(channel);
        self
    }

    pub fn channel(&self) -> u8 {
        self.inner.channel()
    }

    forward! {
        fn write(&mut self, command: impl AsRef<str>) -> Result<()>;
        fn query(&mut self, command: impl AsRef<str>) -> Result<String>;
        fn id(&mut self) -> Result<Ident>;
        fn output(&mut self) -> Result<bool>;
        fn set_output(&mut self, enabled: bool) -> Result<()>;
        fn function(&mut self) -> Result<Function>;
        fn set_function(&mut self, function: Function) -> Result<()>;
        fn amplitude(&mut self) -> Result<f64>;
        fn set_amplitude(&mut self, amplitude: f64, unit: VoltageUnit) -> Result<()>;
        fn offset(&mut self) -> Result<f64>;
        fn set_offset(&mut self, offset: f64) -> Result<()>;
        fn frequency(&mut self) -> Result<f64>;
        fn set_frequency(&mut self, frequency: f64) -> Result<()>;
        fn burst(&mut self) -> Result<bool>;
        fn set_burst(&mut self, enabled: bool) -> Result<()>;
        fn ncycles(&mut self) -> Result<BurstCycles>;
        fn set_ncycles(&mut self, cycles: BurstCycles) -> Result<()>;
        fn burst_period(&mut self) -> Result<BurstPeriod>;
        fn set_burst_period(&mut self, period: BurstPeriod) -> Result<()>;
        fn burst_mode(&mut self) -> Result<BurstMode>;
        fn set_burst_mode(&mut self, mode: BurstMode) -> Result<()>;
        fn trigger_source(&mut self) -> Result<TriggerSource>;
        fn set_trigger_source(&mut self, source: TriggerSource) -> Result<()>;
        fn clear_volatile(&mut self) -> Result<()>;
        fn next_error(&mut self) -> Result<SystemError>;
        fn check_errors(&mut self) -> Result<()>;
        fn upload(&mut self, waveform: &Waveform, options: &UploadOptions) -> Result<()>;
        fn close(&mut self) -> Result<()>;
    }
}
