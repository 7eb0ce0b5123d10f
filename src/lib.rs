//!
//! This library talks to SCPI function generators and uploads arbitrary
//! waveforms to them.
//!
//! <br>
//!
//! # Details
//!
//! - Instruments are named by VISA resource addresses, see [`resource`].
//!
//! - Basic setup and waveform upload
//!
//!   ```no_run
//!   use fungen::{Session, SessionOptions, UploadOptions, Waveform};
//!   #[tokio::main]
//!   async fn main() -> fungen::Result<()> {
//!       let waveform = Waveform::new(vec![0.0, 0.5, -0.5, 1.0], 1000.0)?;
//!       let mut session =
//!           Session::open("TCPIP0::192.168.1.10::5025::SOCKET", SessionOptions::default()).await?;
//!       session.write("DATA:VOL:CLE").await?;
//!       waveform.write_to_device(&mut session, &UploadOptions::default()).await?;
//!       session.close().await?;
//!       Ok(())
//!   }
//!   ```
//!
//! - Without an async runtime, use the [`blocking`] module.
//!
//! # Supported devices
//!
//!  * Keysight / Agilent 33500B series
//!

pub mod blocking;
pub mod generator;
pub mod proto;
pub mod resource;
pub mod session;
pub mod waveform;

pub use generator::FunctionGenerator;
pub use proto::command::{Command, Function, VoltageUnit};
pub use proto::{ProtoError, Result};
pub use session::{Session, SessionOptions};
pub use waveform::{DataFormat, UploadOptions, ValidationError, Waveform};

/// Address of the 33522B the library was first used with.
pub const DEFAULT_RESOURCE: &str = "USB0::2391::9991::MY52303330::0::INSTR";

/// Default baudrate of serial (`ASRL`) resources.
pub const DEFAULT_BAUDRATE: u32 = 9600;

pub const DEFAULT_CHANNEL: u8 = 1;
