//! VISA resource addresses and the transports behind them.
//!
//! Supported for opening:
//!
//! * `TCPIP[board]::<host>::<port>::SOCKET`, raw SCPI over TCP
//! * `ASRL<port>::INSTR`, serial line; `<port>` is a device path
//!   (`ASRL/dev/ttyUSB0::INSTR`) or a port number (`ASRL3::INSTR`)
//! * `USB[board]::<vid>::<pid>::<serial>[::<interface>]::INSTR`, USBTMC
//!   through the Linux `usbtmc` driver
//!
//! `GPIB` and `TCPIP::...::INSTR` (VXI-11, HiSLIP) addresses parse but
//! cannot be opened.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tokio::net::TcpStream;
use tokio_serial::{SerialPortBuilderExt, SerialStream};

use crate::proto::{ProtoError, Result};
use crate::session::SessionOptions;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceAddress {
    Socket {
        board: u16,
        host: String,
        port: u16,
    },
    Serial {
        port: String,
    },
    Usb {
        board: u16,
        vendor: u16,
        product: u16,
        serial: String,
        interface: Option<u16>,
    },
    Lan {
        board: u16,
        host: String,
        device: String,
    },
    Gpib {
        board: u16,
        primary: u8,
        secondary: Option<u8>,
    },
}

fn invalid(address: &str) -> ProtoError {
    ProtoError::InvalidResource(address.to_string())
}

/// Split `USB0` into `("USB", "0")` for a known interface prefix.
fn split_interface<'a>(token: &'a str, prefix: &str) -> Option<&'a str> {
    token
        .get(..prefix.len())
        .filter(|head| head.eq_ignore_ascii_case(prefix))
        .map(|_| &token[prefix.len()..])
}

fn parse_board(board: &str, address: &str) -> Result<u16> {
    if board.is_empty() {
        Ok(0)
    } else {
        board.parse::<u16>().map_err(|_| invalid(address))
    }
}

/// Decimal or `0x` prefixed hexadecimal.
fn parse_id(value: &str, address: &str) -> Result<u16> {
    let parsed = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u16::from_str_radix(hex, 16),
        None => value.parse::<u16>(),
    };
    parsed.map_err(|_| invalid(address))
}

impl FromStr for ResourceAddress {
    type Err = ProtoError;

    fn from_str(address: &str) -> Result<Self> {
        let parts: Vec<&str> = address.trim().split("::").collect();
        let (first, rest) = parts.split_first().ok_or_else(|| invalid(address))?;
        let (class, fields) = rest.split_last().ok_or_else(|| invalid(address))?;
        let socket = class.eq_ignore_ascii_case("SOCKET");
        if !socket && !class.eq_ignore_ascii_case("INSTR") {
            return Err(invalid(address));
        }
        if fields.iter().any(|f| f.is_empty()) {
            return Err(invalid(address));
        }

        if let Some(board) = split_interface(first, "TCPIP") {
            let board = parse_board(board, address)?;
            match (socket, fields) {
                (true, [host, port]) => Ok(Self::Socket {
                    board,
                    host: host.to_string(),
                    port: port.parse().map_err(|_| invalid(address))?,
                }),
                (false, [host]) => Ok(Self::Lan {
                    board,
                    host: host.to_string(),
                    device: "inst0".to_string(),
                }),
                (false, [host, device]) => Ok(Self::Lan {
                    board,
                    host: host.to_string(),
                    device: device.to_string(),
                }),
                _ => Err(invalid(address)),
            }
        } else if socket {
            Err(invalid(address))
        } else if let Some(port) = split_interface(first, "ASRL") {
            if port.is_empty() || !fields.is_empty() {
                return Err(invalid(address));
            }
            Ok(Self::Serial {
                port: port.to_string(),
            })
        } else if let Some(board) = split_interface(first, "USB") {
            let board = parse_board(board, address)?;
            match fields {
                [vendor, product, serial] | [vendor, product, serial, _] => Ok(Self::Usb {
                    board,
                    vendor: parse_id(vendor, address)?,
                    product: parse_id(product, address)?,
                    serial: serial.to_string(),
                    interface: fields
                        .get(3)
                        .map(|i| i.parse::<u16>().map_err(|_| invalid(address)))
                        .transpose()?,
                }),
                _ => Err(invalid(address)),
            }
        } else if let Some(board) = split_interface(first, "GPIB") {
            let board = parse_board(board, address)?;
            let addr = |f: &str| f.parse::<u8>().map_err(|_| invalid(address));
            match fields {
                [primary] => Ok(Self::Gpib {
                    board,
                    primary: addr(*primary)?,
                    secondary: None,
                }),
                [primary, secondary] => Ok(Self::Gpib {
                    board,
                    primary: addr(*primary)?,
                    secondary: Some(addr(*secondary)?),
                }),
                _ => Err(invalid(address)),
            }
        } else {
            Err(invalid(address))
        }
    }
}

impl fmt::Display for ResourceAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Socket { board, host, port } => {
                write!(f, "TCPIP{}::{}::{}::SOCKET", board, host, port)
            }
            Self::Serial { port } => write!(f, "ASRL{}::INSTR", port),
            Self::Usb {
                board,
                vendor,
                product,
                serial,
                interface,
            } => {
                write!(f, "USB{}::{:#06x}::{:#06x}::{}", board, vendor, product, serial)?;
                if let Some(interface) = interface {
                    write!(f, "::{}", interface)?;
                }
                f.write_str("::INSTR")
            }
            Self::Lan {
                board,
                host,
                device,
            } => write!(f, "TCPIP{}::{}::{}::INSTR", board, host, device),
            Self::Gpib {
                board,
                primary,
                secondary,
            } => {
                write!(f, "GPIB{}::{}", board, primary)?;
                if let Some(secondary) = secondary {
                    write!(f, "::{}", secondary)?;
                }
                f.write_str("::INSTR")
            }
        }
    }
}

/// An opened byte stream to an instrument.
pub(crate) enum Transport {
    Tcp(TcpStream),
    Serial(SerialStream),
    #[cfg_attr(not(target_os = "linux"), allow(dead_code))]
    Device(tokio::fs::File),
}

async fn bounded<T, F>(timeout: Option<Duration>, fut: F) -> std::io::Result<T>
where
    F: std::future::Future<Output = std::io::Result<T>>,
{
    match timeout {
        Some(limit) => tokio::time::timeout(limit, fut)
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "open timed out"))?,
        None => fut.await,
    }
}

impl ResourceAddress {
    /// Device name of a serial port.
    pub fn serial_path(port: &str) -> String {
        match port.parse::<u16>() {
            #[cfg(windows)]
            Ok(n) => format!("COM{}", n),
            #[cfg(not(windows))]
            Ok(n) => format!("/dev/ttyS{}", n.saturating_sub(1)),
            Err(_) => port.to_string(),
        }
    }

    pub(crate) async fn open(&self, options: &SessionOptions) -> Result<Transport> {
        let connection = |source: std::io::Error| ProtoError::Connection {
            resource: self.to_string(),
            source,
        };

        match self {
            Self::Socket { host, port, .. } => {
                let stream = bounded(options.timeout, TcpStream::connect((host.as_str(), *port)))
                    .await
                    .map_err(connection)?;
                stream.set_nodelay(true).map_err(connection)?;
                Ok(Transport::Tcp(stream))
            }
            Self::Serial { port } => {
                let mut builder = tokio_serial::new(Self::serial_path(port), options.baud_rate);
                if let Some(timeout) = options.timeout {
                    builder = builder.timeout(timeout);
                }
                #[allow(unused_mut)]
                let mut stream = builder
                    .open_native_async()
                    .map_err(|e| connection(e.into()))?;

                #[cfg(unix)]
                stream
                    .set_exclusive(false)
                    .map_err(|e| connection(e.into()))?;

                Ok(Transport::Serial(stream))
            }
            Self::Usb {
                vendor,
                product,
                serial,
                interface,
                ..
            } => {
                let path = find_usbtmc(*vendor, *product, serial, *interface)
                    .await
                    .map_err(connection)?;
                log::debug!("{} resolved to {}", self, path.display());
                let file = open_device(&path).await.map_err(connection)?;
                Ok(Transport::Device(file))
            }
            Self::Lan { .. } => Err(ProtoError::Unsupported(format!(
                "{}: VXI-11/HiSLIP is not available, use a ::SOCKET address",
                self
            ))),
            Self::Gpib { .. } => Err(ProtoError::Unsupported(format!(
                "{}: no GPIB transport available",
                self
            ))),
        }
    }
}

const USBTMC_CLASS: &str = "/sys/class/usbmisc";

/// Open a character device so that every frame reaches it in one `write()`.
///
/// The usbtmc driver ends a message with each `write()` call, but
/// `tokio::fs::File` splits writes larger than its buffer limit.
pub(crate) async fn open_device(path: &std::path::Path) -> std::io::Result<tokio::fs::File> {
    let mut file = tokio::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .open(path)
        .await?;
    file.set_max_buf_size(usize::MAX);
    Ok(file)
}

#[cfg(target_os = "linux")]
async fn find_usbtmc(
    vendor: u16,
    product: u16,
    serial: &str,
    interface: Option<u16>,
) -> std::io::Result<PathBuf> {
    async fn attr(dir: &std::path::Path, name: &str) -> Option<String> {
        tokio::fs::read_to_string(dir.join(name))
            .await
            .ok()
            .map(|s| s.trim().to_string())
    }
    let hex = |s: Option<String>| s.and_then(|s| u16::from_str_radix(&s, 16).ok());

    let mut entries = tokio::fs::read_dir(USBTMC_CLASS).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().to_string();
        if !name.starts_with("usbtmc") {
            continue;
        }
        // `device` links to the USB interface, its parent is the USB device.
        let intf = match tokio::fs::canonicalize(entry.path().join("device")).await {
            Ok(path) => path,
            Err(_) => continue,
        };
        let Some(dev) = intf.parent() else {
            continue;
        };
        if hex(attr(dev, "idVendor").await) != Some(vendor)
            || hex(attr(dev, "idProduct").await) != Some(product)
            || attr(dev, "serial").await.as_deref() != Some(serial)
        {
            continue;
        }
        if let Some(number) = interface {
            if hex(attr(&intf, "bInterfaceNumber").await) != Some(number) {
                continue;
            }
        }
        return Ok(PathBuf::from("/dev").join(name));
    }
    Err(std::io::Error::new(
        std::io::ErrorKind::NotFound,
        format!(
            "no usbtmc device {:04x}:{:04x} with serial {}",
            vendor, product, serial
        ),
    ))
}

#[cfg(not(target_os = "linux"))]
async fn find_usbtmc(
    _vendor: u16,
    _product: u16,
    _serial: &str,
    _interface: Option<u16>,
) -> std::io::Result<PathBuf> {
    Err(std::io::Error::new(
        std::io::ErrorKind::Unsupported,
        format!("USBTMC needs the {} driver class of Linux", USBTMC_CLASS),
    ))
}
