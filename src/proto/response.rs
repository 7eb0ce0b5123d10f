use bytes::Bytes;
use std::str::FromStr;

use super::ProtoError;

/// One message received from the instrument.
///
/// Text responses have the read termination removed. Block responses carry
/// only the payload of an IEEE 488.2 block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    Text(String),
    Block(Bytes),
}

/// Reply to `*IDN?`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Ident {
    pub manufacturer: String,
    pub model: String,
    pub serial: String,
    pub firmware: String,
}

impl FromStr for Ident {
    type Err = ProtoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let values: Vec<&str> = value.trim().split(',').map(str::trim).collect();
        if values.len() == 4 {
            Ok(Self {
                manufacturer: String::from(values[0]),
                model: String::from(values[1]),
                serial: String::from(values[2]),
                firmware: String::from(values[3]),
            })
        } else {
            Err(ProtoError::Unexpected(Response::Text(value.to_string())))
        }
    }
}

/// One entry of the SCPI error queue, e.g. `-113,"Undefined header"`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SystemError {
    pub code: i32,
    pub message: String,
}

impl SystemError {
    /// Code 0 marks an empty queue.
    pub fn is_error(&self) -> bool {
        self.code != 0
    }
}

impl FromStr for SystemError {
    type Err = ProtoError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let unexpected = || ProtoError::Unexpected(Response::Text(value.to_string()));
        let (code, message) = value.trim().split_once(',').ok_or_else(unexpected)?;
        let code = code.trim().parse::<i32>().map_err(|_| unexpected())?;
        Ok(Self {
            code,
            message: message.trim().trim_matches('"').to_string(),
        })
    }
}

impl From<SystemError> for ProtoError {
    fn from(value: SystemError) -> Self {
        Self::Device {
            code: value.code,
            message: value.message,
        }
    }
}

pub(crate) fn parse_bool(value: &str) -> Result<bool, ProtoError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "1" | "ON" => Ok(true),
        "0" | "OFF" => Ok(false),
        _ => Err(ProtoError::Unexpected(Response::Text(value.to_string()))),
    }
}

pub(crate) fn parse_f64(value: &str) -> Result<f64, ProtoError> {
    value
        .trim()
        .parse::<f64>()
        .map_err(|_| ProtoError::Unexpected(Response::Text(value.to_string())))
}
