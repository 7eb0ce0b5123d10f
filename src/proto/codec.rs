use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::{
    fmt::{self, Write},
    io, str,
};
use tokio_util::codec::{Decoder, Encoder};

use super::block::{self, BlockHeader};
use super::command::{arb_data_header, Command, Payload};
use super::response::Response;

/// Message framing of a SCPI byte stream.
///
/// Outgoing program messages are terminated with `write_termination`.
/// Incoming messages end at `read_termination`, except IEEE 488.2
/// definite-length blocks, which are framed by their length.
pub struct ScpiCodec {
    write_termination: String,
    read_termination: u8,
    // A definite block was taken before its terminator arrived.
    skip_termination: bool,
}

impl Default for ScpiCodec {
    fn default() -> Self {
        Self::new("\n", b'\n')
    }
}

impl ScpiCodec {
    pub fn new(write_termination: impl Into<String>, read_termination: u8) -> Self {
        Self {
            write_termination: write_termination.into(),
            read_termination,
            skip_termination: false,
        }
    }

    fn convert_string(line: impl AsRef<[u8]>) -> io::Result<String> {
        Ok(str::from_utf8(line.as_ref())
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidData, err))?
            .to_string())
    }

    fn decode_line(&self, src: &mut BytesMut) -> io::Result<Option<Response>> {
        let Some(n) = src.iter().position(|b| *b == self.read_termination) else {
            return Ok(None);
        };
        let line = src.split_to(n + 1);
        let mut text = &line[..n];
        if let [head @ .., b'\r'] = text {
            text = head;
        }
        Ok(Some(Response::Text(Self::convert_string(text)?)))
    }

    fn decode_block(
        &mut self,
        header: BlockHeader,
        src: &mut BytesMut,
    ) -> io::Result<Option<Response>> {
        match header {
            BlockHeader::Definite { header, len } => {
                if src.len() < header + len {
                    src.reserve(header + len - src.len());
                    return Ok(None);
                }
                src.advance(header);
                let payload = src.split_to(len).freeze();
                self.skip_termination = true;
                self.strip_termination(src);
                Ok(Some(Response::Block(payload)))
            }
            BlockHeader::Indefinite => {
                let Some(n) = src
                    .iter()
                    .skip(2)
                    .position(|b| *b == self.read_termination)
                else {
                    return Ok(None);
                };
                let message = src.split_to(2 + n + 1);
                Ok(Some(Response::Block(Bytes::copy_from_slice(
                    &message[2..2 + n],
                ))))
            }
        }
    }

    fn strip_termination(&mut self, src: &mut BytesMut) {
        if !self.skip_termination {
            return;
        }
        if src.first() == Some(&b'\r') && src.len() > 1 && src[1] == self.read_termination {
            src.advance(2);
            self.skip_termination = false;
        } else if src.first() == Some(&self.read_termination) {
            src.advance(1);
            self.skip_termination = false;
        } else if !src.is_empty() && src[0] != b'\r' {
            // Instrument did not terminate the block.
            self.skip_termination = false;
        }
    }
}

impl Decoder for ScpiCodec {
    type Item = Response;
    // Device-side SCPI errors are reported through the error queue, never
    // inline, so a decoded message is always a successful read.
    type Error = io::Error;

    fn decode(&mut self, src: &mut BytesMut) -> Result<Option<Self::Item>, Self::Error> {
        self.strip_termination(src);
        if self.skip_termination || src.is_empty() {
            return Ok(None);
        }
        let response = if src[0] == b'#' {
            match block::parse_header(src) {
                Ok(None) => return Ok(None),
                Ok(Some(header)) => self.decode_block(header, src)?,
                // Text that merely starts with '#'.
                Err(_) => self.decode_line(src)?,
            }
        } else {
            self.decode_line(src)?
        };
        if let Some(response) = &response {
            log::trace!("<< {:?}", response);
        }
        Ok(response)
    }
}

fn write_fmt_guarded(dst: &mut BytesMut, args: fmt::Arguments<'_>) -> Result<(), io::Error> {
    dst.write_fmt(args)
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))
}

impl Encoder<Command> for ScpiCodec {
    type Error = io::Error;

    fn encode(&mut self, item: Command, dst: &mut BytesMut) -> Result<(), Self::Error> {
        match &item {
            Command::ArbData {
                channel,
                name,
                payload: Payload::Binary { samples, order },
            } => {
                let start = dst.len();
                dst.put_slice(arb_data_header(*channel, name).as_bytes());
                if let Err(err) = block::put_f32_block(dst, samples, *order) {
                    dst.truncate(start);
                    return Err(err);
                }
            }
            Command::Raw(text) => {
                let text = text
                    .strip_suffix(self.write_termination.as_str())
                    .unwrap_or(text);
                dst.put_slice(text.as_bytes());
            }
            command => write_fmt_guarded(dst, format_args!("{}", command))?,
        }
        dst.put_slice(self.write_termination.as_bytes());
        Ok(())
    }
}
