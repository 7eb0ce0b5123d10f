//! Arbitrary waveform upload.
//!
//! A [`Waveform`] holds normalized samples in `[-1, 1]` and a sample rate.
//! Uploading it issues, in order:
//!
//! 1. `FUNC:ARB:SRAT <rate>`
//! 2. `DATA:ARB <name>,<samples>`
//! 3. `FUNC:ARB <name>`
//!
//! [`UploadOptions`] can wrap this in `OUTP OFF` / `OUTP ON` and append the
//! amplitude of a waveform built from volts.

use thiserror::Error;

use crate::proto::block::Endianness;
use crate::proto::command::{Channel, Command, Payload, VoltageUnit};
use crate::proto::Result;
use crate::session::Session;

/// Largest upload sent as comma separated text by [`DataFormat::Auto`].
pub const ASCII_SAMPLE_LIMIT: usize = 1024;

pub const DEFAULT_WAVEFORM_NAME: &str = "func";

/// Longest arbitrary waveform name the instrument accepts.
const MAX_NAME_LEN: usize = 12;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("sample sequence is empty")]
    Empty,
    #[error("sample rate must be positive and finite, got {0}")]
    SampleRate(f64),
    #[error("sample {index} is not a finite number")]
    NonFinite { index: usize },
    #[error("all samples are zero, no amplitude can be derived")]
    Flat,
    #[error("invalid waveform name {0:?}")]
    InvalidName(String),
}

/// Encoding of the sample payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DataFormat {
    /// Text up to [`ASCII_SAMPLE_LIMIT`] samples, big-endian binary above.
    #[default]
    Auto,
    Ascii,
    Binary(Endianness),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UploadOptions {
    pub name: String,
    pub channel: Channel,
    pub format: DataFormat,
    /// Turn the output off before the upload and back on afterwards.
    pub toggle_output: bool,
    /// Program the amplitude recorded by [`Waveform::from_volts`].
    pub apply_amplitude: bool,
}

impl Default for UploadOptions {
    fn default() -> Self {
        Self {
            name: DEFAULT_WAVEFORM_NAME.to_string(),
            channel: None,
            format: DataFormat::Auto,
            toggle_output: false,
            apply_amplitude: false,
        }
    }
}

impl UploadOptions {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = Some(channel);
        self
    }

    pub fn with_format(mut self, format: DataFormat) -> Self {
        self.format = format;
        self
    }

    pub fn with_toggle_output(mut self, toggle: bool) -> Self {
        self.toggle_output = toggle;
        self
    }

    pub fn with_apply_amplitude(mut self, apply: bool) -> Self {
        self.apply_amplitude = apply;
        self
    }

    fn validate(&self) -> std::result::Result<(), ValidationError> {
        let mut chars = self.name.chars();
        let valid = self.name.len() <= MAX_NAME_LEN
            && chars.next().map_or(false, |c| c.is_ascii_alphabetic())
            && chars.all(|c| c.is_ascii_alphanumeric() || c == '_');
        if valid {
            Ok(())
        } else {
            Err(ValidationError::InvalidName(self.name.clone()))
        }
    }
}

fn validate(samples: &[f64], sample_rate: f64) -> std::result::Result<(), ValidationError> {
    if samples.is_empty() {
        return Err(ValidationError::Empty);
    }
    if !(sample_rate.is_finite() && sample_rate > 0.0) {
        return Err(ValidationError::SampleRate(sample_rate));
    }
    if let Some(index) = samples.iter().position(|s| !s.is_finite()) {
        return Err(ValidationError::NonFinite { index });
    }
    Ok(())
}

#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    samples: Vec<f64>,
    sample_rate: f64,
    amplitude: Option<f64>,
}

impl Waveform {
    /// Build from normalized samples. Values outside `[-1, 1]` are clipped.
    pub fn new(
        samples: impl Into<Vec<f64>>,
        sample_rate: f64,
    ) -> std::result::Result<Self, ValidationError> {
        let mut samples = samples.into();
        validate(&samples, sample_rate)?;

        let mut clipped = 0;
        for sample in samples.iter_mut() {
            if sample.abs() > 1.0 {
                *sample = sample.clamp(-1.0, 1.0);
                clipped += 1;
            }
        }
        if clipped > 0 {
            log::warn!(
                "Clipped {} of {} samples to [-1, 1]",
                clipped,
                samples.len()
            );
        }

        Ok(Self {
            samples,
            sample_rate,
            amplitude: None,
        })
    }

    /// Build from samples in volts, scaled by their peak magnitude.
    pub fn from_volts(
        volts: impl Into<Vec<f64>>,
        sample_rate: f64,
    ) -> std::result::Result<Self, ValidationError> {
        let mut samples = volts.into();
        validate(&samples, sample_rate)?;

        let peak = samples.iter().fold(0.0_f64, |peak, s| peak.max(s.abs()));
        if peak == 0.0 {
            return Err(ValidationError::Flat);
        }
        samples.iter_mut().for_each(|s| *s /= peak);

        Ok(Self {
            samples,
            sample_rate,
            amplitude: Some(peak),
        })
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }

    /// Peak voltage of a waveform built with [`Waveform::from_volts`].
    pub fn amplitude(&self) -> Option<f64> {
        self.amplitude
    }

    /// Commands that upload and select this waveform.
    pub fn commands(
        &self,
        options: &UploadOptions,
    ) -> std::result::Result<Vec<Command>, ValidationError> {
        options.validate()?;
        let ch = options.channel;
        let format = match options.format {
            DataFormat::Auto if self.samples.len() <= ASCII_SAMPLE_LIMIT => DataFormat::Ascii,
            DataFormat::Auto => DataFormat::Binary(Endianness::Normal),
            format => format,
        };

        let mut commands = Vec::with_capacity(8);
        if options.toggle_output {
            commands.push(Command::SetOutput(ch, false));
        }
        commands.push(Command::SetArbSampleRate(ch, self.sample_rate));

        let data = |payload| Command::ArbData {
            channel: ch,
            name: options.name.clone(),
            payload,
        };
        match format {
            DataFormat::Binary(Endianness::Swapped) => {
                commands.push(Command::SetByteOrder(Endianness::Swapped));
                commands.push(data(Payload::Binary {
                    samples: self.samples.clone(),
                    order: Endianness::Swapped,
                }));
                commands.push(Command::SetByteOrder(Endianness::Normal));
            }
            DataFormat::Binary(order) => commands.push(data(Payload::Binary {
                samples: self.samples.clone(),
                order,
            })),
            _ => commands.push(data(Payload::Ascii(self.samples.clone()))),
        }

        commands.push(Command::SelectArb(ch, options.name.clone()));
        if let (true, Some(peak)) = (options.apply_amplitude, self.amplitude) {
            // Full scale of an arbitrary waveform spans one peak-to-peak amplitude.
            commands.push(Command::SetVoltageUnit(ch, VoltageUnit::Vpp));
            commands.push(Command::SetAmplitude(ch, 2.0 * peak));
        }
        if options.toggle_output {
            commands.push(Command::SetOutput(ch, true));
        }
        Ok(commands)
    }

    /// Upload through `session`. A failure stops the sequence; commands
    /// already sent stay in effect.
    pub async fn write_to_device(&self, session: &mut Session, options: &UploadOptions) -> Result<()> {
        let commands = self.commands(options)?;
        log::info!(
            "Uploading {} samples at {:?} Sa/s as {:?}",
            self.samples.len(),
            self.sample_rate,
            options.name
        );
        for command in commands {
            session.send(command).await?;
        }
        Ok(())
    }
}

/// Validate and format an upload without building a [`Waveform`] first.
pub fn upload_commands(
    samples: &[f64],
    sample_rate: f64,
    options: &UploadOptions,
) -> Result<Vec<Command>> {
    Ok(Waveform::new(samples, sample_rate)?.commands(options)?)
}

/// Format `samples` and send them. Nothing is sent if validation fails.
pub async fn write_samples(
    session: &mut Session,
    samples: &[f64],
    sample_rate: f64,
    options: &UploadOptions,
) -> Result<()> {
    Waveform::new(samples, sample_rate)?
        .write_to_device(session, options)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto::{block, ProtoError};

    fn wave(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (i as f64 * 0.37).sin() * 0.999)
            .collect()
    }

    #[tokio::test]
    async fn test_upload_sends_three_commands() {
        let (mut session, log) = Session::new_faked("");
        let waveform = Waveform::new(vec![0.0, 0.5, -0.5, 1.0], 1000.0).unwrap();
        waveform
            .write_to_device(&mut session, &UploadOptions::default())
            .await
            .unwrap();
        assert_eq!(
            log.lines(),
            vec![
                "FUNC:ARB:SRAT 1000.0",
                "DATA:ARB func,0.0,0.5,-0.5,1.0",
                "FUNC:ARB func",
            ]
        );
    }

    #[tokio::test]
    async fn test_large_binary_upload_is_one_write() {
        let (mut session, log) = Session::new_faked("");
        let waveform = Waveform::new(wave(600_000), 1e6).unwrap();
        waveform
            .write_to_device(&mut session, &UploadOptions::default())
            .await
            .unwrap();
        let writes = log.writes();
        assert_eq!(writes.len(), 3);
        let header = b"DATA:ARB func,#72400000";
        assert!(writes[1].starts_with(header));
        assert_eq!(writes[1].len(), header.len() + 2_400_000 + 1);
    }

    #[tokio::test]
    async fn test_empty_samples_send_nothing() {
        let (mut session, log) = Session::new_faked("");
        let result = write_samples(&mut session, &[], 1000.0, &UploadOptions::default()).await;
        assert!(matches!(
            result,
            Err(ProtoError::Validation(ValidationError::Empty))
        ));
        assert!(log.writes().is_empty());
    }

    #[tokio::test]
    async fn test_bad_sample_rate_sends_nothing() {
        let (mut session, log) = Session::new_faked("");
        for rate in [0.0, -1000.0, f64::NAN, f64::INFINITY] {
            let result =
                write_samples(&mut session, &[0.0, 1.0], rate, &UploadOptions::default()).await;
            assert!(matches!(
                result,
                Err(ProtoError::Validation(ValidationError::SampleRate(_)))
            ));
        }
        assert!(log.writes().is_empty());
    }

    #[test]
    fn test_non_finite_sample() {
        assert_eq!(
            Waveform::new(vec![0.0, f64::NAN], 10.0),
            Err(ValidationError::NonFinite { index: 1 })
        );
    }

    #[test]
    fn test_clip_out_of_range() {
        let waveform = Waveform::new(vec![2.0, -3.0, 0.25], 10.0).unwrap();
        assert_eq!(waveform.samples(), &[1.0, -1.0, 0.25]);
        assert_eq!(waveform.amplitude(), None);
    }

    #[test]
    fn test_from_volts_scales_by_peak() {
        let waveform = Waveform::from_volts(vec![0.0, 0.15, -0.3], 100e3).unwrap();
        assert_eq!(waveform.amplitude(), Some(0.3));
        assert_eq!(waveform.samples(), &[0.0, 0.5, -1.0]);
        assert_eq!(
            Waveform::from_volts(vec![0.0, 0.0], 1.0),
            Err(ValidationError::Flat)
        );
    }

    #[test]
    fn test_ascii_payload_round_trip() {
        let samples = wave(500);
        let commands = upload_commands(&samples, 2.5e6, &UploadOptions::default()).unwrap();
        let text = commands[1].to_string();
        let payload = text.strip_prefix("DATA:ARB func,").unwrap();
        let decoded: Vec<f64> = payload.split(',').map(|v| v.parse().unwrap()).collect();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_binary_payload_round_trip() {
        use bytes::BytesMut;
        use tokio_util::codec::Encoder;

        let samples = wave(ASCII_SAMPLE_LIMIT + 1);
        let commands = upload_commands(&samples, 1e6, &UploadOptions::default()).unwrap();
        assert_eq!(commands.len(), 3);

        let mut dst = BytesMut::new();
        crate::proto::codec::ScpiCodec::default()
            .encode(commands[1].clone(), &mut dst)
            .unwrap();
        let body = dst.strip_prefix(b"DATA:ARB func,".as_slice()).unwrap();
        let Some(block::BlockHeader::Definite { header, len }) =
            block::parse_header(body).unwrap()
        else {
            panic!("expected a definite-length block");
        };
        assert_eq!(len, samples.len() * 4);
        assert_eq!(body[header + len], b'\n');
        let decoded = block::decode_f32(&body[header..header + len], Endianness::Normal).unwrap();
        for (a, b) in decoded.iter().zip(&samples) {
            assert!((*a as f64 - b).abs() <= f32::EPSILON as f64);
        }
    }

    #[test]
    fn test_auto_format_threshold() {
        let options = UploadOptions::default();
        let ascii = upload_commands(&wave(ASCII_SAMPLE_LIMIT), 1.0, &options).unwrap();
        assert!(matches!(
            &ascii[1],
            Command::ArbData {
                payload: Payload::Ascii(_),
                ..
            }
        ));
        let binary = upload_commands(&wave(ASCII_SAMPLE_LIMIT + 1), 1.0, &options).unwrap();
        assert!(matches!(
            &binary[1],
            Command::ArbData {
                payload: Payload::Binary {
                    order: Endianness::Normal,
                    ..
                },
                ..
            }
        ));
    }

    #[test]
    fn test_full_sequence_with_options() {
        let waveform = Waveform::from_volts(vec![0.0, 0.1, -0.2], 100.0).unwrap();
        let options = UploadOptions::default()
            .with_name("pulse_1")
            .with_channel(2)
            .with_format(DataFormat::Binary(Endianness::Swapped))
            .with_toggle_output(true)
            .with_apply_amplitude(true);
        let text: Vec<String> = waveform
            .commands(&options)
            .unwrap()
            .iter()
            .map(|c| c.to_string())
            .collect();
        assert_eq!(
            text,
            vec![
                "OUTP2 OFF",
                "SOUR2:FUNC:ARB:SRAT 100.0",
                "FORM:BORD SWAP",
                "SOUR2:DATA:ARB pulse_1,#212",
                "FORM:BORD NORM",
                "SOUR2:FUNC:ARB pulse_1",
                "SOUR2:VOLT:UNIT VPP",
                "SOUR2:VOLT 0.4",
                "OUTP2 ON",
            ]
        );
    }

    #[test]
    fn test_invalid_names() {
        let waveform = Waveform::new(vec![0.0], 1.0).unwrap();
        for name in ["", "1st", "has space", "much_too_long_name", "ünicode"] {
            assert_eq!(
                waveform.commands(&UploadOptions::default().with_name(name)),
                Err(ValidationError::InvalidName(name.to_string()))
            );
        }
    }
}
