use std::fmt;
use std::str::FromStr;

use super::block::{self, Endianness};
use super::ProtoError;

/// Source channel of a multi-channel generator. `None` addresses the
/// instrument default and omits the channel suffix.
pub type Channel = Option<u8>;

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Free-form SCPI, sent verbatim.
    Raw(String),
    Identify,
    NextError,
    SetByteOrder(Endianness),
    // Output
    GetOutput(Channel),
    SetOutput(Channel, bool),
    // Function
    GetFunction(Channel),
    SetFunction(Channel, Function),
    // Voltage
    GetAmplitude(Channel),
    SetAmplitude(Channel, f64),
    SetVoltageUnit(Channel, VoltageUnit),
    GetOffset(Channel),
    SetOffset(Channel, f64),
    // Frequency
    GetFrequency(Channel),
    SetFrequency(Channel, f64),
    // Burst
    GetBurst(Channel),
    SetBurst(Channel, bool),
    GetBurstCycles(Channel),
    SetBurstCycles(Channel, BurstCycles),
    GetBurstPeriod(Channel),
    SetBurstPeriod(Channel, BurstPeriod),
    GetBurstMode(Channel),
    SetBurstMode(Channel, BurstMode),
    // Trigger
    GetTriggerSource(Channel),
    SetTriggerSource(Channel, TriggerSource),
    // Arbitrary waveforms
    ClearVolatile(Channel),
    SetArbSampleRate(Channel, f64),
    ArbData {
        channel: Channel,
        name: String,
        payload: Payload,
    },
    SelectArb(Channel, String),
}

/// Sample data of an arbitrary waveform upload.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Comma separated decimal values.
    Ascii(Vec<f64>),
    /// Definite-length block of single precision floats.
    Binary {
        samples: Vec<f64>,
        order: Endianness,
    },
}

impl Command {
    /// True if the instrument answers this command.
    pub fn is_query(&self) -> bool {
        match self {
            // Any message unit of a compound command whose header ends in `?`.
            Self::Raw(text) => text.split(';').any(|unit| {
                unit.split_whitespace()
                    .next()
                    .map_or(false, |header| header.ends_with('?'))
            }),
            Self::Identify
            | Self::NextError
            | Self::GetOutput(_)
            | Self::GetFunction(_)
            | Self::GetAmplitude(_)
            | Self::GetOffset(_)
            | Self::GetFrequency(_)
            | Self::GetBurst(_)
            | Self::GetBurstCycles(_)
            | Self::GetBurstPeriod(_)
            | Self::GetBurstMode(_)
            | Self::GetTriggerSource(_) => true,
            _ => false,
        }
    }
}

struct Source(Channel);

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.0 {
            Some(n) => write!(f, "SOUR{}:", n),
            None => Ok(()),
        }
    }
}

/// Program text preceding the sample payload of `DATA:ARB`.
pub(crate) fn arb_data_header(channel: Channel, name: &str) -> String {
    format!("{}DATA:ARB {},", Source(channel), name)
}

fn suffix(channel: Channel) -> String {
    channel.map(|n| n.to_string()).unwrap_or_default()
}

fn on_off(state: bool) -> &'static str {
    if state {
        "ON"
    } else {
        "OFF"
    }
}

/// SCPI program text of the command.
///
/// Binary payloads are abbreviated to their block header; the codec writes
/// the actual bytes.
impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Raw(text) => f.write_str(text),
            Self::Identify => f.write_str("*IDN?"),
            Self::NextError => f.write_str("SYST:ERR?"),
            Self::SetByteOrder(order) => write!(f, "FORM:BORD {}", order.scpi()),
            Self::GetOutput(ch) => write!(f, "OUTP{}?", suffix(*ch)),
            Self::SetOutput(ch, state) => write!(f, "OUTP{} {}", suffix(*ch), on_off(*state)),
            Self::GetFunction(ch) => write!(f, "{}FUNC?", Source(*ch)),
            Self::SetFunction(ch, func) => write!(f, "{}FUNC {}", Source(*ch), func.scpi()),
            Self::GetAmplitude(ch) => write!(f, "{}VOLT?", Source(*ch)),
            Self::SetAmplitude(ch, volts) => write!(f, "{}VOLT {:?}", Source(*ch), volts),
            Self::SetVoltageUnit(ch, unit) => {
                write!(f, "{}VOLT:UNIT {}", Source(*ch), unit.scpi())
            }
            Self::GetOffset(ch) => write!(f, "{}VOLT:OFFS?", Source(*ch)),
            Self::SetOffset(ch, volts) => write!(f, "{}VOLT:OFFS {:?}", Source(*ch), volts),
            Self::GetFrequency(ch) => write!(f, "{}FREQ?", Source(*ch)),
            Self::SetFrequency(ch, hz) => write!(f, "{}FREQ {:?}", Source(*ch), hz),
            Self::GetBurst(ch) => write!(f, "{}BURS:STAT?", Source(*ch)),
            Self::SetBurst(ch, state) => {
                write!(f, "{}BURS:STAT {}", Source(*ch), on_off(*state))
            }
            Self::GetBurstCycles(ch) => write!(f, "{}BURS:NCYC?", Source(*ch)),
            Self::SetBurstCycles(ch, cycles) => write!(f, "{}BURS:NCYC {}", Source(*ch), cycles),
            Self::GetBurstPeriod(ch) => write!(f, "{}BURS:INT:PER?", Source(*ch)),
            Self::SetBurstPeriod(ch, period) => {
                write!(f, "{}BURS:INT:PER {}", Source(*ch), period)
            }
            Self::GetBurstMode(ch) => write!(f, "{}BURS:MODE?", Source(*ch)),
            Self::SetBurstMode(ch, mode) => write!(f, "{}BURS:MODE {}", Source(*ch), mode.scpi()),
            Self::GetTriggerSource(ch) => write!(f, "TRIG{}:SOUR?", suffix(*ch)),
            Self::SetTriggerSource(ch, source) => {
                write!(f, "TRIG{}:SOUR {}", suffix(*ch), source.scpi())
            }
            Self::ClearVolatile(ch) => write!(f, "{}DATA:VOL:CLE", Source(*ch)),
            Self::SetArbSampleRate(ch, rate) => write!(f, "{}FUNC:ARB:SRAT {:?}", Source(*ch), rate),
            Self::ArbData {
                channel,
                name,
                payload,
            } => {
                f.write_str(&arb_data_header(*channel, name))?;
                match payload {
                    Payload::Ascii(samples) => {
                        for (i, sample) in samples.iter().enumerate() {
                            if i > 0 {
                                f.write_str(",")?;
                            }
                            write!(f, "{:?}", sample)?;
                        }
                        Ok(())
                    }
                    Payload::Binary { samples, .. } => match block::header(samples.len() * 4) {
                        Ok(header) => f.write_str(&header),
                        Err(_) => write!(f, "<{} bytes>", samples.len() * 4),
                    },
                }
            }
            Self::SelectArb(ch, name) => write!(f, "{}FUNC:ARB {}", Source(*ch), name),
        }
    }
}

/// Match a SCPI mnemonic in either its short or long form, ignoring case.
fn mnemonic(input: &str, short: &str, long: &str) -> bool {
    let input = input.trim();
    input.eq_ignore_ascii_case(short) || input.eq_ignore_ascii_case(long)
}

/// Output function shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Sine,
    Square,
    Ramp,
    Pulse,
    Triangle,
    Noise,
    Prbs,
    Arbitrary,
}

impl Function {
    pub fn scpi(&self) -> &'static str {
        match self {
            Self::Sine => "SIN",
            Self::Square => "SQU",
            Self::Ramp => "RAMP",
            Self::Pulse => "PULS",
            Self::Triangle => "TRI",
            Self::Noise => "NOIS",
            Self::Prbs => "PRBS",
            Self::Arbitrary => "ARB",
        }
    }
}

impl FromStr for Function {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            (Self::Sine, "SINUSOID"),
            (Self::Square, "SQUARE"),
            (Self::Ramp, "RAMP"),
            (Self::Pulse, "PULSE"),
            (Self::Triangle, "TRIANGLE"),
            (Self::Noise, "NOISE"),
            (Self::Prbs, "PRBS"),
            (Self::Arbitrary, "ARBITRARY"),
        ]
        .into_iter()
        .find(|(func, long)| mnemonic(s, func.scpi(), long))
        .map(|(func, _)| func)
        .ok_or_else(|| ProtoError::InvalidValue(format!("function {:?}", s)))
    }
}

/// Amplitude units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoltageUnit {
    #[default]
    Vpp,
    Vrms,
    Dbm,
}

impl VoltageUnit {
    pub fn scpi(&self) -> &'static str {
        match self {
            Self::Vpp => "VPP",
            Self::Vrms => "VRMS",
            Self::Dbm => "DBM",
        }
    }
}

impl FromStr for VoltageUnit {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "VPP" => Ok(Self::Vpp),
            "VRMS" => Ok(Self::Vrms),
            "DBM" => Ok(Self::Dbm),
            _ => Err(ProtoError::InvalidUnits(s.to_string())),
        }
    }
}

/// Cycles per burst.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BurstCycles {
    Count(u32),
    Infinity,
    Minimum,
    Maximum,
}

impl fmt::Display for BurstCycles {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Count(n) => write!(f, "{}", n),
            Self::Infinity => f.write_str("INF"),
            Self::Minimum => f.write_str("MIN"),
            Self::Maximum => f.write_str("MAX"),
        }
    }
}

/// Instruments report an infinite count as 9.9E+37.
const SCPI_INFINITY: f64 = 9.9e37;

impl FromStr for BurstCycles {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if mnemonic(s, "INF", "INFINITY") {
            Ok(Self::Infinity)
        } else if mnemonic(s, "MIN", "MINIMUM") {
            Ok(Self::Minimum)
        } else if mnemonic(s, "MAX", "MAXIMUM") {
            Ok(Self::Maximum)
        } else {
            let value = s
                .trim()
                .parse::<f64>()
                .map_err(|_| ProtoError::InvalidValue(format!("burst cycles {:?}", s)))?;
            if value >= SCPI_INFINITY {
                Ok(Self::Infinity)
            } else if value >= 0.0 && value <= u32::MAX as f64 {
                Ok(Self::Count(value.round() as u32))
            } else {
                Err(ProtoError::InvalidValue(format!("burst cycles {:?}", s)))
            }
        }
    }
}

/// Internal burst period.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum BurstPeriod {
    Seconds(f64),
    Minimum,
    Maximum,
}

impl fmt::Display for BurstPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Seconds(s) => write!(f, "{:?}", s),
            Self::Minimum => f.write_str("MIN"),
            Self::Maximum => f.write_str("MAX"),
        }
    }
}

impl FromStr for BurstPeriod {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if mnemonic(s, "MIN", "MINIMUM") {
            Ok(Self::Minimum)
        } else if mnemonic(s, "MAX", "MAXIMUM") {
            Ok(Self::Maximum)
        } else {
            s.trim()
                .parse::<f64>()
                .map(Self::Seconds)
                .map_err(|_| ProtoError::InvalidValue(format!("burst period {:?}", s)))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BurstMode {
    Triggered,
    Gated,
}

impl BurstMode {
    pub fn scpi(&self) -> &'static str {
        match self {
            Self::Triggered => "TRIG",
            Self::Gated => "GAT",
        }
    }
}

impl FromStr for BurstMode {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if mnemonic(s, "TRIG", "TRIGGERED") {
            Ok(Self::Triggered)
        } else if mnemonic(s, "GAT", "GATED") {
            Ok(Self::Gated)
        } else {
            Err(ProtoError::InvalidValue(format!(
                "{:?} is not a valid burst mode, expected triggered or gated",
                s
            )))
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerSource {
    Immediate,
    External,
    Timer,
    Bus,
}

impl TriggerSource {
    pub fn scpi(&self) -> &'static str {
        match self {
            Self::Immediate => "IMM",
            Self::External => "EXT",
            Self::Timer => "TIM",
            Self::Bus => "BUS",
        }
    }
}

impl FromStr for TriggerSource {
    type Err = ProtoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        [
            (Self::Immediate, "IMMEDIATE"),
            (Self::External, "EXTERNAL"),
            (Self::Timer, "TIMER"),
            (Self::Bus, "BUS"),
        ]
        .into_iter()
        .find(|(source, long)| mnemonic(s, source.scpi(), long))
        .map(|(source, _)| source)
        .ok_or_else(|| ProtoError::InvalidValue(format!("trigger source {:?}", s)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_prefix() {
        assert_eq!(Command::GetFrequency(None).to_string(), "FREQ?");
        assert_eq!(Command::GetFrequency(Some(2)).to_string(), "SOUR2:FREQ?");
        assert_eq!(Command::SetOutput(Some(1), true).to_string(), "OUTP1 ON");
        assert_eq!(Command::SetOutput(None, false).to_string(), "OUTP OFF");
        assert_eq!(
            Command::SetTriggerSource(Some(1), TriggerSource::Bus).to_string(),
            "TRIG1:SOUR BUS"
        );
    }

    #[test]
    fn test_arb_commands() {
        assert_eq!(
            Command::SetArbSampleRate(None, 1000.0).to_string(),
            "FUNC:ARB:SRAT 1000.0"
        );
        let data = Command::ArbData {
            channel: None,
            name: "func".into(),
            payload: Payload::Ascii(vec![0.0, 0.5, -0.5, 1.0]),
        };
        assert_eq!(data.to_string(), "DATA:ARB func,0.0,0.5,-0.5,1.0");
        let data = Command::ArbData {
            channel: Some(1),
            name: "func".into(),
            payload: Payload::Binary {
                samples: vec![0.0; 300],
                order: Endianness::Normal,
            },
        };
        assert_eq!(data.to_string(), "SOUR1:DATA:ARB func,#41200");
        assert_eq!(
            Command::SelectArb(None, "func".into()).to_string(),
            "FUNC:ARB func"
        );
    }

    #[test]
    fn test_is_query() {
        assert!(Command::Identify.is_query());
        assert!(Command::Raw("*OPC? ".into()).is_query());
        assert!(Command::Raw("DATA:ARB? func".into()).is_query());
        assert!(Command::Raw("*CLS;*OPC?".into()).is_query());
        assert!(!Command::Raw("*RST".into()).is_query());
        assert!(!Command::Raw("DATA:ARB func,0.5".into()).is_query());
        assert!(!Command::SetBurst(None, true).is_query());
    }

    #[test]
    fn test_parse_mnemonics() {
        assert_eq!("sin".parse::<Function>().unwrap(), Function::Sine);
        assert_eq!("SQUARE".parse::<Function>().unwrap(), Function::Square);
        assert_eq!("ARB\n".parse::<Function>().unwrap(), Function::Arbitrary);
        assert!("saw".parse::<Function>().is_err());

        assert_eq!("vrms".parse::<VoltageUnit>().unwrap(), VoltageUnit::Vrms);
        assert!(matches!(
            "volts".parse::<VoltageUnit>(),
            Err(ProtoError::InvalidUnits(_))
        ));

        assert_eq!("gated".parse::<BurstMode>().unwrap(), BurstMode::Gated);
        assert!("free".parse::<BurstMode>().is_err());
        assert_eq!(
            "EXT".parse::<TriggerSource>().unwrap(),
            TriggerSource::External
        );
    }

    #[test]
    fn test_parse_burst_values() {
        assert_eq!(
            "+5.000000000000000E+00".parse::<BurstCycles>().unwrap(),
            BurstCycles::Count(5)
        );
        assert_eq!(
            "9.9E+37".parse::<BurstCycles>().unwrap(),
            BurstCycles::Infinity
        );
        assert_eq!("inf".parse::<BurstCycles>().unwrap(), BurstCycles::Infinity);
        assert!("-3".parse::<BurstCycles>().is_err());
        assert_eq!(BurstCycles::Maximum.to_string(), "MAX");

        assert_eq!(
            "1.0E-02".parse::<BurstPeriod>().unwrap(),
            BurstPeriod::Seconds(0.01)
        );
        assert_eq!("min".parse::<BurstPeriod>().unwrap(), BurstPeriod::Minimum);
    }
}
