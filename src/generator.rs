use crate::proto::command::{
    BurstCycles, BurstMode, BurstPeriod, Channel, Command, Function, TriggerSource, VoltageUnit,
};
use crate::proto::response::{parse_bool, parse_f64, Ident, SystemError};
use crate::proto::{ProtoError, Result};
use crate::session::{Session, SessionOptions};
use crate::waveform::{UploadOptions, Waveform};
use crate::DEFAULT_CHANNEL;

/// Upper bound of error queue entries read by one [`FunctionGenerator::check_errors`].
const MAX_QUEUED_ERRORS: usize = 32;

/// Typed access to one channel of a SCPI function generator.
pub struct FunctionGenerator {
    session: Session,
    channel: u8,
}

impl FunctionGenerator {
    pub async fn open(address: impl AsRef<str>, options: SessionOptions) -> Result<Self> {
        Ok(Self::new(Session::open(address, options).await?))
    }

    pub fn new(session: Session) -> Self {
        Self {
            session,
            channel: DEFAULT_CHANNEL,
        }
    }

    pub fn with_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn channel(&self) -> u8 {
        self.channel
    }

    pub fn set_channel(&mut self, channel: u8) {
        self.channel = channel;
    }

    pub fn session(&mut self) -> &mut Session {
        &mut self.session
    }

    pub fn into_session(self) -> Session {
        self.session
    }

    fn ch(&self) -> Channel {
        Some(self.channel)
    }

    pub async fn write(&mut self, command: impl AsRef<str>) -> Result<()> {
        self.session.write(command).await
    }

    pub async fn query(&mut self, command: impl AsRef<str>) -> Result<String> {
        self.session.query(command).await
    }

    pub async fn id(&mut self) -> Result<Ident> {
        self.session.query_command(Command::Identify).await?.parse()
    }

    pub async fn output(&mut self) -> Result<bool> {
        let ch = self.ch();
        parse_bool(&self.session.query_command(Command::GetOutput(ch)).await?)
    }

    pub async fn set_output(&mut self, enabled: bool) -> Result<()> {
        let ch = self.ch();
        self.session.send(Command::SetOutput(ch, enabled)).await
    }

    pub async fn function(&mut self) -> Result<Function> {
        let ch = self.ch();
        self.session
            .query_command(Command::GetFunction(ch))
            .await?
            .parse()
    }

    pub async fn set_function(&mut self, function: Function) -> Result<()> {
        let ch = self.ch();
        self.session.send(Command::SetFunction(ch, function)).await
    }

    /// Amplitude in the currently selected unit.
    pub async fn amplitude(&mut self) -> Result<f64> {
        let ch = self.ch();
        parse_f64(&self.session.query_command(Command::GetAmplitude(ch)).await?)
    }

    pub async fn set_amplitude(&mut self, amplitude: f64, unit: VoltageUnit) -> Result<()> {
        let ch = self.ch();
        self.session.send(Command::SetVoltageUnit(ch, unit)).await?;
        self.session.send(Command::SetAmplitude(ch, amplitude)).await
    }

    pub async fn offset(&mut self) -> Result<f64> {
        let ch = self.ch();
        parse_f64(&self.session.query_command(Command::GetOffset(ch)).await?)
    }

    /// DC offset in volts.
    pub async fn set_offset(&mut self, offset: f64) -> Result<()> {
        let ch = self.ch();
        self.session.send(Command::SetOffset(ch, offset)).await
    }

    pub async fn frequency(&mut self) -> Result<f64> {
        let ch = self.ch();
        parse_f64(&self.session.query_command(Command::GetFrequency(ch)).await?)
    }

    pub async fn set_frequency(&mut self, frequency: f64) -> Result<()> {
        if !(frequency.is_finite() && frequency > 0.0) {
            return Err(ProtoError::InvalidValue(format!("frequency {}", frequency)));
        }
        let ch = self.ch();
        self.session.send(Command::SetFrequency(ch, frequency)).await
    }

    pub async fn burst(&mut self) -> Result<bool> {
        let ch = self.ch();
        parse_bool(&self.session.query_command(Command::GetBurst(ch)).await?)
    }

    pub async fn set_burst(&mut self, enabled: bool) -> Result<()> {
        let ch = self.ch();
        self.session.send(Command::SetBurst(ch, enabled)).await
    }

    pub async fn ncycles(&mut self) -> Result<BurstCycles> {
        let ch = self.ch();
        self.session
            .query_command(Command::GetBurstCycles(ch))
            .await?
            .parse()
    }

    pub async fn set_ncycles(&mut self, cycles: BurstCycles) -> Result<()> {
        let ch = self.ch();
        self.session.send(Command::SetBurstCycles(ch, cycles)).await
    }

    pub async fn burst_period(&mut self) -> Result<BurstPeriod> {
        let ch = self.ch();
        self.session
            .query_command(Command::GetBurstPeriod(ch))
            .await?
            .parse()
    }

    pub async fn set_burst_period(&mut self, period: BurstPeriod) -> Result<()> {
        let ch = self.ch();
        self.session.send(Command::SetBurstPeriod(ch, period)).await
    }

    pub async fn burst_mode(&mut self) -> Result<BurstMode> {
        let ch = self.ch();
        self.session
            .query_command(Command::GetBurstMode(ch))
            .await?
            .parse()
    }

    pub async fn set_burst_mode(&mut self, mode: BurstMode) -> Result<()> {
        let ch = self.ch();
        self.session.send(Command::SetBurstMode(ch, mode)).await
    }

    pub async fn trigger_source(&mut self) -> Result<TriggerSource> {
        let ch = self.ch();
        self.session
            .query_command(Command::GetTriggerSource(ch))
            .await?
            .parse()
    }

    pub async fn set_trigger_source(&mut self, source: TriggerSource) -> Result<()> {
        let ch = self.ch();
        self.session
            .send(Command::SetTriggerSource(ch, source))
            .await
    }

    /// Delete all user waveforms from volatile memory.
    pub async fn clear_volatile(&mut self) -> Result<()> {
        let ch = self.ch();
        self.session.send(Command::ClearVolatile(ch)).await
    }

    /// Pop one entry of the error queue.
    pub async fn next_error(&mut self) -> Result<SystemError> {
        self.session
            .query_command(Command::NextError)
            .await?
            .parse()
    }

    /// Drain the error queue and fail with its first entry, if any.
    pub async fn check_errors(&mut self) -> Result<()> {
        let mut first = None;
        for _ in 0..MAX_QUEUED_ERRORS {
            let entry = self.next_error().await?;
            if !entry.is_error() {
                break;
            }
            log::warn!("{}: error {} {:?}", self.session.resource(), entry.code, entry.message);
            first.get_or_insert(entry);
        }
        match first {
            Some(entry) => Err(entry.into()),
            None => Ok(()),
        }
    }

    /// Upload `waveform` to this channel unless `options` names another.
    pub async fn upload(&mut self, waveform: &Waveform, options: &UploadOptions) -> Result<()> {
        let mut options = options.clone();
        options.channel = options.channel.or(self.ch());
        waveform.write_to_device(&mut self.session, &options).await
    }

    pub async fn close(&mut self) -> Result<()> {
        self.session.close().await
    }
}
