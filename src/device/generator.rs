//! Generator abstraction and the JDS6600 implementation

use std::time::Duration;

use tracing::{debug, instrument};

use super::protocol::{self, Channel, Waveform};
use super::transport::{SerialTransport, Transport};
use crate::error::{ControllerError, Result};

/// Operations the sequence runner needs from a signal generator
///
/// All setters validate their value before touching the device.
pub trait Generator: Send {
    /// Enable or disable the two outputs
    fn set_channels(&mut self, ch1: bool, ch2: bool) -> Result<()>;

    /// Current output enable state `(ch1, ch2)`
    fn get_channels(&mut self) -> Result<(bool, bool)>;

    fn set_frequency(&mut self, channel: Channel, hz: f64) -> Result<()>;
    fn get_frequency(&mut self, channel: Channel) -> Result<f64>;

    fn set_waveform(&mut self, channel: Channel, waveform: Waveform) -> Result<()>;
    fn get_waveform(&mut self, channel: Channel) -> Result<Waveform>;

    fn set_amplitude(&mut self, channel: Channel, volts: f64) -> Result<()>;
    fn get_amplitude(&mut self, channel: Channel) -> Result<f64>;

    fn set_offset(&mut self, channel: Channel, volts: f64) -> Result<()>;
    fn get_offset(&mut self, channel: Channel) -> Result<f64>;

    fn set_duty_cycle(&mut self, channel: Channel, percent: f64) -> Result<()>;
    fn get_duty_cycle(&mut self, channel: Channel) -> Result<f64>;

    /// Phase of CH2 relative to CH1 in degrees
    fn set_phase(&mut self, degrees: f64) -> Result<()>;

    /// Model identifier as reported by the device
    fn model(&mut self) -> Result<String>;
}

/// JDS6600 driver over any [`Transport`]
pub struct Jds6600<T: Transport> {
    transport: T,
    port: String,
}

impl Jds6600<SerialTransport> {
    /// Open the serial port and talk to the device on it
    ///
    /// # Errors
    ///
    /// Returns [`ControllerError::Serial`] when the port cannot be opened.
    pub fn open(port: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        let transport = SerialTransport::open(port, baud_rate, timeout)?;
        debug!(port, baud_rate, "opened serial port");
        Ok(Self::new(transport, port))
    }
}

impl<T: Transport> Jds6600<T> {
    pub fn new(transport: T, port: impl Into<String>) -> Self {
        Self {
            transport,
            port: port.into(),
        }
    }

    /// Name of the port this generator is attached to
    pub fn port(&self) -> &str {
        &self.port
    }

    #[instrument(level = "trace", skip(self))]
    fn write_register(&mut self, register: u8, args: &[String]) -> Result<()> {
        self.transport
            .write_line(&protocol::encode_write(register, args))?;
        let response = self.transport.read_line()?;
        if protocol::is_ok(&response) {
            Ok(())
        } else {
            Err(ControllerError::Protocol(format!(
                "write to register {:02} on {} was not acknowledged: '{}'",
                register, self.port, response
            )))
        }
    }

    #[instrument(level = "trace", skip(self))]
    fn read_register(&mut self, register: u8) -> Result<Vec<String>> {
        self.transport.write_line(&protocol::encode_read(register))?;
        let response = self.transport.read_line()?;
        protocol::parse_read_response(register, &response)
    }
}

impl<T: Transport> Generator for Jds6600<T> {
    fn set_channels(&mut self, ch1: bool, ch2: bool) -> Result<()> {
        self.write_register(
            protocol::REG_CHANNELS,
            &protocol::channels_to_wire(ch1, ch2),
        )
    }

    fn get_channels(&mut self) -> Result<(bool, bool)> {
        let values = self.read_register(protocol::REG_CHANNELS)?;
        protocol::channels_from_wire(&values)
    }

    fn set_frequency(&mut self, channel: Channel, hz: f64) -> Result<()> {
        let args = protocol::frequency_to_wire(hz)?;
        self.write_register(channel.register(protocol::REG_FREQUENCY), &args)
    }

    fn get_frequency(&mut self, channel: Channel) -> Result<f64> {
        let values = self.read_register(channel.register(protocol::REG_FREQUENCY))?;
        protocol::frequency_from_wire(&values)
    }

    fn set_waveform(&mut self, channel: Channel, waveform: Waveform) -> Result<()> {
        self.write_register(
            channel.register(protocol::REG_WAVEFORM),
            &[waveform.code().to_string()],
        )
    }

    fn get_waveform(&mut self, channel: Channel) -> Result<Waveform> {
        let register = channel.register(protocol::REG_WAVEFORM);
        let values = self.read_register(register)?;
        let code: u16 = protocol::field(&values, 0, register)?;
        Waveform::from_code(code).ok_or_else(|| {
            ControllerError::Protocol(format!("unknown waveform code {} on {}", code, channel))
        })
    }

    fn set_amplitude(&mut self, channel: Channel, volts: f64) -> Result<()> {
        let args = protocol::amplitude_to_wire(volts)?;
        self.write_register(channel.register(protocol::REG_AMPLITUDE), &args)
    }

    fn get_amplitude(&mut self, channel: Channel) -> Result<f64> {
        let values = self.read_register(channel.register(protocol::REG_AMPLITUDE))?;
        protocol::amplitude_from_wire(&values)
    }

    fn set_offset(&mut self, channel: Channel, volts: f64) -> Result<()> {
        let args = protocol::offset_to_wire(volts)?;
        self.write_register(channel.register(protocol::REG_OFFSET), &args)
    }

    fn get_offset(&mut self, channel: Channel) -> Result<f64> {
        let values = self.read_register(channel.register(protocol::REG_OFFSET))?;
        protocol::offset_from_wire(&values)
    }

    fn set_duty_cycle(&mut self, channel: Channel, percent: f64) -> Result<()> {
        let args = protocol::duty_to_wire(percent)?;
        self.write_register(channel.register(protocol::REG_DUTY), &args)
    }

    fn get_duty_cycle(&mut self, channel: Channel) -> Result<f64> {
        let values = self.read_register(channel.register(protocol::REG_DUTY))?;
        protocol::duty_from_wire(&values)
    }

    fn set_phase(&mut self, degrees: f64) -> Result<()> {
        let args = protocol::phase_to_wire(degrees)?;
        self.write_register(protocol::REG_PHASE, &args)
    }

    fn model(&mut self) -> Result<String> {
        let values = self.read_register(protocol::REG_MODEL)?;
        Ok(values.join(","))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::transport::MockTransport;
    use mockall::Sequence;

    fn expect_exchange(mock: &mut MockTransport, seq: &mut Sequence, request: &str, response: &str) {
        let request = request.to_string();
        mock.expect_write_line()
            .withf(move |line| line == request)
            .times(1)
            .in_sequence(seq)
            .returning(|_| Ok(()));
        let response = response.to_string();
        mock.expect_read_line()
            .times(1)
            .in_sequence(seq)
            .returning(move || Ok(response.clone()));
    }

    #[test]
    fn test_set_frequency_writes_register() {
        let mut mock = MockTransport::new();
        let mut seq = Sequence::new();
        expect_exchange(&mut mock, &mut seq, ":w24=123456,0.\r\n", ":ok");

        let mut dev = Jds6600::new(mock, "mock");
        dev.set_frequency(Channel::Two, 1234.56).unwrap();
    }

    #[test]
    fn test_get_channels_parses_response() {
        let mut mock = MockTransport::new();
        let mut seq = Sequence::new();
        expect_exchange(&mut mock, &mut seq, ":r20=0.\r\n", ":r20=1,0.");

        let mut dev = Jds6600::new(mock, "mock");
        assert_eq!(dev.get_channels().unwrap(), (true, false));
    }

    #[test]
    fn test_write_not_acknowledged() {
        let mut mock = MockTransport::new();
        let mut seq = Sequence::new();
        expect_exchange(&mut mock, &mut seq, ":w20=0,0.\r\n", ":err");

        let mut dev = Jds6600::new(mock, "mock");
        let err = dev.set_channels(false, false).unwrap_err();
        assert!(matches!(err, ControllerError::Protocol(_)));
    }

    #[test]
    fn test_out_of_range_never_reaches_device() {
        // No expectations: any transport call would panic
        let mock = MockTransport::new();
        let mut dev = Jds6600::new(mock, "mock");
        let err = dev.set_amplitude(Channel::One, 42.0).unwrap_err();
        assert!(matches!(err, ControllerError::OutOfRange { what: "amplitude", .. }));
    }

    #[test]
    fn test_waveform_round_trip_through_registers() {
        let mut mock = MockTransport::new();
        let mut seq = Sequence::new();
        expect_exchange(&mut mock, &mut seq, ":w21=103.\r\n", ":ok");
        expect_exchange(&mut mock, &mut seq, ":r22=0.\r\n", ":r22=1.");

        let mut dev = Jds6600::new(mock, "mock");
        dev.set_waveform(Channel::One, Waveform::Arbitrary(3)).unwrap();
        assert_eq!(dev.get_waveform(Channel::Two).unwrap(), Waveform::SQUARE);
    }

    #[test]
    fn test_transport_error_propagates() {
        let mut mock = MockTransport::new();
        mock.expect_write_line().returning(|_| {
            Err(ControllerError::Serial {
                port: "mock".to_string(),
                error: "timed out".to_string(),
            })
        });

        let mut dev = Jds6600::new(mock, "mock");
        assert!(matches!(
            dev.get_offset(Channel::One),
            Err(ControllerError::Serial { .. })
        ));
    }
}
