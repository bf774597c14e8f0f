//! Settings text.
//!
//! The settings of a port serialize to a flat list of elements, one per
//! line, listing only values that differ from the defaults:
//!
//! ```text
//! <Port>1-4</Port>
//! <BaudRate>115200</BaudRate>
//! <StopBits>2</StopBits>
//! <Parity>2</Parity>
//! <DataBits>7</DataBits>
//! ```
//!
//! Stop bits and parity are stored as ordinals. Tag names are matched
//! without regard to case when parsing; missing tags mean the default.

use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::config::LineConfiguration;
use crate::error::{Error, Result};
use crate::types::{BaudRate, DataBits, Parity, StopBits};

const PORT: &str = "Port";
const BAUD_RATE: &str = "BaudRate";
const STOP_BITS: &str = "StopBits";
const PARITY: &str = "Parity";
const DATA_BITS: &str = "DataBits";

/// The persisted part of a port's configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct PortSettings {
    /// Port name, `None` when no port is selected.
    pub port: Option<String>,
    /// Baud rate.
    pub baud_rate: BaudRate,
    /// Stop bits.
    pub stop_bits: StopBits,
    /// Parity.
    pub parity: Parity,
    /// Data bits.
    pub data_bits: DataBits,
}

impl PortSettings {
    /// Take the persisted fields from a line configuration.
    pub fn from_config(port: Option<&str>, config: &LineConfiguration) -> Self {
        Self {
            port: port.map(str::to_string),
            baud_rate: config.baud_rate,
            stop_bits: config.stop_bits,
            parity: config.parity,
            data_bits: config.data_bits,
        }
    }

    /// Overwrite the persisted fields of `config`.
    pub fn apply(&self, config: LineConfiguration) -> LineConfiguration {
        config
            .baud_rate(self.baud_rate)
            .stop_bits(self.stop_bits)
            .parity(self.parity)
            .data_bits(self.data_bits)
    }

    /// Serialize, omitting defaults.
    ///
    /// ```
    /// use uartbridge::{BaudRate, PortSettings};
    ///
    /// let settings = PortSettings {
    ///     baud_rate: BaudRate::Baud115200,
    ///     ..Default::default()
    /// };
    /// assert_eq!(settings.to_xml().unwrap(), "<BaudRate>115200</BaudRate>\n");
    /// ```
    pub fn to_xml(&self) -> Result<String> {
        let defaults = Self::default();
        let mut writer = Writer::new(Vec::new());
        if let Some(port) = &self.port {
            write_element(&mut writer, PORT, port)?;
        }
        if self.baud_rate != defaults.baud_rate {
            write_element(&mut writer, BAUD_RATE, &self.baud_rate.value().to_string())?;
        }
        if self.stop_bits != defaults.stop_bits {
            write_element(&mut writer, STOP_BITS, &self.stop_bits.ordinal().to_string())?;
        }
        if self.parity != defaults.parity {
            write_element(&mut writer, PARITY, &self.parity.ordinal().to_string())?;
        }
        if self.data_bits != defaults.data_bits {
            write_element(&mut writer, DATA_BITS, &self.data_bits.value().to_string())?;
        }
        String::from_utf8(writer.into_inner()).map_err(write_error)
    }

    /// Parse settings text. Unknown tags are skipped.
    ///
    /// The port name is kept exactly as written, surrounding whitespace
    /// included; numeric values may be padded.
    pub fn parse(text: &str) -> Result<Self> {
        let mut settings = Self::default();
        let mut reader = Reader::from_str(text);

        let mut buf = Vec::new();
        // Open element and the text collected inside it so far.
        let mut current: Option<(String, String)> = None;
        loop {
            match reader.read_event_into(&mut buf)? {
                Event::Start(ref e) => {
                    let tag = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                    current = Some((tag, String::new()));
                }
                Event::Empty(ref e) => {
                    settings.set(&String::from_utf8_lossy(e.name().as_ref()), "")?;
                    current = None;
                }
                Event::Text(ref e) => {
                    if let Some((_, value)) = &mut current {
                        value.push_str(&e.unescape()?);
                    }
                }
                Event::End(_) => {
                    if let Some((tag, value)) = current.take() {
                        settings.set(&tag, &value)?;
                    }
                }
                Event::Eof => break,
                _ => {}
            }
            buf.clear();
        }
        Ok(settings)
    }

    fn set(&mut self, tag: &str, value: &str) -> Result<()> {
        if tag.eq_ignore_ascii_case(PORT) {
            self.port = Some(value.to_string());
        } else if tag.eq_ignore_ascii_case(BAUD_RATE) {
            self.baud_rate = BaudRate::from_value(number(tag, value)?)
                .ok_or_else(|| invalid(tag, value))?;
        } else if tag.eq_ignore_ascii_case(STOP_BITS) {
            self.stop_bits = StopBits::from_ordinal(number(tag, value)?)
                .ok_or_else(|| invalid(tag, value))?;
        } else if tag.eq_ignore_ascii_case(PARITY) {
            self.parity =
                Parity::from_ordinal(number(tag, value)?).ok_or_else(|| invalid(tag, value))?;
        } else if tag.eq_ignore_ascii_case(DATA_BITS) {
            self.data_bits =
                DataBits::try_from(number::<u8>(tag, value)?).map_err(|_| invalid(tag, value))?;
        }
        Ok(())
    }
}

fn write_element(writer: &mut Writer<Vec<u8>>, tag: &str, text: &str) -> Result<()> {
    writer
        .write_event(Event::Start(BytesStart::new(tag)))
        .map_err(write_error)?;
    writer
        .write_event(Event::Text(BytesText::new(text)))
        .map_err(write_error)?;
    writer
        .write_event(Event::End(BytesEnd::new(tag)))
        .map_err(write_error)?;
    writer.get_mut().push(b'\n');
    Ok(())
}

fn write_error(e: impl std::fmt::Display) -> Error {
    Error::Settings(e.to_string())
}

fn number<T: std::str::FromStr>(tag: &str, value: &str) -> Result<T> {
    value.trim().parse().map_err(|_| invalid(tag, value))
}

fn invalid(tag: &str, value: &str) -> Error {
    Error::Settings(format!("invalid {tag} value '{value}'"))
}
