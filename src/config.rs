//! Settings used to open a cable and drive the TAP reset sequence.
use core::str::FromStr;

use crate::error::InvalidConfig;

/// FTDI vendor id
pub const DEFAULT_VENDOR: u16 = 0x0403;
/// FT4232H product id
pub const DEFAULT_PRODUCT: u16 = 0x6011;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JtagConfig {
    /// USB vendor id of the interface chip
    pub vendor: u16,
    /// USB product id of the interface chip
    pub product: u16,
    /// Which interface (channel) of a multi-channel chip to use, or which matching device to
    /// open when several are attached
    pub interface: u8,
    /// Requested TCK frequency in hertz.  The chip may only be able to approximate it.
    pub frequency: u32,
    /// Drive the first high-byte GPIO pin as an output set to 1 after opening
    pub high_reset: bool,
    /// How long to hold each edge of the TRST pulse, in milliseconds
    pub reset_settle_ms: u32,
}

impl Default for JtagConfig {
    fn default() -> Self {
        Self {
            vendor: DEFAULT_VENDOR,
            product: DEFAULT_PRODUCT,
            interface: 0,
            frequency: 3_000_000,
            high_reset: false,
            reset_settle_ms: 100,
        }
    }
}

impl JtagConfig {
    pub fn with_device(mut self, vendor: u16, product: u16) -> Self {
        self.vendor = vendor;
        self.product = product;
        self
    }

    pub fn with_interface(mut self, interface: u8) -> Self {
        self.interface = interface;
        self
    }

    pub fn with_frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_high_reset(mut self, high_reset: bool) -> Self {
        self.high_reset = high_reset;
        self
    }

    pub fn with_reset_settle_ms(mut self, ms: u32) -> Self {
        self.reset_settle_ms = ms;
        self
    }
}

fn parse_frequency(s: &str) -> Option<u32> {
    let (digits, scale) = match s.as_bytes().last()? {
        b'k' | b'K' => (&s[..s.len() - 1], 1_000),
        b'M' => (&s[..s.len() - 1], 1_000_000),
        _ => (s, 1),
    };
    digits.parse::<u32>().ok()?.checked_mul(scale)
}

/// Parse `VID:PID[:INTERFACE][@FREQUENCY]`, e.g. `0403:6010:1@6M`.  Ids are hexadecimal, the
/// frequency is in hertz and may carry a `k` or `M` suffix.  Omitted fields keep their defaults.
impl FromStr for JtagConfig {
    type Err = InvalidConfig;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || InvalidConfig(s.into());
        let mut config = JtagConfig::default();

        let (device, frequency) = match s.split_once('@') {
            Some((device, frequency)) => (device, Some(frequency)),
            None => (s, None),
        };
        if let Some(frequency) = frequency {
            config.frequency = parse_frequency(frequency).ok_or_else(invalid)?;
        }

        let mut fields = device.split(':');
        let vendor = fields.next().ok_or_else(invalid)?;
        let product = fields.next().ok_or_else(invalid)?;
        config.vendor = u16::from_str_radix(vendor, 16).map_err(|_| invalid())?;
        config.product = u16::from_str_radix(product, 16).map_err(|_| invalid())?;
        if let Some(interface) = fields.next() {
            config.interface = interface.parse().map_err(|_| invalid())?;
        }
        if fields.next().is_some() {
            return Err(invalid());
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parse_full() {
        let config: JtagConfig = "0403:6010:1@6M".parse().unwrap();
        assert_eq!(
            config,
            JtagConfig::default()
                .with_device(0x0403, 0x6010)
                .with_interface(1)
                .with_frequency(6_000_000)
        );
    }

    #[test]
    fn parse_partial() {
        let config: JtagConfig = "0403:6014".parse().unwrap();
        assert_eq!(config.product, 0x6014);
        assert_eq!(config.interface, 0);
        assert_eq!(config.frequency, 3_000_000);

        let config: JtagConfig = "0403:6011@500k".parse().unwrap();
        assert_eq!(config.frequency, 500_000);
    }

    #[test]
    fn parse_rejects_garbage() {
        for s in ["", "0403", "0403:zz", "0403:6011:1:2", "0403:6011@", "0403:6011@fast"] {
            assert!(s.parse::<JtagConfig>().is_err(), "{}", s);
        }
    }
}
