//! Baud rate divisor encoding for FTDI chips.
//!
//! FTDI BM/R-type chips derive the baud rate from a 48 MHz clock with a
//! 16x predivisor and a divisor that carries 3 fractional bits. The
//! fractional part is not stored in binary; it goes through the
//! [`FRAC_CODE`] lookup before landing in bits 14..=16 of the encoded
//! divisor.

use crate::constants::ftdi::C_CLK;

/// The result of a baud rate conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct BaudRateResult {
    /// The nearest achievable baud rate.
    pub actual: u32,
    /// The `value` field for the `SIO_SET_BAUDRATE_REQUEST` control transfer.
    pub value: u16,
    /// The `index` field for the `SIO_SET_BAUDRATE_REQUEST` control transfer.
    pub index: u16,
}

/// Fractional code lookup table: maps 3-bit sub-divisor to FTDI encoding.
const FRAC_CODE: [u32; 8] = [0, 3, 2, 4, 1, 5, 6, 7];

/// Compute encoded divisor and actual baud rate for a given clock and predivisor.
fn clkbits(baudrate: u32, clk: u32, clk_div: u32) -> (u32, u64) {
    if baudrate >= clk / clk_div {
        return (clk / clk_div, 0);
    }
    if baudrate >= clk / (clk_div + clk_div / 2) {
        return (clk / (clk_div + clk_div / 2), 1);
    }
    if baudrate >= clk / (2 * clk_div) {
        return (clk / (2 * clk_div), 2);
    }

    // Divide by 16 to get 3 fractional bits and one bit for rounding
    let divisor = clk * 16 / clk_div / baudrate;
    let best_divisor = if divisor & 1 != 0 {
        divisor / 2 + 1
    } else {
        divisor / 2
    };
    // 0x20000 itself is a valid divisor; only values above it are clamped.
    let best_divisor = if best_divisor > 0x20000 {
        0x1FFFF
    } else {
        best_divisor
    };

    let mut best_baud = clk * 16 / clk_div / best_divisor;
    if best_baud & 1 != 0 {
        best_baud = best_baud / 2 + 1;
    } else {
        best_baud /= 2;
    }

    let encoded =
        ((best_divisor >> 3) as u64) | (FRAC_CODE[(best_divisor & 0x7) as usize] as u64) << 14;

    (best_baud, encoded)
}

/// Convert a requested baud rate to FTDI register values.
///
/// Returns the nearest achievable baud rate and the `value`/`index` fields
/// for the `SIO_SET_BAUDRATE_REQUEST` vendor control transfer, or `None`
/// for a zero rate.
pub(crate) fn convert_baudrate(baudrate: u32) -> Option<BaudRateResult> {
    if baudrate == 0 {
        return None;
    }

    let (actual, encoded) = clkbits(baudrate, C_CLK, 16);
    if actual == 0 {
        return None;
    }

    Some(BaudRateResult {
        actual,
        value: (encoded & 0xFFFF) as u16,
        index: (encoded >> 16) as u16,
    })
}

/// Whether `actual` is within ~5% of `requested`.
pub(crate) fn within_tolerance(requested: u32, actual: u32) -> bool {
    let (requested, actual) = (requested as u64, actual as u64);
    if actual * 2 < requested {
        return false;
    }
    if actual < requested {
        actual * 21 >= requested * 20
    } else {
        requested * 21 >= actual * 20
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bm_9600() {
        let r = convert_baudrate(9600).unwrap();
        assert_eq!(r.actual, 9600);
        assert_eq!(r.value, 0x4138);
        assert_eq!(r.index, 0);
    }

    #[test]
    fn standard_low_rates_match_register_table() {
        let table = [
            (300, 0x2710),
            (600, 0x1388),
            (1200, 0x09C4),
            (2400, 0x04E2),
            (4800, 0x0271),
            (19200, 0x809C),
            (38400, 0xC04E),
        ];
        for (baud, value) in table {
            let r = convert_baudrate(baud).unwrap();
            assert_eq!(r.value, value, "baud {baud}");
            assert_eq!(r.actual, baud);
        }
    }

    #[test]
    fn bm_115200() {
        let r = convert_baudrate(115200).unwrap();
        assert!(
            within_tolerance(115200, r.actual),
            "actual={} should be within 5% of 115200",
            r.actual
        );
    }

    #[test]
    fn bm_3000000_max() {
        // 48MHz / 16 = 3,000,000, the maximum for BM-type
        let r = convert_baudrate(3_000_000).unwrap();
        assert_eq!(r.actual, 3_000_000);
        assert_eq!(r.value, 0);
    }

    #[test]
    fn zero_returns_none() {
        assert!(convert_baudrate(0).is_none());
    }

    #[test]
    fn very_low_baud_clamped() {
        let r = convert_baudrate(1).unwrap();
        assert!(r.actual > 0, "should return a valid baud rate");
        assert!(!within_tolerance(1, r.actual));
    }

    #[test]
    fn tolerance_bounds() {
        assert!(within_tolerance(9600, 9600));
        assert!(within_tolerance(100_000, 104_000));
        assert!(!within_tolerance(100_000, 106_000));
        assert!(!within_tolerance(100_000, 94_000));
    }
}
