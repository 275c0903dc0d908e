//! Error and warning bitfield decoding.
//!
//! Register 2 carries eight error flags, register 3 six warning flags. A set
//! bit outside the documented range is reported as a raw code so nothing is
//! silently dropped.

/// Documented error bits of register 2
const ERROR_BITS: [(u8, &str); 8] = [
    (0, "Emergency stop"),
    (1, "High voltage"),
    (2, "Low voltage"),
    (3, "Overcurrent"),
    (4, "Sensor fault"),
    (5, "Motor stall"),
    (6, "Communication fault"),
    (7, "EEPROM fault"),
];

/// Documented warning bits of register 3
const WARNING_BITS: [(u8, &str); 6] = [
    (0, "High temperature"),
    (1, "Maintenance due"),
    (2, "Fan fault"),
    (3, "Unstable input voltage"),
    (4, "Warning 5"),
    (5, "Warning 6"),
];

fn decode(value: u16, table: &[(u8, &'static str)]) -> Vec<String> {
    let mut active = Vec::new();
    let mut known_mask: u16 = 0;
    for (bit, label) in table {
        known_mask |= 1 << bit;
        if value >> bit & 1 == 1 {
            active.push((*label).to_string());
        }
    }
    // Undocumented bits surface as a raw code
    if value & !known_mask != 0 {
        active.push(format!("Code: {}", value));
    }
    active
}

/// Decode the error register into active flag labels. Empty means healthy.
pub fn active_errors(value: u16) -> Vec<String> {
    decode(value, &ERROR_BITS)
}

/// Decode the warning register into active flag labels. Empty means clean.
pub fn active_warnings(value: u16) -> Vec<String> {
    decode(value, &WARNING_BITS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_flags() {
        assert!(active_errors(0).is_empty());
        assert!(active_warnings(0).is_empty());
    }

    #[test]
    fn test_error_bits() {
        let active = active_errors(0b0000_0101);
        assert_eq!(active, vec!["Emergency stop", "Low voltage"]);

        let all = active_errors(0xFF);
        assert_eq!(all.len(), 8);
    }

    #[test]
    fn test_warning_bits() {
        let active = active_warnings(0b10);
        assert_eq!(active, vec!["Maintenance due"]);
    }

    #[test]
    fn test_undocumented_bits_reported() {
        // Bit 7 is undefined for warnings
        let active = active_warnings(0x80);
        assert_eq!(active, vec!["Code: 128"]);

        // Mixed documented and undocumented
        let active = active_warnings(0x81);
        assert_eq!(active, vec!["High temperature", "Code: 129"]);
    }
}
