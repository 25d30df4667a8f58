//! Instruction address parsing.
//!
//! Addresses are engine-assigned sequence numbers. Operators type them in
//! decimal (`12::bp`) or hexadecimal (`0xc::bp`).

/// Parses an operator-supplied instruction address.
///
/// Accepts plain decimal or a `0x`/`0X` prefixed hexadecimal value.
///
/// # Arguments
///
/// * `text` - The address as typed.
///
/// # Returns
///
/// The address, or `None` if `text` is not a valid unsigned 64-bit number.
pub fn parse_addr(text: &str) -> Option<u64> {
    let text = text.trim();
    if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        return u64::from_str_radix(hex, 16).ok();
    }
    text.parse::<u64>().ok()
}
