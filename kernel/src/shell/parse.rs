//! Command line tokenizing
//!
//! Numbers are parsed leniently: leading spaces are skipped and parsing
//! stops at the first character that is not a digit, so `1000xyz` is
//! `0x1000` and an argument with no digits at all is zero.

/// Why an argument list was refused
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgError {
    /// A required argument is absent
    Missing,
    /// Too many or too few tokens
    Count,
    /// A token holds no digits
    NotANumber,
    /// The value does not fit its field
    OutOfRange,
}

/// Split a line into command name and argument remainder
///
/// Both halves have their leading spaces removed; the remainder is empty
/// when the line holds a single word.
pub fn split_command(line: &str) -> (&str, &str) {
    let line = line.trim_start_matches(' ');
    match line.find(' ') {
        Some(space) => (&line[..space], line[space + 1..].trim_start_matches(' ')),
        None => (line, ""),
    }
}

/// Hex number at the start of `text`, zero if none
///
/// Upper and lower case digits are accepted. Values longer than eight digits
/// keep their low 32 bits.
pub fn parse_hex(text: &str) -> u32 {
    text.trim_start_matches(' ')
        .chars()
        .map_while(|c| c.to_digit(16))
        .fold(0u32, |acc, digit| (acc << 4) | digit)
}

/// Decimal number at the start of `text`
pub fn parse_dec(text: &str) -> Result<u32, ArgError> {
    let digits = text.trim_start_matches(' ');
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 {
        return Err(ArgError::NotANumber);
    }
    digits[..end]
        .bytes()
        .try_fold(0u32, |acc, b| {
            acc.checked_mul(10)?.checked_add(u32::from(b - b'0'))
        })
        .ok_or(ArgError::OutOfRange)
}

/// Exactly `N` space-separated decimal numbers
pub fn parse_decimals<const N: usize>(text: &str) -> Result<[u32; N], ArgError> {
    let mut values = [0u32; N];
    let mut tokens = text.split(' ').filter(|t| !t.is_empty());
    for value in values.iter_mut() {
        let token = tokens.next().ok_or(ArgError::Count)?;
        *value = parse_dec(token)?;
    }
    if tokens.next().is_some() {
        return Err(ArgError::Count);
    }
    Ok(values)
}
