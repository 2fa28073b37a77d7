//! Metadata tokens.

use std::fmt;

use crate::Result;

/// A metadata token identifying a row in one of the emitted module's tables.
///
/// The high byte selects the table, the low 24 bits select the row. The harness only
/// constructs tokens for method and type definitions, but carries whatever a verifier or
/// debug document reports.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Token(pub u32);

impl Token {
    /// Table id of `TypeDef`
    pub const TYPE_DEF: u8 = 0x02;
    /// Table id of `MethodDef`
    pub const METHOD_DEF: u8 = 0x06;

    /// Creates a new token from a raw 32-bit value
    #[must_use]
    pub fn new(value: u32) -> Self {
        Token(value)
    }

    /// Token of the `row`-th method definition (1-based)
    #[must_use]
    pub fn method_def(row: u32) -> Self {
        Token((u32::from(Self::METHOD_DEF) << 24) | (row & 0x00FF_FFFF))
    }

    /// Token of the `row`-th type definition (1-based)
    #[must_use]
    pub fn type_def(row: u32) -> Self {
        Token((u32::from(Self::TYPE_DEF) << 24) | (row & 0x00FF_FFFF))
    }

    /// Parse a token written as hex, with or without a `0x` prefix.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if `text` is not a hex number that fits in 32 bits.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        let digits = text
            .strip_prefix("0x")
            .or_else(|| text.strip_prefix("0X"))
            .unwrap_or(text);
        u32::from_str_radix(digits, 16)
            .map(Token)
            .map_err(|_| malformed_error!("Invalid metadata token '{}'", text))
    }

    /// Returns the raw token value
    #[must_use]
    pub fn value(&self) -> u32 {
        self.0
    }

    /// Extracts the table type from the token (high byte)
    #[must_use]
    pub fn table(&self) -> u8 {
        (self.0 >> 24) as u8
    }

    /// Extracts the row index from the token (low 24 bits)
    #[must_use]
    pub fn row(&self) -> u32 {
        self.0 & 0x00FF_FFFF
    }

    /// Returns true if this is a null token (row 0)
    #[must_use]
    pub fn is_null(&self) -> bool {
        self.row() == 0
    }
}

impl From<u32> for Token {
    fn from(value: u32) -> Self {
        Token(value)
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Token(0x{:08x}, table: 0x{:02x}, row: {})",
            self.0,
            self.table(),
            self.row()
        )
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:08x}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_parts() {
        let token = Token::method_def(3);
        assert_eq!(token.value(), 0x06000003);
        assert_eq!(token.table(), Token::METHOD_DEF);
        assert_eq!(token.row(), 3);
        assert!(!token.is_null());

        assert_eq!(Token::type_def(1).value(), 0x02000001);
        assert!(Token::method_def(0).is_null());
    }

    #[test]
    fn test_token_parse() {
        assert_eq!(Token::parse("0x06000001").unwrap(), Token(0x06000001));
        assert_eq!(Token::parse("0X0A00000c").unwrap(), Token(0x0a00000c));
        assert_eq!(Token::parse("2000002").unwrap(), Token(0x02000002));
        assert!(Token::parse("0xZZ").is_err());
        assert!(Token::parse("0x1234567890").is_err());
    }

    #[test]
    fn test_token_display() {
        assert_eq!(Token(0x06000001).to_string(), "0x06000001");
        assert!(format!("{:?}", Token(0x06000001)).contains("row: 1"));
    }
}
