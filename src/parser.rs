//! Sensor line parsing.
//!
//! The firmware prints lines such as `Humedad del suelo: 25.50%`. Parsing
//! lower-cases the line, removes every `%` and the configured label, trims
//! whitespace and reads what is left as a decimal number.

use crate::error::ParseError;

/// Converts raw sensor lines into humidity readings.
#[derive(Debug, Clone)]
pub struct LineParser {
    label: String,
}

impl Default for LineParser {
    fn default() -> Self {
        Self::new("humedad del suelo:")
    }
}

impl LineParser {
    /// Create a parser that strips `label` (matched case-insensitively).
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into().trim().to_lowercase(),
        }
    }

    /// Lower-case, strip `%` and the label, trim.
    pub fn normalize(&self, raw: &str) -> String {
        let mut text = raw.to_lowercase().replace('%', "");
        if !self.label.is_empty() {
            text = text.replace(&self.label, "");
        }
        text.trim().to_string()
    }

    /// Parse one raw line into a finite humidity value.
    pub fn parse(&self, raw: &str) -> Result<f64, ParseError> {
        let text = self.normalize(raw);
        if text.is_empty() {
            return Err(ParseError::Empty);
        }

        let value: f64 = text
            .parse()
            .map_err(|_| ParseError::NotANumber(text.clone()))?;

        if !value.is_finite() {
            return Err(ParseError::NonFinite(text));
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_labelled_line() {
        let parser = LineParser::default();
        assert_eq!(parser.parse("Humedad del suelo: 25.50%"), Ok(25.5));
    }

    #[test]
    fn parses_bare_value_with_percent() {
        let parser = LineParser::default();
        assert_eq!(parser.parse("42.0%"), Ok(42.0));
        assert_eq!(parser.parse("  17 % \r"), Ok(17.0));
    }

    #[test]
    fn label_match_is_case_insensitive() {
        let parser = LineParser::default();
        assert_eq!(parser.parse("HUMEDAD DEL SUELO: 61.2 %"), Ok(61.2));
    }

    #[test]
    fn custom_label() {
        let parser = LineParser::new("Moisture=");
        assert_eq!(parser.parse("moisture=33.3"), Ok(33.3));
        // The default label is not stripped by a custom parser
        assert!(parser.parse("Humedad del suelo: 10").is_err());
    }

    #[test]
    fn negative_and_large_values_pass_through() {
        let parser = LineParser::default();
        assert_eq!(parser.parse("-3.5%"), Ok(-3.5));
        assert_eq!(parser.parse("140"), Ok(140.0));
    }

    #[test]
    fn rejects_non_numeric() {
        let parser = LineParser::default();
        assert_eq!(
            parser.parse("abc"),
            Err(ParseError::NotANumber("abc".to_string()))
        );
        assert!(matches!(
            parser.parse("Humedad del suelo: --"),
            Err(ParseError::NotANumber(_))
        ));
        assert!(matches!(
            parser.parse("25.5 25.6"),
            Err(ParseError::NotANumber(_))
        ));
    }

    #[test]
    fn rejects_empty_after_normalization() {
        let parser = LineParser::default();
        assert_eq!(parser.parse(""), Err(ParseError::Empty));
        assert_eq!(parser.parse("%"), Err(ParseError::Empty));
        assert_eq!(parser.parse("Humedad del suelo: %"), Err(ParseError::Empty));
    }

    #[test]
    fn rejects_non_finite() {
        let parser = LineParser::default();
        assert!(matches!(parser.parse("inf"), Err(ParseError::NonFinite(_))));
        assert!(matches!(parser.parse("NaN%"), Err(ParseError::NonFinite(_))));
    }
}
