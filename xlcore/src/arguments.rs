use context_error::{BoxedError, Context};

use crate::{
    error::{ConfigurationError, ConfigurationErrorKind},
    helper_functions::{explain_number_error, str_starts_with},
};

/// One argument list, split on `;`. Every part is either `key:value` (`=` is accepted as
/// separator as well) or a bare flag. Keys are compared ignoring case.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Arguments<'a> {
    text: &'a str,
    parts: Vec<(&'a str, Option<&'a str>)>,
}

impl<'a> Arguments<'a> {
    /// Split the text into its arguments, empty parts are skipped
    pub fn parse(text: &'a str) -> Self {
        let parts = text
            .split(';')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| {
                part.find([':', '='])
                    .map_or((part, None), |index| {
                        (part[..index].trim(), Some(part[index + 1..].trim()))
                    })
            })
            .collect();
        Self { text, parts }
    }

    /// The full text these arguments were read from
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Iterate over all `(key, value)` pairs in order
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, Option<&'a str>)> + '_ {
        self.parts.iter().copied()
    }

    /// The value for the key
    pub fn get(&self, key: &str) -> Option<&'a str> {
        self.parts
            .iter()
            .find(|(k, v)| v.is_some() && k.eq_ignore_ascii_case(key))
            .and_then(|(_, v)| *v)
    }

    /// All values given for the key, in order
    pub fn get_all(&self, key: &str) -> impl Iterator<Item = &'a str> + '_ {
        self.parts
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(key))
            .filter_map(|(_, v)| *v)
    }

    /// The value of the first key starting with the given prefix, so `DIGESTED` finds
    /// `DigestedAminoAcids`
    pub fn get_prefixed(&self, prefix: &str) -> Option<&'a str> {
        self.parts
            .iter()
            .find(|(k, v)| v.is_some() && str_starts_with::<true>(k, prefix))
            .and_then(|(_, v)| *v)
    }

    /// If the bare flag (or a key of this name) is present
    pub fn has_flag(&self, flag: &str) -> bool {
        self.parts.iter().any(|(k, _)| k.eq_ignore_ascii_case(flag))
    }

    /// The value for the key, failing if it is not there
    /// # Errors
    /// When the key is missing.
    pub fn require(&self, key: &str) -> Result<&'a str, ConfigurationError> {
        self.get(key).ok_or_else(|| {
            BoxedError::new(
                ConfigurationErrorKind::MissingArgument,
                "Missing argument",
                format!("The argument '{key}' is required"),
                Context::show(self.text.to_string()),
            )
        })
    }

    /// The value for the key parsed as a floating point number, if present
    /// # Errors
    /// When the value is not a valid number.
    pub fn number(&self, key: &str) -> Result<Option<f64>, ConfigurationError> {
        self.get(key).map(|value| parse_number(value, self.text)).transpose()
    }

    /// The value for the key parsed as an integer, if present
    /// # Errors
    /// When the value is not a valid integer.
    pub fn integer(&self, key: &str) -> Result<Option<usize>, ConfigurationError> {
        self.get(key)
            .map(|value| parse_integer(value, self.text))
            .transpose()
    }

    /// The value for the key parsed as a boolean, if present
    /// # Errors
    /// When the value is not a boolean.
    pub fn boolean(&self, key: &str) -> Result<Option<bool>, ConfigurationError> {
        self.get(key).map(parse_bool).transpose()
    }
}

/// Parse a floating point number, `text` is the full line used for the error context.
/// # Errors
/// When the value is not a valid number.
pub fn parse_number(value: &str, text: &str) -> Result<f64, ConfigurationError> {
    value.trim().parse::<f64>().map_err(|_| {
        BoxedError::new(
            ConfigurationErrorKind::InvalidNumber,
            "Invalid number",
            format!("'{value}' is not a valid number"),
            Context::show(text.to_string()),
        )
    })
}

/// Parse a non negative integer, `text` is the full line used for the error context.
/// # Errors
/// When the value is not a valid integer.
pub fn parse_integer(value: &str, text: &str) -> Result<usize, ConfigurationError> {
    value.trim().parse::<usize>().map_err(|error| {
        BoxedError::new(
            ConfigurationErrorKind::InvalidNumber,
            "Invalid number",
            format!("The number '{value}' {}", explain_number_error(&error)),
            Context::show(text.to_string()),
        )
    })
}

/// Parse a boolean, accepting `true`, `yes`, `t`, `y` and `1` as true and `false`, `no`, `f`, `n`
/// and `0` as false.
/// # Errors
/// When the value is none of these.
pub fn parse_bool(value: &str) -> Result<bool, ConfigurationError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "t" | "y" | "1" => Ok(true),
        "false" | "no" | "f" | "n" | "0" => Ok(false),
        _ => Err(BoxedError::new(
            ConfigurationErrorKind::InvalidValue,
            "Invalid boolean",
            "Use one of 'true', 'yes', 't', 'y', '1' or 'false', 'no', 'f', 'n', '0'",
            Context::show(value.to_string()),
        )),
    }
}
