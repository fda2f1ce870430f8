use std::{fmt::Display, str::FromStr};

use context_error::{BoxedError, Context};
use serde::{Deserialize, Serialize};
use uom::si::{
    f64::{Mass, Ratio},
    mass::dalton,
    ratio::{part_per_million, ratio},
};

use crate::error::{ConfigurationError, ConfigurationErrorKind};

/// A tolerance around a given mass for searching purposes
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub enum Tolerance {
    /// An absolute tolerance defined by a constant offset from the mass (bounds are mass - tol, mass + tol)
    Absolute(Mass),
    /// A relative tolerance defined by a mass offset that depends on the mass of the ion (bounds are mass - mass * tol, mass + mass * tol)
    Relative(Ratio),
}

impl Tolerance {
    /// Create a new ppm value
    pub fn new_ppm(value: f64) -> Self {
        Self::Relative(Ratio::new::<part_per_million>(value))
    }

    /// Create a new absolute value in dalton
    pub fn new_absolute(value: f64) -> Self {
        Self::Absolute(Mass::new::<dalton>(value))
    }

    /// The window `(min, max)` around a neutral mass. A relative tolerance is taken on the
    /// charged mass (m/z times charge) as that is what the instrument measured.
    pub fn bounds(&self, neutral_mass: f64, charged_mass: f64) -> (f64, f64) {
        let delta = match self {
            Self::Absolute(mass) => mass.get::<dalton>(),
            Self::Relative(fraction) => charged_mass.abs() * fraction.get::<ratio>(),
        };
        (neutral_mass - delta, neutral_mass + delta)
    }

    /// Check if the theoretical value is within the tolerance of the experimental value, both
    /// in the same unit (mass or m/z).
    pub fn contains(&self, experimental: f64, theoretical: f64) -> bool {
        let (min, max) = self.bounds(experimental, experimental);
        (min..=max).contains(&theoretical)
    }
}

impl Display for Tolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Absolute(mass) => write!(f, "{} da", mass.get::<dalton>()),
            Self::Relative(fraction) => write!(f, "{} ppm", fraction.get::<part_per_million>()),
        }
    }
}

impl FromStr for Tolerance {
    type Err = ConfigurationError;
    /// Parse `20ppm`, `20 ppm`, `0.02da` or `0.02 Da`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        let (number, unit) = lower
            .find(|c: char| c.is_ascii_alphabetic())
            .map_or((lower.as_str(), ""), |index| lower.split_at(index));
        let value = number.trim().parse::<f64>().map_err(|_| {
            BoxedError::new(
                ConfigurationErrorKind::InvalidNumber,
                "Invalid tolerance",
                "The tolerance value is not a valid number",
                Context::show(s.to_string()),
            )
        })?;
        match unit.trim() {
            "ppm" => Ok(Self::new_ppm(value)),
            "da" | "dalton" => Ok(Self::new_absolute(value)),
            _ => Err(BoxedError::new(
                ConfigurationErrorKind::InvalidValue,
                "Invalid tolerance unit",
                "A tolerance needs a unit, use 'ppm' or 'da'",
                Context::show(s.to_string()),
            )),
        }
    }
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn relative_uses_charged_mass() {
        let tolerance = Tolerance::new_ppm(10.0);
        let (min, max) = tolerance.bounds(999.0, 1_000_000.0);
        assert!((min - 989.0).abs() < 1e-9);
        assert!((max - 1009.0).abs() < 1e-9);
    }

    #[test]
    fn absolute() {
        let tolerance = Tolerance::new_absolute(0.5);
        assert_eq!(tolerance.bounds(100.0, 5000.0), (99.5, 100.5));
        assert!(tolerance.contains(100.0, 100.4));
        assert!(!tolerance.contains(100.0, 100.6));
    }

    #[test]
    fn parse() {
        assert_eq!("20ppm".parse::<Tolerance>().unwrap(), Tolerance::new_ppm(20.0));
        assert_eq!(
            "0.02 Da".parse::<Tolerance>().unwrap(),
            Tolerance::new_absolute(0.02)
        );
        assert!("20".parse::<Tolerance>().is_err());
        assert!("fast ppm".parse::<Tolerance>().is_err());
    }
}
