//! Monoisotopic mass constants, all in dalton.

/// Mass of a proton
pub const PROTON_MASS: f64 = 1.00727646677;
/// Mass difference between the C13 and C12 isotope, the spacing of an isotope envelope at charge 1
pub const C13_MASS_DIFFERENCE: f64 = 1.00335;
/// Mass of water
pub const WATER_MASS: f64 = 18.01056027;
/// Mass of ammonia
pub const AMMONIA_MASS: f64 = 17.02654493;
/// Mass of hydrogen
pub const HYDROGEN_MASS: f64 = 1.007825035;
/// Mass of carbon
pub const CARBON_MASS: f64 = 12.0;
/// Mass of nitrogen
pub const NITROGEN_MASS: f64 = 14.003074;
/// Mass of oxygen
pub const OXYGEN_MASS: f64 = 15.99491;

/// The m/z of an ion with the given neutral mass protonated to the given charge.
pub fn mz(neutral_mass: f64, charge: usize) -> f64 {
    let charge = charge as f64;
    charge.mul_add(PROTON_MASS, neutral_mass) / charge
}

/// The neutral mass of an ion observed at the given m/z and charge.
pub fn neutral_mass(mz: f64, charge: usize) -> f64 {
    (mz - PROTON_MASS) * charge as f64
}

#[cfg(test)]
#[allow(clippy::missing_panics_doc)]
mod tests {
    use super::*;

    #[test]
    fn mz_and_back() {
        for charge in 1..=4 {
            let value = mz(1234.5678, charge);
            assert!((neutral_mass(value, charge) - 1234.5678).abs() < 1e-9);
        }
        assert!((mz(1000.0, 1) - 1001.00727646677).abs() < 1e-12);
    }
}
