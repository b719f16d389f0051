// sob-core/src/units.rs

use uom::si::f64::{
    Energy as UomEnergy, Force as UomForce, Length as UomLength, Mass as UomMass,
};

// Public canonical unit types (SI, f64)
pub type Energy = UomEnergy;
pub type Force = UomForce;
pub type Length = UomLength;
pub type Mass = UomMass;

#[inline]
pub fn mm(v: f64) -> Length {
    use uom::si::length::millimeter;
    Length::new::<millimeter>(v)
}

/// Consistent unit system a deck is written in.
///
/// Lengths are always millimetres; the systems differ in mass and time,
/// which fixes the force and energy units the solver reports.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitSystem {
    /// kg, mm, ms, kN, GPa, kN-mm (= J)
    KgMmMs,
    /// t, mm, s, N, MPa, N-mm (= mJ)
    TonneMmS,
}

impl UnitSystem {
    /// Unit banner written into keyword decks.
    pub fn banner(self) -> &'static str {
        match self {
            UnitSystem::KgMmMs => "  kg  mm  ms  kN  GPa  kN-mm",
            UnitSystem::TonneMmS => "  t  mm  s  N  MPa  N-mm",
        }
    }

    pub fn mass(self, v: f64) -> Mass {
        use uom::si::mass::{kilogram, ton};
        match self {
            UnitSystem::KgMmMs => Mass::new::<kilogram>(v),
            UnitSystem::TonneMmS => Mass::new::<ton>(v),
        }
    }

    pub fn force(self, v: f64) -> Force {
        use uom::si::force::{kilonewton, newton};
        match self {
            UnitSystem::KgMmMs => Force::new::<kilonewton>(v),
            UnitSystem::TonneMmS => Force::new::<newton>(v),
        }
    }

    /// Energy of a force-times-displacement product expressed in deck units.
    pub fn work(self, force_times_mm: f64) -> Energy {
        self.force(force_times_mm) * mm(1.0)
    }

    /// Scale factor from a deck mass value to kilograms.
    pub fn mass_to_kg(self) -> f64 {
        use uom::si::mass::kilogram;
        self.mass(1.0).get::<kilogram>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numeric::{Tolerances, nearly_equal};
    use uom::si::energy::joule;

    #[test]
    fn kn_mm_is_joule() {
        let e = UnitSystem::KgMmMs.work(2.5);
        assert!(nearly_equal(e.get::<joule>(), 2.5, Tolerances::default()));
    }

    #[test]
    fn n_mm_is_millijoule() {
        let e = UnitSystem::TonneMmS.work(1000.0);
        assert!(nearly_equal(e.get::<joule>(), 1.0, Tolerances::default()));
    }

    #[test]
    fn tonne_scales_to_kg() {
        assert!(nearly_equal(
            UnitSystem::TonneMmS.mass_to_kg(),
            1000.0,
            Tolerances::default()
        ));
        assert!(nearly_equal(
            UnitSystem::KgMmMs.mass_to_kg(),
            1.0,
            Tolerances::default()
        ));
    }
}
