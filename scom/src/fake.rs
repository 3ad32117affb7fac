/*!
Fake peripherals, to run a device without hardware
*/
use rand::{Rng, SeedableRng, rngs::SmallRng};

use crate::traits::AxisSensor;

/// Sonar reporting a distance that drifts by a few millimeters on every reading.
pub struct FakeSonar {
    distance_mm: i16,
    offset: [i16; 1],
    random: SmallRng,
}

impl FakeSonar {
    pub fn new(distance_mm: i16) -> Self {
        Self {
            distance_mm,
            offset: [0],
            random: SmallRng::from_os_rng(),
        }
    }
}

impl AxisSensor<1> for FakeSonar {
    fn read_raw(&mut self) -> [i16; 1] {
        let drift: i16 = self.random.random_range(-3..=3);
        self.distance_mm = self.distance_mm.saturating_add(drift).max(0);
        [self.distance_mm]
    }

    fn offset(&self) -> [i16; 1] {
        self.offset
    }

    fn set_offset(&mut self, offset: [i16; 1]) {
        self.offset = offset;
    }
}

#[cfg(test)]
mod tests {
    use test_log::test;

    use super::*;

    #[test]
    fn test_sonar_drift() {
        let mut sonar = FakeSonar::new(1500);
        let mut last = 1500;
        for _ in 0..100 {
            let [distance] = sonar.read();
            assert!((distance - last).abs() <= 3);
            last = distance;
        }
    }

    #[test]
    fn test_sonar_never_negative() {
        let mut sonar = FakeSonar::new(0);
        for _ in 0..100 {
            assert!(sonar.read_raw()[0] >= 0);
        }
    }

    #[test]
    fn test_sonar_zero() {
        let mut sonar = FakeSonar::new(800);
        sonar.zero();
        let [distance] = sonar.read();
        assert!((-3..=3).contains(&distance));
    }
}
