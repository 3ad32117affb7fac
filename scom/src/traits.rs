/// Capability shared by the raw-axis sensors (accelerometer, gyroscope,
/// sonar...). Drivers only implement the register access; calibration
/// offsets are applied here.
pub trait AxisSensor<const AXES: usize> {
    /// read uncalibrated values, one per axis
    fn read_raw(&mut self) -> [i16; AXES];
    fn offset(&self) -> [i16; AXES];
    fn set_offset(&mut self, offset: [i16; AXES]);

    /// calibrated reading
    fn read(&mut self) -> [i16; AXES] {
        let mut raw = self.read_raw();
        let offset = self.offset();
        for (value, off) in raw.iter_mut().zip(offset) {
            *value = value.wrapping_sub(off);
        }
        raw
    }

    /// take the current reading as the zero point
    fn zero(&mut self) {
        let raw = self.read_raw();
        self.set_offset(raw);
    }
}

#[cfg(test)]
mod tests {
    use super::AxisSensor;

    struct Gyro {
        raw: [i16; 3],
        offset: [i16; 3],
    }

    impl AxisSensor<3> for Gyro {
        fn read_raw(&mut self) -> [i16; 3] {
            self.raw
        }
        fn offset(&self) -> [i16; 3] {
            self.offset
        }
        fn set_offset(&mut self, offset: [i16; 3]) {
            self.offset = offset;
        }
    }

    #[test]
    fn test_offset_applied() {
        let mut g = Gyro {
            raw: [10, -20, i16::MIN],
            offset: [5, 5, 1],
        };
        assert_eq!(g.read(), [5, -25, i16::MAX]);
        g.zero();
        assert_eq!(g.read(), [0, 0, 0]);
    }
}
