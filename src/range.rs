//! # Range sampler
//! One ultrasonic time-of-flight measurement per call, classified against the intrusion threshold.
//!
//! There is no smoothing: one sample, one decision. A single spurious echo can therefore trigger the
//! alarm. A lost echo on the other hand never does, it is reported as [`NO_ECHO_DISTANCE_CM`].

use crate::config::AlarmConfig;
use crate::error::SensorError;

/// The distance reported when the echo times out. Far beyond the range of the sensor, so never an intrusion.
pub const NO_ECHO_DISTANCE_CM: f32 = 999.0;

/// The hardware side of the ranging sensor
#[allow(async_fn_in_trait)]
pub trait EchoSensor {
    /// Send the trigger pulse that starts a measurement
    async fn trigger_pulse(&mut self);

    /// Wait for the echo pulse and return its width in µs
    async fn measure_echo_duration_us(&mut self, timeout_us: u32) -> Result<u32, SensorError>;
}

/// Converts the echo pulse width into the distance to the object. The pulse covers the way there and back.
#[allow(clippy::cast_precision_loss)]
pub fn echo_to_distance_cm(echo_us: u32, speed_of_sound_cm_per_us: f32) -> f32 {
    echo_us as f32 * speed_of_sound_cm_per_us / 2.0
}

/// Samples the sensor and decides whether there is an object within the threshold
pub struct RangeSampler<S> {
    /// The sensor driver
    sensor: S,
    /// Anything closer than this is an intrusion, in cm
    threshold_cm: f32,
    /// Echo timeout handed to the driver, in µs
    echo_timeout_us: u32,
    /// Speed of sound in cm/µs
    speed_of_sound_cm_per_us: f32,
    /// Distance of the most recent sample, in cm
    last_distance_cm: f32,
}

impl<S: EchoSensor> RangeSampler<S> {
    /// Create a new `RangeSampler`
    pub const fn new(sensor: S, config: &AlarmConfig) -> Self {
        Self {
            sensor,
            threshold_cm: config.threshold_cm,
            echo_timeout_us: config.echo_timeout_us,
            speed_of_sound_cm_per_us: config.speed_of_sound_cm_per_us,
            last_distance_cm: NO_ECHO_DISTANCE_CM,
        }
    }

    /// Performs exactly one measurement and returns the distance in cm
    pub async fn measure_cm(&mut self) -> f32 {
        self.sensor.trigger_pulse().await;
        let distance_cm = match self
            .sensor
            .measure_echo_duration_us(self.echo_timeout_us)
            .await
        {
            Ok(echo_us) => echo_to_distance_cm(echo_us, self.speed_of_sound_cm_per_us),
            Err(SensorError::EchoTimeout) => {
                debug!("echo timed out, treating as clear");
                NO_ECHO_DISTANCE_CM
            }
        };
        self.last_distance_cm = distance_cm;
        distance_cm
    }

    /// Performs exactly one measurement and returns whether an object is within the threshold
    pub async fn sample(&mut self) -> bool {
        let distance_cm = self.measure_cm().await;
        self.is_intrusion(distance_cm)
    }

    /// Classify a distance against the threshold
    pub fn is_intrusion(&self, distance_cm: f32) -> bool {
        distance_cm < self.threshold_cm
    }

    /// Distance of the most recent sample, in cm
    pub const fn last_distance_cm(&self) -> f32 {
        self.last_distance_cm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use embassy_futures::block_on;

    /// Replays a fixed list of echo results
    struct FakeSensor {
        echoes: std::vec::Vec<Result<u32, SensorError>>,
        triggers: usize,
        last_timeout_us: u32,
    }

    impl FakeSensor {
        fn new(echoes: &[Result<u32, SensorError>]) -> Self {
            Self {
                echoes: echoes.iter().rev().copied().collect(),
                triggers: 0,
                last_timeout_us: 0,
            }
        }
    }

    impl EchoSensor for FakeSensor {
        async fn trigger_pulse(&mut self) {
            self.triggers += 1;
        }

        async fn measure_echo_duration_us(&mut self, timeout_us: u32) -> Result<u32, SensorError> {
            self.last_timeout_us = timeout_us;
            self.echoes.pop().unwrap_or(Err(SensorError::EchoTimeout))
        }
    }

    /// Echo width for a distance, rounded up
    fn echo_for_cm(cm: f32) -> u32 {
        (cm * 2.0 / AlarmConfig::DEFAULT.speed_of_sound_cm_per_us).ceil() as u32
    }

    #[test]
    fn converts_round_trip_time_to_distance() {
        let d = echo_to_distance_cm(5831, 0.0343);
        assert!((d - 100.0).abs() < 0.01);
    }

    #[test]
    fn near_object_is_intrusion() {
        let mut sampler = RangeSampler::new(
            FakeSensor::new(&[Ok(echo_for_cm(60.0))]),
            &AlarmConfig::DEFAULT,
        );
        assert!(block_on(sampler.sample()));
        assert!((sampler.last_distance_cm() - 60.0).abs() < 0.1);
    }

    #[test]
    fn far_object_is_clear() {
        let mut sampler = RangeSampler::new(
            FakeSensor::new(&[Ok(echo_for_cm(80.0))]),
            &AlarmConfig::DEFAULT,
        );
        assert!(!block_on(sampler.sample()));
    }

    #[test]
    fn threshold_itself_is_clear() {
        let sampler = RangeSampler::new(FakeSensor::new(&[]), &AlarmConfig::DEFAULT);
        assert!(!sampler.is_intrusion(70.0));
        assert!(sampler.is_intrusion(69.9));
    }

    #[test]
    fn echo_timeout_is_clear() {
        let mut sampler = RangeSampler::new(
            FakeSensor::new(&[Err(SensorError::EchoTimeout)]),
            &AlarmConfig::DEFAULT,
        );
        assert!(!block_on(sampler.sample()));
        assert_eq!(sampler.last_distance_cm(), NO_ECHO_DISTANCE_CM);
    }

    #[test]
    fn one_trigger_per_sample() {
        let mut sampler = RangeSampler::new(
            FakeSensor::new(&[Ok(echo_for_cm(10.0)), Ok(echo_for_cm(200.0))]),
            &AlarmConfig::DEFAULT,
        );
        assert!(block_on(sampler.sample()));
        assert!(!block_on(sampler.sample()));
        assert_eq!(sampler.sensor.triggers, 2);
        assert_eq!(
            sampler.sensor.last_timeout_us,
            AlarmConfig::DEFAULT.echo_timeout_us
        );
    }
}
