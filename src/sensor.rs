use rand::Rng;
use std::fmt;

/// One environmental probe read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EnvironmentalSample {
    pub temperature: f64, // degrees C
    pub humidity: f64,    // percent RH
    pub pressure: f64,    // hPa
}

/// One particulate probe read, ug/m3 per size bucket.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParticulateSample {
    pub pm1: f64,
    pub pm2_5: f64,
    pub pm10: f64,
}

#[derive(Debug, PartialEq)]
pub enum SensorError {
    /// The probe produced nothing this cycle.
    Unresponsive,
}

impl fmt::Display for SensorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SensorError::Unresponsive => write!(f, "probe did not respond"),
        }
    }
}

impl std::error::Error for SensorError {}

/// Stand-in for a BME280 on the station bus. Values take a bounded random
/// walk around typical indoor conditions; reads drop out now and then the
/// way the real part does, so callers must treat every read as fallible.
pub struct SimulatedBme280 {
    temperature: f64,
    humidity: f64,
    pressure: f64,
}

impl SimulatedBme280 {
    pub fn new() -> Self {
        Self {
            temperature: 21.0,
            humidity: 45.0,
            pressure: 1013.0,
        }
    }

    pub fn sample(&mut self) -> Result<EnvironmentalSample, SensorError> {
        let mut rng = rand::thread_rng();
        if rng.gen_ratio(1, 200) {
            return Err(SensorError::Unresponsive);
        }

        self.temperature = (self.temperature + rng.gen_range(-0.4..0.4)).clamp(-15.0, 45.0);
        self.humidity = (self.humidity + rng.gen_range(-1.5..1.5)).clamp(5.0, 100.0);
        self.pressure = (self.pressure + rng.gen_range(-0.6..0.6)).clamp(950.0, 1050.0);

        Ok(EnvironmentalSample {
            temperature: self.temperature,
            humidity: self.humidity,
            pressure: self.pressure,
        })
    }
}

impl Default for SimulatedBme280 {
    fn default() -> Self {
        Self::new()
    }
}

/// Stand-in for a PMS5003 particulate counter.
pub struct SimulatedPms5003 {
    pm1: f64,
    pm2_5: f64,
    pm10: f64,
}

impl SimulatedPms5003 {
    pub fn new() -> Self {
        Self {
            pm1: 4.0,
            pm2_5: 7.0,
            pm10: 12.0,
        }
    }

    pub fn sample(&mut self) -> Result<ParticulateSample, SensorError> {
        let mut rng = rand::thread_rng();
        if rng.gen_ratio(1, 200) {
            return Err(SensorError::Unresponsive);
        }

        self.pm1 = (self.pm1 + rng.gen_range(-0.8..0.8)).clamp(0.0, 400.0);
        self.pm2_5 = (self.pm2_5 + rng.gen_range(-1.0..1.0)).clamp(0.0, 450.0);
        self.pm10 = (self.pm10 + rng.gen_range(-1.2..1.2)).clamp(0.0, 500.0);

        // Mass buckets are cumulative on the real part.
        self.pm2_5 = self.pm2_5.max(self.pm1);
        self.pm10 = self.pm10.max(self.pm2_5);

        Ok(ParticulateSample {
            pm1: self.pm1,
            pm2_5: self.pm2_5,
            pm10: self.pm10,
        })
    }
}

impl Default for SimulatedPms5003 {
    fn default() -> Self {
        Self::new()
    }
}
