use embedded_hal::digital::InputPin;

/// Infrared obstacle sensor that pulls its output LOW while something is in
/// front of it.
#[derive(Debug)]
pub struct PresenceSensor<P> {
    pin: P,
}

impl<P: InputPin> PresenceSensor<P> {
    pub fn new(pin: P) -> Self {
        Self { pin }
    }

    /// `true` while the sensor reports a vehicle.
    pub fn is_active(&mut self) -> Result<bool, P::Error> {
        self.pin.is_low()
    }

    /// Like [`Self::is_active`], but a failed read counts as nothing seen.
    pub fn detected(&mut self, name: &str) -> bool {
        match self.is_active() {
            Ok(active) => active,
            Err(e) => {
                log::warn!("{} sensor read failed: {:?}", name, e);
                false
            }
        }
    }

    pub fn release(self) -> P {
        self.pin
    }
}
