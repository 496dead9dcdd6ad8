#![cfg_attr(target_arch = "avr", no_std)]
#![cfg_attr(target_arch = "avr", no_main)]
#![cfg_attr(target_arch = "avr", allow(incomplete_features))]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]
#![cfg_attr(target_arch = "avr", feature(generic_const_exprs))]

#[cfg(target_arch = "avr")]
mod firmware {
    use arduino_hal::{prelude::*, Pins};
    use panic_halt as _;

    use parkgate::{
        avr::{
            clock::CLOCK,
            serial::BufferedSerial,
            servo::{self, Servo},
        },
        config::{GateConfig, BAUD_RATE, SLOT_LABELS},
        gate::{self, Slot},
        hc_sr04::HcSr04,
    };

    #[arduino_hal::entry]
    fn main() -> ! {
        let dp = arduino_hal::Peripherals::take().unwrap();
        let pins: Pins = arduino_hal::pins!(dp);
        let serial = arduino_hal::default_serial!(dp, pins, BAUD_RATE);

        // Disable interrupts while the timers are configured
        avr_device::interrupt::disable();

        CLOCK.start(dp.TC0);
        servo::donate_tc1(dp.TC1);

        let barricade = Servo::new(pins.d3.into_output())
            .expect("Failed to initialize barricade servo")
            .attach();

        let slots = [
            Slot::new(
                SLOT_LABELS[0],
                HcSr04::new(pins.d7.into_output().downgrade(), pins.d6.downgrade()),
            ),
            Slot::new(
                SLOT_LABELS[1],
                HcSr04::new(pins.d9.into_output().downgrade(), pins.d8.downgrade()),
            ),
        ];

        let mut gate = gate::builder()
            .entry(pins.d4)
            .exit(pins.d5)
            .barricade(barricade)
            .slots(slots)
            .build(
                BufferedSerial::new(serial),
                &CLOCK,
                arduino_hal::Delay::new(),
                GateConfig::DEFAULT,
            );

        unsafe { avr_device::interrupt::enable() };

        loop {
            gate.poll().unwrap_infallible();
        }
    }
}

#[cfg(not(target_arch = "avr"))]
fn main() {
    eprintln!("parkgate is firmware for the Arduino Nano; build it for the avr target");
}
