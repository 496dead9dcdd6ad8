#![cfg_attr(not(test), no_std)]
#![cfg_attr(target_arch = "avr", allow(incomplete_features))]
#![cfg_attr(target_arch = "avr", feature(abi_avr_interrupt))]
#![cfg_attr(target_arch = "avr", feature(generic_const_exprs))]

#[cfg(target_arch = "avr")]
pub mod avr;
pub mod barricade;
pub mod clock;
pub mod config;
pub mod gate;
pub mod hc_sr04;
pub mod ir;
pub mod protocol;
pub mod servo;

#[cfg(test)]
pub(crate) mod sim;
