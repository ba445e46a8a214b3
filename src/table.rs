//! Custom-fan-table state machine.
//!
//! The EC only honors host-written fan speeds while a custom temperature
//! curve is present and the matching mode bits are set. This module owns the
//! two-state machine (firmware-automatic vs. host-programmed table) and the
//! multi-register sequences that switch between the states.
//!
//! Both transition sequences are best-effort: a failed intermediate write is
//! logged and the sequence continues, since aborting would leave the EC in
//! an unknown half-programmed mode and reverting would itself need writes
//! that might fail. The returned result is the outcome of the final step
//! attempted. Note that while each register access is serialized, the
//! sequence as a whole is not atomic against concurrent speed writes.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{info, warn};

use crate::channel::EcChannel;
use crate::errors::FanControlError;
use crate::fan::FanChannel;
use crate::registers::*;

/// Settle delay after clearing the custom-profile bit, so the EC latches a
/// fresh table on the subsequent set.
const PROFILE_SETTLE_DELAY: Duration = Duration::from_millis(50);

/// Who governs fan speed: the EC firmware curve or host-written values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FanMode {
    Automatic,
    CustomTable,
}

pub struct FanTableController {
    ec: Arc<EcChannel>,
    mode: Mutex<FanMode>,
}

impl FanTableController {
    /// Starts in [`FanMode::Automatic`], the factory/firmware default.
    pub fn new(ec: Arc<EcChannel>) -> Self {
        Self {
            ec,
            mode: Mutex::new(FanMode::Automatic),
        }
    }

    pub fn mode(&self) -> FanMode {
        *self.lock_mode()
    }

    pub fn is_custom(&self) -> bool {
        self.mode() == FanMode::CustomTable
    }

    /// Adopt [`FanMode::CustomTable`] without touching the hardware.
    ///
    /// Used by the integration boundary to recover the mode in a fresh
    /// process when the custom-profile bit is found already set.
    pub fn assume_custom(&self) {
        *self.lock_mode() = FanMode::CustomTable;
    }

    /// Program the custom fan table and flip the EC into host-manual mode.
    ///
    /// Idempotent: a no-op (zero register accesses) when already in
    /// [`FanMode::CustomTable`].
    pub fn enter_custom_table(&self) -> Result<(), FanControlError> {
        let mut mode = self.lock_mode();
        if *mode == FanMode::CustomTable {
            return Ok(());
        }

        info!("initializing custom fan table");
        let mut last = Ok(());

        // Clear then set the custom-profile bit so the EC latches a fresh
        // table, with a settle delay in between.
        match self.ec.read(REG_CUSTOM_PROFILE) {
            Ok(val) => {
                step(
                    &mut last,
                    self.ec.write(REG_CUSTOM_PROFILE, val & !CUSTOM_PROFILE_BIT),
                );
                thread::sleep(PROFILE_SETTLE_DELAY);
                step(
                    &mut last,
                    self.ec.write(REG_CUSTOM_PROFILE, val | CUSTOM_PROFILE_BIT),
                );
            }
            Err(e) => step(&mut last, Err(e)),
        }

        step(&mut last, self.ec.write(REG_MANUAL_MODE, 0x01));
        step(
            &mut last,
            self.clear_bit_if_set(REG_FAN_MODE, FAN_MODE_FULL_BIT),
        );
        step(
            &mut last,
            self.set_bit_if_clear(REG_USE_CUSTOM_FAN_TABLE_0, CUSTOM_FAN_TABLE_0_BIT),
        );

        for channel in FanChannel::ALL {
            step(&mut last, self.program_zones(channel));
        }

        step(
            &mut last,
            self.set_bit_if_clear(REG_USE_CUSTOM_FAN_TABLE_1, CUSTOM_FAN_TABLE_1_BIT),
        );

        *mode = FanMode::CustomTable;
        info!("custom fan table active");
        last
    }

    /// Hand fan control back to the EC firmware curve.
    ///
    /// Idempotent: a no-op (zero register accesses) when already in
    /// [`FanMode::Automatic`].
    pub fn restore_automatic(&self) -> Result<(), FanControlError> {
        let mut mode = self.lock_mode();
        if *mode == FanMode::Automatic {
            return Ok(());
        }

        let mut last = Ok(());

        step(
            &mut last,
            self.clear_bit_if_set(REG_USE_CUSTOM_FAN_TABLE_1, CUSTOM_FAN_TABLE_1_BIT),
        );
        step(
            &mut last,
            self.clear_bit_if_set(REG_USE_CUSTOM_FAN_TABLE_0, CUSTOM_FAN_TABLE_0_BIT),
        );
        step(
            &mut last,
            self.clear_bit_if_set(REG_FAN_MODE, FAN_MODE_FULL_BIT),
        );
        step(&mut last, self.ec.write(REG_MANUAL_MODE, 0x00));
        step(
            &mut last,
            self.clear_bit_if_set(REG_CUSTOM_PROFILE, CUSTOM_PROFILE_BIT),
        );

        *mode = FanMode::Automatic;
        info!("restored automatic fan control");
        last
    }

    /// Write the fixed curve for one channel: zone 0 spans 0..zone0_end at
    /// speed 0, zones 1..15 are contiguous 1 °C bands at maximum speed.
    fn program_zones(&self, channel: FanChannel) -> Result<(), FanControlError> {
        let mut last = Ok(());

        step(&mut last, self.ec.write(channel.table_end_temp_base(), channel.zone0_end_temp()));
        step(&mut last, self.ec.write(channel.table_start_temp_base(), 0));
        step(&mut last, self.ec.write(channel.table_speed_base(), 0));

        for zone in 1..FAN_TABLE_ZONES as u16 {
            let start = FAN_TABLE_TEMP_OFFSET + zone as u8;
            step(
                &mut last,
                self.ec.write(channel.table_end_temp_base() + zone, start + 1),
            );
            step(
                &mut last,
                self.ec.write(channel.table_start_temp_base() + zone, start),
            );
            step(
                &mut last,
                self.ec.write(channel.table_speed_base() + zone, FAN_SPEED_MAX),
            );
        }

        last
    }

    fn set_bit_if_clear(&self, addr: u16, bit: u8) -> Result<(), FanControlError> {
        let val = self.ec.read(addr)?;
        if val & bit == 0 {
            self.ec.write(addr, val | bit)
        } else {
            Ok(())
        }
    }

    fn clear_bit_if_set(&self, addr: u16, bit: u8) -> Result<(), FanControlError> {
        let val = self.ec.read(addr)?;
        if val & bit != 0 {
            self.ec.write(addr, val & !bit)
        } else {
            Ok(())
        }
    }

    fn lock_mode(&self) -> std::sync::MutexGuard<'_, FanMode> {
        self.mode.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Record a best-effort step: log a failure and carry the result forward as
/// the sequence's provisional outcome.
fn step(last: &mut Result<(), FanControlError>, result: Result<(), FanControlError>) {
    if let Err(ref e) = result {
        warn!("fan table step failed: {}", e);
    }
    *last = result;
}
