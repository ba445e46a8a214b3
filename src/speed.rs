//! Direct fan-speed control and temperature readout.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crate::channel::EcChannel;
use crate::errors::FanControlError;
use crate::fan::FanChannel;
use crate::registers::*;
use crate::table::FanTableController;

/// How often the direct-speed register is rewritten per request. The EC
/// periodically re-asserts its own value on that register, so a single write
/// can be silently overwritten. Empirical; tunable, not guaranteed-correct.
const DIRECT_WRITE_REPEATS: u32 = 5;
const DIRECT_WRITE_DELAY: Duration = Duration::from_millis(10);

pub struct FanSpeedController {
    ec: Arc<EcChannel>,
    table: Arc<FanTableController>,
}

impl FanSpeedController {
    pub fn new(ec: Arc<EcChannel>, table: Arc<FanTableController>) -> Self {
        Self { ec, table }
    }

    /// CPU temperature in milli-degrees Celsius.
    pub fn temperature_mdeg(&self) -> Result<u32, FanControlError> {
        Ok(self.ec.read(REG_FAN1_TEMP)? as u32 * 1000)
    }

    /// Current fan speed in EC units (0–200).
    pub fn speed(&self, channel: FanChannel) -> Result<u8, FanControlError> {
        self.ec.read(channel.direct_speed_reg())
    }

    /// Command a fan speed from an externally-requested duty value (0–255).
    ///
    /// Enters the custom table first if the EC is still in automatic mode.
    /// The value lands in the channel's table-speed slot once and in the
    /// direct-speed register [`DIRECT_WRITE_REPEATS`] times; any register
    /// failure propagates immediately.
    pub fn set_speed(&self, channel: FanChannel, duty: u8) -> Result<(), FanControlError> {
        self.table.enter_custom_table()?;

        let raw = duty_to_raw(duty);
        self.ec.write(channel.table_speed_base(), raw)?;

        for _ in 0..DIRECT_WRITE_REPEATS {
            self.ec.write(channel.direct_speed_reg(), raw)?;
            thread::sleep(DIRECT_WRITE_DELAY);
        }

        Ok(())
    }
}

/// Map a 0–255 duty request onto the EC's 0–200 scale.
///
/// A zero request is stored as 1 — a literal 0 could be mistaken by the EC
/// for "table not active". Non-zero requests below [`FAN_ON_MIN_SPEED`] are
/// raised to it so the firmware does not override very low commanded speeds.
fn duty_to_raw(duty: u8) -> u8 {
    let raw = (duty as u16 * FAN_SPEED_MAX as u16 / 255) as u8;
    if raw > FAN_SPEED_MAX {
        FAN_SPEED_MAX
    } else if raw == 0 {
        1
    } else if raw < FAN_ON_MIN_SPEED {
        FAN_ON_MIN_SPEED
    } else {
        raw
    }
}
