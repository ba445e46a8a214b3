//! Generic sensor-framework boundary.
//!
//! Presents the fan subsystem as one temperature channel and two PWM
//! channels with hwmon-style read/write/visibility semantics, and owns the
//! teardown path that hands control back to the firmware. This is the single
//! integration point; nothing below it is reachable from the outside.

use std::sync::Arc;

use log::warn;

use crate::channel::EcChannel;
use crate::errors::FanControlError;
use crate::fan::FanChannel;
use crate::registers::{CUSTOM_PROFILE_BIT, FAN_SPEED_MAX, REG_CUSTOM_PROFILE};
use crate::speed::FanSpeedController;
use crate::table::FanTableController;

/// Registered device name. Deliberately distinct from the upstream
/// uniwill-laptop driver so the two never claim automatic-curve control of
/// the same hardware.
pub const DEVICE_NAME: &str = "uniwill_ibg10_fanctl";

/// Enable value exposed on the pwm channels: 1 = host-manual active.
pub const PWM_ENABLE_MANUAL: i64 = 1;
/// Enable value exposed on the pwm channels: 2 = firmware-automatic.
pub const PWM_ENABLE_AUTOMATIC: i64 = 2;

/// Sensor-channel attributes served by the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorAttr {
    TempInput,
    TempLabel,
    PwmInput,
    PwmEnable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Hidden,
    ReadOnly,
    ReadWrite,
}

pub struct SensorBridge {
    table: Arc<FanTableController>,
    speed: FanSpeedController,
}

impl SensorBridge {
    pub fn new(ec: Arc<EcChannel>) -> Self {
        let table = Arc::new(FanTableController::new(Arc::clone(&ec)));

        // One-time mode recovery: a fresh process starts in Automatic, but
        // an earlier invocation may have left the custom profile active.
        // Without this, an explicit restore request would no-op.
        match ec.read(REG_CUSTOM_PROFILE) {
            Ok(val) if val & CUSTOM_PROFILE_BIT != 0 => table.assume_custom(),
            Ok(_) => {}
            Err(e) => warn!("could not probe fan mode, assuming automatic: {}", e),
        }

        let speed = FanSpeedController::new(ec, Arc::clone(&table));
        Self { table, speed }
    }

    pub fn visibility(attr: SensorAttr) -> Access {
        match attr {
            SensorAttr::TempInput | SensorAttr::TempLabel => Access::ReadOnly,
            SensorAttr::PwmInput | SensorAttr::PwmEnable => Access::ReadWrite,
        }
    }

    /// Read a numeric channel value.
    ///
    /// Temperature is milli-degrees C; pwm duty is scaled back to 0–255;
    /// pwm enable reports 1 (manual) or 2 (automatic).
    pub fn read(&self, attr: SensorAttr, channel: usize) -> Result<i64, FanControlError> {
        match attr {
            SensorAttr::TempInput => {
                require_channel(channel, 1)?;
                Ok(self.speed.temperature_mdeg()? as i64)
            }
            SensorAttr::PwmInput => {
                let fan = fan_channel(channel)?;
                let raw = self.speed.speed(fan)?;
                Ok(raw as i64 * 255 / FAN_SPEED_MAX as i64)
            }
            SensorAttr::PwmEnable => {
                fan_channel(channel)?;
                Ok(if self.table.is_custom() {
                    PWM_ENABLE_MANUAL
                } else {
                    PWM_ENABLE_AUTOMATIC
                })
            }
            SensorAttr::TempLabel => Err(FanControlError::InvalidArgument(
                "label is not a numeric attribute".into(),
            )),
        }
    }

    pub fn read_label(&self, attr: SensorAttr, channel: usize) -> Result<&'static str, FanControlError> {
        match attr {
            SensorAttr::TempLabel => {
                require_channel(channel, 1)?;
                Ok("CPU")
            }
            _ => Err(FanControlError::InvalidArgument(
                "attribute has no label".into(),
            )),
        }
    }

    /// Write a channel value. Arguments are validated before any hardware
    /// access.
    pub fn write(&self, attr: SensorAttr, channel: usize, value: i64) -> Result<(), FanControlError> {
        match attr {
            SensorAttr::PwmInput => {
                let fan = fan_channel(channel)?;
                if !(0..=255).contains(&value) {
                    return Err(FanControlError::InvalidArgument(format!(
                        "pwm duty {value} out of range (0–255)"
                    )));
                }
                self.speed.set_speed(fan, value as u8)
            }
            SensorAttr::PwmEnable => {
                fan_channel(channel)?;
                match value {
                    PWM_ENABLE_MANUAL => self.table.enter_custom_table(),
                    PWM_ENABLE_AUTOMATIC => self.table.restore_automatic(),
                    _ => Err(FanControlError::InvalidArgument(format!(
                        "pwm enable {value} not in {{1, 2}}"
                    ))),
                }
            }
            SensorAttr::TempInput | SensorAttr::TempLabel => Err(
                FanControlError::InvalidArgument("attribute is read-only".into()),
            ),
        }
    }

    /// Module-unload equivalent: unconditionally hand control back to the
    /// firmware so a stale manual speed never outlives the host side.
    /// Must run before any other resource is released.
    pub fn shutdown(&self) {
        if let Err(e) = self.table.restore_automatic() {
            warn!("teardown restore failed: {}", e);
        }
    }
}

fn fan_channel(channel: usize) -> Result<FanChannel, FanControlError> {
    FanChannel::ALL
        .get(channel)
        .copied()
        .ok_or_else(|| FanControlError::InvalidArgument(format!("no fan channel {channel}")))
}

fn require_channel(channel: usize, count: usize) -> Result<(), FanControlError> {
    if channel < count {
        Ok(())
    } else {
        Err(FanControlError::InvalidArgument(format!(
            "no channel {channel}"
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registers::*;
    use crate::test_support::FakeEc;

    fn bridge() -> (Arc<FakeEc>, SensorBridge) {
        let fake = Arc::new(FakeEc::new());
        let ec = Arc::new(EcChannel::new(fake.clone()));
        let bridge = SensorBridge::new(ec);
        fake.clear_log(); // drop the construction-time mode probe
        (fake, bridge)
    }

    #[test]
    fn temp_input_and_label() {
        let (fake, bridge) = bridge();
        fake.set(REG_FAN1_TEMP, 45);

        assert_eq!(bridge.read(SensorAttr::TempInput, 0).unwrap(), 45_000);
        assert_eq!(bridge.read_label(SensorAttr::TempLabel, 0).unwrap(), "CPU");
        assert!(bridge.read(SensorAttr::TempInput, 1).is_err());
    }

    #[test]
    fn pwm_input_scales_to_duty() {
        let (fake, bridge) = bridge();
        fake.set(REG_FAN1_SPEED, 200);
        fake.set(REG_FAN2_SPEED, 100);

        assert_eq!(bridge.read(SensorAttr::PwmInput, 0).unwrap(), 255);
        assert_eq!(bridge.read(SensorAttr::PwmInput, 1).unwrap(), 127);
    }

    #[test]
    fn pwm_enable_reflects_mode() {
        let (_fake, bridge) = bridge();
        assert_eq!(
            bridge.read(SensorAttr::PwmEnable, 0).unwrap(),
            PWM_ENABLE_AUTOMATIC
        );

        bridge.write(SensorAttr::PwmEnable, 0, PWM_ENABLE_MANUAL).unwrap();
        assert_eq!(
            bridge.read(SensorAttr::PwmEnable, 1).unwrap(),
            PWM_ENABLE_MANUAL
        );

        bridge.write(SensorAttr::PwmEnable, 0, PWM_ENABLE_AUTOMATIC).unwrap();
        assert_eq!(
            bridge.read(SensorAttr::PwmEnable, 0).unwrap(),
            PWM_ENABLE_AUTOMATIC
        );
    }

    #[test]
    fn write_validates_before_hardware_access() {
        let (fake, bridge) = bridge();

        assert!(bridge.write(SensorAttr::PwmInput, 0, 256).is_err());
        assert!(bridge.write(SensorAttr::PwmInput, 0, -1).is_err());
        assert!(bridge.write(SensorAttr::PwmEnable, 0, 3).is_err());
        assert!(bridge.write(SensorAttr::PwmInput, 2, 128).is_err());
        assert_eq!(fake.call_count(), 0);
    }

    #[test]
    fn pwm_write_drives_fan() {
        let (fake, bridge) = bridge();

        bridge.write(SensorAttr::PwmInput, 1, 128).unwrap();
        assert_eq!(fake.get(REG_FAN2_SPEED), 100);
        assert_eq!(fake.get(REG_GPU_TABLE_FAN_SPEED), 100);
        assert_eq!(fake.get(REG_MANUAL_MODE), 0x01);
    }

    #[test]
    fn visibility_matches_contract() {
        assert_eq!(SensorBridge::visibility(SensorAttr::TempInput), Access::ReadOnly);
        assert_eq!(SensorBridge::visibility(SensorAttr::TempLabel), Access::ReadOnly);
        assert_eq!(SensorBridge::visibility(SensorAttr::PwmInput), Access::ReadWrite);
        assert_eq!(SensorBridge::visibility(SensorAttr::PwmEnable), Access::ReadWrite);
    }

    #[test]
    fn shutdown_restores_automatic_from_manual() {
        let (fake, bridge) = bridge();
        bridge.write(SensorAttr::PwmInput, 0, 200).unwrap();
        fake.clear_log();

        bridge.shutdown();
        assert_eq!(
            bridge.read(SensorAttr::PwmEnable, 0).unwrap(),
            PWM_ENABLE_AUTOMATIC
        );
        assert_eq!(fake.get(REG_CUSTOM_PROFILE), 0);
        assert_eq!(fake.get(REG_MANUAL_MODE), 0);
        assert_eq!(fake.write_count(), 4);
    }

    #[test]
    fn shutdown_when_automatic_writes_nothing() {
        let (fake, bridge) = bridge();
        bridge.shutdown();
        assert_eq!(fake.call_count(), 0);
    }

    #[test]
    fn mode_recovered_from_profile_bit() {
        let fake = Arc::new(FakeEc::new());
        fake.set(REG_CUSTOM_PROFILE, CUSTOM_PROFILE_BIT);
        let ec = Arc::new(EcChannel::new(fake.clone()));
        let bridge = SensorBridge::new(ec);

        assert_eq!(
            bridge.read(SensorAttr::PwmEnable, 0).unwrap(),
            PWM_ENABLE_MANUAL
        );
    }
}
