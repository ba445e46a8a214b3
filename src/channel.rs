//! Serialized single-register access to the embedded controller.
//!
//! Every read and write is one blocking management-method call. A single
//! mutex serializes all transactions so at most one is in flight at a time;
//! for writes the mutex is held across the whole retry sequence so a second
//! caller cannot interleave with a retry the EC might treat as out of order.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use log::{debug, error};

use crate::errors::FanControlError;
use crate::platform::{EcTransport, ARG_BUF_LEN};

/// Operation selector at byte 5 of the request buffer.
const OP_WRITE: u8 = 0;
const OP_READ: u8 = 1;

/// Total write attempts before giving up.
const WRITE_ATTEMPTS: u32 = 3;
/// Pause between write attempts.
const WRITE_RETRY_DELAY: Duration = Duration::from_millis(50);

/// Exclusive-access channel to EC registers (16-bit address, 8-bit value).
///
/// There is no multi-register atomic transaction: compound sequences built
/// on top of this are only atomic at single-register granularity.
pub struct EcChannel {
    transport: Arc<dyn EcTransport>,
    lock: Mutex<()>,
}

impl EcChannel {
    pub fn new(transport: Arc<dyn EcTransport>) -> Self {
        Self {
            transport,
            lock: Mutex::new(()),
        }
    }

    /// Read one register. No retry: a failed or short reply surfaces
    /// immediately as a communication error.
    pub fn read(&self, addr: u16) -> Result<u8, FanControlError> {
        let _guard = self.acquire();

        let args = encode_request(addr, 0, OP_READ);
        match self.transport.evaluate(&args) {
            Ok(reply) => match reply.first() {
                Some(&value) => Ok(value),
                None => {
                    error!("short EC reply for register {:#06x}", addr);
                    Err(FanControlError::Ec(addr))
                }
            },
            Err(e) => {
                error!("EC read failed for register {:#06x}: {}", addr, e);
                Err(FanControlError::Ec(addr))
            }
        }
    }

    /// Write one register with up to [`WRITE_ATTEMPTS`] attempts, pausing
    /// [`WRITE_RETRY_DELAY`] between them. The lock is held for the whole
    /// sequence, including the pauses.
    pub fn write(&self, addr: u16, value: u8) -> Result<(), FanControlError> {
        let _guard = self.acquire();

        let args = encode_request(addr, value, OP_WRITE);
        for attempt in 1..=WRITE_ATTEMPTS {
            match self.transport.evaluate(&args) {
                Ok(_) => return Ok(()),
                Err(e) if attempt < WRITE_ATTEMPTS => {
                    debug!(
                        "EC write attempt {}/{} for register {:#06x} failed: {}",
                        attempt, WRITE_ATTEMPTS, addr, e
                    );
                    thread::sleep(WRITE_RETRY_DELAY);
                }
                Err(e) => {
                    error!(
                        "EC write failed for register {:#06x} after {} attempts: {}",
                        addr, WRITE_ATTEMPTS, e
                    );
                }
            }
        }
        Err(FanControlError::Ec(addr))
    }

    fn acquire(&self) -> std::sync::MutexGuard<'_, ()> {
        // A poisoned lock only means another thread panicked mid-call; the
        // EC transaction itself carries no in-process state to corrupt.
        self.lock.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Build the fixed-size management-method argument buffer: register address
/// little-endian at bytes 0–1, value at byte 2, selector at byte 5.
fn encode_request(addr: u16, value: u8, op: u8) -> [u8; ARG_BUF_LEN] {
    let mut args = [0u8; ARG_BUF_LEN];
    let addr_bytes = addr.to_le_bytes();
    args[0] = addr_bytes[0];
    args[1] = addr_bytes[1];
    args[2] = value;
    args[5] = op;
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{FakeEc, OP_READ as REC_READ, OP_WRITE as REC_WRITE};

    fn channel_with_fake() -> (Arc<FakeEc>, EcChannel) {
        let fake = Arc::new(FakeEc::new());
        let channel = EcChannel::new(fake.clone());
        (fake, channel)
    }

    #[test]
    fn encode_request_layout() {
        let args = encode_request(0x07c5, 0x40, OP_WRITE);
        assert_eq!(args[0], 0xc5);
        assert_eq!(args[1], 0x07);
        assert_eq!(args[2], 0x40);
        assert_eq!(args[5], 0);
        assert!(args[3..5].iter().all(|&b| b == 0));
        assert!(args[6..].iter().all(|&b| b == 0));
    }

    #[test]
    fn write_then_read_round_trips() {
        let (_fake, channel) = channel_with_fake();
        channel.write(0x1804, 150).unwrap();
        assert_eq!(channel.read(0x1804).unwrap(), 150);
    }

    #[test]
    fn read_does_not_retry() {
        let (fake, channel) = channel_with_fake();
        fake.fail_times(1);

        let result = channel.read(0x043e);
        assert!(matches!(result, Err(FanControlError::Ec(0x043e))));
        assert_eq!(fake.call_count(), 1);
    }

    #[test]
    fn read_short_reply_is_error() {
        let (fake, channel) = channel_with_fake();
        fake.short_reply_times(1);

        let result = channel.read(0x043e);
        assert!(matches!(result, Err(FanControlError::Ec(0x043e))));
    }

    #[test]
    fn write_retries_twice_then_succeeds() {
        let (fake, channel) = channel_with_fake();
        fake.fail_times(2);

        channel.write(0x1804, 99).unwrap();
        assert_eq!(fake.call_count(), 3);
        assert_eq!(fake.get(0x1804), 99);
    }

    #[test]
    fn write_gives_up_after_three_attempts() {
        let (fake, channel) = channel_with_fake();
        fake.fail_times(3);

        let result = channel.write(0x1804, 99);
        assert!(matches!(result, Err(FanControlError::Ec(0x1804))));
        assert_eq!(fake.call_count(), 3);
    }

    #[test]
    fn concurrent_writes_never_overlap() {
        let (fake, channel) = channel_with_fake();
        let channel = Arc::new(channel);

        let mut handles = Vec::new();
        for t in 0..4u16 {
            let channel = Arc::clone(&channel);
            handles.push(std::thread::spawn(move || {
                for i in 0..5u16 {
                    channel.write(0x0f00 + t * 16 + i, i as u8).unwrap();
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let mut records = fake.records();
        assert_eq!(records.len(), 20);
        records.sort_by_key(|r| r.started);
        for pair in records.windows(2) {
            assert!(
                pair[1].started >= pair[0].finished,
                "transport calls overlapped"
            );
        }
    }

    #[test]
    fn read_and_write_record_expected_ops() {
        let (fake, channel) = channel_with_fake();
        channel.write(0x0741, 1).unwrap();
        channel.read(0x0741).unwrap();

        let records = fake.records();
        assert_eq!(records[0].op, REC_WRITE);
        assert_eq!(records[1].op, REC_READ);
    }
}
