//! Shared in-memory EC fake for unit tests.
//!
//! Emulates the management method over a register map, with scriptable
//! failure injection and a log of every call (including failed attempts)
//! carrying entry/exit timestamps for overlap checks.

use std::collections::HashMap;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

use crate::errors::FanControlError;
use crate::platform::{EcTransport, ARG_BUF_LEN};

pub const OP_WRITE: u8 = 0;
pub const OP_READ: u8 = 1;

#[derive(Debug, Clone)]
pub struct CallRecord {
    pub addr: u16,
    pub op: u8,
    pub value: u8,
    pub started: Instant,
    pub finished: Instant,
}

#[derive(Default)]
struct Inner {
    registers: HashMap<u16, u8>,
    fail_next: usize,
    short_reply_next: usize,
    fail_addrs: HashMap<u16, usize>,
    records: Vec<CallRecord>,
}

pub struct FakeEc {
    inner: Mutex<Inner>,
}

impl FakeEc {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Seed a register value.
    pub fn set(&self, addr: u16, value: u8) {
        self.inner.lock().unwrap().registers.insert(addr, value);
    }

    /// Current register value (0 if never written).
    pub fn get(&self, addr: u16) -> u8 {
        *self.inner.lock().unwrap().registers.get(&addr).unwrap_or(&0)
    }

    /// Fail the next `n` calls, regardless of address.
    pub fn fail_times(&self, n: usize) {
        self.inner.lock().unwrap().fail_next = n;
    }

    /// Fail the next `n` calls touching `addr`.
    pub fn fail_addr(&self, addr: u16, n: usize) {
        self.inner.lock().unwrap().fail_addrs.insert(addr, n);
    }

    /// Answer the next `n` reads with an empty reply buffer.
    pub fn short_reply_times(&self, n: usize) {
        self.inner.lock().unwrap().short_reply_next = n;
    }

    pub fn records(&self) -> Vec<CallRecord> {
        self.inner.lock().unwrap().records.clone()
    }

    /// All write operations as (addr, value), in order, including retries.
    pub fn writes(&self) -> Vec<(u16, u8)> {
        self.inner
            .lock()
            .unwrap()
            .records
            .iter()
            .filter(|r| r.op == OP_WRITE)
            .map(|r| (r.addr, r.value))
            .collect()
    }

    pub fn write_count(&self) -> usize {
        self.writes().len()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().unwrap().records.len()
    }

    pub fn clear_log(&self) {
        self.inner.lock().unwrap().records.clear();
    }
}

impl EcTransport for FakeEc {
    fn evaluate(&self, args: &[u8; ARG_BUF_LEN]) -> Result<Vec<u8>, FanControlError> {
        let addr = u16::from_le_bytes([args[0], args[1]]);
        let value = args[2];
        let op = args[5];

        let started = Instant::now();
        // Keep the call open briefly so a concurrent caller would be
        // observable as an overlapping record.
        thread::sleep(Duration::from_millis(1));

        let mut inner = self.inner.lock().unwrap();

        let inject_failure = if inner.fail_next > 0 {
            inner.fail_next -= 1;
            true
        } else {
            match inner.fail_addrs.get_mut(&addr) {
                Some(n) if *n > 0 => {
                    *n -= 1;
                    true
                }
                _ => false,
            }
        };

        let result = if inject_failure {
            Err(FanControlError::Platform(format!(
                "injected failure at {addr:#06x}"
            )))
        } else if op == OP_READ {
            if inner.short_reply_next > 0 {
                inner.short_reply_next -= 1;
                Ok(Vec::new())
            } else {
                Ok(vec![*inner.registers.get(&addr).unwrap_or(&0)])
            }
        } else {
            inner.registers.insert(addr, value);
            Ok(Vec::new())
        };

        inner.records.push(CallRecord {
            addr,
            op,
            value,
            started,
            finished: Instant::now(),
        });

        result
    }
}
