use super::ReferenceModel;
use crate::monitor::ObservationRecord;
use crate::value::BinaryValue;
use crate::HarnessResult;

pub const CRC16_INIT: u16 = 0xffff;
const POLY: u16 = 0x1021;

/// One byte of CRC-16/CCITT, MSB first, not reflected.
pub fn crc16_update(byte: u8, reg: u16) -> u16 {
    let mut reg = reg ^ ((byte as u16) << 8);
    for _ in 0..8 {
        reg = if reg & 0x8000 != 0 {
            (reg << 1) ^ POLY
        } else {
            reg << 1
        };
    }
    reg
}

pub fn crc16(bytes: &[u8], init: u16) -> u16 {
    bytes.iter().fold(init, |reg, byte| crc16_update(*byte, reg))
}

/// Running checksum over every byte the design accepted.
///
/// Only cycles with enable high and reset low advance the register. Any other
/// cycle leaves it as it was.
#[derive(Debug, Clone)]
pub struct Crc16Model {
    reset: String,
    enable: String,
    data: String,
}

impl Crc16Model {
    pub fn new() -> Self {
        Crc16Model {
            reset: "rst".to_string(),
            enable: "en".to_string(),
            data: "data".to_string(),
        }
    }
}

impl Default for Crc16Model {
    fn default() -> Self {
        Self::new()
    }
}

impl ReferenceModel for Crc16Model {
    type State = u16;

    fn initial_state(&self) -> u16 {
        CRC16_INIT
    }

    fn step(&self, reg: &u16, record: &ObservationRecord) -> HarnessResult<u16> {
        let accepted = !record.require(&self.reset)?.as_bool() && record.require(&self.enable)?.as_bool();
        if !accepted {
            return Ok(*reg);
        }
        let byte = record.require(&self.data)?.as_integer() as u8;
        Ok(crc16_update(byte, *reg))
    }

    fn output(&self, reg: &u16) -> HarnessResult<BinaryValue> {
        BinaryValue::new(16, *reg as u64)
    }
}
