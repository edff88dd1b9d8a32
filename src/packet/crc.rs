//! CRC-16 used by the downstream packet

/// Reflected polynomial 0x8005.
pub const CRC16_POLY_REFLECTED: u16 = 0xA001;
pub const CRC16_INIT: u16 = 0xFFFF;

/// Reflected CRC-16 with polynomial 0xA001 and initial value 0xFFFF
/// (the MODBUS variant). Pure: equal input always gives equal output.
pub fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(CRC16_INIT, |crc, &byte| {
        (0..8).fold(crc ^ u16::from(byte), |crc, _| {
            if crc & 0x0001 != 0 { (crc >> 1) ^ CRC16_POLY_REFLECTED } else { crc >> 1 }
        })
    })
}
