//! JPEG marker codes (the byte after `FF`).

pub(crate) const TEM: u8 = 0x01;
pub(crate) const SOF0: u8 = 0xC0;
pub(crate) const SOF3: u8 = 0xC3;
pub(crate) const DHT: u8 = 0xC4;
pub(crate) const JPG: u8 = 0xC8;
pub(crate) const DAC: u8 = 0xCC;
pub(crate) const RST0: u8 = 0xD0;
pub(crate) const RST7: u8 = 0xD7;
pub(crate) const SOI: u8 = 0xD8;
pub(crate) const EOI: u8 = 0xD9;
pub(crate) const SOS: u8 = 0xDA;
pub(crate) const DQT: u8 = 0xDB;
pub(crate) const DNL: u8 = 0xDC;
pub(crate) const DRI: u8 = 0xDD;
pub(crate) const DHP: u8 = 0xDE;
pub(crate) const EXP: u8 = 0xDF;
pub(crate) const APP0: u8 = 0xE0;
pub(crate) const APP15: u8 = 0xEF;
pub(crate) const COM: u8 = 0xFE;

/// SOF markers for processes this parser does not handle: differential,
/// and arithmetic-coded frames.
pub(crate) fn is_unsupported_sof(code: u8) -> bool {
    matches!(code, 0xC5..=0xC7 | 0xC9..=0xCB | 0xCD..=0xCF)
}

/// Short name for log messages.
pub(crate) fn name(code: u8) -> &'static str {
    match code {
        TEM => "TEM",
        SOF0..=SOF3 => "SOF",
        DHT => "DHT",
        JPG => "JPG",
        DAC => "DAC",
        c if is_unsupported_sof(c) => "SOF",
        RST0..=RST7 => "RST",
        SOI => "SOI",
        EOI => "EOI",
        SOS => "SOS",
        DQT => "DQT",
        DNL => "DNL",
        DRI => "DRI",
        DHP => "DHP",
        EXP => "EXP",
        APP0..=APP15 => "APP",
        COM => "COM",
        _ => "reserved",
    }
}
