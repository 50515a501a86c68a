//! Fixed-layout ZIP records (local header, central directory header, EOCD)
//!
//! All multi-byte fields are little-endian. Only the subset needed for STORE
//! archives is modelled: no data descriptors, no extra fields, no comments.

use chrono::{Datelike, NaiveDateTime, Timelike};

pub const LOCAL_HEADER_SIG: u32 = 0x0403_4B50;
pub const CENTRAL_HEADER_SIG: u32 = 0x0201_4B50;
pub const EOCD_SIG: u32 = 0x0605_4B50;

/// Version 2.0: the minimum for plain STORE entries
pub const VERSION: u16 = 20;
pub const METHOD_STORE: u16 = 0;
/// General-purpose bit 11: file name is UTF-8
pub const FLAG_UTF8: u16 = 1 << 11;

pub const LOCAL_HEADER_LEN: usize = 30;
pub const CENTRAL_HEADER_LEN: usize = 46;
pub const EOCD_LEN: usize = 22;

/// MS-DOS packed time and date, 2-second resolution, years 1980..=2107
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DosDateTime {
    pub time: u16,
    pub date: u16,
}

impl DosDateTime {
    /// 1980-01-01 00:00:00, the earliest representable instant
    pub const EPOCH: DosDateTime = DosDateTime { time: 0, date: (1 << 5) | 1 };

    pub fn from_datetime(dt: &NaiveDateTime) -> Self {
        let year = dt.year();
        if year < 1980 {
            return Self::EPOCH;
        }
        if year > 2107 {
            return DosDateTime {
                time: (23 << 11) | (59 << 5) | 29,
                date: (127 << 9) | (12 << 5) | 31,
            };
        }
        let date = (((year - 1980) as u16) << 9) | ((dt.month() as u16) << 5) | dt.day() as u16;
        let time = ((dt.hour() as u16) << 11) | ((dt.minute() as u16) << 5) | (dt.second() as u16 / 2);
        DosDateTime { time, date }
    }

    /// Current local wall-clock time
    pub fn now() -> Self {
        Self::from_datetime(&chrono::Local::now().naive_local())
    }
}

/// Fields shared by the local and central headers of one entry
#[derive(Debug, Clone, Copy)]
pub struct EntryFields {
    pub flags: u16,
    pub modified: DosDateTime,
    pub crc32: u32,
    pub size: u32,
    pub name_len: u16,
}

fn put_u16(out: &mut Vec<u8>, v: u16) {
    out.extend_from_slice(&v.to_le_bytes());
}

fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Local file header, written immediately before the name and content
pub fn write_local_header(out: &mut Vec<u8>, f: &EntryFields) {
    put_u32(out, LOCAL_HEADER_SIG);
    put_u16(out, VERSION);
    put_u16(out, f.flags);
    put_u16(out, METHOD_STORE);
    put_u16(out, f.modified.time);
    put_u16(out, f.modified.date);
    put_u32(out, f.crc32);
    put_u32(out, f.size); // compressed
    put_u32(out, f.size); // uncompressed
    put_u16(out, f.name_len);
    put_u16(out, 0); // extra field length
}

/// Central directory header pointing back at a local header
pub fn write_central_header(out: &mut Vec<u8>, f: &EntryFields, local_offset: u32) {
    put_u32(out, CENTRAL_HEADER_SIG);
    put_u16(out, VERSION); // made by
    put_u16(out, VERSION); // needed
    put_u16(out, f.flags);
    put_u16(out, METHOD_STORE);
    put_u16(out, f.modified.time);
    put_u16(out, f.modified.date);
    put_u32(out, f.crc32);
    put_u32(out, f.size);
    put_u32(out, f.size);
    put_u16(out, f.name_len);
    put_u16(out, 0); // extra field length
    put_u16(out, 0); // comment length
    put_u16(out, 0); // disk number start
    put_u16(out, 0); // internal attributes
    put_u32(out, 0); // external attributes
    put_u32(out, local_offset);
}

pub fn write_eocd(out: &mut Vec<u8>, entries: u16, cd_size: u32, cd_offset: u32) {
    put_u32(out, EOCD_SIG);
    put_u16(out, 0); // this disk
    put_u16(out, 0); // disk with central directory
    put_u16(out, entries); // entries on this disk
    put_u16(out, entries); // total entries
    put_u32(out, cd_size);
    put_u32(out, cd_offset);
    put_u16(out, 0); // comment length
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn dos_time_packs_fields() {
        let t = DosDateTime::from_datetime(&at(2024, 3, 15, 13, 45, 31));
        assert_eq!(t.date, ((2024 - 1980) << 9) | (3 << 5) | 15);
        assert_eq!(t.time, (13 << 11) | (45 << 5) | 15);
    }

    #[test]
    fn dos_time_clamps_out_of_range_years() {
        assert_eq!(DosDateTime::from_datetime(&at(1970, 1, 1, 0, 0, 0)), DosDateTime::EPOCH);
        let late = DosDateTime::from_datetime(&at(2200, 6, 1, 0, 0, 0));
        assert_eq!(late.date >> 9, 127);
    }

    #[test]
    fn record_lengths_match_layout() {
        let f = EntryFields {
            flags: 0,
            modified: DosDateTime::EPOCH,
            crc32: 0xDEAD_BEEF,
            size: 3,
            name_len: 5,
        };
        let mut buf = Vec::new();
        write_local_header(&mut buf, &f);
        assert_eq!(buf.len(), LOCAL_HEADER_LEN);
        assert_eq!(&buf[..4], &[0x50, 0x4B, 0x03, 0x04]);
        assert_eq!(&buf[14..18], &0xDEAD_BEEFu32.to_le_bytes());

        buf.clear();
        write_central_header(&mut buf, &f, 0x0102_0304);
        assert_eq!(buf.len(), CENTRAL_HEADER_LEN);
        assert_eq!(&buf[42..46], &[0x04, 0x03, 0x02, 0x01]);

        buf.clear();
        write_eocd(&mut buf, 2, 100, 200);
        assert_eq!(buf.len(), EOCD_LEN);
        assert_eq!(&buf[8..10], &2u16.to_le_bytes());
        assert_eq!(&buf[10..12], &2u16.to_le_bytes());
    }
}
