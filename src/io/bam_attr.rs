/// Typed BAM attributes and their minimal-width binary encoding
use crate::error::Error;
use byteorder::{ByteOrder, LittleEndian};
use std::fmt;
use std::str::FromStr;

/// Attributes the encoder knows how to produce for mapped records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SamAttr {
    /// Number of loci the read maps to
    NumHits,
    /// 1-based index of the alignment among the read's loci
    HitIndex,
    /// Alignment score
    AlignmentScore,
    /// Number of mismatches
    Mismatches,
    /// Junction motifs
    JunctionMotifs,
    /// Junction intron coordinates
    JunctionIntrons,
    /// Strand derived from the junction motifs
    MotifStrand,
    /// Edit distance
    EditDistance,
    /// Mismatch description string
    MismatchString,
    /// Read group
    ReadGroup,
}

impl SamAttr {
    pub fn tag(&self) -> [u8; 2] {
        match self {
            SamAttr::NumHits => *b"NH",
            SamAttr::HitIndex => *b"HI",
            SamAttr::AlignmentScore => *b"AS",
            SamAttr::Mismatches => *b"nM",
            SamAttr::JunctionMotifs => *b"jM",
            SamAttr::JunctionIntrons => *b"jI",
            SamAttr::MotifStrand => *b"XS",
            SamAttr::EditDistance => *b"NM",
            SamAttr::MismatchString => *b"MD",
            SamAttr::ReadGroup => *b"RG",
        }
    }
}

impl FromStr for SamAttr {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "NH" => Ok(SamAttr::NumHits),
            "HI" => Ok(SamAttr::HitIndex),
            "AS" => Ok(SamAttr::AlignmentScore),
            "nM" => Ok(SamAttr::Mismatches),
            "jM" => Ok(SamAttr::JunctionMotifs),
            "jI" => Ok(SamAttr::JunctionIntrons),
            "XS" => Ok(SamAttr::MotifStrand),
            "NM" => Ok(SamAttr::EditDistance),
            "MD" => Ok(SamAttr::MismatchString),
            "RG" => Ok(SamAttr::ReadGroup),
            other => Err(Error::Parameter(format!(
                "unknown/unimplemented SAM attribute (tag): {}",
                other
            ))),
        }
    }
}

impl fmt::Display for SamAttr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = self.tag();
        write!(f, "{}{}", tag[0] as char, tag[1] as char)
    }
}

/// Value of one attribute, typed by its wire encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttrValue<'a> {
    /// Integer written with the narrowest `c`/`s`/`i`/`C`/`S`/`I` type
    Int(i64),
    /// `A`
    Char(u8),
    /// `Z`, NUL-terminated
    String(&'a [u8]),
    /// `B:c`
    Int8Array(&'a [i8]),
    /// `B:i`
    Int32Array(&'a [i32]),
}

/// Smallest negative value accepted for integer attributes.
pub const ATTR_INT_MIN: i64 = -2_147_483_647;
/// Largest value accepted for integer attributes.
pub const ATTR_INT_MAX: i64 = 4_294_967_295;

/// Append one attribute to `buf`; returns the number of bytes written.
///
/// Integers outside `[-2147483647, 4294967295]` are rejected before
/// anything is written.
pub fn write_attr(buf: &mut Vec<u8>, tag: [u8; 2], value: AttrValue<'_>) -> Result<usize, Error> {
    if let AttrValue::Int(x) = value {
        if !(ATTR_INT_MIN..=ATTR_INT_MAX).contains(&x) {
            return Err(Error::Bug(format!(
                "integer out of range for BAM conversion: {} (tag {}{})",
                x, tag[0] as char, tag[1] as char
            )));
        }
    }

    let start = buf.len();
    buf.extend_from_slice(&tag);
    match value {
        AttrValue::Int(x) => write_int(buf, x),
        AttrValue::Char(c) => {
            buf.push(b'A');
            buf.push(c);
        }
        AttrValue::String(s) => {
            buf.push(b'Z');
            buf.extend_from_slice(s);
            buf.push(0);
        }
        AttrValue::Int8Array(values) => {
            buf.extend_from_slice(b"Bc");
            push_i32(buf, values.len() as i32);
            buf.extend(values.iter().map(|&v| v as u8));
        }
        AttrValue::Int32Array(values) => {
            buf.extend_from_slice(b"Bi");
            push_i32(buf, values.len() as i32);
            let at = buf.len();
            buf.resize(at + 4 * values.len(), 0);
            LittleEndian::write_i32_into(values, &mut buf[at..]);
        }
    }
    Ok(buf.len() - start)
}

fn write_int(buf: &mut Vec<u8>, x: i64) {
    if x < 0 {
        if x >= -127 {
            buf.push(b'c');
            buf.push(x as i8 as u8);
        } else if x >= -32767 {
            buf.push(b's');
            buf.extend_from_slice(&(x as i16).to_le_bytes());
        } else {
            buf.push(b'i');
            buf.extend_from_slice(&(x as i32).to_le_bytes());
        }
    } else if x <= 255 {
        buf.push(b'C');
        buf.push(x as u8);
    } else if x <= 65535 {
        buf.push(b'S');
        buf.extend_from_slice(&(x as u16).to_le_bytes());
    } else {
        buf.push(b'I');
        buf.extend_from_slice(&(x as u32).to_le_bytes());
    }
}

fn push_i32(buf: &mut Vec<u8>, v: i32) {
    buf.extend_from_slice(&v.to_le_bytes());
}

#[cfg(test)]
mod tests {
    use super::*;
    use byteorder::ReadBytesExt;
    use std::io::Cursor;

    fn encode_int(x: i64) -> Vec<u8> {
        let mut buf = Vec::new();
        write_attr(&mut buf, *b"XX", AttrValue::Int(x)).unwrap();
        buf
    }

    fn decode_int(buf: &[u8]) -> i64 {
        let mut rdr = Cursor::new(&buf[3..]);
        match buf[2] {
            b'c' => rdr.read_i8().unwrap() as i64,
            b's' => rdr.read_i16::<LittleEndian>().unwrap() as i64,
            b'i' => rdr.read_i32::<LittleEndian>().unwrap() as i64,
            b'C' => rdr.read_u8().unwrap() as i64,
            b'S' => rdr.read_u16::<LittleEndian>().unwrap() as i64,
            b'I' => rdr.read_u32::<LittleEndian>().unwrap() as i64,
            t => panic!("unexpected type {}", t as char),
        }
    }

    #[test]
    fn test_int_width_selection() {
        let cases: &[(i64, u8, usize)] = &[
            (0, b'C', 1),
            (255, b'C', 1),
            (256, b'S', 2),
            (65535, b'S', 2),
            (65536, b'I', 4),
            (4_294_967_295, b'I', 4),
            (-1, b'c', 1),
            (-127, b'c', 1),
            (-128, b's', 2),
            (-32767, b's', 2),
            (-32768, b'i', 4),
            (-2_147_483_647, b'i', 4),
        ];
        for &(value, ty, width) in cases {
            let buf = encode_int(value);
            assert_eq!(&buf[..2], b"XX");
            assert_eq!(buf[2], ty, "type for {}", value);
            assert_eq!(buf.len(), 3 + width, "width for {}", value);
            assert_eq!(decode_int(&buf), value);
        }
    }

    #[test]
    fn test_int_out_of_range() {
        let mut buf = vec![7u8];
        assert!(matches!(
            write_attr(&mut buf, *b"NM", AttrValue::Int(4_294_967_296)),
            Err(Error::Bug(_))
        ));
        assert!(matches!(
            write_attr(&mut buf, *b"NM", AttrValue::Int(-2_147_483_648)),
            Err(Error::Bug(_))
        ));
        // Nothing was appended
        assert_eq!(buf, vec![7u8]);
    }

    #[test]
    fn test_char_and_string() {
        let mut buf = Vec::new();
        assert_eq!(write_attr(&mut buf, *b"XS", AttrValue::Char(b'+')).unwrap(), 4);
        assert_eq!(buf, b"XSA+");

        buf.clear();
        assert_eq!(write_attr(&mut buf, *b"MD", AttrValue::String(b"10A5")).unwrap(), 8);
        assert_eq!(buf, b"MDZ10A5\0");
    }

    #[test]
    fn test_arrays() {
        let mut buf = Vec::new();
        let n = write_attr(&mut buf, *b"jM", AttrValue::Int8Array(&[-1])).unwrap();
        assert_eq!(n, 9);
        assert_eq!(buf, [b'j', b'M', b'B', b'c', 1, 0, 0, 0, 0xFF]);

        buf.clear();
        let n = write_attr(&mut buf, *b"jI", AttrValue::Int32Array(&[101, 600])).unwrap();
        assert_eq!(n, 4 + 4 + 8);
        let mut rdr = Cursor::new(&buf[4..]);
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), 2);
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), 101);
        assert_eq!(rdr.read_i32::<LittleEndian>().unwrap(), 600);
    }

    #[test]
    fn test_attr_from_str() {
        assert_eq!("nM".parse::<SamAttr>().unwrap(), SamAttr::Mismatches);
        assert_eq!("NM".parse::<SamAttr>().unwrap(), SamAttr::EditDistance);
        assert_eq!(SamAttr::JunctionIntrons.to_string(), "jI");
        assert!(matches!("ch".parse::<SamAttr>(), Err(Error::Parameter(_))));
    }
}
