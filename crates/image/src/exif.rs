//! EXIF GPS extraction.
//!
//! Walks the JPEG APP1 `Exif` segment (or a bare TIFF file), follows the
//! GPSInfo IFD pointer and converts the degree/minute/second rationals into a
//! decimal [`Coordinate`]. Every parse failure is reported as "no GPS data";
//! a photo without usable tags is not an error.

use sow_geo::Coordinate;

const EXIF_HEADER: &[u8] = b"Exif\0\0";

const TAG_GPS_IFD: u16 = 0x8825;
const TAG_GPS_LATITUDE_REF: u16 = 0x0001;
const TAG_GPS_LATITUDE: u16 = 0x0002;
const TAG_GPS_LONGITUDE_REF: u16 = 0x0003;
const TAG_GPS_LONGITUDE: u16 = 0x0004;

const TYPE_ASCII: u16 = 2;
const TYPE_LONG: u16 = 4;
const TYPE_RATIONAL: u16 = 5;

/// Extract the GPS position embedded in a photo, if any.
///
/// Accepts JPEG or TIFF bytes. Returns `None` when the photo carries no GPS
/// tags or the tags cannot be parsed.
pub fn extract_gps(data: &[u8]) -> Option<Coordinate> {
    let tiff = if data.starts_with(&[0xFF, 0xD8]) {
        find_exif_segment(data)?
    } else {
        data
    };

    let reader = TiffReader::new(tiff)?;
    let ifd0 = reader.u32_at(4)? as usize;
    let gps_ifd = reader.find_entry(ifd0, TAG_GPS_IFD)?;
    if gps_ifd.kind != TYPE_LONG {
        return None;
    }
    let gps_offset = reader.u32_at(gps_ifd.value_offset)? as usize;

    let lat_ref = reader.ascii_ref(gps_offset, TAG_GPS_LATITUDE_REF)?;
    let lat = reader.dms(gps_offset, TAG_GPS_LATITUDE)?;
    let lng_ref = reader.ascii_ref(gps_offset, TAG_GPS_LONGITUDE_REF)?;
    let lng = reader.dms(gps_offset, TAG_GPS_LONGITUDE)?;

    let latitude = match lat_ref {
        b'N' => lat,
        b'S' => -lat,
        _ => return None,
    };
    let longitude = match lng_ref {
        b'E' => lng,
        b'W' => -lng,
        _ => return None,
    };

    let coord = Coordinate::new(latitude, longitude);
    if !coord.is_valid() {
        tracing::debug!(latitude, longitude, "Discarding out-of-range EXIF GPS");
        return None;
    }
    Some(coord)
}

/// Whether the JPEG carries an APP1 Exif segment.
pub fn has_exif(data: &[u8]) -> bool {
    data.starts_with(&[0xFF, 0xD8]) && find_exif_segment(data).is_some()
}

/// Locate the TIFF payload of the first APP1 Exif segment.
fn find_exif_segment(data: &[u8]) -> Option<&[u8]> {
    let mut i = 2;

    while i + 4 <= data.len() {
        if data[i] != 0xFF {
            return None;
        }
        let marker = data[i + 1];

        // Start of scan: metadata segments are over
        if marker == 0xDA || marker == 0xD9 {
            return None;
        }

        let length = u16::from_be_bytes([data[i + 2], data[i + 3]]) as usize;
        let body_start = i + 4;
        let body_end = (i + 2 + length).min(data.len());
        if length < 2 || body_start > body_end {
            return None;
        }

        if marker == 0xE1 {
            let body = &data[body_start..body_end];
            if let Some(tiff) = body.strip_prefix(EXIF_HEADER) {
                return Some(tiff);
            }
        }

        i += 2 + length;
    }

    None
}

struct IfdEntry {
    kind: u16,
    count: u32,
    /// Absolute offset of the 4-byte value field inside the TIFF payload
    value_offset: usize,
}

struct TiffReader<'a> {
    data: &'a [u8],
    little_endian: bool,
}

impl<'a> TiffReader<'a> {
    fn new(data: &'a [u8]) -> Option<Self> {
        let little_endian = match data.get(0..4)? {
            [0x49, 0x49, 0x2A, 0x00] => true,
            [0x4D, 0x4D, 0x00, 0x2A] => false,
            _ => return None,
        };
        Some(Self { data, little_endian })
    }

    fn u16_at(&self, offset: usize) -> Option<u16> {
        let bytes: [u8; 2] = self.data.get(offset..offset + 2)?.try_into().ok()?;
        Some(if self.little_endian {
            u16::from_le_bytes(bytes)
        } else {
            u16::from_be_bytes(bytes)
        })
    }

    fn u32_at(&self, offset: usize) -> Option<u32> {
        let bytes: [u8; 4] = self.data.get(offset..offset + 4)?.try_into().ok()?;
        Some(if self.little_endian {
            u32::from_le_bytes(bytes)
        } else {
            u32::from_be_bytes(bytes)
        })
    }

    fn find_entry(&self, ifd_offset: usize, tag: u16) -> Option<IfdEntry> {
        let count = self.u16_at(ifd_offset)? as usize;
        (0..count).find_map(|n| {
            let entry = ifd_offset + 2 + n * 12;
            if self.u16_at(entry)? != tag {
                return None;
            }
            Some(IfdEntry {
                kind: self.u16_at(entry + 2)?,
                count: self.u32_at(entry + 4)?,
                value_offset: entry + 8,
            })
        })
    }

    /// First character of a short ASCII tag (`N`/`S`/`E`/`W`).
    fn ascii_ref(&self, ifd_offset: usize, tag: u16) -> Option<u8> {
        let entry = self.find_entry(ifd_offset, tag)?;
        if entry.kind != TYPE_ASCII || entry.count == 0 {
            return None;
        }
        // Values of up to four bytes are stored inline
        self.data.get(entry.value_offset).copied()
    }

    /// Degrees/minutes/seconds rationals as decimal degrees.
    fn dms(&self, ifd_offset: usize, tag: u16) -> Option<f64> {
        let entry = self.find_entry(ifd_offset, tag)?;
        if entry.kind != TYPE_RATIONAL || entry.count != 3 {
            return None;
        }
        let start = self.u32_at(entry.value_offset)? as usize;

        let rational = |n: usize| -> Option<f64> {
            let num = self.u32_at(start + n * 8)?;
            let den = self.u32_at(start + n * 8 + 4)?;
            if den == 0 {
                return None;
            }
            Some(num as f64 / den as f64)
        };

        Some(rational(0)? + rational(1)? / 60.0 + rational(2)? / 3600.0)
    }
}

/// Build a minimal little-endian TIFF/EXIF payload holding one GPS position.
///
/// Shared by this module's tests and the `fixtures` feature.
#[cfg(any(test, feature = "fixtures"))]
pub(crate) fn gps_tiff_payload(coord: &Coordinate) -> Vec<u8> {
    fn push_entry(buf: &mut Vec<u8>, tag: u16, kind: u16, count: u32, value: [u8; 4]) {
        buf.extend_from_slice(&tag.to_le_bytes());
        buf.extend_from_slice(&kind.to_le_bytes());
        buf.extend_from_slice(&count.to_le_bytes());
        buf.extend_from_slice(&value);
    }

    fn push_dms(buf: &mut Vec<u8>, decimal: f64) {
        let decimal = decimal.abs();
        let degrees = decimal.trunc();
        let minutes = ((decimal - degrees) * 60.0).trunc();
        let seconds = (decimal - degrees - minutes / 60.0) * 3600.0;
        for (num, den) in [
            (degrees as u32, 1u32),
            (minutes as u32, 1u32),
            ((seconds * 10_000.0).round() as u32, 10_000u32),
        ] {
            buf.extend_from_slice(&num.to_le_bytes());
            buf.extend_from_slice(&den.to_le_bytes());
        }
    }

    // Layout: header(8) | IFD0 (2 + 12 + 4) | GPS IFD (2 + 4*12 + 4) | rationals
    const IFD0: u32 = 8;
    const GPS_IFD: u32 = IFD0 + 2 + 12 + 4;
    const LAT_DATA: u32 = GPS_IFD + 2 + 4 * 12 + 4;
    const LNG_DATA: u32 = LAT_DATA + 24;

    let mut buf = Vec::with_capacity(LNG_DATA as usize + 24);
    buf.extend_from_slice(&[0x49, 0x49, 0x2A, 0x00]);
    buf.extend_from_slice(&IFD0.to_le_bytes());

    buf.extend_from_slice(&1u16.to_le_bytes());
    push_entry(&mut buf, TAG_GPS_IFD, TYPE_LONG, 1, GPS_IFD.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());

    let lat_ref = if coord.latitude >= 0.0 { b'N' } else { b'S' };
    let lng_ref = if coord.longitude >= 0.0 { b'E' } else { b'W' };
    buf.extend_from_slice(&4u16.to_le_bytes());
    push_entry(&mut buf, TAG_GPS_LATITUDE_REF, TYPE_ASCII, 2, [lat_ref, 0, 0, 0]);
    push_entry(&mut buf, TAG_GPS_LATITUDE, TYPE_RATIONAL, 3, LAT_DATA.to_le_bytes());
    push_entry(&mut buf, TAG_GPS_LONGITUDE_REF, TYPE_ASCII, 2, [lng_ref, 0, 0, 0]);
    push_entry(&mut buf, TAG_GPS_LONGITUDE, TYPE_RATIONAL, 3, LNG_DATA.to_le_bytes());
    buf.extend_from_slice(&0u32.to_le_bytes());

    push_dms(&mut buf, coord.latitude);
    push_dms(&mut buf, coord.longitude);
    buf
}

/// Insert an APP1 Exif segment right after the SOI marker of a JPEG.
#[cfg(any(test, feature = "fixtures"))]
pub(crate) fn splice_exif(jpeg: &[u8], tiff: &[u8]) -> Vec<u8> {
    let length = (2 + EXIF_HEADER.len() + tiff.len()) as u16;
    let mut out = Vec::with_capacity(jpeg.len() + length as usize + 2);
    out.extend_from_slice(&jpeg[..2]);
    out.extend_from_slice(&[0xFF, 0xE1]);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(EXIF_HEADER);
    out.extend_from_slice(tiff);
    out.extend_from_slice(&jpeg[2..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    /// SOI + JFIF APP0 + EOI; enough structure for the segment walker.
    fn bare_jpeg() -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10];
        data.extend_from_slice(b"JFIF\0\x01\x01\0\0\x01\0\x01\0\0");
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn test_extract_gps_north_east() {
        let site = Coordinate::new(25.0330, 121.5654);
        let jpeg = splice_exif(&bare_jpeg(), &gps_tiff_payload(&site));

        let coord = extract_gps(&jpeg).unwrap();
        assert!((coord.latitude - 25.0330).abs() < 1e-5, "lat {}", coord.latitude);
        assert!((coord.longitude - 121.5654).abs() < 1e-5, "lng {}", coord.longitude);
    }

    #[test]
    fn test_extract_gps_south_west() {
        let site = Coordinate::new(-33.8688, -70.6693);
        let jpeg = splice_exif(&bare_jpeg(), &gps_tiff_payload(&site));

        let coord = extract_gps(&jpeg).unwrap();
        assert!((coord.latitude + 33.8688).abs() < 1e-5);
        assert!((coord.longitude + 70.6693).abs() < 1e-5);
    }

    #[test]
    fn test_bare_tiff_payload() {
        let tiff = gps_tiff_payload(&Coordinate::new(23.9872, 121.6016));
        let coord = extract_gps(&tiff).unwrap();
        assert!((coord.latitude - 23.9872).abs() < 1e-5);
    }

    #[test]
    fn test_jpeg_without_exif() {
        assert!(extract_gps(&bare_jpeg()).is_none());
    }

    #[test]
    fn test_has_exif() {
        assert!(!has_exif(&bare_jpeg()));
        let tagged = splice_exif(&bare_jpeg(), &gps_tiff_payload(&Coordinate::new(25.0, 121.5)));
        assert!(has_exif(&tagged));
        assert!(!has_exif(b"not a jpeg"));
    }

    #[test]
    fn test_truncated_exif_is_treated_as_missing() {
        let jpeg = splice_exif(&bare_jpeg(), &gps_tiff_payload(&Coordinate::new(25.0, 121.0)));
        // Cut inside the GPS rationals
        let truncated = &jpeg[..jpeg.len() - 40];
        assert!(extract_gps(truncated).is_none());
    }

    #[test]
    fn test_garbage_is_not_gps() {
        assert!(extract_gps(b"definitely not a photo").is_none());
        assert!(extract_gps(&[]).is_none());
    }
}
