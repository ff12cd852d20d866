//! Binary model format.
//!
//! ```text
//! header : magic u32 | v_dim u32 | aux u8 | count u64
//! record : key u64 | has_v u8 | w f32
//!          [aux]           fea_cnt f32 | z f32 | sqrt_g f32
//!          [has_v]         v f32 * v_dim
//!          [has_v && aux]  v_sqrt_g f32 * v_dim
//! ```
//!
//! Every number is written in native byte order.

use std::io::{self, Read, Write};

use bytemuck::Pod;

use super::{Embedding, SgdEntry};

const MAGIC: u32 = 0x5346_4d31;

/// The leading block of a model stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(super) struct Header {
    pub v_dim: usize,
    pub aux: bool,
    pub count: u64,
}

fn invalid_data<T>(msg: String) -> io::Result<T> {
    Err(io::Error::new(io::ErrorKind::InvalidData, msg))
}

fn write_pod<T: Pod>(out: &mut impl Write, value: T) -> io::Result<()> {
    out.write_all(bytemuck::bytes_of(&value))
}

fn read_pod<T: Pod>(input: &mut dyn Read) -> io::Result<T> {
    let mut value = T::zeroed();
    input.read_exact(bytemuck::bytes_of_mut(&mut value))?;
    Ok(value)
}

fn read_floats(input: &mut dyn Read, n: usize) -> io::Result<Vec<f32>> {
    let mut buf = vec![0.; n];
    input.read_exact(bytemuck::cast_slice_mut(&mut buf))?;
    Ok(buf)
}

impl Header {
    pub fn write(&self, out: &mut impl Write) -> io::Result<()> {
        write_pod(out, MAGIC)?;
        write_pod(out, self.v_dim as u32)?;
        write_pod(out, self.aux as u8)?;
        write_pod(out, self.count)
    }

    pub fn read(input: &mut dyn Read) -> io::Result<Self> {
        let magic: u32 = read_pod(input)?;
        if magic != MAGIC {
            return invalid_data(format!("not a model stream, bad magic {magic:#x}"));
        }

        let v_dim: u32 = read_pod(input)?;
        let aux: u8 = read_pod(input)?;
        let count = read_pod(input)?;

        Ok(Self {
            v_dim: v_dim as usize,
            aux: aux != 0,
            count,
        })
    }
}

/// Writes the record of the feature with key `key`.
pub(super) fn write_record(
    out: &mut impl Write,
    aux: bool,
    key: u64,
    entry: &SgdEntry,
) -> io::Result<()> {
    write_pod(out, key)?;
    write_pod(out, entry.v().is_some() as u8)?;
    write_pod(out, entry.w)?;

    if aux {
        write_pod(out, entry.fea_cnt)?;
        write_pod(out, entry.z)?;
        write_pod(out, entry.sqrt_g)?;
    }

    if let Some(v) = entry.v() {
        out.write_all(bytemuck::cast_slice(v.weights()))?;
        if aux {
            out.write_all(bytemuck::cast_slice(v.sqrt_g()))?;
        }
    }

    Ok(())
}

/// Reads one record, returning the feature key and its entry.
///
/// Accumulators and counts missing from the stream are left zeroed.
pub(super) fn read_record(input: &mut dyn Read, header: &Header) -> io::Result<(u64, SgdEntry)> {
    let key = read_pod(input)?;
    let has_v: u8 = read_pod(input)?;

    let mut entry = SgdEntry::default();
    entry.w = read_pod(input)?;

    if header.aux {
        entry.fea_cnt = read_pod(input)?;
        entry.z = read_pod(input)?;
        entry.sqrt_g = read_pod(input)?;
    }

    if has_v != 0 {
        let weights = read_floats(input, header.v_dim)?;
        let v = if header.aux {
            let sqrt_g = read_floats(input, header.v_dim)?;
            Embedding::from_parts(weights, sqrt_g)
        } else {
            Embedding::new(weights)
        };

        entry.alloc_v(v);
    }

    Ok((key, entry))
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    #[test]
    fn header_round_trip() {
        let header = Header {
            v_dim: 4,
            aux: true,
            count: 9,
        };

        let mut buf = Vec::new();
        header.write(&mut buf).unwrap();

        assert_eq!(buf.len(), 4 + 4 + 1 + 8);
        assert_eq!(Header::read(&mut Cursor::new(buf)).unwrap(), header);
    }

    #[test]
    fn rejects_bad_magic() {
        let buf = vec![0u8; 17];
        let err = Header::read(&mut Cursor::new(buf)).unwrap_err();

        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn record_without_aux_drops_accumulators() {
        let header = Header {
            v_dim: 2,
            aux: false,
            count: 1,
        };

        let mut entry = SgdEntry::default();
        entry.fea_cnt = 3.;
        entry.w = 0.5;
        entry.z = -1.;
        entry.sqrt_g = 2.;
        entry.alloc_v(Embedding::from_parts(vec![0.1, 0.2], vec![1., 1.]));

        let mut buf = Vec::new();
        write_record(&mut buf, header.aux, 42, &entry).unwrap();
        assert_eq!(buf.len(), 8 + 1 + 4 + 2 * 4);

        let (key, loaded) = read_record(&mut Cursor::new(buf), &header).unwrap();
        assert_eq!(key, 42);
        assert_eq!(loaded.w, 0.5);
        assert_eq!(loaded.fea_cnt, 0.);
        assert_eq!(loaded.z, 0.);
        assert_eq!(loaded.v().unwrap().weights(), [0.1, 0.2]);
        assert_eq!(loaded.v().unwrap().sqrt_g(), [0., 0.]);
    }

    #[test]
    fn record_with_aux_keeps_everything() {
        let header = Header {
            v_dim: 2,
            aux: true,
            count: 1,
        };

        let mut entry = SgdEntry::default();
        entry.fea_cnt = 7.;
        entry.w = -0.25;
        entry.z = 1.5;
        entry.sqrt_g = 3.;
        entry.alloc_v(Embedding::from_parts(vec![0.1, 0.2], vec![0.5, 0.75]));

        let mut buf = Vec::new();
        write_record(&mut buf, header.aux, 7, &entry).unwrap();
        assert_eq!(buf.len(), 8 + 1 + 4 + 3 * 4 + 2 * 2 * 4);

        let (key, loaded) = read_record(&mut Cursor::new(buf), &header).unwrap();
        assert_eq!(key, 7);
        assert_eq!(loaded, entry);
    }

    #[test]
    fn truncated_record_fails() {
        let header = Header {
            v_dim: 0,
            aux: true,
            count: 1,
        };

        let mut buf = Vec::new();
        write_record(&mut buf, true, 1, &SgdEntry::default()).unwrap();
        buf.pop();

        let err = read_record(&mut Cursor::new(buf), &header).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
    }
}
