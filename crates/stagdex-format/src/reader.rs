//! Pure parsers for the record layouts.
//!
//! Every function here is a function of its arguments and the bytes on disk:
//! no caching, no shared state. Callers that want memoization keep it
//! themselves.

use std::{
    fs::File,
    io::{BufReader, Read, Seek, SeekFrom},
    path::Path,
    sync::Arc,
};
use tracing::debug;

use crate::{
    error::{Fault, FaultResult, Result},
    format::{
        CoordSystem, Encoding, FORMAT_VERSION, Field, Geometry, ISTEP_WORD, RPROF_MAGIC,
        RadialProfile, RowLocation, RprofHeader, RprofScan, SNAPSHOT_MAGIC, Snapshot,
        SnapshotHeader, TIME_MAGIC, TimeHeader, TimeRow, TimeScan,
    },
};

const IO_BUF: usize = 1 << 20;

/// Upper bound on declared columns; anything above is a corrupt header.
const MAX_COLUMNS: u32 = 1 << 16;
const MAX_FIELDS: u32 = 1 << 12;
const MAX_COMPONENTS: u32 = 64;

/// Endian-aware cursor over a record stream.
struct RecordReader<R> {
    r: R,
    enc: Encoding,
    pos: u64,
}

impl<R: Read> RecordReader<R> {
    fn new(r: R, enc: Encoding) -> Self {
        Self { r, enc, pos: 0 }
    }

    #[inline]
    fn fill(&mut self, buf: &mut [u8]) -> FaultResult<()> {
        self.r.read_exact(buf)?;
        self.pos += buf.len() as u64;
        Ok(())
    }

    /// Magic, flags and version. Sets the encoding for everything after.
    fn preamble(&mut self, magic: [u8; 4], defaults: Encoding) -> FaultResult<()> {
        let mut m = [0u8; 4];
        self.fill(&mut m)?;
        if m != magic {
            return Err(Fault::corrupt(format!(
                "bad magic {m:02x?}, expected {magic:02x?}"
            )));
        }
        let flags = self.u8()?;
        self.enc = Encoding::from_flags(flags, defaults)
            .ok_or_else(|| Fault::corrupt(format!("invalid encoding flags {flags:#04x}")))?;
        let version = self.u8()?;
        if version != FORMAT_VERSION {
            return Err(Fault::corrupt(format!("unsupported version {version}")));
        }
        Ok(())
    }

    #[inline]
    fn u8(&mut self) -> FaultResult<u8> {
        let mut b = [0u8; 1];
        self.fill(&mut b)?;
        Ok(b[0])
    }

    #[inline]
    fn u16(&mut self) -> FaultResult<u16> {
        let mut b = [0u8; 2];
        self.fill(&mut b)?;
        Ok(self.enc.u16_from(b))
    }

    #[inline]
    fn u32(&mut self) -> FaultResult<u32> {
        let mut b = [0u8; 4];
        self.fill(&mut b)?;
        Ok(self.enc.u32_from(b))
    }

    #[inline]
    fn u64(&mut self) -> FaultResult<u64> {
        let mut b = [0u8; 8];
        self.fill(&mut b)?;
        Ok(self.enc.u64_from(b))
    }

    #[inline]
    fn real(&mut self) -> FaultResult<f64> {
        let mut b = [0u8; 8];
        let w = self.enc.precision.width();
        self.fill(&mut b[..w])?;
        Ok(self.enc.real_from(&b[..w]))
    }

    fn name(&mut self) -> FaultResult<String> {
        let len = self.u16()? as usize;
        let mut b = vec![0u8; len];
        self.fill(&mut b)?;
        String::from_utf8(b).map_err(|e| Fault::corrupt(format!("name is not utf-8: {e}")))
    }

    fn names(&mut self, n: u32) -> FaultResult<Arc<[String]>> {
        if n > MAX_COLUMNS {
            return Err(Fault::corrupt(format!("{n} columns declared")));
        }
        (0..n).map(|_| self.name()).collect()
    }

    /// Read `n` reals. The buffer grows with the data actually present, so a
    /// lying length cannot force a huge allocation up front.
    fn reals(&mut self, n: u64) -> FaultResult<Vec<f64>> {
        let w = self.enc.precision.width();
        let byte_len = n
            .checked_mul(w as u64)
            .ok_or_else(|| Fault::corrupt(format!("{n} samples overflow")))?;
        let mut buf = Vec::new();
        (&mut self.r).take(byte_len).read_to_end(&mut buf)?;
        self.pos += buf.len() as u64;
        if buf.len() as u64 != byte_len {
            return Err(Fault::Truncated(format!(
                "payload has {} of {byte_len} bytes",
                buf.len()
            )));
        }
        Ok(buf.chunks_exact(w).map(|c| self.enc.real_from(c)).collect())
    }

    /// Fails if any byte is left in the stream.
    fn expect_end(&mut self) -> FaultResult<()> {
        let mut b = [0u8; 1];
        match self.r.read(&mut b)? {
            0 => Ok(()),
            _ => Err(Fault::corrupt(format!(
                "trailing bytes after offset {}",
                self.pos
            ))),
        }
    }

    fn into_inner(self) -> R {
        self.r
    }
}

fn open(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| Fault::Io(e).at(path))
}

fn file_len(file: &File, path: &Path) -> Result<u64> {
    file.metadata()
        .map(|m| m.len())
        .map_err(|e| Fault::Io(e).at(path))
}

fn parse_time_header<R: Read>(
    rr: &mut RecordReader<R>,
    defaults: Encoding,
) -> FaultResult<TimeHeader> {
    rr.preamble(TIME_MAGIC, defaults)?;
    let _reserved = rr.u16()?;
    let ncols = rr.u32()?;
    let columns = rr.names(ncols)?;
    Ok(TimeHeader {
        encoding: rr.enc,
        columns,
        data_offset: rr.pos,
    })
}

fn parse_rprof_header<R: Read>(
    rr: &mut RecordReader<R>,
    defaults: Encoding,
) -> FaultResult<RprofHeader> {
    rr.preamble(RPROF_MAGIC, defaults)?;
    let _reserved = rr.u16()?;
    let ncols = rr.u32()?;
    let nz = rr.u32()?;
    if nz == 0 {
        return Err(Fault::corrupt("radial profiles declare zero levels"));
    }
    let columns = rr.names(ncols)?;
    Ok(RprofHeader {
        encoding: rr.enc,
        columns,
        nz,
        data_offset: rr.pos,
    })
}

/// Walk fixed-size blocks reading only their leading `istep` word.
fn scan_blocks<R: Read + Seek>(
    r: &mut BufReader<R>,
    enc: Encoding,
    data_offset: u64,
    block_size: u64,
    file_len: u64,
) -> FaultResult<(Vec<RowLocation>, u64)> {
    let body = file_len.saturating_sub(data_offset);
    let n = body / block_size;
    let trailing = body % block_size;

    r.seek(SeekFrom::Start(data_offset))?;
    let mut out = Vec::with_capacity(n as usize);
    let skip = (block_size - ISTEP_WORD) as i64;
    for i in 0..n {
        let mut b = [0u8; 4];
        r.read_exact(&mut b)?;
        out.push(RowLocation {
            istep: enc.u32_from(b),
            offset: data_offset + i * block_size,
        });
        r.seek_relative(skip)?;
    }
    Ok((out, trailing))
}

/// Read one block at `offset` and split it into its `istep` and samples.
fn read_block(
    path: &Path,
    enc: Encoding,
    data_offset: u64,
    block_size: u64,
    offset: u64,
) -> Result<(u32, Vec<f64>)> {
    if offset < data_offset || (offset - data_offset) % block_size != 0 {
        return Err(Fault::corrupt(format!("offset {offset} is not on a record boundary")).at(path));
    }
    let mut file = open(path)?;
    file.seek(SeekFrom::Start(offset))
        .map_err(|e| Fault::Io(e).at(path))?;
    let mut rr = RecordReader::new(file, enc);
    let parse = |rr: &mut RecordReader<File>| -> FaultResult<(u32, Vec<f64>)> {
        let istep = rr.u32()?;
        let n = (block_size - ISTEP_WORD) / enc.precision.width() as u64;
        Ok((istep, rr.reals(n)?))
    };
    parse(&mut rr).map_err(|f| f.at(path))
}

/// Index the time-series file: header plus the location of every complete row.
pub fn scan_time_series(path: &Path, defaults: Encoding) -> Result<TimeScan> {
    let file = open(path)?;
    let len = file_len(&file, path)?;
    let mut rr = RecordReader::new(BufReader::with_capacity(IO_BUF, file), defaults);
    let header = parse_time_header(&mut rr, defaults).map_err(|f| f.at(path))?;
    let mut r = rr.into_inner();
    let (rows, trailing_bytes) = scan_blocks(
        &mut r,
        header.encoding,
        header.data_offset,
        header.row_size(),
        len,
    )
    .map_err(|f| f.at(path))?;
    debug!(
        path = %path.display(),
        rows = rows.len(),
        columns = header.columns.len(),
        "scanned time series"
    );
    Ok(TimeScan {
        header,
        rows,
        trailing_bytes,
    })
}

/// Parse the row starting at `offset`.
pub fn read_time_row(path: &Path, header: &TimeHeader, offset: u64) -> Result<TimeRow> {
    let (istep, values) = read_block(
        path,
        header.encoding,
        header.data_offset,
        header.row_size(),
        offset,
    )?;
    Ok(TimeRow {
        istep,
        columns: header.columns.clone(),
        values,
    })
}

/// Index the radial-profile file.
pub fn scan_rprof(path: &Path, defaults: Encoding) -> Result<RprofScan> {
    let file = open(path)?;
    let len = file_len(&file, path)?;
    let mut rr = RecordReader::new(BufReader::with_capacity(IO_BUF, file), defaults);
    let header = parse_rprof_header(&mut rr, defaults).map_err(|f| f.at(path))?;
    let mut r = rr.into_inner();
    let (blocks, trailing_bytes) = scan_blocks(
        &mut r,
        header.encoding,
        header.data_offset,
        header.block_size(),
        len,
    )
    .map_err(|f| f.at(path))?;
    debug!(path = %path.display(), blocks = blocks.len(), nz = header.nz, "scanned radial profiles");
    Ok(RprofScan {
        header,
        blocks,
        trailing_bytes,
    })
}

/// Parse the profile block starting at `offset`.
pub fn read_rprof(path: &Path, header: &RprofHeader, offset: u64) -> Result<RadialProfile> {
    let (istep, values) = read_block(
        path,
        header.encoding,
        header.data_offset,
        header.block_size(),
        offset,
    )?;
    Ok(RadialProfile {
        istep,
        nz: header.nz,
        columns: header.columns.clone(),
        values,
    })
}

fn snapshot_header<R: Read>(
    rr: &mut RecordReader<R>,
    defaults: Encoding,
) -> FaultResult<SnapshotHeader> {
    rr.preamble(SNAPSHOT_MAGIC, defaults)?;
    let tag = rr.u8()?;
    let coords = CoordSystem::from_tag(tag)
        .ok_or_else(|| Fault::corrupt(format!("unknown coordinate system {tag}")))?;
    let _reserved = rr.u8()?;
    let isnap = rr.u32()?;
    let istep = rr.u32()?;
    let time = rr.real()?;
    let geometry = Geometry::new(rr.u32()?, rr.u32()?, rr.u32()?, coords);
    if geometry.nxtot == 0 || geometry.nytot == 0 || geometry.nztot == 0 {
        return Err(Fault::corrupt(format!(
            "empty grid {}x{}x{}",
            geometry.nxtot, geometry.nytot, geometry.nztot
        )));
    }
    let nfields = rr.u32()?;
    if nfields > MAX_FIELDS {
        return Err(Fault::corrupt(format!("{nfields} fields declared")));
    }
    Ok(SnapshotHeader {
        encoding: rr.enc,
        isnap,
        istep,
        time,
        geometry,
        nfields,
    })
}

fn snapshot_field<R: Read>(rr: &mut RecordReader<R>, geometry: &Geometry) -> FaultResult<Field> {
    let name = rr.name()?;
    let components = rr.u32()?;
    if components == 0 || components > MAX_COMPONENTS {
        return Err(Fault::corrupt(format!(
            "field {name}: {components} components"
        )));
    }
    let nvalues = rr.u64()?;
    let expected = geometry
        .cells()
        .and_then(|c| c.checked_mul(components as u64))
        .ok_or_else(|| Fault::corrupt(format!("field {name}: grid size overflows")))?;
    if nvalues != expected {
        return Err(Fault::corrupt(format!(
            "field {name}: {nvalues} values declared, grid {}x{}x{} with {components} component(s) needs {expected}",
            geometry.nxtot, geometry.nytot, geometry.nztot
        )));
    }
    let values = rr.reals(nvalues)?;
    Ok(Field {
        name,
        components,
        values,
    })
}

/// Parse only the header of a snapshot stream. `origin` is used in errors.
pub fn parse_snapshot_header<R: Read>(
    r: R,
    defaults: Encoding,
    origin: &Path,
) -> Result<SnapshotHeader> {
    let mut rr = RecordReader::new(r, defaults);
    snapshot_header(&mut rr, defaults).map_err(|f| f.at(origin))
}

/// Parse a whole snapshot stream, validating every field against the grid.
pub fn parse_snapshot<R: Read>(r: R, defaults: Encoding, origin: &Path) -> Result<Snapshot> {
    let mut rr = RecordReader::new(r, defaults);
    let parse = |rr: &mut RecordReader<R>| -> FaultResult<Snapshot> {
        let header = snapshot_header(rr, defaults)?;
        let fields = (0..header.nfields)
            .map(|_| snapshot_field(rr, &header.geometry))
            .collect::<FaultResult<Vec<_>>>()?;
        rr.expect_end()?;
        Ok(Snapshot { header, fields })
    };
    parse(&mut rr).map_err(|f| f.at(origin))
}

fn is_zstd(path: &Path) -> bool {
    path.extension().is_some_and(|e| e == "zst")
}

/// Open a snapshot file, transparently decompressing `.zst`.
fn snapshot_stream(path: &Path) -> Result<Box<dyn Read>> {
    let file = BufReader::with_capacity(IO_BUF, open(path)?);
    if is_zstd(path) {
        let zstd = zstd::Decoder::with_buffer(file).map_err(|e| Fault::Io(e).at(path))?;
        Ok(Box::new(zstd))
    } else {
        Ok(Box::new(file))
    }
}

/// Read the header of a snapshot file without touching its fields.
pub fn read_snapshot_header(path: &Path, defaults: Encoding) -> Result<SnapshotHeader> {
    parse_snapshot_header(snapshot_stream(path)?, defaults, path)
}

/// Read and validate a snapshot file.
pub fn read_snapshot(path: &Path, defaults: Encoding) -> Result<Snapshot> {
    let snap = parse_snapshot(snapshot_stream(path)?, defaults, path)?;
    debug!(
        path = %path.display(),
        isnap = snap.header.isnap,
        fields = snap.fields.len(),
        "parsed snapshot"
    );
    Ok(snap)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn bad_magic_is_corrupt() {
        let bytes = b"NOPE\x05\x01".to_vec();
        let err = parse_snapshot_header(Cursor::new(bytes), Encoding::default(), Path::new("x"))
            .unwrap_err();
        assert!(err.is_corrupt(), "{err}");
    }

    #[test]
    fn reserved_flag_values_are_rejected() {
        let mut bytes = SNAPSHOT_MAGIC.to_vec();
        bytes.push(0b0000_0011);
        bytes.push(FORMAT_VERSION);
        let err = parse_snapshot_header(Cursor::new(bytes), Encoding::default(), Path::new("x"))
            .unwrap_err();
        assert!(err.to_string().contains("invalid encoding flags"), "{err}");
    }

    #[test]
    fn short_header_reports_truncation() {
        let mut bytes = SNAPSHOT_MAGIC.to_vec();
        bytes.extend_from_slice(&[Encoding::default().flags(), FORMAT_VERSION, 0, 0, 1, 0]);
        let err = parse_snapshot_header(Cursor::new(bytes), Encoding::default(), Path::new("x"))
            .unwrap_err();
        assert!(err.to_string().contains("truncated"), "{err}");
    }
}
