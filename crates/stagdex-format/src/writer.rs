//! Writers for the record layouts.

use std::io::{self, Write};

use crate::format::{
    Encoding, FORMAT_VERSION, Field, RPROF_MAGIC, SNAPSHOT_MAGIC, SnapshotHeader, TIME_MAGIC,
};

fn invalid(msg: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidInput, msg)
}

fn push_name(out: &mut Vec<u8>, enc: Encoding, name: &str) -> io::Result<()> {
    let len = u16::try_from(name.len()).map_err(|_| invalid(format!("name too long: {name}")))?;
    out.extend_from_slice(&enc.u16_bytes(len));
    out.extend_from_slice(name.as_bytes());
    Ok(())
}

fn push_preamble(out: &mut Vec<u8>, magic: [u8; 4], enc: Encoding) {
    out.extend_from_slice(&magic);
    out.push(enc.flags());
    out.push(FORMAT_VERSION);
}

/// Appends rows to a time-series file
pub struct TimeSeriesWriter<W> {
    w: W,
    enc: Encoding,
    ncols: usize,
    buf: Vec<u8>,
}

impl<W: Write> TimeSeriesWriter<W> {
    /// Write the header and return a writer positioned on the first row
    pub fn new(mut w: W, enc: Encoding, columns: &[&str]) -> io::Result<Self> {
        let mut buf = Vec::with_capacity(64);
        push_preamble(&mut buf, TIME_MAGIC, enc);
        buf.extend_from_slice(&enc.u16_bytes(0));
        buf.extend_from_slice(&enc.u32_bytes(columns.len() as u32));
        for c in columns {
            push_name(&mut buf, enc, c)?;
        }
        w.write_all(&buf)?;
        buf.clear();
        Ok(Self {
            w,
            enc,
            ncols: columns.len(),
            buf,
        })
    }

    /// Append one row; `values` must have one entry per column
    #[inline]
    pub fn write_row(&mut self, istep: u32, values: &[f64]) -> io::Result<()> {
        if values.len() != self.ncols {
            return Err(invalid(format!(
                "row for step {istep} has {} values, expected {}",
                values.len(),
                self.ncols
            )));
        }
        self.buf.clear();
        self.buf.extend_from_slice(&self.enc.u32_bytes(istep));
        for &v in values {
            self.enc.push_real(&mut self.buf, v);
        }
        self.w.write_all(&self.buf)
    }

    /// Flush the underlying writer
    #[inline]
    pub fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }

    /// Recover the underlying writer
    #[inline]
    pub fn into_inner(self) -> W {
        self.w
    }
}

/// Appends per-step blocks to a radial-profile file
pub struct RprofWriter<W> {
    w: W,
    enc: Encoding,
    block_len: usize,
    buf: Vec<u8>,
}

impl<W: Write> RprofWriter<W> {
    /// Write the header for `nz` levels of `columns`
    pub fn new(mut w: W, enc: Encoding, columns: &[&str], nz: u32) -> io::Result<Self> {
        let mut buf = Vec::with_capacity(64);
        push_preamble(&mut buf, RPROF_MAGIC, enc);
        buf.extend_from_slice(&enc.u16_bytes(0));
        buf.extend_from_slice(&enc.u32_bytes(columns.len() as u32));
        buf.extend_from_slice(&enc.u32_bytes(nz));
        for c in columns {
            push_name(&mut buf, enc, c)?;
        }
        w.write_all(&buf)?;
        buf.clear();
        Ok(Self {
            w,
            enc,
            block_len: nz as usize * columns.len(),
            buf,
        })
    }

    /// Append one block, level-major (`nz` rows of one value per column)
    pub fn write_block(&mut self, istep: u32, values: &[f64]) -> io::Result<()> {
        if values.len() != self.block_len {
            return Err(invalid(format!(
                "profile for step {istep} has {} values, expected {}",
                values.len(),
                self.block_len
            )));
        }
        self.buf.clear();
        self.buf.extend_from_slice(&self.enc.u32_bytes(istep));
        for &v in values {
            self.enc.push_real(&mut self.buf, v);
        }
        self.w.write_all(&self.buf)
    }

    /// Flush the underlying writer
    #[inline]
    pub fn flush(&mut self) -> io::Result<()> {
        self.w.flush()
    }

    /// Recover the underlying writer
    #[inline]
    pub fn into_inner(self) -> W {
        self.w
    }
}

/// Write a complete snapshot.
///
/// `header.nfields` must match `fields.len()` and every field must hold
/// exactly `cells * components` samples.
pub fn write_snapshot<W: Write>(
    w: &mut W,
    header: &SnapshotHeader,
    fields: &[Field],
) -> io::Result<()> {
    let enc = header.encoding;
    let g = &header.geometry;
    if header.nfields as usize != fields.len() {
        return Err(invalid(format!(
            "header declares {} fields, {} given",
            header.nfields,
            fields.len()
        )));
    }
    let cells = g
        .cells()
        .ok_or_else(|| invalid("grid size overflows".to_string()))?;
    // Nothing reaches `w` until every field checks out.
    for f in fields {
        let expected = cells
            .checked_mul(f.components as u64)
            .ok_or_else(|| invalid(format!("field {} size overflows", f.name)))?;
        if f.values.len() as u64 != expected {
            return Err(invalid(format!(
                "field {} has {} values, grid needs {expected}",
                f.name,
                f.values.len()
            )));
        }
        if f.name.len() > u16::MAX as usize {
            return Err(invalid(format!("name too long: {}", f.name)));
        }
    }

    let mut buf = Vec::with_capacity(64);
    push_preamble(&mut buf, SNAPSHOT_MAGIC, enc);
    buf.push(g.coords.tag());
    buf.push(0);
    buf.extend_from_slice(&enc.u32_bytes(header.isnap));
    buf.extend_from_slice(&enc.u32_bytes(header.istep));
    enc.push_real(&mut buf, header.time);
    buf.extend_from_slice(&enc.u32_bytes(g.nxtot));
    buf.extend_from_slice(&enc.u32_bytes(g.nytot));
    buf.extend_from_slice(&enc.u32_bytes(g.nztot));
    buf.extend_from_slice(&enc.u32_bytes(header.nfields));
    w.write_all(&buf)?;

    for f in fields {
        buf.clear();
        push_name(&mut buf, enc, &f.name)?;
        buf.extend_from_slice(&enc.u32_bytes(f.components));
        buf.extend_from_slice(&enc.u64_bytes(f.values.len() as u64));
        buf.reserve(f.values.len() * enc.precision.width());
        for &v in &f.values {
            enc.push_real(&mut buf, v);
        }
        w.write_all(&buf)?;
    }
    Ok(())
}
