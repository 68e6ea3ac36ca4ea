use std::{
    fs::{self, File, OpenOptions},
    io::{BufWriter, Write},
    path::Path,
};

use stagdex_format::{
    ByteOrder, CoordSystem, Dimensionality, Encoding, Field, FormatError, Geometry, Precision,
    RprofWriter, SnapshotHeader, TimeSeriesWriter, read_rprof, read_snapshot,
    read_snapshot_header, read_time_row, scan_rprof, scan_time_series, write_snapshot,
};

fn snapshot_header(
    enc: Encoding,
    isnap: u32,
    istep: u32,
    geometry: Geometry,
    nfields: u32,
) -> SnapshotHeader {
    SnapshotHeader {
        encoding: enc,
        isnap,
        istep,
        time: 0.125,
        geometry,
        nfields,
    }
}

fn ramp(n: usize, scale: f64) -> Vec<f64> {
    (0..n).map(|i| i as f64 * scale).collect()
}

fn write_snap_file(path: &Path, header: &SnapshotHeader, fields: &[Field]) {
    let mut w = BufWriter::new(File::create(path).unwrap());
    write_snapshot(&mut w, header, fields).unwrap();
    w.flush().unwrap();
}

#[test]
fn geometry_classification() {
    let g = |x, y, z| Geometry::new(x, y, z, CoordSystem::Cartesian).dimensionality();
    assert_eq!(g(64, 1, 32), Dimensionality::TwoDimXz);
    assert_eq!(g(64, 48, 32), Dimensionality::ThreeDim);
    assert_eq!(g(1, 48, 32), Dimensionality::TwoDimYz);
}

#[test]
fn snapshot_round_trip_preserves_header_and_fields() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_snap00003.dat");
    let geometry = Geometry::new(4, 1, 3, CoordSystem::Spherical);
    let fields = vec![
        Field {
            name: "T".into(),
            components: 1,
            values: ramp(12, 0.1),
        },
        Field {
            name: "v".into(),
            components: 3,
            values: ramp(36, -0.5),
        },
    ];
    let header = snapshot_header(Encoding::default(), 3, 1200, geometry, 2);
    write_snap_file(&path, &header, &fields);

    let snap = read_snapshot(&path, Encoding::default()).unwrap();
    assert_eq!(snap.header.isnap, 3);
    assert_eq!(snap.header.istep, 1200);
    assert_eq!(snap.header.geometry, geometry);
    assert_eq!(snap.header.geometry.dimensionality(), Dimensionality::TwoDimXz);
    assert_eq!(snap.header.geometry.coords, CoordSystem::Spherical);
    assert_eq!(snap.fields, fields);
    assert_eq!(snap.field("v").unwrap().component(2).unwrap().len(), 12);
}

#[test]
fn big_endian_single_precision_reads_back_within_tolerance() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_snap00000.dat");
    let enc = Encoding::new(ByteOrder::Big, Precision::Single);
    let geometry = Geometry::new(2, 2, 2, CoordSystem::Cartesian);
    let values = vec![0.1, 0.2, 0.3, 1e-3, 2.5, 3.75, -4.0, 1e6];
    let fields = vec![Field {
        name: "eta".into(),
        components: 1,
        values: values.clone(),
    }];
    write_snap_file(&path, &snapshot_header(enc, 0, 7, geometry, 1), &fields);

    // defaults disagree with the file; the flags byte must win
    let snap = read_snapshot(&path, Encoding::default()).unwrap();
    assert_eq!(snap.header.encoding, enc);
    assert_eq!(snap.header.istep, 7);
    assert_eq!(snap.header.geometry.dimensionality(), Dimensionality::ThreeDim);
    for (got, want) in snap.fields[0].values.iter().zip(&values) {
        assert!((got - want).abs() <= want.abs() * 1e-6, "{got} vs {want}");
    }
}

#[test]
fn mismatched_payload_length_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_snap00001.dat");
    let geometry = Geometry::new(4, 1, 4, CoordSystem::Cartesian);
    let fields = vec![Field {
        name: "T".into(),
        components: 1,
        values: ramp(16, 1.0),
    }];
    let header = snapshot_header(Encoding::default(), 1, 10, geometry, 1);
    write_snap_file(&path, &header, &fields);

    // nztot lives at byte 32 with f64 time; bump it from 4 to 5
    let mut bytes = fs::read(&path).unwrap();
    bytes[32..36].copy_from_slice(&5u32.to_le_bytes());
    fs::write(&path, &bytes).unwrap();

    let err = read_snapshot(&path, Encoding::default()).unwrap_err();
    assert!(err.is_corrupt());
    let msg = err.to_string();
    assert!(msg.contains("16 values declared"), "{msg}");
    assert!(msg.contains("run_snap00001.dat"), "{msg}");
}

#[test]
fn truncated_snapshot_is_corrupt_but_header_still_reads() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_snap00002.dat");
    let geometry = Geometry::new(8, 1, 8, CoordSystem::Cylindrical);
    let fields = vec![Field {
        name: "T".into(),
        components: 1,
        values: ramp(64, 1.0),
    }];
    let header = snapshot_header(Encoding::default(), 2, 20, geometry, 1);
    write_snap_file(&path, &header, &fields);
    let len = fs::metadata(&path).unwrap().len();
    OpenOptions::new()
        .write(true)
        .open(&path)
        .unwrap()
        .set_len(len - 100)
        .unwrap();

    let header = read_snapshot_header(&path, Encoding::default()).unwrap();
    assert_eq!((header.isnap, header.istep), (2, 20));
    assert!(matches!(
        read_snapshot(&path, Encoding::default()),
        Err(FormatError::Truncated { .. })
    ));
}

#[test]
fn trailing_garbage_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_snap00004.dat");
    let geometry = Geometry::new(2, 1, 2, CoordSystem::Cartesian);
    let fields = vec![Field {
        name: "T".into(),
        components: 1,
        values: ramp(4, 1.0),
    }];
    let header = snapshot_header(Encoding::default(), 4, 40, geometry, 1);
    write_snap_file(&path, &header, &fields);
    let mut f = OpenOptions::new().append(true).open(&path).unwrap();
    f.write_all(&[0xde, 0xad]).unwrap();
    drop(f);

    let err = read_snapshot(&path, Encoding::default()).unwrap_err();
    assert!(err.to_string().contains("trailing bytes"), "{err}");
}

#[test]
fn zstd_snapshot_is_decompressed() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_snap00005.dat.zst");
    let geometry = Geometry::new(3, 3, 3, CoordSystem::Spherical);
    let fields = vec![Field {
        name: "T".into(),
        components: 1,
        values: ramp(27, 0.25),
    }];
    let header = snapshot_header(Encoding::default(), 5, 50, geometry, 1);
    let mut raw = Vec::new();
    write_snapshot(&mut raw, &header, &fields).unwrap();
    fs::write(&path, zstd::encode_all(raw.as_slice(), 3).unwrap()).unwrap();

    assert_eq!(read_snapshot_header(&path, Encoding::default()).unwrap().isnap, 5);
    let snap = read_snapshot(&path, Encoding::default()).unwrap();
    assert_eq!(snap.fields, fields);
}

#[test]
fn time_series_scan_skips_partial_row() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_time.dat");
    let enc = Encoding::new(ByteOrder::Big, Precision::Double);
    let mut w = TimeSeriesWriter::new(File::create(&path).unwrap(), enc, &["t", "vrms"]).unwrap();
    for istep in [0u32, 1, 2, 5, 9] {
        w.write_row(istep, &[istep as f64 * 0.01, 100.0 + istep as f64])
            .unwrap();
    }
    let mut f = w.into_inner();
    f.write_all(&[0, 0, 0, 11, 1, 2, 3]).unwrap();
    drop(f);

    let scan = scan_time_series(&path, Encoding::default()).unwrap();
    assert_eq!(scan.header.encoding, enc);
    assert_eq!(&*scan.header.columns, &["t".to_string(), "vrms".to_string()]);
    assert_eq!(scan.trailing_bytes, 7);
    let steps: Vec<u32> = scan.rows.iter().map(|r| r.istep).collect();
    assert_eq!(steps, vec![0, 1, 2, 5, 9]);

    let row = read_time_row(&path, &scan.header, scan.rows[3].offset).unwrap();
    assert_eq!(row.istep, 5);
    assert_eq!(row.get("t"), Some(5.0 * 0.01));
    assert_eq!(row.get("vrms"), Some(105.0));
    assert_eq!(row.get("missing"), None);

    let err = read_time_row(&path, &scan.header, scan.rows[3].offset + 1).unwrap_err();
    assert!(err.is_corrupt());
}

#[test]
fn wrong_row_width_is_rejected_by_writer() {
    let mut w = TimeSeriesWriter::new(Vec::new(), Encoding::default(), &["t"]).unwrap();
    assert!(w.write_row(0, &[1.0, 2.0]).is_err());
}

#[test]
fn radial_profiles_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("run_rprof.dat");
    let mut w =
        RprofWriter::new(File::create(&path).unwrap(), Encoding::default(), &["r", "Tmean"], 3)
            .unwrap();
    w.write_block(0, &[0.0, 1.0, 0.5, 0.6, 1.0, 0.0]).unwrap();
    w.write_block(4, &[0.0, 0.9, 0.5, 0.5, 1.0, 0.1]).unwrap();
    w.flush().unwrap();
    drop(w);

    let scan = scan_rprof(&path, Encoding::default()).unwrap();
    assert_eq!(scan.header.nz, 3);
    assert_eq!(scan.blocks.len(), 2);
    assert_eq!(scan.trailing_bytes, 0);

    let prof = read_rprof(&path, &scan.header, scan.blocks[1].offset).unwrap();
    assert_eq!(prof.istep, 4);
    assert_eq!(prof.column("Tmean").unwrap(), vec![0.9, 0.5, 0.1]);
    assert_eq!(prof.level(1).unwrap(), &[0.5, 0.5]);
}

#[test]
fn bad_field_writes_nothing() {
    let geometry = Geometry::new(2, 1, 2, CoordSystem::Cartesian);
    let fields = vec![
        Field {
            name: "T".into(),
            components: 1,
            values: ramp(4, 1.0),
        },
        Field {
            name: "v".into(),
            components: 3,
            values: ramp(4, 1.0),
        },
    ];
    let header = snapshot_header(Encoding::default(), 0, 0, geometry, 2);
    let mut buf = Vec::new();
    let err = write_snapshot(&mut buf, &header, &fields).unwrap_err();
    assert!(err.to_string().contains("field v"), "{err}");
    assert!(buf.is_empty());
}
