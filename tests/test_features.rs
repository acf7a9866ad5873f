//! Integration test: catalog loading and feature derivation

use polars::prelude::*;
use stargal::catalog::{self, Label, MagSystem, BANDS, MISSING_SENTINEL};
use stargal::features::{self, FeatureVector, FEATURE_NAMES, N_FEATURES};

/// Two rows; the second has the sentinel in `psfmag_z`
fn catalog_df() -> DataFrame {
    let mut df = df!(
        "petror50_r" => &[2.31, 1.05],
        "petror90_r" => &[6.12, 2.20],
        "lnlstar_r" => &[-412.7, -0.3],
        "lnlexp_r" => &[-1.9, -88.0],
        "lnldev_r" => &[-3.4, -91.5],
        "me1_r" => &[0.12, -0.01],
        "me2_r" => &[-0.05, 0.02],
        "mrrcc_r" => &[18.4, 4.9],
        "specclass" => &[2i64, 1]
    )
    .unwrap();

    let r = [17.317, 16.02];
    let colours = [1.873, 0.691, 0.0, -0.412, -0.339];
    for (s, system) in MagSystem::ALL.iter().enumerate() {
        for (band, _) in BANDS.iter().enumerate() {
            let values: Vec<f64> = (0..2)
                .map(|row| {
                    if row == 1 && *system == MagSystem::Psf && band == 4 {
                        MISSING_SENTINEL
                    } else {
                        r[row] + colours[band] + 0.1 * s as f64
                    }
                })
                .collect();
            df.with_column(Series::new(system.column(band).into(), values)).unwrap();
        }
    }
    df
}

#[test]
fn test_feature_names_are_unique() {
    let mut names = FEATURE_NAMES.to_vec();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), N_FEATURES);
    assert_eq!(features::feature_names()[26], "modelmag_r");
}

#[test]
fn test_colours_are_exact_differences() {
    let rows = catalog::rows_from_frame(&catalog_df(), true).unwrap();
    let fv: FeatureVector = features::derive(&rows[0]).unwrap();

    for system in MagSystem::ALL {
        for band in 0..4 {
            let blue = rows[0].magnitude(system, band).unwrap();
            let red = rows[0].magnitude(system, band + 1).unwrap();
            assert_eq!(fv.colour(system, band), blue - red);
        }
        assert_eq!(fv.magnitude_r(system), rows[0].magnitude(system, 2).unwrap());
    }
    assert_eq!(fv.as_slice()[..8].to_vec(), vec![2.31, 6.12, -412.7, -1.9, -3.4, 0.12, -0.05, 18.4]);
}

#[test]
fn test_sentinel_is_missing() {
    let rows = catalog::rows_from_frame(&catalog_df(), true).unwrap();
    assert_eq!(rows[1].magnitude(MagSystem::Psf, 4), None);
    assert_eq!(rows[1].label(), Some(Label::Star));

    let err = features::derive(&rows[1]).unwrap_err();
    assert_eq!(err.0, "psfmag_z");
}

#[test]
fn test_missing_column_is_an_error() {
    let df = catalog_df().drop("me2_r").unwrap();
    assert!(catalog::rows_from_frame(&df, false).is_err());
}

#[test]
fn test_frame_round_trip_through_files() {
    let dir = tempfile::tempdir().unwrap();
    for ext in ["csv", "parquet", "ndjson"] {
        let path = dir.path().join(format!("catalog.{}", ext));
        let mut df = catalog_df();
        catalog::write_frame(&mut df, &path).unwrap();

        let back = catalog::load_frame(&path).unwrap();
        let rows = catalog::rows_from_frame(&back, true).unwrap();
        assert_eq!(rows.len(), 2, "{}", ext);
        assert_eq!(rows[0].label(), Some(Label::Galaxy));
        assert_eq!(rows[1].magnitude(MagSystem::Psf, 4), None);
    }
}

#[test]
fn test_unsupported_extension() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.fits");
    std::fs::write(&path, b"SIMPLE").unwrap();
    assert!(catalog::load_frame(&path).is_err());
}
