//! Synthetic catalogs shared by the integration tests

#![allow(dead_code)]

use polars::prelude::*;
use rand::prelude::*;
use rand_xoshiro::Xoshiro256PlusPlus;
use stargal::catalog::{MagSystem, BANDS, LABEL_COLUMN, MORPHOLOGY_COLUMNS};

/// Colour offsets per band relative to r
const BAND_OFFSETS: [f64; 5] = [1.6, 0.6, 0.0, -0.3, -0.5];

fn noise(rng: &mut Xoshiro256PlusPlus, scale: f64) -> f64 {
    (rng.gen::<f64>() - 0.5) * scale
}

/// A catalog of `n_gal` galaxies followed by `n_star` stars.
///
/// Galaxies are extended: larger radii, lower star likelihood, and a psf
/// magnitude about 0.6 fainter than the model magnitude.
pub fn catalog(n_gal: usize, n_star: usize, seed: u64) -> DataFrame {
    let mut rng = Xoshiro256PlusPlus::seed_from_u64(seed);
    let n = n_gal + n_star;

    let mut morphology = vec![Vec::with_capacity(n); MORPHOLOGY_COLUMNS.len()];
    let mut magnitudes = vec![vec![Vec::with_capacity(n); BANDS.len()]; MagSystem::ALL.len()];
    let mut labels = Vec::with_capacity(n);

    for i in 0..n {
        let galaxy = i < n_gal;
        let e = if galaxy { 1.0 } else { 0.0 };
        let values = [
            1.2 + 1.5 * e + noise(&mut rng, 0.4),
            2.5 + 3.0 * e + noise(&mut rng, 0.8),
            -0.5 - 40.0 * e + noise(&mut rng, 1.0),
            -30.0 + 28.0 * e + noise(&mut rng, 1.0),
            -30.0 + 27.0 * e + noise(&mut rng, 1.0),
            noise(&mut rng, 0.1) + 0.1 * e,
            noise(&mut rng, 0.1),
            2.0 + 6.0 * e + noise(&mut rng, 1.0),
        ];
        for (col, v) in morphology.iter_mut().zip(values) {
            col.push(v);
        }

        let r = 15.0 + 6.0 * rng.gen::<f64>();
        for (s, system) in MagSystem::ALL.iter().enumerate() {
            let offset = match system {
                MagSystem::Fiber => 0.3 + 0.5 * e,
                MagSystem::Psf => 0.6 * e,
                MagSystem::Model => 0.0,
                MagSystem::Petro => -0.05 * e,
            };
            for (band, base) in BAND_OFFSETS.iter().enumerate() {
                let jitter = if *system == MagSystem::Model && band == 2 { 0.0 } else { noise(&mut rng, 0.05) };
                magnitudes[s][band].push(r + base + offset + jitter);
            }
        }

        labels.push(if galaxy { 2i64 } else { 1i64 });
    }

    let mut columns: Vec<Series> = MORPHOLOGY_COLUMNS
        .iter()
        .zip(morphology)
        .map(|(name, values)| Series::new((*name).into(), values))
        .collect();
    for (system, bands) in MagSystem::ALL.iter().zip(magnitudes) {
        for (band, values) in bands.into_iter().enumerate() {
            columns.push(Series::new(system.column(band).into(), values));
        }
    }
    columns.push(Series::new(LABEL_COLUMN.into(), labels));

    DataFrame::new(columns).unwrap()
}

/// Write a frame as CSV into `dir` and return its path
pub fn write_csv(df: &DataFrame, dir: &std::path::Path, name: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    let mut df = df.clone();
    stargal::catalog::write_frame(&mut df, &path).unwrap();
    path
}
