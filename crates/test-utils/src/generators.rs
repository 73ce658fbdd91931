//! Synthetic scalar fields for contouring tests.
//!
//! Every generator returns `nx * ny` values in row-major order (row 0 first),
//! node `(i, j)` at index `j * nx + i`.

/// Creates a field that increases linearly with the row index.
///
/// Row `j` has value `j / (ny - 1)`, so every level in `(0, 1)` crosses each
/// column exactly once.
///
/// # Example
///
/// ```
/// use test_utils::create_ramp_grid;
///
/// let z = create_ramp_grid(3, 2);
/// assert_eq!(z, vec![0.0, 0.0, 0.0, 1.0, 1.0, 1.0]);
/// ```
pub fn create_ramp_grid(nx: usize, ny: usize) -> Vec<f64> {
    let denom = ny.saturating_sub(1).max(1) as f64;
    (0..nx * ny).map(|idx| (idx / nx) as f64 / denom).collect()
}

/// Creates a grid filled with a constant value.
pub fn create_constant_grid(nx: usize, ny: usize, value: f64) -> Vec<f64> {
    vec![value; nx * ny]
}

/// Creates a single radial peak centred in the grid.
///
/// The value is `height` at the centre and falls off linearly with distance
/// (in index units), reaching 0 at the nearest edge.
pub fn create_peak_grid(nx: usize, ny: usize, height: f64) -> Vec<f64> {
    let cx = (nx as f64 - 1.0) / 2.0;
    let cy = (ny as f64 - 1.0) / 2.0;
    let radius = cx.min(cy).max(1.0);

    let mut data = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let d = ((i as f64 - cx).powi(2) + (j as f64 - cy).powi(2)).sqrt();
            data.push((height * (1.0 - d / radius)).max(0.0));
        }
    }
    data
}

/// A gaussian bump used by [`create_gaussian_hills`].
#[derive(Debug, Clone, Copy)]
pub struct Hill {
    /// Centre in index units.
    pub cx: f64,
    pub cy: f64,
    pub amplitude: f64,
    pub sigma: f64,
}

/// Creates a sum of gaussian hills (negative amplitudes give basins).
pub fn create_gaussian_hills(nx: usize, ny: usize, hills: &[Hill]) -> Vec<f64> {
    let mut data = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let v = hills
                .iter()
                .map(|h| {
                    let d2 = (i as f64 - h.cx).powi(2) + (j as f64 - h.cy).powi(2);
                    h.amplitude * (-d2 / (2.0 * h.sigma * h.sigma)).exp()
                })
                .sum();
            data.push(v);
        }
    }
    data
}

/// Creates a smooth periodic field, `sin(x) * cos(y)` over `periods` periods.
///
/// Produces many closed contours and saddles; used by the benchmarks.
pub fn create_wave_grid(nx: usize, ny: usize, periods: f64) -> Vec<f64> {
    let sx = periods * std::f64::consts::TAU / nx.max(1) as f64;
    let sy = periods * std::f64::consts::TAU / ny.max(1) as f64;
    let mut data = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            data.push((i as f64 * sx).sin() * (j as f64 * sy).cos());
        }
    }
    data
}

/// Creates curvilinear node coordinates: the index lattice rotated by
/// `angle` radians and bent by a gentle sine along x.
///
/// Returns `(x, y)` arrays of `nx * ny` elements.
pub fn create_curvilinear_coords(nx: usize, ny: usize, angle: f64) -> (Vec<f64>, Vec<f64>) {
    let (s, c) = angle.sin_cos();
    let mut x = Vec::with_capacity(nx * ny);
    let mut y = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let u = i as f64;
            let v = j as f64 + 0.2 * (u * 0.5).sin();
            x.push(c * u - s * v);
            y.push(s * u + c * v);
        }
    }
    (x, y)
}

/// Creates a node mask with `true` inside a disc of `radius` (index units)
/// around `(ci, cj)`.
pub fn create_disc_mask(nx: usize, ny: usize, ci: f64, cj: f64, radius: f64) -> Vec<bool> {
    let mut mask = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            let d2 = (i as f64 - ci).powi(2) + (j as f64 - cj).powi(2);
            mask.push(d2 <= radius * radius);
        }
    }
    mask
}

/// Creates a sparse pseudo-random node mask; roughly one node in `every` is
/// masked.
pub fn create_scattered_mask(nx: usize, ny: usize, every: u32, seed: u32) -> Vec<bool> {
    let every = every.max(1);
    let mut mask = Vec::with_capacity(nx * ny);
    for j in 0..ny {
        for i in 0..nx {
            mask.push(simple_hash(i as u32, j as u32, seed) % every == 0);
        }
    }
    mask
}

/// Returns a copy of `z` with NaN at the given `(i, j)` positions.
pub fn with_nans(mut z: Vec<f64>, nx: usize, positions: &[(usize, usize)]) -> Vec<f64> {
    for &(i, j) in positions {
        if let Some(v) = z.get_mut(j * nx + i) {
            *v = f64::NAN;
        }
    }
    z
}

/// Simple deterministic hash for reproducible test data.
fn simple_hash(x: u32, y: u32, seed: u32) -> u32 {
    let mut h = seed;
    h = h.wrapping_mul(31).wrapping_add(x);
    h = h.wrapping_mul(31).wrapping_add(y);
    h ^= h >> 16;
    h = h.wrapping_mul(0x85ebca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2ae35);
    h ^= h >> 16;
    h
}
