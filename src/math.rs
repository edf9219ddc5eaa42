//! Math type aliases and geometry helpers.
//!
//! Provides the scalar and vector types used throughout the crate plus the
//! small kernel of geometry functions the spatial index and the weight
//! queries are built on: grid cell key derivation, inclusive cell box
//! enumeration, and the Gaussian kernel.

pub use nalgebra;

/// Scalar type for all distance and weight math.
pub type Real = f64;

/// 3D vector ([`Real`]).
pub type Vec3 = nalgebra::Vector3<Real>;

/// Scale applied to machine epsilon to define "near enough" comparisons.
pub const EPSILON_SCALE: Real = 1000.0;

/// Default comparison epsilon: machine epsilon scaled by [`EPSILON_SCALE`].
///
/// Used as the default radius for exact-coordinate spatial lookups.
pub fn epsilon() -> Real {
    Real::EPSILON * EPSILON_SCALE
}

/// Integer grid cell key, derived by flooring a scaled coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellKey {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

/// Compute the grid cell key of a point under the given scale.
pub fn cell_key(point: &Vec3, scale: Real) -> CellKey {
    let scaled = point * scale;
    CellKey {
        x: scaled.x.floor() as i64,
        y: scaled.y.floor() as i64,
        z: scaled.z.floor() as i64,
    }
}

/// Enumerate every cell key in the inclusive box spanned by `low` and `high`.
///
/// The bounds are normalized per axis, so the arguments may be given in
/// either order.
pub fn flood(low: CellKey, high: CellKey) -> Vec<CellKey> {
    let (lx, hx) = (low.x.min(high.x), low.x.max(high.x));
    let (ly, hy) = (low.y.min(high.y), low.y.max(high.y));
    let (lz, hz) = (low.z.min(high.z), low.z.max(high.z));

    let mut keys = Vec::new();
    for x in lx..=hx {
        for y in ly..=hy {
            for z in lz..=hz {
                keys.push(CellKey { x, y, z });
            }
        }
    }
    keys
}

/// Gaussian kernel weight of `value` for standard deviation `sigma`.
///
/// `(1 / (sigma * sqrt(2π))) * exp(-0.5 * (value / sigma)²)`
pub fn gaussian_weight(value: Real, sigma: Real) -> Real {
    let a = value / sigma;
    let inv_sqrt_2pi = (1.0 / (2.0 * std::f64::consts::PI)).sqrt();
    (inv_sqrt_2pi / sigma) * (-0.5 * a * a).exp()
}

/// Near-equality for scalars with a caller-tunable epsilon.
pub fn near_equal(a: Real, b: Real, eps: Real) -> bool {
    (a - b).abs() < eps
}

/// Near-equality for vectors: every component within `eps`.
pub fn near_equal_vec3(a: &Vec3, b: &Vec3, eps: Real) -> bool {
    near_equal(a.x, b.x, eps) && near_equal(a.y, b.y, eps) && near_equal(a.z, b.z, eps)
}
