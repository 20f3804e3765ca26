//! Geometry toolkit for the basemap dataset store.
//!
//! Pure, stateless polygon math over plain `[f64; N]` vertices:
//!
//! - Newell normals for possibly non-planar rings.
//! - In-plane projection bases derived from a normal.
//! - Vertex-average centroids (NOT area-weighted; see `centroid_3d`).
//! - Planar shoelace areas on the best-fit plane.
//! - Ground projection (drop the elevation component).
//! - Even-odd point-in-polygon tests.
//!
//! All areas and containment tests assume a locally near-Euclidean planar
//! reference system (the store works in Belgian Lambert 72); nothing here is
//! geodesic. The [`lambert72`] module converts WGS 84 longitude/latitude into
//! that working system, and [`wkt`] parses/renders the small WKT subset the
//! store persists.

pub mod lambert72;
pub mod wkt;

use thiserror::Error;

/// A 3D vertex: x, y, elevation.
pub type Vertex3 = [f64; 3];

/// A 2D vertex in the working planar system.
pub type Vertex2 = [f64; 2];

/// Cross-product magnitude below which a ring is considered degenerate.
const DEGENERATE_NORMAL_EPS: f64 = 1e-12;

/// Cross-product magnitude below which a reference axis is considered
/// parallel to the normal and another axis is substituted.
const PARALLEL_AXIS_EPS: f64 = 1e-4;

#[derive(Debug, Error, PartialEq)]
pub enum GeometryError {
    /// Collinear or zero-area ring: no meaningful normal exists.
    #[error("degenerate ring: zero-length normal")]
    DegenerateRing,
    /// An operation that needs at least one vertex got none.
    #[error("empty geometry")]
    EmptyGeometry,
}

/// A 3D polygon: exterior ring plus optional interior rings (holes).
///
/// Rings are open (the closing vertex is not repeated).
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon3 {
    pub exterior: Vec<Vertex3>,
    pub interiors: Vec<Vec<Vertex3>>,
}

/// A 3D multipolygon, the geometry type of building faces.
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPolygon3(pub Vec<Polygon3>);

/// A 2D polygon in the working planar system.
#[derive(Debug, Clone, PartialEq)]
pub struct Polygon2 {
    pub exterior: Vec<Vertex2>,
    pub interiors: Vec<Vec<Vertex2>>,
}

/// A 2D multipolygon (building footprints, parcels).
#[derive(Debug, Clone, PartialEq)]
pub struct MultiPolygon2(pub Vec<Polygon2>);

impl Polygon3 {
    pub fn from_exterior(exterior: Vec<Vertex3>) -> Self {
        Self {
            exterior,
            interiors: Vec::new(),
        }
    }

    /// Drops the elevation component of every vertex.
    pub fn ground_projection(&self) -> Polygon2 {
        Polygon2 {
            exterior: self.exterior.iter().map(|v| [v[0], v[1]]).collect(),
            interiors: self
                .interiors
                .iter()
                .map(|ring| ring.iter().map(|v| [v[0], v[1]]).collect())
                .collect(),
        }
    }
}

impl MultiPolygon3 {
    pub fn ground_projection(&self) -> MultiPolygon2 {
        MultiPolygon2(self.0.iter().map(Polygon3::ground_projection).collect())
    }

    /// Bounding box of the ground projection.
    pub fn bbox_2d(&self) -> Option<(f64, f64, f64, f64)> {
        bbox_of(
            self.0
                .iter()
                .flat_map(|p| p.exterior.iter().map(|v| [v[0], v[1]])),
        )
    }
}

impl Polygon2 {
    pub fn from_exterior(exterior: Vec<Vertex2>) -> Self {
        Self {
            exterior,
            interiors: Vec::new(),
        }
    }

    /// Even-odd containment test. A point inside an interior ring (a hole)
    /// is outside the polygon. Boundary behavior follows the ray cast and is
    /// not guaranteed either way.
    pub fn contains(&self, point: Vertex2) -> bool {
        if !point_in_ring(point, &self.exterior) {
            return false;
        }
        !self.interiors.iter().any(|hole| point_in_ring(point, hole))
    }

    /// Axis-aligned bounding box as (min_x, min_y, max_x, max_y).
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        bbox_of(self.exterior.iter().copied())
    }
}

impl MultiPolygon2 {
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        bbox_of(self.0.iter().flat_map(|p| p.exterior.iter().copied()))
    }
}

fn bbox_of(vertices: impl Iterator<Item = Vertex2>) -> Option<(f64, f64, f64, f64)> {
    let mut bbox: Option<(f64, f64, f64, f64)> = None;
    for [x, y] in vertices {
        if !(x.is_finite() && y.is_finite()) {
            continue;
        }
        bbox = Some(match bbox {
            None => (x, y, x, y),
            Some((min_x, min_y, max_x, max_y)) => {
                (min_x.min(x), min_y.min(y), max_x.max(x), max_y.max(y))
            }
        });
    }
    bbox
}

#[inline]
fn cross(a: Vertex3, b: Vertex3) -> Vertex3 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline]
fn dot(a: Vertex3, b: Vertex3) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

#[inline]
fn norm(v: Vertex3) -> f64 {
    dot(v, v).sqrt()
}

#[inline]
fn scale(v: Vertex3, s: f64) -> Vertex3 {
    [v[0] * s, v[1] * s, v[2] * s]
}

#[inline]
fn sub(a: Vertex3, b: Vertex3) -> Vertex3 {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

/// Unit normal of a possibly non-planar ring via Newell's method: summed
/// cross terms over consecutive edge pairs. Robust against slightly warped
/// rings; fails for collinear or zero-area input, which callers must handle
/// explicitly.
pub fn newell_normal(ring: &[Vertex3]) -> Result<Vertex3, GeometryError> {
    if ring.is_empty() {
        return Err(GeometryError::EmptyGeometry);
    }

    let (mut x, mut y, mut z) = (0.0_f64, 0.0_f64, 0.0_f64);
    for i in 0..ring.len() {
        let current = ring[i];
        let next = ring[(i + 1) % ring.len()];
        x += (current[1] - next[1]) * (current[2] + next[2]);
        y += (current[2] - next[2]) * (current[0] + next[0]);
        z += (current[0] - next[0]) * (current[1] + next[1]);
    }

    let n = [x, y, z];
    let len = norm(n);
    if !len.is_finite() || len < DEGENERATE_NORMAL_EPS {
        return Err(GeometryError::DegenerateRing);
    }
    Ok(scale(n, 1.0 / len))
}

/// Two orthonormal in-plane axes for the plane with the given unit normal.
///
/// The first axis is `normal x Z`; when the normal is nearly parallel to Z
/// (horizontal faces) the Y axis is substituted to avoid a degenerate basis.
pub fn projection_basis(normal: Vertex3) -> (Vertex3, Vertex3) {
    let mut u = cross(normal, [0.0, 0.0, 1.0]);
    if norm(u) < PARALLEL_AXIS_EPS {
        u = cross(normal, [0.0, 1.0, 0.0]);
    }
    let u = scale(u, 1.0 / norm(u));
    let v = cross(normal, u);
    (u, v)
}

/// Vertex-average centroid of one ring.
fn ring_centroid(ring: &[Vertex3]) -> Result<Vertex3, GeometryError> {
    if ring.is_empty() {
        return Err(GeometryError::EmptyGeometry);
    }
    let sum = ring
        .iter()
        .fold([0.0_f64; 3], |acc, v| [acc[0] + v[0], acc[1] + v[1], acc[2] + v[2]]);
    Ok(scale(sum, 1.0 / ring.len() as f64))
}

/// Unweighted mean of all exterior-ring vertices, averaged per polygon part.
///
/// This is a vertex average, not an area-weighted centroid: a part with many
/// vertices on one side pulls the result that way. It matches what the face
/// data needs (a representative point on or near the face) at a fraction of
/// the cost of a true centroid.
pub fn centroid_3d(multi: &MultiPolygon3) -> Result<Vertex3, GeometryError> {
    if multi.0.is_empty() {
        return Err(GeometryError::EmptyGeometry);
    }
    let mut acc = [0.0_f64; 3];
    for polygon in &multi.0 {
        let c = ring_centroid(&polygon.exterior)?;
        acc = [acc[0] + c[0], acc[1] + c[1], acc[2] + c[2]];
    }
    Ok(scale(acc, 1.0 / multi.0.len() as f64))
}

/// Area of a (near-)planar multipolygon: exterior vertices are projected
/// onto the best-fit plane of the first part, then the planar shoelace
/// formula is applied to each part.
///
/// Valid only because the working reference system is locally near-Euclidean;
/// this is a planar approximation, not a geodesic area. Holes are ignored.
pub fn planar_area(multi: &MultiPolygon3) -> Result<f64, GeometryError> {
    let first = multi.0.first().ok_or(GeometryError::EmptyGeometry)?;
    let normal = newell_normal(&first.exterior)?;
    let (u, v) = projection_basis(normal);
    let origin = centroid_3d(multi)?;

    let mut total = 0.0_f64;
    for polygon in &multi.0 {
        let projected: Vec<Vertex2> = polygon
            .exterior
            .iter()
            .map(|&p| {
                let d = sub(p, origin);
                [dot(d, u), dot(d, v)]
            })
            .collect();
        total += shoelace(&projected).abs();
    }
    Ok(total)
}

/// Signed shoelace area of a 2D ring.
fn shoelace(ring: &[Vertex2]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut acc = 0.0_f64;
    for i in 0..ring.len() {
        let [x0, y0] = ring[i];
        let [x1, y1] = ring[(i + 1) % ring.len()];
        acc += x0 * y1 - x1 * y0;
    }
    0.5 * acc
}

/// Even-odd ray cast against a single ring.
pub fn point_in_ring(point: Vertex2, ring: &[Vertex2]) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let [px, py] = point;
    let mut inside = false;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let [xi, yi] = ring[i];
        let [xj, yj] = ring[j];
        if (yi > py) != (yj > py) {
            let x_inter = (xj - xi) * (py - yi) / (yj - yi) + xi;
            if px < x_inter {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square_z0() -> MultiPolygon3 {
        MultiPolygon3(vec![Polygon3::from_exterior(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ])])
    }

    #[test]
    fn newell_normal_of_horizontal_ring_points_up() {
        let n = newell_normal(&unit_square_z0().0[0].exterior).unwrap();
        assert!((n[2].abs() - 1.0).abs() < 1e-12);
        assert!(n[0].abs() < 1e-12 && n[1].abs() < 1e-12);
    }

    #[test]
    fn newell_normal_rejects_collinear_ring() {
        let ring = vec![[0.0, 0.0, 0.0], [1.0, 1.0, 1.0], [2.0, 2.0, 2.0]];
        assert_eq!(newell_normal(&ring), Err(GeometryError::DegenerateRing));
    }

    #[test]
    fn centroid_of_unit_square_is_its_center() {
        let c = centroid_3d(&unit_square_z0()).unwrap();
        assert!((c[0] - 0.5).abs() < 1e-9);
        assert!((c[1] - 0.5).abs() < 1e-9);
        assert!(c[2].abs() < 1e-9);
    }

    #[test]
    fn projection_basis_is_orthonormal() {
        // A tilted wall-like face.
        let n = newell_normal(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 1.0],
            [1.0, 1.0, 1.0],
            [0.0, 1.0, 0.0],
        ])
        .unwrap();
        let (u, v) = projection_basis(n);
        assert!(dot(u, v).abs() < 1e-12);
        assert!(dot(u, n).abs() < 1e-12);
        assert!((norm(u) - 1.0).abs() < 1e-12);
        assert!((norm(v) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn projection_basis_handles_vertical_normal() {
        // Normal parallel to Z: the fallback axis must kick in.
        let (u, v) = projection_basis([0.0, 0.0, 1.0]);
        assert!((norm(u) - 1.0).abs() < 1e-12);
        assert!((norm(v) - 1.0).abs() < 1e-12);
        assert!(dot(u, v).abs() < 1e-12);
    }

    #[test]
    fn planar_area_of_unit_square() {
        let a = planar_area(&unit_square_z0()).unwrap();
        assert!((a - 1.0).abs() < 1e-9);
    }

    #[test]
    fn planar_area_of_tilted_square() {
        // Unit square rotated 45 degrees around the X axis; the planar area
        // must still be 1, not its ground-projected 1/sqrt(2).
        let s = 0.5_f64.sqrt();
        let tilted = MultiPolygon3(vec![Polygon3::from_exterior(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, s, s],
            [0.0, s, s],
        ])]);
        let a = planar_area(&tilted).unwrap();
        assert!((a - 1.0).abs() < 1e-9);
    }

    #[test]
    fn ground_projection_drops_elevation() {
        let face = MultiPolygon3(vec![Polygon3::from_exterior(vec![
            [0.0, 0.0, 12.5],
            [1.0, 0.0, 13.0],
            [1.0, 1.0, 14.0],
        ])]);
        let flat = face.ground_projection();
        assert_eq!(flat.0[0].exterior, vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0]]);
    }

    #[test]
    fn point_in_polygon_even_odd() {
        let square = Polygon2::from_exterior(vec![
            [0.0, 0.0],
            [1.0, 0.0],
            [1.0, 1.0],
            [0.0, 1.0],
        ]);
        assert!(square.contains([0.5, 0.5]));
        assert!(!square.contains([1.5, 0.5]));

        let with_hole = Polygon2 {
            exterior: square.exterior.clone(),
            interiors: vec![vec![[0.4, 0.4], [0.6, 0.4], [0.6, 0.6], [0.4, 0.6]]],
        };
        assert!(!with_hole.contains([0.5, 0.5]));
        assert!(with_hole.contains([0.1, 0.1]));
    }
}
