//! Geospatial indexing (spec.md §4.3 point 6 / §3 "Locator" sibling
//! concerns): HTM (Hierarchical Triangular Mesh) trixel decomposition and
//! the Bursa-Wolf CRS transforms that bring non-WGS84 input to WGS84 before
//! decomposition.

use std::f64::consts::PI;

/// A unit vector on the sphere (geocentric Cartesian), the common currency
/// every geometry kind gets converted to before HTM subdivision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vec3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Vec3 { x, y, z }
    }

    pub fn dot(self, other: Vec3) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    pub fn cross(self, other: Vec3) -> Vec3 {
        Vec3::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    pub fn norm(self) -> f64 {
        self.dot(self).sqrt()
    }

    pub fn normalized(self) -> Vec3 {
        let n = self.norm();
        if n == 0.0 {
            self
        } else {
            Vec3::new(self.x / n, self.y / n, self.z / n)
        }
    }

    pub fn midpoint(self, other: Vec3) -> Vec3 {
        Vec3::new(
            (self.x + other.x) / 2.0,
            (self.y + other.y) / 2.0,
            (self.z + other.z) / 2.0,
        )
        .normalized()
    }

    /// Great-circle angular distance to another unit vector, in radians.
    pub fn angle_to(self, other: Vec3) -> f64 {
        self.dot(other).clamp(-1.0, 1.0).acos()
    }
}

/// Geodetic (lon/lat, degrees) to geocentric unit vector on a sphere —
/// sufficient precision for HTM cell membership, which only needs angular
/// relationships, not ellipsoidal ones.
pub fn geodetic_to_cartesian(lon_deg: f64, lat_deg: f64) -> Vec3 {
    let lon = lon_deg.to_radians();
    let lat = lat_deg.to_radians();
    Vec3::new(lat.cos() * lon.cos(), lat.cos() * lon.sin(), lat.sin())
}

pub fn cartesian_to_geodetic(v: Vec3) -> (f64, f64) {
    let v = v.normalized();
    let lat = v.z.asin().to_degrees();
    let lon = v.y.atan2(v.x).to_degrees();
    (lon, lat)
}

/// Supported SRIDs (spec.md §4.3 "Geo CRS support") and their 7-parameter
/// Bursa-Wolf transform to WGS84 (ΔX, ΔY, ΔZ in meters; RX, RY, RZ in
/// arc-seconds; scale in ppm). WGS84 itself is the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Srid {
    Wgs84,
    Wgs72,
    Nad83,
    Nad27,
}

impl Srid {
    pub fn from_epsg(code: u32) -> Option<Self> {
        match code {
            4326 => Some(Srid::Wgs84),
            4322 => Some(Srid::Wgs72),
            4269 => Some(Srid::Nad83),
            4267 => Some(Srid::Nad27),
            _ => None,
        }
    }

    fn bursa_wolf(self) -> [f64; 7] {
        match self {
            Srid::Wgs84 => [0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            // Parameters below are representative/published approximations
            // (NIMA TR8350.2-style values), sufficient for HTM cell
            // membership which tolerates sub-cell error by design (`error`
            // radius in specification_t absorbs the residual).
            Srid::Wgs72 => [0.0, 0.0, 4.5, 0.0, 0.0, 0.554, 0.2263],
            Srid::Nad83 => [1.004, -1.910, -0.515, 0.0267, 0.00034, 0.0158, -0.0015],
            Srid::Nad27 => [-8.0, 160.0, 176.0, 0.0, 0.0, 0.0, 0.0],
        }
    }

    /// Transform a geodetic point in this SRID to WGS84 geodetic degrees,
    /// via geocentric Cartesian + the 7-parameter similarity transform.
    pub fn to_wgs84(self, lon_deg: f64, lat_deg: f64) -> (f64, f64) {
        if self == Srid::Wgs84 {
            return (lon_deg, lat_deg);
        }
        let [dx, dy, dz, rx, ry, rz, scale] = self.bursa_wolf();
        let rx = (rx / 3600.0).to_radians();
        let ry = (ry / 3600.0).to_radians();
        let rz = (rz / 3600.0).to_radians();
        let s = 1.0 + scale / 1_000_000.0;

        let v = geodetic_to_cartesian(lon_deg, lat_deg);
        // Earth-radius-scaled Cartesian so the (meter-valued) translation
        // terms are comparable; HTM only needs the resulting direction.
        const EARTH_RADIUS_M: f64 = 6_378_137.0;
        let (x, y, z) = (v.x * EARTH_RADIUS_M, v.y * EARTH_RADIUS_M, v.z * EARTH_RADIUS_M);

        let x2 = s * (x - rz * y + ry * z) + dx;
        let y2 = s * (rz * x + y - rx * z) + dy;
        let z2 = s * (-ry * x + rx * y + z) + dz;

        cartesian_to_geodetic(Vec3::new(x2, y2, z2))
    }
}

/// A spherical triangle identified by its three unit-vector vertices, plus
/// its HTM id (the original's `name()`: a base triangle letter followed by
/// one quadrant digit per subdivision level).
#[derive(Debug, Clone)]
pub struct Trixel {
    pub id: String,
    pub v0: Vec3,
    pub v1: Vec3,
    pub v2: Vec3,
}

impl Trixel {
    pub fn level(&self) -> usize {
        self.id.len().saturating_sub(1)
    }

    /// Subdivide into 4 child trixels (GLOSSARY "HTM": "recursive
    /// subdivision of the sphere into four equal-area triangles per
    /// level").
    pub fn children(&self) -> [Trixel; 4] {
        let w0 = self.v1.midpoint(self.v2);
        let w1 = self.v2.midpoint(self.v0);
        let w2 = self.v0.midpoint(self.v1);
        [
            Trixel { id: format!("{}0", self.id), v0: self.v0, v1: w2, v2: w1 },
            Trixel { id: format!("{}1", self.id), v0: w2, v1: self.v1, v2: w0 },
            Trixel { id: format!("{}2", self.id), v0: w1, v1: w0, v2: self.v2 },
            Trixel { id: format!("{}3", self.id), v0: w0, v1: w1, v2: w2 },
        ]
    }

    fn centroid(&self) -> Vec3 {
        Vec3::new(
            self.v0.x + self.v1.x + self.v2.x,
            self.v0.y + self.v1.y + self.v2.y,
            self.v0.z + self.v1.z + self.v2.z,
        )
        .normalized()
    }

    /// Half-angle (radians) of the cone circumscribing this trixel around
    /// its centroid; used as a fast wholly-inside/outside test for circles.
    fn bounding_radius(&self) -> f64 {
        let c = self.centroid();
        c.angle_to(self.v0).max(c.angle_to(self.v1)).max(c.angle_to(self.v2))
    }
}

/// The 8 base (level-0) HTM triangles: octahedron faces, vertices at the
/// poles and on the equator at the four cardinal longitudes.
pub fn base_trixels() -> [Trixel; 8] {
    let north = Vec3::new(0.0, 0.0, 1.0);
    let south = Vec3::new(0.0, 0.0, -1.0);
    let v0 = Vec3::new(1.0, 0.0, 0.0);
    let v1 = Vec3::new(0.0, 1.0, 0.0);
    let v2 = Vec3::new(-1.0, 0.0, 0.0);
    let v3 = Vec3::new(0.0, -1.0, 0.0);

    [
        Trixel { id: "N0".into(), v0: north, v1: v0, v2: v1 },
        Trixel { id: "N1".into(), v0: north, v1: v1, v2: v2 },
        Trixel { id: "N2".into(), v0: north, v1: v2, v2: v3 },
        Trixel { id: "N3".into(), v0: north, v1: v3, v2: v0 },
        Trixel { id: "S0".into(), v0: south, v1: v1, v2: v0 },
        Trixel { id: "S1".into(), v0: south, v1: v2, v2: v1 },
        Trixel { id: "S2".into(), v0: south, v1: v3, v2: v2 },
        Trixel { id: "S3".into(), v0: south, v1: v0, v2: v3 },
    ]
}

/// A region to decompose into trixel terms — the geometry kinds spec.md
/// §4.3 point 6 names: points, circles, convex hulls (from an input
/// polygon), multi-polygons, and boolean intersections thereof.
pub enum GeoShape {
    Point(Vec3),
    /// Center + angular radius (radians) — a spherical cap.
    Circle(Vec3, f64),
    /// Closed ring of vertices, in order; the convex hull of these is used
    /// for the inside/outside test.
    Polygon(Vec<Vec3>),
    MultiPolygon(Vec<Vec<Vec3>>),
    Intersection(Box<GeoShape>, Box<GeoShape>),
}

impl GeoShape {
    /// Whether `point` lies in this shape, within `error` radians — the
    /// post-filter spec.md §4.4 pairs with the trixel OR-query.
    pub fn contains(&self, point: Vec3, error: f64) -> bool {
        match self {
            GeoShape::Point(p) => p.angle_to(point) <= error,
            GeoShape::Circle(center, radius) => center.angle_to(point) <= radius + error,
            GeoShape::Polygon(ring) => point_in_spherical_polygon(ring, point),
            GeoShape::MultiPolygon(rings) => rings.iter().any(|r| point_in_spherical_polygon(r, point)),
            GeoShape::Intersection(a, b) => a.contains(point, error) && b.contains(point, error),
        }
    }

    /// Classify a trixel against this shape: wholly inside, wholly outside,
    /// or straddling (needs further subdivision), per spec.md's "recursive
    /// subdivide ... until each trixel is either wholly inside, wholly
    /// outside, or within `error` of the region".
    fn classify(&self, trixel: &Trixel, error: f64) -> Classification {
        match self {
            GeoShape::Circle(center, radius) => {
                let centroid = trixel.centroid();
                let dist = center.angle_to(centroid);
                let bound = trixel.bounding_radius();
                if dist + bound <= *radius {
                    Classification::Inside
                } else if dist - bound > radius + error {
                    Classification::Outside
                } else {
                    Classification::Straddles
                }
            }
            GeoShape::Point(p) => {
                let centroid = trixel.centroid();
                if centroid.angle_to(*p) <= trixel.bounding_radius() {
                    Classification::Straddles
                } else {
                    Classification::Outside
                }
            }
            _ => {
                let corners_in = [trixel.v0, trixel.v1, trixel.v2, trixel.centroid()]
                    .iter()
                    .filter(|v| self.contains(**v, error))
                    .count();
                match corners_in {
                    0 => Classification::Outside,
                    4 => Classification::Inside,
                    _ => Classification::Straddles,
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    Inside,
    Outside,
    Straddles,
}

/// Even-odd spherical point-in-polygon test via signed angular winding —
/// adequate for the convex rings this crate constructs from circle/polygon
/// geo values.
fn point_in_spherical_polygon(ring: &[Vec3], point: Vec3) -> bool {
    if ring.len() < 3 {
        return false;
    }
    let mut angle_sum = 0.0;
    for i in 0..ring.len() {
        let a = ring[i];
        let b = ring[(i + 1) % ring.len()];
        let va = (a.cross(point)).normalized();
        let vb = (b.cross(point)).normalized();
        let cos_theta = va.dot(vb).clamp(-1.0, 1.0);
        let mut theta = cos_theta.acos();
        if va.cross(vb).dot(point) < 0.0 {
            theta = -theta;
        }
        angle_sum += theta;
    }
    angle_sum.abs() > PI
}

/// Maximum subdivision depth; matches the deepest accuracy level the
/// default geo ladder names (spec.md §4.2's accuracy ladder; see
/// `schema::accuracy::default_for`).
pub const MAX_HTM_LEVEL: usize = 12;

/// Recursively subdivide the 8 base trixels against `shape`, retaining
/// every trixel classified wholly inside, plus the coarsest wholly-outside
/// trixel is dropped, until reaching `max_level` or an `error`-bounded fit
/// (spec.md §4.3 point 6).
pub fn decompose(shape: &GeoShape, max_level: usize, error: f64) -> Vec<String> {
    let mut retained = Vec::new();
    for base in base_trixels() {
        subdivide(&base, shape, max_level, error, &mut retained);
    }
    retained
}

fn subdivide(trixel: &Trixel, shape: &GeoShape, max_level: usize, error: f64, retained: &mut Vec<String>) {
    match shape.classify(trixel, error) {
        Classification::Outside => {}
        Classification::Inside => retained.push(trixel.id.clone()),
        Classification::Straddles => {
            if trixel.level() >= max_level {
                retained.push(trixel.id.clone());
            } else {
                for child in trixel.children() {
                    subdivide(&child, shape, max_level, error, retained);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wgs84_transform_is_identity() {
        let (lon, lat) = Srid::Wgs84.to_wgs84(-3.7, 40.4);
        assert!((lon + 3.7).abs() < 1e-9);
        assert!((lat - 40.4).abs() < 1e-9);
    }

    #[test]
    fn epsg_lookup_resolves_known_codes() {
        assert_eq!(Srid::from_epsg(4326), Some(Srid::Wgs84));
        assert_eq!(Srid::from_epsg(4269), Some(Srid::Nad83));
        assert_eq!(Srid::from_epsg(1), None);
    }

    #[test]
    fn base_trixels_cover_both_hemispheres() {
        let bases = base_trixels();
        assert_eq!(bases.len(), 8);
        assert!(bases[0].id.starts_with('N'));
        assert!(bases[4].id.starts_with('S'));
    }

    #[test]
    fn subdivision_produces_deeper_ids() {
        let base = &base_trixels()[0];
        let children = base.children();
        for child in &children {
            assert_eq!(child.level(), base.level() + 1);
        }
    }

    #[test]
    fn point_decomposition_returns_nonempty_trixel_set() {
        let point = geodetic_to_cartesian(-3.7, 40.4);
        let shape = GeoShape::Circle(point, 0.01);
        let terms = decompose(&shape, 6, 0.001);
        assert!(!terms.is_empty());
    }

    #[test]
    fn circle_contains_its_own_center() {
        let center = geodetic_to_cartesian(10.0, 20.0);
        let shape = GeoShape::Circle(center, 0.1);
        assert!(shape.contains(center, 0.0));
    }
}
