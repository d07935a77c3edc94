//! British National Grid reference codec
//!
//! Parses and formats OS grid references (`TR 15069 57724`) and converts
//! between OSGB36 eastings/northings and WGS84 latitude/longitude.
//!
//! # Conversion chain
//! ```text
//! E/N --(inverse Transverse Mercator, Airy 1830)--> OSGB36 lat/lng
//!     --(cartesian, 7-parameter Helmert)--> WGS84 lat/lng
//! ```
//! The Helmert parameters are the published OSGB36 → WGS84 set, accurate to
//! a few metres, which is well inside 6-digit (100 m) reference precision.

use crate::error::LocationError;
use crate::models::Coordinate;

/// Grid reference with its numeric position
#[derive(Debug, Clone, PartialEq)]
pub struct GridReference {
    /// Input as supplied
    pub raw: String,
    /// 100 km square letters, uppercased
    pub letters: String,
    /// Metres east of the false origin (south-west corner of the square at given precision)
    pub eastings: f64,
    /// Metres north of the false origin
    pub northings: f64,
    /// Number of digits after the letters (2, 4, 6, 8 or 10)
    pub digits: u8,
}

impl GridReference {
    pub fn coordinate(&self) -> Coordinate {
        to_lat_lng(self.eastings, self.northings)
    }

    /// Canonical spaced form at the reference's own precision
    pub fn normalized(&self) -> String {
        let per_axis = usize::from(self.digits / 2);
        if per_axis == 0 {
            return self.letters.clone();
        }
        format_reference(&self.letters, self.eastings, self.northings, per_axis)
    }
}

/// Derived 6/8/10-digit variants of one position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GridReferencePrecisions {
    pub six: String,
    pub eight: String,
    pub ten: String,
}

/// Parser with a configurable list of untrusted 100 km squares
#[derive(Debug, Clone)]
pub struct GridReferenceCodec {
    unreliable_prefixes: Vec<String>,
}

impl Default for GridReferenceCodec {
    fn default() -> Self {
        Self::new(["SV"])
    }
}

impl GridReferenceCodec {
    pub fn new<I, S>(unreliable_prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            unreliable_prefixes: unreliable_prefixes
                .into_iter()
                .map(|p| p.as_ref().trim().to_ascii_uppercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Parse a grid reference
    ///
    /// Accepts two letters followed by an even number (2-10) of digits,
    /// with any whitespace. Fails for references outside the national grid
    /// and for squares on the unreliable list.
    pub fn parse(&self, raw: &str) -> Result<GridReference, LocationError> {
        let compact: String = raw
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_ascii_uppercase();

        let invalid = |reason: &str| LocationError::InvalidGridReference(format!("{:?} {}", raw, reason));

        let mut chars = compact.chars();
        let (first, second) = match (chars.next(), chars.next()) {
            (Some(a), Some(b)) if a.is_ascii_uppercase() && b.is_ascii_uppercase() => (a, b),
            _ => return Err(invalid("does not start with two letters")),
        };
        let digits: &str = &compact[2..];
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            return Err(invalid("contains characters other than digits after the letters"));
        }
        if digits.len() < 2 || digits.len() > 10 || digits.len() % 2 != 0 {
            return Err(invalid("must have an even number of digits between 2 and 10"));
        }
        if !"HJNOST".contains(first) || second == 'I' {
            return Err(invalid("is not a national grid square"));
        }
        let letters = format!("{}{}", first, second);
        if self.unreliable_prefixes.iter().any(|p| *p == letters) {
            return Err(invalid("uses an unreliable grid square"));
        }

        let (e100km, n100km) = square_origin(first, second);
        if !(0.0..=6.0).contains(&e100km) || !(0.0..=12.0).contains(&n100km) {
            return Err(invalid("is outside the national grid"));
        }
        let half = digits.len() / 2;
        let scale = 10f64.powi(5 - half as i32);
        let easting_digits: f64 = digits[..half].parse().map_err(|_| invalid("has unreadable easting"))?;
        let northing_digits: f64 = digits[half..].parse().map_err(|_| invalid("has unreadable northing"))?;

        Ok(GridReference {
            raw: raw.to_string(),
            letters,
            eastings: e100km * 100_000.0 + easting_digits * scale,
            northings: n100km * 100_000.0 + northing_digits * scale,
            digits: digits.len() as u8,
        })
    }

    pub fn is_valid(&self, raw: &str) -> bool {
        self.parse(raw).is_ok()
    }
}

/// 100 km square index from its two letters (I is not used)
fn square_origin(first: char, second: char) -> (f64, f64) {
    let index = |c: char| {
        let i = c as i32 - 'A' as i32;
        if i > 7 {
            i - 1
        } else {
            i
        }
    };
    let l1 = index(first);
    let l2 = index(second);
    let e100km = ((l1 - 2) % 5) * 5 + (l2 % 5);
    let n100km = (19 - (l1 / 5) * 5) - (l2 / 5);
    (f64::from(e100km), f64::from(n100km))
}

/// Letters of the 100 km square containing a position
fn square_letters(eastings: f64, northings: f64) -> Result<String, LocationError> {
    let e100km = (eastings / 100_000.0).floor() as i32;
    let n100km = (northings / 100_000.0).floor() as i32;
    if !(0..=6).contains(&e100km) || !(0..=12).contains(&n100km) {
        return Err(LocationError::InvalidGridReference(format!(
            "position {:.0},{:.0} is outside the national grid",
            eastings, northings
        )));
    }
    let mut l1 = (19 - n100km) - (19 - n100km) % 5 + (e100km + 10) / 5;
    let mut l2 = ((19 - n100km) * 5) % 25 + e100km % 5;
    if l1 > 7 {
        l1 += 1;
    }
    if l2 > 7 {
        l2 += 1;
    }
    let letter = |i: i32| char::from(b'A' + i as u8);
    Ok(format!("{}{}", letter(l1), letter(l2)))
}

fn format_reference(letters: &str, eastings: f64, northings: f64, per_axis: usize) -> String {
    let divisor = 10f64.powi(5 - per_axis as i32);
    let e = ((eastings.rem_euclid(100_000.0)) / divisor).floor() as u64;
    let n = ((northings.rem_euclid(100_000.0)) / divisor).floor() as u64;
    format!("{} {:0width$} {:0width$}", letters, e, n, width = per_axis)
}

/// 6, 8 and 10 digit references for a position, truncating both axes alike
pub fn derive_precisions(eastings: f64, northings: f64) -> Result<GridReferencePrecisions, LocationError> {
    let letters = square_letters(eastings, northings)?;
    Ok(GridReferencePrecisions {
        six: format_reference(&letters, eastings, northings, 3),
        eight: format_reference(&letters, eastings, northings, 4),
        ten: format_reference(&letters, eastings, northings, 5),
    })
}

// ============================================================================
// OSGB36 <-> WGS84
// ============================================================================

struct Ellipsoid {
    a: f64,
    b: f64,
}

impl Ellipsoid {
    fn e2(&self) -> f64 {
        1.0 - (self.b * self.b) / (self.a * self.a)
    }
}

const AIRY_1830: Ellipsoid = Ellipsoid { a: 6_377_563.396, b: 6_356_256.909 };
const WGS84: Ellipsoid = Ellipsoid { a: 6_378_137.0, b: 6_356_752.314245 };

/// National Grid projection constants
const F0: f64 = 0.999_601_271_7;
const LAT0_DEG: f64 = 49.0;
const LNG0_DEG: f64 = -2.0;
const E0: f64 = 400_000.0;
const N0: f64 = -100_000.0;

/// OSGB36 → WGS84: translation (m), rotation (arc-seconds), scale (ppm)
struct Helmert {
    tx: f64,
    ty: f64,
    tz: f64,
    rx: f64,
    ry: f64,
    rz: f64,
    s: f64,
}

const OSGB36_TO_WGS84: Helmert = Helmert {
    tx: 446.448,
    ty: -125.157,
    tz: 542.060,
    rx: 0.1502,
    ry: 0.2470,
    rz: 0.8421,
    s: -20.4894,
};

impl Helmert {
    fn inverse(&self) -> Helmert {
        Helmert {
            tx: -self.tx,
            ty: -self.ty,
            tz: -self.tz,
            rx: -self.rx,
            ry: -self.ry,
            rz: -self.rz,
            s: -self.s,
        }
    }

    fn apply(&self, (x, y, z): (f64, f64, f64)) -> (f64, f64, f64) {
        let arcsec = |v: f64| (v / 3600.0).to_radians();
        let (rx, ry, rz) = (arcsec(self.rx), arcsec(self.ry), arcsec(self.rz));
        let s1 = self.s / 1e6 + 1.0;
        (
            self.tx + x * s1 - y * rz + z * ry,
            self.ty + x * rz + y * s1 - z * rx,
            self.tz - x * ry + y * rx + z * s1,
        )
    }
}

fn meridional_arc(ellipsoid: &Ellipsoid, lat: f64) -> f64 {
    let n = (ellipsoid.a - ellipsoid.b) / (ellipsoid.a + ellipsoid.b);
    let (n2, n3) = (n * n, n * n * n);
    let lat0 = LAT0_DEG.to_radians();
    let (dl, sl) = (lat - lat0, lat + lat0);
    let ma = (1.0 + n + 1.25 * n2 + 1.25 * n3) * dl;
    let mb = (3.0 * n + 3.0 * n2 + 21.0 / 8.0 * n3) * dl.sin() * sl.cos();
    let mc = (15.0 / 8.0 * n2 + 15.0 / 8.0 * n3) * (2.0 * dl).sin() * (2.0 * sl).cos();
    let md = 35.0 / 24.0 * n3 * (3.0 * dl).sin() * (3.0 * sl).cos();
    ellipsoid.b * F0 * (ma - mb + mc - md)
}

/// Eastings/northings → OSGB36 lat/lng (radians)
fn transverse_mercator_inverse(eastings: f64, northings: f64) -> (f64, f64) {
    let ellipsoid = &AIRY_1830;
    let (a, e2) = (ellipsoid.a, ellipsoid.e2());

    let mut lat = LAT0_DEG.to_radians();
    let mut m = 0.0;
    // Converges to 0.01 mm in a handful of iterations
    for _ in 0..100 {
        lat += (northings - N0 - m) / (a * F0);
        m = meridional_arc(ellipsoid, lat);
        if (northings - N0 - m).abs() < 1e-5 {
            break;
        }
    }

    let sin_lat = lat.sin();
    let nu = a * F0 / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let rho = a * F0 * (1.0 - e2) / (1.0 - e2 * sin_lat * sin_lat).powf(1.5);
    let eta2 = nu / rho - 1.0;

    let tan = lat.tan();
    let (t2, t4, t6) = (tan * tan, tan.powi(4), tan.powi(6));
    let sec = 1.0 / lat.cos();

    let vii = tan / (2.0 * rho * nu);
    let viii = tan / (24.0 * rho * nu.powi(3)) * (5.0 + 3.0 * t2 + eta2 - 9.0 * t2 * eta2);
    let ix = tan / (720.0 * rho * nu.powi(5)) * (61.0 + 90.0 * t2 + 45.0 * t4);
    let x = sec / nu;
    let xi = sec / (6.0 * nu.powi(3)) * (nu / rho + 2.0 * t2);
    let xii = sec / (120.0 * nu.powi(5)) * (5.0 + 28.0 * t2 + 24.0 * t4);
    let xiia = sec / (5040.0 * nu.powi(7)) * (61.0 + 662.0 * t2 + 1320.0 * t4 + 720.0 * t6);

    let de = eastings - E0;
    let lat = lat - vii * de.powi(2) + viii * de.powi(4) - ix * de.powi(6);
    let lng = LNG0_DEG.to_radians() + x * de - xi * de.powi(3) + xii * de.powi(5) - xiia * de.powi(7);
    (lat, lng)
}

/// OSGB36 lat/lng (radians) → eastings/northings
fn transverse_mercator_forward(lat: f64, lng: f64) -> (f64, f64) {
    let ellipsoid = &AIRY_1830;
    let (a, e2) = (ellipsoid.a, ellipsoid.e2());

    let (sin_lat, cos_lat) = lat.sin_cos();
    let nu = a * F0 / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    let rho = a * F0 * (1.0 - e2) / (1.0 - e2 * sin_lat * sin_lat).powf(1.5);
    let eta2 = nu / rho - 1.0;
    let m = meridional_arc(ellipsoid, lat);

    let tan = lat.tan();
    let (t2, t4) = (tan * tan, tan.powi(4));
    let (cos3, cos5) = (cos_lat.powi(3), cos_lat.powi(5));

    let i = m + N0;
    let ii = nu / 2.0 * sin_lat * cos_lat;
    let iii = nu / 24.0 * sin_lat * cos3 * (5.0 - t2 + 9.0 * eta2);
    let iiia = nu / 720.0 * sin_lat * cos5 * (61.0 - 58.0 * t2 + t4);
    let iv = nu * cos_lat;
    let v = nu / 6.0 * cos3 * (nu / rho - t2);
    let vi = nu / 120.0 * cos5 * (5.0 - 18.0 * t2 + t4 + 14.0 * eta2 - 58.0 * t2 * eta2);

    let dl = lng - LNG0_DEG.to_radians();
    let northings = i + ii * dl.powi(2) + iii * dl.powi(4) + iiia * dl.powi(6);
    let eastings = E0 + iv * dl + v * dl.powi(3) + vi * dl.powi(5);
    (eastings, northings)
}

fn to_cartesian(ellipsoid: &Ellipsoid, lat: f64, lng: f64) -> (f64, f64, f64) {
    let e2 = ellipsoid.e2();
    let sin_lat = lat.sin();
    let nu = ellipsoid.a / (1.0 - e2 * sin_lat * sin_lat).sqrt();
    (
        nu * lat.cos() * lng.cos(),
        nu * lat.cos() * lng.sin(),
        (1.0 - e2) * nu * sin_lat,
    )
}

fn from_cartesian(ellipsoid: &Ellipsoid, (x, y, z): (f64, f64, f64)) -> (f64, f64) {
    let e2 = ellipsoid.e2();
    let p = x.hypot(y);
    let mut lat = z.atan2(p * (1.0 - e2));
    for _ in 0..10 {
        let nu = ellipsoid.a / (1.0 - e2 * lat.sin().powi(2)).sqrt();
        let next = (z + e2 * nu * lat.sin()).atan2(p);
        let converged = (next - lat).abs() < 1e-12;
        lat = next;
        if converged {
            break;
        }
    }
    (lat, y.atan2(x))
}

/// OSGB36 eastings/northings → WGS84
pub fn to_lat_lng(eastings: f64, northings: f64) -> Coordinate {
    let (lat, lng) = transverse_mercator_inverse(eastings, northings);
    let cartesian = OSGB36_TO_WGS84.apply(to_cartesian(&AIRY_1830, lat, lng));
    let (lat, lng) = from_cartesian(&WGS84, cartesian);
    Coordinate::new(lat.to_degrees(), lng.to_degrees())
}

/// WGS84 → OSGB36 eastings/northings, rounded to the nearest metre
pub fn from_lat_lng(coordinate: Coordinate) -> (f64, f64) {
    let cartesian = to_cartesian(&WGS84, coordinate.lat.to_radians(), coordinate.lng.to_radians());
    let (lat, lng) = from_cartesian(&AIRY_1830, OSGB36_TO_WGS84.inverse().apply(cartesian));
    let (eastings, northings) = transverse_mercator_forward(lat, lng);
    (eastings.round(), northings.round())
}

/// Grid references for a WGS84 coordinate, if it falls on the national grid
pub fn precisions_for(coordinate: Coordinate) -> Option<GridReferencePrecisions> {
    let (eastings, northings) = from_lat_lng(coordinate);
    derive_precisions(eastings, northings).ok()
}
