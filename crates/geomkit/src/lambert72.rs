//! Belgian Lambert 72 (EPSG 31370): Lambert Conformal Conic, two standard
//! parallels, on the International 1924 (Hayford) ellipsoid.
//!
//! Forward maps WGS 84 longitude/latitude degrees to easting/northing meters
//! in the working planar system; inverse maps back. The BD72 datum shift is
//! NOT applied: both directions operate at the ellipsoid level, so the
//! forward/inverse pair is exact to numerical precision while absolute
//! positions carry the (roughly hundred-meter) datum offset. The exclusion
//! polygons this is used for are authored far coarser than that.

/// International 1924 ellipsoid.
pub mod hayford1924 {
    /// Semi-major axis (equatorial radius) in meters.
    pub const A: f64 = 6_378_388.0;

    /// Flattening factor (1 / 297).
    pub const F: f64 = 1.0 / 297.0;

    /// First eccentricity squared.
    pub const E2: f64 = F * (2.0 - F);
}

/// First standard parallel, degrees (49 deg 50 min 00.00204 sec N).
const LAT_1_DEG: f64 = 49.833_333_9;

/// Second standard parallel, degrees (51 deg 10 min 00.00204 sec N).
const LAT_2_DEG: f64 = 51.166_667_2;

/// Latitude of origin, degrees (the pole).
const LAT_0_DEG: f64 = 90.0;

/// Central meridian, degrees (4 deg 22 min 02.952 sec E).
const LON_0_DEG: f64 = 4.367_486_666_666_666;

/// False easting, meters.
const X_0: f64 = 150_000.013;

/// False northing, meters.
const Y_0: f64 = 5_400_088.438;

/// Inverse-latitude iteration tolerance, radians.
const PHI_EPS: f64 = 1e-12;

#[inline]
fn m_factor(phi: f64, e: f64) -> f64 {
    let s = phi.sin();
    phi.cos() / (1.0 - e * e * s * s).sqrt()
}

#[inline]
fn t_factor(phi: f64, e: f64) -> f64 {
    let s = phi.sin();
    (std::f64::consts::FRAC_PI_4 - phi / 2.0).tan()
        / ((1.0 - e * s) / (1.0 + e * s)).powf(e / 2.0)
}

struct Projection {
    n: f64,
    af: f64,
    rho_0: f64,
    e: f64,
}

/// Derived projection constants (EPSG method 9802).
fn projection() -> Projection {
    let e = hayford1924::E2.sqrt();
    let phi_1 = LAT_1_DEG.to_radians();
    let phi_2 = LAT_2_DEG.to_radians();
    let phi_0 = LAT_0_DEG.to_radians();

    let m_1 = m_factor(phi_1, e);
    let m_2 = m_factor(phi_2, e);
    let t_1 = t_factor(phi_1, e);
    let t_2 = t_factor(phi_2, e);
    let t_0 = t_factor(phi_0, e);

    let n = (m_1.ln() - m_2.ln()) / (t_1.ln() - t_2.ln());
    let f = m_1 / (n * t_1.powf(n));
    let af = hayford1924::A * f;
    // With the origin at the pole t_0 is 0, making rho_0 0 as well; computed
    // anyway so the parameters stay honest if the origin ever moves.
    let rho_0 = af * t_0.powf(n);

    Projection { n, af, rho_0, e }
}

/// Longitude/latitude degrees to Lambert 72 easting/northing meters.
pub fn lonlat_to_lambert72(lon_deg: f64, lat_deg: f64) -> [f64; 2] {
    let p = projection();
    let phi = lat_deg.to_radians();
    let lambda = lon_deg.to_radians();

    let rho = p.af * t_factor(phi, p.e).powf(p.n);
    let theta = p.n * (lambda - LON_0_DEG.to_radians());

    [X_0 + rho * theta.sin(), Y_0 + p.rho_0 - rho * theta.cos()]
}

/// Lambert 72 easting/northing meters back to longitude/latitude degrees.
pub fn lambert72_to_lonlat(x: f64, y: f64) -> [f64; 2] {
    let p = projection();
    let dx = x - X_0;
    let dy = p.rho_0 - (y - Y_0);

    let rho = (dx * dx + dy * dy).sqrt().copysign(p.n);
    let theta = dx.atan2(dy);
    let t = (rho / p.af).powf(1.0 / p.n);

    // phi = pi/2 - 2 atan(t * ((1 - e sin phi)/(1 + e sin phi))^(e/2)),
    // solved by fixed-point iteration from the spherical estimate.
    let mut phi = std::f64::consts::FRAC_PI_2 - 2.0 * t.atan();
    loop {
        let s = phi.sin();
        let next = std::f64::consts::FRAC_PI_2
            - 2.0 * (t * ((1.0 - p.e * s) / (1.0 + p.e * s)).powf(p.e / 2.0)).atan();
        if (next - phi).abs() < PHI_EPS {
            phi = next;
            break;
        }
        phi = next;
    }

    let lambda = theta / p.n + LON_0_DEG.to_radians();
    [lambda.to_degrees(), phi.to_degrees()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn brussels_lands_near_the_false_origin() {
        // Central Brussels: the projection was parameterized so the city
        // center sits close to (150 km, 170 km).
        let [x, y] = lonlat_to_lambert72(4.3517, 50.8466);
        assert!((140_000.0..160_000.0).contains(&x), "x = {x}");
        assert!((160_000.0..180_000.0).contains(&y), "y = {y}");
    }

    #[test]
    fn forward_inverse_round_trip() {
        for &(lon, lat) in &[
            (4.3517, 50.8466),
            (4.3000, 50.8000),
            (4.4800, 50.9000),
            (5.5000, 50.6333),
        ] {
            let [x, y] = lonlat_to_lambert72(lon, lat);
            let [lon2, lat2] = lambert72_to_lonlat(x, y);
            assert!((lon - lon2).abs() < 1e-9, "lon {lon} -> {lon2}");
            assert!((lat - lat2).abs() < 1e-9, "lat {lat} -> {lat2}");
        }
    }

    #[test]
    fn northing_increases_with_latitude() {
        let [_, y_south] = lonlat_to_lambert72(4.35, 50.0);
        let [_, y_north] = lonlat_to_lambert72(4.35, 51.0);
        assert!(y_north > y_south);
    }
}
