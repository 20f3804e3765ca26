//! Minimal WKT support: parsing for `POLYGON` (the format of the exclusion
//! zone files) and rendering for the geometry types the store persists.
//!
//! Rings are stored open; rendering repeats the first vertex as WKT requires
//! and parsing strips a repeated closing vertex.

use crate::{MultiPolygon2, MultiPolygon3, Polygon2, Vertex2};
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum WktError {
    /// The text is valid-looking WKT of a type we do not handle.
    #[error("unsupported WKT geometry type `{found}`")]
    UnsupportedGeometry { found: String },
    #[error("WKT syntax error: expected {expected} at byte {at}")]
    Syntax { expected: &'static str, at: usize },
    #[error("WKT number error at byte {at}")]
    Number { at: usize },
}

struct Scanner<'a> {
    text: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(text: &'a str) -> Self {
        Self { text, pos: 0 }
    }

    fn skip_ws(&mut self) {
        while self.pos < self.text.len()
            && self.text.as_bytes()[self.pos].is_ascii_whitespace()
        {
            self.pos += 1;
        }
    }

    fn keyword(&mut self) -> String {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.text.len() && self.text.as_bytes()[self.pos].is_ascii_alphabetic() {
            self.pos += 1;
        }
        self.text[start..self.pos].to_ascii_uppercase()
    }

    fn expect(&mut self, byte: u8, expected: &'static str) -> Result<(), WktError> {
        self.skip_ws();
        if self.pos < self.text.len() && self.text.as_bytes()[self.pos] == byte {
            self.pos += 1;
            Ok(())
        } else {
            Err(WktError::Syntax {
                expected,
                at: self.pos,
            })
        }
    }

    fn peek(&mut self) -> Option<u8> {
        self.skip_ws();
        self.text.as_bytes().get(self.pos).copied()
    }

    fn number(&mut self) -> Result<f64, WktError> {
        self.skip_ws();
        let start = self.pos;
        while self.pos < self.text.len() {
            let b = self.text.as_bytes()[self.pos];
            if b.is_ascii_digit() || matches!(b, b'-' | b'+' | b'.' | b'e' | b'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        self.text[start..self.pos]
            .parse::<f64>()
            .map_err(|_| WktError::Number { at: start })
    }
}

/// Parses `POLYGON ((x y, ...), (hole ...))` text. A third (Z) coordinate per
/// vertex is accepted and dropped; any other geometry type is rejected with
/// [`WktError::UnsupportedGeometry`] so callers can skip-and-log.
pub fn parse_polygon(text: &str) -> Result<Polygon2, WktError> {
    let mut s = Scanner::new(text);
    let kw = s.keyword();
    if kw != "POLYGON" {
        return Err(WktError::UnsupportedGeometry { found: kw });
    }
    // Optional dimension marker.
    if matches!(s.peek(), Some(b'Z') | Some(b'z')) {
        s.keyword();
    }

    s.expect(b'(', "`(` opening the polygon")?;
    let mut rings: Vec<Vec<Vertex2>> = Vec::new();
    loop {
        rings.push(parse_ring(&mut s)?);
        match s.peek() {
            Some(b',') => {
                s.expect(b',', "`,`")?;
            }
            _ => break,
        }
    }
    s.expect(b')', "`)` closing the polygon")?;

    let mut rings = rings.into_iter();
    let exterior = rings.next().ok_or(WktError::Syntax {
        expected: "at least one ring",
        at: 0,
    })?;
    Ok(Polygon2 {
        exterior,
        interiors: rings.collect(),
    })
}

fn parse_ring(s: &mut Scanner<'_>) -> Result<Vec<Vertex2>, WktError> {
    s.expect(b'(', "`(` opening a ring")?;
    let mut ring: Vec<Vertex2> = Vec::new();
    loop {
        let x = s.number()?;
        let y = s.number()?;
        // Swallow an optional Z ordinate.
        if matches!(s.peek(), Some(b) if b.is_ascii_digit() || b == b'-' || b == b'+' || b == b'.')
        {
            s.number()?;
        }
        ring.push([x, y]);
        match s.peek() {
            Some(b',') => {
                s.expect(b',', "`,`")?;
            }
            _ => break,
        }
    }
    s.expect(b')', "`)` closing a ring")?;

    // Drop the repeated closing vertex.
    if ring.len() > 3 && ring.first() == ring.last() {
        ring.pop();
    }
    Ok(ring)
}

fn push_ring_2d(out: &mut String, ring: &[Vertex2]) {
    out.push('(');
    for (i, &[x, y]) in ring.iter().chain(ring.first()).enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{x} {y}"));
    }
    out.push(')');
}

fn push_polygon_body_2d(out: &mut String, polygon: &Polygon2) {
    out.push('(');
    push_ring_2d(out, &polygon.exterior);
    for hole in &polygon.interiors {
        out.push_str(", ");
        push_ring_2d(out, hole);
    }
    out.push(')');
}

pub fn polygon_to_wkt(polygon: &Polygon2) -> String {
    let mut out = String::from("POLYGON ");
    push_polygon_body_2d(&mut out, polygon);
    out
}

pub fn multipolygon_to_wkt(multi: &MultiPolygon2) -> String {
    let mut out = String::from("MULTIPOLYGON (");
    for (i, polygon) in multi.0.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        push_polygon_body_2d(&mut out, polygon);
    }
    out.push(')');
    out
}

pub fn multipolygon_z_to_wkt(multi: &MultiPolygon3) -> String {
    let mut out = String::from("MULTIPOLYGON Z (");
    for (i, polygon) in multi.0.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push('(');
        for (r, ring) in std::iter::once(&polygon.exterior)
            .chain(polygon.interiors.iter())
            .enumerate()
        {
            if r > 0 {
                out.push_str(", ");
            }
            out.push('(');
            for (i, &[x, y, z]) in ring.iter().chain(ring.first()).enumerate() {
                if i > 0 {
                    out.push_str(", ");
                }
                out.push_str(&format!("{x} {y} {z}"));
            }
            out.push(')');
        }
        out.push(')');
    }
    out.push(')');
    out
}

pub fn multipoint_to_wkt(points: &[Vertex2]) -> String {
    let mut out = String::from("MULTIPOINT (");
    for (i, &[x, y]) in points.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("({x} {y})"));
    }
    out.push(')');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Polygon3;

    #[test]
    fn parses_polygon_with_closing_vertex() {
        let p = parse_polygon("POLYGON ((0 0, 1 0, 1 1, 0 1, 0 0))").unwrap();
        assert_eq!(p.exterior, vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]]);
        assert!(p.interiors.is_empty());
    }

    #[test]
    fn parses_polygon_with_hole_and_renders_back() {
        let text = "POLYGON ((0 0, 4 0, 4 4, 0 4, 0 0), (1 1, 2 1, 2 2, 1 2, 1 1))";
        let p = parse_polygon(text).unwrap();
        assert_eq!(p.interiors.len(), 1);
        let rendered = polygon_to_wkt(&p);
        assert_eq!(parse_polygon(&rendered).unwrap(), p);
    }

    #[test]
    fn rejects_other_geometry_types() {
        assert_eq!(
            parse_polygon("LINESTRING (0 0, 1 1)"),
            Err(WktError::UnsupportedGeometry {
                found: "LINESTRING".into()
            })
        );
    }

    #[test]
    fn rejects_garbage() {
        assert!(matches!(
            parse_polygon("POLYGON ((0 0, 1))"),
            Err(WktError::Number { .. }) | Err(WktError::Syntax { .. })
        ));
    }

    #[test]
    fn renders_multipolygon_z() {
        let multi = MultiPolygon3(vec![Polygon3::from_exterior(vec![
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
        ])]);
        let wkt = multipolygon_z_to_wkt(&multi);
        assert_eq!(wkt, "MULTIPOLYGON Z (((0 0 0, 1 0 0, 1 1 0, 0 0 0)))");
    }
}
