//! Mask vectorization: 4-connected regions of valid pixels to polygons.
//!
//! Output polygons are in pixel space (x = column, y = row, pixel `(c, r)`
//! covering `[c, c + 1] x [r, r + 1]`). Regions are returned in the order of
//! their first pixel in a row-major scan.

use super::Mask;
use geo::{Area, Contains, Coord, LineString, Point, Polygon};
use std::collections::{HashMap, VecDeque};

type Vertex = (usize, usize);

pub fn polygonize(mask: &Mask) -> Vec<Polygon<f64>> {
    let (labels, regions) = label_regions(mask);

    regions
        .iter()
        .enumerate()
        .flat_map(|(index, pixels)| region_polygons(mask, &labels, index as u32 + 1, pixels))
        .collect()
}

/// Labels 4-connected valid regions. Label 0 is "no data".
fn label_regions(mask: &Mask) -> (Vec<u32>, Vec<Vec<Vertex>>) {
    let mut labels = vec![0u32; mask.width * mask.height];
    let mut count = 0u32;
    let mut queue = VecDeque::new();

    for row in 0..mask.height {
        for col in 0..mask.width {
            if !mask.is_valid(col, row) || labels[row * mask.width + col] != 0 {
                continue;
            }

            count += 1;
            labels[row * mask.width + col] = count;
            queue.push_back((col, row));

            while let Some((c, r)) = queue.pop_front() {
                for (nc, nr) in neighbours(c, r, mask.width, mask.height) {
                    let idx = nr * mask.width + nc;
                    if mask.is_valid(nc, nr) && labels[idx] == 0 {
                        labels[idx] = count;
                        queue.push_back((nc, nr));
                    }
                }
            }
        }
    }

    // Second pass so each region's pixels are in row-major order.
    let mut regions = vec![Vec::new(); count as usize];
    for row in 0..mask.height {
        for col in 0..mask.width {
            let label = labels[row * mask.width + col];
            if label != 0 {
                regions[label as usize - 1].push((col, row));
            }
        }
    }

    (labels, regions)
}

fn neighbours(c: usize, r: usize, width: usize, height: usize) -> impl Iterator<Item = Vertex> {
    let mut out = Vec::with_capacity(4);
    if r > 0 {
        out.push((c, r - 1));
    }
    if c + 1 < width {
        out.push((c + 1, r));
    }
    if r + 1 < height {
        out.push((c, r + 1));
    }
    if c > 0 {
        out.push((c - 1, r));
    }
    out.into_iter()
}

fn region_polygons(mask: &Mask, labels: &[u32], label: u32, pixels: &[Vertex]) -> Vec<Polygon<f64>> {
    let inside = |c: Option<usize>, r: Option<usize>| match (c, r) {
        (Some(c), Some(r)) if c < mask.width && r < mask.height => labels[r * mask.width + c] == label,
        _ => false,
    };

    // Boundary edges oriented so that outer rings have positive area.
    let mut edges: Vec<(Vertex, Vertex)> = Vec::new();
    for &(c, r) in pixels {
        if !inside(Some(c), r.checked_sub(1)) {
            edges.push(((c, r), (c + 1, r)));
        }
        if !inside(Some(c + 1), Some(r)) {
            edges.push(((c + 1, r), (c + 1, r + 1)));
        }
        if !inside(Some(c), Some(r + 1)) {
            edges.push(((c + 1, r + 1), (c, r + 1)));
        }
        if !inside(c.checked_sub(1), Some(r)) {
            edges.push(((c, r + 1), (c, r)));
        }
    }

    let rings = trace_rings(&edges);

    let mut outers: Vec<LineString<f64>> = Vec::new();
    let mut holes: Vec<(LineString<f64>, Point<f64>)> = Vec::new();
    for raw in rings {
        let probe = edge_midpoint(raw[0], raw[1]);
        let ring = simplify(&raw);
        if signed_area(&raw) > 0.0 {
            outers.push(ring);
        } else {
            holes.push((ring, probe));
        }
    }

    let mut interiors: Vec<Vec<LineString<f64>>> = vec![Vec::new(); outers.len()];
    for (hole, probe) in holes {
        let owner = outers
            .iter()
            .enumerate()
            .filter(|(_, outer)| Polygon::new((*outer).clone(), vec![]).contains(&probe))
            .min_by(|(_, a), (_, b)| {
                let a = Polygon::new((*a).clone(), vec![]).unsigned_area();
                let b = Polygon::new((*b).clone(), vec![]).unsigned_area();
                a.total_cmp(&b)
            })
            .map(|(i, _)| i);

        if let Some(i) = owner {
            interiors[i].push(hole);
        }
    }

    outers
        .into_iter()
        .zip(interiors)
        .map(|(exterior, interiors)| Polygon::new(exterior, interiors))
        .collect()
}

/// Links directed edges into closed vertex rings (first vertex not repeated).
fn trace_rings(edges: &[(Vertex, Vertex)]) -> Vec<Vec<Vertex>> {
    let mut outgoing: HashMap<Vertex, Vec<usize>> = HashMap::new();
    for (i, (from, _)) in edges.iter().enumerate() {
        outgoing.entry(*from).or_default().push(i);
    }

    let mut used = vec![false; edges.len()];
    let mut rings = Vec::new();

    for start in 0..edges.len() {
        if used[start] {
            continue;
        }
        used[start] = true;

        let mut ring = vec![edges[start].0];
        let mut current = start;

        loop {
            let (from, to) = edges[current];

            // At a pinch vertex take the widest turn: diagonal pixels stay joined
            // and a hole touching the outline becomes its own ring.
            let incoming = direction(from, to);
            let next = outgoing
                .get(&to)
                .into_iter()
                .flatten()
                .copied()
                .filter(|&i| !used[i] || i == start)
                .min_by_key(|&i| cross(incoming, direction(edges[i].0, edges[i].1)));

            match next {
                Some(i) if i != start => {
                    ring.push(to);
                    used[i] = true;
                    current = i;
                }
                _ => break,
            }
        }

        rings.push(ring);
    }

    rings
}

fn direction(from: Vertex, to: Vertex) -> (i64, i64) {
    (to.0 as i64 - from.0 as i64, to.1 as i64 - from.1 as i64)
}

fn cross(a: (i64, i64), b: (i64, i64)) -> i64 {
    a.0 * b.1 - a.1 * b.0
}

fn signed_area(ring: &[Vertex]) -> f64 {
    let n = ring.len();
    let twice: i64 = (0..n)
        .map(|i| {
            let (x1, y1) = ring[i];
            let (x2, y2) = ring[(i + 1) % n];
            x1 as i64 * y2 as i64 - x2 as i64 * y1 as i64
        })
        .sum();
    twice as f64 / 2.0
}

fn edge_midpoint(a: Vertex, b: Vertex) -> Point<f64> {
    Point::new((a.0 + b.0) as f64 / 2.0, (a.1 + b.1) as f64 / 2.0)
}

/// Drops collinear vertices and closes the ring.
fn simplify(ring: &[Vertex]) -> LineString<f64> {
    let n = ring.len();
    let mut coords: Vec<Coord<f64>> = (0..n)
        .filter(|&i| {
            let prev = ring[(i + n - 1) % n];
            let next = ring[(i + 1) % n];
            cross(direction(prev, ring[i]), direction(ring[i], next)) != 0
        })
        .map(|i| Coord {
            x: ring[i].0 as f64,
            y: ring[i].1 as f64,
        })
        .collect();

    if let Some(first) = coords.first().copied() {
        coords.push(first);
    }
    LineString::new(coords)
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::BoundingRect;

    fn mask(rows: &[&str]) -> Mask {
        let height = rows.len();
        let width = rows[0].len();
        let data = rows
            .iter()
            .flat_map(|row| row.bytes().map(|b| if b == b'#' { 255 } else { 0 }))
            .collect();
        Mask { width, height, data }
    }

    #[test]
    fn test_single_block_is_rectangle() {
        let polygons = polygonize(&mask(&["....", ".##.", ".##.", "...."]));
        assert_eq!(polygons.len(), 1);

        let polygon = &polygons[0];
        assert_eq!(polygon.exterior().0.len(), 5);
        assert!(polygon.interiors().is_empty());
        assert_eq!(polygon.unsigned_area(), 4.0);

        let rect = polygon.bounding_rect().unwrap();
        assert_eq!((rect.min().x, rect.min().y), (1.0, 1.0));
        assert_eq!((rect.max().x, rect.max().y), (3.0, 3.0));
    }

    #[test]
    fn test_regions_ordered_by_first_pixel() {
        let polygons = polygonize(&mask(&["...#", "#...", "#..#"]));
        assert_eq!(polygons.len(), 3);

        let first = polygons[0].bounding_rect().unwrap();
        assert_eq!((first.min().x, first.min().y), (3.0, 0.0));
        let second = polygons[1].bounding_rect().unwrap();
        assert_eq!((second.min().x, second.min().y), (0.0, 1.0));
        assert_eq!(polygons[1].unsigned_area(), 2.0);
    }

    #[test]
    fn test_hole_is_interior_ring() {
        let polygons = polygonize(&mask(&["###", "#.#", "###"]));
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].interiors().len(), 1);
        assert_eq!(polygons[0].unsigned_area(), 8.0);
    }

    #[test]
    fn test_diagonal_pixels_are_separate_regions() {
        let polygons = polygonize(&mask(&["#.", ".#"]));
        assert_eq!(polygons.len(), 2);
        assert!(polygons.iter().all(|p| p.unsigned_area() == 1.0));
    }

    #[test]
    fn test_hole_touching_outline_stays_separate_ring() {
        let polygons = polygonize(&mask(&["###", "#.#", "##."]));
        assert_eq!(polygons.len(), 1);
        assert_eq!(polygons[0].interiors().len(), 1);
        assert_eq!(polygons[0].unsigned_area(), 7.0);
    }

    #[test]
    fn test_empty_mask() {
        assert!(polygonize(&mask(&["...", "..."])).is_empty());
    }
}
