//! GJK closest points between two convex proxies.
//!
//! The simplex from the last query is kept in a [`SimplexCache`] owned by
//! the caller. Feeding it back on the next step usually lets the query
//! converge in one or two iterations for slowly moving shapes.

use glam::Vec2;
use tracing::debug;

use super::proxy::DistanceProxy;
use crate::math::{cross, cross_sv, cross_vs, Transform};
use crate::settings::GJK_MAX_ITERATIONS;
use crate::shape::Shape;

/// Warm-start state for [`distance`]. Zero-initialise before the first call.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct SimplexCache {
    /// Length or area of the cached simplex.
    pub metric: f32,
    pub count: u16,
    /// Vertices on proxy A.
    pub index_a: [u8; 3],
    /// Vertices on proxy B.
    pub index_b: [u8; 3],
}

#[derive(Debug, Clone, Copy)]
pub struct DistanceInput<'a> {
    pub proxy_a: DistanceProxy<'a>,
    pub proxy_b: DistanceProxy<'a>,
    pub transform_a: Transform,
    pub transform_b: Transform,
    /// Account for the proxies' rounding radii.
    pub use_radii: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DistanceOutput {
    /// Closest point on A.
    pub point_a: Vec2,
    /// Closest point on B.
    pub point_b: Vec2,
    pub distance: f32,
    /// GJK iterations used.
    pub iterations: u32,
}

#[derive(Debug, Clone, Copy, Default)]
struct SimplexVertex {
    /// Support point on A, world space.
    w_a: Vec2,
    /// Support point on B, world space.
    w_b: Vec2,
    /// `w_b - w_a`
    w: Vec2,
    /// Barycentric coordinate of the closest point.
    a: f32,
    index_a: usize,
    index_b: usize,
}

impl SimplexVertex {
    fn new(
        proxy_a: &DistanceProxy<'_>,
        xf_a: &Transform,
        index_a: usize,
        proxy_b: &DistanceProxy<'_>,
        xf_b: &Transform,
        index_b: usize,
    ) -> Self {
        let w_a = xf_a.apply(proxy_a.vertex(index_a));
        let w_b = xf_b.apply(proxy_b.vertex(index_b));
        Self {
            w_a,
            w_b,
            w: w_b - w_a,
            a: 1.0,
            index_a,
            index_b,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
struct Simplex {
    v: [SimplexVertex; 3],
    count: usize,
}

impl Simplex {
    fn read_cache(
        cache: &SimplexCache,
        proxy_a: &DistanceProxy<'_>,
        xf_a: &Transform,
        proxy_b: &DistanceProxy<'_>,
        xf_b: &Transform,
    ) -> Self {
        let mut simplex = Simplex::default();

        let count = usize::from(cache.count);
        let in_range = count <= 3
            && (0..count).all(|i| {
                usize::from(cache.index_a[i]) < proxy_a.vertex_count()
                    && usize::from(cache.index_b[i]) < proxy_b.vertex_count()
            });

        if in_range {
            for i in 0..count {
                simplex.v[i] = SimplexVertex::new(
                    proxy_a,
                    xf_a,
                    usize::from(cache.index_a[i]),
                    proxy_b,
                    xf_b,
                    usize::from(cache.index_b[i]),
                );
                simplex.v[i].a = 0.0;
            }
            simplex.count = count;

            // Flush the cache if the simplex changed size a lot since it was
            // stored; it is unlikely to still be a good guess.
            if count > 1 {
                let metric1 = cache.metric;
                let metric2 = simplex.metric();
                if metric2 < 0.5 * metric1 || 2.0 * metric1 < metric2 || metric2 < f32::EPSILON {
                    debug!(metric1, metric2, "discarding stale simplex cache");
                    simplex.count = 0;
                }
            }
        } else {
            debug!(count, "simplex cache indices out of range, cold start");
        }

        if simplex.count == 0 {
            simplex.v[0] = SimplexVertex::new(proxy_a, xf_a, 0, proxy_b, xf_b, 0);
            simplex.count = 1;
        }

        simplex
    }

    fn write_cache(&self, cache: &mut SimplexCache) {
        cache.metric = self.metric();
        cache.count = self.count as u16;
        for (i, v) in self.v[..self.count].iter().enumerate() {
            cache.index_a[i] = v.index_a as u8;
            cache.index_b[i] = v.index_b as u8;
        }
    }

    fn search_direction(&self) -> Vec2 {
        match self.count {
            1 => -self.v[0].w,
            2 => {
                let e12 = self.v[1].w - self.v[0].w;
                let sgn = cross(e12, -self.v[0].w);
                if sgn > 0.0 {
                    // Origin is left of e12.
                    cross_sv(1.0, e12)
                } else {
                    cross_vs(e12, 1.0)
                }
            }
            _ => Vec2::ZERO,
        }
    }

    fn witness_points(&self) -> (Vec2, Vec2) {
        let [v1, v2, v3] = &self.v;
        match self.count {
            1 => (v1.w_a, v1.w_b),
            2 => (
                v1.a * v1.w_a + v2.a * v2.w_a,
                v1.a * v1.w_b + v2.a * v2.w_b,
            ),
            _ => {
                let p = v1.a * v1.w_a + v2.a * v2.w_a + v3.a * v3.w_a;
                (p, p)
            }
        }
    }

    fn metric(&self) -> f32 {
        match self.count {
            2 => self.v[0].w.distance(self.v[1].w),
            3 => cross(self.v[1].w - self.v[0].w, self.v[2].w - self.v[0].w),
            _ => 0.0,
        }
    }

    /// Closest point to the origin on a segment, in barycentric form.
    fn solve2(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let e12 = w2 - w1;

        // w1 region
        let d12_2 = -w1.dot(e12);
        if d12_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        // w2 region
        let d12_1 = w2.dot(e12);
        if d12_1 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        let inv_d12 = 1.0 / (d12_1 + d12_2);
        self.v[0].a = d12_1 * inv_d12;
        self.v[1].a = d12_2 * inv_d12;
        self.count = 2;
    }

    /// Closest point to the origin on a triangle, testing the vertex, edge
    /// and interior Voronoi regions in turn.
    fn solve3(&mut self) {
        let w1 = self.v[0].w;
        let w2 = self.v[1].w;
        let w3 = self.v[2].w;

        let e12 = w2 - w1;
        let d12_1 = w2.dot(e12);
        let d12_2 = -w1.dot(e12);

        let e13 = w3 - w1;
        let d13_1 = w3.dot(e13);
        let d13_2 = -w1.dot(e13);

        let e23 = w3 - w2;
        let d23_1 = w3.dot(e23);
        let d23_2 = -w2.dot(e23);

        let n123 = cross(e12, e13);
        let d123_1 = n123 * cross(w2, w3);
        let d123_2 = n123 * cross(w3, w1);
        let d123_3 = n123 * cross(w1, w2);

        if d12_2 <= 0.0 && d13_2 <= 0.0 {
            self.v[0].a = 1.0;
            self.count = 1;
            return;
        }

        if d12_1 > 0.0 && d12_2 > 0.0 && d123_3 <= 0.0 {
            let inv = 1.0 / (d12_1 + d12_2);
            self.v[0].a = d12_1 * inv;
            self.v[1].a = d12_2 * inv;
            self.count = 2;
            return;
        }

        if d13_1 > 0.0 && d13_2 > 0.0 && d123_2 <= 0.0 {
            let inv = 1.0 / (d13_1 + d13_2);
            self.v[0].a = d13_1 * inv;
            self.v[2].a = d13_2 * inv;
            self.count = 2;
            self.v[1] = self.v[2];
            return;
        }

        if d12_1 <= 0.0 && d23_2 <= 0.0 {
            self.v[1].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[1];
            return;
        }

        if d13_1 <= 0.0 && d23_1 <= 0.0 {
            self.v[2].a = 1.0;
            self.count = 1;
            self.v[0] = self.v[2];
            return;
        }

        if d23_1 > 0.0 && d23_2 > 0.0 && d123_1 <= 0.0 {
            let inv = 1.0 / (d23_1 + d23_2);
            self.v[1].a = d23_1 * inv;
            self.v[2].a = d23_2 * inv;
            self.count = 2;
            self.v[0] = self.v[2];
            return;
        }

        // Origin is inside the triangle.
        let inv = 1.0 / (d123_1 + d123_2 + d123_3);
        self.v[0].a = d123_1 * inv;
        self.v[1].a = d123_2 * inv;
        self.v[2].a = d123_3 * inv;
        self.count = 3;
    }
}

/// Closest points between two convex proxies.
///
/// `cache` is read as a warm start and overwritten with the final simplex.
pub fn distance(cache: &mut SimplexCache, input: &DistanceInput<'_>) -> DistanceOutput {
    let proxy_a = &input.proxy_a;
    let proxy_b = &input.proxy_b;
    let xf_a = &input.transform_a;
    let xf_b = &input.transform_b;

    let mut simplex = Simplex::read_cache(cache, proxy_a, xf_a, proxy_b, xf_b);

    let mut save_a = [0usize; 3];
    let mut save_b = [0usize; 3];

    let mut iter = 0;
    while iter < GJK_MAX_ITERATIONS {
        // Remember the simplex so duplicates can be detected after adding
        // a support point.
        let save_count = simplex.count;
        for i in 0..save_count {
            save_a[i] = simplex.v[i].index_a;
            save_b[i] = simplex.v[i].index_b;
        }

        match simplex.count {
            2 => simplex.solve2(),
            3 => simplex.solve3(),
            _ => {}
        }

        if simplex.count == 3 {
            // Overlap.
            break;
        }

        let d = simplex.search_direction();
        if d.length_squared() < f32::EPSILON * f32::EPSILON {
            // The origin is probably on the simplex. Adding a vertex would
            // not tell us anything reliable.
            break;
        }

        let index_a = proxy_a.support(xf_a.q.apply_t(-d));
        let index_b = proxy_b.support(xf_b.q.apply_t(d));
        let vertex = SimplexVertex::new(proxy_a, xf_a, index_a, proxy_b, xf_b, index_b);
        simplex.v[simplex.count] = vertex;

        iter += 1;

        let duplicate = (0..save_count).any(|i| save_a[i] == index_a && save_b[i] == index_b);
        if duplicate {
            // No progress, the last simplex is the best we have.
            break;
        }

        simplex.count += 1;
    }

    if iter == GJK_MAX_ITERATIONS {
        debug!(iter, "GJK hit its iteration cap");
    }

    let (mut point_a, mut point_b) = simplex.witness_points();
    let mut dist = point_a.distance(point_b);
    simplex.write_cache(cache);

    if input.use_radii {
        let r_a = proxy_a.radius();
        let r_b = proxy_b.radius();

        if dist > r_a + r_b && dist > f32::EPSILON {
            // Shapes are still separated after rounding; move the witness
            // points onto the surfaces.
            dist -= r_a + r_b;
            let normal = (point_b - point_a).normalize();
            point_a += r_a * normal;
            point_b -= r_b * normal;
        } else {
            let p = 0.5 * (point_a + point_b);
            point_a = p;
            point_b = p;
            dist = 0.0;
        }
    }

    DistanceOutput {
        point_a,
        point_b,
        distance: dist,
        iterations: iter,
    }
}

/// Whether two shape children overlap, including their rounding radii.
pub fn test_overlap(
    shape_a: &Shape,
    child_a: usize,
    shape_b: &Shape,
    child_b: usize,
    xf_a: &Transform,
    xf_b: &Transform,
) -> bool {
    let input = DistanceInput {
        proxy_a: DistanceProxy::from_shape(shape_a, child_a),
        proxy_b: DistanceProxy::from_shape(shape_b, child_b),
        transform_a: *xf_a,
        transform_b: *xf_b,
        use_radii: true,
    };
    let mut cache = SimplexCache::default();
    let output = distance(&mut cache, &input);
    output.distance < 10.0 * f32::EPSILON
}
