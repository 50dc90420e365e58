//! Convex Polyhedra
//!
//! Shape descriptors and world-space hull instances for the narrowphase.
//!
//! # Types
//!
//! - `Aabb`: axis-aligned bounding box (min/max corners)
//! - `HullShape`: immutable convex polyhedron descriptor — local vertices,
//!   faces (outward plane normal + CCW vertex loop), and undirected edges
//!   with their two adjacent faces
//! - `Hull`: a `HullShape` instanced at a world transform and size, caching
//!   world vertices, world face normals, and the world AABB
//!
//! # Invariants
//!
//! Checked at `HullShape` construction: every face is planar and convex with
//! an outward normal under right-hand CCW winding, every edge borders exactly
//! two faces, and every vertex lies on or behind every face plane.

use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;

use crate::error::PhysicsError;
use crate::math::{CFrame, Vec3};

/// Tolerance for planarity / convexity validation of hull input.
const SHAPE_EPSILON: f32 = 1e-3;

/// Cross products below this squared length are treated as parallel edges.
const PARALLEL_EPSILON: f32 = 1e-8;

// ============================================================================
// Aabb
// ============================================================================

/// Axis-aligned bounding box stored as min and max corners.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    /// Minimum corner
    pub min: Vec3,
    /// Maximum corner
    pub max: Vec3,
}

impl Aabb {
    /// Create a new AABB from min and max corners
    #[inline]
    pub const fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Smallest AABB containing all `points`. Empty input yields a point box
    /// at the origin.
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut min = points.first().copied().unwrap_or(Vec3::ZERO);
        let mut max = min;
        for &p in points.iter().skip(1) {
            min = min.min(p);
            max = max.max(p);
        }
        Self { min, max }
    }

    /// Check if two AABBs overlap
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// True when `other` lies entirely inside this box
    #[inline]
    pub fn contains(&self, other: &Aabb) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.min.z <= other.min.z
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
            && self.max.z >= other.max.z
    }

    /// Union of two AABBs
    #[inline]
    pub fn union(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Box grown by `pad` in every direction
    #[inline]
    pub fn expanded(&self, pad: f32) -> Aabb {
        let p = Vec3::splat(pad);
        Aabb {
            min: self.min - p,
            max: self.max + p,
        }
    }

    /// Center point
    #[inline]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Surface-area heuristic metric: `xy + xz + yz` of the extents.
    #[inline]
    pub fn surface_area(&self) -> f32 {
        let d = self.max - self.min;
        d.x * d.y + d.x * d.z + d.y * d.z
    }
}

// ============================================================================
// HullShape
// ============================================================================

/// A polygonal face: outward plane normal plus a CCW-ordered vertex loop.
#[derive(Clone, Debug)]
pub struct Face {
    /// Outward unit normal in local space
    pub normal: Vec3,
    /// CCW-ordered indices into the vertex list
    pub indices: Vec<u32>,
}

/// An undirected edge: two vertex indices and the two adjacent faces.
#[derive(Clone, Copy, Debug)]
pub struct Edge {
    /// First endpoint (vertex index)
    pub v0: u32,
    /// Second endpoint (vertex index)
    pub v1: u32,
    /// One adjacent face
    pub f0: u32,
    /// The other adjacent face
    pub f1: u32,
}

/// Immutable convex polyhedron descriptor, shared by many bodies.
#[derive(Clone, Debug)]
pub struct HullShape {
    /// Local-space vertices
    pub vertices: Vec<Vec3>,
    /// Faces with outward normals and CCW loops
    pub faces: Vec<Face>,
    /// Undirected edges with adjacent-face pairs
    pub edges: Vec<Edge>,
}

impl HullShape {
    /// Build and validate a hull from vertices and per-face index loops.
    ///
    /// Face plane normals are computed from the first three non-collinear
    /// vertices of each loop; edge adjacency is derived. Non-convex,
    /// degenerate, or non-manifold input fails with
    /// [`PhysicsError::InvalidShape`].
    pub fn new(vertices: Vec<Vec3>, face_indices: Vec<Vec<u32>>) -> Result<Self, PhysicsError> {
        if vertices.len() < 4 {
            return Err(PhysicsError::InvalidShape {
                reason: "a hull needs at least four vertices",
            });
        }
        if face_indices.len() < 4 {
            return Err(PhysicsError::InvalidShape {
                reason: "a hull needs at least four faces",
            });
        }

        let mut faces = Vec::with_capacity(face_indices.len());
        for loop_indices in &face_indices {
            if loop_indices.len() < 3 {
                return Err(PhysicsError::InvalidShape {
                    reason: "face loop has fewer than three vertices",
                });
            }
            for &i in loop_indices {
                if i as usize >= vertices.len() {
                    return Err(PhysicsError::InvalidShape {
                        reason: "face index out of range",
                    });
                }
            }

            let normal = face_normal(&vertices, loop_indices)?;

            // Planarity: every loop vertex must sit on the face plane.
            let w = normal.dot(vertices[loop_indices[0] as usize]);
            for &i in loop_indices {
                if (normal.dot(vertices[i as usize]) - w).abs() > SHAPE_EPSILON {
                    return Err(PhysicsError::InvalidShape {
                        reason: "face is not planar",
                    });
                }
            }

            faces.push(Face {
                normal,
                indices: loop_indices.clone(),
            });
        }

        // Convexity + outwardness: all vertices behind every face plane.
        for face in &faces {
            let w = face.normal.dot(vertices[face.indices[0] as usize]);
            for &v in &vertices {
                if face.normal.dot(v) > w + SHAPE_EPSILON {
                    return Err(PhysicsError::InvalidShape {
                        reason: "hull is not convex or a face normal points inward",
                    });
                }
            }
        }

        let edges = derive_edges(&faces)?;

        Ok(Self {
            vertices,
            faces,
            edges,
        })
    }

    /// Canonical unit cube centered at the origin (half-extent 0.5).
    ///
    /// Scaled per-axis by a body's size, this is the box primitive.
    pub fn cuboid() -> Self {
        let h = 0.5;
        let vertices = vec![
            Vec3::new(-h, -h, -h),
            Vec3::new(h, -h, -h),
            Vec3::new(h, h, -h),
            Vec3::new(-h, h, -h),
            Vec3::new(-h, -h, h),
            Vec3::new(h, -h, h),
            Vec3::new(h, h, h),
            Vec3::new(-h, h, h),
        ];
        let face_indices = vec![
            vec![4, 5, 6, 7], // +Z
            vec![1, 0, 3, 2], // -Z
            vec![5, 1, 2, 6], // +X
            vec![0, 4, 7, 3], // -X
            vec![3, 7, 6, 2], // +Y
            vec![0, 1, 5, 4], // -Y
        ];
        // The unit cube is valid by construction.
        Self::new(vertices, face_indices).expect("unit cube is a valid hull")
    }
}

/// Plane normal from the first three non-collinear vertices of a loop.
fn face_normal(vertices: &[Vec3], indices: &[u32]) -> Result<Vec3, PhysicsError> {
    let v0 = vertices[indices[0] as usize];
    for i in 1..indices.len() - 1 {
        let a = vertices[indices[i] as usize] - v0;
        let b = vertices[indices[i + 1] as usize] - v0;
        let n = a.cross(b);
        if n.length_squared() > PARALLEL_EPSILON {
            return Ok(n.normalize());
        }
    }
    Err(PhysicsError::InvalidShape {
        reason: "face vertices are collinear",
    })
}

/// Derive the undirected edge list with adjacent-face pairs.
///
/// Each directed edge of every CCW loop is keyed by its unordered endpoints;
/// a well-formed closed hull visits every undirected edge exactly twice.
fn derive_edges(faces: &[Face]) -> Result<Vec<Edge>, PhysicsError> {
    let mut adjacency: HashMap<(u32, u32), (u32, Option<u32>)> = HashMap::new();

    for (face_idx, face) in faces.iter().enumerate() {
        let n = face.indices.len();
        for k in 0..n {
            let a = face.indices[k];
            let b = face.indices[(k + 1) % n];
            if a == b {
                return Err(PhysicsError::InvalidShape {
                    reason: "face loop repeats a vertex",
                });
            }
            let key = (a.min(b), a.max(b));
            match adjacency.entry(key) {
                Entry::Vacant(entry) => {
                    entry.insert((face_idx as u32, None));
                }
                Entry::Occupied(mut entry) => match entry.get_mut() {
                    (_, second @ None) => *second = Some(face_idx as u32),
                    (_, Some(_)) => {
                        return Err(PhysicsError::InvalidShape {
                            reason: "edge borders more than two faces",
                        });
                    }
                },
            }
        }
    }

    let mut edges: Vec<Edge> = Vec::with_capacity(adjacency.len());
    for (&(v0, v1), &(f0, f1)) in &adjacency {
        let f1 = f1.ok_or(PhysicsError::InvalidShape {
            reason: "edge borders only one face",
        })?;
        edges.push(Edge { v0, v1, f0, f1 });
    }
    // HashMap iteration order is not stable; sort for deterministic edge ids.
    edges.sort_by_key(|e| (e.v0, e.v1));

    Ok(edges)
}

// ============================================================================
// Hull (world-space instance)
// ============================================================================

/// Result of an edge-direction separating-axis query.
#[derive(Clone, Copy, Debug)]
pub struct EdgeQuery {
    /// Maximum signed separation along any contributing edge-pair axis.
    /// Negative infinity when no edge pair passes the Gauss-map test.
    pub separation: f32,
    /// The separating (or least-penetrating) axis, oriented away from `self`
    pub axis: Vec3,
    /// Edge index on `self`
    pub edge_a: usize,
    /// Edge index on the other hull
    pub edge_b: usize,
}

/// A `HullShape` instanced at a world transform, with cached world-space data.
///
/// The cache (world vertices, world face normals, AABB) is recomputed by
/// [`Hull::update_transform`] whenever the owning body moves.
#[derive(Clone, Debug)]
pub struct Hull {
    /// The shared shape descriptor
    pub shape: Arc<HullShape>,
    /// World-space vertices (local vertices scaled by size, then transformed)
    pub world_vertices: Vec<Vec3>,
    /// World-space face normals (rotated local normals)
    pub world_normals: Vec<Vec3>,
    /// World AABB over the world vertices
    pub aabb: Aabb,
}

impl Hull {
    /// Instance a shape at a transform and per-axis size.
    pub fn new(shape: Arc<HullShape>, transform: &CFrame, size: Vec3) -> Self {
        let mut hull = Self {
            world_vertices: Vec::with_capacity(shape.vertices.len()),
            world_normals: Vec::with_capacity(shape.faces.len()),
            aabb: Aabb::new(Vec3::ZERO, Vec3::ZERO),
            shape,
        };
        hull.update_transform(transform, size);
        hull
    }

    /// Recompute the world-space cache for a new transform.
    pub fn update_transform(&mut self, transform: &CFrame, size: Vec3) {
        self.world_vertices.clear();
        self.world_vertices.extend(
            self.shape
                .vertices
                .iter()
                .map(|&v| transform.point_to_world(v.mul_elem(size))),
        );

        self.world_normals.clear();
        self.world_normals.extend(
            self.shape
                .faces
                .iter()
                .map(|f| transform.vector_to_world(f.normal)),
        );

        self.aabb = Aabb::from_points(&self.world_vertices);
    }

    /// The world vertex maximizing `dot(v, direction)`. O(V).
    pub fn support(&self, direction: Vec3) -> Vec3 {
        let mut best = self.world_vertices[0];
        let mut best_dot = best.dot(direction);
        for &v in &self.world_vertices[1..] {
            let d = v.dot(direction);
            if d > best_dot {
                best = v;
                best_dot = d;
            }
        }
        best
    }

    /// Mean of the world vertices.
    pub fn centroid(&self) -> Vec3 {
        let mut sum = Vec3::ZERO;
        for &v in &self.world_vertices {
            sum = sum + v;
        }
        sum / self.world_vertices.len() as f32
    }

    /// World-space plane of face `i` as `(normal, offset)` with
    /// `dot(normal, p) = offset` for points p on the plane.
    #[inline]
    pub fn face_plane(&self, i: usize) -> (Vec3, f32) {
        let n = self.world_normals[i];
        let first = self.shape.faces[i].indices[0] as usize;
        (n, n.dot(self.world_vertices[first]))
    }

    /// World polygon of face `i`, winding preserved.
    pub fn face_polygon(&self, i: usize) -> Vec<Vec3> {
        self.shape.faces[i]
            .indices
            .iter()
            .map(|&k| self.world_vertices[k as usize])
            .collect()
    }

    /// World endpoints of edge `i`.
    #[inline]
    pub fn query_edge(&self, i: usize) -> (Vec3, Vec3) {
        let e = self.shape.edges[i];
        (
            self.world_vertices[e.v0 as usize],
            self.world_vertices[e.v1 as usize],
        )
    }

    /// Most-separating face axis of `self` against `other`.
    ///
    /// For each face plane `(n, w)` the other hull's deepest point along `-n`
    /// gives the signed distance `dot(n, p) - w`; the face maximizing it is
    /// the best separating-axis candidate. A positive result means the hulls
    /// are disjoint along that face normal.
    pub fn query_face_directions(&self, other: &Hull) -> (usize, f32) {
        let mut best_face = 0;
        let mut best_dist = f32::NEG_INFINITY;

        for i in 0..self.shape.faces.len() {
            let (n, w) = self.face_plane(i);
            let p = other.support(-n);
            let dist = n.dot(p) - w;
            if dist > best_dist {
                best_dist = dist;
                best_face = i;
            }
        }

        (best_face, best_dist)
    }

    /// Most-separating edge-pair axis of `self` against `other`.
    ///
    /// Edge pairs are pruned with the Gauss-map adjacency test: an edge pair
    /// contributes a Minkowski-difference face only when each edge's adjacent
    /// face normals straddle the plane spanned by the other edge.
    pub fn query_edge_directions(&self, other: &Hull) -> EdgeQuery {
        let center = self.centroid();
        let mut best = EdgeQuery {
            separation: f32::NEG_INFINITY,
            axis: Vec3::ZERO,
            edge_a: 0,
            edge_b: 0,
        };

        for (ia, ea) in self.shape.edges.iter().enumerate() {
            let (p1, p2) = self.query_edge(ia);
            let dir_a = p2 - p1;
            let na0 = self.world_normals[ea.f0 as usize];
            let na1 = self.world_normals[ea.f1 as usize];
            // Arc direction on the Gauss sphere; sign is consistent with the
            // adjacency order, unlike the raw endpoint difference.
            let arc_a = na1.cross(na0);

            for (ib, eb) in other.shape.edges.iter().enumerate() {
                let (q1, q2) = other.query_edge(ib);
                let dir_b = q2 - q1;
                // Minkowski difference A - B flips B's normals.
                let nb0 = -other.world_normals[eb.f0 as usize];
                let nb1 = -other.world_normals[eb.f1 as usize];
                let arc_b = nb1.cross(nb0);

                if !is_minkowski_face(na0, na1, arc_a, nb0, nb1, arc_b) {
                    continue;
                }

                let mut axis = dir_a.cross(dir_b);
                let len_sq = axis.length_squared();
                if len_sq < PARALLEL_EPSILON {
                    continue; // Parallel edges — the face axes cover this.
                }
                axis = axis / len_sq.sqrt();

                // Orient away from self so separation is signed A -> B.
                if axis.dot(p1 - center) < 0.0 {
                    axis = -axis;
                }

                let separation = axis.dot(q1 - p1);
                if separation > best.separation {
                    best = EdgeQuery {
                        separation,
                        axis,
                        edge_a: ia,
                        edge_b: ib,
                    };
                }
            }
        }

        best
    }
}

/// Gauss-map test: do the arcs of the two edges intersect on the sphere?
///
/// `a`, `b` are the normals adjacent to edge A and `b_x_a` its direction;
/// `c`, `d`, `d_x_c` likewise for edge B (normals already negated for the
/// Minkowski difference).
#[inline]
fn is_minkowski_face(a: Vec3, b: Vec3, b_x_a: Vec3, c: Vec3, d: Vec3, d_x_c: Vec3) -> bool {
    let cba = c.dot(b_x_a);
    let dba = d.dot(b_x_a);
    let adc = a.dot(d_x_c);
    let bdc = b.dot(d_x_c);

    // Arcs AB and CD straddle each other's planes, on the same hemisphere.
    cba * dba < 0.0 && adc * bdc < 0.0 && cba * bdc > 0.0
}
