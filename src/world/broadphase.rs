//! Broadphase collision detection using AABB overlap tests.

use std::collections::BTreeSet;

use crate::shape::Aabb;

use super::components::{Collider2D, RigidBody2D, RigidBodyType, WeldJoint2D};

/// A collider child: one convex piece of a body's shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ProxyKey {
    pub entity: hecs::Entity,
    pub child: usize,
}

/// Brute-force broadphase (O(n^2) pair-wise AABB test over collider children).
#[derive(Debug, Default)]
pub struct BruteForceBroadphase;

impl BruteForceBroadphase {
    pub fn new() -> Self {
        Self
    }

    /// Find all collider child pairs whose AABBs overlap.
    ///
    /// Pairs are ordered so the smaller entity comes first. Pairs where
    /// neither body is dynamic, pairs on the same body, and pairs of bodies
    /// welded without `collide_connected` are skipped.
    pub fn find_pairs(&self, world: &hecs::World) -> Vec<(ProxyKey, ProxyKey)> {
        let mut entries: Vec<(ProxyKey, Aabb, RigidBodyType)> = Vec::new();

        for (entity, (collider, rb)) in world.query::<(&Collider2D, &RigidBody2D)>().iter() {
            let xf = rb.transform();
            for child in 0..collider.shape.child_count() {
                let aabb = collider.shape.compute_aabb(&xf, child);
                entries.push((ProxyKey { entity, child }, aabb, rb.body_type));
            }
        }
        entries.sort_by_key(|(key, _, _)| *key);

        let welded = non_colliding_welds(world);

        let mut pairs = Vec::new();
        for i in 0..entries.len() {
            for j in (i + 1)..entries.len() {
                let (key_a, aabb_a, type_a) = &entries[i];
                let (key_b, aabb_b, type_b) = &entries[j];

                if key_a.entity == key_b.entity {
                    continue;
                }
                if *type_a != RigidBodyType::Dynamic && *type_b != RigidBodyType::Dynamic {
                    continue;
                }
                if !aabb_a.overlaps(aabb_b) {
                    continue;
                }
                if welded.contains(&(key_a.entity, key_b.entity)) {
                    continue;
                }
                pairs.push((*key_a, *key_b));
            }
        }

        pairs
    }
}

fn non_colliding_welds(world: &hecs::World) -> BTreeSet<(hecs::Entity, hecs::Entity)> {
    world
        .query::<&WeldJoint2D>()
        .iter()
        .filter(|(_, weld)| !weld.joint.collide_connected())
        .map(|(_, weld)| {
            if weld.body_a < weld.body_b {
                (weld.body_a, weld.body_b)
            } else {
                (weld.body_b, weld.body_a)
            }
        })
        .collect()
}
