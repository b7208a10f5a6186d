//! Sequential impulse solver for contact manifolds.
//!
//! Each manifold becomes one constraint row stored in a block from the
//! step's [`BlockAllocator`]. Blocks are returned when the solver drops.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use tracing::{error, trace};

use super::constraint::Constraint;
use super::time_step::{SolverData, TimeStep};
use crate::block_allocator::{Block, BlockAllocator};
use crate::collision::{Manifold, ManifoldType, WorldManifold};
use crate::error::Result;
use crate::math::{cross, cross_sv, cross_vs, Rot, Transform};
use crate::settings::{
    BAUMGARTE, LINEAR_SLOP, MAX_LINEAR_CORRECTION, MAX_MANIFOLD_POINTS, VELOCITY_THRESHOLD,
};

/// One manifold handed to the solver.
#[derive(Debug, Clone, Copy)]
pub struct ContactSolverInput<'m> {
    pub manifold: &'m Manifold,
    /// Island index of body A.
    pub index_a: usize,
    /// Island index of body B.
    pub index_b: usize,
    pub radius_a: f32,
    pub radius_b: f32,
    pub friction: f32,
    pub restitution: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ContactPointConstraint {
    local_point: Vec2,
    r_a: Vec2,
    r_b: Vec2,
    normal_impulse: f32,
    tangent_impulse: f32,
    normal_mass: f32,
    tangent_mass: f32,
    velocity_bias: f32,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Pod, Zeroable)]
struct ContactConstraint {
    points: [ContactPointConstraint; MAX_MANIFOLD_POINTS],
    normal: Vec2,
    local_normal: Vec2,
    local_point: Vec2,
    local_center_a: Vec2,
    local_center_b: Vec2,
    index_a: u32,
    index_b: u32,
    inv_mass_a: f32,
    inv_mass_b: f32,
    inv_i_a: f32,
    inv_i_b: f32,
    friction: f32,
    restitution: f32,
    radius_a: f32,
    radius_b: f32,
    kind: u32,
    point_count: u32,
}

impl ContactConstraint {
    fn points(&self) -> &[ContactPointConstraint] {
        &self.points[..self.point_count as usize]
    }

    fn points_mut(&mut self) -> &mut [ContactPointConstraint] {
        &mut self.points[..self.point_count as usize]
    }

    fn indices(&self) -> (usize, usize) {
        (self.index_a as usize, self.index_b as usize)
    }
}

/// Body transform with its center of mass at `c`.
fn body_transform(c: Vec2, a: f32, local_center: Vec2) -> Transform {
    let q = Rot::new(a);
    Transform {
        p: c - q.apply(local_center),
        q,
    }
}

/// Contact solver for one step.
pub struct ContactSolver<'a> {
    allocator: &'a mut BlockAllocator,
    step: TimeStep,
    blocks: Vec<Block>,
}

impl<'a> ContactSolver<'a> {
    /// Copy manifolds into allocator-backed constraint rows. Carried impulses
    /// are scaled by the step ratio when warm starting.
    pub fn new(
        allocator: &'a mut BlockAllocator,
        step: TimeStep,
        inputs: &[ContactSolverInput<'_>],
    ) -> Result<Self> {
        let mut solver = Self {
            allocator,
            step,
            blocks: Vec::with_capacity(inputs.len()),
        };

        for input in inputs {
            let manifold = input.manifold;
            debug_assert!(manifold.point_count > 0);

            let mut constraint = ContactConstraint::zeroed();
            constraint.index_a = input.index_a as u32;
            constraint.index_b = input.index_b as u32;
            constraint.friction = input.friction;
            constraint.restitution = input.restitution;
            constraint.radius_a = input.radius_a;
            constraint.radius_b = input.radius_b;
            constraint.local_normal = manifold.local_normal;
            constraint.local_point = manifold.local_point;
            constraint.kind = manifold.kind as u32;
            constraint.point_count = manifold.point_count as u32;

            for (cp, mp) in constraint.points.iter_mut().zip(manifold.points()) {
                cp.local_point = mp.local_point;
                if step.warm_starting {
                    cp.normal_impulse = step.dt_ratio * mp.normal_impulse;
                    cp.tangent_impulse = step.dt_ratio * mp.tangent_impulse;
                }
            }

            let block = solver.allocator.alloc_pod(constraint)?;
            solver.blocks.push(block);
        }

        trace!(contacts = solver.blocks.len(), "contact solver ready");
        Ok(solver)
    }

    /// Number of contact constraints.
    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Write accumulated impulses back to the manifolds, in input order, for
    /// warm starting the next step.
    pub fn store_impulses(&self, manifolds: &mut [Manifold]) {
        for (block, manifold) in self.blocks.iter().zip(manifolds.iter_mut()) {
            let Some(c) = load(self.allocator, block) else {
                continue;
            };
            for (mp, cp) in manifold.points_mut().iter_mut().zip(c.points()) {
                mp.normal_impulse = cp.normal_impulse;
                mp.tangent_impulse = cp.tangent_impulse;
            }
        }
    }

    /// Accumulated normal impulses of constraint `index`.
    pub fn normal_impulses(&self, index: usize) -> Option<[f32; MAX_MANIFOLD_POINTS]> {
        let c = load(self.allocator, self.blocks.get(index)?)?;
        let mut out = [0.0; MAX_MANIFOLD_POINTS];
        for (o, p) in out.iter_mut().zip(c.points()) {
            *o = p.normal_impulse;
        }
        Some(out)
    }

    pub fn step(&self) -> &TimeStep {
        &self.step
    }
}

fn load(allocator: &BlockAllocator, block: &Block) -> Option<ContactConstraint> {
    match allocator.pod::<ContactConstraint>(block) {
        Ok(c) => Some(*c),
        Err(err) => {
            error!(%err, "contact constraint block unreadable");
            None
        }
    }
}

fn load_mut<'b>(allocator: &'b mut BlockAllocator, block: &Block) -> Option<&'b mut ContactConstraint> {
    match allocator.pod_mut::<ContactConstraint>(block) {
        Ok(c) => Some(c),
        Err(err) => {
            error!(%err, "contact constraint block unreadable");
            None
        }
    }
}

impl Constraint for ContactSolver<'_> {
    fn init_velocity_constraints(&mut self, data: &mut SolverData<'_>) {
        for block in &self.blocks {
            let Some(vc) = load_mut(self.allocator, block) else {
                continue;
            };
            let (index_a, index_b) = vc.indices();
            let body_a = data.bodies[index_a];
            let body_b = data.bodies[index_b];

            vc.inv_mass_a = body_a.inv_mass;
            vc.inv_mass_b = body_b.inv_mass;
            vc.inv_i_a = body_a.inv_inertia;
            vc.inv_i_b = body_b.inv_inertia;
            vc.local_center_a = body_a.local_center;
            vc.local_center_b = body_b.local_center;

            let pos_a = data.positions[index_a];
            let pos_b = data.positions[index_b];
            let mut vel_a = data.velocities[index_a];
            let mut vel_b = data.velocities[index_b];

            let xf_a = body_transform(pos_a.c, pos_a.a, vc.local_center_a);
            let xf_b = body_transform(pos_b.c, pos_b.a, vc.local_center_b);

            let mut manifold = Manifold {
                kind: ManifoldType::from_raw(vc.kind),
                local_normal: vc.local_normal,
                local_point: vc.local_point,
                point_count: vc.point_count as usize,
                ..Manifold::default()
            };
            for (mp, cp) in manifold.points.iter_mut().zip(vc.points()) {
                mp.local_point = cp.local_point;
            }
            let world = WorldManifold::new(&manifold, &xf_a, vc.radius_a, &xf_b, vc.radius_b);

            vc.normal = world.normal;
            let normal = vc.normal;
            let tangent = cross_vs(normal, 1.0);
            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);
            let restitution = vc.restitution;

            for (cp, point) in vc.points_mut().iter_mut().zip(world.points) {
                cp.r_a = point - pos_a.c;
                cp.r_b = point - pos_b.c;

                let rn_a = cross(cp.r_a, normal);
                let rn_b = cross(cp.r_b, normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                cp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = cross(cp.r_a, tangent);
                let rt_b = cross(cp.r_b, tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                cp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Restitution target, only for real impacts.
                cp.velocity_bias = 0.0;
                let v_rel = normal.dot(
                    vel_b.v + cross_sv(vel_b.w, cp.r_b) - vel_a.v - cross_sv(vel_a.w, cp.r_a),
                );
                if v_rel < -VELOCITY_THRESHOLD {
                    cp.velocity_bias = -restitution * v_rel;
                }
            }

            // Warm start.
            for cp in vc.points() {
                let p = cp.normal_impulse * normal + cp.tangent_impulse * tangent;
                vel_a.w -= i_a * cross(cp.r_a, p);
                vel_a.v -= m_a * p;
                vel_b.w += i_b * cross(cp.r_b, p);
                vel_b.v += m_b * p;
            }

            data.velocities[index_a] = vel_a;
            data.velocities[index_b] = vel_b;
        }
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData<'_>) {
        for block in &self.blocks {
            let Some(vc) = load_mut(self.allocator, block) else {
                continue;
            };
            let (index_a, index_b) = vc.indices();
            let mut vel_a = data.velocities[index_a];
            let mut vel_b = data.velocities[index_b];

            let (m_a, m_b, i_a, i_b) = (vc.inv_mass_a, vc.inv_mass_b, vc.inv_i_a, vc.inv_i_b);
            let normal = vc.normal;
            let tangent = cross_vs(normal, 1.0);
            let friction = vc.friction;

            // Friction first; non-penetration matters more, so it goes last.
            for cp in vc.points_mut() {
                let dv = vel_b.v + cross_sv(vel_b.w, cp.r_b) - vel_a.v - cross_sv(vel_a.w, cp.r_a);
                let vt = dv.dot(tangent);
                let lambda = -cp.tangent_mass * vt;

                let max_friction = friction * cp.normal_impulse;
                let new_impulse = (cp.tangent_impulse + lambda).clamp(-max_friction, max_friction);
                let lambda = new_impulse - cp.tangent_impulse;
                cp.tangent_impulse = new_impulse;

                let p = lambda * tangent;
                vel_a.v -= m_a * p;
                vel_a.w -= i_a * cross(cp.r_a, p);
                vel_b.v += m_b * p;
                vel_b.w += i_b * cross(cp.r_b, p);
            }

            for cp in vc.points_mut() {
                let dv = vel_b.v + cross_sv(vel_b.w, cp.r_b) - vel_a.v - cross_sv(vel_a.w, cp.r_a);
                let vn = dv.dot(normal);
                let lambda = -cp.normal_mass * (vn - cp.velocity_bias);

                // Accumulated impulse must stay non-negative.
                let new_impulse = (cp.normal_impulse + lambda).max(0.0);
                let lambda = new_impulse - cp.normal_impulse;
                cp.normal_impulse = new_impulse;

                let p = lambda * normal;
                vel_a.v -= m_a * p;
                vel_a.w -= i_a * cross(cp.r_a, p);
                vel_b.v += m_b * p;
                vel_b.w += i_b * cross(cp.r_b, p);
            }

            data.velocities[index_a] = vel_a;
            data.velocities[index_b] = vel_b;
        }
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData<'_>) -> bool {
        let mut min_separation = 0.0f32;

        for block in &self.blocks {
            let Some(pc) = load(self.allocator, block) else {
                continue;
            };
            let (index_a, index_b) = pc.indices();
            let (m_a, m_b, i_a, i_b) = (pc.inv_mass_a, pc.inv_mass_b, pc.inv_i_a, pc.inv_i_b);

            let mut c_a = data.positions[index_a].c;
            let mut a_a = data.positions[index_a].a;
            let mut c_b = data.positions[index_b].c;
            let mut a_b = data.positions[index_b].a;

            for cp in pc.points() {
                let xf_a = body_transform(c_a, a_a, pc.local_center_a);
                let xf_b = body_transform(c_b, a_b, pc.local_center_b);
                let (normal, point, separation) = position_manifold(&pc, cp, &xf_a, &xf_b);

                let r_a = point - c_a;
                let r_b = point - c_b;
                min_separation = min_separation.min(separation);

                // Leave a little slop to avoid jitter; cap the correction.
                let c = (BAUMGARTE * (separation + LINEAR_SLOP)).clamp(-MAX_LINEAR_CORRECTION, 0.0);

                let rn_a = cross(r_a, normal);
                let rn_b = cross(r_b, normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                let impulse = if k > 0.0 { -c / k } else { 0.0 };

                let p = impulse * normal;
                c_a -= m_a * p;
                a_a -= i_a * cross(r_a, p);
                c_b += m_b * p;
                a_b += i_b * cross(r_b, p);
            }

            data.positions[index_a].c = c_a;
            data.positions[index_a].a = a_a;
            data.positions[index_b].c = c_b;
            data.positions[index_b].a = a_b;
        }

        // Positions are not pushed past -LINEAR_SLOP, so allow some margin.
        min_separation >= -3.0 * LINEAR_SLOP
    }
}

/// Normal, contact point and separation of one point at the current pose.
fn position_manifold(
    pc: &ContactConstraint,
    cp: &ContactPointConstraint,
    xf_a: &Transform,
    xf_b: &Transform,
) -> (Vec2, Vec2, f32) {
    let radii = pc.radius_a + pc.radius_b;
    match ManifoldType::from_raw(pc.kind) {
        ManifoldType::Circles => {
            let point_a = xf_a.apply(pc.local_point);
            let point_b = xf_b.apply(cp.local_point);
            let normal = (point_b - point_a).normalize_or_zero();
            let point = 0.5 * (point_a + point_b);
            let separation = (point_b - point_a).dot(normal) - radii;
            (normal, point, separation)
        }
        ManifoldType::FaceA => {
            let normal = xf_a.q.apply(pc.local_normal);
            let plane_point = xf_a.apply(pc.local_point);
            let clip_point = xf_b.apply(cp.local_point);
            let separation = (clip_point - plane_point).dot(normal) - radii;
            (normal, clip_point, separation)
        }
        ManifoldType::FaceB => {
            let normal = xf_b.q.apply(pc.local_normal);
            let plane_point = xf_b.apply(pc.local_point);
            let clip_point = xf_a.apply(cp.local_point);
            let separation = (clip_point - plane_point).dot(normal) - radii;
            // Keep the A to B convention.
            (-normal, clip_point, separation)
        }
    }
}

impl Drop for ContactSolver<'_> {
    fn drop(&mut self) {
        for block in self.blocks.drain(..) {
            if let Err(err) = self.allocator.free_pod::<ContactConstraint>(block) {
                error!(%err, "failed to return contact constraint block");
            }
        }
    }
}
