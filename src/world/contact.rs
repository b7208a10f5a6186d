//! Contact persistence between steps.

use std::collections::BTreeMap;

use tracing::trace;

use crate::collision::{collide, test_overlap, Manifold};

use super::broadphase::ProxyKey;
use super::components::{Collider2D, RigidBody2D};

/// Touch state change reported by [`ContactCache::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContactEvent {
    Begin(ProxyKey, ProxyKey),
    End(ProxyKey, ProxyKey),
}

/// A broadphase pair and its latest manifold.
#[derive(Debug, Clone)]
pub struct Contact {
    pub key_a: ProxyKey,
    pub key_b: ProxyKey,
    /// Accumulated impulses are carried over from the previous step by
    /// matching contact ids.
    pub manifold: Manifold,
    /// Mixed friction of both colliders.
    pub friction: f32,
    /// Mixed restitution of both colliders.
    pub restitution: f32,
    pub radius_a: f32,
    pub radius_b: f32,
    /// Either collider is a sensor. Sensor contacts carry no manifold points.
    pub is_sensor: bool,
    touching: bool,
}

impl Contact {
    pub fn is_touching(&self) -> bool {
        self.touching
    }
}

/// Friction mixing law: geometric mean, so a frictionless surface stays
/// frictionless.
pub fn mix_friction(a: f32, b: f32) -> f32 {
    (a * b).sqrt()
}

/// Restitution mixing law: the bouncier collider wins.
pub fn mix_restitution(a: f32, b: f32) -> f32 {
    a.max(b)
}

/// Contacts keyed by collider child pair. Iteration order is stable.
#[derive(Debug, Default)]
pub struct ContactCache {
    contacts: BTreeMap<(ProxyKey, ProxyKey), Contact>,
    events: Vec<ContactEvent>,
}

impl ContactCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuild contacts from this step's broadphase pairs.
    ///
    /// Pairs that persist keep their impulses point by point where the
    /// contact ids still match. Pairs that vanished are dropped.
    pub fn update(&mut self, world: &hecs::World, pairs: &[(ProxyKey, ProxyKey)]) {
        let mut old = std::mem::take(&mut self.contacts);
        self.events.clear();

        for &(key_a, key_b) in pairs {
            let Some(mut contact) = evaluate(world, key_a, key_b) else {
                continue;
            };

            let previous = old.remove(&(key_a, key_b));
            let was_touching = previous.as_ref().is_some_and(|c| c.touching);
            if let Some(previous) = previous {
                carry_impulses(&previous.manifold, &mut contact.manifold);
            }

            match (was_touching, contact.touching) {
                (false, true) => self.events.push(ContactEvent::Begin(key_a, key_b)),
                (true, false) => self.events.push(ContactEvent::End(key_a, key_b)),
                _ => {}
            }
            self.contacts.insert((key_a, key_b), contact);
        }

        for ((key_a, key_b), contact) in old {
            if contact.touching {
                self.events.push(ContactEvent::End(key_a, key_b));
            }
        }

        trace!(
            contacts = self.contacts.len(),
            events = self.events.len(),
            "contacts updated"
        );
    }

    /// Drop every contact involving `entity`.
    pub fn remove_entity(&mut self, entity: hecs::Entity) {
        self.contacts
            .retain(|(a, b), _| a.entity != entity && b.entity != entity);
    }

    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Contact> {
        self.contacts.values()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut Contact> {
        self.contacts.values_mut()
    }

    pub fn get(&self, key_a: ProxyKey, key_b: ProxyKey) -> Option<&Contact> {
        self.contacts.get(&(key_a, key_b))
    }

    /// Begin/end events from the last update.
    pub fn events(&self) -> &[ContactEvent] {
        &self.events
    }
}

fn evaluate(world: &hecs::World, key_a: ProxyKey, key_b: ProxyKey) -> Option<Contact> {
    let collider_a = world.get::<&Collider2D>(key_a.entity).ok()?;
    let collider_b = world.get::<&Collider2D>(key_b.entity).ok()?;
    let xf_a = world.get::<&RigidBody2D>(key_a.entity).ok()?.transform();
    let xf_b = world.get::<&RigidBody2D>(key_b.entity).ok()?.transform();

    let is_sensor = collider_a.is_sensor || collider_b.is_sensor;
    let (manifold, touching) = if is_sensor {
        let overlap = test_overlap(
            &collider_a.shape,
            key_a.child,
            &collider_b.shape,
            key_b.child,
            &xf_a,
            &xf_b,
        );
        (Manifold::default(), overlap)
    } else {
        let manifold = collide(
            &collider_a.shape,
            key_a.child,
            &xf_a,
            &collider_b.shape,
            key_b.child,
            &xf_b,
        );
        let touching = manifold.point_count > 0;
        (manifold, touching)
    };

    Some(Contact {
        key_a,
        key_b,
        manifold,
        friction: mix_friction(collider_a.friction, collider_b.friction),
        restitution: mix_restitution(collider_a.restitution, collider_b.restitution),
        radius_a: collider_a.shape.radius(),
        radius_b: collider_b.shape.radius(),
        is_sensor,
        touching,
    })
}

fn carry_impulses(old: &Manifold, new: &mut Manifold) {
    for np in new.points_mut() {
        let key = np.id.key();
        if let Some(op) = old.points().iter().find(|op| op.id.key() == key) {
            np.normal_impulse = op.normal_impulse;
            np.tangent_impulse = op.tangent_impulse;
        }
    }
}
