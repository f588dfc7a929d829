//! Consistent hash ring.
//!
//! Each member contributes `virtual_nodes` points, hashed from
//! `"{id}-{i}"`. A key is owned by the first point at or after its own hash,
//! wrapping past the end. Removing a member only moves the keys that member
//! owned.

use xxhash_rust::xxh3::xxh3_64;

/// Points per member when not configured otherwise
pub const DEFAULT_VIRTUAL_NODES: usize = 160;

/// Anything that can be placed on a ring
pub trait RingMember {
    /// Stable identity; equal ids land on equal points
    fn ring_id(&self) -> &str;
}

impl RingMember for String {
    fn ring_id(&self) -> &str {
        self
    }
}

impl RingMember for &str {
    fn ring_id(&self) -> &str {
        self
    }
}

/// An immutable ring over a fixed set of members
#[derive(Debug, Clone)]
pub struct HashRing<T> {
    /// Sorted by hash; the second element indexes `members`
    points: Vec<(u64, usize)>,
    members: Vec<T>,
}

impl<T: RingMember> HashRing<T> {
    /// Build a ring with `virtual_nodes` points per member
    pub fn build(members: Vec<T>, virtual_nodes: usize) -> Self {
        let mut points = Vec::with_capacity(members.len() * virtual_nodes);
        for (index, member) in members.iter().enumerate() {
            let id = member.ring_id();
            for i in 0..virtual_nodes {
                points.push((point_hash(&format!("{id}-{i}")), index));
            }
        }
        // Ties are broken by member order so that identical inputs build
        // identical rings.
        points.sort_unstable();
        Self { points, members }
    }

    /// The member owning `key`, or `None` when the ring is empty
    pub fn route(&self, key: &str) -> Option<&T> {
        if self.points.is_empty() {
            return None;
        }
        let hash = point_hash(key);
        let slot = self.points.partition_point(|(point, _)| *point < hash);
        let (_, index) = self.points[slot % self.points.len()];
        self.members.get(index)
    }

    pub fn members(&self) -> &[T] {
        &self.members
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl<T> Default for HashRing<T> {
    fn default() -> Self {
        Self {
            points: Vec::new(),
            members: Vec::new(),
        }
    }
}

fn point_hash(text: &str) -> u64 {
    xxh3_64(text.as_bytes())
}
