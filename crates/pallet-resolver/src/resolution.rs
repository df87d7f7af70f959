use std::collections::BTreeMap;
use std::ops::Bound;

use crate::constraint::Constraints;
use crate::decision::Decision;
use crate::resolvent::Resolvent;

/// Everything known about one resolvent.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolution {
    pub resolvent: Resolvent,
    pub constraints: Constraints,
    pub decision: Option<Decision>,
}

impl Resolution {
    pub fn new(resolvent: Resolvent, constraints: Constraints) -> Self {
        Self {
            resolvent,
            constraints,
            decision: None,
        }
    }
}

/// Resolutions in creation order, indexed by resolvent.
#[derive(Debug, Clone, Default)]
pub struct Resolutions {
    arena: Vec<Resolution>,
    index: BTreeMap<Resolvent, usize>,
}

impl Resolutions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a resolution; a resolution for the same resolvent is replaced.
    pub fn insert(&mut self, resolution: Resolution) -> usize {
        if let Some(&idx) = self.index.get(&resolution.resolvent) {
            self.arena[idx] = resolution;
            return idx;
        }
        let idx = self.arena.len();
        self.index.insert(resolution.resolvent.clone(), idx);
        self.arena.push(resolution);
        idx
    }

    pub fn index_of(&self, resolvent: &Resolvent) -> Option<usize> {
        self.index.get(resolvent).copied()
    }

    pub fn get(&self, resolvent: &Resolvent) -> Option<&Resolution> {
        self.index_of(resolvent).map(|i| &self.arena[i])
    }

    pub fn get_mut(&mut self, resolvent: &Resolvent) -> Option<&mut Resolution> {
        self.index_of(resolvent).map(move |i| &mut self.arena[i])
    }

    pub fn at(&self, idx: usize) -> &Resolution {
        &self.arena[idx]
    }

    pub fn at_mut(&mut self, idx: usize) -> &mut Resolution {
        &mut self.arena[idx]
    }

    pub fn contains(&self, resolvent: &Resolvent) -> bool {
        self.index.contains_key(resolvent)
    }

    /// The first resolvent in key order strictly after `after`, or the first
    /// of all. Keys inserted while walking are seen by later calls.
    pub fn next_key_after(&self, after: Option<&Resolvent>) -> Option<Resolvent> {
        let lower = match after {
            Some(r) => Bound::Excluded(r),
            None => Bound::Unbounded,
        };
        self.index
            .range::<Resolvent, _>((lower, Bound::Unbounded))
            .next()
            .map(|(r, _)| r.clone())
    }

    /// Resolutions in creation order.
    pub fn iter(&self) -> std::slice::Iter<'_, Resolution> {
        self.arena.iter()
    }

    /// Resolutions in resolvent order.
    pub fn iter_by_resolvent(&self) -> impl Iterator<Item = &Resolution> {
        self.index.values().map(|&i| &self.arena[i])
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }
}

impl<'a> IntoIterator for &'a Resolutions {
    type Item = &'a Resolution;
    type IntoIter = std::slice::Iter<'a, Resolution>;

    fn into_iter(self) -> Self::IntoIter {
        self.arena.iter()
    }
}

impl FromIterator<Resolution> for Resolutions {
    fn from_iter<I: IntoIterator<Item = Resolution>>(iter: I) -> Self {
        let mut out = Resolutions::new();
        for r in iter {
            out.insert(r);
        }
        out
    }
}
