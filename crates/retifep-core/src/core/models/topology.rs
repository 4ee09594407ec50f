use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bond {
    pub atom1: usize,
    pub atom2: usize,
    pub force_constant: f64, // kcal/(mol·Å²)
    pub length: f64,         // Å
}

impl Bond {
    pub fn new(atom1: usize, atom2: usize, force_constant: f64, length: f64) -> Self {
        Self {
            atom1,
            atom2,
            force_constant,
            length,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Angle {
    pub atom1: usize,
    pub atom2: usize, // apex
    pub atom3: usize,
    pub force_constant: f64, // kcal/(mol·rad²)
    pub angle: f64,          // equilibrium angle in degrees
}

impl Angle {
    pub fn new(atom1: usize, atom2: usize, atom3: usize, force_constant: f64, angle: f64) -> Self {
        Self {
            atom1,
            atom2,
            atom3,
            force_constant,
            angle,
        }
    }

    pub fn matches(&self, a: usize, apex: usize, c: usize) -> bool {
        self.atom2 == apex
            && ((self.atom1 == a && self.atom3 == c) || (self.atom1 == c && self.atom3 == a))
    }
}

/// How a pair of atoms in the same molecule is treated by the non-bonded terms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PairRelation {
    /// 1-2 and 1-3 pairs: no non-bonded interaction.
    Excluded,
    /// 1-4 pairs: interaction scaled by the 1-4 factors.
    OneFour,
    /// Everything further apart, or in a different bonded fragment.
    Normal,
}

/// Bond graph of a single molecule with precomputed short-range separations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Connectivity {
    adjacency: Vec<Vec<usize>>,
    // separations[i] holds (j, d) for every j > i within three bonds
    separations: Vec<Vec<(usize, u8)>>,
}

impl Connectivity {
    pub fn new(atom_count: usize, bonds: &[Bond]) -> Self {
        let mut adjacency = vec![Vec::new(); atom_count];
        for bond in bonds {
            if bond.atom1 >= atom_count || bond.atom2 >= atom_count || bond.atom1 == bond.atom2 {
                continue;
            }
            if !adjacency[bond.atom1].contains(&bond.atom2) {
                adjacency[bond.atom1].push(bond.atom2);
                adjacency[bond.atom2].push(bond.atom1);
            }
        }

        let mut separations = vec![Vec::new(); atom_count];
        for start in 0..atom_count {
            let mut depth = vec![u8::MAX; atom_count];
            depth[start] = 0;
            let mut queue = VecDeque::from([start]);
            while let Some(current) = queue.pop_front() {
                if depth[current] >= 3 {
                    continue;
                }
                for &next in &adjacency[current] {
                    if depth[next] == u8::MAX {
                        depth[next] = depth[current] + 1;
                        queue.push_back(next);
                    }
                }
            }
            for (other, &d) in depth.iter().enumerate() {
                if other > start && d != u8::MAX {
                    separations[start].push((other, d));
                }
            }
        }

        Self {
            adjacency,
            separations,
        }
    }

    pub fn atom_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn neighbors(&self, atom: usize) -> &[usize] {
        self.adjacency.get(atom).map_or(&[], |v| v.as_slice())
    }

    pub fn separation(&self, a: usize, b: usize) -> Option<u8> {
        if a == b {
            return Some(0);
        }
        let (lo, hi) = if a < b { (a, b) } else { (b, a) };
        self.separations
            .get(lo)?
            .iter()
            .find(|(other, _)| *other == hi)
            .map(|&(_, d)| d)
    }

    pub fn pair_relation(&self, a: usize, b: usize) -> PairRelation {
        match self.separation(a, b) {
            Some(0..=2) => PairRelation::Excluded,
            Some(3) => PairRelation::OneFour,
            _ => PairRelation::Normal,
        }
    }

    /// Collects every atom reachable from `start` without stepping onto `barrier`.
    ///
    /// The result always contains `start`. If it also contains the other end of the
    /// bond being manipulated, the two atoms share a ring.
    pub fn fragment(&self, start: usize, barrier: usize) -> Vec<usize> {
        let mut visited = vec![false; self.adjacency.len()];
        let mut fragment = Vec::new();
        let mut queue = VecDeque::new();

        if start >= visited.len() {
            return fragment;
        }
        visited[start] = true;
        if barrier < visited.len() {
            visited[barrier] = true;
        }
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            fragment.push(current);
            for &next in &self.adjacency[current] {
                if !visited[next] {
                    visited[next] = true;
                    queue.push_back(next);
                }
            }
        }
        fragment
    }

    /// Returns `true` if the bond `a`–`b` is part of a ring.
    pub fn in_ring(&self, a: usize, b: usize) -> bool {
        self.adjacency.get(b).is_some_and(|n| n.contains(&a)) && {
            let mut visited = vec![false; self.adjacency.len()];
            let mut queue = VecDeque::new();
            visited[b] = true;
            queue.push_back(b);
            let mut found = false;
            while let Some(current) = queue.pop_front() {
                for &next in &self.adjacency[current] {
                    if current == b && next == a {
                        continue;
                    }
                    if next == a {
                        found = true;
                        break;
                    }
                    if !visited[next] {
                        visited[next] = true;
                        queue.push_back(next);
                    }
                }
                if found {
                    break;
                }
            }
            found
        }
    }
}
