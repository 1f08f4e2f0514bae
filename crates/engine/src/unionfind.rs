//! Union-find over record indices, used to close match edges transitively.

/// Disjoint-set forest with path halving and union by size.
#[derive(Debug)]
pub struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    pub fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }

    /// Smallest member index of each element's component. Using the minimum
    /// keeps representatives independent of union order.
    pub fn representatives(&mut self) -> Vec<usize> {
        let n = self.parent.len();
        let mut min_of_root = vec![usize::MAX; n];
        for i in 0..n {
            let root = self.find(i);
            if i < min_of_root[root] {
                min_of_root[root] = i;
            }
        }
        (0..n).map(|i| {
            let root = self.find(i);
            min_of_root[root]
        }).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn singletons_by_default() {
        let mut uf = UnionFind::new(3);
        assert_eq!(uf.representatives(), vec![0, 1, 2]);
    }

    #[test]
    fn transitive_closure() {
        let mut uf = UnionFind::new(5);
        uf.union(0, 1);
        uf.union(1, 4);
        uf.union(2, 3);
        let reps = uf.representatives();
        assert_eq!(reps[0], reps[1]);
        assert_eq!(reps[1], reps[4]);
        assert_eq!(reps[2], reps[3]);
        assert_ne!(reps[0], reps[2]);
    }

    #[test]
    fn representative_is_minimum_regardless_of_union_order() {
        let mut forward = UnionFind::new(4);
        forward.union(0, 3);
        forward.union(3, 2);

        let mut backward = UnionFind::new(4);
        backward.union(2, 3);
        backward.union(3, 0);

        assert_eq!(forward.representatives(), backward.representatives());
        assert_eq!(forward.representatives()[3], 0);
    }
}
