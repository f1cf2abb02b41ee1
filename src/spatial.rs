use std::collections::HashMap;

/// Uniform grid hash over particle centres for neighbour lookup.
///
/// Space is divided into square tiles whose side equals the interaction
/// cutoff, so any pair within the cutoff is covered by the 3x3 block around
/// either particle's tile. Keys pack the tile coordinates into one i64, which
/// leaves the domain unbounded (particles may drift outside the informational
/// simulation domain).
pub struct SpatialHash {
    cell: f64,
    bins: HashMap<i64, Vec<u32>>,
}

impl SpatialHash {
    /// `cell_size` must be at least the interaction cutoff.
    pub fn new(cell_size: f64) -> Self {
        assert!(cell_size > 0.0, "cell size must be positive");
        SpatialHash {
            cell: cell_size,
            bins: HashMap::with_capacity(1024),
        }
    }

    /// Clears and refills all bins from the position arrays. O(N); call once
    /// per tick after membership changes.
    pub fn rebuild(&mut self, xs: &[f64], ys: &[f64]) {
        self.bins.clear();
        for i in 0..xs.len() {
            let key = key_from_tiles(self.tile(xs[i]), self.tile(ys[i]));
            self.bins
                .entry(key)
                .or_insert_with(|| Vec::with_capacity(8))
                .push(i as u32);
        }
    }

    /// Enumerates every index in the 3x3 tile block around particle `i`.
    /// The particle itself may be visited; callers filter `j == i`.
    pub fn for_each_neighbor(
        &self,
        i: usize,
        xs: &[f64],
        ys: &[f64],
        mut action: impl FnMut(usize),
    ) {
        let tx = self.tile(xs[i]);
        let ty = self.tile(ys[i]);
        for dy in -1..=1 {
            for dx in -1..=1 {
                if let Some(bin) = self.bins.get(&key_from_tiles(tx + dx, ty + dy)) {
                    for &j in bin {
                        action(j as usize);
                    }
                }
            }
        }
    }

    /// Enumerates every index in the tile block covering the disk of `radius`
    /// around `(x, y)`. Visited indices are candidates only; callers apply
    /// their own distance filter.
    pub fn for_each_index_near(
        &self,
        x: f64,
        y: f64,
        radius: f64,
        mut action: impl FnMut(usize),
    ) {
        let tx = self.tile(x);
        let ty = self.tile(y);
        let r_tiles = (radius / self.cell).ceil() as i64;
        for dy in -r_tiles..=r_tiles {
            for dx in -r_tiles..=r_tiles {
                if let Some(bin) = self.bins.get(&key_from_tiles(tx + dx, ty + dy)) {
                    for &j in bin {
                        action(j as usize);
                    }
                }
            }
        }
    }

    fn tile(&self, v: f64) -> i64 {
        (v / self.cell).floor() as i64
    }
}

fn key_from_tiles(tx: i64, ty: i64) -> i64 {
    (tx << 32) | (ty & 0xffff_ffff)
}
