//! Nutrient concentration field: explicit finite-difference diffusion with
//! Monod-limited consumption proportional to the local cell area, no-flux
//! boundaries and ping-pong buffering.
//!
//! Stability guidance for the explicit scheme: `dt <= 0.25 * min(dx, dy)^2 / D`
//! (documented, not enforced; the config loader warns when violated).

use biofilm_common::SimParams;
use rayon::prelude::*;

use crate::particle::Particle;

pub struct NutrientField {
    width: usize,
    height: usize,
    dx: f64,
    dy: f64,
    min_x: f64,
    min_y: f64,
    diffusion: f64,
    consumption: f64,
    /// Current concentration, row-major `[j * width + i]`.
    conc: Vec<f64>,
    /// Ping-pong destination buffer, swapped after every update.
    back: Vec<f64>,
    /// Per-node accumulated cell area, rebuilt every update.
    area: Vec<f64>,
}

impl NutrientField {
    pub fn new(params: &SimParams) -> Self {
        let width = params.grid_width;
        let height = params.grid_height;
        let nodes = width * height;
        NutrientField {
            width,
            height,
            dx: params.grid_cell_size,
            dy: params.grid_cell_size,
            min_x: 0.0,
            min_y: 0.0,
            diffusion: params.diffusion_rate,
            consumption: params.nutrient_consumption_rate,
            conc: vec![params.nutrient_concentration; nodes],
            back: vec![0.0; nodes],
            area: vec![0.0; nodes],
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    pub fn concentration_at(&self, i: usize, j: usize) -> f64 {
        self.conc[j * self.width + i]
    }

    pub fn set_concentration(&mut self, i: usize, j: usize, value: f64) {
        self.conc[j * self.width + i] = value;
    }

    /// Monod factor `C / (1 + C)` at the grid node nearest `(x, y)`;
    /// 0 outside the grid.
    pub fn monod_at(&self, x: f64, y: f64) -> f64 {
        match self.node_at(x, y) {
            Some((i, j)) => {
                let c = self.concentration_at(i, j);
                c / (1.0 + c)
            }
            None => 0.0,
        }
    }

    /// Maps a world position to its nearest grid node, or None when outside
    /// the grid.
    fn node_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        let i = ((x - self.min_x) / self.dx).round() as i64;
        let j = ((y - self.min_y) / self.dy).round() as i64;
        if i < 0 || j < 0 || i >= self.width as i64 || j >= self.height as i64 {
            return None;
        }
        Some((i as usize, j as usize))
    }

    /// Zeroes the area grid and adds each cell's area at its nearest node;
    /// cells outside the grid are skipped.
    fn accumulate_areas(&mut self, particles: &[Particle]) {
        self.area.fill(0.0);
        for p in particles {
            if !p.is_cell() {
                continue;
            }
            if let Some((i, j)) = self.node_at(p.position.x, p.position.y) {
                let node = j * self.width + i;
                self.area[node] += p.area();
            }
        }
    }

    /// One explicit FD step:
    /// `C' = C + dt * (D * lap(C) - R * A * C / (1 + C))`, clamped to >= 0 in
    /// the interior, followed by the no-flux boundary copy and the buffer
    /// swap. Interior rows are updated in parallel; the source grid is
    /// read-only throughout.
    pub fn update(&mut self, dt: f64, particles: &[Particle]) {
        self.accumulate_areas(particles);

        let width = self.width;
        let height = self.height;
        let inv_dx2 = 1.0 / (self.dx * self.dx);
        let inv_dy2 = 1.0 / (self.dy * self.dy);
        let diffusion = self.diffusion;
        let rate = self.consumption;

        let src = &self.conc;
        let area = &self.area;
        self.back
            .par_chunks_mut(width)
            .enumerate()
            .for_each(|(j, row)| {
                if j == 0 || j == height - 1 {
                    return;
                }
                let base = j * width;
                for i in 1..width - 1 {
                    let c = src[base + i];
                    let d2x = (src[base + i + 1] - 2.0 * c + src[base + i - 1]) * inv_dx2;
                    let d2y = (src[base + width + i] - 2.0 * c + src[base - width + i]) * inv_dy2;
                    let sink = rate * area[base + i] * c / (1.0 + c);
                    row[i] = (c + dt * (diffusion * (d2x + d2y) - sink)).max(0.0);
                }
            });

        // No-flux boundaries mirror the first interior layer of the old
        // field; x edges are written after y edges so corners take the x rule.
        for i in 0..width {
            self.back[i] = self.conc[width + i];
            self.back[(height - 1) * width + i] = self.conc[(height - 2) * width + i];
        }
        for j in 0..height {
            self.back[j * width] = self.conc[j * width + 1];
            self.back[j * width + width - 1] = self.conc[j * width + width - 2];
        }

        std::mem::swap(&mut self.conc, &mut self.back);
    }
}
