use biofilm_common::Vec2;
use std::f64::consts::PI;

/// Geometry payload distinguishing the two particle kinds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Spherocylinder: cylindrical body of `length - diameter` along the
    /// orientation, capped by hemispheres of radius `diameter / 2`.
    Cell { length: f64 },
    /// Disk of the given radius.
    Eps { radius: f64 },
}

/// A particle in the simulation: a bacterial cell or a secreted EPS sphere.
///
/// `orientation` is kept a unit vector; every rotation update renormalises.
/// Cells and EPS draw ids from disjoint numeric spaces.
#[derive(Debug, Clone, PartialEq)]
pub struct Particle {
    pub id: u32,
    pub position: Vec2,
    pub orientation: Vec2,
    pub diameter: f64,
    pub shape: Shape,
}

impl Particle {
    pub fn cell(id: u32, diameter: f64, position: Vec2, orientation: Vec2, length: f64) -> Self {
        Particle {
            id,
            position,
            orientation,
            diameter,
            shape: Shape::Cell { length },
        }
    }

    pub fn eps(id: u32, position: Vec2, orientation: Vec2, radius: f64) -> Self {
        Particle {
            id,
            position,
            orientation,
            diameter: radius * 2.0,
            shape: Shape::Eps { radius },
        }
    }

    pub fn is_cell(&self) -> bool {
        matches!(self.shape, Shape::Cell { .. })
    }

    pub fn is_eps(&self) -> bool {
        matches!(self.shape, Shape::Eps { .. })
    }

    /// Surface "area" used for nutrient consumption and density sensing:
    /// end caps plus cylindrical body for cells, pi*r^2 for EPS.
    pub fn area(&self) -> f64 {
        match self.shape {
            Shape::Cell { length } => {
                let r0 = self.diameter / 2.0;
                PI * r0 * r0 + 2.0 * r0 * (length - self.diameter)
            }
            Shape::Eps { radius } => PI * radius * radius,
        }
    }

    /// Radius used for surface-to-surface distance computations.
    pub fn contact_radius(&self) -> f64 {
        match self.shape {
            Shape::Cell { .. } => self.diameter / 2.0,
            Shape::Eps { radius } => radius,
        }
    }

    /// Geometric length scale L for the overdamped velocity laws.
    pub fn effective_length(&self) -> f64 {
        match self.shape {
            Shape::Cell { length } => length,
            Shape::Eps { radius } => 2.0 * radius,
        }
    }

    /// Endpoints of the cylindrical body axis segment (hemispheres excluded);
    /// body length is `max(0, length - diameter)`. EPS collapse to the centre.
    pub fn axis_endpoints(&self) -> (Vec2, Vec2) {
        match self.shape {
            Shape::Cell { length } => {
                let half = ((length - self.diameter) / 2.0).max(0.0);
                let offset = self.orientation * half;
                (self.position - offset, self.position + offset)
            }
            Shape::Eps { .. } => (self.position, self.position),
        }
    }

    /// Hemisphere centres at `centre +/- (length / 2) * orientation`.
    pub fn cap_centers(&self) -> (Vec2, Vec2) {
        match self.shape {
            Shape::Cell { length } => {
                let offset = self.orientation * (length / 2.0);
                (self.position - offset, self.position + offset)
            }
            Shape::Eps { .. } => (self.position, self.position),
        }
    }

    /// Rotates the orientation by `dtheta` radians, renormalising the result.
    /// A rotation that collapses to zero norm leaves the orientation unchanged.
    pub fn rotate(&mut self, dtheta: f64) {
        let rotated = self.orientation.rotated(dtheta);
        let norm = rotated.length();
        if norm > 0.0 {
            self.orientation = rotated / norm;
        }
    }
}
