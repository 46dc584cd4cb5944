//! The bounded world rectangle and its resource multiset.

use serde::{Deserialize, Serialize};

/// A single consumable resource deposit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    /// World x coordinate.
    pub x: f32,
    /// World y coordinate.
    pub y: f32,
    /// Remaining amount; consuming a resource removes it once depleted.
    pub amount: f32,
}

/// The bounded rectangle entities move within, and its resource multiset.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Environment {
    /// World width in world units.
    pub width: f32,
    /// World height in world units.
    pub height: f32,
    /// Live resources.
    pub resources: Vec<Resource>,
}

impl Environment {
    /// A bounded rectangle with no resources.
    pub fn new(width: f32, height: f32) -> Self {
        Environment {
            width,
            height,
            resources: Vec::new(),
        }
    }

    /// Clamp a position to stay within bounds (the `friction`-compatible
    /// alternative to wrapping; the engine picks one policy per run).
    pub fn clamp(&self, x: f32, y: f32) -> (f32, f32) {
        (x.clamp(0.0, self.width), y.clamp(0.0, self.height))
    }

    /// Wrap a position around the torus formed by the bounds.
    pub fn wrap(&self, x: f32, y: f32) -> (f32, f32) {
        let wrapped_x = x.rem_euclid(self.width.max(1.0));
        let wrapped_y = y.rem_euclid(self.height.max(1.0));
        (wrapped_x, wrapped_y)
    }

    /// Consume up to `amount` from the nearest resource within `radius` of
    /// `(x, y)`, returning how much was actually consumed. Depleted
    /// resources are removed.
    pub fn consume_nearest(&mut self, x: f32, y: f32, radius: f32, amount: f32) -> f32 {
        let mut best: Option<(usize, f32)> = None;
        for (i, r) in self.resources.iter().enumerate() {
            let dx = r.x - x;
            let dy = r.y - y;
            let dist_sq = dx * dx + dy * dy;
            if dist_sq <= radius * radius {
                if best.map(|(_, d)| dist_sq < d).unwrap_or(true) {
                    best = Some((i, dist_sq));
                }
            }
        }
        match best {
            Some((idx, _)) => {
                let taken = amount.min(self.resources[idx].amount);
                self.resources[idx].amount -= taken;
                if self.resources[idx].amount <= 0.0 {
                    self.resources.remove(idx);
                }
                taken
            }
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_brings_negative_coordinates_back_in_bounds() {
        let env = Environment::new(100.0, 100.0);
        let (x, y) = env.wrap(-1.0, 101.0);
        assert!((0.0..100.0).contains(&x));
        assert!((0.0..100.0).contains(&y));
    }

    #[test]
    fn clamp_saturates_at_bounds() {
        let env = Environment::new(100.0, 100.0);
        let (x, y) = env.clamp(150.0, -20.0);
        assert_eq!(x, 100.0);
        assert_eq!(y, 0.0);
    }

    #[test]
    fn consume_nearest_depletes_and_removes_resource() {
        let mut env = Environment::new(100.0, 100.0);
        env.resources.push(Resource { x: 0.0, y: 0.0, amount: 5.0 });
        let taken = env.consume_nearest(0.0, 0.0, 1.0, 3.0);
        assert_eq!(taken, 3.0);
        assert_eq!(env.resources[0].amount, 2.0);
        let taken2 = env.consume_nearest(0.0, 0.0, 1.0, 10.0);
        assert_eq!(taken2, 2.0);
        assert!(env.resources.is_empty());
    }

    #[test]
    fn consume_nearest_out_of_radius_takes_nothing() {
        let mut env = Environment::new(100.0, 100.0);
        env.resources.push(Resource { x: 50.0, y: 50.0, amount: 5.0 });
        let taken = env.consume_nearest(0.0, 0.0, 1.0, 3.0);
        assert_eq!(taken, 0.0);
    }
}
