//! Tracked-vessel obstacle model
//!
//! Each dynamic obstacle is represented by a short timeline of Gaussian
//! position distributions supplied by the tracking filter. The planner
//! queries the summed probability density at sampled points along candidate
//! edges.

use std::collections::HashMap;
use std::f64::consts::PI;

use nalgebra::{Matrix2, Vector2};

/// A Gaussian position estimate for one obstacle at one instant
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Distribution {
    mean: Vector2<f64>,
    covariance: Matrix2<f64>,
    heading: f64,
    time: f64,
}

impl Distribution {
    pub fn new(mean_x: f64, mean_y: f64, covariance: Matrix2<f64>, heading: f64, time: f64) -> Self {
        Self {
            mean: Vector2::new(mean_x, mean_y),
            covariance,
            heading,
            time,
        }
    }

    /// Unit-covariance distribution, the tracker placeholder shape
    pub fn unit(mean_x: f64, mean_y: f64, heading: f64, time: f64) -> Self {
        Self::new(mean_x, mean_y, Matrix2::identity(), heading, time)
    }

    pub fn mean(&self) -> (f64, f64) {
        (self.mean.x, self.mean.y)
    }

    pub fn heading(&self) -> f64 {
        self.heading
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Bivariate normal density at (x, y). A singular covariance
    /// contributes nothing.
    pub fn density(&self, x: f64, y: f64) -> f64 {
        let det = self.covariance.determinant();
        if det <= 0.0 {
            return 0.0;
        }
        let inverse = match self.covariance.try_inverse() {
            Some(inv) => inv,
            None => return 0.0,
        };
        let d = Vector2::new(x, y) - self.mean;
        let exponent = -0.5 * (d.transpose() * inverse * d)[(0, 0)];
        exponent.exp() / (2.0 * PI * det.sqrt())
    }

    /// Linear blend of two estimates at `t` between their timestamps
    fn interpolate(a: &Distribution, b: &Distribution, t: f64) -> Distribution {
        let span = b.time - a.time;
        if span.abs() < 1e-9 {
            return *a;
        }
        let frac = ((t - a.time) / span).clamp(0.0, 1.0);
        Distribution {
            mean: a.mean + (b.mean - a.mean) * frac,
            covariance: a.covariance + (b.covariance - a.covariance) * frac,
            heading: a.heading,
            time: t,
        }
    }
}

/// Timelines of position distributions keyed by tracked-vessel identifier.
///
/// Deep-copied (`Clone`) into the planner configuration each iteration so
/// the search never races the ingest thread.
#[derive(Debug, Clone, Default)]
pub struct DynamicObstaclesManager {
    obstacles: HashMap<u32, Vec<Distribution>>,
}

impl DynamicObstaclesManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the timeline for one obstacle. Empty timelines are ignored:
    /// an active id always keeps at least one distribution.
    pub fn update(&mut self, id: u32, mut distributions: Vec<Distribution>) {
        if distributions.is_empty() {
            log::warn!("Ignoring empty distribution update for obstacle {}", id);
            return;
        }
        distributions.sort_by(|a, b| {
            a.time.partial_cmp(&b.time).unwrap_or(std::cmp::Ordering::Equal)
        });
        self.obstacles.insert(id, distributions);
    }

    pub fn forget(&mut self, id: u32) {
        self.obstacles.remove(&id);
    }

    pub fn is_empty(&self) -> bool {
        self.obstacles.is_empty()
    }

    pub fn len(&self) -> usize {
        self.obstacles.len()
    }

    /// Drop estimates older than `cutoff`, keeping at least the newest one
    /// per obstacle
    pub fn prune(&mut self, cutoff: f64) {
        for timeline in self.obstacles.values_mut() {
            if let Some(&newest) = timeline.last() {
                timeline.retain(|d| d.time >= cutoff);
                if timeline.is_empty() {
                    timeline.push(newest);
                }
            }
        }
    }

    /// Summed probability density of all obstacles at (x, y) at time `t`.
    /// Timelines are interpolated between estimates and clamped beyond
    /// their ends.
    pub fn collision_density(&self, x: f64, y: f64, t: f64) -> f64 {
        let mut total = 0.0;
        for timeline in self.obstacles.values() {
            if let Some(estimate) = Self::estimate_at(timeline, t) {
                total += estimate.density(x, y);
            }
        }
        total
    }

    fn estimate_at(timeline: &[Distribution], t: f64) -> Option<Distribution> {
        let first = timeline.first()?;
        if t <= first.time {
            return Some(*first);
        }
        for pair in timeline.windows(2) {
            if t <= pair[1].time {
                return Some(Distribution::interpolate(&pair[0], &pair[1], t));
            }
        }
        timeline.last().copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_density_peaks_at_mean() {
        let d = Distribution::unit(3.0, 4.0, 0.0, 0.0);
        assert!(d.density(3.0, 4.0) > d.density(5.0, 4.0));
        assert!((d.density(3.0, 4.0) - 1.0 / (2.0 * PI)).abs() < 1e-9);
    }

    #[test]
    fn test_singular_covariance_contributes_nothing() {
        let d = Distribution::new(0.0, 0.0, Matrix2::zeros(), 0.0, 0.0);
        assert_eq!(d.density(0.0, 0.0), 0.0);
    }

    #[test]
    fn test_update_rejects_empty() {
        let mut m = DynamicObstaclesManager::new();
        m.update(7, Vec::new());
        assert!(m.is_empty());
    }

    #[test]
    fn test_collision_density_sums_obstacles() {
        let mut m = DynamicObstaclesManager::new();
        m.update(1, vec![Distribution::unit(0.0, 0.0, 0.0, 0.0)]);
        m.update(2, vec![Distribution::unit(0.0, 0.0, 0.0, 0.0)]);
        let single = Distribution::unit(0.0, 0.0, 0.0, 0.0).density(0.0, 0.0);
        assert!((m.collision_density(0.0, 0.0, 0.0) - 2.0 * single).abs() < 1e-12);
    }

    #[test]
    fn test_timeline_interpolates_mean() {
        let mut m = DynamicObstaclesManager::new();
        m.update(
            1,
            vec![
                Distribution::unit(0.0, 0.0, 0.0, 0.0),
                Distribution::unit(10.0, 0.0, 0.0, 10.0),
            ],
        );
        // halfway in time the mean should be near (5, 0)
        let mid = m.collision_density(5.0, 0.0, 5.0);
        let off = m.collision_density(0.0, 0.0, 5.0);
        assert!(mid > off);
    }

    #[test]
    fn test_prune_keeps_newest() {
        let mut m = DynamicObstaclesManager::new();
        m.update(
            1,
            vec![
                Distribution::unit(0.0, 0.0, 0.0, 0.0),
                Distribution::unit(1.0, 0.0, 0.0, 1.0),
            ],
        );
        m.prune(100.0);
        assert_eq!(m.len(), 1);
        assert!(m.collision_density(1.0, 0.0, 50.0) > 0.0);
    }
}
