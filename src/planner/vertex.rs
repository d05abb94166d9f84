//! Search-tree vertices and Dubins edges
//!
//! Vertices live in a flat arena (`Vec<Vertex>`) with parent links as
//! indices; each vertex owns the edge that reached it. A vertex carries a
//! snapshot of the remaining ribbons so coverage earned along its path
//! propagates through the subtree without touching shared state.

use crate::common::State;
use crate::dubins::{self, DubinsArc};
use crate::planner::config::PlannerConfig;
use crate::planner::{COLLISION_DENSITY_THRESHOLD, COLLISION_PENALTY_WEIGHT, DUBINS_INCREMENT};
use crate::ribbons::RibbonManager;

/// Dubins connector from a parent vertex, owned by its child
#[derive(Debug, Clone)]
pub struct Edge {
    pub arcs: Vec<DubinsArc>,
    pub true_cost: f64,
    pub coverage_allowed: bool,
}

impl Edge {
    pub fn length(&self) -> f64 {
        self.arcs.iter().map(|a| a.length).sum()
    }
}

/// One node of the search tree
#[derive(Debug, Clone)]
pub struct Vertex {
    pub state: State,
    pub ribbons: RibbonManager,
    pub parent: Option<usize>,
    pub edge: Option<Edge>,
    /// Accrued cost from the root, in seconds plus penalties
    pub g: f64,
    /// Heuristic cost-to-go in seconds
    pub h: f64,
}

impl Vertex {
    pub fn f(&self) -> f64 {
        self.g + self.h
    }

    pub fn is_goal(&self) -> bool {
        self.ribbons.done()
    }

    /// Root vertex: no parent, zero accrued cost. The heuristic assumes the
    /// best achievable progress rate, so the root's speed is the max speed.
    pub fn make_root(arena: &mut Vec<Vertex>, state: State, ribbons: RibbonManager, config: &PlannerConfig) -> usize {
        let mut state = state;
        state.speed = config.max_speed;
        let h = approx_to_go(&ribbons, &state, config);
        arena.push(Vertex {
            state,
            ribbons,
            parent: None,
            edge: None,
            g: 0.0,
            h,
        });
        arena.len() - 1
    }
}

/// Heuristic cost-to-go in seconds from `state` against its ribbon snapshot
pub fn approx_to_go(ribbons: &RibbonManager, state: &State, config: &PlannerConfig) -> f64 {
    ribbons.approximate_distance_until_done(state.x, state.y, state.heading) / config.max_speed
}

/// Connect `parent` to the oriented target state with a Dubins edge and
/// evaluate its true cost. Returns the child's arena index, or None when the
/// edge is infeasible (blocked cells or excessive collision density).
pub fn connect(
    arena: &mut Vec<Vertex>,
    parent: usize,
    target: &State,
    turning_radius: f64,
    coverage_allowed: bool,
    config: &PlannerConfig,
) -> Option<usize> {
    let parent_state = arena[parent].state;
    let arcs = dubins::connect(&parent_state, target.x, target.y, target.heading, turning_radius)?;
    connect_with_arcs(arena, parent, arcs, coverage_allowed, config)
}

/// Adopt a pre-built arc as an edge from `parent`, used to revalidate the
/// previous plan under the current obstacles and map
pub fn connect_arc(
    arena: &mut Vec<Vertex>,
    parent: usize,
    arc: DubinsArc,
    config: &PlannerConfig,
) -> Option<usize> {
    connect_with_arcs(arena, parent, vec![arc], true, config)
}

fn connect_with_arcs(
    arena: &mut Vec<Vertex>,
    parent: usize,
    arcs: Vec<DubinsArc>,
    coverage_allowed: bool,
    config: &PlannerConfig,
) -> Option<usize> {
    if arcs.is_empty() {
        return None;
    }
    let mut ribbons = arena[parent].ribbons.clone();
    let true_cost = compute_true_cost(&arcs, coverage_allowed, &mut ribbons, config)?;
    let mut end = arcs.last().map(DubinsArc::end_state)?;
    end.speed = config.max_speed;
    let g = arena[parent].g + true_cost;
    // coverage credit lands on the snapshot before h is computed
    let h = approx_to_go(&ribbons, &end, config);
    arena.push(Vertex {
        state: end,
        ribbons,
        parent: Some(parent),
        edge: Some(Edge {
            arcs,
            true_cost,
            coverage_allowed,
        }),
        g,
        h,
    });
    Some(arena.len() - 1)
}

/// Integrate time, obstacle risk, static-map penalties and coverage credit
/// along the edge. None means infeasible.
fn compute_true_cost(
    arcs: &[DubinsArc],
    coverage_allowed: bool,
    ribbons: &mut RibbonManager,
    config: &PlannerConfig,
) -> Option<f64> {
    let mut penalty = 0.0;
    let mut duration = 0.0;
    let time_step = DUBINS_INCREMENT / config.max_speed;
    for arc in arcs {
        duration += arc.duration();
        let mut s = 0.0;
        while s <= arc.length {
            let sample = arc.state_at_length(s);
            let terrain = config.map.query(sample.x, sample.y);
            if terrain.is_blocked() {
                return None;
            }
            penalty += terrain.cost() * time_step;
            let density = config.obstacles.collision_density(sample.x, sample.y, sample.time);
            if density > COLLISION_DENSITY_THRESHOLD {
                return None;
            }
            penalty += density * COLLISION_PENALTY_WEIGHT * time_step;
            if coverage_allowed {
                ribbons.cover(sample.x, sample.y);
            }
            s += DUBINS_INCREMENT;
        }
    }
    Some(duration + penalty)
}

/// Concatenate the edges from the root to `vertex` in forward order
pub fn trace_plan(arena: &[Vertex], vertex: usize) -> crate::dubins::DubinsPlan {
    let mut chain = Vec::new();
    let mut cursor = Some(vertex);
    while let Some(idx) = cursor {
        chain.push(idx);
        cursor = arena[idx].parent;
    }
    chain.reverse();
    let mut plan = crate::dubins::DubinsPlan::new();
    for idx in chain {
        if let Some(edge) = &arena[idx].edge {
            plan.extend(edge.arcs.iter().copied());
        }
    }
    plan
}
