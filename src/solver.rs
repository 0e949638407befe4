//! Local sequencing heuristics: nearest-neighbor construction + 2-opt.
//!
//! Both work on indices into a travel-cost matrix and return new sequences;
//! callers' slices are never modified.

use tracing::debug;

#[derive(Debug, Clone)]
pub struct SolveOptions {
    /// Maximum full 2-opt passes.
    pub local_search_iterations: usize,
}

impl Default for SolveOptions {
    fn default() -> Self {
        Self {
            local_search_iterations: 100,
        }
    }
}

/// Whether the last position of a tour is an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TourEnd {
    /// Last stop is pinned (e.g. a fixed destination).
    Fixed,
    /// Path may end anywhere.
    Open,
}

/// Minimum gain (meters) for a 2-opt move to count as an improvement.
///
/// Absorbs floating-point noise in the delta sums; anything below it is a
/// tie, and ties never move.
const IMPROVEMENT_EPSILON: f64 = 1e-6;

/// Greedy tour construction from `start` over `free`.
///
/// Always steps to the closest unvisited point; ties go to the point that
/// appears first in `free`.
pub fn nearest_neighbor(matrix: &[Vec<f64>], start: usize, free: &[usize]) -> Vec<usize> {
    let mut remaining = free.to_vec();
    let mut order = Vec::with_capacity(free.len());
    let mut current = start;

    while !remaining.is_empty() {
        let mut best = 0;
        for (k, &candidate) in remaining.iter().enumerate().skip(1) {
            if matrix[current][candidate] < matrix[current][remaining[best]] {
                best = k;
            }
        }
        let next = remaining.remove(best);
        order.push(next);
        current = next;
    }

    order
}

/// Sum of consecutive leg costs along `tour`.
pub fn tour_cost(matrix: &[Vec<f64>], tour: &[usize]) -> f64 {
    tour.windows(2).map(|leg| matrix[leg[0]][leg[1]]).sum()
}

/// Cost change of reversing `tour[i..=j]`, with `i >= 1`.
fn reversal_delta(matrix: &[Vec<f64>], tour: &[usize], i: usize, j: usize) -> f64 {
    let mut old = matrix[tour[i - 1]][tour[i]];
    let mut new = matrix[tour[i - 1]][tour[j]];

    for k in i..j {
        old += matrix[tour[k]][tour[k + 1]];
        new += matrix[tour[k + 1]][tour[k]];
    }

    if j + 1 < tour.len() {
        old += matrix[tour[j]][tour[j + 1]];
        new += matrix[tour[i]][tour[j + 1]];
    }

    new - old
}

/// 2-opt: reverse sub-segments while doing so shortens the tour.
///
/// Position 0 never moves, nor does the last position when `end` is
/// [`TourEnd::Fixed`]. Pairs are scanned by ascending `i` then `j`, so the
/// result is deterministic. Stops after a pass without improvement or after
/// `max_passes` passes.
pub fn two_opt(matrix: &[Vec<f64>], tour: &[usize], end: TourEnd, max_passes: usize) -> Vec<usize> {
    let mut best = tour.to_vec();
    let n = best.len();
    let last_movable = match end {
        TourEnd::Fixed => n.saturating_sub(2),
        TourEnd::Open => n.saturating_sub(1),
    };

    for pass in 0..max_passes {
        let mut improved = false;

        for i in 1..last_movable {
            for j in (i + 1)..=last_movable {
                if reversal_delta(matrix, &best, i, j) < -IMPROVEMENT_EPSILON {
                    best[i..=j].reverse();
                    improved = true;
                }
            }
        }

        if !improved {
            debug!(passes = pass + 1, "2-opt converged");
            break;
        }
    }

    best
}

/// Orders `free` between a leading anchor and an optional trailing anchor.
///
/// Returns the full tour, anchors included.
pub fn order_segment(
    matrix: &[Vec<f64>],
    lead: usize,
    free: &[usize],
    tail: Option<usize>,
    options: &SolveOptions,
) -> Vec<usize> {
    let mut seed = Vec::with_capacity(free.len() + 2);
    seed.push(lead);
    seed.extend(nearest_neighbor(matrix, lead, free));
    seed.extend(tail);

    let end = if tail.is_some() {
        TourEnd::Fixed
    } else {
        TourEnd::Open
    };
    let refined = two_opt(matrix, &seed, end, options.local_search_iterations);

    debug!(
        stops = refined.len(),
        seed_cost = tour_cost(matrix, &seed),
        refined_cost = tour_cost(matrix, &refined),
        "segment ordered locally"
    );

    refined
}
