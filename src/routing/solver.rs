//! Multi-vehicle routing heuristic over an integer cost matrix.
//!
//! Every vehicle starts and ends at the depot, there are no capacities, and
//! the objective is total arc cost. Construction extends the vehicle tail
//! with the cheapest outgoing arc; local search (relocate, 2-opt, exchange)
//! then runs until no move improves or the wall-clock budget is spent.

use std::time::{Duration, Instant};
use tracing::debug;

/// Visiting order per vehicle (depot excluded) and total tour cost
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Solution {
    pub routes: Vec<Vec<usize>>,
    pub cost: i64,
}

/// Tour cost of one vehicle, including the closing arc back to the depot
pub fn route_cost(matrix: &[Vec<i64>], depot: usize, route: &[usize]) -> i64 {
    if route.is_empty() {
        return 0;
    }
    let mut cost = matrix[depot][route[0]];
    for pair in route.windows(2) {
        cost += matrix[pair[0]][pair[1]];
    }
    cost + matrix[route[route.len() - 1]][depot]
}

fn total_cost(matrix: &[Vec<i64>], depot: usize, routes: &[Vec<usize>]) -> i64 {
    routes.iter().map(|r| route_cost(matrix, depot, r)).sum()
}

/// Solve for exactly `vehicles` routes.
///
/// Returns None for a malformed problem (non-square matrix, depot out of
/// range, no vehicles) or when the budget runs out before every node has
/// been assigned. Once a full assignment exists it is always returned.
pub fn solve(
    matrix: &[Vec<i64>],
    vehicles: usize,
    depot: usize,
    time_limit: Duration,
) -> Option<Solution> {
    let n = matrix.len();
    if vehicles == 0 || depot >= n || matrix.iter().any(|row| row.len() != n) {
        return None;
    }
    let deadline = Instant::now() + time_limit;

    let mut routes = construct(matrix, vehicles, depot, deadline)?;
    let mut cost = total_cost(matrix, depot, &routes);
    let mut passes = 0usize;

    while Instant::now() < deadline {
        passes += 1;
        let improved = two_opt(matrix, depot, &mut routes, deadline)
            | relocate(matrix, depot, &mut routes, deadline)
            | exchange(matrix, depot, &mut routes, deadline);
        if !improved {
            break;
        }
    }

    let improved_cost = total_cost(matrix, depot, &routes);
    debug!(
        "VRP: {} nodes, {} vehicles, cost {} -> {} after {} passes",
        n, vehicles, cost, improved_cost, passes
    );
    cost = improved_cost;

    Some(Solution { routes, cost })
}

fn construct(
    matrix: &[Vec<i64>],
    vehicles: usize,
    depot: usize,
    deadline: Instant,
) -> Option<Vec<Vec<usize>>> {
    let mut routes: Vec<Vec<usize>> = vec![Vec::new(); vehicles];
    let mut unvisited: Vec<usize> = (0..matrix.len()).filter(|&i| i != depot).collect();

    while !unvisited.is_empty() {
        if Instant::now() >= deadline {
            return None;
        }
        // cheapest arc out of any vehicle's current tail; ties go to the lower vehicle/node
        let mut best: Option<(i64, usize, usize)> = None;
        for (v, route) in routes.iter().enumerate() {
            let tail = route.last().copied().unwrap_or(depot);
            for (k, &node) in unvisited.iter().enumerate() {
                let arc = matrix[tail][node];
                if best.map_or(true, |(c, _, _)| arc < c) {
                    best = Some((arc, v, k));
                }
            }
        }
        let (_, v, k) = best?;
        routes[v].push(unvisited.remove(k));
    }
    Some(routes)
}

/// Reverse a segment inside one route when that shortens it
fn two_opt(matrix: &[Vec<i64>], depot: usize, routes: &mut [Vec<usize>], deadline: Instant) -> bool {
    let mut improved = false;
    for route in routes.iter_mut() {
        let len = route.len();
        if len < 3 {
            continue;
        }
        let mut current = route_cost(matrix, depot, route);
        for i in 0..len - 1 {
            for j in i + 1..len {
                if Instant::now() >= deadline {
                    return improved;
                }
                route[i..=j].reverse();
                let candidate = route_cost(matrix, depot, route);
                if candidate < current {
                    current = candidate;
                    improved = true;
                } else {
                    route[i..=j].reverse();
                }
            }
        }
    }
    improved
}

/// Move a single node to its best position in any route
fn relocate(matrix: &[Vec<i64>], depot: usize, routes: &mut [Vec<usize>], deadline: Instant) -> bool {
    let mut improved = false;
    for from in 0..routes.len() {
        let mut i = 0;
        while i < routes[from].len() {
            if Instant::now() >= deadline {
                return improved;
            }
            let before = total_cost(matrix, depot, routes);
            let node = routes[from].remove(i);

            let mut best: Option<(i64, usize, usize)> = None;
            for to in 0..routes.len() {
                for pos in 0..=routes[to].len() {
                    if to == from && pos == i {
                        continue;
                    }
                    routes[to].insert(pos, node);
                    let candidate = total_cost(matrix, depot, routes);
                    routes[to].remove(pos);
                    if candidate < before && best.map_or(true, |(c, _, _)| candidate < c) {
                        best = Some((candidate, to, pos));
                    }
                }
            }

            match best {
                Some((_, to, pos)) => {
                    routes[to].insert(pos, node);
                    improved = true;
                    // the node at `i` changed; re-examine the same slot
                    if to != from || pos > i {
                        continue;
                    }
                }
                None => routes[from].insert(i, node),
            }
            i += 1;
        }
    }
    improved
}

/// Swap two nodes between different routes
fn exchange(matrix: &[Vec<i64>], depot: usize, routes: &mut [Vec<usize>], deadline: Instant) -> bool {
    let mut improved = false;
    for a in 0..routes.len() {
        for b in a + 1..routes.len() {
            for i in 0..routes[a].len() {
                for j in 0..routes[b].len() {
                    if Instant::now() >= deadline {
                        return improved;
                    }
                    let before = route_cost(matrix, depot, &routes[a]) + route_cost(matrix, depot, &routes[b]);
                    let (x, y) = (routes[a][i], routes[b][j]);
                    routes[a][i] = y;
                    routes[b][j] = x;
                    let after = route_cost(matrix, depot, &routes[a]) + route_cost(matrix, depot, &routes[b]);
                    if after < before {
                        improved = true;
                    } else {
                        routes[a][i] = x;
                        routes[b][j] = y;
                    }
                }
            }
        }
    }
    improved
}
