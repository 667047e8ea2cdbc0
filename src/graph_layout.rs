//! Layered layout with nested groups.
//!
//! Every container (the top level and each group) is laid out on its own,
//! innermost first, so a group enters its parent's layout as one cell whose
//! size is already known. Within a container:
//!
//!   1. Edges are lifted to the container's direct children and cycles are
//!      broken by dropping DFS back edges.
//!   2. Cells are ranked by longest path from the sources.
//!   3. Ranks are reordered by barycenter sweeps, keeping the ordering with
//!      the fewest crossings.
//!   4. Ranks are placed one after another along the flow direction, each
//!      rank centred across it.

use std::collections::HashMap;

use tracing::debug;

use crate::config::LayoutConfig;
use crate::label::measure;
use crate::layout::{Placement, Placements, default_size};
use crate::model::{Direction, Graph, Node, NodeKind, Point, Size};

/// Lifted edge list of one container; indices refer to its cells.
struct CellGraph {
    n: usize,
    adj: Vec<Vec<usize>>,
    rev: Vec<Vec<usize>>,
}

impl CellGraph {
    fn new(n: usize, edges: &[(usize, usize)]) -> Self {
        let mut adj = vec![Vec::new(); n];
        let mut rev = vec![Vec::new(); n];
        for &(u, v) in edges {
            if !adj[u].contains(&v) {
                adj[u].push(v);
                rev[v].push(u);
            }
        }
        Self { n, adj, rev }
    }
}

pub fn layout(graph: &Graph, config: &LayoutConfig) -> Placements {
    let mut out = Placements::new();
    let parents: HashMap<&str, Option<&str>> = graph
        .nodes
        .iter()
        .map(|n| (n.id.as_str(), n.parent.as_deref()))
        .collect();
    layout_container(graph, &parents, None, config, &mut out);
    out
}

/// Walk up from `id` to the ancestor whose parent is `container`.
fn cell_of<'a>(parents: &HashMap<&'a str, Option<&'a str>>, id: &'a str, container: Option<&str>) -> Option<&'a str> {
    let mut cursor = id;
    for _ in 0..=parents.len() {
        let parent = *parents.get(cursor)?;
        if parent == container {
            return Some(cursor);
        }
        cursor = parent?;
    }
    None
}

/// Place the children of `container` and return the size of their bounding
/// box. Child groups are laid out first.
fn layout_container(
    graph: &Graph,
    parents: &HashMap<&str, Option<&str>>,
    container: Option<&str>,
    config: &LayoutConfig,
    out: &mut Placements,
) -> Size {
    let cells: Vec<&Node> = graph.children_of(container).filter(|n| !n.is_derived()).collect();
    if cells.is_empty() {
        return Size::default();
    }

    let sizes: Vec<Size> = cells
        .iter()
        .map(|cell| {
            if cell.kind == NodeKind::Group {
                group_size(cell, layout_container(graph, parents, Some(&cell.id), config, out), config)
            } else {
                default_size(cell)
            }
        })
        .collect();

    let index: HashMap<&str, usize> = cells.iter().enumerate().map(|(i, c)| (c.id.as_str(), i)).collect();
    let lifted: Vec<(usize, usize)> = graph
        .edges
        .iter()
        .filter(|e| !e.data.is_lifeline)
        .filter_map(|e| {
            let u = *index.get(cell_of(parents, &e.source, container)?)?;
            let v = *index.get(cell_of(parents, &e.target, container)?)?;
            (u != v).then_some((u, v))
        })
        .collect();
    let acyclic = break_cycles(cells.len(), &lifted);
    let cell_graph = CellGraph::new(cells.len(), &acyclic);

    let ranks = assign_ranks(&cell_graph);
    let mut rank_order = build_rank_buckets(&ranks);
    let crossings = minimize_crossings(&mut rank_order, &cell_graph, config.crossing_sweeps);
    debug!(container = container.unwrap_or("<root>"), cells = cells.len(), crossings, "ranked container");

    let origin = match container {
        Some(_) => Point::new(config.group_padding, config.group_padding + config.group_label_height),
        None => Point::default(),
    };
    let placed = assign_coordinates(&rank_order, &sizes, graph.direction, config);
    let mut extent = Size::default();
    for (i, cell) in cells.iter().enumerate() {
        let (pos, size) = (placed[i], sizes[i]);
        extent.width = extent.width.max(pos.x + size.width);
        extent.height = extent.height.max(pos.y + size.height);
        out.insert(
            cell.id.clone(),
            Placement {
                position: Point::new(origin.x + pos.x, origin.y + pos.y),
                size,
            },
        );
    }
    extent
}

fn group_size(group: &Node, content: Size, config: &LayoutConfig) -> Size {
    let (label_width, _) = measure(&group.label);
    Size::new(
        (content.width + 2.0 * config.group_padding).max(label_width + 2.0 * config.group_padding),
        content.height + 2.0 * config.group_padding + config.group_label_height,
    )
}

/// Drop the back edges found by a DFS started from each cell in order.
fn break_cycles(n: usize, edges: &[(usize, usize)]) -> Vec<(usize, usize)> {
    let mut adj: Vec<Vec<usize>> = vec![Vec::new(); n];
    for &(u, v) in edges {
        adj[u].push(v);
    }
    // 0 = unvisited, 1 = on stack, 2 = done
    let mut state = vec![0u8; n];
    let mut back: Vec<(usize, usize)> = Vec::new();

    for root in 0..n {
        if state[root] != 0 {
            continue;
        }
        let mut stack: Vec<(usize, usize)> = vec![(root, 0)];
        state[root] = 1;
        while let Some(top) = stack.last_mut() {
            let u = top.0;
            if top.1 < adj[u].len() {
                let v = adj[u][top.1];
                top.1 += 1;
                match state[v] {
                    0 => {
                        state[v] = 1;
                        stack.push((v, 0));
                    }
                    1 => back.push((u, v)),
                    _ => {}
                }
            } else {
                state[u] = 2;
                stack.pop();
            }
        }
    }

    edges.iter().copied().filter(|e| !back.contains(e)).collect()
}

/// Longest-path layering in Kahn order; sources get rank 0.
fn assign_ranks(graph: &CellGraph) -> Vec<usize> {
    let mut in_degree: Vec<usize> = graph.rev.iter().map(Vec::len).collect();
    let mut queue: Vec<usize> = (0..graph.n).filter(|&v| in_degree[v] == 0).collect();
    let mut ranks = vec![0usize; graph.n];

    let mut head = 0;
    while head < queue.len() {
        let u = queue[head];
        head += 1;
        for &v in &graph.adj[u] {
            ranks[v] = ranks[v].max(ranks[u] + 1);
            in_degree[v] -= 1;
            if in_degree[v] == 0 {
                queue.push(v);
            }
        }
    }
    ranks
}

fn build_rank_buckets(ranks: &[usize]) -> Vec<Vec<usize>> {
    let max_rank = ranks.iter().copied().max().unwrap_or(0);
    let mut buckets = vec![Vec::new(); max_rank + 1];
    for (v, &r) in ranks.iter().enumerate() {
        buckets[r].push(v);
    }
    buckets
}

fn barycenter(order: &[usize], neighbors: &[usize]) -> Option<f64> {
    let positions: Vec<usize> = neighbors
        .iter()
        .filter_map(|nb| order.iter().position(|x| x == nb))
        .collect();
    if positions.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    let mean = positions.iter().sum::<usize>() as f64 / positions.len() as f64;
    Some(mean)
}

/// Reorder `rank` by the barycenter of its neighbours in `fixed`. Cells
/// without neighbours keep their current slot.
fn sweep(rank: &mut Vec<usize>, fixed: &[usize], neighbors: &[Vec<usize>]) {
    let mut scored: Vec<(usize, f64, usize)> = rank
        .iter()
        .enumerate()
        .map(|(slot, &v)| {
            #[allow(clippy::cast_precision_loss)]
            let score = barycenter(fixed, &neighbors[v]).unwrap_or(slot as f64);
            (v, score, slot)
        })
        .collect();
    scored.sort_by(|a, b| a.1.total_cmp(&b.1).then(a.2.cmp(&b.2)));
    *rank = scored.into_iter().map(|(v, ..)| v).collect();
}

fn count_crossings(rank_a: &[usize], rank_b: &[usize], graph: &CellGraph) -> usize {
    let mut edges: Vec<(usize, usize)> = Vec::new();
    for (i, &u) in rank_a.iter().enumerate() {
        for &v in &graph.adj[u] {
            if let Some(j) = rank_b.iter().position(|&x| x == v) {
                edges.push((i, j));
            }
        }
    }
    let mut crossings = 0;
    for i in 0..edges.len() {
        for j in (i + 1)..edges.len() {
            let (a1, b1) = edges[i];
            let (a2, b2) = edges[j];
            if (a1 < a2 && b1 > b2) || (a1 > a2 && b1 < b2) {
                crossings += 1;
            }
        }
    }
    crossings
}

fn total_crossings(rank_order: &[Vec<usize>], graph: &CellGraph) -> usize {
    rank_order
        .windows(2)
        .map(|pair| count_crossings(&pair[0], &pair[1], graph))
        .sum()
}

/// Alternate down and up sweeps while the crossing count improves; the best
/// ordering seen is kept. Returns its crossing count.
fn minimize_crossings(rank_order: &mut Vec<Vec<usize>>, graph: &CellGraph, max_sweeps: usize) -> usize {
    let mut best = total_crossings(rank_order, graph);
    if rank_order.len() <= 1 || best == 0 {
        return best;
    }
    let mut best_order = rank_order.clone();

    for _ in 0..max_sweeps {
        for r in 1..rank_order.len() {
            let fixed = rank_order[r - 1].clone();
            sweep(&mut rank_order[r], &fixed, &graph.rev);
        }
        for r in (0..rank_order.len() - 1).rev() {
            let fixed = rank_order[r + 1].clone();
            sweep(&mut rank_order[r], &fixed, &graph.adj);
        }
        let crossings = total_crossings(rank_order, graph);
        if crossings < best {
            best = crossings;
            best_order = rank_order.clone();
            if best == 0 {
                break;
            }
        } else {
            break;
        }
    }
    *rank_order = best_order;
    best
}

/// Top-left corner of every cell, relative to the container's content box.
fn assign_coordinates(
    rank_order: &[Vec<usize>],
    sizes: &[Size],
    direction: Direction,
    config: &LayoutConfig,
) -> Vec<Point> {
    let horizontal = direction.is_horizontal();
    let main = |s: Size| if horizontal { s.width } else { s.height };
    let cross = |s: Size| if horizontal { s.height } else { s.width };

    let rank_depth: Vec<f64> = rank_order
        .iter()
        .map(|rank| rank.iter().map(|&v| main(sizes[v])).fold(0.0, f64::max))
        .collect();
    let rank_breadth: Vec<f64> = rank_order
        .iter()
        .map(|rank| {
            let total: f64 = rank.iter().map(|&v| cross(sizes[v])).sum();
            #[allow(clippy::cast_precision_loss)]
            let gaps = rank.len().saturating_sub(1) as f64 * config.node_spacing;
            total + gaps
        })
        .collect();
    let widest = rank_breadth.iter().copied().fold(0.0, f64::max);

    let mut placed = vec![Point::default(); sizes.len()];
    let mut main_cursor = 0.0;
    for (r, rank) in rank_order.iter().enumerate() {
        let mut cross_cursor = (widest - rank_breadth[r]) / 2.0;
        for &v in rank {
            let m = main_cursor + (rank_depth[r] - main(sizes[v])) / 2.0;
            placed[v] = if horizontal {
                Point::new(m, cross_cursor)
            } else {
                Point::new(cross_cursor, m)
            };
            cross_cursor += cross(sizes[v]) + config.node_spacing;
        }
        main_cursor += rank_depth[r] + config.rank_spacing;
    }

    let total_main = (main_cursor - config.rank_spacing).max(0.0);
    match direction {
        Direction::BottomTop => {
            for (p, s) in placed.iter_mut().zip(sizes) {
                p.y = total_main - p.y - s.height;
            }
        }
        Direction::RightLeft => {
            for (p, s) in placed.iter_mut().zip(sizes) {
                p.x = total_main - p.x - s.width;
            }
        }
        Direction::TopDown | Direction::LeftRight => {}
    }
    placed
}
