use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Kahn's algorithm over nodes `0..count`. Among nodes that are ready at the
/// same time the lowest index goes first, so an already valid order comes back
/// unchanged. Returns `None` when the edges form a cycle.
pub(crate) fn stable_topological_order(
    count: usize,
    edges: impl IntoIterator<Item = (usize, usize)>,
) -> Option<Vec<usize>> {
    let mut indegree = vec![0usize; count];
    let mut graph_edges: Vec<Vec<usize>> = vec![Vec::new(); count];

    for (from, to) in edges {
        if from == to || from >= count || to >= count || graph_edges[from].contains(&to) {
            continue;
        }
        graph_edges[from].push(to);
        indegree[to] += 1;
    }

    let mut ready: BinaryHeap<Reverse<usize>> = indegree
        .iter()
        .enumerate()
        .filter_map(|(idx, &deg)| if deg == 0 { Some(Reverse(idx)) } else { None })
        .collect();

    let mut order = Vec::with_capacity(count);
    while let Some(Reverse(n)) = ready.pop() {
        order.push(n);
        for &m in &graph_edges[n] {
            indegree[m] -= 1;
            if indegree[m] == 0 {
                ready.push(Reverse(m));
            }
        }
    }

    (order.len() == count).then_some(order)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keeps_a_valid_order() {
        let order = stable_topological_order(4, [(0, 1), (0, 2), (2, 3)]).expect("acyclic");
        assert_eq!(order, vec![0, 1, 2, 3]);
    }

    #[test]
    fn moves_only_what_must_move() {
        // 3 must precede 1; 2 stays where it was relative to the others.
        let order = stable_topological_order(4, [(3, 1)]).expect("acyclic");
        assert_eq!(order, vec![0, 2, 3, 1]);
    }

    #[test]
    fn reports_cycles() {
        assert!(stable_topological_order(3, [(0, 1), (1, 2), (2, 0)]).is_none());
    }

    #[test]
    fn ignores_self_edges_and_duplicates() {
        let order = stable_topological_order(2, [(1, 1), (1, 0), (1, 0)]).expect("acyclic");
        assert_eq!(order, vec![1, 0]);
    }
}
