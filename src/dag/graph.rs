// src/dag/graph.rs

use petgraph::algo::tarjan_scc;
use petgraph::graphmap::DiGraphMap;

use crate::types::TaskName;

/// Find every cycle in an alias graph, for load-time validation.
///
/// `edges` yields `(alias, members)` pairs. Each returned entry is the sorted
/// list of task names forming one strongly connected component that contains
/// a cycle (including a single alias that lists itself). Components are
/// returned in a stable order.
pub fn alias_cycles<'a, I, M>(edges: I) -> Vec<Vec<TaskName>>
where
    I: IntoIterator<Item = (&'a str, M)>,
    M: IntoIterator<Item = &'a str>,
{
    // Edge direction: alias -> member.
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();
    for (alias, members) in edges {
        graph.add_node(alias);
        for member in members {
            graph.add_edge(alias, member, ());
        }
    }

    let mut cycles: Vec<Vec<TaskName>> = tarjan_scc(&graph)
        .into_iter()
        .filter(|scc| scc.len() > 1 || graph.contains_edge(scc[0], scc[0]))
        .map(|scc| {
            let mut names: Vec<TaskName> = scc.into_iter().map(str::to_string).collect();
            names.sort();
            names
        })
        .collect();
    cycles.sort();
    cycles
}
