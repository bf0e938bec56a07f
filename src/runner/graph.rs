//! Orders a suite's tests along their `response_from` edges.
//!
//! Planning happens once, before any request is sent. Tests that cannot run at
//! all (duplicate names, unknown targets, cycles) are returned as rejections so
//! the orchestrator can record them without touching the network.

use std::collections::{BTreeSet, HashMap, VecDeque};

use crate::errors::SpecError;
use crate::suite::{TestEntry, TestSuite};

/// The execution order of runnable tests plus the tests rejected up front.
///
/// Both hold indices into `TestSuite::tests`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionPlan {
    pub order: Vec<usize>,
    pub rejected: Vec<(usize, SpecError)>,
}

impl ExecutionPlan {
    pub fn build(suite: &TestSuite) -> Self {
        let mut plan = ExecutionPlan::default();
        let mut index_of: HashMap<&str, usize> = HashMap::new();
        let mut runnable = vec![false; suite.tests.len()];

        for (index, entry) in suite.tests.iter().enumerate() {
            let name = entry.name();
            if index_of.contains_key(name) {
                plan.rejected.push((
                    index,
                    SpecError::DuplicateTest {
                        name: name.to_string(),
                    },
                ));
                continue;
            }
            index_of.insert(name, index);
            match entry {
                TestEntry::Ready(_) => runnable[index] = true,
                TestEntry::Invalid { error, .. } => plan.rejected.push((index, error.clone())),
            }
        }

        // Edges point from a test to the tests it reads from.
        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); suite.tests.len()];
        for (index, entry) in suite.tests.iter().enumerate() {
            let Some(case) = entry.as_case().filter(|_| runnable[index]) else {
                continue;
            };
            for target in case.dependencies() {
                match index_of.get(target.as_str()) {
                    Some(&dependency) => edges[index].push(dependency),
                    None => {
                        runnable[index] = false;
                        plan.rejected.push((index, SpecError::MissingDependency { target }));
                        break;
                    }
                }
            }
        }

        for component in find_cycles(&edges, &runnable) {
            for &index in &component {
                let cycle = cycle_path(&edges, &component, index)
                    .into_iter()
                    .map(|member| suite.tests[member].name().to_string())
                    .collect();
                plan.rejected.push((index, SpecError::CyclicDependency { cycle }));
            }
            for &index in &component {
                runnable[index] = false;
            }
        }

        plan.order = topological_order(&edges, &runnable);
        plan.rejected.sort_by_key(|(index, _)| *index);
        plan
    }

    pub fn is_rejected(&self, index: usize) -> Option<&SpecError> {
        self.rejected
            .iter()
            .find(|(rejected, _)| *rejected == index)
            .map(|(_, error)| error)
    }
}

/// The shortest `response_from` chain from `start` back to itself, staying
/// inside `component`. Closed: the first and last entries are both `start`.
fn cycle_path(edges: &[Vec<usize>], component: &[usize], start: usize) -> Vec<usize> {
    let mut came_from: HashMap<usize, usize> = HashMap::new();
    let mut queue = VecDeque::from([start]);

    while let Some(node) = queue.pop_front() {
        for &next in &edges[node] {
            if next == start {
                let mut path = vec![start];
                let mut at = node;
                while at != start {
                    path.push(at);
                    match came_from.get(&at) {
                        Some(&previous) => at = previous,
                        None => break,
                    }
                }
                path[1..].reverse();
                path.push(start);
                return path;
            }
            if component.contains(&next) && !came_from.contains_key(&next) {
                came_from.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    vec![start, start]
}

// ============================================================================
// CYCLE DETECTION (Tarjan)
// ============================================================================

/// Strongly connected components that form a cycle: more than one member, or a
/// single test that reads from itself. Members are in declaration order.
///
/// Iterative, so a long `response_from` chain cannot exhaust the call stack.
fn find_cycles(edges: &[Vec<usize>], active: &[bool]) -> Vec<Vec<usize>> {
    let count = edges.len();
    let mut counter = 0;
    let mut index: Vec<Option<usize>> = vec![None; count];
    let mut lowlink = vec![0; count];
    let mut on_stack = vec![false; count];
    let mut stack = Vec::new();
    let mut cycles = Vec::new();

    for root in (0..count).filter(|&node| active[node]) {
        if index[root].is_some() {
            continue;
        }
        // Each frame is a node plus the position of the next edge to follow.
        let mut frames = vec![(root, 0usize)];
        index[root] = Some(counter);
        lowlink[root] = counter;
        counter += 1;
        stack.push(root);
        on_stack[root] = true;

        while let Some(frame) = frames.last_mut() {
            let (node, position) = *frame;
            if let Some(&next) = edges[node].get(position) {
                frame.1 += 1;
                if !active[next] {
                    continue;
                }
                match index[next] {
                    None => {
                        index[next] = Some(counter);
                        lowlink[next] = counter;
                        counter += 1;
                        stack.push(next);
                        on_stack[next] = true;
                        frames.push((next, 0));
                    }
                    Some(next_index) if on_stack[next] => {
                        lowlink[node] = lowlink[node].min(next_index);
                    }
                    Some(_) => {}
                }
                continue;
            }

            frames.pop();
            if let Some(&(parent, _)) = frames.last() {
                lowlink[parent] = lowlink[parent].min(lowlink[node]);
            }
            if Some(lowlink[node]) != index[node] {
                continue;
            }
            let mut component = Vec::new();
            while let Some(member) = stack.pop() {
                on_stack[member] = false;
                component.push(member);
                if member == node {
                    break;
                }
            }
            let self_loop = component.len() == 1 && edges[node].contains(&node);
            if component.len() > 1 || self_loop {
                component.sort_unstable();
                cycles.push(component);
            }
        }
    }

    cycles.sort_by_key(|cycle| cycle[0]);
    cycles
}

// ============================================================================
// ORDERING (Kahn)
// ============================================================================

/// Kahn's algorithm over the runnable tests; ties go to the earliest declared.
/// Edges into non-runnable tests are ignored here: their dependents run and
/// fail on the unsatisfied dependency.
fn topological_order(edges: &[Vec<usize>], runnable: &[bool]) -> Vec<usize> {
    let mut pending = vec![0usize; edges.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); edges.len()];
    for (node, targets) in edges.iter().enumerate() {
        if !runnable[node] {
            continue;
        }
        let mut seen = BTreeSet::new();
        for &target in targets.iter().filter(|&&target| runnable[target]) {
            if seen.insert(target) {
                pending[node] += 1;
                dependents[target].push(node);
            }
        }
    }

    let mut ready: BTreeSet<usize> = (0..edges.len())
        .filter(|&node| runnable[node] && pending[node] == 0)
        .collect();
    let mut order = Vec::with_capacity(ready.len());
    while let Some(node) = ready.pop_first() {
        order.push(node);
        for &dependent in &dependents[node] {
            pending[dependent] -= 1;
            if pending[dependent] == 0 {
                ready.insert(dependent);
            }
        }
    }
    order
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::suite::parse_str;

    fn test(name: &str, reads_from: &[&str]) -> String {
        let params: String = reads_from
            .iter()
            .enumerate()
            .map(|(i, target)| {
                format!("        p{i}: {{response_from: {{name: \"{target}\", key: id}}}}\n")
            })
            .collect();
        let params = if params.is_empty() {
            String::new()
        } else {
            format!("      params:\n{params}")
        };
        format!(
            "  - name: \"{name}\"\n    request:\n      method: GET\n      \
             endpoint: \"https://api.example.test\"\n{params}    expected: {{status: 200}}\n"
        )
    }

    fn plan(tests: &[String]) -> (TestSuite, ExecutionPlan) {
        let yaml = format!("tests:\n{}", tests.concat());
        let suite = parse_str(&yaml).unwrap();
        let plan = ExecutionPlan::build(&suite);
        (suite, plan)
    }

    #[test]
    fn independent_tests_keep_declaration_order() {
        let (_, plan) = plan(&[test("a", &[]), test("b", &[]), test("c", &[])]);
        assert_eq!(plan.order, vec![0, 1, 2]);
        assert!(plan.rejected.is_empty());
    }

    #[test]
    fn dependencies_run_first() {
        let (_, plan) = plan(&[test("detail", &["list"]), test("other", &[]), test("list", &[])]);
        assert_eq!(plan.order, vec![1, 2, 0]);
    }

    #[test]
    fn cycles_reject_every_member() {
        let (_, plan) = plan(&[test("a", &["b"]), test("b", &["a"]), test("c", &[])]);
        assert_eq!(plan.order, vec![2]);
        assert_eq!(plan.rejected.len(), 2);
        match plan.is_rejected(0) {
            Some(SpecError::CyclicDependency { cycle }) => {
                assert_eq!(cycle, &vec!["a".to_string(), "b".to_string(), "a".to_string()])
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn longer_cycles_report_the_chain_they_follow() {
        // a reads from c, c from b, b from a.
        let (_, plan) = plan(&[
            test("a", &["c"]),
            test("b", &["a"]),
            test("c", &["b"]),
            test("d", &["a"]),
        ]);
        let chain = |index| match plan.is_rejected(index) {
            Some(SpecError::CyclicDependency { cycle }) => cycle.join(" -> "),
            other => panic!("expected a cycle, got {other:?}"),
        };
        assert_eq!(chain(0), "a -> c -> b -> a");
        assert_eq!(chain(1), "b -> a -> c -> b");
        assert_eq!(chain(2), "c -> b -> a -> c");
        // `d` only reads from the cycle, so it is planned and fails at runtime.
        assert_eq!(plan.order, vec![3]);
    }

    #[test]
    fn long_chains_plan_without_recursion() {
        let tests: Vec<String> = (0..5_000)
            .map(|i| {
                if i == 0 {
                    test("t0", &[])
                } else {
                    test(&format!("t{i}"), &[format!("t{}", i - 1).as_str()])
                }
            })
            .collect();
        let (_, plan) = plan(&tests);
        assert!(plan.rejected.is_empty());
        assert_eq!(plan.order, (0..5_000).collect::<Vec<_>>());
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let (_, plan) = plan(&[test("a", &["a"])]);
        assert!(plan.order.is_empty());
        assert!(matches!(
            plan.is_rejected(0),
            Some(SpecError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn unknown_target_is_a_missing_dependency() {
        let (_, plan) = plan(&[test("a", &["ghost"]), test("b", &["a"])]);
        assert!(matches!(
            plan.is_rejected(0),
            Some(SpecError::MissingDependency { target }) if target == "ghost"
        ));
        // `b` still runs and fails on its unsatisfied dependency.
        assert_eq!(plan.order, vec![1]);
    }

    #[test]
    fn duplicate_names_reject_the_later_test() {
        let (_, plan) = plan(&[test("a", &[]), test("a", &[])]);
        assert_eq!(plan.order, vec![0]);
        assert!(matches!(
            plan.is_rejected(1),
            Some(SpecError::DuplicateTest { .. })
        ));
    }
}
