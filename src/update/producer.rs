use super::{UpdateCommand, UpdateError, UpdateTranslator};
use crate::state::EntityStateEntry;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

/// Source of the ordered commands for one update run.
pub trait CommandProducer: Send + Sync {
    fn produce_commands(
        &self,
        translator: &UpdateTranslator,
    ) -> Result<Vec<Arc<dyn UpdateCommand>>, UpdateError>;
}

impl<F> CommandProducer for F
where
    F: Fn(&UpdateTranslator) -> Result<Vec<Arc<dyn UpdateCommand>>, UpdateError> + Send + Sync,
{
    fn produce_commands(
        &self,
        translator: &UpdateTranslator,
    ) -> Result<Vec<Arc<dyn UpdateCommand>>, UpdateError> {
        self(translator)
    }
}

/// Producer that hands out its commands so that every producer of an
/// identifier runs before every consumer of it.
#[derive(Default)]
pub struct OrderedCommandProducer {
    commands: Vec<Arc<dyn UpdateCommand>>,
}

impl OrderedCommandProducer {
    pub fn new(commands: Vec<Arc<dyn UpdateCommand>>) -> Self {
        Self { commands }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

impl CommandProducer for OrderedCommandProducer {
    fn produce_commands(
        &self,
        translator: &UpdateTranslator,
    ) -> Result<Vec<Arc<dyn UpdateCommand>>, UpdateError> {
        order_commands(&self.commands, translator)
    }
}

/// Topologically sort `commands` by identifier dependencies.
///
/// Independent commands keep their relative order.
pub fn order_commands(
    commands: &[Arc<dyn UpdateCommand>],
    translator: &UpdateTranslator,
) -> Result<Vec<Arc<dyn UpdateCommand>>, UpdateError> {
    let mut producers: HashMap<_, Vec<usize>> = HashMap::new();
    for (idx, command) in commands.iter().enumerate() {
        for id in command.output_identifiers() {
            producers.entry(id).or_default().push(idx);
        }
    }

    let mut edges: HashSet<(usize, usize)> = HashSet::new();
    for (consumer, command) in commands.iter().enumerate() {
        for id in command.input_identifiers() {
            for &producer in producers.get(&id).into_iter().flatten() {
                if producer != consumer {
                    edges.insert((producer, consumer));
                }
            }
        }
    }

    let mut in_degree = vec![0usize; commands.len()];
    let mut successors: Vec<Vec<usize>> = vec![Vec::new(); commands.len()];
    for &(from, to) in &edges {
        in_degree[to] += 1;
        successors[from].push(to);
    }

    let mut ready: BTreeSet<usize> = (0..commands.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut ordered = Vec::with_capacity(commands.len());
    while let Some(idx) = ready.pop_first() {
        ordered.push(commands[idx].clone());
        for &next in &successors[idx] {
            in_degree[next] -= 1;
            if in_degree[next] == 0 {
                ready.insert(next);
            }
        }
    }

    if ordered.len() < commands.len() {
        let blocked = cycle_members(&in_degree, &successors);
        let mut state_entries: Vec<Arc<EntityStateEntry>> = Vec::new();
        for (idx, command) in commands.iter().enumerate() {
            if blocked[idx] {
                for entry in command.state_entries(translator) {
                    if !state_entries.iter().any(|seen| Arc::ptr_eq(seen, &entry)) {
                        state_entries.push(entry);
                    }
                }
            }
        }
        return Err(UpdateError::DependencyCycle { state_entries });
    }

    Ok(ordered)
}

/// Narrow the commands left unordered to the ones on a cycle.
///
/// Whatever survives the forward pass is either on a cycle or downstream of
/// one; peeling commands with no unordered successor drops the downstream
/// tail. A command chained between two cycles stays in the result.
fn cycle_members(in_degree: &[usize], successors: &[Vec<usize>]) -> Vec<bool> {
    let mut blocked: Vec<bool> = in_degree.iter().map(|&d| d > 0).collect();
    let mut out_degree = vec![0usize; blocked.len()];
    let mut predecessors: Vec<Vec<usize>> = vec![Vec::new(); blocked.len()];
    for (from, nexts) in successors.iter().enumerate() {
        for &to in nexts {
            if blocked[from] && blocked[to] {
                out_degree[from] += 1;
                predecessors[to].push(from);
            }
        }
    }

    let mut sinks: Vec<usize> = (0..blocked.len())
        .filter(|&i| blocked[i] && out_degree[i] == 0)
        .collect();
    while let Some(idx) = sinks.pop() {
        blocked[idx] = false;
        for &prev in &predecessors[idx] {
            out_degree[prev] -= 1;
            if out_degree[prev] == 0 {
                sinks.push(prev);
            }
        }
    }
    blocked
}
