//! Forward sampling of synthetic observation tables.

use rand::distributions::{Distribution, WeightedIndex};
use rand::Rng;

use crate::error::{Error, Result};
use crate::graph::{config_index, GraphModel, NodeKind};
use crate::learning::observations::ObservationTable;

/// Draw `rows` joint samples in topological order and record every chance
/// node. Decisions are drawn uniformly and left out of the table.
pub fn forward_sample<R: Rng>(
    model: &GraphModel,
    rows: usize,
    rng: &mut R,
) -> Result<ObservationTable> {
    let chance = model.chance_nodes();
    let mut table = ObservationTable::new(chance.iter().map(|id| model.node(*id).name()));
    let mut state = vec![0usize; model.len()];

    for _ in 0..rows {
        for id in model.topological_order() {
            let node = model.node(*id);
            match node.kind() {
                NodeKind::Utility => {}
                NodeKind::Decision => state[id.0] = rng.gen_range(0..node.cardinality()),
                NodeKind::Chance => {
                    let parents: Vec<usize> =
                        model.parents(*id).iter().map(|p| state[p.0]).collect();
                    let row = config_index(&model.parent_cards(*id), &parents);
                    let card = node.cardinality();
                    let table = model.cpt(*id).unwrap_or_default();
                    let weights = &table[row * card..(row + 1) * card];
                    let dist = WeightedIndex::new(weights).map_err(|e| {
                        Error::normalization(format!("{}: cannot sample row {row}: {e}", node.name()))
                    })?;
                    state[id.0] = dist.sample(rng);
                }
            }
        }
        let row = chance
            .iter()
            .map(|id| model.node(*id).domain().label(state[id.0]).map(str::to_string))
            .collect();
        table.push_row(row)?;
    }
    Ok(table)
}
