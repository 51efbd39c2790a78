//! Table layout helpers shared by CPTs and utility tables.
//!
//! Rows enumerate joint parent configurations with the last parent varying
//! fastest. A CPT row holds one probability per label of the child.

use crate::error::{Error, Result};

/// Tolerance for a CPT row to count as normalized.
pub const ROW_TOLERANCE: f64 = 1e-6;

/// Number of joint configurations of the given cardinalities.
pub fn configurations(cards: &[usize]) -> usize {
    cards.iter().product()
}

/// Row index of a joint configuration.
pub fn config_index(cards: &[usize], states: &[usize]) -> usize {
    cards
        .iter()
        .zip(states)
        .fold(0, |acc, (card, state)| acc * card + state)
}

/// Joint configuration at a row index.
pub fn decode_config(mut index: usize, cards: &[usize]) -> Vec<usize> {
    let mut states = vec![0; cards.len()];
    for (slot, card) in states.iter_mut().zip(cards).rev() {
        *slot = index % card;
        index /= card;
    }
    states
}

/// Check a CPT for shape, entry range, and row sums.
pub fn validate_cpt(node: &str, values: &[f64], states: usize, rows: usize) -> Result<()> {
    let expected = states * rows;
    if values.len() != expected {
        return Err(Error::normalization(format!(
            "{node}: expected {expected} values ({rows} rows x {states} labels), got {}",
            values.len()
        )));
    }

    for (row, chunk) in values.chunks(states).enumerate() {
        if let Some(bad) = chunk
            .iter()
            .find(|v| !v.is_finite() || **v < 0.0 || **v > 1.0)
        {
            return Err(Error::normalization(format!(
                "{node}: row {row} has entry {bad} outside [0, 1]"
            )));
        }
        let sum: f64 = chunk.iter().sum();
        if (sum - 1.0).abs() > ROW_TOLERANCE {
            return Err(Error::normalization(format!(
                "{node}: row {row} sums to {sum}"
            )));
        }
    }
    Ok(())
}

/// Check a utility table for shape and finiteness.
pub fn validate_utility(node: &str, values: &[f64], rows: usize) -> Result<()> {
    if values.len() != rows {
        return Err(Error::normalization(format!(
            "{node}: expected {rows} utilities, got {}",
            values.len()
        )));
    }
    if let Some(pos) = values.iter().position(|v| !v.is_finite()) {
        return Err(Error::normalization(format!(
            "{node}: utility at row {pos} is not finite"
        )));
    }
    Ok(())
}

/// Rescale each row to sum to one.
pub fn normalize_rows(values: &mut [f64], states: usize) {
    for chunk in values.chunks_mut(states) {
        let sum: f64 = chunk.iter().sum();
        if sum > 0.0 {
            chunk.iter_mut().for_each(|v| *v /= sum);
        }
    }
}
