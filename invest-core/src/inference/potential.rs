//! Dense potentials over discrete variables.

/// Non-negative table over a sorted set of variables.
///
/// Values are row-major with the last variable varying fastest.
#[derive(Debug, Clone, PartialEq)]
pub struct Potential {
    vars: Vec<usize>,
    cards: Vec<usize>,
    values: Vec<f64>,
}

impl Potential {
    /// The constant 1 over no variables.
    pub fn unit() -> Self {
        Self {
            vars: Vec::new(),
            cards: Vec::new(),
            values: vec![1.0],
        }
    }

    /// All-ones potential. `vars` must be sorted and distinct.
    pub fn ones(vars: &[usize], cards: &[usize]) -> Self {
        let size = cards.iter().product();
        Self {
            vars: vars.to_vec(),
            cards: cards.to_vec(),
            values: vec![1.0; size],
        }
    }

    /// Build from a table laid out over `layout` (any order, last fastest).
    pub fn from_layout(layout: &[usize], cards: &[usize], values: &[f64]) -> Self {
        let source = Self {
            vars: layout.to_vec(),
            cards: cards.to_vec(),
            values: values.to_vec(),
        };
        let mut order: Vec<usize> = (0..layout.len()).collect();
        order.sort_by_key(|&i| layout[i]);
        let vars: Vec<usize> = order.iter().map(|&i| layout[i]).collect();
        let sorted_cards: Vec<usize> = order.iter().map(|&i| cards[i]).collect();

        let map = source.index_map(&vars, &sorted_cards);
        Self {
            values: map.iter().map(|&j| source.values[j]).collect(),
            vars,
            cards: sorted_cards,
        }
    }

    /// Indicator of `var == state`.
    pub fn indicator(var: usize, card: usize, state: usize) -> Self {
        let mut values = vec![0.0; card];
        values[state] = 1.0;
        Self {
            vars: vec![var],
            cards: vec![card],
            values,
        }
    }

    /// Likelihood vector over a single variable.
    pub fn likelihood(var: usize, weights: &[f64]) -> Self {
        Self {
            vars: vec![var],
            cards: vec![weights.len()],
            values: weights.to_vec(),
        }
    }

    /// Uniform distribution over a single variable.
    pub fn uniform(var: usize, card: usize) -> Self {
        Self {
            vars: vec![var],
            cards: vec![card],
            values: vec![1.0 / card as f64; card],
        }
    }

    pub fn vars(&self) -> &[usize] {
        &self.vars
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn total(&self) -> f64 {
        self.values.iter().sum()
    }

    /// Cardinality of a variable in scope.
    pub fn card_of(&self, var: usize) -> Option<usize> {
        self.vars
            .iter()
            .position(|v| *v == var)
            .map(|i| self.cards[i])
    }

    /// Pointwise product over the union of both scopes.
    pub fn product(&self, other: &Potential) -> Potential {
        let mut vars = self.vars.clone();
        let mut cards = self.cards.clone();
        for (v, c) in other.vars.iter().zip(&other.cards) {
            if let Err(pos) = vars.binary_search(v) {
                vars.insert(pos, *v);
                cards.insert(pos, *c);
            }
        }
        let left = self.index_map(&vars, &cards);
        let right = other.index_map(&vars, &cards);
        let values = left
            .iter()
            .zip(&right)
            .map(|(&i, &j)| self.values[i] * other.values[j])
            .collect();
        Potential { vars, cards, values }
    }

    /// Sum out every variable not in `keep`.
    pub fn marginalize(&self, keep: &[usize]) -> Potential {
        let (vars, cards): (Vec<usize>, Vec<usize>) = self
            .vars
            .iter()
            .zip(&self.cards)
            .filter(|(v, _)| keep.contains(v))
            .map(|(v, c)| (*v, *c))
            .unzip();
        let mut out = Potential {
            values: vec![0.0; cards.iter().product()],
            vars,
            cards,
        };
        let map = out.index_map(&self.vars, &self.cards);
        for (i, &j) in map.iter().enumerate() {
            out.values[j] += self.values[i];
        }
        out
    }

    /// Values re-laid over `layout`, which must name exactly the scope.
    pub fn to_layout(&self, layout: &[usize]) -> Vec<f64> {
        let cards: Vec<usize> = layout
            .iter()
            .map(|v| self.card_of(*v).unwrap_or(1))
            .collect();
        let target = Potential {
            vars: layout.to_vec(),
            cards,
            values: Vec::new(),
        };
        let map = target.index_map(&self.vars, &self.cards);
        let mut out = vec![0.0; map.len()];
        for (i, &j) in map.iter().enumerate() {
            out[j] = self.values[i];
        }
        out
    }

    pub fn scale(&mut self, factor: f64) {
        self.values.iter_mut().for_each(|v| *v *= factor);
    }

    /// For each assignment of `target` (last fastest), the flat index of the
    /// matching entry in `self`. Variables of `self` missing from `target`
    /// are held at state 0.
    fn index_map(&self, target: &[usize], target_cards: &[usize]) -> Vec<usize> {
        let mut own_strides = vec![0; self.vars.len()];
        let mut stride = 1;
        for i in (0..self.vars.len()).rev() {
            own_strides[i] = stride;
            stride *= self.cards[i];
        }
        let strides: Vec<usize> = target
            .iter()
            .map(|v| {
                self.vars
                    .iter()
                    .position(|own| own == v)
                    .map_or(0, |i| own_strides[i])
            })
            .collect();

        let size: usize = target_cards.iter().product();
        let mut out = Vec::with_capacity(size);
        let mut counter = vec![0; target.len()];
        let mut index = 0;
        for _ in 0..size {
            out.push(index);
            for k in (0..target.len()).rev() {
                counter[k] += 1;
                index += strides[k];
                if counter[k] < target_cards[k] {
                    break;
                }
                index -= strides[k] * target_cards[k];
                counter[k] = 0;
            }
        }
        out
    }
}
