/// A correspondence between a feature of the query image and a feature of
/// the train image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureMatch {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f64,
}

impl FeatureMatch {
    pub fn new(query_idx: usize, train_idx: usize, distance: f64) -> Self {
        Self {
            query_idx,
            train_idx,
            distance,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Matches {
    pub matches: Vec<FeatureMatch>,
}

impl Matches {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            matches: Vec::with_capacity(cap),
        }
    }

    pub fn push(&mut self, m: FeatureMatch) {
        self.matches.push(m);
    }

    pub fn len(&self) -> usize {
        self.matches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.matches.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, FeatureMatch> {
        self.matches.iter()
    }

    /// The same correspondences with query and train roles swapped.
    pub fn reversed(&self) -> Matches {
        Matches {
            matches: self
                .matches
                .iter()
                .map(|m| FeatureMatch::new(m.train_idx, m.query_idx, m.distance))
                .collect(),
        }
    }
}
