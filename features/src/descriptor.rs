use pano_core::KeyPoint;

#[derive(Debug, Clone)]
pub struct Descriptor {
    pub data: Vec<f32>,
    pub keypoint: KeyPoint,
}

impl Descriptor {
    pub fn distance_sq(&self, other: &Descriptor) -> f64 {
        self.data
            .iter()
            .zip(other.data.iter())
            .map(|(a, b)| {
                let d = (a - b) as f64;
                d * d
            })
            .sum()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Descriptors {
    pub descriptors: Vec<Descriptor>,
}

impl Descriptors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    pub fn push(&mut self, d: Descriptor) {
        self.descriptors.push(d);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Descriptor> {
        self.descriptors.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, Descriptor> {
        self.descriptors.iter_mut()
    }
}
