/// A reusable integer index list: realizes filters without copying,
/// expresses dictionary decoding, and drives gather steps in the sort.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SelIndex {
    idx: Vec<u32>,
}

impl SelIndex {
    pub fn new() -> Self {
        SelIndex::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        SelIndex {
            idx: Vec::with_capacity(n),
        }
    }

    pub fn identity(n: usize) -> Self {
        SelIndex {
            idx: (0..n as u32).collect(),
        }
    }

    pub fn from_vec(idx: Vec<u32>) -> Self {
        SelIndex { idx }
    }

    pub fn push(&mut self, i: u32) {
        self.idx.push(i);
    }

    pub fn clear(&mut self) {
        self.idx.clear();
    }

    pub fn len(&self) -> usize {
        self.idx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idx.is_empty()
    }

    pub fn get(&self, i: usize) -> usize {
        self.idx[i] as usize
    }

    pub fn as_slice(&self) -> &[u32] {
        &self.idx
    }
}
