use crate::mutation::Mutation;
use serde::{Deserialize, Serialize};

/// Mutations the store must apply atomically as one unit.
///
/// The group owns a materialized copy of the caller's mutations, so changes
/// to the source collection after `add` have no effect on the batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MutationGroup {
    mutations: Vec<Mutation>,
}

impl MutationGroup {
    pub fn new(mutations: Vec<Mutation>) -> Self {
        Self { mutations }
    }

    pub fn mutations(&self) -> &[Mutation] {
        &self.mutations
    }

    pub fn len(&self) -> usize {
        self.mutations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mutations.is_empty()
    }

    pub fn into_mutations(self) -> Vec<Mutation> {
        self.mutations
    }
}

impl FromIterator<Mutation> for MutationGroup {
    fn from_iter<I: IntoIterator<Item = Mutation>>(iter: I) -> Self {
        Self {
            mutations: iter.into_iter().collect(),
        }
    }
}

impl From<Vec<Mutation>> for MutationGroup {
    fn from(mutations: Vec<Mutation>) -> Self {
        Self { mutations }
    }
}

impl From<&[Mutation]> for MutationGroup {
    fn from(mutations: &[Mutation]) -> Self {
        Self {
            mutations: mutations.to_vec(),
        }
    }
}

impl<'a> IntoIterator for &'a MutationGroup {
    type Item = &'a Mutation;
    type IntoIter = std::slice::Iter<'a, Mutation>;

    fn into_iter(self) -> Self::IntoIter {
        self.mutations.iter()
    }
}
