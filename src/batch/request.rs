use super::MutationGroup;
use serde::{Deserialize, Serialize};

/// Scheduling priority hint forwarded to the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    #[default]
    Unspecified,
    Low,
    Medium,
    High,
}

/// Request-level settings carried alongside the groups.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWriteOptions {
    #[serde(default)]
    pub priority: Priority,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub request_tag: Option<String>,
    /// Keep these writes out of change streams that opted into exclusion
    #[serde(default)]
    pub exclude_txn_from_change_streams: bool,
}

/// Wire-level batch write request: one entry per mutation group, in the
/// order the groups were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchWriteRequest {
    pub mutation_groups: Vec<MutationGroup>,
    #[serde(flatten)]
    pub options: BatchWriteOptions,
}

impl BatchWriteRequest {
    pub fn group_count(&self) -> usize {
        self.mutation_groups.len()
    }

    pub fn mutation_count(&self) -> usize {
        self.mutation_groups.iter().map(MutationGroup::len).sum()
    }
}

/// Assembles a [`BatchWriteRequest`] from accumulated groups.
#[derive(Debug, Default)]
pub struct BatchRequestBuilder {
    groups: Vec<MutationGroup>,
    options: BatchWriteOptions,
}

impl BatchRequestBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_groups(groups: &[MutationGroup]) -> Self {
        Self::new().groups(groups.iter().cloned())
    }

    pub fn group(mut self, group: MutationGroup) -> Self {
        self.groups.push(group);
        self
    }

    pub fn groups<I>(mut self, groups: I) -> Self
    where
        I: IntoIterator<Item = MutationGroup>,
    {
        self.groups.extend(groups);
        self
    }

    pub fn options(mut self, options: BatchWriteOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> BatchWriteRequest {
        BatchWriteRequest {
            mutation_groups: self.groups,
            options: self.options,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Value;
    use crate::mutation::{KeySet, Mutation, Write};

    fn insert(key: &str) -> Mutation {
        Mutation::insert(Write::new("T", ["k"]).row([Value::from(key)]))
    }

    #[test]
    fn test_build_preserves_group_boundaries_and_order() {
        let g1 = MutationGroup::new(vec![insert("a"), insert("b")]);
        let g2 = MutationGroup::new(vec![Mutation::delete("T", KeySet::key("c"))]);
        let g3 = MutationGroup::default();

        let request = BatchRequestBuilder::from_groups(&[g1.clone(), g2.clone(), g3]).build();

        assert_eq!(request.group_count(), 3);
        assert_eq!(request.mutation_count(), 3);
        assert_eq!(request.mutation_groups[0], g1);
        assert_eq!(request.mutation_groups[1], g2);
        assert!(request.mutation_groups[2].is_empty());
    }

    #[test]
    fn test_options_are_carried() {
        let options = BatchWriteOptions {
            priority: Priority::Low,
            request_tag: Some("nightly".into()),
            exclude_txn_from_change_streams: true,
        };
        let request = BatchRequestBuilder::new()
            .group(MutationGroup::new(vec![insert("a")]))
            .options(options.clone())
            .build();

        assert_eq!(request.options, options);
    }

    #[test]
    fn test_request_serializes_flat() {
        let request = BatchRequestBuilder::new()
            .group(MutationGroup::new(vec![insert("a")]))
            .build();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["priority"], "unspecified");
        assert_eq!(json["mutation_groups"][0][0]["insert"]["table"], "T");
    }
}
