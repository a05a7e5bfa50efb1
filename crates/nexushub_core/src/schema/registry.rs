//! Lookup table of every built-in entity descriptor.

use crate::domain::{
    activity, comment, company, contact, custom_field, deal, notification, project, task, team,
};
use crate::schema::EntitySchema;

static ALL: [&EntitySchema; 10] = [
    &company::SCHEMA,
    &contact::SCHEMA,
    &deal::SCHEMA,
    &activity::SCHEMA,
    &project::SCHEMA,
    &task::SCHEMA,
    &team::SCHEMA,
    &notification::SCHEMA,
    &comment::SCHEMA,
    &custom_field::SCHEMA,
];

/// All built-in descriptors in a stable order.
pub fn all() -> &'static [&'static EntitySchema] {
    &ALL
}

/// Finds a descriptor by entity name, case-insensitively.
pub fn lookup(entity: &str) -> Option<&'static EntitySchema> {
    let entity = entity.trim();
    ALL.iter()
        .copied()
        .find(|schema| schema.entity.eq_ignore_ascii_case(entity))
}

#[cfg(test)]
mod tests {
    use super::{all, lookup};
    use std::collections::HashSet;

    #[test]
    fn every_descriptor_is_consistent() {
        for schema in all() {
            assert_eq!(schema.check(), Ok(()), "entity {}", schema.entity);
        }
    }

    #[test]
    fn entity_names_are_unique() {
        let names: HashSet<_> = all().iter().map(|schema| schema.entity).collect();
        assert_eq!(names.len(), all().len());
    }

    #[test]
    fn lookup_ignores_case_and_whitespace() {
        assert_eq!(lookup(" Company ").map(|schema| schema.entity), Some("company"));
        assert!(lookup("invoice").is_none());
    }
}
