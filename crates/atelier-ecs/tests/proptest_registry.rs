//! Property tests for the entity registry.
//!
//! These tests use `proptest` to generate random sequences of registry
//! operations and verify that the name/id bijection, the free-list recycling
//! policy, and the tag index stay consistent after each step.

use std::collections::HashSet;

use atelier_ecs::prelude::*;
use proptest::prelude::*;

/// Operations we can perform on the registry.
#[derive(Debug, Clone)]
enum RegistryOp {
    Create(u8),
    Remove(u8),
    Tag(u8, u8),
    PrefixQuery(u8),
    TagQuery(u8),
}

fn registry_op_strategy() -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        (0..40u8).prop_map(RegistryOp::Create),
        (0..40u8).prop_map(RegistryOp::Remove),
        (0..40u8, 0..6u8).prop_map(|(n, t)| RegistryOp::Tag(n, t)),
        (0..40u8).prop_map(RegistryOp::PrefixQuery),
        (0..6u8).prop_map(RegistryOp::TagQuery),
    ]
}

fn entity_name(n: u8) -> String {
    format!("entity{n:02}")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(512))]

    #[test]
    fn registry_random_ops_preserve_invariants(
        ops in prop::collection::vec(registry_op_strategy(), 1..60)
    ) {
        let registry = EntityRegistry::new();
        let mut alive: HashSet<String> = HashSet::new();
        let mut freed: Vec<i32> = Vec::new();

        for op in ops {
            match op {
                RegistryOp::Create(n) => {
                    let name = entity_name(n);
                    let id = registry.create(&name, false);
                    if alive.contains(&name) {
                        prop_assert_eq!(id, NO_ENTITY);
                    } else {
                        prop_assert_ne!(id, NO_ENTITY);
                        // Freed ids are reissued FIFO before any fresh id.
                        if let Some(expected) = freed.first().copied() {
                            prop_assert_eq!(id, expected);
                            freed.remove(0);
                        }
                        alive.insert(name);
                    }
                }
                RegistryOp::Remove(n) => {
                    let name = entity_name(n);
                    let id = registry.id_of(&name);
                    registry.remove(&name);
                    if alive.remove(&name) {
                        prop_assert_ne!(id, NO_ENTITY);
                        freed.push(id);
                        prop_assert_eq!(registry.id_of(&name), NO_ENTITY);
                    }
                }
                RegistryOp::Tag(n, t) => {
                    let id = registry.id_of(&entity_name(n));
                    if id != NO_ENTITY {
                        let tag = format!("tag{t}");
                        registry.add_tag(id, &tag);
                        prop_assert!(registry.has_tag(id, &tag));
                    }
                }
                RegistryOp::PrefixQuery(n) => {
                    let prefix = entity_name(n);
                    let hits = registry.entities(&prefix, true);
                    for id in hits {
                        prop_assert!(registry.name_of(id).starts_with(&prefix));
                    }
                }
                RegistryOp::TagQuery(t) => {
                    let tag = format!("tag{t}");
                    for id in registry.entities(&tag, false) {
                        prop_assert!(registry.has_tag(id, &tag));
                    }
                }
            }

            // Bijection: every live name resolves, and resolves back.
            for name in &alive {
                let id = registry.id_of(name);
                prop_assert_ne!(id, NO_ENTITY);
                prop_assert_eq!(registry.name_of(id), name.clone());
            }
            prop_assert_eq!(registry.names().len(), alive.len());

            // The full scan sees exactly the live population.
            prop_assert_eq!(registry.entities("", true).len(), alive.len());
        }
    }

    #[test]
    fn recycled_ids_never_collide(removals in prop::collection::vec(0..20u8, 1..20)) {
        let registry = EntityRegistry::new();
        for n in 0..20u8 {
            registry.create(&entity_name(n), false);
        }
        for n in removals {
            registry.remove(&entity_name(n));
        }
        // Refill with fresh names; ids must stay unique across the registry.
        for n in 0..20u8 {
            registry.create(&format!("refill{n:02}"), false);
        }
        let ids = registry.entities("", true);
        let unique: HashSet<i32> = ids.iter().copied().collect();
        prop_assert_eq!(unique.len(), ids.len());
    }
}
