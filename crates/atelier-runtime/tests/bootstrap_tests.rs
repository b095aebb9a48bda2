//! On-disk bootstrap tests: entity rosters, component schemas, subscription
//! wiring, and saving subscriptions back out.

use std::fs;
use std::path::Path;

use atelier_ecs::prelude::*;
use atelier_runtime::prelude::*;
use serde_json::json;
use tempfile::TempDir;

struct Roots {
    _dir: TempDir,
    entities: std::path::PathBuf,
    components: std::path::PathBuf,
    subscriptions: std::path::PathBuf,
}

fn roots() -> Roots {
    let dir = tempfile::tempdir().unwrap();
    let entities = dir.path().join("entities");
    let components = dir.path().join("components");
    let subscriptions = dir.path().join("subscriptions");
    for path in [&entities, &components, &subscriptions] {
        fs::create_dir_all(path).unwrap();
    }
    Roots {
        entities,
        components,
        subscriptions,
        _dir: dir,
    }
}

fn write_json(dir: &Path, file: &str, doc: serde_json::Value) {
    fs::write(dir.join(file), serde_json::to_string_pretty(&doc).unwrap()).unwrap();
}

/// Standard fixture: five generated enemies, one boss, one hero; HP and
/// Position schemas.
fn seed(roots: &Roots) {
    write_json(
        &roots.entities,
        "enemies.json",
        json!({ "name": "enemy", "generate": 5, "tags": ["hostile"] }),
    );
    write_json(&roots.entities, "boss.json", json!({ "name": "boss0", "tags": ["hostile"] }));
    write_json(&roots.entities, "hero.json", json!({ "name": "hero", "tags": ["player"] }));

    write_json(
        &roots.components,
        "hp.json",
        json!({ "name": "HP", "data": { "hp": "int" } }),
    );
    write_json(
        &roots.components,
        "position.json",
        json!({ "name": "Position", "data": { "pos": "vector2", "facing": "vector3" } }),
    );
}

#[test]
fn generated_prefix_subscription_reaches_generated_entities_only() {
    let roots = roots();
    seed(&roots);
    write_json(
        &roots.subscriptions,
        "enemy_hp.json",
        json!({
            "entity": "enemy",
            "generated": true,
            "components": [ { "name": "HP", "data": { "hp": 10 } } ]
        }),
    );

    let env = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);

    for i in 0..5 {
        let name = format!("enemy{i}");
        assert!(env.has_component(name.as_str(), "HP"), "{name} should have HP");
        assert_eq!(env.component(name.as_str(), "HP").unwrap().get::<i32>("hp"), 10);
    }
    assert!(!env.has_component("boss0", "HP"));
    assert!(!env.has_component("hero", "HP"));
}

#[test]
fn tag_selector_subscribes_the_tag_union() {
    let roots = roots();
    seed(&roots);
    write_json(
        &roots.subscriptions,
        "hostiles.json",
        json!({
            "tags": ["hostile"],
            "components": [ { "name": "HP", "data": { "hp": 3 } } ]
        }),
    );

    let env = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);

    assert!(env.has_component("boss0", "HP"));
    for i in 0..5 {
        assert!(env.has_component(format!("enemy{i}").as_str(), "HP"));
    }
    assert!(!env.has_component("hero", "HP"));
}

#[test]
fn single_entity_subscription_with_vector_values() {
    let roots = roots();
    seed(&roots);
    write_json(
        &roots.subscriptions,
        "hero.json",
        json!({
            "entity": "hero",
            "components": [ {
                "name": "Position",
                "data": { "pos": [1.5, -2.0], "facing": [0.0, 1.0, 0.0] }
            } ]
        }),
    );

    let env = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);

    let position = env.component("hero", "Position").unwrap();
    assert_eq!(position.get::<Vec2>("pos"), Vec2::new(1.5, -2.0));
    assert_eq!(position.get::<Vec3>("facing"), Vec3::new(0.0, 1.0, 0.0));
}

#[test]
fn state_false_subscribes_inactive() {
    let roots = roots();
    seed(&roots);
    write_json(
        &roots.subscriptions,
        "dormant.json",
        json!({
            "entity": "hero",
            "state": false,
            "components": [ { "name": "HP", "data": { "hp": 10 } } ]
        }),
    );

    let env = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);

    // Subscribed but invisible until reactivated.
    assert!(!env.has_component("hero", "HP"));
    assert!(!env.get_state("hero", "HP"));
    env.set_entity_state("hero", true, true);
    assert!(env.has_component("hero", "HP"));
    assert_eq!(env.component("hero", "HP").unwrap().get::<i32>("hp"), 10);
}

#[test]
fn unknown_entities_components_and_fields_are_skipped() {
    let roots = roots();
    seed(&roots);
    write_json(
        &roots.subscriptions,
        "ghost.json",
        json!({
            "entity": "ghost",
            "components": [ { "name": "HP", "data": { "hp": 1 } } ]
        }),
    );
    write_json(
        &roots.subscriptions,
        "odd.json",
        json!({
            "entity": "hero",
            "components": [
                { "name": "Mana", "data": { "mp": 5 } },
                { "name": "HP", "data": { "hp": 7, "shield": 3 } }
            ]
        }),
    );
    fs::write(roots.subscriptions.join("broken.json"), "{ not json").unwrap();

    let env = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);

    // The unknown entity and the unknown component vanish quietly; the
    // unknown field inside a known component is dropped on its own.
    assert_eq!(env.entity_id("ghost"), NO_ENTITY);
    assert!(env.manager_by_name("Mana").is_none());
    assert_eq!(env.component("hero", "HP").unwrap().get::<i32>("hp"), 7);
    assert_eq!(env.component("hero", "HP").unwrap().type_of("shield"), "");
}

#[test]
fn save_writes_active_components_with_current_values() {
    let roots = roots();
    seed(&roots);

    let env = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);
    let hero = env.entity_id("hero");
    env.manager_by_name("HP").unwrap().subscribe(hero);
    env.component("hero", "HP").unwrap().set("hp", Value::Int(42));

    env.save("hero").unwrap();

    let text = fs::read_to_string(roots.subscriptions.join("hero.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["entity"], "hero");
    let components = doc["components"].as_array().unwrap();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0]["name"], "HP");
    assert_eq!(components[0]["data"]["hp"], 42);
}

#[test]
fn save_overwrites_the_originating_file() {
    let roots = roots();
    seed(&roots);
    let nested = roots.subscriptions.join("nested");
    fs::create_dir_all(&nested).unwrap();
    write_json(
        &nested,
        "hero_loadout.json",
        json!({
            "entity": "hero",
            "components": [ { "name": "HP", "data": { "hp": 10 } } ]
        }),
    );

    let env = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);
    env.component("hero", "HP").unwrap().set("hp", Value::Int(5));
    env.save("hero").unwrap();

    // The original (nested) file is updated in place, not duplicated at the
    // root.
    let text = fs::read_to_string(nested.join("hero_loadout.json")).unwrap();
    assert!(text.contains("\"hp\": 5"));
    assert!(!roots.subscriptions.join("hero.json").exists());
}

#[test]
fn saved_subscription_reloads_identically() {
    let roots = roots();
    seed(&roots);

    let env = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);
    let hero = env.entity_id("hero");
    env.manager_by_name("Position").unwrap().subscribe(hero);
    let position = env.component("hero", "Position").unwrap();
    position.set("pos", Value::Vec2(Vec2::new(4.0, 8.0)));
    env.save("hero").unwrap();

    // A fresh environment built from the same roots picks the save up.
    let env2 = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);
    assert_eq!(
        env2.component("hero", "Position").unwrap().get::<Vec2>("pos"),
        Vec2::new(4.0, 8.0)
    );
}

#[test]
fn save_of_unknown_entity_fails() {
    let roots = roots();
    seed(&roots);
    let env = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);
    assert!(matches!(
        env.save("nobody"),
        Err(EcsError::NoSuchEntity { .. })
    ));
}

#[test]
fn entity_files_created_on_demand_land_in_the_roster() {
    let roots = roots();
    seed(&roots);
    let env = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);

    env.create_entity("latecomer", true, true);
    let text = fs::read_to_string(roots.entities.join("latecomer.json")).unwrap();
    let doc: serde_json::Value = serde_json::from_str(&text).unwrap();
    assert_eq!(doc["name"], "latecomer");

    // A rebuilt environment includes the new roster entry.
    let env2 = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);
    assert_ne!(env2.entity_id("latecomer"), NO_ENTITY);
}

#[test]
fn malformed_component_schema_is_skipped() {
    let roots = roots();
    seed(&roots);
    fs::write(roots.components.join("broken.json"), "nope").unwrap();
    write_json(&roots.components, "incomplete.json", json!({ "data": { "x": "int" } }));

    let env = Environment::from_dirs(&roots.entities, &roots.components, &roots.subscriptions);
    // The good schemas made it in regardless.
    assert!(env.manager_by_name("HP").is_some());
    assert!(env.manager_by_name("Position").is_some());
    assert_eq!(env.managers().len(), 2);
}
