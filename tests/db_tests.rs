// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Models over a module's SQLite file, with the shared result cache.

mod common;

use common::User;
use trellis::config::ModuleConfig;
use trellis::db::{Condition, DbModel, Model, Order, Paginator, Row, SelectOptions};

fn pc_config(root: &std::path::Path) -> ModuleConfig {
    ModuleConfig::load(root, "pc").unwrap()
}

fn cache_entries(config: &ModuleConfig) -> usize {
    std::fs::read_dir(config.cache_dir.join("db").join("user"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

#[test]
fn test_model_reads_module_database() {
    let dir = tempfile::tempdir().unwrap();
    common::write_tree(dir.path());
    let config = pc_config(dir.path());

    let mut users: DbModel = User::open(&config);
    let rows = users
        .select(
            &SelectOptions::new()
                .column("name")
                .and_where(Condition::new("id > ?").with_value(3))
                .order_by("id", Order::Desc),
            false,
        )
        .unwrap();
    let names: Vec<_> = rows.iter().filter_map(|r| r.get_str("name")).collect();
    assert_eq!(names, ["donald", "barbara"]);

    let grace = users.get_row(2, &["name"], false).unwrap().unwrap();
    assert_eq!(grace.get_str("name"), Some("grace"));
}

#[test]
fn test_cache_is_shared_between_model_instances() {
    let dir = tempfile::tempdir().unwrap();
    common::write_tree(dir.path());
    let config = pc_config(dir.path());

    let mut first = User::open(&config);
    first.enable_caching().unwrap();
    assert_eq!(first.get_all(&[], false).unwrap().len(), 5);
    assert_eq!(cache_entries(&config), 1);

    // Change the table behind the cache's back: a second model still sees
    // the cached result.
    let conn = rusqlite::Connection::open(config.database_path.as_ref().unwrap()).unwrap();
    conn.execute("DELETE FROM user WHERE name = 'ada'", []).unwrap();

    let mut second = User::open(&config);
    second.enable_caching().unwrap();
    assert_eq!(second.get_all(&[], false).unwrap().len(), 5);

    // Bypassing the cache reads the table.
    second.disable_caching();
    assert_eq!(second.get_all(&[], false).unwrap().len(), 4);
}

#[test]
fn test_write_through_model_cleans_cache() {
    let dir = tempfile::tempdir().unwrap();
    common::write_tree(dir.path());
    let config = pc_config(dir.path());

    let mut reader = User::open(&config);
    reader.enable_caching().unwrap();
    reader.get_all(&["name"], false).unwrap();
    assert_eq!(cache_entries(&config), 1);

    let mut writer = User::open(&config);
    writer.enable_caching().unwrap();
    let mut row = Row::new();
    row.set("name", "margaret");
    let id = writer.insert(&row).unwrap();
    assert_eq!(id, 6);
    assert_eq!(cache_entries(&config), 0);

    assert_eq!(reader.get_all(&["name"], false).unwrap().len(), 6);
}

#[test]
fn test_do_not_cache_leaves_cache_empty() {
    let dir = tempfile::tempdir().unwrap();
    common::write_tree(dir.path());
    let config = pc_config(dir.path());

    let mut users = User::open(&config);
    users.enable_caching().unwrap();
    users.get_all(&[], true).unwrap();
    assert_eq!(cache_entries(&config), 0);
}

#[test]
fn test_paginate_query_results() {
    let dir = tempfile::tempdir().unwrap();
    common::write_tree(dir.path());
    let config = pc_config(dir.path());

    let mut users = User::open(&config);
    let rows = users
        .select(&SelectOptions::new().order_by("name", Order::Asc), false)
        .unwrap();
    let paginator = Paginator::new(rows, "users").unwrap().per_page(2);

    let page = paginator.paginate(&["page".to_string(), "2".to_string()]);
    assert_eq!(page.count, 5);
    assert_eq!(page.page_count, 3);
    assert_eq!(page.current, 2);
    let names: Vec<_> = page.records.iter().filter_map(|r| r.get_str("name")).collect();
    assert_eq!(names, ["donald", "edsger"]);
}
