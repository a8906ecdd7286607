//! Persistence behavior of the map over the file adapter: durability
//! across reopen, lost-update protection, and corrupt-document handling.

use std::sync::Arc;

use scenemap::{AssetMap, Boundary, MapError};
use scenemap_int_test::test_util::{
    cleanup, create_map_context, random_path, run_test, test_config,
};
use scenemap_file_adapter::FileGateway;

#[ctor::ctor]
fn init() {
    colog::init();
}

#[test]
fn test_map_survives_reopen() {
    run_test(
        create_map_context,
        |ctx| {
            let map = ctx.map();
            map.insert("durable", Boundary::new(-60.0, -60.0, -60.0, -40.0, -40.0, -40.0))?;
            let root_id = map.root_id();
            let node_count = map.node_count();
            drop(map);

            let reopened = AssetMap::open_or_create(test_config(), ctx.reopen_gateway())?;
            assert_eq!(reopened.root_id(), root_id);
            assert_eq!(reopened.node_count(), node_count);
            assert_eq!(
                reopened.asset_ids_in_boundary(None)?,
                vec!["durable".to_string()]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_world_boundary_is_fixed_at_first_creation() {
    run_test(
        create_map_context,
        |ctx| {
            let world = ctx.map().world_boundary()?;

            // Reopening with a different configured boundary keeps the
            // persisted one.
            let other_config = test_config().with_world_boundary(Boundary::new(
                -5.0, -5.0, -5.0, 5.0, 5.0, 5.0,
            ));
            let reopened = AssetMap::open_or_create(other_config, ctx.reopen_gateway())?;
            assert_eq!(reopened.world_boundary()?, world);
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_second_writer_conflicts_instead_of_losing_updates() {
    run_test(
        create_map_context,
        |ctx| {
            let first = ctx.map();
            let second = AssetMap::open_or_create(test_config(), ctx.reopen_gateway())?;

            first.insert("from-first", Boundary::new(10.0, 10.0, 10.0, 20.0, 20.0, 20.0))?;

            // The second map still holds the pre-insert version token,
            // so its save must not overwrite the first writer's work.
            let result =
                second.insert("from-second", Boundary::new(-20.0, -20.0, -20.0, -10.0, -10.0, -10.0));
            assert!(matches!(result, Err(MapError::VersionConflict { .. })));

            // The mutation stayed applied in memory and flagged dirty.
            assert!(second.is_dirty());
            assert_eq!(second.asset_count(), 1);

            // The store still holds only the first writer's update.
            let fresh = AssetMap::open_or_create(test_config(), ctx.reopen_gateway())?;
            assert_eq!(
                fresh.asset_ids_in_boundary(None)?,
                vec!["from-first".to_string()]
            );
            Ok(())
        },
        cleanup,
    )
}

#[test]
fn test_corrupt_document_fails_open() {
    let path = random_path();
    std::fs::write(&path, b"{ not a map document").unwrap();

    let result = AssetMap::open_or_create(test_config(), Arc::new(FileGateway::new(&path)));
    assert!(matches!(result, Err(MapError::CorruptSnapshot(_))));

    let _ = std::fs::remove_file(&path);
}

#[test]
fn test_open_or_create_bootstraps_empty_store() {
    let path = random_path();

    let map = AssetMap::open_or_create(test_config(), Arc::new(FileGateway::new(&path))).unwrap();
    assert_eq!(map.node_count(), 1);
    assert!(!map.is_dirty());
    assert!(map.persisted_version().is_some());
    // The initial snapshot hit the disk before open returned.
    assert!(std::path::Path::new(&path).exists());

    let _ = std::fs::remove_file(&path);
}
