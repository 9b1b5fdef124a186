//! Schema update integration tests: versioning, storage impact and lazy
//! field migration.

use vellum_core::{EntityLookup, RepoError, SchemaSpecificationUpdate};
use vellum_schema::{MigrationAction, TypeKind};
use vellum_testkit::prelude::*;

#[test]
fn updates_bump_the_version_and_noops_do_not() {
    let repo = TestRepository::empty();
    assert_eq!(repo.get_schema_specification().unwrap().version, 0);

    let spec = repo
        .update_schema_specification(&repo.session, &title_only_update())
        .unwrap();
    assert_eq!(spec.version, 1);
    assert_eq!(repo.sync_head().unwrap(), 1);

    // Re-applying the same update changes nothing and appends no event.
    let spec = repo
        .update_schema_specification(&repo.session, &title_only_update())
        .unwrap();
    assert_eq!(spec.version, 1);
    assert_eq!(repo.sync_head().unwrap(), 1);

    let spec = repo
        .update_schema_specification(&repo.session, &publishing_update())
        .unwrap();
    assert_eq!(spec.version, 2);
    assert_eq!(repo.sync_head().unwrap(), 2);
}

#[test]
fn readonly_sessions_cannot_update_the_schema() {
    let repo = TestRepository::empty();
    let reader = repo.readonly_session();
    let err = repo
        .update_schema_specification(&reader, &title_only_update())
        .unwrap_err();
    assert_eq!(
        err,
        RepoError::bad_request("Readonly session used to update schema")
    );
}

#[test]
fn entity_types_with_entities_cannot_be_deleted() {
    let repo = TestRepository::title_only();
    let entity = repo
        .create_entity(&repo.session, title_only_entity("Survivor"))
        .unwrap()
        .entity;

    let delete = SchemaSpecificationUpdate {
        migrations: vec![MigrationAction::DeleteType {
            kind: TypeKind::Entity,
            name: "TitleOnly".into(),
        }],
        ..SchemaSpecificationUpdate::default()
    };
    let err = repo
        .update_schema_specification(&repo.session, &delete)
        .unwrap_err();
    assert_eq!(
        err,
        RepoError::bad_request("Entity type TitleOnly still has entities")
    );
    // The rejection rolled everything back.
    assert_eq!(repo.get_schema_specification().unwrap().version, 1);
    assert!(repo.get_entity(&EntityLookup::Id(entity.id), None).is_ok());

    // Archived entities still count as existing.
    repo.archive_entity(&repo.session, entity.id).unwrap();
    let err = repo
        .update_schema_specification(&repo.session, &delete)
        .unwrap_err();
    assert!(err.is_bad_request());
}

#[test]
fn renaming_an_entity_type_rewrites_stored_rows() {
    let repo = TestRepository::title_only();
    let entity = repo
        .create_entity(&repo.session, title_only_entity("Movable"))
        .unwrap()
        .entity;

    let rename = SchemaSpecificationUpdate {
        migrations: vec![MigrationAction::RenameType {
            kind: TypeKind::Entity,
            name: "TitleOnly".into(),
            new_name: "Note".into(),
        }],
        ..SchemaSpecificationUpdate::default()
    };
    repo.update_schema_specification(&repo.session, &rename)
        .unwrap();

    let spec = repo.get_schema_specification().unwrap();
    assert!(spec.entity_types.iter().any(|t| t.name == "Note"));
    let migrated = repo.get_entity(&EntityLookup::Id(entity.id), None).unwrap();
    assert_eq!(migrated.entity_type, "Note");
}

#[test]
fn field_renames_migrate_lazily_and_mark_entities_dirty() {
    let repo = TestRepository::title_only();
    let entity = repo
        .create_entity(&repo.session, title_only_entity("Headline"))
        .unwrap()
        .entity;

    let rename = SchemaSpecificationUpdate {
        migrations: vec![MigrationAction::RenameField {
            kind: TypeKind::Entity,
            type_name: "TitleOnly".into(),
            field: "title".into(),
            new_field: "headline".into(),
        }],
        ..SchemaSpecificationUpdate::default()
    };
    repo.update_schema_specification(&repo.session, &rename)
        .unwrap();

    // The stored version is untouched; the read view migrates it.
    let migrated = repo.get_entity(&EntityLookup::Id(entity.id), None).unwrap();
    assert_eq!(migrated.fields.get("headline"), Some(&text("Headline")));
    assert!(!migrated.fields.contains_key("title"));
    assert!(migrated.dirty);
}

#[test]
fn schema_updates_replicate() {
    let source = TestRepository::empty();
    source
        .update_schema_specification(&source.session, &title_only_update())
        .unwrap();
    source
        .create_entity(&source.session, title_only_entity("Before"))
        .unwrap();
    let rename = SchemaSpecificationUpdate {
        migrations: vec![MigrationAction::RenameField {
            kind: TypeKind::Entity,
            type_name: "TitleOnly".into(),
            field: "title".into(),
            new_field: "headline".into(),
        }],
        ..SchemaSpecificationUpdate::default()
    };
    source
        .update_schema_specification(&source.session, &rename)
        .unwrap();

    let target = TestRepository::empty();
    for event in source.get_sync_events(0, 100).unwrap() {
        let head = target.sync_head().unwrap();
        target.apply_sync_event(head, &event).unwrap();
    }

    let spec = target.get_schema_specification().unwrap();
    assert_eq!(spec, source.get_schema_specification().unwrap());
    assert_eq!(spec.version, 2);
}
