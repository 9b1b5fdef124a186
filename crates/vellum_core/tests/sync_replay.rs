//! Sync event log and ordered replay integration tests.

use vellum_core::{
    EntityLookup, PublishEntityRequest, RepoError, SyncEventPayload, UpdateEntityRequest,
};
use vellum_testkit::prelude::*;

#[test]
fn every_mutation_appends_one_event() {
    let repo = TestRepository::publishing();
    // Installing the schema was event 1.
    assert_eq!(repo.sync_head().unwrap(), 1);

    let article = repo
        .create_entity(&repo.session, article_entity("Logged", "logged"))
        .unwrap()
        .entity;
    repo.update_entity(
        &repo.session,
        UpdateEntityRequest {
            id: article.id,
            fields: fields([("title", text("Logged twice")), ("slug", text("logged"))]),
            ..UpdateEntityRequest::default()
        },
    )
    .unwrap();
    repo.publish_entities(
        &repo.session,
        &[PublishEntityRequest {
            id: article.id,
            version: None,
        }],
    )
    .unwrap();
    assert_eq!(repo.sync_head().unwrap(), 4);

    let events = repo.get_sync_events(0, 10).unwrap();
    let types: Vec<_> = events.iter().map(|e| e.payload.event_type()).collect();
    assert_eq!(
        types,
        vec!["updateSchema", "createEntity", "updateEntity", "publishEntities"]
    );
    let ids: Vec<_> = events.iter().map(|e| e.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4]);

    // The cursor pages from anywhere in the log.
    let tail = repo.get_sync_events(2, 10).unwrap();
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[0].id, 3);
}

#[test]
fn batch_publish_appends_a_single_event() {
    let repo = TestRepository::publishing();
    let a = repo
        .create_entity(&repo.session, article_entity("A", "a"))
        .unwrap()
        .entity;
    let b = repo
        .create_entity(&repo.session, article_entity("B", "b"))
        .unwrap()
        .entity;
    let head = repo.sync_head().unwrap();

    repo.publish_entities(
        &repo.session,
        &[
            PublishEntityRequest {
                id: a.id,
                version: None,
            },
            PublishEntityRequest {
                id: b.id,
                version: None,
            },
        ],
    )
    .unwrap();
    assert_eq!(repo.sync_head().unwrap(), head + 1);

    let event = repo.get_sync_events(head, 1).unwrap().remove(0);
    match &event.payload {
        SyncEventPayload::PublishEntities { entities } => {
            assert_eq!(entities.len(), 2);
        }
        other => panic!("unexpected payload: {other:?}"),
    }

    // Publishing already-published entities appends nothing.
    repo.publish_entities(
        &repo.session,
        &[PublishEntityRequest {
            id: a.id,
            version: None,
        }],
    )
    .unwrap();
    assert_eq!(repo.sync_head().unwrap(), head + 1);
}

#[test]
fn changelog_filters_by_entity() {
    let repo = TestRepository::publishing();
    let tracked = repo
        .create_entity(&repo.session, article_entity("Tracked", "tracked"))
        .unwrap()
        .entity;
    repo.create_entity(&repo.session, article_entity("Other", "other"))
        .unwrap();
    repo.update_entity(
        &repo.session,
        UpdateEntityRequest {
            id: tracked.id,
            fields: fields([("title", text("Tracked v2")), ("slug", text("tracked"))]),
            ..UpdateEntityRequest::default()
        },
    )
    .unwrap();
    repo.publish_entities(
        &repo.session,
        &[PublishEntityRequest {
            id: tracked.id,
            version: None,
        }],
    )
    .unwrap();

    let all = repo.get_changelog_events(None, 0, 50).unwrap();
    assert_eq!(all.len(), 5);

    let ours = repo.get_changelog_events(Some(tracked.id), 0, 50).unwrap();
    let types: Vec<_> = ours.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["createEntity", "updateEntity", "publishEntities"]);
}

#[test]
fn replay_reconstructs_identical_state() {
    let source = TestRepository::publishing();
    let published = source
        .create_entity(
            &source.session,
            vellum_core::CreateEntityRequest {
                publish: true,
                ..article_entity("Published Piece", "published-piece")
            },
        )
        .unwrap()
        .entity;
    let draft = source
        .create_entity(
            &source.session,
            vellum_core::CreateEntityRequest {
                entity_type: "Author".into(),
                fields: fields([("name", text("Quinn")), ("bio", text("Writes things."))]),
                name: Some("Quinn".into()),
                ..Default::default()
            },
        )
        .unwrap()
        .entity;
    source
        .update_entity(
            &source.session,
            UpdateEntityRequest {
                id: draft.id,
                fields: fields([("name", text("Quinn")), ("bio", text("Edits things."))]),
                ..UpdateEntityRequest::default()
            },
        )
        .unwrap();
    source
        .unpublish_entities(&source.session, &[published.id])
        .unwrap();
    source.archive_entity(&source.session, published.id).unwrap();

    let target = TestRepository::empty();
    for event in source.get_sync_events(0, 100).unwrap() {
        let head = target.sync_head().unwrap();
        target.apply_sync_event(head, &event).unwrap();
    }

    assert_eq!(target.sync_head().unwrap(), source.sync_head().unwrap());
    assert_eq!(
        target.get_schema_specification().unwrap(),
        source.get_schema_specification().unwrap()
    );
    for id in [published.id, draft.id] {
        let ours = source.get_entity(&EntityLookup::Id(id), None).unwrap();
        let theirs = target.get_entity(&EntityLookup::Id(id), None).unwrap();
        assert_eq!(ours, theirs);
    }

    // The replica's own log carries the same events under the same ids.
    assert_eq!(
        target.get_sync_events(0, 100).unwrap(),
        source.get_sync_events(0, 100).unwrap()
    );
}

#[test]
fn replay_rejects_a_stale_head() {
    let source = TestRepository::publishing();
    source
        .create_entity(&source.session, article_entity("One", "one"))
        .unwrap();
    let events = source.get_sync_events(0, 10).unwrap();

    let target = TestRepository::empty();
    target.apply_sync_event(0, &events[0]).unwrap();

    // Replaying the first event again fails: the head moved.
    let err = target.apply_sync_event(0, &events[0]).unwrap_err();
    assert!(err.is_conflict());
    assert_eq!(
        err,
        RepoError::conflict("sync head mismatch: expected 0, found 1")
    );

    // Skipping ahead fails the same way.
    let err = target.apply_sync_event(5, &events[1]).unwrap_err();
    assert!(err.is_conflict());
}

#[test]
fn replayed_names_are_not_rerandomized() {
    let source = TestRepository::title_only();
    source
        .create_entity(&source.session, title_only_entity("Shared"))
        .unwrap();
    let suffixed = source
        .create_entity(&source.session, title_only_entity("Shared"))
        .unwrap()
        .entity;
    assert!(suffixed.name.starts_with("Shared#"));

    let target = TestRepository::empty();
    for event in source.get_sync_events(0, 100).unwrap() {
        let head = target.sync_head().unwrap();
        target.apply_sync_event(head, &event).unwrap();
    }

    let replica = target
        .get_entity(&EntityLookup::Id(suffixed.id), None)
        .unwrap();
    assert_eq!(replica.name, suffixed.name);
}
