//! Entity lifecycle integration tests over an in-memory sqlite adapter.

use vellum_core::{
    EntityEffect, EntityLookup, EntityStatus, GetEntitiesRequest, PublishEntityRequest, RepoError,
    SampleEntitiesRequest, UpdateEntityRequest, UpsertEntityRequest,
};
use vellum_testkit::prelude::*;

#[test]
fn create_stores_one_version_as_draft() {
    let repo = TestRepository::title_only();
    let outcome = repo
        .create_entity(&repo.session, title_only_entity("Hello"))
        .unwrap();

    assert_eq!(outcome.effect, EntityEffect::Created);
    assert!(outcome.conflicts.is_empty());
    let entity = outcome.entity;
    assert_eq!(entity.entity_type, "TitleOnly");
    assert_eq!(entity.name, "Hello");
    assert_eq!(entity.version, 1);
    assert_eq!(entity.status, EntityStatus::Draft);
    assert!(entity.never_published);
    assert!(!entity.dirty);
    assert_eq!(entity.published_name, None);
}

#[test]
fn updates_bump_the_version_and_keep_history() {
    let repo = TestRepository::title_only();
    let created = repo
        .create_entity(&repo.session, title_only_entity("First"))
        .unwrap()
        .entity;

    let updated = repo
        .update_entity(
            &repo.session,
            UpdateEntityRequest {
                id: created.id,
                fields: fields([("title", text("Second"))]),
                ..UpdateEntityRequest::default()
            },
        )
        .unwrap();
    assert_eq!(updated.effect, EntityEffect::Updated);
    assert_eq!(updated.entity.version, 2);
    assert_eq!(updated.entity.status, EntityStatus::Draft);

    let old = repo
        .get_entity(
            &EntityLookup::IdVersion {
                id: created.id,
                version: 1,
            },
            None,
        )
        .unwrap();
    assert_eq!(old.fields.get("title"), Some(&text("First")));
    assert_eq!(old.version, 1);

    let missing = repo
        .get_entity(
            &EntityLookup::IdVersion {
                id: created.id,
                version: 3,
            },
            None,
        )
        .unwrap_err();
    assert_eq!(missing, RepoError::not_found("Entity version not found"));
}

#[test]
fn publish_moves_the_pointer_without_a_new_version() {
    let repo = TestRepository::title_only();
    let created = repo
        .create_entity(&repo.session, title_only_entity("Post"))
        .unwrap()
        .entity;
    repo.update_entity(
        &repo.session,
        UpdateEntityRequest {
            id: created.id,
            fields: fields([("title", text("Post v2"))]),
            ..UpdateEntityRequest::default()
        },
    )
    .unwrap();

    let outcomes = repo
        .publish_entities(
            &repo.session,
            &[PublishEntityRequest {
                id: created.id,
                version: None,
            }],
        )
        .unwrap();
    assert_eq!(outcomes.len(), 1);
    assert_eq!(outcomes[0].effect, EntityEffect::Published);
    let entity = &outcomes[0].entity;
    assert_eq!(entity.status, EntityStatus::Published);
    assert!(!entity.never_published);
    // Still two versions: publishing writes no version row.
    assert_eq!(entity.version, 2);
    assert!(entity.published_name.is_some());

    // Publishing the same version again changes nothing.
    let again = repo
        .publish_entities(
            &repo.session,
            &[PublishEntityRequest {
                id: created.id,
                version: None,
            }],
        )
        .unwrap();
    assert_eq!(again[0].effect, EntityEffect::None);
}

#[test]
fn publishing_an_older_version_leaves_the_entity_modified() {
    let repo = TestRepository::title_only();
    let created = repo
        .create_entity(&repo.session, title_only_entity("Old"))
        .unwrap()
        .entity;
    repo.update_entity(
        &repo.session,
        UpdateEntityRequest {
            id: created.id,
            fields: fields([("title", text("New"))]),
            ..UpdateEntityRequest::default()
        },
    )
    .unwrap();

    let outcomes = repo
        .publish_entities(
            &repo.session,
            &[PublishEntityRequest {
                id: created.id,
                version: Some(1),
            }],
        )
        .unwrap();
    assert_eq!(outcomes[0].entity.status, EntityStatus::Modified);

    // Republishing the latest version restores the published status.
    let outcomes = repo
        .publish_entities(
            &repo.session,
            &[PublishEntityRequest {
                id: created.id,
                version: None,
            }],
        )
        .unwrap();
    assert_eq!(outcomes[0].entity.status, EntityStatus::Published);
}

#[test]
fn updating_a_published_entity_marks_it_modified() {
    let repo = TestRepository::title_only();
    let created = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                publish: true,
                ..title_only_entity("Live")
            },
        )
        .unwrap();
    assert_eq!(created.effect, EntityEffect::CreatedAndPublished);
    assert_eq!(created.entity.status, EntityStatus::Published);

    let updated = repo
        .update_entity(
            &repo.session,
            UpdateEntityRequest {
                id: created.entity.id,
                fields: fields([("title", text("Live v2"))]),
                ..UpdateEntityRequest::default()
            },
        )
        .unwrap();
    assert_eq!(updated.entity.status, EntityStatus::Modified);
    assert_eq!(updated.entity.version, 2);
}

#[test]
fn unpublish_withdraws_a_previously_published_entity() {
    let repo = TestRepository::title_only();
    let created = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                publish: true,
                ..title_only_entity("Gone")
            },
        )
        .unwrap()
        .entity;

    let outcomes = repo.unpublish_entities(&repo.session, &[created.id]).unwrap();
    assert_eq!(outcomes[0].effect, EntityEffect::Unpublished);
    let entity = &outcomes[0].entity;
    assert_eq!(entity.status, EntityStatus::Withdrawn);
    assert_eq!(entity.published_name, None);
    assert!(!entity.never_published);

    let err = repo
        .unpublish_entities(&repo.session, &[created.id])
        .unwrap_err();
    assert_eq!(err, RepoError::bad_request("Entity is not published"));
}

#[test]
fn archive_rules() {
    let repo = TestRepository::title_only();
    let draft = repo
        .create_entity(&repo.session, title_only_entity("Draft"))
        .unwrap()
        .entity;

    let archived = repo.archive_entity(&repo.session, draft.id).unwrap();
    assert_eq!(archived.effect, EntityEffect::Archived);
    assert_eq!(archived.entity.status, EntityStatus::Archived);

    // Archiving again is a no-op.
    let again = repo.archive_entity(&repo.session, draft.id).unwrap();
    assert_eq!(again.effect, EntityEffect::None);

    // Archived entities reject new versions.
    let err = repo
        .update_entity(
            &repo.session,
            UpdateEntityRequest {
                id: draft.id,
                fields: fields([("title", text("Nope"))]),
                ..UpdateEntityRequest::default()
            },
        )
        .unwrap_err();
    assert_eq!(err, RepoError::bad_request("Entity is archived"));

    // Never-published entities come back as drafts.
    let unarchived = repo.unarchive_entity(&repo.session, draft.id).unwrap();
    assert_eq!(unarchived.effect, EntityEffect::Unarchived);
    assert_eq!(unarchived.entity.status, EntityStatus::Draft);

    // Published entities cannot be archived directly.
    let live = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                publish: true,
                ..title_only_entity("Live")
            },
        )
        .unwrap()
        .entity;
    let err = repo.archive_entity(&repo.session, live.id).unwrap_err();
    assert_eq!(err, RepoError::bad_request("Entity is published"));

    // A once-published entity returns to withdrawn, never to draft.
    repo.unpublish_entities(&repo.session, &[live.id]).unwrap();
    repo.archive_entity(&repo.session, live.id).unwrap();
    let unarchived = repo.unarchive_entity(&repo.session, live.id).unwrap();
    assert_eq!(unarchived.entity.status, EntityStatus::Withdrawn);
}

#[test]
fn readonly_sessions_cannot_mutate() {
    let repo = TestRepository::title_only();
    let reader = repo.readonly_session();

    let err = repo
        .create_entity(&reader, title_only_entity("Nope"))
        .unwrap_err();
    assert_eq!(
        err,
        RepoError::bad_request("Readonly session used to create entity")
    );

    // Reads still work.
    let created = repo
        .create_entity(&repo.session, title_only_entity("Yes"))
        .unwrap()
        .entity;
    assert!(repo
        .get_entity(&EntityLookup::Id(created.id), None)
        .is_ok());
}

#[test]
fn auth_keys_guard_reads_and_writes() {
    let repo = TestRepository::title_only();
    let created = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                auth_key: Some("secret".into()),
                ..title_only_entity("Guarded")
            },
        )
        .unwrap()
        .entity;

    let err = repo
        .get_entity(&EntityLookup::Id(created.id), None)
        .unwrap_err();
    assert_eq!(err, RepoError::not_authorized("Wrong authKey provided"));
    assert!(repo
        .get_entity(&EntityLookup::Id(created.id), Some("secret"))
        .is_ok());

    let err = repo
        .update_entity(
            &repo.session,
            UpdateEntityRequest {
                id: created.id,
                fields: fields([("title", text("Changed"))]),
                auth_key: Some("wrong".into()),
                ..UpdateEntityRequest::default()
            },
        )
        .unwrap_err();
    assert_eq!(err, RepoError::not_authorized("Wrong authKey provided"));

    // Guarded entities stay out of listings without the key, but the
    // total still counts them.
    let page = repo.get_entities(GetEntitiesRequest::default()).unwrap();
    assert_eq!(page.total, 1);
    assert!(page.entities.is_empty());

    let page = repo
        .get_entities(GetEntitiesRequest {
            auth_key: Some("secret".into()),
            ..GetEntitiesRequest::default()
        })
        .unwrap();
    assert_eq!(page.entities.len(), 1);
}

#[test]
fn names_derive_from_the_name_field() {
    let repo = TestRepository::title_only();
    let created = repo
        .create_entity(&repo.session, title_only_entity("Derived"))
        .unwrap()
        .entity;
    assert_eq!(created.name, "Derived");

    // Changing the name field re-derives the name.
    let updated = repo
        .update_entity(
            &repo.session,
            UpdateEntityRequest {
                id: created.id,
                fields: fields([("title", text("Renamed"))]),
                ..UpdateEntityRequest::default()
            },
        )
        .unwrap();
    assert_eq!(updated.entity.name, "Renamed");

    // Hand-picked names survive edits that keep the name field.
    let custom = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                name: Some("Custom".into()),
                ..title_only_entity("Stable")
            },
        )
        .unwrap()
        .entity;
    let updated = repo
        .update_entity(
            &repo.session,
            UpdateEntityRequest {
                id: custom.id,
                fields: fields([("title", text("Stable"))]),
                ..UpdateEntityRequest::default()
            },
        )
        .unwrap();
    assert_eq!(updated.entity.name, "Custom");
}

#[test]
fn name_collisions_get_a_random_suffix() {
    let repo = TestRepository::title_only();
    let first = repo
        .create_entity(&repo.session, title_only_entity("Taken"))
        .unwrap()
        .entity;
    let second = repo
        .create_entity(&repo.session, title_only_entity("Taken"))
        .unwrap()
        .entity;

    assert_eq!(first.name, "Taken");
    assert!(second.name.starts_with("Taken#"));
    assert_eq!(second.name.len(), "Taken#".len() + 8);
}

#[test]
fn input_validation() {
    let repo = TestRepository::publishing();

    let err = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                entity_type: "Bogus".into(),
                ..Default::default()
            },
        )
        .unwrap_err();
    assert_eq!(err, RepoError::bad_request("Unknown entity type Bogus"));

    let err = repo
        .create_entity(&repo.session, article_entity("Bad Slug", "Not A Slug"))
        .unwrap_err();
    assert!(err.is_bad_request());
    assert!(err.to_string().contains("pattern"));

    // Drafts may omit required fields; publishing may not.
    let draft = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                entity_type: "Article".into(),
                ..Default::default()
            },
        )
        .unwrap();
    assert_eq!(draft.effect, EntityEffect::Created);
    let err = repo
        .publish_entities(
            &repo.session,
            &[PublishEntityRequest {
                id: draft.entity.id,
                version: None,
            }],
        )
        .unwrap_err();
    assert_eq!(err, RepoError::bad_request("Missing required fields: title"));
}

#[test]
fn references_must_point_at_existing_entities() {
    let repo = TestRepository::publishing();
    let ghost = uuid::Uuid::new_v4();

    let err = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                fields: fields([
                    ("title", text("Dangling")),
                    ("slug", text("dangling")),
                    ("related", reference(ghost)),
                ]),
                ..article_entity("Dangling", "dangling")
            },
        )
        .unwrap_err();
    assert_eq!(
        err,
        RepoError::bad_request(format!("Unknown referenced entities: {ghost}"))
    );
}

#[test]
fn reference_fields_enforce_their_entity_types() {
    let repo = TestRepository::publishing();
    let author = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                entity_type: "Author".into(),
                fields: fields([("name", text("Ada"))]),
                ..Default::default()
            },
        )
        .unwrap()
        .entity;

    // `related` only accepts Articles.
    let err = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                fields: fields([
                    ("title", text("Typed")),
                    ("slug", text("typed")),
                    ("related", reference(author.id)),
                ]),
                ..article_entity("Typed", "typed")
            },
        )
        .unwrap_err();
    assert_eq!(
        err,
        RepoError::bad_request(format!(
            "Field related cannot reference Author entity {}",
            author.id
        ))
    );

    let target = repo
        .create_entity(&repo.session, article_entity("Target", "target"))
        .unwrap()
        .entity;
    let outcome = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                fields: fields([
                    ("title", text("Typed")),
                    ("slug", text("typed")),
                    ("related", reference(target.id)),
                ]),
                ..article_entity("Typed", "typed")
            },
        )
        .unwrap();
    assert!(outcome.conflicts.is_empty());

    // Rich-text embeds carry no field restriction.
    let embedded = repo
        .create_entity(
            &repo.session,
            vellum_core::CreateEntityRequest {
                fields: fields([
                    ("title", text("Embeds")),
                    ("slug", text("embeds")),
                    (
                        "body",
                        vellum_core::FieldValue::RichText(
                            vellum_core::RichText::from_blocks(vec![
                                vellum_core::RichTextNode::Entity { id: author.id },
                            ]),
                        ),
                    ),
                ]),
                ..article_entity("Embeds", "embeds")
            },
        )
        .unwrap();
    assert!(embedded.conflicts.is_empty());
}

#[test]
fn listing_pages_through_a_stable_cursor() {
    let repo = TestRepository::title_only();
    for i in 0..5 {
        repo.create_entity(&repo.session, title_only_entity(&format!("Entry {i}")))
            .unwrap();
    }

    let first = repo
        .get_entities(GetEntitiesRequest {
            limit: 2,
            ..GetEntitiesRequest::default()
        })
        .unwrap();
    assert_eq!(first.total, 5);
    assert_eq!(first.entities.len(), 2);
    let cursor = first.next.clone().expect("expected another page");

    let second = repo
        .get_entities(GetEntitiesRequest {
            limit: 2,
            after: Some(cursor),
            ..GetEntitiesRequest::default()
        })
        .unwrap();
    assert_eq!(second.entities.len(), 2);
    let cursor = second.next.clone().expect("expected a final page");

    let last = repo
        .get_entities(GetEntitiesRequest {
            limit: 2,
            after: Some(cursor),
            ..GetEntitiesRequest::default()
        })
        .unwrap();
    assert_eq!(last.entities.len(), 1);
    assert_eq!(last.next, None);

    let mut seen: Vec<String> = first
        .entities
        .iter()
        .chain(&second.entities)
        .chain(&last.entities)
        .map(|e| e.name.clone())
        .collect();
    seen.sort();
    seen.dedup();
    assert_eq!(seen.len(), 5);
}

#[test]
fn archived_entities_are_hidden_unless_requested() {
    let repo = TestRepository::title_only();
    let keep = repo
        .create_entity(&repo.session, title_only_entity("Keep"))
        .unwrap()
        .entity;
    let gone = repo
        .create_entity(&repo.session, title_only_entity("Gone"))
        .unwrap()
        .entity;
    repo.archive_entity(&repo.session, gone.id).unwrap();

    let page = repo.get_entities(GetEntitiesRequest::default()).unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.entities[0].id, keep.id);

    let page = repo
        .get_entities(GetEntitiesRequest {
            statuses: vec![EntityStatus::Archived],
            ..GetEntitiesRequest::default()
        })
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.entities[0].id, gone.id);
}

#[test]
fn text_filter_matches_the_latest_content() {
    let repo = TestRepository::title_only();
    repo.create_entity(&repo.session, title_only_entity("Alpha release notes"))
        .unwrap();
    repo.create_entity(&repo.session, title_only_entity("Beta roadmap"))
        .unwrap();

    let page = repo
        .get_entities(GetEntitiesRequest {
            text: Some("release".into()),
            ..GetEntitiesRequest::default()
        })
        .unwrap();
    assert_eq!(page.total, 1);
    assert_eq!(page.entities[0].name, "Alpha release notes");
}

#[test]
fn sampling_is_deterministic_per_seed() {
    let repo = TestRepository::title_only();
    for i in 0..8 {
        repo.create_entity(&repo.session, title_only_entity(&format!("Item {i}")))
            .unwrap();
    }

    let request = SampleEntitiesRequest {
        count: 3,
        seed: 42,
        ..SampleEntitiesRequest::default()
    };
    let first = repo.sample_entities(request.clone()).unwrap();
    let second = repo.sample_entities(request).unwrap();

    assert_eq!(first.total, 8);
    assert_eq!(first.entities.len(), 3);
    let ids: Vec<_> = first.entities.iter().map(|e| e.id).collect();
    let again: Vec<_> = second.entities.iter().map(|e| e.id).collect();
    assert_eq!(ids, again);
}

#[test]
fn upsert_creates_then_updates_by_unique_value() {
    let repo = TestRepository::publishing();

    let first = repo
        .upsert_entity(
            &repo.session,
            UpsertEntityRequest {
                index_name: "slug".into(),
                value: "getting-started".into(),
                entity_type: "Article".into(),
                fields: fields([
                    ("title", text("Getting Started")),
                    ("slug", text("getting-started")),
                ]),
                ..UpsertEntityRequest::default()
            },
        )
        .unwrap();
    assert_eq!(first.effect, EntityEffect::Created);

    let second = repo
        .upsert_entity(
            &repo.session,
            UpsertEntityRequest {
                index_name: "slug".into(),
                value: "getting-started".into(),
                entity_type: "Article".into(),
                fields: fields([
                    ("title", text("Getting Started, revised")),
                    ("slug", text("getting-started")),
                ]),
                ..UpsertEntityRequest::default()
            },
        )
        .unwrap();
    assert_eq!(second.effect, EntityEffect::Updated);
    assert_eq!(second.entity.id, first.entity.id);
    assert_eq!(second.entity.version, 2);
}
