use super::*;
use crate::{
    config::{Config, ReifyConfig, ReifyStrategy},
    error::ErrorClass,
    test_fixtures::{
        BOOK, COLLECTION, HAS_MEMBER, LIBRARY, LIBRARY_ID, NOTE, PAGE, SPECIAL_PAGE, TITLE_FIELD,
        TOPIC, db, db_with,
    },
};

fn pid_of(entity: &Entity) -> Pid {
    entity.pid().cloned().unwrap()
}

fn library_with_books(db: &Db, titles: &[&str]) -> (Entity, Vec<Entity>) {
    let library = db.create(&LIBRARY, [("name", "Central")]).unwrap();
    let library_pid = pid_of(&library);

    let books = titles
        .iter()
        .map(|title| {
            db.create(
                &BOOK,
                [
                    ("title", Value::from(*title)),
                    ("library_id", Value::from(&library_pid)),
                ],
            )
            .unwrap()
        })
        .collect();

    (library, books)
}

///
/// BELONGS_TO
///

#[test]
fn missing_foreign_key_resolves_none_without_a_query() {
    let db = db();
    let mut book = db.create(&BOOK, [("title", "Dune")]).unwrap();
    db.search().clear_log();

    let mut library = db.singular(&mut book, "library").unwrap();
    assert!(library.target().unwrap().is_none());
    assert_eq!(library.state(), CacheState::Loaded);
    assert!(db.search().query_log().is_empty());
}

#[test]
fn pinned_target_is_fetched_directly() {
    let db = db();
    let (_, books) = library_with_books(&db, &["Dune"]);
    let mut book = books.into_iter().next().unwrap();
    let library_pid = book.read(LIBRARY_ID).unwrap().unwrap();
    db.search().clear_log();

    let mut library = db.singular(&mut book, "library").unwrap();
    let target = library.target().unwrap().unwrap();

    assert_eq!(target.pid().map(Pid::as_str), Some(library_pid.as_str()));
    assert_eq!(target.model().name, "Library");
    assert!(db.search().query_log().is_empty());
}

#[test]
fn open_target_resolves_through_the_index_as_the_stored_subclass() {
    let db = db();
    let page = db.create(&SPECIAL_PAGE, [("number", 3_i64)]).unwrap();
    let mut note = db.create(&NOTE, [("page_id", &pid_of(&page))]).unwrap();
    db.search().clear_log();

    let mut proxy = db.singular(&mut note, "page").unwrap();
    let target = proxy.target().unwrap().unwrap();
    assert_eq!(target.model().name, "SpecialPage");

    let log = db.search().query_log();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].rows, Some(1));
}

#[test]
fn resolved_target_is_cached() {
    let db = db();
    let page = db.create(&PAGE, [("number", 1_i64)]).unwrap();
    let mut note = db.create(&NOTE, [("page_id", &pid_of(&page))]).unwrap();
    db.search().clear_log();

    let mut proxy = db.singular(&mut note, "page").unwrap();
    proxy.target().unwrap();
    proxy.target().unwrap();

    assert_eq!(db.search().query_log().len(), 1);
    assert_eq!(db.metrics().association_loads, 1);
}

#[test]
fn dangling_foreign_key_resolves_none() {
    let db = db();
    let mut note = db.create(&NOTE, [("page_id", "test:404")]).unwrap();

    let mut proxy = db.singular(&mut note, "page").unwrap();
    assert!(proxy.target().unwrap().is_none());
    assert_eq!(db.metrics().dangling_references, 1);
}

#[test]
fn replace_rejects_wrong_class_before_writing() {
    let db = db();
    let mut book = db.create(&BOOK, [("title", "Dune")]).unwrap();
    let page = db.create(&PAGE, [("number", 1_i64)]).unwrap();

    let err = db
        .singular(&mut book, "library")
        .unwrap()
        .replace(Some(page))
        .unwrap_err();

    assert!(err.is_type_mismatch());
    assert_eq!(book.read(LIBRARY_ID).unwrap(), None);
    assert!(!book.is_changed());
}

#[test]
fn replace_requires_a_saved_target() {
    let db = db();
    let mut book = db.create(&BOOK, [("title", "Dune")]).unwrap();

    let err = db
        .singular(&mut book, "library")
        .unwrap()
        .replace(Some(Entity::new(&LIBRARY)))
        .unwrap_err();

    assert!(err.is_not_saved());
}

#[test]
fn replace_updates_foreign_key_and_cache() {
    let db = db();
    let library = db.create(&LIBRARY, [("name", "Central")]).unwrap();
    let library_pid = pid_of(&library);
    let mut book = db.create(&BOOK, [("title", "Dune")]).unwrap();
    db.search().clear_log();

    let mut proxy = db.singular(&mut book, "library").unwrap();
    proxy.replace(Some(library)).unwrap();
    assert_eq!(proxy.id(), Some(library_pid.clone()));
    assert!(proxy.target().unwrap().is_some());
    assert!(db.search().query_log().is_empty());

    db.save(&mut book).unwrap();
    assert_eq!(book.associations().state("library"), CacheState::Loaded);

    let stored = db.find(&pid_of(&book)).unwrap();
    assert_eq!(
        stored.read(LIBRARY_ID).unwrap(),
        Some(library_pid.into_string())
    );
}

#[test]
fn wrong_association_kind_is_rejected() {
    let db = db();
    let mut book = Entity::new(&BOOK);

    let err = db.collection(&mut book, "library").err().unwrap();
    assert!(err.is_configuration());
    let err = db.singular(&mut book, "pages").err().unwrap();
    assert!(err.is_configuration());
    let err = db.collection(&mut book, "chapters").err().unwrap();
    assert!(err.message.contains("chapters"));
}

///
/// HAS_MANY
///

#[test]
fn has_many_loads_members_by_inverse_foreign_key() {
    let db = db();
    let (mut library, books) = library_with_books(&db, &["A", "B"]);
    db.create(&BOOK, [("title", "Elsewhere")]).unwrap();

    let mut proxy = db.collection(&mut library, "books").unwrap();
    let members = proxy.load_target().unwrap();

    assert_eq!(members, books.as_slice());
    assert_eq!(proxy.state(), CacheState::Loaded);
}

#[test]
fn has_many_members_reify_as_their_stored_subclass() {
    let db = db();
    let mut book = db.create(&BOOK, [("title", "Dune")]).unwrap();
    let book_pid = pid_of(&book);
    db.create(&PAGE, [("book_id", &book_pid)]).unwrap();
    db.create(&SPECIAL_PAGE, [("book_id", &book_pid)]).unwrap();

    let mut pages = db.collection(&mut book, "pages").unwrap();
    let names: Vec<&str> = pages
        .load_target()
        .unwrap()
        .iter()
        .map(|page| page.model().name)
        .collect();

    assert_eq!(names, vec!["Page", "SpecialPage"]);
}

#[test]
fn reload_keeps_unsaved_member_changes() {
    let db = db();
    let (mut library, books) = library_with_books(&db, &["A", "B"]);
    let first = pid_of(&books[0]);

    let mut proxy = db.collection(&mut library, "books").unwrap();
    proxy.load_target().unwrap();
    proxy
        .member_mut(&first)
        .unwrap()
        .set("title", "Edited")
        .unwrap();

    let members = proxy.reload().unwrap();
    assert_eq!(members.len(), 2);
    assert_eq!(
        members[0].read(TITLE_FIELD).unwrap(),
        Some("Edited".to_string())
    );
    assert!(members[0].is_changed());
}

#[test]
fn reload_drops_members_deleted_from_storage() {
    let db = db();
    let (mut library, books) = library_with_books(&db, &["A", "B"]);

    let mut proxy = db.collection(&mut library, "books").unwrap();
    assert_eq!(proxy.load_target().unwrap().len(), 2);
    db.storage().delete(&pid_of(&books[1])).unwrap();

    let members = proxy.reload().unwrap();
    assert_eq!(members, std::slice::from_ref(&books[0]));
    assert_eq!(proxy.state(), CacheState::Stale);
    assert_eq!(db.metrics().divergences, 1);
}

#[test]
fn reload_drops_members_moved_to_another_owner() {
    let db = db();
    let (mut library, books) = library_with_books(&db, &["A", "B"]);
    let other = db.create(&LIBRARY, [("name", "Branch")]).unwrap();

    let mut proxy = db.collection(&mut library, "books").unwrap();
    assert_eq!(proxy.load_target().unwrap().len(), 2);

    let mut moved = db.find(&pid_of(&books[1])).unwrap();
    moved.set("library_id", &pid_of(&other)).unwrap();
    db.save(&mut moved).unwrap();

    let members = proxy.reload().unwrap();
    assert_eq!(members, std::slice::from_ref(&books[0]));
    assert_eq!(proxy.state(), CacheState::Loaded);
}

#[test]
fn reload_keeps_members_that_are_not_saved_yet() {
    let db = db();
    let (mut library, _) = library_with_books(&db, &["A"]);

    let mut proxy = db.collection(&mut library, "books").unwrap();
    proxy.load_target().unwrap();
    proxy.build([("title", "Draft")]).unwrap();

    let members = proxy.reload().unwrap();
    assert_eq!(members.len(), 2);
    assert!(members[1].is_new());
    assert_eq!(members[1].read(TITLE_FIELD).unwrap(), Some("Draft".to_string()));
}

#[test]
fn concat_keeps_unsaved_edits_of_a_cached_member() {
    let db = db();
    let (mut library, books) = library_with_books(&db, &["A"]);
    let book_pid = pid_of(&books[0]);

    let mut proxy = db.collection(&mut library, "books").unwrap();
    proxy.load_target().unwrap();
    proxy
        .member_mut(&book_pid)
        .unwrap()
        .set("title", "Edited")
        .unwrap();

    proxy.concat(vec![db.find(&book_pid).unwrap()]).unwrap();

    assert_eq!(proxy.members().len(), 1);
    let cached = &proxy.members()[0];
    assert_eq!(cached.read(TITLE_FIELD).unwrap(), Some("Edited".to_string()));
    assert!(cached.is_changed());
}

#[test]
fn orphaned_index_hits_are_dropped_and_mark_the_cache_stale() {
    let db = db();
    let (mut library, books) = library_with_books(&db, &["A", "B"]);
    db.storage().delete(&pid_of(&books[1])).unwrap();

    let mut proxy = db.collection(&mut library, "books").unwrap();
    let members = proxy.load_target().unwrap();

    assert_eq!(members.len(), 1);
    assert_eq!(members[0], books[0]);
    assert_eq!(proxy.state(), CacheState::Stale);
    assert_eq!(db.metrics().divergences, 1);
}

#[test]
fn failed_load_restores_cache_state() {
    let db = db();
    let (mut library, _) = library_with_books(&db, &["A"]);
    db.search().set_unavailable(true);

    let mut proxy = db.collection(&mut library, "books").unwrap();
    assert!(proxy.load_target().is_err());
    assert_eq!(proxy.state(), CacheState::Unloaded);

    db.search().set_unavailable(false);
    assert_eq!(proxy.load_target().unwrap().len(), 1);
}

#[test]
fn size_counts_through_the_index_until_loaded() {
    let db = db();
    let (mut library, _) = library_with_books(&db, &["A", "B", "C"]);
    db.search().clear_log();

    let mut proxy = db.collection(&mut library, "books").unwrap();
    assert_eq!(proxy.size().unwrap(), 3);
    assert_eq!(db.search().count_calls(), 1);
    assert_eq!(proxy.state(), CacheState::Unloaded);

    proxy.load_target().unwrap();
    assert_eq!(proxy.size().unwrap(), 3);
    assert_eq!(db.search().count_calls(), 1);
}

#[test]
fn concat_rejects_wrong_class_before_loading() {
    let db = db();
    let (mut library, _) = library_with_books(&db, &["A"]);
    let page = db.create(&PAGE, [("number", 1_i64)]).unwrap();
    db.search().clear_log();

    let mut proxy = db.collection(&mut library, "books").unwrap();
    let err = proxy.concat(vec![page]).unwrap_err();

    assert!(err.is_type_mismatch());
    assert_eq!(proxy.state(), CacheState::Unloaded);
    assert!(db.search().query_log().is_empty());
}

#[test]
fn concat_links_and_saves_members_once() {
    let db = db();
    let mut library = db.create(&LIBRARY, [("name", "Central")]).unwrap();
    let library_pid = pid_of(&library);
    let book = db.create(&BOOK, [("title", "Dune")]).unwrap();
    let book_pid = pid_of(&book);

    let mut proxy = db.collection(&mut library, "books").unwrap();
    proxy.concat(vec![book.clone()]).unwrap();
    proxy.concat(vec![book]).unwrap();

    assert_eq!(proxy.members().len(), 1);
    assert_eq!(proxy.ids().unwrap(), vec![book_pid.clone()]);

    let stored = db.find(&book_pid).unwrap();
    assert_eq!(
        stored.read(LIBRARY_ID).unwrap(),
        Some(library_pid.into_string())
    );
}

#[test]
fn built_members_of_an_unsaved_owner_are_saved_with_it() {
    let db = db();
    let mut library = Entity::new(&LIBRARY);

    let mut proxy = db.collection(&mut library, "books").unwrap();
    proxy.build([("title", "Draft")]).unwrap();
    assert_eq!(proxy.load_target().unwrap().len(), 1);
    assert!(db.search().query_log().is_empty());

    db.save(&mut library).unwrap();
    let library_pid = pid_of(&library);
    let members = library.associations().get("books").unwrap().members();

    assert!(members[0].is_persisted());
    assert_eq!(
        members[0].read(LIBRARY_ID).unwrap(),
        Some(library_pid.into_string())
    );
}

#[test]
fn create_requires_a_saved_owner() {
    let db = db();
    let mut library = Entity::new(&LIBRARY);

    let err = db
        .collection(&mut library, "books")
        .unwrap()
        .create([("title", "Dune")])
        .unwrap_err();

    assert!(err.is_not_saved());
}

#[test]
fn create_saves_member_pointing_at_owner() {
    let db = db();
    let mut library = db.create(&LIBRARY, [("name", "Central")]).unwrap();

    let mut proxy = db.collection(&mut library, "books").unwrap();
    let created = proxy.create([("title", "Dune")]).unwrap();
    assert!(created.is_persisted());

    assert_eq!(proxy.size().unwrap(), 1);
    proxy.reset();
    assert_eq!(proxy.size().unwrap(), 1);
}

#[test]
fn delete_nullifies_has_many_foreign_key() {
    let db = db();
    let (mut library, books) = library_with_books(&db, &["A", "B"]);
    let removed = pid_of(&books[0]);

    let mut proxy = db.collection(&mut library, "books").unwrap();
    proxy.delete(std::slice::from_ref(&removed)).unwrap();
    assert_eq!(proxy.members().len(), 1);

    let stored = db.find(&removed).unwrap();
    assert_eq!(stored.read(LIBRARY_ID).unwrap(), None);

    proxy.reset();
    assert_eq!(proxy.load_target().unwrap().len(), 1);
}

///
/// HAS_AND_BELONGS_TO_MANY
///

#[test]
fn habtm_concat_writes_both_sides() {
    let db = db();
    let mut book = db.create(&BOOK, [("title", "Dune")]).unwrap();
    let topic = db.create(&TOPIC, [("name", "Deserts")]).unwrap();
    let topic_pid = pid_of(&topic);
    assert_eq!(topic_pid.namespace(), Some("topic"));

    let mut topics = db.collection(&mut book, "topics").unwrap();
    topics.concat(vec![topic]).unwrap();
    assert_eq!(topics.ids().unwrap(), vec![topic_pid.clone()]);

    db.save(&mut book).unwrap();
    assert_eq!(book.associations().state("topics"), CacheState::Loaded);

    let stored_topic = db.find(&topic_pid).unwrap();
    assert_eq!(stored_topic.foreign_key_ids("book_ids"), vec![pid_of(&book)]);
    let stored_book = db.find(&pid_of(&book)).unwrap();
    assert_eq!(stored_book.foreign_key_ids("topic_ids"), vec![topic_pid]);
}

#[test]
fn habtm_delete_removes_both_sides() {
    let db = db();
    let mut book = db.create(&BOOK, [("title", "Dune")]).unwrap();
    let topic = db.create(&TOPIC, [("name", "Deserts")]).unwrap();
    let topic_pid = pid_of(&topic);

    let mut topics = db.collection(&mut book, "topics").unwrap();
    topics.concat(vec![topic]).unwrap();
    topics.delete(std::slice::from_ref(&topic_pid)).unwrap();
    assert!(topics.ids().unwrap().is_empty());
    assert!(topics.members().is_empty());

    db.save(&mut book).unwrap();
    let stored_topic = db.find(&topic_pid).unwrap();
    assert!(stored_topic.foreign_key_ids("book_ids").is_empty());
}

#[test]
fn habtm_lookups_are_batched_by_page_size() {
    let db = db();
    let ids: Vec<Pid> = (0..16_i64)
        .map(|n| pid_of(&db.create(&PAGE, [("number", n)]).unwrap()))
        .collect();
    let mut collection = db.create(&COLLECTION, [("member_ids", id_list(&ids))]).unwrap();
    db.search().clear_log();

    let mut members = db.collection(&mut collection, "members").unwrap();
    let loaded: Vec<Pid> = members
        .load_target()
        .unwrap()
        .iter()
        .map(pid_of)
        .collect();
    assert_eq!(loaded, ids);

    let log = db.search().query_log();
    assert_eq!(log.len(), 2);
    assert!(log.iter().all(|entry| entry.rows == Some(10)));
    assert_eq!(log[0].returned, 10);
    assert_eq!(log[1].returned, 6);
}

static SHELF: EntityModel = EntityModel {
    path: "association::tests::Shelf",
    name: "Shelf",
    namespace: None,
    parent: None,
    datastreams: &[],
    properties: &[],
    reflections: &[
        ReflectionModel::has_and_belongs_to_many("volumes", &BOOK, HAS_MEMBER, "volume_ids")
            .page_size(0),
    ],
};

#[test]
fn zero_page_size_fails_at_first_use() {
    let db = db();
    let book = db.create(&BOOK, [("title", "Dune")]).unwrap();
    let mut shelf = db
        .create(&SHELF, [("volume_ids", vec![pid_of(&book).into_string()])])
        .unwrap();

    let mut volumes = db.collection(&mut shelf, "volumes").unwrap();
    let err = volumes.load_target().unwrap_err();
    assert_eq!(err.class, ErrorClass::Configuration);
    assert!(err.message.contains("volumes"));
    assert_eq!(volumes.state(), CacheState::Unloaded);
    assert!(volumes.size().is_err());
}

#[test]
fn habtm_without_ids_issues_no_query() {
    let db = db();
    let mut collection = db.create(&COLLECTION, [("name", "Empty")]).unwrap();
    db.search().clear_log();

    let mut members = db.collection(&mut collection, "members").unwrap();
    assert!(members.load_target().unwrap().is_empty());
    assert_eq!(members.size().unwrap(), 0);
    assert!(db.search().query_log().is_empty());
}

#[test]
fn habtm_set_ids_replaces_membership() {
    let db = db();
    let mut book = db.create(&BOOK, [("title", "Dune")]).unwrap();
    let first = pid_of(&db.create(&TOPIC, [("name", "Deserts")]).unwrap());
    let second = pid_of(&db.create(&TOPIC, [("name", "Spice")]).unwrap());

    let mut topics = db.collection(&mut book, "topics").unwrap();
    topics.set_ids(std::slice::from_ref(&first)).unwrap();
    topics.set_ids(std::slice::from_ref(&second)).unwrap();

    assert_eq!(topics.ids().unwrap(), vec![second.clone()]);
    assert!(db.find(&first).unwrap().foreign_key_ids("book_ids").is_empty());
    assert_eq!(
        db.find(&second).unwrap().foreign_key_ids("book_ids"),
        vec![pid_of(&book)]
    );
}

#[test]
fn set_ids_rejects_identifiers_of_the_wrong_class() {
    let db = db();
    let mut book = db.create(&BOOK, [("title", "Dune")]).unwrap();
    let page = pid_of(&db.create(&PAGE, [("number", 1_i64)]).unwrap());

    let err = db
        .collection(&mut book, "topics")
        .unwrap()
        .set_ids(&[page])
        .unwrap_err();

    assert!(err.is_type_mismatch());
    assert!(book.foreign_key_ids("topic_ids").is_empty());
}

#[test]
fn document_strategy_reifies_without_storage_fetches() {
    let db = db_with(Config {
        namespace: "test".to_string(),
        reify: ReifyConfig {
            strategy: ReifyStrategy::Document,
        },
        ..Config::default()
    });
    let (mut library, _) = library_with_books(&db, &["A", "B"]);
    db.storage().reset_calls();

    let mut proxy = db.collection(&mut library, "books").unwrap();
    let members = proxy.load_target().unwrap();

    assert_eq!(members.len(), 2);
    assert!(members.iter().all(Entity::is_partial));
    assert_eq!(
        members[1].read(TITLE_FIELD).unwrap(),
        Some("B".to_string())
    );
    assert_eq!(db.storage().calls().fetches, 0);
}
