//! Shared models and backends for unit tests.

use crate::{
    config::Config,
    db::{Db, search::MemorySearch, store::MemoryStorage},
    model::{
        BASE, DatastreamModel, DependentPolicy, EntityModel, PropertyKind, PropertyModel,
        ReflectionModel,
    },
    types::Field,
};

pub const IS_PART_OF: &str = "info:fedora/fedora-system:def/relations-external#isPartOf";
pub const IS_MEMBER_OF: &str = "info:fedora/fedora-system:def/relations-external#isMemberOf";
pub const HAS_MEMBER: &str = "info:fedora/fedora-system:def/relations-external#hasMember";
pub const HAS_TOPIC: &str = "http://example.org/terms#hasTopic";
pub const IS_TOPIC_OF: &str = "http://example.org/terms#isTopicOf";
pub const TITLE: &str = "http://purl.org/dc/terms/title";
pub const NAME: &str = "http://xmlns.com/foaf/0.1/name";
pub const NUMBER: &str = "http://example.org/terms#pageNumber";
pub const ANNOTATES: &str = "http://example.org/terms#annotates";

pub static LIBRARY: EntityModel = EntityModel {
    path: "test_fixtures::Library",
    name: "Library",
    namespace: None,
    parent: None,
    datastreams: &[],
    properties: &[PropertyModel::new("name", NAME, PropertyKind::Text)],
    reflections: &[ReflectionModel::has_many("books", &BOOK, IS_PART_OF)],
};

pub static BOOK: EntityModel = EntityModel {
    path: "test_fixtures::Book",
    name: "Book",
    namespace: None,
    parent: None,
    datastreams: &[
        DatastreamModel::metadata("descMetadata", "Descriptive metadata"),
        DatastreamModel::file("content", "Content", "text/plain"),
    ],
    properties: &[PropertyModel::new("title", TITLE, PropertyKind::Text)],
    reflections: &[
        ReflectionModel::belongs_to("library", &LIBRARY, IS_PART_OF, "library_id"),
        ReflectionModel::has_many("pages", &PAGE, IS_MEMBER_OF).dependent(DependentPolicy::Destroy),
        ReflectionModel::has_and_belongs_to_many("topics", &TOPIC, HAS_TOPIC, "topic_ids")
            .inverse_of("books"),
    ],
};

pub static PAGE: EntityModel = EntityModel {
    path: "test_fixtures::Page",
    name: "Page",
    namespace: None,
    parent: None,
    datastreams: &[],
    properties: &[PropertyModel::new("number", NUMBER, PropertyKind::Integer)],
    reflections: &[ReflectionModel::belongs_to(
        "book",
        &BOOK,
        IS_MEMBER_OF,
        "book_id",
    )],
};

pub static SPECIAL_PAGE: EntityModel = EntityModel {
    path: "test_fixtures::SpecialPage",
    name: "SpecialPage",
    namespace: None,
    parent: Some(&PAGE),
    datastreams: &[],
    properties: &[],
    reflections: &[],
};

pub static TOPIC: EntityModel = EntityModel {
    path: "test_fixtures::Topic",
    name: "Topic",
    namespace: Some("topic"),
    parent: None,
    datastreams: &[],
    properties: &[PropertyModel::new("name", NAME, PropertyKind::Text)],
    reflections: &[
        ReflectionModel::has_and_belongs_to_many("books", &BOOK, IS_TOPIC_OF, "book_ids")
            .inverse_of("topics"),
    ],
};

pub static COLLECTION: EntityModel = EntityModel {
    path: "test_fixtures::Collection",
    name: "Collection",
    namespace: None,
    parent: None,
    datastreams: &[],
    properties: &[PropertyModel::new("name", NAME, PropertyKind::Text)],
    reflections: &[
        ReflectionModel::has_and_belongs_to_many("members", &BASE, HAS_MEMBER, "member_ids")
            .page_size(10),
    ],
};

/// belongs_to a class with subclasses, so resolution goes through the index.
pub static NOTE: EntityModel = EntityModel {
    path: "test_fixtures::Note",
    name: "Note",
    namespace: None,
    parent: None,
    datastreams: &[],
    properties: &[],
    reflections: &[ReflectionModel::belongs_to(
        "page",
        &PAGE,
        ANNOTATES,
        "page_id",
    )],
};

pub const TITLE_FIELD: Field<Option<String>> = Field::new("title");
pub const LIBRARY_ID: Field<Option<String>> = Field::new("library_id");
pub const NUMBER_FIELD: Field<Option<i64>> = Field::new("number");

/// Fresh `Db` over in-memory backends with every fixture class registered.
pub fn db() -> Db {
    db_with(Config {
        namespace: "test".to_string(),
        ..Config::default()
    })
}

pub fn db_with(config: Config) -> Db {
    let mut db = Db::new(MemoryStorage::new(), MemorySearch::new(), config)
        .expect("fixture config is valid");
    for model in [
        &LIBRARY,
        &BOOK,
        &PAGE,
        &SPECIAL_PAGE,
        &TOPIC,
        &COLLECTION,
        &NOTE,
    ] {
        db.register(model).expect("fixture model is valid");
    }

    db
}
