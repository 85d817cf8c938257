//! Shared entity models for integration tests.
//!
//! ```text
//! Library 1--* Book 1--* Page <|-- SpecialPage
//! Book *--* Topic                  (two-way, inverse arrays)
//! Collection *--> anything         (one-way, paged id lookups)
//! ```

use repodb_core::{
    config::Config,
    db::{Db, search::MemorySearch, store::MemoryStorage},
    error::InternalError,
    model::{
        BASE, DatastreamModel, DependentPolicy, EntityModel, PropertyKind, PropertyModel,
        ReflectionModel,
    },
    types::Field,
};

///
/// PREDICATES
///

pub const IS_PART_OF: &str = "info:fedora/fedora-system:def/relations-external#isPartOf";
pub const IS_MEMBER_OF: &str = "info:fedora/fedora-system:def/relations-external#isMemberOf";
pub const HAS_MEMBER: &str = "info:fedora/fedora-system:def/relations-external#hasMember";
pub const HAS_TOPIC: &str = "http://example.org/terms#hasTopic";
pub const IS_TOPIC_OF: &str = "http://example.org/terms#isTopicOf";
pub const TITLE: &str = "http://purl.org/dc/terms/title";
pub const NAME: &str = "http://xmlns.com/foaf/0.1/name";
pub const NUMBER: &str = "http://example.org/terms#pageNumber";

///
/// MODELS
///

pub static LIBRARY: EntityModel = EntityModel {
    path: "fixtures::Library",
    name: "Library",
    namespace: None,
    parent: None,
    datastreams: &[],
    properties: &[PropertyModel::new("name", NAME, PropertyKind::Text)],
    reflections: &[ReflectionModel::has_many("books", &BOOK, IS_PART_OF)],
};

pub static BOOK: EntityModel = EntityModel {
    path: "fixtures::Book",
    name: "Book",
    namespace: None,
    parent: None,
    datastreams: &[
        DatastreamModel::metadata("descMetadata", "Descriptive metadata"),
        DatastreamModel::file("content", "Content", "text/plain"),
    ],
    properties: &[
        PropertyModel::new("title", TITLE, PropertyKind::Text),
        PropertyModel::new("subject", "http://purl.org/dc/terms/subject", PropertyKind::Text)
            .multiple(),
    ],
    reflections: &[
        ReflectionModel::belongs_to("library", &LIBRARY, IS_PART_OF, "library_id"),
        ReflectionModel::has_many("pages", &PAGE, IS_MEMBER_OF)
            .dependent(DependentPolicy::Destroy),
        ReflectionModel::has_and_belongs_to_many("topics", &TOPIC, HAS_TOPIC, "topic_ids")
            .inverse_of("books"),
    ],
};

pub static PAGE: EntityModel = EntityModel {
    path: "fixtures::Page",
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
    path: "fixtures::SpecialPage",
    name: "SpecialPage",
    namespace: None,
    parent: Some(&PAGE),
    datastreams: &[],
    properties: &[],
    reflections: &[],
};

pub static TOPIC: EntityModel = EntityModel {
    path: "fixtures::Topic",
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
    path: "fixtures::Collection",
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

/// Standalone class with no associations.
pub static THING: EntityModel = EntityModel {
    path: "fixtures::Thing",
    name: "Thing",
    namespace: Some("thing"),
    parent: None,
    datastreams: &[DatastreamModel::file("content", "Content", "application/octet-stream")],
    properties: &[PropertyModel::new("name", NAME, PropertyKind::Text)],
    reflections: &[],
};

pub static ALL_MODELS: [&EntityModel; 7] = [
    &LIBRARY,
    &BOOK,
    &PAGE,
    &SPECIAL_PAGE,
    &TOPIC,
    &COLLECTION,
    &THING,
];

///
/// FIELDS
///

pub mod fields {
    use super::Field;

    pub const TITLE: Field<Option<String>> = Field::new("title");
    pub const SUBJECT: Field<Vec<String>> = Field::new("subject");
    pub const NAME: Field<Option<String>> = Field::new("name");
    pub const NUMBER: Field<Option<i64>> = Field::new("number");
    pub const LIBRARY_ID: Field<Option<String>> = Field::new("library_id");
    pub const BOOK_ID: Field<Option<String>> = Field::new("book_id");
    pub const TOPIC_IDS: Field<Vec<String>> = Field::new("topic_ids");
    pub const BOOK_IDS: Field<Vec<String>> = Field::new("book_ids");
    pub const MEMBER_IDS: Field<Vec<String>> = Field::new("member_ids");
}

///
/// DB
///

/// Test config: namespace `test`, everything else default.
#[must_use]
pub fn config() -> Config {
    Config {
        namespace: "test".to_string(),
        ..Config::default()
    }
}

/// In-memory `Db` with every fixture class registered.
pub fn db() -> Result<Db, InternalError> {
    db_with(config())
}

pub fn db_with(config: Config) -> Result<Db, InternalError> {
    let mut db = Db::new(MemoryStorage::new(), MemorySearch::new(), config)?;
    for model in ALL_MODELS {
        db.register(model)?;
    }

    Ok(db)
}
