//! Shared fixtures for the integration tests: a small blog domain with
//! record types and in-memory "persistence" rows.

#![allow(dead_code)]

use brrtbind::config::BindConfig;
use brrtbind::dispatcher::{Dispatcher, EndpointBuilder};
use brrtbind::schema::{NativeObject, NativeValue, Record};
use brrtbind::server::ParamVec;
use brrtbind::signature::DateTime;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
pub struct PostCreate {
    #[record(min_length = 1, max_length = 200)]
    pub title: String,
    pub content: String,
    #[record(ge = 1)]
    pub author_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
pub struct AuthorSchema {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
pub struct PostSchema {
    pub id: i64,
    pub title: String,
    #[record(default)]
    pub published: bool,
    pub created: DateTime,
    pub author: AuthorSchema,
    #[record(default)]
    pub tags: Vec<String>,
    #[record(default)]
    pub word_count: i64,
    #[record(default)]
    pub image: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
pub struct CommentSchema {
    pub post_id: i64,
    #[record(ge = 1, le = 5)]
    pub rating: i64,
    #[record(min_length = 2)]
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Record)]
pub struct PostFilters {
    #[record(default)]
    pub title: Option<String>,
    #[record(default)]
    pub author_id: Option<i64>,
}

/// Author row as the persistence layer hands it out.
pub struct AuthorRow {
    pub id: i64,
    pub name: &'static str,
}

impl NativeObject for AuthorRow {
    fn get_field(&self, name: &str) -> NativeValue {
        match name {
            "id" => self.id.into(),
            "name" => self.name.into(),
            "password_hash" => "never-serialized".into(),
            _ => NativeValue::Absent,
        }
    }

    fn type_name(&self) -> &str {
        "AuthorRow"
    }
}

/// Post row with a computed field, a relation, a nested object and a file.
pub struct PostRow {
    pub id: i64,
    pub title: &'static str,
    pub body: &'static str,
    pub tags: Vec<&'static str>,
    pub author: Arc<AuthorRow>,
    pub image: Option<&'static str>,
}

impl PostRow {
    pub fn sample(id: i64) -> Self {
        Self {
            id,
            title: "Hello",
            body: "one two three",
            tags: vec!["rust", "web"],
            author: Arc::new(AuthorRow { id: 1, name: "ada" }),
            image: None,
        }
    }
}

impl NativeObject for PostRow {
    fn get_field(&self, name: &str) -> NativeValue {
        match name {
            "id" => self.id.into(),
            "title" => self.title.into(),
            "published" => true.into(),
            "created" => "2024-01-02T03:04:05Z".into(),
            "author" => NativeValue::Object(Arc::clone(&self.author) as Arc<dyn NativeObject>),
            "tags" => NativeValue::Relation(self.tags.iter().map(|t| (*t).into()).collect()),
            "word_count" => {
                let words = self.body.split_whitespace().count() as i64;
                NativeValue::callable(move || words.into())
            }
            "image" => NativeValue::File(self.image.map(str::to_string)),
            _ => NativeValue::Absent,
        }
    }

    fn type_name(&self) -> &str {
        "PostRow"
    }
}

pub fn post_rows(n: i64) -> Vec<Arc<dyn NativeObject>> {
    (1..=n)
        .map(|id| Arc::new(PostRow::sample(id)) as Arc<dyn NativeObject>)
        .collect()
}

/// Dispatcher with every endpoint registered under the default configuration.
pub fn dispatcher(endpoints: Vec<EndpointBuilder>) -> Dispatcher {
    dispatcher_with_config(BindConfig::default(), endpoints)
}

pub fn dispatcher_with_config(config: BindConfig, endpoints: Vec<EndpointBuilder>) -> Dispatcher {
    let mut builder = Dispatcher::builder(config);
    for endpoint in endpoints {
        builder.register(endpoint).expect("endpoint should compile");
    }
    builder.build()
}

pub fn path_params(pairs: &[(&str, &str)]) -> ParamVec {
    pairs
        .iter()
        .map(|(k, v)| (Arc::from(*k), (*v).to_string()))
        .collect()
}

pub fn no_params() -> ParamVec {
    ParamVec::new()
}
