//! Catalog documents as exchanged with the REST backend.

use serde::{Deserialize, Deserializer, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Others,
}

/// A related document that the backend returns either as a bare id or
/// populated in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Reference<T> {
    Id(String),
    Populated(T),
}

impl<T> Reference<T> {
    pub fn populated(&self) -> Option<&T> {
        match self {
            Self::Populated(value) => Some(value),
            Self::Id(_) => None,
        }
    }
}

impl Reference<Person> {
    pub fn id(&self) -> Option<&str> {
        match self {
            Self::Id(id) => Some(id),
            Self::Populated(person) => person.id.as_deref(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Movie {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub desc: String,
    #[serde(default)]
    pub director: String,
    #[serde(default)]
    pub poster: String,
    #[serde(
        rename = "yearOfRelease",
        default,
        deserialize_with = "year_from_number_or_string"
    )]
    pub year_of_release: Option<u16>,
    #[serde(default)]
    pub actors: Vec<Reference<Actor>>,
    #[serde(default)]
    pub producer: Option<Reference<Producer>>,
}

/// Shared shape of actors and producers.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Person {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub bio: String,
    #[serde(default)]
    pub image: String,
    /// ISO date, `YYYY-MM-DD`.
    #[serde(rename = "DOB", default, skip_serializing_if = "Option::is_none")]
    pub dob: Option<String>,
    /// The add forms submit an empty string when no gender was picked.
    #[serde(
        default,
        skip_serializing_if = "Option::is_none",
        deserialize_with = "gender_or_blank"
    )]
    pub gender: Option<Gender>,
}

pub type Actor = Person;
pub type Producer = Person;

/// Body of `add-movie` and `edit-movie`. Relations are sent as ids.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewMovie {
    pub name: String,
    pub desc: String,
    pub director: String,
    pub poster: String,
    #[serde(rename = "yearOfRelease")]
    pub year_of_release: u16,
    pub actors: Vec<String>,
    pub producer: String,
}

/// Body of `add-actor`, `edit-actor`, `add-producer` and `edit-producer`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewPerson {
    pub name: String,
    pub bio: String,
    pub image: String,
    #[serde(rename = "DOB")]
    pub dob: String,
    pub gender: Gender,
}

pub type NewActor = NewPerson;
pub type NewProducer = NewPerson;

/// Response of `GET /health`.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct HealthReport {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub database: Option<String>,
}

impl HealthReport {
    pub fn database_connected(&self) -> bool {
        self.database.as_deref() == Some("connected")
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ApiStatus {
    Up,
    Down,
}

impl ApiStatus {
    pub fn is_up(self) -> bool {
        self == Self::Up
    }
}

/// Reachability of the backend, its database and each entity API.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ServiceStatus {
    pub backend: bool,
    pub database: bool,
    pub actor_api: bool,
    pub movie_api: bool,
    pub producer_api: bool,
}

impl ServiceStatus {
    pub fn all_up(&self) -> bool {
        self.backend && self.database && self.actor_api && self.movie_api && self.producer_api
    }
}

fn gender_or_blank<'de, D>(deserializer: D) -> Result<Option<Gender>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<String>::deserialize(deserializer)? {
        Some(text) if !text.trim().is_empty() => {
            Gender::deserialize(serde::de::value::StrDeserializer::<D::Error>::new(text.trim()))
                .map(Some)
        }
        _ => Ok(None),
    }
}

fn year_from_number_or_string<'de, D>(deserializer: D) -> Result<Option<u16>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(u16),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(year)) => Ok(Some(year)),
        Some(Raw::Text(text)) if text.trim().is_empty() => Ok(None),
        Some(Raw::Text(text)) => text
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid yearOfRelease '{text}'"))),
    }
}
