//! JSON:API request and response bodies.

use chrono::SecondsFormat;
use serde::{Deserialize, Serialize};

use crate::catalog::FileDescriptor;

/// Query string of `GET /files`.
#[derive(Debug, Default, Deserialize)]
pub struct FilesQuery {
    pub since: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FilesResponse {
    pub data: Vec<FileResource>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
    pub attributes: FileAttributes,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FileAttributes {
    pub name: String,
    pub created: String,
}

impl From<FileDescriptor> for FileResource {
    fn from(file: FileDescriptor) -> Self {
        Self {
            kind: "files".to_string(),
            id: file.id,
            attributes: FileAttributes {
                name: file.name,
                created: file.created.to_rfc3339_opts(SecondsFormat::Millis, true),
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct LoginResponse {
    pub links: Links,
    pub data: SessionResource,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Links {
    #[serde(rename = "self")]
    pub self_link: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResource {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl LoginResponse {
    pub fn new(id: String) -> Self {
        Self {
            links: Links {
                self_link: "/sessions/current".to_string(),
            },
            data: SessionResource {
                kind: "sessions".to_string(),
                id,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub errors: Vec<ErrorObject>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorObject {
    pub status: String,
    pub title: String,
}
