use serde::{Deserialize, Serialize};

use crate::identity::Role;
use crate::school::{Error, Result};

pub const STUDENT_FIELDS: &str = "username, password, name, class_id required";
pub const FACULTY_FIELDS: &str = "username, password, name, class_id, title required";

/// A student (no title) or faculty member (with title), as inserted and as
/// echoed back to the client.
#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewPerson {
    pub username: String,
    pub password: String,
    pub name: String,
    pub class_id: i64,
    pub title: Option<String>,
}

impl NewPerson {
    pub fn role(&self) -> Role {
        match self.title {
            Some(_) => Role::Faculty,
            None => Role::Student,
        }
    }
}

/// Form body of `POST /api/students/` and `POST /api/faculty/`.
#[derive(Debug, Deserialize, Default)]
pub struct PersonForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub name: Option<String>,
    pub class_id: Option<String>,
    pub title: Option<String>,
}

impl PersonForm {
    pub fn student(self) -> Result<NewPerson> {
        let Self {
            username,
            password,
            name,
            class_id,
            title: _,
        } = self;

        person(username, password, name, class_id, None).ok_or(Error::Validation(STUDENT_FIELDS))
    }

    pub fn faculty(self) -> Result<NewPerson> {
        let Self {
            username,
            password,
            name,
            class_id,
            title,
        } = self;

        let title = title.ok_or(Error::Validation(FACULTY_FIELDS))?;

        person(username, password, name, class_id, Some(title))
            .ok_or(Error::Validation(FACULTY_FIELDS))
    }
}

/// Form body of `POST /register`. Every field must be present, whichever
/// kind of person is registering.
#[derive(Debug, Deserialize, Default)]
pub struct RegisterForm {
    pub username: Option<String>,
    pub password: Option<String>,
    pub is_student: Option<String>,
    pub name: Option<String>,
    pub title: Option<String>,
    pub class_id: Option<String>,
}

impl RegisterForm {
    pub fn into_person(self) -> Option<NewPerson> {
        let Self {
            username,
            password,
            is_student,
            name,
            title,
            class_id,
        } = self;

        let title = title?;
        let title = if parse_yes(&is_student?) {
            None
        } else {
            Some(title)
        };

        person(username, password, name, class_id, title)
    }
}

fn person(
    username: Option<String>,
    password: Option<String>,
    name: Option<String>,
    class_id: Option<String>,
    title: Option<String>,
) -> Option<NewPerson> {
    Some(NewPerson {
        username: username?,
        password: password?,
        name: name?,
        class_id: class_id?.trim().parse().ok()?,
        title,
    })
}

pub fn parse_yes(s: &str) -> bool {
    matches!(
        s.trim().to_ascii_lowercase().as_str(),
        "y" | "yes" | "true" | "1"
    )
}
