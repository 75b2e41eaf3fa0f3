use std::fmt;

use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Faculty,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Faculty => "faculty",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt.write_str(self.as_str())
    }
}

/// Key for a logged-in person. Student and faculty ids come from separate
/// tables, so the role is part of the key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdentityId {
    pub role: Role,
    pub id: i64,
}

impl fmt::Display for IdentityId {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "{}-{}", self.role, self.id)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub password: String,
    pub role: Role,
    pub id: i64,
}

impl Identity {
    pub fn key(&self) -> IdentityId {
        IdentityId {
            role: self.role,
            id: self.id,
        }
    }
}

#[derive(Debug, FromRow)]
pub struct StudentLogin {
    pub username: String,
    pub password: String,
    pub student_id: i64,
}

#[derive(Debug, FromRow)]
pub struct FacultyLogin {
    pub username: String,
    pub password: String,
    pub faculty_id: i64,
}

/// A credential match, tagged by the table it came from.
#[derive(Debug)]
pub enum Login {
    Student(StudentLogin),
    Faculty(FacultyLogin),
}

impl From<Login> for Identity {
    fn from(login: Login) -> Self {
        match login {
            Login::Student(StudentLogin {
                username,
                password,
                student_id,
            }) => Self {
                username,
                password,
                role: Role::Student,
                id: student_id,
            },
            Login::Faculty(FacultyLogin {
                username,
                password,
                faculty_id,
            }) => Self {
                username,
                password,
                role: Role::Faculty,
                id: faculty_id,
            },
        }
    }
}
