use std::{result, sync::Arc};

use log::{error, info, trace, warn};
use serde::Serialize;
use warp::http;

use crate::auth::{SessionId, Sessions};
use crate::backend::{Backend, FindError};
use crate::grade::{FacultyGrade, StudentGrade};
use crate::identity::{Identity, Role};
use crate::person::NewPerson;

pub struct School {
    backend: Backend,
    sessions: Sessions,
}

pub struct SchoolAuthed<const USER_MATCH: bool = false> {
    school: Arc<School>,
    session_id: SessionId,
    identity: Identity,
}

/// Everything shown on a student's or faculty member's own page.
#[derive(Debug, Serialize)]
pub struct Profile {
    pub username: String,
    pub full_name: String,
    pub role: Role,
    pub student_grades: Vec<StudentGrade>,
    pub faculty_grades: Vec<FacultyGrade>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Error {
    NotFound(&'static str),
    Validation(&'static str),
    InsertFailed(&'static str),
    AuthFailed,
    Internal,
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn message(&self) -> &'static str {
        match *self {
            Self::NotFound(msg) | Self::Validation(msg) | Self::InsertFailed(msg) => msg,
            Self::AuthFailed => "login failed",
            Self::Internal => "internal error",
        }
    }
}

impl From<Error> for http::StatusCode {
    fn from(e: Error) -> Self {
        match e {
            Error::NotFound(_) => http::StatusCode::NOT_FOUND,
            Error::Validation(_) => http::StatusCode::UNPROCESSABLE_ENTITY,
            Error::InsertFailed(_) => http::StatusCode::METHOD_NOT_ALLOWED,
            Error::AuthFailed => http::StatusCode::UNAUTHORIZED,
            Error::Internal => http::StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl warp::reject::Reject for Error {}

fn internal(_: ()) -> Error {
    Error::Internal
}

impl School {
    pub fn new(backend: Backend) -> Self {
        Self {
            backend,
            sessions: Sessions::default(),
        }
    }

    pub async fn run_script(&self, script: &str) -> Result<u64> {
        self.backend.execute_script(script).await.map_err(internal)
    }

    /// Turns credentials into an identity, or `None` when neither a student
    /// nor a faculty member has them.
    pub async fn resolve(&self, username: &str, password: &str) -> Result<Option<Identity>> {
        let login = self
            .backend
            .find_login(username, password)
            .await
            .map_err(internal)?;

        if login.is_none() {
            info!("{username} login: no matching student or faculty");
        }
        Ok(login.map(Identity::from))
    }

    /// Starts a session for an identity returned by `resolve`.
    pub async fn login(self: &Arc<Self>, identity: Identity) -> Result<SchoolAuthed<true>> {
        let Some(session_id) = self.sessions.begin(identity.clone()).await else {
            return Err(Error::AuthFailed);
        };
        info!("{} login: {} session created", identity.username, identity.role);

        Ok(SchoolAuthed {
            school: Arc::clone(self),
            session_id,
            identity,
        })
    }

    pub async fn authenticate(self: &Arc<Self>, session_id: SessionId) -> Result<SchoolAuthed> {
        match self.sessions.resolve(&session_id).await {
            Some(identity) => {
                trace!("found {} by session", identity.username);
                Ok(SchoolAuthed {
                    school: Arc::clone(self),
                    session_id,
                    identity,
                })
            }
            None => {
                warn!("no identity for session {session_id}");
                Err(Error::AuthFailed)
            }
        }
    }

    /// Inserts a student or faculty member and echoes what was stored.
    pub async fn insert_person(&self, person: NewPerson) -> Result<NewPerson> {
        let role = person.role();

        let id = self.backend.insert_person(&person).await.map_err(|()| {
            Error::InsertFailed(match role {
                Role::Student => "unable to insert that student",
                Role::Faculty => "unable to insert that faculty",
            })
        })?;

        info!("{} registered as {role} {id}", person.username);
        Ok(person)
    }

    pub async fn student_grades(&self, username: Option<&str>) -> Result<Vec<StudentGrade>> {
        self.backend.student_grades(username).await.map_err(internal)
    }

    pub async fn student_grades_by_id(&self, student_id: i64) -> Result<Vec<StudentGrade>> {
        if !self.backend.student_exists(student_id).await.map_err(internal)? {
            return Err(Error::NotFound("student with that id not found"));
        }

        self.backend
            .student_grades_by_id(student_id)
            .await
            .map_err(internal)
    }

    /// As `student_grades`, but having nothing to show is an error.
    pub async fn grades(&self, username: Option<&str>) -> Result<Vec<StudentGrade>> {
        let grades = self.student_grades(username).await?;

        if grades.is_empty() {
            return Err(Error::NotFound(
                "grades for that student and/or class were not found",
            ));
        }
        Ok(grades)
    }

    pub async fn faculty_grades(&self, username: Option<&str>) -> Result<Vec<FacultyGrade>> {
        self.backend.faculty_grades(username).await.map_err(internal)
    }

    pub async fn display_name(&self, username: &str, role: Role) -> Result<String> {
        self.backend
            .display_name(username, role)
            .await
            .map_err(|e| match e {
                FindError::NotFound => Error::NotFound("no user with that username"),
                FindError::Internal => Error::Internal,
            })
    }
}

impl<const USER_MATCH: bool> SchoolAuthed<USER_MATCH> {
    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    pub fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    pub async fn logout(&self) -> bool {
        info!("{} logout", self.identity.username);
        self.school.sessions.end(&self.session_id).await
    }
}

impl SchoolAuthed {
    /// Only the person themselves may see their page.
    pub fn with_user(self, username: &str, role: Role) -> Result<SchoolAuthed<true>> {
        if username == self.identity.username && role == self.identity.role {
            Ok(SchoolAuthed {
                school: self.school,
                session_id: self.session_id,
                identity: self.identity,
            })
        } else {
            error!(
                "mismatching session & page: session={{ username: {}, role: {} }}, page={{ username: {username}, role: {role} }}",
                self.identity.username,
                self.identity.role,
            );
            Err(Error::AuthFailed)
        }
    }
}

impl SchoolAuthed<true> {
    pub async fn profile(&self) -> Result<Profile> {
        let Identity { username, role, .. } = &self.identity;
        let school = &self.school;

        let full_name = school.display_name(username, *role).await?;
        let (student_grades, faculty_grades) = match role {
            Role::Student => (school.student_grades(Some(username.as_str())).await?, vec![]),
            Role::Faculty => (vec![], school.faculty_grades(Some(username.as_str())).await?),
        };

        trace!(
            "{username} profile: {} student grades, {} faculty grades",
            student_grades.len(),
            faculty_grades.len(),
        );

        Ok(Profile {
            username: username.clone(),
            full_name,
            role: *role,
            student_grades,
            faculty_grades,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    use crate::backend;

    async fn create_school() -> Arc<School> {
        Arc::new(School::new(backend::test::seeded().await))
    }

    async fn login(school: &Arc<School>, username: &str, password: &str) -> SchoolAuthed<true> {
        let identity = school.resolve(username, password).await.unwrap().unwrap();
        school.login(identity).await.unwrap()
    }

    fn alice(title: Option<&str>) -> NewPerson {
        NewPerson {
            username: "alice".into(),
            password: "pw1".into(),
            name: "Alice A".into(),
            class_id: 1,
            title: title.map(Into::into),
        }
    }

    #[tokio::test]
    async fn student_takes_precedence() {
        let school = create_school().await;

        school.insert_person(alice(None)).await.unwrap();
        school.insert_person(alice(Some("dean"))).await.unwrap();

        let identity = school.resolve("alice", "pw1").await.unwrap().unwrap();
        assert_eq!(
            identity,
            Identity {
                username: "alice".into(),
                password: "pw1".into(),
                role: Role::Student,
                id: 3,
            }
        );
    }

    #[tokio::test]
    async fn faculty_resolves() {
        let school = create_school().await;

        let identity = school.resolve("jkaine", "jk").await.unwrap().unwrap();
        assert_eq!(identity.role, Role::Faculty);
        assert_eq!(identity.id, 1);

        assert_eq!(school.resolve("jkaine", "nope").await, Ok(None));
    }

    #[tokio::test]
    async fn login_then_authenticate() {
        let school = create_school().await;

        let authed = login(&school, "jjohns", "jj").await;
        let session_id = *authed.session_id();

        let again = school.authenticate(session_id).await.unwrap();
        assert_eq!(again.identity().username, "jjohns");

        let page = again.with_user("jjohns", Role::Student).unwrap();
        let profile = page.profile().await.unwrap();
        assert_eq!(profile.full_name, "Johnny Johns");
        assert_eq!(profile.student_grades.len(), 1);
        assert!(profile.faculty_grades.is_empty());

        assert!(page.logout().await);
        assert_eq!(school.authenticate(session_id).await.err(), Some(Error::AuthFailed));
    }

    #[tokio::test]
    async fn unknown_login() {
        let school = create_school().await;

        assert_eq!(school.resolve("nobody", "pw").await, Ok(None));
    }

    #[tokio::test]
    async fn duplicate_username_gets_no_session() {
        let school = create_school().await;

        school.insert_person(alice(None)).await.unwrap();
        school
            .insert_person(NewPerson {
                password: "pw2".into(),
                ..alice(None)
            })
            .await
            .unwrap();

        let first = login(&school, "alice", "pw1").await;
        assert_eq!(first.identity().id, 3);

        let second = school.resolve("alice", "pw2").await.unwrap().unwrap();
        assert_eq!(second.id, 4);
        assert_eq!(school.login(second).await.err(), Some(Error::AuthFailed));
    }

    #[tokio::test]
    async fn page_for_someone_else() {
        let school = create_school().await;

        let authed = login(&school, "jjohns", "jj").await;
        let authed = school.authenticate(*authed.session_id()).await.unwrap();

        assert_eq!(
            authed.with_user("jjohns", Role::Faculty).err(),
            Some(Error::AuthFailed)
        );
    }

    #[tokio::test]
    async fn faculty_profile() {
        let school = create_school().await;

        let authed = login(&school, "jkaine", "jk").await;
        let profile = authed.profile().await.unwrap();

        assert_eq!(profile.full_name, "Jane Kaine");
        assert_eq!(profile.faculty_grades.len(), 2);
    }

    #[tokio::test]
    async fn inserted_name_is_displayed() {
        let school = create_school().await;

        let echoed = school.insert_person(alice(Some("dean"))).await.unwrap();
        assert_eq!(echoed, alice(Some("dean")));

        assert_eq!(school.display_name("alice", Role::Faculty).await.unwrap(), "Alice A");
        assert_eq!(
            school.display_name("alice", Role::Student).await,
            Err(Error::NotFound("no user with that username"))
        );
    }

    #[tokio::test]
    async fn grade_lookups() {
        let school = create_school().await;

        assert_eq!(school.grades(Some("jjohns")).await.unwrap().len(), 1);
        assert!(matches!(school.grades(Some("nobody")).await, Err(Error::NotFound(_))));

        assert_eq!(school.student_grades_by_id(2).await.unwrap()[0].grade, "B+");
        assert_eq!(
            school.student_grades_by_id(42).await,
            Err(Error::NotFound("student with that id not found"))
        );
    }

    #[test]
    fn status_codes() {
        let code = |e: Error| http::StatusCode::from(e).as_u16();

        assert_eq!(code(Error::NotFound("")), 404);
        assert_eq!(code(Error::Validation("")), 422);
        assert_eq!(code(Error::InsertFailed("")), 405);
        assert_eq!(code(Error::AuthFailed), 401);
        assert_eq!(code(Error::Internal), 500);
    }
}
