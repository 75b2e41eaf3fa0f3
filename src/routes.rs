use std::str::FromStr;
use std::string::FromUtf8Error;
use std::sync::Arc;

use cookie::Cookie;
use log::{error, trace};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::json;
use warp::http::uri::InvalidUri;
use warp::http::{StatusCode, Uri};
use warp::reply::{self, Response};
use warp::{Filter, Rejection, Reply};

use crate::auth::{LoginForm, SessionId};
use crate::identity::Role;
use crate::page::{self, Pages};
use crate::person::{NewPerson, PersonForm, RegisterForm};
use crate::school::{self, Error, School, SchoolAuthed};

const SESSION_COOKIE: &str = "sessionid";
const FORM_LIMIT: u64 = 16 * 1024;

/// A username from a path segment, percent-decoded.
struct PathUsername(String);

impl FromStr for PathUsername {
    type Err = FromUtf8Error;

    fn from_str(segment: &str) -> Result<Self, Self::Err> {
        urlencoding::decode(segment).map(|name| Self(name.into_owned()))
    }
}

/// Every page and API endpoint, as one filter.
pub fn routes(
    school: Arc<School>,
    pages: Arc<Pages>,
    secure: bool,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    let with_school = warp::any().map(move || Arc::clone(&school));
    let with_pages = warp::any().map(move || Arc::clone(&pages));
    let authed = warp::cookie::optional(SESSION_COOKIE)
        .and(with_school.clone())
        .and_then(session);

    let home = {
        let index = warp::path::end()
            .or(warp::path!("hello"))
            .unify()
            .and(warp::get())
            .and(with_pages.clone())
            .map(|pages: Arc<Pages>| pages.render(StatusCode::OK, "home", &json!({})));

        let welcome = warp::path!("home")
            .and(warp::get())
            .map(|| reply::html("<h1>Welcome home!</h1>"));

        index.or(welcome)
    };

    let login = {
        let form = warp::path!("login")
            .and(warp::get())
            .and(with_pages.clone())
            .map(|pages: Arc<Pages>| pages.render(StatusCode::OK, "login", &json!({})));

        let submit = warp::path!("login")
            .and(warp::post())
            .and(form_body::<LoginForm>())
            .and(with_school.clone())
            .and(with_pages.clone())
            .then(move |form, school, pages| login(form, school, pages, secure));

        let logout = warp::path!("logout")
            .and(warp::get().or(warp::post()).unify())
            .and(warp::cookie::optional(SESSION_COOKIE))
            .and(with_school.clone())
            .then(move |cookie: Option<String>, school| logout(cookie, school, secure));

        form.or(submit).or(logout)
    };

    let register = {
        let form = warp::path!("register")
            .and(warp::get())
            .and(with_pages.clone())
            .map(|pages: Arc<Pages>| pages.render(StatusCode::OK, "register", &json!({})));

        let submit = warp::path!("register")
            .and(warp::post())
            .and(form_body::<RegisterForm>())
            .and(with_school.clone())
            .and(with_pages.clone())
            .then(register);

        form.or(submit)
    };

    let profiles = {
        let student = warp::path!("student" / PathUsername)
            .and(warp::get())
            .and(authed.clone())
            .and(with_pages.clone())
            .then(|username, authed, pages| profile(username, Role::Student, authed, pages));

        let faculty = warp::path!("faculty" / PathUsername)
            .and(warp::get())
            .and(authed)
            .and(with_pages)
            .then(|username, authed, pages| profile(username, Role::Faculty, authed, pages));

        student.or(faculty)
    };

    let students = {
        let all = warp::path!("api" / "students")
            .and(warp::get())
            .and(with_school.clone())
            .then(|school: Arc<School>| async move {
                json_reply(school.student_grades(None).await)
            });

        let one = warp::path!("api" / "students" / i64)
            .and(warp::get())
            .and(with_school.clone())
            .then(|student_id, school: Arc<School>| async move {
                json_reply(school.student_grades_by_id(student_id).await)
            });

        let create = warp::path!("api" / "students")
            .and(warp::post())
            .and(form_body::<PersonForm>())
            .and(with_school.clone())
            .then(|form: PersonForm, school: Arc<School>| async move {
                json_reply(insert(form.student(), &school).await)
            });

        all.or(one).or(create)
    };

    let faculty = {
        let all = warp::path!("api" / "faculty")
            .and(warp::get())
            .and(with_school.clone())
            .then(|school: Arc<School>| async move {
                json_reply(school.faculty_grades(None).await)
            });

        let one = warp::path!("api" / "faculty" / PathUsername)
            .and(warp::get())
            .and(with_school.clone())
            .then(|username: PathUsername, school: Arc<School>| async move {
                json_reply(school.faculty_grades(Some(username.0.as_str())).await)
            });

        let create = warp::path!("api" / "faculty")
            .and(warp::post())
            .and(form_body::<PersonForm>())
            .and(with_school.clone())
            .then(|form: PersonForm, school: Arc<School>| async move {
                json_reply(insert(form.faculty(), &school).await)
            });

        all.or(one).or(create)
    };

    let grades = {
        let all = warp::path!("api" / "grades")
            .and(warp::get())
            .and(with_school.clone())
            .then(|school: Arc<School>| async move { json_reply(school.grades(None).await) });

        let one = warp::path!("api" / "grades" / PathUsername)
            .and(warp::get())
            .and(with_school)
            .then(|username: PathUsername, school: Arc<School>| async move {
                json_reply(school.grades(Some(username.0.as_str())).await)
            });

        all.or(one)
    };

    home.or(login)
        .or(register)
        .or(profiles)
        .or(students)
        .or(faculty)
        .or(grades)
        .recover(to_login)
        .with(warp::log("woodle"))
}

fn form_body<T>() -> impl Filter<Extract = (T,), Error = Rejection> + Clone
where
    T: DeserializeOwned + Send,
{
    warp::body::content_length_limit(FORM_LIMIT).and(warp::body::form())
}

async fn session(
    cookie: Option<String>,
    school: Arc<School>,
) -> Result<SchoolAuthed, Rejection> {
    let session_id = cookie
        .and_then(|c| c.parse::<SessionId>().ok())
        .ok_or_else(|| warp::reject::custom(Error::AuthFailed))?;

    school
        .authenticate(session_id)
        .await
        .map_err(warp::reject::custom)
}

/// Pages behind a login send anonymous visitors to the login form.
async fn to_login(err: Rejection) -> Result<Response, Rejection> {
    match err.find::<Error>() {
        Some(Error::AuthFailed) => Ok(see_other("/login")),
        _ => Err(err),
    }
}

async fn login(form: LoginForm, school: Arc<School>, pages: Arc<Pages>, secure: bool) -> Response {
    let Some((username, password)) = form.credentials() else {
        trace!("login without username or password");
        return see_other("/login");
    };

    let identity = match school.resolve(&username, &password).await {
        Ok(Some(identity)) => identity,
        // unknown user or wrong password: offer to register
        Ok(None) => return see_other("/register"),
        Err(e) => return pages.error(e),
    };

    let location = match profile_uri(identity.role, &identity.username) {
        Ok(uri) => uri,
        Err(e) => {
            error!("no page for {}: {e}", identity.username);
            return page::html_500();
        }
    };

    let authed = match school.login(identity).await {
        Ok(authed) => authed,
        Err(e) => return pages.error(e),
    };
    let cookie = Cookie::build((SESSION_COOKIE, authed.session_id().to_string()))
        .path("/")
        .http_only(true)
        .secure(secure)
        .build();

    reply::with_header(
        warp::redirect::see_other(location),
        "set-cookie",
        cookie.to_string(),
    )
    .into_response()
}

fn profile_uri(role: Role, username: &str) -> Result<Uri, InvalidUri> {
    format!("/{role}/{}", urlencoding::encode(username)).parse()
}

async fn logout(cookie: Option<String>, school: Arc<School>, secure: bool) -> Response {
    let session_id = cookie.and_then(|c| c.parse::<SessionId>().ok());

    if let Some(session_id) = session_id {
        if let Ok(authed) = school.authenticate(session_id).await {
            authed.logout().await;
        }
    }

    let mut cookie = Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .http_only(true)
        .secure(secure)
        .build();
    cookie.make_removal();

    reply::with_header(see_other("/login"), "set-cookie", cookie.to_string()).into_response()
}

async fn register(form: RegisterForm, school: Arc<School>, pages: Arc<Pages>) -> Response {
    let Some(person) = form.into_person() else {
        trace!("incomplete registration");
        return see_other("/register");
    };

    match school.insert_person(person).await {
        Ok(_) => see_other("/login"),
        Err(e) => pages.error(e),
    }
}

async fn profile(
    username: PathUsername,
    role: Role,
    authed: SchoolAuthed,
    pages: Arc<Pages>,
) -> Response {
    let authed = match authed.with_user(&username.0, role) {
        Ok(authed) => authed,
        Err(e) => return pages.error(e),
    };

    match authed.profile().await {
        Ok(profile) => pages.render(StatusCode::OK, role.as_str(), &profile),
        Err(e) => pages.error(e),
    }
}

async fn insert(person: school::Result<NewPerson>, school: &School) -> school::Result<Vec<NewPerson>> {
    let inserted = school.insert_person(person?).await?;
    Ok(vec![inserted])
}

fn json_reply<T: Serialize>(result: school::Result<T>) -> Response {
    match result {
        Ok(body) => reply::json(&body).into_response(),
        Err(e) => reply::with_status(
            reply::json(&json!([{ "error": e.message() }])),
            StatusCode::from(e),
        )
        .into_response(),
    }
}

fn see_other(location: &str) -> Response {
    match location.parse::<Uri>() {
        Ok(uri) => warp::redirect::see_other(uri).into_response(),
        Err(e) => {
            error!("can't redirect to {location:?}: {e}");
            page::html_500()
        }
    }
}
