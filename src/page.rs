use std::fmt::Debug;

use handlebars::{Handlebars, TemplateError};
use log::{error, trace};
use serde::Serialize;
use serde_json::json;
use warp::http::StatusCode;
use warp::reply::{self, Reply, Response};

use crate::school::Error;

const TEMPLATES: [(&str, &str); 6] = [
    ("home", include_str!("../templates/home.hbs")),
    ("login", include_str!("../templates/login.hbs")),
    ("register", include_str!("../templates/register.hbs")),
    ("student", include_str!("../templates/student.hbs")),
    ("faculty", include_str!("../templates/faculty.hbs")),
    ("error", include_str!("../templates/error.hbs")),
];

static HTML_500: &str = r#"<!doctype html>
<html>
<head>
<meta charset="utf-8">
<title>woodle | Error</title>
</head>
<body>
<h1>Internal Server Error</h1>
<p>(Error 500)</p>
</body>
</html>"#;

/// The HTML side of the site, compiled into the binary.
pub struct Pages(Handlebars<'static>);

impl Pages {
    pub fn new() -> Result<Self, TemplateError> {
        let mut h = Handlebars::new();

        h.register_partial("head", include_str!("../templates/head.hbs"))?;
        for (name, template) in TEMPLATES {
            h.register_template_string(name, template)?;
        }

        Ok(Self(h))
    }

    pub fn render<S>(&self, code: StatusCode, template_name: &str, data: &S) -> Response
    where
        S: Serialize + Debug,
    {
        trace!("rendering {template_name:?} ({code})");

        match self.0.render(template_name, data) {
            Ok(body) => reply::with_status(reply::html(body), code).into_response(),
            Err(e) => {
                error!("error rendering template {template_name:?} with data {data:?}: {e}");
                html_500()
            }
        }
    }

    pub fn error(&self, e: Error) -> Response {
        let code = StatusCode::from(e);
        let heading = match e {
            Error::AuthFailed => "Login failed",
            Error::InsertFailed(_) => "Registration failed",
            _ => code.canonical_reason().unwrap_or("Error"),
        };

        self.render(
            code,
            "error",
            &json!({
                "heading": heading,
                "message": e.message(),
                "status": code.as_u16(),
            }),
        )
    }
}

pub fn html_500() -> Response {
    reply::with_status(reply::html(HTML_500), StatusCode::INTERNAL_SERVER_ERROR).into_response()
}
