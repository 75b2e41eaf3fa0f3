use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct StudentGrade {
    #[serde(rename = "s_name")]
    pub student_name: String,
    #[serde(rename = "c_name")]
    pub class_name: String,
    pub grade: String,
}

/// A grade as seen by the faculty member who gave it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct FacultyGrade {
    #[serde(rename = "f_name")]
    pub faculty_name: String,
    #[serde(rename = "c_name")]
    pub class_name: String,
    #[serde(rename = "s_name")]
    pub student_name: String,
    pub grade: String,
}

#[derive(Debug, FromRow)]
pub struct DisplayName {
    pub name: String,
}
