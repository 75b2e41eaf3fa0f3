use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use sqlx::{
    migrate::MigrateDatabase,
    query, query_as,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Executor, Pool, Sqlite,
};

use log::{error, info};

use crate::grade::{DisplayName, FacultyGrade, StudentGrade};
use crate::identity::{FacultyLogin, Login, Role, StudentLogin};
use crate::person::NewPerson;

type Result<T> = std::result::Result<T, ()>;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Debug)]
pub enum FindError {
    NotFound,
    Internal,
}

pub struct Backend(pub Pool<Sqlite>);

fn into_sql(path: &Path) -> PathBuf {
    path.join("woodle.sqlite")
}

impl Backend {
    pub async fn new(data_dir: &Path) -> std::result::Result<Self, sqlx::Error> {
        let db_pathbuf = into_sql(data_dir);
        let url = format!("sqlite://{}", db_pathbuf.display());

        if !Sqlite::database_exists(&url).await? {
            Sqlite::create_database(&url).await?;
            info!("created {}", db_pathbuf.display());
        }

        let options = SqliteConnectOptions::from_str(&url)?.busy_timeout(CONNECT_TIMEOUT);
        let pool = SqlitePoolOptions::new()
            .acquire_timeout(CONNECT_TIMEOUT)
            .connect_with(options)
            .await?;

        sqlx::migrate!("./migrations").run(&pool).await?;

        info!("using {}", db_pathbuf.display());
        Ok(Self(pool))
    }

    /// Runs an init or seed script as-is, every statement in order.
    pub async fn execute_script(&self, script: &str) -> Result<u64> {
        self.0
            .execute(script)
            .await
            .map(|done| done.rows_affected())
            .map_err(|e| {
                error!("error running sql script: {e:?}");
            })
    }
}

const STUDENT_GRADES: &str = "
    SELECT student.name AS student_name, class.name AS class_name, grade.grade
    FROM student
    INNER JOIN grade
        ON grade.student_id = student.student_id
    INNER JOIN class
        ON class.class_id = grade.class_id
";

const FACULTY_GRADES: &str = "
    SELECT faculty.name AS faculty_name, class.name AS class_name,
        student.name AS student_name, grade.grade
    FROM grade
    INNER JOIN faculty
        ON faculty.faculty_id = grade.faculty_id
    INNER JOIN student
        ON student.student_id = grade.student_id
    INNER JOIN class
        ON class.class_id = grade.class_id
";

impl Backend {
    /// Every student's grades, or just `username`'s.
    pub async fn student_grades(&self, username: Option<&str>) -> Result<Vec<StudentGrade>> {
        let sql = format!(
            "{STUDENT_GRADES}
            WHERE (?1 IS NULL OR student.username = ?1)
            ORDER BY student.student_id, class.class_id"
        );

        query_as::<_, StudentGrade>(&sql)
            .bind(username)
            .fetch_all(&self.0)
            .await
            .map_err(|e| {
                error!("error selecting student grades: {e:?}");
            })
    }

    pub async fn student_grades_by_id(&self, student_id: i64) -> Result<Vec<StudentGrade>> {
        let sql = format!(
            "{STUDENT_GRADES}
            WHERE student.student_id = ?
            ORDER BY class.class_id"
        );

        query_as::<_, StudentGrade>(&sql)
            .bind(student_id)
            .fetch_all(&self.0)
            .await
            .map_err(|e| {
                error!("error selecting grades for student {student_id}: {e:?}");
            })
    }

    pub async fn student_exists(&self, student_id: i64) -> Result<bool> {
        query("SELECT 1 FROM student WHERE student_id = ?")
            .bind(student_id)
            .fetch_optional(&self.0)
            .await
            .map(|row| row.is_some())
            .map_err(|e| {
                error!("error looking up student {student_id}: {e:?}");
            })
    }

    /// Grades given by every faculty member, or just by `username`.
    pub async fn faculty_grades(&self, username: Option<&str>) -> Result<Vec<FacultyGrade>> {
        let sql = format!(
            "{FACULTY_GRADES}
            WHERE (?1 IS NULL OR faculty.username = ?1)
            ORDER BY faculty.faculty_id, class.class_id, student.student_id"
        );

        query_as::<_, FacultyGrade>(&sql)
            .bind(username)
            .fetch_all(&self.0)
            .await
            .map_err(|e| {
                error!("error selecting faculty grades: {e:?}");
            })
    }

    pub async fn display_name(&self, username: &str, role: Role) -> std::result::Result<String, FindError> {
        let sql = match role {
            Role::Student => "SELECT name FROM student WHERE username = ?",
            Role::Faculty => "SELECT name FROM faculty WHERE username = ?",
        };

        query_as::<_, DisplayName>(sql)
            .bind(username)
            .fetch_optional(&self.0)
            .await
            .map_err(|e| {
                error!("error selecting {role} name for {username}: {e:?}");
                FindError::Internal
            })?
            .map(|row| row.name)
            .ok_or(FindError::NotFound)
    }
}

impl Backend {
    /// Looks for a student with these credentials, then a faculty member.
    pub async fn find_login(&self, username: &str, password: &str) -> Result<Option<Login>> {
        let student = query_as::<_, StudentLogin>(
            "
            SELECT username, password, student_id
            FROM student
            WHERE username = ? AND password = ?
            ",
        )
        .bind(username)
        .bind(password)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("error looking up student login for {username}: {e:?}");
        })?;

        if let Some(student) = student {
            return Ok(Some(Login::Student(student)));
        }

        let faculty = query_as::<_, FacultyLogin>(
            "
            SELECT username, password, faculty_id
            FROM faculty
            WHERE username = ? AND password = ?
            ",
        )
        .bind(username)
        .bind(password)
        .fetch_optional(&self.0)
        .await
        .map_err(|e| {
            error!("error looking up faculty login for {username}: {e:?}");
        })?;

        Ok(faculty.map(Login::Faculty))
    }

    /// Inserts into `student` or, when a title is given, `faculty`.
    /// Returns the new row's id.
    pub async fn insert_person(&self, person: &NewPerson) -> Result<i64> {
        let NewPerson {
            username,
            password,
            name,
            class_id,
            title,
        } = person;

        let inserted = match title {
            None => {
                query(
                    "
                    INSERT INTO student
                    (username, password, name, class_id)
                    VALUES
                    (?, ?, ?, ?)
                    ",
                )
                .bind(username)
                .bind(password)
                .bind(name)
                .bind(class_id)
                .execute(&self.0)
                .await
            }
            Some(title) => {
                query(
                    "
                    INSERT INTO faculty
                    (username, password, name, class_id, title)
                    VALUES
                    (?, ?, ?, ?, ?)
                    ",
                )
                .bind(username)
                .bind(password)
                .bind(name)
                .bind(class_id)
                .bind(title)
                .execute(&self.0)
                .await
            }
        };

        inserted
            .map(|done| done.last_insert_rowid())
            .map_err(|e| {
                error!("error inserting {} {username}: {e:?}", person.role());
            })
    }
}
