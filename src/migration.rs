//! School schema DDL. Idempotent: every statement is `IF NOT EXISTS`, so startup can always run it.
//! Constraint names are the ones [`crate::store`] maps back to form fields.

use crate::error::AppError;
use sqlx::{ConnectOptions, PgPool};
use std::str::FromStr;

/// Tables in dependency order.
const TABLES: &[(&str, &str)] = &[
    (
        "accounts",
        r#"
        CREATE TABLE IF NOT EXISTS accounts (
            id BIGSERIAL PRIMARY KEY,
            username VARCHAR(150) NOT NULL,
            password_hash TEXT NOT NULL,
            email VARCHAR(254) NOT NULL DEFAULT '',
            first_name VARCHAR(150) NOT NULL DEFAULT '',
            last_name VARCHAR(150) NOT NULL DEFAULT '',
            role VARCHAR(10) NOT NULL,
            phone VARCHAR(15) NOT NULL DEFAULT '',
            address TEXT NOT NULL DEFAULT '',
            profile_picture TEXT,
            date_of_birth DATE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT accounts_username_key UNIQUE (username)
        )
        "#,
    ),
    (
        "sessions",
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT NOT NULL,
            account_id BIGINT NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            CONSTRAINT sessions_pkey PRIMARY KEY (token)
        )
        "#,
    ),
    (
        "class_groups",
        r#"
        CREATE TABLE IF NOT EXISTS class_groups (
            id BIGSERIAL PRIMARY KEY,
            name VARCHAR(50) NOT NULL,
            section VARCHAR(10) NOT NULL,
            academic_year VARCHAR(20) NOT NULL DEFAULT '2024-2025',
            class_teacher_id BIGINT REFERENCES accounts (id) ON DELETE SET NULL,
            CONSTRAINT class_groups_name_section_year_key UNIQUE (name, section, academic_year)
        )
        "#,
    ),
    (
        "subjects",
        r#"
        CREATE TABLE IF NOT EXISTS subjects (
            id BIGSERIAL PRIMARY KEY,
            code VARCHAR(20) NOT NULL,
            name VARCHAR(100) NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            CONSTRAINT subjects_code_key UNIQUE (code)
        )
        "#,
    ),
    (
        "class_subjects",
        r#"
        CREATE TABLE IF NOT EXISTS class_subjects (
            id BIGSERIAL PRIMARY KEY,
            class_id BIGINT NOT NULL REFERENCES class_groups (id) ON DELETE CASCADE,
            subject_id BIGINT NOT NULL REFERENCES subjects (id) ON DELETE CASCADE,
            teacher_id BIGINT REFERENCES accounts (id) ON DELETE SET NULL,
            CONSTRAINT class_subjects_class_subject_key UNIQUE (class_id, subject_id)
        )
        "#,
    ),
    (
        "students",
        r#"
        CREATE TABLE IF NOT EXISTS students (
            id BIGSERIAL PRIMARY KEY,
            account_id BIGINT NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
            admission_number VARCHAR(20) NOT NULL,
            class_id BIGINT REFERENCES class_groups (id) ON DELETE SET NULL,
            roll_number INTEGER NOT NULL,
            parent_id BIGINT REFERENCES accounts (id) ON DELETE SET NULL,
            admission_date DATE NOT NULL,
            CONSTRAINT students_account_id_key UNIQUE (account_id),
            CONSTRAINT students_admission_number_key UNIQUE (admission_number),
            CONSTRAINT students_class_roll_key UNIQUE (class_id, roll_number)
        )
        "#,
    ),
    (
        "attendance",
        r#"
        CREATE TABLE IF NOT EXISTS attendance (
            id BIGSERIAL PRIMARY KEY,
            student_id BIGINT NOT NULL REFERENCES students (id) ON DELETE CASCADE,
            date DATE NOT NULL,
            status VARCHAR(10) NOT NULL,
            remarks TEXT NOT NULL DEFAULT '',
            marked_by BIGINT REFERENCES accounts (id) ON DELETE SET NULL,
            CONSTRAINT attendance_student_date_key UNIQUE (student_id, date),
            CONSTRAINT attendance_status_check CHECK (status IN ('present', 'absent', 'late', 'excused'))
        )
        "#,
    ),
    (
        "grades",
        r#"
        CREATE TABLE IF NOT EXISTS grades (
            id BIGSERIAL PRIMARY KEY,
            student_id BIGINT NOT NULL REFERENCES students (id) ON DELETE CASCADE,
            subject_id BIGINT NOT NULL REFERENCES subjects (id) ON DELETE CASCADE,
            exam_type VARCHAR(50) NOT NULL,
            marks_obtained DOUBLE PRECISION NOT NULL CHECK (marks_obtained >= 0),
            total_marks DOUBLE PRECISION NOT NULL CHECK (total_marks >= 0),
            exam_date DATE NOT NULL,
            remarks TEXT NOT NULL DEFAULT '',
            uploaded_by BIGINT REFERENCES accounts (id) ON DELETE SET NULL
        )
        "#,
    ),
    (
        "assignments",
        r#"
        CREATE TABLE IF NOT EXISTS assignments (
            id BIGSERIAL PRIMARY KEY,
            title VARCHAR(200) NOT NULL,
            description TEXT NOT NULL,
            class_subject_id BIGINT NOT NULL REFERENCES class_subjects (id) ON DELETE CASCADE,
            due_date TIMESTAMPTZ NOT NULL,
            total_marks INTEGER NOT NULL CHECK (total_marks >= 0),
            attachment TEXT,
            created_by BIGINT NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
        )
        "#,
    ),
    (
        "submissions",
        r#"
        CREATE TABLE IF NOT EXISTS submissions (
            id BIGSERIAL PRIMARY KEY,
            assignment_id BIGINT NOT NULL REFERENCES assignments (id) ON DELETE CASCADE,
            student_id BIGINT NOT NULL REFERENCES students (id) ON DELETE CASCADE,
            submission_file TEXT NOT NULL,
            submitted_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            marks_obtained INTEGER,
            feedback TEXT NOT NULL DEFAULT '',
            graded_by BIGINT REFERENCES accounts (id) ON DELETE SET NULL,
            CONSTRAINT submissions_assignment_student_key UNIQUE (assignment_id, student_id)
        )
        "#,
    ),
    (
        "announcements",
        r#"
        CREATE TABLE IF NOT EXISTS announcements (
            id BIGSERIAL PRIMARY KEY,
            title VARCHAR(200) NOT NULL,
            content TEXT NOT NULL,
            target_role VARCHAR(10),
            target_class_id BIGINT REFERENCES class_groups (id) ON DELETE CASCADE,
            created_by BIGINT NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            is_active BOOLEAN NOT NULL DEFAULT TRUE
        )
        "#,
    ),
    (
        "messages",
        r#"
        CREATE TABLE IF NOT EXISTS messages (
            id BIGSERIAL PRIMARY KEY,
            sender_id BIGINT NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
            receiver_id BIGINT NOT NULL REFERENCES accounts (id) ON DELETE CASCADE,
            subject VARCHAR(200) NOT NULL,
            content TEXT NOT NULL,
            sent_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            is_read BOOLEAN NOT NULL DEFAULT FALSE
        )
        "#,
    ),
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS sessions_account_idx ON sessions (account_id)",
    "CREATE INDEX IF NOT EXISTS students_class_idx ON students (class_id)",
    "CREATE INDEX IF NOT EXISTS students_parent_idx ON students (parent_id)",
    "CREATE INDEX IF NOT EXISTS grades_student_idx ON grades (student_id, exam_date DESC)",
    "CREATE INDEX IF NOT EXISTS assignments_class_subject_idx ON assignments (class_subject_id)",
    "CREATE INDEX IF NOT EXISTS assignments_created_by_idx ON assignments (created_by)",
    "CREATE INDEX IF NOT EXISTS submissions_student_idx ON submissions (student_id)",
    "CREATE INDEX IF NOT EXISTS announcements_created_idx ON announcements (created_at DESC)",
    "CREATE INDEX IF NOT EXISTS messages_receiver_idx ON messages (receiver_id, is_read)",
];

/// Create every table and index that does not exist yet.
pub async fn apply_migrations(pool: &PgPool) -> Result<(), AppError> {
    for (name, ddl) in TABLES {
        tracing::debug!(table = %name, "ensure table");
        sqlx::query(ddl).execute(pool).await?;
    }
    for ddl in INDEXES {
        sqlx::query(ddl).execute(pool).await?;
    }
    tracing::info!(tables = TABLES.len(), "schema ready");
    Ok(())
}

/// Connect to the server's `postgres` database and create the target database when missing.
pub async fn ensure_database_exists(database_url: &str) -> Result<(), AppError> {
    let (admin_url, db_name) = split_database_url(database_url)?;
    if db_name.is_empty() || db_name == "postgres" {
        return Ok(());
    }
    let opts = sqlx::postgres::PgConnectOptions::from_str(&admin_url)
        .map_err(|e| AppError::BadRequest(format!("invalid DATABASE_URL: {}", e)))?;
    let mut conn: sqlx::PgConnection = opts.connect().await?;
    let exists: (bool,) = sqlx::query_as("SELECT EXISTS(SELECT 1 FROM pg_database WHERE datname = $1)")
        .bind(&db_name)
        .fetch_one(&mut conn)
        .await?;
    if !exists.0 {
        tracing::info!(database = %db_name, "creating database");
        sqlx::query(&format!("CREATE DATABASE {}", quote_ident(&db_name)))
            .execute(&mut conn)
            .await?;
    }
    Ok(())
}

/// `postgres://host/db?opts` → (`postgres://host/postgres`, `db`).
fn split_database_url(url: &str) -> Result<(String, String), AppError> {
    let path_start = url
        .rfind('/')
        .ok_or_else(|| AppError::BadRequest("DATABASE_URL: no path".into()))?
        + 1;
    let db_name = url[path_start..].split('?').next().unwrap_or("").trim();
    Ok((format!("{}postgres", &url[..path_start]), db_name.to_string()))
}

fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn database_url_is_split_into_admin_url_and_name() {
        let (admin, name) = split_database_url("postgres://u:p@localhost:5432/school?sslmode=disable").unwrap();
        assert_eq!(admin, "postgres://u:p@localhost:5432/postgres");
        assert_eq!(name, "school");
    }

    #[test]
    fn identifiers_are_quoted() {
        assert_eq!(quote_ident("school"), "\"school\"");
        assert_eq!(quote_ident("odd\"name"), "\"odd\"\"name\"");
    }

    #[test]
    fn every_unique_constraint_is_declared() {
        let ddl: String = TABLES.iter().map(|(_, d)| *d).collect();
        for name in [
            "accounts_username_key",
            "class_groups_name_section_year_key",
            "subjects_code_key",
            "class_subjects_class_subject_key",
            "students_account_id_key",
            "students_admission_number_key",
            "students_class_roll_key",
            "attendance_student_date_key",
            "submissions_assignment_student_key",
            "sessions_pkey",
        ] {
            assert!(ddl.contains(name), "missing {}", name);
        }
    }
}
