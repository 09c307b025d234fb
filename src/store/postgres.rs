//! `Store` over PostgreSQL. Constraint names come from [`crate::migration`].

use super::*;
use sqlx::error::ErrorKind;
use sqlx::postgres::PgRow;
use sqlx::{PgPool, Row};

const ACCOUNT_COLUMNS: &str = "id, username, password_hash, email, first_name, last_name, role, phone, address, \
     profile_picture, date_of_birth, created_at";
const STUDENT_COLUMNS: &str = "id, account_id, admission_number, class_id, roll_number, parent_id, admission_date";
const ATTENDANCE_COLUMNS: &str = "id, student_id, date, status, remarks, marked_by";
const GRADE_COLUMNS: &str =
    "id, student_id, subject_id, exam_type, marks_obtained, total_marks, exam_date, remarks, uploaded_by";
const ASSIGNMENT_COLUMNS: &str =
    "id, title, description, class_subject_id, due_date, total_marks, attachment, created_by, created_at";
const SUBMISSION_COLUMNS: &str =
    "id, assignment_id, student_id, submission_file, submitted_at, marks_obtained, feedback, graded_by";
const ANNOUNCEMENT_COLUMNS: &str =
    "id, title, content, target_role, target_class_id, created_by, created_at, is_active";
const MESSAGE_COLUMNS: &str = "id, sender_id, receiver_id, subject, content, sent_at, is_read";

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn traced(sql: &str) -> &str {
    tracing::debug!(sql = %sql, "query");
    sql
}

/// Unique and foreign-key breaches become constraint violations; everything else stays a database error.
fn map_db_err(e: sqlx::Error) -> AppError {
    if let sqlx::Error::Database(db) = &e {
        match db.kind() {
            ErrorKind::UniqueViolation => {
                return AppError::ConstraintViolation(unique_violation(db.constraint().unwrap_or_default()));
            }
            ErrorKind::ForeignKeyViolation => {
                let constraint = db.constraint().unwrap_or_default();
                let table = db.table().unwrap_or_default();
                let column = constraint
                    .strip_prefix(table)
                    .map(|s| s.trim_start_matches('_'))
                    .unwrap_or(constraint)
                    .trim_end_matches("_fkey");
                return AppError::ConstraintViolation(foreign_key_violation(column));
            }
            ErrorKind::CheckViolation => {
                return AppError::ConstraintViolation(ConstraintViolation::new(
                    NON_FIELD_ERRORS,
                    format!("value violates {}", db.constraint().unwrap_or("a check constraint")),
                ));
            }
            _ => {}
        }
    }
    AppError::Db(e)
}

fn limit_param(limit: Option<usize>) -> Option<i64> {
    limit.map(|l| l as i64)
}

fn account_from_row(row: &PgRow) -> Result<Account, AppError> {
    let role: String = row.try_get("role")?;
    let role = role.parse::<Role>().map_err(|e| AppError::InvalidRole(e.0))?;
    Ok(Account {
        id: row.try_get("id")?,
        username: row.try_get("username")?,
        password_hash: row.try_get("password_hash")?,
        email: row.try_get("email")?,
        first_name: row.try_get("first_name")?,
        last_name: row.try_get("last_name")?,
        role,
        phone: row.try_get("phone")?,
        address: row.try_get("address")?,
        profile_picture: row.try_get("profile_picture")?,
        date_of_birth: row.try_get("date_of_birth")?,
        created_at: row.try_get("created_at")?,
    })
}

fn attendance_from_row(row: &PgRow) -> Result<AttendanceRecord, AppError> {
    let status: String = row.try_get("status")?;
    let status = status
        .parse::<AttendanceStatus>()
        .map_err(|e| AppError::Internal(e.to_string()))?;
    Ok(AttendanceRecord {
        id: row.try_get("id")?,
        student_id: row.try_get("student_id")?,
        date: row.try_get("date")?,
        status,
        remarks: row.try_get("remarks")?,
        marked_by: row.try_get("marked_by")?,
    })
}

fn announcement_from_row(row: &PgRow) -> Result<Announcement, AppError> {
    let target_role: Option<String> = row.try_get("target_role")?;
    let target_role = match target_role.as_deref() {
        None | Some("") => None,
        Some(r) => Some(r.parse::<Role>().map_err(|e| AppError::Internal(e.to_string()))?),
    };
    Ok(Announcement {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        target_role,
        target_class_id: row.try_get("target_class_id")?,
        created_by: row.try_get("created_by")?,
        created_at: row.try_get("created_at")?,
        is_active: row.try_get("is_active")?,
    })
}

fn count(n: i64) -> u64 {
    n.max(0) as u64
}

#[async_trait]
impl Store for PgStore {
    async fn ping(&self) -> Result<(), AppError> {
        sqlx::query("SELECT 1").fetch_optional(&self.pool).await?;
        Ok(())
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account, AppError> {
        let sql = format!(
            "INSERT INTO accounts (username, password_hash, email, first_name, last_name, role, phone, address, \
             profile_picture, date_of_birth) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let row = sqlx::query(traced(&sql))
            .bind(&new.username)
            .bind(&new.password_hash)
            .bind(&new.email)
            .bind(&new.first_name)
            .bind(&new.last_name)
            .bind(new.role.as_str())
            .bind(&new.phone)
            .bind(&new.address)
            .bind(&new.profile_picture)
            .bind(new.date_of_birth)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        account_from_row(&row)
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>, AppError> {
        let sql = format!("SELECT {} FROM accounts WHERE id = $1", ACCOUNT_COLUMNS);
        let row = sqlx::query(traced(&sql)).bind(id).fetch_optional(&self.pool).await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, AppError> {
        let sql = format!("SELECT {} FROM accounts WHERE username = $1", ACCOUNT_COLUMNS);
        let row = sqlx::query(traced(&sql)).bind(username).fetch_optional(&self.pool).await?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn list_accounts(&self, role: Option<Role>) -> Result<Vec<Account>, AppError> {
        let sql = format!(
            "SELECT {} FROM accounts WHERE ($1::TEXT IS NULL OR role = $1) ORDER BY username",
            ACCOUNT_COLUMNS
        );
        let rows = sqlx::query(traced(&sql))
            .bind(role.map(Role::as_str))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(account_from_row).collect()
    }

    async fn count_accounts(&self, role: Option<Role>) -> Result<u64, AppError> {
        let n: i64 = sqlx::query_scalar(traced("SELECT COUNT(*) FROM accounts WHERE ($1::TEXT IS NULL OR role = $1)"))
            .bind(role.map(Role::as_str))
            .fetch_one(&self.pool)
            .await?;
        Ok(count(n))
    }

    async fn update_account(&self, a: &Account) -> Result<Option<Account>, AppError> {
        let sql = format!(
            "UPDATE accounts SET username = $2, password_hash = $3, email = $4, first_name = $5, last_name = $6, \
             role = $7, phone = $8, address = $9, profile_picture = $10, date_of_birth = $11 \
             WHERE id = $1 RETURNING {}",
            ACCOUNT_COLUMNS
        );
        let row = sqlx::query(traced(&sql))
            .bind(a.id)
            .bind(&a.username)
            .bind(&a.password_hash)
            .bind(&a.email)
            .bind(&a.first_name)
            .bind(&a.last_name)
            .bind(a.role.as_str())
            .bind(&a.phone)
            .bind(&a.address)
            .bind(&a.profile_picture)
            .bind(a.date_of_birth)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        row.as_ref().map(account_from_row).transpose()
    }

    async fn delete_account(&self, id: i64) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM accounts WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(r.rows_affected() > 0)
    }

    async fn create_session(&self, session: Session) -> Result<Session, AppError> {
        let s = sqlx::query_as::<_, Session>(traced(
            "INSERT INTO sessions (token, account_id, created_at) VALUES ($1, $2, $3) \
             RETURNING token, account_id, created_at",
        ))
        .bind(&session.token)
        .bind(session.account_id)
        .bind(session.created_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(s)
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>, AppError> {
        let s = sqlx::query_as::<_, Session>(traced(
            "SELECT token, account_id, created_at FROM sessions WHERE token = $1",
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await?;
        Ok(s)
    }

    async fn delete_session(&self, token: &str) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM sessions WHERE token = $1"))
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    async fn create_class(&self, new: NewClassGroup) -> Result<ClassGroup, AppError> {
        let c = sqlx::query_as::<_, ClassGroup>(traced(
            "INSERT INTO class_groups (name, section, academic_year, class_teacher_id) VALUES ($1, $2, $3, $4) \
             RETURNING id, name, section, academic_year, class_teacher_id",
        ))
        .bind(&new.name)
        .bind(&new.section)
        .bind(&new.academic_year)
        .bind(new.class_teacher_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(c)
    }

    async fn get_class(&self, id: i64) -> Result<Option<ClassGroup>, AppError> {
        let c = sqlx::query_as::<_, ClassGroup>(traced(
            "SELECT id, name, section, academic_year, class_teacher_id FROM class_groups WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(c)
    }

    async fn list_classes(&self, academic_year: Option<&str>) -> Result<Vec<ClassGroup>, AppError> {
        let rows = sqlx::query_as::<_, ClassGroup>(traced(
            "SELECT id, name, section, academic_year, class_teacher_id FROM class_groups \
             WHERE ($1::TEXT IS NULL OR academic_year = $1) ORDER BY name, section, id",
        ))
        .bind(academic_year)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count_classes(&self) -> Result<u64, AppError> {
        let n: i64 = sqlx::query_scalar(traced("SELECT COUNT(*) FROM class_groups"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count(n))
    }

    async fn update_class(&self, c: &ClassGroup) -> Result<Option<ClassGroup>, AppError> {
        let row = sqlx::query_as::<_, ClassGroup>(traced(
            "UPDATE class_groups SET name = $2, section = $3, academic_year = $4, class_teacher_id = $5 \
             WHERE id = $1 RETURNING id, name, section, academic_year, class_teacher_id",
        ))
        .bind(c.id)
        .bind(&c.name)
        .bind(&c.section)
        .bind(&c.academic_year)
        .bind(c.class_teacher_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row)
    }

    async fn delete_class(&self, id: i64) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM class_groups WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(r.rows_affected() > 0)
    }

    async fn create_subject(&self, new: NewSubject) -> Result<Subject, AppError> {
        let s = sqlx::query_as::<_, Subject>(traced(
            "INSERT INTO subjects (code, name, description) VALUES ($1, $2, $3) RETURNING id, code, name, description",
        ))
        .bind(&new.code)
        .bind(&new.name)
        .bind(&new.description)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(s)
    }

    async fn get_subject(&self, id: i64) -> Result<Option<Subject>, AppError> {
        let s = sqlx::query_as::<_, Subject>(traced("SELECT id, code, name, description FROM subjects WHERE id = $1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(s)
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, AppError> {
        let rows = sqlx::query_as::<_, Subject>(traced("SELECT id, code, name, description FROM subjects ORDER BY code"))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_subjects(&self) -> Result<u64, AppError> {
        let n: i64 = sqlx::query_scalar(traced("SELECT COUNT(*) FROM subjects"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count(n))
    }

    async fn update_subject(&self, s: &Subject) -> Result<Option<Subject>, AppError> {
        let row = sqlx::query_as::<_, Subject>(traced(
            "UPDATE subjects SET code = $2, name = $3, description = $4 WHERE id = $1 \
             RETURNING id, code, name, description",
        ))
        .bind(s.id)
        .bind(&s.code)
        .bind(&s.name)
        .bind(&s.description)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(row)
    }

    async fn delete_subject(&self, id: i64) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM subjects WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(r.rows_affected() > 0)
    }

    async fn create_class_subject(&self, new: NewClassSubject) -> Result<ClassSubject, AppError> {
        let cs = sqlx::query_as::<_, ClassSubject>(traced(
            "INSERT INTO class_subjects (class_id, subject_id, teacher_id) VALUES ($1, $2, $3) \
             RETURNING id, class_id, subject_id, teacher_id",
        ))
        .bind(new.class_id)
        .bind(new.subject_id)
        .bind(new.teacher_id)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_err)?;
        Ok(cs)
    }

    async fn get_class_subject(&self, id: i64) -> Result<Option<ClassSubject>, AppError> {
        let cs = sqlx::query_as::<_, ClassSubject>(traced(
            "SELECT id, class_id, subject_id, teacher_id FROM class_subjects WHERE id = $1",
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(cs)
    }

    async fn list_class_subjects(&self, filter: ClassSubjectFilter) -> Result<Vec<ClassSubject>, AppError> {
        let rows = sqlx::query_as::<_, ClassSubject>(traced(
            "SELECT id, class_id, subject_id, teacher_id FROM class_subjects \
             WHERE ($1::BIGINT IS NULL OR class_id = $1) AND ($2::BIGINT IS NULL OR teacher_id = $2) ORDER BY id",
        ))
        .bind(filter.class_id)
        .bind(filter.teacher_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn delete_class_subject(&self, id: i64) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM class_subjects WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(r.rows_affected() > 0)
    }

    async fn create_student(&self, new: NewStudentRecord) -> Result<StudentRecord, AppError> {
        let sql = format!(
            "INSERT INTO students (account_id, admission_number, class_id, roll_number, parent_id, admission_date) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            STUDENT_COLUMNS
        );
        let s = sqlx::query_as::<_, StudentRecord>(traced(&sql))
            .bind(new.account_id)
            .bind(&new.admission_number)
            .bind(new.class_id)
            .bind(new.roll_number)
            .bind(new.parent_id)
            .bind(new.admission_date)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(s)
    }

    async fn get_student(&self, id: i64) -> Result<Option<StudentRecord>, AppError> {
        let sql = format!("SELECT {} FROM students WHERE id = $1", STUDENT_COLUMNS);
        let s = sqlx::query_as::<_, StudentRecord>(traced(&sql))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(s)
    }

    async fn get_student_by_account(&self, account_id: i64) -> Result<Option<StudentRecord>, AppError> {
        let sql = format!("SELECT {} FROM students WHERE account_id = $1", STUDENT_COLUMNS);
        let s = sqlx::query_as::<_, StudentRecord>(traced(&sql))
            .bind(account_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(s)
    }

    async fn list_students(&self, filter: StudentFilter) -> Result<Vec<StudentRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM students WHERE ($1::BIGINT IS NULL OR class_id = $1) \
             AND ($2::BIGINT IS NULL OR parent_id = $2) ORDER BY admission_date DESC, id DESC LIMIT $3",
            STUDENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, StudentRecord>(traced(&sql))
            .bind(filter.class_id)
            .bind(filter.parent_id)
            .bind(limit_param(filter.limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_students(&self) -> Result<u64, AppError> {
        let n: i64 = sqlx::query_scalar(traced("SELECT COUNT(*) FROM students"))
            .fetch_one(&self.pool)
            .await?;
        Ok(count(n))
    }

    async fn update_student(&self, s: &StudentRecord) -> Result<Option<StudentRecord>, AppError> {
        let sql = format!(
            "UPDATE students SET admission_number = $2, class_id = $3, roll_number = $4, parent_id = $5, \
             admission_date = $6 WHERE id = $1 RETURNING {}",
            STUDENT_COLUMNS
        );
        let row = sqlx::query_as::<_, StudentRecord>(traced(&sql))
            .bind(s.id)
            .bind(&s.admission_number)
            .bind(s.class_id)
            .bind(s.roll_number)
            .bind(s.parent_id)
            .bind(s.admission_date)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(row)
    }

    async fn delete_student(&self, id: i64) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM students WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(r.rows_affected() > 0)
    }

    async fn upsert_attendance(&self, new: NewAttendance) -> Result<AttendanceRecord, AppError> {
        let sql = format!(
            "INSERT INTO attendance (student_id, date, status, remarks, marked_by) VALUES ($1, $2, $3, $4, $5) \
             ON CONFLICT (student_id, date) DO UPDATE SET status = EXCLUDED.status, marked_by = EXCLUDED.marked_by \
             RETURNING {}",
            ATTENDANCE_COLUMNS
        );
        let row = sqlx::query(traced(&sql))
            .bind(new.student_id)
            .bind(new.date)
            .bind(new.status.as_str())
            .bind(&new.remarks)
            .bind(new.marked_by)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        attendance_from_row(&row)
    }

    async fn list_attendance(&self, student_id: i64, limit: Option<usize>) -> Result<Vec<AttendanceRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM attendance WHERE student_id = $1 ORDER BY date DESC, id DESC LIMIT $2",
            ATTENDANCE_COLUMNS
        );
        let rows = sqlx::query(traced(&sql))
            .bind(student_id)
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(attendance_from_row).collect()
    }

    async fn delete_attendance(&self, id: i64) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM attendance WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    async fn create_grade(&self, new: NewGrade) -> Result<GradeRecord, AppError> {
        let sql = format!(
            "INSERT INTO grades (student_id, subject_id, exam_type, marks_obtained, total_marks, exam_date, remarks, \
             uploaded_by) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) RETURNING {}",
            GRADE_COLUMNS
        );
        let g = sqlx::query_as::<_, GradeRecord>(traced(&sql))
            .bind(new.student_id)
            .bind(new.subject_id)
            .bind(&new.exam_type)
            .bind(new.marks_obtained)
            .bind(new.total_marks)
            .bind(new.exam_date)
            .bind(&new.remarks)
            .bind(new.uploaded_by)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(g)
    }

    async fn list_grades(&self, student_id: i64, limit: Option<usize>) -> Result<Vec<GradeRecord>, AppError> {
        let sql = format!(
            "SELECT {} FROM grades WHERE student_id = $1 ORDER BY exam_date DESC, id DESC LIMIT $2",
            GRADE_COLUMNS
        );
        let rows = sqlx::query_as::<_, GradeRecord>(traced(&sql))
            .bind(student_id)
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn delete_grade(&self, id: i64) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM grades WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    async fn create_assignment(&self, new: NewAssignment) -> Result<Assignment, AppError> {
        let sql = format!(
            "INSERT INTO assignments (title, description, class_subject_id, due_date, total_marks, attachment, \
             created_by) VALUES ($1, $2, $3, $4, $5, $6, $7) RETURNING {}",
            ASSIGNMENT_COLUMNS
        );
        let a = sqlx::query_as::<_, Assignment>(traced(&sql))
            .bind(&new.title)
            .bind(&new.description)
            .bind(new.class_subject_id)
            .bind(new.due_date)
            .bind(new.total_marks)
            .bind(&new.attachment)
            .bind(new.created_by)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(a)
    }

    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>, AppError> {
        let sql = format!("SELECT {} FROM assignments WHERE id = $1", ASSIGNMENT_COLUMNS);
        let a = sqlx::query_as::<_, Assignment>(traced(&sql))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(a)
    }

    async fn list_assignments(&self, filter: AssignmentFilter) -> Result<Vec<Assignment>, AppError> {
        let sql = format!(
            "SELECT {} FROM assignments a WHERE ($1::BIGINT IS NULL OR a.class_subject_id IN \
             (SELECT cs.id FROM class_subjects cs WHERE cs.class_id = $1)) \
             AND ($2::BIGINT IS NULL OR a.created_by = $2) ORDER BY a.created_at DESC, a.id DESC",
            ASSIGNMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, Assignment>(traced(&sql))
            .bind(filter.class_id)
            .bind(filter.created_by)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn delete_assignment(&self, id: i64) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM assignments WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, AppError> {
        let sql = format!(
            "INSERT INTO submissions (assignment_id, student_id, submission_file) VALUES ($1, $2, $3) RETURNING {}",
            SUBMISSION_COLUMNS
        );
        let s = sqlx::query_as::<_, Submission>(traced(&sql))
            .bind(new.assignment_id)
            .bind(new.student_id)
            .bind(&new.submission_file)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(s)
    }

    async fn get_submission(&self, id: i64) -> Result<Option<Submission>, AppError> {
        let sql = format!("SELECT {} FROM submissions WHERE id = $1", SUBMISSION_COLUMNS);
        let s = sqlx::query_as::<_, Submission>(traced(&sql))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(s)
    }

    async fn list_submissions(&self, filter: SubmissionFilter) -> Result<Vec<Submission>, AppError> {
        let sql = format!(
            "SELECT {} FROM submissions WHERE ($1::BIGINT IS NULL OR assignment_id = $1) \
             AND ($2::BIGINT IS NULL OR student_id = $2) ORDER BY submitted_at DESC, id DESC",
            SUBMISSION_COLUMNS
        );
        let rows = sqlx::query_as::<_, Submission>(traced(&sql))
            .bind(filter.assignment_id)
            .bind(filter.student_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_ungraded_submissions(&self, creator_id: i64) -> Result<u64, AppError> {
        let n: i64 = sqlx::query_scalar(traced(
            "SELECT COUNT(*) FROM submissions s JOIN assignments a ON a.id = s.assignment_id \
             WHERE a.created_by = $1 AND s.marks_obtained IS NULL",
        ))
        .bind(creator_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count(n))
    }

    async fn grade_submission(&self, id: i64, grade: SubmissionGrade) -> Result<Option<Submission>, AppError> {
        let sql = format!(
            "UPDATE submissions SET marks_obtained = $2, feedback = $3, graded_by = $4 WHERE id = $1 RETURNING {}",
            SUBMISSION_COLUMNS
        );
        let s = sqlx::query_as::<_, Submission>(traced(&sql))
            .bind(id)
            .bind(grade.marks_obtained)
            .bind(&grade.feedback)
            .bind(grade.graded_by)
            .fetch_optional(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(s)
    }

    async fn delete_submission(&self, id: i64) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM submissions WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    async fn create_announcement(&self, new: NewAnnouncement) -> Result<Announcement, AppError> {
        let sql = format!(
            "INSERT INTO announcements (title, content, target_role, target_class_id, created_by, is_active) \
             VALUES ($1, $2, $3, $4, $5, $6) RETURNING {}",
            ANNOUNCEMENT_COLUMNS
        );
        let row = sqlx::query(traced(&sql))
            .bind(&new.title)
            .bind(&new.content)
            .bind(new.target_role.map(Role::as_str))
            .bind(new.target_class_id)
            .bind(new.created_by)
            .bind(new.is_active)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        announcement_from_row(&row)
    }

    async fn list_announcements(
        &self,
        audience: Audience,
        active_only: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Announcement>, AppError> {
        let (role, class_id) = match audience {
            Audience::Everyone => (None, None),
            Audience::Role { role, class_id } => (Some(role), class_id),
        };
        let sql = format!(
            "SELECT {} FROM announcements WHERE (NOT $1 OR is_active) \
             AND ($2::TEXT IS NULL OR target_role IS NULL OR target_role = $2 \
                  OR ($3::BIGINT IS NOT NULL AND target_class_id = $3)) \
             ORDER BY created_at DESC, id DESC LIMIT $4",
            ANNOUNCEMENT_COLUMNS
        );
        let rows = sqlx::query(traced(&sql))
            .bind(active_only)
            .bind(role.map(Role::as_str))
            .bind(class_id)
            .bind(limit_param(limit))
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(announcement_from_row).collect()
    }

    async fn delete_announcement(&self, id: i64) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM announcements WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }

    async fn create_message(&self, new: NewMessage) -> Result<Message, AppError> {
        let sql = format!(
            "INSERT INTO messages (sender_id, receiver_id, subject, content) VALUES ($1, $2, $3, $4) RETURNING {}",
            MESSAGE_COLUMNS
        );
        let m = sqlx::query_as::<_, Message>(traced(&sql))
            .bind(new.sender_id)
            .bind(new.receiver_id)
            .bind(&new.subject)
            .bind(&new.content)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_err)?;
        Ok(m)
    }

    async fn list_messages(&self, filter: MessageFilter) -> Result<Vec<Message>, AppError> {
        let sql = format!(
            "SELECT {} FROM messages WHERE ($1::BIGINT IS NULL OR sender_id = $1) \
             AND ($2::BIGINT IS NULL OR receiver_id = $2) ORDER BY sent_at DESC, id DESC",
            MESSAGE_COLUMNS
        );
        let rows = sqlx::query_as::<_, Message>(traced(&sql))
            .bind(filter.sender_id)
            .bind(filter.receiver_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn count_unread_messages(&self, receiver_id: i64) -> Result<u64, AppError> {
        let n: i64 = sqlx::query_scalar(traced(
            "SELECT COUNT(*) FROM messages WHERE receiver_id = $1 AND NOT is_read",
        ))
        .bind(receiver_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(count(n))
    }

    async fn delete_message(&self, id: i64) -> Result<bool, AppError> {
        let r = sqlx::query(traced("DELETE FROM messages WHERE id = $1"))
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(r.rows_affected() > 0)
    }
}
