//! In-memory `Store` with the same keys, references and deletion policy as the PostgreSQL schema.
//! Used by the test suite and by `STORE=memory` for local runs.

use super::*;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    next_id: i64,
    accounts: BTreeMap<i64, Account>,
    sessions: HashMap<String, Session>,
    classes: BTreeMap<i64, ClassGroup>,
    subjects: BTreeMap<i64, Subject>,
    class_subjects: BTreeMap<i64, ClassSubject>,
    students: BTreeMap<i64, StudentRecord>,
    attendance: BTreeMap<i64, AttendanceRecord>,
    grades: BTreeMap<i64, GradeRecord>,
    assignments: BTreeMap<i64, Assignment>,
    submissions: BTreeMap<i64, Submission>,
    announcements: BTreeMap<i64, Announcement>,
    messages: BTreeMap<i64, Message>,
}

fn check(ok: bool, violation: impl FnOnce() -> ConstraintViolation) -> Result<(), AppError> {
    if ok {
        Ok(())
    } else {
        Err(AppError::ConstraintViolation(violation()))
    }
}

fn refers<T>(table: &BTreeMap<i64, T>, id: i64, column: &str) -> Result<(), AppError> {
    check(table.contains_key(&id), || foreign_key_violation(column))
}

fn refers_opt<T>(table: &BTreeMap<i64, T>, id: Option<i64>, column: &str) -> Result<(), AppError> {
    match id {
        Some(id) => refers(table, id, column),
        None => Ok(()),
    }
}

fn take<T: Clone>(rows: impl Iterator<Item = T>, limit: Option<usize>) -> Vec<T> {
    rows.take(limit.unwrap_or(usize::MAX)).collect()
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_account(&self, a: &NewAccount, id: Option<i64>) -> Result<(), AppError> {
        check(
            !self
                .accounts
                .values()
                .any(|x| x.username == a.username && Some(x.id) != id),
            || unique_violation("accounts_username_key"),
        )
    }

    fn check_class(&self, name: &str, section: &str, year: &str, teacher: Option<i64>, id: Option<i64>) -> Result<(), AppError> {
        check(
            !self.classes.values().any(|c| {
                c.name == name && c.section == section && c.academic_year == year && Some(c.id) != id
            }),
            || unique_violation("class_groups_name_section_year_key"),
        )?;
        refers_opt(&self.accounts, teacher, "class_teacher_id")
    }

    fn check_subject(&self, code: &str, id: Option<i64>) -> Result<(), AppError> {
        check(
            !self.subjects.values().any(|s| s.code == code && Some(s.id) != id),
            || unique_violation("subjects_code_key"),
        )
    }

    fn check_student(&self, s: &NewStudentRecord, id: Option<i64>) -> Result<(), AppError> {
        refers(&self.accounts, s.account_id, "account_id")?;
        refers_opt(&self.classes, s.class_id, "class_id")?;
        refers_opt(&self.accounts, s.parent_id, "parent_id")?;
        let others = || self.students.values().filter(move |x| Some(x.id) != id);
        check(!others().any(|x| x.account_id == s.account_id), || {
            unique_violation("students_account_id_key")
        })?;
        check(!others().any(|x| x.admission_number == s.admission_number), || {
            unique_violation("students_admission_number_key")
        })?;
        check(
            !(s.class_id.is_some() && others().any(|x| x.class_id == s.class_id && x.roll_number == s.roll_number)),
            || unique_violation("students_class_roll_key"),
        )
    }

    fn remove_student(&mut self, id: i64) -> bool {
        self.attendance.retain(|_, a| a.student_id != id);
        self.grades.retain(|_, g| g.student_id != id);
        self.submissions.retain(|_, s| s.student_id != id);
        self.students.remove(&id).is_some()
    }

    fn remove_assignment(&mut self, id: i64) -> bool {
        self.submissions.retain(|_, s| s.assignment_id != id);
        self.assignments.remove(&id).is_some()
    }

    fn remove_class_subject(&mut self, id: i64) -> bool {
        let doomed: Vec<i64> = self
            .assignments
            .values()
            .filter(|a| a.class_subject_id == id)
            .map(|a| a.id)
            .collect();
        for a in doomed {
            self.remove_assignment(a);
        }
        self.class_subjects.remove(&id).is_some()
    }

    fn remove_class(&mut self, id: i64) -> bool {
        let doomed: Vec<i64> = self
            .class_subjects
            .values()
            .filter(|cs| cs.class_id == id)
            .map(|cs| cs.id)
            .collect();
        for cs in doomed {
            self.remove_class_subject(cs);
        }
        for s in self.students.values_mut().filter(|s| s.class_id == Some(id)) {
            s.class_id = None;
        }
        self.announcements.retain(|_, a| a.target_class_id != Some(id));
        self.classes.remove(&id).is_some()
    }

    fn remove_subject(&mut self, id: i64) -> bool {
        let doomed: Vec<i64> = self
            .class_subjects
            .values()
            .filter(|cs| cs.subject_id == id)
            .map(|cs| cs.id)
            .collect();
        for cs in doomed {
            self.remove_class_subject(cs);
        }
        self.grades.retain(|_, g| g.subject_id != id);
        self.subjects.remove(&id).is_some()
    }

    fn remove_account(&mut self, id: i64) -> bool {
        if !self.accounts.contains_key(&id) {
            return false;
        }
        self.sessions.retain(|_, s| s.account_id != id);
        let students: Vec<i64> = self.students.values().filter(|s| s.account_id == id).map(|s| s.id).collect();
        for s in students {
            self.remove_student(s);
        }
        let assignments: Vec<i64> = self.assignments.values().filter(|a| a.created_by == id).map(|a| a.id).collect();
        for a in assignments {
            self.remove_assignment(a);
        }
        self.announcements.retain(|_, a| a.created_by != id);
        self.messages.retain(|_, m| m.sender_id != id && m.receiver_id != id);
        for c in self.classes.values_mut().filter(|c| c.class_teacher_id == Some(id)) {
            c.class_teacher_id = None;
        }
        for cs in self.class_subjects.values_mut().filter(|cs| cs.teacher_id == Some(id)) {
            cs.teacher_id = None;
        }
        for s in self.students.values_mut().filter(|s| s.parent_id == Some(id)) {
            s.parent_id = None;
        }
        for a in self.attendance.values_mut().filter(|a| a.marked_by == Some(id)) {
            a.marked_by = None;
        }
        for g in self.grades.values_mut().filter(|g| g.uploaded_by == Some(id)) {
            g.uploaded_by = None;
        }
        for s in self.submissions.values_mut().filter(|s| s.graded_by == Some(id)) {
            s.graded_by = None;
        }
        self.accounts.remove(&id).is_some()
    }
}

/// All tables behind one lock; each trait call is atomic.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn ping(&self) -> Result<(), AppError> {
        Ok(())
    }

    async fn create_account(&self, new: NewAccount) -> Result<Account, AppError> {
        let mut t = self.tables.write().await;
        t.check_account(&new, None)?;
        let account = Account {
            id: t.next_id(),
            username: new.username,
            password_hash: new.password_hash,
            email: new.email,
            first_name: new.first_name,
            last_name: new.last_name,
            role: new.role,
            phone: new.phone,
            address: new.address,
            profile_picture: new.profile_picture,
            date_of_birth: new.date_of_birth,
            created_at: Utc::now(),
        };
        t.accounts.insert(account.id, account.clone());
        Ok(account)
    }

    async fn get_account(&self, id: i64) -> Result<Option<Account>, AppError> {
        Ok(self.tables.read().await.accounts.get(&id).cloned())
    }

    async fn get_account_by_username(&self, username: &str) -> Result<Option<Account>, AppError> {
        let t = self.tables.read().await;
        Ok(t.accounts.values().find(|a| a.username == username).cloned())
    }

    async fn list_accounts(&self, role: Option<Role>) -> Result<Vec<Account>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Account> = t
            .accounts
            .values()
            .filter(|a| role.map_or(true, |r| a.role == r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.username.cmp(&b.username));
        Ok(rows)
    }

    async fn count_accounts(&self, role: Option<Role>) -> Result<u64, AppError> {
        let t = self.tables.read().await;
        Ok(t.accounts.values().filter(|a| role.map_or(true, |r| a.role == r)).count() as u64)
    }

    async fn update_account(&self, account: &Account) -> Result<Option<Account>, AppError> {
        let mut t = self.tables.write().await;
        if !t.accounts.contains_key(&account.id) {
            return Ok(None);
        }
        check(
            !t.accounts
                .values()
                .any(|x| x.username == account.username && x.id != account.id),
            || unique_violation("accounts_username_key"),
        )?;
        let mut stored = account.clone();
        if let Some(existing) = t.accounts.get(&account.id) {
            stored.created_at = existing.created_at;
        }
        t.accounts.insert(stored.id, stored.clone());
        Ok(Some(stored))
    }

    async fn delete_account(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.remove_account(id))
    }

    async fn create_session(&self, session: Session) -> Result<Session, AppError> {
        let mut t = self.tables.write().await;
        refers(&t.accounts, session.account_id, "account_id")?;
        check(!t.sessions.contains_key(&session.token), || unique_violation("sessions_pkey"))?;
        t.sessions.insert(session.token.clone(), session.clone());
        Ok(session)
    }

    async fn get_session(&self, token: &str) -> Result<Option<Session>, AppError> {
        Ok(self.tables.read().await.sessions.get(token).cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<bool, AppError> {
        Ok(self.tables.write().await.sessions.remove(token).is_some())
    }

    async fn create_class(&self, new: NewClassGroup) -> Result<ClassGroup, AppError> {
        let mut t = self.tables.write().await;
        t.check_class(&new.name, &new.section, &new.academic_year, new.class_teacher_id, None)?;
        let class = ClassGroup {
            id: t.next_id(),
            name: new.name,
            section: new.section,
            academic_year: new.academic_year,
            class_teacher_id: new.class_teacher_id,
        };
        t.classes.insert(class.id, class.clone());
        Ok(class)
    }

    async fn get_class(&self, id: i64) -> Result<Option<ClassGroup>, AppError> {
        Ok(self.tables.read().await.classes.get(&id).cloned())
    }

    async fn list_classes(&self, academic_year: Option<&str>) -> Result<Vec<ClassGroup>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<ClassGroup> = t
            .classes
            .values()
            .filter(|c| academic_year.map_or(true, |y| c.academic_year == y))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (&a.name, &a.section, a.id).cmp(&(&b.name, &b.section, b.id)));
        Ok(rows)
    }

    async fn count_classes(&self) -> Result<u64, AppError> {
        Ok(self.tables.read().await.classes.len() as u64)
    }

    async fn update_class(&self, class: &ClassGroup) -> Result<Option<ClassGroup>, AppError> {
        let mut t = self.tables.write().await;
        if !t.classes.contains_key(&class.id) {
            return Ok(None);
        }
        t.check_class(&class.name, &class.section, &class.academic_year, class.class_teacher_id, Some(class.id))?;
        t.classes.insert(class.id, class.clone());
        Ok(Some(class.clone()))
    }

    async fn delete_class(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.remove_class(id))
    }

    async fn create_subject(&self, new: NewSubject) -> Result<Subject, AppError> {
        let mut t = self.tables.write().await;
        t.check_subject(&new.code, None)?;
        let subject = Subject {
            id: t.next_id(),
            code: new.code,
            name: new.name,
            description: new.description,
        };
        t.subjects.insert(subject.id, subject.clone());
        Ok(subject)
    }

    async fn get_subject(&self, id: i64) -> Result<Option<Subject>, AppError> {
        Ok(self.tables.read().await.subjects.get(&id).cloned())
    }

    async fn list_subjects(&self) -> Result<Vec<Subject>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Subject> = t.subjects.values().cloned().collect();
        rows.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(rows)
    }

    async fn count_subjects(&self) -> Result<u64, AppError> {
        Ok(self.tables.read().await.subjects.len() as u64)
    }

    async fn update_subject(&self, subject: &Subject) -> Result<Option<Subject>, AppError> {
        let mut t = self.tables.write().await;
        if !t.subjects.contains_key(&subject.id) {
            return Ok(None);
        }
        t.check_subject(&subject.code, Some(subject.id))?;
        t.subjects.insert(subject.id, subject.clone());
        Ok(Some(subject.clone()))
    }

    async fn delete_subject(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.remove_subject(id))
    }

    async fn create_class_subject(&self, new: NewClassSubject) -> Result<ClassSubject, AppError> {
        let mut t = self.tables.write().await;
        refers(&t.classes, new.class_id, "class_id")?;
        refers(&t.subjects, new.subject_id, "subject_id")?;
        refers_opt(&t.accounts, new.teacher_id, "teacher_id")?;
        check(
            !t.class_subjects
                .values()
                .any(|cs| cs.class_id == new.class_id && cs.subject_id == new.subject_id),
            || unique_violation("class_subjects_class_subject_key"),
        )?;
        let cs = ClassSubject {
            id: t.next_id(),
            class_id: new.class_id,
            subject_id: new.subject_id,
            teacher_id: new.teacher_id,
        };
        t.class_subjects.insert(cs.id, cs.clone());
        Ok(cs)
    }

    async fn get_class_subject(&self, id: i64) -> Result<Option<ClassSubject>, AppError> {
        Ok(self.tables.read().await.class_subjects.get(&id).cloned())
    }

    async fn list_class_subjects(&self, filter: ClassSubjectFilter) -> Result<Vec<ClassSubject>, AppError> {
        let t = self.tables.read().await;
        Ok(t.class_subjects
            .values()
            .filter(|cs| filter.class_id.map_or(true, |c| cs.class_id == c))
            .filter(|cs| filter.teacher_id.map_or(true, |tid| cs.teacher_id == Some(tid)))
            .cloned()
            .collect())
    }

    async fn delete_class_subject(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.remove_class_subject(id))
    }

    async fn create_student(&self, new: NewStudentRecord) -> Result<StudentRecord, AppError> {
        let mut t = self.tables.write().await;
        t.check_student(&new, None)?;
        let s = StudentRecord {
            id: t.next_id(),
            account_id: new.account_id,
            admission_number: new.admission_number,
            class_id: new.class_id,
            roll_number: new.roll_number,
            parent_id: new.parent_id,
            admission_date: new.admission_date,
        };
        t.students.insert(s.id, s.clone());
        Ok(s)
    }

    async fn get_student(&self, id: i64) -> Result<Option<StudentRecord>, AppError> {
        Ok(self.tables.read().await.students.get(&id).cloned())
    }

    async fn get_student_by_account(&self, account_id: i64) -> Result<Option<StudentRecord>, AppError> {
        let t = self.tables.read().await;
        Ok(t.students.values().find(|s| s.account_id == account_id).cloned())
    }

    async fn list_students(&self, filter: StudentFilter) -> Result<Vec<StudentRecord>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<StudentRecord> = t
            .students
            .values()
            .filter(|s| filter.class_id.map_or(true, |c| s.class_id == Some(c)))
            .filter(|s| filter.parent_id.map_or(true, |p| s.parent_id == Some(p)))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.admission_date, b.id).cmp(&(a.admission_date, a.id)));
        Ok(take(rows.into_iter(), filter.limit))
    }

    async fn count_students(&self) -> Result<u64, AppError> {
        Ok(self.tables.read().await.students.len() as u64)
    }

    async fn update_student(&self, student: &StudentRecord) -> Result<Option<StudentRecord>, AppError> {
        let mut t = self.tables.write().await;
        let Some(existing) = t.students.get(&student.id).cloned() else {
            return Ok(None);
        };
        let candidate = NewStudentRecord {
            account_id: existing.account_id,
            admission_number: student.admission_number.clone(),
            class_id: student.class_id,
            roll_number: student.roll_number,
            parent_id: student.parent_id,
            admission_date: student.admission_date,
        };
        t.check_student(&candidate, Some(student.id))?;
        let updated = StudentRecord {
            account_id: existing.account_id,
            ..student.clone()
        };
        t.students.insert(updated.id, updated.clone());
        Ok(Some(updated))
    }

    async fn delete_student(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.remove_student(id))
    }

    async fn upsert_attendance(&self, new: NewAttendance) -> Result<AttendanceRecord, AppError> {
        let mut t = self.tables.write().await;
        refers(&t.students, new.student_id, "student_id")?;
        refers_opt(&t.accounts, new.marked_by, "marked_by")?;
        if let Some(existing) = t
            .attendance
            .values_mut()
            .find(|a| a.student_id == new.student_id && a.date == new.date)
        {
            existing.status = new.status;
            existing.marked_by = new.marked_by;
            return Ok(existing.clone());
        }
        let record = AttendanceRecord {
            id: t.next_id(),
            student_id: new.student_id,
            date: new.date,
            status: new.status,
            remarks: new.remarks,
            marked_by: new.marked_by,
        };
        t.attendance.insert(record.id, record.clone());
        Ok(record)
    }

    async fn list_attendance(&self, student_id: i64, limit: Option<usize>) -> Result<Vec<AttendanceRecord>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<AttendanceRecord> =
            t.attendance.values().filter(|a| a.student_id == student_id).cloned().collect();
        rows.sort_by(|a, b| (b.date, b.id).cmp(&(a.date, a.id)));
        Ok(take(rows.into_iter(), limit))
    }

    async fn delete_attendance(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.attendance.remove(&id).is_some())
    }

    async fn create_grade(&self, new: NewGrade) -> Result<GradeRecord, AppError> {
        let mut t = self.tables.write().await;
        refers(&t.students, new.student_id, "student_id")?;
        refers(&t.subjects, new.subject_id, "subject_id")?;
        refers_opt(&t.accounts, new.uploaded_by, "uploaded_by")?;
        let g = GradeRecord {
            id: t.next_id(),
            student_id: new.student_id,
            subject_id: new.subject_id,
            exam_type: new.exam_type,
            marks_obtained: new.marks_obtained,
            total_marks: new.total_marks,
            exam_date: new.exam_date,
            remarks: new.remarks,
            uploaded_by: new.uploaded_by,
        };
        t.grades.insert(g.id, g.clone());
        Ok(g)
    }

    async fn list_grades(&self, student_id: i64, limit: Option<usize>) -> Result<Vec<GradeRecord>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<GradeRecord> = t.grades.values().filter(|g| g.student_id == student_id).cloned().collect();
        rows.sort_by(|a, b| (b.exam_date, b.id).cmp(&(a.exam_date, a.id)));
        Ok(take(rows.into_iter(), limit))
    }

    async fn delete_grade(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.grades.remove(&id).is_some())
    }

    async fn create_assignment(&self, new: NewAssignment) -> Result<Assignment, AppError> {
        let mut t = self.tables.write().await;
        refers(&t.class_subjects, new.class_subject_id, "class_subject_id")?;
        refers(&t.accounts, new.created_by, "created_by")?;
        let a = Assignment {
            id: t.next_id(),
            title: new.title,
            description: new.description,
            class_subject_id: new.class_subject_id,
            due_date: new.due_date,
            total_marks: new.total_marks,
            attachment: new.attachment,
            created_by: new.created_by,
            created_at: Utc::now(),
        };
        t.assignments.insert(a.id, a.clone());
        Ok(a)
    }

    async fn get_assignment(&self, id: i64) -> Result<Option<Assignment>, AppError> {
        Ok(self.tables.read().await.assignments.get(&id).cloned())
    }

    async fn list_assignments(&self, filter: AssignmentFilter) -> Result<Vec<Assignment>, AppError> {
        let t = self.tables.read().await;
        let in_class = |a: &Assignment| match filter.class_id {
            None => true,
            Some(c) => t
                .class_subjects
                .get(&a.class_subject_id)
                .map_or(false, |cs| cs.class_id == c),
        };
        let mut rows: Vec<Assignment> = t
            .assignments
            .values()
            .filter(|a| in_class(a))
            .filter(|a| filter.created_by.map_or(true, |u| a.created_by == u))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(rows)
    }

    async fn delete_assignment(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.remove_assignment(id))
    }

    async fn create_submission(&self, new: NewSubmission) -> Result<Submission, AppError> {
        let mut t = self.tables.write().await;
        refers(&t.assignments, new.assignment_id, "assignment_id")?;
        refers(&t.students, new.student_id, "student_id")?;
        check(
            !t.submissions
                .values()
                .any(|s| s.assignment_id == new.assignment_id && s.student_id == new.student_id),
            || unique_violation("submissions_assignment_student_key"),
        )?;
        let s = Submission {
            id: t.next_id(),
            assignment_id: new.assignment_id,
            student_id: new.student_id,
            submission_file: new.submission_file,
            submitted_at: Utc::now(),
            marks_obtained: None,
            feedback: String::new(),
            graded_by: None,
        };
        t.submissions.insert(s.id, s.clone());
        Ok(s)
    }

    async fn get_submission(&self, id: i64) -> Result<Option<Submission>, AppError> {
        Ok(self.tables.read().await.submissions.get(&id).cloned())
    }

    async fn list_submissions(&self, filter: SubmissionFilter) -> Result<Vec<Submission>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Submission> = t
            .submissions
            .values()
            .filter(|s| filter.assignment_id.map_or(true, |a| s.assignment_id == a))
            .filter(|s| filter.student_id.map_or(true, |st| s.student_id == st))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.submitted_at, b.id).cmp(&(a.submitted_at, a.id)));
        Ok(rows)
    }

    async fn count_ungraded_submissions(&self, creator_id: i64) -> Result<u64, AppError> {
        let t = self.tables.read().await;
        Ok(t.submissions
            .values()
            .filter(|s| !s.is_graded())
            .filter(|s| {
                t.assignments
                    .get(&s.assignment_id)
                    .map_or(false, |a| a.created_by == creator_id)
            })
            .count() as u64)
    }

    async fn grade_submission(&self, id: i64, grade: SubmissionGrade) -> Result<Option<Submission>, AppError> {
        let mut t = self.tables.write().await;
        refers(&t.accounts, grade.graded_by, "graded_by")?;
        let Some(s) = t.submissions.get_mut(&id) else {
            return Ok(None);
        };
        s.marks_obtained = Some(grade.marks_obtained);
        s.feedback = grade.feedback;
        s.graded_by = Some(grade.graded_by);
        Ok(Some(s.clone()))
    }

    async fn delete_submission(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.submissions.remove(&id).is_some())
    }

    async fn create_announcement(&self, new: NewAnnouncement) -> Result<Announcement, AppError> {
        let mut t = self.tables.write().await;
        refers_opt(&t.classes, new.target_class_id, "target_class_id")?;
        refers(&t.accounts, new.created_by, "created_by")?;
        let a = Announcement {
            id: t.next_id(),
            title: new.title,
            content: new.content,
            target_role: new.target_role,
            target_class_id: new.target_class_id,
            created_by: new.created_by,
            created_at: Utc::now(),
            is_active: new.is_active,
        };
        t.announcements.insert(a.id, a.clone());
        Ok(a)
    }

    async fn list_announcements(
        &self,
        audience: Audience,
        active_only: bool,
        limit: Option<usize>,
    ) -> Result<Vec<Announcement>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Announcement> = t
            .announcements
            .values()
            .filter(|a| !active_only || a.is_active)
            .filter(|a| a.is_visible_to(&audience))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(take(rows.into_iter(), limit))
    }

    async fn delete_announcement(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.announcements.remove(&id).is_some())
    }

    async fn create_message(&self, new: NewMessage) -> Result<Message, AppError> {
        let mut t = self.tables.write().await;
        refers(&t.accounts, new.sender_id, "sender_id")?;
        refers(&t.accounts, new.receiver_id, "receiver_id")?;
        let m = Message {
            id: t.next_id(),
            sender_id: new.sender_id,
            receiver_id: new.receiver_id,
            subject: new.subject,
            content: new.content,
            sent_at: Utc::now(),
            is_read: false,
        };
        t.messages.insert(m.id, m.clone());
        Ok(m)
    }

    async fn list_messages(&self, filter: MessageFilter) -> Result<Vec<Message>, AppError> {
        let t = self.tables.read().await;
        let mut rows: Vec<Message> = t
            .messages
            .values()
            .filter(|m| filter.sender_id.map_or(true, |s| m.sender_id == s))
            .filter(|m| filter.receiver_id.map_or(true, |r| m.receiver_id == r))
            .cloned()
            .collect();
        rows.sort_by(|a, b| (b.sent_at, b.id).cmp(&(a.sent_at, a.id)));
        Ok(rows)
    }

    async fn count_unread_messages(&self, receiver_id: i64) -> Result<u64, AppError> {
        let t = self.tables.read().await;
        Ok(t.messages.values().filter(|m| m.receiver_id == receiver_id && !m.is_read).count() as u64)
    }

    async fn delete_message(&self, id: i64) -> Result<bool, AppError> {
        Ok(self.tables.write().await.messages.remove(&id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::NON_FIELD_ERRORS;
    use chrono::{Duration, NaiveDate};

    fn new_account(username: &str, role: Role) -> NewAccount {
        NewAccount {
            username: username.into(),
            password_hash: "x".into(),
            email: format!("{}@school.test", username),
            first_name: username.into(),
            last_name: "Test".into(),
            role,
            phone: String::new(),
            address: String::new(),
            profile_picture: None,
            date_of_birth: None,
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 9, d).unwrap()
    }

    struct Fixture {
        store: MemoryStore,
        teacher: Account,
        class: ClassGroup,
        class_subject: ClassSubject,
        student: StudentRecord,
    }

    async fn fixture() -> Fixture {
        let store = MemoryStore::new();
        let teacher = store.create_account(new_account("teach", Role::Teacher)).await.unwrap();
        let pupil = store.create_account(new_account("pupil", Role::Student)).await.unwrap();
        let class = store
            .create_class(NewClassGroup {
                name: "Grade 5".into(),
                section: "A".into(),
                academic_year: DEFAULT_ACADEMIC_YEAR.into(),
                class_teacher_id: Some(teacher.id),
            })
            .await
            .unwrap();
        let subject = store
            .create_subject(NewSubject {
                code: "MATH".into(),
                name: "Mathematics".into(),
                description: String::new(),
            })
            .await
            .unwrap();
        let class_subject = store
            .create_class_subject(NewClassSubject {
                class_id: class.id,
                subject_id: subject.id,
                teacher_id: Some(teacher.id),
            })
            .await
            .unwrap();
        let student = store
            .create_student(NewStudentRecord {
                account_id: pupil.id,
                admission_number: "ADM-1".into(),
                class_id: Some(class.id),
                roll_number: 1,
                parent_id: None,
                admission_date: day(1),
            })
            .await
            .unwrap();
        Fixture {
            store,
            teacher,
            class,
            class_subject,
            student,
        }
    }

    fn assignment(f: &Fixture, title: &str) -> NewAssignment {
        NewAssignment {
            title: title.into(),
            description: "Do it".into(),
            class_subject_id: f.class_subject.id,
            due_date: Utc::now() + Duration::days(3),
            total_marks: 10,
            attachment: None,
            created_by: f.teacher.id,
        }
    }

    #[tokio::test]
    async fn attendance_upsert_updates_in_place() {
        let f = fixture().await;
        let first = f
            .store
            .upsert_attendance(NewAttendance {
                student_id: f.student.id,
                date: day(2),
                status: AttendanceStatus::Present,
                remarks: "on time".into(),
                marked_by: Some(f.teacher.id),
            })
            .await
            .unwrap();
        let second = f
            .store
            .upsert_attendance(NewAttendance {
                student_id: f.student.id,
                date: day(2),
                status: AttendanceStatus::Late,
                remarks: String::new(),
                marked_by: Some(f.teacher.id),
            })
            .await
            .unwrap();
        assert_eq!(first.id, second.id);
        let rows = f.store.list_attendance(f.student.id, None).await.unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].status, AttendanceStatus::Late);
        assert_eq!(rows[0].remarks, "on time");
    }

    #[tokio::test]
    async fn mark_attendance_reports_failed_rows_and_keeps_going() {
        let f = fixture().await;
        let outcomes = f
            .store
            .mark_attendance(
                day(3),
                vec![(9999, AttendanceStatus::Present), (f.student.id, AttendanceStatus::Absent)],
                Some(f.teacher.id),
            )
            .await
            .unwrap();
        assert!(!outcomes[0].is_ok());
        assert!(outcomes[1].is_ok());
        let rows = f.store.list_attendance(f.student.id, None).await.unwrap();
        assert_eq!(rows[0].status, AttendanceStatus::Absent);
    }

    #[tokio::test]
    async fn second_submission_is_a_constraint_violation() {
        let f = fixture().await;
        let a = f.store.create_assignment(assignment(&f, "Fractions")).await.unwrap();
        let first = f
            .store
            .create_submission(NewSubmission {
                assignment_id: a.id,
                student_id: f.student.id,
                submission_file: "submissions/one.pdf".into(),
            })
            .await
            .unwrap();
        let err = f
            .store
            .create_submission(NewSubmission {
                assignment_id: a.id,
                student_id: f.student.id,
                submission_file: "submissions/two.pdf".into(),
            })
            .await
            .unwrap_err();
        match err {
            AppError::ConstraintViolation(v) => assert_eq!(v.field, NON_FIELD_ERRORS),
            other => panic!("unexpected error: {:?}", other),
        }
        let stored = f.store.get_submission(first.id).await.unwrap().unwrap();
        assert_eq!(stored.submission_file, "submissions/one.pdf");
        let all = f
            .store
            .list_submissions(SubmissionFilter {
                assignment_id: Some(a.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn unique_keys_are_enforced() {
        let f = fixture().await;
        let err = f.store.create_account(new_account("teach", Role::Parent)).await.unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(ref v) if v.field == "username"));

        let other = f.store.create_account(new_account("other", Role::Student)).await.unwrap();
        let err = f
            .store
            .create_student(NewStudentRecord {
                account_id: other.id,
                admission_number: "ADM-2".into(),
                class_id: Some(f.class.id),
                roll_number: 1,
                parent_id: None,
                admission_date: day(4),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(ref v) if v.field == "roll_number"));

        let unenrolled = NewStudentRecord {
            account_id: other.id,
            admission_number: "ADM-2".into(),
            class_id: None,
            roll_number: 1,
            parent_id: None,
            admission_date: day(4),
        };
        assert!(f.store.create_student(unenrolled).await.is_ok());
    }

    #[tokio::test]
    async fn missing_reference_is_rejected() {
        let f = fixture().await;
        let err = f
            .store
            .create_grade(NewGrade {
                student_id: f.student.id,
                subject_id: 4242,
                exam_type: "Final".into(),
                marks_obtained: 1.0,
                total_marks: 2.0,
                exam_date: day(5),
                remarks: String::new(),
                uploaded_by: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ConstraintViolation(ref v) if v.field == "subject"));
    }

    #[tokio::test]
    async fn deleting_an_account_cascades_and_nullifies() {
        let f = fixture().await;
        let a = f.store.create_assignment(assignment(&f, "Essay")).await.unwrap();
        f.store
            .create_submission(NewSubmission {
                assignment_id: a.id,
                student_id: f.student.id,
                submission_file: "submissions/e.pdf".into(),
            })
            .await
            .unwrap();

        assert!(f.store.delete_account(f.teacher.id).await.unwrap());
        assert!(f.store.get_assignment(a.id).await.unwrap().is_none());
        assert!(f.store.list_submissions(SubmissionFilter::default()).await.unwrap().is_empty());
        let class = f.store.get_class(f.class.id).await.unwrap().unwrap();
        assert_eq!(class.class_teacher_id, None);
        let cs = f.store.get_class_subject(f.class_subject.id).await.unwrap().unwrap();
        assert_eq!(cs.teacher_id, None);

        assert!(f.store.delete_account(f.student.account_id).await.unwrap());
        assert!(f.store.get_student(f.student.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn deleting_a_class_unenrolls_students() {
        let f = fixture().await;
        assert!(f.store.delete_class(f.class.id).await.unwrap());
        let s = f.store.get_student(f.student.id).await.unwrap().unwrap();
        assert_eq!(s.class_id, None);
        assert!(f.store.get_class_subject(f.class_subject.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn ungraded_count_follows_grading() {
        let f = fixture().await;
        let a = f.store.create_assignment(assignment(&f, "Poem")).await.unwrap();
        let s = f
            .store
            .create_submission(NewSubmission {
                assignment_id: a.id,
                student_id: f.student.id,
                submission_file: "submissions/p.txt".into(),
            })
            .await
            .unwrap();
        assert_eq!(f.store.count_ungraded_submissions(f.teacher.id).await.unwrap(), 1);
        f.store
            .grade_submission(
                s.id,
                SubmissionGrade {
                    marks_obtained: 8,
                    feedback: "Good".into(),
                    graded_by: f.teacher.id,
                },
            )
            .await
            .unwrap();
        assert_eq!(f.store.count_ungraded_submissions(f.teacher.id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn assignments_filter_by_class() {
        let f = fixture().await;
        f.store.create_assignment(assignment(&f, "One")).await.unwrap();
        let other = f
            .store
            .create_class(NewClassGroup {
                name: "Grade 6".into(),
                section: "B".into(),
                academic_year: DEFAULT_ACADEMIC_YEAR.into(),
                class_teacher_id: None,
            })
            .await
            .unwrap();
        let found = f
            .store
            .list_assignments(AssignmentFilter {
                class_id: Some(f.class.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        let none = f
            .store
            .list_assignments(AssignmentFilter {
                class_id: Some(other.id),
                ..Default::default()
            })
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
