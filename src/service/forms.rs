//! Form inputs as received (every field a string) and their pure validators.
//! Reference existence is checked afterwards with [`References`].

use super::validation::{checkbox, FieldErrors, FieldValidator, INVALID_CHOICE, REQUIRED};
use crate::blob::Upload;
use crate::error::AppError;
use crate::model::*;
use crate::store::Store;
use chrono::{DateTime, NaiveDate, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;

static USERNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern compiles"));
const MIN_PASSWORD_LENGTH: usize = 8;
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "bmp", "webp"];

/// Identity part of account creation.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AccountInput {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(skip_serializing)]
    pub password1: String,
    #[serde(skip_serializing)]
    pub password2: String,
}

#[derive(Clone, Debug)]
pub struct AccountFields {
    pub username: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

impl AccountInput {
    pub fn validate(&self) -> Result<AccountFields, FieldErrors> {
        let mut v = FieldValidator::new();
        let username = self.username.trim();
        let username = v.text("username", username, Some(150)).and_then(|u| {
            v.matches(
                "username",
                &u,
                &USERNAME_RE,
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            )
            .then_some(u)
        });
        let email = v.email("email", &self.email);
        let first_name = v.text("first_name", &self.first_name, Some(100));
        let last_name = v.text("last_name", &self.last_name, Some(100));
        let password = check_password(&mut v, &self.password1, &self.password2);
        v.finish()?;
        match (username, email, first_name, last_name, password) {
            (Some(username), Some(email), Some(first_name), Some(last_name), Some(password)) => Ok(AccountFields {
                username,
                email,
                first_name,
                last_name,
                password,
            }),
            _ => Err(FieldErrors::new()),
        }
    }
}

fn check_password(v: &mut FieldValidator, password1: &str, password2: &str) -> Option<String> {
    if password1.is_empty() {
        v.add("password1", REQUIRED);
    }
    if password2.is_empty() {
        v.add("password2", REQUIRED);
        return None;
    }
    if password1.is_empty() {
        return None;
    }
    if password1 != password2 {
        v.add("password2", "The two password fields didn't match.");
        return None;
    }
    if password1.chars().count() < MIN_PASSWORD_LENGTH {
        v.add(
            "password2",
            format!(
                "This password is too short. It must contain at least {} characters.",
                MIN_PASSWORD_LENGTH
            ),
        );
        return None;
    }
    Some(password1.to_string())
}

/// Profile part of account creation. The picture arrives as a separate upload.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ProfileInput {
    pub role: String,
    pub phone: String,
    pub address: String,
    pub date_of_birth: String,
}

#[derive(Clone, Debug, Default)]
pub struct ProfileFields {
    pub role: Option<Role>,
    pub phone: String,
    pub address: String,
    pub date_of_birth: Option<NaiveDate>,
}

impl ProfileInput {
    pub fn validate(&self, picture: Option<&Upload>) -> Result<ProfileFields, FieldErrors> {
        let mut v = FieldValidator::new();
        let role = v.optional_choice::<Role>("role", &self.role);
        let phone = v.optional_text("phone", &self.phone, Some(15));
        let address = v.optional_text("address", &self.address, None);
        let date_of_birth = v.optional_date("date_of_birth", &self.date_of_birth);
        if let Some(p) = picture {
            check_image(&mut v, "profile_picture", p);
        }
        v.finish()?;
        Ok(ProfileFields {
            role,
            phone,
            address,
            date_of_birth,
        })
    }
}

fn check_image(v: &mut FieldValidator, field: &str, upload: &Upload) {
    let by_type = upload.content_type.as_deref().is_some_and(|t| t.starts_with("image/"));
    let by_ext = upload
        .extension()
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()));
    if !(by_type || by_ext) {
        v.add(
            field,
            "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
        );
    }
}

impl AccountFields {
    pub fn into_new_account(
        self,
        password_hash: String,
        role: Role,
        profile: ProfileFields,
        profile_picture: Option<String>,
    ) -> NewAccount {
        NewAccount {
            username: self.username,
            password_hash,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            role,
            phone: profile.phone,
            address: profile.address,
            profile_picture,
            date_of_birth: profile.date_of_birth,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StudentInput {
    pub admission_number: String,
    pub class_enrolled: String,
    pub roll_number: String,
    pub parent: String,
    pub admission_date: String,
}

#[derive(Clone, Debug)]
pub struct StudentFields {
    pub admission_number: String,
    pub class_id: Option<i64>,
    pub roll_number: i32,
    pub parent_id: Option<i64>,
    pub admission_date: NaiveDate,
}

impl StudentFields {
    pub fn into_new(self, account_id: i64) -> NewStudentRecord {
        NewStudentRecord {
            account_id,
            admission_number: self.admission_number,
            class_id: self.class_id,
            roll_number: self.roll_number,
            parent_id: self.parent_id,
            admission_date: self.admission_date,
        }
    }
}

impl StudentInput {
    pub fn validate(&self) -> Result<StudentFields, FieldErrors> {
        let mut v = FieldValidator::new();
        let admission_number = v.text("admission_number", &self.admission_number, Some(20));
        let class_id = v.optional_reference("class_enrolled", &self.class_enrolled);
        let roll_number = v.non_negative_integer("roll_number", &self.roll_number);
        let parent_id = v.optional_reference("parent", &self.parent);
        let admission_date = v.date("admission_date", &self.admission_date);
        v.finish()?;
        match (admission_number, roll_number, admission_date) {
            (Some(admission_number), Some(roll_number), Some(admission_date)) => Ok(StudentFields {
                admission_number,
                class_id,
                roll_number,
                parent_id,
                admission_date,
            }),
            _ => Err(FieldErrors::new()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GradeInput {
    pub student: String,
    pub subject: String,
    pub exam_type: String,
    pub marks_obtained: String,
    pub total_marks: String,
    pub exam_date: String,
    pub remarks: String,
}

impl GradeInput {
    pub fn validate(&self, uploaded_by: i64) -> Result<NewGrade, FieldErrors> {
        let mut v = FieldValidator::new();
        let student_id = v.reference("student", &self.student);
        let subject_id = v.reference("subject", &self.subject);
        let exam_type = v.text("exam_type", &self.exam_type, Some(50));
        let marks_obtained = v.marks("marks_obtained", &self.marks_obtained);
        let total_marks = v.marks("total_marks", &self.total_marks);
        if let (Some(obtained), Some(total)) = (marks_obtained, total_marks) {
            if obtained > total {
                v.add(
                    "marks_obtained",
                    format!("Ensure this value is less than or equal to {}.", total),
                );
            }
        }
        let exam_date = v.date("exam_date", &self.exam_date);
        let remarks = v.optional_text("remarks", &self.remarks, None);
        v.finish()?;
        match (student_id, subject_id, exam_type, marks_obtained, total_marks, exam_date) {
            (Some(student_id), Some(subject_id), Some(exam_type), Some(marks_obtained), Some(total_marks), Some(exam_date)) => {
                Ok(NewGrade {
                    student_id,
                    subject_id,
                    exam_type,
                    marks_obtained,
                    total_marks,
                    exam_date,
                    remarks,
                    uploaded_by: Some(uploaded_by),
                })
            }
            _ => Err(FieldErrors::new()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AssignmentInput {
    pub title: String,
    pub description: String,
    pub class_subject: String,
    pub due_date: String,
    pub total_marks: String,
}

impl AssignmentInput {
    /// The attachment path is filled in once the upload has been stored.
    pub fn validate(&self, created_by: i64) -> Result<NewAssignment, FieldErrors> {
        let mut v = FieldValidator::new();
        let title = v.text("title", &self.title, Some(200));
        let description = v.text("description", &self.description, None);
        let class_subject_id = v.reference("class_subject", &self.class_subject);
        let due_date: Option<DateTime<Utc>> = v.datetime("due_date", &self.due_date);
        let total_marks = v.non_negative_integer("total_marks", &self.total_marks);
        v.finish()?;
        match (title, description, class_subject_id, due_date, total_marks) {
            (Some(title), Some(description), Some(class_subject_id), Some(due_date), Some(total_marks)) => {
                Ok(NewAssignment {
                    title,
                    description,
                    class_subject_id,
                    due_date,
                    total_marks,
                    attachment: None,
                    created_by,
                })
            }
            _ => Err(FieldErrors::new()),
        }
    }
}

/// The submission form carries only the file.
#[derive(Clone, Copy, Debug)]
pub struct SubmissionInput<'a> {
    pub submission_file: Option<&'a Upload>,
}

impl<'a> SubmissionInput<'a> {
    pub fn validate(&self) -> Result<&'a Upload, FieldErrors> {
        match self.submission_file {
            Some(f) if !f.bytes.is_empty() => Ok(f),
            Some(_) => {
                let mut errors = FieldErrors::new();
                errors.add("submission_file", "The submitted file is empty.");
                Err(errors)
            }
            None => {
                let mut errors = FieldErrors::new();
                errors.add("submission_file", REQUIRED);
                Err(errors)
            }
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AnnouncementInput {
    pub title: String,
    pub content: String,
    pub target_role: String,
    pub target_class: String,
    pub is_active: String,
}

impl AnnouncementInput {
    pub fn validate(&self, created_by: i64) -> Result<NewAnnouncement, FieldErrors> {
        let mut v = FieldValidator::new();
        let title = v.text("title", &self.title, Some(200));
        let content = v.text("content", &self.content, None);
        let target_role = v.optional_choice::<Role>("target_role", &self.target_role);
        let target_class_id = v.optional_reference("target_class", &self.target_class);
        v.finish()?;
        match (title, content) {
            (Some(title), Some(content)) => Ok(NewAnnouncement {
                title,
                content,
                target_role,
                target_class_id,
                created_by,
                is_active: checkbox(Some(&self.is_active)),
            }),
            _ => Err(FieldErrors::new()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct MessageInput {
    pub receiver: String,
    pub subject: String,
    pub content: String,
}

impl MessageInput {
    pub fn validate(&self, sender_id: i64) -> Result<NewMessage, FieldErrors> {
        let mut v = FieldValidator::new();
        let receiver_id = v.reference("receiver", &self.receiver);
        let subject = v.text("subject", &self.subject, Some(200));
        let content = v.text("content", &self.content, None);
        v.finish()?;
        match (receiver_id, subject, content) {
            (Some(receiver_id), Some(subject), Some(content)) => Ok(NewMessage {
                sender_id,
                receiver_id,
                subject,
                content,
            }),
            _ => Err(FieldErrors::new()),
        }
    }
}

/// Date of an attendance sheet; per-student statuses are read from `status_<id>` fields.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct AttendanceInput {
    pub date: String,
}

impl AttendanceInput {
    pub fn validate(&self) -> Result<NaiveDate, FieldErrors> {
        let mut v = FieldValidator::new();
        let date = v.date("date", &self.date);
        v.finish()?;
        date.ok_or_default()
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassInput {
    pub name: String,
    pub section: String,
    pub academic_year: String,
    pub class_teacher: String,
}

impl ClassInput {
    pub fn validate(&self) -> Result<NewClassGroup, FieldErrors> {
        let mut v = FieldValidator::new();
        let name = v.text("name", &self.name, Some(50));
        let section = v.text("section", &self.section, Some(10));
        let academic_year = v.optional_text("academic_year", &self.academic_year, Some(20));
        let class_teacher_id = v.optional_reference("class_teacher", &self.class_teacher);
        v.finish()?;
        match (name, section) {
            (Some(name), Some(section)) => Ok(NewClassGroup {
                name,
                section,
                academic_year: if academic_year.is_empty() {
                    DEFAULT_ACADEMIC_YEAR.to_string()
                } else {
                    academic_year
                },
                class_teacher_id,
            }),
            _ => Err(FieldErrors::new()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct SubjectInput {
    pub code: String,
    pub name: String,
    pub description: String,
}

impl SubjectInput {
    pub fn validate(&self) -> Result<NewSubject, FieldErrors> {
        let mut v = FieldValidator::new();
        let code = v.text("code", &self.code, Some(20));
        let name = v.text("name", &self.name, Some(100));
        let description = v.optional_text("description", &self.description, None);
        v.finish()?;
        match (code, name) {
            (Some(code), Some(name)) => Ok(NewSubject { code, name, description }),
            _ => Err(FieldErrors::new()),
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ClassSubjectInput {
    pub class_group: String,
    pub subject: String,
    pub teacher: String,
}

impl ClassSubjectInput {
    pub fn validate(&self) -> Result<NewClassSubject, FieldErrors> {
        let mut v = FieldValidator::new();
        let class_id = v.reference("class_group", &self.class_group);
        let subject_id = v.reference("subject", &self.subject);
        let teacher_id = v.optional_reference("teacher", &self.teacher);
        v.finish()?;
        match (class_id, subject_id) {
            (Some(class_id), Some(subject_id)) => Ok(NewClassSubject {
                class_id,
                subject_id,
                teacher_id,
            }),
            _ => Err(FieldErrors::new()),
        }
    }
}

/// Marks and feedback for a submission.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct GradeSubmissionInput {
    pub marks_obtained: String,
    pub feedback: String,
}

impl GradeSubmissionInput {
    pub fn validate(&self, total_marks: i32, graded_by: i64) -> Result<SubmissionGrade, FieldErrors> {
        let mut v = FieldValidator::new();
        let marks = v.non_negative_integer("marks_obtained", &self.marks_obtained);
        if let Some(m) = marks {
            if m > total_marks {
                v.add(
                    "marks_obtained",
                    format!("Ensure this value is less than or equal to {}.", total_marks),
                );
            }
        }
        let feedback = v.optional_text("feedback", &self.feedback, None);
        v.finish()?;
        marks
            .map(|marks_obtained| SubmissionGrade {
                marks_obtained,
                feedback,
                graded_by,
            })
            .ok_or_default()
    }
}

/// Account created from the management API: identity, role and profile in one body.
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct StaffAccountInput {
    #[serde(flatten)]
    pub account: AccountInput,
    #[serde(flatten)]
    pub profile: ProfileInput,
}

impl StaffAccountInput {
    /// Students are enrolled through the student form, so the role here must be another one.
    pub fn validate(&self) -> Result<(AccountFields, Role, ProfileFields), FieldErrors> {
        let account = self.account.validate();
        let profile = self.profile.validate(None);
        let mut errors = FieldErrors::new();
        let role = match profile.as_ref().map(|p| p.role) {
            Ok(None) => {
                errors.add("role", REQUIRED);
                None
            }
            Ok(Some(Role::Student)) => {
                errors.add("role", "Students are created through the student form.");
                None
            }
            Ok(Some(role)) => Some(role),
            Err(_) => None,
        };
        match (account, profile, role) {
            (Ok(a), Ok(p), Some(role)) if errors.is_empty() => Ok((a, role, p)),
            (a, p, _) => {
                if let Err(e) = a {
                    errors.merge(e);
                }
                if let Err(e) = p {
                    errors.merge(e);
                }
                Err(errors)
            }
        }
    }
}

trait OrDefaultErrors<T> {
    fn ok_or_default(self) -> Result<T, FieldErrors>;
}

impl<T> OrDefaultErrors<T> for Option<T> {
    fn ok_or_default(self) -> Result<T, FieldErrors> {
        self.ok_or_else(FieldErrors::new)
    }
}

/// Checks that ids from a validated form point at existing rows of the right kind.
pub struct References<'a> {
    store: &'a dyn Store,
    errors: FieldErrors,
}

impl<'a> References<'a> {
    pub fn new(store: &'a dyn Store) -> Self {
        References {
            store,
            errors: FieldErrors::new(),
        }
    }

    fn invalid(&mut self, field: &str) {
        self.errors.add(field, INVALID_CHOICE);
    }

    pub async fn resolve_class(&mut self, field: &str, id: Option<i64>) -> Result<Option<ClassGroup>, AppError> {
        let Some(id) = id else { return Ok(None) };
        let found = self.store.get_class(id).await?;
        if found.is_none() {
            self.invalid(field);
        }
        Ok(found)
    }

    pub async fn resolve_subject(&mut self, field: &str, id: i64) -> Result<Option<Subject>, AppError> {
        let found = self.store.get_subject(id).await?;
        if found.is_none() {
            self.invalid(field);
        }
        Ok(found)
    }

    pub async fn resolve_class_subject(&mut self, field: &str, id: i64) -> Result<Option<ClassSubject>, AppError> {
        let found = self.store.get_class_subject(id).await?;
        if found.is_none() {
            self.invalid(field);
        }
        Ok(found)
    }

    pub async fn resolve_student(&mut self, field: &str, id: i64) -> Result<Option<StudentRecord>, AppError> {
        let found = self.store.get_student(id).await?;
        if found.is_none() {
            self.invalid(field);
        }
        Ok(found)
    }

    /// An account that exists and, when `roles` is non-empty, has one of them.
    pub async fn resolve_account(
        &mut self,
        field: &str,
        id: Option<i64>,
        roles: &[Role],
    ) -> Result<Option<Account>, AppError> {
        let Some(id) = id else { return Ok(None) };
        let found = self
            .store
            .get_account(id)
            .await?
            .filter(|a| roles.is_empty() || roles.contains(&a.role));
        if found.is_none() {
            self.invalid(field);
        }
        Ok(found)
    }

    pub fn finish(self) -> Result<(), FieldErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn account_input() -> AccountInput {
        AccountInput {
            username: "jdoe".into(),
            email: "jdoe@school.test".into(),
            first_name: "Jane".into(),
            last_name: "Doe".into(),
            password1: "long-enough".into(),
            password2: "long-enough".into(),
        }
    }

    #[test]
    fn account_input_accepts_valid_data() {
        let fields = account_input().validate().unwrap();
        assert_eq!(fields.username, "jdoe");
        assert_eq!(fields.password, "long-enough");
    }

    #[test]
    fn account_input_reports_every_problem() {
        let input = AccountInput {
            username: "bad name!".into(),
            email: "nope".into(),
            first_name: String::new(),
            password2: "different".into(),
            ..account_input()
        };
        let errors = input.validate().unwrap_err();
        for field in ["username", "email", "first_name", "password2"] {
            assert!(errors.contains(field), "missing error for {}", field);
        }
    }

    #[test]
    fn short_password_is_rejected() {
        let input = AccountInput {
            password1: "short".into(),
            password2: "short".into(),
            ..account_input()
        };
        assert!(input.validate().unwrap_err().contains("password2"));
    }

    #[test]
    fn student_input_allows_missing_class_and_parent() {
        let input = StudentInput {
            admission_number: "ADM-7".into(),
            roll_number: "7".into(),
            admission_date: "2024-08-01".into(),
            ..Default::default()
        };
        let fields = input.validate().unwrap();
        assert_eq!(fields.class_id, None);
        assert_eq!(fields.parent_id, None);
        let record = fields.into_new(3);
        assert_eq!(record.account_id, 3);
    }

    #[test]
    fn student_input_rejects_negative_roll_and_bad_date() {
        let input = StudentInput {
            admission_number: "ADM-7".into(),
            roll_number: "-1".into(),
            admission_date: "01/08/2024".into(),
            ..Default::default()
        };
        let errors = input.validate().unwrap_err();
        assert!(errors.contains("roll_number"));
        assert!(errors.contains("admission_date"));
    }

    #[test]
    fn grade_input_checks_marks() {
        let input = GradeInput {
            student: "1".into(),
            subject: "2".into(),
            exam_type: "Midterm".into(),
            marks_obtained: "1000".into(),
            total_marks: "12.345".into(),
            exam_date: "2024-03-01".into(),
            remarks: String::new(),
        };
        let errors = input.validate(9).unwrap_err();
        assert!(errors.contains("marks_obtained"));
        assert!(errors.contains("total_marks"));

        let ok = GradeInput {
            marks_obtained: "45.5".into(),
            total_marks: "50".into(),
            ..input
        }
        .validate(9)
        .unwrap();
        assert_eq!(ok.uploaded_by, Some(9));
        assert_eq!(ok.marks_obtained, 45.5);
    }

    #[test]
    fn grade_input_rejects_marks_above_total() {
        let input = GradeInput {
            student: "1".into(),
            subject: "2".into(),
            exam_type: "Final".into(),
            marks_obtained: "60".into(),
            total_marks: "50".into(),
            exam_date: "2024-03-01".into(),
            remarks: String::new(),
        };
        let errors = input.validate(9).unwrap_err();
        assert!(errors.contains("marks_obtained"));
        assert!(!errors.contains("total_marks"));

        let full = GradeInput {
            marks_obtained: "50".into(),
            ..input
        }
        .validate(9)
        .unwrap();
        assert_eq!(full.marks_obtained, full.total_marks);
    }

    #[test]
    fn assignment_due_date_accepts_datetime_local() {
        let input = AssignmentInput {
            title: "Fractions".into(),
            description: "Worksheet 3".into(),
            class_subject: "4".into(),
            due_date: "2024-10-01T17:30".into(),
            total_marks: "20".into(),
        };
        let a = input.validate(2).unwrap();
        assert_eq!(a.due_date.to_rfc3339(), "2024-10-01T17:30:00+00:00");
        assert_eq!(a.attachment, None);
    }

    #[test]
    fn announcement_checkbox_and_optional_targets() {
        let input = AnnouncementInput {
            title: "Sports day".into(),
            content: "Friday".into(),
            is_active: "on".into(),
            ..Default::default()
        };
        let a = input.validate(1).unwrap();
        assert!(a.is_active);
        assert_eq!(a.target_role, None);
        assert_eq!(a.target_class_id, None);

        let bad = AnnouncementInput {
            target_role: "janitor".into(),
            ..input
        };
        assert!(bad.validate(1).unwrap_err().contains("target_role"));
    }

    #[test]
    fn submission_requires_a_non_empty_file() {
        assert!(SubmissionInput { submission_file: None }.validate().is_err());
        let empty = Upload {
            filename: "a.txt".into(),
            content_type: None,
            bytes: Vec::new(),
        };
        assert!(SubmissionInput { submission_file: Some(&empty) }.validate().is_err());
        let file = Upload {
            bytes: b"work".to_vec(),
            ..empty
        };
        assert!(SubmissionInput { submission_file: Some(&file) }.validate().is_ok());
    }

    #[test]
    fn grading_cannot_exceed_total() {
        let input = GradeSubmissionInput {
            marks_obtained: "11".into(),
            feedback: String::new(),
        };
        assert!(input.validate(10, 1).is_err());
        let input = GradeSubmissionInput {
            marks_obtained: "10".into(),
            feedback: "Great".into(),
        };
        assert_eq!(input.validate(10, 1).unwrap().marks_obtained, 10);
    }

    #[test]
    fn class_input_defaults_academic_year() {
        let c = ClassInput {
            name: "Grade 1".into(),
            section: "A".into(),
            ..Default::default()
        }
        .validate()
        .unwrap();
        assert_eq!(c.academic_year, DEFAULT_ACADEMIC_YEAR);
    }

    #[test]
    fn staff_account_requires_non_student_role() {
        let mut input = StaffAccountInput {
            account: account_input(),
            profile: ProfileInput {
                role: "student".into(),
                ..Default::default()
            },
        };
        assert!(input.validate().unwrap_err().contains("role"));
        input.profile.role = "teacher".into();
        let (_, role, _) = input.validate().unwrap();
        assert_eq!(role, Role::Teacher);
    }

    #[test]
    fn profile_picture_must_look_like_an_image() {
        let doc = Upload {
            filename: "cv.pdf".into(),
            content_type: Some("application/pdf".into()),
            bytes: b"%PDF".to_vec(),
        };
        let errors = ProfileInput::default().validate(Some(&doc)).unwrap_err();
        assert!(errors.contains("profile_picture"));
        let photo = Upload {
            filename: "me.PNG".into(),
            content_type: None,
            bytes: vec![1, 2, 3],
        };
        assert!(ProfileInput::default().validate(Some(&photo)).is_ok());
    }

    #[tokio::test]
    async fn references_flag_missing_and_wrong_role() {
        let store = MemoryStore::new();
        let teacher = store
            .create_account(NewAccount {
                username: "t1".into(),
                password_hash: "x".into(),
                email: String::new(),
                first_name: "T".into(),
                last_name: "One".into(),
                role: Role::Teacher,
                phone: String::new(),
                address: String::new(),
                profile_picture: None,
                date_of_birth: None,
            })
            .await
            .unwrap();
        let mut refs = References::new(&store);
        assert!(refs.resolve_account("parent", Some(teacher.id), &[Role::Parent]).await.unwrap().is_none());
        assert!(refs.resolve_account("receiver", Some(teacher.id), &[]).await.unwrap().is_some());
        assert!(refs.resolve_class("class_enrolled", Some(77)).await.unwrap().is_none());
        assert!(refs.resolve_class("class_enrolled", None).await.unwrap().is_none());
        let errors = refs.finish().unwrap_err();
        assert!(errors.contains("parent"));
        assert!(errors.contains("class_enrolled"));
        assert!(!errors.contains("receiver"));
    }
}
