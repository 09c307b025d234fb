//! Which roles may perform which operation.

use crate::model::Role;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Logout,
    Dashboard,
    AdminDashboard,
    TeacherDashboard,
    StudentDashboard,
    ParentDashboard,
    ListStudents,
    CreateStudent,
    MarkAttendance,
    UploadGrade,
    ListAssignments,
    CreateAssignment,
    SubmitAssignment,
    GradeSubmission,
    CreateAnnouncement,
    SendMessage,
    Inbox,
    /// Ownership of the child is checked by the handler.
    ViewChild,
    StudentReport,
    ClassReport,
    Manage,
}

impl Operation {
    pub fn allowed_roles(self) -> &'static [Role] {
        use Role::*;
        match self {
            Operation::Logout
            | Operation::Dashboard
            | Operation::ListAssignments
            | Operation::SendMessage
            | Operation::Inbox => &Role::ALL,
            Operation::AdminDashboard
            | Operation::ListStudents
            | Operation::CreateStudent
            | Operation::Manage => &[Admin],
            Operation::TeacherDashboard
            | Operation::UploadGrade
            | Operation::CreateAssignment
            | Operation::GradeSubmission => &[Teacher],
            Operation::StudentDashboard | Operation::SubmitAssignment => &[Student],
            Operation::ParentDashboard | Operation::ViewChild => &[Parent],
            Operation::MarkAttendance
            | Operation::CreateAnnouncement
            | Operation::StudentReport
            | Operation::ClassReport => &[Admin, Teacher],
        }
    }

    pub fn allows(self, role: Role) -> bool {
        self.allowed_roles().contains(&role)
    }
}
