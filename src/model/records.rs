//! Attendance and grade records, with the derived grade values.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AttendanceStatus {
    Present,
    Absent,
    Late,
    Excused,
}

impl AttendanceStatus {
    pub const ALL: [AttendanceStatus; 4] = [
        AttendanceStatus::Present,
        AttendanceStatus::Absent,
        AttendanceStatus::Late,
        AttendanceStatus::Excused,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Present => "present",
            AttendanceStatus::Absent => "absent",
            AttendanceStatus::Late => "late",
            AttendanceStatus::Excused => "excused",
        }
    }
}

impl fmt::Display for AttendanceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown attendance status: {0}")]
pub struct UnknownStatus(pub String);

impl FromStr for AttendanceStatus {
    type Err = UnknownStatus;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "present" => Ok(AttendanceStatus::Present),
            "absent" => Ok(AttendanceStatus::Absent),
            "late" => Ok(AttendanceStatus::Late),
            "excused" => Ok(AttendanceStatus::Excused),
            other => Err(UnknownStatus(other.to_string())),
        }
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct AttendanceRecord {
    pub id: i64,
    pub student_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: String,
    pub marked_by: Option<i64>,
}

/// Attendance write keyed by (student, date). Remarks only apply when the row is first inserted.
#[derive(Clone, Debug)]
pub struct NewAttendance {
    pub student_id: i64,
    pub date: NaiveDate,
    pub status: AttendanceStatus,
    pub remarks: String,
    pub marked_by: Option<i64>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum LetterGrade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    F,
}

impl LetterGrade {
    /// Thresholds are inclusive on the lower bound: 90 is A+, 89.99 is A.
    pub fn from_percentage(pct: f64) -> Self {
        if pct >= 90.0 {
            LetterGrade::APlus
        } else if pct >= 80.0 {
            LetterGrade::A
        } else if pct >= 70.0 {
            LetterGrade::B
        } else if pct >= 60.0 {
            LetterGrade::C
        } else if pct >= 50.0 {
            LetterGrade::D
        } else {
            LetterGrade::F
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LetterGrade::APlus => "A+",
            LetterGrade::A => "A",
            LetterGrade::B => "B",
            LetterGrade::C => "C",
            LetterGrade::D => "D",
            LetterGrade::F => "F",
        }
    }
}

impl fmt::Display for LetterGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Serialize, sqlx::FromRow)]
pub struct GradeRecord {
    pub id: i64,
    pub student_id: i64,
    pub subject_id: i64,
    pub exam_type: String,
    pub marks_obtained: f64,
    pub total_marks: f64,
    pub exam_date: NaiveDate,
    pub remarks: String,
    pub uploaded_by: Option<i64>,
}

impl GradeRecord {
    /// Obtained over total as a percentage rounded to two decimals; 0 when total is 0.
    pub fn percentage(&self) -> f64 {
        percentage(self.marks_obtained, self.total_marks)
    }

    pub fn grade_letter(&self) -> LetterGrade {
        LetterGrade::from_percentage(self.percentage())
    }
}

pub fn percentage(obtained: f64, total: f64) -> f64 {
    if total > 0.0 {
        round2(obtained / total * 100.0)
    } else {
        0.0
    }
}

pub(crate) fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[derive(Clone, Debug)]
pub struct NewGrade {
    pub student_id: i64,
    pub subject_id: i64,
    pub exam_type: String,
    pub marks_obtained: f64,
    pub total_marks: f64,
    pub exam_date: NaiveDate,
    pub remarks: String,
    pub uploaded_by: Option<i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grade(obtained: f64, total: f64) -> GradeRecord {
        GradeRecord {
            id: 1,
            student_id: 1,
            subject_id: 1,
            exam_type: "Midterm".into(),
            marks_obtained: obtained,
            total_marks: total,
            exam_date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            remarks: String::new(),
            uploaded_by: None,
        }
    }

    #[test]
    fn zero_total_gives_zero_percentage() {
        assert_eq!(grade(0.0, 0.0).percentage(), 0.0);
        assert_eq!(grade(42.0, 0.0).percentage(), 0.0);
        assert_eq!(grade(42.0, 0.0).grade_letter(), LetterGrade::F);
    }

    #[test]
    fn percentage_is_rounded_to_two_decimals() {
        assert_eq!(grade(1.0, 3.0).percentage(), 33.33);
        assert_eq!(grade(2.0, 3.0).percentage(), 66.67);
        assert_eq!(grade(45.0, 50.0).percentage(), 90.0);
    }

    #[test]
    fn letter_thresholds_are_inclusive_on_lower_bound() {
        let cases = [
            (100.0, LetterGrade::APlus),
            (90.0, LetterGrade::APlus),
            (89.99, LetterGrade::A),
            (80.0, LetterGrade::A),
            (79.99, LetterGrade::B),
            (70.0, LetterGrade::B),
            (69.99, LetterGrade::C),
            (60.0, LetterGrade::C),
            (59.99, LetterGrade::D),
            (50.0, LetterGrade::D),
            (49.99, LetterGrade::F),
            (0.0, LetterGrade::F),
        ];
        for (pct, expected) in cases {
            assert_eq!(LetterGrade::from_percentage(pct), expected, "pct {}", pct);
        }
    }

    #[test]
    fn letter_grade_serializes_as_display_text() {
        assert_eq!(serde_json::to_value(LetterGrade::APlus).unwrap(), "A+");
        assert_eq!(LetterGrade::D.to_string(), "D");
    }

    #[test]
    fn status_round_trips_through_text() {
        for status in AttendanceStatus::ALL {
            assert_eq!(status.as_str().parse::<AttendanceStatus>().unwrap(), status);
        }
        assert!("sick".parse::<AttendanceStatus>().is_err());
    }
}
