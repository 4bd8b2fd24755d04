//! Student records: marks with a derived letter grade.

use crate::error::StoreError;
use crate::record::Record;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Letter grade derived from marks.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum Grade {
    #[serde(rename = "A+")]
    APlus,
    A,
    B,
    C,
    D,
    #[default]
    F,
}

impl Grade {
    pub fn from_marks(marks: f64) -> Self {
        if marks >= 90.0 {
            Grade::APlus
        } else if marks >= 80.0 {
            Grade::A
        } else if marks >= 70.0 {
            Grade::B
        } else if marks >= 60.0 {
            Grade::C
        } else if marks >= 50.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Student {
    pub name: String,
    pub marks: f64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub email: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub phone: String,
    #[serde(default)]
    grade: Grade,
}

/// Partial student update. `None` keeps the current value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StudentPatch {
    pub name: Option<String>,
    pub marks: Option<f64>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

impl StudentPatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.marks.is_none() && self.email.is_none() && self.phone.is_none()
    }
}

impl Student {
    pub fn new(name: impl Into<String>, marks: f64) -> Self {
        let mut student = Self {
            name: name.into(),
            marks,
            email: String::new(),
            phone: String::new(),
            grade: Grade::F,
        };
        student.derive();
        student
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = email.into();
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = phone.into();
        self
    }

    pub fn grade(&self) -> Grade {
        self.grade
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// The roster a fresh student register is seeded with.
    pub fn sample_roster() -> Vec<Student> {
        vec![
            Student::new("Alice Johnson", 85.5)
                .with_email("alice@email.com")
                .with_phone("123-456-7890"),
            Student::new("Bob Smith", 92.0)
                .with_email("bob@email.com")
                .with_phone("123-456-7891"),
            Student::new("Carol Davis", 76.5)
                .with_email("carol@email.com")
                .with_phone("123-456-7892"),
            Student::new("David Wilson", 88.0)
                .with_email("david@email.com")
                .with_phone("123-456-7893"),
            Student::new("Eva Brown", 65.5)
                .with_email("eva@email.com")
                .with_phone("123-456-7894"),
        ]
    }
}

impl Record for Student {
    type Patch = StudentPatch;

    fn derive(&mut self) {
        self.grade = Grade::from_marks(self.marks);
    }

    fn validate(&self) -> Result<(), StoreError> {
        if self.name.trim().is_empty() {
            return Err(StoreError::invalid_field("name", "must not be empty"));
        }
        if !self.marks.is_finite() || !(0.0..=100.0).contains(&self.marks) {
            return Err(StoreError::invalid_field(
                "marks",
                format!("must lie in [0, 100], got {}", self.marks),
            ));
        }
        Ok(())
    }

    fn apply(&mut self, patch: StudentPatch) {
        if let Some(name) = patch.name {
            self.name = name;
        }
        if let Some(marks) = patch.marks {
            self.marks = marks;
        }
        if let Some(email) = patch.email {
            self.email = email;
        }
        if let Some(phone) = patch.phone {
            self.phone = phone;
        }
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn measure(&self) -> Option<f64> {
        Some(self.marks)
    }

    fn category(&self) -> Option<String> {
        Some(self.grade.to_string())
    }
}
