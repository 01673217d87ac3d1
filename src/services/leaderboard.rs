// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Leaderboard ranking and student profile lookup.

use crate::models::{CurrentUser, RankedStudent, Student};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

const BUILTIN_STUDENTS: &str = include_str!("../../data/students.json");
const DEFAULT_AVATAR_URL: &str = "https://placehold.co/100x100.png";

/// Rank students by total points, highest first.
///
/// The sort is stable, so students with equal totals keep their input order.
/// Rank is the 1-based position in the result.
pub fn rank_students(students: &[Student]) -> Vec<RankedStudent> {
    let mut totals: Vec<(u32, &Student)> = students
        .iter()
        .map(|student| (student.total_points(), student))
        .collect();
    totals.sort_by(|a, b| b.0.cmp(&a.0));

    totals
        .into_iter()
        .enumerate()
        .map(|(index, (total_points, student))| RankedStudent {
            id: student.id.clone(),
            name: student.name.clone(),
            avatar_url: student.avatar_url.clone(),
            accomplishments: student.accomplishments.clone(),
            total_points,
            rank: Some(index as u32 + 1),
        })
        .collect()
}

/// The fixed student dataset behind the leaderboard.
#[derive(Debug, Default, Clone)]
pub struct StudentDirectory {
    students: Vec<Student>,
}

impl StudentDirectory {
    /// The dataset shipped with the crate.
    pub fn builtin() -> Result<Self, StudentDataError> {
        Self::load_from_json(BUILTIN_STUDENTS)
    }

    /// Load students from a JSON file.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, StudentDataError> {
        let json_data = fs::read_to_string(path.as_ref())
            .map_err(|e| StudentDataError::IoError(e.to_string()))?;
        Self::load_from_json(&json_data)
    }

    /// Load students from a JSON array.
    pub fn load_from_json(json_data: &str) -> Result<Self, StudentDataError> {
        let students: Vec<Student> = serde_json::from_str(json_data)
            .map_err(|e| StudentDataError::ParseError(e.to_string()))?;

        let mut seen = HashSet::new();
        if let Some(dup) = students.iter().find(|s| !seen.insert(s.id.as_str())) {
            return Err(StudentDataError::DuplicateId(dup.id.clone()));
        }

        tracing::info!(count = students.len(), "Loaded students");
        Ok(Self { students })
    }

    pub fn students(&self) -> &[Student] {
        &self.students
    }

    pub fn leaderboard(&self) -> Vec<RankedStudent> {
        rank_students(&self.students)
    }

    /// Profile for the signed-in user.
    ///
    /// Matched against the dataset by first name, case-insensitively. Users
    /// with no match get an empty, unranked profile.
    pub fn profile_for(&self, user: &CurrentUser) -> RankedStudent {
        let first_name = user
            .name
            .as_deref()
            .and_then(|name| name.split_whitespace().next())
            .map(str::to_lowercase);

        if let Some(first_name) = first_name {
            if let Some(found) = self
                .leaderboard()
                .into_iter()
                .find(|s| s.name.to_lowercase().contains(&first_name))
            {
                return found;
            }
        }

        RankedStudent {
            id: user.uid.clone(),
            name: user
                .name
                .clone()
                .or_else(|| user.email.clone())
                .unwrap_or_else(|| "Student".to_string()),
            avatar_url: DEFAULT_AVATAR_URL.to_string(),
            accomplishments: Vec::new(),
            total_points: 0,
            rank: None,
        }
    }
}

/// Errors from loading the student dataset.
#[derive(Debug, thiserror::Error)]
pub enum StudentDataError {
    #[error("Failed to read file: {0}")]
    IoError(String),

    #[error("Failed to parse student data: {0}")]
    ParseError(String),

    #[error("Duplicate student id: {0}")]
    DuplicateId(String),
}
