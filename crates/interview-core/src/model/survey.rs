use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::session::SessionId;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SurveyAnswer {
    pub question_id: String,
    pub answer: String,
}

/// Survey answers in question order. Order is significant: it becomes the
/// column order of the final record.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct SurveyResponses {
    answers: Vec<SurveyAnswer>,
}

impl SurveyResponses {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the answer for a question, replacing any earlier answer in place.
    pub fn insert(&mut self, question_id: impl Into<String>, answer: impl Into<String>) {
        let question_id = question_id.into();
        let answer = answer.into();
        match self.answers.iter_mut().find(|a| a.question_id == question_id) {
            Some(existing) => existing.answer = answer,
            None => self.answers.push(SurveyAnswer {
                question_id,
                answer,
            }),
        }
    }

    pub fn get(&self, question_id: &str) -> Option<&str> {
        self.answers
            .iter()
            .find(|a| a.question_id == question_id)
            .map(|a| a.answer.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &SurveyAnswer> {
        self.answers.iter()
    }

    pub fn len(&self) -> usize {
        self.answers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.answers.is_empty()
    }
}

/// The durable artifact for a completed session: survey answers plus the
/// rendered interview transcript.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FinalRecord {
    pub session_id: SessionId,
    pub submitted_at: DateTime<Utc>,
    pub consent_given: bool,
    pub responses: SurveyResponses,
    pub transcript: String,
}

impl FinalRecord {
    /// Flatten into spreadsheet columns: id, timestamp, consent, one column
    /// per answer, transcript.
    pub fn to_row(&self) -> Vec<String> {
        let mut row = Vec::with_capacity(self.responses.len() + 4);
        row.push(self.session_id.to_string());
        row.push(self.submitted_at.format("%Y-%m-%d %H:%M:%S").to_string());
        row.push(self.consent_given.to_string());
        row.extend(self.responses.iter().map(|a| a.answer.clone()));
        row.push(self.transcript.clone());
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_insert_replaces_in_place() {
        let mut responses = SurveyResponses::new();
        responses.insert("age", "21");
        responses.insert("gender", "Female");
        responses.insert("age", "22");
        assert_eq!(responses.len(), 2);
        assert_eq!(responses.get("age"), Some("22"));
        let ids: Vec<_> = responses.iter().map(|a| a.question_id.as_str()).collect();
        assert_eq!(ids, vec!["age", "gender"]);
    }

    #[test]
    fn test_row_column_order() {
        let mut responses = SurveyResponses::new();
        responses.insert("age", "25");
        responses.insert("ai_model", "");
        let record = FinalRecord {
            session_id: SessionId::parse("user_1").unwrap(),
            submitted_at: Utc.with_ymd_and_hms(2025, 5, 1, 10, 30, 0).unwrap(),
            consent_given: true,
            responses,
            transcript: "Assistant: hi".into(),
        };
        assert_eq!(
            record.to_row(),
            vec![
                "user_1",
                "2025-05-01 10:30:00",
                "true",
                "25",
                "",
                "Assistant: hi"
            ]
        );
    }
}
