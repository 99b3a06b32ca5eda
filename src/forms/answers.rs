//! Inline answer group
//!
//! Answers are edited as numbered rows under the `answers` prefix:
//! `answers-TOTAL_FORMS` gives the row count and each row submits
//! `answers-N-id`, `-order`, `-text`, `-correct` and `-DELETE`. Extra rows
//! left blank are ignored.

use serde::Serialize;

use super::{integer, required_text, FormData, FormErrors};
use crate::models::{Answer, AnswerChanges, AnswerInput};
use crate::services::quiz::{MAX_ANSWER_LEN, NO_ANSWERS, NO_CORRECT_ANSWER};

pub const ANSWER_PREFIX: &str = "answers";

/// Blank rows offered for new answers
pub const EXTRA_ROWS: usize = 2;

/// Upper bound on rows read from one submission
const MAX_ROWS: usize = 1000;

/// One answer row as submitted
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnswerRow {
    /// Raw `id` field, empty for new rows
    pub id: String,
    pub order: String,
    pub text: String,
    pub correct: bool,
    pub delete: bool,
    pub errors: FormErrors,
}

impl AnswerRow {
    fn blank() -> Self {
        Self {
            order: "0".to_string(),
            ..Default::default()
        }
    }

    fn from_answer(answer: &Answer) -> Self {
        Self {
            id: answer.id.to_string(),
            order: answer.order.to_string(),
            text: answer.text.clone(),
            correct: answer.correct,
            delete: false,
            errors: FormErrors::default(),
        }
    }

    /// A new row nobody filled in
    fn is_untouched(&self) -> bool {
        self.id.is_empty()
            && self.text.is_empty()
            && !self.correct
            && matches!(self.order.as_str(), "" | "0")
    }
}

/// A group of answer rows plus errors about the group as a whole
#[derive(Debug, Clone, Default, Serialize)]
pub struct AnswerFormSet {
    pub prefix: &'static str,
    pub rows: Vec<AnswerRow>,
    pub non_form_errors: Vec<String>,
}

impl AnswerFormSet {
    /// Rows for existing answers followed by blank extra rows
    pub fn for_answers(answers: &[Answer]) -> Self {
        let mut rows: Vec<AnswerRow> = answers.iter().map(AnswerRow::from_answer).collect();
        rows.extend((0..EXTRA_ROWS).map(|_| AnswerRow::blank()));
        Self {
            prefix: ANSWER_PREFIX,
            rows,
            non_form_errors: Vec::new(),
        }
    }

    pub fn from_data(data: &FormData) -> Self {
        let total = data
            .get(&format!("{}-TOTAL_FORMS", ANSWER_PREFIX))
            .and_then(|v| v.trim().parse::<usize>().ok())
            .unwrap_or(0)
            .min(MAX_ROWS);

        let rows = (0..total)
            .map(|i| {
                let key = |field: &str| format!("{}-{}-{}", ANSWER_PREFIX, i, field);
                AnswerRow {
                    id: data.text(&key("id")),
                    order: data.text(&key("order")),
                    text: data.text(&key("text")),
                    correct: data.checked(&key("correct")),
                    delete: data.checked(&key("DELETE")),
                    errors: FormErrors::default(),
                }
            })
            .collect();

        Self {
            prefix: ANSWER_PREFIX,
            rows,
            non_form_errors: Vec::new(),
        }
    }

    pub fn total_forms(&self) -> usize {
        self.rows.len()
    }

    /// Validate every row and the group.
    ///
    /// `existing` holds the ids of the answers the question already has;
    /// a row naming any other id is rejected. `allow_delete` honours
    /// `DELETE` marks on existing rows; `require_any` rejects a group that
    /// ends up with no answers. When this returns `None` the errors are on
    /// the rows and the group.
    pub fn validate(
        &mut self,
        existing: &[i64],
        allow_delete: bool,
        require_any: bool,
    ) -> Option<AnswerChanges> {
        let mut changes = AnswerChanges::default();
        let mut valid = true;

        for row in &mut self.rows {
            row.errors = FormErrors::default();
            if row.is_untouched() {
                continue;
            }

            let id = if row.id.is_empty() {
                None
            } else {
                match row.id.trim().parse::<i64>() {
                    Ok(id) if existing.contains(&id) => Some(id),
                    _ => {
                        row.errors.add("id", "Select a valid choice.");
                        valid = false;
                        continue;
                    }
                }
            };

            if allow_delete && row.delete {
                if let Some(id) = id {
                    changes.delete.push(id);
                }
                continue;
            }

            required_text(&row.text, "text", Some(MAX_ANSWER_LEN), &mut row.errors);
            let order = integer(&row.order, "order", 0, &mut row.errors);
            if !row.errors.is_empty() {
                valid = false;
                continue;
            }

            changes.save.push(AnswerInput {
                id,
                order,
                text: row.text.clone(),
                correct: row.correct,
            });
        }

        self.non_form_errors.clear();
        if valid {
            if require_any && changes.save.is_empty() {
                self.non_form_errors.push(NO_ANSWERS.to_string());
            } else if !changes.save.iter().any(|a| a.correct) {
                self.non_form_errors.push(NO_CORRECT_ANSWER.to_string());
            }
        }

        (valid && self.non_form_errors.is_empty()).then_some(changes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn formset(pairs: &[(&str, &str)]) -> AnswerFormSet {
        AnswerFormSet::from_data(&FormData::new(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        ))
    }

    #[test]
    fn test_blank_extra_rows_are_ignored() {
        let mut set = formset(&[
            ("answers-TOTAL_FORMS", "3"),
            ("answers-0-text", "True"),
            ("answers-0-correct", "on"),
            ("answers-1-order", "0"),
            ("answers-1-text", ""),
        ]);

        let changes = set.validate(&[], true, true).unwrap();
        assert_eq!(changes.save.len(), 1);
        assert!(changes.save[0].correct);
        assert!(changes.delete.is_empty());
    }

    #[test]
    fn test_requires_a_correct_answer() {
        let mut set = formset(&[
            ("answers-TOTAL_FORMS", "2"),
            ("answers-0-text", "True"),
            ("answers-1-text", "False"),
        ]);

        assert!(set.validate(&[], true, true).is_none());
        assert_eq!(set.non_form_errors, vec![NO_CORRECT_ANSWER.to_string()]);
    }

    #[test]
    fn test_requires_an_answer() {
        let mut set = formset(&[("answers-TOTAL_FORMS", "2")]);
        assert!(set.validate(&[], true, true).is_none());
        assert_eq!(set.non_form_errors, vec![NO_ANSWERS.to_string()]);
    }

    #[test]
    fn test_row_errors() {
        let long = "x".repeat(MAX_ANSWER_LEN + 1);
        let mut set = formset(&[
            ("answers-TOTAL_FORMS", "3"),
            ("answers-0-text", long.as_str()),
            ("answers-0-correct", "on"),
            ("answers-1-text", "ok"),
            ("answers-1-order", "second"),
            ("answers-2-text", ""),
            ("answers-2-correct", "on"),
        ]);

        assert!(set.validate(&[], true, true).is_none());
        assert_eq!(set.rows[0].errors.field("text").len(), 1);
        assert_eq!(set.rows[1].errors.field("order").len(), 1);
        assert_eq!(set.rows[2].errors.field("text").len(), 1);
        // group checks wait for the rows to be valid
        assert!(set.non_form_errors.is_empty());
    }

    #[test]
    fn test_delete_and_update_existing() {
        let mut set = formset(&[
            ("answers-TOTAL_FORMS", "2"),
            ("answers-0-id", "10"),
            ("answers-0-text", "Keep"),
            ("answers-0-correct", "on"),
            ("answers-1-id", "11"),
            ("answers-1-text", "Drop"),
            ("answers-1-DELETE", "on"),
        ]);

        let changes = set.validate(&[10, 11], true, true).unwrap();
        assert_eq!(changes.save[0].id, Some(10));
        assert_eq!(changes.delete, vec![11]);
    }

    #[test]
    fn test_delete_ignored_when_not_allowed() {
        let mut set = formset(&[
            ("answers-TOTAL_FORMS", "1"),
            ("answers-0-id", "10"),
            ("answers-0-text", "Keep"),
            ("answers-0-correct", "on"),
            ("answers-0-DELETE", "on"),
        ]);

        let changes = set.validate(&[10], false, false).unwrap();
        assert_eq!(changes.save.len(), 1);
        assert!(changes.delete.is_empty());
    }

    #[test]
    fn test_unknown_answer_id_is_a_row_error() {
        let mut set = formset(&[
            ("answers-TOTAL_FORMS", "2"),
            ("answers-0-id", "10"),
            ("answers-0-text", "Mine"),
            ("answers-0-correct", "on"),
            ("answers-1-id", "42"),
            ("answers-1-text", "Someone else's"),
        ]);

        assert!(set.validate(&[10], true, true).is_none());
        assert!(set.rows[0].errors.is_empty());
        assert_eq!(set.rows[1].errors.field("id"), vec!["Select a valid choice.".to_string()]);
    }

    #[test]
    fn test_unknown_answer_id_cannot_be_deleted() {
        let mut set = formset(&[
            ("answers-TOTAL_FORMS", "2"),
            ("answers-0-id", "10"),
            ("answers-0-text", "Mine"),
            ("answers-0-correct", "on"),
            ("answers-1-id", "42"),
            ("answers-1-DELETE", "on"),
        ]);

        assert!(set.validate(&[10], true, true).is_none());
        assert_eq!(set.rows[1].errors.field("id").len(), 1);
    }

    #[test]
    fn test_total_forms_is_capped() {
        let set = formset(&[("answers-TOTAL_FORMS", "999999")]);
        assert_eq!(set.total_forms(), MAX_ROWS);
    }

    #[test]
    fn test_for_answers_adds_extra_rows() {
        let answers = vec![Answer {
            id: 5,
            question_id: 1,
            order: 2,
            text: "Yes".to_string(),
            correct: true,
        }];
        let set = AnswerFormSet::for_answers(&answers);

        assert_eq!(set.total_forms(), 1 + EXTRA_ROWS);
        assert_eq!(set.rows[0].id, "5");
        assert_eq!(set.rows[1].order, "0");
    }
}
