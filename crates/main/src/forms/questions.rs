//! Validation of organizer-defined questions.

use std::collections::HashSet;

use db::event::Question;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::error::{ApiError, ApiResult};

pub const MAX_LABEL_LEN: usize = 200;
pub const MAX_PLACEHOLDER_LEN: usize = 200;

fn is_valid_question_id(id: &str) -> bool {
    static RE: Lazy<Regex> =
        Lazy::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").unwrap());
    RE.is_match(id)
}

/// Parses the replacement question list of a form. The list replaces the old
/// one wholesale, so it is checked as a whole.
pub fn parse_question_list(value: Option<&Value>) -> ApiResult<Vec<Question>> {
    let items = match value {
        Some(Value::Array(items)) => items,
        _ => return Err(ApiError::bad_request("Questions must be an array")),
    };

    let questions = items
        .iter()
        .enumerate()
        .map(|(i, item)| {
            serde_json::from_value::<Question>(item.clone()).map_err(|e| {
                ApiError::bad_request(format!("Question {}: {e}", i + 1))
            })
        })
        .collect::<ApiResult<Vec<_>>>()?;

    validate_questions(&questions).map_err(ApiError::BadRequest)?;
    Ok(questions)
}

pub fn validate_questions(questions: &[Question]) -> Result<(), String> {
    let mut seen = HashSet::new();

    for question in questions {
        if !is_valid_question_id(&question.id) {
            return Err(format!(
                "Question id `{}` may only contain letters, digits, `_` and `-`",
                question.id
            ));
        }
        if !seen.insert(question.id.as_str()) {
            return Err(format!("Question id `{}` is used twice", question.id));
        }

        let label = question.label.trim();
        if label.is_empty() {
            return Err(format!("Question `{}` needs a label", question.id));
        }
        if label.chars().count() > MAX_LABEL_LEN {
            return Err(format!(
                "The label of question `{}` is longer than {MAX_LABEL_LEN} characters",
                question.id
            ));
        }
        if question
            .placeholder
            .as_ref()
            .is_some_and(|p| p.chars().count() > MAX_PLACEHOLDER_LEN)
        {
            return Err(format!(
                "The placeholder of question `{}` is longer than {MAX_PLACEHOLDER_LEN} characters",
                question.id
            ));
        }

        validate_options(question)?;
    }

    Ok(())
}

fn validate_options(question: &Question) -> Result<(), String> {
    if !question.kind.has_options() {
        if !question.options.is_empty() {
            return Err(format!(
                "Question `{}` does not take options",
                question.id
            ));
        }
        return Ok(());
    }

    // a lone checkbox (e.g. "I accept the terms") has no options
    if question.options.is_empty()
        && question.kind != db::event::QuestionType::Checkbox
    {
        return Err(format!(
            "Question `{}` needs at least one option",
            question.id
        ));
    }

    let mut ids = HashSet::new();
    for option in &question.options {
        if option.id.trim().is_empty() || option.value.trim().is_empty() {
            return Err(format!(
                "Options of question `{}` need both an id and a value",
                question.id
            ));
        }
        if !ids.insert(option.id.as_str()) {
            return Err(format!(
                "Option id `{}` is used twice in question `{}`",
                option.id, question.id
            ));
        }
    }

    Ok(())
}
