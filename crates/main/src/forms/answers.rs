//! Typed reading of submitted answers.
//!
//! Submissions are stored as an open JSON object, but answers to declared
//! questions are checked against the question's type when they arrive. Keys
//! which match no question are kept as free-form extension fields.

use chrono::NaiveDate;
use db::event::{Question, QuestionType};
use serde_json::{Map, Value};

use crate::util::is_valid_email;

#[derive(Debug, Clone, PartialEq)]
pub enum Answer {
    Text(String),
    Email(String),
    Phone(String),
    Number(f64),
    Date(NaiveDate),
    Choice(String),
    Choices(Vec<String>),
    Flag(bool),
}

impl Answer {
    /// Human readable form, for emails.
    pub fn display(&self) -> String {
        match self {
            Answer::Text(s)
            | Answer::Email(s)
            | Answer::Phone(s)
            | Answer::Choice(s) => s.clone(),
            Answer::Number(n) => n.to_string(),
            Answer::Date(d) => d.format("%Y-%m-%d").to_string(),
            Answer::Choices(values) => values.join(", "),
            Answer::Flag(true) => "Yes".to_string(),
            Answer::Flag(false) => "No".to_string(),
        }
    }

    /// The form an answer is stored in. Choices are stored by option value,
    /// whichever way the applicant referred to them.
    pub fn to_json(&self) -> Value {
        match self {
            Answer::Text(s)
            | Answer::Email(s)
            | Answer::Phone(s)
            | Answer::Choice(s) => Value::String(s.clone()),
            Answer::Number(n) if n.fract() == 0.0 && n.abs() < i64::MAX as f64 => {
                Value::from(*n as i64)
            }
            Answer::Number(n) => Value::from(*n),
            Answer::Date(d) => Value::String(d.format("%Y-%m-%d").to_string()),
            Answer::Choices(values) => Value::from(values.clone()),
            Answer::Flag(b) => Value::Bool(*b),
        }
    }
}

/// Answers which passed validation, in question order.
#[derive(Debug)]
pub struct ValidatedAnswers<'q> {
    pub answered: Vec<(&'q Question, Answer)>,
    pub extra: Vec<(String, Value)>,
}

impl ValidatedAnswers<'_> {
    /// Rewrites the declared answers in `raw` into their stored form. Blank
    /// answers and undeclared keys are left as submitted.
    pub fn canonicalize(&self, mut raw: Map<String, Value>) -> Map<String, Value> {
        for (question, answer) in &self.answered {
            raw.insert(question.id.clone(), answer.to_json());
        }
        raw
    }
}

/// Replaces every `null` (an unset field on the client) by an empty string
/// so that no key is ever stored without a value.
pub fn normalize(raw: Map<String, Value>) -> Map<String, Value> {
    raw.into_iter()
        .map(|(key, value)| match value {
            Value::Null => (key, Value::String(String::new())),
            value => (key, value),
        })
        .collect()
}

fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    }
}

/// Checks `answers` against the declared `questions`, returning one message
/// per offending field on failure.
pub fn validate<'q>(
    questions: &'q [Question],
    answers: &Map<String, Value>,
) -> Result<ValidatedAnswers<'q>, Vec<String>> {
    let mut errors = vec![];
    let mut answered = vec![];

    for question in questions {
        let value = answers.get(&question.id).unwrap_or(&Value::Null);
        if is_blank(value) {
            if question.required {
                errors.push(format!("{} is required", question.label));
            }
            continue;
        }

        match parse_answer(question, value) {
            Ok(Answer::Flag(false)) if question.required => {
                errors.push(format!("{} must be checked", question.label))
            }
            Ok(answer) => answered.push((question, answer)),
            Err(e) => errors.push(e),
        }
    }

    if !errors.is_empty() {
        return Err(errors);
    }

    let extra = answers
        .iter()
        .filter(|(key, _)| !questions.iter().any(|q| &q.id == *key))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect();

    Ok(ValidatedAnswers { answered, extra })
}

fn parse_answer(question: &Question, value: &Value) -> Result<Answer, String> {
    let label = &question.label;
    match question.kind {
        QuestionType::Text | QuestionType::Textarea => match value {
            Value::String(s) => Ok(Answer::Text(s.clone())),
            Value::Number(n) => Ok(Answer::Text(n.to_string())),
            Value::Bool(b) => Ok(Answer::Text(b.to_string())),
            _ => Err(format!("{label} must be text")),
        },
        QuestionType::Email => match value {
            Value::String(s) if is_valid_email(s.trim()) => {
                Ok(Answer::Email(s.trim().to_string()))
            }
            _ => Err(format!("{label} must be a valid email address")),
        },
        QuestionType::Phone => match value {
            Value::String(s) if is_plausible_phone(s) => {
                Ok(Answer::Phone(s.trim().to_string()))
            }
            Value::Number(n) if n.is_u64() => Ok(Answer::Phone(n.to_string())),
            _ => Err(format!("{label} must be a phone number")),
        },
        QuestionType::Number => {
            let n = match value {
                Value::Number(n) => n.as_f64(),
                Value::String(s) => s.trim().parse::<f64>().ok(),
                _ => None,
            };
            n.filter(|n| n.is_finite())
                .map(Answer::Number)
                .ok_or_else(|| format!("{label} must be a number"))
        }
        QuestionType::Date => match value {
            Value::String(s) => parse_date(s)
                .map(Answer::Date)
                .ok_or_else(|| format!("{label} must be a date (YYYY-MM-DD)")),
            _ => Err(format!("{label} must be a date (YYYY-MM-DD)")),
        },
        QuestionType::Select | QuestionType::Radio => match value {
            Value::String(s) => find_option(question, s)
                .map(Answer::Choice)
                .ok_or_else(|| format!("{label} has an unknown option")),
            _ => Err(format!("{label} must be one of the listed options")),
        },
        QuestionType::Checkbox if question.options.is_empty() => match value {
            Value::Bool(b) => Ok(Answer::Flag(*b)),
            Value::String(s) => match s.as_str() {
                "true" | "on" | "yes" => Ok(Answer::Flag(true)),
                "false" | "off" | "no" => Ok(Answer::Flag(false)),
                _ => Err(format!("{label} must be checked or unchecked")),
            },
            _ => Err(format!("{label} must be checked or unchecked")),
        },
        QuestionType::Checkbox => {
            let picked = match value {
                Value::String(s) => vec![s.as_str()],
                Value::Array(items) => items
                    .iter()
                    .map(Value::as_str)
                    .collect::<Option<Vec<_>>>()
                    .ok_or_else(|| format!("{label} has an unknown option"))?,
                _ => return Err(format!("{label} has an unknown option")),
            };
            picked
                .into_iter()
                .map(|s| find_option(question, s))
                .collect::<Option<Vec<_>>>()
                .map(Answer::Choices)
                .ok_or_else(|| format!("{label} has an unknown option"))
        }
    }
}

/// Options may be referred to by their id or by their value; either way the
/// value is what gets reported.
fn find_option(question: &Question, picked: &str) -> Option<String> {
    question
        .options
        .iter()
        .find(|o| o.value == picked || o.id == picked)
        .map(|o| o.value.clone())
}

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    // also accept the date part of a full ISO timestamp
    let day = match s.find('T') {
        Some(10) => &s[..10],
        _ => s,
    };
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

fn is_plausible_phone(s: &str) -> bool {
    let s = s.trim();
    let digits = s.chars().filter(char::is_ascii_digit).count();
    (5..=20).contains(&digits)
        && s.chars()
            .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | '(' | ')' | ' ' | '.'))
}
