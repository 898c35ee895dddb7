//! Submitted answers and their evaluation against a task revision.

use std::collections::BTreeSet;

use db::models::{task::AnswerType, task_revision};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NumericPartAnswer {
    pub part_key: String,
    pub value: String,
}

/// Answer payload, tagged by `type`.
///
/// ```json
/// { "type": "numeric", "parts": [{ "part_key": "x", "value": "12" }] }
/// { "type": "single_choice", "choice_key": "b" }
/// { "type": "multi_choice", "choice_keys": ["a", "c"] }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Answer {
    Numeric { parts: Vec<NumericPartAnswer> },
    SingleChoice { choice_key: String },
    MultiChoice { choice_keys: Vec<String> },
}

impl Answer {
    pub fn parse(raw: &Value) -> ServiceResult<Self> {
        Answer::deserialize(raw).map_err(|e| ServiceError::InvalidAnswer(e.to_string()))
    }

    pub fn answer_type(&self) -> AnswerType {
        match self {
            Answer::Numeric { .. } => AnswerType::Numeric,
            Answer::SingleChoice { .. } => AnswerType::SingleChoice,
            Answer::MultiChoice { .. } => AnswerType::MultiChoice,
        }
    }
}

/// Grades `answer` for a task of `task_type`. Returns whether it is correct.
///
/// Shape problems (wrong payload type, undeclared choice keys) are errors,
/// not wrong answers, and must not count against the student.
pub fn evaluate(
    task_id: i64,
    task_type: AnswerType,
    answer: &Answer,
    revision: &task_revision::Model,
) -> ServiceResult<bool> {
    match task_type {
        AnswerType::Photo => return Err(ServiceError::TaskRequiresPhotoSubmission(task_id)),
        AnswerType::Text => return Err(ServiceError::UnsupportedAnswerType(task_type.to_string())),
        _ => {}
    }

    if answer.answer_type() != task_type {
        return Err(ServiceError::InvalidAnswer(format!(
            "task expects a {task_type} answer, got {}",
            answer.answer_type()
        )));
    }

    match answer {
        Answer::Numeric { parts } => evaluate_numeric(parts, revision),
        Answer::SingleChoice { choice_key } => evaluate_single(choice_key, revision),
        Answer::MultiChoice { choice_keys } => evaluate_multi(choice_keys, revision),
    }
}

fn evaluate_numeric(
    supplied: &[NumericPartAnswer],
    revision: &task_revision::Model,
) -> ServiceResult<bool> {
    let expected = revision.parsed_numeric_parts()?;
    if expected.is_empty() {
        return Ok(false);
    }

    Ok(expected.iter().all(|part| {
        supplied
            .iter()
            .find(|s| s.part_key == part.key)
            .map(|s| s.value.trim())
            .is_some_and(|value| !value.is_empty() && value == part.correct_value.trim())
    }))
}

fn declared_keys(revision: &task_revision::Model) -> ServiceResult<BTreeSet<String>> {
    Ok(revision
        .parsed_choices()?
        .into_iter()
        .map(|c| c.key)
        .collect())
}

fn evaluate_single(choice_key: &str, revision: &task_revision::Model) -> ServiceResult<bool> {
    if !declared_keys(revision)?.contains(choice_key) {
        return Err(ServiceError::UnknownChoiceKey(choice_key.to_owned()));
    }
    let correct = revision.parsed_correct_choice_keys()?;
    Ok(correct.first().is_some_and(|k| k == choice_key))
}

fn evaluate_multi(choice_keys: &[String], revision: &task_revision::Model) -> ServiceResult<bool> {
    let declared = declared_keys(revision)?;
    let supplied: BTreeSet<&str> = choice_keys.iter().map(String::as_str).collect();
    if let Some(unknown) = supplied.iter().find(|k| !declared.contains(**k)) {
        return Err(ServiceError::UnknownChoiceKey((*unknown).to_owned()));
    }

    let correct = revision.parsed_correct_choice_keys()?;
    let correct: BTreeSet<&str> = correct.iter().map(String::as_str).collect();
    Ok(supplied == correct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use db::models::task_revision::{Choice, NumericPart};
    use serde_json::json;

    fn revision(parts: &[(&str, &str)], choices: &[&str], correct: &[&str]) -> task_revision::Model {
        let parts: Vec<NumericPart> = parts
            .iter()
            .map(|(k, v)| NumericPart {
                key: (*k).into(),
                correct_value: (*v).into(),
            })
            .collect();
        let choices: Vec<Choice> = choices
            .iter()
            .map(|k| Choice {
                key: (*k).into(),
                label: String::new(),
            })
            .collect();
        task_revision::Model {
            id: 1,
            task_id: 1,
            revision_no: 1,
            numeric_parts: serde_json::to_value(parts).unwrap(),
            choices: serde_json::to_value(choices).unwrap(),
            correct_choice_keys: json!(correct),
            created_at: Utc::now(),
        }
    }

    fn grade(task_type: AnswerType, raw: Value, rev: &task_revision::Model) -> ServiceResult<bool> {
        let answer = Answer::parse(&raw)?;
        evaluate(1, task_type, &answer, rev)
    }

    #[test]
    fn numeric_trims_and_requires_every_part() {
        let rev = revision(&[("x", "2"), ("y", " -3.5 ")], &[], &[]);
        let ok = json!({"type": "numeric", "parts": [
            {"part_key": "x", "value": " 2 "},
            {"part_key": "y", "value": "-3.5"}
        ]});
        assert!(grade(AnswerType::Numeric, ok, &rev).unwrap());

        let missing = json!({"type": "numeric", "parts": [{"part_key": "x", "value": "2"}]});
        assert!(!grade(AnswerType::Numeric, missing, &rev).unwrap());

        let wrong = json!({"type": "numeric", "parts": [
            {"part_key": "x", "value": "2"},
            {"part_key": "y", "value": "-3.50"}
        ]});
        assert!(!grade(AnswerType::Numeric, wrong, &rev).unwrap());
    }

    #[test]
    fn numeric_without_configured_parts_is_never_correct() {
        let rev = revision(&[], &[], &[]);
        let raw = json!({"type": "numeric", "parts": []});
        assert!(!grade(AnswerType::Numeric, raw, &rev).unwrap());
    }

    #[test]
    fn single_choice_rejects_undeclared_key() {
        let rev = revision(&[], &["a", "b"], &["b"]);
        assert!(grade(AnswerType::SingleChoice, json!({"type": "single_choice", "choice_key": "b"}), &rev).unwrap());
        assert!(!grade(AnswerType::SingleChoice, json!({"type": "single_choice", "choice_key": "a"}), &rev).unwrap());

        let err = grade(AnswerType::SingleChoice, json!({"type": "single_choice", "choice_key": "z"}), &rev)
            .unwrap_err();
        assert_eq!(err.code(), "UNKNOWN_CHOICE_KEY");
    }

    #[test]
    fn multi_choice_compares_deduplicated_sets() {
        let rev = revision(&[], &["a", "b", "c"], &["c", "a"]);
        let dup = json!({"type": "multi_choice", "choice_keys": ["a", "c", "a"]});
        assert!(grade(AnswerType::MultiChoice, dup, &rev).unwrap());

        let partial = json!({"type": "multi_choice", "choice_keys": ["a"]});
        assert!(!grade(AnswerType::MultiChoice, partial, &rev).unwrap());

        let unknown = json!({"type": "multi_choice", "choice_keys": ["a", "q"]});
        assert_eq!(
            grade(AnswerType::MultiChoice, unknown, &rev).unwrap_err().code(),
            "UNKNOWN_CHOICE_KEY"
        );

        let empty = json!({"type": "multi_choice", "choice_keys": []});
        assert!(!grade(AnswerType::MultiChoice, empty, &rev).unwrap());
    }

    #[test]
    fn shape_and_type_mismatches() {
        let rev = revision(&[("x", "1")], &["a"], &["a"]);
        assert_eq!(
            Answer::parse(&json!({"type": "numeric"})).unwrap_err().code(),
            "INVALID_ANSWER"
        );
        assert_eq!(
            Answer::parse(&json!("42")).unwrap_err().code(),
            "INVALID_ANSWER"
        );

        let single = json!({"type": "single_choice", "choice_key": "a"});
        assert_eq!(
            grade(AnswerType::Numeric, single.clone(), &rev).unwrap_err().code(),
            "INVALID_ANSWER"
        );
        assert_eq!(
            grade(AnswerType::Photo, single.clone(), &rev).unwrap_err().code(),
            "TASK_REQUIRES_PHOTO_SUBMISSION"
        );
        assert_eq!(
            grade(AnswerType::Text, single, &rev).unwrap_err().code(),
            "UNSUPPORTED_ANSWER_TYPE"
        );
    }
}
