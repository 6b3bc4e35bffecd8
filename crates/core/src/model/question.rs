use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use thiserror::Error;

use crate::model::ids::{QuestionId, TopicId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CatalogError {
    #[error("catalog has no questions")]
    Empty,

    #[error("topic {0} has an empty name")]
    EmptyTopicName(TopicId),

    #[error("topic {0} is declared twice")]
    DuplicateTopic(TopicId),

    #[error("question {0} is declared twice")]
    DuplicateQuestion(QuestionId),

    #[error("question {0} has an empty prompt")]
    EmptyPrompt(QuestionId),

    #[error("question {0} has an empty answer")]
    EmptyAnswer(QuestionId),

    #[error("question {id} needs at least two choices, got {count}")]
    TooFewChoices { id: QuestionId, count: usize },

    #[error("question {id} marks choice {index} correct but has {count} choices")]
    CorrectOutOfRange {
        id: QuestionId,
        index: usize,
        count: usize,
    },

    #[error("question {id} refers to unknown topic {topic}")]
    UnknownTopic { id: QuestionId, topic: TopicId },
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

/// How a question is presented and graded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKind {
    MultipleChoice { choices: Vec<String>, correct: usize },
    ShortAnswer {
        answer: String,
        #[serde(default)]
        accepted: Vec<String>,
    },
}

/// A learner's response to a question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    /// Zero-based index into the choices of a multiple-choice question.
    Choice(usize),
    /// Free text, as typed in short-answer mode.
    Text(String),
}

/// A validated catalog question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    id: QuestionId,
    topic: TopicId,
    prompt: String,
    kind: QuestionKind,
    explanation: Option<String>,
}

impl Question {
    #[must_use]
    pub fn id(&self) -> &QuestionId {
        &self.id
    }

    #[must_use]
    pub fn topic(&self) -> TopicId {
        self.topic
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn kind(&self) -> &QuestionKind {
        &self.kind
    }

    #[must_use]
    pub fn explanation(&self) -> Option<&str> {
        self.explanation.as_deref()
    }

    /// Canonical answer text shown after grading.
    #[must_use]
    pub fn correct_text(&self) -> &str {
        match &self.kind {
            QuestionKind::MultipleChoice { choices, correct } => &choices[*correct],
            QuestionKind::ShortAnswer { answer, .. } => answer,
        }
    }

    /// Grades an answer.
    ///
    /// Multiple-choice questions accept either the correct index or the
    /// correct choice typed out; short-answer questions compare normalized
    /// text against the answer and its accepted alternatives.
    #[must_use]
    pub fn check(&self, answer: &Answer) -> bool {
        match (&self.kind, answer) {
            (QuestionKind::MultipleChoice { correct, .. }, Answer::Choice(index)) => {
                index == correct
            }
            (QuestionKind::MultipleChoice { choices, correct }, Answer::Text(text)) => {
                normalize_answer(text) == normalize_answer(&choices[*correct])
            }
            (QuestionKind::ShortAnswer { answer, accepted }, Answer::Text(text)) => {
                let given = normalize_answer(text);
                !given.is_empty()
                    && std::iter::once(answer)
                        .chain(accepted)
                        .any(|candidate| normalize_answer(candidate) == given)
            }
            (QuestionKind::ShortAnswer { .. }, Answer::Choice(_)) => false,
        }
    }

    /// Letter hint for typed answers: `"Neural network"` becomes `"N_____ n______"`.
    #[must_use]
    pub fn hint(&self) -> String {
        self.correct_text()
            .split_whitespace()
            .take(5)
            .map(|word| {
                let mut chars = word.chars();
                let first = chars.next().unwrap_or('_');
                let rest = "_".repeat(chars.count());
                format!("{first}{rest}")
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Case-folds, collapses whitespace and strips trailing sentence punctuation.
///
/// Symbols that can be part of an answer (`A*`, `C++`, `(s, a)`) are kept.
#[must_use]
pub fn normalize_answer(raw: &str) -> String {
    raw.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_end_matches(['.', ',', ';', ':', '!', '?'])
        .trim_end()
        .to_lowercase()
}

//
// ─── TOPIC ─────────────────────────────────────────────────────────────────────
//

/// A course topic and the ordered ids of its questions. Immutable after load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topic {
    id: TopicId,
    name: String,
    question_ids: Vec<QuestionId>,
}

impl Topic {
    #[must_use]
    pub fn id(&self) -> TopicId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn question_ids(&self) -> &[QuestionId] {
        &self.question_ids
    }
}

//
// ─── DRAFTS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct TopicDraft {
    pub id: TopicId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct QuestionDraft {
    pub id: QuestionId,
    pub topic: TopicId,
    pub prompt: String,
    #[serde(flatten)]
    pub kind: QuestionKind,
    #[serde(default)]
    pub explanation: Option<String>,
}

/// Unvalidated catalog as supplied by the content loader.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CatalogDraft {
    pub topics: Vec<TopicDraft>,
    pub questions: Vec<QuestionDraft>,
}

impl CatalogDraft {
    /// Validate every topic and question and index them.
    ///
    /// # Errors
    ///
    /// Returns the first `CatalogError` encountered.
    pub fn validate(self) -> Result<Catalog, CatalogError> {
        if self.questions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut topics: BTreeMap<TopicId, Topic> = BTreeMap::new();
        for draft in self.topics {
            let name = draft.name.trim().to_owned();
            if name.is_empty() {
                return Err(CatalogError::EmptyTopicName(draft.id));
            }
            let topic = Topic {
                id: draft.id,
                name,
                question_ids: Vec::new(),
            };
            if topics.insert(draft.id, topic).is_some() {
                return Err(CatalogError::DuplicateTopic(draft.id));
            }
        }

        let mut seen = HashSet::new();
        let mut questions = Vec::with_capacity(self.questions.len());
        for draft in self.questions {
            let question = validate_question(draft)?;
            if !seen.insert(question.id.clone()) {
                return Err(CatalogError::DuplicateQuestion(question.id));
            }
            let Some(topic) = topics.get_mut(&question.topic) else {
                return Err(CatalogError::UnknownTopic {
                    id: question.id,
                    topic: question.topic,
                });
            };
            topic.question_ids.push(question.id.clone());
            questions.push(question);
        }

        let index = questions
            .iter()
            .enumerate()
            .map(|(pos, q)| (q.id.clone(), pos))
            .collect();

        Ok(Catalog {
            topics,
            questions,
            index,
        })
    }
}

fn validate_question(draft: QuestionDraft) -> Result<Question, CatalogError> {
    let prompt = draft.prompt.trim().to_owned();
    if prompt.is_empty() {
        return Err(CatalogError::EmptyPrompt(draft.id));
    }

    let kind = match draft.kind {
        QuestionKind::MultipleChoice { choices, correct } => {
            let choices: Vec<String> = choices.into_iter().map(|c| c.trim().to_owned()).collect();
            if choices.len() < 2 {
                return Err(CatalogError::TooFewChoices {
                    id: draft.id,
                    count: choices.len(),
                });
            }
            if correct >= choices.len() {
                return Err(CatalogError::CorrectOutOfRange {
                    id: draft.id,
                    index: correct,
                    count: choices.len(),
                });
            }
            if choices[correct].is_empty() {
                return Err(CatalogError::EmptyAnswer(draft.id));
            }
            QuestionKind::MultipleChoice { choices, correct }
        }
        QuestionKind::ShortAnswer { answer, accepted } => {
            let answer = answer.trim().to_owned();
            if answer.is_empty() {
                return Err(CatalogError::EmptyAnswer(draft.id));
            }
            QuestionKind::ShortAnswer { answer, accepted }
        }
    };

    let explanation = draft
        .explanation
        .map(|text| text.trim().to_owned())
        .filter(|text| !text.is_empty());

    Ok(Question {
        id: draft.id,
        topic: draft.topic,
        prompt,
        kind,
        explanation,
    })
}

//
// ─── CATALOG ───────────────────────────────────────────────────────────────────
//

/// Read-only question catalog supplied at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Catalog {
    topics: BTreeMap<TopicId, Topic>,
    questions: Vec<Question>,
    index: std::collections::HashMap<QuestionId, usize>,
}

impl Catalog {
    #[must_use]
    pub fn question(&self, id: &QuestionId) -> Option<&Question> {
        self.index.get(id).map(|&pos| &self.questions[pos])
    }

    #[must_use]
    pub fn topic(&self, id: TopicId) -> Option<&Topic> {
        self.topics.get(&id)
    }

    /// Questions in catalog order.
    pub fn questions(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    /// Topics ordered by id.
    pub fn topics(&self) -> impl Iterator<Item = &Topic> {
        self.topics.values()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    fn mc(id: &str, topic: u32, correct: usize) -> QuestionDraft {
        QuestionDraft {
            id: QuestionId::new(id),
            topic: TopicId::new(topic),
            prompt: "Which search is complete and optimal with uniform costs?".into(),
            kind: QuestionKind::MultipleChoice {
                choices: vec!["Depth-first".into(), "Breadth-first".into()],
                correct,
            },
            explanation: Some("  ".into()),
        }
    }

    fn draft(questions: Vec<QuestionDraft>) -> CatalogDraft {
        CatalogDraft {
            topics: vec![
                TopicDraft {
                    id: TopicId::new(1),
                    name: "Search".into(),
                },
                TopicDraft {
                    id: TopicId::new(2),
                    name: "Learning".into(),
                },
            ],
            questions,
        }
    }

    #[test]
    fn validate_indexes_topics_in_question_order() {
        let catalog = draft(vec![mc("a", 1, 1), mc("b", 2, 0), mc("c", 1, 1)])
            .validate()
            .unwrap();

        let search = catalog.topic(TopicId::new(1)).unwrap();
        assert_eq!(
            search.question_ids(),
            &[QuestionId::new("a"), QuestionId::new("c")]
        );
        assert_eq!(catalog.len(), 3);
        assert!(catalog.question(&QuestionId::new("b")).is_some());
        assert_eq!(catalog.question(&QuestionId::new("a")).unwrap().explanation(), None);
    }

    #[test]
    fn validate_rejects_duplicates_and_bad_choices() {
        let err = draft(vec![mc("a", 1, 0), mc("a", 1, 0)]).validate().unwrap_err();
        assert_eq!(err, CatalogError::DuplicateQuestion(QuestionId::new("a")));

        let err = draft(vec![mc("a", 1, 4)]).validate().unwrap_err();
        assert!(matches!(err, CatalogError::CorrectOutOfRange { index: 4, .. }));

        let err = draft(vec![mc("a", 9, 0)]).validate().unwrap_err();
        assert!(matches!(err, CatalogError::UnknownTopic { .. }));

        assert_eq!(draft(Vec::new()).validate().unwrap_err(), CatalogError::Empty);
    }

    #[test]
    fn multiple_choice_accepts_index_or_text() {
        let catalog = draft(vec![mc("a", 1, 1)]).validate().unwrap();
        let q = catalog.question(&QuestionId::new("a")).unwrap();

        assert!(q.check(&Answer::Choice(1)));
        assert!(!q.check(&Answer::Choice(0)));
        assert!(q.check(&Answer::Text("  breadth-FIRST. ".into())));
    }

    #[test]
    fn short_answer_uses_normalized_alternatives() {
        let catalog = draft(vec![QuestionDraft {
            id: QuestionId::new("s"),
            topic: TopicId::new(2),
            prompt: "Name the algorithm that updates weights from output error.".into(),
            kind: QuestionKind::ShortAnswer {
                answer: "Backpropagation".into(),
                accepted: vec!["back propagation".into()],
            },
            explanation: None,
        }])
        .validate()
        .unwrap();
        let q = catalog.question(&QuestionId::new("s")).unwrap();

        assert!(q.check(&Answer::Text("backpropagation!".into())));
        assert!(q.check(&Answer::Text("Back   Propagation".into())));
        assert!(!q.check(&Answer::Text("   ".into())));
        assert!(!q.check(&Answer::Choice(0)));
        assert_eq!(q.hint(), "B______________");
    }

    #[test]
    fn symbols_inside_answers_are_significant() {
        assert_eq!(normalize_answer("A*"), "a*");
        assert_eq!(normalize_answer(" C++. "), "c++");
        assert_ne!(normalize_answer("A"), normalize_answer("A*"));

        let catalog = draft(vec![QuestionDraft {
            id: QuestionId::new("astar"),
            topic: TopicId::new(1),
            prompt: "Which search is optimal with an admissible heuristic?".into(),
            kind: QuestionKind::ShortAnswer {
                answer: "A*".into(),
                accepted: Vec::new(),
            },
            explanation: None,
        }])
        .validate()
        .unwrap();
        let q = catalog.question(&QuestionId::new("astar")).unwrap();
        assert!(q.check(&Answer::Text("a*".into())));
        assert!(q.check(&Answer::Text("A*!".into())));
        assert!(!q.check(&Answer::Text("A".into())));
    }

    #[test]
    fn catalog_draft_deserializes_tagged_kinds() {
        let json = r#"{
            "topics": [{"id": 1, "name": "Search"}],
            "questions": [
                {"id": "q1", "topic": 1, "prompt": "A* uses?", "kind": "multiple_choice",
                 "choices": ["g+h", "h"], "correct": 0},
                {"id": "q2", "topic": 1, "prompt": "Admissible means?", "kind": "short_answer",
                 "answer": "never overestimates"}
            ]
        }"#;
        let catalog: CatalogDraft = serde_json::from_str(json).unwrap();
        let catalog = catalog.validate().unwrap();
        let q2 = catalog.question(&QuestionId::new("q2")).unwrap();
        assert_eq!(q2.hint(), "n____ o____________");
    }
}
