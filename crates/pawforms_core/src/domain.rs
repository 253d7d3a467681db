//! crates/pawforms_core/src/domain.rs
//!
//! Defines the pure, core data structures for the application.
//! These structs are independent of any database or serialization format
//! beyond their JSON wire shape.
//!
//! Form, Category and Question are immutable value types: every mutator
//! returns a new value and leaves the original untouched.

use std::collections::HashMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use uuid::Uuid;

//=========================================================================================
// Type-Tagged Identifiers
//=========================================================================================

/// Marker trait tying an identifier to its entity kind via a wire prefix.
pub trait IdKind {
    const PREFIX: &'static str;
}

macro_rules! id_kind {
    ($name:ident, $prefix:literal) => {
        #[derive(Debug)]
        pub struct $name;
        impl IdKind for $name {
            const PREFIX: &'static str = $prefix;
        }
    };
}

id_kind!(FormKind, "form");
id_kind!(CategoryKind, "category");
id_kind!(QuestionKind, "question");
id_kind!(ShareKind, "share");
id_kind!(KeyKind, "key");

pub type FormId = Id<FormKind>;
pub type CategoryId = Id<CategoryKind>;
pub type QuestionId = Id<QuestionKind>;
pub type ShareId = Id<ShareKind>;
pub type ModificationKey = Id<KeyKind>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdParseError {
    #[error("Expected a '{expected}' identifier, got '{found}'")]
    PrefixMismatch { expected: &'static str, found: String },
    #[error("Invalid identifier suffix in '{0}'")]
    InvalidSuffix(String),
}

/// An opaque identifier carrying its entity kind as a wire prefix,
/// e.g. `question_0f243a...`. Parsing rejects a mismatched prefix, so a
/// category id can never be mistaken for a question id.
pub struct Id<K: IdKind> {
    suffix: Uuid,
    _kind: PhantomData<K>,
}

impl<K: IdKind> Id<K> {
    /// Generates a fresh random identifier.
    pub fn generate() -> Self {
        Self {
            suffix: Uuid::new_v4(),
            _kind: PhantomData,
        }
    }
}

impl<K: IdKind> Clone for Id<K> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<K: IdKind> Copy for Id<K> {}

impl<K: IdKind> PartialEq for Id<K> {
    fn eq(&self, other: &Self) -> bool {
        self.suffix == other.suffix
    }
}
impl<K: IdKind> Eq for Id<K> {}

impl<K: IdKind> Hash for Id<K> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.suffix.hash(state);
    }
}

impl<K: IdKind> fmt::Debug for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self)
    }
}

impl<K: IdKind> fmt::Display for Id<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", K::PREFIX, self.suffix.simple())
    }
}

impl<K: IdKind> FromStr for Id<K> {
    type Err = IdParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (prefix, suffix) = s.split_once('_').ok_or_else(|| IdParseError::PrefixMismatch {
            expected: K::PREFIX,
            found: s.to_string(),
        })?;
        if prefix != K::PREFIX {
            return Err(IdParseError::PrefixMismatch {
                expected: K::PREFIX,
                found: s.to_string(),
            });
        }
        let suffix = Uuid::try_parse(suffix).map_err(|_| IdParseError::InvalidSuffix(s.to_string()))?;
        Ok(Self {
            suffix,
            _kind: PhantomData,
        })
    }
}

impl<K: IdKind> Serialize for Id<K> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de, K: IdKind> Deserialize<'de> for Id<K> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(de::Error::custom)
    }
}

//=========================================================================================
// Selections
//=========================================================================================

/// The preference level a user assigns to a question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Selection {
    #[serde(rename = "must")]
    MustHave,
    #[serde(rename = "like")]
    WouldLike,
    #[serde(rename = "maybe")]
    Maybe,
    #[serde(rename = "off_limits")]
    OffLimits,
    #[serde(rename = "unset")]
    Unset,
}

impl Selection {
    /// The successor in the cycling toggle order used by the UI:
    /// must -> like -> maybe -> off_limits -> unset -> must.
    pub fn next(self) -> Selection {
        match self {
            Selection::MustHave => Selection::WouldLike,
            Selection::WouldLike => Selection::Maybe,
            Selection::Maybe => Selection::OffLimits,
            Selection::OffLimits => Selection::Unset,
            Selection::Unset => Selection::MustHave,
        }
    }
}

/// Direction for reordering categories and questions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveDirection {
    Up,
    Down,
}

//=========================================================================================
// Form Value Types
//=========================================================================================

/// A single free-text question with its assigned preference level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    id: QuestionId,
    selection: Selection,
    value: String,
}

impl Question {
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            id: QuestionId::generate(),
            selection: Selection::Unset,
            value: value.into(),
        }
    }

    pub fn id(&self) -> QuestionId {
        self.id
    }

    pub fn selection(&self) -> Selection {
        self.selection
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn with_selection(&self, selection: Selection) -> Question {
        Question {
            selection,
            ..self.clone()
        }
    }

    pub fn with_value(&self, value: impl Into<String>) -> Question {
        Question {
            value: value.into(),
            ..self.clone()
        }
    }

    pub fn with_next_selection(&self) -> Question {
        self.with_selection(self.selection.next())
    }
}

/// A named, ordered group of questions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    id: CategoryId,
    name: String,
    questions: Vec<Question>,
}

impl Category {
    pub fn new(name: impl Into<String>, questions: Vec<Question>) -> Self {
        Self {
            id: CategoryId::generate(),
            name: name.into(),
            questions,
        }
    }

    pub fn id(&self) -> CategoryId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    pub fn with_name(&self, name: impl Into<String>) -> Category {
        Category {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn with_questions(&self, questions: Vec<Question>) -> Category {
        Category {
            questions,
            ..self.clone()
        }
    }

    /// Applies `modifier` to the question with the given id, leaving every
    /// other question untouched.
    pub fn with_question(
        &self,
        question_id: QuestionId,
        modifier: impl FnOnce(&Question) -> Question,
    ) -> Category {
        let mut modifier = Some(modifier);
        let questions = self
            .questions
            .iter()
            .map(|q| {
                if q.id == question_id {
                    if let Some(f) = modifier.take() {
                        return f(q);
                    }
                }
                q.clone()
            })
            .collect();
        self.with_questions(questions)
    }

    /// Swaps the question with its neighbour; a move past either end
    /// returns the category unchanged.
    pub fn with_moved_question(&self, question_id: QuestionId, direction: MoveDirection) -> Category {
        let Some(index) = self.questions.iter().position(|q| q.id == question_id) else {
            return self.clone();
        };
        let new_index = match direction {
            MoveDirection::Up => index.checked_sub(1),
            MoveDirection::Down => Some(index + 1),
        };
        let Some(new_index) = new_index.filter(|&i| i < self.questions.len()) else {
            return self.clone();
        };
        let mut questions = self.questions.clone();
        questions.swap(index, new_index);
        self.with_questions(questions)
    }

    pub fn add_question(&self, question: Question) -> Category {
        let mut questions = self.questions.clone();
        questions.push(question);
        self.with_questions(questions)
    }

    pub fn remove_question(&self, question_id: QuestionId) -> Category {
        let questions = self
            .questions
            .iter()
            .filter(|q| q.id != question_id)
            .cloned()
            .collect();
        self.with_questions(questions)
    }
}

/// A named, ordered sequence of categories. This is the value the client
/// holds in memory; it has no persistent identity of its own until it is
/// published.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Form {
    name: String,
    categories: Vec<Category>,
}

impl Form {
    pub fn new(name: impl Into<String>, categories: Vec<Category>) -> Self {
        Self {
            name: name.into(),
            categories,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    pub fn category(&self, category_id: CategoryId) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == category_id)
    }

    pub fn with_name(&self, name: impl Into<String>) -> Form {
        Form {
            name: name.into(),
            ..self.clone()
        }
    }

    pub fn with_categories(&self, categories: Vec<Category>) -> Form {
        Form {
            categories,
            ..self.clone()
        }
    }

    /// Applies `modifier` to the category with the given id, leaving every
    /// other category untouched.
    pub fn with_category(
        &self,
        category_id: CategoryId,
        modifier: impl FnOnce(&Category) -> Category,
    ) -> Form {
        let mut modifier = Some(modifier);
        let categories = self
            .categories
            .iter()
            .map(|c| {
                if c.id == category_id {
                    if let Some(f) = modifier.take() {
                        return f(c);
                    }
                }
                c.clone()
            })
            .collect();
        self.with_categories(categories)
    }

    pub fn with_moved_category(&self, category_id: CategoryId, direction: MoveDirection) -> Form {
        let Some(index) = self.categories.iter().position(|c| c.id == category_id) else {
            return self.clone();
        };
        let new_index = match direction {
            MoveDirection::Up => index.checked_sub(1),
            MoveDirection::Down => Some(index + 1),
        };
        let Some(new_index) = new_index.filter(|&i| i < self.categories.len()) else {
            return self.clone();
        };
        let mut categories = self.categories.clone();
        categories.swap(index, new_index);
        self.with_categories(categories)
    }

    pub fn add_category(&self, category: Category) -> Form {
        let mut categories = self.categories.clone();
        categories.push(category);
        self.with_categories(categories)
    }

    pub fn remove_category(&self, category_id: CategoryId) -> Form {
        let categories = self
            .categories
            .iter()
            .filter(|c| c.id != category_id)
            .cloned()
            .collect();
        self.with_categories(categories)
    }

    /// Counts how many questions carry each selection, across all categories.
    pub fn selection_counts(&self) -> HashMap<Selection, usize> {
        let mut counts = HashMap::new();
        for category in &self.categories {
            for question in &category.questions {
                *counts.entry(question.selection).or_insert(0) += 1;
            }
        }
        counts
    }

    /// A small fixture form, handy for demos and tests.
    pub fn example() -> Form {
        Form::new(
            "Test Form",
            vec![
                Category::new(
                    "First Category",
                    vec![
                        Question::new("Must Have Question").with_selection(Selection::MustHave),
                        Question::new("Would Like Question").with_selection(Selection::WouldLike),
                        Question::new("Maybe Question").with_selection(Selection::Maybe),
                        Question::new("Off Limits Question").with_selection(Selection::OffLimits),
                    ],
                ),
                Category::new(
                    "Second Category",
                    vec![
                        Question::new("First Question").with_selection(Selection::MustHave),
                        Question::new("Second Question").with_selection(Selection::WouldLike),
                        Question::new("Third Question").with_selection(Selection::Maybe),
                    ],
                ),
            ],
        )
    }
}

//=========================================================================================
// Stored Records
//=========================================================================================

/// The persisted representation of a published form. Created exactly once
/// per id and immutable after creation; the only lifecycle transition left
/// is a hard delete.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredFormRecord {
    pub id: FormId,
    /// Credential for admin actions on this form, returned once at publish.
    pub modification_key: ModificationKey,
    pub encrypted: bool,
    /// Set only when `encrypted` is true; gates `verify_access`.
    pub password_hash: Option<String>,
    pub name: String,
    /// Opaque string: either raw Form JSON or EncryptedPayload JSON.
    pub data: String,
    pub cloned_from: Option<FormId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A secondary, independently-gated, expirable pointer to a published form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SharedFormRecord {
    pub share_id: ShareId,
    pub form_id: FormId,
    /// Independent of the form's own password hash.
    pub password_hash: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
    pub view_count: i64,
    pub created_at: DateTime<Utc>,
}

impl SharedFormRecord {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expiry| now > expiry)
    }
}

/// The projection used for the "recent forms" listing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormMeta {
    pub id: FormId,
    pub name: String,
    pub date: DateTime<Utc>,
}

/// A fresh, unpublished draft produced by cloning through a share link.
/// Never persisted by the clone operation itself; the caller publishes it
/// later under its new id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClonedFormDraft {
    pub id: FormId,
    pub modification_key: ModificationKey,
    pub name: String,
    pub data: String,
    pub cloned_from: FormId,
    pub original_form_name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn id_round_trips_through_its_string_form() {
        let id = QuestionId::generate();
        let parsed: QuestionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn id_rejects_a_mismatched_prefix() {
        let question_id = QuestionId::generate().to_string();
        let err = question_id.parse::<CategoryId>().unwrap_err();
        assert!(matches!(err, IdParseError::PrefixMismatch { expected: "category", .. }));
    }

    #[test]
    fn id_deserialization_rejects_a_mismatched_prefix() {
        let json = serde_json::to_string(&CategoryId::generate()).unwrap();
        assert!(serde_json::from_str::<QuestionId>(&json).is_err());
        assert!(serde_json::from_str::<CategoryId>(&json).is_ok());
    }

    #[test]
    fn id_rejects_garbage() {
        assert!("question".parse::<QuestionId>().is_err());
        assert!("question_not-a-uuid".parse::<QuestionId>().is_err());
        assert!("".parse::<QuestionId>().is_err());
    }

    #[test]
    fn selection_cycles_through_all_variants() {
        let mut selection = Selection::MustHave;
        let order = [
            Selection::WouldLike,
            Selection::Maybe,
            Selection::OffLimits,
            Selection::Unset,
            Selection::MustHave,
        ];
        for expected in order {
            selection = selection.next();
            assert_eq!(selection, expected);
        }
    }

    #[test]
    fn selection_uses_the_wire_names() {
        assert_eq!(serde_json::to_string(&Selection::MustHave).unwrap(), "\"must\"");
        assert_eq!(serde_json::to_string(&Selection::OffLimits).unwrap(), "\"off_limits\"");
        assert!(serde_json::from_str::<Selection>("\"sometimes\"").is_err());
    }

    #[test]
    fn mutators_return_new_values_and_preserve_the_original() {
        let form = Form::example();
        let category_id = form.categories()[0].id();

        let renamed = form.with_category(category_id, |c| c.with_name("Renamed"));

        assert_eq!(form.categories()[0].name(), "First Category");
        assert_eq!(renamed.categories()[0].name(), "Renamed");
        // Identity survives the transformation.
        assert_eq!(renamed.categories()[0].id(), category_id);
        // Untouched substructure is equal.
        assert_eq!(form.categories()[1], renamed.categories()[1]);
    }

    #[test]
    fn cycling_a_question_touches_only_that_question() {
        let form = Form::example();
        let category_id = form.categories()[1].id();
        let question_id = form.categories()[1].questions()[2].id();

        let updated = form.with_category(category_id, |c| {
            c.with_question(question_id, |q| q.with_next_selection())
        });

        assert_eq!(
            updated.categories()[1].questions()[2].selection(),
            Selection::OffLimits
        );
        assert_eq!(form.categories()[1].questions()[2].selection(), Selection::Maybe);
        assert_eq!(updated.categories()[0], form.categories()[0]);
    }

    #[test]
    fn moving_past_either_end_is_a_no_op() {
        let form = Form::example();
        let first = form.categories()[0].id();
        let last = form.categories()[1].id();

        assert_eq!(form.with_moved_category(first, MoveDirection::Up), form);
        assert_eq!(form.with_moved_category(last, MoveDirection::Down), form);

        let swapped = form.with_moved_category(first, MoveDirection::Down);
        assert_eq!(swapped.categories()[1].id(), first);
        assert_eq!(swapped.categories()[0].id(), last);
    }

    #[test]
    fn add_and_remove_produce_new_forms() {
        let form = Form::example();
        let extra = Category::new("Third Category", vec![Question::new("Extra")]);
        let added = form.add_category(extra.clone());
        assert_eq!(added.categories().len(), 3);
        assert_eq!(form.categories().len(), 2);

        let removed = added.remove_category(extra.id());
        assert_eq!(removed, form);
    }

    #[test]
    fn selection_counts_span_all_categories() {
        let counts = Form::example().selection_counts();
        assert_eq!(counts[&Selection::MustHave], 2);
        assert_eq!(counts[&Selection::WouldLike], 2);
        assert_eq!(counts[&Selection::Maybe], 2);
        assert_eq!(counts[&Selection::OffLimits], 1);
        assert_eq!(counts.get(&Selection::Unset), None);
    }

    #[test]
    fn form_survives_a_json_round_trip() {
        let form = Form::example();
        let json = serde_json::to_string(&form).unwrap();
        let back: Form = serde_json::from_str(&json).unwrap();
        assert_eq!(form, back);
    }
}
