//! Company question schemas.
//!
//! A schema is stored as an arbitrary JSON document, normally
//! `{"fields": [{"key", "label", "type"?, "required"?}, ...]}`, but older
//! writers also stored it as a JSON-encoded string. [`parse_schema_fields`]
//! accepts both and never fails; [`prepare_schema_fields`] is the editor's save
//! path that guarantees unique keys before a schema is written.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

// ─── Field definitions ───────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormFieldDefinition {
  pub key:        String,
  pub label:      String,
  #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
  pub field_type: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub required:   Option<bool>,
}

/// Keys that every schema contains and the editor cannot remove.
pub const LOCKED_FIELD_KEYS: [&str; 2] = ["name", "rating"];

/// The locked fields with their default presentation.
pub fn locked_fields() -> Vec<FormFieldDefinition> {
  vec![
    FormFieldDefinition {
      key:        "name".into(),
      label:      "お名前".into(),
      field_type: Some("text".into()),
      required:   Some(true),
    },
    FormFieldDefinition {
      key:        "rating".into(),
      label:      "総合評価".into(),
      field_type: Some("rating".into()),
      required:   Some(true),
    },
  ]
}

// ─── Parsing ─────────────────────────────────────────────────────────────────

fn schema_object(raw: &Value) -> Option<Map<String, Value>> {
  match raw {
    Value::Object(map) => Some(map.clone()),
    Value::String(text) => match serde_json::from_str::<Value>(text) {
      Ok(Value::Object(map)) => Some(map),
      _ => None,
    },
    _ => None,
  }
}

fn normalize_field(field: &Value) -> Option<FormFieldDefinition> {
  let field = field.as_object()?;

  let key = field
    .get("key")
    .and_then(Value::as_str)
    .map(str::trim)
    .filter(|k| !k.is_empty())?
    .to_owned();

  let label = field
    .get("label")
    .and_then(Value::as_str)
    .filter(|l| !l.trim().is_empty())
    .map_or_else(|| key.clone(), str::to_owned);

  Some(FormFieldDefinition {
    key,
    label,
    field_type: field.get("type").and_then(Value::as_str).map(str::to_owned),
    required: field.get("required").and_then(Value::as_bool),
  })
}

/// Parse the stored schema document into a clean field list.
///
/// Accepts an object with a `fields` array or a JSON string that parses to
/// one; any other shape yields an empty list. Non-object entries and entries
/// without a non-blank `key` are dropped.
pub fn parse_schema_fields(raw: Option<&Value>) -> Vec<FormFieldDefinition> {
  let Some(schema) = raw.and_then(schema_object) else {
    return Vec::new();
  };
  let Some(fields) = schema.get("fields").and_then(Value::as_array) else {
    return Vec::new();
  };
  fields.iter().filter_map(normalize_field).collect()
}

// ─── Question/answer list ────────────────────────────────────────────────────

/// One question paired with the raw answer found in the payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuestionAnswer {
  pub key:      String,
  pub question: String,
  pub value:    Option<Value>,
}

/// Merge schema fields with a response payload into an ordered list.
///
/// Schema fields come first, in schema order and de-duplicated by key, with
/// their label as the question. Payload keys the schema does not mention
/// follow in payload order, using the raw key as the question. Every key
/// appears exactly once.
pub fn build_question_answer_list(
  payload: &Map<String, Value>,
  schema_fields: &[FormFieldDefinition],
) -> Vec<QuestionAnswer> {
  // Later definitions of a duplicated key win the label.
  let label_by_key: HashMap<&str, &str> = schema_fields
    .iter()
    .map(|f| (f.key.as_str(), f.label.as_str()))
    .collect();

  let mut seen = HashSet::new();
  let ordered_keys: Vec<&str> = schema_fields
    .iter()
    .map(|f| f.key.as_str())
    .chain(payload.keys().map(String::as_str))
    .filter(|key| seen.insert(*key))
    .collect();

  ordered_keys
    .into_iter()
    .map(|key| QuestionAnswer {
      key:      key.to_owned(),
      question: label_by_key.get(key).copied().unwrap_or(key).to_owned(),
      value:    payload.get(key).cloned(),
    })
    .collect()
}

// ─── Editor save path ────────────────────────────────────────────────────────

/// Derive a field key from a human-written label.
///
/// Lower-cases, replaces each run of non-alphanumeric characters with `_`,
/// trims leading and trailing underscores and collapses doubles. Falls back to
/// `"custom"` when nothing is left (e.g. an all-Japanese label).
pub fn slugify_label(label: &str) -> String {
  let mut slug = String::with_capacity(label.len());
  let mut pending_sep = false;
  for ch in label.to_lowercase().chars() {
    if ch.is_ascii_alphanumeric() {
      if pending_sep && !slug.is_empty() {
        slug.push('_');
      }
      pending_sep = false;
      slug.push(ch);
    } else {
      pending_sep = true;
    }
  }
  if slug.is_empty() { "custom".to_owned() } else { slug }
}

/// A field as submitted by the schema editor, before keys are assigned.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldDraft {
  /// Existing key, if the field was loaded from a stored schema.
  #[serde(default)]
  pub key:        Option<String>,
  #[serde(default)]
  pub label:      String,
  #[serde(rename = "type", default)]
  pub field_type: Option<String>,
  #[serde(default)]
  pub required:   Option<bool>,
}

impl FieldDraft {
  fn existing_key(&self) -> Option<&str> {
    self.key.as_deref().map(str::trim).filter(|k| !k.is_empty())
  }

  fn locked_key(&self) -> Option<&'static str> {
    let key = self.existing_key()?;
    LOCKED_FIELD_KEYS.into_iter().find(|locked| *locked == key)
  }
}

/// Assign unique keys to editor drafts.
///
/// The first draft carrying a locked key keeps it and becomes required. Every
/// other field keeps an existing key or derives one from its label;
/// collisions are resolved by appending `_2`, `_3`, … in submission order.
/// Locked keys are reserved up front so a custom field can never displace
/// them, and a second draft keyed `name` is renamed like any custom field.
pub fn prepare_schema_fields(drafts: &[FieldDraft]) -> Vec<FormFieldDefinition> {
  let defaults = locked_fields();

  // Index of the draft that owns each locked key.
  let mut owners: HashMap<&'static str, usize> = HashMap::new();
  for (index, draft) in drafts.iter().enumerate() {
    if let Some(locked) = draft.locked_key() {
      owners.entry(locked).or_insert(index);
    }
  }
  let mut used: HashSet<String> = owners.keys().map(|k| (*k).to_owned()).collect();

  drafts
    .iter()
    .enumerate()
    .map(|(index, draft)| {
      if let Some(locked) = draft.locked_key().filter(|k| owners.get(k) == Some(&index)) {
        let default = defaults.iter().find(|f| f.key == locked);
        let label = if draft.label.trim().is_empty() {
          default.map(|f| f.label.clone()).unwrap_or_else(|| locked.to_owned())
        } else {
          draft.label.clone()
        };
        return FormFieldDefinition {
          key: locked.to_owned(),
          label,
          field_type: draft
            .field_type
            .clone()
            .or_else(|| default.and_then(|f| f.field_type.clone())),
          required: Some(true),
        };
      }

      let base = match draft.existing_key() {
        Some(key) => key.to_owned(),
        None if draft.label.trim().is_empty() => slugify_label(&format!("field-{}", index + 1)),
        None => slugify_label(&draft.label),
      };
      let mut key = base.clone();
      let mut n = 2;
      while used.contains(&key) {
        key = format!("{base}_{n}");
        n += 1;
      }
      used.insert(key.clone());

      FormFieldDefinition {
        key,
        label: if draft.label.trim().is_empty() {
          "新しい質問".to_owned()
        } else {
          draft.label.clone()
        },
        field_type: Some(draft.field_type.clone().unwrap_or_else(|| "text".to_owned())),
        required: draft.required,
      }
    })
    .collect()
}

/// Check a prepared field list before it is stored.
pub fn validate_schema_fields(fields: &[FormFieldDefinition]) -> Result<()> {
  if fields.is_empty() {
    return Err(Error::EmptySchema);
  }
  for locked in LOCKED_FIELD_KEYS {
    if !fields.iter().any(|f| f.key == locked) {
      return Err(Error::MissingLockedField(locked));
    }
  }
  let mut seen = HashSet::new();
  if let Some(dup) = fields.iter().find(|f| !seen.insert(f.key.as_str())) {
    return Err(Error::DuplicateKey(dup.key.clone()));
  }
  Ok(())
}

/// Read a schema designed by the form-schema workflow.
///
/// The schema is taken from `form_schema` when present, otherwise the whole
/// output object is the schema. It is normalised like a stored schema and
/// must pass [`validate_schema_fields`].
pub fn schema_from_outputs(outputs: &Map<String, Value>) -> Result<Vec<FormFieldDefinition>> {
  let raw = match outputs.get("form_schema") {
    Some(schema) if !schema.is_null() => schema.clone(),
    _ => Value::Object(outputs.clone()),
  };
  let fields = parse_schema_fields(Some(&raw));
  validate_schema_fields(&fields)?;
  Ok(fields)
}

/// The document stored in `companies.form_schema`.
pub fn schema_document(fields: &[FormFieldDefinition]) -> Result<Value> {
  Ok(serde_json::json!({ "fields": serde_json::to_value(fields)? }))
}
