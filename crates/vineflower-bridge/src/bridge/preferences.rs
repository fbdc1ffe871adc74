//! Engine preference metadata read from the archive's preferences interface.

use super::options::{forced_overrides, is_ignored};
use crate::utils::jvm_class::{self, StringAnnotation};
use anyhow::{Context, Result};
use noak::error::DecodeError;
use noak::reader::cpool::Item;
use noak::reader::{AttributeContent, Class};
use noak::AccessFlags;
use serde::Serialize;
use std::io::Read;
use std::path::Path;

const PREFERENCES_CLASS: &str = "org/jetbrains/java/decompiler/main/extern/IFernflowerPreferences.class";
const NAME_ANNOTATION: &str = "Lorg/jetbrains/java/decompiler/main/extern/IFernflowerPreferences$Name;";
const DESCRIPTION_ANNOTATION: &str =
    "Lorg/jetbrains/java/decompiler/main/extern/IFernflowerPreferences$Description;";
const SHORT_NAME_ANNOTATION: &str =
    "Lorg/jetbrains/java/decompiler/main/extern/IFernflowerPreferences$ShortName;";
const TYPE_ANNOTATION: &str = "Lorg/jetbrains/java/decompiler/main/extern/IFernflowerPreferences$Type;";

const NAME_OVERRIDES: &[(&str, &str)] = &[
    ("dc4", "Decompile Class 1.4"),
    ("ind", "Indent Size"),
    ("lit", "Literals As-Is"),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PreferenceType {
    Boolean,
    Integer,
    String,
}

/// One engine preference as the settings surface presents it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferenceDescriptor {
    /// Key used in the preference map.
    pub key: String,
    /// The constant's own value; differs from `key` when a short name is declared.
    pub long_key: String,
    pub name: String,
    pub description: Option<String>,
    pub kind: Option<PreferenceType>,
}

/// Describe every preference the engine archive declares.
pub fn describe_preferences(archive: &Path) -> Result<Vec<PreferenceDescriptor>> {
    let file = std::fs::File::open(archive).with_context(|| format!("Failed to open {:?}", archive))?;
    let mut zip = zip::ZipArchive::new(file).with_context(|| format!("Failed to read archive {:?}", archive))?;
    let mut entry = zip
        .by_name(PREFERENCES_CLASS)
        .with_context(|| format!("{} not found in {:?}", PREFERENCES_CLASS, archive))?;
    let mut bytes = Vec::with_capacity(entry.size() as usize);
    entry.read_to_end(&mut bytes)?;
    preferences_from_class(&bytes)
}

/// A `static final` field of the preferences interface.
struct PreferenceField {
    name: String,
    constant: Option<String>,
    annotations: Vec<StringAnnotation>,
}

impl PreferenceField {
    fn annotation_value(&self, descriptor: &str) -> Option<String> {
        self.annotations
            .iter()
            .find(|a| a.descriptor == descriptor)
            .and_then(|a| a.value.clone())
    }
}

fn constant_fields(bytes: &[u8]) -> Result<Vec<PreferenceField>, DecodeError> {
    let class = Class::new(bytes)?;
    let pool = class.pool();
    let mut fields = Vec::new();
    for field in class.fields() {
        let field = field?;
        if !field.access_flags().contains(AccessFlags::STATIC | AccessFlags::FINAL) {
            continue;
        }
        let mut constant = None;
        let mut annotations = Vec::new();
        for attr in field.attributes() {
            let content = attr?.read_content(pool)?;
            if let AttributeContent::ConstantValue(value) = &content {
                // numeric constants are not preferences
                if let Item::String(string) = pool.get(value.value())? {
                    constant = Some(jvm_class::utf8(pool, string.string)?);
                }
                continue;
            }
            annotations.extend(jvm_class::string_annotations(pool, &content)?);
        }
        fields.push(PreferenceField {
            name: jvm_class::utf8(pool, field.name())?,
            constant,
            annotations,
        });
    }
    Ok(fields)
}

pub fn preferences_from_class(bytes: &[u8]) -> Result<Vec<PreferenceDescriptor>> {
    let fields = constant_fields(bytes).context("Failed to parse preferences class")?;
    let defaults = forced_overrides(4);

    let descriptors = fields
        .iter()
        .filter_map(|field| {
            let long_key = field.constant.clone()?;
            let key = field
                .annotation_value(SHORT_NAME_ANNOTATION)
                .unwrap_or_else(|| long_key.clone());
            if is_ignored(&key) {
                return None;
            }
            let kind = match field.annotation_value(TYPE_ANNOTATION).as_deref() {
                Some("bool") => Some(PreferenceType::Boolean),
                Some("int") => Some(PreferenceType::Integer),
                Some("string") => Some(PreferenceType::String),
                _ => defaults.get(&key).map(|value| infer_type(value)),
            };
            Some(PreferenceDescriptor {
                name: infer_name(&key, field),
                description: field.annotation_value(DESCRIPTION_ANNOTATION),
                kind,
                long_key,
                key,
            })
        })
        .collect();
    Ok(descriptors)
}

fn infer_type(default: &str) -> PreferenceType {
    if default == "0" || default == "1" {
        PreferenceType::Boolean
    } else if default.parse::<i32>().is_ok() {
        PreferenceType::Integer
    } else {
        PreferenceType::String
    }
}

fn infer_name(key: &str, field: &PreferenceField) -> String {
    if let Some(name) = field.annotation_value(NAME_ANNOTATION) {
        return name;
    }
    if let Some((_, name)) = NAME_OVERRIDES.iter().find(|(k, _)| *k == key) {
        return name.to_string();
    }
    title_case(&field.name.replace('_', " ").to_lowercase())
}

fn title_case(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}
