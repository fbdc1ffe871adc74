use super::LanguageDetector;
use crate::utils::jvm_class;
use noak::error::DecodeError;
use noak::reader::Class;

pub const JAVA_LANGUAGE: &str = "java";
pub const KOTLIN_LANGUAGE: &str = "kotlin";

const KOTLIN_METADATA: &str = "Lkotlin/Metadata;";

/// Detects the source language from class-level annotations, limited to the
/// language plugins bundled with the loaded engine.
#[derive(Debug, Clone, Copy, Default)]
pub struct AnnotationLanguageDetector {
    kotlin: bool,
}

impl AnnotationLanguageDetector {
    pub fn new(kotlin: bool) -> Self {
        Self { kotlin }
    }
}

impl LanguageDetector for AnnotationLanguageDetector {
    fn language(&self, class_bytes: &[u8]) -> String {
        if !self.kotlin {
            return JAVA_LANGUAGE.to_string();
        }
        match has_kotlin_metadata(class_bytes) {
            Ok(true) => KOTLIN_LANGUAGE.to_string(),
            Ok(false) => JAVA_LANGUAGE.to_string(),
            Err(e) => {
                log::debug!("Unreadable class file, assuming Java: {}", e);
                JAVA_LANGUAGE.to_string()
            }
        }
    }
}

fn has_kotlin_metadata(class_bytes: &[u8]) -> Result<bool, DecodeError> {
    let class = Class::new(class_bytes)?;
    let pool = class.pool();
    for attr in class.attributes() {
        let content = attr?.read_content(pool)?;
        let annotations = jvm_class::string_annotations(pool, &content)?;
        if annotations.iter().any(|a| a.descriptor == KOTLIN_METADATA) {
            return Ok(true);
        }
    }
    Ok(false)
}
