//! Small accessors over `noak`'s class reader.

use noak::error::DecodeError;
use noak::reader::attributes::annotations::ElementValue;
use noak::reader::cpool::{self, ConstantPool, Index};
use noak::reader::AttributeContent;

pub fn utf8<'input>(pool: &ConstantPool<'input>, index: Index<cpool::Utf8<'input>>) -> Result<String, DecodeError> {
    Ok(pool.get(index)?.content.display().to_string())
}

pub fn class_name<'input>(pool: &ConstantPool<'input>, index: Index<cpool::Class<'input>>) -> Result<String, DecodeError> {
    utf8(pool, pool.get(index)?.name)
}

/// Element type of an array class name such as `[[Lcom/example/Foo;`, the
/// name itself for plain classes, `None` for primitive arrays.
pub fn element_class(name: &str) -> Option<&str> {
    if !name.starts_with('[') {
        return Some(name);
    }
    name.trim_start_matches('[')
        .strip_prefix('L')
        .and_then(|inner| inner.strip_suffix(';'))
}

/// An annotation's type descriptor and its `value` element when that is a string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringAnnotation {
    pub descriptor: String,
    pub value: Option<String>,
}

/// Annotations carried by one attribute; empty for any other attribute kind.
pub fn string_annotations<'input>(
    pool: &ConstantPool<'input>,
    content: &AttributeContent<'input>,
) -> Result<Vec<StringAnnotation>, DecodeError> {
    let annotations = match content {
        AttributeContent::RuntimeVisibleAnnotations(annotations) => annotations.annotations(),
        AttributeContent::RuntimeInvisibleAnnotations(annotations) => annotations.annotations(),
        _ => return Ok(Vec::new()),
    };

    let mut out = Vec::new();
    for annotation in annotations.iter() {
        let annotation = annotation?;
        let mut value = None;
        for pair in annotation.pairs() {
            let pair = pair?;
            if utf8(pool, pair.name())? != "value" {
                continue;
            }
            if let ElementValue::String(index) = pair.value() {
                value = Some(utf8(pool, index.clone())?);
            }
        }
        out.push(StringAnnotation {
            descriptor: utf8(pool, annotation.type_())?,
            value,
        });
    }
    Ok(out)
}
