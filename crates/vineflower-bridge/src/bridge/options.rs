//! Engine option assembly from user preferences.

use std::collections::BTreeMap;

/// Keys never passed to the engine: meaningless or harmful when embedded.
pub const IGNORED_PREFERENCES: &[&str] = &[
    "ban", // banner
    "bsm", // bytecode source mapping, driven by a toggle instead
    "dcl", // line mapping dump, driven by the same toggle
    "nls", // newline separator
    "__unit_test_mode__",
    "log", // log level
    "urc", // renamer class
    "thr", // threads
    "mpm", // max processing method
    "\r\n",
    "\n",
];

pub const INDENT_KEY: &str = "ind";
const LINE_MAPPING_KEY: &str = "bsm";
/// Makes the engine attach each mapping to its output archive entry.
const DUMP_CODE_LINES_KEY: &str = "dcl";
const DUMP_ORIGINAL_LINES_KEY: &str = "__dump_original_lines__";

pub fn is_ignored(key: &str) -> bool {
    IGNORED_PREFERENCES.contains(&key)
}

/// Values filled in for keys the user left unset. `ind` is in columns.
pub fn forced_overrides(indent_size: usize) -> BTreeMap<String, String> {
    [
        ("hdc", "0".to_string()), // hide default constructor
        ("dgs", "1".to_string()), // decompile generic signatures
        ("rsy", "1".to_string()), // remove synthetic
        ("rbr", "1".to_string()), // remove bridge
        ("iib", "1".to_string()), // ignore invalid bytecode
        ("vac", "1".to_string()), // verify anonymous classes
        (INDENT_KEY, indent_size.to_string()),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_string(), v))
    .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OptionToggles {
    pub line_mapping: bool,
    pub dump_original_lines: bool,
}

/// Final engine options: user map minus ignored keys, overrides for absent
/// keys, indent converted to literal spaces, then the toggles.
pub fn build_options(
    preferences: &BTreeMap<String, String>,
    indent_size: usize,
    toggles: OptionToggles,
) -> BTreeMap<String, String> {
    let mut options: BTreeMap<String, String> = preferences
        .iter()
        .filter(|(key, _)| !is_ignored(key))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();

    for (key, value) in forced_overrides(indent_size) {
        options.entry(key).or_insert(value);
    }

    if let Some(indent) = options.remove(INDENT_KEY) {
        match indent.trim().parse::<usize>() {
            Ok(width) => {
                options.insert(INDENT_KEY.to_string(), " ".repeat(width));
            }
            Err(_) => log::warn!("Ignoring non-numeric indent preference {:?}", indent),
        }
    }

    if toggles.line_mapping {
        options.insert(LINE_MAPPING_KEY.to_string(), "1".to_string());
        options.insert(DUMP_CODE_LINES_KEY.to_string(), "1".to_string());
    }
    if toggles.dump_original_lines {
        options.insert(DUMP_ORIGINAL_LINES_KEY.to_string(), "1".to_string());
    }
    options
}
