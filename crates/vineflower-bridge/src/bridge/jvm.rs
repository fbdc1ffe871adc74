//! The engine hosted in an isolated child JVM.

use super::{Capabilities, ContextSource, Engine, EngineError, EngineJob, EngineLogger, Severity, Throwable};
use crate::utils::jvm_class;
use crate::utils::process::EngineCommandExt;
use anyhow::{anyhow, Context};
use noak::error::DecodeError;
use noak::reader::cpool::Item;
use noak::reader::Class;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::io::{BufRead, BufReader, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

pub const DRIVER_CLASS: &str = "org.jetbrains.java.decompiler.main.decompiler.ConsoleDecompiler";

/// The unit is handed over as an archive so the engine writes its output as
/// an archive too, the only output that carries line mappings.
const UNIT_ARCHIVE: &str = "unit.jar";

/// Zip extra field the engine attaches to an output entry under `dcl=1`.
const LINE_MAPPING_TAG: u16 = 0x4646;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// `java.io.IOException: message`, optionally prefixed by `Caused by: `.
static THROWABLE_HEADER: Lazy<Option<Regex>> = Lazy::new(|| {
    Regex::new(r"^(?:Caused by: )?((?:[A-Za-z_$][\w$]*\.)+[A-Z][\w$]*)(?::\s?(.*))?$").ok()
});

#[derive(Debug, Clone)]
pub struct JvmEngine {
    java: PathBuf,
    classpath: Vec<PathBuf>,
    capabilities: Capabilities,
}

impl JvmEngine {
    pub fn new(java: PathBuf, classpath: Vec<PathBuf>, capabilities: Capabilities) -> Self {
        Self {
            java,
            classpath,
            capabilities,
        }
    }

    pub fn java(&self) -> &Path {
        &self.java
    }

    pub fn classpath(&self) -> &[PathBuf] {
        &self.classpath
    }

    /// `java -cp <engine> ConsoleDecompiler -xxx=v... [-e=<libraries>] <unit> <out>`.
    ///
    /// The driver reads options only while arguments look like `-xxx=v`; the
    /// first one that does not ends option parsing and is taken as a source.
    /// Options it cannot parse are therefore left out.
    pub(crate) fn command(
        &self,
        options: &BTreeMap<String, String>,
        unit_archive: &Path,
        library_dir: Option<&Path>,
        out_dir: &Path,
    ) -> anyhow::Result<Command> {
        let classpath = std::env::join_paths(&self.classpath).context("Invalid engine classpath entry")?;
        let mut command = Command::new(&self.java);
        command.arg("-cp").arg(classpath).arg(DRIVER_CLASS);
        for (key, value) in options {
            match console_option(key, value) {
                Some(arg) => {
                    command.arg(arg);
                }
                None => log::debug!("Option {}={:?} has no console form, not passed", key, value),
            }
        }
        if let Some(dir) = library_dir {
            command.arg(format!("-e={}", dir.display()));
        }
        command
            .arg(unit_archive)
            .arg(out_dir)
            .isolate_jvm_env()
            .suppress_console()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        Ok(command)
    }
}

/// `-xxx=value` when the console driver would accept it as an option.
fn console_option(key: &str, value: &str) -> Option<String> {
    let short_key = key.len() == 3 && key.bytes().all(|b| b.is_ascii_alphanumeric());
    (short_key && !value.is_empty()).then(|| format!("-{}={}", key, value))
}

impl Engine for JvmEngine {
    fn decompile(&self, job: EngineJob<'_>) -> Result<(), EngineError> {
        let scratch = tempfile::Builder::new()
            .prefix("vineflower-")
            .tempdir()
            .context("Failed to create scratch directory")?;
        let unit_archive = scratch.path().join(UNIT_ARCHIVE);
        let library_dir = scratch.path().join("libraries");
        let out_dir = scratch.path().join("out");
        std::fs::create_dir_all(&out_dir).with_context(|| format!("Failed to create {:?}", out_dir))?;

        let mut entries = Vec::with_capacity(job.sources.len());
        let mut unit_refs = Vec::with_capacity(job.sources.len());
        for source in job.sources {
            let bytes = job
                .bytecode
                .bytecode(source, None)
                .with_context(|| format!("Failed to read bytecode for {:?}", source))?;
            let entry_name = match class_refs(&bytes) {
                Ok(refs) => {
                    let name = format!("{}.class", refs.name);
                    unit_refs.push(refs);
                    name
                }
                Err(e) => {
                    log::debug!("Unreadable class {:?}, staging it by file name: {}", source, e);
                    source
                        .file_name()
                        .ok_or_else(|| anyhow!("Not a class file path: {:?}", source))?
                        .to_string_lossy()
                        .into_owned()
                }
            };
            entries.push((entry_name, bytes));
        }
        write_unit_archive(&unit_archive, &entries)?;

        let library = job.library.filter(|_| self.capabilities.library_context);
        let staged_libraries = match library {
            Some(source) => stage_library(source, &unit_refs, &library_dir, job.is_cancelled)?,
            None => 0,
        };

        let mut command = self.command(
            job.options,
            &unit_archive,
            (staged_libraries > 0).then_some(library_dir.as_path()),
            &out_dir,
        )?;
        log::debug!("Executing: {:?}", command);
        let mut child = command.spawn().context("Failed to spawn decompiler Java process")?;

        let (tx, rx) = mpsc::channel::<String>();
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, tx.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, tx.clone());
        }
        drop(tx);

        let mut parser = OutputParser::new(job.logger);
        loop {
            if (job.is_cancelled)() {
                kill(&mut child);
                return Err(EngineError::Cancelled);
            }
            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(line) => {
                    if let Err(e) = parser.line(&line) {
                        kill(&mut child);
                        return Err(e);
                    }
                }
                Err(mpsc::RecvTimeoutError::Timeout) => continue,
                Err(mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }
        let status = child.wait().context("Failed to wait for decompiler process")?;
        parser.finish()?;
        if !status.success() {
            return Err(EngineError::Other(anyhow!(
                "Decompiler process exited with code {:?}",
                status.code()
            )));
        }

        let primary = entries
            .first()
            .map(|(name, _)| name.trim_end_matches(".class").to_string())
            .unwrap_or_default();
        for output in read_outputs(&out_dir.join(UNIT_ARCHIVE), &primary)? {
            job.sink
                .save_class(&output.qualified_name, &output.entry_name, &output.content, output.mapping.as_deref());
        }
        Ok(())
    }
}

/// A class's own name, every class its constant pool names, and its direct
/// supertypes.
#[derive(Debug, Clone, PartialEq, Eq)]
struct ClassRefs {
    name: String,
    referenced: BTreeSet<String>,
    supertypes: Vec<String>,
}

fn class_refs(bytes: &[u8]) -> Result<ClassRefs, DecodeError> {
    let class = Class::new(bytes)?;
    let pool = class.pool();
    let name = jvm_class::class_name(pool, class.this_class())?;

    let mut supertypes = Vec::new();
    if let Some(super_class) = class.super_class() {
        supertypes.push(jvm_class::class_name(pool, super_class)?);
    }
    for interface in class.interfaces() {
        supertypes.push(jvm_class::class_name(pool, interface?)?);
    }

    let mut referenced = BTreeSet::new();
    for (_, item) in pool.iter_indices() {
        let Item::Class(entry) = item else {
            continue;
        };
        let raw = jvm_class::utf8(pool, entry.name)?;
        if let Some(element) = jvm_class::element_class(&raw) {
            if element != name {
                referenced.insert(element.to_string());
            }
        }
    }
    Ok(ClassRefs {
        name,
        referenced,
        supertypes,
    })
}

fn is_platform_class(name: &str) -> bool {
    name.starts_with("java/") || name.starts_with("javax/")
}

/// Copy project classes the unit references into `dir`, together with the
/// supertype chains of everything copied. Platform classes are left to the
/// child's own runtime.
fn stage_library(
    source: &dyn ContextSource,
    unit: &[ClassRefs],
    dir: &Path,
    is_cancelled: &(dyn Fn() -> bool + Sync),
) -> Result<usize, EngineError> {
    let mut seen: BTreeSet<String> = unit.iter().map(|refs| refs.name.clone()).collect();
    let mut queue: VecDeque<String> = unit
        .iter()
        .flat_map(|refs| refs.referenced.iter().cloned())
        .collect();

    let mut staged = 0;
    while let Some(name) = queue.pop_front() {
        if !seen.insert(name.clone()) {
            continue;
        }
        if is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        if is_platform_class(&name) || !source.has_class(&name) {
            continue;
        }
        let Some(bytes) = source.class_bytes(&name) else {
            continue;
        };
        match class_refs(&bytes) {
            Ok(refs) => queue.extend(refs.supertypes),
            Err(e) => log::debug!("Not following supertypes of unreadable {}: {}", name, e),
        }
        let dest = dir.join(format!("{}.class", name));
        if let Some(parent) = dest.parent() {
            std::fs::create_dir_all(parent).with_context(|| format!("Failed to create {:?}", parent))?;
        }
        std::fs::write(&dest, bytes).with_context(|| format!("Failed to stage library class {:?}", dest))?;
        staged += 1;
    }
    log::debug!("Staged {} library classes from {}", staged, source.name());
    Ok(staged)
}

fn write_unit_archive(path: &Path, entries: &[(String, Vec<u8>)]) -> anyhow::Result<()> {
    let file = std::fs::File::create(path).with_context(|| format!("Failed to create {:?}", path))?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::SimpleFileOptions::default();
    for (name, bytes) in entries {
        zip.start_file(name.as_str(), options)
            .with_context(|| format!("Failed to add {} to the unit archive", name))?;
        zip.write_all(bytes)?;
    }
    zip.finish().context("Failed to finish the unit archive")?;
    Ok(())
}

/// One decompiled source file taken from the engine's output archive.
#[derive(Debug, Clone, PartialEq, Eq)]
struct Output {
    qualified_name: String,
    entry_name: String,
    content: String,
    mapping: Option<Vec<u32>>,
}

/// The `.java` entries of `archive`, the primary class's first. A missing
/// archive means the engine produced nothing.
fn read_outputs(archive: &Path, primary: &str) -> anyhow::Result<Vec<Output>> {
    let file = match std::fs::File::open(archive) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            log::warn!("Decompiler wrote no output archive");
            return Ok(Vec::new());
        }
        Err(e) => return Err(e).with_context(|| format!("Failed to open {:?}", archive)),
    };
    let mut zip = zip::ZipArchive::new(file).with_context(|| format!("Failed to read {:?}", archive))?;

    let mut outputs = Vec::new();
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let entry_name = entry.name().to_string();
        let Some(qualified_name) = entry_name.strip_suffix(".java") else {
            continue;
        };
        let mut content = String::new();
        entry
            .read_to_string(&mut content)
            .with_context(|| format!("Failed to read {}", entry_name))?;
        outputs.push(Output {
            qualified_name: qualified_name.to_string(),
            mapping: entry.extra_data().and_then(line_mapping),
            entry_name,
            content,
        });
    }
    outputs.sort_by_key(|output| output.qualified_name != primary);
    Ok(outputs)
}

/// Decode the engine's line-mapping extra field: tag, size, a version byte
/// of 1, then big-endian `u16` line pairs.
fn line_mapping(extra: &[u8]) -> Option<Vec<u32>> {
    let header = extra.get(..5)?;
    if u16::from_be_bytes([header[0], header[1]]) != LINE_MAPPING_TAG || header[4] != 1 {
        return None;
    }
    let body = &extra[5..];
    let mapping: Vec<u32> = body
        .chunks_exact(2)
        .map(|pair| u32::from(u16::from_be_bytes([pair[0], pair[1]])))
        .collect();
    (!mapping.is_empty() && mapping.len() % 2 == 0).then_some(mapping)
}

fn forward_lines(stream: impl Read + Send + 'static, tx: mpsc::Sender<String>) {
    std::thread::spawn(move || {
        for line in BufReader::new(stream).lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
}

fn kill(child: &mut Child) {
    if let Err(e) = child.kill() {
        log::debug!("Failed to kill decompiler process: {}", e);
    }
    let _ = child.wait();
}

fn parse_throwable(line: &str) -> Option<Throwable> {
    let captures = THROWABLE_HEADER.as_ref()?.captures(line.trim_end())?;
    Some(Throwable::new(
        &captures[1],
        captures.get(2).map(|m| m.as_str()).unwrap_or_default(),
    ))
}

/// Turns the console logger's output back into logger callbacks.
struct OutputParser<'a> {
    logger: &'a dyn EngineLogger,
    /// A message that may still be followed by its stack trace.
    pending: Option<(Severity, String)>,
    in_trace: bool,
}

impl<'a> OutputParser<'a> {
    fn new(logger: &'a dyn EngineLogger) -> Self {
        Self {
            logger,
            pending: None,
            in_trace: false,
        }
    }

    fn line(&mut self, line: &str) -> Result<(), EngineError> {
        if let Some((severity, message)) = self.pending.take() {
            if let Some(cause) = parse_throwable(line) {
                self.in_trace = true;
                return self.logger.write_failure(severity, &message, &cause);
            }
            self.logger.write_message(severity, &message);
        }

        if self.in_trace && is_trace_line(line) {
            return Ok(());
        }
        self.in_trace = false;

        let Some((severity, message)) = split_severity(line) else {
            log::debug!(target: "vineflower", "{}", line);
            return Ok(());
        };
        if severity == Severity::Info {
            if let Some(class) = message.strip_prefix("Decompiling class ") {
                self.logger.start_reading_class(class.trim());
                return Ok(());
            }
            if message.trim() == "... done" {
                self.logger.end_reading_class();
                return Ok(());
            }
        }
        match severity {
            Severity::Error | Severity::Warn => self.pending = Some((severity, message.to_string())),
            _ => self.logger.write_message(severity, message),
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<(), EngineError> {
        if let Some((severity, message)) = self.pending.take() {
            self.logger.write_message(severity, &message);
        }
        Ok(())
    }
}

fn is_trace_line(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with("at ") || trimmed.starts_with("... ") || trimmed.starts_with("Caused by:") || trimmed.starts_with("Suppressed:")
}

fn split_severity(line: &str) -> Option<(Severity, &str)> {
    let (tag, rest) = line.split_once(':')?;
    let severity = match tag {
        "TRACE" => Severity::Trace,
        "INFO" => Severity::Info,
        "WARN" => Severity::Warn,
        "ERROR" => Severity::Error,
        _ => return None,
    };
    Some((severity, rest.trim_start()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::options::{build_options, OptionToggles};
    use crate::utils::jvm_class::testing::TestClass;
    use std::sync::Mutex;

    /// The console driver's argument rules: `-xxx=v` options until the first
    /// other argument, then `-e=` libraries and sources, destination last.
    #[derive(Debug, Default)]
    struct ConsoleArgs {
        options: BTreeMap<String, String>,
        libraries: Vec<String>,
        sources: Vec<String>,
        destination: String,
    }

    fn console_args(command: &Command) -> ConsoleArgs {
        let args: Vec<String> = command.get_args().map(|a| a.to_string_lossy().into_owned()).collect();
        assert_eq!(args[0], "-cp");
        assert_eq!(args[2], DRIVER_CLASS);
        let (destination, rest) = args[3..].split_last().unwrap();

        let mut parsed = ConsoleArgs {
            destination: destination.clone(),
            ..ConsoleArgs::default()
        };
        let mut is_option = true;
        for arg in rest {
            if is_option && arg.len() > 5 && arg.starts_with('-') && arg.as_bytes()[4] == b'=' {
                parsed.options.insert(arg[1..4].to_string(), arg[5..].to_string());
            } else {
                is_option = false;
                match arg.strip_prefix("-e=") {
                    Some(library) => parsed.libraries.push(library.to_string()),
                    None => parsed.sources.push(arg.clone()),
                }
            }
        }
        parsed
    }

    fn engine() -> JvmEngine {
        JvmEngine::new(
            PathBuf::from("java"),
            vec![PathBuf::from("/opt/vineflower-1.10.1.jar")],
            Capabilities {
                library_context: true,
                languages: false,
            },
        )
    }

    #[test]
    fn test_every_passed_option_survives_console_parsing() {
        let options = build_options(
            &BTreeMap::from([("lit".to_string(), "1".to_string())]),
            4,
            OptionToggles {
                line_mapping: true,
                dump_original_lines: true,
            },
        );
        let command = engine()
            .command(
                &options,
                Path::new("/tmp/unit.jar"),
                Some(Path::new("/tmp/libraries")),
                Path::new("/tmp/out"),
            )
            .unwrap();

        let parsed = console_args(&command);
        assert_eq!(parsed.sources, vec!["/tmp/unit.jar"]);
        assert_eq!(parsed.libraries, vec!["/tmp/libraries"]);
        assert_eq!(parsed.destination, "/tmp/out");
        assert_eq!(parsed.options["ind"], "    ");
        for key in ["bsm", "dcl", "dgs", "hdc", "iib", "lit", "rbr", "rsy", "vac"] {
            assert!(parsed.options.contains_key(key), "{} lost", key);
        }
        assert!(!command
            .get_args()
            .any(|a| a.to_string_lossy().contains("__dump_original_lines__")));
    }

    #[test]
    fn test_empty_values_are_not_passed() {
        let options = build_options(
            &BTreeMap::from([("ind".to_string(), "0".to_string())]),
            4,
            OptionToggles::default(),
        );
        assert_eq!(options["ind"], "");
        let command = engine()
            .command(&options, Path::new("/tmp/unit.jar"), None, Path::new("/tmp/out"))
            .unwrap();

        let parsed = console_args(&command);
        assert_eq!(parsed.sources, vec!["/tmp/unit.jar"]);
        assert!(parsed.libraries.is_empty());
        assert!(!parsed.options.contains_key("ind"));
        assert_eq!(parsed.options["rbr"], "1");
    }

    #[test]
    fn test_console_option_form() {
        assert_eq!(console_option("dgs", "1").as_deref(), Some("-dgs=1"));
        assert_eq!(console_option("ind", "  ").as_deref(), Some("-ind=  "));
        assert_eq!(console_option("ind", ""), None);
        assert_eq!(console_option("__dump_original_lines__", "1"), None);
        assert_eq!(console_option("a=b", "1"), None);
    }

    #[test]
    fn test_class_refs_lists_references_and_supertypes() {
        let bytes = TestClass {
            super_name: Some("com/example/Base"),
            interfaces: vec!["com/example/Api"],
            refs: vec!["com/example/Dep", "[[Lcom/example/Elem;", "[I"],
            ..TestClass::named("com/example/Foo")
        }
        .bytes();

        let refs = class_refs(&bytes).unwrap();
        assert_eq!(refs.name, "com/example/Foo");
        assert_eq!(refs.supertypes, vec!["com/example/Base", "com/example/Api"]);
        let expected: BTreeSet<String> = ["com/example/Api", "com/example/Base", "com/example/Dep", "com/example/Elem"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(refs.referenced, expected);
        assert!(class_refs(b"garbage").is_err());
    }

    struct MapSource(BTreeMap<String, Vec<u8>>);

    impl ContextSource for MapSource {
        fn name(&self) -> &str {
            "project"
        }

        fn has_class(&self, internal_name: &str) -> bool {
            self.0.contains_key(internal_name)
        }

        fn class_bytes(&self, internal_name: &str) -> Option<Vec<u8>> {
            self.0.get(internal_name).cloned()
        }
    }

    #[test]
    fn test_stage_library_follows_supertypes() {
        let library = MapSource(BTreeMap::from([
            (
                "com/example/Dep".to_string(),
                TestClass {
                    super_name: Some("com/example/Base"),
                    interfaces: vec!["com/example/Api"],
                    ..TestClass::named("com/example/Dep")
                }
                .bytes(),
            ),
            (
                "com/example/Base".to_string(),
                TestClass {
                    super_name: Some("com/example/Root"),
                    ..TestClass::named("com/example/Base")
                }
                .bytes(),
            ),
            ("com/example/Api".to_string(), TestClass::named("com/example/Api").bytes()),
            ("com/example/Root".to_string(), TestClass::named("com/example/Root").bytes()),
            ("com/example/Unused".to_string(), TestClass::named("com/example/Unused").bytes()),
        ]));
        let unit = [
            class_refs(
                &TestClass {
                    refs: vec!["com/example/Dep", "com/example/Foo$Inner", "com/example/Missing", "java/util/List"],
                    ..TestClass::named("com/example/Foo")
                }
                .bytes(),
            )
            .unwrap(),
            class_refs(&TestClass::named("com/example/Foo$Inner").bytes()).unwrap(),
        ];
        let dir = tempfile::tempdir().unwrap();

        let staged = stage_library(&library, &unit, dir.path(), &|| false).unwrap();

        assert_eq!(staged, 4);
        for name in ["Dep", "Base", "Api", "Root"] {
            assert!(dir.path().join(format!("com/example/{}.class", name)).is_file(), "{} not staged", name);
        }
        for name in ["com/example/Unused", "com/example/Foo$Inner", "java/util/List"] {
            assert!(!dir.path().join(format!("{}.class", name)).exists(), "{} staged", name);
        }

        let cancelled = stage_library(&library, &unit, dir.path(), &|| true);
        assert!(matches!(cancelled, Err(EngineError::Cancelled)));
    }

    #[test]
    fn test_unit_archive_round_trips_through_output_reader() {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join(UNIT_ARCHIVE);
        write_unit_archive(
            &archive,
            &[
                ("com/example/Bar.java".to_string(), b"class Bar {}".to_vec()),
                ("com/example/Foo.java".to_string(), b"class Foo {}".to_vec()),
                ("META-INF/MANIFEST.MF".to_string(), b"Manifest-Version: 1.0\n".to_vec()),
            ],
        )
        .unwrap();

        let outputs = read_outputs(&archive, "com/example/Foo").unwrap();
        let names: Vec<&str> = outputs.iter().map(|o| o.qualified_name.as_str()).collect();
        assert_eq!(names, vec!["com/example/Foo", "com/example/Bar"]);
        assert_eq!(outputs[0].entry_name, "com/example/Foo.java");
        assert_eq!(outputs[0].content, "class Foo {}");
        assert_eq!(outputs[0].mapping, None);

        assert!(read_outputs(&dir.path().join("absent.jar"), "Foo").unwrap().is_empty());
    }

    #[test]
    fn test_line_mapping_extra_field() {
        let extra = [0x46, 0x46, 0x00, 0x09, 0x01, 0x00, 0x0c, 0x00, 0x05, 0x01, 0x00, 0x00, 0x06];
        assert_eq!(line_mapping(&extra), Some(vec![12, 5, 256, 6]));

        let mut other_tag = extra;
        other_tag[0] = 0x55;
        assert_eq!(line_mapping(&other_tag), None);
        assert_eq!(line_mapping(&extra[..7]), None);
        assert_eq!(line_mapping(&extra[..3]), None);
    }

    #[derive(Default)]
    struct RecordingLogger {
        events: Mutex<Vec<String>>,
    }

    impl EngineLogger for RecordingLogger {
        fn write_message(&self, severity: Severity, message: &str) {
            self.events.lock().unwrap().push(format!("{:?} {}", severity, message));
        }

        fn write_failure(&self, severity: Severity, message: &str, cause: &Throwable) -> Result<(), EngineError> {
            self.events
                .lock()
                .unwrap()
                .push(format!("{:?} {} <{}>", severity, message, cause.class_name));
            if severity == Severity::Error {
                return Err(EngineError::Internal {
                    message: message.to_string(),
                    cause: Some(cause.clone()),
                });
            }
            Ok(())
        }

        fn start_reading_class(&self, class_name: &str) {
            self.events.lock().unwrap().push(format!("start {}", class_name));
        }

        fn end_reading_class(&self) {
            self.events.lock().unwrap().push("end".to_string());
        }
    }

    #[test]
    fn test_parser_maps_console_output_to_callbacks() {
        let logger = RecordingLogger::default();
        let mut parser = OutputParser::new(&logger);
        for line in [
            "INFO:  Decompiling class com/example/Foo",
            "WARN:  Method could not be decompiled",
            "java.lang.IllegalStateException: stack underflow",
            "\tat org.jetbrains.java.decompiler.Foo.bar(Foo.java:10)",
            "\t... 3 more",
            "TRACE: verbose",
            "INFO:  ... done",
            "plain output",
        ] {
            parser.line(line).unwrap();
        }
        parser.finish().unwrap();

        let events = logger.events.lock().unwrap().clone();
        assert_eq!(
            events,
            vec![
                "start com/example/Foo",
                "Warn Method could not be decompiled <java.lang.IllegalStateException>",
                "Trace verbose",
                "end",
            ]
        );
    }

    #[test]
    fn test_error_with_io_trace_is_wrapped_io() {
        let logger = RecordingLogger::default();
        let mut parser = OutputParser::new(&logger);
        parser.line("ERROR: Failed to read input").unwrap();
        let err = parser.line("java.io.UncheckedIOException: java.io.IOException: closed").unwrap_err();
        assert!(err.is_wrapped_io());
    }

    #[test]
    fn test_error_without_trace_is_logged() {
        let logger = RecordingLogger::default();
        let mut parser = OutputParser::new(&logger);
        parser.line("ERROR: something odd").unwrap();
        parser.line("INFO:  next").unwrap();
        let events = logger.events.lock().unwrap().clone();
        assert_eq!(events, vec!["Error something odd", "Info next"]);
    }

    #[test]
    fn test_parse_throwable() {
        let t = parse_throwable("java.io.IOException: Stream closed").unwrap();
        assert_eq!(t.class_name, "java.io.IOException");
        assert_eq!(t.message, "Stream closed");
        assert_eq!(parse_throwable("java.lang.InterruptedException").unwrap().message, "");
        assert!(parse_throwable("Decompiling class foo").is_none());
        assert!(parse_throwable("INFO: x").is_none());
    }

    #[test]
    fn test_split_severity() {
        assert_eq!(split_severity("INFO:  hello"), Some((Severity::Info, "hello")));
        assert_eq!(split_severity("ERROR: bad"), Some((Severity::Error, "bad")));
        assert_eq!(split_severity("note: x"), None);
    }
}
