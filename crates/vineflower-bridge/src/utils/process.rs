#[cfg(windows)]
use std::os::windows::process::CommandExt;

/// Environment variables through which a host could leak classpath entries
/// or agents into a child JVM.
pub const LEAKY_JVM_ENV: &[&str] = &[
    "CLASSPATH",
    "JAVA_TOOL_OPTIONS",
    "_JAVA_OPTIONS",
    "JDK_JAVA_OPTIONS",
];

/// Extension trait for engine process execution.
pub trait EngineCommandExt {
    /// Hides the console window on Windows. No-op on other platforms.
    fn suppress_console(&mut self) -> &mut Self;

    /// Strips variables that would let the host's JVM setup reach the child.
    fn isolate_jvm_env(&mut self) -> &mut Self;
}

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

impl EngineCommandExt for std::process::Command {
    fn suppress_console(&mut self) -> &mut Self {
        #[cfg(windows)]
        {
            self.creation_flags(CREATE_NO_WINDOW);
        }
        self
    }

    fn isolate_jvm_env(&mut self) -> &mut Self {
        for var in LEAKY_JVM_ENV {
            self.env_remove(var);
        }
        self
    }
}
