//! Turning `compiler.jar` into a standalone executable with `native-image`.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use tracing::{debug, info};
use crate::error::BuildError;
use crate::platform::Platform;
use crate::toolchain::ToolchainInstallation;

/// Name of the produced executable, without extension.
pub const IMAGE_NAME: &str = "compiler";

const RESOURCE_BUNDLES: [&str; 4] = [
    "com.google.javascript.rhino.Messages",
    "org.kohsuke.args4j.Messages",
    "org.kohsuke.args4j.spi.Messages",
    "com.google.javascript.jscomp.parsing.ParserConfig",
];

const HELLO_WORLD: &str = r#"public class HelloWorld {
    public static void main(String[] args) {
        System.out.println("Hello, World!");
    }
}
"#;

/// The fixed directives every compiler image is built with, in order.
///
/// The `-jar` argument is appended by [`NativeImageBuilder::build_native_image`].
pub fn default_directives(reflection_config: &Path) -> Vec<String> {
    let mut directives = vec![
        "-H:+JNI".to_string(),
        "--no-server".to_string(),
        "-H:+ReportUnsupportedElementsAtRuntime".to_string(),
    ];
    directives.extend(RESOURCE_BUNDLES.iter().map(|b| format!("-H:IncludeResourceBundles={b}")));
    directives.push(format!("-H:ReflectionConfigurationFiles={}", reflection_config.display()));
    directives.push("-H:IncludeResources=(externs.zip)|(.*(js|txt))".to_string());
    directives.push("-H:+ReportExceptionStackTraces".to_string());
    directives.push("--initialize-at-build-time".to_string());
    directives.push(format!("-H:Name={IMAGE_NAME}"));
    directives
}

/// Caret-escapes characters `cmd.exe` would otherwise interpret.
pub fn escape_for_cmd(arg: &str) -> String {
    let mut escaped = String::with_capacity(arg.len());
    for c in arg.chars() {
        if matches!(c, '^' | '|' | '&' | '<' | '>' | '(' | ')') {
            escaped.push('^');
        }
        escaped.push(c);
    }
    escaped
}

/// Prepares one argument for a batch launcher started through `cmd /C`.
///
/// The line is parsed twice: once by `cmd /C` and again when the launcher
/// expands `%*`. Metacharacters are therefore escaped twice (`|` becomes
/// `^^^|`). Arguments with whitespace are quoted instead, since nothing
/// inside quotes is interpreted by either parse.
pub fn escape_for_batch(arg: &str) -> String {
    if arg.is_empty() || arg.chars().any(char::is_whitespace) {
        format!("\"{arg}\"")
    } else {
        escape_for_cmd(&escape_for_cmd(arg))
    }
}

/// Builds the command for a toolchain launcher.
///
/// Windows launchers are batch files, so they go through `cmd /S /C` with
/// the whole line quoted and each argument escaped by [`escape_for_batch`].
/// Elsewhere the program is run directly.
pub fn tool_command(platform: &Platform, program: &Path, args: &[String]) -> Command {
    if !platform.is_windows() {
        let mut command = Command::new(program);
        command.args(args);
        return command;
    }
    let mut line = format!("\"{}\"", program.display());
    for arg in args {
        line.push(' ');
        line.push_str(&escape_for_batch(arg));
    }
    // `/S` strips exactly the outer pair of quotes, leaving the program's own.
    let line = format!("\"{line}\"");
    let mut command = Command::new("cmd");
    #[cfg(windows)]
    {
        use std::os::windows::process::CommandExt;
        command.raw_arg("/S").raw_arg("/C").raw_arg(line);
    }
    #[cfg(not(windows))]
    command.arg("/S").arg("/C").arg(line);
    command
}

/// Runs `native-image` from an installed toolchain.
pub struct NativeImageBuilder<'a> {
    platform: Platform,
    toolchain: &'a ToolchainInstallation,
}

impl<'a> NativeImageBuilder<'a> {
    pub fn new(platform: Platform, toolchain: &'a ToolchainInstallation) -> Self {
        Self { platform, toolchain }
    }

    fn native_image(&self) -> PathBuf {
        self.toolchain.tool(&self.platform, "native-image")
    }

    /// Compiles, images and runs a hello world program.
    ///
    /// A failure here means the toolchain itself is broken, not the compiler
    /// jar.
    pub fn smoke_test(&self) -> Result<(), BuildError> {
        let failed = |step: &'static str, message: String| BuildError::SmokeTest { step, message };
        let scratch = tempfile::tempdir().map_err(|e| failed("setup", e.to_string()))?;
        let source = scratch.path().join("HelloWorld.java");
        std::fs::write(&source, HELLO_WORLD).map_err(|e| failed("setup", e.to_string()))?;
        info!("Smoke testing toolchain in {}", scratch.path().display());

        let javac = self.toolchain.executable(&self.platform, "javac");
        let status = Command::new(&javac)
            .arg("HelloWorld.java")
            .current_dir(scratch.path())
            .status()
            .map_err(|e| failed("javac", format!("{}: {e}", javac.display())))?;
        if !status.success() {
            return Err(failed("javac", status.to_string()));
        }

        let args = ["--no-server", "-cp", ".", "HelloWorld", "hello"].map(String::from);
        let status = tool_command(&self.platform, &self.native_image(), &args)
            .current_dir(scratch.path())
            .status()
            .map_err(|e| failed("native-image", e.to_string()))?;
        if !status.success() {
            return Err(failed("native-image", status.to_string()));
        }

        let hello = scratch.path().join(self.platform.executable("hello"));
        let output = Command::new(&hello)
            .stderr(Stdio::inherit())
            .output()
            .map_err(|e| failed("run", format!("{}: {e}", hello.display())))?;
        let stdout = String::from_utf8_lossy(&output.stdout);
        if !output.status.success() || !stdout.contains("Hello, World!") {
            return Err(failed("run", format!("{} printed {:?}", output.status, stdout.trim())));
        }
        info!("Toolchain smoke test passed");
        Ok(())
    }

    /// Generates the compiler executable into `output_dir`.
    ///
    /// Runs the smoke test first. Output of both steps goes straight to the
    /// terminal.
    ///
    /// # Errors
    /// [`BuildError::SmokeTest`] when the toolchain is broken,
    /// [`BuildError::NativeImage`] when the image build itself fails.
    pub fn build_native_image(
        &self,
        intermediate_artifact: &Path,
        directives: &[String],
        output_dir: &Path,
    ) -> Result<PathBuf, BuildError> {
        self.smoke_test()?;

        let mut args = directives.to_vec();
        args.push("-jar".to_string());
        args.push(intermediate_artifact.display().to_string());
        debug!("native-image arguments: {:?}", args);

        let program = self.native_image();
        info!("Building native image from {}", intermediate_artifact.display());
        let status = tool_command(&self.platform, &program, &args)
            .current_dir(output_dir)
            .status()
            .map_err(|source| BuildError::Spawn { program: program.clone(), source })?;
        if !status.success() {
            return Err(BuildError::NativeImage(status.to_string()));
        }

        let binary = output_dir.join(self.platform.compiler_binary());
        if !binary.exists() {
            return Err(BuildError::MissingOutput(binary));
        }
        info!("Generated {}", binary.display());
        Ok(binary)
    }
}
