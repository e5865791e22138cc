use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Command;
use colored::Colorize;
use tracing::info;
use crate::error::VerifyError;

/// A value of a named compiler option.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OptionValue {
    /// `--name`; `false` drops the flag.
    Flag(bool),
    /// `--name=value`
    Value(String),
    /// `--name=a --name=b`
    List(Vec<String>),
}

/// Arguments for one compiler run, in either accepted shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompilerArgs {
    NamedOptions(BTreeMap<String, OptionValue>),
    PositionalArguments(Vec<String>),
}

impl CompilerArgs {
    /// The argument vector handed to the process.
    pub fn resolve(&self) -> Vec<String> {
        match self {
            CompilerArgs::PositionalArguments(args) => args.clone(),
            CompilerArgs::NamedOptions(options) => {
                let mut args = Vec::new();
                for (name, value) in options {
                    match value {
                        OptionValue::Flag(true) => args.push(format!("--{name}")),
                        OptionValue::Flag(false) => {}
                        OptionValue::Value(value) => args.push(format!("--{name}={value}")),
                        OptionValue::List(values) => {
                            args.extend(values.iter().map(|value| format!("--{name}={value}")))
                        }
                    }
                }
                args
            }
        }
    }

    pub fn flag(name: &str) -> Self {
        CompilerArgs::NamedOptions(BTreeMap::from([(name.to_string(), OptionValue::Flag(true))]))
    }
}

/// Runs `binary` with `args`, output going to the terminal.
pub fn run_compiler(binary: &Path, args: &CompilerArgs) -> Result<(), VerifyError> {
    let args = args.resolve();
    let status = Command::new(binary)
        .args(&args)
        .status()
        .map_err(|source| VerifyError::Spawn { program: binary.to_path_buf(), source })?;
    if !status.success() {
        return Err(VerifyError::Execution {
            binary: binary.to_path_buf(),
            args: args.join(" "),
            status: status.to_string(),
        });
    }
    Ok(())
}

fn check(message: &str) {
    println!("  {} {}", "✓".green(), message.dimmed());
}

/// Checks the staged artifacts of a release.
///
/// The jar only has to exist. The native binary has to exist and answer
/// `--version` and `--help`.
pub fn verify_release(jar: Option<&Path>, native: &Path) -> Result<(), VerifyError> {
    if let Some(jar) = jar {
        if !jar.is_file() {
            return Err(VerifyError::Missing(jar.to_path_buf()));
        }
        check("compiler jar exists");
    }
    if !native.is_file() {
        return Err(VerifyError::Missing(native.to_path_buf()));
    }
    check("compiler binary exists");

    run_compiler(native, &CompilerArgs::flag("version"))?;
    check("compiler version successfully reported");
    run_compiler(native, &CompilerArgs::flag("help"))?;
    check("compiler help successfully reported");
    info!("Verified {}", native.display());
    Ok(())
}

/// Location of the jar inside the java package.
pub fn jar_path(package_dir: &Path) -> PathBuf {
    package_dir.join("compiler.jar")
}
