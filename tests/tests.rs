use std::fs;
use std::path::Path;
use tempfile::TempDir;
use compiler_release::manifest::{ReleaseManifest, MANIFEST_FILE};

const NAME: &str = "google-closure-compiler";

fn write_package(dir: &Path, name: &str, version: &str, dependencies: &[(&str, &str)]) {
    fs::create_dir_all(dir).unwrap();
    let deps = dependencies
        .iter()
        .map(|(dep, range)| format!("    \"{dep}\": \"{range}\""))
        .collect::<Vec<_>>()
        .join(",\n");
    let body = if deps.is_empty() {
        format!("{{\n  \"name\": \"{name}\",\n  \"version\": \"{version}\",\n  \"license\": \"Apache-2.0\"\n}}\n")
    } else {
        format!(
            "{{\n  \"name\": \"{name}\",\n  \"version\": \"{version}\",\n  \"license\": \"Apache-2.0\",\n  \"dependencies\": {{\n{deps}\n  }}\n}}\n"
        )
    };
    fs::write(dir.join("package.json"), body).unwrap();
}

/// A repository with the default package layout, every package at `version`.
fn setup_tests(version: &str) -> (TempDir, ReleaseManifest) {
    let temp_dir = TempDir::new().unwrap();
    let root = temp_dir.path();
    let manifest = ReleaseManifest::default(NAME);
    manifest.save(root.join(MANIFEST_FILE)).unwrap();

    write_package(root, "closure-compiler-npm", "1.0.0", &[("google-closure-compiler-java", "^20200517.0.0")]);
    let java = format!("{NAME}-java");
    let linux = format!("{NAME}-linux");
    for package in &manifest.packages {
        let name = package.dir.file_name().unwrap().to_string_lossy().to_string();
        let deps: Vec<(&str, &str)> = if name == NAME {
            vec![(java.as_str(), version), (linux.as_str(), version)]
        } else {
            Vec::new()
        };
        write_package(&root.join(&package.dir), &name, version, &deps);
    }
    (temp_dir, manifest)
}

#[cfg(test)]
mod tests {
    use std::fs;
    use semver::Version;
    use compiler_release::descriptor::PackageDescriptor;
    use compiler_release::manifest::PinStyle;
    use compiler_release::stage::{default_plan, stage_artifacts};
    use compiler_release::versions::reference_major;
    use compiler_release::{host_platform, VersionSynchronizer};
    use crate::{setup_tests, write_package, NAME};

    #[test]
    fn test_reference_major() {
        let (dir, manifest) = setup_tests("20200517.0.0");
        assert_eq!(reference_major(dir.path(), &manifest.reference).unwrap(), 20200517);
    }

    #[test]
    fn test_patch_bump_after_release() {
        let (dir, manifest) = setup_tests("20200517.0.0");
        let released = Version::parse("20200517.0.0").unwrap();
        let sync = VersionSynchronizer::new(manifest.descriptor_paths(dir.path()), PinStyle::Exact);

        let outcome = sync.synchronize_versions(20200517, Some(&released)).unwrap();
        assert_eq!(outcome.version, Version::parse("20200517.0.1").unwrap());
        assert_eq!(outcome.written.len(), manifest.packages.len());
        assert_eq!(outcome.tag(), "v20200517.0.1");

        for path in manifest.descriptor_paths(dir.path()) {
            let descriptor = PackageDescriptor::load(&path).unwrap();
            assert_eq!(descriptor.version, outcome.version);
        }
    }

    #[test]
    fn test_second_run_changes_nothing() {
        let (dir, manifest) = setup_tests("20200517.0.0");
        let released = Version::parse("20200517.0.0").unwrap();
        let paths = manifest.descriptor_paths(dir.path());
        let sync = VersionSynchronizer::new(paths.clone(), PinStyle::Exact);
        sync.synchronize_versions(20200517, Some(&released)).unwrap();

        let before: Vec<String> = paths.iter().map(|p| fs::read_to_string(p).unwrap()).collect();
        let outcome = sync.synchronize_versions(20200517, Some(&released)).unwrap();
        let after: Vec<String> = paths.iter().map(|p| fs::read_to_string(p).unwrap()).collect();

        assert!(outcome.written.is_empty());
        assert_eq!(outcome.version, Version::parse("20200517.0.1").unwrap());
        assert_eq!(before, after);
    }

    #[test]
    fn test_new_reference_major_resets_versions() {
        let (dir, manifest) = setup_tests("20200101.3.2");
        let sync = VersionSynchronizer::new(manifest.descriptor_paths(dir.path()), PinStyle::Exact);
        let outcome = sync.synchronize_versions(20200517, None).unwrap();
        assert_eq!(outcome.version, Version::new(20200517, 0, 0));
    }

    #[test]
    fn test_dependencies_are_pinned_to_agreed_version() {
        let (dir, manifest) = setup_tests("20200101.0.0");
        let sync = VersionSynchronizer::new(manifest.descriptor_paths(dir.path()), PinStyle::Exact);
        sync.synchronize_versions(20200517, None).unwrap();

        let main = PackageDescriptor::load(dir.path().join("packages").join(NAME).join("package.json")).unwrap();
        assert_eq!(main.dependency(&format!("{NAME}-java")), Some("20200517.0.0"));
        assert_eq!(main.dependency(&format!("{NAME}-linux")), Some("20200517.0.0"));

        let content = fs::read_to_string(dir.path().join("packages").join(NAME).join("package.json")).unwrap();
        assert!(content.contains("\"license\": \"Apache-2.0\""));
        assert!(content.find("\"name\"").unwrap() < content.find("\"version\"").unwrap());
    }

    #[test]
    fn test_caret_pin() {
        let (dir, manifest) = setup_tests("20200101.0.0");
        let sync = VersionSynchronizer::new(manifest.descriptor_paths(dir.path()), PinStyle::Caret);
        sync.synchronize_versions(20200517, None).unwrap();
        let main = PackageDescriptor::load(dir.path().join("packages").join(NAME).join("package.json")).unwrap();
        assert_eq!(main.dependency(&format!("{NAME}-java")), Some("^20200517.0.0"));
    }

    #[test]
    fn test_malformed_version_writes_nothing() {
        let (dir, manifest) = setup_tests("20200101.0.0");
        let windows = dir.path().join("packages").join(format!("{NAME}-windows"));
        write_package(&windows, &format!("{NAME}-windows"), "twenty", &[]);

        let paths = manifest.descriptor_paths(dir.path());
        let before: Vec<String> = paths.iter().map(|p| fs::read_to_string(p).unwrap()).collect();
        let sync = VersionSynchronizer::new(paths.clone(), PinStyle::Exact);
        let err = sync.synchronize_versions(20200517, None).unwrap_err();
        assert!(err.to_string().contains("twenty"));

        let after: Vec<String> = paths.iter().map(|p| fs::read_to_string(p).unwrap()).collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_stage_copies_jar_into_packages() {
        let (dir, manifest) = setup_tests("20200517.0.0");
        let root = dir.path();
        let platform = host_platform().unwrap();
        let jar = root.join(&manifest.build.intermediate);
        fs::create_dir_all(jar.parent().unwrap()).unwrap();
        fs::write(&jar, b"jar bytes").unwrap();

        let plan = default_plan(&manifest, &platform, root).unwrap();
        let written = stage_artifacts(&plan, 2).unwrap();
        assert_eq!(written.len(), 2);

        let java = root.join("packages").join(format!("{NAME}-java")).join("compiler.jar");
        let native = root.join(&manifest.platform_package(&platform).unwrap().dir).join("compiler.jar");
        assert_eq!(fs::read(java).unwrap(), b"jar bytes");
        assert_eq!(fs::read(native).unwrap(), b"jar bytes");
    }

    #[test]
    fn test_stage_without_jar_copies_nothing() {
        let (dir, manifest) = setup_tests("20200517.0.0");
        let platform = host_platform().unwrap();
        let plan = default_plan(&manifest, &platform, dir.path()).unwrap();
        assert!(stage_artifacts(&plan, 2).is_err());
        assert!(!dir.path().join("packages").join(format!("{NAME}-java")).join("compiler.jar").exists());
    }
}
