// ─── Processor Runner ───
// Runs install processors one at a time with captured output.

use std::collections::BTreeMap;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, info, warn};

use super::forge_profile::Processor;
use crate::core::cancel::CancellationToken;
use crate::core::error::{LauncherError, LauncherResult};

/// Captured output of one processor run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessorLog {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    /// `None` when the process was killed by a signal.
    pub exit_code: Option<i32>,
}

/// Logs keyed by `<jarPath>-<index>`.
#[derive(Debug, Clone, Default)]
pub struct ProcessorLogs {
    pub outputs: BTreeMap<String, ProcessorLog>,
    /// Only processors that wrote to stderr.
    pub errors: BTreeMap<String, Vec<String>>,
}

impl ProcessorLogs {
    pub fn all_clean(&self) -> bool {
        self.errors.is_empty() && self.outputs.values().all(|log| log.exit_code == Some(0))
    }
}

/// Platform-specific Java classpath separator.
pub fn get_classpath_separator() -> &'static str {
    if cfg!(target_os = "windows") {
        ";"
    } else {
        ":"
    }
}

pub struct ProcessorRunner<'a> {
    java_path: &'a Path,
    game_root: &'a Path,
    libraries_dir: PathBuf,
}

impl<'a> ProcessorRunner<'a> {
    pub fn new(java_path: &'a Path, game_root: &'a Path) -> Self {
        Self {
            java_path,
            game_root,
            libraries_dir: game_root.join("libraries"),
        }
    }

    /// Run `processors` strictly in order.
    ///
    /// A processor's exit code is recorded but does not stop the run.
    /// `on_progress(done, total)` fires after each processor.
    pub fn run<P>(
        &self,
        processors: &[Processor],
        cancellation: &CancellationToken,
        on_progress: P,
    ) -> LauncherResult<ProcessorLogs>
    where
        P: Fn(usize, usize),
    {
        let total = processors.len();
        let mut logs = ProcessorLogs::default();

        for (index, processor) in processors.iter().enumerate() {
            cancellation.check()?;

            let jar_path = processor.jar.library_path(&self.libraries_dir);
            let main_class = read_main_class_from_jar(&jar_path)?;
            let classpath = self.classpath_for(&jar_path, processor);

            info!(
                "Running processor {} ({}/{}) with main class {}",
                processor.jar,
                index + 1,
                total,
                main_class
            );

            let log = self.spawn(&classpath, &main_class, &processor.args)?;
            if log.exit_code != Some(0) {
                warn!(
                    "Processor {} exited with {:?}",
                    processor.jar, log.exit_code
                );
            }

            let key = format!("{}-{}", jar_path.to_string_lossy(), index);
            if !log.stderr.is_empty() {
                logs.errors.insert(key.clone(), log.stderr.clone());
            }
            logs.outputs.insert(key, log);

            on_progress(index + 1, total);
        }

        Ok(logs)
    }

    fn classpath_for(&self, jar_path: &Path, processor: &Processor) -> String {
        std::iter::once(jar_path.to_path_buf())
            .chain(
                processor
                    .classpath
                    .iter()
                    .map(|artifact| artifact.library_path(&self.libraries_dir)),
            )
            .map(|path| path.to_string_lossy().to_string())
            .collect::<Vec<_>>()
            .join(get_classpath_separator())
    }

    fn spawn(&self, classpath: &str, main_class: &str, args: &[String]) -> LauncherResult<ProcessorLog> {
        let mut cmd = Command::new(self.java_path);
        cmd.arg("-cp")
            .arg(classpath)
            .arg(main_class)
            .args(args)
            .current_dir(self.game_root)
            .stdin(Stdio::null());
        debug!("Command: {:?}", cmd);

        let output = cmd
            .output()
            .map_err(|e| LauncherError::JavaExecution(format!("{:?}: {}", self.java_path, e)))?;

        Ok(ProcessorLog {
            stdout: collect_lines(&output.stdout),
            stderr: collect_lines(&output.stderr),
            exit_code: output.status.code(),
        })
    }
}

fn collect_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// Open the processor jar and look up its declared entry point.
pub fn read_main_class_from_jar(path: &Path) -> LauncherResult<String> {
    let file = std::fs::File::open(path).map_err(|e| LauncherError::io(path, e))?;
    let mut archive = zip::ZipArchive::new(file)?;

    let text = match archive.by_name("META-INF/MANIFEST.MF") {
        Ok(mut entry) => {
            let mut text = String::new();
            entry.read_to_string(&mut text)?;
            text
        }
        Err(e) => {
            return Err(LauncherError::ProcessorManifest {
                jar: path.to_path_buf(),
                reason: e.to_string(),
            })
        }
    };

    main_section_attributes(&text)
        .remove("Main-Class")
        .filter(|class| !class.is_empty())
        .ok_or_else(|| LauncherError::ProcessorManifest {
            jar: path.to_path_buf(),
            reason: "Main-Class missing".into(),
        })
}

/// Attributes of the manifest's main section, with wrapped values unfolded.
///
/// A line starting with a single space continues the previous value; the main
/// section ends at the first blank line.
fn main_section_attributes(manifest: &str) -> BTreeMap<String, String> {
    let mut unfolded: Vec<String> = Vec::new();
    for line in manifest.lines() {
        if line.is_empty() {
            break;
        }
        match (line.strip_prefix(' '), unfolded.last_mut()) {
            (Some(rest), Some(previous)) => previous.push_str(rest),
            _ => unfolded.push(line.to_string()),
        }
    }

    unfolded
        .iter()
        .filter_map(|line| line.split_once(':'))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::core::maven::MavenArtifact;
    use crate::core::testing::write_zip;

    pub(crate) const MANIFEST: &[u8] =
        b"Manifest-Version: 1.0\r\nMain-Class: net.minecraftforge.binarypatcher.Con\r\n sole\r\n\r\n";

    /// A shell script standing in for `java`: echoes the main class and
    /// arguments to stdout and writes one line to stderr when asked.
    #[cfg(unix)]
    pub(crate) fn fake_java(dir: &Path) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;

        let path = dir.join("fake-java");
        std::fs::write(
            &path,
            "#!/bin/sh\nshift 2\necho \"main=$1\"\nshift\necho \"args=$*\"\ncase \"$*\" in *--fail*) echo boom 1>&2; exit 3;; esac\nexit 0\n",
        )
        .unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn processor(jar: &str, args: &[&str]) -> Processor {
        Processor {
            jar: MavenArtifact::parse(jar).unwrap(),
            classpath: vec![MavenArtifact::parse("commons-io:commons-io:2.4").unwrap()],
            args: args.iter().map(|a| a.to_string()).collect(),
            outputs: BTreeMap::new(),
            sides: None,
        }
    }

    #[test]
    fn reads_main_class_with_continuation_line() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("patcher.jar");
        write_zip(&jar, &[("META-INF/MANIFEST.MF", MANIFEST)]);

        assert_eq!(
            read_main_class_from_jar(&jar).unwrap(),
            "net.minecraftforge.binarypatcher.Console"
        );
    }

    #[test]
    fn only_main_section_attributes_are_read() {
        let manifest = "Manifest-Version: 1.0\r\nMain-Class: a.b.Lo\r\n ng\r\nCreated-By: x\r\n\r\nName: a/b/\r\nMain-Class: other.Entry\r\n";
        let attributes = main_section_attributes(manifest);

        assert_eq!(attributes["Main-Class"], "a.b.Long");
        assert_eq!(attributes["Created-By"], "x");
        assert!(!attributes.contains_key("Name"));
    }

    #[test]
    fn missing_manifest_is_a_manifest_error() {
        let dir = tempfile::tempdir().unwrap();
        let jar = dir.path().join("empty.jar");
        write_zip(&jar, &[("readme.txt", b"hi")]);

        assert!(matches!(
            read_main_class_from_jar(&jar),
            Err(LauncherError::ProcessorManifest { .. })
        ));

        let no_main = dir.path().join("no-main.jar");
        write_zip(&no_main, &[("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\r\n")]);
        assert!(matches!(
            read_main_class_from_jar(&no_main),
            Err(LauncherError::ProcessorManifest { .. })
        ));
    }

    #[test]
    fn classpath_starts_with_processor_jar() {
        let root = Path::new("/games/mc");
        let runner = ProcessorRunner::new(Path::new("java"), root);
        let p = processor("net.minecraftforge:binarypatcher:1.1.1", &[]);
        let jar = p.jar.library_path(&root.join("libraries"));

        let classpath = runner.classpath_for(&jar, &p);
        let parts: Vec<_> = classpath.split(get_classpath_separator()).collect();
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0], jar.to_string_lossy());
        assert!(parts[1].ends_with("commons-io-2.4.jar"));
    }

    #[cfg(unix)]
    #[test]
    fn runs_in_order_and_records_failures_without_stopping() {
        let root = tempfile::tempdir().unwrap();
        let java = fake_java(root.path());
        let libs = root.path().join("libraries");

        let first = processor("net.example:first:1.0", &["--in", "a"]);
        let second = processor("net.example:second:1.0", &["--fail"]);
        for p in [&first, &second] {
            write_zip(&p.jar.library_path(&libs), &[("META-INF/MANIFEST.MF", MANIFEST)]);
        }

        let progress = std::cell::RefCell::new(Vec::new());
        let logs = ProcessorRunner::new(&java, root.path())
            .run(
                &[first.clone(), second.clone()],
                &CancellationToken::new(),
                |done, total| progress.borrow_mut().push((done, total)),
            )
            .unwrap();

        assert_eq!(progress.into_inner(), vec![(1, 2), (2, 2)]);
        assert_eq!(logs.outputs.len(), 2);

        let first_key = format!("{}-0", first.jar.library_path(&libs).to_string_lossy());
        let first_log = &logs.outputs[&first_key];
        assert_eq!(
            first_log.stdout,
            vec!["main=net.minecraftforge.binarypatcher.Console", "args=--in a"]
        );
        assert_eq!(first_log.exit_code, Some(0));

        let second_key = format!("{}-1", second.jar.library_path(&libs).to_string_lossy());
        assert_eq!(logs.outputs[&second_key].exit_code, Some(3));
        assert_eq!(logs.errors.len(), 1);
        assert_eq!(logs.errors[&second_key], vec!["boom"]);
        assert!(!logs.all_clean());
    }
}
