//! `Toolkit` backed by external command-line programs.
//!
//! Each invocation runs with a cleared environment (only `PATH` and `LC_ALL`),
//! no stdin, captured output and a wall-clock limit. The child is spawned with
//! `kill_on_drop`, so abandoning the future on timeout also kills the process.
//!
//! License: MIT OR APACHE 2.0

use async_trait::async_trait;
use log::debug;
use std::collections::HashSet;
use std::ffi::{OsStr, OsString};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::config::ToolsConfig;
use crate::errors::{MediaSanError, ToolError};
use crate::tools::Toolkit;

/// Captured stderr is cut to this many bytes before it lands in a report.
const MAX_STDERR_LEN: usize = 512;

/// Elements the structural editor deletes, compared lowercased.
const FORBIDDEN_ELEMENTS: [&str; 5] = ["script", "foreignobject", "iframe", "object", "embed"];

const UPPER: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const LOWER: &str = "abcdefghijklmnopqrstuvwxyz";

#[derive(Debug, Clone)]
pub struct CommandToolkit {
    tools: ToolsConfig,
    invocation_timeout: Duration,
}

impl CommandToolkit {
    pub fn new(tools: ToolsConfig, invocation_timeout: Duration) -> Self {
        Self {
            tools,
            invocation_timeout,
        }
    }

    /// Runs `program` and returns its stdout.
    async fn run<I, S>(&self, program: &str, args: I) -> Result<Vec<u8>, ToolError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(program);
        cmd.args(args)
            .env_clear()
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(path) = std::env::var_os("PATH") {
            cmd.env("PATH", path);
        }

        debug!("Running {:?}", cmd.as_std());
        let child = cmd.spawn().map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ToolError::Unavailable(program.to_string()),
            _ => ToolError::Io {
                program: program.to_string(),
                source: e,
            },
        })?;

        let output = match tokio::time::timeout(self.invocation_timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ToolError::Io {
                program: program.to_string(),
                source: e,
            })?,
            Err(_) => {
                return Err(ToolError::TimedOut {
                    program: program.to_string(),
                    timeout: self.invocation_timeout,
                })
            }
        };

        if !output.status.success() {
            return Err(ToolError::NonZeroExit {
                program: program.to_string(),
                code: output.status.code(),
                stderr: clip_stderr(&output.stderr),
            });
        }
        Ok(output.stdout)
    }
}

#[async_trait]
impl Toolkit for CommandToolkit {
    fn preflight(&self) -> Result<(), MediaSanError> {
        let mut checked = HashSet::new();
        for (role, program) in self.tools.bindings() {
            if !checked.insert(program) {
                continue;
            }
            match resolve_program(program) {
                Some(found) => debug!("Tool '{}' ({}) resolved to {}", program, role, found.display()),
                None => {
                    return Err(MediaSanError::ToolUnavailable {
                        program: program.to_string(),
                        role: role.to_string(),
                    })
                }
            }
        }
        Ok(())
    }

    async fn re_encode(&self, input: &Path, output: &Path, quality: u8) -> Result<(), ToolError> {
        let args: Vec<OsString> = vec![
            input.into(),
            "-strip".into(),
            "-define".into(),
            "png:exclude-chunks=date,time".into(),
            "-quality".into(),
            quality.to_string().into(),
            escape_percent(output),
        ];
        self.run(&self.tools.image_encoder, args).await.map(|_| ())
    }

    async fn strip_metadata(&self, path: &Path) -> Result<(), ToolError> {
        let args: Vec<OsString> = vec!["-all=".into(), "-overwrite_original".into(), "-q".into(), path.into()];
        self.run(&self.tools.metadata_stripper, args).await.map(|_| ())
    }

    async fn structural_edit(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        let mut args: Vec<OsString> = vec!["ed".into()];
        for xpath in structural_deletions() {
            args.push("-d".into());
            args.push(xpath.into());
        }
        args.push(input.into());
        let edited = self.run(&self.tools.xml_editor, args).await?;
        write_output(&self.tools.xml_editor, output, &edited).await
    }

    async fn flatten(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        let mut out_arg = OsString::from("-sOutputFile=");
        out_arg.push(escape_percent(output));
        let args: Vec<OsString> = vec![
            "-dSAFER".into(),
            "-dBATCH".into(),
            "-dNOPAUSE".into(),
            "-dQUIET".into(),
            "-dNOINTERPOLATE".into(),
            "-dPrinted".into(),
            "-sDEVICE=pdfwrite".into(),
            "-sColorConversionStrategy=RGB".into(),
            "-dProcessColorModel=/DeviceRGB".into(),
            "-dCompatibilityLevel=1.4".into(),
            out_arg,
            input.into(),
        ];
        self.run(&self.tools.document_converter, args).await.map(|_| ())
    }

    async fn extract_metadata(&self, path: &Path) -> Result<String, ToolError> {
        let args: Vec<OsString> = vec![
            "-s".into(),
            "-a".into(),
            "-EXIF:all".into(),
            "-GPS:all".into(),
            "-XMP:all".into(),
            "-IPTC:all".into(),
            path.into(),
        ];
        let out = self.run(&self.tools.metadata_extractor, args).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }

    async fn extract_strings(&self, path: &Path) -> Result<String, ToolError> {
        // Three-byte runs keep short PDF names such as `/JS` and `/AA`.
        let args: Vec<OsString> = vec!["-a".into(), "-n".into(), "3".into(), path.into()];
        let out = self.run(&self.tools.string_extractor, args).await?;
        Ok(String::from_utf8_lossy(&out).into_owned())
    }
}

/// XPath deletions handed to the XML editor. Names are matched on
/// `local-name()` so prefixed and default-namespaced SVG both match.
pub fn structural_deletions() -> Vec<String> {
    let lname = format!("translate(local-name(),'{UPPER}','{LOWER}')");
    let elements = FORBIDDEN_ELEMENTS
        .iter()
        .map(|name| format!("{lname}='{name}'"))
        .collect::<Vec<_>>()
        .join(" or ");
    vec![
        format!("//*[{elements}]"),
        format!("//@*[starts-with({lname},'on')]"),
        "//@*[contains(translate(.,'JAVSCRIPT','javscript'),'javascript:')]".to_string(),
    ]
}

/// Looks `program` up the way the shell would: as a path when it contains a
/// separator, otherwise on `PATH`.
pub fn resolve_program(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return candidate.is_file().then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path)
        .map(|dir| dir.join(program))
        .find(|full| full.is_file())
}

/// Ghostscript and ImageMagick expand `%` in output file names as a
/// page or scene template.
fn escape_percent(path: &Path) -> OsString {
    let s = path.to_string_lossy();
    if s.contains('%') {
        OsString::from(s.replace('%', "%%"))
    } else {
        path.as_os_str().to_os_string()
    }
}

async fn write_output(program: &str, output: &Path, bytes: &[u8]) -> Result<(), ToolError> {
    tokio::fs::write(output, bytes).await.map_err(|e| ToolError::Io {
        program: program.to_string(),
        source: e,
    })
}

fn clip_stderr(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let text = text.trim();
    if text.len() <= MAX_STDERR_LEN {
        return text.to_string();
    }
    let mut end = MAX_STDERR_LEN;
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deletions_cover_every_forbidden_element() {
        let xpaths = structural_deletions();
        assert_eq!(xpaths.len(), 3);
        for name in FORBIDDEN_ELEMENTS {
            assert!(xpaths[0].contains(&format!("='{name}'")), "{name}");
        }
        assert!(xpaths[1].starts_with("//@*[starts-with("));
    }

    #[test]
    fn missing_programs_fail_preflight() {
        let toolkit = CommandToolkit::new(
            ToolsConfig::uniform("mediasan-definitely-missing-tool"),
            Duration::from_secs(1),
        );
        match toolkit.preflight() {
            Err(MediaSanError::ToolUnavailable { program, .. }) => {
                assert_eq!(program, "mediasan-definitely-missing-tool")
            }
            other => panic!("expected ToolUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn output_paths_escape_percent() {
        assert_eq!(escape_percent(Path::new("/tmp/100%.pdf")), OsString::from("/tmp/100%%.pdf"));
        assert_eq!(escape_percent(Path::new("/tmp/a%d.png")), OsString::from("/tmp/a%%d.png"));
        assert_eq!(escape_percent(Path::new("/tmp/a.pdf")), OsString::from("/tmp/a.pdf"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn re_encode_escapes_percent_in_output_name() {
        let dir = tempfile::tempdir().unwrap();
        let recorded = dir.path().join("argv.txt");
        // With `sh` as the encoder the input file is run as a script.
        let input = dir.path().join("record.sh");
        std::fs::write(&input, format!("printf '%s\\n' \"$@\" > '{}'\n", recorded.display())).unwrap();
        let mut tools = ToolsConfig::default();
        tools.image_encoder = "sh".to_string();
        let toolkit = CommandToolkit::new(tools, Duration::from_secs(10));

        toolkit.re_encode(&input, &dir.path().join("scan%d.png"), 85).await.unwrap();

        let argv = std::fs::read_to_string(&recorded).unwrap();
        let last = argv.lines().last().unwrap();
        assert!(last.ends_with("scan%%d.png"), "{argv}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn short_pdf_names_reach_the_document_predicates() {
        use crate::predicates::SafetyPredicates;
        use crate::verifier::Verifier;
        use crate::MediaKind;

        if resolve_program("strings").is_none() {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let pdf = dir.path().join("actions.pdf");
        std::fs::write(&pdf, "%PDF-1.4\n1 0 obj\n<<\n/AA\n<< /O 2 0 R >>\n/JS\n(x)\n>>\nendobj\n").unwrap();
        let toolkit = CommandToolkit::new(ToolsConfig::default(), Duration::from_secs(10));
        let verifier = Verifier::new(SafetyPredicates::builtin().unwrap());

        let verdict = verifier.verify(MediaKind::Document, &pdf, &toolkit).await;

        assert!(!verdict.safe);
        let rules: Vec<&str> = verdict.violations.iter().map(|v| v.rule.as_str()).collect();
        assert!(rules.contains(&"pdf_additional_actions"), "{rules:?}");
        assert!(rules.contains(&"pdf_js_key"), "{rules:?}");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn nonzero_exit_is_reported() {
        let toolkit = CommandToolkit::new(ToolsConfig::uniform("false"), Duration::from_secs(5));
        let err = toolkit.extract_strings(Path::new("/dev/null")).await.unwrap_err();
        assert!(matches!(err, ToolError::NonZeroExit { code: Some(1), .. }), "{err:?}");
    }
}
