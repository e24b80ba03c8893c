// mediasan-core/tests/common/mod.rs
//! A deterministic `Toolkit` for driving the pipeline without real tools.
//!
//! Fake images are text files whose lines look like metadata listings
//! (`Tag : value`); "extracting metadata" returns the file's text. Every
//! operation's behavior can be switched independently.

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mediasan_core::{MediaSanError, Pipeline, PipelineConfig, ToolError};

pub const CLEAN_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><rect width="10" height="10"/></svg>"#;
pub const CLEAN_PDF: &str = "%PDF-1.4\n% flattened\n1 0 obj << /Type /Page >> endobj\n";
pub const CLEAN_PIXELS: &str = "PIXELS\n";

pub const DIRTY_SVG: &str = r#"<svg xmlns="http://www.w3.org/2000/svg"><script>alert(1)</script><rect/></svg>"#;
pub const DIRTY_PDF: &str = "%PDF-1.4\n1 0 obj << /OpenAction << /S /JavaScript /JS (app.alert(1)) >> >> endobj\n";
pub const DIRTY_IMAGE: &str = "PIXELS\nMake : Canon\nModel : EOS 5D\nGPSLatitude : 51 deg 30' N\nDateTimeOriginal : 2024:01:01 10:00:00\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Behavior {
    /// Produces a clean artifact.
    Clean,
    /// Copies the input unchanged (a tool that "succeeds" but removes nothing).
    Passthrough,
    /// Exits non-zero.
    Fail,
    /// Behaves as if the program could not be spawned.
    Unavailable,
    /// Never finishes.
    Hang,
    /// Succeeds but leaves an empty file.
    Empty,
}

#[derive(Debug)]
pub struct FakeToolkit {
    pub re_encode: Behavior,
    pub strip: Behavior,
    pub structural: Behavior,
    pub flatten: Behavior,
    pub extract: Behavior,
    pub missing_tool: Option<String>,
    pub calls: Mutex<Vec<String>>,
}

impl Default for FakeToolkit {
    fn default() -> Self {
        Self {
            re_encode: Behavior::Clean,
            strip: Behavior::Clean,
            structural: Behavior::Clean,
            flatten: Behavior::Clean,
            extract: Behavior::Clean,
            missing_tool: None,
            calls: Mutex::new(Vec::new()),
        }
    }
}

impl FakeToolkit {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, op: &str) {
        self.calls.lock().unwrap().push(op.to_string());
    }

    async fn transform(
        &self,
        op: &str,
        behavior: Behavior,
        input: &Path,
        output: &Path,
        clean: impl FnOnce(&str) -> String,
    ) -> Result<(), ToolError> {
        self.record(op);
        match behavior {
            Behavior::Clean => {
                let text = String::from_utf8_lossy(&std::fs::read(input).map_err(|e| io(op, e))?).into_owned();
                std::fs::write(output, clean(&text)).map_err(|e| io(op, e))
            }
            Behavior::Passthrough => {
                if input != output {
                    std::fs::copy(input, output).map_err(|e| io(op, e))?;
                }
                Ok(())
            }
            Behavior::Empty => std::fs::write(output, b"").map_err(|e| io(op, e)),
            other => fail(op, other).await,
        }
    }

    async fn extract(&self, op: &str, path: &Path) -> Result<String, ToolError> {
        self.record(op);
        match self.extract {
            Behavior::Clean | Behavior::Passthrough | Behavior::Empty => std::fs::read(path)
                .map(|b| String::from_utf8_lossy(&b).into_owned())
                .map_err(|e| io(op, e)),
            other => fail(op, other).await.map(|_| String::new()),
        }
    }
}

fn io(op: &str, source: std::io::Error) -> ToolError {
    ToolError::Io {
        program: op.to_string(),
        source,
    }
}

async fn fail(op: &str, behavior: Behavior) -> Result<(), ToolError> {
    match behavior {
        Behavior::Unavailable => Err(ToolError::Unavailable(op.to_string())),
        Behavior::Hang => {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            Ok(())
        }
        _ => Err(ToolError::NonZeroExit {
            program: op.to_string(),
            code: Some(1),
            stderr: "simulated failure".to_string(),
        }),
    }
}

fn strip_tags(text: &str) -> String {
    text.lines()
        .filter(|line| !line.contains(':'))
        .map(|line| format!("{line}\n"))
        .collect()
}

#[async_trait]
impl mediasan_core::Toolkit for FakeToolkit {
    fn preflight(&self) -> Result<(), MediaSanError> {
        match &self.missing_tool {
            Some(program) => Err(MediaSanError::ToolUnavailable {
                program: program.clone(),
                role: "xml structural editor".to_string(),
            }),
            None => Ok(()),
        }
    }

    async fn re_encode(&self, input: &Path, output: &Path, _quality: u8) -> Result<(), ToolError> {
        self.transform("re_encode", self.re_encode, input, output, |_| CLEAN_PIXELS.to_string())
            .await
    }

    async fn strip_metadata(&self, path: &Path) -> Result<(), ToolError> {
        self.transform("strip_metadata", self.strip, path, path, strip_tags).await
    }

    async fn structural_edit(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        self.transform("structural_edit", self.structural, input, output, |_| CLEAN_SVG.to_string())
            .await
    }

    async fn flatten(&self, input: &Path, output: &Path) -> Result<(), ToolError> {
        self.transform("flatten", self.flatten, input, output, |_| CLEAN_PDF.to_string())
            .await
    }

    async fn extract_metadata(&self, path: &Path) -> Result<String, ToolError> {
        self.extract("extract_metadata", path).await
    }

    async fn extract_strings(&self, path: &Path) -> Result<String, ToolError> {
        self.extract("extract_strings", path).await
    }
}

/// A pipeline over `fake` with a short attempt timeout.
pub fn build_pipeline_with(fake: FakeToolkit, config: PipelineConfig) -> (Pipeline, Arc<FakeToolkit>) {
    let fake = Arc::new(fake);
    let pipeline = Pipeline::new(&config, fake.clone())
        .unwrap()
        .with_attempt_timeout(Duration::from_millis(300));
    (pipeline, fake)
}

pub fn build_pipeline(fake: FakeToolkit) -> (Pipeline, Arc<FakeToolkit>) {
    let mut config = PipelineConfig::default();
    config.limits.workers = 2;
    build_pipeline_with(fake, config)
}

/// Writes `contents` to `root/relative`, creating parent directories.
pub fn write(root: &Path, relative: &str, contents: &str) {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, contents).unwrap();
}
