//! Mermaid diagram rendering.
//!
//! A [`DiagramChain`] holds an ordered list of [`DiagramTier`]s and tries them
//! one after another until one produces an image:
//!
//! 1. [`VectorTier`]: the mermaid CLI writes an SVG.
//! 2. [`RasterTier`]: the mermaid CLI writes a PNG, which is then normalised.
//! 3. [`RemoteTier`]: the source is sent to a rendering service over HTTP.
//!
//! When every tier fails the chain answers with [`DiagramResult::Unavailable`],
//! which carries the untouched source so it can be shown as code. Tier errors
//! are logged and never escape the chain.
//!
//! All output files land in one temporary directory owned by the chain. It
//! is removed when the chain is dropped, which must happen only after the PDF
//! has been assembled since image bytes are read at that point.

use crate::canvas::{Canvas, ImageKind, ImageRef, Rect};
use crate::code::{self, CodeStyle};
use crate::images;
use crate::styling::DiagramSettings;
use crate::LayoutError;
use base64::Engine;
use log::{debug, info, warn};
use once_cell::unsync::OnceCell;
use std::cell::Cell;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub const FALLBACK_NOTE: &str =
    "Mermaid CLI not available. Install with: npm install -g @mermaid-js/mermaid-cli";

/// Largest raster the local tool may produce before it is shrunk.
const RASTER_MAX: (u32, u32) = (800, 600);
const MAX_DIAGRAM_HEIGHT: f32 = 300.0;

#[derive(Debug, Clone, PartialEq)]
pub enum DiagramResult {
    Vector { path: PathBuf, width: f32, height: f32 },
    Raster { path: PathBuf, width: f32, height: f32 },
    Unavailable { source: String, note: String },
}

#[derive(Debug, Clone, PartialEq)]
pub enum DiagramError {
    ToolMissing(String),
    ToolFailed { status: Option<i32>, stderr: String },
    Timeout(Duration),
    EmptyOutput(PathBuf),
    Network(String),
    HttpStatus(u16),
    Decode(String),
    Io(String),
}

impl fmt::Display for DiagramError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            DiagramError::ToolMissing(tool) => write!(f, "'{}' is not installed", tool),
            DiagramError::ToolFailed { status, stderr } => {
                match status {
                    Some(code) => write!(f, "tool exited with status {}", code)?,
                    None => write!(f, "tool was terminated by a signal")?,
                }
                if !stderr.trim().is_empty() {
                    write!(f, ": {}", stderr.trim())?;
                }
                Ok(())
            }
            DiagramError::Timeout(after) => write!(f, "tool timed out after {:?}", after),
            DiagramError::EmptyOutput(path) => write!(f, "no output written to {}", path.display()),
            DiagramError::Network(msg) => write!(f, "request failed: {}", msg),
            DiagramError::HttpStatus(code) => write!(f, "server answered with status {}", code),
            DiagramError::Decode(msg) => write!(f, "could not read image: {}", msg),
            DiagramError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for DiagramError {}

impl From<std::io::Error> for DiagramError {
    fn from(e: std::io::Error) -> Self {
        DiagramError::Io(e.to_string())
    }
}

/// Runs the external diagram tool.
pub trait ToolRunner {
    /// Whether the tool can be started at all.
    fn available(&self) -> bool;
    /// Runs the tool with `args` and waits for it to exit successfully.
    fn run(&self, args: &[String]) -> Result<(), DiagramError>;
}

/// Runs a program with a bounded wait. A program that outlives the timeout
/// is killed.
pub struct CommandRunner {
    program: String,
    timeout: Duration,
    available: OnceCell<bool>,
}

impl CommandRunner {
    pub fn new(program: impl Into<String>, timeout: Duration) -> Self {
        Self {
            program: program.into(),
            timeout,
            available: OnceCell::new(),
        }
    }

    fn run_with_timeout(&self, args: &[String]) -> Result<(), DiagramError> {
        let stderr_file = tempfile::tempfile()?;
        let mut child = Command::new(&self.program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::from(stderr_file.try_clone()?))
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => DiagramError::ToolMissing(self.program.clone()),
                _ => DiagramError::Io(e.to_string()),
            })?;

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                return Err(DiagramError::Timeout(self.timeout));
            }
            thread::sleep(Duration::from_millis(50));
        };

        if status.success() {
            Ok(())
        } else {
            let stderr = read_captured(stderr_file);
            Err(DiagramError::ToolFailed {
                status: status.code(),
                stderr,
            })
        }
    }
}

fn read_captured(mut file: fs::File) -> String {
    use std::io::{Read, Seek, SeekFrom};
    let mut out = String::new();
    if file.seek(SeekFrom::Start(0)).is_ok() {
        let _ = file.read_to_string(&mut out);
    }
    out
}

impl ToolRunner for CommandRunner {
    fn available(&self) -> bool {
        *self.available.get_or_init(|| {
            let ok = self.run_with_timeout(&["--version".to_string()]).is_ok();
            debug!("{} available: {}", self.program, ok);
            ok
        })
    }

    fn run(&self, args: &[String]) -> Result<(), DiagramError> {
        debug!("Running {} {}", self.program, args.join(" "));
        self.run_with_timeout(args)
    }
}

/// Blocking HTTP GET used by the remote tier.
pub trait HttpFetch {
    /// Returns the status code and the body.
    fn get(&self, url: &str) -> Result<(u16, Vec<u8>), DiagramError>;
}

#[cfg(feature = "fetch")]
pub struct ReqwestFetch {
    client: reqwest::blocking::Client,
}

#[cfg(feature = "fetch")]
impl ReqwestFetch {
    pub fn new(timeout: Duration) -> Result<Self, DiagramError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| DiagramError::Network(e.to_string()))?;
        Ok(Self { client })
    }
}

#[cfg(feature = "fetch")]
impl HttpFetch for ReqwestFetch {
    fn get(&self, url: &str) -> Result<(u16, Vec<u8>), DiagramError> {
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| DiagramError::Network(e.to_string()))?;
        let status = response.status().as_u16();
        let body = response
            .bytes()
            .map_err(|e| DiagramError::Network(e.to_string()))?;
        Ok((status, body.to_vec()))
    }
}

/// One diagram request as seen by a tier.
pub struct DiagramJob<'a> {
    pub source: &'a str,
    /// Sequence number, used to name output files.
    pub id: usize,
    pub workdir: &'a Path,
}

pub trait DiagramTier {
    fn name(&self) -> &'static str;
    fn render(&self, job: &DiagramJob) -> Result<DiagramResult, DiagramError>;
}

fn tool_args(settings: &DiagramSettings, input: &Path, output: &Path) -> Vec<String> {
    vec![
        "-i".to_string(),
        input.display().to_string(),
        "-o".to_string(),
        output.display().to_string(),
        "-w".to_string(),
        settings.width.to_string(),
        "-H".to_string(),
        settings.height.to_string(),
        "--theme".to_string(),
        settings.theme.clone(),
        "--backgroundColor".to_string(),
        settings.background.clone(),
    ]
}

/// Runs the tool for `job`, writing to `workdir/diagram_<id>.<extension>`.
fn run_tool(
    runner: &dyn ToolRunner,
    settings: &DiagramSettings,
    job: &DiagramJob,
    extension: &str,
) -> Result<PathBuf, DiagramError> {
    if !runner.available() {
        return Err(DiagramError::ToolMissing(settings.tool.clone()));
    }
    let input = job.workdir.join(format!("diagram_{}.mmd", job.id));
    fs::write(&input, job.source)?;
    let output = job.workdir.join(format!("diagram_{}.{}", job.id, extension));

    runner.run(&tool_args(settings, &input, &output))?;

    match fs::metadata(&output) {
        Ok(meta) if meta.len() > 0 => Ok(output),
        _ => Err(DiagramError::EmptyOutput(output)),
    }
}

pub struct VectorTier {
    runner: Rc<dyn ToolRunner>,
    settings: DiagramSettings,
}

impl VectorTier {
    pub fn new(runner: Rc<dyn ToolRunner>, settings: DiagramSettings) -> Self {
        Self { runner, settings }
    }
}

impl DiagramTier for VectorTier {
    fn name(&self) -> &'static str {
        "vector"
    }

    fn render(&self, job: &DiagramJob) -> Result<DiagramResult, DiagramError> {
        let path = run_tool(self.runner.as_ref(), &self.settings, job, "svg")?;
        Ok(DiagramResult::Vector {
            path,
            width: self.settings.width as f32,
            height: self.settings.height as f32,
        })
    }
}

pub struct RasterTier {
    runner: Rc<dyn ToolRunner>,
    settings: DiagramSettings,
}

impl RasterTier {
    pub fn new(runner: Rc<dyn ToolRunner>, settings: DiagramSettings) -> Self {
        Self { runner, settings }
    }
}

impl DiagramTier for RasterTier {
    fn name(&self) -> &'static str {
        "raster"
    }

    fn render(&self, job: &DiagramJob) -> Result<DiagramResult, DiagramError> {
        let path = run_tool(self.runner.as_ref(), &self.settings, job, "png")?;
        let (width, height) = images::fit_raster(&path, RASTER_MAX.0, RASTER_MAX.1)
            .map_err(|e| DiagramError::Decode(e.to_string()))?;
        Ok(DiagramResult::Raster {
            path,
            width: width as f32,
            height: height as f32,
        })
    }
}

pub struct RemoteTier {
    fetch: Box<dyn HttpFetch>,
    endpoint: String,
}

impl RemoteTier {
    pub fn new(fetch: Box<dyn HttpFetch>, endpoint: impl Into<String>) -> Self {
        Self {
            fetch,
            endpoint: endpoint.into(),
        }
    }

    /// URL for `source`: the endpoint followed by the base64 of the source.
    pub fn url_for(&self, source: &str) -> String {
        format!(
            "{}{}",
            self.endpoint,
            base64::engine::general_purpose::STANDARD.encode(source)
        )
    }
}

impl DiagramTier for RemoteTier {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn render(&self, job: &DiagramJob) -> Result<DiagramResult, DiagramError> {
        let (status, body) = self.fetch.get(&self.url_for(job.source))?;
        if status != 200 {
            return Err(DiagramError::HttpStatus(status));
        }
        let path = job.workdir.join(format!("online_diagram_{}.png", job.id));
        if body.is_empty() {
            return Err(DiagramError::EmptyOutput(path));
        }
        let (width, height) =
            images::dimensions_from_bytes(&body).map_err(|e| DiagramError::Decode(e.to_string()))?;
        fs::write(&path, &body)?;
        Ok(DiagramResult::Raster {
            path,
            width: width as f32,
            height: height as f32,
        })
    }
}

/// Terminal strategy: always answers with the source and an explanation.
pub struct FallbackTier {
    note: String,
}

impl FallbackTier {
    pub fn render(&self, source: &str) -> DiagramResult {
        DiagramResult::Unavailable {
            source: source.to_string(),
            note: self.note.clone(),
        }
    }
}

impl Default for FallbackTier {
    fn default() -> Self {
        Self {
            note: FALLBACK_NOTE.to_string(),
        }
    }
}

pub struct DiagramChain {
    tiers: Vec<Box<dyn DiagramTier>>,
    fallback: FallbackTier,
    workdir: TempDir,
    counter: Cell<usize>,
}

impl DiagramChain {
    /// The standard chain for `settings`: vector, raster, then remote when
    /// enabled and compiled in.
    pub fn new(settings: &DiagramSettings) -> std::io::Result<Self> {
        let runner: Rc<dyn ToolRunner> = Rc::new(CommandRunner::new(settings.tool.clone(), settings.timeout));
        let mut tiers: Vec<Box<dyn DiagramTier>> = vec![
            Box::new(VectorTier::new(runner.clone(), settings.clone())),
            Box::new(RasterTier::new(runner, settings.clone())),
        ];
        if settings.remote {
            #[cfg(feature = "fetch")]
            match ReqwestFetch::new(settings.timeout) {
                Ok(fetch) => tiers.push(Box::new(RemoteTier::new(Box::new(fetch), settings.endpoint.clone()))),
                Err(e) => warn!("Remote diagram rendering disabled: {}", e),
            }
            #[cfg(not(feature = "fetch"))]
            info!("Remote diagram rendering requires the 'fetch' feature");
        }
        Self::with_tiers(tiers)
    }

    /// A chain with explicit tiers, tried in the given order.
    pub fn with_tiers(tiers: Vec<Box<dyn DiagramTier>>) -> std::io::Result<Self> {
        let workdir = tempfile::Builder::new().prefix("slidepress_mermaid").tempdir()?;
        Ok(Self {
            tiers,
            fallback: FallbackTier::default(),
            workdir,
            counter: Cell::new(0),
        })
    }

    pub fn tier_names(&self) -> Vec<&'static str> {
        self.tiers.iter().map(|t| t.name()).collect()
    }

    pub fn workdir(&self) -> &Path {
        self.workdir.path()
    }

    /// Renders `source` with the first tier that succeeds.
    pub fn render(&self, source: &str) -> DiagramResult {
        let id = self.counter.get() + 1;
        self.counter.set(id);
        let job = DiagramJob {
            source,
            id,
            workdir: self.workdir.path(),
        };

        for tier in &self.tiers {
            debug!("Diagram {}: trying {} tier", id, tier.name());
            match tier.render(&job) {
                Ok(DiagramResult::Unavailable { .. }) => continue,
                Ok(result) => {
                    info!("Diagram {} rendered by {} tier", id, tier.name());
                    return result;
                }
                Err(e) => warn!("Diagram {}: {} tier failed: {}", id, tier.name(), e),
            }
        }
        self.fallback.render(source)
    }
}

/// Places a diagram result at the cursor. Images that cannot be placed are
/// shown through the fallback box instead.
pub fn place_diagram(result: &DiagramResult, canvas: &mut Canvas, style: &CodeStyle) -> Result<(), LayoutError> {
    let placed = match result {
        DiagramResult::Vector { path, width, height } => {
            place_vector(path, *width, *height, canvas)
        }
        DiagramResult::Raster { path, width, height } => {
            place_raster(path, *width, *height, canvas)
        }
        DiagramResult::Unavailable { source, note } => {
            return code::render_fallback_box(source, note, canvas, style);
        }
    };
    match placed {
        Ok(()) => Ok(()),
        Err(e) => {
            warn!("Could not place diagram: {}", e);
            code::render_fallback_box("", &format!("Rendering failed: {}", e), canvas, style)
        }
    }
}

fn place_vector(path: &Path, width: f32, height: f32, canvas: &mut Canvas) -> Result<(), LayoutError> {
    let bounds = canvas.bounds();
    let w = width.min(bounds.width - 20.0);
    let h = height.min(MAX_DIAGRAM_HEIGHT);
    if w <= 0.0 || h <= 0.0 {
        return Err(LayoutError::Image(format!("{} has no visible size", path.display())));
    }
    canvas.ensure_space(h);
    let top = canvas.cursor();
    canvas.draw_image(
        Rect::new(canvas.bounds().x + 10.0, top, w, h),
        ImageRef {
            path: path.to_path_buf(),
            kind: ImageKind::Svg,
        },
    );
    canvas.advance(h + 10.0);
    Ok(())
}

fn place_raster(path: &Path, width: f32, height: f32, canvas: &mut Canvas) -> Result<(), LayoutError> {
    if width <= 0.0 || height <= 0.0 {
        return Err(LayoutError::Image(format!("{} has no pixels", path.display())));
    }
    let bounds = canvas.bounds();
    let max_width = bounds.width - 20.0;
    let ratio = (max_width / width).min(MAX_DIAGRAM_HEIGHT / height);
    let (w, h) = (width * ratio, height * ratio);
    if w <= 0.0 || h <= 0.0 {
        return Err(LayoutError::Image(format!("{} has no visible size", path.display())));
    }
    canvas.ensure_space(h);
    let x = canvas.bounds().x + (bounds.width - w) / 2.0;
    let top = canvas.cursor();
    canvas.draw_image(
        Rect::new(x, top, w, h),
        ImageRef {
            path: path.to_path_buf(),
            kind: ImageKind::Raster,
        },
    );
    canvas.advance(h + 10.0);
    Ok(())
}
