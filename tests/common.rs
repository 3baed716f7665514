use flate2::write::GzEncoder;
use flate2::Compression;
use std::collections::HashMap;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::sync::{Arc, Mutex};
use std::thread;
use tempfile::TempDir;

// Not every test binary uses every helper.
#[allow(dead_code)]
pub struct TestContext {
    pub _temp_dir: TempDir,
    pub project_dir: PathBuf,
    pub tmp_dir: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let project_dir = temp_dir.path().join("project");
        std::fs::create_dir_all(&project_dir).expect("Failed to create project dir");
        let tmp_dir = temp_dir.path().join("tmp");
        std::fs::create_dir_all(&tmp_dir).expect("Failed to create tmp dir");

        Self {
            bin_path: PathBuf::from(env!("CARGO_BIN_EXE_plugin-bootstrap")),
            project_dir,
            tmp_dir,
            _temp_dir: temp_dir,
        }
    }

    /// Canonical project path, as the installer records it.
    pub fn project_root(&self) -> PathBuf {
        std::fs::canonicalize(&self.project_dir).expect("Failed to canonicalize project dir")
    }

    pub fn plugin_dir(&self) -> PathBuf {
        self.project_root()
            .join(".claude")
            .join("plugins")
            .join("session-bootstrap")
    }

    pub fn settings_path(&self) -> PathBuf {
        self.project_dir.join(".claude").join("settings.json")
    }

    /// Run workspaces the installer left behind in its private `TMPDIR`.
    pub fn leftover_workspaces(&self) -> Vec<String> {
        entry_names(&self.tmp_dir)
            .into_iter()
            .filter(|name| name.starts_with("plugin-bootstrap-"))
            .collect()
    }

    /// Everything under `.claude/plugins`, hidden staging directories included.
    pub fn plugins_dir_entries(&self) -> Vec<String> {
        entry_names(&self.project_dir.join(".claude").join("plugins"))
    }

    /// Command pointed at `server` for both the release API and archives.
    pub fn cmd(&self, server: &MockServer) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.env("PLUGIN_BOOTSTRAP_REPO", "acme/session-bootstrap");
        cmd.env("PLUGIN_BOOTSTRAP_API_URL", format!("{}/api", server.base_url));
        cmd.env("PLUGIN_BOOTSTRAP_WEB_URL", format!("{}/web", server.base_url));
        cmd.env("HOME", self._temp_dir.path());
        cmd.env("TMPDIR", &self.tmp_dir);
        for var in [
            "GITHUB_TOKEN",
            "RUST_LOG",
            "HTTP_PROXY",
            "http_proxy",
            "HTTPS_PROXY",
            "https_proxy",
            "ALL_PROXY",
            "all_proxy",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }
}

#[allow(dead_code)]
fn entry_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().to_string())
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self, code: i32) -> &Self {
        assert_eq!(
            self.status.code(),
            Some(code),
            "Unexpected exit status\nstdout: {}\nstderr: {}",
            self.stdout,
            self.stderr
        );
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}

/// Minimal HTTP/1.1 server answering canned responses by request path.
#[allow(dead_code)]
pub struct MockServer {
    pub base_url: String,
    hits: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl MockServer {
    pub fn start(routes: HashMap<String, (u16, Vec<u8>)>) -> Self {
        Self::start_with_declared_lengths(routes, HashMap::new())
    }

    /// Like `start`, but paths in `declared` announce that `Content-Length`
    /// instead of the real body size.
    pub fn start_with_declared_lengths(
        routes: HashMap<String, (u16, Vec<u8>)>,
        declared: HashMap<String, usize>,
    ) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind mock server");
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let hits = Arc::new(Mutex::new(Vec::new()));

        let server_hits = Arc::clone(&hits);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                respond(stream, &routes, &declared, &server_hits);
            }
        });

        Self { base_url, hits }
    }

    pub fn hits(&self) -> Vec<String> {
        self.hits.lock().unwrap().clone()
    }
}

fn respond(
    mut stream: TcpStream,
    routes: &HashMap<String, (u16, Vec<u8>)>,
    declared: &HashMap<String, usize>,
    hits: &Mutex<Vec<String>>,
) {
    let mut reader = BufReader::new(stream.try_clone().expect("Failed to clone stream"));
    let mut request_line = String::new();
    if reader.read_line(&mut request_line).unwrap_or(0) == 0 {
        return;
    }
    loop {
        let mut line = String::new();
        if reader.read_line(&mut line).unwrap_or(0) == 0 || line == "\r\n" {
            break;
        }
    }

    let path = request_line
        .split_whitespace()
        .nth(1)
        .unwrap_or("/")
        .to_string();
    hits.lock().unwrap().push(path.clone());

    let (status, body) = routes
        .get(&path)
        .cloned()
        .unwrap_or((404, b"{\"message\":\"Not Found\"}".to_vec()));
    let length = declared.get(&path).copied().unwrap_or(body.len());
    let reason = if status == 200 { "OK" } else { "Error" };
    let _ = write!(
        stream,
        "HTTP/1.1 {} {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        reason,
        length
    );
    let _ = stream.write_all(&body);
    let _ = stream.flush();
}

#[allow(dead_code)]
pub fn latest_release_path(repo: &str) -> String {
    format!("/api/repos/{}/releases/latest", repo)
}

#[allow(dead_code)]
pub fn tag_archive_path(repo: &str, tag: &str) -> String {
    format!("/web/{}/archive/refs/tags/{}.tar.gz", repo, tag)
}

#[allow(dead_code)]
pub fn branch_archive_path(repo: &str, branch: &str) -> String {
    format!("/web/{}/archive/refs/heads/{}.tar.gz", repo, branch)
}

/// A GitHub-style source archive: everything under `<top>/`.
#[allow(dead_code)]
pub fn build_tar_gz(top: &str, files: &[(&str, &str)]) -> Vec<u8> {
    let encoder = GzEncoder::new(Vec::new(), Compression::default());
    let mut builder = tar::Builder::new(encoder);
    for (path, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        builder
            .append_data(&mut header, Path::new(top).join(path), contents.as_bytes())
            .expect("Failed to append tar entry");
    }
    builder
        .into_inner()
        .and_then(|encoder| encoder.finish())
        .expect("Failed to finish archive")
}
