use log::debug;
use std::fs::File;
use std::path::Path;
use std::process::{Command, Stdio};

use super::{Backend, ChunkRequest};
use crate::error::{Error, Result};
use crate::image::{InspectOutput, TagList};

/// Backend that drives `skopeo` for registry access and `podman` for local storage
/// and for running the chunker image.
pub struct PodmanBackend {
    podman: String,
    skopeo: String,
}

impl PodmanBackend {
    pub fn new() -> Result<Self> {
        Self::with_programs("podman", "skopeo")
    }

    /// Use explicit program names or paths for podman and skopeo.
    pub fn with_programs(podman: impl Into<String>, skopeo: impl Into<String>) -> Result<Self> {
        let backend = Self {
            podman: podman.into(),
            skopeo: skopeo.into(),
        };
        backend.check_available(&backend.podman)?;
        backend.check_available(&backend.skopeo)?;
        Ok(backend)
    }

    fn check_available(&self, program: &str) -> Result<()> {
        let output = Command::new(program).arg("--version").output().map_err(|e| {
            Error::collaborator(
                format!("{} --version", program),
                format!("failed to execute: {}. Is {} installed?", e, program),
            )
        })?;

        if !output.status.success() {
            return Err(Error::collaborator(
                format!("{} --version", program),
                format!("{} is not available", program),
            ));
        }
        Ok(())
    }

    fn run_command(&self, program: &str, args: &[&str]) -> Result<String> {
        let command_line = render_command(program, args);
        debug!("Running: {}", command_line);

        let output = Command::new(program)
            .args(args)
            .output()
            .map_err(|e| Error::collaborator(&command_line, e.to_string()))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(Error::collaborator(&command_line, error));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn podman(&self, args: &[&str]) -> Result<String> {
        self.run_command(&self.podman, args)
    }

    fn skopeo(&self, args: &[&str]) -> Result<String> {
        self.run_command(&self.skopeo, args)
    }
}

fn render_command(program: &str, args: &[&str]) -> String {
    std::iter::once(program)
        .chain(args.iter().copied())
        .collect::<Vec<_>>()
        .join(" ")
}

fn parse_json<T: serde::de::DeserializeOwned>(what: &str, raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| Error::MalformedData(format!("could not parse {}: {}", what, e)))
}

/// Image id from `podman load` output such as `Loaded image: sha256:abc...`.
pub fn parse_loaded_image_id(output: &str) -> Result<String> {
    let last = output
        .split_whitespace()
        .last()
        .ok_or_else(|| Error::MalformedData("podman load printed nothing".to_string()))?;
    Ok(last.strip_prefix("sha256:").unwrap_or(last).to_string())
}

/// `podman images --format` output, one reference per line.
pub fn parse_image_list(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

impl Backend for PodmanBackend {
    fn name(&self) -> &str {
        "podman"
    }

    fn list_tags(&self, repo: &str) -> Result<Vec<String>> {
        let output = self.skopeo(&["list-tags", &format!("docker://{}", repo)])?;
        let list: TagList = parse_json("skopeo list-tags output", &output)?;
        Ok(list.tags.unwrap_or_default())
    }

    fn created(&self, repo: &str, tag: &str) -> Result<String> {
        let output = self.skopeo(&["inspect", &format!("docker://{}:{}", repo, tag)])?;
        let inspect: InspectOutput = parse_json("skopeo inspect output", &output)?;
        Ok(inspect.created.unwrap_or_default())
    }

    fn pull(&self, repo: &str, tag: &str, local_ref: &str) -> Result<()> {
        self.skopeo(&[
            "copy",
            &format!("docker://{}:{}", repo, tag),
            &format!("containers-storage:{}", local_ref),
        ])?;
        Ok(())
    }

    fn tag(&self, source_ref: &str, target_ref: &str) -> Result<()> {
        self.podman(&["tag", source_ref, target_ref])?;
        Ok(())
    }

    fn remove(&self, local_ref: &str) -> Result<()> {
        self.podman(&["rmi", "-f", local_ref])?;
        Ok(())
    }

    fn list_images(&self, repository: &str) -> Result<Vec<String>> {
        let output = self.podman(&[
            "images",
            "--format",
            "{{.Repository}}:{{.Tag}}",
            repository,
        ])?;
        Ok(parse_image_list(&output))
    }

    fn inspect(&self, local_ref: &str) -> Result<InspectOutput> {
        let output = self.skopeo(&["inspect", &format!("containers-storage:{}", local_ref)])?;
        parse_json(&format!("inspect output for {}", local_ref), &output)
    }

    fn chunk(&self, request: &ChunkRequest, archive: &Path) -> Result<()> {
        // The chunker reads the source image config from the environment.
        let config = self.podman(&["inspect", &request.source_ref])?;

        let mount = format!("--mount=type=image,src={},target=/chunkah", request.source_ref);
        let env = format!("CHUNKAH_CONFIG_STR={}", config);
        let mut args = vec!["run", "--rm", mount.as_str(), "-e", env.as_str()];
        args.push(&request.chunker_image);
        args.push("build");
        args.extend(request.args.iter().map(String::as_str));

        let command_line = format!(
            "{} run --rm {} {} build {}",
            self.podman,
            mount,
            request.chunker_image,
            request.args.join(" ")
        );
        debug!("Running: {}", command_line);

        let out = File::create(archive)?;
        let output = Command::new(&self.podman)
            .args(&args)
            .stdout(Stdio::from(out))
            .stderr(Stdio::piped())
            .output()
            .map_err(|e| Error::collaborator(&command_line, e.to_string()))?;

        if !output.status.success() {
            let error = String::from_utf8_lossy(&output.stderr);
            return Err(Error::collaborator(&command_line, error));
        }
        Ok(())
    }

    fn load(&self, archive: &Path) -> Result<String> {
        let path = archive.to_string_lossy().to_string();
        let output = self.podman(&["load", "-i", &path])?;
        parse_loaded_image_id(&output)
    }
}
