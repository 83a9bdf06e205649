use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use once_cell::sync::Lazy;
use serde::de::DeserializeOwned;
use serde::Deserialize;

static MANIFEST: Lazy<Manifest> = Lazy::new(|| {
    let raw = include_str!("../../../../fixtures/manifest.json");
    serde_json::from_str(raw).expect("fixtures manifest should parse")
});

#[derive(Debug, Deserialize)]
struct Manifest {
    armatures: HashMap<String, String>,
    clips: HashMap<String, ClipEntry>,
}

/// A clip set, optionally tied to the armature it was authored for.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ClipEntry {
    Path(String),
    Detailed {
        path: String,
        #[serde(default)]
        armature: Option<String>,
    },
}

impl ClipEntry {
    fn as_path(&self) -> &str {
        match self {
            ClipEntry::Path(path) => path,
            ClipEntry::Detailed { path, .. } => path,
        }
    }

    fn armature(&self) -> Option<&str> {
        match self {
            ClipEntry::Path(_) => None,
            ClipEntry::Detailed { armature, .. } => armature.as_deref(),
        }
    }
}

fn fixtures_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("../../../fixtures")
}

fn resolve_path(rel: &str) -> PathBuf {
    fixtures_root().join(rel)
}

fn read_to_string(rel: &str) -> Result<String> {
    let path = resolve_path(rel);
    fs::read_to_string(&path)
        .with_context(|| format!("failed to read fixture at {}", path.display()))
}

fn load_json<T: DeserializeOwned>(rel: &str) -> Result<T> {
    let text = read_to_string(rel)?;
    serde_json::from_str(&text).with_context(|| format!("failed to parse JSON fixture {rel}"))
}

fn lookup<'a, T>(map: &'a HashMap<String, T>, kind: &str, name: &str) -> Result<&'a T> {
    map.get(name)
        .ok_or_else(|| anyhow!("unknown {kind} fixture '{name}'"))
}

pub mod armatures {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.armatures.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let rel = lookup(&MANIFEST.armatures, "armature", name)?;
        read_to_string(rel)
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let rel = lookup(&MANIFEST.armatures, "armature", name)?;
        super::load_json(rel)
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let rel = lookup(&MANIFEST.armatures, "armature", name)?;
        Ok(resolve_path(rel))
    }
}

pub mod clips {
    use super::*;

    pub fn keys() -> Vec<String> {
        MANIFEST.clips.keys().cloned().collect()
    }

    pub fn json(name: &str) -> Result<String> {
        let entry = lookup(&MANIFEST.clips, "clip set", name)?;
        read_to_string(entry.as_path())
    }

    pub fn load<T: DeserializeOwned>(name: &str) -> Result<T> {
        let entry = lookup(&MANIFEST.clips, "clip set", name)?;
        super::load_json(entry.as_path())
    }

    pub fn path(name: &str) -> Result<PathBuf> {
        let entry = lookup(&MANIFEST.clips, "clip set", name)?;
        Ok(resolve_path(entry.as_path()))
    }

    /// Armature fixture the clip set was authored against, if recorded.
    pub fn armature(name: &str) -> Result<Option<String>> {
        let entry = lookup(&MANIFEST.clips, "clip set", name)?;
        Ok(entry.armature().map(str::to_owned))
    }
}
