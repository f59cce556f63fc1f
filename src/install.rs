use anyhow::{Context, Result, anyhow};
use std::fs;
use std::io::Write;
use std::path::{Component, Path, PathBuf};
use tracing::{debug, info};

pub const SKILL_NAME: &str = "grok-web-search";
pub const RUNTIME_BINARY: &str = "grok-search";

/// Development-only paths that never ship with the installed skill.
pub const EXCLUDE_PATTERNS: &[&str] = &[
    "target",
    ".git",
    ".idea",
    ".DS_Store",
    ".claude",
    ".gitignore",
    ".env",
    "logs",
    "CLAUDE.md",
    "tests",
    "src/bin/grok-selftest.rs",
    "src/bin/grok-install.rs",
    "*.log",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstallPlan {
    pub source_dir: PathBuf,
    pub skills_dir: PathBuf,
    pub runtime_binary: Option<PathBuf>,
}

impl InstallPlan {
    /// Installs this crate's tree into `~/.claude/skills`, shipping the search
    /// binary that sits next to the running installer.
    pub fn for_current_user() -> Result<Self> {
        let home =
            dirs::home_dir().ok_or_else(|| anyhow!("Failed to determine home directory"))?;
        let exe = std::env::current_exe().context("Failed to locate the running executable")?;
        let runtime_binary = exe
            .parent()
            .map(|dir| dir.join(format!("{RUNTIME_BINARY}{}", std::env::consts::EXE_SUFFIX)))
            .filter(|path| path.is_file());

        Ok(Self {
            source_dir: PathBuf::from(env!("CARGO_MANIFEST_DIR")),
            skills_dir: home.join(".claude").join("skills"),
            runtime_binary,
        })
    }

    pub fn install_dir(&self) -> PathBuf {
        self.skills_dir.join(SKILL_NAME)
    }
}

fn relative_key(relative: &Path) -> String {
    relative
        .components()
        .filter_map(|component| match component {
            Component::Normal(name) => Some(name.to_string_lossy().into_owned()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// `*` matches any run of characters, including `/`.
fn glob_matches(pattern: &str, candidate: &str) -> bool {
    let mut pieces = pattern.split('*');
    let Some(head) = pieces.next() else {
        return pattern == candidate;
    };
    let Some(mut rest) = candidate.strip_prefix(head) else {
        return false;
    };

    let tail: Vec<&str> = pieces.collect();
    let Some((last, middle)) = tail.split_last() else {
        return rest.is_empty();
    };
    for piece in middle {
        match rest.find(piece) {
            Some(at) => rest = &rest[at + piece.len()..],
            None => return false,
        }
    }
    rest.len() >= last.len() && rest.ends_with(last)
}

pub fn should_exclude(relative: &Path) -> bool {
    let key = relative_key(relative);
    EXCLUDE_PATTERNS.iter().any(|pattern| {
        if pattern.contains('*') {
            glob_matches(pattern, &key)
        } else {
            key == *pattern || key.starts_with(&format!("{pattern}/"))
        }
    })
}

/// Copies `src` into `dest` recursively, skipping excluded paths. Symlinks are
/// followed and their targets copied. Returns the number of files copied.
pub fn copy_tree(src: &Path, dest: &Path) -> Result<usize> {
    copy_tree_from(src, dest, src)
}

fn copy_tree_from(src: &Path, dest: &Path, base: &Path) -> Result<usize> {
    fs::create_dir_all(dest)
        .with_context(|| format!("Failed to create directory '{}'", dest.display()))?;

    let mut copied = 0;
    let entries = fs::read_dir(src)
        .with_context(|| format!("Failed to read directory '{}'", src.display()))?;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to list '{}'", src.display()))?;
        let src_path = entry.path();
        let relative = src_path.strip_prefix(base).unwrap_or(&src_path);
        if should_exclude(relative) {
            debug!(path = %relative.display(), "skipping excluded path");
            continue;
        }

        let dest_path = dest.join(entry.file_name());
        let file_type = entry
            .file_type()
            .with_context(|| format!("Failed to inspect '{}'", src_path.display()))?;
        let is_dir = if file_type.is_symlink() {
            fs::metadata(&src_path)
                .with_context(|| format!("Failed to resolve link '{}'", src_path.display()))?
                .is_dir()
        } else {
            file_type.is_dir()
        };
        if is_dir {
            copied += copy_tree_from(&src_path, &dest_path, base)?;
        } else {
            fs::copy(&src_path, &dest_path).with_context(|| {
                format!(
                    "Failed to copy '{}' to '{}'",
                    src_path.display(),
                    dest_path.display()
                )
            })?;
            copied += 1;
        }
    }
    Ok(copied)
}

pub fn install(
    plan: &InstallPlan,
    api_key_present: bool,
    out: &mut impl Write,
) -> Result<PathBuf> {
    let install_dir = plan.install_dir();
    writeln!(out, "Installing Grok web search skill\n")?;

    if !api_key_present {
        writeln!(out, "Warning: XAI_API_KEY environment variable is not set")?;
        writeln!(out, "You'll need to set it before using the skill:")?;
        writeln!(out, "  export XAI_API_KEY=\"your-api-key\"\n")?;
    }

    writeln!(out, "Step 1/4: Preparing installation directory...")?;
    fs::create_dir_all(&plan.skills_dir).with_context(|| {
        format!(
            "Failed to create skills directory '{}'",
            plan.skills_dir.display()
        )
    })?;
    writeln!(out, "Skills directory ready: {}\n", plan.skills_dir.display())?;

    if install_dir.exists() {
        writeln!(out, "Step 2/4: Removing old version...")?;
        fs::remove_dir_all(&install_dir).with_context(|| {
            format!("Failed to remove old version at '{}'", install_dir.display())
        })?;
        writeln!(out, "Old version removed\n")?;
    } else {
        writeln!(out, "Step 2/4: No old version found, skipping...\n")?;
    }

    writeln!(out, "Step 3/4: Copying skill files...")?;
    let copied = copy_tree(&plan.source_dir, &install_dir)?;
    writeln!(out, "{copied} files copied\n")?;

    writeln!(out, "Step 4/4: Installing runtime...")?;
    let runtime = plan.runtime_binary.as_deref().ok_or_else(|| {
        anyhow!(
            "'{RUNTIME_BINARY}' executable not found next to the installer. \
             Build it first with: cargo build --release"
        )
    })?;
    let bin_dir = install_dir.join("bin");
    fs::create_dir_all(&bin_dir)
        .with_context(|| format!("Failed to create '{}'", bin_dir.display()))?;
    let file_name = runtime
        .file_name()
        .ok_or_else(|| anyhow!("Invalid runtime path '{}'", runtime.display()))?;
    fs::copy(runtime, bin_dir.join(file_name))
        .with_context(|| format!("Failed to install runtime from '{}'", runtime.display()))?;
    writeln!(out, "Runtime installed in {}\n", bin_dir.display())?;

    info!(install_dir = %install_dir.display(), files = copied, "skill installed");

    writeln!(out, "Installation complete!\n")?;
    writeln!(out, "Skill installed at:\n   {}\n", install_dir.display())?;
    writeln!(out, "Next steps:\n")?;
    if !api_key_present {
        writeln!(out, "1. Set your xAI API key:")?;
        writeln!(out, "   export XAI_API_KEY=\"your-api-key\"\n")?;
    }
    writeln!(out, "2. Verify installation:")?;
    writeln!(
        out,
        "   {} \"test query\"\n",
        bin_dir.join(file_name).display()
    )?;
    writeln!(out, "3. Restart the host application to load the skill")?;
    Ok(install_dir)
}
